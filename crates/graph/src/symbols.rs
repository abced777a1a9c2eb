//! Name lookup over a set of declarations.
//!
//! The same table drives per-file resolution (over one file's declarations)
//! and the assembler's second pass (over the merged graph), so a lookup that
//! fails locally and is deferred gets exactly the same treatment later.

use crate::descriptor::{lookup_name, TypeDescriptor};
use crate::file_graph::PendingLookup;
use crate::types::{Confidence, FunctionKind, Symbol, SymbolDetail, SymbolId, SymbolKind, TypeKind};
use std::collections::{HashMap, HashSet};

const ALIAS_DEPTH_LIMIT: usize = 16;

/// Outcome of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: SymbolId,
    pub confidence: Confidence,
    /// Static type of a call through the resolved function
    pub return_type: Option<TypeDescriptor>,
}

pub struct SymbolTable<'a> {
    by_id: HashMap<&'a str, &'a Symbol>,
    by_qualified: HashMap<&'a str, Vec<&'a Symbol>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_qualified: HashMap<&'a str, Vec<&'a Symbol>> = HashMap::new();
        for symbol in symbols {
            if symbol.is_placeholder() || by_id.contains_key(symbol.id.as_str()) {
                continue;
            }
            by_id.insert(symbol.id.as_str(), symbol);
            by_qualified
                .entry(symbol.qualified_name.as_str())
                .or_default()
                .push(symbol);
        }
        Self { by_id, by_qualified }
    }

    pub fn get(&self, id: &SymbolId) -> Option<&'a Symbol> {
        self.by_id.get(id.as_str()).copied()
    }

    pub fn named(&self, qualified: &str) -> &[&'a Symbol] {
        self.by_qualified
            .get(qualified)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Named functions (lambdas and initializers are never looked up by name)
    pub fn functions(&self, qualified: &str) -> Vec<&'a Symbol> {
        self.named(qualified)
            .iter()
            .copied()
            .filter(|symbol| {
                symbol.function_info().is_some_and(|info| {
                    !matches!(info.kind, FunctionKind::Lambda | FunctionKind::Initializer)
                })
            })
            .collect()
    }

    pub fn namespace_exists(&self, qualified: &str) -> bool {
        self.named(qualified)
            .iter()
            .any(|symbol| symbol.kind == SymbolKind::Namespace)
    }

    /// Type by exact qualified name; aggregate definitions beat forward
    /// declarations, which beat typedefs of the same name
    pub fn find_type(&self, qualified: &str) -> Option<&'a Symbol> {
        let rank = |symbol: &&'a Symbol| match symbol.type_info() {
            Some(info) if info.kind != TypeKind::Typedef && info.is_definition => 0,
            Some(info) if info.kind != TypeKind::Typedef => 1,
            Some(_) => 2,
            None => 3,
        };
        self.named(qualified)
            .iter()
            .copied()
            .filter(|symbol| symbol.kind == SymbolKind::Type)
            .min_by_key(rank)
    }

    /// Unqualified or partially qualified type name, searched outward
    pub fn resolve_type(&self, name: &str, scopes: &[String]) -> Option<&'a Symbol> {
        let name = lookup_name(name);
        if name.is_empty() {
            return None;
        }
        scopes
            .iter()
            .find_map(|scope| self.find_type(&join_scope(scope, &name)))
    }

    /// Follow typedef / alias chains to the aggregate they name
    pub fn canonical_type(&self, ty: &'a Symbol) -> &'a Symbol {
        let mut current = ty;
        let mut seen = HashSet::new();
        for _ in 0..ALIAS_DEPTH_LIMIT {
            if !seen.insert(current.id.as_str()) {
                break;
            }
            let Some(info) = current.type_info() else {
                break;
            };
            if info.kind != TypeKind::Typedef {
                break;
            }
            let Some(target) = info.aliased.as_ref().and_then(TypeDescriptor::as_named) else {
                break;
            };
            match self.resolve_type(target, &enclosing_scopes(&current.qualified_name)) {
                Some(next) if next.id != current.id => current = next,
                _ => break,
            }
        }
        current
    }

    /// Replace typedef names with the descriptor they alias
    pub fn expand_alias(&self, ty: &TypeDescriptor, scopes: &[String]) -> TypeDescriptor {
        let mut current = ty.clone();
        for _ in 0..ALIAS_DEPTH_LIMIT {
            let Some(name) = current.as_named() else {
                break;
            };
            let Some(symbol) = self.resolve_type(name, scopes) else {
                break;
            };
            match symbol.type_info() {
                Some(info) if info.kind == TypeKind::Typedef => match &info.aliased {
                    Some(aliased) if aliased != &current => current = aliased.clone(),
                    _ => break,
                },
                _ => break,
            }
        }
        current
    }

    /// Aggregate named by a descriptor (through aliases and references)
    pub fn type_of_descriptor(&self, ty: &TypeDescriptor, scopes: &[String]) -> Option<&'a Symbol> {
        let expanded = self.expand_alias(ty, scopes);
        let name = expanded.as_named()?;
        self.resolve_type(name, scopes).map(|symbol| self.canonical_type(symbol))
    }

    /// Resolved base types in declaration order
    pub fn bases_of(&self, ty: &'a Symbol) -> Vec<&'a Symbol> {
        let Some(info) = ty.type_info() else {
            return Vec::new();
        };
        let scopes = enclosing_scopes(&ty.qualified_name);
        info.bases
            .iter()
            .filter_map(|base| self.resolve_type(&base.name, &scopes))
            .map(|base| self.canonical_type(base))
            .filter(|base| base.id != ty.id)
            .collect()
    }

    /// Methods named `name` on `ty`, or on the first base (depth-first,
    /// declaration order) that declares any
    pub fn methods_of(&self, ty: &'a Symbol, name: &str) -> Vec<&'a Symbol> {
        let mut visited = HashSet::new();
        self.methods_of_inner(ty, name, &mut visited)
    }

    fn methods_of_inner(
        &self,
        ty: &'a Symbol,
        name: &str,
        visited: &mut HashSet<&'a str>,
    ) -> Vec<&'a Symbol> {
        if !visited.insert(ty.id.as_str()) {
            return Vec::new();
        }
        let own = self.functions(&join_scope(&ty.qualified_name, name));
        if !own.is_empty() {
            return own;
        }
        for base in self.bases_of(ty) {
            let inherited = self.methods_of_inner(base, name, visited);
            if !inherited.is_empty() {
                return inherited;
            }
        }
        Vec::new()
    }

    /// Field or static member named `name` on `ty` or its bases
    pub fn field_of(&self, ty: &'a Symbol, name: &str) -> Option<&'a Symbol> {
        let mut visited = HashSet::new();
        self.field_of_inner(ty, name, &mut visited)
    }

    fn field_of_inner(
        &self,
        ty: &'a Symbol,
        name: &str,
        visited: &mut HashSet<&'a str>,
    ) -> Option<&'a Symbol> {
        if !visited.insert(ty.id.as_str()) {
            return None;
        }
        let own = self
            .named(&join_scope(&ty.qualified_name, name))
            .iter()
            .copied()
            .find(|symbol| symbol.kind == SymbolKind::Variable);
        if own.is_some() {
            return own;
        }
        self.bases_of(ty)
            .into_iter()
            .find_map(|base| self.field_of_inner(base, name, visited))
    }

    /// Global or namespace variable visible from `scopes`
    pub fn variable(&self, name: &str, scopes: &[String]) -> Option<&'a Symbol> {
        scopes.iter().find_map(|scope| {
            self.named(&join_scope(scope, name))
                .iter()
                .copied()
                .find(|symbol| symbol.kind == SymbolKind::Variable)
        })
    }

    /// Pick an overload by argument count.
    ///
    /// One arity match is exact; several matches, or none at all, fall back
    /// to the first lexical candidate as best-effort.
    pub fn select(candidates: &[&'a Symbol], argc: usize) -> Option<Resolution> {
        let matching: Vec<&&'a Symbol> = candidates
            .iter()
            .filter(|symbol| symbol.function_info().is_some_and(|info| info.accepts(argc)))
            .collect();

        let (chosen, confidence) = match matching.as_slice() {
            [only] => (**only, Confidence::Exact),
            [first, ..] => (**first, Confidence::BestEffort),
            [] => (*candidates.first()?, Confidence::BestEffort),
        };

        Some(Resolution {
            id: chosen.id.clone(),
            confidence,
            return_type: return_type_of(chosen),
        })
    }

    /// Like [`SymbolTable::select`], but virtual targets are best-effort
    fn select_method(candidates: &[&'a Symbol], argc: usize) -> Option<Resolution> {
        let mut resolution = Self::select(candidates, argc)?;
        let is_virtual = candidates
            .iter()
            .find(|symbol| symbol.id == resolution.id)
            .and_then(|symbol| symbol.function_info())
            .is_some_and(|info| info.flags.is_virtual || info.flags.is_override);
        if is_virtual {
            resolution.confidence = Confidence::BestEffort;
        }
        Some(resolution)
    }

    /// `A::b(..)`: try `scope::A::b` outward, then `b` as a member of type `A`
    pub fn lookup_qualified(&self, name: &str, scopes: &[String], argc: usize) -> Option<Resolution> {
        let name = strip_call_template_args(name);
        let name = name.trim_start_matches("::");
        for scope in scopes {
            let candidate = join_scope(scope, name);
            let functions = self.functions(&candidate);
            if !functions.is_empty() {
                return Self::select(&functions, argc);
            }

            let (owner, member) = split_scope(&candidate);
            if let Some(owner) = owner {
                if let Some(ty) = self.find_type(owner) {
                    let ty = self.canonical_type(ty);
                    let methods = self.methods_of(ty, member);
                    if !methods.is_empty() {
                        return Self::select(&methods, argc);
                    }
                }
            }

            if let Some(ty) = self.find_type(&candidate) {
                if let Some(resolution) = self.constructor(ty, argc) {
                    return Some(resolution);
                }
            }
        }
        None
    }

    /// `b(..)`: enclosing class (with bases), scope chain, then `using` targets
    pub fn lookup_free(
        &self,
        name: &str,
        scopes: &[String],
        owner: Option<&str>,
        using: &[String],
        argc: usize,
    ) -> Option<Resolution> {
        if let Some(owner) = owner.and_then(|owner| self.find_type(owner)) {
            let owner = self.canonical_type(owner);
            let methods = self.methods_of(owner, name);
            if !methods.is_empty() {
                return Self::select_method(&methods, argc);
            }
        }

        for scope in scopes {
            let candidate = join_scope(scope, name);
            let functions = self.functions(&candidate);
            if !functions.is_empty() {
                return Self::select(&functions, argc);
            }
            if let Some(ty) = self.find_type(&candidate) {
                if let Some(resolution) = self.constructor(ty, argc) {
                    return Some(resolution);
                }
            }
        }

        for target in using {
            let functions = if target == name || target.ends_with(&format!("::{name}")) {
                self.functions(target)
            } else {
                self.functions(&join_scope(target, name))
            };
            if !functions.is_empty() {
                return Self::select(&functions, argc);
            }
        }

        None
    }

    /// `recv.m(..)` against the first receiver type candidate that exists
    pub fn lookup_member(&self, receiver: &[String], name: &str, argc: usize) -> Option<Resolution> {
        let ty = receiver.iter().find_map(|candidate| self.find_type(candidate))?;
        let ty = self.canonical_type(ty);
        let methods = self.methods_of(ty, name);
        Self::select_method(&methods, argc)
    }

    fn constructor(&self, ty: &'a Symbol, argc: usize) -> Option<Resolution> {
        let ty = self.canonical_type(ty);
        let constructors: Vec<&'a Symbol> = self
            .functions(&join_scope(&ty.qualified_name, &ty.name))
            .into_iter()
            .filter(|symbol| {
                symbol
                    .function_info()
                    .is_some_and(|info| info.kind == FunctionKind::Constructor)
            })
            .collect();
        Self::select(&constructors, argc)
    }

    /// Replay a deferred lookup
    pub fn lookup(&self, pending: &PendingLookup) -> Option<Resolution> {
        match pending {
            PendingLookup::Qualified { name, scopes, arity } => {
                self.lookup_qualified(name, scopes, *arity)
            }
            PendingLookup::Free {
                name,
                scopes,
                owner,
                using,
                arity,
            } => self.lookup_free(name, scopes, owner.as_deref(), using, *arity),
            PendingLookup::Member {
                receiver,
                name,
                arity,
            } => self.lookup_member(receiver, name, *arity),
            PendingLookup::Type { name, scopes } => {
                self.resolve_type(name, scopes).map(|ty| Resolution {
                    id: self.canonical_type(ty).id.clone(),
                    confidence: Confidence::Exact,
                    return_type: None,
                })
            }
        }
    }
}

fn return_type_of(symbol: &Symbol) -> Option<TypeDescriptor> {
    match &symbol.detail {
        SymbolDetail::Function(info) => match info.kind {
            FunctionKind::Constructor => {
                let (owner, _) = split_scope(&symbol.qualified_name);
                owner.map(TypeDescriptor::named)
            }
            _ => info.return_type.clone(),
        },
        _ => None,
    }
}

/// `scope::name`, or `name` at global scope
pub fn join_scope(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}::{name}")
    }
}

/// Split at the last top-level `::` (template arguments and parameter
/// lists are not split)
pub fn split_scope(qualified: &str) -> (Option<&str>, &str) {
    let bytes = qualified.as_bytes();
    let mut depth = 0usize;
    let mut split = None;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'<' | b'(' => depth += 1,
            b'>' | b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(idx + 1) == Some(&b':') => {
                split = Some(idx);
                idx += 1;
            }
            _ => {}
        }
        idx += 1;
    }
    match split {
        Some(0) => (None, &qualified[2..]),
        Some(at) => (Some(&qualified[..at]), &qualified[at + 2..]),
        None => (None, qualified),
    }
}

/// `a::b` → `["a::b", "a", ""]`
pub fn scope_chain(scope: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(scope);
    while let Some(scope) = current {
        if scope.is_empty() {
            break;
        }
        chain.push(scope.to_string());
        current = split_scope(scope).0;
    }
    chain.push(String::new());
    chain
}

/// Scope chain of the scope that declares `qualified`
pub fn enclosing_scopes(qualified: &str) -> Vec<String> {
    scope_chain(split_scope(qualified).0.unwrap_or(""))
}

/// `foo<int>` → `foo`, `ns::make<T>` → `ns::make`; operator names untouched
fn strip_call_template_args(name: &str) -> String {
    if name.contains("operator") {
        return name.to_string();
    }
    crate::descriptor::strip_template_args(name)
}
