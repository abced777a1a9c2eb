//! Type/inheritance linking: `Inherits` edges per base specifier and
//! `References` edges from declarations to the types they mention.

use crate::descriptor::{is_builtin_type, lookup_name, TypeDescriptor};
use crate::file_graph::{EdgeTarget, PartialEdge, PendingLookup};
use crate::symbols::{enclosing_scopes, SymbolTable};
use crate::types::{ReferenceRole, Relation, Symbol, SymbolDetail, SymbolId, TypeKind, VariableKind};
use std::collections::HashSet;

pub(crate) struct Linker<'a> {
    table: SymbolTable<'a>,
    symbols: &'a [Symbol],
}

impl<'a> Linker<'a> {
    pub fn new(symbols: &'a [Symbol]) -> Self {
        Self {
            table: SymbolTable::new(symbols.iter()),
            symbols,
        }
    }

    /// One `Inherits` edge per base, in declaration order
    pub fn inheritance(&self) -> Vec<PartialEdge> {
        let mut edges = Vec::new();
        for symbol in self.symbols {
            let Some(info) = symbol.type_info() else {
                continue;
            };
            let scopes = enclosing_scopes(&symbol.qualified_name);
            for base in &info.bases {
                let target = match self.table.resolve_type(&base.name, &scopes) {
                    Some(found) if self.table.canonical_type(found).id != symbol.id => {
                        EdgeTarget::Resolved(self.table.canonical_type(found).id.clone())
                    }
                    _ => EdgeTarget::Pending(PendingLookup::Type {
                        name: lookup_name(&base.name),
                        scopes: scopes.clone(),
                    }),
                };
                edges.push(PartialEdge {
                    source: symbol.id.clone(),
                    relation: Relation::Inherits {
                        access: base.access,
                        is_virtual: base.is_virtual,
                    },
                    target,
                });
            }
        }
        edges
    }

    /// `References` edges, at most one per (declaration, type name)
    pub fn references(&self) -> Vec<PartialEdge> {
        let mut edges = Vec::new();
        let mut seen: HashSet<(SymbolId, String)> = HashSet::new();

        for symbol in self.symbols {
            let scopes = enclosing_scopes(&symbol.qualified_name);
            let generic = self.template_names(symbol);

            for (role, ty) in mentioned_types(symbol) {
                for name in ty.referenced_names() {
                    if is_builtin_type(&name) || generic.contains(&name) {
                        continue;
                    }
                    if !seen.insert((symbol.id.clone(), name.clone())) {
                        continue;
                    }
                    let target = match self.table.resolve_type(&name, &scopes) {
                        Some(found) if found.id == symbol.id => continue,
                        Some(found) => EdgeTarget::Resolved(found.id.clone()),
                        None => EdgeTarget::Pending(PendingLookup::Type {
                            name: lookup_name(&name),
                            scopes: scopes.clone(),
                        }),
                    };
                    edges.push(PartialEdge {
                        source: symbol.id.clone(),
                        relation: Relation::References { role },
                        target,
                    });
                }
            }
        }
        edges
    }

    /// Template parameter names visible to a declaration (its own and its
    /// owning type's)
    fn template_names(&self, symbol: &Symbol) -> HashSet<String> {
        let own = match &symbol.detail {
            SymbolDetail::Function(info) => info.template_params.as_slice(),
            SymbolDetail::Type(info) => info.template_params.as_slice(),
            _ => &[],
        };
        let inherited = symbol
            .parent
            .as_ref()
            .and_then(|parent| self.table.get(parent))
            .and_then(Symbol::type_info)
            .map(|info| info.template_params.as_slice())
            .unwrap_or(&[]);

        own.iter()
            .chain(inherited)
            .filter_map(|param| template_param_name(param))
            .collect()
    }
}

/// Types a declaration mentions, with the role each plays
fn mentioned_types(symbol: &Symbol) -> Vec<(ReferenceRole, &TypeDescriptor)> {
    match &symbol.detail {
        SymbolDetail::Function(info) => {
            let mut mentioned: Vec<(ReferenceRole, &TypeDescriptor)> = info
                .params
                .iter()
                .map(|param| (ReferenceRole::Parameter, &param.ty))
                .collect();
            if let Some(ret) = &info.return_type {
                mentioned.push((ReferenceRole::Return, ret));
            }
            mentioned
        }
        SymbolDetail::Variable(info) => {
            let role = match info.kind {
                VariableKind::Field | VariableKind::StaticMember => ReferenceRole::Field,
                VariableKind::Global => ReferenceRole::Variable,
            };
            vec![(role, &info.ty)]
        }
        SymbolDetail::Type(info) if info.kind == TypeKind::Typedef => info
            .aliased
            .iter()
            .map(|aliased| (ReferenceRole::Alias, aliased))
            .collect(),
        _ => Vec::new(),
    }
}

/// `typename T` → `T`, `class... Ts` → `Ts`, `int N = 4` → `N`
fn template_param_name(param: &str) -> Option<String> {
    let declared = param.split('=').next()?.trim();
    let name = declared
        .rsplit(|ch: char| ch.is_whitespace() || ch == '.')
        .next()?
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}
