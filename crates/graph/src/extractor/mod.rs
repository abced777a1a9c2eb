//! Declaration extraction.
//!
//! Walks the adapted tree scope by scope and emits one [`Symbol`] per
//! distinct declaration. Function bodies and file-level initializers are
//! recorded for the call-site resolver instead of being walked here.

mod aggregate;
mod declarator;

pub(crate) use declarator::{base_type, parse_parameters, walk_declarator};

use crate::descriptor::{normalize_spelling, TypeDescriptor};
use crate::file_graph::{EdgeTarget, PartialEdge};
use crate::symbols::{join_scope, scope_chain, split_scope};
use crate::types::{
    Access, Diagnostic, DiagnosticKind, FunctionFlags, FunctionInfo, FunctionKind, ImportInfo,
    ImportKind, Location, Parameter, Relation, StorageClass, Symbol, SymbolDetail, SymbolId,
    SymbolKind, TypeKind, VariableInfo, VariableKind,
};
use codegraph_parser::{AdaptedTree, Node, SemanticKind};
use declarator::DeclaratorShape;
use std::collections::HashMap;

/// A function body awaiting call-site resolution
pub(crate) struct FunctionBody<'t> {
    pub id: SymbolId,
    /// `qualified(signature)`, used to name lambdas defined inside
    pub label: String,
    pub internal: bool,
    /// Lookup scopes, innermost first
    pub scopes: Vec<String>,
    /// Owning type for methods
    pub owner: Option<String>,
    pub params: Vec<Parameter>,
    pub body: Node<'t>,
    pub member_initializers: Option<Node<'t>>,
}

/// Expression evaluated outside any function (global or default member
/// initializer)
pub(crate) struct InitializerRoot<'t> {
    pub node: Node<'t>,
    pub scopes: Vec<String>,
    pub owner: Option<String>,
}

/// Everything the extractor learned about one file
pub(crate) struct Extraction<'t> {
    pub symbols: Vec<Symbol>,
    pub edges: Vec<PartialEdge>,
    pub bodies: Vec<FunctionBody<'t>>,
    pub initializers: Vec<InitializerRoot<'t>>,
    /// `using namespace` targets and `using` declarations, in source order
    pub using: Vec<String>,
    /// `namespace fs = std::filesystem;` as (qualified alias, target)
    pub namespace_aliases: Vec<(String, String)>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Members are collected into the owning type while its body is walked
#[derive(Clone)]
struct AggregateScope {
    access: Access,
}

#[derive(Clone)]
struct Scope {
    qualified: String,
    id: SymbolId,
    /// Anonymous namespace: everything inside has internal linkage
    internal: bool,
    aggregate: Option<AggregateScope>,
    /// Parameters of an enclosing `template<...>` for the next declaration
    template_params: Vec<String>,
}

impl Scope {
    fn lookup_scopes(&self) -> Vec<String> {
        scope_chain(&self.qualified)
    }

    fn owner(&self) -> Option<String> {
        self.aggregate.as_ref().map(|_| self.qualified.clone())
    }

    fn member_access(&self) -> Option<Access> {
        self.aggregate.as_ref().map(|aggregate| aggregate.access)
    }

    fn without_template(&self) -> Scope {
        Scope {
            template_params: Vec::new(),
            ..self.clone()
        }
    }
}

/// Specifier keywords of one declaration
#[derive(Default)]
struct Specifiers {
    storage: Option<StorageClass>,
    is_inline: bool,
    is_virtual: bool,
}

pub(crate) struct Extractor<'a, 't> {
    tree: &'a AdaptedTree<'t>,
    path: String,
    symbols: Vec<Symbol>,
    index: HashMap<SymbolId, usize>,
    edges: Vec<PartialEdge>,
    bodies: Vec<FunctionBody<'t>>,
    initializers: Vec<InitializerRoot<'t>>,
    using: Vec<String>,
    namespace_aliases: Vec<(String, String)>,
    diagnostics: Vec<Diagnostic>,
    anonymous_counters: HashMap<String, usize>,
}

impl<'a, 't> Extractor<'a, 't> {
    pub fn new(tree: &'a AdaptedTree<'t>) -> Self {
        Self {
            tree,
            path: tree.path().to_string(),
            symbols: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            bodies: Vec::new(),
            initializers: Vec::new(),
            using: Vec::new(),
            namespace_aliases: Vec::new(),
            diagnostics: Vec::new(),
            anonymous_counters: HashMap::new(),
        }
    }

    pub fn extract(mut self) -> Extraction<'t> {
        let root = self.tree.root();
        let file_id = SymbolId::file(&self.path);
        let file = Symbol {
            id: file_id.clone(),
            name: file_name(&self.path).to_string(),
            qualified_name: self.path.clone(),
            kind: SymbolKind::File,
            parent: None,
            location: self.location(root),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::File {
                language: self.tree.language(),
            },
        };
        self.emit(file);

        let scope = Scope {
            qualified: String::new(),
            id: file_id,
            internal: false,
            aggregate: None,
            template_params: Vec::new(),
        };
        self.visit_scope(root, &scope);

        Extraction {
            symbols: self.symbols,
            edges: self.edges,
            bodies: self.bodies,
            initializers: self.initializers,
            using: self.using,
            namespace_aliases: self.namespace_aliases,
            diagnostics: self.diagnostics,
        }
    }

    fn location(&self, node: Node<'_>) -> Location {
        Location {
            file: self.path.clone(),
            line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
        }
    }

    /// Insert or unify by id; returns whether the id was new
    fn emit(&mut self, symbol: Symbol) -> bool {
        match self.index.get(&symbol.id) {
            Some(&idx) => {
                self.symbols[idx].merge(&symbol);
                false
            }
            None => {
                self.index.insert(symbol.id.clone(), self.symbols.len());
                self.symbols.push(symbol);
                true
            }
        }
    }

    fn symbol_mut(&mut self, id: &SymbolId) -> Option<&mut Symbol> {
        let idx = *self.index.get(id)?;
        self.symbols.get_mut(idx)
    }

    fn make_id(&self, tag: &str, key: &str, internal: bool) -> SymbolId {
        if internal {
            SymbolId::internal(tag, key, &self.path)
        } else {
            SymbolId::new(tag, key)
        }
    }

    fn unsupported(&mut self, node: Node<'_>, err: &codegraph_parser::ParserError) {
        log::debug!("{}: {err}", self.path);
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnsupportedConstruct,
            err.to_string(),
            Some(self.tree.line(node)),
        ));
    }

    fn visit_scope(&mut self, node: Node<'t>, scope: &Scope) {
        let mut current = scope.clone();
        for child in self.tree.children(node) {
            if child.kind() == "access_specifier" {
                let access = Access::from_keyword(self.tree.text(child));
                if let (Some(aggregate), Some(access)) = (current.aggregate.as_mut(), access) {
                    aggregate.access = access;
                }
                continue;
            }
            self.visit_item(child, &current);
        }
    }

    fn visit_item(&mut self, node: Node<'t>, scope: &Scope) {
        let kind = match self.tree.kind(node) {
            Ok(kind) => kind,
            Err(err) => {
                self.unsupported(node, &err);
                return;
            }
        };

        match kind {
            SemanticKind::DeclarationList | SemanticKind::ConditionalBlock => {
                self.visit_scope(node, scope)
            }
            SemanticKind::LinkageBlock => {
                if let Some(body) = self.tree.field(node, "body") {
                    if body.kind() == "declaration_list" {
                        self.visit_scope(body, scope);
                    } else {
                        self.visit_item(body, scope);
                    }
                }
            }
            SemanticKind::Namespace => self.visit_namespace(node, scope),
            SemanticKind::Include => self.extract_include(node, scope),
            SemanticKind::Using => self.extract_using(node, scope),
            SemanticKind::NamespaceAlias => self.extract_namespace_alias(node, scope),
            SemanticKind::TemplateDeclaration => self.visit_template(node, scope),
            SemanticKind::FunctionDefinition => self.extract_function_definition(node, scope),
            SemanticKind::Declaration | SemanticKind::FieldDeclaration => {
                self.extract_declaration(node, scope)
            }
            SemanticKind::TypeDefinition => self.extract_typedef(node, scope),
            SemanticKind::AliasDeclaration => self.extract_alias(node, scope),
            SemanticKind::Aggregate(_) | SemanticKind::Enum => {
                // `struct A { ... };` or a forward declaration `struct A;`
                self.type_spelling(node, scope, None, true);
            }
            _ => {}
        }
    }

    fn visit_namespace(&mut self, node: Node<'t>, scope: &Scope) {
        let Some(body) = self.tree.field(node, "body") else {
            return;
        };

        let mut inner = scope.without_template();
        match self.tree.field(node, "name") {
            Some(name) => {
                let spelled = normalize_spelling(self.tree.text(name));
                for segment in spelled.split("::").filter(|segment| !segment.is_empty()) {
                    let qualified = join_scope(&inner.qualified, segment);
                    let id = self.make_id("namespace", &qualified, inner.internal);
                    self.emit(Symbol {
                        id: id.clone(),
                        name: segment.to_string(),
                        qualified_name: qualified.clone(),
                        kind: SymbolKind::Namespace,
                        parent: Some(inner.id.clone()),
                        location: self.location(node),
                        provenance: vec![self.path.clone()],
                        detail: SymbolDetail::Namespace,
                    });
                    inner.qualified = qualified;
                    inner.id = id;
                }
            }
            None => {
                let name = "<anonymous namespace>";
                let id = SymbolId::internal("namespace", &join_scope(&scope.qualified, name), &self.path);
                self.emit(Symbol {
                    id: id.clone(),
                    name: name.to_string(),
                    qualified_name: join_scope(&scope.qualified, name),
                    kind: SymbolKind::Namespace,
                    parent: Some(scope.id.clone()),
                    location: self.location(node),
                    provenance: vec![self.path.clone()],
                    detail: SymbolDetail::Namespace,
                });
                inner.id = id;
                inner.internal = true;
            }
        }

        self.visit_scope(body, &inner);
    }

    fn visit_template(&mut self, node: Node<'t>, scope: &Scope) {
        let params: Vec<String> = self
            .tree
            .field(node, "parameters")
            .map(|list| {
                self.tree
                    .children(list)
                    .into_iter()
                    .filter(|param| param.kind() != "comment")
                    .map(|param| normalize_spelling(self.tree.text(param)))
                    .collect()
            })
            .unwrap_or_default();

        let templated = Scope {
            template_params: params,
            ..scope.clone()
        };
        for child in self.tree.children(node) {
            if matches!(child.kind(), "template_parameter_list" | "requires_clause" | "comment") {
                continue;
            }
            self.visit_item(child, &templated);
        }
    }

    fn import_edge(&mut self, symbol: Symbol) {
        let id = symbol.id.clone();
        if self.emit(symbol) {
            self.edges.push(PartialEdge {
                source: SymbolId::file(&self.path),
                relation: Relation::Imports,
                target: EdgeTarget::Resolved(id),
            });
        }
    }

    fn extract_include(&mut self, node: Node<'t>, scope: &Scope) {
        let Some(path) = self.tree.field(node, "path") else {
            return;
        };
        let text = self.tree.text(path).trim();
        let (kind, target) = match path.kind() {
            "system_lib_string" => (
                ImportKind::SystemInclude,
                text.trim_start_matches('<').trim_end_matches('>').to_string(),
            ),
            "string_literal" => (ImportKind::Include, text.trim_matches('"').to_string()),
            _ => {
                // `#include MACRO`: nothing to resolve without the preprocessor
                log::debug!("{}: computed include `{text}` skipped", self.path);
                return;
            }
        };

        let symbol = self.import_symbol(node, scope, kind, target);
        self.import_edge(symbol);
    }

    fn extract_using(&mut self, node: Node<'t>, scope: &Scope) {
        if scope.aggregate.is_some() {
            // member using-declarations only change visibility
            return;
        }
        let is_namespace = self
            .tree
            .tokens(node)
            .iter()
            .any(|token| self.tree.text(*token) == "namespace");
        let Some(target) = self
            .tree
            .children(node)
            .into_iter()
            .find(|child| matches!(child.kind(), "identifier" | "qualified_identifier" | "namespace_identifier"))
        else {
            return;
        };
        let target = normalize_spelling(self.tree.text(target))
            .trim_start_matches("::")
            .to_string();

        if !scope.qualified.is_empty() {
            self.using.push(join_scope(&scope.qualified, &target));
        }
        self.using.push(target.clone());

        let kind = if is_namespace {
            ImportKind::UsingNamespace
        } else {
            ImportKind::UsingDeclaration
        };
        let symbol = self.import_symbol(node, scope, kind, target);
        self.import_edge(symbol);
    }

    fn extract_namespace_alias(&mut self, node: Node<'t>, scope: &Scope) {
        let Some(name) = self.tree.field(node, "name") else {
            return;
        };
        let Some(target) = self
            .tree
            .children(node)
            .into_iter()
            .filter(|child| child.id() != name.id() && child.kind() != "comment")
            .last()
        else {
            return;
        };
        let alias = join_scope(&scope.qualified, self.tree.text(name));
        let target = normalize_spelling(self.tree.text(target))
            .trim_start_matches("::")
            .to_string();
        log::debug!("{}: namespace alias {alias} = {target}", self.path);
        self.namespace_aliases.push((alias, target));
    }

    fn import_symbol(&self, node: Node<'_>, scope: &Scope, kind: ImportKind, target: String) -> Symbol {
        let key = match kind {
            ImportKind::SystemInclude => format!("<{target}>"),
            ImportKind::Include => format!("\"{target}\""),
            ImportKind::UsingNamespace => format!("namespace {target}"),
            ImportKind::UsingDeclaration => target.clone(),
        };
        Symbol {
            id: SymbolId::internal("import", &key, &self.path),
            name: target.clone(),
            qualified_name: key,
            kind: SymbolKind::Import,
            parent: Some(scope.id.clone()),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Import(ImportInfo {
                kind,
                target,
                resolved: false,
                resolved_path: None,
            }),
        }
    }

    fn specifiers(&self, node: Node<'_>) -> Specifiers {
        let mut specifiers = Specifiers::default();
        for child in self.tree.tokens(node) {
            let text = self.tree.text(child);
            match child.kind() {
                "storage_class_specifier" => match text {
                    "inline" | "__inline" | "__inline__" | "__forceinline" => specifiers.is_inline = true,
                    other => {
                        if let Some(storage) = StorageClass::from_keyword(other) {
                            specifiers.storage = Some(storage);
                        }
                    }
                },
                "virtual" => specifiers.is_virtual = true,
                _ if text == "virtual" => specifiers.is_virtual = true,
                _ if text == "inline" => specifiers.is_inline = true,
                _ => {}
            }
        }
        specifiers
    }

    fn extract_function_definition(&mut self, node: Node<'t>, scope: &Scope) {
        let base = self.declared_base(node, scope);
        let shape = walk_declarator(
            self.tree,
            base.clone().unwrap_or_else(|| TypeDescriptor::named("void")),
            self.tree.field(node, "declarator"),
            &[],
        );
        if !shape.declares_function() {
            self.unsupported(
                node,
                &codegraph_parser::ParserError::unsupported_construct("function_definition", self.tree.line(node)),
            );
            return;
        }

        let specifiers = self.specifiers(node);
        let member_initializers = self
            .tree
            .children(node)
            .into_iter()
            .find(|child| child.kind() == "field_initializer_list");

        let Some(declared) = self.emit_function(node, scope, &shape, &specifiers, base.is_some(), true)
        else {
            return;
        };

        if let Some(body) = self.tree.field(node, "body") {
            self.bodies.push(FunctionBody {
                id: declared.id,
                label: declared.label,
                internal: declared.internal,
                scopes: declared.scopes,
                owner: declared.owner,
                params: declared.params,
                body,
                member_initializers,
            });
        }
    }

    /// Base type of a declaration; `None` for constructors and destructors
    fn declared_base(&mut self, node: Node<'t>, scope: &Scope) -> Option<TypeDescriptor> {
        let type_node = self.tree.field(node, "type")?;
        let name = self.type_spelling(type_node, scope, None, false);
        Some(TypeDescriptor::Named {
            name,
            qualifiers: declarator::specifier_qualifiers(self.tree, node),
        })
    }

    fn extract_declaration(&mut self, node: Node<'t>, scope: &Scope) {
        let declarators = self.tree.fields(node, "declarator");

        if declarators.is_empty() {
            if let Some(type_node) = self.tree.field(node, "type") {
                let anonymous_member = scope.aggregate.is_some()
                    && matches!(type_node.kind(), "struct_specifier" | "union_specifier" | "class_specifier")
                    && self.tree.field(type_node, "name").is_none();
                if anonymous_member {
                    self.flatten_anonymous_member(type_node, scope);
                } else {
                    self.type_spelling(type_node, scope, None, true);
                }
            }
            return;
        }

        let base = self.declared_base(node, scope);
        let specifiers = self.specifiers(node);
        let bit_width = self
            .tree
            .children(node)
            .into_iter()
            .find(|child| child.kind() == "bitfield_clause")
            .and_then(|clause| self.tree.children(clause).into_iter().next())
            .map(|width| normalize_spelling(self.tree.text(width)));
        let default_values = self.tree.fields(node, "default_value");
        let is_pure = self
            .tree
            .children(node)
            .iter()
            .any(|child| child.kind() == "pure_virtual_clause")
            || default_values.iter().any(|value| self.tree.text(*value) == "0");

        for declarator in declarators {
            let (inner, value) = if declarator.kind() == "init_declarator" {
                (self.tree.field(declarator, "declarator"), self.tree.field(declarator, "value"))
            } else {
                (Some(declarator), None)
            };

            let shape = walk_declarator(
                self.tree,
                base.clone().unwrap_or_else(|| TypeDescriptor::named("void")),
                inner,
                &[],
            );

            if shape.declares_function() {
                if let Some(declared) =
                    self.emit_function(node, scope, &shape, &specifiers, base.is_some(), false)
                {
                    if is_pure {
                        if let Some(SymbolDetail::Function(info)) =
                            self.symbol_mut(&declared.id).map(|symbol| &mut symbol.detail)
                        {
                            info.flags.is_pure = true;
                        }
                    }
                }
                continue;
            }

            let initializer = value.or_else(|| {
                // field defaults are positional when several declarators share one node
                if default_values.len() == 1 {
                    default_values.first().copied()
                } else {
                    None
                }
            });
            self.emit_variable(node, scope, &shape, &specifiers, bit_width.clone(), initializer);
        }
    }

    fn emit_variable(
        &mut self,
        node: Node<'t>,
        scope: &Scope,
        shape: &DeclaratorShape<'t>,
        specifiers: &Specifiers,
        bit_width: Option<String>,
        initializer: Option<Node<'t>>,
    ) {
        let Some(name_node) = shape.name else {
            return;
        };
        let name = normalize_spelling(self.tree.text(name_node));
        let storage = specifiers.storage.unwrap_or(StorageClass::Auto);
        let kind = match (&scope.aggregate, storage) {
            (Some(_), StorageClass::Static) => VariableKind::StaticMember,
            (Some(_), _) => VariableKind::Field,
            (None, _) => VariableKind::Global,
        };

        let mut kind = kind;
        let mut parent = scope.id.clone();
        let mut qualified = join_scope(&scope.qualified, name.trim_start_matches("::"));
        if let (Some(qualifier), member) = split_scope(name.trim_start_matches("::")) {
            // out-of-line static member definition: `int A::count = 0;`
            if let Some((type_qualified, type_id)) = self.local_type(qualifier, &scope.lookup_scopes()) {
                qualified = join_scope(&type_qualified, member);
                kind = VariableKind::StaticMember;
                parent = type_id;
            }
        }
        let simple = split_scope(&qualified).1.to_string();
        let internal = scope.internal || (kind == VariableKind::Global && storage == StorageClass::Static);
        let id = self.make_id("var", &qualified, internal);

        let info = VariableInfo {
            kind,
            ty: shape.ty.clone(),
            storage,
            has_initializer: initializer.is_some(),
            bit_width,
            flexible_array: kind == VariableKind::Field && shape.ty.is_unsized_array(),
            access: scope.member_access(),
            is_definition: match kind {
                VariableKind::Field => true,
                VariableKind::StaticMember => scope.aggregate.is_none() || initializer.is_some(),
                VariableKind::Global => storage != StorageClass::Extern,
            },
        };

        self.emit(Symbol {
            id,
            name: simple.clone(),
            qualified_name: qualified,
            kind: SymbolKind::Variable,
            parent: Some(parent),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Variable(info),
        });

        if kind != VariableKind::Global && scope.aggregate.is_some() {
            self.add_member(&scope.id, simple);
        }

        if let Some(value) = initializer {
            self.initializers.push(InitializerRoot {
                node: value,
                scopes: scope.lookup_scopes(),
                owner: scope.owner(),
            });
        }
    }

    fn add_member(&mut self, owner: &SymbolId, member: String) {
        if let Some(Symbol {
            detail: SymbolDetail::Type(info),
            ..
        }) = self.symbol_mut(owner)
        {
            if !info.members.contains(&member) {
                info.members.push(member);
            }
        }
    }

    /// Emit the function declared by `shape`
    fn emit_function(
        &mut self,
        node: Node<'t>,
        scope: &Scope,
        shape: &DeclaratorShape<'t>,
        specifiers: &Specifiers,
        has_return_type: bool,
        is_definition: bool,
    ) -> Option<DeclaredFunction> {
        let function = shape.function?;
        let name_node = shape.name?;
        let written = normalize_spelling(self.tree.text(name_node));
        let global = written.starts_with("::");
        let written = written.trim_start_matches("::").to_string();

        let (qualifier, name) = match split_scope(&written) {
            (Some(qualifier), name) => (Some(qualifier.to_string()), name.to_string()),
            (None, name) => (None, name.to_string()),
        };
        let enclosing = if global { String::new() } else { scope.qualified.clone() };

        // Owning type: the aggregate being walked, or the qualifier of an
        // out-of-line definition when that type is visible in this file
        let mut owner: Option<String> = scope.owner();
        let mut owner_id: Option<SymbolId> = None;
        let mut owner_hint: Option<String> = None;
        let mut qualified = join_scope(&enclosing, &written);
        if scope.aggregate.is_some() {
            owner_id = Some(scope.id.clone());
        } else if let Some(qualifier) = &qualifier {
            match self.local_type(qualifier, &scope_chain(&enclosing)) {
                Some((type_qualified, type_id)) => {
                    qualified = join_scope(&type_qualified, &name);
                    owner = Some(type_qualified);
                    owner_id = Some(type_id);
                }
                None if self.local_namespace(&join_scope(&enclosing, qualifier)) => {}
                None => owner_hint = Some(join_scope(&enclosing, qualifier)),
            }
        }

        let owner_name = owner
            .as_deref()
            .or(owner_hint.as_deref())
            .map(|owner| split_scope(owner).1.to_string());
        let kind = if name.starts_with('~') && owner_name.is_some() {
            FunctionKind::Destructor
        } else if owner_name.as_deref() == Some(strip_args(&name)) {
            FunctionKind::Constructor
        } else if name.starts_with("operator") {
            FunctionKind::Operator
        } else if owner_id.is_some() {
            FunctionKind::Method
        } else {
            FunctionKind::Free
        };

        let (params, variadic) = match self.tree.field(function, "parameters") {
            Some(list) => parse_parameters(self.tree, list),
            None => (Vec::new(), false),
        };
        let return_type = match (&shape.ty, has_return_type) {
            (TypeDescriptor::Function { ret, .. }, true) => Some(ret.as_ref().clone()),
            _ => None,
        };

        let mut flags = FunctionFlags {
            is_static: specifiers.storage == Some(StorageClass::Static),
            is_inline: specifiers.is_inline || (is_definition && scope.aggregate.is_some()),
            is_virtual: specifiers.is_virtual,
            ..FunctionFlags::default()
        };
        for child in self.tree.tokens(function) {
            match child.kind() {
                "type_qualifier" if self.tree.text(child) == "const" => flags.is_const = true,
                "virtual_specifier" => {
                    flags.is_override |= self.tree.text(child) == "override";
                    flags.is_virtual = true;
                }
                _ => {}
            }
        }

        let owner_hint_for_lookup = owner_hint.clone();
        let info = FunctionInfo {
            kind,
            params: params.clone(),
            return_type,
            is_variadic: variadic,
            flags,
            template_params: scope.template_params.clone(),
            access: scope.member_access(),
            owner_hint,
            is_definition,
        };

        let signature = info.signature();
        let internal = scope.internal
            || (scope.aggregate.is_none() && owner_id.is_none() && specifiers.storage == Some(StorageClass::Static));
        let key = format!("{qualified}{signature}");
        let id = self.make_id("fn", &key, internal);
        let parent = owner_id.unwrap_or_else(|| scope.id.clone());

        self.emit(Symbol {
            id: id.clone(),
            name: name.clone(),
            qualified_name: qualified.clone(),
            kind: SymbolKind::Function,
            parent: Some(parent),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Function(info),
        });

        let lookup_owner = owner.clone().or(owner_hint_for_lookup);
        let scopes = match &lookup_owner {
            Some(owner) => scope_chain(owner),
            None => scope_chain(split_scope(&qualified).0.unwrap_or("")),
        };

        Some(DeclaredFunction {
            id,
            label: key,
            internal,
            scopes,
            owner: lookup_owner,
            params,
        })
    }

    /// Type declared earlier in this file, searched outward from `scopes`
    fn local_type(&self, name: &str, scopes: &[String]) -> Option<(String, SymbolId)> {
        let name = crate::descriptor::lookup_name(name);
        scopes.iter().find_map(|scope| {
            let qualified = join_scope(scope, &name);
            self.symbols
                .iter()
                .find(|symbol| {
                    symbol.kind == SymbolKind::Type
                        && symbol.qualified_name == qualified
                        && symbol
                            .type_info()
                            .is_some_and(|info| info.kind != TypeKind::Typedef)
                })
                .map(|symbol| (symbol.qualified_name.clone(), symbol.id.clone()))
        })
    }

    fn local_namespace(&self, qualified: &str) -> bool {
        self.symbols
            .iter()
            .any(|symbol| symbol.kind == SymbolKind::Namespace && symbol.qualified_name == qualified)
    }

    fn next_anonymous(&mut self, scope: &Scope, what: &str) -> String {
        let counter = self
            .anonymous_counters
            .entry(format!("{}#{what}", scope.qualified))
            .or_insert(0);
        *counter += 1;
        format!("<anonymous {what} #{counter}>")
    }
}

/// Identity of an emitted function, handed to body bookkeeping
struct DeclaredFunction {
    id: SymbolId,
    label: String,
    internal: bool,
    scopes: Vec<String>,
    owner: Option<String>,
    params: Vec<Parameter>,
}

/// `Box<T>` → `Box` (for constructor detection on template specializations)
fn strip_args(name: &str) -> &str {
    name.split('<').next().unwrap_or(name)
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_parser::{Language, ParsedSource};
    use pretty_assertions::assert_eq;

    fn ids(path: &str, language: Language, code: &str) -> Vec<String> {
        let source = ParsedSource::parse(path, language, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        Extractor::new(&tree)
            .extract()
            .symbols
            .iter()
            .map(|symbol| symbol.id.to_string())
            .collect()
    }

    fn with_extraction<R>(path: &str, language: Language, code: &str, check: impl FnOnce(&Extraction<'_>) -> R) -> R {
        let source = ParsedSource::parse(path, language, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        let extraction = Extractor::new(&tree).extract();
        check(&extraction)
    }

    fn function<'e>(extraction: &'e Extraction<'_>, id: &str) -> &'e FunctionInfo {
        extraction
            .symbols
            .iter()
            .find(|symbol| symbol.id.as_str() == id)
            .and_then(Symbol::function_info)
            .unwrap_or_else(|| panic!("missing function {id}"))
    }

    #[test]
    fn test_c_functions_and_linkage() {
        let found = ids(
            "util.c",
            Language::C,
            "static int helper(int x) { return x; }\nint add(int a, int b);\nint add(int a, int b) { return helper(a) + b; }\nint counter = 0;",
        );
        assert_eq!(
            found,
            vec![
                "file:util.c",
                "fn:helper(int)@util.c",
                "fn:add(int,int)",
                "var:counter",
            ]
        );
    }

    #[test]
    fn test_declaration_and_definition_unify() {
        with_extraction(
            "m.c",
            Language::C,
            "int add(int a, int b);\nint add(int a, int b) { return a + b; }",
            |extraction| {
                let info = function(extraction, "fn:add(int,int)");
                assert!(info.is_definition);
                assert_eq!(extraction.bodies.len(), 1);
                let add = extraction.symbols.iter().find(|s| s.name == "add").unwrap();
                assert_eq!(add.location.line, 2);
            },
        );
    }

    #[test]
    fn test_namespaces_and_methods() {
        let found = ids(
            "calls.cpp",
            Language::Cpp,
            "namespace MyNamespace { void nsFunction() {} }\nclass MyClass {\npublic:\n  void memberFunction() const;\n  static int count;\n};\nvoid MyClass::memberFunction() const {}\nint MyClass::count = 0;",
        );
        assert_eq!(
            found,
            vec![
                "file:calls.cpp",
                "namespace:MyNamespace",
                "fn:MyNamespace::nsFunction()",
                "class:MyClass",
                "fn:MyClass::memberFunction() const",
                "var:MyClass::count",
            ]
        );
    }

    #[test]
    fn test_method_flags_and_access() {
        with_extraction(
            "shape.cpp",
            Language::Cpp,
            "class Shape {\npublic:\n  virtual double area() const = 0;\nprotected:\n  void describe(int level = 0);\n};\nclass Circle : public Shape {\n  double radius;\npublic:\n  Circle(double r) : radius(r) {}\n  double area() const override { return radius; }\n};",
            |extraction| {
                let area = function(extraction, "fn:Shape::area() const");
                assert!(area.flags.is_pure);
                assert!(area.flags.is_virtual);
                assert_eq!(area.access, Some(Access::Public));

                let describe = function(extraction, "fn:Shape::describe(int)");
                assert_eq!(describe.access, Some(Access::Protected));
                assert_eq!(describe.min_arity(), 0);

                let ctor = function(extraction, "fn:Circle::Circle(double)");
                assert_eq!(ctor.kind, FunctionKind::Constructor);
                assert!(ctor.return_type.is_none());

                let overriding = function(extraction, "fn:Circle::area() const");
                assert!(overriding.flags.is_override);

                let radius = extraction
                    .symbols
                    .iter()
                    .find(|symbol| symbol.id.as_str() == "var:Circle::radius")
                    .and_then(Symbol::variable_info)
                    .unwrap();
                assert_eq!(radius.access, Some(Access::Private));
                assert!(extraction.bodies.iter().any(|body| body.member_initializers.is_some()));
            },
        );
    }

    #[test]
    fn test_out_of_line_owner_not_visible() {
        with_extraction(
            "user.cpp",
            Language::Cpp,
            "void User::printInfo() { log(); }",
            |extraction| {
                let info = function(extraction, "fn:User::printInfo()");
                assert_eq!(info.owner_hint.as_deref(), Some("User"));
                assert_eq!(info.kind, FunctionKind::Free);
                assert_eq!(extraction.bodies[0].owner.as_deref(), Some("User"));
            },
        );
    }

    #[test]
    fn test_includes_and_using() {
        with_extraction(
            "main.cpp",
            Language::Cpp,
            "#include <vector>\n#include \"util/log.h\"\nusing namespace std;\nusing std::cout;",
            |extraction| {
                let imports: Vec<&ImportInfo> = extraction
                    .symbols
                    .iter()
                    .filter_map(Symbol::import_info)
                    .collect();
                assert_eq!(imports.len(), 4);
                assert_eq!(imports[0].kind, ImportKind::SystemInclude);
                assert_eq!(imports[0].target, "vector");
                assert_eq!(imports[1].kind, ImportKind::Include);
                assert_eq!(imports[1].target, "util/log.h");
                assert_eq!(imports[2].kind, ImportKind::UsingNamespace);
                assert_eq!(imports[3].kind, ImportKind::UsingDeclaration);
                assert_eq!(imports[3].target, "std::cout");
                assert_eq!(extraction.edges.len(), 4);
                assert_eq!(extraction.using, vec!["std".to_string(), "std::cout".to_string()]);
            },
        );
    }

    #[test]
    fn test_anonymous_namespace_is_internal() {
        let found = ids("a.cpp", Language::Cpp, "namespace { int hidden() { return 1; } }");
        assert_eq!(
            found,
            vec![
                "file:a.cpp",
                "namespace:<anonymous namespace>@a.cpp",
                "fn:hidden()@a.cpp",
            ]
        );
    }

    #[test]
    fn test_error_nodes_become_diagnostics() {
        with_extraction("bad.c", Language::C, "int ok(void) { return 0; }\n@@@ ;", |extraction| {
            assert!(extraction
                .diagnostics
                .iter()
                .any(|diag| diag.kind == DiagnosticKind::UnsupportedConstruct));
            assert!(extraction.symbols.iter().any(|s| s.id.as_str() == "fn:ok()"));
        });
    }
}
