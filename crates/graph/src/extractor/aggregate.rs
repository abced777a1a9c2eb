use super::declarator::{specifier_qualifiers, walk_declarator};
use super::{AggregateScope, Extractor, Scope};
use crate::descriptor::{normalize_spelling, TypeDescriptor};
use crate::symbols::join_scope;
use crate::types::{Access, BaseSpecifier, Enumerator, Symbol, SymbolDetail, SymbolKind, TypeInfo, TypeKind};
use codegraph_parser::{Node, SemanticKind};

impl<'a, 't> Extractor<'a, 't> {
    /// Spelling of a type specifier. Aggregate and enum specifiers with a
    /// body are extracted on the way and spelled by their qualified name;
    /// `alias` names an anonymous aggregate introduced by a typedef.
    pub(super) fn type_spelling(
        &mut self,
        node: Node<'t>,
        scope: &Scope,
        alias: Option<&str>,
        standalone: bool,
    ) -> String {
        match self.tree.kind(node) {
            Ok(SemanticKind::Aggregate(kind)) => {
                self.extract_aggregate(node, scope, kind.into(), alias, standalone)
            }
            Ok(SemanticKind::Enum) => self.extract_enum(node, scope, alias, standalone),
            _ => normalize_spelling(self.tree.text(node)),
        }
    }

    /// Name, qualified name and internal flag of a type being defined
    fn type_identity(
        &mut self,
        node: Node<'t>,
        scope: &Scope,
        alias: Option<&str>,
        what: &str,
    ) -> (String, String, bool) {
        match self.tree.field(node, "name") {
            Some(name) => {
                let name = normalize_spelling(self.tree.text(name));
                let qualified = join_scope(&scope.qualified, name.trim_start_matches("::"));
                (name, qualified, scope.internal)
            }
            None => match alias {
                Some(alias) => (alias.to_string(), join_scope(&scope.qualified, alias), scope.internal),
                None => {
                    let name = self.next_anonymous(scope, what);
                    let qualified = join_scope(&scope.qualified, &name);
                    // unnamed types have no linkage; outside any named scope
                    // their synthetic name is only unique per file
                    let internal = scope.internal || scope.qualified.is_empty();
                    (name, qualified, internal)
                }
            },
        }
    }

    fn extract_aggregate(
        &mut self,
        node: Node<'t>,
        scope: &Scope,
        kind: TypeKind,
        alias: Option<&str>,
        standalone: bool,
    ) -> String {
        let Some(body) = self.tree.field(node, "body") else {
            if standalone {
                self.forward_declaration(node, scope, kind);
            }
            return normalize_spelling(self.tree.text(node));
        };

        let (name, qualified, internal) = self.type_identity(node, scope, alias, kind.tag());
        let id = self.make_id(kind.tag(), &qualified, internal);

        let mut info = TypeInfo::new(kind);
        info.is_definition = true;
        info.template_params = scope.template_params.clone();
        if let Some(clause) = self
            .tree
            .children(node)
            .into_iter()
            .find(|child| child.kind() == "base_class_clause")
        {
            info.bases = self.base_specifiers(clause, kind);
        }

        self.emit(Symbol {
            id: id.clone(),
            name,
            qualified_name: qualified.clone(),
            kind: SymbolKind::Type,
            parent: Some(scope.id.clone()),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Type(info),
        });

        let inner = Scope {
            qualified: qualified.clone(),
            id,
            internal,
            aggregate: Some(AggregateScope {
                access: Access::default_for(kind),
            }),
            template_params: Vec::new(),
        };
        self.visit_scope(body, &inner);

        qualified
    }

    /// `struct A;` / `class B;`
    fn forward_declaration(&mut self, node: Node<'t>, scope: &Scope, kind: TypeKind) {
        let Some(name) = self.tree.field(node, "name") else {
            return;
        };
        let name = normalize_spelling(self.tree.text(name));
        let qualified = join_scope(&scope.qualified, name.trim_start_matches("::"));
        let mut info = TypeInfo::new(kind);
        info.template_params = scope.template_params.clone();
        self.emit(Symbol {
            id: self.make_id(kind.tag(), &qualified, scope.internal),
            name,
            qualified_name: qualified,
            kind: SymbolKind::Type,
            parent: Some(scope.id.clone()),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Type(info),
        });
    }

    /// Bases in declaration order. The access keyword and `virtual` apply to
    /// the base that follows them; missing access follows the aggregate
    /// keyword.
    fn base_specifiers(&self, clause: Node<'t>, kind: TypeKind) -> Vec<BaseSpecifier> {
        let mut bases = Vec::new();
        let mut access = None;
        let mut is_virtual = false;

        for token in self.tree.tokens(clause) {
            let text = self.tree.text(token);
            match token.kind() {
                ":" | "," | "comment" | "..." => {}
                "access_specifier" => access = Access::from_keyword(text),
                "virtual" => is_virtual = true,
                _ if text == "virtual" => is_virtual = true,
                _ if Access::from_keyword(text).is_some() => access = Access::from_keyword(text),
                _ if token.is_named() => {
                    bases.push(BaseSpecifier {
                        name: normalize_spelling(text),
                        access: access.take().unwrap_or_else(|| Access::default_for(kind)),
                        is_virtual,
                    });
                    is_virtual = false;
                }
                _ => {}
            }
        }

        bases
    }

    fn extract_enum(&mut self, node: Node<'t>, scope: &Scope, alias: Option<&str>, standalone: bool) -> String {
        let is_scoped = self
            .tree
            .tokens(node)
            .iter()
            .any(|token| matches!(self.tree.text(*token), "class" | "struct"));
        let underlying = self
            .tree
            .field(node, "underlying_type")
            .or_else(|| self.tree.field(node, "base"))
            .map(|ty| normalize_spelling(self.tree.text(ty)));

        let Some(body) = self.tree.field(node, "body") else {
            // opaque declaration: `enum class Color : int;`
            if standalone {
                if let Some(name) = self.tree.field(node, "name") {
                    let name = normalize_spelling(self.tree.text(name));
                    let qualified = join_scope(&scope.qualified, &name);
                    let mut info = TypeInfo::new(TypeKind::Enum);
                    info.is_scoped = is_scoped;
                    info.underlying = underlying;
                    self.emit(Symbol {
                        id: self.make_id("enum", &qualified, scope.internal),
                        name,
                        qualified_name: qualified,
                        kind: SymbolKind::Type,
                        parent: Some(scope.id.clone()),
                        location: self.location(node),
                        provenance: vec![self.path.clone()],
                        detail: SymbolDetail::Type(info),
                    });
                }
            }
            return normalize_spelling(self.tree.text(node));
        };

        let (name, qualified, internal) = self.type_identity(node, scope, alias, "enum");

        let mut info = TypeInfo::new(TypeKind::Enum);
        info.is_definition = true;
        info.is_scoped = is_scoped;
        info.underlying = underlying;
        info.enumerators = self
            .tree
            .children(body)
            .into_iter()
            .filter(|child| child.kind() == "enumerator")
            .filter_map(|enumerator| {
                let name = self.tree.field(enumerator, "name")?;
                Some(Enumerator {
                    name: self.tree.text(name).to_string(),
                    value: self
                        .tree
                        .field(enumerator, "value")
                        .map(|value| normalize_spelling(self.tree.text(value))),
                })
            })
            .collect();

        self.emit(Symbol {
            id: self.make_id("enum", &qualified, internal),
            name,
            qualified_name: qualified.clone(),
            kind: SymbolKind::Type,
            parent: Some(scope.id.clone()),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Type(info),
        });

        qualified
    }

    /// `struct { int a; union { ... }; };`: members of an unnamed member
    /// aggregate belong to the enclosing type
    pub(super) fn flatten_anonymous_member(&mut self, node: Node<'t>, scope: &Scope) {
        if let Some(body) = self.tree.field(node, "body") {
            self.visit_scope(body, scope);
        }
    }

    pub(super) fn extract_typedef(&mut self, node: Node<'t>, scope: &Scope) {
        let Some(type_node) = self.tree.field(node, "type") else {
            return;
        };
        let declarators = self.tree.fields(node, "declarator");

        // `typedef struct { ... } Student;` names the struct `Student`
        let alias = declarators
            .first()
            .filter(|declarator| declarator.kind() == "type_identifier")
            .map(|declarator| self.tree.text(*declarator).to_string());
        let spelling = self.type_spelling(type_node, scope, alias.as_deref(), false);
        let base = TypeDescriptor::Named {
            name: spelling,
            qualifiers: specifier_qualifiers(self.tree, node),
        };

        for declarator in declarators {
            let shape = walk_declarator(self.tree, base.clone(), Some(declarator), &[]);
            let Some(name) = shape.name else {
                continue;
            };
            let name = normalize_spelling(self.tree.text(name));
            self.emit_typedef(node, scope, name, shape.ty);
        }
    }

    /// `using Name = type;`
    pub(super) fn extract_alias(&mut self, node: Node<'t>, scope: &Scope) {
        let (Some(name), Some(descriptor)) = (self.tree.field(node, "name"), self.tree.field(node, "type"))
        else {
            return;
        };
        let name = normalize_spelling(self.tree.text(name));
        let Some(type_node) = self.tree.field(descriptor, "type") else {
            return;
        };
        let spelling = self.type_spelling(type_node, scope, None, false);
        let base = TypeDescriptor::Named {
            name: spelling,
            qualifiers: specifier_qualifiers(self.tree, descriptor),
        };
        let shape = walk_declarator(self.tree, base, self.tree.field(descriptor, "declarator"), &[]);
        self.emit_typedef(node, scope, name, shape.ty);
    }

    fn emit_typedef(&mut self, node: Node<'t>, scope: &Scope, name: String, aliased: TypeDescriptor) {
        let qualified = join_scope(&scope.qualified, &name);
        let mut info = TypeInfo::new(TypeKind::Typedef);
        info.is_definition = true;
        info.aliased = Some(aliased);
        info.template_params = scope.template_params.clone();
        self.emit(Symbol {
            id: self.make_id("typedef", &qualified, scope.internal),
            name,
            qualified_name: qualified,
            kind: SymbolKind::Type,
            parent: Some(scope.id.clone()),
            location: self.location(node),
            provenance: vec![self.path.clone()],
            detail: SymbolDetail::Type(info),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::Extractor;
    use crate::descriptor::TypeDescriptor;
    use crate::types::{Access, Symbol, SymbolKind, TypeKind};
    use codegraph_parser::{AdaptedTree, Language, ParsedSource};

    fn extract(path: &str, language: Language, code: &str) -> Vec<Symbol> {
        let source = ParsedSource::parse(path, language, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        Extractor::new(&tree).extract().symbols
    }

    fn find<'s>(symbols: &'s [Symbol], id: &str) -> &'s Symbol {
        symbols
            .iter()
            .find(|symbol| symbol.id.as_str() == id)
            .unwrap_or_else(|| panic!("missing {id}"))
    }

    #[test]
    fn test_typedef_names_anonymous_struct() {
        let symbols = extract(
            "s.c",
            Language::C,
            "typedef struct { int id; float score; } Student;",
        );

        let student = find(&symbols, "struct:Student");
        assert_eq!(student.type_info().unwrap().members, vec!["id", "score"]);
        let alias = find(&symbols, "typedef:Student");
        assert_eq!(
            alias.type_info().unwrap().aliased,
            Some(TypeDescriptor::named("Student"))
        );
        assert!(symbols.iter().any(|symbol| symbol.id.as_str() == "var:Student::id"));
    }

    #[test]
    fn test_anonymous_members_are_flattened() {
        let symbols = extract(
            "config.c",
            Language::C,
            "struct Config { int version; union { int debug_level; char* log_file; }; };",
        );

        let config = find(&symbols, "struct:Config");
        assert_eq!(
            config.type_info().unwrap().members,
            vec!["version", "debug_level", "log_file"]
        );
        let field = find(&symbols, "var:Config::log_file");
        assert_eq!(field.parent.as_ref().map(|id| id.as_str()), Some("struct:Config"));
    }

    #[test]
    fn test_anonymous_type_with_declarator() {
        let symbols = extract("p.c", Language::C, "struct { int x; int y; } point;");

        let anonymous = find(&symbols, "struct:<anonymous struct #1>@p.c");
        assert_eq!(anonymous.type_info().unwrap().members, vec!["x", "y"]);
        let point = find(&symbols, "var:point");
        assert_eq!(
            point.variable_info().unwrap().ty,
            TypeDescriptor::named("<anonymous struct #1>")
        );
    }

    #[test]
    fn test_bitfields_and_flexible_array() {
        let symbols = extract(
            "b.c",
            Language::C,
            "struct Permission { unsigned int read : 1; };\nstruct Packet { int header; char data[]; };",
        );

        let read = find(&symbols, "var:Permission::read").variable_info().unwrap();
        assert_eq!(read.bit_width.as_deref(), Some("1"));
        let data = find(&symbols, "var:Packet::data").variable_info().unwrap();
        assert!(data.flexible_array);
        let header = find(&symbols, "var:Packet::header").variable_info().unwrap();
        assert!(!header.flexible_array);
    }

    #[test]
    fn test_base_clause_access() {
        let symbols = extract(
            "duck.cpp",
            Language::Cpp,
            "class Animal {};\nclass Flyable {};\nclass Duck : public Animal, Flyable {};\nstruct Derived2 : virtual public Animal {};",
        );

        let duck = find(&symbols, "class:Duck").type_info().unwrap();
        assert_eq!(duck.bases.len(), 2);
        assert_eq!(duck.bases[0].name, "Animal");
        assert_eq!(duck.bases[0].access, Access::Public);
        assert_eq!(duck.bases[1].name, "Flyable");
        assert_eq!(duck.bases[1].access, Access::Private);

        let derived = find(&symbols, "struct:Derived2").type_info().unwrap();
        assert!(derived.bases[0].is_virtual);
        assert_eq!(derived.bases[0].access, Access::Public);
    }

    #[test]
    fn test_enums() {
        let symbols = extract(
            "e.cpp",
            Language::Cpp,
            "enum Priority {LOW = 1, HIGH = 10};\nenum class Color : short { Red, Green };",
        );

        let priority = find(&symbols, "enum:Priority").type_info().unwrap();
        assert_eq!(priority.enumerators.len(), 2);
        assert_eq!(priority.enumerators[1].value.as_deref(), Some("10"));
        assert!(!priority.is_scoped);

        let color = find(&symbols, "enum:Color").type_info().unwrap();
        assert!(color.is_scoped);
        assert_eq!(color.enumerators[0].name, "Red");
    }

    #[test]
    fn test_forward_declaration_then_definition() {
        let symbols = extract(
            "f.cpp",
            Language::Cpp,
            "class Widget;\nclass Widget { int size; };",
        );

        let widgets: Vec<_> = symbols
            .iter()
            .filter(|symbol| symbol.kind == SymbolKind::Type)
            .collect();
        assert_eq!(widgets.len(), 1);
        let info = widgets[0].type_info().unwrap();
        assert_eq!(info.kind, TypeKind::Class);
        assert!(info.is_definition);
        assert_eq!(info.members, vec!["size"]);
    }
}
