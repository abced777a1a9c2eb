//! Uniform node-kind view over a language's parse tree.
//!
//! The rest of the engine dispatches on [`SemanticKind`] rather than on raw
//! grammar node names, so a new language only needs an adapter table and an
//! extractor for its declaration syntax.

use crate::error::{ParserError, Result};
use crate::language::Language;
use crate::source::ParsedSource;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Aggregate keyword used to introduce a record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Struct,
    Class,
    Union,
}

impl AggregateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateKind::Struct => "struct",
            AggregateKind::Class => "class",
            AggregateKind::Union => "union",
        }
    }
}

/// Closed set of node kinds the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticKind {
    TranslationUnit,
    Namespace,
    /// `extern "C" { ... }`
    LinkageBlock,
    /// Body of a namespace, linkage block or aggregate
    DeclarationList,
    /// `#if` / `#ifdef` / `#else` blocks that wrap declarations
    ConditionalBlock,
    Include,
    /// `using namespace x;` and `using x::y;`
    Using,
    NamespaceAlias,
    FunctionDefinition,
    Declaration,
    FieldDeclaration,
    TypeDefinition,
    /// `using X = Y;`
    AliasDeclaration,
    TemplateDeclaration,
    TemplateParameter,
    AccessSpecifier,
    FriendDeclaration,
    BaseClause,
    Aggregate(AggregateKind),
    Enum,
    EnumeratorList,
    Enumerator,
    Declarator,
    Parameter,
    Specifier,
    CallExpression,
    /// `static_cast<T>(x)` and friends: call syntax, not a call
    Cast,
    MemberAccess,
    Lambda,
    Assignment,
    /// Constructor member-initializer list
    MemberInitializer,
    Identifier,
    QualifiedIdentifier,
    TemplateFunction,
    This,
    TypeReference,
    CompoundStatement,
    Statement,
    Expression,
    Literal,
    Comment,
    Preprocessor,
}

/// Maps grammar node kinds of one language onto [`SemanticKind`]
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Classify a node, `None` when the kind has no mapping
    fn classify(&self, node: Node<'_>, source: &str) -> Option<SemanticKind>;
}

/// Adapter shared by the C and C++ grammars (tree-sitter-cpp extends tree-sitter-c)
#[derive(Debug, Clone, Copy)]
pub struct CFamilyAdapter {
    language: Language,
}

static C_ADAPTER: CFamilyAdapter = CFamilyAdapter {
    language: Language::C,
};

static CPP_ADAPTER: CFamilyAdapter = CFamilyAdapter {
    language: Language::Cpp,
};

/// Look up the adapter for a language
pub fn adapter_for(language: Language) -> Result<&'static dyn LanguageAdapter> {
    match language {
        Language::C => Ok(&C_ADAPTER),
        Language::Cpp => Ok(&CPP_ADAPTER),
        Language::Unknown => Err(ParserError::unsupported_language(language.as_str())),
    }
}

const CAST_KEYWORDS: [&str; 4] = ["static_cast", "dynamic_cast", "const_cast", "reinterpret_cast"];

impl CFamilyAdapter {
    fn classify_common(kind: &str) -> Option<SemanticKind> {
        let semantic = match kind {
            "translation_unit" => SemanticKind::TranslationUnit,
            "declaration_list" | "field_declaration_list" => SemanticKind::DeclarationList,
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" | "preproc_elifdef" => {
                SemanticKind::ConditionalBlock
            }
            "preproc_include" => SemanticKind::Include,
            "preproc_def" | "preproc_function_def" | "preproc_call" | "preproc_defined"
            | "preproc_params" | "preproc_arg" | "preproc_directive" => SemanticKind::Preprocessor,
            "linkage_specification" => SemanticKind::LinkageBlock,
            "function_definition" => SemanticKind::FunctionDefinition,
            "declaration" => SemanticKind::Declaration,
            "field_declaration" => SemanticKind::FieldDeclaration,
            "type_definition" => SemanticKind::TypeDefinition,
            "struct_specifier" => SemanticKind::Aggregate(AggregateKind::Struct),
            "union_specifier" => SemanticKind::Aggregate(AggregateKind::Union),
            "enum_specifier" => SemanticKind::Enum,
            "enumerator_list" => SemanticKind::EnumeratorList,
            "enumerator" => SemanticKind::Enumerator,
            "init_declarator" | "pointer_declarator" | "array_declarator" | "function_declarator"
            | "parenthesized_declarator" | "abstract_pointer_declarator"
            | "abstract_array_declarator" | "abstract_function_declarator"
            | "abstract_parenthesized_declarator" | "bitfield_clause" => SemanticKind::Declarator,
            "parameter_list" | "parameter_declaration" | "variadic_parameter" => SemanticKind::Parameter,
            "storage_class_specifier" | "type_qualifier" | "attribute_specifier"
            | "attribute_declaration" | "attribute" | "ms_declspec_modifier"
            | "ms_pointer_modifier" | "ms_call_modifier" | "ms_based_modifier"
            | "ms_restrict_modifier" | "ms_unsigned_ptr_modifier" | "ms_signed_ptr_modifier"
            | "gnu_asm_expression" | "macro_type_specifier" => SemanticKind::Specifier,
            "call_expression" => SemanticKind::CallExpression,
            "field_expression" => SemanticKind::MemberAccess,
            "assignment_expression" => SemanticKind::Assignment,
            "identifier" | "field_identifier" | "statement_identifier" => SemanticKind::Identifier,
            "primitive_type" | "type_identifier" | "sized_type_specifier" | "type_descriptor" => {
                SemanticKind::TypeReference
            }
            "compound_statement" => SemanticKind::CompoundStatement,
            "expression_statement" | "if_statement" | "else_clause" | "while_statement"
            | "do_statement" | "for_statement" | "return_statement" | "break_statement"
            | "continue_statement" | "goto_statement" | "labeled_statement" | "switch_statement"
            | "case_statement" | "attributed_statement" | "seh_try_statement"
            | "seh_except_clause" | "seh_finally_clause" | "seh_leave_statement" => {
                SemanticKind::Statement
            }
            "conditional_expression" | "binary_expression" | "unary_expression"
            | "update_expression" | "cast_expression" | "pointer_expression"
            | "sizeof_expression" | "alignof_expression" | "offsetof_expression"
            | "generic_expression" | "subscript_expression" | "compound_literal_expression"
            | "parenthesized_expression" | "comma_expression" | "argument_list"
            | "initializer_list" | "initializer_pair" | "field_designator"
            | "subscript_designator" | "subscript_range_designator" | "extension_expression" => {
                SemanticKind::Expression
            }
            "number_literal" | "string_literal" | "char_literal" | "concatenated_string"
            | "true" | "false" | "null" | "escape_sequence" | "string_content"
            | "system_lib_string" => SemanticKind::Literal,
            "comment" => SemanticKind::Comment,
            _ => return None,
        };
        Some(semantic)
    }

    fn classify_cpp(kind: &str) -> Option<SemanticKind> {
        let semantic = match kind {
            "namespace_definition" => SemanticKind::Namespace,
            "namespace_alias_definition" => SemanticKind::NamespaceAlias,
            "using_declaration" => SemanticKind::Using,
            "alias_declaration" => SemanticKind::AliasDeclaration,
            "template_declaration" | "template_instantiation" => SemanticKind::TemplateDeclaration,
            "template_parameter_list" | "type_parameter_declaration"
            | "optional_type_parameter_declaration" | "variadic_type_parameter_declaration"
            | "template_template_parameter_declaration" => SemanticKind::TemplateParameter,
            "optional_parameter_declaration" | "variadic_parameter_declaration" => {
                SemanticKind::Parameter
            }
            "access_specifier" => SemanticKind::AccessSpecifier,
            "friend_declaration" => SemanticKind::FriendDeclaration,
            "base_class_clause" => SemanticKind::BaseClause,
            "class_specifier" => SemanticKind::Aggregate(AggregateKind::Class),
            "reference_declarator" | "abstract_reference_declarator" | "structured_binding_declarator"
            | "variadic_declarator" | "new_declarator" => SemanticKind::Declarator,
            "virtual" | "virtual_specifier" | "explicit_function_specifier" | "noexcept"
            | "throw_specifier" | "trailing_return_type" | "default_method_clause"
            | "delete_method_clause" | "pure_virtual_clause" | "requires_clause"
            | "placeholder_type_specifier" | "decltype" | "auto" | "dependent_type"
            | "template_argument_list" | "template_type" => SemanticKind::TypeReference,
            "lambda_expression" => SemanticKind::Lambda,
            "lambda_capture_specifier" | "lambda_default_capture" => SemanticKind::Specifier,
            "field_initializer_list" | "field_initializer" => SemanticKind::MemberInitializer,
            "qualified_identifier" | "dependent_name" => SemanticKind::QualifiedIdentifier,
            "template_function" | "template_method" => SemanticKind::TemplateFunction,
            "this" => SemanticKind::This,
            "namespace_identifier" | "operator_name" | "destructor_name" => SemanticKind::Identifier,
            "for_range_loop" | "try_statement" | "catch_clause" | "throw_statement"
            | "co_return_statement" | "co_yield_statement" | "condition_clause"
            | "static_assert_declaration" | "init_statement" => SemanticKind::Statement,
            "new_expression" | "delete_expression" | "co_await_expression" | "fold_expression"
            | "parameter_pack_expansion" | "requires_expression" | "subscript_argument_list"
            | "sizeof_variadic_expression" => SemanticKind::Expression,
            "nullptr" | "raw_string_literal" | "user_defined_literal" | "literal_suffix"
            | "raw_string_content" | "raw_string_delimiter" => SemanticKind::Literal,
            _ => return None,
        };
        Some(semantic)
    }
}

impl LanguageAdapter for CFamilyAdapter {
    fn language(&self) -> Language {
        self.language
    }

    fn classify(&self, node: Node<'_>, source: &str) -> Option<SemanticKind> {
        if node.is_error() || node.is_missing() {
            return None;
        }

        let kind = node.kind();
        let semantic = Self::classify_common(kind).or_else(|| {
            if self.language == Language::Cpp {
                Self::classify_cpp(kind)
            } else {
                None
            }
        })?;

        if semantic == SemanticKind::CallExpression && self.language == Language::Cpp {
            let is_cast = node
                .child_by_field_name("function")
                .filter(|callee| callee.kind() == "template_function")
                .and_then(|callee| callee.child_by_field_name("name"))
                .and_then(|name| name.utf8_text(source.as_bytes()).ok())
                .is_some_and(|name| CAST_KEYWORDS.contains(&name));
            if is_cast {
                return Some(SemanticKind::Cast);
            }
        }

        Some(semantic)
    }
}

/// A parse tree seen through its language adapter
#[derive(Clone, Copy)]
pub struct AdaptedTree<'t> {
    source: &'t ParsedSource,
    adapter: &'static dyn LanguageAdapter,
}

impl<'t> AdaptedTree<'t> {
    pub fn new(source: &'t ParsedSource) -> Result<Self> {
        let adapter = adapter_for(source.language())?;
        Ok(Self { source, adapter })
    }

    pub fn source(&self) -> &'t ParsedSource {
        self.source
    }

    pub fn language(&self) -> Language {
        self.adapter.language()
    }

    pub fn path(&self) -> &'t str {
        self.source.path()
    }

    pub fn root(&self) -> Node<'t> {
        self.source.tree().root_node()
    }

    /// Named children in source order
    pub fn children(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor).collect()
    }

    /// All children, including anonymous tokens such as `virtual` or `,`
    pub fn tokens(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).collect()
    }

    pub fn kind(&self, node: Node<'t>) -> Result<SemanticKind> {
        self.adapter
            .classify(node, self.source.text())
            .ok_or_else(|| ParserError::unsupported_construct(node.kind(), self.line(node)))
    }

    pub fn text(&self, node: Node<'t>) -> &'t str {
        node.utf8_text(self.source.text().as_bytes()).unwrap_or("")
    }

    pub fn field(&self, node: Node<'t>, name: &str) -> Option<Node<'t>> {
        node.child_by_field_name(name)
    }

    /// All children stored under a repeated field (e.g. `declarator`)
    pub fn fields(&self, node: Node<'t>, name: &str) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name(name, &mut cursor).collect()
    }

    /// 1-based line of the node start
    pub fn line(&self, node: Node<'t>) -> usize {
        node.start_position().row + 1
    }

    /// 1-based line of the node end
    pub fn end_line(&self, node: Node<'t>) -> usize {
        node.end_position().row + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_child_kind(language: Language, code: &str) -> Result<SemanticKind> {
        let source = ParsedSource::parse("test", language, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        let root = tree.root();
        let first = tree.children(root)[0];
        tree.kind(first)
    }

    #[test]
    fn test_classifies_declarations() {
        assert_eq!(
            first_child_kind(Language::C, "int f(void) { return 0; }").unwrap(),
            SemanticKind::FunctionDefinition
        );
        assert_eq!(
            first_child_kind(Language::C, "typedef int MyInt;").unwrap(),
            SemanticKind::TypeDefinition
        );
        assert_eq!(
            first_child_kind(Language::Cpp, "namespace n {}").unwrap(),
            SemanticKind::Namespace
        );
        assert_eq!(
            first_child_kind(Language::C, "#include <stdio.h>\n").unwrap(),
            SemanticKind::Include
        );
    }

    #[test]
    fn test_casts_are_not_calls() {
        let code = "void f() { int i = static_cast<int>(2.0); g(i); }";
        let source = ParsedSource::parse("cast.cpp", Language::Cpp, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();

        let mut kinds = Vec::new();
        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                kinds.push(tree.kind(node).unwrap());
            }
            stack.extend(tree.children(node));
        }

        assert!(kinds.contains(&SemanticKind::Cast));
        assert!(kinds.contains(&SemanticKind::CallExpression));
    }

    #[test]
    fn test_cpp_only_kinds_unsupported_in_c_table() {
        let source = ParsedSource::parse("t.cpp", Language::Cpp, "namespace n {}").unwrap();
        let root = source.tree().root_node();
        let namespace = root.named_child(0).unwrap();

        assert!(C_ADAPTER.classify(namespace, source.text()).is_none());
        assert_eq!(
            CPP_ADAPTER.classify(namespace, source.text()),
            Some(SemanticKind::Namespace)
        );
    }

    #[test]
    fn test_error_nodes_are_unsupported() {
        let source = ParsedSource::parse("broken.c", Language::C, "int f( {").unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        assert!(tree.root().has_error());

        let mut stack = vec![tree.root()];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                let err = tree.kind(node).unwrap_err();
                assert!(err.is_skippable());
            }
            stack.extend(tree.tokens(node));
        }
    }
}
