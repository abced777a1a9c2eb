//! Declarator walking: from `int (*handlers[5])(char *msg)` to a
//! [`TypeDescriptor`] plus the declared name.
//!
//! Declarators nest inside out relative to the type they denote, so the walk
//! starts from the base type and wraps it once per declarator level while
//! descending toward the name.

use crate::descriptor::{normalize_spelling, ArraySize, Qualifiers, TypeDescriptor};
use crate::types::Parameter;
use codegraph_parser::{AdaptedTree, Node};

/// Result of walking one declarator
pub(crate) struct DeclaratorShape<'t> {
    pub name: Option<Node<'t>>,
    pub ty: TypeDescriptor,
    /// The function declarator when the declared entity is itself a function
    pub function: Option<Node<'t>>,
}

impl DeclaratorShape<'_> {
    pub fn declares_function(&self) -> bool {
        self.function.is_some()
    }
}

/// Qualifiers written among a declaration's specifiers
pub(crate) fn specifier_qualifiers(tree: &AdaptedTree<'_>, node: Node<'_>) -> Qualifiers {
    let mut qualifiers = Qualifiers::NONE;
    for child in tree.children(node) {
        if child.kind() == "type_qualifier" {
            qualifiers.add(tree.text(child));
        }
    }
    qualifiers
}

/// Base type of a declaration or parameter: its `type` field plus qualifiers
pub(crate) fn base_type(tree: &AdaptedTree<'_>, node: Node<'_>) -> Option<TypeDescriptor> {
    let type_node = tree.field(node, "type")?;
    Some(TypeDescriptor::Named {
        name: normalize_spelling(tree.text(type_node)),
        qualifiers: specifier_qualifiers(tree, node),
    })
}

/// Walk `declarator` outward-in, wrapping `base` at each level.
///
/// `runtime_names` are identifiers whose value is only known at run time
/// (earlier parameters); array bounds mentioning them are variable-length.
pub(crate) fn walk_declarator<'t>(
    tree: &AdaptedTree<'t>,
    base: TypeDescriptor,
    declarator: Option<Node<'t>>,
    runtime_names: &[String],
) -> DeclaratorShape<'t> {
    let mut ty = base;
    let mut name = None;
    let mut last_function = None;
    let mut current = declarator;

    while let Some(node) = current {
        match node.kind() {
            "pointer_declarator" | "abstract_pointer_declarator" => {
                let mut qualifiers = Qualifiers::NONE;
                for child in tree.children(node) {
                    if child.kind() == "type_qualifier" {
                        qualifiers.add(tree.text(child));
                    }
                }
                ty = TypeDescriptor::Pointer {
                    pointee: Box::new(ty),
                    qualifiers,
                };
                last_function = None;
                current = tree.field(node, "declarator");
            }
            "reference_declarator" | "abstract_reference_declarator" => {
                let rvalue = tree.tokens(node).first().is_some_and(|token| tree.text(*token) == "&&");
                ty = TypeDescriptor::Reference {
                    referent: Box::new(ty),
                    rvalue,
                };
                last_function = None;
                current = inner_declarator(tree, node);
            }
            "array_declarator" | "abstract_array_declarator" => {
                let size = array_size(tree, node, runtime_names);
                ty = TypeDescriptor::Array {
                    element: Box::new(ty),
                    size,
                };
                last_function = None;
                current = tree.field(node, "declarator");
            }
            "function_declarator" | "abstract_function_declarator" => {
                let (params, variadic) = match tree.field(node, "parameters") {
                    Some(list) => parse_parameters(tree, list),
                    None => (Vec::new(), false),
                };
                let ret = trailing_return_type(tree, node).unwrap_or(ty);
                ty = TypeDescriptor::Function {
                    ret: Box::new(ret),
                    params: params.into_iter().map(|param| param.ty).collect(),
                    variadic,
                };
                last_function = Some(node);
                current = tree.field(node, "declarator");
            }
            "parenthesized_declarator" | "abstract_parenthesized_declarator" | "attributed_declarator" => {
                current = inner_declarator(tree, node);
            }
            "init_declarator" => {
                current = tree.field(node, "declarator");
            }
            "variadic_declarator" => {
                ty = TypeDescriptor::PackExpansion {
                    pattern: Box::new(ty),
                };
                name = tree.children(node).into_iter().next();
                current = None;
            }
            _ => {
                name = Some(node);
                current = None;
            }
        }
    }

    let function = match ty {
        TypeDescriptor::Function { .. } => last_function,
        _ => None,
    };

    DeclaratorShape { name, ty, function }
}

/// First named child that continues the declarator chain
fn inner_declarator<'t>(tree: &AdaptedTree<'t>, node: Node<'t>) -> Option<Node<'t>> {
    tree.children(node).into_iter().find(|child| {
        !matches!(
            child.kind(),
            "attribute_specifier" | "attribute_declaration" | "ms_call_modifier" | "comment"
        )
    })
}

fn array_size(tree: &AdaptedTree<'_>, node: Node<'_>, runtime_names: &[String]) -> ArraySize {
    let Some(size) = tree.field(node, "size") else {
        return ArraySize::Unsized;
    };
    let text = normalize_spelling(tree.text(size));
    if text == "*" || mentions_any(tree, size, runtime_names) {
        ArraySize::Variable
    } else {
        ArraySize::Fixed(text)
    }
}

fn mentions_any(tree: &AdaptedTree<'_>, node: Node<'_>, names: &[String]) -> bool {
    if names.is_empty() {
        return false;
    }
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "identifier" && names.iter().any(|name| name == tree.text(current)) {
            return true;
        }
        stack.extend(tree.children(current));
    }
    false
}

fn trailing_return_type(tree: &AdaptedTree<'_>, node: Node<'_>) -> Option<TypeDescriptor> {
    let trailing = tree
        .children(node)
        .into_iter()
        .find(|child| child.kind() == "trailing_return_type")?;
    let descriptor = tree
        .children(trailing)
        .into_iter()
        .find(|child| child.kind() == "type_descriptor")?;
    let base = base_type(tree, descriptor)?;
    Some(walk_declarator(tree, base, tree.field(descriptor, "declarator"), &[]).ty)
}

/// Parameters of a `parameter_list`, plus whether it ends in `...`.
/// A lone unnamed `void` parameter means an empty list.
pub(crate) fn parse_parameters(tree: &AdaptedTree<'_>, list: Node<'_>) -> (Vec<Parameter>, bool) {
    let mut params = Vec::new();
    let mut variadic = false;
    let mut runtime_names: Vec<String> = Vec::new();

    for child in tree.children(list) {
        match child.kind() {
            "parameter_declaration" | "optional_parameter_declaration" | "variadic_parameter_declaration" => {
                let Some(base) = base_type(tree, child) else {
                    continue;
                };
                let shape = walk_declarator(tree, base, tree.field(child, "declarator"), &runtime_names);
                let name = shape.name.map(|node| tree.text(node).to_string());
                if let Some(name) = &name {
                    runtime_names.push(name.clone());
                }
                params.push(Parameter {
                    name,
                    ty: adjust_parameter_type(shape.ty),
                    has_default: child.kind() == "optional_parameter_declaration",
                });
            }
            "variadic_parameter" => variadic = true,
            _ => {}
        }
    }

    let is_void_list = matches!(
        params.as_slice(),
        [Parameter { name: None, ty: TypeDescriptor::Named { name, qualifiers }, .. }]
            if name == "void" && qualifiers.is_empty()
    );
    if is_void_list {
        params.clear();
    }

    (params, variadic)
}

/// Parameters of function type decay to function pointers (`int g(int)`
/// as a parameter is `int(*)(int)`). Top-level qualifiers are not part of
/// the function type: `f(const int)` and `f(int)` declare the same function.
fn adjust_parameter_type(ty: TypeDescriptor) -> TypeDescriptor {
    match ty {
        TypeDescriptor::Function { .. } => TypeDescriptor::pointer_to(ty),
        TypeDescriptor::Named { name, .. } => TypeDescriptor::Named {
            name,
            qualifiers: Qualifiers::NONE,
        },
        TypeDescriptor::Pointer { pointee, .. } => TypeDescriptor::Pointer {
            pointee,
            qualifiers: Qualifiers::NONE,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_parser::{Language, ParsedSource};

    /// Render the parameter list of the first function in `code`
    fn signature_of(language: Language, code: &str) -> (Vec<String>, bool) {
        let source = ParsedSource::parse("t", language, code).unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        let definition = tree.children(tree.root())[0];
        let base = base_type(&tree, definition).unwrap();
        let shape = walk_declarator(&tree, base, tree.field(definition, "declarator"), &[]);
        let function = shape.function.expect("function declarator");
        let (params, variadic) = parse_parameters(&tree, tree.field(function, "parameters").unwrap());
        (params.iter().map(|param| param.ty.render()).collect(), variadic)
    }

    #[test]
    fn test_pointer_and_qualifier_params() {
        let (params, _) = signature_of(
            Language::C,
            "int* func56(int** ptr, const char* const* strings, volatile int* volatile* vptr) {}",
        );
        assert_eq!(
            params,
            vec!["int**", "const char* const*", "volatile int* volatile*"]
        );
    }

    #[test]
    fn test_top_level_qualifiers_are_dropped() {
        let (params, _) = signature_of(
            Language::C,
            "int f(const int a, char* const p, const char* s, volatile long v) {}",
        );
        assert_eq!(params, vec!["int", "char*", "const char*", "long"]);
    }

    #[test]
    fn test_array_params() {
        let (params, _) = signature_of(Language::C, "float func35(double matrix[][10]) {}");
        assert_eq!(params, vec!["double[][10]"]);

        let (params, _) = signature_of(Language::C, "int func109(int rows, int cols, int matrix[rows][cols]) {}");
        assert_eq!(params, vec!["int", "int", "int[*][*]"]);
    }

    #[test]
    fn test_function_pointer_params() {
        let (params, _) = signature_of(Language::C, "int func50(int x, int (*compare)(int, int)) {}");
        assert_eq!(params, vec!["int", "int(*)(int,int)"]);

        let (params, _) = signature_of(Language::C, "void func52(void (*handlers[5])(char*)) {}");
        assert_eq!(params, vec!["void(*[5])(char*)"]);
    }

    #[test]
    fn test_void_and_variadic() {
        let (params, variadic) = signature_of(Language::C, "int func15(void) {}");
        assert!(params.is_empty());
        assert!(!variadic);

        let (params, variadic) = signature_of(Language::C, "void func55(char* format, ...) {}");
        assert_eq!(params, vec!["char*"]);
        assert!(variadic);
    }

    #[test]
    fn test_pointer_return_is_still_a_function() {
        let source = ParsedSource::parse("t.c", Language::C, "char* func18() {}").unwrap();
        let tree = AdaptedTree::new(&source).unwrap();
        let definition = tree.children(tree.root())[0];
        let base = base_type(&tree, definition).unwrap();
        let shape = walk_declarator(&tree, base, tree.field(definition, "declarator"), &[]);

        assert!(shape.declares_function());
        assert_eq!(tree.text(shape.name.unwrap()), "func18");
        match shape.ty {
            TypeDescriptor::Function { ret, .. } => assert_eq!(ret.render(), "char*"),
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_params() {
        let (params, _) = signature_of(
            Language::Cpp,
            "void f(const std::string& name, std::vector<int>&& items) {}",
        );
        assert_eq!(params, vec!["const std::string&", "std::vector<int>&&"]);
    }
}
