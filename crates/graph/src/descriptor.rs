//! Structural type descriptors and their canonical spelling.
//!
//! A descriptor keeps the full declarator shape (pointer depth, array
//! dimensions, qualifiers, function-pointer signatures) so that parameter
//! lists normalize to the same text wherever a function is declared.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// `const` / `volatile` / `restrict`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qualifiers {
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_const: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_volatile: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_restrict: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Qualifiers {
    pub const NONE: Qualifiers = Qualifiers {
        is_const: false,
        is_volatile: false,
        is_restrict: false,
    };

    /// Record one qualifier keyword; unknown keywords are ignored
    pub fn add(&mut self, keyword: &str) {
        match keyword {
            "const" => self.is_const = true,
            "volatile" => self.is_volatile = true,
            "restrict" | "__restrict" | "__restrict__" => self.is_restrict = true,
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_volatile || self.is_restrict)
    }

    fn render(&self) -> String {
        let mut words = Vec::new();
        if self.is_const {
            words.push("const");
        }
        if self.is_volatile {
            words.push("volatile");
        }
        if self.is_restrict {
            words.push("restrict");
        }
        words.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArraySize {
    Fixed(String),
    Unsized,
    /// Variable-length array bound by a runtime value
    Variable,
}

/// Declared type shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Qualifiers::is_empty")]
        qualifiers: Qualifiers,
    },
    Pointer {
        pointee: Box<TypeDescriptor>,
        #[serde(default, skip_serializing_if = "Qualifiers::is_empty")]
        qualifiers: Qualifiers,
    },
    Reference {
        referent: Box<TypeDescriptor>,
        rvalue: bool,
    },
    Array {
        element: Box<TypeDescriptor>,
        size: ArraySize,
    },
    Function {
        ret: Box<TypeDescriptor>,
        params: Vec<TypeDescriptor>,
        variadic: bool,
    },
    PackExpansion {
        pattern: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            qualifiers: Qualifiers::NONE,
        }
    }

    pub fn pointer_to(pointee: TypeDescriptor) -> Self {
        TypeDescriptor::Pointer {
            pointee: Box::new(pointee),
            qualifiers: Qualifiers::NONE,
        }
    }

    /// Canonical C abstract-declarator spelling, e.g. `int(*)(int,int)`
    pub fn render(&self) -> String {
        self.render_around(String::new())
    }

    fn render_around(&self, inner: String) -> String {
        match self {
            TypeDescriptor::Named { name, qualifiers } => {
                let mut text = if qualifiers.is_empty() {
                    name.clone()
                } else {
                    format!("{} {}", qualifiers.render(), name)
                };
                text.push_str(&inner);
                text
            }
            TypeDescriptor::Pointer { pointee, qualifiers } => {
                let mut declarator = String::from("*");
                if !qualifiers.is_empty() {
                    declarator.push(' ');
                    declarator.push_str(&qualifiers.render());
                }
                declarator.push_str(&inner);
                pointee.render_around(wrap_for(pointee, declarator))
            }
            TypeDescriptor::Reference { referent, rvalue } => {
                let declarator = format!("{}{}", if *rvalue { "&&" } else { "&" }, inner);
                referent.render_around(wrap_for(referent, declarator))
            }
            TypeDescriptor::Array { element, size } => {
                let bound = match size {
                    ArraySize::Fixed(text) => text.as_str(),
                    ArraySize::Unsized => "",
                    ArraySize::Variable => "*",
                };
                element.render_around(format!("{inner}[{bound}]"))
            }
            TypeDescriptor::Function { ret, params, variadic } => {
                let mut list: Vec<String> = params.iter().map(TypeDescriptor::render).collect();
                if *variadic {
                    list.push("...".to_string());
                }
                ret.render_around(format!("{inner}({})", list.join(",")))
            }
            TypeDescriptor::PackExpansion { pattern } => format!("{}...{}", pattern.render(), inner),
        }
    }

    /// Strip references, then one level of pointer or array
    pub fn dereferenced(&self) -> Option<&TypeDescriptor> {
        match self.without_reference() {
            TypeDescriptor::Pointer { pointee, .. } => Some(pointee),
            TypeDescriptor::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn without_reference(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Reference { referent, .. } => referent.without_reference(),
            other => other,
        }
    }

    /// Named leaf when the type is a plain (possibly reference) name
    pub fn as_named(&self) -> Option<&str> {
        match self.without_reference() {
            TypeDescriptor::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// `R(*)(..)`, `R(&)(..)` or a bare function type
    pub fn is_function_pointer(&self) -> bool {
        match self.without_reference() {
            TypeDescriptor::Function { .. } => true,
            TypeDescriptor::Pointer { pointee, .. } => {
                matches!(pointee.as_ref(), TypeDescriptor::Function { .. })
            }
            _ => false,
        }
    }

    pub fn is_unsized_array(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Array {
                size: ArraySize::Unsized,
                ..
            }
        )
    }

    /// `auto` / `decltype(auto)` placeholders
    pub fn is_deduced(&self) -> bool {
        matches!(self.as_named(), Some(name) if name == "auto" || name.starts_with("decltype"))
    }

    /// Every user-facing type name mentioned by the descriptor, template
    /// arguments included, with elaborated keywords removed
    pub fn referenced_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            TypeDescriptor::Named { name, .. } => collect_spelled_names(name, out),
            TypeDescriptor::Pointer { pointee, .. } => pointee.collect_names(out),
            TypeDescriptor::Reference { referent, .. } => referent.collect_names(out),
            TypeDescriptor::Array { element, .. } => element.collect_names(out),
            TypeDescriptor::Function { ret, params, .. } => {
                ret.collect_names(out);
                for param in params {
                    param.collect_names(out);
                }
            }
            TypeDescriptor::PackExpansion { pattern } => pattern.collect_names(out),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn wrap_for(target: &TypeDescriptor, declarator: String) -> String {
    match target {
        TypeDescriptor::Array { .. } | TypeDescriptor::Function { .. } => format!("({declarator})"),
        _ => declarator,
    }
}

fn collect_spelled_names(spelling: &str, out: &mut Vec<String>) {
    let outer = lookup_name(spelling);
    if !outer.is_empty() && !is_builtin_type(&outer) && !out.contains(&outer) {
        out.push(outer);
    }

    if let (Some(open), Some(close)) = (spelling.find('<'), spelling.rfind('>')) {
        let is_template = spelling[..open].chars().last().is_some_and(is_identifier_char);
        if is_template && open < close {
            for argument in split_template_args(&spelling[open + 1..close]) {
                collect_spelled_names(argument.trim_end_matches(&['*', '&', ' '][..]), out);
            }
        }
    }
}

/// Split `a,b<c,d>,e` at top-level commas
pub fn split_template_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in args.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(args[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    let last = args[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

/// Collapse whitespace and drop spaces around punctuation, so
/// `std::map< std::string , int >` becomes `std::map<std::string,int>`
pub fn normalize_spelling(text: &str) -> String {
    let collapsed: Vec<&str> = text.split_whitespace().collect();
    let joined = collapsed.join(" ");

    let mut out = String::with_capacity(joined.len());
    let chars: Vec<char> = joined.chars().collect();
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == ' ' {
            let prev = idx.checked_sub(1).map(|i| chars[i]);
            let next = chars.get(idx + 1).copied();
            if prev.is_some_and(is_tight_punct) || next.is_some_and(is_tight_punct) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn is_tight_punct(ch: char) -> bool {
    matches!(ch, '<' | '>' | ',' | ':' | '*' | '&' | '(' | ')' | '[' | ']')
}

/// Name used for symbol lookup: elaborated keyword, template arguments and
/// leading `::` removed (`struct Point` → `Point`, `Box<T>` → `Box`)
pub fn lookup_name(spelling: &str) -> String {
    let mut name = spelling.trim();
    for keyword in ["struct ", "class ", "union ", "enum ", "typename "] {
        if let Some(rest) = name.strip_prefix(keyword) {
            name = rest.trim_start();
        }
    }
    for qualifier in ["const ", "volatile "] {
        if let Some(rest) = name.strip_prefix(qualifier) {
            name = rest.trim_start();
        }
    }
    let name = strip_template_args(name);
    name.trim_start_matches("::").to_string()
}

/// Remove every `<...>` argument group, keeping `::` segments
/// (`a<b>::c<d>` → `a::c`). Synthetic names such as `<lambda #1>` start a
/// segment and are kept.
pub fn strip_template_args(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        match ch {
            '<' if depth > 0 || prev.is_some_and(is_identifier_char) => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
        prev = Some(ch);
    }
    out.trim().to_string()
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

static BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // C and C++ primitives
        "void", "bool", "_Bool", "char", "signed", "unsigned", "short", "int", "long", "float",
        "double", "wchar_t", "char8_t", "char16_t", "char32_t", "auto", "nullptr_t",
        "_Complex", "__int128",
        // <stddef.h>, <stdint.h>, <stdio.h>, <time.h>, <threads.h>, <locale.h>
        "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t",
        "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t",
        "uint64_t", "off_t", "FILE", "va_list", "time_t", "clock_t", "locale_t", "thrd_t",
        "mtx_t", "cnd_t", "atomic_int", "atomic_bool", "max_align_t", "wint_t", "pid_t",
    ]
    .into_iter()
    .collect()
});

/// Primitive and standard-library types never targeted by `References` edges
pub fn is_builtin_type(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name.starts_with("std::") || name.starts_with("decltype") {
        return true;
    }
    if BUILTIN_TYPES.contains(name) {
        return true;
    }
    // sized specifiers such as `unsigned long long`
    name.split_whitespace()
        .all(|word| BUILTIN_TYPES.contains(word) || word == "_Atomic")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> TypeDescriptor {
        TypeDescriptor::named("int")
    }

    #[test]
    fn test_render_function_pointer() {
        let fp = TypeDescriptor::pointer_to(TypeDescriptor::Function {
            ret: Box::new(int()),
            params: vec![int(), int()],
            variadic: false,
        });
        assert_eq!(fp.render(), "int(*)(int,int)");
        assert!(fp.is_function_pointer());
    }

    #[test]
    fn test_render_array_of_function_pointers() {
        let handlers = TypeDescriptor::Array {
            element: Box::new(TypeDescriptor::pointer_to(TypeDescriptor::Function {
                ret: Box::new(TypeDescriptor::named("void")),
                params: vec![TypeDescriptor::pointer_to(TypeDescriptor::named("char"))],
                variadic: false,
            })),
            size: ArraySize::Fixed("5".to_string()),
        };
        assert_eq!(handlers.render(), "void(*[5])(char*)");
    }

    #[test]
    fn test_render_multidimensional_and_vla() {
        let matrix = TypeDescriptor::Array {
            element: Box::new(TypeDescriptor::Array {
                element: Box::new(TypeDescriptor::named("double")),
                size: ArraySize::Fixed("10".to_string()),
            }),
            size: ArraySize::Unsized,
        };
        assert_eq!(matrix.render(), "double[][10]");

        let vla = TypeDescriptor::Array {
            element: Box::new(int()),
            size: ArraySize::Variable,
        };
        assert_eq!(vla.render(), "int[*]");
    }

    #[test]
    fn test_render_qualified_pointers() {
        let strings = TypeDescriptor::Pointer {
            pointee: Box::new(TypeDescriptor::Pointer {
                pointee: Box::new(TypeDescriptor::Named {
                    name: "char".to_string(),
                    qualifiers: Qualifiers {
                        is_const: true,
                        ..Qualifiers::NONE
                    },
                }),
                qualifiers: Qualifiers {
                    is_const: true,
                    ..Qualifiers::NONE
                },
            }),
            qualifiers: Qualifiers::NONE,
        };
        assert_eq!(strings.render(), "const char* const*");
    }

    #[test]
    fn test_render_reference() {
        let reference = TypeDescriptor::Reference {
            referent: Box::new(TypeDescriptor::Named {
                name: "std::string".to_string(),
                qualifiers: Qualifiers {
                    is_const: true,
                    ..Qualifiers::NONE
                },
            }),
            rvalue: false,
        };
        assert_eq!(reference.render(), "const std::string&");
        assert_eq!(reference.as_named(), Some("std::string"));
    }

    #[test]
    fn test_normalize_spelling() {
        assert_eq!(
            normalize_spelling("std::map< std::string ,  std::vector<Address> >"),
            "std::map<std::string,std::vector<Address>>"
        );
        assert_eq!(normalize_spelling("unsigned   long\n long"), "unsigned long long");
    }

    #[test]
    fn test_lookup_name() {
        assert_eq!(lookup_name("struct Point"), "Point");
        assert_eq!(lookup_name("Box<T>"), "Box");
        assert_eq!(lookup_name("::ns::A"), "ns::A");
        assert_eq!(lookup_name("Outer<Base<Inner<int>>>"), "Outer");
        assert_eq!(
            lookup_name("University::<anonymous struct #1>"),
            "University::<anonymous struct #1>"
        );
    }

    #[test]
    fn test_referenced_names_skip_builtins() {
        let map = TypeDescriptor::named("std::map<std::string,std::vector<Address>>");
        assert_eq!(map.referenced_names(), vec!["Address".to_string()]);

        let point = TypeDescriptor::pointer_to(TypeDescriptor::named("struct Point"));
        assert_eq!(point.referenced_names(), vec!["Point".to_string()]);

        assert!(TypeDescriptor::named("unsigned long long").referenced_names().is_empty());
    }
}
