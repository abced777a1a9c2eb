use crate::descriptor::TypeDescriptor;
use codegraph_parser::{AggregateKind, Language};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable symbol identifier: `<tag>:<qualified name><signature>[@<file>]`
///
/// Derived from names and signatures only, never from positions, so an
/// unchanged declaration keeps its id across re-parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    pub fn new(tag: &str, key: &str) -> Self {
        Self(format!("{tag}:{key}"))
    }

    /// Id local to one translation unit (internal linkage)
    pub fn internal(tag: &str, key: &str, file: &str) -> Self {
        Self(format!("{tag}:{key}@{file}"))
    }

    pub fn file(path: &str) -> Self {
        Self::new("file", path)
    }

    pub fn unresolved(name: &str) -> Self {
        Self::new("unresolved", name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn tag(&self) -> &str {
        self.0.split_once(':').map(|(tag, _)| tag).unwrap_or("")
    }

    /// Id without its tag and internal-linkage suffix, e.g. `ns::f(int)`
    pub fn key(&self) -> &str {
        let rest = self.0.split_once(':').map(|(_, rest)| rest).unwrap_or(&self.0);
        if self.tag() == "file" {
            return rest;
        }
        match rest.rfind('@') {
            Some(idx) => &rest[..idx],
            None => rest,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.tag() == "unresolved"
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    File,
    Namespace,
    Type,
    Function,
    Variable,
    Import,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub end_line: usize,
}

/// Declaration node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,

    /// Simple name (e.g., "memberFunction", "<lambda #1>")
    pub name: String,

    /// Fully qualified name (e.g., "MyNamespace::nsFunction")
    pub qualified_name: String,

    pub kind: SymbolKind,

    /// Owning scope (File, Namespace, Type or enclosing Function)
    pub parent: Option<SymbolId>,

    pub location: Location,

    /// Files that declare this symbol, in merge order
    pub provenance: Vec<String>,

    pub detail: SymbolDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum SymbolDetail {
    File { language: Language },
    Namespace,
    Type(TypeInfo),
    Function(FunctionInfo),
    Variable(VariableInfo),
    Import(ImportInfo),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Struct,
    Class,
    Union,
    Enum,
    Typedef,
}

impl TypeKind {
    pub fn tag(self) -> &'static str {
        match self {
            TypeKind::Struct => "struct",
            TypeKind::Class => "class",
            TypeKind::Union => "union",
            TypeKind::Enum => "enum",
            TypeKind::Typedef => "typedef",
        }
    }
}

impl From<AggregateKind> for TypeKind {
    fn from(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Struct => TypeKind::Struct,
            AggregateKind::Class => TypeKind::Class,
            AggregateKind::Union => TypeKind::Union,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Protected,
    Private,
}

impl Access {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.trim_end_matches(':').trim() {
            "public" => Some(Access::Public),
            "protected" => Some(Access::Protected),
            "private" => Some(Access::Private),
            _ => None,
        }
    }

    /// Default member and base access for an aggregate keyword
    pub fn default_for(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Class => Access::Private,
            _ => Access::Public,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseSpecifier {
    /// Base name as written (template arguments kept)
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumerator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub kind: TypeKind,

    /// Field names in declaration order, anonymous members flattened in
    #[serde(default)]
    pub members: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumerators: Vec<Enumerator>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<BaseSpecifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_params: Vec<String>,

    /// Target of a typedef / alias declaration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliased: Option<TypeDescriptor>,

    /// Underlying type of an enum (`enum E : short`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying: Option<String>,

    /// `enum class`
    #[serde(default)]
    pub is_scoped: bool,

    /// Body present (not just a forward declaration)
    pub is_definition: bool,
}

impl TypeInfo {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            members: Vec::new(),
            enumerators: Vec::new(),
            bases: Vec::new(),
            template_params: Vec::new(),
            aliased: None,
            underlying: None,
            is_scoped: false,
            is_definition: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Free,
    Method,
    Constructor,
    Destructor,
    Operator,
    Lambda,
    /// Per-file pseudo-function owning calls made outside any function body
    Initializer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    #[serde(default)]
    pub has_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionFlags {
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_const: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub is_pure: bool,
    #[serde(default)]
    pub is_override: bool,
}

impl FunctionFlags {
    fn union(&mut self, other: &FunctionFlags) {
        self.is_static |= other.is_static;
        self.is_const |= other.is_const;
        self.is_virtual |= other.is_virtual;
        self.is_inline |= other.is_inline;
        self.is_pure |= other.is_pure;
        self.is_override |= other.is_override;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub kind: FunctionKind,
    pub params: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeDescriptor>,
    pub is_variadic: bool,
    pub flags: FunctionFlags,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,

    /// Owning type as written on an out-of-line definition (`A::f`) whose
    /// type was not visible in the defining file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_hint: Option<String>,

    pub is_definition: bool,
}

impl FunctionInfo {
    pub fn new(kind: FunctionKind) -> Self {
        Self {
            kind,
            params: Vec::new(),
            return_type: None,
            is_variadic: false,
            flags: FunctionFlags::default(),
            template_params: Vec::new(),
            access: None,
            owner_hint: None,
            is_definition: false,
        }
    }

    /// Parameters without a default argument
    pub fn min_arity(&self) -> usize {
        self.params.iter().filter(|param| !param.has_default).count()
    }

    /// Whether a call with `argc` arguments fits this parameter list
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_arity() && (self.is_variadic || argc <= self.params.len())
    }

    /// `(int,double)` / `(const char*,...)` / `() const`
    pub fn signature(&self) -> String {
        let mut list: Vec<String> = self.params.iter().map(|param| param.ty.render()).collect();
        if self.is_variadic {
            list.push("...".to_string());
        }
        let mut signature = format!("({})", list.join(","));
        if self.flags.is_const {
            signature.push_str(" const");
        }
        signature
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Global,
    Field,
    StaticMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    Auto,
    Static,
    Extern,
    ThreadLocal,
    Register,
}

impl StorageClass {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "static" => Some(StorageClass::Static),
            "extern" => Some(StorageClass::Extern),
            "thread_local" | "_Thread_local" | "__thread" => Some(StorageClass::ThreadLocal),
            "register" => Some(StorageClass::Register),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub kind: VariableKind,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub storage: StorageClass,
    pub has_initializer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_width: Option<String>,
    #[serde(default)]
    pub flexible_array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    pub is_definition: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `#include "x"`
    Include,
    /// `#include <x>`
    SystemInclude,
    /// `using namespace x;`
    UsingNamespace,
    /// `using x::y;`
    UsingDeclaration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub kind: ImportKind,
    pub target: String,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
}

impl Symbol {
    pub fn function_info(&self) -> Option<&FunctionInfo> {
        match &self.detail {
            SymbolDetail::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn type_info(&self) -> Option<&TypeInfo> {
        match &self.detail {
            SymbolDetail::Type(info) => Some(info),
            _ => None,
        }
    }

    pub fn variable_info(&self) -> Option<&VariableInfo> {
        match &self.detail {
            SymbolDetail::Variable(info) => Some(info),
            _ => None,
        }
    }

    pub fn import_info(&self) -> Option<&ImportInfo> {
        match &self.detail {
            SymbolDetail::Import(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == SymbolKind::Unresolved
    }

    fn is_definition(&self) -> bool {
        match &self.detail {
            SymbolDetail::Type(info) => info.is_definition,
            SymbolDetail::Function(info) => info.is_definition,
            SymbolDetail::Variable(info) => info.is_definition,
            _ => false,
        }
    }

    /// Unify a duplicate declaration of the same id into `self`.
    ///
    /// The definition wins for body-derived data (location, parameter
    /// names, members) and flags are OR-ed. Provenance accumulates. The
    /// parent prefers an owning type over a namespace over the file.
    pub fn merge(&mut self, other: &Symbol) {
        for file in &other.provenance {
            if !self.provenance.contains(file) {
                self.provenance.push(file.clone());
            }
        }

        let my_rank = parent_rank(self.parent.as_ref());
        let their_rank = parent_rank(other.parent.as_ref());
        if their_rank > my_rank {
            self.parent = other.parent.clone();
        } else if their_rank == my_rank && my_rank > 0 && self.parent != other.parent {
            log::warn!(
                "{}: conflicting parents {:?} and {:?}, keeping the first",
                self.id,
                self.parent,
                other.parent
            );
        }

        let take_other = other.is_definition() && !self.is_definition();
        if take_other {
            self.location = other.location.clone();
        }

        match (&mut self.detail, &other.detail) {
            (SymbolDetail::Function(mine), SymbolDetail::Function(theirs)) => {
                let mut flags = mine.flags.clone();
                flags.union(&theirs.flags);
                let access = mine.access.or(theirs.access);
                let owner_hint = if mine.owner_hint.is_some() && theirs.owner_hint.is_some() {
                    mine.owner_hint.clone()
                } else {
                    None
                };
                let kind = match (mine.kind, theirs.kind) {
                    (FunctionKind::Free, kind) | (kind, FunctionKind::Free) => kind,
                    (kind, _) => kind,
                };
                if take_other {
                    *mine = theirs.clone();
                }
                mine.kind = kind;
                mine.flags = flags;
                mine.access = access;
                mine.owner_hint = owner_hint;
            }
            (SymbolDetail::Type(mine), SymbolDetail::Type(theirs)) => {
                if take_other {
                    *mine = theirs.clone();
                } else if mine.template_params.is_empty() {
                    mine.template_params = theirs.template_params.clone();
                }
            }
            (SymbolDetail::Variable(mine), SymbolDetail::Variable(theirs)) => {
                let access = mine.access.or(theirs.access);
                if take_other {
                    *mine = theirs.clone();
                }
                mine.access = access;
            }
            _ => {}
        }
    }
}

/// Containment preference when two declarations disagree on the parent
fn parent_rank(parent: Option<&SymbolId>) -> u8 {
    match parent.map(SymbolId::tag) {
        None | Some("file") => 0,
        Some("struct" | "class" | "union" | "enum" | "typedef") => 2,
        Some(_) => 1,
    }
}

/// Resolution confidence of a `Calls` edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Confidence {
    Exact,
    BestEffort,
    Unresolved,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::BestEffort => "best-effort",
            Confidence::Unresolved => "unresolved",
        }
    }
}

/// Role of a type in a `References` edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceRole {
    Parameter,
    Return,
    Field,
    Variable,
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Calls,
    Inherits,
    References,
    Imports,
}

/// Edge payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relation {
    Contains,
    Calls { confidence: Confidence, line: usize },
    Inherits { access: Access, is_virtual: bool },
    References { role: ReferenceRole },
    Imports,
}

impl Relation {
    pub fn kind(&self) -> EdgeKind {
        match self {
            Relation::Contains => EdgeKind::Contains,
            Relation::Calls { .. } => EdgeKind::Calls,
            Relation::Inherits { .. } => EdgeKind::Inherits,
            Relation::References { .. } => EdgeKind::References,
            Relation::Imports => EdgeKind::Imports,
        }
    }

    pub fn confidence(&self) -> Option<Confidence> {
        match self {
            Relation::Calls { confidence, .. } => Some(*confidence),
            _ => None,
        }
    }
}

/// Assembled edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: SymbolId,
    pub target: SymbolId,
    pub relation: Relation,
}

impl Edge {
    pub fn kind(&self) -> EdgeKind {
        self.relation.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnsupportedConstruct,
    AmbiguousResolution,
    UnresolvedSymbol,
}

/// Non-fatal analysis finding, scoped to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(id: &str, file: &str, definition: bool) -> Symbol {
        let mut info = FunctionInfo::new(FunctionKind::Free);
        info.is_definition = definition;
        info.flags.is_inline = !definition;
        Symbol {
            id: SymbolId::new("fn", id),
            name: "f".to_string(),
            qualified_name: "f".to_string(),
            kind: SymbolKind::Function,
            parent: Some(SymbolId::file(file)),
            location: Location {
                file: file.to_string(),
                line: if definition { 20 } else { 3 },
                end_line: 20,
            },
            provenance: vec![file.to_string()],
            detail: SymbolDetail::Function(info),
        }
    }

    #[test]
    fn test_symbol_id_parts() {
        let id = SymbolId::internal("fn", "helper(int)", "src/a.c");
        assert_eq!(id.tag(), "fn");
        assert_eq!(id.key(), "helper(int)");

        let field = SymbolId::internal("struct", "<anonymous struct #1>", "a.c");
        assert_eq!(field.key(), "<anonymous struct #1>");

        assert_eq!(SymbolId::file("src/a.c").key(), "src/a.c");
        assert!(SymbolId::unresolved("logger").is_placeholder());
    }

    #[test]
    fn test_merge_definition_wins() {
        let mut declaration = function("f(int)", "a.h", false);
        let definition = function("f(int)", "a.c", true);

        declaration.merge(&definition);

        assert_eq!(declaration.location.file, "a.c");
        assert_eq!(declaration.provenance, vec!["a.h".to_string(), "a.c".to_string()]);
        let info = declaration.function_info().unwrap();
        assert!(info.is_definition);
        assert!(info.flags.is_inline);
    }

    #[test]
    fn test_accepts_defaults_and_variadic() {
        let mut info = FunctionInfo::new(FunctionKind::Free);
        info.params = vec![
            Parameter {
                name: Some("a".to_string()),
                ty: TypeDescriptor::named("int"),
                has_default: false,
            },
            Parameter {
                name: Some("b".to_string()),
                ty: TypeDescriptor::named("int"),
                has_default: true,
            },
        ];
        assert!(!info.accepts(0));
        assert!(info.accepts(1));
        assert!(info.accepts(2));
        assert!(!info.accepts(3));

        info.is_variadic = true;
        assert!(info.accepts(5));
        assert_eq!(info.signature(), "(int,int,...)");
    }

    #[test]
    fn test_default_access() {
        assert_eq!(Access::default_for(TypeKind::Class), Access::Private);
        assert_eq!(Access::default_for(TypeKind::Struct), Access::Public);
        assert_eq!(Access::from_keyword("protected:"), Some(Access::Protected));
    }
}
