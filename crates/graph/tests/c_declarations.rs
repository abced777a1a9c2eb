use codegraph::{
    CodeGraph, Confidence, EdgeKind, GraphBuilder, GraphConfig, ImportKind, Relation, SymbolKind,
};
use codegraph_parser::{Language, ParsedSource};
use pretty_assertions::assert_eq;

const HEADER: &str = include_str!("fixtures/c/employees.h");
const SOURCE: &str = include_str!("fixtures/c/employees.c");

fn build() -> CodeGraph {
    let sources = vec![
        ParsedSource::parse("src/employees.c", Language::C, SOURCE).expect("parse employees.c"),
        ParsedSource::parse("src/employees.h", Language::C, HEADER).expect("parse employees.h"),
    ];
    let mut builder = GraphBuilder::new(GraphConfig::default()).expect("default config is valid");
    builder.build(&sources).expect("build graph")
}

fn names<'g>(symbols: impl IntoIterator<Item = &'g codegraph::Symbol>) -> Vec<&'g str> {
    symbols.into_iter().map(|symbol| symbol.id.as_str()).collect()
}

#[test]
fn prototype_and_definition_become_one_node() {
    let graph = build();

    let matches = graph.resolve_all("count_active");
    assert_eq!(matches.len(), 1, "expected a single count_active node, got {matches:?}");

    let count_active = matches[0];
    assert_eq!(count_active.id.as_str(), "fn:count_active(const struct Employee*,int)");
    assert_eq!(count_active.location.file, "src/employees.c");
    assert_eq!(
        count_active.provenance,
        vec!["src/employees.c".to_string(), "src/employees.h".to_string()]
    );
    assert!(count_active.function_info().expect("function").is_definition);

    let log_message = graph.resolve("log_message").expect("log_message");
    assert_eq!(log_message.id.as_str(), "fn:log_message(const char*,...)");
    assert!(log_message.function_info().expect("function").is_variadic);
}

#[test]
fn struct_members_include_bitfields_and_anonymous_unions() {
    let graph = build();

    let employee = graph.symbol("struct:Employee").expect("struct Employee");
    assert_eq!(
        employee.type_info().expect("type").members,
        vec!["id", "addr", "active", "badge", "token"]
    );

    let active = graph
        .symbol("var:Employee::active")
        .and_then(|symbol| symbol.variable_info())
        .expect("bitfield member");
    assert_eq!(active.bit_width.as_deref(), Some("1"));

    let token = graph.symbol("var:Employee::token").expect("flattened union member");
    assert_eq!(token.parent.as_ref().map(|id| id.as_str()), Some("struct:Employee"));

    let payload = graph
        .symbol("var:Packet::payload")
        .and_then(|symbol| symbol.variable_info())
        .expect("flexible array member");
    assert!(payload.flexible_array);

    assert!(graph.symbol("struct:Student").is_some(), "typedef'd anonymous struct is named by its alias");
    assert!(graph.symbol("typedef:Student").is_some());
}

#[test]
fn static_declarations_keep_internal_linkage() {
    let graph = build();

    let validate = graph.resolve("validate").expect("validate");
    assert_eq!(
        validate.id.as_str(),
        "fn:validate(const struct Employee*)@src/employees.c"
    );
    assert!(validate.function_info().expect("function").flags.is_static);

    assert!(graph.symbol("var:total_checked@src/employees.c").is_some());

    let scale = graph.symbol("fn:scale(int)").expect("inline scale");
    let info = scale.function_info().expect("function");
    assert!(info.flags.is_inline);
    assert!(info.is_definition);
}

#[test]
fn quoted_include_resolves_and_system_include_does_not() {
    let graph = build();

    let local = graph
        .symbol("import:\"employees.h\"@src/employees.c")
        .and_then(|symbol| symbol.import_info())
        .expect("quoted include");
    assert_eq!(local.kind, ImportKind::Include);
    assert!(local.resolved);
    assert_eq!(local.resolved_path.as_deref(), Some("src/employees.h"));

    let system = graph
        .symbol("import:<stdio.h>@src/employees.h")
        .and_then(|symbol| symbol.import_info())
        .expect("system include");
    assert_eq!(system.kind, ImportKind::SystemInclude);
    assert!(!system.resolved);

    let imports = graph.edges(Some(EdgeKind::Imports));
    assert!(imports.iter().any(|edge| {
        edge.source.as_str() == "import:\"employees.h\"@src/employees.c"
            && edge.target.as_str() == "file:src/employees.h"
    }));
}

#[test]
fn array_and_function_pointer_parameters_render_in_the_signature() {
    let graph = build();

    let sort_scores = graph.resolve("sort_scores").expect("sort_scores");
    assert_eq!(
        sort_scores.id.as_str(),
        "fn:sort_scores(int,float[*],int(*)(const void*,const void*))"
    );
}

#[test]
fn calls_follow_source_order() {
    let graph = build();

    assert_eq!(
        names(graph.callees("fn:main()").expect("main")),
        vec![
            "fn:print_address(const struct Address*)",
            "fn:count_active(const struct Employee*,int)",
        ]
    );

    let calls = graph
        .calls_from("fn:count_active(const struct Employee*,int)")
        .expect("count_active");
    let targets: Vec<(&str, Confidence)> = calls
        .iter()
        .map(|site| (site.target.id.as_str(), site.confidence))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("fn:validate(const struct Employee*)@src/employees.c", Confidence::Exact),
            ("fn:log_message(const char*,...)", Confidence::Exact),
        ]
    );
}

#[test]
fn unknown_callees_become_placeholders() {
    let graph = build();

    let printf = graph.symbol("unresolved:printf").expect("printf placeholder");
    assert_eq!(printf.kind, SymbolKind::Unresolved);
    assert_eq!(
        names(graph.callers("unresolved:printf").expect("printf callers")),
        vec![
            "fn:log_message(const char*,...)",
            "fn:print_address(const struct Address*)",
        ]
    );

    // a function-pointer parameter has no static target
    let sort_calls = graph
        .calls_from("fn:sort_scores(int,float[*],int(*)(const void*,const void*))")
        .expect("sort_scores");
    assert_eq!(sort_calls.len(), 1);
    assert_eq!(sort_calls[0].target.id.as_str(), "unresolved:compare");
    assert_eq!(sort_calls[0].confidence, Confidence::Unresolved);
}

#[test]
fn references_are_deduplicated_across_declaration_and_definition() {
    let graph = build();

    let references: Vec<_> = graph
        .edges(Some(EdgeKind::References))
        .into_iter()
        .filter(|edge| edge.source.as_str() == "fn:count_active(const struct Employee*,int)")
        .collect();
    assert_eq!(references.len(), 1, "got {references:?}");
    assert_eq!(references[0].target.as_str(), "struct:Employee");
    assert!(matches!(references[0].relation, Relation::References { .. }));

    let field_types: Vec<String> = graph
        .edges(Some(EdgeKind::References))
        .into_iter()
        .filter(|edge| edge.source.as_str() == "var:Employee::addr")
        .map(|edge| edge.target.to_string())
        .collect();
    assert_eq!(field_types, vec!["struct:Address".to_string()]);
}
