use codegraph::{CodeGraph, Confidence, FunctionKind, GraphBuilder, GraphConfig, ImportKind};
use codegraph_parser::{Language, ParsedSource};
use pretty_assertions::assert_eq;

fn build() -> CodeGraph {
    let sources = vec![
        ParsedSource::parse("main.cpp", Language::Cpp, include_str!("fixtures/cpp/main.cpp"))
            .expect("parse main.cpp"),
        ParsedSource::parse("widgets.cpp", Language::Cpp, include_str!("fixtures/cpp/widgets.cpp"))
            .expect("parse widgets.cpp"),
        ParsedSource::parse("widgets.hpp", Language::Cpp, include_str!("fixtures/cpp/widgets.hpp"))
            .expect("parse widgets.hpp"),
    ];
    let mut builder = GraphBuilder::new(GraphConfig::default()).expect("default config is valid");
    builder.build(&sources).expect("build graph")
}

#[test]
fn calls_across_files_resolve_through_declarations() {
    let graph = build();

    let calls: Vec<(String, Confidence)> = graph
        .calls_from("fn:main()")
        .expect("main")
        .iter()
        .map(|site| (site.target.id.to_string(), site.confidence))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("fn:ui::Widget::create(int)".to_string(), Confidence::Exact),
            ("fn:ui::Widget::draw() const".to_string(), Confidence::Exact),
            ("fn:ui::render(const Widget&)".to_string(), Confidence::Exact),
            ("unresolved:std::string::size".to_string(), Confidence::Unresolved),
            ("fn:ui::Widget::id() const".to_string(), Confidence::Exact),
        ]
    );
}

#[test]
fn out_of_line_definition_joins_its_class() {
    let graph = build();

    let draw = graph.symbol("fn:ui::Widget::draw() const").expect("draw");
    assert_eq!(draw.parent.as_ref().map(|id| id.as_str()), Some("class:ui::Widget"));
    assert_eq!(draw.location.file, "widgets.cpp");
    assert_eq!(
        draw.provenance,
        vec!["widgets.cpp".to_string(), "widgets.hpp".to_string()]
    );

    let info = draw.function_info().expect("function");
    assert_eq!(info.kind, FunctionKind::Method);
    assert!(info.flags.is_const);
    assert!(info.is_definition);
    assert!(info.owner_hint.is_none());

    let constructor = graph.symbol("fn:ui::Widget::Widget(int)").expect("constructor");
    assert_eq!(
        constructor.function_info().expect("function").kind,
        FunctionKind::Constructor
    );

    let mut members: Vec<&str> = graph
        .members("class:ui::Widget")
        .expect("members")
        .iter()
        .map(|symbol| symbol.name.as_str())
        .collect();
    members.sort_unstable();
    assert_eq!(members, vec!["Widget", "create", "draw", "id", "id_"]);
}

#[test]
fn unqualified_call_in_method_uses_the_owner_scope() {
    let graph = build();

    let callees: Vec<&str> = graph
        .callees("fn:ui::Widget::draw() const")
        .expect("draw")
        .iter()
        .map(|symbol| symbol.id.as_str())
        .collect();
    assert_eq!(callees, vec!["fn:ui::render(const Widget&)"]);

    let callers: Vec<&str> = graph
        .callers("fn:ui::render(const Widget&)")
        .expect("render")
        .iter()
        .map(|symbol| symbol.name.as_str())
        .collect();
    assert_eq!(callers, vec!["main", "draw"]);
}

#[test]
fn includes_resolve_to_analyzed_headers() {
    let graph = build();

    for includer in ["main.cpp", "widgets.cpp"] {
        let import = graph
            .symbol(&format!("import:\"widgets.hpp\"@{includer}"))
            .and_then(|symbol| symbol.import_info())
            .expect("quoted include");
        assert!(import.resolved, "{includer} should resolve widgets.hpp");
        assert_eq!(import.resolved_path.as_deref(), Some("widgets.hpp"));
    }

    let iostream = graph
        .symbol("import:<iostream>@main.cpp")
        .and_then(|symbol| symbol.import_info())
        .expect("system include");
    assert_eq!(iostream.kind, ImportKind::SystemInclude);
    assert!(!iostream.resolved);
}

#[test]
fn graph_queries_report_missing_nodes() {
    let graph = build();

    assert!(graph.callers("fn:ui::Widget::resize()").is_err());
    assert_eq!(graph.resolve("ui::render").expect("by qualified name").name, "render");
    assert_eq!(graph.by_name("render").len(), 1);
    assert_eq!(graph.stats().calls_exact, 5);
    assert_eq!(graph.stats().calls_unresolved, 1);
    assert_eq!(graph.stats().files, 3);
}
