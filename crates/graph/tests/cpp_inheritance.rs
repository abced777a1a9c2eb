use codegraph::{Access, CodeGraph, Confidence, GraphBuilder, GraphConfig, GraphError};
use codegraph_parser::{Language, ParsedSource};
use pretty_assertions::assert_eq;

fn build_sources(sources: &[ParsedSource]) -> codegraph::Result<CodeGraph> {
    let mut builder = GraphBuilder::new(GraphConfig::sequential()).expect("sequential config is valid");
    builder.build(sources)
}

fn build() -> CodeGraph {
    let sources = vec![
        ParsedSource::parse("animals.hpp", Language::Cpp, include_str!("fixtures/cpp/animals.hpp"))
            .expect("parse animals.hpp"),
        ParsedSource::parse("penguin.cpp", Language::Cpp, include_str!("fixtures/cpp/penguin.cpp"))
            .expect("parse penguin.cpp"),
    ];
    build_sources(&sources).expect("build graph")
}

fn bases(graph: &CodeGraph, id: &str) -> Vec<(String, Access, bool)> {
    graph
        .bases_of(id)
        .expect("type exists")
        .iter()
        .map(|base| (base.base.id.to_string(), base.access, base.is_virtual))
        .collect()
}

#[test]
fn multiple_inheritance_keeps_declaration_order_and_access() {
    let graph = build();

    assert_eq!(
        bases(&graph, "class:Duck"),
        vec![
            ("class:Animal".to_string(), Access::Public, false),
            ("class:Flyable".to_string(), Access::Private, false),
            ("class:Swimmable".to_string(), Access::Private, false),
        ]
    );
}

#[test]
fn virtual_bases_of_a_diamond() {
    let graph = build();

    assert_eq!(
        bases(&graph, "struct:Left"),
        vec![("struct:Base".to_string(), Access::Public, true)]
    );
    assert_eq!(
        bases(&graph, "struct:Right"),
        vec![("struct:Base".to_string(), Access::Public, true)]
    );
    assert_eq!(
        bases(&graph, "struct:Diamond"),
        vec![
            ("struct:Left".to_string(), Access::Public, false),
            ("struct:Right".to_string(), Access::Public, false),
        ]
    );
}

#[test]
fn base_declared_in_another_file_is_linked() {
    let graph = build();

    assert_eq!(
        bases(&graph, "class:Penguin"),
        vec![("class:Animal".to_string(), Access::Public, false)]
    );
}

#[test]
fn inherited_calls_resolve_and_virtual_targets_are_best_effort() {
    let graph = build();

    let paddle: Vec<(String, Confidence)> = graph
        .calls_from("fn:Duck::paddle()")
        .expect("paddle")
        .iter()
        .map(|site| (site.target.id.to_string(), site.confidence))
        .collect();
    assert_eq!(
        paddle,
        vec![
            ("fn:Swimmable::swim()".to_string(), Confidence::Exact),
            ("fn:Flyable::fly()".to_string(), Confidence::BestEffort),
        ]
    );

    let breathe: Vec<&str> = graph
        .callees("fn:Penguin::speak() const")
        .expect("Penguin::speak")
        .iter()
        .map(|symbol| symbol.id.as_str())
        .collect();
    assert_eq!(breathe, vec!["fn:Animal::breathe()"]);
}

#[test]
fn override_and_pure_flags_survive_merging() {
    let graph = build();

    let pure = graph.symbol("fn:Animal::speak() const").expect("Animal::speak");
    let flags = &pure.function_info().expect("function").flags;
    assert!(flags.is_pure);
    assert!(flags.is_virtual);

    let duck_speak = graph.symbol("fn:Duck::speak() const").expect("Duck::speak");
    let info = duck_speak.function_info().expect("function");
    assert!(info.flags.is_override);
    assert!(info.is_definition);
    assert_eq!(duck_speak.location.file, "penguin.cpp");
    assert_eq!(duck_speak.parent.as_ref().map(|id| id.as_str()), Some("class:Duck"));
}

#[test]
fn inheritance_cycle_rejects_the_run() {
    let sources = vec![ParsedSource::parse(
        "cycle.cpp",
        Language::Cpp,
        "class A : public B {};\nclass B : public A {};",
    )
    .expect("parse cycle.cpp")];

    match build_sources(&sources) {
        Err(GraphError::StructuralCycle { relation, .. }) => assert_eq!(relation, "inherits"),
        Err(other) => panic!("expected a structural cycle, got {other}"),
        Ok(_) => panic!("expected a structural cycle, got a graph"),
    }
}
