//! End-to-end: parse, reduce, generate and run templates.

use ehtml_codegen::{
    compile, compile_standalone, parse, reduce, render, CompileError, Instruction, LineCursor,
    Options, RenderError, ScriptError, Standalone, Value,
};
use ehtml_parser::{Node, NodeKind};
use pretty_assertions::assert_eq;

fn statics(source: &str) -> String {
    let doc = parse(source).unwrap();
    match reduce(&doc.nodes, &Options::default()).unwrap().as_slice() {
        [Instruction::Static(text)] => text.clone(),
        other => panic!("expected a single static, got {other:?}"),
    }
}

fn directive_spans(nodes: &[Node], out: &mut Vec<(usize, usize)>) {
    for node in nodes {
        match &node.kind {
            NodeKind::Eval(_) | NodeKind::Escaped(_) | NodeKind::Raw(_) => {
                out.push(node.span.lines());
            }
            NodeKind::Element(element) => directive_spans(&element.children, out),
            _ => {}
        }
    }
}

fn no_custom(name: &str, _: Value) -> Result<String, ScriptError> {
    Err(ScriptError::Custom(format!("No renderer for custom element <{name}>")))
}

fn run_standalone(code: &str, locals: Value) -> Result<String, ScriptError> {
    Standalone::load(code)
        .unwrap()
        .render(locals, &mut LineCursor::default(), &mut no_custom)
}

const PAGE: &str = "<!DOCTYPE html>
<html>
  <head>
    <title>  Title  </title>
  </head>
  <body class=\"  main   wide \">
    <!-- nav -->
    <pre>
  keep
    this</pre>
    <input type=\"checkbox\" checked=\"checked\">
  </body>
</html>";

// =============================================================================
// Reduction
// =============================================================================

#[test]
fn test_round_trip_static_page() {
    assert_eq!(
        statics(PAGE),
        "<!DOCTYPE html>\n<html>\n<head>\n<title> Title </title>\n</head>\n\
         <body class=\"main wide\">\n<pre>\n  keep\n    this</pre>\n\
         <input type=checkbox checked>\n</body>\n</html>"
    );
}

#[test]
fn test_reduce_is_idempotent() {
    let once = statics(PAGE);
    assert_eq!(statics(&once), once);
}

#[test]
fn test_no_adjacent_statics() {
    let doc = parse("<p>a</p><!-- c --><p>b <%= x %></p> <% if (y) { %> <i>z</i> <% } %>").unwrap();
    let instructions = reduce(&doc.nodes, &Options::default()).unwrap();
    assert!(instructions
        .windows(2)
        .all(|pair| !matches!(pair, [Instruction::Static(_), Instruction::Static(_)])));
}

#[test]
fn test_positions_and_markers() {
    let source = "a\n<%= x +\n 1 %>\n<p><% let y = 2 %></p>";
    let doc = parse(source).unwrap();
    let mut spans = Vec::new();
    directive_spans(&doc.nodes, &mut spans);
    assert_eq!(spans, vec![(2, 3), (4, 4)]);
    assert!(spans.iter().all(|(start, end)| start <= end));

    let code = compile(source, &Options::new().vars(["x"])).unwrap().code().to_string();
    assert!(code.contains("(__line(2,3),__e(x +\n 1))"));
    assert!(code.contains("__line(4);let y = 2\n"));
}

// =============================================================================
// Rendering
// =============================================================================

#[test]
fn test_end_to_end_with_vars() {
    let locals = Value::from(serde_json::json!({"name": {"first": "Gui", "last": "S"}}));
    let options = Options::new().vars(["name"]);
    assert_eq!(
        render("Hi <b><%=name.first%></b> <%=name.last%>!", &locals, &options).unwrap(),
        "Hi <b>Gui</b> S!"
    );
    assert_eq!(
        render(
            "Hi <b><%=locals.name.first%></b> <%=locals.name.last%>!",
            &locals,
            &Options::default()
        )
        .unwrap(),
        "Hi <b>Gui</b> S!"
    );
}

#[test]
fn test_escaped_and_raw_output() {
    let locals = Value::from(serde_json::json!({"html": "<i>x</i>"}));
    assert_eq!(
        render("<%= locals.html %>|<%- locals.html %>", &locals, &Options::default()).unwrap(),
        "&lt;i&gt;x&lt;/i&gt;|<i>x</i>"
    );
}

#[test]
fn test_boolean_attribute_collapse() {
    let source = "<input checked=\"<%= locals.on %>\">";
    for options in [Options::default(), Options::new().compile_debug(false)] {
        let template = compile(source, &options).unwrap();
        let on = Value::object([("on", Value::from(true))]);
        let off = Value::object([("on", Value::from(false))]);
        assert_eq!(template.render(&on).unwrap(), "<input checked>");
        assert_eq!(template.render(&off).unwrap(), "<input>");
    }
}

#[test]
fn test_transformer_rewrites_tree() {
    let options = Options::new().transformer(|doc| {
        doc.walk_mut(&mut |node| {
            if let Some(element) = node.as_element_mut() {
                if element.name == "i" {
                    element.name = "em".into();
                }
            }
        });
    });
    assert_eq!(
        render("<p><i>a</i> <i><%= 1 + 1 %></i></p>", &Value::Undefined, &options).unwrap(),
        "<p><em>a</em> <em>2</em></p>"
    );
}

#[test]
fn test_many_directives() {
    let source = "<li><%= locals.x %></li>\n".repeat(10_000);
    let locals = Value::object([("x", Value::from("<b>"))]);
    for options in [Options::default(), Options::new().compile_debug(false)] {
        let template = compile(&source, &options).unwrap();
        let html = template.render(&locals).unwrap();
        assert_eq!(html.matches("<li>&lt;b&gt;</li>").count(), 10_000);

        let copy = template.clone();
        drop(template);
        assert_eq!(copy.render(&locals).unwrap(), html);
    }
}

// =============================================================================
// Custom elements
// =============================================================================

#[test]
fn test_custom_element_callback() {
    let template = compile(
        "<my-tag attr=\"x\"><eh-content name=\"a\">Y</eh-content></my-tag>",
        &Options::default(),
    )
    .unwrap();

    let mut calls = Vec::new();
    let html = template
        .render_with(&Value::Undefined, |name, locals| {
            calls.push(name.to_string());
            assert_eq!(locals.get("attr"), Some(&Value::from("x")));
            let contents = locals.get("__contents").unwrap();
            assert_eq!(contents.get("a"), Some(&Value::from("Y")));
            Ok("<rendered>".into())
        })
        .unwrap();

    assert_eq!(html, "<rendered>");
    assert_eq!(calls, ["my-tag"]);
}

#[test]
fn test_custom_attribute_values_keep_type() {
    let template = compile(
        "<x-list items=\"<%= locals.items %>\" label=\"n=<%= locals.items.length %>\" open></x-list>",
        &Options::default(),
    )
    .unwrap();
    let locals = Value::from(serde_json::json!({"items": [1, 2]}));
    let html = template
        .render_with(&locals, |_, locals| {
            assert_eq!(locals.get("items"), Some(&Value::from(serde_json::json!([1, 2]))));
            assert_eq!(locals.get("label"), Some(&Value::from("n=2")));
            assert_eq!(locals.get("open"), Some(&Value::from(true)));
            Ok("ok".into())
        })
        .unwrap();
    assert_eq!(html, "ok");
}

#[test]
fn test_placeholder_fallback() {
    let card = compile(
        "<div class=\"card\"><eh-placeholder>default</eh-placeholder></div>",
        &Options::default(),
    )
    .unwrap();
    let with_contents = |content: Option<&str>| {
        let contents = match content {
            Some(text) => Value::object([("", Value::from(text))]),
            None => Value::object::<&str, _>([]),
        };
        Value::object([("__contents", contents)])
    };

    assert_eq!(card.render(&Value::Undefined).unwrap(), "<div class=card>default</div>");
    assert_eq!(card.render(&with_contents(None)).unwrap(), "<div class=card>default</div>");
    assert_eq!(card.render(&with_contents(Some(" \n "))).unwrap(), "<div class=card>default</div>");
    assert_eq!(card.render(&with_contents(Some("<b>x</b>"))).unwrap(), "<div class=card><b>x</b></div>");
}

#[test]
fn test_components_compose() {
    let card = compile(
        "<div class=\"card\"><h2><eh-placeholder name=\"title\">Untitled</eh-placeholder></h2><eh-placeholder></eh-placeholder></div>",
        &Options::default(),
    )
    .unwrap();
    let page = compile(
        "<main><my-card><eh-content name=\"title\"><%= locals.title %></eh-content><p>body</p></my-card></main>",
        &Options::default(),
    )
    .unwrap();

    let html = page
        .render_with(&Value::object([("title", Value::from("News"))]), |name, locals| {
            assert_eq!(name, "my-card");
            Ok(card.render(&locals)?)
        })
        .unwrap();
    assert_eq!(html, "<main><div class=card><h2>News</h2><p>body</p></div></main>");
}

// =============================================================================
// Errors
// =============================================================================

const FAILING: &str = "a\n<% throw Error('hi') %>\nb";

#[test]
fn test_error_reports_template_lines() {
    let err = render(FAILING, &Value::Undefined, &Options::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "ejs:2\n 1    | a\n 2 >> | <% throw Error('hi') %>\n 3    | b\n\nhi"
    );
    assert!(matches!(err, RenderError::Context { lines: (2, 2), .. }));
}

#[test]
fn test_error_without_debug_is_untouched() {
    let err = render(FAILING, &Value::Undefined, &Options::new().compile_debug(false)).unwrap_err();
    let RenderError::Script(source) = err else {
        panic!("expected a bare script error");
    };
    assert_eq!(source.to_string(), "hi");
}

#[test]
fn test_failing_custom_element_reports_element_lines() {
    let source = "<p>ok</p>\n<x-a\n  b=\"1\"></x-a>";
    let err = render(source, &Value::Undefined, &Options::new().filename("page.ehtml")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "page.ehtml:2\n 1    | <p>ok</p>\n 2 >> | <x-a\n 3 >> |   b=\"1\"></x-a>\n\n\
         No renderer for custom element <x-a>"
    );
}

#[test]
fn test_broken_directive_reports_template_line() {
    let err = render("<p>a</p>\n<%# note %>\n<p>b</p>", &Value::Undefined, &Options::default())
        .unwrap_err();
    let RenderError::Compile(CompileError::Script { line, .. }) = &err else {
        panic!("expected a script compile error, got {err:?}");
    };
    assert_eq!(*line, Some(2));
    assert!(err.to_string().starts_with("ejs:2\n 1    | <p>a</p>\n 2 >> | <%# note %>\n"));
}

// =============================================================================
// Standalone
// =============================================================================

#[test]
fn test_standalone_matches_compile() {
    let source = "<ul><% for (let i of locals.items) { %><li><%= i %></li><% } %></ul>";
    let locals = Value::from(serde_json::json!({"items": ["a", "b"]}));
    for options in [Options::default(), Options::new().compile_debug(false)] {
        let expected = compile(source, &options).unwrap().render(&locals).unwrap();
        let standalone = compile_standalone(source, &options).unwrap();
        assert_eq!(run_standalone(&standalone.code, locals.clone()).unwrap(), expected);
    }
}

#[test]
fn test_standalone_error_text_matches_compile() {
    let expected = render(FAILING, &Value::Undefined, &Options::default())
        .unwrap_err()
        .to_string();
    let standalone = compile_standalone(FAILING, &Options::default()).unwrap();
    let err = run_standalone(&standalone.code, Value::Undefined).unwrap_err();
    assert_eq!(err.to_string(), expected);
}

#[test]
fn test_standalone_source_map() {
    let options = Options::new().filename("page").source_map(true);
    let standalone = compile_standalone("<p>\n<%= locals.a %></p>", &options).unwrap();

    let map: serde_json::Value = serde_json::from_str(standalone.map.as_deref().unwrap()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "page.js");
    assert_eq!(map["sources"], serde_json::json!(["page"]));
    assert!(!map["mappings"].as_str().unwrap().is_empty());

    let with_source: serde_json::Value =
        serde_json::from_str(standalone.map_with_source.as_deref().unwrap()).unwrap();
    assert_eq!(with_source["sourcesContent"], serde_json::json!(["<p>\n<%= locals.a %></p>"]));
}
