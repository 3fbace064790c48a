//! End-to-end compilation and rendering scenarios.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zenmill::{
    CompileError, Compiler, LoadFailure, Loader, MemoryLoader, Options, RenderError, Value,
};

fn loader(templates: &[(&str, &str)]) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for (path, source) in templates {
        loader.insert(*path, *source);
    }
    loader
}

fn compiler(templates: &[(&str, &str)]) -> Compiler<MemoryLoader> {
    Compiler::new(loader(templates), Options::default())
}

fn data(json: serde_json::Value) -> Value {
    Value::from(json)
}

async fn render_one(templates: &[(&str, &str)], root: &str, env: serde_json::Value) -> String {
    compiler(templates)
        .render(root, &data(env))
        .await
        .expect("render failed")
}

/// A loader that records every path it is asked for.
struct CountingLoader {
    inner: MemoryLoader,
    calls: Arc<Mutex<Vec<String>>>,
}

impl CountingLoader {
    fn new(templates: &[(&str, &str)]) -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loader = Self {
            inner: loader(templates),
            calls: calls.clone(),
        };
        (loader, calls)
    }
}

#[async_trait]
impl Loader for CountingLoader {
    async fn load(&self, path: &str) -> Result<String, LoadFailure> {
        self.calls.lock().unwrap().push(path.to_string());
        self.inner.load(path).await
    }
}

// ── Composition ─────────────────────────────────────────────────────────

#[tokio::test]
async fn simple_include() {
    let out = render_one(
        &[
            ("index.html", "<body><include file='header.html'/>H</body>"),
            ("header.html", "<h>W</h>"),
        ],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "<body><h>W</h>H</body>");
}

#[tokio::test]
async fn block_redefinition() {
    let out = render_one(
        &[
            ("layout.html", "<html><body><block:content/></body></html>"),
            (
                "page.html",
                "<include file='layout.html'><def:content><h1>Hi</h1></def:content></include>",
            ),
        ],
        "page.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "<html><body><h1>Hi</h1></body></html>");
}

#[tokio::test]
async fn nested_layouts() {
    let out = render_one(
        &[
            ("layout.html", "<html><body><block:content/></body></html>"),
            (
                "mid.html",
                "<include file='layout.html'><def:content><section><block:content/></section></def:content></include>",
            ),
            (
                "page.html",
                "<include file='mid.html'><def:content><p>X</p></def:content></include>",
            ),
        ],
        "page.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "<html><body><section><p>X</p></section></body></html>");
}

#[tokio::test]
async fn unknown_block_renders_default() {
    let out = render_one(
        &[("index.html", "<block:side>default</block:side>")],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "default");
}

#[tokio::test]
async fn unused_definition_is_not_an_error() {
    let out = render_one(
        &[
            ("layout.html", "L"),
            (
                "page.html",
                "<include file='layout.html'><def:ghost>unused</def:ghost></include>",
            ),
        ],
        "page.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "L");
}

#[tokio::test]
async fn block_merge_laws() {
    let layout = ("layout.html", "[<block:c>D</block:c>]");
    let cases = [
        ("<include file='layout.html'><def:c>X</def:c></include>", "[X]"),
        ("<include file='layout.html'><append:c>X</append:c></include>", "[DX]"),
        ("<include file='layout.html'><prepend:c>X</prepend:c></include>", "[XD]"),
        ("<include file='layout.html'/>", "[D]"),
    ];
    for (page, expected) in cases {
        let out = render_one(
            &[layout, ("page.html", page)],
            "page.html",
            serde_json::json!({}),
        )
        .await;
        assert_eq!(out, expected, "page: {page}");
    }
}

#[tokio::test]
async fn sibling_defs_merge_in_textual_order() {
    let out = render_one(
        &[
            ("layout.html", "<block:c>D</block:c>"),
            (
                "page.html",
                "<include file='layout.html'><def:c>A</def:c><append:c>B</append:c></include>",
            ),
        ],
        "page.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "AB");
}

#[tokio::test]
async fn relative_paths_resolve_against_the_including_file() {
    let (counting, calls) = CountingLoader::new(&[
        ("pages/index.html", "<include file='../shared/header.html'/>B"),
        ("shared/header.html", "<include file='footer.html'/>A"),
        ("shared/footer.html", "F"),
    ]);
    let compiler = Compiler::new(counting, Options::default());
    let out = compiler
        .render("pages/index.html", &Value::Null)
        .await
        .unwrap();
    assert_eq!(out, "FAB");

    // The loader only ever sees normalized root-relative paths.
    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        vec!["pages/index.html", "shared/header.html", "shared/footer.html"]
    );
}

#[tokio::test]
async fn rooted_paths_ignore_the_including_file() {
    let out = render_one(
        &[
            ("deep/nested/page.html", "<include file='/header.html'/>!"),
            ("header.html", "H"),
        ],
        "deep/nested/page.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "H!");
}

#[tokio::test]
async fn path_escaping_the_root_fails() {
    let err = compiler(&[("index.html", "<include file='../evil.html'/>")])
        .compile("index.html")
        .await
        .unwrap_err();
    assert!(matches!(err, CompileError::OutOfScope { .. }));
}

#[tokio::test]
async fn each_template_is_loaded_once() {
    let (counting, calls) = CountingLoader::new(&[
        (
            "index.html",
            "<include file='header.html'/><include file='header.html'/><inline file='header.html'/>",
        ),
        ("header.html", "<h/>"),
    ]);
    let compiler = Compiler::new(counting, Options::default());
    compiler.compile("index.html").await.unwrap();

    let calls = calls.lock().unwrap();
    let header_loads = calls.iter().filter(|p| *p == "header.html").count();
    assert_eq!(header_loads, 1, "loads: {calls:?}");
}

// ── Inline ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn inline_escapes_by_default() {
    let out = render_one(
        &[
            ("index.html", "<inline file='snippet.html'/>"),
            ("snippet.html", "<b>x & y</b>"),
        ],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "&lt;b&gt;x &amp; y&lt;/b&gt;");
}

#[tokio::test]
async fn inline_bang_prefix_is_raw() {
    let out = render_one(
        &[
            ("index.html", "<inline file='!snippet.html'/>"),
            ("snippet.html", "<b>x</b>"),
        ],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "<b>x</b>");
}

// ── Control flow and iteration ──────────────────────────────────────────

const FRIENDS_TEMPLATE: &str = "<if><when expr=\"friends==1\"><p>one</p></when><when expr=\"friends>1 && friends<5\"><p>few</p></when><otherwise><p>#{friends}</p></otherwise></if>";

#[tokio::test]
async fn if_when_otherwise() {
    let templates = [("index.html", FRIENDS_TEMPLATE)];
    assert_eq!(
        render_one(&templates, "index.html", serde_json::json!({"friends": 1})).await,
        "<p>one</p>"
    );
    assert_eq!(
        render_one(&templates, "index.html", serde_json::json!({"friends": 2})).await,
        "<p>few</p>"
    );
    assert_eq!(
        render_one(&templates, "index.html", serde_json::json!({"friends": 100500})).await,
        "<p>100500</p>"
    );
}

#[tokio::test]
async fn standalone_if_lowers_to_single_arm() {
    let templates = [("index.html", "<if expr='ok'>yes</if>")];
    assert_eq!(
        render_one(&templates, "index.html", serde_json::json!({"ok": true})).await,
        "yes"
    );
    assert_eq!(
        render_one(&templates, "index.html", serde_json::json!({"ok": false})).await,
        ""
    );
}

#[tokio::test]
async fn each_over_array() {
    let out = render_one(
        &[(
            "index.html",
            "<ul><each:user in=\"users\"><li>#{user_index}: #{user.name}</li></each:user></ul>",
        )],
        "index.html",
        serde_json::json!({"users": [{"name": "Alice"}, {"name": "Joe"}]}),
    )
    .await;
    assert_eq!(out, "<ul><li>0: Alice</li><li>1: Joe</li></ul>");
}

#[tokio::test]
async fn each_over_object_iterates_sorted_keys() {
    let out = render_one(
        &[(
            "index.html",
            "<ul><each:user in=\"users\"><li>#{user_key}: #{user}</li></each:user></ul>",
        )],
        "index.html",
        serde_json::json!({"users": {"bob": "Bob", "alice": "Alice"}}),
    )
    .await;
    assert_eq!(out, "<ul><li>alice: Alice</li><li>bob: Bob</li></ul>");
}

#[tokio::test]
async fn each_binds_last_and_has_next() {
    let out = render_one(
        &[(
            "index.html",
            "<each:x in='items'>#{x}<if expr='x_has_next'>,</if></each:x>",
        )],
        "index.html",
        serde_json::json!({"items": ["a", "b", "c"]}),
    )
    .await;
    assert_eq!(out, "a,b,c");
}

#[tokio::test]
async fn each_over_null_renders_nothing() {
    let out = render_one(
        &[("index.html", "[<each:x in='missing_ok'>#{x}</each:x>]")],
        "index.html",
        serde_json::json!({"missing_ok": null}),
    )
    .await;
    assert_eq!(out, "[]");
}

#[tokio::test]
async fn each_over_scalar_is_a_render_error() {
    let renderer = compiler(&[("index.html", "<each:x in='n'>#{x}</each:x>")])
        .compile("index.html")
        .await
        .unwrap();
    let err = renderer
        .render(&data(serde_json::json!({"n": 5})))
        .unwrap_err();
    assert!(matches!(err, RenderError::NonIterable { .. }));
    assert!(err.to_string().contains("index.html:1"));
}

// ── Escaping ────────────────────────────────────────────────────────────

#[tokio::test]
async fn escaped_and_raw_interpolation() {
    let out = render_one(
        &[("index.html", "<p>#{s}</p>!{s}")],
        "index.html",
        serde_json::json!({"s": "<&>"}),
    )
    .await;
    assert_eq!(out, "<p>&lt;&amp;&gt;</p><&>");
}

// ── Comments ────────────────────────────────────────────────────────────

#[tokio::test]
async fn comments_kept_by_default_stripped_on_request() {
    let templates = [("index.html", "before<!--hi-->after")];
    let kept = compiler(&templates)
        .render("index.html", &Value::Null)
        .await
        .unwrap();
    assert_eq!(kept, "before<!--hi-->after");

    let stripping = Compiler::new(loader(&templates), Options::new().strip_comments(true));
    let stripped = stripping.render("index.html", &Value::Null).await.unwrap();
    assert_eq!(stripped, "beforeafter");
}

// ── Scoping ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn var_binds_for_later_interpolation() {
    let out = render_one(
        &[("index.html", "<var:x>1 + 1</var:x>#{x}")],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "2");
}

#[tokio::test]
async fn include_scope_does_not_leak() {
    let out = render_one(
        &[
            ("index.html", "<include file='inner.html'/>[#{x}]"),
            ("inner.html", "<var:x>'inner'</var:x>#{x}"),
        ],
        "index.html",
        serde_json::json!({"x": "outer"}),
    )
    .await;
    assert_eq!(out, "inner[outer]");
}

#[tokio::test]
async fn if_scope_does_not_leak() {
    let out = render_one(
        &[(
            "index.html",
            "<if expr='true'><var:x>'in'</var:x>#{x}</if>[#{x}]",
        )],
        "index.html",
        serde_json::json!({"x": "out"}),
    )
    .await;
    assert_eq!(out, "in[out]");
}

#[tokio::test]
async fn each_iterations_are_isolated() {
    let out = render_one(
        &[(
            "index.html",
            "<each:i in='items'><var:x>i</var:x>#{x}</each:i>[#{x}]",
        )],
        "index.html",
        serde_json::json!({"items": [1, 2], "x": "out"}),
    )
    .await;
    assert_eq!(out, "12[out]");
}

#[tokio::test]
async fn include_var_children_seed_the_include_scope() {
    let out = render_one(
        &[
            (
                "index.html",
                "<include file='greet.html'><var:name>'Bob'</var:name></include>",
            ),
            ("greet.html", "Hello #{name}"),
        ],
        "index.html",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(out, "Hello Bob");
}

#[tokio::test]
async fn outer_bindings_stay_visible_inside_includes() {
    let out = render_one(
        &[
            ("index.html", "<include file='inner.html'/>"),
            ("inner.html", "#{greeting}"),
        ],
        "index.html",
        serde_json::json!({"greeting": "hi"}),
    )
    .await;
    assert_eq!(out, "hi");
}

// ── Globals ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn globals_are_available_in_expressions() {
    let out = render_one(
        &[(
            "index.html",
            "#{encodeURIComponent(q)} #{Math.floor(n)} !{JSON.stringify(user)}",
        )],
        "index.html",
        serde_json::json!({"q": "a b", "n": 2.9, "user": {"a": true}}),
    )
    .await;
    assert_eq!(out, "a%20b 2 {\"a\":true}");
}

#[tokio::test]
async fn user_data_shadows_globals() {
    let out = render_one(
        &[("index.html", "#{Math}")],
        "index.html",
        serde_json::json!({"Math": "mine"}),
    )
    .await;
    assert_eq!(out, "mine");
}

// ── Renderer contract ───────────────────────────────────────────────────

#[tokio::test]
async fn renders_are_deterministic_and_reusable() {
    let renderer = compiler(&[
        ("index.html", "<include file='a.html'/>#{x}"),
        ("a.html", "A"),
    ])
    .compile("index.html")
    .await
    .unwrap();

    let env = data(serde_json::json!({"x": 1}));
    let first = renderer.render(&env).unwrap();
    let second = renderer.render(&env).unwrap();
    assert_eq!(first, "A1");
    assert_eq!(first, second);

    let other = renderer.render(&data(serde_json::json!({"x": 2}))).unwrap();
    assert_eq!(other, "A2");
}

#[tokio::test]
async fn render_data_must_be_an_object_or_null() {
    let renderer = compiler(&[("index.html", "x")])
        .compile("index.html")
        .await
        .unwrap();
    assert_eq!(renderer.render(&Value::Null).unwrap(), "x");
    assert!(matches!(
        renderer.render(&Value::from(5i64)),
        Err(RenderError::Data { .. })
    ));
}

#[tokio::test]
async fn expression_failures_carry_template_locations() {
    let renderer = compiler(&[("index.html", "line one\n  #{missing}")])
        .compile("index.html")
        .await
        .unwrap();
    let err = renderer.render(&Value::Null).unwrap_err();
    match &err {
        RenderError::Expression { expr, loc, .. } => {
            assert_eq!(expr, "missing");
            assert_eq!(loc.file.as_ref(), "index.html");
            assert_eq!(loc.line, 2);
            assert_eq!(loc.column, 3);
        }
        other => panic!("expected expression error, got {other:?}"),
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_failures_name_the_path() {
    let err = compiler(&[("index.html", "<include file='missing.html'/>")])
        .compile("index.html")
        .await
        .unwrap_err();
    match &err {
        CompileError::Load { path, .. } => assert_eq!(path, "missing.html"),
        other => panic!("expected load error, got {other:?}"),
    }
}

#[tokio::test]
async fn syntax_errors_name_the_file_and_position() {
    let err = compiler(&[("index.html", "ok\n<block:a>unterminated")])
        .compile("index.html")
        .await
        .unwrap_err();
    match &err {
        CompileError::Syntax { path, source } => {
            assert_eq!(path, "index.html");
            assert!(source.line >= 2, "line was {}", source.line);
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
}
