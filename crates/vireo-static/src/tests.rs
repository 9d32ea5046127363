use std::sync::Arc;

use insta::assert_snapshot;
use parking_lot::Mutex;
use vireo_core::*;

use crate::*;

const ITEM_SITE: u64 = 0x5e00_0001;

struct Item(String);

impl Component for Item {
    fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        Ok(BuildOut::new(VNode::element("li").child(VNode::text(self.0.clone()))))
    }
}

struct Page {
    title: String,
    items: Vec<&'static str>,
}

impl Component for Page {
    fn build(&mut self, input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let mut out = BuildOut::new(VNode::element("html"));
        let mut ul = VNode::element("ul");
        for item in &self.items {
            let key = input.comp_key(ITEM_SITE, Some(IterKey::from(*item)));
            let (r, _) = input.component(&key, || Item(item.to_string()))?;
            ul.push_child(out.component_node(&key, &r));
        }
        let html = VNode::element("html")
            .child(
                VNode::element("head")
                    .child(VNode::element("title").child(VNode::text(self.title.clone()))),
            )
            .child(
                VNode::element("body")
                    .child(VNode::element("h1").child(VNode::text("Items")))
                    .child(ul),
            );
        out.set_root(html);
        out.css
            .push(VNode::element("style").child(VNode::text("li > b { color: red }")));
        out.js.push(VNode::element("script").attr("src", "app.js"));
        Ok(out)
    }
}

struct Fixed {
    tree: VNode,
    css: Vec<VNode>,
}

impl Component for Fixed {
    fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let mut out = BuildOut::new(self.tree.clone());
        out.css = self.css.clone();
        Ok(out)
    }
}

fn build(c: impl Component) -> BuildResults {
    let mut env = BuildEnv::new();
    env.run_build(&ComponentRef::new(c)).unwrap()
}

fn fixed(tree: VNode) -> BuildResults {
    build(Fixed {
        tree,
        css: Vec::new(),
    })
}

#[test]
fn test_full_document() {
    let results = build(Page {
        title: "Hello & bye".into(),
        items: vec!["a", "b <c>"],
    });
    let html = render_to_string(&results).unwrap();
    assert_snapshot!(html, @r#"<!DOCTYPE html><html><head><title>Hello &amp; bye</title><style>li > b { color: red }</style></head><body><h1>Items</h1><ul><li>a</li><li>b &lt;c&gt;</li></ul><script src="app.js"></script></body></html>"#);
}

#[test]
fn test_doctype_can_be_disabled() {
    let results = build(Page {
        title: "t".into(),
        items: vec![],
    });
    let config = StaticRendererConfig {
        doctype: false,
        ..Default::default()
    };
    let html = render_to_string_with(&results, config).unwrap();
    assert!(html.starts_with("<html><head>"));
}

#[test]
fn test_pretty_output() {
    let results = fixed(
        VNode::element("div")
            .child(VNode::element("p").child(VNode::text("x")))
            .child(
                VNode::element("ul")
                    .child(VNode::element("li").child(VNode::text("a")))
                    .child(VNode::element("li").child(VNode::text("b"))),
            ),
    );
    let config = StaticRendererConfig {
        pretty: true,
        ..Default::default()
    };
    let html = render_to_string_with(&results, config).unwrap();
    assert_snapshot!(html, @r"
    <div>
      <p>x</p>
      <ul>
        <li>a</li>
        <li>b</li>
      </ul>
    </div>
    ");
}

#[test]
fn test_attributes_and_void_elements() {
    let results = fixed(
        VNode::element("form")
            .child(
                VNode::element("input")
                    .attr("type", "text")
                    .attr("value", r#"a"b & c"#),
            )
            .child(VNode::element("br"))
            .child(VNode::comment(" end ")),
    );
    let html = render_to_string(&results).unwrap();
    assert_snapshot!(html, @r#"<form><input type="text" value="a&quot;b &amp; c"><br><!-- end --></form>"#);
}

#[test]
fn test_inner_html_is_written_verbatim() {
    let results = fixed(
        VNode::element("div")
            .child(VNode::text("not me"))
            .inner_html("<b>raw & bold</b>"),
    );
    assert_snapshot!(render_to_string(&results).unwrap(), @"<div><b>raw & bold</b></div>");
}

#[test]
fn test_script_text_is_not_escaped() {
    let results = fixed(VNode::element("script").child(VNode::text("if (a < b) go();")));
    assert_snapshot!(render_to_string(&results).unwrap(), @"<script>if (a < b) go();</script>");
}

#[test]
fn test_css_without_head_goes_after_root() {
    let results = build(Fixed {
        tree: VNode::element("div").child(VNode::text("x")),
        css: vec![VNode::element("link").attr("rel", "stylesheet").attr("href", "a.css")],
    });
    assert_snapshot!(render_to_string(&results).unwrap(), @r#"<div>x</div><link rel="stylesheet" href="a.css">"#);
}

#[test]
fn test_css_must_be_style_or_link() {
    let results = build(Fixed {
        tree: VNode::element("html").child(VNode::element("head")),
        css: vec![VNode::element("div")],
    });
    let err = render_to_string(&results).unwrap_err();
    assert!(matches!(err, RenderError::BadCss(_)));
}

#[test]
fn test_renderer_writes_into_sink() {
    let mut env = BuildEnv::new();
    let root = Arc::new(Mutex::new(Fixed {
        tree: VNode::element("p").child(VNode::text("one")),
        css: Vec::new(),
    }));
    let root_ref = ComponentRef::from_handle(root.clone());
    let mut r = StaticRenderer::new(Vec::new());
    r.render(&env.run_build(&root_ref).unwrap()).unwrap();

    root.lock().tree = VNode::element("p").child(VNode::text("two"));
    r.render(&env.run_build(&root_ref).unwrap()).unwrap();
    assert_eq!(
        String::from_utf8_lossy(r.get_ref()),
        "<p>one</p><p>two</p>"
    );
}

#[test]
fn test_namespaced_attributes_and_properties() {
    let results = fixed(
        VNode::element_ns("http://www.w3.org/2000/svg", "svg")
            .child(
                VNode::element_ns("http://www.w3.org/2000/svg", "use")
                    .attr_ns("http://www.w3.org/1999/xlink", "xlink:href", "#icon"),
            )
            .child(VNode::element("input").prop("value", "typed").attr("name", "q")),
    );
    assert_snapshot!(render_to_string(&results).unwrap(), @r##"<svg><use xlink:href="#icon"></use><input name="q"></svg>"##);
}

#[test]
fn test_unwritable_attribute_names_are_rejected() {
    for name in ["", "a b", "x\"y", "onclick=x", "a>b", "a/b"] {
        let results = fixed(VNode::element("div").attr(name, "v"));
        let err = render_to_string(&results).unwrap_err();
        assert!(
            matches!(err, RenderError::Unserializable(_)),
            "{name:?} gave {err:?}"
        );
    }
    let ok = fixed(VNode::element("div").attr("data-x_1:y", "v"));
    assert_snapshot!(render_to_string(&ok).unwrap(), @r#"<div data-x_1:y="v"></div>"#);
}

#[test]
fn test_comments_that_would_close_early_are_rejected() {
    for text in ["a-->b", "a--!>b", ">a", "->a", "a<!--b", "a<!-"] {
        let results = fixed(VNode::element("div").child(VNode::comment(text)));
        let err = render_to_string(&results).unwrap_err();
        assert!(
            matches!(err, RenderError::Unserializable(_)),
            "{text:?} gave {err:?}"
        );
    }
    let ok = fixed(VNode::element("div").child(VNode::comment("a - > b -- c")));
    assert_snapshot!(render_to_string(&ok).unwrap(), @"<div><!--a - > b -- c--></div>");
}
