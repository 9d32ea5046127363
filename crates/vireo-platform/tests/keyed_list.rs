use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use vireo_core::*;
use vireo_dom::{LiveRenderer, MemoryDom};
use vireo_platform::{App, render_static_page};
use vireo_static::StaticRendererConfig;

const ROW_SITE: u64 = 0x0e2e_0001;

struct Todo {
    items: Vec<&'static str>,
}

struct Row {
    label: String,
    clicks: Arc<AtomicU32>,
}

impl Component for Row {
    fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let clicks = self.clicks.clone();
        let li = VNode::element("li")
            .attr("data-row", self.label.clone())
            .child(VNode::element("span").child(VNode::text(self.label.clone())))
            .child(
                VNode::element("button")
                    .attr("data-click", self.label.clone())
                    .on("click", move |_| {
                        clicks.fetch_add(1, Ordering::SeqCst);
                    })
                    .child(VNode::text("+")),
            )
            .child(
                VNode::element("b")
                    .child(VNode::text(self.clicks.load(Ordering::SeqCst).to_string())),
            );
        Ok(BuildOut::new(li))
    }
}

struct List {
    env: Arc<EventEnv<Todo>>,
}

impl Component for List {
    fn build(&mut self, input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let mut out = BuildOut::new(VNode::element("ul"));
        let mut ul = VNode::element("ul");
        for item in self.env.read().items.iter().copied() {
            let key = input.comp_key(ROW_SITE, Some(IterKey::from(item)));
            let (row, _) = input.component(&key, || Row {
                label: item.to_owned(),
                clicks: Arc::new(AtomicU32::new(0)),
            })?;
            ul.push_child(out.component_node(&key, &row));
        }
        out.set_root(ul);
        Ok(out)
    }
}

fn row_html(label: &str, clicks: u32) -> String {
    format!(
        r#"<li data-row="{label}"><span>{label}</span><button data-click="{label}">+</button><b>{clicks}</b></li>"#
    )
}

type TodoApp = App<Todo, LiveRenderer<MemoryDom>>;

fn click(app: &TodoApp, label: &str) {
    let node = app
        .renderer()
        .dom()
        .find_by_attr("data-click", label)
        .unwrap();
    app.renderer()
        .dispatch_event(&**app.event_env(), node, "click", false, &mut DomEvent::new("click"))
        .unwrap();
}

#[test]
fn test_keyed_rows_keep_state_and_nodes() {
    let env = Arc::new(EventEnv::new(Todo {
        items: vec!["a", "b", "c"],
    }));
    let root = ComponentRef::new(List { env: env.clone() });
    let mut app = App::new(env.clone(), root, LiveRenderer::new(MemoryDom::new()));
    app.render_once().unwrap();

    click(&app, "b");
    click(&app, "b");
    click(&app, "c");
    assert!(env.render_handle().is_pending());
    app.render_once().unwrap();
    assert_eq!(
        app.renderer().dom().to_html(),
        format!("<ul>{}{}{}</ul>", row_html("a", 0), row_html("b", 2), row_html("c", 1))
    );

    let c_li = app.renderer().dom().find_by_attr("data-row", "c");
    let a_li = app.renderer().dom().find_by_attr("data-row", "a");
    env.update(|s| s.items = vec!["c", "a"]);
    app.render_once().unwrap();

    assert_eq!(
        app.renderer().dom().to_html(),
        format!("<ul>{}{}</ul>", row_html("c", 1), row_html("a", 0))
    );
    assert_eq!(app.renderer().dom().find_by_attr("data-row", "c"), c_li);
    assert_eq!(app.renderer().dom().find_by_attr("data-row", "a"), a_li);
    let stats = app.renderer().stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.removed, 1);

    // b was evicted, so it starts over when it comes back.
    env.update(|s| s.items = vec!["c", "a", "b"]);
    app.render_once().unwrap();
    assert!(app.renderer().dom().to_html().ends_with(&format!("{}</ul>", row_html("b", 0))));
}

#[test]
fn test_static_page_matches_live_markup() {
    let env = Arc::new(EventEnv::new(Todo {
        items: vec!["x", "y"],
    }));
    let root = ComponentRef::new(List { env: env.clone() });
    let html = render_static_page(&root, StaticRendererConfig::default()).unwrap();
    assert_eq!(
        html,
        format!("<ul>{}{}</ul>", row_html("x", 0), row_html("y", 0))
    );
}
