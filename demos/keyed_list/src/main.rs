use std::sync::Arc;

use vireo_core::*;
use vireo_dom::{LiveRenderer, MemoryDom};
use vireo_platform::{App, AppConfig, render_static_page};
use vireo_static::StaticRendererConfig;

const TASK_SITE: u64 = 0xde30_0001;

#[derive(Clone)]
struct Task {
    id: u32,
    title: String,
}

struct Tasks {
    items: Vec<Task>,
}

struct TaskRow {
    task: Task,
    done: Arc<std::sync::atomic::AtomicBool>,
}

impl Component for TaskRow {
    fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        use std::sync::atomic::Ordering;

        let done = self.done.clone();
        let mark = if self.done.load(Ordering::SeqCst) { "✓" } else { "○" };
        Ok(BuildOut::new(
            VNode::element("li")
                .attr("data-task", self.task.id.to_string())
                .on("click", move |_| {
                    done.fetch_xor(true, Ordering::SeqCst);
                })
                .child(VNode::text(format!("{mark} {}", self.task.title))),
        ))
    }

    fn as_rendered(&mut self) -> Option<&mut dyn Rendered> {
        Some(self)
    }
}

impl Rendered for TaskRow {
    fn rendered(&mut self, ctx: &LifecycleCtx<'_>) {
        if ctx.first() {
            log::info!("task {} on screen", self.task.id);
        }
    }
}

struct TaskList {
    env: Arc<EventEnv<Tasks>>,
}

impl Component for TaskList {
    fn build(&mut self, input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let state = self.env.read();
        let mut out = BuildOut::new(VNode::element("ul"));
        let mut ul = VNode::element("ul").attr("class", "tasks");
        for task in &state.items {
            let key = input.comp_key(TASK_SITE, Some(IterKey::from(task.id)));
            let (row, _) = input.component(&key, || TaskRow {
                task: task.clone(),
                done: Default::default(),
            })?;
            ul.push_child(out.component_node(&key, &row));
        }
        out.set_root(
            VNode::element("section")
                .child(VNode::element("h1").child(VNode::text(format!("{} tasks", state.items.len()))))
                .child(ul),
        );
        Ok(out)
    }
}

fn click(app: &App<Tasks, LiveRenderer<MemoryDom>>, id: u32) -> anyhow::Result<()> {
    let dom = app.renderer().dom();
    let node = dom
        .find_by_attr("data-task", &id.to_string())
        .ok_or_else(|| anyhow::anyhow!("task {id} is not mounted"))?;
    app.renderer()
        .dispatch_event(&**app.event_env(), node, "click", false, &mut DomEvent::new("click"))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let tasks = (1..=4)
        .map(|id| Task {
            id,
            title: format!("Task #{id}"),
        })
        .collect();
    let env = Arc::new(EventEnv::new(Tasks { items: tasks }));
    let root = ComponentRef::new(TaskList { env: env.clone() });

    let config = AppConfig {
        inspector: true,
        log_passes: true,
        ..Default::default()
    };
    let mut app = App::new(env.clone(), root.clone(), LiveRenderer::new(MemoryDom::new()))
        .with_config(config);

    app.render_once()?;
    println!("{}", app.renderer().dom().to_html());

    click(&app, 2)?;
    click(&app, 4)?;
    app.render_once()?;
    println!("{}", app.renderer().dom().to_html());

    // Drop task 3 and move task 4 to the front; rows 2 and 4 keep their state.
    env.update(|s| {
        s.items.retain(|t| t.id != 3);
        s.items.rotate_right(1);
    });
    app.render_once()?;
    println!("{}", app.renderer().dom().to_html());
    log::info!("last pass: {:?}", app.renderer().stats());

    if let Some(insp) = app.inspector() {
        println!("{}", insp.summary());
    }

    let page = render_static_page(
        &root,
        StaticRendererConfig {
            pretty: true,
            ..Default::default()
        },
    )?;
    println!("{page}");
    Ok(())
}
