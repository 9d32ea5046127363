use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use vireo_core::*;
use vireo_dom::{LiveRenderer, MemoryDom};
use vireo_platform::{App, AppConfig};

#[derive(Default)]
struct Counters {
    left: u32,
    right: u32,
}

struct Status {
    env: Arc<EventEnv<Counters>>,
    torn: Arc<AtomicUsize>,
}

impl Component for Status {
    fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
        let s = self.env.read();
        if s.left != s.right {
            self.torn.fetch_add(1, Ordering::SeqCst);
        }
        Ok(BuildOut::new(
            VNode::element("p").child(VNode::text(format!("left={} right={}", s.left, s.right))),
        ))
    }
}

fn setup() -> (
    Arc<EventEnv<Counters>>,
    Arc<AtomicUsize>,
    App<Counters, LiveRenderer<MemoryDom>>,
) {
    let _ = env_logger::builder().is_test(true).try_init();
    let env = Arc::new(EventEnv::new(Counters::default()));
    let torn = Arc::new(AtomicUsize::new(0));
    let root = ComponentRef::new(Status {
        env: env.clone(),
        torn: torn.clone(),
    });
    let app = App::new(env.clone(), root, LiveRenderer::new(MemoryDom::new()));
    (env, torn, app)
}

#[test]
fn test_two_writers_coalesce_into_one_render() {
    let (env, _, mut app) = setup();
    app.render_once().unwrap();
    assert_eq!(app.renderer().dom().to_html(), "<p>left=0 right=0</p>");

    let barrier = Arc::new(Barrier::new(2));
    let writers: Vec<_> = [true, false]
        .into_iter()
        .map(|left| {
            let env = env.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut state = env.lock();
                if left {
                    state.left += 1;
                } else {
                    state.right += 1;
                }
                state.unlock_render();
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    assert_eq!(env.render_handle().requests(), 2);
    assert!(env.wait());
    app.render_once().unwrap();
    assert_eq!(app.renderer().dom().to_html(), "<p>left=1 right=1</p>");
    // Both requests were consumed by the single wakeup.
    assert!(!env.render_handle().is_pending());
    assert_eq!(app.passes(), 2);
}

#[test]
fn test_builds_never_see_half_applied_updates() {
    let (env, torn, app) = setup();
    let mut app = app.with_config(AppConfig {
        inspector: true,
        ..Default::default()
    });

    let writer = {
        let env = env.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                let mut state = env.lock();
                state.left += 1;
                thread::yield_now();
                state.right += 1;
                state.unlock_render();
            }
            env.shutdown();
        })
    };

    app.run().unwrap();
    writer.join().unwrap();

    assert_eq!(torn.load(Ordering::SeqCst), 0);
    assert!(app.passes() >= 1 && app.passes() <= 51);
    let insp = app.inspector().unwrap();
    assert_eq!(insp.hud.pass_count(), app.passes());
}

#[test]
fn test_max_passes_bounds_the_loop() {
    let (env, _, app) = setup();
    let mut app = app.with_config(AppConfig {
        max_passes: Some(2),
        ..Default::default()
    });
    env.update(|s| s.left = 3);
    env.request_render();
    env.request_render();

    app.run().unwrap();
    assert_eq!(app.passes(), 2);
    assert!(!env.render_handle().is_pending());
}

#[test]
fn test_unlock_only_does_not_wake_the_loop() {
    let (env, _, mut app) = setup();
    app.render_once().unwrap();
    let mut state = env.lock();
    state.left = 9;
    state.unlock_only();
    assert!(!env.render_handle().is_pending());
    assert_eq!(
        env.render_handle()
            .wait_timeout(std::time::Duration::from_millis(10)),
        None
    );
}
