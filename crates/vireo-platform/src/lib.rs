//! Render loop runner.
//!
//! [`App`] ties a root component, a [`BuildEnv`] and a [`Renderer`] to an
//! [`EventEnv`]: it renders once, then sleeps until an event handler calls
//! `unlock_render` and renders again, until the environment shuts down.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use vireo_core::{BuildEnv, ComponentRef, EventEnv, RenderHandle, Renderer};
use vireo_devtools::{Inspector, PassMetrics, PassTimer};
use vireo_static::StaticRendererConfig;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Collect per-pass metrics in an [`Inspector`].
    pub inspector: bool,
    /// Stop after this many passes, counting the initial one.
    pub max_passes: Option<u64>,
    /// Log every pass at info level.
    pub log_passes: bool,
}

impl AppConfig {
    pub fn from_json(src: &str) -> anyhow::Result<Self> {
        serde_json::from_str(src).context("invalid app config")
    }
}

pub struct App<S, R: Renderer> {
    env: Arc<EventEnv<S>>,
    build: BuildEnv,
    renderer: R,
    root: ComponentRef,
    config: AppConfig,
    inspector: Option<Inspector>,
    passes: u64,
}

impl<S, R: Renderer> App<S, R> {
    pub fn new(env: Arc<EventEnv<S>>, root: ComponentRef, renderer: R) -> Self {
        let build = BuildEnv::new().with_render_handle(env.render_handle().clone());
        Self {
            env,
            build,
            renderer,
            root,
            config: AppConfig::default(),
            inspector: None,
            passes: 0,
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.inspector = config.inspector.then(Inspector::new);
        self.config = config;
        self
    }

    /// For registering wirers and dependencies before the first pass.
    pub fn build_env_mut(&mut self) -> &mut BuildEnv {
        &mut self.build
    }

    pub fn event_env(&self) -> &Arc<EventEnv<S>> {
        &self.env
    }

    pub fn render_handle(&self) -> RenderHandle {
        self.env.render_handle().clone()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub fn root(&self) -> &ComponentRef {
        &self.root
    }

    pub fn inspector(&self) -> Option<&Inspector> {
        self.inspector.as_ref()
    }

    /// Passes rendered so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Renders the initial tree, then one pass per wakeup until the event
    /// environment shuts down or `max_passes` is reached.
    pub fn run(&mut self) -> anyhow::Result<()> {
        log::info!("render loop started (root `{}`)", self.root.type_name());
        self.render_once()?;
        while !self.pass_limit_reached() && self.env.wait() {
            self.render_once()?;
        }
        let reason = if self.env.render_handle().is_shutdown() {
            "shutdown"
        } else {
            "pass limit"
        };
        log::info!("render loop stopped ({reason}) after {} passes", self.passes);
        Ok(())
    }

    /// One build + render under the shared read lock, followed by the
    /// `Rendered` hooks once the lock is released.
    pub fn render_once(&mut self) -> anyhow::Result<()> {
        let pass = self.passes + 1;
        let mut timer = PassTimer::start();

        let (results, build_ms) = {
            let _state = self.env.read();
            let results = match self.build.run_build(&self.root) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("pass {pass}: build failed: {e}");
                    return Err(e).context(format!("build pass {pass} failed"));
                }
            };
            let build_ms = timer.lap_ms();
            if let Err(e) = self.renderer.render(&results) {
                log::error!("pass {pass}: render failed: {e}");
                return Err(e).context(format!("render pass {pass} failed"));
            }
            (results, build_ms)
        };
        let render_ms = timer.lap_ms();

        self.build.invoke_rendered(&results);
        self.passes = pass;

        let metrics = PassMetrics {
            build_ms,
            render_ms,
            patches: self.renderer.last_patch_count(),
            ..PassMetrics::from_results(pass, &results)
        };
        if self.config.log_passes {
            log::info!(
                "pass {}: {} components, {} patches",
                pass,
                metrics.components,
                metrics.patches
            );
        }
        if let Some(insp) = &mut self.inspector {
            insp.record(metrics);
        }
        Ok(())
    }

    fn pass_limit_reached(&self) -> bool {
        self.config.max_passes.is_some_and(|max| self.passes >= max)
    }
}

/// Builds `root` once and serializes it as an HTML page.
pub fn render_static_page(root: &ComponentRef, config: StaticRendererConfig) -> anyhow::Result<String> {
    let mut env = BuildEnv::new();
    let results = env
        .run_build(root)
        .with_context(|| format!("building `{}`", root.type_name()))?;
    let html = vireo_static::render_to_string_with(&results, config)?;
    env.invoke_rendered(&results);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json() {
        let c = AppConfig::from_json(r#"{ "inspector": true, "max_passes": 3 }"#).unwrap();
        assert!(c.inspector);
        assert_eq!(c.max_passes, Some(3));
        assert!(!c.log_passes);

        assert_eq!(AppConfig::from_json("{}").unwrap(), AppConfig::default());
        assert!(AppConfig::from_json(r#"{ "max_passes": "x" }"#).is_err());
    }
}
