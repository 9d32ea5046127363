//! Optional component capabilities.
//!
//! The build environment probes each instance through the `as_*` methods on
//! [`crate::Component`] and invokes whichever hooks are present:
//!
//! - [`Init`] once, before the first build of a new instance.
//! - [`Compute`] before every build.
//! - [`BeforeBuild`] immediately before every build.
//! - [`Rendered`] after each successful render that included the instance.
//! - [`Release`] when the instance is evicted from the cache.
//! - [`WireAcceptor`] once, at creation, to receive injected dependencies.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::event_env::RenderHandle;

/// Context handed to lifecycle hooks.
pub struct LifecycleCtx<'a> {
    render: Option<&'a RenderHandle>,
    first: bool,
}

impl<'a> LifecycleCtx<'a> {
    pub(crate) fn new(render: Option<&'a RenderHandle>, first: bool) -> Self {
        Self { render, first }
    }

    /// True the first time the instance passes through this hook.
    pub fn first(&self) -> bool {
        self.first
    }

    pub fn render_handle(&self) -> Option<&RenderHandle> {
        self.render
    }

    /// Schedules another render pass. No-op without an attached event environment.
    pub fn request_render(&self) {
        if let Some(r) = self.render {
            r.request_render();
        }
    }
}

pub trait Init {
    fn init(&mut self, ctx: &LifecycleCtx<'_>);
}

pub trait Compute {
    fn compute(&mut self, ctx: &LifecycleCtx<'_>);
}

pub trait BeforeBuild {
    fn before_build(&mut self);
}

pub trait Rendered {
    fn rendered(&mut self, ctx: &LifecycleCtx<'_>);
}

pub trait Release {
    fn release(&mut self, ctx: &LifecycleCtx<'_>);
}

/// Receives dependencies registered with [`crate::BuildEnv::provide`].
pub trait WireAcceptor {
    fn accept_wiring(&mut self, deps: &Deps);
}

/// Type map of dependencies available for wiring.
#[derive(Default)]
pub struct Deps {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Deps {
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.values
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|b| *b)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
