//! # Components, Builds, and the Event Environment
//!
//! Vireo renders a tree of stateful components into a DOM. Every render is a
//! *build pass*: the [`BuildEnv`] walks the component graph from the root,
//! asks each component for a fresh [`VNode`] subtree, and hands the combined
//! [`BuildResults`] to a [`Renderer`].
//!
//! ## Components
//!
//! A component is a plain struct implementing [`Component`]. State lives in
//! the struct; the build function turns it into nodes:
//!
//! ```rust
//! use vireo_core::*;
//!
//! struct Counter {
//!     count: i32,
//! }
//!
//! impl Component for Counter {
//!     fn build(&mut self, _input: &mut BuildIn<'_>) -> BuildResult<BuildOut> {
//!         Ok(BuildOut::new(
//!             VNode::element("span").child(VNode::text(format!("count = {}", self.count))),
//!         ))
//!     }
//! }
//!
//! let mut env = BuildEnv::new();
//! let root = ComponentRef::new(Counter { count: 3 });
//! let results = env.run_build(&root).unwrap();
//! assert_eq!(results.root_of(&root).unwrap().tag(), "span");
//! ```
//!
//! ## Child components and keys
//!
//! Children are looked up in the build environment's cache by [`CompKey`].
//! A key is a site constant XOR-ed with the running position hash, plus an
//! optional [`IterKey`] when the site sits inside a loop:
//!
//! ```rust,ignore
//! let key = input.comp_key(0x51, Some(IterKey::from(item.id)));
//! let (r, row) = input.component(&key, || Row::default())?;
//! row.lock().label = item.label.clone();
//! list.push_child(out.component_node(&key, &r));
//! ```
//!
//! The same key on the next pass yields the same instance with its state
//! intact. Keys not seen during a pass are evicted at the end of it.
//!
//! ## The event environment
//!
//! Background work mutates shared state through [`EventEnv::lock`] and
//! releases with [`EventLock::unlock_render`]; the render loop waits on the
//! same environment and rebuilds once per burst of requests.

pub mod build_env;
pub mod component;
pub mod error;
pub mod event_env;
pub mod hash;
pub mod key;
pub mod lifecycle;
pub mod mod_check;
pub mod render_api;
pub mod vnode;

pub use build_env::*;
pub use component::*;
pub use error::*;
pub use event_env::*;
pub use hash::*;
pub use key::*;
pub use lifecycle::*;
pub use mod_check::*;
pub use render_api::*;
pub use vnode::*;
