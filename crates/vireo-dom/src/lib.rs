//! Live renderer.
//!
//! [`LiveRenderer`] keeps a mirror of what it last applied to a
//! [`DomBackend`] and, on each pass, issues only the operations needed to
//! bring the DOM in line with the new build output. [`MemoryDom`] is an
//! in-memory backend for tests and server-side use.

pub mod backend;
pub mod memory;
pub mod reconcile;

pub use backend::*;
pub use memory::*;
pub use reconcile::*;

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LiveRendererConfig {
    /// Push component CSS tags to the DOM layer.
    pub sync_css: bool,
    /// Match children by iteration key when both sides carry one.
    pub keyed_children: bool,
}

impl Default for LiveRendererConfig {
    fn default() -> Self {
        Self {
            sync_css: true,
            keyed_children: true,
        }
    }
}
