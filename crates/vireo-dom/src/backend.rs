use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;
use vireo_core::{ListenerFlags, RenderError};

#[derive(Error, Debug)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: String, child: String },

    #[error("`{op}` is not valid on {node}")]
    WrongKind { op: &'static str, node: String },

    #[error("`{0}` is not a valid attribute name")]
    InvalidName(String),

    #[error("injected failure in `{0}`")]
    Injected(&'static str),
}

impl From<DomError> for RenderError {
    fn from(e: DomError) -> Self {
        RenderError::Backend(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, DomError>;

/// A `<style>` or `<link>` tag contributed by a component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CssTag {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    /// Inline stylesheet text (`<style>` only).
    pub text: String,
}

/// Primitive operations the live renderer issues against an external DOM.
///
/// `insert_before` with a node that is already attached moves it. Removing a
/// child releases its whole subtree.
pub trait DomBackend {
    type Node: Copy + Eq + Hash + Debug;

    /// Container the rendered tree is mounted into.
    fn mount_point(&self) -> Self::Node;

    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<Self::Node>;
    fn create_text(&mut self, text: &str) -> Result<Self::Node>;
    fn create_comment(&mut self, text: &str) -> Result<Self::Node>;

    /// Sets an attribute by qualified name, within `namespace` when given.
    fn set_attribute(
        &mut self,
        node: Self::Node,
        namespace: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<()>;
    fn remove_attribute(&mut self, node: Self::Node, namespace: Option<&str>, key: &str)
    -> Result<()>;

    /// Assigns a JavaScript property on an element.
    fn set_property(&mut self, node: Self::Node, key: &str, value: &serde_json::Value)
    -> Result<()>;

    /// Content of a text or comment node.
    fn set_text(&mut self, node: Self::Node, text: &str) -> Result<()>;

    /// Replaces all children of `node` with parsed `html`.
    fn set_inner_html(&mut self, node: Self::Node, html: &str) -> Result<()>;

    fn insert_before(
        &mut self,
        parent: Self::Node,
        child: Self::Node,
        before: Option<Self::Node>,
    ) -> Result<()>;
    fn remove_child(&mut self, parent: Self::Node, child: Self::Node) -> Result<()>;

    fn add_listener(&mut self, node: Self::Node, event_type: &str, flags: ListenerFlags)
    -> Result<()>;
    fn remove_listener(
        &mut self,
        node: Self::Node,
        event_type: &str,
        flags: ListenerFlags,
    ) -> Result<()>;

    /// Replaces the document-level CSS tags.
    fn set_css(&mut self, tags: &[CssTag]) -> Result<()>;

    /// Drops a node that was created but never attached, subtree included.
    /// Called on error paths and must not fail.
    fn release(&mut self, _node: Self::Node) {}
}
