//! Error types for building and rendering.

use thiserror::Error;

use crate::key::CompKey;
use crate::vnode::VNodeKind;

/// Errors that abort a build pass.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A component's build operation failed.
    #[error("component `{component}` failed to build: {message}")]
    Failed {
        component: &'static str,
        message: String,
    },

    /// The same key was used twice within one pass.
    #[error("component key {0} used more than once in a single pass")]
    DuplicateKey(CompKey),

    /// An instance was fetched from the cache but never marked used.
    #[error("component key {0} was fetched from the cache but never marked used")]
    UnusedCachedComponent(CompKey),

    /// One instance was referenced from more than one place.
    #[error("component instance `{0}` was referenced more than once in a single pass")]
    InstanceReused(&'static str),

    /// A child instance was placed in the tree without going through the cache.
    #[error("component `{0}` was referenced without being registered with the build environment")]
    Unregistered(&'static str),

    #[error("component `{component}` produced {count} root nodes, expected exactly one")]
    RootCount {
        component: &'static str,
        count: usize,
    },
}

impl BuildError {
    /// Failure raised from inside a build function; the build environment
    /// fills in the component name.
    pub fn failed(message: impl Into<String>) -> Self {
        BuildError::Failed {
            component: "",
            message: message.into(),
        }
    }

    pub(crate) fn in_component(self, name: &'static str) -> Self {
        match self {
            BuildError::Failed { component, message } if component.is_empty() => {
                BuildError::Failed {
                    component: name,
                    message,
                }
            }
            other => other,
        }
    }
}

/// Errors raised while reconciling or serializing a build result.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("build output has {0} root nodes, expected exactly one")]
    RootCount(usize),

    #[error("no build output recorded for component `{0}`")]
    MissingOutput(&'static str),

    #[error("unexpected {0:?} node at the root of the output")]
    BadRoot(VNodeKind),

    #[error("CSS output must be a <style> or <link> element, found {0}")]
    BadCss(String),

    /// Content that cannot be written as HTML without changing its meaning.
    #[error("cannot serialize {0}")]
    Unserializable(String),

    #[error("no `{event_type}` handler (capture: {capture}) registered on node {node}")]
    NoHandler {
        node: String,
        event_type: String,
        capture: bool,
    },

    /// The external DOM layer rejected an operation.
    #[error("DOM layer error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;
