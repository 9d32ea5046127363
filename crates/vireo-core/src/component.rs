use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::build_env::BuildIn;
use crate::error::{BuildError, RenderError};
use crate::key::CompKey;
use crate::lifecycle::{BeforeBuild, Compute, Init, Release, Rendered, WireAcceptor};
use crate::vnode::VNode;

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A UI component: state plus a build operation producing its subtree.
///
/// Optional capabilities are probed through the `as_*` methods; override the
/// ones the component implements and return `Some(self)`.
pub trait Component: AsAny + Send {
    fn build(&mut self, input: &mut BuildIn<'_>) -> Result<BuildOut, BuildError>;

    fn as_init(&mut self) -> Option<&mut dyn Init> {
        None
    }
    fn as_compute(&mut self) -> Option<&mut dyn Compute> {
        None
    }
    fn as_before_build(&mut self) -> Option<&mut dyn BeforeBuild> {
        None
    }
    fn as_rendered(&mut self) -> Option<&mut dyn Rendered> {
        None
    }
    fn as_release(&mut self) -> Option<&mut dyn Release> {
        None
    }
    fn as_wire_acceptor(&mut self) -> Option<&mut dyn WireAcceptor> {
        None
    }
}

/// Typed handle to a live component instance.
pub type Handle<C> = Arc<Mutex<C>>;

/// Identity of a live instance (address of its shared allocation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

/// Type-erased shared reference to a component instance.
#[derive(Clone)]
pub struct ComponentRef {
    inner: Arc<Mutex<dyn Component>>,
    any: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ComponentRef {
    pub fn new<C: Component>(component: C) -> Self {
        Self::from_handle(Arc::new(Mutex::new(component)))
    }

    pub fn from_handle<C: Component>(handle: Handle<C>) -> Self {
        let any: Arc<dyn Any + Send + Sync> = handle.clone();
        let inner: Arc<Mutex<dyn Component>> = handle;
        Self {
            inner,
            any,
            type_name: std::any::type_name::<C>(),
        }
    }

    pub fn id(&self) -> ComponentId {
        ComponentId(Arc::as_ptr(&self.inner).cast::<()>() as usize)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Recovers the typed handle; `None` if the instance is of another type.
    pub fn downcast<C: Component>(&self) -> Option<Handle<C>> {
        self.any.clone().downcast::<Mutex<C>>().ok()
    }

    pub fn is<C: Component>(&self) -> bool {
        self.any.is::<Mutex<C>>()
    }

    pub fn lock(&self) -> MutexGuard<'_, dyn Component> {
        self.inner.lock()
    }

    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("type", &self.type_name)
            .field("id", &self.id())
            .finish()
    }
}

/// What one component's build produced.
#[derive(Debug, Default)]
pub struct BuildOut {
    /// Output nodes; a well-formed component emits exactly one.
    pub out: Vec<VNode>,
    /// Component instances referenced from `out`, in walk order.
    pub components: Vec<ComponentRef>,
    pub css: Vec<VNode>,
    pub js: Vec<VNode>,
}

impl BuildOut {
    pub fn new(root: VNode) -> Self {
        Self {
            out: vec![root],
            ..Default::default()
        }
    }

    /// Records `component` as touched and returns its placeholder node.
    pub fn component_node(&mut self, key: &CompKey, component: &ComponentRef) -> VNode {
        self.components.push(component.clone());
        VNode::component(component.clone(), key.iter.clone())
    }

    pub fn set_root(&mut self, root: VNode) {
        self.out.clear();
        self.out.push(root);
    }

    /// The single root node.
    pub fn root(&self) -> Result<&VNode, RenderError> {
        match self.out.as_slice() {
            [root] => Ok(root),
            other => Err(RenderError::RootCount(other.len())),
        }
    }
}

/// Everything one build pass produced, keyed by component instance.
#[derive(Debug)]
pub struct BuildResults {
    root: ComponentRef,
    all: HashMap<ComponentId, BuildOut>,
    order: Vec<ComponentRef>,
    pub(crate) created: usize,
    pub(crate) evicted: usize,
}

impl BuildResults {
    pub(crate) fn new(root: ComponentRef) -> Self {
        Self {
            root,
            all: HashMap::new(),
            order: Vec::new(),
            created: 0,
            evicted: 0,
        }
    }

    pub(crate) fn insert(&mut self, component: ComponentRef, out: BuildOut) {
        self.all.insert(component.id(), out);
        self.order.push(component);
    }

    pub(crate) fn contains(&self, component: &ComponentRef) -> bool {
        self.all.contains_key(&component.id())
    }

    pub fn root(&self) -> &ComponentRef {
        &self.root
    }

    /// Output of the root component.
    pub fn out(&self) -> Result<&BuildOut, RenderError> {
        self.result_for(&self.root)
    }

    pub fn result_for(&self, component: &ComponentRef) -> Result<&BuildOut, RenderError> {
        self.all
            .get(&component.id())
            .ok_or(RenderError::MissingOutput(component.type_name()))
    }

    /// Root node of `component`'s output.
    pub fn root_of(&self, component: &ComponentRef) -> Result<&VNode, RenderError> {
        self.result_for(component)?.root()
    }

    /// Touched components in build order (root first).
    pub fn components(&self) -> &[ComponentRef] {
        &self.order
    }

    /// Instances created during this pass.
    pub fn created(&self) -> usize {
        self.created
    }

    /// Instances evicted at the end of this pass.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// CSS nodes of every touched component, in build order.
    pub fn css(&self) -> impl Iterator<Item = &VNode> {
        self.order
            .iter()
            .filter_map(|c| self.all.get(&c.id()))
            .flat_map(|o| o.css.iter())
    }

    pub fn js(&self) -> impl Iterator<Item = &VNode> {
        self.order
            .iter()
            .filter_map(|c| self.all.get(&c.id()))
            .flat_map(|o| o.js.iter())
    }
}
