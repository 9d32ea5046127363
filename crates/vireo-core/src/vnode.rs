use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::component::ComponentRef;
use crate::key::IterKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VNodeKind {
    Element,
    Text,
    Comment,
    /// Children are spliced into the parent; the fragment itself is never emitted.
    Fragment,
    /// Placeholder for a component's own build output.
    Component,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attr {
    /// Namespace URI, for attributes such as `xlink:href`.
    pub namespace: Option<String>,
    /// Qualified name.
    pub key: String,
    pub value: String,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: None,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Same namespace and qualified name.
    pub fn same_name(&self, other: &Attr) -> bool {
        self.key == other.key && self.namespace == other.namespace
    }

    /// Whether `name` can be written as an HTML attribute name.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && !name.chars().any(|c| {
                c.is_whitespace()
                    || c.is_control()
                    || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
            })
    }
}

/// A JavaScript property assigned directly on the element (`value`,
/// `checked`, ...) instead of going through an attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Prop {
    pub key: String,
    pub value: serde_json::Value,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ListenerFlags: u8 {
        const CAPTURE = 0b01;
        const PASSIVE = 0b10;
    }
}

/// Event payload handed to handlers by the DOM layer.
#[derive(Clone, Debug, Default)]
pub struct DomEvent {
    pub event_type: String,
    /// Flattened event properties (`"key"`, `"target.value"`, ...).
    pub summary: BTreeMap<String, String>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.summary.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.summary.get(key).map(String::as_str)
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub type EventCallback = Arc<dyn Fn(&mut DomEvent) + Send + Sync>;

#[derive(Clone)]
pub struct EventHandlerSpec {
    pub event_type: String,
    pub flags: ListenerFlags,
    pub handler: EventCallback,
}

impl EventHandlerSpec {
    pub fn capture(&self) -> bool {
        self.flags.contains(ListenerFlags::CAPTURE)
    }

    /// Identity of the listener as seen by the DOM layer (handler excluded).
    pub fn signature(&self) -> (&str, ListenerFlags) {
        (&self.event_type, self.flags)
    }
}

impl fmt::Debug for EventHandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlerSpec")
            .field("event_type", &self.event_type)
            .field("flags", &self.flags)
            .field("handler", &"<callback>")
            .finish()
    }
}

/// One node of a pass-local virtual tree.
///
/// Fields are private so the shape invariants hold: a component placeholder
/// carries nothing but its reference, and a raw HTML override hides any
/// structured children.
#[derive(Clone)]
pub struct VNode {
    kind: VNodeKind,
    tag: String,
    namespace: Option<String>,
    data: String,
    attrs: SmallVec<[Attr; 4]>,
    props: SmallVec<[Prop; 1]>,
    inner_html: Option<String>,
    children: Vec<VNode>,
    handlers: SmallVec<[EventHandlerSpec; 2]>,
    component: Option<ComponentRef>,
    key: Option<IterKey>,
}

impl VNode {
    fn blank(kind: VNodeKind) -> Self {
        VNode {
            kind,
            tag: String::new(),
            namespace: None,
            data: String::new(),
            attrs: SmallVec::new(),
            props: SmallVec::new(),
            inner_html: None,
            children: Vec::new(),
            handlers: SmallVec::new(),
            component: None,
            key: None,
        }
    }

    pub fn element(tag: impl Into<String>) -> Self {
        let mut n = Self::blank(VNodeKind::Element);
        n.tag = tag.into();
        n
    }

    pub fn element_ns(namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        let mut n = Self::element(tag);
        n.namespace = Some(namespace.into());
        n
    }

    pub fn text(text: impl Into<String>) -> Self {
        let mut n = Self::blank(VNodeKind::Text);
        n.data = text.into();
        n
    }

    pub fn comment(text: impl Into<String>) -> Self {
        let mut n = Self::blank(VNodeKind::Comment);
        n.data = text.into();
        n
    }

    pub fn fragment() -> Self {
        Self::blank(VNodeKind::Fragment)
    }

    /// Placeholder for `component`; see [`crate::BuildOut::component_node`].
    pub fn component(component: ComponentRef, key: Option<IterKey>) -> Self {
        let mut n = Self::blank(VNodeKind::Component);
        n.component = Some(component);
        n.key = key;
        n
    }

    fn accepts_content(&self, what: &str) -> bool {
        match self.kind {
            VNodeKind::Element | VNodeKind::Fragment => true,
            kind => {
                log::warn!("ignoring {what} on {kind:?} node");
                false
            }
        }
    }

    /// Sets an attribute, replacing any earlier value for the same key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.put_attr(Attr::new(key, value));
    }

    /// Sets a namespaced attribute; `key` is the qualified name.
    pub fn set_attr_ns(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.put_attr(Attr {
            namespace: Some(namespace.into()),
            ..Attr::new(key, value)
        });
    }

    fn put_attr(&mut self, attr: Attr) {
        if self.kind != VNodeKind::Element {
            log::warn!("ignoring attribute on {:?} node", self.kind);
            return;
        }
        match self.attrs.iter_mut().find(|a| a.same_name(&attr)) {
            Some(existing) => existing.value = attr.value,
            None => self.attrs.push(attr),
        }
    }

    /// Removes the un-namespaced attribute `key`.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let idx = self
            .attrs
            .iter()
            .position(|a| a.key == key && a.namespace.is_none())?;
        Some(self.attrs.remove(idx).value)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn attr_ns(
        mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_attr_ns(namespace, key, value);
        self
    }

    /// Sets a JavaScript property, replacing any earlier value for `key`.
    pub fn set_prop(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        if self.kind != VNodeKind::Element {
            log::warn!("ignoring property on {:?} node", self.kind);
            return;
        }
        let key = key.into();
        let value = value.into();
        match self.props.iter_mut().find(|p| p.key == key) {
            Some(existing) => existing.value = value,
            None => self.props.push(Prop { key, value }),
        }
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set_prop(key, value);
        self
    }

    pub fn push_child(&mut self, child: VNode) {
        if self.accepts_content("child") {
            self.children.push(child);
        }
    }

    pub fn child(mut self, child: VNode) -> Self {
        self.push_child(child);
        self
    }

    pub fn with_children(mut self, kids: impl IntoIterator<Item = VNode>) -> Self {
        for kid in kids {
            self.push_child(kid);
        }
        self
    }

    /// Raw HTML override. Takes precedence over any structured children.
    pub fn set_inner_html(&mut self, html: impl Into<String>) {
        if self.kind != VNodeKind::Element {
            log::warn!("ignoring inner HTML on {:?} node", self.kind);
            return;
        }
        self.inner_html = Some(html.into());
    }

    pub fn inner_html(mut self, html: impl Into<String>) -> Self {
        self.set_inner_html(html);
        self
    }

    pub fn on(self, event_type: impl Into<String>, f: impl Fn(&mut DomEvent) + Send + Sync + 'static) -> Self {
        self.on_with(event_type, ListenerFlags::empty(), f)
    }

    pub fn on_with(
        mut self,
        event_type: impl Into<String>,
        flags: ListenerFlags,
        f: impl Fn(&mut DomEvent) + Send + Sync + 'static,
    ) -> Self {
        if self.kind == VNodeKind::Element {
            self.handlers.push(EventHandlerSpec {
                event_type: event_type.into(),
                flags,
                handler: Arc::new(f),
            });
        } else {
            log::warn!("ignoring event handler on {:?} node", self.kind);
        }
        self
    }

    /// Key used to match this node among its siblings across passes.
    pub fn with_key(mut self, key: impl Into<IterKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn kind(&self) -> VNodeKind {
        self.kind
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Content of a text or comment node.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.get_attr_ns(None, key)
    }

    pub fn get_attr_ns(&self, namespace: Option<&str>, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    pub fn props(&self) -> &[Prop] {
        &self.props
    }

    pub fn get_prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.iter().find(|p| p.key == key).map(|p| &p.value)
    }

    pub fn raw_html(&self) -> Option<&str> {
        self.inner_html.as_deref()
    }

    /// Structured children; always empty when a raw HTML override is set.
    pub fn children(&self) -> &[VNode] {
        if self.inner_html.is_some() {
            &[]
        } else {
            &self.children
        }
    }

    pub fn handlers(&self) -> &[EventHandlerSpec] {
        &self.handlers
    }

    pub fn component_ref(&self) -> Option<&ComponentRef> {
        self.component.as_ref()
    }

    pub fn key(&self) -> Option<&IterKey> {
        self.key.as_ref()
    }

    pub fn is_element(&self, tag: &str) -> bool {
        self.kind == VNodeKind::Element && self.tag.eq_ignore_ascii_case(tag)
    }

    /// Depth-first walk over this node and its structured children.
    /// Component placeholders are visited but not entered.
    pub fn walk<E>(&self, f: &mut impl FnMut(&VNode) -> Result<(), E>) -> Result<(), E> {
        f(self)?;
        for c in self.children() {
            c.walk(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            VNodeKind::Text => f.debug_tuple("Text").field(&self.data).finish(),
            VNodeKind::Comment => f.debug_tuple("Comment").field(&self.data).finish(),
            VNodeKind::Component => f
                .debug_struct("Component")
                .field(
                    "type",
                    &self.component.as_ref().map(|c| c.type_name()).unwrap_or("?"),
                )
                .field("key", &self.key)
                .finish(),
            VNodeKind::Fragment => f
                .debug_struct("Fragment")
                .field("children", &self.children)
                .finish(),
            VNodeKind::Element => f
                .debug_struct("Element")
                .field("tag", &self.tag)
                .field("namespace", &self.namespace)
                .field("attrs", &self.attrs)
                .field("props", &self.props)
                .field("inner_html", &self.inner_html)
                .field("key", &self.key)
                .field("handlers", &self.handlers.len())
                .field("children", &self.children)
                .finish(),
        }
    }
}
