//! In-memory DOM for tests and server-side rendering.

use std::collections::HashMap;
use std::fmt::Write as _;

use slotmap::SlotMap;
use vireo_core::{Attr, ListenerFlags};

use crate::backend::{CssTag, DomBackend, DomError, Result};

slotmap::new_key_type! {
    pub struct NodeId;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemNodeKind {
    Element {
        tag: String,
        namespace: Option<String>,
    },
    Text,
    Comment,
}

#[derive(Clone, Debug)]
pub struct MemNode {
    pub kind: MemNodeKind,
    pub attrs: Vec<Attr>,
    pub props: Vec<(String, serde_json::Value)>,
    pub text: String,
    pub inner_html: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub listeners: Vec<(String, ListenerFlags)>,
}

impl MemNode {
    fn new(kind: MemNodeKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            props: Vec::new(),
            text: String::new(),
            inner_html: None,
            children: Vec::new(),
            parent: None,
            listeners: Vec::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            MemNodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Value of the attribute with qualified name `key`, in any namespace.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, namespace: Option<&str>, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    pub fn prop(&self, key: &str) -> Option<&serde_json::Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Slot-map backed DOM. Counts every operation and can be told to fail.
pub struct MemoryDom {
    nodes: SlotMap<NodeId, MemNode>,
    root: NodeId,
    css: Vec<CssTag>,
    ops: HashMap<&'static str, usize>,
    fail_after: Option<usize>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(MemNode::new(MemNodeKind::Element {
            tag: "div".into(),
            namespace: None,
        }));
        Self {
            nodes,
            root,
            css: Vec::new(),
            ops: HashMap::new(),
            fail_after: None,
        }
    }

    /// Lets `ops` more operations succeed, then fails exactly one.
    pub fn fail_after(&mut self, ops: usize) {
        self.fail_after = Some(ops);
    }

    pub fn clear_fault(&mut self) {
        self.fail_after = None;
    }

    pub fn op_count(&self, op: &str) -> usize {
        self.ops.get(op).copied().unwrap_or(0)
    }

    pub fn total_ops(&self) -> usize {
        self.ops.values().sum()
    }

    pub fn reset_counts(&mut self) {
        self.ops.clear();
    }

    pub fn node(&self, id: NodeId) -> Option<&MemNode> {
        self.nodes.get(id)
    }

    /// Live nodes, mount point included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn css(&self) -> &[CssTag] {
        &self.css
    }

    /// Live nodes that cannot be reached from the mount point.
    pub fn orphan_count(&self) -> usize {
        let mut reachable = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                reachable += 1;
                stack.extend(node.children.iter().copied());
            }
        }
        self.nodes.len() - reachable
    }

    /// First element (document order) whose `key` attribute equals `value`.
    pub fn find_by_attr(&self, key: &str, value: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.nodes.get(id)?;
            if node.attr(key) == Some(value) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Serialized content of the mount point.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.nodes.get(self.root) {
            for c in &root.children {
                self.write_node(&mut out, *c);
            }
        }
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            MemNodeKind::Text => out.push_str(&html_escape::encode_text(&node.text)),
            MemNodeKind::Comment => {
                let _ = write!(out, "<!--{}-->", html_escape::encode_text(&node.text));
            }
            MemNodeKind::Element { tag, .. } => {
                let _ = write!(out, "<{tag}");
                for a in &node.attrs {
                    let _ = write!(
                        out,
                        " {}=\"{}\"",
                        a.key,
                        html_escape::encode_double_quoted_attribute(&a.value)
                    );
                }
                out.push('>');
                match &node.inner_html {
                    Some(html) => out.push_str(html),
                    None => {
                        for c in &node.children {
                            self.write_node(out, *c);
                        }
                    }
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn check(&mut self, op: &'static str) -> Result<()> {
        if let Some(n) = self.fail_after {
            if n == 0 {
                self.fail_after = None;
                log::debug!("injecting failure into {op}");
                return Err(DomError::Injected(op));
            }
            self.fail_after = Some(n - 1);
        }
        *self.ops.entry(op).or_default() += 1;
        Ok(())
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut MemNode> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DomError::UnknownNode(format!("{id:?}")))
    }

    fn element_mut(&mut self, id: NodeId, op: &'static str) -> Result<&mut MemNode> {
        let node = self.get_mut(id)?;
        match node.kind {
            MemNodeKind::Element { .. } => Ok(node),
            _ => Err(DomError::WrongKind {
                op,
                node: format!("{id:?}"),
            }),
        }
    }

    fn free(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(id) {
                stack.extend(node.children);
            }
        }
    }

    fn detach(&mut self, child: NodeId) -> Result<()> {
        let Some(parent) = self.get_mut(child)?.parent.take() else {
            return Ok(());
        };
        self.get_mut(parent)?.children.retain(|c| *c != child);
        Ok(())
    }

    fn create(&mut self, op: &'static str, kind: MemNodeKind, text: &str) -> Result<NodeId> {
        self.check(op)?;
        let mut node = MemNode::new(kind);
        node.text = text.to_owned();
        Ok(self.nodes.insert(node))
    }
}

impl DomBackend for MemoryDom {
    type Node = NodeId;

    fn mount_point(&self) -> NodeId {
        self.root
    }

    fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> Result<NodeId> {
        let kind = MemNodeKind::Element {
            tag: tag.to_owned(),
            namespace: namespace.map(str::to_owned),
        };
        self.create("create_element", kind, "")
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId> {
        self.create("create_text", MemNodeKind::Text, text)
    }

    fn create_comment(&mut self, text: &str) -> Result<NodeId> {
        self.create("create_comment", MemNodeKind::Comment, text)
    }

    fn set_attribute(
        &mut self,
        node: NodeId,
        namespace: Option<&str>,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.check("set_attribute")?;
        if !Attr::is_valid_name(key) {
            return Err(DomError::InvalidName(key.to_owned()));
        }
        let node = self.element_mut(node, "set_attribute")?;
        let attr = Attr {
            namespace: namespace.map(str::to_owned),
            ..Attr::new(key, value)
        };
        match node.attrs.iter_mut().find(|a| a.same_name(&attr)) {
            Some(existing) => existing.value = attr.value,
            None => node.attrs.push(attr),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeId, namespace: Option<&str>, key: &str) -> Result<()> {
        self.check("remove_attribute")?;
        self.element_mut(node, "remove_attribute")?
            .attrs
            .retain(|a| !(a.key == key && a.namespace.as_deref() == namespace));
        Ok(())
    }

    fn set_property(&mut self, node: NodeId, key: &str, value: &serde_json::Value) -> Result<()> {
        self.check("set_property")?;
        let node = self.element_mut(node, "set_property")?;
        match node.props.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.clone(),
            None => node.props.push((key.to_owned(), value.clone())),
        }
        Ok(())
    }

    fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        self.check("set_text")?;
        let node = self.get_mut(id)?;
        if let MemNodeKind::Element { .. } = node.kind {
            return Err(DomError::WrongKind {
                op: "set_text",
                node: format!("{id:?}"),
            });
        }
        node.text = text.to_owned();
        Ok(())
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        self.check("set_inner_html")?;
        let node = self.element_mut(node, "set_inner_html")?;
        let old = std::mem::take(&mut node.children);
        node.inner_html = (!html.is_empty()).then(|| html.to_owned());
        for c in old {
            self.free(c);
        }
        Ok(())
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) -> Result<()> {
        self.check("insert_before")?;
        self.element_mut(parent, "insert_before")?;
        self.detach(child)?;
        let p = self.get_mut(parent)?;
        let at = match before {
            Some(b) => p
                .children
                .iter()
                .position(|c| *c == b)
                .ok_or_else(|| DomError::NotAChild {
                    parent: format!("{parent:?}"),
                    child: format!("{b:?}"),
                })?,
            None => p.children.len(),
        };
        p.children.insert(at, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check("remove_child")?;
        if self.get_mut(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild {
                parent: format!("{parent:?}"),
                child: format!("{child:?}"),
            });
        }
        self.detach(child)?;
        self.free(child);
        Ok(())
    }

    fn add_listener(&mut self, node: NodeId, event_type: &str, flags: ListenerFlags) -> Result<()> {
        self.check("add_listener")?;
        self.element_mut(node, "add_listener")?
            .listeners
            .push((event_type.to_owned(), flags));
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        flags: ListenerFlags,
    ) -> Result<()> {
        self.check("remove_listener")?;
        self.element_mut(node, "remove_listener")?
            .listeners
            .retain(|(t, f)| !(t == event_type && *f == flags));
        Ok(())
    }

    fn set_css(&mut self, tags: &[CssTag]) -> Result<()> {
        self.check("set_css")?;
        self.css = tags.to_vec();
        Ok(())
    }

    fn release(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        *self.ops.entry("release").or_default() += 1;
        if let Err(e) = self.detach(node) {
            log::debug!("releasing {node:?}: {e}");
        }
        self.free(node);
    }
}
