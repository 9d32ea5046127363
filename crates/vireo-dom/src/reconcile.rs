use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;
use vireo_core::{
    Attr, BuildResults, DomEvent, EventCallback, EventEnv, EventHandlerSpec, IterKey,
    ListenerFlags, Prop, RenderError, Renderer, VNode, VNodeKind,
};

use crate::backend::{CssTag, DomBackend};
use crate::LiveRendererConfig;

/// Patches issued by the last render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchStats {
    pub created: usize,
    pub replaced: usize,
    pub removed: usize,
    pub moved: usize,
    pub attrs_set: usize,
    pub attrs_removed: usize,
    pub props_set: usize,
    pub props_removed: usize,
    pub texts_set: usize,
    pub inner_html_set: usize,
    pub listeners_added: usize,
    pub listeners_removed: usize,
    pub css_updates: usize,
}

impl PatchStats {
    pub fn total(&self) -> usize {
        self.created
            + self.replaced
            + self.removed
            + self.moved
            + self.attrs_set
            + self.attrs_removed
            + self.props_set
            + self.props_removed
            + self.texts_set
            + self.inner_html_set
            + self.listeners_added
            + self.listeners_removed
            + self.css_updates
    }
}

type Listener = (String, ListenerFlags);

/// What the DOM currently holds for one node, as of the last render.
struct Applied<N> {
    kind: VNodeKind,
    tag: String,
    namespace: Option<String>,
    key: Option<IterKey>,
    attrs: SmallVec<[Attr; 4]>,
    props: SmallVec<[Prop; 1]>,
    text: String,
    inner_html: Option<String>,
    listeners: SmallVec<[Listener; 2]>,
    handlers: SmallVec<[EventHandlerSpec; 2]>,
    handle: N,
    children: Vec<Applied<N>>,
}

impl<N: Copy + Eq> Applied<N> {
    fn find(&self, handle: N) -> Option<&Applied<N>> {
        if self.handle == handle {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(handle))
    }
}

/// A node of the new tree after fragments and component placeholders have
/// been expanded.
#[derive(Clone, Copy)]
struct Resolved<'a> {
    node: &'a VNode,
    key: Option<&'a IterKey>,
}

fn resolve_into<'a>(
    results: &'a BuildResults,
    node: &'a VNode,
    key: Option<&'a IterKey>,
    out: &mut Vec<Resolved<'a>>,
) -> Result<(), RenderError> {
    match node.kind() {
        VNodeKind::Fragment => {
            for c in node.children() {
                resolve_into(results, c, None, out)?;
            }
        }
        VNodeKind::Component => {
            let r = node
                .component_ref()
                .ok_or(RenderError::BadRoot(VNodeKind::Component))?;
            let root = results.root_of(r)?;
            resolve_into(results, root, key.or(node.key()), out)?;
        }
        _ => out.push(Resolved {
            node,
            key: key.or(node.key()),
        }),
    }
    Ok(())
}

fn resolve_children<'a>(
    results: &'a BuildResults,
    node: &'a VNode,
) -> Result<Vec<Resolved<'a>>, RenderError> {
    let mut out = Vec::with_capacity(node.children().len());
    for c in node.children() {
        resolve_into(results, c, None, &mut out)?;
    }
    Ok(out)
}

fn listeners_of(node: &VNode) -> SmallVec<[Listener; 2]> {
    let mut out: SmallVec<[Listener; 2]> = SmallVec::new();
    for h in node.handlers() {
        let sig = (h.event_type.clone(), h.flags);
        if !out.contains(&sig) {
            out.push(sig);
        }
    }
    out
}

fn node_prop<'a>(props: &'a [Prop], key: &str) -> Option<&'a serde_json::Value> {
    props.iter().find(|p| p.key == key).map(|p| &p.value)
}

/// Indices (into `seq`) of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> HashSet<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev = vec![usize::MAX; seq.len()];
    for (i, &v) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < v);
        if pos > 0 {
            prev[i] = tails[pos - 1];
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut keep = HashSet::with_capacity(tails.len());
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        keep.insert(i);
        cur = (prev[i] != usize::MAX).then(|| prev[i]);
    }
    keep
}

/// Reconciles each build pass against the DOM layer, issuing only the
/// operations needed to turn the previous output into the new one.
pub struct LiveRenderer<D: DomBackend> {
    dom: D,
    mount: D::Node,
    config: LiveRendererConfig,
    mirror: Option<Applied<D::Node>>,
    css: Vec<CssTag>,
    poisoned: bool,
    stats: PatchStats,
}

impl<D: DomBackend> LiveRenderer<D> {
    pub fn new(dom: D) -> Self {
        Self::with_config(dom, LiveRendererConfig::default())
    }

    pub fn with_config(dom: D, config: LiveRendererConfig) -> Self {
        let mount = dom.mount_point();
        Self {
            dom,
            mount,
            config,
            mirror: None,
            css: Vec::new(),
            poisoned: false,
            stats: PatchStats::default(),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    pub fn config(&self) -> &LiveRendererConfig {
        &self.config
    }

    /// Patch counts of the most recent render, failed or not.
    pub fn stats(&self) -> PatchStats {
        self.stats
    }

    /// Set after a failed render; the next render remounts from scratch.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn root_node(&self) -> Option<D::Node> {
        self.mirror.as_ref().map(|m| m.handle)
    }

    /// DOM node reached by following child indices from the root.
    pub fn node_at(&self, path: &[usize]) -> Option<D::Node> {
        let mut cur = self.mirror.as_ref()?;
        for &i in path {
            cur = cur.children.get(i)?;
        }
        Some(cur.handle)
    }

    /// Runs the handler registered on `node` for `event_type` while holding
    /// the event environment lock, then schedules a render.
    ///
    /// Handlers run under the write lock and must not lock `env` themselves.
    pub fn dispatch_event<S>(
        &self,
        env: &EventEnv<S>,
        node: D::Node,
        event_type: &str,
        capture: bool,
        event: &mut DomEvent,
    ) -> Result<(), RenderError> {
        let handler = self
            .handler_for(node, event_type, capture)
            .ok_or_else(|| RenderError::NoHandler {
                node: format!("{node:?}"),
                event_type: event_type.to_owned(),
                capture,
            })?;
        let guard = env.lock();
        handler(event);
        guard.unlock_render();
        Ok(())
    }

    fn handler_for(&self, node: D::Node, event_type: &str, capture: bool) -> Option<EventCallback> {
        let applied = self.mirror.as_ref()?.find(node)?;
        applied
            .handlers
            .iter()
            .find(|h| h.event_type == event_type && h.capture() == capture)
            .map(|h| h.handler.clone())
    }

    fn render_pass(&mut self, results: &BuildResults) -> Result<(), RenderError> {
        let root_out = results.out()?;
        let mut top = Vec::with_capacity(1);
        resolve_into(results, root_out.root()?, None, &mut top)?;
        let new_root = match top.as_slice() {
            [one] => *one,
            [] => return Err(RenderError::RootCount(0)),
            _ => return Err(RenderError::BadRoot(VNodeKind::Fragment)),
        };

        if self.poisoned {
            log::warn!("remounting after a failed render");
            self.mirror = None;
            self.dom.set_inner_html(self.mount, "")?;
            self.poisoned = false;
        }

        match self.mirror.take() {
            None => {
                let applied = self.create(results, new_root)?;
                if let Err(e) = self.dom.insert_before(self.mount, applied.handle, None) {
                    self.dom.release(applied.handle);
                    return Err(e.into());
                }
                self.mirror = Some(applied);
            }
            Some(mut old) => {
                let mount = self.mount;
                let r = self.patch(results, mount, &mut old, new_root);
                self.mirror = Some(old);
                r?;
            }
        }

        self.sync_css(results)
    }

    fn create(
        &mut self,
        results: &BuildResults,
        new: Resolved<'_>,
    ) -> Result<Applied<D::Node>, RenderError> {
        let node = new.node;
        let handle = match node.kind() {
            VNodeKind::Element => self.dom.create_element(node.tag(), node.namespace())?,
            VNodeKind::Text => self.dom.create_text(node.data())?,
            VNodeKind::Comment => self.dom.create_comment(node.data())?,
            kind => return Err(RenderError::BadRoot(kind)),
        };
        self.stats.created += 1;

        let mut applied = Applied {
            kind: node.kind(),
            tag: node.tag().to_owned(),
            namespace: node.namespace().map(str::to_owned),
            key: new.key.cloned(),
            attrs: SmallVec::new(),
            props: SmallVec::new(),
            text: node.data().to_owned(),
            inner_html: None,
            listeners: SmallVec::new(),
            handlers: node.handlers().iter().cloned().collect(),
            handle,
            children: Vec::new(),
        };
        match self.fill(results, node, &mut applied) {
            Ok(()) => Ok(applied),
            Err(e) => {
                self.dom.release(handle);
                Err(e)
            }
        }
    }

    /// Content of a freshly created element.
    fn fill(
        &mut self,
        results: &BuildResults,
        node: &VNode,
        applied: &mut Applied<D::Node>,
    ) -> Result<(), RenderError> {
        if node.kind() != VNodeKind::Element {
            return Ok(());
        }
        let handle = applied.handle;

        for a in node.attrs() {
            self.dom
                .set_attribute(handle, a.namespace.as_deref(), &a.key, &a.value)?;
            self.stats.attrs_set += 1;
        }
        applied.attrs = node.attrs().iter().cloned().collect();

        for p in node.props() {
            self.dom.set_property(handle, &p.key, &p.value)?;
            self.stats.props_set += 1;
        }
        applied.props = node.props().iter().cloned().collect();

        let listeners = listeners_of(node);
        for (t, f) in &listeners {
            self.dom.add_listener(handle, t, *f)?;
            self.stats.listeners_added += 1;
        }
        applied.listeners = listeners;

        if let Some(html) = node.raw_html() {
            self.dom.set_inner_html(handle, html)?;
            self.stats.inner_html_set += 1;
            applied.inner_html = Some(html.to_owned());
            return Ok(());
        }

        for c in resolve_children(results, node)? {
            let child = self.create(results, c)?;
            if let Err(e) = self.dom.insert_before(handle, child.handle, None) {
                self.dom.release(child.handle);
                return Err(e.into());
            }
            applied.children.push(child);
        }
        Ok(())
    }

    fn patch(
        &mut self,
        results: &BuildResults,
        parent: D::Node,
        old: &mut Applied<D::Node>,
        new: Resolved<'_>,
    ) -> Result<(), RenderError> {
        let node = new.node;
        let same = old.kind == node.kind()
            && (old.kind != VNodeKind::Element
                || (old.tag == node.tag() && old.namespace.as_deref() == node.namespace()));
        if !same {
            let fresh = self.create(results, new)?;
            if let Err(e) = self.dom.insert_before(parent, fresh.handle, Some(old.handle)) {
                self.dom.release(fresh.handle);
                return Err(e.into());
            }
            self.dom.remove_child(parent, old.handle)?;
            self.stats.replaced += 1;
            *old = fresh;
            return Ok(());
        }

        old.key = new.key.cloned();
        match node.kind() {
            VNodeKind::Text | VNodeKind::Comment => {
                if old.text != node.data() {
                    self.dom.set_text(old.handle, node.data())?;
                    self.stats.texts_set += 1;
                    old.text = node.data().to_owned();
                }
                Ok(())
            }
            _ => self.patch_element(results, old, node),
        }
    }

    fn patch_element(
        &mut self,
        results: &BuildResults,
        old: &mut Applied<D::Node>,
        node: &VNode,
    ) -> Result<(), RenderError> {
        let handle = old.handle;

        for a in node.attrs() {
            let current = old.attrs.iter().find(|o| o.same_name(a));
            if current.map(|o| &o.value) != Some(&a.value) {
                self.dom
                    .set_attribute(handle, a.namespace.as_deref(), &a.key, &a.value)?;
                self.stats.attrs_set += 1;
            }
        }
        for o in &old.attrs {
            if !node.attrs().iter().any(|a| a.same_name(o)) {
                self.dom
                    .remove_attribute(handle, o.namespace.as_deref(), &o.key)?;
                self.stats.attrs_removed += 1;
            }
        }
        old.attrs = node.attrs().iter().cloned().collect();

        // a property that leaves the tree is reset to null
        for p in node.props() {
            if node_prop(&old.props, &p.key) != Some(&p.value) {
                self.dom.set_property(handle, &p.key, &p.value)?;
                self.stats.props_set += 1;
            }
        }
        for o in &old.props {
            if node.get_prop(&o.key).is_none() {
                self.dom
                    .set_property(handle, &o.key, &serde_json::Value::Null)?;
                self.stats.props_removed += 1;
            }
        }
        old.props = node.props().iter().cloned().collect();

        // handlers are swapped every pass; listeners only when the set changes
        let listeners = listeners_of(node);
        for l in &old.listeners {
            if !listeners.contains(l) {
                self.dom.remove_listener(handle, &l.0, l.1)?;
                self.stats.listeners_removed += 1;
            }
        }
        for l in &listeners {
            if !old.listeners.contains(l) {
                self.dom.add_listener(handle, &l.0, l.1)?;
                self.stats.listeners_added += 1;
            }
        }
        old.listeners = listeners;
        old.handlers = node.handlers().iter().cloned().collect();

        match (old.inner_html.as_deref(), node.raw_html()) {
            (current, Some(html)) => {
                if current != Some(html) {
                    self.dom.set_inner_html(handle, html)?;
                    self.stats.inner_html_set += 1;
                    old.children.clear();
                    old.inner_html = Some(html.to_owned());
                }
                Ok(())
            }
            (Some(_), None) => {
                self.dom.set_inner_html(handle, "")?;
                self.stats.inner_html_set += 1;
                old.inner_html = None;
                old.children.clear();
                self.patch_children(results, handle, &mut old.children, node)
            }
            (None, None) => self.patch_children(results, handle, &mut old.children, node),
        }
    }

    fn patch_children(
        &mut self,
        results: &BuildResults,
        parent: D::Node,
        old_children: &mut Vec<Applied<D::Node>>,
        node: &VNode,
    ) -> Result<(), RenderError> {
        let new_children = resolve_children(results, node)?;

        // match new children to old ones: by key where both sides have one,
        // otherwise positionally among the unkeyed; siblings sharing a key
        // are matched in order
        let mut by_key: HashMap<&IterKey, VecDeque<usize>> = HashMap::new();
        let mut unkeyed = Vec::new();
        for (i, o) in old_children.iter().enumerate() {
            match (&o.key, self.config.keyed_children) {
                (Some(k), true) => by_key.entry(k).or_default().push_back(i),
                _ => unkeyed.push(i),
            }
        }
        let mut unkeyed = unkeyed.into_iter();
        let mut taken = vec![false; old_children.len()];
        let mut seen: HashSet<&IterKey> = HashSet::new();
        let mut matched: Vec<Option<usize>> = Vec::with_capacity(new_children.len());
        for n in &new_children {
            let hit = match (n.key, self.config.keyed_children) {
                (Some(k), true) => {
                    if !seen.insert(k) {
                        log::warn!(
                            "duplicate key {k:?} among the children of <{}>; matching by position",
                            node.tag()
                        );
                    }
                    by_key.get_mut(k).and_then(VecDeque::pop_front)
                }
                _ => unkeyed.next(),
            };
            if let Some(i) = hit {
                taken[i] = true;
            }
            matched.push(hit);
        }

        let mut pool: Vec<Option<Applied<D::Node>>> =
            std::mem::take(old_children).into_iter().map(Some).collect();
        for (i, slot) in pool.iter_mut().enumerate() {
            if !taken[i]
                && let Some(o) = slot.take()
            {
                self.dom.remove_child(parent, o.handle)?;
                self.stats.removed += 1;
            }
        }

        let reused: Vec<usize> = matched.iter().flatten().copied().collect();
        let stay = longest_increasing(&reused);
        let mut in_place = vec![false; new_children.len()];
        let mut seen = 0;
        for (slot, hit) in in_place.iter_mut().zip(&matched) {
            if hit.is_some() {
                *slot = stay.contains(&seen);
                seen += 1;
            }
        }

        let mut next: Vec<Applied<D::Node>> = Vec::with_capacity(new_children.len());
        for (n, hit) in new_children.iter().zip(&matched) {
            let built = match hit.and_then(|i| pool[i].take()) {
                Some(mut o) => self.patch(results, parent, &mut o, *n).map(|()| o),
                None => self.create(results, *n),
            };
            match built {
                Ok(applied) => next.push(applied),
                Err(e) => {
                    self.release_fresh(&next, &matched);
                    return Err(e);
                }
            }
        }

        // place back to front so every anchor is already where it belongs
        let mut anchor: Option<D::Node> = None;
        for i in (0..next.len()).rev() {
            let handle = next[i].handle;
            let placed = match matched[i] {
                None => self.dom.insert_before(parent, handle, anchor),
                Some(_) if !in_place[i] => {
                    self.stats.moved += 1;
                    self.dom.insert_before(parent, handle, anchor)
                }
                Some(_) => Ok(()),
            };
            if let Err(e) = placed {
                self.release_fresh(&next[..=i], &matched);
                return Err(e.into());
            }
            anchor = Some(handle);
        }

        *old_children = next;
        Ok(())
    }

    /// Releases the created, still unattached nodes among `nodes`.
    fn release_fresh(&mut self, nodes: &[Applied<D::Node>], matched: &[Option<usize>]) {
        for (a, hit) in nodes.iter().zip(matched) {
            if hit.is_none() {
                self.dom.release(a.handle);
            }
        }
    }

    fn sync_css(&mut self, results: &BuildResults) -> Result<(), RenderError> {
        let mut tags = Vec::new();
        for n in results.css() {
            if !(n.is_element("style") || n.is_element("link")) {
                return Err(RenderError::BadCss(format!("{n:?}")));
            }
            let mut text = String::new();
            for c in n.children() {
                if c.kind() == VNodeKind::Text {
                    text.push_str(c.data());
                }
            }
            tags.push(CssTag {
                tag: n.tag().to_ascii_lowercase(),
                attrs: n
                    .attrs()
                    .iter()
                    .map(|a| (a.key.clone(), a.value.clone()))
                    .collect(),
                text,
            });
        }
        if tags != self.css {
            if self.config.sync_css {
                self.dom.set_css(&tags)?;
                self.stats.css_updates += 1;
            }
            self.css = tags;
        }
        Ok(())
    }
}

impl<D: DomBackend> Renderer for LiveRenderer<D> {
    fn render(&mut self, results: &BuildResults) -> Result<(), RenderError> {
        self.stats = PatchStats::default();
        match self.render_pass(results) {
            Ok(()) => {
                log::debug!(
                    "render: {} patches ({} created, {} removed, {} moved)",
                    self.stats.total(),
                    self.stats.created,
                    self.stats.removed,
                    self.stats.moved
                );
                Ok(())
            }
            Err(e) => {
                log::error!("render failed after {} patches: {e}", self.stats.total());
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn last_patch_count(&self) -> usize {
        self.stats.total()
    }
}
