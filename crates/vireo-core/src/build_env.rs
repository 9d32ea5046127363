use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::component::{BuildOut, BuildResults, Component, ComponentId, ComponentRef, Handle};
use crate::error::{BuildError, BuildResult};
use crate::event_env::RenderHandle;
use crate::hash::compute_hash;
use crate::key::{CompKey, IterKey, mix_position};
use crate::lifecycle::{Deps, LifecycleCtx};
use crate::mod_check::{ModChecker, ModTracker};

/// Wiring hook applied to every newly created instance.
pub type Wirer = Box<dyn Fn(&mut dyn Component) + Send + Sync>;

/// Owns the component cache and walks the component graph once per pass.
///
/// Instances live in the cache under their [`CompKey`]. Each pass starts by
/// moving last pass's entries into a pool; every key encountered during the
/// walk is moved back. Whatever is left in the pool afterwards is evicted.
#[derive(Default)]
pub struct BuildEnv {
    pool: HashMap<CompKey, ComponentRef>,
    used: HashMap<CompKey, ComponentRef>,
    used_ids: HashSet<ComponentId>,
    checked_out: HashSet<CompKey>,
    seeds: HashMap<ComponentId, u64>,
    initialized: HashSet<ComponentId>,
    rendered: HashSet<ComponentId>,
    wirers: Vec<Wirer>,
    deps: Deps,
    mods: ModTracker,
    render: Option<RenderHandle>,
    pass: u64,
    created: usize,
}

impl BuildEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle hooks get this handle to request further renders.
    pub fn with_render_handle(mut self, handle: RenderHandle) -> Self {
        self.render = Some(handle);
        self
    }

    pub fn set_render_handle(&mut self, handle: RenderHandle) {
        self.render = Some(handle);
    }

    pub fn add_wirer(&mut self, f: impl Fn(&mut dyn Component) + Send + Sync + 'static) {
        self.wirers.push(Box::new(f));
    }

    /// Makes `value` available to [`crate::WireAcceptor`] components.
    pub fn provide<T: std::any::Any + Send + Sync>(&mut self, value: T) {
        self.deps.insert(value);
    }

    /// Number of passes started so far.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Instances currently held by the cache.
    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn is_cached(&self, key: &CompKey) -> bool {
        self.used.contains_key(key)
    }

    pub fn get(&self, key: &CompKey) -> Option<&ComponentRef> {
        self.used.get(key)
    }

    /// Builds `root` and every component it references, transitively.
    ///
    /// On error nothing is evicted and the caller keeps whatever it rendered
    /// last.
    pub fn run_build(&mut self, root: &ComponentRef) -> BuildResult<BuildResults> {
        self.begin_pass();
        let walked = self.walk(root).and_then(|r| {
            self.check_checked_out()?;
            Ok(r)
        });
        match walked {
            Ok(mut results) => {
                results.created = self.created;
                results.evicted = self.end_pass(root.id());
                log::debug!(
                    "build pass {}: {} components, {} created, {} evicted",
                    self.pass,
                    results.components().len(),
                    results.created,
                    results.evicted
                );
                Ok(results)
            }
            Err(e) => {
                log::warn!("build pass {} aborted: {e}", self.pass);
                self.abort_pass();
                Err(e)
            }
        }
    }

    /// Applies registered wiring to a freshly created instance.
    pub fn wire_component(&mut self, component: &ComponentRef) {
        self.created += 1;
        let mut c = component.lock();
        for w in &self.wirers {
            w(&mut *c);
        }
        if let Some(acceptor) = c.as_wire_acceptor() {
            acceptor.accept_wiring(&self.deps);
        }
        log::trace!("wired new {}", component.type_name());
    }

    /// Instance cached under `key` by the previous pass, if any.
    ///
    /// Whatever is returned must be passed to [`BuildEnv::use_component`]
    /// before the pass ends.
    pub fn cached_component(&mut self, key: &CompKey) -> Option<ComponentRef> {
        let c = self.pool.get(key)?.clone();
        self.checked_out.insert(key.clone());
        Some(c)
    }

    /// Marks `component` as referenced under `key` for this pass.
    pub fn use_component(&mut self, key: CompKey, component: ComponentRef) -> BuildResult<()> {
        if self.used.contains_key(&key) {
            return Err(BuildError::DuplicateKey(key));
        }
        self.checked_out.remove(&key);
        self.used_ids.insert(component.id());
        self.seeds.insert(component.id(), key.position_seed());
        self.used.insert(key, component);
        Ok(())
    }

    /// Reuses the instance cached under `key`, or creates one with `init`
    /// and wires it. An instance of a different type under the same key is
    /// replaced and evicted at the end of the pass.
    pub fn component<C: Component>(
        &mut self,
        key: &CompKey,
        init: impl FnOnce() -> C,
    ) -> BuildResult<(ComponentRef, Handle<C>)> {
        if let Some(cached) = self.cached_component(key) {
            if let Some(handle) = cached.downcast::<C>() {
                self.use_component(key.clone(), cached.clone())?;
                return Ok((cached, handle));
            }
            log::debug!(
                "key {key} changed type from {} to {}; recreating",
                cached.type_name(),
                std::any::type_name::<C>()
            );
            self.checked_out.remove(key);
        }
        let handle = Arc::new(Mutex::new(init()));
        let r = ComponentRef::from_handle(handle.clone());
        self.wire_component(&r);
        self.use_component(key.clone(), r.clone())?;
        Ok((r, handle))
    }

    /// Runs `Rendered` hooks for every component of a successfully rendered pass.
    pub fn invoke_rendered(&mut self, results: &BuildResults) {
        for c in results.components() {
            let first = self.rendered.insert(c.id());
            let ctx = LifecycleCtx::new(self.render.as_ref(), first);
            let mut g = c.lock();
            if let Some(r) = g.as_rendered() {
                r.rendered(&ctx);
            }
        }
    }

    fn begin_pass(&mut self) {
        self.pass += 1;
        self.pool = std::mem::take(&mut self.used);
        self.checked_out.clear();
        self.used_ids.clear();
        self.created = 0;
        self.mods.track_next();
    }

    fn walk(&mut self, root: &ComponentRef) -> BuildResult<BuildResults> {
        let mut results = BuildResults::new(root.clone());
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(c) = queue.pop_front() {
            if results.contains(&c) {
                return Err(BuildError::InstanceReused(c.type_name()));
            }
            if !c.ptr_eq(root) && !self.used_ids.contains(&c.id()) {
                return Err(BuildError::Unregistered(c.type_name()));
            }
            let out = self.build_one(&c)?;
            queue.extend(out.components.iter().cloned());
            results.insert(c, out);
        }
        Ok(results)
    }

    fn build_one(&mut self, c: &ComponentRef) -> BuildResult<BuildOut> {
        let id = c.id();
        let seed = self.seeds.get(&id).copied().unwrap_or(0);
        let first = self.initialized.insert(id);
        let mut comp = c.lock();
        {
            let ctx = LifecycleCtx::new(self.render.as_ref(), first);
            if first && let Some(i) = comp.as_init() {
                i.init(&ctx);
            }
            if let Some(cp) = comp.as_compute() {
                cp.compute(&ctx);
            }
        }
        if let Some(bb) = comp.as_before_build() {
            bb.before_build();
        }

        let mut input = BuildIn::new(self, seed);
        let out = comp
            .build(&mut input)
            .map_err(|e| e.in_component(c.type_name()))?;
        if out.out.len() != 1 {
            return Err(BuildError::RootCount {
                component: c.type_name(),
                count: out.out.len(),
            });
        }
        Ok(out)
    }

    fn check_checked_out(&self) -> BuildResult<()> {
        match self.checked_out.iter().next() {
            Some(key) => Err(BuildError::UnusedCachedComponent(key.clone())),
            None => Ok(()),
        }
    }

    fn end_pass(&mut self, root: ComponentId) -> usize {
        let mut live = std::mem::take(&mut self.used_ids);
        live.insert(root);
        let mut evicted = 0;
        for (key, comp) in std::mem::take(&mut self.pool) {
            if live.contains(&comp.id()) {
                continue;
            }
            self.release(&key, &comp);
            evicted += 1;
        }
        // drop state of instances no longer reachable (a replaced root)
        self.initialized.retain(|id| live.contains(id));
        self.rendered.retain(|id| live.contains(id));
        self.seeds.retain(|id, _| live.contains(id));
        evicted
    }

    fn abort_pass(&mut self) {
        let mut replaced = Vec::new();
        for (key, comp) in std::mem::take(&mut self.pool) {
            match self.used.entry(key) {
                Entry::Vacant(v) => {
                    v.insert(comp);
                }
                Entry::Occupied(o) => {
                    if !o.get().ptr_eq(&comp) {
                        replaced.push((o.key().clone(), comp));
                    }
                }
            }
        }
        for (key, comp) in replaced {
            self.release(&key, &comp);
        }
        self.checked_out.clear();
    }

    fn release(&mut self, key: &CompKey, comp: &ComponentRef) {
        let id = comp.id();
        self.seeds.remove(&id);
        self.rendered.remove(&id);
        if self.initialized.remove(&id) {
            let ctx = LifecycleCtx::new(self.render.as_ref(), false);
            let mut g = comp.lock();
            if let Some(r) = g.as_release() {
                r.release(&ctx);
            }
        }
        log::debug!("evicted {} at {key}", comp.type_name());
    }
}

/// Per-component input to a build: the running position hash and a handle
/// back to the build environment.
pub struct BuildIn<'a> {
    env: &'a mut BuildEnv,
    positions: SmallVec<[u64; 8]>,
}

impl<'a> BuildIn<'a> {
    pub fn new(env: &'a mut BuildEnv, seed: u64) -> Self {
        let mut positions = SmallVec::new();
        positions.push(seed);
        Self { env, positions }
    }

    pub fn env(&mut self) -> &mut BuildEnv {
        self.env
    }

    pub fn current_position_hash(&self) -> u64 {
        self.positions.last().copied().unwrap_or(0)
    }

    /// Descends into a nested construct identified by `site`.
    pub fn push_position(&mut self, site: u64) {
        let h = mix_position(self.current_position_hash(), site);
        self.positions.push(h);
    }

    /// Descends into one iteration of an enclosing loop, so keys computed in
    /// nested loops stay distinct per outer element.
    pub fn push_iteration(&mut self, iter: &IterKey) {
        self.push_position(compute_hash(iter));
    }

    pub fn pop_position(&mut self) {
        if self.positions.len() > 1 {
            self.positions.pop();
        } else {
            log::warn!("pop_position without a matching push");
        }
    }

    pub fn with_position<R>(&mut self, site: u64, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_position(site);
        let r = f(self);
        self.pop_position();
        r
    }

    /// Key for the component referenced at `site`.
    pub fn comp_key(&self, site: u64, iter: Option<IterKey>) -> CompKey {
        CompKey::new(site ^ self.current_position_hash(), iter)
    }

    /// See [`BuildEnv::component`].
    pub fn component<C: Component>(
        &mut self,
        key: &CompKey,
        init: impl FnOnce() -> C,
    ) -> BuildResult<(ComponentRef, Handle<C>)> {
        self.env.component(key, init)
    }

    pub fn mod_check_all(&mut self, values: &[&dyn ModChecker]) -> bool {
        self.env.mods.mod_check_all(values)
    }

    pub fn render_handle(&self) -> Option<&RenderHandle> {
        self.env.render.as_ref()
    }
}
