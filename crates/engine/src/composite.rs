//! Composite representation
//!
//! Holds keyed children and forwards the request pass to the active one.
//! Only the active child is attached to the view and only it carries the
//! composite's visibility; the others stay hidden.
//!
//! Control setters (time, cache flags, modification, input) fan out to every
//! child, so an inactive child stays current and switching to it does not
//! force a full re-execution.
//!
//! The composite owns its children. It refers to its view only by
//! [`ViewId`]; attaching and detaching go through a [`ViewHost`] lent by the
//! caller.

use crate::facet::StreamingFacet;
use crate::host::ViewHost;
use crate::phase::{PhaseContext, PhaseResponse, RequestPhase};
use crate::representation::Representation;
use crate::state::RepresentationState;
use relay_core::{CacheKey, DataRequest, RelayError, RelayResult, RepresentationId, SharedSource, ViewId};
use relay_storage::PieceSink;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// Keyed children with at most one active
#[derive(Debug)]
pub struct CompositeRepresentation {
    id: RepresentationId,
    state: RepresentationState,
    children: FxHashMap<String, Box<dyn Representation>>,
    active: Option<String>,
    view: Option<ViewId>,
}

impl CompositeRepresentation {
    /// Create an empty composite
    pub fn new(id: RepresentationId) -> Self {
        CompositeRepresentation {
            id,
            state: RepresentationState::new(),
            children: FxHashMap::default(),
            active: None,
            view: None,
        }
    }

    /// View the composite is attached to
    pub fn view(&self) -> Option<ViewId> {
        self.view
    }

    /// Key of the active child
    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active child
    pub fn active_representation(&self) -> Option<&dyn Representation> {
        let key = self.active.as_ref()?;
        self.children.get(key).map(|child| child.as_ref())
    }

    /// Child stored under `key`
    pub fn child(&self, key: &str) -> Option<&dyn Representation> {
        self.children.get(key).map(|child| child.as_ref())
    }

    /// Child keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.children.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the composite has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn key_of(&self, id: RepresentationId) -> Option<String> {
        self.children
            .iter()
            .find(|(_, child)| child.id() == id)
            .map(|(key, _)| key.clone())
    }

    /// Store `child` under `key`, hidden
    ///
    /// Replacing an existing key logs a warning and returns the old child.
    /// If the old child was active, it is detached and the new child takes
    /// its place in the view.
    pub fn add_representation(
        &mut self,
        key: impl Into<String>,
        mut child: Box<dyn Representation>,
        host: Option<&mut ViewHost>,
    ) -> Option<Box<dyn Representation>> {
        let key = key.into();
        child.set_visibility(false);
        let replacing_active = self.active.as_deref() == Some(key.as_str());

        let mut old = self.children.remove(&key);
        if old.is_some() {
            warn!(target: "relay::composite", composite = %self.id, key = %key, "Replacing child representation");
        }

        if replacing_active {
            child.set_visibility(self.state.is_visible());
            if let (Some(host), true) = (host, self.view.is_some()) {
                if let Some(old) = old.as_mut() {
                    if let Err(e) = old.remove_from_view(host) {
                        warn!(target: "relay::composite", composite = %self.id, error = %e, "Detaching replaced child failed");
                    }
                }
                if let Err(e) = child.add_to_view(host) {
                    warn!(target: "relay::composite", composite = %self.id, error = %e, "Attaching replacement child failed");
                }
            }
        }
        debug!(target: "relay::composite", composite = %self.id, key = %key, child = %child.id(), "Added child representation");
        self.children.insert(key, child);
        old
    }

    /// Remove the child under `key`
    ///
    /// Removing the active child detaches it and leaves nothing active.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when removing the active child of an attached
    /// composite without its view's host; nothing changes.
    pub fn remove_representation(
        &mut self,
        key: &str,
        host: Option<&mut ViewHost>,
    ) -> RelayResult<Box<dyn Representation>> {
        if self.active.as_deref() == Some(key) && host.is_none() {
            self.require_host("remove the active child")?;
        }
        let mut child = match self.children.remove(key) {
            Some(child) => child,
            None => {
                warn!(target: "relay::composite", composite = %self.id, key, "Unknown child key");
                return Err(RelayError::UnknownCompositeKey(key.to_string()));
            }
        };
        if self.active.as_deref() == Some(key) {
            self.active = None;
            if let (Some(host), true) = (host, self.view.is_some()) {
                child.remove_from_view(host)?;
            }
        }
        child.set_visibility(false);
        Ok(child)
    }

    /// Remove the child whose id is `id`
    pub fn remove_representation_by_id(
        &mut self,
        id: RepresentationId,
        host: Option<&mut ViewHost>,
    ) -> RelayResult<Box<dyn Representation>> {
        match self.key_of(id) {
            Some(key) => self.remove_representation(&key, host),
            None => {
                warn!(target: "relay::composite", composite = %self.id, child = %id, "Not a child of this composite");
                Err(RelayError::UnknownRepresentation(id))
            }
        }
    }

    /// Make the child under `key` the active one
    ///
    /// No-op if `key` is already active. Otherwise the previous child is
    /// detached before the new one is attached, and the new child takes the
    /// composite's visibility. An unknown key leaves nothing active.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the composite is attached to a view and no host
    /// is given; the active child stays as it was.
    pub fn set_active_representation(&mut self, key: &str, mut host: Option<&mut ViewHost>) -> RelayResult<()> {
        if self.active.as_deref() == Some(key) {
            return Ok(());
        }
        if host.is_none() {
            self.require_host("switch the active child")?;
        }
        let attached = self.view.is_some();

        if let Some(old_key) = self.active.take() {
            if let Some(old) = self.children.get_mut(&old_key) {
                if let (Some(host), true) = (host.as_deref_mut(), attached) {
                    if let Err(e) = old.remove_from_view(host) {
                        warn!(target: "relay::composite", composite = %self.id, key = %old_key, error = %e, "Detaching child failed");
                    }
                }
                old.set_visibility(false);
            }
        }

        let visible = self.state.is_visible();
        let Some(new) = self.children.get_mut(key) else {
            warn!(target: "relay::composite", composite = %self.id, key, "Unknown active key");
            return Err(RelayError::UnknownCompositeKey(key.to_string()));
        };
        new.set_visibility(visible);
        if let (Some(host), true) = (host, attached) {
            new.add_to_view(host)?;
        }
        self.active = Some(key.to_string());
        debug!(target: "relay::composite", composite = %self.id, key, "Switched active child");
        Ok(())
    }

    /// Attached composites change attachments only through their host
    fn require_host(&self, action: &str) -> RelayResult<()> {
        match self.view {
            Some(view) => {
                warn!(target: "relay::composite", composite = %self.id, %view, action, "Missing view host");
                Err(RelayError::invalid_operation(format!(
                    "{} is attached to {}; cannot {} without its host",
                    self.id, view, action
                )))
            }
            None => Ok(()),
        }
    }

    fn active_mut(&mut self) -> Option<&mut Box<dyn Representation>> {
        let key = self.active.as_ref()?;
        self.children.get_mut(key)
    }

    fn for_each_child(&mut self, mut f: impl FnMut(&mut Box<dyn Representation>)) {
        for child in self.children.values_mut() {
            f(child);
        }
    }
}

impl Representation for CompositeRepresentation {
    fn id(&self) -> RepresentationId {
        self.id
    }

    fn state(&self) -> &RepresentationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RepresentationState {
        &mut self.state
    }

    // children publish under their own ids
    fn request_data(&mut self, _request: &DataRequest, _sink: &mut PieceSink<'_>) -> RelayResult<()> {
        Ok(())
    }

    fn evict_cache(&mut self) {
        self.for_each_child(|child| child.evict_cache());
    }

    fn set_visibility(&mut self, visible: bool) {
        self.state.set_visible(visible);
        if let Some(active) = self.active_mut() {
            active.set_visibility(visible);
        }
    }

    fn mark_modified(&mut self) {
        self.state.mark_modified();
        self.for_each_child(|child| child.mark_modified());
    }

    fn set_update_time(&mut self, time: Option<f64>) {
        self.state.set_update_time(time);
        self.for_each_child(|child| child.set_update_time(time));
    }

    fn set_use_cache(&mut self, use_cache: bool) {
        self.state.set_use_cache(use_cache);
        self.for_each_child(|child| child.set_use_cache(use_cache));
    }

    fn set_cache_key(&mut self, key: CacheKey) {
        self.state.set_cache_key(key);
        self.for_each_child(|child| child.set_cache_key(key));
    }

    fn set_force_use_cache(&mut self, force: bool) {
        self.state.set_force_use_cache(force);
        self.for_each_child(|child| child.set_force_use_cache(force));
    }

    fn set_forced_cache_key(&mut self, key: CacheKey) {
        self.state.set_forced_cache_key(key);
        self.for_each_child(|child| child.set_forced_cache_key(key));
    }

    fn set_input(&mut self, input: Option<SharedSource>) {
        self.state.set_input(input.clone());
        self.for_each_child(|child| child.set_input(input.clone()));
    }

    fn as_composite(&self) -> Option<&CompositeRepresentation> {
        Some(self)
    }

    fn as_composite_mut(&mut self) -> Option<&mut CompositeRepresentation> {
        Some(self)
    }

    fn as_streaming_mut(&mut self) -> Option<&mut dyn StreamingFacet> {
        self.active_mut()?.as_streaming_mut()
    }

    fn add_to_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        if self.view.is_some() {
            warn!(target: "relay::composite", composite = %self.id, "Composite already attached");
            return Err(RelayError::AlreadyRegistered(self.id));
        }
        let visible = self.state.is_visible();
        if let Some(active) = self.active_mut() {
            active.set_visibility(visible);
            active.add_to_view(host)?;
        }
        self.view = Some(host.view_id());
        Ok(())
    }

    fn remove_from_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        if self.view.take().is_none() {
            return Err(RelayError::UnknownRepresentation(self.id));
        }
        match self.active_mut() {
            Some(active) => active.remove_from_view(host),
            None => Ok(()),
        }
    }

    fn collect_visibility(&self, out: &mut Vec<(RepresentationId, bool)>) {
        if let Some(active) = self.active_representation() {
            active.collect_visibility(out);
        }
    }

    fn process_request(&mut self, phase: RequestPhase, ctx: &mut PhaseContext<'_>) -> PhaseResponse {
        if !self.state.is_visible() {
            return PhaseResponse::NotHandled;
        }
        match self.active_mut() {
            Some(active) => active.process_request(phase, ctx),
            None => PhaseResponse::NotHandled,
        }
    }
}
