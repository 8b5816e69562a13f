//! Per-representation control state
//!
//! Visibility and the dirty flag are independent: hiding a representation
//! never clears pending work, and showing it never creates any.

use relay_core::{CacheKey, SharedSource};
use std::fmt;

/// Control state shared by every representation
#[derive(Clone)]
pub struct RepresentationState {
    visible: bool,
    dirty: bool,
    update_time: Option<f64>,
    use_cache: bool,
    cache_key: CacheKey,
    force_use_cache: bool,
    forced_cache_key: CacheKey,
    input: Option<SharedSource>,
}

impl RepresentationState {
    /// Hidden and dirty, so the first visible frame produces data
    pub fn new() -> Self {
        RepresentationState {
            visible: false,
            dirty: true,
            update_time: None,
            use_cache: false,
            cache_key: CacheKey::default(),
            force_use_cache: false,
            forced_cache_key: CacheKey::default(),
            input: None,
        }
    }

    /// Whether the representation takes part in request passes
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the next update must re-execute
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Time the representation should produce data for
    pub fn update_time(&self) -> Option<f64> {
        self.update_time
    }

    /// Effective cache flag; forcing wins over the view setting
    pub fn use_cache(&self) -> bool {
        self.force_use_cache || self.use_cache
    }

    /// Effective cache key; the forced key wins while forcing is on
    pub fn cache_key(&self) -> CacheKey {
        if self.force_use_cache {
            self.forced_cache_key
        } else {
            self.cache_key
        }
    }

    /// Upstream source
    pub fn input(&self) -> Option<&SharedSource> {
        self.input.as_ref()
    }

    /// Toggle visibility; the dirty flag is left alone
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Request re-execution on the next update
    pub fn mark_modified(&mut self) {
        self.dirty = true;
    }

    /// Mark the state clean after a successful update
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Set the update time; a different time marks the state dirty
    pub fn set_update_time(&mut self, time: Option<f64>) {
        if !same_time(self.update_time, time) {
            self.update_time = time;
            self.dirty = true;
        }
    }

    /// View-driven cache flag
    pub fn set_use_cache(&mut self, use_cache: bool) {
        self.use_cache = use_cache;
    }

    /// View-driven cache key; a different key marks the state dirty
    pub fn set_cache_key(&mut self, key: CacheKey) {
        if self.cache_key != key {
            self.cache_key = key;
            if !self.force_use_cache {
                self.dirty = true;
            }
        }
    }

    /// Pin caching on regardless of the view
    pub fn set_force_use_cache(&mut self, force: bool) {
        if self.force_use_cache != force {
            self.force_use_cache = force;
            self.dirty = true;
        }
    }

    /// Key used while forcing is on
    pub fn set_forced_cache_key(&mut self, key: CacheKey) {
        if self.forced_cache_key != key {
            self.forced_cache_key = key;
            if self.force_use_cache {
                self.dirty = true;
            }
        }
    }

    /// Connect or disconnect the upstream source
    pub fn set_input(&mut self, input: Option<SharedSource>) {
        self.input = input;
        self.dirty = true;
    }
}

fn same_time(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.to_bits() == b.to_bits(),
        (None, None) => true,
        _ => false,
    }
}

impl Default for RepresentationState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RepresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationState")
            .field("visible", &self.visible)
            .field("dirty", &self.dirty)
            .field("update_time", &self.update_time)
            .field("use_cache", &self.use_cache())
            .field("cache_key", &self.cache_key())
            .field("has_input", &self.input.is_some())
            .finish()
    }
}
