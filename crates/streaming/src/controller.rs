//! Streaming command handling
//!
//! Commands act on the pair tracked by an [`ActiveSelection`] and drive the
//! view that pair lives in. Per-pair parameters live here, keyed by
//! (view, representation), so they survive selection changes.
//!
//! # Command rules
//!
//! - Refine and coarsen are ignored while locked or in automatic mode
//! - Interrupt always switches to manual, suspends further passes and
//!   presents what is already delivered
//! - Restart is ignored while locked; otherwise it drops accumulated
//!   increments, switches to manual and runs a pass from depth zero
//! - A depth cap is handed to the representation right before each
//!   refinement step, so a new cap applies from the next pass on
//! - Switching from manual to automatic runs a pass immediately
//!
//! A command without a tracked streaming-capable view fails with
//! `NoStreamingTarget` and changes nothing.

use crate::selection::ActiveSelection;
use crate::state::{RefinementMode, StreamingState};
use relay_core::{RelayError, RelayResult, RepresentationId, StreamingConfig, ViewId};
use relay_engine::View;
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a command changed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// The pair is locked
    Locked,
    /// Manual commands are disabled in automatic mode
    AutomaticMode,
    /// Automatic passes only run in automatic mode
    ManualMode,
    /// Streaming passes are interrupted
    Interrupted,
    /// The depth cap is reached
    DepthLimit,
    /// The source has no finer level
    RefinementComplete,
    /// Already at depth zero
    AlreadyCoarsest,
    /// The tracked representation does not refine progressively
    NotStreamable,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::Locked => "locked",
            IgnoreReason::AutomaticMode => "automatic mode",
            IgnoreReason::ManualMode => "manual mode",
            IgnoreReason::Interrupted => "interrupted",
            IgnoreReason::DepthLimit => "depth limit reached",
            IgnoreReason::RefinementComplete => "refinement complete",
            IgnoreReason::AlreadyCoarsest => "already coarsest",
            IgnoreReason::NotStreamable => "not streamable",
        };
        f.write_str(text)
    }
}

/// Result of a streaming command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command took effect
    Applied,
    /// The command was a no-op
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    /// Whether the command took effect
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

enum Step {
    Refine,
    Coarsen,
}

/// Streaming parameters and command entry points
#[derive(Debug, Default)]
pub struct StreamingController {
    states: FxHashMap<(ViewId, RepresentationId), StreamingState>,
    initial_max_depth: Option<i32>,
}

impl StreamingController {
    /// Create a controller; new pairs start unbounded
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller whose new pairs start with the configured cap
    pub fn from_config(config: &StreamingConfig) -> Self {
        StreamingController {
            states: FxHashMap::default(),
            initial_max_depth: Some(config.max_depth),
        }
    }

    /// Parameters of a pair
    pub fn state(&self, view: ViewId, representation: RepresentationId) -> StreamingState {
        self.states
            .get(&(view, representation))
            .copied()
            .unwrap_or_else(|| self.initial_state())
    }

    /// Drop the parameters of every pair in `view`
    pub fn forget_view(&mut self, view: ViewId) {
        self.states.retain(|(v, _), _| *v != view);
    }

    fn initial_state(&self) -> StreamingState {
        match self.initial_max_depth {
            Some(depth) => StreamingState::with_max_depth(depth),
            None => StreamingState::new(),
        }
    }

    fn state_mut(&mut self, key: (ViewId, RepresentationId)) -> &mut StreamingState {
        let initial = self.initial_state();
        self.states.entry(key).or_insert(initial)
    }

    fn target(selection: &ActiveSelection, view: &View, command: &'static str) -> RelayResult<(ViewId, RepresentationId)> {
        match selection.tracked() {
            Some((tracked, id)) if tracked == view.id() && view.supports_streaming() => Ok((tracked, id)),
            _ => {
                warn!(target: "relay::streaming", command, view = %view.id(), "No streaming view is tracked");
                Err(RelayError::NoStreamingTarget)
            }
        }
    }

    fn manual_refusal(state: &StreamingState) -> Option<IgnoreReason> {
        if state.accepts_manual_commands() {
            None
        } else if state.locked {
            Some(IgnoreReason::Locked)
        } else {
            Some(IgnoreReason::AutomaticMode)
        }
    }

    fn ignored(command: &'static str, id: RepresentationId, reason: IgnoreReason) -> RelayResult<CommandOutcome> {
        debug!(target: "relay::streaming", command, %id, %reason, "Command ignored");
        Ok(CommandOutcome::Ignored(reason))
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Refine the tracked representation by one level
    pub fn refine(&mut self, selection: &ActiveSelection, view: &mut View) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "refine")?;
        let state = *self.state_mut(key);
        if let Some(reason) = Self::manual_refusal(&state) {
            return Self::ignored("refine", key.1, reason);
        }
        Ok(Self::step(view, key.1, state, Step::Refine))
    }

    /// Coarsen the tracked representation by one level
    pub fn coarsen(&mut self, selection: &ActiveSelection, view: &mut View) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "coarsen")?;
        let state = *self.state_mut(key);
        if let Some(reason) = Self::manual_refusal(&state) {
            return Self::ignored("coarsen", key.1, reason);
        }
        Ok(Self::step(view, key.1, state, Step::Coarsen))
    }

    /// Stop scheduling passes and present the current partial result
    ///
    /// Does not cancel a pass in flight; the caller lets it finish first.
    pub fn interrupt(&mut self, selection: &ActiveSelection, view: &mut View) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "interrupt")?;
        self.state_mut(key).mode = RefinementMode::Manual;
        view.interrupt_streaming();
        view.present();
        info!(target: "relay::streaming", id = %key.1, "Refinement interrupted");
        Ok(CommandOutcome::Applied)
    }

    /// Drop accumulated increments and refine again from depth zero
    ///
    /// A locked pair keeps its mode and increments.
    pub fn restart_refinement(&mut self, selection: &ActiveSelection, view: &mut View) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "restart")?;
        let state = self.state_mut(key);
        if state.locked {
            return Self::ignored("restart", key.1, IgnoreReason::Locked);
        }
        state.mode = RefinementMode::Manual;
        let limit = state.depth_limit();
        match view.streaming_facet(key.1) {
            Some(facet) => {
                facet.set_depth_limit(limit);
                facet.restart();
            }
            None => return Self::ignored("restart", key.1, IgnoreReason::NotStreamable),
        }
        view.resume_streaming();
        view.update();
        debug!(target: "relay::streaming", id = %key.1, "Refinement restarted");
        Ok(CommandOutcome::Applied)
    }

    /// Set the depth cap; `-1` removes it
    ///
    /// # Errors
    ///
    /// `InvalidOperation` for values below `-1`.
    pub fn set_max_depth(&mut self, selection: &ActiveSelection, view: &View, depth: i32) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "set_max_depth")?;
        if depth < -1 {
            return Err(RelayError::invalid_operation(format!("max depth {} is below -1", depth)));
        }
        self.state_mut(key).max_depth = depth;
        debug!(target: "relay::streaming", id = %key.1, depth, "Max depth set");
        Ok(CommandOutcome::Applied)
    }

    /// Lock or unlock manual refinement
    pub fn set_locked(&mut self, selection: &ActiveSelection, view: &View, locked: bool) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "set_locked")?;
        self.state_mut(key).locked = locked;
        debug!(target: "relay::streaming", id = %key.1, locked, "Lock set");
        Ok(CommandOutcome::Applied)
    }

    /// Switch between manual and automatic refinement
    pub fn set_refinement_mode(
        &mut self,
        selection: &ActiveSelection,
        view: &mut View,
        mode: RefinementMode,
    ) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "set_refinement_mode")?;
        let state = self.state_mut(key);
        let previous = state.mode;
        state.mode = mode;
        if previous == RefinementMode::Manual && mode == RefinementMode::Automatic {
            view.resume_streaming();
            view.update();
        }
        debug!(target: "relay::streaming", id = %key.1, %mode, "Refinement mode set");
        Ok(CommandOutcome::Applied)
    }

    /// One automatic refinement pass
    pub fn tick(&mut self, selection: &ActiveSelection, view: &mut View) -> RelayResult<CommandOutcome> {
        let key = Self::target(selection, view, "tick")?;
        let state = *self.state_mut(key);
        if state.mode != RefinementMode::Automatic {
            return Self::ignored("tick", key.1, IgnoreReason::ManualMode);
        }
        if state.locked {
            return Self::ignored("tick", key.1, IgnoreReason::Locked);
        }
        if view.is_streaming_interrupted() {
            return Self::ignored("tick", key.1, IgnoreReason::Interrupted);
        }
        Ok(Self::step(view, key.1, state, Step::Refine))
    }

    fn step(view: &mut View, id: RepresentationId, state: StreamingState, step: Step) -> CommandOutcome {
        let outcome = match view.streaming_facet(id) {
            None => CommandOutcome::Ignored(IgnoreReason::NotStreamable),
            Some(facet) => {
                facet.set_depth_limit(state.depth_limit());
                match step {
                    Step::Refine if facet.refine() => CommandOutcome::Applied,
                    Step::Refine => {
                        let capped = facet
                            .depth_limit()
                            .map_or(false, |limit| facet.target_depth() >= limit);
                        if capped {
                            CommandOutcome::Ignored(IgnoreReason::DepthLimit)
                        } else {
                            CommandOutcome::Ignored(IgnoreReason::RefinementComplete)
                        }
                    }
                    Step::Coarsen if facet.coarsen() => CommandOutcome::Applied,
                    Step::Coarsen => CommandOutcome::Ignored(IgnoreReason::AlreadyCoarsest),
                }
            }
        };
        match outcome {
            CommandOutcome::Applied => {
                view.resume_streaming();
                view.update();
            }
            CommandOutcome::Ignored(reason) => {
                debug!(target: "relay::streaming", %id, %reason, "Refinement step ignored");
            }
        }
        outcome
    }
}
