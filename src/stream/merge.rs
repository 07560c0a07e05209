//! Function-call fragment merging.
//!
//! Backends stream one call's fragments contiguously before moving to the
//! next, so a fragment for a different call means the previous one is
//! complete. [`FunctionCallMerger`] owns the accumulated calls and the
//! correlation state for exactly one stream.

use rustc_hash::FxHashMap;

use crate::protocol::canonical::{FunctionArguments, FunctionCall, FunctionCallDelta};
use crate::util::next_call_id;

/// Correlation state threaded through successive merge steps.
#[derive(Debug, Clone, Default)]
pub struct MergeState {
    /// Id of the most recently touched call.
    pub last_id: Option<String>,
    bindings: FxHashMap<u32, String>,
}

impl MergeState {
    /// Id bound to a positional call index, if any fragment announced one.
    #[must_use]
    pub fn bound_id(&self, index: u32) -> Option<&str> {
        self.bindings.get(&index).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionCallMerger {
    calls: Vec<FunctionCall>,
    finalized: Vec<bool>,
    state: MergeState,
}

impl FunctionCallMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of fragments and return the call this batch finalized.
    ///
    /// When a batch crosses more than one call boundary only the last
    /// finalized call is returned; feed fragments through
    /// [`FunctionCallMerger::merge_one`] to observe every boundary.
    pub fn merge(&mut self, deltas: &[FunctionCallDelta]) -> Option<FunctionCall> {
        let mut finalized = None;
        for delta in deltas {
            if let Some(call) = self.merge_one(delta) {
                finalized = Some(call);
            }
        }
        finalized
    }

    /// Fold one fragment. Returns the previously active call when this
    /// fragment belongs to a different one.
    pub fn merge_one(&mut self, delta: &FunctionCallDelta) -> Option<FunctionCall> {
        let id = self.resolve_id(delta);
        let previous = self.state.last_id.replace(id.clone());
        self.accumulate(id.clone(), delta);

        let previous = previous.filter(|prev| *prev != id)?;
        let position = self.position(&previous)?;
        if self.finalized[position] {
            return None;
        }
        self.finalized[position] = true;
        tracing::trace!(id = %previous, "function call finalized");
        Some(self.calls[position].clone())
    }

    /// Fold fragments by id without tracking finalization.
    pub fn extend<I>(&mut self, deltas: I)
    where
        I: IntoIterator<Item = FunctionCallDelta>,
    {
        for delta in deltas {
            let id = self.resolve_id(&delta);
            self.state.last_id = Some(id.clone());
            self.accumulate(id, &delta);
        }
    }

    #[must_use]
    pub fn calls(&self) -> &[FunctionCall] {
        &self.calls
    }

    #[must_use]
    pub fn into_calls(self) -> Vec<FunctionCall> {
        self.calls
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> &MergeState {
        &self.state
    }

    /// The active call, which no later fragment has finalized yet. Callers
    /// flush it explicitly at end of stream.
    #[must_use]
    pub fn pending(&self) -> Option<&FunctionCall> {
        let id = self.state.last_id.as_deref()?;
        let position = self.position(id)?;
        if self.finalized[position] {
            None
        } else {
            Some(&self.calls[position])
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.calls.iter().position(|call| call.id == id)
    }

    fn resolve_id(&mut self, delta: &FunctionCallDelta) -> String {
        if let Some(id) = delta.id.as_deref().filter(|id| !id.is_empty()) {
            if let Some(index) = delta.index {
                self.state.bindings.insert(index, id.to_owned());
            }
            return id.to_owned();
        }
        if let Some(index) = delta.index {
            if let Some(id) = self.state.bindings.get(&index) {
                return id.clone();
            }
            let id = next_call_id();
            tracing::debug!(index, %id, "generated id for unannounced call index");
            self.state.bindings.insert(index, id.clone());
            return id;
        }
        if let Some(id) = &self.state.last_id {
            return id.clone();
        }
        next_call_id()
    }

    fn accumulate(&mut self, id: String, delta: &FunctionCallDelta) {
        let Some(position) = self.position(&id) else {
            self.calls.push(FunctionCall::new(
                id,
                delta.name.clone().unwrap_or_default(),
                delta.arguments.clone().unwrap_or_default(),
            ));
            self.finalized.push(false);
            return;
        };

        let call = &mut self.calls[position];
        if let Some(name) = delta.name.as_deref() {
            call.function.name.push_str(name);
        }
        match (&mut call.function.arguments, &delta.arguments) {
            (_, None) => {}
            (current, Some(FunctionArguments::Parsed(value))) => {
                *current = FunctionArguments::Parsed(value.clone());
            }
            (FunctionArguments::Raw(current), Some(FunctionArguments::Raw(fragment))) => {
                current.push_str(fragment);
            }
            (FunctionArguments::Parsed(_), Some(FunctionArguments::Raw(fragment))) => {
                tracing::debug!(
                    id = %call.id,
                    dropped = fragment.len(),
                    "raw argument fragment after structured arguments"
                );
            }
        }
    }
}
