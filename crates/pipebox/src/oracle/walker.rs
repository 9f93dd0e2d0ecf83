//! Callback contract for an external model-based test generator.
//!
//! The generator itself (graph traversal, path selection, coverage) lives
//! outside this crate. It drives the harness by invoking one callback per
//! visited edge or vertex; each callback performs a single SUT interaction
//! through the [`Oracle`]. The generator's side of the handshake is an
//! injected capability object rather than a base type to extend: callbacks
//! may redirect the generator's abstract position and read model parameters
//! without knowing anything about its traversal algorithm.

use crate::error::HarnessResult;
use crate::oracle::Oracle;
use std::collections::BTreeMap;

/// Capability handle the generator passes into every callback.
pub trait ModelContext {
    /// Redirect the generator's current abstract state, e.g. after observing
    /// output that implies a different vertex than the one being visited.
    fn set_state(&mut self, state: &str);

    /// Read a generator-provided model parameter (e.g. a numeric mode) by
    /// name. `None` when the model does not define it.
    fn parameter(&self, name: &str) -> Option<String>;
}

/// One model step: an input or an output-and-assert interaction.
///
/// Callbacks fail with [`ProcessTerminated`](crate::HarnessError::ProcessTerminated)
/// when the SUT has died, which must abort generation.
pub type ModelStep<'a> =
    Box<dyn FnMut(&mut Oracle, &mut dyn ModelContext) -> HarnessResult<()> + 'a>;

/// In-memory [`ModelContext`] for tests and single-machine runs.
#[derive(Debug, Default)]
pub struct StaticContext {
    state: Option<String>,
    parameters: BTreeMap<String, String>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// The most recent redirection requested by a callback.
    pub fn current_state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

impl ModelContext for StaticContext {
    fn set_state(&mut self, state: &str) {
        self.state = Some(state.to_string());
    }

    fn parameter(&self, name: &str) -> Option<String> {
        self.parameters.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_context_round_trips_parameters() {
        let context = StaticContext::new().with_parameter("n", "4");
        assert_eq!(context.parameter("n").as_deref(), Some("4"));
        assert_eq!(context.parameter("missing"), None);
    }

    #[test]
    fn static_context_tracks_redirection() {
        let mut context = StaticContext::new();
        assert_eq!(context.current_state(), None);
        context.set_state("v_GuessMenu");
        assert_eq!(context.current_state(), Some("v_GuessMenu"));
    }
}
