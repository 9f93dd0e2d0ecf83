//! Adapter spec files: which SUT to run, the input vocabulary, and the
//! ordered classifier list. Loaded from YAML or JSON by extension.

use crate::classify::{Classifier, ClassifierSet};
use crate::error::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_timeout_ms() -> u64 {
    1000
}

/// Declarative description of one adapter instance.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AdapterSpec {
    /// Command used to spawn the SUT.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Bounded wait for `C_OUTPUT` replies, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Registered input vocabulary.
    pub inputs: Vec<InputBinding>,
    /// Classifiers in priority order. Order is semantic: the first match
    /// wins, so more specific patterns must come first.
    pub classifiers: Vec<ClassifierSpec>,
}

/// One entry of the input vocabulary.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBinding {
    /// Event label, conventionally starting with `?`.
    pub event: String,
    /// Raw line written to the SUT. Defaults to the first character of the
    /// label payload (`?Yes` sends `Y`).
    #[serde(default)]
    pub send: Option<String>,
}

/// One labeled pattern.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClassifierSpec {
    pub label: String,
    pub pattern: String,
}

impl AdapterSpec {
    /// Load a spec file, parsing YAML for `.yaml`/`.yml` and JSON otherwise.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|err| HarnessError::spec(path.display().to_string(), err))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if is_yaml {
            serde_yml::from_str(&data)
                .map_err(|err| HarnessError::spec(path.display().to_string(), err))
        } else {
            serde_json::from_str(&data)
                .map_err(|err| HarnessError::spec(path.display().to_string(), err))
        }
    }

    /// Compile the classifier list, preserving priority order.
    pub fn compile_classifiers(&self) -> HarnessResult<ClassifierSet> {
        let mut classifiers = Vec::with_capacity(self.classifiers.len());
        for spec in &self.classifiers {
            classifiers.push(Classifier::new(spec.label.clone(), &spec.pattern)?);
        }
        Ok(ClassifierSet::new(classifiers))
    }

    /// Build the sorted input vocabulary.
    pub fn vocabulary(&self) -> InputVocabulary {
        InputVocabulary::new(&self.inputs)
    }
}

/// Sorted label-to-input mapping, resolved by binary search.
#[derive(Clone, Debug, Default)]
pub struct InputVocabulary {
    bindings: Vec<(String, String)>,
}

impl InputVocabulary {
    pub fn new(inputs: &[InputBinding]) -> Self {
        let mut bindings: Vec<(String, String)> = inputs
            .iter()
            .map(|binding| {
                let send = binding
                    .send
                    .clone()
                    .unwrap_or_else(|| derive_send(&binding.event));
                (binding.event.clone(), send)
            })
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        Self { bindings }
    }

    /// The raw input line bound to `label`, if registered.
    pub fn resolve(&self, label: &str) -> Option<&str> {
        self.bindings
            .binary_search_by(|(event, _)| event.as_str().cmp(label))
            .ok()
            .and_then(|index| self.bindings.get(index))
            .map(|(_, send)| send.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Default mapping: the first character of the label payload, skipping the
/// `?` marker when present.
fn derive_send(label: &str) -> String {
    label
        .strip_prefix('?')
        .unwrap_or(label)
        .chars()
        .next()
        .map(|c| c.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(event: &str, send: Option<&str>) -> InputBinding {
        InputBinding {
            event: event.to_string(),
            send: send.map(str::to_string),
        }
    }

    #[test]
    fn vocabulary_resolves_registered_labels() {
        let vocabulary = InputVocabulary::new(&[
            binding("?Yes", None),
            binding("?No", None),
            binding("?Start", None),
        ]);
        assert_eq!(vocabulary.resolve("?Yes"), Some("Y"));
        assert_eq!(vocabulary.resolve("?No"), Some("N"));
        assert_eq!(vocabulary.resolve("?Unknown"), None);
    }

    #[test]
    fn explicit_send_overrides_derived_mapping() {
        let vocabulary = InputVocabulary::new(&[binding("?Yes", Some("yes please"))]);
        assert_eq!(vocabulary.resolve("?Yes"), Some("yes please"));
    }

    #[test]
    fn vocabulary_sorts_unsorted_input() {
        let vocabulary = InputVocabulary::new(&[
            binding("?Violet", None),
            binding("?Blue", None),
            binding("?Red", None),
        ]);
        assert_eq!(vocabulary.resolve("?Blue"), Some("B"));
        assert_eq!(vocabulary.resolve("?Violet"), Some("V"));
        assert_eq!(vocabulary.resolve("?Red"), Some("R"));
    }
}
