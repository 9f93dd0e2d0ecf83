//! Ordered pattern classifiers that turn raw SUT output into labeled events.
//!
//! Classifiers are tried strictly in list order and must match at the start
//! of the buffer, so the consumed prefix corresponds exactly to the bytes
//! removed. First match wins by list order; callers rely on this even when a
//! later pattern would consume a longer prefix, e.g. an error-output
//! classifier listed before a menu classifier keeps malformed input from
//! being misread as a valid menu transition.

use crate::error::{HarnessError, HarnessResult};
use crate::model::OutputEvent;
use crate::oracle::Counters;
use regex::{Regex, RegexBuilder};

/// Upper bound on the compiled size of a classifier pattern.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Compile a pattern anchored to the start of the buffer, with a bounded
/// compiled size so spec-supplied patterns cannot blow up memory.
fn compile_prefix_regex(label: &str, pattern: &str) -> HarnessResult<Regex> {
    RegexBuilder::new(&format!("\\A(?:{pattern})"))
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|source| HarnessError::Pattern {
            label: label.to_string(),
            source: Box::new(source),
        })
}

type GroupPredicate = Box<dyn Fn(&[Option<String>]) -> bool + Send + Sync>;

/// An inline sub-assertion evaluated against a classifier's capture groups.
///
/// Failures are recorded through the shared counters and logged; they never
/// prevent the event from being emitted.
pub struct GroupCheck {
    name: String,
    groups: Vec<usize>,
    predicate: GroupPredicate,
}

impl GroupCheck {
    pub fn new(
        name: impl Into<String>,
        groups: Vec<usize>,
        predicate: impl Fn(&[Option<String>]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            groups,
            predicate: Box::new(predicate),
        }
    }
}

impl std::fmt::Debug for GroupCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCheck")
            .field("name", &self.name)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

/// A labeled pattern that recognizes one structurally complete chunk of
/// output at the front of the buffer.
#[derive(Debug)]
pub struct Classifier {
    label: String,
    pattern: Regex,
    checks: Vec<GroupCheck>,
}

impl Classifier {
    pub fn new(label: impl Into<String>, pattern: &str) -> HarnessResult<Self> {
        let label = label.into();
        let pattern = compile_prefix_regex(&label, pattern)?;
        Ok(Self {
            label,
            pattern,
            checks: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_check(mut self, check: GroupCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Byte length of the matched prefix, if this classifier matches the
    /// buffer starting at position 0. Runs the group checks as a side effect.
    fn try_match(&self, buffer: &str, counters: &Counters) -> Option<usize> {
        let captures = self.pattern.captures(buffer)?;
        let whole = captures.get(0)?;
        // A zero-length match would consume nothing and loop forever.
        if whole.is_empty() {
            return None;
        }
        for check in &self.checks {
            let arguments: Vec<Option<String>> = check
                .groups
                .iter()
                .map(|&group| captures.get(group).map(|m| m.as_str().to_owned()))
                .collect();
            let holds = (check.predicate)(&arguments);
            counters.record(holds);
            if !holds {
                tracing::warn!(
                    target: "pipebox::classify",
                    label = %self.label,
                    check = %check.name,
                    ?arguments,
                    "group check failed"
                );
            }
        }
        Some(whole.end())
    }
}

/// An ordered set of classifiers applied against a growing output buffer.
pub struct ClassifierSet {
    classifiers: Vec<Classifier>,
}

impl ClassifierSet {
    pub fn new(classifiers: Vec<Classifier>) -> Self {
        Self { classifiers }
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Emit the first event recognized at the front of `buffer`, draining
    /// the consumed prefix in place. `None` leaves the buffer untouched,
    /// pending more data.
    pub fn classify(&self, buffer: &mut String, counters: &Counters) -> Option<OutputEvent> {
        for classifier in &self.classifiers {
            if let Some(consumed) = classifier.try_match(buffer, counters) {
                let prefix: String = buffer.drain(..consumed).collect();
                tracing::debug!(
                    target: "pipebox::classify",
                    label = %classifier.label,
                    "classified {prefix:?}"
                );
                return Some(OutputEvent::classified(classifier.label.clone()));
            }
        }
        None
    }
}

impl std::fmt::Debug for ClassifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.classifiers.iter().map(Classifier::label).collect();
        f.debug_struct("ClassifierSet")
            .field("labels", &labels)
            .finish()
    }
}
