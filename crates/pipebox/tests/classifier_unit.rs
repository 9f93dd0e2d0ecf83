// Test module - relaxed lint rules
#![allow(clippy::default_trait_access)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::inefficient_to_string)]
#![allow(clippy::panic)]
#![allow(clippy::manual_assert)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(missing_docs)]

//! Classifier matching, priority, and group-check semantics.

use pipebox::classify::{Classifier, ClassifierSet, GroupCheck};
use pipebox::oracle::Counters;

fn set(specs: &[(&str, &str)]) -> ClassifierSet {
    let classifiers = specs
        .iter()
        .map(|(label, pattern)| Classifier::new(*label, pattern).unwrap())
        .collect();
    ClassifierSet::new(classifiers)
}

#[test]
fn match_must_start_at_the_front_of_the_buffer() {
    let classifiers = set(&[("L_Hello", "hello\n")]);
    let counters = Counters::new();
    let mut buffer = "xxhello\n".to_string();
    assert!(classifiers.classify(&mut buffer, &counters).is_none());
    assert_eq!(buffer, "xxhello\n");
}

#[test]
fn first_listed_classifier_wins() {
    let counters = Counters::new();

    let mut buffer = "hello rest".to_string();
    let event = set(&[("L_Short", "he"), ("L_Long", "hello")])
        .classify(&mut buffer, &counters)
        .unwrap();
    assert_eq!(event.label, "L_Short");
    assert_eq!(buffer, "llo rest");

    // Same patterns, opposite order: the other one wins.
    let mut buffer = "hello rest".to_string();
    let event = set(&[("L_Long", "hello"), ("L_Short", "he")])
        .classify(&mut buffer, &counters)
        .unwrap();
    assert_eq!(event.label, "L_Long");
    assert_eq!(buffer, " rest");
}

#[test]
fn zero_length_matches_are_rejected() {
    let classifiers = set(&[("L_Maybe", "x*")]);
    let counters = Counters::new();
    let mut buffer = "yyy".to_string();
    assert!(classifiers.classify(&mut buffer, &counters).is_none());
    assert_eq!(buffer, "yyy");
}

#[test]
fn partial_data_leaves_the_buffer_untouched() {
    let classifiers = set(&[("L_Line", "complete line\n")]);
    let counters = Counters::new();
    let mut buffer = "complete li".to_string();
    assert!(classifiers.classify(&mut buffer, &counters).is_none());
    assert_eq!(buffer, "complete li");
}

#[test]
fn repeated_classification_drains_the_buffer() {
    let classifiers = set(&[("L_Ab", "ab\n")]);
    let counters = Counters::new();
    let mut buffer = "ab\nab\n".to_string();

    let mut labels = Vec::new();
    while let Some(event) = classifiers.classify(&mut buffer, &counters) {
        labels.push(event.label);
    }
    assert_eq!(labels, vec!["L_Ab", "L_Ab"]);
    assert!(buffer.is_empty());
}

#[test]
fn group_checks_feed_the_counters() {
    let classifier = Classifier::new("L_Score", r"score (\d+)\n")
        .unwrap()
        .with_check(GroupCheck::new("score is positive", vec![1], |args| {
            args.first()
                .and_then(|arg| arg.as_deref())
                .and_then(|raw| raw.parse::<u32>().ok())
                .is_some_and(|score| score > 0)
        }));
    let classifiers = ClassifierSet::new(vec![classifier]);
    let counters = Counters::new();

    let mut buffer = "score 5\n".to_string();
    let event = classifiers.classify(&mut buffer, &counters).unwrap();
    assert_eq!(event.label, "L_Score");
    assert_eq!(counters.passed(), 1);
    assert_eq!(counters.failed(), 0);

    // A failing check still emits the event.
    let mut buffer = "score 0\n".to_string();
    let event = classifiers.classify(&mut buffer, &counters).unwrap();
    assert_eq!(event.label, "L_Score");
    assert_eq!(counters.passed(), 1);
    assert_eq!(counters.failed(), 1);
}

#[test]
fn invalid_pattern_is_a_compile_error() {
    let err = Classifier::new("L_Bad", "(unclosed").unwrap_err();
    assert!(err.to_string().contains("L_Bad"));
}
