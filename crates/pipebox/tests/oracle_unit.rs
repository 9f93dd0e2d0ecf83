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

//! Oracle and scripted-run tests.

use pipebox::oracle::walker::{ModelStep, StaticContext};
use pipebox::oracle::{run_script, Oracle, ScriptOutcome};
use pipebox::session::{Sut, SutConfig};
use std::time::{Duration, Instant};

fn cat() -> Sut {
    Sut::spawn(SutConfig::new("/bin/cat", vec![])).unwrap()
}

#[test]
fn checks_move_the_counters() {
    let oracle = Oracle::new(cat());
    let counters = oracle.counters();

    assert!(oracle.check("holds", true));
    assert!(!oracle.check("does not hold", false));
    assert!(!oracle.check_that(false));

    assert_eq!(counters.passed(), 1);
    assert_eq!(counters.failed(), 2);
}

#[test]
fn completed_script_reports_its_tallies() {
    let outcome = run_script(cat(), |oracle| {
        oracle.input("ping")?;
        let lines = oracle.read_lines()?;
        oracle.check("echoed back", lines == ["ping"]);
        oracle.check("deliberately wrong", lines == ["pong"]);
        Ok(())
    });

    assert!(outcome.is_failure());
    assert_eq!(outcome.passed(), 1);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(
        outcome.to_string(),
        "tests failed: 1; tests succeeded: 1"
    );
}

#[test]
fn all_passing_script_is_a_success() {
    let sut = Sut::spawn(SutConfig::new("/bin/echo", vec!["Welcome".to_string()])).unwrap();
    let outcome = run_script(sut, |oracle| {
        let lines = oracle.read_lines()?;
        oracle.check("banner shown", lines == ["Welcome"]);
        Ok(())
    });

    assert!(!outcome.is_failure());
    assert!(matches!(
        outcome,
        ScriptOutcome::Completed {
            passed: 1,
            failed: 0
        }
    ));
}

#[test]
fn sut_death_aborts_the_script() {
    let sut = Sut::spawn(SutConfig::new("/bin/echo", vec!["bye".to_string()])).unwrap();
    let outcome = run_script(sut, |oracle| {
        let lines = oracle.read_lines()?;
        oracle.check("final line", lines == ["bye"]);
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            oracle.read_lines()?;
            assert!(Instant::now() < deadline, "termination never surfaced");
        }
    });

    assert!(outcome.is_failure());
    assert_eq!(outcome.passed(), 1);
    match outcome {
        ScriptOutcome::Aborted { cause, .. } => assert!(cause.is_terminated()),
        ScriptOutcome::Completed { .. } => panic!("expected the run to abort"),
    }
}

#[test]
fn model_steps_drive_the_oracle_through_a_context() {
    let mut oracle = Oracle::new(cat());
    let mut context = StaticContext::new().with_parameter("line", "marco");

    let mut steps: Vec<ModelStep<'_>> = vec![
        Box::new(|oracle, context| {
            let line = context.parameter("line").unwrap_or_default();
            oracle.input(&line)
        }),
        Box::new(|oracle, context| {
            let lines = oracle.read_lines()?;
            if oracle.check("echoed the parameter", lines == ["marco"]) {
                context.set_state("v_Echoed");
            }
            Ok(())
        }),
    ];

    for step in &mut steps {
        step(&mut oracle, &mut context).unwrap();
    }

    assert_eq!(context.current_state(), Some("v_Echoed"));
    assert_eq!(oracle.counters().passed(), 1);
    oracle.sut().stop();
}
