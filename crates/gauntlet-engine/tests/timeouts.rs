//! Timeout semantics: the timer cancels the wait, the walk moves on, and
//! late completions are discarded.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gauntlet_core::{Body, Done, EngineError, HookKind, MemoryReporter, TestStatus};
use gauntlet_engine::{Engine, EngineConfig};

#[tokio::test(start_paused = true)]
async fn test_async_body_times_out_at_limit_not_at_body_duration() {
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test_with_timeout(
            "slow",
            Duration::from_millis(50),
            Body::async_fn(|| tokio::time::sleep(Duration::from_millis(1_000))),
        );
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(summary.failed, 1);
    let result = reporter.result_named("slow").unwrap();
    assert_eq!(
        result.error,
        Some(EngineError::Timeout {
            limit: Duration::from_millis(50)
        })
    );
    // Abandoned at the limit, not after the body's full sleep.
    assert!(result.duration >= Duration::from_millis(50));
    assert!(result.duration < Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn test_walk_proceeds_immediately_after_timeout() {
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test_with_timeout(
            "stuck",
            Duration::from_millis(20),
            Body::async_fn(|| tokio::time::sleep(Duration::from_secs(3_600))),
        );
        t.test("fast sibling", Body::sync(|| {}));
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.passed, 1);
    assert_eq!(
        reporter.statuses(),
        vec![
            ("stuck".to_string(), TestStatus::Fail),
            ("fast sibling".to_string(), TestStatus::Pass),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_callback_never_completing_times_out() {
    let parked: Rc<RefCell<Option<Done>>> = Rc::default();
    let slot = Rc::clone(&parked);
    let engine = Engine::collect(EngineConfig::default(), |t| {
        let slot = Rc::clone(&slot);
        t.test_with_timeout(
            "forgetful",
            Duration::from_millis(30),
            Body::callback(move |done| {
                // Park the handle instead of completing.
                *slot.borrow_mut() = Some(done);
            }),
        );
    });
    let mut reporter = MemoryReporter::new();
    engine.run(&mut reporter).await;

    let result = reporter.result_named("forgetful").unwrap();
    assert!(result.error.as_ref().unwrap().is_timeout());

    // A completion arriving after abandonment is discarded, not a panic and
    // not a result rewrite.
    parked.borrow().as_ref().unwrap().ok();
    assert_eq!(
        reporter.result_named("forgetful").unwrap().status,
        TestStatus::Fail
    );
}

#[tokio::test(start_paused = true)]
async fn test_hook_timeout_gates_test_with_timeout_error() {
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.describe("s", |t| {
            t.before_each_with_timeout(
                Body::async_fn(|| tokio::time::sleep(Duration::from_secs(5))),
                Duration::from_millis(20),
            );
            t.test("gated", Body::sync(|| {}));
        });
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(summary.failed, 1);
    let result = reporter.result_named("s > gated").unwrap();
    assert!(result.error.as_ref().unwrap().is_timeout());
    let hook_errors = reporter.hook_errors();
    assert_eq!(hook_errors.len(), 1);
    assert_eq!(hook_errors[0].0, "s");
    assert_eq!(hook_errors[0].1, HookKind::BeforeEach);
}

#[tokio::test(start_paused = true)]
async fn test_per_test_override_beats_default() {
    let config = EngineConfig {
        default_timeout_ms: 10,
        ..EngineConfig::default()
    };
    let engine = Engine::collect(config, |t| {
        t.test_with_timeout(
            "patient",
            Duration::from_millis(100),
            Body::async_fn(|| tokio::time::sleep(Duration::from_millis(50))),
        );
        t.test(
            "impatient",
            Body::async_fn(|| tokio::time::sleep(Duration::from_millis(50))),
        );
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(reporter.result_named("patient").unwrap().status, TestStatus::Pass);
    assert_eq!(reporter.result_named("impatient").unwrap().status, TestStatus::Fail);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
}
