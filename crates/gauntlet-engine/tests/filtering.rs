//! End-to-end only/skip/todo behavior: what executes, what is merely
//! reported, and what never appears at all.

use std::cell::RefCell;
use std::rc::Rc;

use gauntlet_core::{Body, EngineError, MemoryReporter, TestStatus};
use gauntlet_engine::{Engine, EngineConfig};

type Log = Rc<RefCell<Vec<String>>>;

fn log_body(log: &Log, label: &str) -> Body {
    let log = Rc::clone(log);
    let label = label.to_string();
    Body::sync(move || log.borrow_mut().push(label.clone()))
}

#[tokio::test]
async fn test_describe_only_excludes_top_level_test_from_results() {
    let log: Log = Rc::default();
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test("A", log_body(&log, "A"));
        t.describe_only("B", |t| {
            t.test("C", log_body(&log, "C"));
        });
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(*log.borrow(), vec!["C"]);
    assert_eq!(summary.total(), 1);
    // The excluded test is absent, not reported as skipped.
    assert!(reporter.result_named("A").is_none());
    assert_eq!(reporter.result_named("B > C").unwrap().status, TestStatus::Pass);
}

#[tokio::test]
async fn test_direct_only_child_wins_inside_only_suite() {
    let log: Log = Rc::default();
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.describe_only("D", |t| {
            t.test_only("E", log_body(&log, "E"));
            t.test("F", log_body(&log, "F"));
        });
    });
    let mut reporter = MemoryReporter::new();
    engine.run(&mut reporter).await;

    assert_eq!(*log.borrow(), vec!["E"]);
    assert!(reporter.result_named("D > F").is_none());
}

#[tokio::test]
async fn test_three_levels_of_only_narrowing() {
    let log: Log = Rc::default();
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.describe("A", |t| {
            t.describe("B", |t| {
                t.describe("C", |t| {
                    t.test_only("deep", log_body(&log, "deep"));
                    t.test("shallow", log_body(&log, "shallow"));
                });
                t.test("mid", log_body(&log, "mid"));
            });
            t.test("top", log_body(&log, "top"));
        });
        t.test("root", log_body(&log, "root"));
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(*log.borrow(), vec!["deep"]);
    assert_eq!(summary.total(), 1);
    assert_eq!(reporter.results().len(), 1);
    assert_eq!(reporter.results()[0].name, "A > B > C > deep");
}

#[tokio::test]
async fn test_skip_and_todo_are_reported_but_never_run() {
    let log: Log = Rc::default();
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test_skip("skipped", log_body(&log, "skipped"));
        t.test_todo("pending", log_body(&log, "pending"));
        t.test("live", log_body(&log, "live"));
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(*log.borrow(), vec!["live"]);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.todo, 1);
    assert_eq!(reporter.result_named("skipped").unwrap().status, TestStatus::Skip);
    assert_eq!(reporter.result_named("pending").unwrap().status, TestStatus::Todo);
}

#[tokio::test]
async fn test_suite_skip_cascades_but_reports_each_descendant() {
    let log: Log = Rc::default();
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.describe_skip("s", |t| {
            t.test("a", log_body(&log, "a"));
            t.describe("inner", |t| {
                t.test("b", log_body(&log, "b"));
            });
        });
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert!(log.borrow().is_empty());
    assert_eq!(summary.skipped, 2);
    assert_eq!(reporter.result_named("s > a").unwrap().status, TestStatus::Skip);
    assert_eq!(
        reporter.result_named("s > inner > b").unwrap().status,
        TestStatus::Skip
    );
}

#[tokio::test]
async fn test_failing_test_inverts_outcome() {
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test_failing("should fail and does", Body::sync(|| -> () { panic!("expected") }));
        t.test_failing("should fail but passes", Body::sync(|| {}));
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        reporter.result_named("should fail and does").unwrap().status,
        TestStatus::Pass
    );
    let unexpected = reporter.result_named("should fail but passes").unwrap();
    assert_eq!(unexpected.status, TestStatus::Fail);
    assert!(matches!(unexpected.error, Some(EngineError::TestBody { .. })));
}

#[tokio::test]
async fn test_name_filter_from_config() {
    let log: Log = Rc::default();
    let config = EngineConfig {
        filter: Some("math".to_string()),
        ..EngineConfig::default()
    };
    let engine = Engine::collect(config, |t| {
        t.describe("math", |t| {
            t.test("adds", log_body(&log, "adds"));
        });
        t.describe("io", |t| {
            t.test("reads", log_body(&log, "reads"));
        });
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(*log.borrow(), vec!["adds"]);
    assert_eq!(summary.total(), 1);
    assert!(reporter.result_named("io > reads").is_none());
}

#[tokio::test]
async fn test_test_each_runs_one_test_per_row() {
    let engine = Engine::collect(EngineConfig::default(), |t| {
        t.test_each("doubles", [1i32, 2, 3], |n| {
            assert_eq!(n + n, 2 * n);
        });
    });
    let mut reporter = MemoryReporter::new();
    let summary = engine.run(&mut reporter).await;

    assert_eq!(summary.passed, 3);
    assert!(reporter.result_named("doubles [2]").is_some());
}
