//! Interpreter, cache and stepper behavior seen from outside the crate

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use revact::cache::ManualClock;
use revact::{
    Action, ActionCache, ActionError, CacheSettings, CachingInterpreter, Evaluate, Interpreter,
    Leaf, LeafExt, Response, Stepper,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Foo(u32);

impl Leaf for Foo {
    type Output = u32;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Bar;

impl Leaf for Bar {
    type Output = String;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Audit(String);

impl Leaf for Audit {
    type Output = ();
}

fn counting<L: Leaf>(
    calls: &Arc<AtomicUsize>,
    answer: impl Fn(&L) -> L::Output + Send + Sync + 'static,
) -> Interpreter {
    let calls = Arc::clone(calls);
    Interpreter::new().on::<L>().apply(move |leaf| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(answer(leaf))
    })
}

#[test]
fn test_merge_last_registration_wins() {
    let first = Interpreter::new().on::<Foo>().returns(1);
    let second = Interpreter::new().on::<Foo>().returns(2);

    let merged = Interpreter::merge([first.clone(), second.clone()]);
    assert_eq!(merged.evaluate(&Foo(0).action()).unwrap(), 2);

    let reversed = Interpreter::merge([second, first]);
    assert_eq!(reversed.evaluate(&Foo(0).action()).unwrap(), 1);
}

#[test]
fn test_merge_keeps_disjoint_handlers() {
    let merged = Interpreter::merge([
        Interpreter::new().on::<Foo>().returns(3),
        Interpreter::new().on::<Bar>().returns("bar".to_string()),
    ]);
    let action = Foo(0).action().zip(Bar.action());
    assert_eq!(merged.evaluate(&action).unwrap(), (3, "bar".to_string()));
    assert_eq!(merged.registered_types(), vec!["Bar", "Foo"]);
}

#[test]
fn test_unhandled_leaf_names_its_type() {
    let interpreter = Interpreter::new().on::<Foo>().returns(1);
    let err = interpreter
        .evaluate(&Foo(1).action().then(|_| Bar.action()))
        .unwrap_err();
    assert!(matches!(err, ActionError::Unhandled { type_name: "Bar" }));
    assert!(err.to_string().contains("Bar"));
}

#[test]
fn test_first_failure_aborts_remaining_work() {
    let audits = Arc::new(AtomicUsize::new(0));
    let interpreter = Interpreter::merge([
        Interpreter::new()
            .on::<Foo>()
            .apply(|_| anyhow::bail!("upstream unavailable")),
        counting::<Audit>(&audits, |_| ()),
    ]);

    let action = Foo(1)
        .action()
        .then(|_| Audit("after".to_string()).action());
    let err = interpreter.evaluate(&action).unwrap_err();

    assert!(matches!(err, ActionError::Handler { type_name: "Foo", .. }));
    assert_eq!(audits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_ignore_answers_unit() {
    let interpreter = Interpreter::new().ignore::<Audit>();
    let action = Audit("x".to_string()).action().replace(5u8);
    assert_eq!(interpreter.evaluate(&action).unwrap(), 5);
}

#[test]
fn test_stop_reports_the_leaf_reached() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let observed = Arc::clone(&seen);
    let interpreter = Interpreter::new()
        .on::<Foo>()
        .returns(7)
        .on::<Audit>()
        .stop(move |leaf| observed.lock().push(leaf.0.clone()));

    let action = Foo(1)
        .action()
        .then(|n| Audit(format!("n={}", n)).action())
        .followed_by(Bar.action());
    let err = interpreter.evaluate(&action).unwrap_err();

    assert!(err.is_stopped());
    assert_eq!(err.type_name(), Some("Audit"));
    assert_eq!(*seen.lock(), vec!["n=7".to_string()]);
}

#[test]
#[should_panic(expected = "action evaluation failed")]
fn test_evaluate_or_panic_panics_on_failure() {
    Interpreter::new().evaluate_or_panic(&Bar.action());
}

#[test]
fn test_response_boundary() {
    let interpreter = Interpreter::new().on::<Foo>().apply(|leaf| Ok(leaf.0 * 2));
    let response = interpreter
        .evaluate_to_response(&sequence_of_foos(&[1, 2]))
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, serde_json::json!([2, 4]));

    let err = interpreter.evaluate(&Bar.action()).unwrap_err();
    let response = Response::from_error(&err);
    assert_eq!(response.status, 500);
    assert_eq!(response.body["action"], "Bar");
    assert!(!response.is_success());
}

fn sequence_of_foos(values: &[u32]) -> Action<Vec<u32>> {
    revact::traverse(values.to_vec(), |v| Foo(v).action())
}

#[test]
fn test_cache_serves_repeat_leaves_until_expiry() {
    let clock = ManualClock::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ActionCache::builder()
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .clock(clock.clone())
        .build();
    let interpreter = CachingInterpreter::new(counting::<Foo>(&calls, |leaf| leaf.0 + 100), cache);

    let action = Foo(1).action().zip(Foo(2).action());
    assert_eq!(interpreter.evaluate(&action).unwrap(), (101, 102));
    assert_eq!(interpreter.evaluate(&action).unwrap(), (101, 102));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    clock.advance(Duration::from_secs(31));
    assert_eq!(interpreter.evaluate(&Foo(1).action()).unwrap(), 101);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let stats = interpreter.cache().stats();
    assert_eq!(stats.hits, 2);
    assert!(stats.expirations >= 1);
}

#[test]
fn test_cache_bypasses_types_without_expiry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ActionCache::builder()
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .build();
    let interpreter =
        CachingInterpreter::new(counting::<Bar>(&calls, |_| "fresh".to_string()), cache);

    for _ in 0..3 {
        assert_eq!(interpreter.evaluate(&Bar.action()).unwrap(), "fresh");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(interpreter.cache().is_empty());
}

#[test]
fn test_cache_is_shared_between_interpreters() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ActionCache::builder()
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .build();

    let first = CachingInterpreter::new(counting::<Foo>(&calls, |leaf| leaf.0), cache.clone());
    let second = CachingInterpreter::new(counting::<Foo>(&calls, |leaf| leaf.0), cache);

    assert_eq!(first.evaluate(&Foo(9).action()).unwrap(), 9);
    assert_eq!(second.evaluate(&Foo(9).action()).unwrap(), 9);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cache_evicts_least_recently_used() {
    let calls = Arc::new(AtomicUsize::new(0));
    let cache = ActionCache::builder()
        .maximum_entries(2)
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .build();
    let interpreter = CachingInterpreter::new(counting::<Foo>(&calls, |leaf| leaf.0), cache);

    interpreter.evaluate(&Foo(1).action()).unwrap();
    interpreter.evaluate(&Foo(2).action()).unwrap();
    // Touch 1 so that 2 becomes the eviction candidate.
    interpreter.evaluate(&Foo(1).action()).unwrap();
    interpreter.evaluate(&Foo(3).action()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    interpreter.evaluate(&Foo(1).action()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    interpreter.evaluate(&Foo(2).action()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(interpreter.cache().len(), 2);
}

#[test]
fn test_cache_settings_override_by_type_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(
        &path,
        r#"{ "maximum_entries": 8, "expire_after_write_secs": { "Foo": 5 } }"#,
    )
    .unwrap();

    let settings = CacheSettings::load(&path).unwrap();
    let cache = ActionCache::builder()
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .settings(&settings)
        .build();

    assert_eq!(cache.maximum_entries(), Some(8));
    assert_eq!(cache.policy_for::<Foo>(), Some(Duration::from_secs(5)));
}

#[test]
fn test_failed_handlers_are_not_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let cache = ActionCache::builder()
        .expire::<Foo>()
        .after_write(Duration::from_secs(30))
        .build();
    let inner = Interpreter::new().on::<Foo>().apply(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("flaky")
    });
    let interpreter = CachingInterpreter::new(inner, cache);

    assert!(interpreter.evaluate(&Foo(1).action()).is_err());
    assert!(interpreter.evaluate(&Foo(1).action()).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(interpreter.cache().is_empty());
}

#[test]
fn test_stepper_peek_runs_nothing() {
    let interpreter = Interpreter::new()
        .on::<Foo>()
        .apply(|leaf| anyhow::bail!("should not run for {}", leaf.0));
    let action = Foo(1).action().zip(Foo(2).action());

    let stepper = Stepper::new(&interpreter, &action);
    let leaves = stepper.peek();
    assert_eq!(leaves.len(), 2);
    assert_eq!(leaves[0].downcast_ref::<Foo>(), Some(&Foo(1)));
    assert_eq!(leaves[1].downcast_ref::<Foo>(), Some(&Foo(2)));
    assert_eq!(stepper.steps(), 0);
}

#[test]
fn test_stepper_walks_layers_then_signals_done() {
    let interpreter = Interpreter::new()
        .on::<Foo>()
        .apply(|leaf| Ok(leaf.0 + 1))
        .on::<Bar>()
        .returns("bar".to_string());
    let action = Foo(1)
        .action()
        .then(|n| Foo(n).action().zip(Bar.action()));

    let mut stepper = Stepper::new(&interpreter, &action);
    let second = stepper.next().unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].downcast_ref::<Foo>(), Some(&Foo(2)));
    assert!(second[1].is::<Bar>());

    assert!(stepper.next().unwrap().is_empty());
    assert!(stepper.is_done());
    assert!(stepper.next().unwrap_err().is_done());
    assert_eq!(stepper.steps(), 2);
    assert_eq!(stepper.run_remaining_steps().unwrap(), (3, "bar".to_string()));
}

#[test]
fn test_stepper_on_pure_action_is_done() {
    let interpreter = Interpreter::new();
    let mut stepper = Stepper::new(&interpreter, &Action::pure(4));
    assert!(stepper.is_done());
    assert!(stepper.peek().is_empty());
    assert!(matches!(stepper.next(), Err(ActionError::Done)));
    assert_eq!(stepper.run_remaining_steps().unwrap(), 4);
}
