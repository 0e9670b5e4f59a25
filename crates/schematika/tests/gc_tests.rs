//! Collection behavior under memory pressure: a tiny threshold forces the
//! heap to collect mid-evaluation, and results must not change.

use schematika::{Object, Session};

#[test]
fn factorial_survives_forced_collections() {
    // Threshold small enough that recursing to depth 5 must collect at
    // least once while frames and environments are live.
    let mut session = Session::with_gc_threshold(16);
    session
        .execute("def fact = lambda(n : i64) : i64 if n == 0 then 1 else n * fact(n - 1);")
        .expect("definition");
    let result = session.execute("fact(5);").expect("call");
    assert_eq!(result, Object::I64(120));
    assert!(
        session.collections() >= 1,
        "expected at least one collection, saw {}",
        session.collections()
    );
}

#[test]
fn results_are_stable_across_many_collections() {
    let mut session = Session::with_gc_threshold(8);
    session
        .execute("def fib = lambda(n : i64) : i64 if n < 2 then n else fib(n - 1) + fib(n - 2);")
        .expect("definition");
    assert_eq!(session.execute("fib(10);").expect("call"), Object::I64(55));
    let first_round = session.collections();
    assert!(first_round >= 1);
    // Run again: the heap was compacted, bindings must still resolve.
    assert_eq!(session.execute("fib(10);").expect("call"), Object::I64(55));
}

#[test]
fn collection_drops_dead_frames_and_environments() {
    let mut session = Session::with_gc_threshold(8);
    session
        .execute("def fact = lambda(n : i64) : i64 if n == 0 then 1 else n * fact(n - 1);")
        .expect("definition");
    session.execute("fact(8);").expect("call");
    // At rest, only the global environment, its slot array, and the one
    // closure (plus its body) should be live after a collection settles.
    let stats = session.heap_stats();
    assert!(
        stats.live_objects < 200,
        "dead frames should not accumulate: {stats}"
    );
    assert!(stats.objects_by_kind.contains_key("Closure"));
}

#[test]
fn string_results_survive_collection() {
    let mut session = Session::with_gc_threshold(4);
    session.execute("def greeting = \"hello, world\";").expect("definition");
    // Allocate enough garbage to force collections.
    session
        .execute("def spin = lambda(n : i64) : i64 if n == 0 then 0 else spin(n - 1); spin(50);")
        .expect("garbage");
    assert!(session.collections() >= 1);
    assert_eq!(
        session.execute("greeting;").expect("read back"),
        Object::Str("hello, world".to_owned())
    );
}
