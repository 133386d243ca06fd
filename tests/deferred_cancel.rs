//! Cancellation suite: refusal after cancel and tree-wide propagation.

mod common;

use common::{CallLog, counted_context, init_test_logging};
use deferred::{Context, Deferred, DeferredConfig, Job, Liveness, Next, State};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

fn init_test(name: &str) {
    init_test_logging();
    deferred::test_phase!(name);
}

fn spy(log: &CallLog, name: &'static str) -> impl FnOnce(bool) -> Next<bool, ()> + 'static {
    let l = log.clone();
    move |v| {
        l.push(name);
        Next::Resolve(v)
    }
}

/// Installs an outcome handler that holds jobs until `run_held` is called.
fn hold_outcomes(ctx: &Context) -> Rc<RefCell<VecDeque<Job>>> {
    let held: Rc<RefCell<VecDeque<Job>>> = Rc::default();
    let sink = Rc::clone(&held);
    ctx.set_outcome_handler(move |job| sink.borrow_mut().push_back(job));
    held
}

fn run_held(held: &RefCell<VecDeque<Job>>) {
    loop {
        let next = held.borrow_mut().pop_front();
        let Some(job) = next else { break };
        job();
    }
}

#[test]
fn cancel_stops_future_settlement_and_registration() {
    init_test("cancel_stops_future_settlement_and_registration");
    let ctx = Context::new();
    let log = CallLog::new();

    let unit: Deferred<bool, ()> = ctx.deferred();
    let _ = unit.promise().then(spy(&log, "callback1"));
    unit.resolve(true);
    let _ = unit.promise().then(spy(&log, "callback2"));
    unit.promise().cancel();
    let _ = unit.promise().then(spy(&log, "callback3"));

    let other: Deferred<bool, ()> = ctx.deferred();
    let _ = other.promise().then(spy(&log, "callback4"));
    other.promise().cancel();
    let _ = other.promise().then(spy(&log, "callback5"));
    other.resolve(true);
    let _ = other.promise().then(spy(&log, "callback6"));

    assert_eq!(log.entries(), vec!["callback1", "callback2"]);
    assert_eq!(other.state(), State::Pending);
    deferred::test_complete!("cancel_stops_future_settlement_and_registration");
}

#[test]
fn cancel_reaches_up_and_down_the_chain() {
    init_test("cancel_reaches_up_and_down_the_chain");
    let unit: Deferred<i32, ()> = Context::new().deferred();
    let p2 = unit.promise().then(|v| Next::Resolve(v));
    let p3 = p2.then(|v| Next::Resolve(v));

    p2.cancel();

    assert!(p2.is_cancelled());
    assert!(unit.is_cancelled());
    assert!(p3.is_cancelled());
    for p in [&unit.promise(), &p2, &p3] {
        assert_eq!(p.liveness(), Liveness::Cancelled);
    }
    deferred::test_complete!("cancel_reaches_up_and_down_the_chain");
}

#[test]
fn cancel_reaches_sibling_branches_and_pairs() {
    init_test("cancel_reaches_sibling_branches_and_pairs");
    let unit: Deferred<i32, &str> = Context::new().deferred();
    let left = unit.promise().then(|v| Next::Resolve(v));
    let right = unit
        .promise()
        .then_or(|v| Next::Resolve(v), |e| Next::Fail(e));
    let deep = right.then(|v| Next::Resolve(v)).then(|v| Next::Resolve(v));

    left.cancel();

    assert!(right.is_cancelled());
    assert!(deep.is_cancelled());
    deferred::test_complete!("cancel_reaches_sibling_branches_and_pairs");
}

#[test]
fn cancel_after_settlement_keeps_state() {
    init_test("cancel_after_settlement_keeps_state");
    let unit: Deferred<i32, ()> = Context::new().deferred();
    unit.resolve(3);
    unit.cancel();
    let promise = unit.promise();
    assert!(promise.is_resolved());
    assert!(promise.is_cancelled());
    assert_eq!(promise.value(), Some(3));
    deferred::test_complete!("cancel_after_settlement_keeps_state");
}

#[test]
fn cancel_is_idempotent() {
    init_test("cancel_is_idempotent");
    let unit: Deferred<i32, ()> = Context::new().deferred();
    let child = unit.promise().then(|v| Next::Resolve(v));
    unit.cancel();
    unit.cancel();
    child.cancel();
    assert!(child.is_cancelled());
    deferred::test_complete!("cancel_is_idempotent");
}

#[test]
fn registration_on_cancelled_returns_detached_cancelled_handle() {
    init_test("registration_on_cancelled_returns_detached_cancelled_handle");
    let unit: Deferred<i32, ()> = Context::new().deferred();
    unit.cancel();
    let out = unit.promise().then_or(|v| Next::Resolve(v), |e| Next::Fail(e));
    assert!(out.is_cancelled());
    assert!(out.is_pending());
    assert_eq!(unit.promise().continuation_counts(), (0, 0));
    assert_eq!(unit.promise().child_count(), 0);
    deferred::test_complete!("registration_on_cancelled_returns_detached_cancelled_handle");
}

#[test]
fn deactivated_branch_refuses_registration() {
    init_test("deactivated_branch_refuses_registration");
    let unit: Deferred<i32, &str> = Context::new().deferred();
    let success_branch = unit.promise().then(|v| Next::Resolve(v));
    let _ = unit.promise().otherwise(|e| Next::Fail(e));
    unit.fail("boom");
    assert_eq!(success_branch.liveness(), Liveness::Dormant);
    let late = success_branch.then(|v| Next::Resolve(v));
    assert_eq!(late.liveness(), Liveness::Cancelled);
    deferred::test_complete!("deactivated_branch_refuses_registration");
}

#[test]
fn cancelled_unit_is_not_revived_by_redirect() {
    init_test("cancelled_unit_is_not_revived_by_redirect");
    let ctx = Context::new();
    let unit: Deferred<i32, &str> = ctx.deferred();
    let nested: Deferred<i32, &str> = ctx.deferred();
    let nested_promise = nested.promise();
    let visible = unit
        .promise()
        .then_or(|v| Next::Resolve(v), move |_| Next::Defer(nested_promise));
    unit.fail("boom");
    visible.cancel();
    nested.resolve(1);
    assert_eq!(visible.liveness(), Liveness::Cancelled);
    assert!(visible.is_pending());
    deferred::test_complete!("cancelled_unit_is_not_revived_by_redirect");
}

#[test]
fn quiet_config_still_ignores_cancelled_settlement() {
    init_test("quiet_config_still_ignores_cancelled_settlement");
    let ctx = Context::with_config(DeferredConfig::default().warn_ignored(false));
    let unit: Deferred<i32, ()> = ctx.deferred();
    unit.cancel();
    unit.resolve(1);
    assert_eq!(unit.state(), State::Pending);
    deferred::test_complete!("quiet_config_still_ignores_cancelled_settlement");
}

#[test]
fn cancel_before_deferred_outcome_runs_skips_continuations() {
    init_test("cancel_before_deferred_outcome_runs_skips_continuations");
    let (ctx, gauge) = counted_context("held");
    let held = hold_outcomes(&ctx);
    let log = CallLog::new();

    let unit: Deferred<i32, ()> = ctx.deferred();
    let child = unit.promise().then(spy_i32(&log, "callback"));
    unit.resolve(1);
    assert_eq!(held.borrow().len(), 1);

    unit.cancel();
    run_held(&held);

    assert!(log.is_empty());
    assert!(child.is_pending());
    assert_eq!(child.liveness(), Liveness::Cancelled);
    let value = gauge.value();
    deferred::assert_with_log!(value == 0, "activation balanced", 0, value);
    deferred::test_complete!("cancel_before_deferred_outcome_runs_skips_continuations");
}

#[test]
fn cancel_from_continuation_stops_later_siblings() {
    init_test("cancel_from_continuation_stops_later_siblings");
    let (ctx, gauge) = counted_context("inside");
    let log = CallLog::new();

    let unit: Deferred<i32, ()> = ctx.deferred();
    let again = unit.clone();
    let l = log.clone();
    let _ = unit.promise().then(move |v| {
        l.push("first");
        again.cancel();
        Next::Resolve(v)
    });
    let second = unit.promise().then(spy_i32(&log, "second"));
    unit.resolve(1);

    assert_eq!(log.entries(), vec!["first"]);
    assert!(second.is_pending());
    assert_eq!(gauge.value(), 0);
    let snap = gauge.snapshot();
    assert_eq!(snap.activations, snap.deactivations);
    deferred::test_complete!("cancel_from_continuation_stops_later_siblings");
}

#[test]
fn cancel_before_late_delivery_runs_skips_continuation() {
    init_test("cancel_before_late_delivery_runs_skips_continuation");
    let (ctx, gauge) = counted_context("late");
    let log = CallLog::new();
    let unit: Deferred<i32, ()> = ctx.deferred();
    unit.resolve(1);

    let held = hold_outcomes(&ctx);
    let _ = unit.promise().then(spy_i32(&log, "late"));
    assert_eq!(held.borrow().len(), 1);
    unit.cancel();
    run_held(&held);

    assert!(log.is_empty());
    assert_eq!(gauge.value(), 0);
    deferred::test_complete!("cancel_before_late_delivery_runs_skips_continuation");
}

fn spy_i32(log: &CallLog, name: &'static str) -> impl FnOnce(i32) -> Next<i32, ()> + 'static {
    let l = log.clone();
    move |v| {
        l.push(name);
        Next::Resolve(v)
    }
}
