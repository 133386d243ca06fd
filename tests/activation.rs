//! Activation signal suite.
//!
//! The activation handler sees `+1` when a handle gains its first pending
//! continuation and `-1` when it settles, is cancelled, or its branch falls
//! out of scope. A redirect into a dormant branch brings it back.

mod common;

use common::{counted_context, init_test_logging};
use deferred::{Context, Deferred, Next};
use std::cell::Cell;
use std::rc::Rc;

fn init_test(name: &str) {
    init_test_logging();
    deferred::test_phase!(name);
}

#[test]
fn first_continuation_activates_once() {
    init_test("first_continuation_activates_once");
    let (ctx, gauge) = counted_context("first");
    let unit: Deferred<(), ()> = ctx.deferred();
    let _ = unit.promise().then(|v| Next::Resolve(v));
    assert_eq!(gauge.value(), 1);
    let _ = unit.promise().then(|v| Next::Resolve(v));
    let _ = unit.promise().otherwise(|e| Next::Fail(e));
    let value = gauge.value();
    deferred::assert_with_log!(value == 1, "one activation per handle", 1, value);
    deferred::test_complete!("first_continuation_activates_once");
}

#[test]
fn resolve_fail_and_cancel_each_deactivate() {
    init_test("resolve_fail_and_cancel_each_deactivate");
    let (ctx, gauge) = counted_context("settle");

    let unit: Deferred<&str, &str> = ctx.deferred();
    let _ = unit.promise().then(|v| Next::Resolve(v));
    assert_eq!(gauge.value(), 1);
    unit.resolve("foo");
    assert_eq!(gauge.value(), 0);

    let unit: Deferred<&str, &str> = ctx.deferred();
    let _ = unit.promise().then(|v| Next::Resolve(v));
    assert_eq!(gauge.value(), 1);
    unit.fail("foo");
    assert_eq!(gauge.value(), 0);

    let unit: Deferred<&str, &str> = ctx.deferred();
    let _ = unit.promise().then(|v| Next::Resolve(v));
    assert_eq!(gauge.value(), 1);
    unit.cancel();
    assert_eq!(gauge.value(), 0);
    deferred::test_complete!("resolve_fail_and_cancel_each_deactivate");
}

#[test]
fn branch_out_of_scope_deactivates() {
    init_test("branch_out_of_scope_deactivates");
    let (ctx, gauge) = counted_context("scope");
    let unit: Deferred<(), bool> = ctx.deferred();
    let _ = unit
        .promise()
        .then(|v| Next::Resolve(v))
        .then(|v| Next::Resolve(v));
    let _ = unit.promise().otherwise(|e| Next::Fail(e));
    assert_eq!(gauge.value(), 2);
    unit.fail(false);
    // One down for the failed unit, one for the success branch.
    assert_eq!(gauge.value(), 0);
    deferred::test_complete!("branch_out_of_scope_deactivates");
}

#[test]
fn linked_errback_reactivates_visible_chain() {
    init_test("linked_errback_reactivates_visible_chain");
    let (ctx, gauge) = counted_context("reactivate");
    let unit: Deferred<&str, bool> = ctx.deferred();
    let later: Deferred<&str, bool> = ctx.deferred();
    let later_promise = later.promise();

    let _ = unit
        .promise()
        .then_or(|v| Next::Resolve(v), move |_| Next::Defer(later_promise))
        .then(|v| Next::Resolve(v));
    assert_eq!(gauge.value(), 2);

    unit.fail(false);
    // The failed unit and the dormant visible chain drop out; `later` gains
    // a continuation that waits to resolve the chain.
    assert_eq!(gauge.value(), 1);

    later.resolve("yay");
    assert_eq!(gauge.value(), 0);
    assert!(gauge.peak() >= 2);
    deferred::test_complete!("linked_errback_reactivates_visible_chain");
}

#[test]
fn cancelled_dormant_branch_is_not_counted_twice() {
    init_test("cancelled_dormant_branch_is_not_counted_twice");
    let (ctx, gauge) = counted_context("dormant");
    let unit: Deferred<(), ()> = ctx.deferred();
    let branch = unit.promise().then(|v| Next::Resolve(v));
    let _ = branch.then(|v| Next::Resolve(v));
    let _ = unit.promise().otherwise(|e| Next::Fail(e));
    unit.fail(());
    assert_eq!(gauge.value(), 0);
    branch.cancel();
    assert_eq!(gauge.value(), 0);
    let snap = gauge.snapshot();
    assert_eq!(snap.activations, snap.deactivations);
    deferred::test_complete!("cancelled_dormant_branch_is_not_counted_twice");
}

#[test]
fn handler_swap_applies_to_existing_units() {
    init_test("handler_swap_applies_to_existing_units");
    let ctx = Context::new();
    let unit: Deferred<(), ()> = ctx.deferred();
    let _ = unit.promise().then(|v| Next::Resolve(v));

    let seen = Rc::new(Cell::new(0));
    let sink = Rc::clone(&seen);
    ctx.set_activation_handler(move |d| sink.set(sink.get() + d));
    unit.resolve(());
    assert_eq!(seen.get(), -1);
    deferred::test_complete!("handler_swap_applies_to_existing_units");
}

#[test]
fn default_context_setter_is_used() {
    init_test("default_context_setter_is_used");
    let seen = Rc::new(Cell::new(0));
    let sink = Rc::clone(&seen);
    deferred::set_activation_handler(move |d| sink.set(sink.get() + d));

    let unit: Deferred<(), ()> = Deferred::new();
    let _ = unit.promise().then(|v| Next::Resolve(v));
    assert_eq!(seen.get(), 1);
    unit.resolve(());
    assert_eq!(seen.get(), 0);

    Context::current().reset_handlers();
    deferred::test_complete!("default_context_setter_is_used");
}
