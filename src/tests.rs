/// Dispatch scenarios exercising ordering, re-entrancy and failure isolation
use crate::{ChannelConfig, Listener, RecordingSink, Signal0, Signal1, Signal2};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

// Shared call log: listeners push a label when invoked
type Log = Rc<RefCell<Vec<&'static str>>>;

// Lets a listener reach its own handle
type SelfRef = Rc<RefCell<Option<Listener<dyn Fn()>>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn recording_signal0() -> (Signal0, Rc<RecordingSink>) {
    let sink = Rc::new(RecordingSink::new());
    let signal = Signal0::with_config(ChannelConfig::new().sink(sink.clone()));
    (signal, sink)
}

#[test]
fn priority_then_registration_order() {
    let signal = Signal0::new();
    let calls = log();

    let c = Rc::clone(&calls);
    let a = Signal0::listener(move || c.borrow_mut().push("A"));
    let c = Rc::clone(&calls);
    let b = Signal0::listener(move || c.borrow_mut().push("B"));
    let c = Rc::clone(&calls);
    let c_listener = Signal0::listener(move || c.borrow_mut().push("C"));

    signal.add_with_priority(&a, 5);
    signal.add_once_with_priority(&b, 1);
    signal.add_with_priority(&c_listener, 5);

    signal.dispatch();

    assert_eq!(*calls.borrow(), ["B", "A", "C"]);
    assert_eq!(signal.len(), 2);
    assert_eq!(signal.index_of(&b), None);
}

#[test]
fn dispatching_an_empty_signal_does_nothing() {
    let (signal, sink) = recording_signal0();

    signal.dispatch();

    assert_eq!(signal.dispatch_depth(), 0);
    assert!(!signal.is_dispatching());
    assert!(sink.is_empty());
}

#[test]
fn re_adding_does_not_duplicate() {
    let signal = Signal0::new();
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    let listener = Signal0::listener(move || c.set(c.get() + 1));

    let first = signal.add(&listener);
    let second = signal.add_with_priority(&listener, 3);
    assert_eq!(first, second);
    assert_eq!(signal.len(), 1);
    assert_eq!(signal.priority(first), Some(3));

    signal.dispatch();
    assert_eq!(count.get(), 1);
}

#[test]
fn once_listener_runs_exactly_once() {
    let signal: Signal1<u32> = Signal1::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let listener = Signal1::<u32>::listener(move |v| s.borrow_mut().push(*v));

    signal.add_once(&listener);
    for v in 0..5 {
        signal.dispatch(&v);
    }

    assert_eq!(*seen.borrow(), [0]);
    assert_eq!(signal.index_of(&listener), None);
    assert!(signal.is_empty());
}

#[test]
fn self_removal_keeps_the_running_pass_intact() {
    let signal = Rc::new(Signal0::new());
    let calls = log();
    let slot: SelfRef = Rc::new(RefCell::new(None));

    let c = Rc::clone(&calls);
    let weak = Rc::downgrade(&signal);
    let me = Rc::clone(&slot);
    let quitter = Signal0::listener(move || {
        c.borrow_mut().push("quitter");
        if let (Some(signal), Some(listener)) = (weak.upgrade(), me.borrow().as_ref()) {
            assert!(signal.remove(listener));
        }
    });
    *slot.borrow_mut() = Some(quitter.clone());

    let c = Rc::clone(&calls);
    let after = Signal0::listener(move || c.borrow_mut().push("after"));

    signal.add(&quitter);
    signal.add(&after);

    signal.dispatch();
    assert_eq!(*calls.borrow(), ["quitter", "after"]);

    signal.dispatch();
    assert_eq!(*calls.borrow(), ["quitter", "after", "after"]);
    assert_eq!(signal.len(), 1);

    // break the listener -> listener cycle
    slot.borrow_mut().take();
}

#[test]
fn listeners_removed_by_a_sibling_still_run_in_the_current_pass() {
    let signal = Rc::new(Signal0::new());
    let calls = log();

    let c = Rc::clone(&calls);
    let victim = Signal0::listener(move || c.borrow_mut().push("victim"));

    let c = Rc::clone(&calls);
    let weak = Rc::downgrade(&signal);
    let target = victim.clone();
    let remover = Signal0::listener(move || {
        c.borrow_mut().push("remover");
        if let Some(signal) = weak.upgrade() {
            signal.remove(&target);
        }
    });

    signal.add_with_priority(&remover, 0);
    signal.add_with_priority(&victim, 1);

    signal.dispatch();
    signal.dispatch();

    assert_eq!(*calls.borrow(), ["remover", "victim", "remover"]);
}

#[test]
fn once_listener_removed_by_a_sibling_still_runs_in_the_current_pass() {
    let signal = Rc::new(Signal0::new());
    let calls = log();

    let c = Rc::clone(&calls);
    let victim = Signal0::listener(move || c.borrow_mut().push("victim"));

    let c = Rc::clone(&calls);
    let weak = Rc::downgrade(&signal);
    let target = victim.clone();
    let remover = Signal0::listener(move || {
        c.borrow_mut().push("remover");
        if let Some(signal) = weak.upgrade() {
            signal.remove(&target);
        }
    });

    signal.add_with_priority(&remover, 0);
    let victim_id = signal.add_once_with_priority(&victim, 1);

    signal.dispatch();
    assert!(!signal.contains(victim_id));
    signal.dispatch();

    assert_eq!(*calls.borrow(), ["remover", "victim", "remover"]);
    assert_eq!(signal.len(), 1);
}

#[test]
fn listeners_added_during_dispatch_wait_for_the_next_one() {
    let signal = Rc::new(Signal0::new());
    let calls = log();

    let c = Rc::clone(&calls);
    let late = Signal0::listener(move || c.borrow_mut().push("late"));

    let c = Rc::clone(&calls);
    let weak = Rc::downgrade(&signal);
    let adder = Signal0::listener(move || {
        c.borrow_mut().push("adder");
        if let Some(signal) = weak.upgrade() {
            signal.add_with_priority(&late, 10);
        }
    });
    signal.add(&adder);

    signal.dispatch();
    assert_eq!(*calls.borrow(), ["adder"]);

    signal.dispatch();
    assert_eq!(*calls.borrow(), ["adder", "adder", "late"]);
    assert_eq!(signal.len(), 2);
}

#[test]
fn nested_dispatch_defers_recycling_until_outermost_return() {
    cov_mark::check!(slot_disposal_deferred);
    cov_mark::check!(deferred_slots_flushed);

    let signal = Rc::new(Signal0::new());
    let depths = Rc::new(RefCell::new(Vec::new()));
    let nested_once = Rc::new(Cell::new(false));
    let after_nested = Rc::new(RefCell::new(None));

    let doomed = Signal0::listener(|| {});
    let replacement = Signal0::listener(|| {});
    let doomed_id = signal.add_with_priority(&doomed, 100);

    let weak = Rc::downgrade(&signal);
    let d = Rc::clone(&depths);
    let flag = Rc::clone(&nested_once);
    let seen = Rc::clone(&after_nested);
    let doomed_ref = doomed.clone();
    let replacement_ref = replacement.clone();
    let driver = Signal0::listener(move || {
        let Some(signal) = weak.upgrade() else { return };
        d.borrow_mut().push(signal.dispatch_depth());
        if flag.replace(true) {
            // inner pass: drop the doomed listener
            signal.remove(&doomed_ref);
            return;
        }
        signal.dispatch();
        // back in the outer pass; the removed record must not be handed out yet
        let id = signal.add_with_priority(&replacement_ref, 200);
        *seen.borrow_mut() = Some((signal.pooled_count(), id));
    });
    signal.add(&driver);

    signal.dispatch();

    assert_eq!(*depths.borrow(), [1, 2]);
    assert_eq!(signal.dispatch_depth(), 0);

    let (pooled_during, replacement_id) = after_nested.borrow_mut().take().unwrap();
    assert_eq!(pooled_during, 0);
    assert_ne!(replacement_id, doomed_id);
    assert!(!signal.contains(doomed_id));
    assert_eq!(signal.pooled_count(), 1);
    assert_eq!(signal.index_of(&doomed), None);
    assert_eq!(signal.len(), 2);
}

#[test]
fn once_listener_is_not_repeated_by_an_outer_pass() {
    let signal = Rc::new(Signal0::new());
    let count = Rc::new(Cell::new(0));
    let entered = Rc::new(Cell::new(false));

    let weak = Rc::downgrade(&signal);
    let flag = Rc::clone(&entered);
    let reentrant = Signal0::listener(move || {
        if !flag.replace(true) {
            if let Some(signal) = weak.upgrade() {
                signal.dispatch();
            }
        }
    });
    let c = Rc::clone(&count);
    let once = Signal0::listener(move || c.set(c.get() + 1));

    signal.add_with_priority(&reentrant, 0);
    signal.add_once_with_priority(&once, 1);

    signal.dispatch();
    signal.dispatch();

    assert_eq!(count.get(), 1);
    assert_eq!(signal.len(), 1);
}

#[test]
fn nested_dispatch_on_another_signal() {
    let outer = Signal0::new();
    let inner: Rc<Signal1<&'static str>> = Rc::new(Signal1::new());
    let calls = log();

    let c = Rc::clone(&calls);
    inner.add_fn(move |label| c.borrow_mut().push(*label));

    let inner_ref = Rc::clone(&inner);
    outer.add_fn(move || {
        assert_eq!(inner_ref.dispatch_depth(), 0);
        inner_ref.dispatch(&"from outer");
    });

    outer.dispatch();
    assert_eq!(*calls.borrow(), ["from outer"]);
    assert_eq!(outer.dispatch_depth(), 0);
    assert_eq!(inner.dispatch_depth(), 0);
}

#[test]
fn panicking_listener_is_removed_and_reported_once() {
    cov_mark::check!(listener_panic_isolated);
    let sink = Rc::new(RecordingSink::new());
    let signal: Signal2<u8, u8> =
        Signal2::with_config(ChannelConfig::new().name("sums").sink(sink.clone()));
    let calls = log();

    let bad = Signal2::<u8, u8>::listener(|a, b| {
        if a + b > 3 {
            panic!("sum too large: {}", a + b);
        }
    });
    let c = Rc::clone(&calls);
    let good = Signal2::<u8, u8>::listener(move |_, _| c.borrow_mut().push("good"));

    let bad_id = signal.add_with_priority(&bad, -2);
    signal.add_with_priority(&good, 4);

    signal.dispatch(&1, &1);
    assert!(sink.is_empty());

    signal.dispatch(&2, &2);
    signal.dispatch(&3, &3);

    assert_eq!(*calls.borrow(), ["good", "good", "good"]);
    assert_eq!(signal.index_of(&bad), None);
    assert_eq!(signal.len(), 1);

    let reports = sink.take();
    assert_eq!(reports.len(), 1);
    let (failure, context) = &reports[0];
    assert_eq!(failure.message(), "sum too large: 4");
    assert_eq!(context.slot, bad_id);
    assert_eq!(context.priority, -2);
    assert!(!context.once);
    assert_eq!(context.depth, 1);
    assert_eq!(context.channel, signal.id());
    assert_eq!(context.channel_name.as_deref(), Some("sums"));
}

#[test]
fn panicking_once_listener_is_reported_as_once() {
    let (signal, sink) = recording_signal0();
    let bad = Signal0::listener(|| panic!("first and last"));
    signal.add_once_with_priority(&bad, 7);

    signal.dispatch();
    signal.dispatch();

    let reports = sink.take();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].1.once);
    assert_eq!(reports[0].1.priority, 7);
    assert!(signal.is_empty());
}

#[test]
fn panicking_listener_that_removed_itself_is_reported_once() {
    let (signal, sink) = recording_signal0();
    let signal = Rc::new(signal);
    let slot: SelfRef = Rc::new(RefCell::new(None));

    let weak = Rc::downgrade(&signal);
    let me = Rc::clone(&slot);
    let listener = Signal0::listener(move || {
        if let (Some(signal), Some(listener)) = (weak.upgrade(), me.borrow().as_ref()) {
            signal.remove(listener);
        }
        panic!("after removing myself");
    });
    *slot.borrow_mut() = Some(listener.clone());
    signal.add(&listener);

    signal.dispatch();

    assert_eq!(sink.len(), 1);
    assert!(signal.is_empty());
    assert_eq!(signal.dispatch_depth(), 0);
    slot.borrow_mut().take();
}

#[test]
fn listener_failing_in_a_nested_pass_is_not_rerun_by_the_outer_pass() {
    cov_mark::check!(retired_slot_skipped);
    let (signal, sink) = recording_signal0();
    let signal = Rc::new(signal);
    let attempts = Rc::new(Cell::new(0));
    let entered = Rc::new(Cell::new(false));

    let weak = Rc::downgrade(&signal);
    let flag = Rc::clone(&entered);
    let reentrant = Signal0::listener(move || {
        if !flag.replace(true) {
            if let Some(signal) = weak.upgrade() {
                signal.dispatch();
            }
        }
    });
    let a = Rc::clone(&attempts);
    let failing = Signal0::listener(move || {
        a.set(a.get() + 1);
        panic!("always fails");
    });

    signal.add_with_priority(&reentrant, 0);
    let failing_id = signal.add_with_priority(&failing, 1);

    signal.dispatch();

    assert_eq!(attempts.get(), 1);
    let reports = sink.take();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].1.slot, failing_id);
    assert_eq!(reports[0].1.depth, 2);
    assert_eq!(signal.len(), 1);
    assert!(!signal.contains(failing_id));
    assert_eq!(signal.dispatch_depth(), 0);
}

#[test]
fn default_sink_logs_through_tracing() {
    let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
    tracing::subscriber::with_default(subscriber, || {
        let signal = Signal0::with_config(ChannelConfig::new().name("traced"));
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        signal.add_fn(|| panic!("logged, not propagated"));
        signal.add_fn(move || r.set(true));

        signal.dispatch();

        assert!(ran.get());
        assert_eq!(signal.len(), 1);
    });
}

#[test]
fn remove_all_reports_whether_anything_was_bound() {
    let signal = Signal0::new();
    assert!(!signal.remove_all());

    signal.add_fn(|| {});
    signal.add_fn(|| {});
    signal.add_fn(|| {});
    assert!(signal.remove_all());
    assert_eq!(signal.len(), 0);
    assert_eq!(signal.pooled_count(), 3);
}

#[test]
fn dispose_inside_dispatch_finishes_the_pass_then_frees_everything() {
    let signal = Rc::new(Signal0::new());
    let calls = log();

    let weak = Rc::downgrade(&signal);
    let c = Rc::clone(&calls);
    signal.add_fn(move || {
        c.borrow_mut().push("disposer");
        if let Some(signal) = weak.upgrade() {
            signal.dispose();
            assert!(signal.is_empty());
        }
    });
    let c = Rc::clone(&calls);
    signal.add_fn(move || c.borrow_mut().push("survivor"));
    signal.add_fn(|| {});
    signal.remove_at(2);
    assert_eq!(signal.pooled_count(), 1);

    signal.dispatch();

    assert_eq!(*calls.borrow(), ["disposer", "survivor"]);
    assert!(signal.is_disposed());
    assert_eq!(signal.pooled_count(), 0);

    signal.add_fn(|| {});
    assert!(!signal.is_disposed());
}

#[test]
fn priority_changes_through_handles_reorder_later_dispatches() {
    let signal = Signal0::new();
    let calls = log();

    let c = Rc::clone(&calls);
    let (_, first) = signal.add_fn(move || c.borrow_mut().push("first"));
    let c = Rc::clone(&calls);
    signal.add_fn(move || c.borrow_mut().push("second"));

    signal.dispatch();
    assert!(signal.set_priority(first, 1));
    signal.dispatch();

    assert_eq!(*calls.borrow(), ["first", "second", "second", "first"]);
    assert_eq!(signal.get_at(1), Some(first));
}

#[test]
fn once_flag_can_be_toggled_through_handles() {
    let signal = Signal0::new();
    let count = Rc::new(Cell::new(0));
    let c = Rc::clone(&count);
    let (_, id) = signal.add_fn(move || c.set(c.get() + 1));

    assert!(signal.set_once(id, true));
    assert_eq!(signal.is_once(id), Some(true));
    signal.dispatch();
    signal.dispatch();

    assert_eq!(count.get(), 1);
    assert!(!signal.set_once(id, false));
    assert_eq!(signal.is_once(id), None);
}

#[test]
fn snapshot_of_slots_does_not_track_mutation() {
    let signal = Signal0::new();
    let (a, _) = signal.add_fn(|| {});
    signal.add_fn(|| {});

    let snapshot = signal.slots();
    signal.remove(&a);

    assert_eq!(snapshot.len(), 2);
    assert_eq!(signal.slots().len(), 1);
    assert!(!signal.contains(snapshot[0]));
    assert!(signal.contains(snapshot[1]));
}

#[test]
fn remove_slot_behaves_like_remove() {
    let signal = Signal0::new();
    let (listener, id) = signal.add_fn(|| {});

    assert!(signal.remove_slot(id));
    assert!(!signal.remove_slot(id));
    assert_eq!(signal.get(&listener), None);
    assert!(!signal.remove(&listener));
}

#[test]
fn churn_reuses_pooled_records() {
    cov_mark::check!(slot_reused_from_pool);
    let signal = Signal0::with_config(ChannelConfig::new().reserve(4));

    for _ in 0..100 {
        let (listener, _) = signal.add_fn(|| {});
        signal.dispatch();
        signal.remove(&listener);
    }

    assert!(signal.is_empty());
    assert_eq!(signal.pooled_count(), 1);
}
