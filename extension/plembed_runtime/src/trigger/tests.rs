use std::collections::HashSet;

use plembed_diagnostic::SqlState;
use strum::IntoEnumIterator;

use crate::{
    call::{CallInfo, CallKind, Outcome},
    datum::{Datum, Row},
    descriptor::{PseudoType, TypeDescriptor, TypeId},
    exception::Exception,
    live::LiveObject,
    procedure::{Procedure, ProcedureId},
    test::{install, pair, runtime, Obj, TestRuntime},
    trigger::{
        Level, Manipulation, Timing, TriggerData, TriggerEvent, TriggerOutcome,
    },
};

#[test]
fn sixteen_distinct_handler_names() {
    let mut names = HashSet::new();

    for timing in Timing::iter() {
        for level in Level::iter() {
            for manipulation in Manipulation::iter() {
                let name = TriggerEvent::new(timing, level, manipulation)
                    .handler_name();

                assert_eq!(
                    name.ends_with("_statement"),
                    level == Level::Statement,
                );
                assert!(names.insert(name));
            }
        }
    }

    assert_eq!(names.len(), 16);
}

#[test]
fn row_update_name() {
    let event =
        TriggerEvent::new(Timing::After, Level::Row, Manipulation::Update);

    assert_eq!(event.handler_name(), "after_update");
}

fn install_trigger(
    runtime: &TestRuntime,
    handlers: Vec<(&str, Obj)>,
) -> ProcedureId {
    let procedure = Procedure::builder()
        .id(ProcedureId(40))
        .name("audit")
        .source("audit")
        .output(std::sync::Arc::new(TypeDescriptor::pseudo(
            TypeId(2279),
            "trigger",
            PseudoType::Trigger,
        )))
        .build();

    install(runtime, procedure, Ok(Obj::module(handlers)))
}

fn row(a: i64, b: &str) -> Row {
    Row::new(vec![Datum::Int(a), Datum::Text(b.to_owned())])
}

fn fire(
    runtime: &TestRuntime,
    id: ProcedureId,
    timing: Timing,
    level: Level,
    manipulation: Manipulation,
) -> Result<Outcome<Obj>, plembed_diagnostic::ErrorRecord> {
    let mut data = TriggerData::new(
        "t",
        pair(),
        TriggerEvent::new(timing, level, manipulation),
    );

    if level == Level::Row {
        if manipulation != Manipulation::Insert {
            data = data.with_old(row(1, "old"));
        }
        if manipulation != Manipulation::Delete {
            data = data.with_new(row(2, "new"));
        }
    }

    runtime.handle(&mut CallInfo::new(id, CallKind::Trigger(data)))
}

fn returning_argument(position: usize) -> Obj {
    Obj::function(move |_, arguments| Ok(arguments[position].clone()))
}

#[test]
fn none_applies_the_new_row() {
    let runtime = runtime();
    let id = install_trigger(&runtime, vec![(
        "before_insert",
        Obj::function(|_, _| Ok(Obj::None)),
    )]);

    let outcome =
        fire(&runtime, id, Timing::Before, Level::Row, Manipulation::Insert);

    assert_eq!(
        outcome,
        Ok(Outcome::Trigger(TriggerOutcome::Row(row(2, "new")))),
    );
}

#[test]
fn returning_new_or_old_on_update() {
    let runtime = runtime();
    let id = install_trigger(&runtime, vec![
        ("before_update", returning_argument(2)),
        ("after_update", returning_argument(1)),
    ]);

    let new =
        fire(&runtime, id, Timing::Before, Level::Row, Manipulation::Update);
    assert_eq!(new, Ok(Outcome::Trigger(TriggerOutcome::Row(row(2, "new")))));

    let old =
        fire(&runtime, id, Timing::After, Level::Row, Manipulation::Update);
    assert_eq!(old, Ok(Outcome::Trigger(TriggerOutcome::Skip)));
}

#[test]
fn before_replacement_is_normalized() {
    let runtime = runtime();
    let replacement =
        Obj::Map(vec![("b".to_owned(), Obj::Text("replaced".to_owned()))]);
    let id = install_trigger(&runtime, vec![(
        "before_insert",
        Obj::function(move |_, _| Ok(replacement.clone())),
    )]);

    let outcome =
        fire(&runtime, id, Timing::Before, Level::Row, Manipulation::Insert);

    let expected =
        Row::new(vec![Datum::Null, Datum::Text("replaced".to_owned())]);
    assert_eq!(outcome, Ok(Outcome::Trigger(TriggerOutcome::Row(expected))));
}

#[test]
fn after_replacement_is_a_protocol_violation() {
    let runtime = runtime();
    let id = install_trigger(&runtime, vec![(
        "after_insert",
        Obj::function(|_, _| {
            Ok(Obj::Tuple(vec![Obj::Int(3), Obj::Text("x".to_owned())]))
        }),
    )]);

    let error =
        fire(&runtime, id, Timing::After, Level::Row, Manipulation::Insert)
            .unwrap_err();

    assert_eq!(error.code(), SqlState::PROTOCOL_VIOLATION);
    assert_eq!(
        error.message(),
        "non-None value returned by trigger fired after",
    );
}

#[test]
fn stop_event() {
    let runtime = runtime();
    let stop = || Obj::function(|_, _| Err(Exception::stop_event()));
    let id = install_trigger(
        &runtime,
        vec![("before_delete", stop()), ("after_delete", stop())],
    );

    let before =
        fire(&runtime, id, Timing::Before, Level::Row, Manipulation::Delete);
    assert_eq!(before, Ok(Outcome::Trigger(TriggerOutcome::Skip)));

    let after =
        fire(&runtime, id, Timing::After, Level::Row, Manipulation::Delete)
            .unwrap_err();
    assert_eq!(
        after.message(),
        "cannot stop events that have already occurred",
    );
}

#[test]
fn unsupported_event() {
    let runtime = runtime();
    let id = install_trigger(&runtime, Vec::new());

    let error =
        fire(&runtime, id, Timing::Before, Level::Row, Manipulation::Insert)
            .unwrap_err();

    assert_eq!(error.code(), SqlState::TRIGGERED_ACTION_EXCEPTION);
}

#[test]
fn statement_trigger_arguments_and_result() {
    let runtime = runtime();
    let arity = Obj::function(|_, arguments| {
        assert_eq!(arguments.len(), 3);
        Ok(Obj::None)
    });
    let id = install_trigger(&runtime, vec![
        ("after_update_statement", arity),
        ("before_truncate_statement", Obj::function(|_, _| Ok(Obj::Int(1)))),
    ]);

    let outcome = fire(
        &runtime,
        id,
        Timing::After,
        Level::Statement,
        Manipulation::Update,
    );
    assert_eq!(outcome, Ok(Outcome::Trigger(TriggerOutcome::Statement)));

    let error = fire(
        &runtime,
        id,
        Timing::Before,
        Level::Statement,
        Manipulation::Truncate,
    )
    .unwrap_err();
    assert_eq!(error.code(), SqlState::TRIGGER_PROTOCOL_VIOLATED);
}

#[test]
fn trigger_data_lives_until_transaction_end() {
    let runtime = runtime();
    let id = install_trigger(&runtime, vec![(
        "before_insert",
        Obj::function(|_, _| Ok(Obj::None)),
    )]);
    let mut call = CallInfo::new(
        id,
        CallKind::Trigger(TriggerData::new(
            "t",
            pair(),
            TriggerEvent::new(Timing::Before, Level::Row, Manipulation::Insert),
        ).with_new(row(1, "a"))),
    );

    runtime.handle(&mut call).expect("fire");

    let live = runtime.context().live.lock();
    let internal = call
        .cache()
        .as_ref()
        .and_then(|cache| cache.internal().clone())
        .expect("anchor");
    assert!(matches!(
        live.resolve(&internal),
        Some(LiveObject::Descriptor(d)) if d == pair()
    ));
    assert_eq!(live.len(), 4);
}

#[test]
fn trigger_data_is_anchored_once_per_cache() {
    let runtime = runtime();
    let wrappers = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let seen = wrappers.clone();
    let id = install_trigger(&runtime, vec![(
        "before_insert",
        Obj::function(move |_, arguments| {
            seen.borrow_mut().push(arguments[0].clone());
            Ok(arguments[1].clone())
        }),
    )]);
    let event =
        TriggerEvent::new(Timing::Before, Level::Row, Manipulation::Insert);
    let mut call = CallInfo::new(id, CallKind::Plain);

    for value in 0..1000 {
        *call.kind_mut() = CallKind::Trigger(
            TriggerData::new("t", pair(), event).with_new(row(value, "a")),
        );

        let outcome = runtime.handle(&mut call).expect("fire");
        assert_eq!(
            outcome,
            Outcome::Trigger(TriggerOutcome::Row(row(value, "a"))),
        );
    }

    assert_eq!(runtime.context().live.lock().len(), 4);

    let wrappers = wrappers.borrow();
    let Obj::Trigger(first) = &wrappers[0] else { panic!("not trigger data") };
    assert!(first.new_row().is_none());
    assert!(wrappers.iter().all(|wrapper| wrapper == &wrappers[0]));
}
