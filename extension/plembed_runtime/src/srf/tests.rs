use std::sync::{atomic::Ordering, Arc};

use plembed_diagnostic::SqlState;

use crate::{
    call::{
        AllowedModes, CallInfo, CallKind, Outcome, ResultBuffer, ReturnSetInfo,
    },
    datum::{Datum, Row},
    descriptor::TypeDescriptor,
    exception::Exception,
    host::Cursor,
    live::{Anchor, LiveObject},
    procedure::{Procedure, ProcedureId},
    test::{install, int4, pair_tuple, record, runtime, Obj, TestRuntime},
};

fn install_set(
    runtime: &TestRuntime,
    id: u32,
    output: Arc<TypeDescriptor>,
    result: Obj,
) -> ProcedureId {
    let procedure = Procedure::builder()
        .id(ProcedureId(id))
        .name(format!("set_{id}"))
        .source(format!("set {id}"))
        .returns_set(true)
        .output(output)
        .build();

    install(runtime, procedure, Ok(Obj::returning(result)))
}

fn materialize_call(id: ProcedureId, expected: bool) -> CallInfo<Obj> {
    let info = ReturnSetInfo::new(
        AllowedModes::MATERIALIZE,
        expected.then(pair_tuple),
    );
    CallInfo::new(id, CallKind::SetReturning(info))
}

fn value_per_call(id: ProcedureId) -> CallInfo<Obj> {
    let info = ReturnSetInfo::new(AllowedModes::VALUE_PER_CALL, None);
    CallInfo::new(id, CallKind::SetReturning(info))
}

fn continuation_is_live(runtime: &TestRuntime, call: &CallInfo<Obj>) -> bool {
    let internal =
        call.cache().as_ref().and_then(|cache| cache.internal().clone());
    let Some(Anchor::Live(key)) = internal else {
        return false;
    };

    matches!(
        runtime.context().live.lock().get(key),
        Some(LiveObject::Continuation(_)),
    )
}

#[test]
fn materializes_every_element() {
    let runtime = runtime();
    let id = install_set(
        &runtime,
        1,
        int4(),
        Obj::Tuple(vec![Obj::Int(1), Obj::Int(2), Obj::Int(3)]),
    );

    let outcome =
        runtime.handle(&mut materialize_call(id, false)).expect("call");

    let rows = (1..=3).map(|i| Row::new(vec![Datum::Int(i)])).collect();
    assert_eq!(
        outcome,
        Outcome::Materialized(ResultBuffer { descriptor: None, rows }),
    );
}

#[test]
fn materializes_record_rows_against_expected_shape() {
    let runtime = runtime();
    let row = Obj::Tuple(vec![Obj::Int(1), Obj::Text("a".to_owned())]);
    let id = install_set(&runtime, 1, record(), Obj::Tuple(vec![row]));

    let outcome =
        runtime.handle(&mut materialize_call(id, true)).expect("call");

    let Outcome::Materialized(buffer) = outcome else {
        panic!("expected a buffer")
    };
    assert_eq!(buffer.descriptor, Some(pair_tuple()));
    assert_eq!(
        buffer.rows,
        vec![Row::new(vec![Datum::Int(1), Datum::Text("a".to_owned())])],
    );
}

#[test]
fn ambiguous_record_set_is_refused() {
    let runtime = runtime();
    let id = install_set(&runtime, 1, record(), Obj::Tuple(Vec::new()));

    let error = runtime.handle(&mut materialize_call(id, false)).unwrap_err();

    assert_eq!(error.code(), SqlState::FEATURE_NOT_SUPPORTED);
    assert_eq!(
        error.message(),
        "cannot execute ambiguous set returning functions",
    );
}

#[test]
fn cursor_result_is_fetched_in_chunks() {
    let runtime = runtime();
    let buffered = vec![Row::new(vec![Datum::Int(0)])];
    let cursor = Cursor { name: "c".to_owned(), buffered, forward: true };
    let id = install_set(&runtime, 1, int4(), Obj::Cursor(cursor));
    runtime
        .host()
        .cursor_rows
        .lock()
        .extend((1..=45).map(|i| Row::new(vec![Datum::Int(i)])));

    let outcome =
        runtime.handle(&mut materialize_call(id, false)).expect("call");

    let Outcome::Materialized(buffer) = outcome else {
        panic!("expected a buffer")
    };
    assert_eq!(buffer.rows.len(), 46);
    assert_eq!(buffer.rows[0], Row::new(vec![Datum::Int(0)]));
    assert_eq!(runtime.host().fetches.load(Ordering::SeqCst), 3);
}

#[test]
fn scalar_result_materializes_as_one_row() {
    let runtime = runtime();
    let procedure = Procedure::builder()
        .id(ProcedureId(3))
        .name("one")
        .source("one")
        .output(int4())
        .build();
    let id = install(&runtime, procedure, Ok(Obj::returning(Obj::Int(7))));

    let outcome =
        runtime.handle(&mut materialize_call(id, false)).expect("call");

    let Outcome::Materialized(buffer) = outcome else {
        panic!("expected a buffer")
    };
    assert_eq!(buffer.rows, vec![Row::new(vec![Datum::Int(7)])]);
}

#[test]
fn value_per_call_yields_then_ends() {
    let runtime = runtime();
    let id = install_set(
        &runtime,
        1,
        int4(),
        Obj::Tuple(vec![Obj::Int(10), Obj::Int(20)]),
    );
    let mut call = value_per_call(id);

    assert_eq!(runtime.handle(&mut call), Ok(Outcome::Next(Datum::Int(10))));
    assert!(continuation_is_live(&runtime, &call));

    assert_eq!(runtime.handle(&mut call), Ok(Outcome::Next(Datum::Int(20))));
    assert!(continuation_is_live(&runtime, &call));

    assert_eq!(runtime.handle(&mut call), Ok(Outcome::Done));
    assert!(!continuation_is_live(&runtime, &call));
    assert_eq!(runtime.context().live_count(), 2);
}

#[test]
fn value_per_call_registers_cleanup() {
    let runtime = runtime();
    let id = install_set(
        &runtime,
        1,
        int4(),
        Obj::Tuple(vec![Obj::Int(1), Obj::Int(2)]),
    );
    let mut call = value_per_call(id);

    runtime.handle(&mut call).expect("first");
    assert!(matches!(
        call.kind(),
        CallKind::SetReturning(info) if info.cleanup_registered()
    ));

    runtime.shutdown(&mut call);

    assert!(matches!(
        call.kind(),
        CallKind::SetReturning(info) if !info.cleanup_registered()
    ));
    assert!(!continuation_is_live(&runtime, &call));
}

#[test]
fn value_per_call_iteration_error() {
    let runtime = runtime();
    let items =
        Obj::iter(vec![Ok(Obj::Int(1)), Err(Exception::value_error("broken"))]);
    let id = install_set(&runtime, 1, int4(), items);
    let mut call = value_per_call(id);

    runtime.handle(&mut call).expect("first");
    let error = runtime.handle(&mut call).unwrap_err();

    assert_eq!(error.code(), SqlState::INTERPRETER_EXCEPTION);
    assert_eq!(
        error.message(),
        "iteration for value-per-call set raised an exception",
    );
    assert!(!continuation_is_live(&runtime, &call));
}

#[test]
fn scalar_procedure_in_value_per_call_context() {
    let runtime = runtime();
    let procedure = Procedure::builder()
        .id(ProcedureId(3))
        .name("one")
        .source("one")
        .output(int4())
        .build();
    let id = install(&runtime, procedure, Ok(Obj::returning(Obj::Int(7))));

    assert_eq!(
        runtime.handle(&mut value_per_call(id)),
        Ok(Outcome::Value(Datum::Int(7))),
    );
}
