use std::sync::atomic::Ordering;

use plembed_diagnostic::SqlState;

use crate::{
    call::{CallInfo, CallKind},
    procedure::{Procedure, ProcedureId},
    test::{install, install_simple, int4, runtime, Action, Obj},
    xact::TransactionEvent,
};

#[test]
fn inline_block_runs_through_session() {
    let runtime = runtime();

    runtime.execute_inline("create table t ()").expect("inline");

    assert!(runtime
        .host()
        .actions()
        .contains(&Action::Execute("create table t ()".to_owned())));
    assert_eq!(runtime.context().live_count(), 0);
}

#[test]
fn inline_executor_is_created_once() {
    let runtime = runtime();

    runtime.execute_inline("first").expect("first");
    runtime.on_transaction_event(TransactionEvent::Commit);
    runtime.execute_inline("second").expect("second");

    assert_eq!(runtime.interpreter().inline_created.load(Ordering::SeqCst), 1);
}

#[test]
fn inline_failure_names_the_executor() {
    let runtime = runtime();

    let error = runtime.execute_inline("raise").unwrap_err();

    assert_eq!(error.code(), SqlState::INTERPRETER_EXCEPTION);
    assert!(error.context()[0]
        .ends_with("[__inline_executor__ while executing main]"));
    assert!(runtime.context().inline.lock().is_some());
}

#[test]
fn validation_drops_loaded_module() {
    let runtime = runtime();
    let id = install_simple(&runtime, 1, Obj::returning(Obj::Int(1)));
    runtime.handle(&mut CallInfo::new(id, CallKind::Plain)).expect("call");

    runtime.validate(id).expect("validate");

    assert!(!runtime.context().registry.lock().contains(id));
}

#[test]
fn validation_reports_compile_errors() {
    let runtime = runtime();
    let procedure = Procedure::builder()
        .id(ProcedureId(2))
        .name("bad")
        .source("syntax error here")
        .output(int4())
        .build();
    let id = install(&runtime, procedure, Ok(Obj::module(Vec::new())));

    let error = runtime.validate(id).unwrap_err();

    assert_eq!(error.code(), SqlState::INTERPRETER_ERROR);
    assert_eq!(error.message(), "cannot compile Python function");
    assert!(error.context()[0].contains("SyntaxError: invalid syntax"));
}

#[test]
fn validation_of_unknown_procedure() {
    let runtime = runtime();

    let error = runtime.validate(ProcedureId(77)).unwrap_err();

    assert_eq!(error.code(), SqlState::UNDEFINED_FUNCTION);
}
