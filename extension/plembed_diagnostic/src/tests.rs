use strum::IntoEnumIterator;

use crate::{ErrorRecord, Location, Severity, SqlState};

#[test]
fn severity_order_splits_reports_from_errors() {
    let errors = Severity::iter().filter(|s| s.is_error()).collect::<Vec<_>>();

    assert_eq!(errors, [Severity::Error, Severity::Fatal, Severity::Panic]);
    assert_eq!(Severity::Warning.to_string(), "WARNING");
}

#[test]
fn display_lists_every_field() {
    let record = ErrorRecord::error(
        SqlState::SAVEPOINT_EXCEPTION,
        "no current internal subtransaction",
    )
    .with_hint("Attempt to commit an IST, when none running.")
    .with_detail("none")
    .with_context("first")
    .with_location(Location::new("ist.rs".to_owned(), 10, "commit".to_owned()));

    assert_eq!(
        record.to_string(),
        "ERROR:  no current internal subtransaction\nDETAIL:  none\nHINT:  \
         Attempt to commit an IST, when none running.\nCONTEXT:  first"
    );
    assert_eq!(record.location().as_ref().map(|l| *l.line()), Some(10));
}

#[test]
fn relay_is_recognized() {
    assert!(ErrorRecord::relay().is_relay());
    assert!(!ErrorRecord::warning(SqlState::INTERPRETER_ERROR, "x").is_relay());
}
