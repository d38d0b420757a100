use crate::state::{Readiness, State, StateCell};

#[test]
fn starts_uninitialized_and_gates() {
    let cell = StateCell::new();

    assert_eq!(cell.get(), State::NotInitialized);
    assert_eq!(cell.readiness(), Readiness::NoTransaction);

    cell.set(State::Ready);
    assert_eq!(cell.readiness(), Readiness::Ready);

    cell.set(State::InFailedTransaction);
    assert_eq!(cell.readiness(), Readiness::FailedTransaction);

    cell.set(State::OutsideTransaction);
    assert_eq!(cell.readiness(), Readiness::NoTransaction);
}

#[test]
fn transition_requires_expected_source() {
    let cell = StateCell::new();
    cell.set(State::Ready);

    assert!(!cell.transition(State::InFailedTransaction, State::Ready));
    assert!(cell.transition(State::Ready, State::OutsideTransaction));
    assert_eq!(cell.get(), State::OutsideTransaction);
}

#[test]
fn terminated_is_final() {
    let cell = StateCell::new();
    cell.set(State::Terminated);
    cell.set(State::Ready);

    assert_eq!(cell.get(), State::Terminated);
}
