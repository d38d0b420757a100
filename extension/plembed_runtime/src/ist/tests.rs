use plembed_diagnostic::{ErrorRecord, SqlState};
use proptest::{prop_assert, prop_assert_eq, proptest};

use crate::{
    ist::{HandleState, Ledger, LedgerError, Operation, Transaction},
    state::{State, StateCell},
    test::{Action, MockHost},
};

fn ready() -> StateCell {
    let state = StateCell::new();
    state.set(State::Ready);
    state
}

fn open(ledger: &Ledger, host: &MockHost) -> Transaction {
    let mut transaction = Transaction::new();
    let id = ledger.begin(host, transaction.state()).expect("begin");
    transaction.opened(id);
    transaction
}

#[test]
fn nested_scopes_close_in_reverse_order() {
    let (host, state, ledger) = (MockHost::new(), ready(), Ledger::default());

    let outer = open(&ledger, &host);
    let inner = open(&ledger, &host);
    assert_eq!((outer.id(), inner.id()), (1, 2));

    let error =
        ledger.commit(&host, &state, outer.id(), outer.state()).unwrap_err();
    assert_eq!(error, LedgerError::OutOfOrder {
        operation: Operation::Commit,
        id: 1,
        expected: 2,
    });
    assert_eq!(ledger.open_count(), 2);

    ledger.commit(&host, &state, inner.id(), inner.state()).expect("inner");
    ledger.commit(&host, &state, outer.id(), outer.state()).expect("outer");

    assert_eq!(ledger.open_count(), 0);
    assert_eq!(
        host.actions(),
        vec![Action::Begin, Action::Begin, Action::Release, Action::Release],
    );
}

#[test]
fn out_of_order_detail_names_expected_scope() {
    let error = LedgerError::OutOfOrder {
        operation: Operation::Abort,
        id: 1,
        expected: 3,
    };
    let record = error.into_record();

    assert_eq!(record.code(), SqlState::SAVEPOINT_EXCEPTION);
    assert_eq!(
        record.message(),
        "out-of-order abort attempt on subtransaction 1",
    );
    assert_eq!(
        record.detail().as_deref(),
        Some("Subtransaction 3 was expected to exit next."),
    );
}

#[test]
fn exit_without_open_scope() {
    let (host, state, ledger) = (MockHost::new(), ready(), Ledger::default());
    let transaction = Transaction::new();

    let error = ledger
        .abort(&host, &state, transaction.id(), transaction.state())
        .unwrap_err();

    assert_eq!(error, LedgerError::NoneRunning { operation: Operation::Abort });
    assert_eq!(
        error.into_record().hint().as_deref(),
        Some("Attempt to abort the current IST, when none running.")
    );
    assert!(host.actions().is_empty());
}

#[test]
fn reentering_an_open_handle_is_refused() {
    let (host, ledger) = (MockHost::new(), Ledger::default());
    let transaction = open(&ledger, &host);

    let error = ledger.begin(&host, transaction.state()).unwrap_err();

    assert_eq!(error, LedgerError::BadState {
        operation: Operation::Begin,
        state: HandleState::Open,
    });
    assert_eq!(ledger.open_count(), 1);
}

#[test]
fn commit_in_failed_transaction_aborts() {
    let (host, state, ledger) = (MockHost::new(), ready(), Ledger::default());
    let transaction = open(&ledger, &host);

    state.set(State::InFailedTransaction);
    let error = ledger
        .commit(&host, &state, transaction.id(), transaction.state())
        .unwrap_err();

    assert_eq!(error, LedgerError::CommitRedirected { id: 1 });
    assert_eq!(error.into_record().code(), SqlState::IN_FAILED_SQL_TRANSACTION);
    assert_eq!(host.actions(), vec![Action::Begin, Action::Rollback]);
    assert_eq!(ledger.open_count(), 0);
    assert_eq!(state.get(), State::Ready);
}

#[test]
fn abort_restores_ready() {
    let (host, state, ledger) = (MockHost::new(), ready(), Ledger::default());
    let transaction = open(&ledger, &host);

    state.set(State::InFailedTransaction);
    ledger
        .abort(&host, &state, transaction.id(), transaction.state())
        .expect("abort");

    assert_eq!(state.get(), State::Ready);
    assert_eq!(ledger.open_count(), 0);
}

#[test]
fn host_refusal_leaves_count_unchanged() {
    let (host, ledger) = (MockHost::new(), Ledger::default());
    *host.fail_begin.lock() =
        Some(ErrorRecord::error(SqlState::OUT_OF_MEMORY, "out of memory"));

    let error = ledger.begin(&host, HandleState::New).unwrap_err();

    assert!(error.is_host());
    assert_eq!(error.into_record().code(), SqlState::OUT_OF_MEMORY);
    assert_eq!(ledger.open_count(), 0);
}

#[test]
fn limit_is_enforced() {
    let (host, ledger) = (MockHost::new(), Ledger::new(1));
    let _first = open(&ledger, &host);

    let error = ledger.begin(&host, HandleState::New).unwrap_err();

    assert_eq!(error, LedgerError::Exhausted { limit: 1 });
    assert_eq!(host.count(&Action::Begin), 1);
}

#[test]
fn reset_rolls_back_with_interrupts_held() {
    let (host, ledger) = (MockHost::new(), Ledger::default());
    for _ in 0..3 {
        open(&ledger, &host);
    }

    ledger.reset(&host, 2);

    assert_eq!(
        host.actions()[3..],
        [Action::Hold, Action::Rollback, Action::Rollback, Action::Resume]
    );
    assert_eq!(ledger.open_count(), 3);
}

proptest! {
    #[test]
    fn balanced_nesting_returns_to_zero(
        depth in 1usize..16,
        aborted in proptest::collection::vec(proptest::bool::ANY, 16),
    ) {
        let (host, state, ledger) =
            (MockHost::new(), ready(), Ledger::default());
        let mut stack = Vec::new();

        for _ in 0..depth {
            stack.push(open(&ledger, &host));
        }

        while let Some(mut transaction) = stack.pop() {
            let result = if aborted[stack.len()] {
                ledger.abort(
                    &host,
                    &state,
                    transaction.id(),
                    transaction.state(),
                )
            } else {
                ledger.commit(
                    &host,
                    &state,
                    transaction.id(),
                    transaction.state(),
                )
            };

            prop_assert!(result.is_ok());
            transaction.close(HandleState::Committed);
            prop_assert_eq!(ledger.open_count(), stack.len() as u64);
        }

        prop_assert_eq!(host.count(&Action::Begin), depth);
        prop_assert_eq!(
            host.count(&Action::Release) + host.count(&Action::Rollback),
            depth,
        );
    }
}
