//! Transactional unit port

use std::sync::Arc;

use tracing::warn;

use super::LedgerStore;
use crate::domain::result::{Error, Result};

/// Runs a sequence of ledger store operations as one atomic unit
pub trait UnitOfWork: Send + Sync {
    /// Begin a unit, hand `unit` a store handle bound to it, then commit or discard.
    ///
    /// If `unit` returns an error every effect made through the handle is
    /// discarded and that error is returned; when the discard fails too the
    /// result is `Error::DiscardFailed` carrying both. On success the effects
    /// are committed together and a commit failure is returned as is.
    ///
    /// Other callers see either all of a unit's writes or none of them.
    fn run_in_transaction(
        &self,
        unit: &mut dyn FnMut(&dyn LedgerStore) -> Result<()>,
    ) -> Result<()>;
}

/// A unit that can be finished exactly once
pub trait UnitHandle {
    fn commit(self) -> Result<()>;
    fn discard(self) -> Result<()>;
}

/// Finish a unit according to the outcome of its body
pub fn settle<U: UnitHandle>(unit: U, outcome: Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => unit.commit(),
        Err(cause) => {
            warn!(error = %cause, "discarding unit");
            match unit.discard() {
                Ok(()) => Err(cause),
                Err(discard) => Err(Error::discard_failed(cause, discard)),
            }
        }
    }
}

pub type SharedUnitOfWork = Arc<dyn UnitOfWork>;

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct FakeUnit<'a> {
        log: &'a RefCell<Vec<&'static str>>,
        fail_commit: bool,
        fail_discard: bool,
    }

    impl UnitHandle for FakeUnit<'_> {
        fn commit(self) -> Result<()> {
            self.log.borrow_mut().push("commit");
            if self.fail_commit {
                return Err(Error::database("commit refused"));
            }
            Ok(())
        }

        fn discard(self) -> Result<()> {
            self.log.borrow_mut().push("discard");
            if self.fail_discard {
                return Err(Error::database("discard refused"));
            }
            Ok(())
        }
    }

    fn unit<'a>(
        log: &'a RefCell<Vec<&'static str>>,
        fail_commit: bool,
        fail_discard: bool,
    ) -> FakeUnit<'a> {
        FakeUnit {
            log,
            fail_commit,
            fail_discard,
        }
    }

    #[test]
    fn test_success_commits() {
        let log = RefCell::new(Vec::new());
        settle(unit(&log, false, false), Ok(())).unwrap();
        assert_eq!(*log.borrow(), vec!["commit"]);
    }

    #[test]
    fn test_commit_failure_returned_as_is() {
        let log = RefCell::new(Vec::new());
        let err = settle(unit(&log, true, false), Ok(())).unwrap_err();
        assert!(matches!(err, Error::Database(ref m) if m == "commit refused"));
        assert_eq!(*log.borrow(), vec!["commit"]);
    }

    #[test]
    fn test_failure_discards_and_returns_cause() {
        let log = RefCell::new(Vec::new());
        let err = settle(unit(&log, false, false), Err(Error::not_found("account 3"))).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(*log.borrow(), vec!["discard"]);
    }

    #[test]
    fn test_discard_failure_is_combined_with_cause() {
        let log = RefCell::new(Vec::new());
        let err = settle(unit(&log, false, true), Err(Error::not_found("account 3"))).unwrap_err();
        match err {
            Error::DiscardFailed { cause, discard } => {
                assert!(cause.is_not_found());
                assert!(matches!(*discard, Error::Database(_)));
            }
            other => panic!("expected DiscardFailed, got {other:?}"),
        }
    }
}
