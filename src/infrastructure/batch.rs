use crate::infrastructure::database::{DatabaseSession, statement_matches};
use crate::infrastructure::statement::MutationTemplate;

/// Per-batch counters, plus the caller's acceptance verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success: usize,
    pub failure: usize,
    pub accepted: bool,
}

/// What happened to the transaction at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDecision {
    Committed,
    RolledBack,
    NothingDone,
}

/// Drives one mutation template over an ordered record stream inside a
/// single explicit transaction.
///
/// Per-record failures never abort the batch; they are counted and the
/// stream continues. Only the final counters and the caller's acceptance
/// decide between commit and rollback.
pub struct BatchExecutor<S: DatabaseSession> {
    session: S,
    template: MutationTemplate,
    outcome: BatchOutcome,
}

impl<S: DatabaseSession> BatchExecutor<S> {
    pub fn new(session: S, template: MutationTemplate) -> Self {
        Self {
            session,
            template,
            outcome: BatchOutcome::default(),
        }
    }

    /// Disable autocommit and open the explicit transaction. Backend
    /// chatter here is not user-facing.
    pub fn begin(&mut self) {
        for statement in ["set autocommit = 0", "start transaction"] {
            if let Err(error) = self.session.execute(statement) {
                tracing::debug!(%error, statement, "transaction setup diagnostic suppressed");
            }
        }
    }

    /// Synthesize and execute the statement for one record, counting the
    /// result. A record that fails is skipped, never retried.
    pub fn process(&mut self, record: &[String]) {
        let statement = match self.template.statement_for(record) {
            Ok(statement) => statement,
            Err(error) => {
                tracing::warn!(%error, "cannot generate a statement for this record");
                self.outcome.failure += 1;
                return;
            }
        };

        let verb = self.template.mode().verb();
        if !statement_matches(&statement, verb) {
            tracing::warn!(statement = %statement, verb, "statement does not match the operation mode");
            self.outcome.failure += 1;
            return;
        }

        match self.session.execute(&statement) {
            Ok(affected) => {
                tracing::debug!(affected, statement = %statement, "statement executed");
                self.outcome.success += 1;
            }
            Err(error) => {
                tracing::warn!(%error, "query failed");
                self.outcome.failure += 1;
            }
        }
    }

    /// Record the caller's verdict once the whole stream is consumed.
    pub fn accept(&mut self, accepted: bool) {
        self.outcome.accepted = accepted;
    }

    pub fn outcome(&self) -> &BatchOutcome {
        &self.outcome
    }

    /// Finalize exactly once: commit when accepted with at least one
    /// success, do nothing when nothing succeeded, roll back otherwise.
    /// Commit/rollback are best-effort cleanup; their own failures are
    /// logged, not surfaced.
    pub fn finish(mut self) -> (BatchOutcome, BatchDecision) {
        if self.outcome.failure > 0 {
            tracing::warn!(failures = self.outcome.failure, "operations failed in this batch");
        }

        let decision = if self.outcome.success == 0 {
            BatchDecision::NothingDone
        } else if self.outcome.accepted {
            if let Err(error) = self.session.execute("commit") {
                tracing::debug!(%error, "commit diagnostic suppressed");
            }
            BatchDecision::Committed
        } else {
            if let Err(error) = self.session.execute("rollback") {
                tracing::debug!(%error, "rollback diagnostic suppressed");
            }
            BatchDecision::RolledBack
        };

        (self.outcome, decision)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::domain::schema::{ColumnInfo, TableSchema};
    use crate::infrastructure::database::DatabaseError;
    use crate::infrastructure::statement::{MC_SIMU_TBL, MutationContext, OperationMode};

    #[derive(Default)]
    struct FakeSession {
        statements: Rc<RefCell<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl DatabaseSession for FakeSession {
        fn execute(&mut self, statement: &str) -> Result<u64, DatabaseError> {
            self.statements.borrow_mut().push(statement.to_string());
            if let Some(marker) = self.fail_on {
                if statement.contains(marker) {
                    return Err(DatabaseError::Query {
                        statement: statement.to_string(),
                        message: "boom".to_string(),
                    });
                }
            }
            Ok(1)
        }

        fn query(&mut self, _statement: &str) -> Result<Vec<Vec<String>>, DatabaseError> {
            Ok(Vec::new())
        }
    }

    fn template() -> MutationTemplate {
        let schema = TableSchema::new(
            ["lfn", "size"]
                .iter()
                .map(|name| ColumnInfo {
                    name: (*name).to_string(),
                    print_level: 0,
                })
                .collect(),
        );
        let context = MutationContext::new(&schema, &[0, 1], MC_SIMU_TBL, false);
        MutationTemplate::prepare(OperationMode::Insert, context)
            .expect("template should be prepared")
    }

    fn record(lfn: &str, size: &str) -> Vec<String> {
        vec![lfn.to_string(), size.to_string()]
    }

    #[test]
    fn begin_opens_an_explicit_transaction() {
        let statements = Rc::new(RefCell::new(Vec::new()));
        let session = FakeSession {
            statements: Rc::clone(&statements),
            fail_on: None,
        };
        let mut executor = BatchExecutor::new(session, template());

        executor.begin();

        assert_eq!(
            *statements.borrow(),
            vec!["set autocommit = 0".to_string(), "start transaction".to_string()]
        );
    }

    #[test]
    fn failures_are_counted_and_the_stream_continues() {
        let statements = Rc::new(RefCell::new(Vec::new()));
        let session = FakeSession {
            statements: Rc::clone(&statements),
            fail_on: Some("bad.mc.root"),
        };
        let mut executor = BatchExecutor::new(session, template());

        executor.process(&record("a.mc.root", "1"));
        executor.process(&record("bad.mc.root", "2"));
        executor.process(&record("unroutable.txt", "3"));
        executor.process(&record("b.mc.root", "4"));

        assert_eq!(executor.outcome().success, 2);
        assert_eq!(executor.outcome().failure, 2);
        // The unroutable record never reached the session.
        assert_eq!(statements.borrow().len(), 3);
    }

    #[test]
    fn accepted_batch_with_successes_commits() {
        let statements = Rc::new(RefCell::new(Vec::new()));
        let session = FakeSession {
            statements: Rc::clone(&statements),
            fail_on: None,
        };
        let mut executor = BatchExecutor::new(session, template());

        executor.process(&record("a.mc.root", "1"));
        executor.accept(true);
        let (outcome, decision) = executor.finish();

        assert_eq!(decision, BatchDecision::Committed);
        assert_eq!(outcome.success, 1);
        assert_eq!(statements.borrow().last().map(String::as_str), Some("commit"));
    }

    #[test]
    fn unaccepted_batch_with_successes_rolls_back() {
        let statements = Rc::new(RefCell::new(Vec::new()));
        let session = FakeSession {
            statements: Rc::clone(&statements),
            fail_on: None,
        };
        let mut executor = BatchExecutor::new(session, template());

        executor.process(&record("a.mc.root", "1"));
        executor.accept(false);
        let (_, decision) = executor.finish();

        assert_eq!(decision, BatchDecision::RolledBack);
        assert_eq!(
            statements.borrow().last().map(String::as_str),
            Some("rollback")
        );
    }

    #[test]
    fn batch_without_successes_takes_no_action() {
        let statements = Rc::new(RefCell::new(Vec::new()));
        let session = FakeSession {
            statements: Rc::clone(&statements),
            fail_on: None,
        };
        let mut executor = BatchExecutor::new(session, template());

        executor.process(&record("unroutable.txt", "1"));
        executor.accept(true);
        let (outcome, decision) = executor.finish();

        assert_eq!(decision, BatchDecision::NothingDone);
        assert_eq!(outcome.success, 0);
        assert_eq!(outcome.failure, 1);
        assert!(statements.borrow().is_empty());
    }
}
