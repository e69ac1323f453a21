//! Query Executor
//!
//! Pass-through to the store that converts any failure into an error-state
//! result. Callers never receive an unhandled fault from this step.

use crate::dataset::Dataset;
use crate::store::Store;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of executing a query candidate: a tabular result or an error
/// message string. Exactly one of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryOutcome {
    Table(Dataset),
    Failure(String),
}

impl QueryOutcome {
    pub fn table(&self) -> Option<&Dataset> {
        match self {
            QueryOutcome::Table(dataset) => Some(dataset),
            QueryOutcome::Failure(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failure(_))
    }
}

/// Run the candidate SQL against the store.
pub fn execute(store: &Store, candidate: &str) -> QueryOutcome {
    match store.query(candidate) {
        Ok(dataset) => QueryOutcome::Table(dataset),
        Err(e) => {
            warn!(error = %e, "query execution failed");
            QueryOutcome::Failure(format!(
                "An error occurred while executing the SQL query: {}",
                e
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_csv;

    fn loaded_store() -> Store {
        let store = Store::open().unwrap();
        let dataset = load_csv(b"month,sales\nJan,100\n").unwrap();
        store.load(&dataset).unwrap();
        store
    }

    #[test]
    fn valid_query_returns_table() {
        let store = loaded_store();
        let outcome = execute(&store, "SELECT month FROM data");
        let table = outcome.table().expect("expected a table");
        assert_eq!(table.columns, vec!["month"]);
    }

    #[test]
    fn invalid_sql_never_escapes_as_an_error() {
        let store = loaded_store();
        let outcome = execute(&store, "this is not sql");
        assert!(outcome.is_failure());
        match outcome {
            QueryOutcome::Failure(message) => {
                assert!(message.contains("An error occurred while executing"));
            }
            QueryOutcome::Table(_) => unreachable!(),
        }
    }
}
