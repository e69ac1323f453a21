//! Per-session orchestration
//!
//! `Session` is the explicit per-session context (loaded dataset plus its
//! store); `QueryBot` drives the full Loader → Store → Synthesizer →
//! Executor → Renderer chain for one question at a time. Sessions own their
//! store exclusively, so several can coexist without coordination.

use crate::chart::{render_explicit, render_from_question, Chart, PlotKind};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::executor::{execute, QueryOutcome};
use crate::llm::ChatModel;
use crate::loader;
use crate::store::{Store, TABLE_NAME};
use crate::synthesizer::QuerySynthesizer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// How the caller wants the result plotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlotRequest {
    /// No chart.
    None,
    /// Derive the plot kind from keywords in the question.
    Auto,
    /// Explicit plot kind and column list. An empty column list falls back
    /// to deriving columns by substring containment against the question,
    /// kept as a convenience path only; the explicit list is the contract.
    Explicit {
        kind: PlotKind,
        columns: Vec<String>,
    },
}

/// Everything one question produced. The generated SQL is always surfaced
/// for transparency when a model or template produced one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub sql: Option<String>,
    pub outcome: Option<QueryOutcome>,
    pub chart: Option<Chart>,
    pub notices: Vec<String>,
}

impl AskResponse {
    fn notice(message: impl Into<String>) -> Self {
        Self {
            sql: None,
            outcome: None,
            chart: None,
            notices: vec![message.into()],
        }
    }
}

/// Explicit per-session state: one uploaded dataset and its store.
pub struct Session {
    pub id: Uuid,
    dataset: Option<Dataset>,
    store: Option<Store>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset: None,
            store: None,
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The query assistant: session state plus the synthesizer.
pub struct QueryBot {
    session: Session,
    synthesizer: QuerySynthesizer,
    allow_writes: bool,
}

impl QueryBot {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            session: Session::new(),
            synthesizer: QuerySynthesizer::new(model),
            allow_writes: false,
        }
    }

    /// Let generated SQL run unguarded. Known weakness, off by default.
    pub fn allow_writes(mut self) -> Self {
        self.allow_writes = true;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Parse CSV bytes and load them, replacing any prior dataset.
    pub fn load_csv(&mut self, bytes: &[u8]) -> Result<()> {
        let dataset = loader::load_csv(bytes)?;
        self.load_dataset(dataset)
    }

    /// Load an already-parsed dataset (e.g. one Excel sheet).
    pub fn load_dataset(&mut self, dataset: Dataset) -> Result<()> {
        let store = if self.allow_writes {
            Store::open()?.allow_writes()
        } else {
            Store::open()?
        };
        store.load(&dataset)?;
        info!(session = %self.session.id, "dataset loaded into session");
        self.session.dataset = Some(dataset);
        self.session.store = Some(store);
        Ok(())
    }

    /// Answer one question. Every step failure is converted into a
    /// user-facing notice; nothing here ends the session.
    pub async fn ask(&self, question: &str, plot: PlotRequest) -> AskResponse {
        let (dataset, store) = match (&self.session.dataset, &self.session.store) {
            (Some(dataset), Some(store)) => (dataset, store),
            _ => {
                return AskResponse::notice(
                    "Please upload a CSV file or provide a database connection string.",
                )
            }
        };
        if question.trim().is_empty() {
            return AskResponse::notice("Please ask a question.");
        }

        match plot {
            PlotRequest::Explicit { kind, columns } => {
                self.ask_with_plot(dataset, store, question, kind, columns)
            }
            PlotRequest::Auto => {
                let mut response = self.ask_freeform(store, question).await;
                if let Some(QueryOutcome::Table(table)) = &response.outcome {
                    match render_from_question(table, question) {
                        Ok((chart, notice)) => {
                            response.chart = Some(chart);
                            response.notices.extend(notice);
                        }
                        Err(e) => response.notices.push(e.to_string()),
                    }
                }
                response
            }
            PlotRequest::None => self.ask_freeform(store, question).await,
        }
    }

    /// Explicit-plot flow: the column list drives a SELECT template; no
    /// model call is made.
    fn ask_with_plot(
        &self,
        dataset: &Dataset,
        store: &Store,
        question: &str,
        kind: PlotKind,
        columns: Vec<String>,
    ) -> AskResponse {
        let columns = if columns.is_empty() {
            derive_columns(dataset, question)
        } else {
            columns
        };
        if columns.is_empty() {
            return AskResponse::notice("No valid column names found in the question.");
        }

        let sql = format!("SELECT {} FROM {}", columns.join(", "), TABLE_NAME);
        let outcome = execute(store, &sql);
        let chart = match &outcome {
            QueryOutcome::Table(table) => match render_explicit(table, kind, &columns) {
                Ok(chart) => Some(chart),
                Err(e) => {
                    return AskResponse {
                        sql: Some(sql),
                        outcome: Some(outcome),
                        chart: None,
                        notices: vec![e.to_string()],
                    }
                }
            },
            QueryOutcome::Failure(_) => None,
        };
        AskResponse {
            sql: Some(sql),
            outcome: Some(outcome),
            chart,
            notices: Vec::new(),
        }
    }

    /// Default flow: synthesize SQL from the question and execute it.
    async fn ask_freeform(&self, store: &Store, question: &str) -> AskResponse {
        let sql = match self.synthesizer.synthesize(question).await {
            Ok(sql) => sql,
            Err(e) => return AskResponse::notice(e.to_string()),
        };
        let outcome = execute(store, &sql);
        AskResponse {
            sql: Some(sql),
            outcome: Some(outcome),
            chart: None,
            notices: Vec::new(),
        }
    }
}

/// Fallback column derivation: dataset columns mentioned in the question,
/// matched case- and whitespace-insensitively. Fragile for column names with
/// punctuation; the explicit column list is the preferred contract.
fn derive_columns(dataset: &Dataset, question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    dataset
        .columns
        .iter()
        .filter(|col| lowered.contains(&col.trim().to_lowercase()))
        .cloned()
        .collect()
}
