//! Insights Generator
//!
//! Independent flow with no query-store step: summarizes the sheets of an
//! uploaded Excel workbook into a text blob, embeds it in a fixed prompt
//! template, and forwards it to the language model for open-ended
//! commentary. Keeps an append-only conversation transcript and persists
//! every exchange to daily log files and per-response output files.

use crate::dataset::Sheet;
use crate::error::{QueryBotError, Result};
use crate::llm::{ChatModel, ChatRequest};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const MODEL: &str = "gpt-4";
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// Content excerpt length embedded in the prompt.
const CONTEXT_EXCERPT_LEN: usize = 1000;

/// One user/model exchange. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub user: String,
    pub ai: String,
}

/// Sheet summaries feeding the prompt template.
pub struct WorkbookSummary {
    /// Full grid content of every sheet.
    pub combined_text: String,
    /// Shape description of every sheet.
    pub structure: String,
}

/// Summarize sheet shapes and content for the prompt.
pub fn summarize_workbook(sheets: &[Sheet]) -> WorkbookSummary {
    let mut combined_text = String::new();
    let mut structure = String::new();
    for sheet in sheets {
        combined_text.push_str(&format!("\nSheet: {}\n", sheet.name));
        combined_text.push_str(&sheet.data.to_grid());

        structure.push_str(&format!("\nSheet: {}\n", sheet.name));
        structure.push_str(&format!(
            "Number of rows: {}, Number of columns: {}\n",
            sheet.data.row_count(),
            sheet.data.column_count()
        ));
        structure
            .push_str("This sheet contains data typically displayed in grids and charts.\n");
    }
    WorkbookSummary {
        combined_text,
        structure,
    }
}

/// Dashboard interpreter over uploaded Excel extracts.
pub struct InsightsBoard {
    model: Arc<dyn ChatModel>,
    input_dir: PathBuf,
    output_dir: PathBuf,
    log_dir: PathBuf,
    transcript: Vec<ConversationEntry>,
}

impl InsightsBoard {
    /// Create the board and its three working directories.
    pub fn new(
        model: Arc<dyn ChatModel>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let input_dir = input_dir.into();
        let output_dir = output_dir.into();
        let log_dir = log_dir.into();
        fs::create_dir_all(&input_dir)?;
        fs::create_dir_all(&output_dir)?;
        fs::create_dir_all(&log_dir)?;
        Ok(Self {
            model,
            input_dir,
            output_dir,
            log_dir,
            transcript: Vec::new(),
        })
    }

    pub fn transcript(&self) -> &[ConversationEntry] {
        &self.transcript
    }

    /// Clear the transcript. Explicit user action only.
    pub fn clear_history(&mut self) {
        self.transcript.clear();
    }

    /// Copy an uploaded workbook into the managed input directory.
    pub fn save_upload(&self, source: &Path) -> Result<PathBuf> {
        let name = source
            .file_name()
            .ok_or_else(|| QueryBotError::Parse("Upload has no file name".to_string()))?;
        let destination = self.input_dir.join(name);
        fs::copy(source, &destination)?;
        Ok(destination)
    }

    /// Run one insights exchange: summarize the sheets, call the model,
    /// append to the transcript, and persist the log and output files.
    pub async fn generate(
        &mut self,
        instructions: &str,
        prompt: &str,
        sheets: &[Sheet],
    ) -> Result<String> {
        if prompt.trim().is_empty() && instructions.trim().is_empty() && sheets.is_empty() {
            return Err(QueryBotError::Synthesis(
                "Please enter a query or upload an Excel file to continue.".to_string(),
            ));
        }

        let summary = summarize_workbook(sheets);
        let excerpt: String = summary
            .combined_text
            .chars()
            .take(CONTEXT_EXCERPT_LEN)
            .collect();
        let full_prompt = format!(
            "You are analyzing an Excel file that serves as an extract from a business \
dashboard. The dashboard contains various sheets with data represented in grids and \
visualized through charts. Below is a detailed description of the dashboard:\n\n\
{}\n\n\
The user has provided the following instructions: {}\n\n\
Additionally, consider this context extracted from the data: {} (truncated for brevity).\n\n\
Please provide insights on:\n\
- The trends and patterns visible in the dashboard.\n\
- Observations from the legends and any notable differences between data points.\n\
- Recommendations or high-level summaries based on the data visualization.",
            summary.structure, instructions, excerpt
        );

        let request = ChatRequest {
            model: MODEL.to_string(),
            system: None,
            user: full_prompt,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            frequency_penalty: 0.0,
        };
        let response = self.model.complete(&request).await?;

        self.transcript.push(ConversationEntry {
            user: prompt.to_string(),
            ai: response.clone(),
        });
        self.append_log(prompt, &response)?;
        let output_path = self.write_output(&response)?;
        info!(output = %output_path.display(), "insights exchange persisted");

        Ok(response)
    }

    /// Append the exchange to today's log file (`YYYY-MM-DD.log`).
    fn append_log(&self, prompt: &str, response: &str) -> Result<()> {
        let today = Local::now().format("%Y-%m-%d");
        let log_path = self.log_dir.join(format!("{}.log", today));
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        write!(file, "User: {}\nAI: {}\n", prompt, response)?;
        Ok(())
    }

    /// Write the raw response to `Conversation_Output_<YYYYMMDD_HHMMSS>.txt`.
    fn write_output(&self, response: &str) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let output_path = self
            .output_dir
            .join(format!("Conversation_Output_{}.txt", stamp));
        fs::write(&output_path, response)?;
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Value};
    use crate::error::Result as BotResult;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct CannedModel(String);

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, request: &ChatRequest) -> BotResult<String> {
            assert!(request.user.contains("business"));
            Ok(self.0.clone())
        }
    }

    fn sheet() -> Sheet {
        Sheet {
            name: "Summary".to_string(),
            data: Dataset::new(
                vec!["region".to_string(), "revenue".to_string()],
                vec![vec![Value::Text("North".to_string()), Value::Int(1200)]],
            )
            .unwrap(),
        }
    }

    fn board(dir: &TempDir) -> InsightsBoard {
        InsightsBoard::new(
            Arc::new(CannedModel("Revenue is concentrated in the North.".to_string())),
            dir.path().join("input"),
            dir.path().join("output"),
            dir.path().join("logs"),
        )
        .unwrap()
    }

    #[test]
    fn summary_names_sheets_and_shapes() {
        let summary = summarize_workbook(&[sheet()]);
        assert!(summary.structure.contains("Sheet: Summary"));
        assert!(summary
            .structure
            .contains("Number of rows: 1, Number of columns: 2"));
        assert!(summary.combined_text.contains("North"));
    }

    #[tokio::test]
    async fn generate_appends_transcript_and_persists_files() {
        let dir = TempDir::new().unwrap();
        let mut board = board(&dir);
        let response = board
            .generate("focus on revenue", "what stands out?", &[sheet()])
            .await
            .unwrap();
        assert!(response.contains("North"));
        assert_eq!(board.transcript().len(), 1);
        assert_eq!(board.transcript()[0].user, "what stands out?");

        let today = Local::now().format("%Y-%m-%d");
        let log = fs::read_to_string(dir.path().join("logs").join(format!("{}.log", today)))
            .unwrap();
        assert!(log.starts_with("User: what stands out?\nAI: "));

        let outputs: Vec<_> = fs::read_dir(dir.path().join("output"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].starts_with("Conversation_Output_"));
        assert!(outputs[0].ends_with(".txt"));
    }

    #[tokio::test]
    async fn empty_exchange_makes_no_model_call() {
        let dir = TempDir::new().unwrap();
        let mut board = board(&dir);
        let err = board.generate("", "   ", &[]).await.unwrap_err();
        assert!(err.to_string().contains("upload an Excel file"));
        assert!(board.transcript().is_empty());
    }

    #[tokio::test]
    async fn clear_history_empties_the_transcript() {
        let dir = TempDir::new().unwrap();
        let mut board = board(&dir);
        board
            .generate("a", "b", &[sheet()])
            .await
            .unwrap();
        board.clear_history();
        assert!(board.transcript().is_empty());
    }
}
