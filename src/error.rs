use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryBotError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryBotError>;
