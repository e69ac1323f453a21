pub mod chart;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod insights;
pub mod llm;
pub mod loader;
pub mod session;
pub mod store;
pub mod synthesizer;
