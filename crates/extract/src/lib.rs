pub mod engine;
pub mod llm;
pub mod rules;

pub use engine::ExtractorEngine;
pub use llm::{ExtractError, LlmConfig, LlmExtractor};
pub use rules::RuleExtractor;
