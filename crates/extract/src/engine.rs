use invex_core::ExtractionResult;
use tracing::warn;

use crate::llm::LlmExtractor;
use crate::rules::RuleExtractor;

/// The structured-extraction strategy for this deployment.
///
/// Enum dispatch rather than a trait object: the rule path is synchronous
/// and infallible, the LLM path is async and can fail. An LLM failure is
/// never a request failure — it degrades to the rule path.
pub enum ExtractorEngine {
    Rules,
    Llm(LlmExtractor),
}

impl ExtractorEngine {
    /// Name reported in the response envelope.
    pub fn name(&self) -> &'static str {
        match self {
            ExtractorEngine::Rules => "rule_based",
            ExtractorEngine::Llm(_) => "llm",
        }
    }

    pub async fn extract(&self, text: &str) -> ExtractionResult {
        match self {
            ExtractorEngine::Rules => RuleExtractor::extract(text),
            ExtractorEngine::Llm(llm) => match llm.extract(text).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("LLM extraction failed, falling back to rules: {e}");
                    RuleExtractor::extract(text)
                }
            },
        }
    }
}
