use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use invex_core::{ExtractionResult, LineItem, PaymentInfo, VendorMetadata};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("LLM transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("LLM returned no content")]
    EmptyResponse,
    #[error("LLM response was not valid JSON: {0}")]
    BadJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    /// Chat model, e.g. "gpt-4o-mini".
    pub model: String,
    /// OpenAI-compatible base URL, e.g. "https://api.openai.com/v1".
    pub base_url: String,
    /// Skip the network entirely and return a fixed mock record.
    pub dry_run: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            dry_run: true,
        }
    }
}

// ── Chat API wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ── Extractor ─────────────────────────────────────────────────────────────────

/// Structured extraction via an OpenAI-compatible chat completion.
///
/// One shot, temperature 0, JSON mode. Prompt engineering and retries are
/// out of scope here; a failed call surfaces as an `ExtractError` and the
/// caller decides whether to fall back.
pub struct LlmExtractor {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmExtractor {
    pub fn new(config: LlmConfig) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self { config, http })
    }

    pub async fn extract(&self, ocr_text: &str) -> Result<ExtractionResult, ExtractError> {
        if self.config.dry_run {
            return Ok(mock_record(ocr_text));
        }

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You output only valid JSON. No prose.".to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: build_prompt(ocr_text),
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ExtractError::EmptyResponse)?;

        decode_record(&content, ocr_text)
    }
}

/// Schema-first prompt; field names must match the wire model exactly.
fn build_prompt(ocr_text: &str) -> String {
    format!(
        r#"You are an expert in parsing noisy retail receipts and invoices.
Extract the following fields in JSON strictly matching this schema:

{{
  "vendor": {{
    "name": string|null,
    "address": string|null,
    "phone": string|null,
    "date": string|null,
    "time": string|null,
    "website": string|null,
    "invoice_no": string|null
  }},
  "items": [
    {{
      "sku": string|null,
      "description": string|null,
      "qty": number|null,
      "unit_price": number|null,
      "total": number|null
    }}
  ],
  "payment": {{
    "method": string|null,
    "subtotal": number|null,
    "tax": number|null,
    "tip": number|null,
    "total": number|null,
    "currency": string|null
  }},
  "raw_text": string
}}

Rules:
- If a field is absent in the text, use null.
- Parse numbers as numbers, not strings.
- Do not invent items; only extract what appears in the text.
- Copy the entire input as raw_text.

INPUT:
"""{ocr_text}""""#
    )
}

/// Decode a model reply into the typed record, tolerating Markdown fences
/// and shape drift.
fn decode_record(content: &str, ocr_text: &str) -> Result<ExtractionResult, ExtractError> {
    let value: Value = serde_json::from_str(strip_code_fences(content))?;

    let mut record = serde_json::from_value::<ExtractionResult>(value.clone())
        .unwrap_or_else(|_| repair_record(&value));

    if record.raw_text.is_empty() {
        record.raw_text = ocr_text.to_string();
    }
    Ok(record)
}

fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Minimal per-section repair when the top-level shape drifts: each block is
/// decoded independently and bad blocks fall back to defaults.
fn repair_record(value: &Value) -> ExtractionResult {
    let section = |key: &str| value.get(key).cloned().unwrap_or(Value::Null);

    ExtractionResult {
        vendor: serde_json::from_value::<VendorMetadata>(section("vendor")).unwrap_or_default(),
        items: value
            .get("items")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|i| serde_json::from_value::<LineItem>(i.clone()).ok())
                    .collect()
            })
            .unwrap_or_default(),
        payment: serde_json::from_value::<PaymentInfo>(section("payment")).unwrap_or_default(),
        raw_text: value
            .get("raw_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        math: None,
    }
}

/// The deterministic record returned in dry-run mode. Tests and offline
/// deployments rely on these exact values.
fn mock_record(ocr_text: &str) -> ExtractionResult {
    ExtractionResult {
        vendor: VendorMetadata {
            name: Some("Mock Store".to_string()),
            invoice_no: Some("INV-001".to_string()),
            ..Default::default()
        },
        items: vec![LineItem {
            sku: Some("ABC123".to_string()),
            description: Some("Widget".to_string()),
            qty: Some(2.0),
            unit_price: Some(3.5),
            total: Some(7.0),
        }],
        payment: PaymentInfo {
            method: Some("VISA ****1111".to_string()),
            subtotal: Some(7.0),
            tax: Some(0.63),
            tip: Some(0.0),
            total: Some(7.63),
            currency: Some("USD".to_string()),
        },
        raw_text: ocr_text.to_string(),
        math: None,
    }
}
