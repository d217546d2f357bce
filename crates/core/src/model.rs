use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::amount::to_amount;

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    // Upstream extractors emit numbers, numeric strings, nulls, or worse.
    // Anything unusable degrades to absence instead of failing the request.
    let value = Value::deserialize(deserializer)?;
    Ok(to_amount(&value))
}

fn default_qty() -> Option<f64> {
    Some(1.0)
}

fn default_currency() -> Option<String> {
    Some("USD".to_string())
}

/// One line of an invoice. No identity beyond its position in the owning
/// list; the reconciliation engine reads it but never writes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_qty", deserialize_with = "lenient_amount")]
    pub qty: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: Option<f64>,
}

/// Payment block. The reconciliation engine fills `subtotal` and `total`
/// in the returned copy when they can be derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInfo {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub subtotal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tax: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub tip: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: Option<String>,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        PaymentInfo {
            method: None,
            subtotal: None,
            tax: None,
            tip: None,
            total: None,
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VendorMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub invoice_no: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MathStatus {
    Ok,
    Mismatch,
    Unknown,
}

impl Default for MathStatus {
    fn default() -> Self {
        MathStatus::Unknown
    }
}

impl std::fmt::Display for MathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MathStatus::Ok => write!(f, "ok"),
            MathStatus::Mismatch => write!(f, "mismatch"),
            MathStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Reconciliation verdict, attached under [`MATH_KEY`]. Unknown keys placed
/// there by earlier stages are carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MathAnnotation {
    #[serde(default)]
    pub status: MathStatus,
    #[serde(default)]
    pub note: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The request-scoped record: produced by extraction, annotated by the
/// reconciliation engine, serialized verbatim to the caller, then dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractionResult {
    #[serde(default)]
    pub vendor: VendorMetadata,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub payment: PaymentInfo,
    #[serde(default)]
    pub raw_text: String,
    #[serde(rename = "_math", default, skip_serializing_if = "Option::is_none")]
    pub math: Option<MathAnnotation>,
}
