use serde_json::Value;

/// Best-effort coercion of a heterogeneous JSON value into a currency amount.
///
/// OCR and LLM output put numbers wherever they like: `7.63`, `"7.63"`,
/// `null`, or plain garbage. Anything that is not a finite number comes back
/// as `None`; this function never fails.
pub fn to_amount(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Round a present amount to 2 decimal places, propagating absence.
///
/// A tiny positive bias (1e-12) is added before rounding so that sums whose
/// binary representation lands just under a cent boundary (7.624999…) still
/// round to the printed value (7.63). Downstream consumers key off exact
/// cent values, so the bias must stay.
pub fn round2(value: Option<f64>) -> Option<f64> {
    value
        .map(|v| ((v + 1e-12) * 100.0).round() / 100.0)
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(to_amount(&json!(3.5)), Some(3.5));
        assert_eq!(to_amount(&json!("3.50")), Some(3.5));
        assert_eq!(to_amount(&json!(7)), Some(7.0));
        assert_eq!(to_amount(&json!(" 12.00 ")), Some(12.0));
    }

    #[test]
    fn to_amount_rejects_garbage() {
        assert_eq!(to_amount(&json!("abc")), None);
        assert_eq!(to_amount(&Value::Null), None);
        assert_eq!(to_amount(&json!(true)), None);
        assert_eq!(to_amount(&json!([1.0])), None);
        assert_eq!(to_amount(&json!({"amount": 1.0})), None);
    }

    #[test]
    fn to_amount_rejects_non_finite_strings() {
        assert_eq!(to_amount(&json!("NaN")), None);
        assert_eq!(to_amount(&json!("inf")), None);
        assert_eq!(to_amount(&json!("-inf")), None);
    }

    #[test]
    fn round2_epsilon_bias_lifts_midpoints() {
        // 7.625 is stored just below the midpoint in binary; the bias must
        // push it up to 7.63 rather than letting it fall to 7.62.
        assert_eq!(round2(Some(7.625)), Some(7.63));
        assert_eq!(round2(Some(7.0 + 0.63)), Some(7.63));
    }

    #[test]
    fn round2_plain_values() {
        assert_eq!(round2(Some(1.234)), Some(1.23));
        assert_eq!(round2(Some(1.236)), Some(1.24));
        assert_eq!(round2(Some(0.0)), Some(0.0));
    }

    #[test]
    fn round2_propagates_absence() {
        assert_eq!(round2(None), None);
    }

    #[test]
    fn round2_is_idempotent() {
        for v in [7.625, 1.005, 0.015, 99.994, 1234.565, -7.625] {
            let once = round2(Some(v));
            assert_eq!(round2(once), once, "not idempotent for {v}");
        }
    }

    #[test]
    fn round2_never_emits_non_finite() {
        assert_eq!(round2(Some(f64::MAX)), None);
    }
}
