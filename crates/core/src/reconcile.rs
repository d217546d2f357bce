use crate::amount::round2;
use crate::model::{ExtractionResult, LineItem, MathStatus};

/// Subtotal implied by the line items, as opposed to the one the payment
/// block declares.
///
/// Per item the printed line total wins; failing that, `qty × unit_price`
/// (qty defaults to 1). Items offering neither contribute nothing. Returns
/// `None` when no item contributed at all, which is distinct from a sum
/// that happens to be zero.
pub fn implied_subtotal(items: &[LineItem]) -> Option<f64> {
    if items.is_empty() {
        return None;
    }

    let mut sum = 0.0;
    let mut saw_any = false;
    for item in items {
        if let Some(line_total) = item.total.filter(|v| v.is_finite()) {
            sum += line_total;
            saw_any = true;
        } else if let Some(unit) = item.unit_price.filter(|v| v.is_finite()) {
            let qty = item.qty.filter(|v| v.is_finite()).unwrap_or(1.0);
            sum += qty * unit;
            saw_any = true;
        }
    }

    if saw_any {
        round2(Some(sum))
    } else {
        None
    }
}

/// Cross-check the payment block against the line items, filling gaps where
/// the data allows and classifying the record's internal consistency.
///
/// Pure: consumes the record and returns the annotated copy. Fill-ins are
/// recorded as diagnostic tokens in the note; a pre-existing annotation is
/// merged into, never replaced. Total over its input domain — malformed
/// numerics were already degraded to absence at the serde boundary, so there
/// is no error path here.
pub fn reconcile(mut result: ExtractionResult) -> ExtractionResult {
    let mut subtotal = result.payment.subtotal.filter(|v| v.is_finite());
    let tax = result.payment.tax.filter(|v| v.is_finite()).unwrap_or(0.0);
    let tip = result.payment.tip.filter(|v| v.is_finite()).unwrap_or(0.0);
    let mut total = result.payment.total.filter(|v| v.is_finite());

    let from_items = implied_subtotal(&result.items);
    let mut notes: Vec<String> = Vec::new();

    if subtotal.is_none() {
        if let Some(implied) = from_items {
            subtotal = Some(implied);
            result.payment.subtotal = Some(implied);
            notes.push("subtotal_computed_from_items".to_string());
        }
    }

    if total.is_none() {
        if let Some(sub) = subtotal {
            total = round2(Some(sub + tax + tip));
            result.payment.total = total;
            notes.push("total_computed_from_parts".to_string());
        }
    }

    let status = match (subtotal, total) {
        (Some(sub), Some(tot)) => {
            let expected = round2(Some(sub + tax + tip));
            if expected == round2(Some(tot)) {
                MathStatus::Ok
            } else {
                notes.push(format!(
                    "expected {} from subtotal+tax+tip, got {}",
                    fmt_amount(expected),
                    fmt_amount(Some(tot)),
                ));
                MathStatus::Mismatch
            }
        }
        _ => MathStatus::Unknown,
    };

    let math = result.math.get_or_insert_with(Default::default);
    math.status = status;
    math.note = notes.join(", ");
    result
}

/// Render an amount the way it appears on a receipt note: whole amounts keep
/// one trailing decimal (`7.0`), everything else prints as-is.
fn fmt_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => format!("{v}"),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MathAnnotation, PaymentInfo};
    use serde_json::json;

    fn item(qty: Option<f64>, unit_price: Option<f64>, total: Option<f64>) -> LineItem {
        LineItem {
            qty,
            unit_price,
            total,
            ..Default::default()
        }
    }

    // ── implied_subtotal ─────────────────────────────────────────────────────

    #[test]
    fn empty_items_yield_no_subtotal() {
        assert_eq!(implied_subtotal(&[]), None);
    }

    #[test]
    fn line_totals_are_summed() {
        let items = [
            item(None, None, Some(3.0)),
            item(None, None, Some(4.0)),
        ];
        assert_eq!(implied_subtotal(&items), Some(7.0));
    }

    #[test]
    fn line_total_wins_over_qty_times_price() {
        // A printed line total beats whatever qty × unit_price would say.
        let items = [item(Some(2.0), Some(100.0), Some(3.0))];
        assert_eq!(implied_subtotal(&items), Some(3.0));
    }

    #[test]
    fn qty_times_unit_price_fallback() {
        let items = [item(Some(2.0), Some(3.5), None)];
        assert_eq!(implied_subtotal(&items), Some(7.0));
    }

    #[test]
    fn missing_qty_defaults_to_one() {
        let items = [item(None, Some(4.25), None)];
        assert_eq!(implied_subtotal(&items), Some(4.25));
    }

    #[test]
    fn items_without_amounts_contribute_nothing() {
        let items = [
            item(Some(3.0), None, None),
            item(None, None, Some(5.0)),
        ];
        assert_eq!(implied_subtotal(&items), Some(5.0));
    }

    #[test]
    fn all_items_without_amounts_yield_none() {
        let items = [item(Some(2.0), None, None), item(None, None, None)];
        assert_eq!(implied_subtotal(&items), None);
    }

    #[test]
    fn zero_sum_is_still_a_sum() {
        // "computed as zero" must not collapse into "could not compute".
        let items = [item(None, None, Some(0.0))];
        assert_eq!(implied_subtotal(&items), Some(0.0));
    }

    #[test]
    fn order_does_not_matter() {
        let a = [item(None, None, Some(1.1)), item(Some(2.0), Some(3.0), None)];
        let b = [item(Some(2.0), Some(3.0), None), item(None, None, Some(1.1))];
        assert_eq!(implied_subtotal(&a), implied_subtotal(&b));
    }

    // ── reconcile ────────────────────────────────────────────────────────────

    fn record(items: Vec<LineItem>, payment: PaymentInfo) -> ExtractionResult {
        ExtractionResult {
            items,
            payment,
            ..Default::default()
        }
    }

    #[test]
    fn fills_subtotal_and_total_from_items() {
        let r = record(
            vec![item(Some(2.0), Some(3.5), None)],
            PaymentInfo {
                tax: Some(0.63),
                tip: Some(0.0),
                ..Default::default()
            },
        );
        let r = reconcile(r);
        assert_eq!(r.payment.subtotal, Some(7.0));
        assert_eq!(r.payment.total, Some(7.63));
        let math = r.math.unwrap();
        assert_eq!(math.status, MathStatus::Ok);
        assert!(math.note.contains("subtotal_computed_from_items"));
        assert!(math.note.contains("total_computed_from_parts"));
    }

    #[test]
    fn declared_total_contradicting_parts_is_a_mismatch() {
        let r = record(
            vec![],
            PaymentInfo {
                subtotal: Some(7.0),
                tax: Some(0.63),
                tip: Some(0.0),
                total: Some(7.0),
                ..Default::default()
            },
        );
        let r = reconcile(r);
        let math = r.math.unwrap();
        assert_eq!(math.status, MathStatus::Mismatch);
        assert!(math.note.contains("expected 7.63"), "note: {}", math.note);
        assert!(math.note.contains("got 7.0"), "note: {}", math.note);
        // The declared total is left alone.
        assert_eq!(r.payment.total, Some(7.0));
    }

    #[test]
    fn consistent_record_is_ok_with_empty_note() {
        let r = record(
            vec![],
            PaymentInfo {
                subtotal: Some(7.0),
                tax: Some(0.63),
                tip: Some(0.0),
                total: Some(7.63),
                ..Default::default()
            },
        );
        let r = reconcile(r);
        let math = r.math.unwrap();
        assert_eq!(math.status, MathStatus::Ok);
        assert_eq!(math.note, "");
    }

    #[test]
    fn empty_record_stays_unknown() {
        let r = reconcile(record(vec![], PaymentInfo::default()));
        assert_eq!(r.payment.subtotal, None);
        assert_eq!(r.payment.total, None);
        let math = r.math.unwrap();
        assert_eq!(math.status, MathStatus::Unknown);
        assert_eq!(math.note, "");
    }

    #[test]
    fn subtotal_without_total_uses_tax_and_tip_defaults() {
        let r = record(
            vec![],
            PaymentInfo {
                subtotal: Some(10.0),
                ..Default::default()
            },
        );
        let r = reconcile(r);
        assert_eq!(r.payment.total, Some(10.0));
        assert_eq!(r.math.unwrap().status, MathStatus::Ok);
    }

    #[test]
    fn tip_participates_in_expected_total() {
        let r = record(
            vec![],
            PaymentInfo {
                subtotal: Some(20.0),
                tax: Some(1.6),
                tip: Some(3.0),
                total: Some(24.6),
                ..Default::default()
            },
        );
        assert_eq!(reconcile(r).math.unwrap().status, MathStatus::Ok);
    }

    #[test]
    fn declared_subtotal_wins_over_items() {
        let r = record(
            vec![item(None, None, Some(99.0))],
            PaymentInfo {
                subtotal: Some(5.0),
                total: Some(5.0),
                ..Default::default()
            },
        );
        let r = reconcile(r);
        assert_eq!(r.payment.subtotal, Some(5.0));
        assert_eq!(r.math.unwrap().status, MathStatus::Ok);
    }

    #[test]
    fn existing_annotation_content_is_merged_into() {
        let mut r = record(vec![], PaymentInfo::default());
        let ann: MathAnnotation =
            serde_json::from_value(json!({"status": "ok", "note": "stale", "engine": "v2"}))
                .unwrap();
        r.math = Some(ann);
        let r = reconcile(r);
        let math = r.math.unwrap();
        // Status and note are overwritten, unknown keys survive.
        assert_eq!(math.status, MathStatus::Unknown);
        assert_eq!(math.note, "");
        assert_eq!(math.extra.get("engine"), Some(&json!("v2")));
    }

    #[test]
    fn no_fields_outside_payment_and_annotation_are_touched() {
        let mut r = record(
            vec![item(Some(1.0), Some(2.0), None)],
            PaymentInfo::default(),
        );
        r.raw_text = "receipt text".into();
        r.vendor.name = Some("STORE".into());
        let before_items = r.items.clone();
        let r = reconcile(r);
        assert_eq!(r.raw_text, "receipt text");
        assert_eq!(r.vendor.name.as_deref(), Some("STORE"));
        assert_eq!(r.items, before_items);
    }
}
