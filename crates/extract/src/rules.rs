use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use invex_core::{ExtractionResult, PaymentInfo, VendorMetadata};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Amount captures admit `O` alongside digits: thermal-paper scans routinely
// read zeros as the letter O, and the label regexes see the text before any
// cleanup.
re!(re_total_label,
    r"(?i)\b(?:total|grand\s+total|amount\s+due|balance\s+due|total\s+due)\s*[:\$]?\s*\$?\s*([\dO,]+(?:\.[\dO]{1,2})?)");
// The subtotal label itself gets mangled often enough ("Subtota", "Subiotat")
// that the pattern accepts the common degradations.
re!(re_subtotal,
    r"(?i)\b(?:sub\s*to?t?a?l|subio?tat)\s*[:\$]?\s*\$?\s*([\dO,]+(?:\.[\dO]{1,2})?)");
re!(re_tax,
    r"(?i)\b(?:tax|hst|gst|pst|vat|sales\s*tax)\b\s*[:\$]?\s*\$?\s*([\dO,]+(?:\.[\dO]{1,2})?)");
re!(re_tip,
    r"(?i)\b(?:tip|gratuity)\b\s*[:\$]?\s*\$?\s*([\dO,]+(?:\.[\dO]{1,2})?)");

re!(re_invoice_no,
    r"(?i)\binvoice\b\s*(?:no\.?|#)?\s*[:\s\-]\s*([A-Za-z0-9.\-]+)");

re!(re_payment,
    r"(?i)\b(visa|mastercard|master\s*card|amex|american\s+express|discover|cash|debit|check|cheque|upi)\b");

re!(re_date_month_name,
    r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b");
re!(re_date_iso,
    r"\b(\d{4})-(\d{2})-(\d{2})\b");
re!(re_date_slash,
    r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b");

re!(re_time,
    r"\b(\d{1,2}:\d{2}(?::\d{2})?\s*(?:[AaPp][Mm])?)\b");
re!(re_phone,
    r"\(?\d{3}\)?[\s\-]\d{3}[\s\-]\d{4}");
re!(re_url,
    r"(?i)(https?://|www\.)\S+");

// ── Rule-based extraction ─────────────────────────────────────────────────────

/// Regex extraction over raw OCR text. The cheap, offline path: it fills the
/// vendor block and labeled payment amounts but produces no line items, so
/// reconciliation against item sums only kicks in on the LLM path.
pub struct RuleExtractor;

impl RuleExtractor {
    pub fn extract(text: &str) -> ExtractionResult {
        ExtractionResult {
            vendor: VendorMetadata {
                name: extract_vendor(text),
                address: None,
                phone: re_phone().find(text).map(|m| m.as_str().to_string()),
                date: extract_date(text),
                time: extract_time(text),
                website: re_url().find(text).map(|m| m.as_str().to_string()),
                invoice_no: extract_invoice_no(text),
            },
            items: vec![],
            payment: PaymentInfo {
                method: extract_payment_line(text),
                subtotal: labeled_amount(re_subtotal(), text),
                tax: labeled_amount(re_tax(), text),
                tip: labeled_amount(re_tip(), text),
                total: labeled_amount(re_total_label(), text),
                ..Default::default()
            },
            raw_text: text.to_string(),
            math: None,
        }
    }
}

// ── Vendor ────────────────────────────────────────────────────────────────────

/// The store name is usually an early, short, all-caps line that is not a
/// phone number, URL, date, or address.
fn extract_vendor(text: &str) -> Option<String> {
    text.lines()
        .take(10)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !re_phone().is_match(l))
        .filter(|l| !re_url().is_match(l))
        .filter(|l| !re_date_slash().is_match(l) && !re_date_iso().is_match(l))
        .filter(|l| {
            !re_total_label().is_match(l) && !re_subtotal().is_match(l) && !re_tax().is_match(l)
        })
        .filter(|l| !re_invoice_no().is_match(l) && !re_payment().is_match(l))
        .filter(|l| l.len() >= 3 && l.len() <= 50)
        .filter(|l| !l.starts_with(|c: char| c.is_ascii_digit()))
        .max_by_key(|l| {
            let all_caps = l.chars().filter(|c| c.is_alphabetic()).all(|c| c.is_uppercase());
            (if all_caps { 10i32 } else { 0 }) + (l.len() as i32).min(20)
        })
        .map(str::to_string)
}

fn extract_invoice_no(text: &str) -> Option<String> {
    let c = re_invoice_no().captures(text)?;
    Some(c.get(1)?.as_str().to_uppercase())
}

// ── Date / time ───────────────────────────────────────────────────────────────

/// First recognizable date, normalized to ISO (`YYYY-MM-DD`).
fn extract_date(text: &str) -> Option<String> {
    let date = try_date_iso(text)
        .or_else(|| try_date_month_name(text))
        .or_else(|| try_date_slash(text))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn extract_time(text: &str) -> Option<String> {
    let c = re_time().captures(text)?;
    Some(c.get(1)?.as_str().to_string())
}

fn try_date_iso(text: &str) -> Option<NaiveDate> {
    let c = re_date_iso().captures(text)?;
    let y: i32 = c.get(1)?.as_str().parse().ok()?;
    let m: u32 = c.get(2)?.as_str().parse().ok()?;
    let d: u32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn try_date_month_name(text: &str) -> Option<NaiveDate> {
    let c = re_date_month_name().captures(text)?;
    let month = month_name_to_num(c.get(1)?.as_str())?;
    let day: u32 = c.get(2)?.as_str().parse().ok()?;
    let year: i32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn try_date_slash(text: &str) -> Option<NaiveDate> {
    let c = re_date_slash().captures(text)?;
    let p1: u32 = c.get(1)?.as_str().parse().ok()?;
    let p2: u32 = c.get(2)?.as_str().parse().ok()?;
    let year: i32 = expand_year(c.get(3)?.as_str().parse().ok()?);
    // Assume MM/DD/YYYY (US format)
    NaiveDate::from_ymd_opt(year, p1, p2)
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

fn month_name_to_num(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "january" => Some(1), "february" => Some(2), "march" => Some(3),
        "april" => Some(4), "may" => Some(5), "june" => Some(6),
        "july" => Some(7), "august" => Some(8), "september" => Some(9),
        "october" => Some(10), "november" => Some(11), "december" => Some(12),
        _ => None,
    }
}

// ── Amounts ───────────────────────────────────────────────────────────────────

fn labeled_amount(re: &Regex, text: &str) -> Option<f64> {
    let c = re.captures(text)?;
    parse_amount(c.get(1)?.as_str())
}

/// Parse a printed amount exactly, then convert. Comma thousands are
/// tolerated and the letter O is read as zero before parsing.
fn parse_amount(s: &str) -> Option<f64> {
    let clean = s.replace(',', "").replace(['O', 'o'], "0");
    let dec = Decimal::from_str(&clean).ok()?;
    dec.to_f64().filter(|v| v.is_finite())
}

// ── Payment method ────────────────────────────────────────────────────────────

/// Keep the whole line around the card keyword — it usually carries the
/// masked number ("VISA ****1111"), which is worth surfacing.
fn extract_payment_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| re_payment().is_match(l))
        .map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIPT: &str = "MOCK STORE\nInvoice: INV-001\n01/15/2024 10:45 AM\n2x Widget @ 3.50\nSubtotal: 7.00\nTax: 0.63\nTotal: 7.63\nPaid: VISA ****1111";

    #[test]
    fn extracts_labeled_amounts() {
        let r = RuleExtractor::extract(RECEIPT);
        assert_eq!(r.payment.subtotal, Some(7.0));
        assert_eq!(r.payment.tax, Some(0.63));
        assert_eq!(r.payment.total, Some(7.63));
        assert_eq!(r.payment.tip, None);
    }

    #[test]
    fn extracts_vendor_invoice_and_method() {
        let r = RuleExtractor::extract(RECEIPT);
        assert_eq!(r.vendor.name.as_deref(), Some("MOCK STORE"));
        assert_eq!(r.vendor.invoice_no.as_deref(), Some("INV-001"));
        assert_eq!(r.payment.method.as_deref(), Some("Paid: VISA ****1111"));
    }

    #[test]
    fn extracts_date_and_time() {
        let r = RuleExtractor::extract(RECEIPT);
        assert_eq!(r.vendor.date.as_deref(), Some("2024-01-15"));
        assert_eq!(r.vendor.time.as_deref(), Some("10:45 AM"));
    }

    #[test]
    fn raw_text_is_copied_verbatim() {
        let r = RuleExtractor::extract(RECEIPT);
        assert_eq!(r.raw_text, RECEIPT);
    }

    #[test]
    fn rule_path_produces_no_items() {
        assert!(RuleExtractor::extract(RECEIPT).items.is_empty());
    }

    #[test]
    fn vendor_all_caps_preferred() {
        let text = "123 Main Street\nSTARBUCKS COFFEE\n2024-01-15\nTotal $5.50";
        let r = RuleExtractor::extract(text);
        assert_eq!(r.vendor.name.as_deref(), Some("STARBUCKS COFFEE"));
    }

    #[test]
    fn vendor_skips_phone_and_url() {
        let text = "(555) 123-4567\nwww.wholefoods.com\nWHOLE FOODS\nTotal $42.00";
        let r = RuleExtractor::extract(text);
        assert_eq!(r.vendor.name.as_deref(), Some("WHOLE FOODS"));
        assert_eq!(r.vendor.phone.as_deref(), Some("(555) 123-4567"));
        assert_eq!(r.vendor.website.as_deref(), Some("www.wholefoods.com"));
    }

    #[test]
    fn total_with_comma_thousands() {
        let r = RuleExtractor::extract("STORE\nTotal $1,234.56");
        assert_eq!(r.payment.total, Some(1234.56));
    }

    #[test]
    fn amount_due_counts_as_total() {
        let r = RuleExtractor::extract("STORE\nAmount Due: $19.99");
        assert_eq!(r.payment.total, Some(19.99));
    }

    #[test]
    fn subtotal_line_does_not_shadow_total() {
        let r = RuleExtractor::extract("STORE\nSubtotal $45.00\nTax $3.60\nTotal $48.60");
        assert_eq!(r.payment.subtotal, Some(45.0));
        assert_eq!(r.payment.tax, Some(3.6));
        assert_eq!(r.payment.total, Some(48.6));
    }

    #[test]
    fn tip_line_is_captured() {
        let r = RuleExtractor::extract("DINER\nSubtotal 20.00\nTip 3.00\nTotal 23.00");
        assert_eq!(r.payment.tip, Some(3.0));
    }

    #[test]
    fn ocr_noise_reads_letter_o_as_zero() {
        let r = RuleExtractor::extract("STORE\nSubTotal: 7.OO\nTax: O.63\nTotal: 7.63");
        assert_eq!(r.payment.subtotal, Some(7.0));
        assert_eq!(r.payment.tax, Some(0.63));
        assert_eq!(r.payment.total, Some(7.63));
    }

    #[test]
    fn mangled_subtotal_label_still_matches() {
        let r = RuleExtractor::extract("STORE\nSubiotat 7.00\nTotal 7.63");
        assert_eq!(r.payment.subtotal, Some(7.0));
    }

    #[test]
    fn dropped_letters_in_subtotal_label_still_match() {
        let r = RuleExtractor::extract("STORE\nSubtotl: 12.50\nTotal 12.50");
        assert_eq!(r.payment.subtotal, Some(12.5));
    }

    #[test]
    fn month_name_date_is_normalized() {
        let r = RuleExtractor::extract("WHOLE FOODS\nDate: March 15, 2024\nTotal $87.50");
        assert_eq!(r.vendor.date.as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn missing_fields_stay_absent() {
        let r = RuleExtractor::extract("just some text");
        assert_eq!(r.payment.subtotal, None);
        assert_eq!(r.payment.total, None);
        assert_eq!(r.vendor.invoice_no, None);
        assert_eq!(r.payment.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = RuleExtractor::extract("!@#$%^&*()\n\0\x01\x02");
        let _ = RuleExtractor::extract("");
    }
}
