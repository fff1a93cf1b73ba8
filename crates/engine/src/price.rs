//! Price and quantity resolution for a single position.
//!
//! Resolution never fails: absent fields count as zero, unparseable fields
//! count as zero (price) or one (quantity) and push a [`ParseWarning`].

use crate::model::{ParseWarning, PriceBlock};

/// Parse a document number, accepting a decimal comma.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to two decimal places (kopecks).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Unit price of a work: all five components summed, rounded to kopecks.
pub fn resolve_work_price(
    code: &str,
    block: Option<&PriceBlock>,
    warnings: &mut Vec<ParseWarning>,
) -> f64 {
    let Some(block) = block else {
        return 0.0;
    };
    let total: f64 = block
        .fields()
        .into_iter()
        .map(|(field, raw)| field_value(code, field, raw, warnings))
        .sum();
    round2(total)
}

/// Unit price of a material: the direct-cost (`PZ`) component only.
pub fn resolve_material_price(
    code: &str,
    block: Option<&PriceBlock>,
    warnings: &mut Vec<ParseWarning>,
) -> f64 {
    match block {
        Some(block) => field_value(code, "PZ", block.pz.as_deref(), warnings),
        None => 0.0,
    }
}

/// Quantity of a position; defaults to 1.
pub fn resolve_quantity(code: &str, raw: Option<&str>, warnings: &mut Vec<ParseWarning>) -> f64 {
    match raw {
        None => 1.0,
        Some(value) if value.trim().is_empty() => 1.0,
        Some(value) => match parse_decimal(value) {
            Some(quantity) => quantity,
            None => {
                let warning = ParseWarning::BadQuantity {
                    code: code.to_string(),
                    value: value.to_string(),
                };
                log::warn!("{warning}");
                warnings.push(warning);
                1.0
            }
        },
    }
}

fn field_value(
    code: &str,
    field: &str,
    raw: Option<&str>,
    warnings: &mut Vec<ParseWarning>,
) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    if raw.trim().is_empty() {
        return 0.0;
    }
    match parse_decimal(raw) {
        Some(value) => value,
        None => {
            let warning = ParseWarning::BadPriceField {
                code: code.to_string(),
                field: field.to_string(),
                value: raw.to_string(),
            };
            log::warn!("{warning}");
            warnings.push(warning);
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pairs: &[(&str, &str)]) -> PriceBlock {
        let mut block = PriceBlock::default();
        for (name, value) in pairs {
            block.set(name, value.to_string());
        }
        block
    }

    #[test]
    fn decimal_comma() {
        assert_eq!(parse_decimal("10,5"), Some(10.5));
        assert_eq!(parse_decimal(" 3.25 "), Some(3.25));
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn work_price_sums_all_fields() {
        let mut warnings = Vec::new();
        let b = block(&[("PZ", "10,5"), ("OZ", "1"), ("EM", "2,25"), ("ZM", "0,1"), ("MT", "4")]);
        assert_eq!(resolve_work_price("ФЕР", Some(&b), &mut warnings), 17.85);
        assert!(warnings.is_empty());
    }

    #[test]
    fn work_price_missing_fields_are_zero() {
        let mut warnings = Vec::new();
        let b = block(&[("PZ", "10,5"), ("OZ", "0")]);
        assert_eq!(resolve_work_price("ФЕР", Some(&b), &mut warnings), 10.5);
        assert_eq!(resolve_work_price("ФЕР", None, &mut warnings), 0.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn work_price_bad_field_is_zero_with_warning() {
        let mut warnings = Vec::new();
        let b = block(&[("PZ", "12"), ("OZ", "n/a"), ("MT", "3")]);
        assert_eq!(resolve_work_price("ФЕР01", Some(&b), &mut warnings), 15.0);
        assert_eq!(
            warnings,
            vec![ParseWarning::BadPriceField {
                code: "ФЕР01".into(),
                field: "OZ".into(),
                value: "n/a".into(),
            }]
        );
    }

    #[test]
    fn work_price_rounds_to_kopecks() {
        let mut warnings = Vec::new();
        let b = block(&[("PZ", "0,004"), ("OZ", "0,003")]);
        assert_eq!(resolve_work_price("ФЕР", Some(&b), &mut warnings), 0.01);
    }

    #[test]
    fn material_price_uses_direct_cost_only() {
        let mut warnings = Vec::new();
        let b = block(&[("PZ", "7,125"), ("OZ", "100"), ("MT", "bogus")]);
        assert_eq!(resolve_material_price("ФССЦ", Some(&b), &mut warnings), 7.125);
        // other fields are never read, so no warning for MT
        assert!(warnings.is_empty());
        assert_eq!(resolve_material_price("ФССЦ", None, &mut warnings), 0.0);
    }

    #[test]
    fn quantity_defaults() {
        let mut warnings = Vec::new();
        assert_eq!(resolve_quantity("x", None, &mut warnings), 1.0);
        assert_eq!(resolve_quantity("x", Some(""), &mut warnings), 1.0);
        assert_eq!(resolve_quantity("x", Some("2,5"), &mut warnings), 2.5);
        assert!(warnings.is_empty());
        assert_eq!(resolve_quantity("x", Some("много"), &mut warnings), 1.0);
        assert_eq!(warnings.len(), 1);
    }
}
