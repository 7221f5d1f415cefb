//! Quotation pricing: seeding lines from an inquiry, applying a bulk price
//! sheet or per-material prices, and the checks a draft must pass before it
//! goes to the collaborator. Totals are always recomputed here; a caller's
//! `total_price` is never trusted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::errors::WorkflowError;
use crate::models::{Inquiry, PricedPart, QuotationDraft};

/// Terms applied when the estimator does not override them.
pub const DEFAULT_TERMS: &str =
    "Standard manufacturing terms apply. Payment required before production begins.";

/// How long a quotation stays open by default.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// Turns an inquiry's requested parts into priceable lines with unit prices
/// left at zero for the estimator to fill in. Parts without a reference get
/// a `material thickness` placeholder.
pub fn seed_parts(inquiry: &Inquiry) -> Vec<PricedPart> {
    inquiry
        .parts
        .iter()
        .map(|part| PricedPart {
            part_ref: part
                .part_ref
                .clone()
                .unwrap_or_else(|| format!("{} {}", part.material, part.thickness)),
            material: part.material.clone(),
            thickness: part.thickness.clone(),
            grade: part.grade.clone(),
            quantity: part.quantity,
            unit_price: Decimal::ZERO,
            total_price: Decimal::ZERO,
            remarks: part.remarks.clone(),
        })
        .collect()
}

/// Recomputes every line total from its unit price and returns the sum.
pub fn reprice(parts: &mut [PricedPart]) -> Decimal {
    let mut total = Decimal::ZERO;
    for part in parts.iter_mut() {
        part.total_price = part.line_total();
        total += part.total_price;
    }
    total
}

/// Assembles a draft from priced lines. Line and grand totals are recomputed,
/// and terms/validity fall back to [`DEFAULT_TERMS`] and
/// [`DEFAULT_VALIDITY_DAYS`] from `now`.
pub fn build_draft(
    inquiry_ref: Uuid,
    mut parts: Vec<PricedPart>,
    terms: Option<String>,
    notes: Option<String>,
    valid_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QuotationDraft {
    let total_amount = reprice(&mut parts);
    QuotationDraft {
        inquiry_ref,
        parts,
        total_amount,
        terms: terms
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TERMS.to_owned()),
        notes: notes.filter(|n| !n.trim().is_empty()),
        valid_until: valid_until.unwrap_or_else(|| now + Duration::days(DEFAULT_VALIDITY_DAYS)),
    }
}

/// The checks a draft must pass before creation. Messages match what
/// back-office operators already see in the web form.
pub fn validate_draft(draft: &QuotationDraft) -> Result<(), WorkflowError> {
    if draft.parts.is_empty() {
        return Err(WorkflowError::ValidationError(
            "Please add at least one part".into(),
        ));
    }
    if draft
        .parts
        .iter()
        .any(|part| part.unit_price <= Decimal::ZERO)
    {
        return Err(WorkflowError::ValidationError(
            "Please enter valid unit prices for all parts".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct SheetRow {
    part_ref: String,
    material: String,
    unit_price: Decimal,
}

/// A parsed bulk price sheet: one `part_ref,material,unit_price` row per
/// line. Lookups match on part reference and material, trimmed and
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct PriceSheet {
    rows: Vec<SheetRow>,
    /// 1-based line numbers that could not be parsed as a price row.
    pub skipped_lines: Vec<usize>,
}

impl PriceSheet {
    /// Parses CSV text. A first line whose price column is not a number is
    /// treated as the header and dropped silently; any other malformed line
    /// is recorded in `skipped_lines`. Blank lines are ignored.
    pub fn parse(text: &str) -> Self {
        let mut sheet = PriceSheet::default();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_row(line) {
                Some(row) => sheet.rows.push(row),
                None if index == 0 => {}
                None => sheet.skipped_lines.push(index + 1),
            }
        }
        sheet
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The sheet price for a part, if any row matches.
    pub fn lookup(&self, part_ref: &str, material: &str) -> Option<Decimal> {
        let part_ref = part_ref.trim();
        let material = material.trim();
        self.rows
            .iter()
            .find(|row| {
                row.part_ref.eq_ignore_ascii_case(part_ref)
                    && row.material.eq_ignore_ascii_case(material)
            })
            .map(|row| row.unit_price)
    }

    /// Applies the sheet to `parts`, repricing every line that matches a row.
    /// Returns how many lines were priced; lines without a match keep their
    /// current price.
    pub fn apply(&self, parts: &mut [PricedPart]) -> Result<usize, WorkflowError> {
        if self.rows.is_empty() {
            return Err(WorkflowError::ValidationError(
                "No pricing data available".into(),
            ));
        }
        let mut priced = 0;
        for part in parts.iter_mut() {
            if let Some(price) = self.lookup(&part.part_ref, &part.material) {
                part.unit_price = price;
                part.total_price = part.line_total();
                priced += 1;
            }
        }
        Ok(priced)
    }
}

fn parse_row(line: &str) -> Option<SheetRow> {
    let mut columns = line.split(',');
    let part_ref = columns.next()?.trim();
    let material = columns.next()?.trim();
    let unit_price: Decimal = columns.next()?.trim().parse().ok()?;
    if part_ref.is_empty() || material.is_empty() {
        return None;
    }
    Some(SheetRow {
        part_ref: part_ref.to_owned(),
        material: material.to_owned(),
        unit_price,
    })
}

fn material_price(prices: &HashMap<String, Decimal>, material: &str) -> Option<Decimal> {
    let material = material.trim();
    prices
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(material))
        .map(|(_, price)| *price)
}

/// Prices every line by its material. Each material appearing in `parts`
/// must have a positive price; otherwise the missing materials are reported
/// in first-appearance order. Returns how many lines were priced.
pub fn apply_material_prices(
    parts: &mut [PricedPart],
    prices: &HashMap<String, Decimal>,
) -> Result<usize, WorkflowError> {
    if !prices.values().any(|price| *price > Decimal::ZERO) {
        return Err(WorkflowError::ValidationError(
            "Please enter at least one material price before applying".into(),
        ));
    }

    let mut missing: Vec<String> = Vec::new();
    for part in parts.iter() {
        let covered = matches!(
            material_price(prices, &part.material),
            Some(price) if price > Decimal::ZERO
        );
        if !covered && !missing.iter().any(|m| m == &part.material) {
            missing.push(part.material.clone());
        }
    }
    if !missing.is_empty() {
        return Err(WorkflowError::ValidationError(format!(
            "Please enter prices for: {}",
            missing.join(", ")
        )));
    }

    let mut priced = 0;
    for part in parts.iter_mut() {
        if let Some(price) = material_price(prices, &part.material) {
            part.unit_price = price;
            part.total_price = part.line_total();
            priced += 1;
        }
    }
    Ok(priced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PartSpec;
    use rust_decimal_macros::dec;

    fn line(part_ref: &str, material: &str, quantity: u32) -> PricedPart {
        PricedPart {
            part_ref: part_ref.into(),
            material: material.into(),
            thickness: "1.5".into(),
            grade: None,
            quantity,
            unit_price: Decimal::ZERO,
            total_price: Decimal::ZERO,
            remarks: None,
        }
    }

    #[test]
    fn seeding_keeps_quantities_and_zeroes_prices() {
        let inquiry = Inquiry {
            id: Uuid::new_v4(),
            customer_ref: Uuid::new_v4(),
            parts: vec![
                PartSpec {
                    part_ref: Some("BRK-100".into()),
                    material: "Zintec".into(),
                    thickness: "1.5".into(),
                    grade: None,
                    quantity: 10,
                    remarks: None,
                },
                PartSpec {
                    part_ref: None,
                    material: "Stainless Steel".into(),
                    thickness: "2.0".into(),
                    grade: Some("304".into()),
                    quantity: 4,
                    remarks: None,
                },
            ],
            files: vec![],
            status: crate::models::InquiryStatus::Pending,
            quotation_ref: None,
            version: None,
            created_at: Utc::now(),
            updated_at: None,
        };

        let parts = seed_parts(&inquiry);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part_ref, "BRK-100");
        assert_eq!(parts[0].quantity, 10);
        assert_eq!(parts[0].unit_price, Decimal::ZERO);
        // No reference on the wire: fall back to material + thickness.
        assert_eq!(parts[1].part_ref, "Stainless Steel 2.0");
    }

    #[test]
    fn build_draft_recomputes_totals_and_fills_defaults() {
        let now = Utc::now();
        let mut part = line("BRK-100", "Zintec", 10);
        part.unit_price = dec!(12.50);
        part.total_price = dec!(999.99); // stale, must be recomputed

        let draft = build_draft(Uuid::new_v4(), vec![part], None, None, None, now);
        assert_eq!(draft.parts[0].total_price, dec!(125.00));
        assert_eq!(draft.total_amount, dec!(125.00));
        assert_eq!(draft.terms, DEFAULT_TERMS);
        assert_eq!(draft.valid_until, now + Duration::days(30));
        assert!(draft.notes.is_none());
    }

    #[test]
    fn draft_needs_at_least_one_part() {
        let draft = build_draft(Uuid::new_v4(), vec![], None, None, None, Utc::now());
        let err = validate_draft(&draft).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Please add at least one part");
    }

    #[test]
    fn draft_refuses_unpriced_lines() {
        let mut priced = line("BRK-100", "Zintec", 10);
        priced.unit_price = dec!(12.50);
        let unpriced = line("BRK-200", "Zintec", 5);

        let draft = build_draft(
            Uuid::new_v4(),
            vec![priced, unpriced],
            None,
            None,
            None,
            Utc::now(),
        );
        let err = validate_draft(&draft).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Please enter valid unit prices for all parts"
        );
    }

    #[test]
    fn sheet_parses_header_blanks_and_bad_rows() {
        let sheet = PriceSheet::parse(
            "Part Ref,Material,Unit Price\n\
             BRK-100, Zintec ,12.50\n\
             \n\
             BRK-200,Stainless Steel\n\
             BRK-300,Zintec,not-a-price\n\
             BRK-400,Aluminium,3.75\n",
        );
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.skipped_lines, vec![4, 5]);
        assert_eq!(sheet.lookup("brk-100", "zintec"), Some(dec!(12.50)));
    }

    #[test]
    fn sheet_apply_matches_case_insensitively_and_counts() {
        let sheet = PriceSheet::parse(
            "part_ref,material,unit_price\n\
             BRK-100,ZINTEC,12.50\n",
        );
        let mut parts = vec![line("brk-100", "Zintec", 10), line("BRK-999", "Zintec", 2)];

        let priced = sheet.apply(&mut parts).unwrap();
        assert_eq!(priced, 1);
        assert_eq!(parts[0].unit_price, dec!(12.50));
        assert_eq!(parts[0].total_price, dec!(125.00));
        // Unmatched lines keep their price untouched.
        assert_eq!(parts[1].unit_price, Decimal::ZERO);
    }

    #[test]
    fn empty_sheet_refuses_to_apply() {
        let sheet = PriceSheet::parse("part_ref,material,unit_price\n");
        let mut parts = vec![line("BRK-100", "Zintec", 10)];
        let err = sheet.apply(&mut parts).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: No pricing data available");
    }

    #[test]
    fn material_prices_must_cover_every_material() {
        let mut parts = vec![
            line("BRK-100", "Zintec", 10),
            line("BRK-200", "Stainless Steel", 4),
            line("BRK-300", "Stainless Steel", 2),
        ];
        let mut prices = HashMap::new();
        prices.insert("Zintec".to_owned(), dec!(10.00));

        let err = apply_material_prices(&mut parts, &prices).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Please enter prices for: Stainless Steel"
        );

        prices.insert("stainless steel".to_owned(), dec!(22.00));
        let priced = apply_material_prices(&mut parts, &prices).unwrap();
        assert_eq!(priced, 3);
        assert_eq!(parts[1].unit_price, dec!(22.00));
        assert_eq!(parts[2].total_price, dec!(44.00));
    }

    #[test]
    fn material_prices_need_at_least_one_positive_entry() {
        let mut parts = vec![line("BRK-100", "Zintec", 10)];
        let mut prices = HashMap::new();
        prices.insert("Zintec".to_owned(), Decimal::ZERO);

        let err = apply_material_prices(&mut parts, &prices).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Please enter at least one material price before applying"
        );
    }
}
