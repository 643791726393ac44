use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use takeoff_common::DrawingElement;

use crate::{
    aggregate::{CostBreakdown, CostCategory},
    money::{is_priceable_quantity, share_percent},
};

const LOW_TOTAL: Decimal = dec!(1000);
const HIGH_TOTAL: Decimal = dec!(1000000);

/// Plausibility warnings for a finished breakdown
pub fn validate_breakdown(breakdown: &CostBreakdown) -> Vec<String> {
    let mut warnings = Vec::new();
    let total = breakdown.total_excl_vat;

    if total < LOW_TOTAL {
        warnings.push("Very low total amount, the takeoff may be incomplete".to_string());
    }
    if total > HIGH_TOTAL {
        warnings.push("Very high total amount, extra review recommended".to_string());
    }

    if total > Decimal::ZERO {
        if share_percent(breakdown.subtotal(CostCategory::Material), total) < dec!(30) {
            warnings.push("Low material share, the design may be labor intensive".to_string());
        }
        if share_percent(breakdown.subtotal(CostCategory::Labor), total) > dec!(50) {
            warnings.push("High labor share, consider efficiency improvements".to_string());
        }
    }

    for item in breakdown.items() {
        let description = item.description.trim();
        if description.is_empty() || description.eq_ignore_ascii_case("unknown") {
            warnings.push(format!("Item without description: {}", item.code));
        }
    }

    warnings
}

/// Warnings for element quantities and dimensions that cannot be measured
pub fn validate_elements(elements: &[DrawingElement]) -> Vec<String> {
    let mut warnings = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        if let Some(quantity) = element.quantity {
            if !is_priceable_quantity(quantity) {
                warnings.push(format!(
                    "Element {index} ({}) has an invalid quantity {quantity}",
                    element.element_type
                ));
            }
        }
        if element.dimensions.is_some_and(|d| d.is_malformed()) {
            warnings.push(format!(
                "Element {index} ({}) has negative or non-finite dimensions",
                element.element_type
            ));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::CostItem;
    use takeoff_common::{Dimensions, ElementType};

    fn item(description: &str, category: CostCategory, total: Decimal) -> CostItem {
        CostItem::new("4.2", description, category, "post", 1.0, total)
    }

    #[test]
    fn test_small_labor_heavy_breakdown() {
        let breakdown = CostBreakdown::from_items(
            vec![item("Binnenwand", CostCategory::Material, dec!(100))],
            vec![item("", CostCategory::Labor, dec!(600))],
            vec![],
            vec![],
            dec!(0.21),
        );

        let warnings = validate_breakdown(&breakdown);
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert!(warnings[0].starts_with("Very low total"));
        assert!(warnings.iter().any(|w| w.starts_with("Low material share")));
        assert!(warnings.iter().any(|w| w.starts_with("High labor share")));
        assert!(warnings.iter().any(|w| w == "Item without description: 4.2"));
    }

    #[test]
    fn test_balanced_breakdown_is_clean() {
        let breakdown = CostBreakdown::from_items(
            vec![item("Binnenwand", CostCategory::Material, dec!(6000))],
            vec![item("Metselaar uren", CostCategory::Labor, dec!(3000))],
            vec![],
            vec![],
            dec!(0.21),
        );
        assert!(validate_breakdown(&breakdown).is_empty());
    }

    #[test]
    fn test_very_high_total() {
        let breakdown = CostBreakdown::from_items(
            vec![item("Ruwbouw", CostCategory::Material, dec!(2000000))],
            vec![],
            vec![],
            vec![],
            dec!(0.21),
        );
        assert_eq!(validate_breakdown(&breakdown), vec!["Very high total amount, extra review recommended"]);
    }

    #[test]
    fn test_malformed_elements() {
        let elements = vec![
            DrawingElement::new(ElementType::Wall, 0.8).with_quantity(-1.0),
            DrawingElement::new(ElementType::Window, 0.8).with_dimensions(Dimensions::area(f64::INFINITY)),
            DrawingElement::new(ElementType::Door, 0.8).with_quantity(2.0),
        ];
        let warnings = validate_elements(&elements);
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Element 0 (wall)"));
        assert!(warnings[1].starts_with("Element 1 (window)"));
    }
}
