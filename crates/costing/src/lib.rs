//! # Costing Library
//!
//! Prices the elements found on a drawing. Elements get a classification
//! code, quantities are summed per code, each code is priced through a
//! fallback chain and adjusted for the project context, and the priced codes
//! are aggregated with synthetic labor, equipment and overhead into a VAT
//! inclusive breakdown. The result is scored for risk and confidence.
//!
//! All money is `rust_decimal::Decimal` rounded half-up to cents.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use costing::{AggregatorConfig, CostAnalyzer, PriceTable, ProjectContext, RateCard};
//!
//! let prices = PriceTable::from_file("prices.toml")?;
//! let analyzer = CostAnalyzer::new(
//!     Arc::new(prices),
//!     ProjectContext::default(),
//!     RateCard::default(),
//!     AggregatorConfig::default(),
//! );
//! let result = analyzer.analyze(&[], None, None);
//! println!("{} {}", result.total_incl_vat(), result.currency);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod money;
pub mod codes;
pub mod quantity;
pub mod context;
pub mod pricing;
pub mod aggregate;
pub mod risk;
pub mod validation;
pub mod insights;
pub mod analysis;

pub use error::{CostingError, Result};
pub use money::{round_half_up, CURRENCY, MAX_QUANTITY};
pub use codes::{CodeMapper, CodeRule, CODE_RULES};
pub use quantity::{element_quantity, quantities_by_code};
pub use context::{Complexity, ProjectContext, ProjectSize};
pub use pricing::{PriceCategory, PriceEntry, PriceLookup, PriceResolver, PriceSource, PriceTable, ResolvedPrice};
pub use aggregate::{AggregatorConfig, Aggregation, CostAggregator, CostBreakdown, CostCategory, CostItem, RateCard};
pub use risk::{RiskAssessment, RiskLevel};
pub use insights::{MarketComparison, MarketPosition};
pub use analysis::{CostAnalysisResult, CostAnalyzer, DrawingSummary, ReportSummary};

#[cfg(test)]
mod tests {
    use super::*;
    use money::line_total;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use takeoff_common::{Dimensions, DrawingElement, DrawingType, ElementType};

    fn analyzer(context: ProjectContext) -> CostAnalyzer {
        CostAnalyzer::new(
            Arc::new(PriceTable::default()),
            context,
            RateCard::default(),
            AggregatorConfig::default(),
        )
    }

    fn floor_plan_elements() -> Vec<DrawingElement> {
        vec![
            DrawingElement::new(ElementType::Wall, 0.8).with_dimensions(Dimensions::area(120.0)),
            DrawingElement::new(ElementType::Wall, 0.8).with_dimensions(Dimensions::area(80.0)),
            DrawingElement::new(ElementType::Window, 0.7).with_quantity(12.0),
            DrawingElement::new(ElementType::Door, 0.7).with_quantity(6.0).with_material("hout"),
            DrawingElement::new(ElementType::parse("floor"), 0.6)
                .with_dimensions(Dimensions::area(150.0))
                .with_material("beton"),
            DrawingElement::new(ElementType::Column, 0.6),
        ]
    }

    #[test]
    fn test_estimate_reconciles() {
        let context = ProjectContext {
            surface_area: Some(150.0),
            ..Default::default()
        };
        let result = analyzer(context).analyze(
            &floor_plan_elements(),
            Some(&DrawingSummary {
                drawing_type: DrawingType::FloorPlan,
                confidence: 0.8,
                element_count: 6,
            }),
            None,
        );
        let breakdown = &result.breakdown;

        assert!(breakdown.reconciles());
        for item in breakdown.items() {
            assert_eq!(item.total_price, line_total(item.quantity, item.unit_price));
            assert!(item.quantity >= 0.0);
        }
        assert_eq!(
            breakdown.vat_amount,
            round_half_up(breakdown.total_excl_vat * dec!(0.21))
        );
        assert_eq!(result.currency, "EUR");
        assert_eq!(
            result.cost_per_m2,
            Some(round_half_up(breakdown.total_incl_vat / dec!(150)))
        );
        assert!(result.cost_per_m3.is_none());
        assert!(result.data_sources.contains(&"Drawing analysis: floor_plan".to_string()));
        assert!((0.1..=0.95).contains(&result.confidence));
    }

    #[test]
    fn test_codes_prices_and_categories() {
        let result = analyzer(ProjectContext {
            location: "west".to_string(),
            ..Default::default()
        })
        .analyze(&floor_plan_elements(), None, None);

        let material: Vec<(&str, f64)> = result
            .breakdown
            .material_costs
            .iter()
            .map(|i| (i.code.as_str(), i.quantity))
            .collect();
        assert_eq!(
            material,
            vec![("3.2", 150.0), ("4.2", 200.0), ("7.1", 12.0), ("7.2", 6.0), ("99.9", 1.0)]
        );

        let walls = &result.breakdown.material_costs[1];
        assert_eq!(walls.unit_price, dec!(45.00));
        assert_eq!(walls.total_price, dec!(9000.00));
        assert_eq!(walls.source, "exact_match");

        let doors = &result.breakdown.material_costs[3];
        assert_eq!(doors.source, "material_keyword");
        assert_eq!(doors.unit_price, dec!(65.00));

        // 369 in total, medium basket
        let equipment: Vec<&str> = result.breakdown.equipment_costs.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(equipment, vec!["EQP_KRAAN_25T", "EQP_GRAAFMACHINE", "EQP_HOOGWERKER"]);
    }

    #[test]
    fn test_large_total_quantity_hires_large_basket() {
        let elements = vec![DrawingElement::new(ElementType::Wall, 0.8).with_dimensions(Dimensions::area(1500.0))];
        let result = CostAnalyzer::default().analyze(&elements, None, None);

        let crane = result
            .breakdown
            .equipment_costs
            .iter()
            .find(|i| i.code == "EQP_KRAAN_25T")
            .expect("Should hire a crane");
        assert_eq!(crane.quantity, 10.0);
        assert!(result.breakdown.reconciles());
    }

    #[test]
    fn test_malformed_input_degrades_with_warnings() {
        let elements = vec![
            DrawingElement::new(ElementType::Wall, 0.8).with_quantity(-4.0),
            DrawingElement::new(ElementType::Wall, 0.8).with_dimensions(Dimensions::area(f64::NAN)),
        ];
        let result = CostAnalyzer::default().analyze(&elements, None, None);

        assert!(result.breakdown.reconciles());
        assert!(result.breakdown.items().all(|i| i.quantity >= 0.0));
        assert!(
            result.validation_warnings.iter().any(|w| w.contains("invalid and was set to 0")),
            "{:?}",
            result.validation_warnings
        );
    }

    #[test]
    fn test_empty_result() {
        let result = CostAnalysisResult::empty(
            &ProjectContext::default(),
            &AggregatorConfig::default(),
            vec!["no usable elements".to_string()],
        );
        assert_eq!(result.total_incl_vat(), rust_decimal::Decimal::ZERO);
        assert!(result.breakdown.reconciles());
        assert_eq!(result.project_name, "Unnamed Project");
    }

    #[test]
    fn test_result_serializes() {
        let result = CostAnalyzer::default().analyze(&floor_plan_elements(), None, None);
        let json = serde_json::to_value(&result).expect("Should serialize result");
        assert_eq!(json["currency"], "EUR");
        assert!(json["breakdown"]["subtotals"]["material"].is_string());
    }

    #[test]
    fn test_out_of_range_quantity_is_reported() {
        let elements = vec![
            DrawingElement::new(ElementType::Wall, 0.8).with_quantity(1e30),
            DrawingElement::new(ElementType::Window, 0.7).with_quantity(4.0),
        ];
        let result = analyzer(ProjectContext::default()).analyze(&elements, None, None);

        assert!(result.validation_warnings.iter().any(|w| w.contains("exceeds")));
        for item in result.breakdown.items() {
            assert!(item.quantity <= MAX_QUANTITY);
            assert_eq!(item.total_price, line_total(item.quantity, item.unit_price));
        }
        assert!(!result.breakdown.labor_costs.is_empty());
        assert!(result.breakdown.reconciles());
    }

}
