use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use takeoff_common::{DrawingElement, DrawingType};
use tracing::info;

use crate::{
    aggregate::{AggregatorConfig, CostAggregator, CostBreakdown, RateCard},
    codes::CodeMapper,
    context::ProjectContext,
    insights::{self, MarketComparison},
    money::CURRENCY,
    pricing::{price_hints, PriceLookup, PriceResolver, PriceTable},
    quantity::quantities_by_code,
    risk::{confidence_score, ConfidenceInputs, RiskAssessment},
    validation::{validate_breakdown, validate_elements},
};

/// What the drawing analysis contributes to a cost estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawingSummary {
    pub drawing_type: DrawingType,
    pub confidence: f64,
    pub element_count: usize,
}

/// Summary of an accompanying report (specification, soil survey, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSummary {
    pub report_type: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysisResult {
    pub project_name: String,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub currency: String,
    pub breakdown: CostBreakdown,
    pub risk: RiskAssessment,
    pub savings_opportunities: Vec<String>,
    pub market_comparison: Vec<MarketComparison>,
    pub cost_per_m2: Option<Decimal>,
    pub cost_per_m3: Option<Decimal>,
    pub validation_warnings: Vec<String>,
    pub confidence: f64,
    pub assumptions: Vec<String>,
    pub data_sources: Vec<String>,
}

impl CostAnalysisResult {
    /// All-zero result for a document that could not be estimated
    pub fn empty(context: &ProjectContext, config: &AggregatorConfig, warnings: Vec<String>) -> Self {
        let breakdown = CostBreakdown::empty(config.vat_percentage);
        Self {
            project_name: context.project_name.clone(),
            reference_number: context.reference_number.clone(),
            created_at: Utc::now(),
            currency: CURRENCY.to_string(),
            risk: RiskAssessment::assess(&breakdown),
            breakdown,
            savings_opportunities: Vec::new(),
            market_comparison: Vec::new(),
            cost_per_m2: None,
            cost_per_m3: None,
            validation_warnings: warnings,
            confidence: 0.0,
            assumptions: Vec::new(),
            data_sources: Vec::new(),
        }
    }

    pub fn total_incl_vat(&self) -> Decimal {
        self.breakdown.total_incl_vat
    }
}

/// Code mapping, pricing, aggregation and scoring for one set of elements
#[derive(Clone)]
pub struct CostAnalyzer {
    mapper: CodeMapper,
    resolver: PriceResolver,
    aggregator: CostAggregator,
}

impl Default for CostAnalyzer {
    fn default() -> Self {
        Self::new(
            Arc::new(PriceTable::default()),
            ProjectContext::default(),
            RateCard::default(),
            AggregatorConfig::default(),
        )
    }
}

impl CostAnalyzer {
    pub fn new(
        prices: Arc<dyn PriceLookup>,
        context: ProjectContext,
        rates: RateCard,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            mapper: CodeMapper::default(),
            resolver: PriceResolver::new(prices, context),
            aggregator: CostAggregator::new(rates, config),
        }
    }

    pub fn with_mapper(mut self, mapper: CodeMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn context(&self) -> &ProjectContext {
        self.resolver.context()
    }

    pub fn config(&self) -> &AggregatorConfig {
        self.aggregator.config()
    }

    pub fn analyze(
        &self,
        elements: &[DrawingElement],
        drawing: Option<&DrawingSummary>,
        report: Option<&ReportSummary>,
    ) -> CostAnalysisResult {
        let mut elements = elements.to_vec();
        self.mapper.assign(&mut elements);

        let quantities = quantities_by_code(&elements);
        let prices = self.resolver.resolve_all(&quantities, &price_hints(&elements));
        let aggregation = self.aggregator.aggregate(&quantities, &prices);
        let breakdown = aggregation.breakdown;

        let mut warnings = aggregation.warnings;
        warnings.extend(validate_elements(&elements));
        warnings.extend(validate_breakdown(&breakdown));

        let confidence = confidence_score(ConfidenceInputs {
            drawing_confidence: drawing.map(|d| d.confidence),
            report_confidence: report.map(|r| r.confidence),
            item_count: breakdown.item_count(),
            warning_count: warnings.len(),
        });

        let context = self.context();
        info!(
            "Estimated {} codes into {} cost items, {} {} incl. VAT",
            quantities.len(),
            breakdown.item_count(),
            breakdown.total_incl_vat,
            CURRENCY
        );

        CostAnalysisResult {
            project_name: context.project_name.clone(),
            reference_number: context.reference_number.clone(),
            created_at: Utc::now(),
            currency: CURRENCY.to_string(),
            risk: RiskAssessment::assess(&breakdown),
            savings_opportunities: insights::savings_opportunities(&breakdown),
            market_comparison: insights::market_comparison(&breakdown),
            cost_per_m2: insights::cost_per_unit(breakdown.total_incl_vat, context.surface_area),
            cost_per_m3: insights::cost_per_unit(breakdown.total_incl_vat, context.volume),
            validation_warnings: warnings,
            confidence,
            assumptions: insights::assumptions(context, self.config()),
            data_sources: insights::data_sources(
                drawing.map(|d| d.drawing_type),
                report.map(|r| r.report_type.as_str()),
            ),
            breakdown,
        }
    }
}
