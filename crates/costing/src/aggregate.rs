//! Cost items, synthetic labor and equipment, overhead and VAT.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, IntoEnumIterator};
use takeoff_common::ClassificationCode;
use tracing::{debug, warn};

use crate::{
    money::{decimal_from_f64, is_priceable_quantity, line_total, round_half_up, MAX_QUANTITY},
    pricing::{PriceCategory, ResolvedPrice},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CostCategory {
    Material,
    Labor,
    Equipment,
    Overhead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostItem {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub quantity: f64,
    pub unit_price: Decimal,
    /// Always `round_half_up(quantity × unit_price)`
    pub total_price: Decimal,
    pub category: CostCategory,
    pub source: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl CostItem {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        category: CostCategory,
        unit: impl Into<String>,
        quantity: f64,
        unit_price: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            unit: unit.into(),
            quantity,
            unit_price,
            total_price: line_total(quantity, unit_price),
            category,
            source: String::new(),
            confidence: 0.8,
            notes: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Cost items per category with subtotals and VAT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub material_costs: Vec<CostItem>,
    pub labor_costs: Vec<CostItem>,
    pub equipment_costs: Vec<CostItem>,
    pub overhead_costs: Vec<CostItem>,
    pub subtotals: BTreeMap<CostCategory, Decimal>,
    pub vat_percentage: Decimal,
    pub vat_amount: Decimal,
    pub total_excl_vat: Decimal,
    pub total_incl_vat: Decimal,
}

fn sum_totals(items: &[CostItem]) -> Decimal {
    items.iter().map(|item| item.total_price).sum()
}

impl CostBreakdown {
    /// Subtotals and totals from the four item lists. VAT is rounded to
    /// cents.
    pub fn from_items(
        material_costs: Vec<CostItem>,
        labor_costs: Vec<CostItem>,
        equipment_costs: Vec<CostItem>,
        overhead_costs: Vec<CostItem>,
        vat_percentage: Decimal,
    ) -> Self {
        let subtotals: BTreeMap<CostCategory, Decimal> = [
            (CostCategory::Material, sum_totals(&material_costs)),
            (CostCategory::Labor, sum_totals(&labor_costs)),
            (CostCategory::Equipment, sum_totals(&equipment_costs)),
            (CostCategory::Overhead, sum_totals(&overhead_costs)),
        ]
        .into_iter()
        .collect();

        let total_excl_vat: Decimal = subtotals.values().copied().sum();
        let vat_amount = round_half_up(total_excl_vat * vat_percentage);

        Self {
            material_costs,
            labor_costs,
            equipment_costs,
            overhead_costs,
            subtotals,
            vat_percentage,
            vat_amount,
            total_excl_vat,
            total_incl_vat: total_excl_vat + vat_amount,
        }
    }

    /// All-zero breakdown
    pub fn empty(vat_percentage: Decimal) -> Self {
        Self::from_items(Vec::new(), Vec::new(), Vec::new(), Vec::new(), vat_percentage)
    }

    pub fn items_in(&self, category: CostCategory) -> &[CostItem] {
        match category {
            CostCategory::Material => &self.material_costs,
            CostCategory::Labor => &self.labor_costs,
            CostCategory::Equipment => &self.equipment_costs,
            CostCategory::Overhead => &self.overhead_costs,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &CostItem> {
        CostCategory::iter().flat_map(|category| self.items_in(category).iter())
    }

    pub fn item_count(&self) -> usize {
        CostCategory::iter().map(|category| self.items_in(category).len()).sum()
    }

    pub fn subtotal(&self, category: CostCategory) -> Decimal {
        self.subtotals.get(&category).copied().unwrap_or(Decimal::ZERO)
    }

    /// Totals add up and every line total matches its quantity and price
    pub fn reconciles(&self) -> bool {
        let subtotals_match = CostCategory::iter()
            .all(|category| self.subtotal(category) == sum_totals(self.items_in(category)));
        let lines_match = self
            .items()
            .all(|item| item.total_price == line_total(item.quantity, item.unit_price));

        subtotals_match
            && lines_match
            && self.total_excl_vat == self.subtotals.values().copied().sum::<Decimal>()
            && self.total_incl_vat == self.total_excl_vat + self.vat_amount
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LaborShare {
    pub role: String,
    pub share: Decimal,
}

/// Equipment days for projects whose total quantity exceeds `above`.
/// A basket without a threshold always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EquipmentBasket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,
    pub days: Vec<(String, u32)>,
}

impl EquipmentBasket {
    fn applies_to(&self, total_quantity: f64) -> bool {
        self.above.is_none_or(|threshold| total_quantity > threshold)
    }
}

fn basket(above: Option<f64>, days: &[(&str, u32)]) -> EquipmentBasket {
    EquipmentBasket {
        above,
        days: days.iter().map(|(name, d)| (name.to_string(), *d)).collect(),
    }
}

/// Hourly labor rates and daily equipment rental rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RateCard {
    pub labor_rates: BTreeMap<String, Decimal>,
    pub default_labor_rate: Decimal,
    /// Labor hours per unit of total quantity
    pub hours_per_quantity: Decimal,
    pub labor_distribution: Vec<LaborShare>,
    pub equipment_rates: BTreeMap<String, Decimal>,
    pub default_equipment_rate: Decimal,
    /// Checked in order, first applicable wins
    pub equipment_baskets: Vec<EquipmentBasket>,
}

impl Default for RateCard {
    fn default() -> Self {
        let labor_rates = [
            ("metselaar", dec!(55.00)),
            ("timmerman", dec!(52.00)),
            ("betonvlechter", dec!(48.00)),
            ("kraanmachinist", dec!(65.00)),
            ("algemeen_bouwarbeider", dec!(42.00)),
        ];
        let equipment_rates = [
            ("kraan_25t", dec!(850.00)),
            ("graafmachine", dec!(450.00)),
            ("betonpomp", dec!(600.00)),
            ("hoogwerker", dec!(185.00)),
        ];
        let distribution = [
            ("metselaar", dec!(0.30)),
            ("timmerman", dec!(0.25)),
            ("algemeen_bouwarbeider", dec!(0.45)),
        ];

        Self {
            labor_rates: labor_rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            default_labor_rate: dec!(50.00),
            hours_per_quantity: dec!(0.01),
            labor_distribution: distribution
                .iter()
                .map(|(role, share)| LaborShare { role: role.to_string(), share: *share })
                .collect(),
            equipment_rates: equipment_rates.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            default_equipment_rate: dec!(300.00),
            equipment_baskets: vec![
                basket(Some(1000.0), &[("kraan_25t", 10), ("graafmachine", 15), ("hoogwerker", 20)]),
                basket(Some(100.0), &[("kraan_25t", 5), ("graafmachine", 8), ("hoogwerker", 10)]),
                basket(None, &[("graafmachine", 3), ("hoogwerker", 5)]),
            ],
        }
    }
}

impl RateCard {
    pub fn labor_rate(&self, role: &str) -> Decimal {
        self.labor_rates.get(role).copied().unwrap_or(self.default_labor_rate)
    }

    pub fn equipment_rate(&self, equipment: &str) -> Decimal {
        self.equipment_rates
            .get(equipment)
            .copied()
            .unwrap_or(self.default_equipment_rate)
    }

    pub fn basket_for(&self, total_quantity: f64) -> Option<&EquipmentBasket> {
        self.equipment_baskets.iter().find(|b| b.applies_to(total_quantity))
    }
}

/// VAT and overhead percentages, as fractions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AggregatorConfig {
    pub vat_percentage: Decimal,
    pub project_management: Decimal,
    pub general_overhead: Decimal,
    pub profit: Decimal,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            vat_percentage: dec!(0.21),
            project_management: dec!(0.10),
            general_overhead: dec!(0.06),
            profit: dec!(0.10),
        }
    }
}

/// A breakdown plus the anomalies met while building it
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub breakdown: CostBreakdown,
    pub warnings: Vec<String>,
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct CostAggregator {
    rates: RateCard,
    config: AggregatorConfig,
}

impl CostAggregator {
    pub fn new(rates: RateCard, config: AggregatorConfig) -> Self {
        Self { rates, config }
    }

    pub fn rates(&self) -> &RateCard {
        &self.rates
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Clamp negative or non-finite quantities to zero
    fn sanitize(
        quantities: &BTreeMap<ClassificationCode, f64>,
        warnings: &mut Vec<String>,
    ) -> BTreeMap<ClassificationCode, f64> {
        quantities
            .iter()
            .map(|(code, &quantity)| {
                if is_priceable_quantity(quantity) {
                    (code.clone(), quantity)
                } else {
                    let message = if quantity > MAX_QUANTITY {
                        format!("Quantity {quantity} for code {code} exceeds {MAX_QUANTITY} and was set to 0")
                    } else {
                        format!("Quantity {quantity} for code {code} is invalid and was set to 0")
                    };
                    warn!("{}", message);
                    warnings.push(message);
                    (code.clone(), 0.0)
                }
            })
            .collect()
    }

    fn priced_item(price: &ResolvedPrice, quantity: f64) -> CostItem {
        let category = match price.category {
            PriceCategory::Material => CostCategory::Material,
            PriceCategory::Labor => CostCategory::Labor,
            PriceCategory::Other => CostCategory::Material,
        };
        CostItem::new(
            price.code.as_str(),
            price.description.clone(),
            category,
            price.unit.clone(),
            quantity,
            price.unit_price,
        )
        .with_source(price.source.to_string())
        .with_note(format!("Base price {} before project factors", price.base_price))
    }

    /// Labor hours split over the distribution roles
    pub fn labor_items(&self, total_quantity: f64) -> Vec<CostItem> {
        let total_hours = decimal_from_f64(total_quantity) * self.rates.hours_per_quantity;
        self.rates
            .labor_distribution
            .iter()
            .filter_map(|LaborShare { role, share }| {
                let hours = (total_hours * *share)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                    .to_f64()?;
                (hours > 0.0).then(|| {
                    CostItem::new(
                        format!("LABOR_{}", role.to_uppercase()),
                        format!("{} uren", title_case(role)),
                        CostCategory::Labor,
                        "uur",
                        hours,
                        self.rates.labor_rate(role),
                    )
                    .with_source("tarieventabel")
                    .with_confidence(0.7)
                    .with_note("Estimated from total quantity")
                })
            })
            .collect()
    }

    /// Rental days from the first basket that applies
    pub fn equipment_items(&self, total_quantity: f64) -> Vec<CostItem> {
        let Some(basket) = self.rates.basket_for(total_quantity) else {
            return Vec::new();
        };
        basket
            .days
            .iter()
            .map(|(equipment, days)| {
                CostItem::new(
                    format!("EQP_{}", equipment.to_uppercase()),
                    title_case(equipment),
                    CostCategory::Equipment,
                    "dag",
                    f64::from(*days),
                    self.rates.equipment_rate(equipment),
                )
                .with_source("verhuurtarieven")
                .with_confidence(0.6)
            })
            .collect()
    }

    /// Lump-sum overhead items on top of `base`
    pub fn overhead_items(&self, base: Decimal) -> Vec<CostItem> {
        [
            ("OVERHEAD_PM", "Projectmanagement", self.config.project_management, 0.8),
            ("OVERHEAD_OH", "Algemene bedrijfskosten", self.config.general_overhead, 0.8),
            ("OVERHEAD_PROFIT", "Winstmarge", self.config.profit, 0.7),
        ]
        .into_iter()
        .map(|(code, description, fraction, confidence)| {
            CostItem::new(code, description, CostCategory::Overhead, "post", 1.0, round_half_up(base * fraction))
                .with_source("standaard")
                .with_confidence(confidence)
                .with_note(format!("{}% of direct costs", (fraction * Decimal::ONE_HUNDRED).normalize()))
        })
        .collect()
    }

    /// Build the breakdown for quantities per code and their resolved prices
    pub fn aggregate(
        &self,
        quantities: &BTreeMap<ClassificationCode, f64>,
        prices: &[ResolvedPrice],
    ) -> Aggregation {
        let mut warnings = Vec::new();
        let quantities = Self::sanitize(quantities, &mut warnings);

        let mut material = Vec::new();
        let mut labor = Vec::new();
        for price in prices {
            let quantity = quantities.get(&price.code).copied().unwrap_or(0.0);
            let item = Self::priced_item(price, quantity);
            match item.category {
                CostCategory::Labor => labor.push(item),
                _ => material.push(item),
            }
        }

        let total_quantity: f64 = quantities.values().sum();
        let (labor_extra, equipment) = if total_quantity > 0.0 {
            (self.labor_items(total_quantity), self.equipment_items(total_quantity))
        } else {
            (Vec::new(), Vec::new())
        };
        labor.extend(labor_extra);

        let direct = sum_totals(&material) + sum_totals(&labor) + sum_totals(&equipment);
        let overhead = if direct.is_zero() { Vec::new() } else { self.overhead_items(direct) };

        let breakdown =
            CostBreakdown::from_items(material, labor, equipment, overhead, self.config.vat_percentage);
        debug!(
            "Aggregated {} cost items, {} excl. VAT",
            breakdown.item_count(),
            breakdown.total_excl_vat
        );

        Aggregation { breakdown, warnings }
    }
}
