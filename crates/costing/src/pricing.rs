//! Unit price resolution against a reference price table.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use takeoff_common::{ClassificationCode, DrawingElement};
use tracing::debug;

use crate::{
    context::ProjectContext,
    error::{CostingError, Result},
    money::round_half_up,
};

/// Price category of a code, before it is turned into a cost item
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceCategory {
    Material,
    Labor,
    Other,
}

impl PriceCategory {
    pub fn for_chapter(chapter: &str) -> Self {
        match chapter {
            "3" | "4" | "5" | "7" | "8" => PriceCategory::Material,
            "2" | "9" => PriceCategory::Labor,
            _ => PriceCategory::Other,
        }
    }
}

/// Default unit for a chapter without a table entry
pub fn unit_for_chapter(chapter: &str) -> &'static str {
    match chapter {
        "2" | "3" => "m3",
        "4" | "6" | "8" => "m2",
        "5" => "m",
        _ => "stuk",
    }
}

/// Which fallback stage produced a base price
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceSource {
    ExactMatch,
    ChapterMatch,
    MaterialKeyword,
    GenericDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriceEntry {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<PriceCategory>,
}

impl PriceEntry {
    fn new(code: &str, description: &str, unit: &str, price: Decimal) -> Self {
        Self {
            code: code.to_string(),
            description: description.to_string(),
            unit: unit.to_string(),
            price,
            category: None,
        }
    }
}

/// Read-only reference prices
pub trait PriceLookup: Send + Sync {
    fn exact(&self, code: &ClassificationCode) -> Option<&PriceEntry>;

    /// First entry, in table order, whose code lies in `chapter`
    fn first_in_chapter(&self, chapter: &str) -> Option<&PriceEntry>;
}

/// Ordered price table, loadable from TOML or JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriceTable {
    pub name: String,
    pub entries: Vec<PriceEntry>,
}

impl Default for PriceTable {
    /// STABU 2024 excerpt
    fn default() -> Self {
        Self {
            name: "STABU 2024".to_string(),
            entries: vec![
                PriceEntry::new("2.1", "Grondverzet per m3", "m3", dec!(25.00)),
                PriceEntry::new("2.2", "Ophoging zand", "m3", dec!(45.00)),
                PriceEntry::new("3.1", "Fundering C20/25", "m3", dec!(145.00)),
                PriceEntry::new("3.2", "Vloer C25/30", "m3", dec!(165.00)),
                PriceEntry::new("4.1", "Gevelsteen 10x20x50", "m2", dec!(85.00)),
                PriceEntry::new("4.2", "Binnenwand blokken", "m2", dec!(45.00)),
                PriceEntry::new("5.1", "Draagbalk gelamineerd", "m", dec!(125.00)),
                PriceEntry::new("5.2", "Vloerbalk Vuren", "m", dec!(35.00)),
                PriceEntry::new("6.1", "Dakpannen", "m2", dec!(75.00)),
                PriceEntry::new("6.2", "Isolatie dak", "m2", dec!(65.00)),
            ],
        }
    }
}

impl PriceTable {
    /// Reject negative prices and duplicate codes
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.price < Decimal::ZERO {
                return Err(CostingError::NegativePrice { code: entry.code.clone() });
            }
            if !seen.insert(entry.code.as_str()) {
                return Err(CostingError::DuplicateCode { code: entry.code.clone() });
            }
        }
        Ok(())
    }

    /// Load a price table from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let table: PriceTable = toml::from_str(&content)?;
        table.validate()?;
        Ok(table)
    }

    /// Load a price table from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let table: PriceTable = serde_json::from_str(&content)?;
        table.validate()?;
        Ok(table)
    }

    /// Auto-detect file format and load the table
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CostingError::UnsupportedFileFormat),
        }
    }

    /// Convert the table to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl PriceLookup for PriceTable {
    fn exact(&self, code: &ClassificationCode) -> Option<&PriceEntry> {
        self.entries.iter().find(|e| e.code == code.as_str())
    }

    fn first_in_chapter(&self, chapter: &str) -> Option<&PriceEntry> {
        self.entries.iter().find(|e| {
            e.code == chapter
                || e.code
                    .strip_prefix(chapter)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// What the elements of one code say about it, for keyword pricing and
/// descriptions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHint {
    pub label: String,
    pub material: Option<String>,
}

impl PriceHint {
    fn text(&self) -> String {
        format!("{} {}", self.label, self.material.as_deref().unwrap_or_default()).to_lowercase()
    }
}

/// First element type and first stated material per code
pub fn price_hints(elements: &[DrawingElement]) -> BTreeMap<ClassificationCode, PriceHint> {
    let mut hints: BTreeMap<ClassificationCode, PriceHint> = BTreeMap::new();
    for element in elements {
        let code = element
            .code
            .clone()
            .unwrap_or_else(ClassificationCode::uncategorized);
        let hint = hints.entry(code).or_insert_with(|| PriceHint {
            label: element.element_type.to_string(),
            material: None,
        });
        if hint.material.is_none() {
            hint.material = element.material.clone();
        }
    }
    hints
}

const KEYWORD_PRICES: &[(&[&str], Decimal)] = &[
    (&["concrete", "beton"], dec!(150.00)),
    (&["brick", "steen"], dec!(85.00)),
    (&["wood", "hout"], dec!(65.00)),
    (&["metal", "staal"], dec!(125.00)),
];

const GENERIC_PRICE: Decimal = dec!(100.00);

/// Price, unit and category of one code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub code: ClassificationCode,
    pub description: String,
    pub unit: String,
    pub category: PriceCategory,
    pub base_price: Decimal,
    /// Base price after context factors, rounded to cents
    pub unit_price: Decimal,
    pub source: PriceSource,
}

/// Resolves unit prices through exact, chapter, keyword and generic fallbacks
#[derive(Clone)]
pub struct PriceResolver {
    lookup: Arc<dyn PriceLookup>,
    context: ProjectContext,
}

impl PriceResolver {
    pub fn new(lookup: Arc<dyn PriceLookup>, context: ProjectContext) -> Self {
        Self { lookup, context }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    /// Base price and the stage it came from
    pub fn base_price(&self, code: &ClassificationCode, hint: &PriceHint) -> (Decimal, PriceSource) {
        if let Some(entry) = self.lookup.exact(code) {
            return (entry.price, PriceSource::ExactMatch);
        }
        if let Some(entry) = self.lookup.first_in_chapter(code.chapter()) {
            return (entry.price, PriceSource::ChapterMatch);
        }

        let text = hint.text();
        KEYWORD_PRICES
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
            .map(|(_, price)| (*price, PriceSource::MaterialKeyword))
            .unwrap_or((GENERIC_PRICE, PriceSource::GenericDefault))
    }

    /// Apply complexity, location and size factors, then round
    pub fn adjust(&self, base_price: Decimal) -> Decimal {
        let adjusted = self
            .context
            .price_factors()
            .iter()
            .fold(base_price, |price, factor| price * factor);
        round_half_up(adjusted)
    }

    pub fn resolve(&self, code: &ClassificationCode, hint: &PriceHint) -> ResolvedPrice {
        let (base_price, source) = self.base_price(code, hint);
        let exact = self.lookup.exact(code);
        let chapter = code.chapter();

        ResolvedPrice {
            code: code.clone(),
            description: exact
                .map(|e| e.description.clone())
                .unwrap_or_else(|| hint.label.clone()),
            unit: exact
                .map(|e| e.unit.clone())
                .unwrap_or_else(|| unit_for_chapter(chapter).to_string()),
            category: exact
                .and_then(|e| e.category)
                .unwrap_or_else(|| PriceCategory::for_chapter(chapter)),
            base_price,
            unit_price: self.adjust(base_price),
            source,
        }
    }

    /// Prices for every code with a non-zero quantity, in code order
    pub fn resolve_all(
        &self,
        quantities: &BTreeMap<ClassificationCode, f64>,
        hints: &BTreeMap<ClassificationCode, PriceHint>,
    ) -> Vec<ResolvedPrice> {
        let fallback = PriceHint::default();
        quantities
            .iter()
            .filter(|(_, quantity)| **quantity != 0.0)
            .map(|(code, _)| {
                let resolved = self.resolve(code, hints.get(code).unwrap_or(&fallback));
                debug!(
                    "Priced {} at {} per {} ({})",
                    resolved.code, resolved.unit_price, resolved.unit, resolved.source
                );
                resolved
            })
            .collect()
    }
}
