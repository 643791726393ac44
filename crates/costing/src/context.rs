use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl Complexity {
    pub fn factor(&self) -> Decimal {
        match self {
            Complexity::Low => dec!(0.9),
            Complexity::Medium => dec!(1.0),
            Complexity::High => dec!(1.15),
            Complexity::VeryHigh => dec!(1.3),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectSize {
    Small,
    #[default]
    Medium,
    Large,
    VeryLarge,
}

impl ProjectSize {
    /// Surcharge for small projects, discount for large ones
    pub fn factor(&self) -> Decimal {
        match self {
            ProjectSize::Small => dec!(1.05),
            ProjectSize::Medium => dec!(1.0),
            ProjectSize::Large => dec!(0.95),
            ProjectSize::VeryLarge => dec!(0.9),
        }
    }
}

/// Regional price level. Unknown regions are priced at 1.0.
pub fn location_factor(location: &str) -> Decimal {
    match location.trim().to_lowercase().as_str() {
        "randstad" => dec!(1.1),
        "noord" => dec!(0.95),
        "oost" => dec!(0.9),
        "zuid" => dec!(0.95),
        "west" => dec!(1.0),
        _ => dec!(1.0),
    }
}

/// Project facts that shape prices and the report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProjectContext {
    pub project_name: String,
    pub reference_number: Option<String>,
    pub complexity: Complexity,
    /// Region name, e.g. `randstad` or `oost`
    pub location: String,
    pub project_size: ProjectSize,
    /// Gross floor area in m², enables cost per m²
    pub surface_area: Option<f64>,
    /// Gross volume in m³, enables cost per m³
    pub volume: Option<f64>,
}

impl Default for ProjectContext {
    fn default() -> Self {
        Self {
            project_name: "Unnamed Project".to_string(),
            reference_number: None,
            complexity: Complexity::default(),
            location: "randstad".to_string(),
            project_size: ProjectSize::default(),
            surface_area: None,
            volume: None,
        }
    }
}

impl ProjectContext {
    /// Complexity, location and size factors, in application order
    pub fn price_factors(&self) -> [Decimal; 3] {
        [
            self.complexity.factor(),
            location_factor(&self.location),
            self.project_size.factor(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors() {
        assert_eq!(Complexity::VeryHigh.factor(), dec!(1.3));
        assert_eq!(ProjectSize::Small.factor(), dec!(1.05));
        assert_eq!(location_factor("Randstad"), dec!(1.1));
        assert_eq!(location_factor("oost"), dec!(0.9));
        assert_eq!(location_factor("limburg"), dec!(1.0));
    }

    #[test]
    fn test_context_parses_from_partial_toml() {
        let context: ProjectContext = toml::from_str(
            r#"
            project_name = "Kantoor Zuidas"
            complexity = "very_high"
            location = "noord"
            surface_area = 1250.0
            "#,
        )
        .expect("Should parse context");

        assert_eq!(context.complexity, Complexity::VeryHigh);
        assert_eq!(context.project_size, ProjectSize::Medium);
        assert_eq!(context.price_factors(), [dec!(1.3), dec!(0.95), dec!(1.0)]);
        assert_eq!(context.surface_area, Some(1250.0));
    }
}
