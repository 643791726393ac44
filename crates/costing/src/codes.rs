//! Element type and material to cost classification code.

use takeoff_common::{ClassificationCode, DrawingElement};
use tracing::debug;

/// One row of the code table. A rule matches when the element type contains
/// one of `type_any`, also contains one of `type_also` (if any are given),
/// and the material contains one of `material_any` (if any are given).
/// Matching is case-insensitive substring search.
#[derive(Debug, Clone, Copy)]
pub struct CodeRule {
    pub type_any: &'static [&'static str],
    pub type_also: &'static [&'static str],
    pub material_any: &'static [&'static str],
    pub code: &'static str,
}

const WALL: &[&str] = &["wall", "muur", "wand"];
const FLOOR: &[&str] = &["floor", "vloer"];

/// Ordered, first match wins
pub const CODE_RULES: &[CodeRule] = &[
    CodeRule { type_any: WALL, type_also: &["load", "drag"], material_any: &[], code: "3.1" },
    CodeRule { type_any: WALL, type_also: &[], material_any: &[], code: "4.2" },
    CodeRule { type_any: &["window", "raam"], type_also: &[], material_any: &[], code: "7.1" },
    CodeRule { type_any: &["door", "deur"], type_also: &[], material_any: &[], code: "7.2" },
    CodeRule { type_any: FLOOR, type_also: &[], material_any: &["concrete", "beton"], code: "3.2" },
    CodeRule { type_any: FLOOR, type_also: &[], material_any: &[], code: "5.3" },
    CodeRule { type_any: &["roof", "dak"], type_also: &[], material_any: &[], code: "6.1" },
    CodeRule { type_any: &["foundation", "fundering"], type_also: &[], material_any: &[], code: "2.3" },
    CodeRule { type_any: &["insulation", "isolatie"], type_also: &[], material_any: &[], code: "8.1" },
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

impl CodeRule {
    pub fn matches(&self, element_type: &str, material: &str) -> bool {
        contains_any(element_type, self.type_any)
            && (self.type_also.is_empty() || contains_any(element_type, self.type_also))
            && (self.material_any.is_empty() || contains_any(material, self.material_any))
    }
}

/// Assigns classification codes from a rule table
#[derive(Debug, Clone, Copy)]
pub struct CodeMapper {
    rules: &'static [CodeRule],
}

impl Default for CodeMapper {
    fn default() -> Self {
        Self { rules: CODE_RULES }
    }
}

impl CodeMapper {
    pub fn new(rules: &'static [CodeRule]) -> Self {
        Self { rules }
    }

    /// Code for an element type and optional material; `99.9` when no rule
    /// matches
    pub fn code_for(&self, element_type: &str, material: Option<&str>) -> ClassificationCode {
        let element_type = element_type.to_lowercase();
        let material = material.unwrap_or_default().to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&element_type, &material))
            .and_then(|rule| ClassificationCode::new(rule.code).ok())
            .unwrap_or_else(ClassificationCode::uncategorized)
    }

    /// Code of an element. An existing code is kept.
    pub fn map_element(&self, element: &DrawingElement) -> ClassificationCode {
        match &element.code {
            Some(code) => code.clone(),
            None => self.code_for(element.element_type.as_str(), element.material.as_deref()),
        }
    }

    /// Fill in missing codes in place
    pub fn assign(&self, elements: &mut [DrawingElement]) {
        let mut assigned = 0usize;
        for element in elements.iter_mut().filter(|e| e.code.is_none()) {
            element.code = Some(self.map_element(element));
            assigned += 1;
        }
        debug!("Assigned classification codes to {} of {} elements", assigned, elements.len());
    }
}
