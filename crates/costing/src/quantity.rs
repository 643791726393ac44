use std::collections::BTreeMap;

use takeoff_common::{ClassificationCode, DrawingElement};

/// Quantity one element contributes: explicit count, then area, volume,
/// length, width × height, and finally 1
pub fn element_quantity(element: &DrawingElement) -> f64 {
    if let Some(quantity) = element.quantity {
        return quantity;
    }
    let Some(dims) = &element.dimensions else {
        return 1.0;
    };
    dims.area
        .or(dims.volume)
        .or(dims.length)
        .or_else(|| dims.width.zip(dims.height).map(|(w, h)| w * h))
        .unwrap_or(1.0)
}

/// Summed quantity per classification code. Uncoded elements count as
/// uncategorised.
pub fn quantities_by_code(elements: &[DrawingElement]) -> BTreeMap<ClassificationCode, f64> {
    let mut quantities = BTreeMap::new();
    for element in elements {
        let code = element
            .code
            .clone()
            .unwrap_or_else(ClassificationCode::uncategorized);
        *quantities.entry(code).or_insert(0.0) += element_quantity(element);
    }
    quantities
}
