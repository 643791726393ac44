use std::path::Path;

use geo_types::{coord, Rect};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Number, Value as JsonValue};
use takeoff_common::DrawingElement;
use crate::{error::Result, pipeline::PageGeometry};

fn number(value: f64) -> JsonValue {
    Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn element_feature(index: usize, element: &DrawingElement) -> Feature {
    let geometry = element.bbox.map(|bbox| {
        let rect = Rect::new(
            coord! { x: bbox.x, y: bbox.y },
            coord! { x: bbox.x + bbox.width, y: bbox.y + bbox.height },
        );
        Geometry::new(Value::from(&rect.to_polygon()))
    });

    let mut properties = Map::new();
    properties.insert("element_type".to_string(), JsonValue::String(element.element_type.to_string()));
    properties.insert("confidence".to_string(), number(element.confidence));
    properties.insert("source".to_string(), JsonValue::String(element.source.to_string()));
    if let Some(material) = &element.material {
        properties.insert("material".to_string(), JsonValue::String(material.clone()));
    }
    if let Some(code) = &element.code {
        properties.insert("code".to_string(), JsonValue::String(code.to_string()));
    }
    if let Some(dims) = &element.dimensions {
        for (name, value) in [
            ("length", dims.length),
            ("area", dims.area),
            ("width", dims.width),
            ("height", dims.height),
        ] {
            if let Some(value) = value {
                properties.insert(name.to_string(), number(value));
            }
        }
    }

    Feature {
        bbox: None,
        geometry,
        id: Some(geojson::feature::Id::Number(Number::from(index))),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Drawing elements as a GeoJSON FeatureCollection in pixel coordinates.
/// Elements without a location become features without geometry.
pub fn elements_to_geojson(elements: &[DrawingElement]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: elements
            .iter()
            .enumerate()
            .map(|(i, element)| element_feature(i, element))
            .collect(),
        foreign_members: None,
    }
}

impl PageGeometry {
    /// Export the classified elements to GeoJSON
    pub fn to_geojson(&self) -> FeatureCollection {
        let mut collection = elements_to_geojson(&self.elements);

        let mut foreign_members = Map::new();
        foreign_members.insert("image_width".to_string(), JsonValue::Number(Number::from(self.detections.image_width)));
        foreign_members.insert("image_height".to_string(), JsonValue::Number(Number::from(self.detections.image_height)));
        foreign_members.insert("element_count".to_string(), JsonValue::Number(Number::from(self.elements.len())));
        collection.foreign_members = Some(foreign_members);

        collection
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_geojson())?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }
}
