//! The host editor's font object model.
//!
//! These types are what the backend hands out and accepts. They serialise to
//! the host's camelCase JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub type Location = BTreeMap<String, f64>;
pub type CustomData = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableGlyph {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub axes: Vec<GlyphAxis>,
    #[serde(default)]
    pub sources: Vec<GlyphSource>,
    #[serde(default)]
    pub layers: BTreeMap<String, Layer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphAxis {
    pub name: String,
    pub min_value: f64,
    pub default_value: f64,
    pub max_value: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphSource {
    pub name: String,
    pub layer_name: String,
    #[serde(default)]
    pub location: Location,
    /// Identifier of a font source whose location this source builds on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_base: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inactive: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub glyph: StaticGlyph,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticGlyph {
    #[serde(default)]
    pub path: PackedPath,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_advance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_advance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_origin: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchors: Vec<Anchor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<Guideline>,
}

/// Contours as flat arrays: `coordinates` holds x, y pairs, one per entry of
/// `point_types`, and each contour ends at its `end_point` (inclusive).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedPath {
    #[serde(default)]
    pub coordinates: Vec<f64>,
    #[serde(default)]
    pub point_types: Vec<PointType>,
    #[serde(default)]
    pub contour_info: Vec<ContourInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_attributes: Option<Vec<Option<CustomData>>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PointType {
    OnCurve,
    OffCurveQuad,
    OffCurveCubic,
    OnCurveSmooth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContourInfo {
    pub end_point: usize,
    pub is_closed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub transformation: DecomposedTransform,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub location: Location,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

/// An affine transformation split into its parts, in the order
/// translate, rotate, scale, skew around the center `t_center`.
/// Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecomposedTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub t_center_x: f64,
    pub t_center_y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub name: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guideline {
    pub name: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Axes {
    pub axes: Vec<FontAxis>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

/// A font axis in user space; `mapping` holds `[user, design]` pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontAxis {
    pub name: String,
    pub label: String,
    pub tag: String,
    pub min_value: f64,
    pub default_value: f64,
    pub max_value: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mapping: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSource {
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_sparse: bool,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub line_metrics_horizontal_layout: BTreeMap<String, LineMetric>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub line_metrics_vertical_layout: BTreeMap<String, LineMetric>,
    #[serde(default)]
    pub italic_angle: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guidelines: Vec<Guideline>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMetric {
    pub value: f64,
    #[serde(default)]
    pub zone: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_major: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_minor: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trademark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designer: Option<String>,
    #[serde(default, rename = "designerURL", skip_serializing_if = "Option::is_none")]
    pub designer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, rename = "manufacturerURL", skip_serializing_if = "Option::is_none")]
    pub manufacturer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_description: Option<String>,
    #[serde(default, rename = "vendorID", skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

/// Kerning of one table. `values[left][right]` has one entry per source
/// identifier, `None` where a source has no value for the pair. Group names
/// carry a leading `@` in `values`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kerning {
    pub groups_side1: BTreeMap<String, Vec<String>>,
    pub groups_side2: BTreeMap<String, Vec<String>>,
    pub source_identifiers: Vec<String>,
    pub values: BTreeMap<String, BTreeMap<String, Vec<Option<f64>>>>,
}

impl Kerning {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.groups_side1.is_empty() && self.groups_side2.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTypeFeatures {
    #[serde(default = "default_feature_language")]
    pub language: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: CustomData,
}

fn default_feature_language() -> String {
    "fea".to_string()
}

impl Default for OpenTypeFeatures {
    fn default() -> Self {
        Self {
            language: default_feature_language(),
            text: String::new(),
            custom_data: CustomData::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    #[serde(rename = "type")]
    pub image_type: String,
    pub data: Vec<u8>,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            t_center_x: 0.0,
            t_center_y: 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown point type {0}")]
pub struct PointTypeError(u8);

impl TryFrom<u8> for PointType {
    type Error = PointTypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PointType::OnCurve),
            0x01 => Ok(PointType::OffCurveQuad),
            0x02 => Ok(PointType::OffCurveCubic),
            0x08 => Ok(PointType::OnCurveSmooth),
            _ => Err(PointTypeError(value)),
        }
    }
}

impl From<PointType> for u8 {
    fn from(point_type: PointType) -> u8 {
        match point_type {
            PointType::OnCurve => 0x00,
            PointType::OffCurveQuad => 0x01,
            PointType::OffCurveCubic => 0x02,
            PointType::OnCurveSmooth => 0x08,
        }
    }
}

impl PointType {
    pub fn is_on_curve(self) -> bool {
        matches!(self, PointType::OnCurve | PointType::OnCurveSmooth)
    }
}

impl PackedPath {
    pub fn is_empty(&self) -> bool {
        self.point_types.is_empty()
    }

    pub fn point(&self, index: usize) -> Option<(f64, f64)> {
        Some((
            *self.coordinates.get(2 * index)?,
            *self.coordinates.get(2 * index + 1)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn camel_case_json() {
        let source = GlyphSource {
            name: "Bold".into(),
            layer_name: "m02".into(),
            location: Location::from([("Weight".to_string(), 700.0)]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"name": "Bold", "layerName": "m02", "location": {"Weight": 700.0}})
        );
    }

    #[test]
    fn point_types_as_numbers() {
        let path = PackedPath {
            coordinates: vec![0.0, 0.0, 10.0, 10.0],
            point_types: vec![PointType::OnCurveSmooth, PointType::OffCurveCubic],
            contour_info: vec![ContourInfo {
                end_point: 1,
                is_closed: true,
            }],
            point_attributes: None,
        };
        let value = serde_json::to_value(&path).unwrap();
        assert_eq!(value["pointTypes"], json!([8, 2]));
        assert_eq!(serde_json::from_value::<PackedPath>(value).unwrap(), path);
        assert!(serde_json::from_value::<PointType>(json!(3)).is_err());
    }

    #[test]
    fn transform_defaults_to_identity() {
        let transform: DecomposedTransform = serde_json::from_value(json!({"translateX": 5})).unwrap();
        assert_eq!(transform.translate_x, 5.0);
        assert_eq!(transform.scale_x, 1.0);
        assert_eq!(transform.scale_y, 1.0);
    }
}
