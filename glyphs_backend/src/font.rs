//! Typed view of the font-level dictionary (everything except `glyphs`), in
//! the Glyphs 3 shape.
//!
//! This view is read-only: font-level edits (kerning, features) are applied to
//! the raw dictionary so unknown keys are never touched.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::from_plist::{FromPlist, GlyphsFromPlistError, VariantError};
use crate::glyph::GuideLine;
use crate::plist::Plist;
use crate::to_plist::ToPlist;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatVersion {
    V2,
    V3,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct Font {
    #[plist(rename = ".appVersion")]
    pub app_version: Option<String>,
    #[plist(rename = ".formatVersion")]
    pub format_version: Option<i64>,
    #[plist(default)]
    pub family_name: String,
    pub version_major: Option<i64>,
    pub version_minor: Option<i64>,
    pub units_per_em: Option<u16>, // Glyphs UI only allows for 16-16384 inclusive
    #[plist(default)]
    pub axes: Vec<Axis>,
    #[plist(default)]
    pub font_master: Vec<FontMaster>,
    #[plist(default)]
    pub metrics: Vec<Metric>,
    #[plist(default)]
    pub instances: Vec<Instance>,
    #[plist(default)]
    pub properties: Vec<Property>,
    #[plist(default)]
    pub custom_parameters: Vec<CustomParameter>,
    #[plist(default)]
    pub classes: Vec<FeatureClass>,
    #[plist(default)]
    pub feature_prefixes: Vec<FeaturePrefix>,
    #[plist(default)]
    pub features: Vec<Feature>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct Axis {
    pub name: String,
    pub tag: String,
    #[plist(default)]
    pub hidden: bool,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct FontMaster {
    pub id: String,
    #[plist(default)]
    pub name: String,
    #[plist(default)]
    pub axes_values: Vec<f64>,
    #[plist(default)]
    pub metric_values: Vec<MasterMetric>,
    #[plist(default)]
    pub guides: Vec<GuideLine>,
    #[plist(default)]
    pub custom_parameters: Vec<CustomParameter>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, Default, FromPlist, PartialEq)]
pub struct MasterMetric {
    #[plist(default)]
    pub pos: f64,
    #[plist(default)]
    pub over: f64,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct Metric {
    pub filter: Option<String>,
    pub name: Option<String>,
    pub r#type: Option<MetricType>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricType {
    Ascender,
    Baseline,
    BodyHeight,
    CapHeight,
    Descender,
    ItalicAngle,
    MidHeight,
    SlantHeight,
    TopHeight,
    XHeight,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct Instance {
    #[plist(default)]
    pub name: String,
    #[plist(default)]
    pub axes_values: Vec<f64>,
    #[plist(default = true)]
    pub exports: bool,
    pub r#type: Option<InstanceType>,
    #[plist(default = 400)]
    pub weight_class: i64,
    #[plist(default = 5)]
    pub width_class: i64,
    #[plist(default)]
    pub custom_parameters: Vec<CustomParameter>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstanceType {
    Variable,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Option<String>,
    #[plist(default)]
    pub values: Vec<LocalizedValue>,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct LocalizedValue {
    pub language: String,
    pub value: String,
}

#[derive(Clone, Debug, FromPlist, PartialEq)]
pub struct CustomParameter {
    pub name: String,
    pub value: Plist,
    #[plist(default)]
    pub disabled: bool,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct FeatureClass {
    #[plist(default)]
    pub automatic: bool,
    #[plist(default, always_serialise)]
    pub code: String,
    #[plist(default)]
    pub disabled: bool,
    #[plist(always_serialise)]
    pub name: String,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct FeaturePrefix {
    #[plist(default)]
    pub automatic: bool,
    #[plist(default, always_serialise)]
    pub code: String,
    #[plist(default)]
    pub disabled: bool,
    #[plist(always_serialise)]
    pub name: String,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Feature {
    #[plist(default)]
    pub automatic: bool,
    #[plist(default, always_serialise)]
    pub code: String,
    #[plist(default)]
    pub disabled: bool,
    #[plist(default)]
    pub notes: String,
    #[plist(always_serialise)]
    pub tag: String,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

/// Default positions Glyphs uses for master metrics that are not defined.
pub const DEFAULT_ASCENDER: f64 = 800.0;
pub const DEFAULT_CAP_HEIGHT: f64 = 700.0;
pub const DEFAULT_X_HEIGHT: f64 = 500.0;
pub const DEFAULT_DESCENDER: f64 = -200.0;

impl Font {
    pub fn format(&self) -> FormatVersion {
        match self.format_version {
            Some(version) if version >= 3 => FormatVersion::V3,
            _ => FormatVersion::V2,
        }
    }

    pub fn custom_parameter(&self, name: &str) -> Option<&Plist> {
        find_parameter(&self.custom_parameters, name)
    }

    pub fn master(&self, id: &str) -> Option<&FontMaster> {
        self.font_master.iter().find(|m| m.id == id)
    }

    /// The value of a font property, preferring the default language for
    /// localized properties.
    pub fn property(&self, key: &str) -> Option<&str> {
        let property = self.properties.iter().find(|p| p.key == key)?;
        if let Some(value) = &property.value {
            return Some(value);
        }
        ["dflt", "ENG"]
            .iter()
            .find_map(|lang| property.values.iter().find(|v| v.language == *lang))
            .or(property.values.first())
            .map(|v| v.value.as_str())
    }

    /// The value and overshoot of a master metric, or `None` when the font
    /// defines no metric of that type.
    pub fn master_metric(&self, master: &FontMaster, metric_type: MetricType) -> Option<MasterMetric> {
        let index = self
            .metrics
            .iter()
            .position(|m| m.r#type == Some(metric_type) && m.filter.is_none())?;
        Some(master.metric_values.get(index).cloned().unwrap_or_default())
    }

    /// Alignment zones of a master as `(position, size)` pairs.
    pub fn alignment_zones(&self, master: &FontMaster) -> Vec<(f64, f64)> {
        self.metrics
            .iter()
            .zip(master.metric_values.iter())
            .filter(|(metric, _)| metric.r#type != Some(MetricType::ItalicAngle))
            .filter(|(_, value)| value.over != 0.0)
            .map(|(_, value)| (value.pos, value.over))
            .collect()
    }
}

impl FontMaster {
    pub fn custom_parameter(&self, name: &str) -> Option<&Plist> {
        find_parameter(&self.custom_parameters, name)
    }
}

impl Instance {
    pub fn custom_parameter(&self, name: &str) -> Option<&Plist> {
        find_parameter(&self.custom_parameters, name)
    }

    /// Exported static instances take part in the axis mapping.
    pub fn is_active(&self) -> bool {
        self.exports && self.r#type != Some(InstanceType::Variable)
    }
}

fn find_parameter<'a>(parameters: &'a [CustomParameter], name: &str) -> Option<&'a Plist> {
    parameters
        .iter()
        .find(|p| p.name == name && !p.disabled)
        .map(|p| &p.value)
}

#[derive(Debug, Error)]
#[error(
    r#"metric type must be a string containing only "ascender", "cap height", "slant height", "x-height", "midHeight", "topHeight", "bodyHeight", "descender", "baseline", or "italic angle""#
)]
pub struct MetricTypeConversionError;

impl FromPlist for MetricType {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let metric_type = match plist.as_str().ok_or(MetricTypeConversionError)? {
            "ascender" => MetricType::Ascender,
            "baseline" => MetricType::Baseline,
            "bodyHeight" => MetricType::BodyHeight,
            "cap height" => MetricType::CapHeight,
            "descender" => MetricType::Descender,
            "italic angle" => MetricType::ItalicAngle,
            "midHeight" => MetricType::MidHeight,
            "slant height" => MetricType::SlantHeight,
            "topHeight" => MetricType::TopHeight,
            "x-height" => MetricType::XHeight,
            _ => return Err(MetricTypeConversionError.into()),
        };
        Ok(metric_type)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricType::Ascender => write!(f, "ascender"),
            MetricType::Baseline => write!(f, "baseline"),
            MetricType::BodyHeight => write!(f, "bodyHeight"),
            MetricType::CapHeight => write!(f, "cap height"),
            MetricType::Descender => write!(f, "descender"),
            MetricType::ItalicAngle => write!(f, "italic angle"),
            MetricType::MidHeight => write!(f, "midHeight"),
            MetricType::SlantHeight => write!(f, "slant height"),
            MetricType::TopHeight => write!(f, "topHeight"),
            MetricType::XHeight => write!(f, "x-height"),
        }
    }
}

impl ToPlist for MetricType {
    fn to_plist(self) -> Plist {
        self.to_string().into()
    }
}

#[derive(Debug, Error)]
#[error(r#"instance type must be a string containing only "variable""#)]
pub struct InstanceTypeConversionError;

impl FromPlist for InstanceType {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist.as_str() {
            Some("variable") => Ok(InstanceType::Variable),
            Some(_) => Err(InstanceTypeConversionError.into()),
            None => Err(VariantError("string").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(source: &str) -> Font {
        Font::from_plist(Plist::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn metrics_by_type() {
        let font = font(
            r#"{
            .formatVersion = 3;
            fontMaster = ({id = m01; name = Regular; metricValues = ({over = 16; pos = 800;}, {over = -16;}, {pos = -200;});});
            metrics = ({type = ascender;}, {type = baseline;}, {type = descender;}, {filter = "case == 1"; type = ascender;});
            }"#,
        );
        let master = &font.font_master[0];
        assert_eq!(font.format(), FormatVersion::V3);
        assert_eq!(
            font.master_metric(master, MetricType::Ascender).map(|m| (m.pos, m.over)),
            Some((800.0, 16.0))
        );
        assert_eq!(
            font.master_metric(master, MetricType::Baseline).map(|m| m.pos),
            Some(0.0)
        );
        assert!(font.master_metric(master, MetricType::XHeight).is_none());
        assert_eq!(font.alignment_zones(master), vec![(800.0, 16.0), (0.0, -16.0)]);
    }

    #[test]
    fn localized_properties() {
        let font = font(
            r#"{
            properties = (
            {key = designers; values = ({language = DEU; value = "Jemand";}, {language = dflt; value = "Someone";});},
            {key = vendorID; value = ABCD;}
            );
            }"#,
        );
        assert_eq!(font.format(), FormatVersion::V2);
        assert_eq!(font.property("designers"), Some("Someone"));
        assert_eq!(font.property("vendorID"), Some("ABCD"));
        assert_eq!(font.property("copyrights"), None);
    }

    #[test]
    fn disabled_parameters_are_ignored() {
        let font = font(
            r#"{customParameters = ({disabled = 1; name = "Axis Mappings"; value = {};}, {name = "Variable Font Origin"; value = m02;});}"#,
        );
        assert!(font.custom_parameter("Axis Mappings").is_none());
        assert_eq!(
            font.custom_parameter("Variable Font Origin").and_then(Plist::as_str),
            Some("m02")
        );
    }

    #[test]
    fn inactive_instances() {
        let font = font(
            r#"{instances = ({name = Bold; weightClass = 700;}, {exports = 0; name = Hidden;}, {name = VF; type = variable;});}"#,
        );
        let active: Vec<_> = font
            .instances
            .iter()
            .filter(|i| i.is_active())
            .map(|i| (i.name.as_str(), i.weight_class))
            .collect();
        assert_eq!(active, vec![("Bold", 700)]);
    }
}
