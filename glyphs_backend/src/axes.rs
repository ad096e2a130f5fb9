//! Font axes, master locations and the default source.
//!
//! Glyphs stores master positions in design space. The user space range and
//! the user -> design mapping come from the `Axis Mappings` custom parameter,
//! or else from the instances and the masters' `Axis Location` parameters.

use std::collections::BTreeMap;

use crate::classes::{FontAxis, Location};
use crate::font::{Font, FontMaster};
use crate::plist::Plist;

/// What the backend needs to know about the design space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesignSpace {
    /// Axes with a range, in user space.
    pub axes: Vec<FontAxis>,
    /// Design location of each master, over `axes`.
    pub master_locations: BTreeMap<String, Location>,
    /// Design location of the regular master, over `axes`.
    pub default_location: Location,
    pub default_master_id: Option<String>,
}

impl DesignSpace {
    pub fn new(font: &Font) -> Self {
        let regular = regular_master(font);
        let mut axes = Vec::new();
        let mut master_locations: BTreeMap<String, Location> = font
            .font_master
            .iter()
            .map(|m| (m.id.clone(), Location::new()))
            .collect();
        let mut default_location = Location::new();

        for (index, axis) in font.axes.iter().enumerate() {
            let design_value = |master: &FontMaster| {
                master.axes_values.get(index).copied().unwrap_or_default()
            };
            let mapping = axis_mapping(font, index);
            let user_value = |master: &FontMaster| {
                master_axis_location(master, &axis.name)
                    .unwrap_or_else(|| piecewise_linear_map(design_value(master), &invert(&mapping)))
            };

            let user_values: Vec<f64> = font.font_master.iter().map(user_value).collect();
            let Some(user_min) = user_values.iter().copied().reduce(f64::min) else {
                continue;
            };
            let user_max = user_values.iter().copied().fold(user_min, f64::max);
            if user_min == user_max {
                continue;
            }
            let user_default = regular.map(user_value).unwrap_or(user_min);

            for master in &font.font_master {
                if let Some(location) = master_locations.get_mut(&master.id) {
                    location.insert(axis.name.clone(), design_value(master));
                }
            }
            default_location.insert(
                axis.name.clone(),
                regular.map(design_value).unwrap_or_default(),
            );

            let is_identity = mapping.iter().all(|(user, design)| user == design);
            axes.push(FontAxis {
                name: axis.name.clone(),
                label: axis.name.clone(),
                tag: axis.tag.clone(),
                min_value: user_min,
                default_value: user_default,
                max_value: user_max,
                mapping: if is_identity {
                    Vec::new()
                } else {
                    mapping.iter().map(|(u, d)| [*u, *d]).collect()
                },
                hidden: axis.hidden,
                custom_data: Default::default(),
            });
        }

        DesignSpace {
            axes,
            master_locations,
            default_location,
            default_master_id: regular.map(|m| m.id.clone()),
        }
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|a| a.name.as_str())
    }

    /// The master sitting exactly at a dense design location.
    pub fn master_at(&self, location: &Location) -> Option<&str> {
        self.master_locations
            .iter()
            .find(|(_, master_location)| *master_location == location)
            .map(|(id, _)| id.as_str())
    }
}

/// `(user, design)` points for axis number `index`, sorted by user value.
fn axis_mapping(font: &Font, index: usize) -> Vec<(f64, f64)> {
    let Some(axis) = font.axes.get(index) else {
        return Vec::new();
    };

    if let Some(mappings) = font.custom_parameter("Axis Mappings") {
        let points: Vec<(f64, f64)> = mappings
            .get(&axis.tag)
            .and_then(Plist::as_dict)
            .map(|points| {
                points
                    .iter()
                    .filter_map(|(user, design)| Some((user.parse().ok()?, design.as_f64()?)))
                    .collect()
            })
            .unwrap_or_default();
        return sorted_points(points);
    }

    let mut points = BTreeMap::new();
    let mut add_point = |user: f64, design: f64| {
        if let Some(existing) = points.insert(user.to_bits(), (user, design)) {
            if existing.1 != design {
                tracing::warn!(
                    axis = %axis.name,
                    user,
                    "conflicting design values {} and {design}",
                    existing.1
                );
            }
        }
    };
    for instance in font.instances.iter().filter(|i| i.is_active()) {
        let Some(design) = instance.axes_values.get(index).copied() else {
            continue;
        };
        let user = instance
            .custom_parameter("Axis Location")
            .and_then(|locations| axis_location(locations, &axis.name))
            .or_else(|| match axis.tag.as_str() {
                "wght" => Some(instance.weight_class as f64),
                "wdth" => width_class_to_percent(instance.width_class),
                _ => None,
            })
            .unwrap_or(design);
        add_point(user, design);
    }
    for master in &font.font_master {
        let design = master.axes_values.get(index).copied().unwrap_or_default();
        if let Some(user) = master_axis_location(master, &axis.name) {
            add_point(user, design);
        }
    }
    sorted_points(points.into_values().collect())
}

fn sorted_points(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

fn invert(mapping: &[(f64, f64)]) -> Vec<(f64, f64)> {
    sorted_points(mapping.iter().map(|(u, d)| (*d, *u)).collect())
}

fn master_axis_location(master: &FontMaster, axis_name: &str) -> Option<f64> {
    master
        .custom_parameter("Axis Location")
        .and_then(|locations| axis_location(locations, axis_name))
}

/// The `Location` of `axis_name` in an `Axis Location` parameter value.
fn axis_location(locations: &Plist, axis_name: &str) -> Option<f64> {
    locations.as_array()?.iter().find_map(|entry| {
        if entry.get("Axis").and_then(Plist::as_str) != Some(axis_name) {
            return None;
        }
        match entry.get("Location")? {
            Plist::String(s) => s.parse().ok(),
            value => value.as_f64(),
        }
    })
}

fn width_class_to_percent(width_class: i64) -> Option<f64> {
    Some(match width_class {
        1 => 50.0,
        2 => 62.5,
        3 => 75.0,
        4 => 87.5,
        5 => 100.0,
        6 => 112.5,
        7 => 125.0,
        8 => 150.0,
        9 => 200.0,
        _ => return None,
    })
}

/// Map `value` through sorted `(input, output)` points, extrapolating with
/// the offset of the nearest end point outside their range.
pub fn piecewise_linear_map(value: f64, mapping: &[(f64, f64)]) -> f64 {
    let (Some(first), Some(last)) = (mapping.first(), mapping.last()) else {
        return value;
    };
    if let Some((_, out)) = mapping.iter().find(|(input, _)| *input == value) {
        return *out;
    }
    if value < first.0 {
        return value + first.1 - first.0;
    }
    if value > last.0 {
        return value + last.1 - last.0;
    }
    let Some(upper) = mapping.iter().position(|(input, _)| *input > value) else {
        return value;
    };
    let (a, va) = mapping[upper - 1];
    let (b, vb) = mapping[upper];
    va + (vb - va) * (value - a) / (b - a)
}

/// The master a variable font would use as its origin.
pub fn regular_master(font: &Font) -> Option<&FontMaster> {
    let first = font.font_master.first()?;
    if let Some(origin) = font.custom_parameter("Variable Font Origin").and_then(Plist::as_str) {
        if let Some(master) = font
            .font_master
            .iter()
            .find(|m| m.id == origin || m.name == origin)
        {
            return Some(master);
        }
    }

    let base_style = match find_base_style(&font.font_master) {
        style if style.is_empty() => "Regular".to_string(),
        style => style,
    };
    font.font_master
        .iter()
        .find(|m| m.name == base_style)
        .or_else(|| {
            font.font_master.iter().find(|m| {
                let without_regular: Vec<&str> =
                    m.name.split(' ').filter(|w| *w != "Regular").collect();
                without_regular.join(" ") == base_style
            })
        })
        .or(Some(first))
}

/// The words every master name has in common, in the order of the last name.
fn find_base_style(masters: &[FontMaster]) -> String {
    let Some(first) = masters.first() else {
        return String::new();
    };
    let mut base_style: Vec<&str> = first.name.split_whitespace().collect();
    for master in masters {
        base_style = master
            .name
            .split_whitespace()
            .filter(|word| base_style.contains(word))
            .collect();
    }
    base_style.join(" ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::from_plist::FromPlist;

    fn font(source: &str) -> Font {
        Font::from_plist(Plist::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn piecewise() {
        let mapping = [(100.0, 20.0), (400.0, 80.0), (900.0, 180.0)];
        assert_eq!(piecewise_linear_map(400.0, &mapping), 80.0);
        assert_eq!(piecewise_linear_map(250.0, &mapping), 50.0);
        assert_eq!(piecewise_linear_map(50.0, &mapping), -30.0);
        assert_eq!(piecewise_linear_map(1000.0, &mapping), 280.0);
        assert_eq!(piecewise_linear_map(7.0, &[]), 7.0);
    }

    #[test]
    fn mapping_from_instances() {
        let font = font(
            r#"{
            .formatVersion = 3;
            axes = ({name = Weight; tag = wght;}, {name = Width; tag = wdth;});
            fontMaster = ({axesValues = (20, 100); id = m01; name = Light;}, {axesValues = (180, 100); id = m02; name = Bold;});
            instances = (
            {axesValues = (20, 100); name = Light; weightClass = 300;},
            {axesValues = (80, 100); name = Regular;},
            {axesValues = (180, 100); name = Bold; weightClass = 700;}
            );
            }"#,
        );
        let space = DesignSpace::new(&font);
        assert_eq!(space.axes.len(), 1, "flat Width axis is dropped");
        let weight = &space.axes[0];
        assert_eq!((weight.min_value, weight.max_value), (300.0, 700.0));
        assert_eq!(
            weight.mapping,
            vec![[300.0, 20.0], [400.0, 80.0], [700.0, 180.0]]
        );
        // No master is called "Regular" and the names share no word.
        assert_eq!(space.default_master_id.as_deref(), Some("m01"));
        assert_eq!(weight.default_value, 300.0);
        assert_eq!(space.master_locations["m02"], Location::from([("Weight".into(), 180.0)]));
        assert_eq!(space.master_at(&Location::from([("Weight".into(), 20.0)])), Some("m01"));
    }

    #[test]
    fn axis_mappings_parameter_wins() {
        let font = font(
            r#"{
            .formatVersion = 3;
            axes = ({name = Weight; tag = wght;});
            customParameters = ({name = "Axis Mappings"; value = {wght = {"100" = 100; "900" = 900;};};}, {name = "Variable Font Origin"; value = m02;});
            fontMaster = ({axesValues = (100); id = m01; name = Thin;}, {axesValues = (900); id = m02; name = Black;});
            instances = ({axesValues = (100); name = Thin; weightClass = 250;});
            }"#,
        );
        let space = DesignSpace::new(&font);
        let weight = &space.axes[0];
        assert!(weight.mapping.is_empty(), "identity mappings are dropped");
        assert_eq!(weight.default_value, 900.0);
        assert_eq!(space.default_location["Weight"], 900.0);
    }

    #[test]
    fn master_axis_location() {
        let font = font(
            r#"{
            .formatVersion = 3;
            axes = ({name = Weight; tag = wght;});
            fontMaster = (
            {axesValues = (50); customParameters = ({name = "Axis Location"; value = ({Axis = Weight; Location = 400;});}); id = m01; name = Regular;},
            {axesValues = (150); customParameters = ({name = "Axis Location"; value = ({Axis = Weight; Location = 700;});}); id = m02; name = Bold;}
            );
            }"#,
        );
        let space = DesignSpace::new(&font);
        let weight = &space.axes[0];
        assert_eq!((weight.min_value, weight.default_value, weight.max_value), (400.0, 400.0, 700.0));
        assert_eq!(weight.mapping, vec![[400.0, 50.0], [700.0, 150.0]]);
    }

    #[test]
    fn base_style() {
        let font = font(
            r#"{fontMaster = ({id = a; name = "Condensed Light";}, {id = b; name = "Condensed Regular";}, {id = c; name = "Condensed Bold";});}"#,
        );
        assert_eq!(find_base_style(&font.font_master), "Condensed");
        assert_eq!(regular_master(&font).map(|m| m.id.as_str()), Some("b"));
    }
}
