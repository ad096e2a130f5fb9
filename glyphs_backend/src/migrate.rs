//! Glyphs 2 <-> Glyphs 3 conversion of raw dictionaries.
//!
//! The typed model only understands the Glyphs 3 shape. Glyphs 2 glyphs are
//! upgraded before parsing and downgraded again before they are stored, and
//! the Glyphs 2 font header is upgraded into a read-only Glyphs 3 view. Keys
//! that are not converted pass through untouched.

use std::collections::BTreeMap;

use kurbo::Affine;

use crate::classes::DecomposedTransform;
use crate::font::{DEFAULT_ASCENDER, DEFAULT_CAP_HEIGHT, DEFAULT_DESCENDER, DEFAULT_X_HEIGHT};
use crate::plist::Plist;
use crate::to_plist::ToPlist;
use crate::transform::{from_affine, round5, to_affine};

type Dict = BTreeMap<String, Plist>;

const GLYPH_KEYS: &[(&str, &str)] = &[
    ("leftKerningGroup", "kernLeft"),
    ("rightKerningGroup", "kernRight"),
    ("topKerningGroup", "kernTop"),
    ("bottomKerningGroup", "kernBottom"),
    ("leftMetricsKey", "metricLeft"),
    ("rightMetricsKey", "metricRight"),
    ("widthMetricsKey", "metricWidth"),
];

const MASTER_AXIS_KEYS: &[(&str, f64)] = &[
    ("weightValue", 100.0),
    ("widthValue", 100.0),
    ("customValue", 0.0),
    ("customValue1", 0.0),
    ("customValue2", 0.0),
    ("customValue3", 0.0),
];

const INSTANCE_AXIS_KEYS: &[(&str, f64)] = &[
    ("interpolationWeight", 100.0),
    ("interpolationWidth", 100.0),
    ("interpolationCustom", 0.0),
    ("interpolationCustom1", 0.0),
    ("interpolationCustom2", 0.0),
    ("interpolationCustom3", 0.0),
];

const DEFAULT_AXES: &[(&str, &str)] = &[("Weight", "wght"), ("Width", "wdth"), ("Custom", "XXXX")];

pub fn glyph_to_v3(glyph: Plist) -> Plist {
    let Plist::Dictionary(mut glyph) = glyph else {
        return glyph;
    };
    for (old, new) in GLYPH_KEYS {
        rename_key(&mut glyph, old, new);
    }
    if let Some(unicode) = glyph.remove("unicode") {
        let converted = codepoints_from_hex(&unicode).unwrap_or(unicode);
        glyph.insert("unicode".into(), converted);
    }
    if let Some(Plist::Array(layers)) = glyph.get_mut("layers") {
        for layer in layers.iter_mut().filter_map(Plist::as_dict_mut) {
            layer_to_v3(layer);
        }
    }
    Plist::Dictionary(glyph)
}

pub fn glyph_to_v2(glyph: Plist) -> Plist {
    let Plist::Dictionary(mut glyph) = glyph else {
        return glyph;
    };
    for (old, new) in GLYPH_KEYS {
        rename_key(&mut glyph, new, old);
    }
    if let Some(unicode) = glyph.remove("unicode") {
        let converted = codepoints_to_hex(&unicode).unwrap_or(unicode);
        glyph.insert("unicode".into(), converted);
    }
    if let Some(Plist::Array(layers)) = glyph.get_mut("layers") {
        for layer in layers.iter_mut().filter_map(Plist::as_dict_mut) {
            layer_to_v2(layer);
        }
    }
    Plist::Dictionary(glyph)
}

fn layer_to_v3(layer: &mut Dict) {
    shapes_to_v3(layer);
    if let Some(Plist::Dictionary(user_data)) = layer.get_mut("userData") {
        if let Some(selection) = user_data.remove("PartSelection") {
            layer.insert("partSelection".into(), selection);
        }
    }
    if layer
        .get("userData")
        .and_then(Plist::as_dict)
        .is_some_and(BTreeMap::is_empty)
    {
        layer.remove("userData");
    }
    let coordinates = layer
        .get("name")
        .and_then(Plist::as_str)
        .and_then(brace_coordinates);
    if let Some(coordinates) = coordinates {
        let attr = layer
            .entry("attr".to_string())
            .or_insert_with(|| Plist::Dictionary(Dict::new()));
        if let Some(attr) = attr.as_dict_mut() {
            attr.entry("coordinates".to_string())
                .or_insert_with(|| coordinates.to_plist());
        }
    }
    if let Some(Plist::Dictionary(background)) = layer.get_mut("background") {
        shapes_to_v3(background);
    }
}

fn layer_to_v2(layer: &mut Dict) {
    shapes_to_v2(layer);
    if let Some(selection) = layer.remove("partSelection") {
        let user_data = layer
            .entry("userData".to_string())
            .or_insert_with(|| Plist::Dictionary(Dict::new()));
        if let Some(user_data) = user_data.as_dict_mut() {
            user_data.insert("PartSelection".into(), selection);
        }
    }
    if let Some(Plist::Dictionary(attr)) = layer.get_mut("attr") {
        attr.remove("coordinates");
        if attr.is_empty() {
            layer.remove("attr");
        }
    }
    if let Some(Plist::Dictionary(background)) = layer.get_mut("background") {
        shapes_to_v2(background);
    }
}

/// Paths, components, anchors and guides of a layer or background.
fn shapes_to_v3(layer: &mut Dict) {
    let paths = take_array(layer, "paths");
    let components = take_array(layer, "components");
    if !paths.is_empty() || !components.is_empty() {
        let shapes = paths
            .into_iter()
            .map(path_to_v3)
            .chain(components.into_iter().map(component_to_v3))
            .collect();
        layer.insert("shapes".into(), Plist::Array(shapes));
    }
    rename_key(layer, "guideLines", "guides");
    for key in ["anchors", "guides"] {
        if let Some(Plist::Array(items)) = layer.get_mut(key) {
            for item in items.iter_mut().filter_map(Plist::as_dict_mut) {
                if let Some(pos) = item.remove("position") {
                    let converted = pos
                        .as_str()
                        .and_then(parse_point_string)
                        .map(|(x, y)| Plist::Array(vec![x.to_plist(), y.to_plist()]))
                        .unwrap_or(pos);
                    item.insert("pos".into(), converted);
                }
            }
        }
    }
}

fn shapes_to_v2(layer: &mut Dict) {
    let shapes = take_array(layer, "shapes");
    let (mut paths, mut components) = (Vec::new(), Vec::new());
    for shape in shapes {
        if shape.get("ref").is_some() {
            components.push(component_to_v2(shape));
        } else {
            paths.push(path_to_v2(shape));
        }
    }
    if !paths.is_empty() {
        layer.insert("paths".into(), Plist::Array(paths));
    }
    if !components.is_empty() {
        layer.insert("components".into(), Plist::Array(components));
    }
    rename_key(layer, "guides", "guideLines");
    for key in ["anchors", "guideLines"] {
        if let Some(Plist::Array(items)) = layer.get_mut(key) {
            for item in items.iter_mut().filter_map(Plist::as_dict_mut) {
                if let Some(pos) = item.remove("pos") {
                    let converted = match point_from_tuple(&pos) {
                        Some(point) => Plist::String(point_string(point)),
                        None => pos,
                    };
                    item.insert("position".into(), converted);
                }
            }
        }
    }
}

fn path_to_v3(path: Plist) -> Plist {
    let Plist::Dictionary(mut path) = path else {
        return path;
    };
    if let Some(Plist::Array(nodes)) = path.get_mut("nodes") {
        for node in nodes.iter_mut() {
            if let Some(converted) = node.as_str().and_then(node_to_v3) {
                *node = converted;
            }
        }
    }
    Plist::Dictionary(path)
}

fn path_to_v2(path: Plist) -> Plist {
    let Plist::Dictionary(mut path) = path else {
        return path;
    };
    if let Some(Plist::Array(nodes)) = path.get_mut("nodes") {
        for node in nodes.iter_mut() {
            if let Some(converted) = node_to_v2(node) {
                *node = Plist::String(converted);
            }
        }
    }
    Plist::Dictionary(path)
}

/// `"354 0 LINE SMOOTH"` to `(354,0,ls)`.
fn node_to_v3(node: &str) -> Option<Plist> {
    let mut parts = node.split_whitespace();
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    let smooth = node.ends_with(" SMOOTH");
    let node_type = match (parts.next()?, smooth) {
        ("LINE", false) => "l",
        ("LINE", true) => "ls",
        ("CURVE", false) => "c",
        ("CURVE", true) => "cs",
        ("QCURVE", false) => "q",
        ("QCURVE", true) => "qs",
        ("OFFCURVE", _) => "o",
        _ => return None,
    };
    Some(Plist::Array(vec![
        x.to_plist(),
        y.to_plist(),
        node_type.into(),
    ]))
}

fn node_to_v2(node: &Plist) -> Option<String> {
    let tuple = node.as_array()?;
    let x = tuple.first()?.as_f64()?;
    let y = tuple.get(1)?.as_f64()?;
    let node_type = match tuple.get(2)?.as_str()? {
        "l" => "LINE",
        "ls" => "LINE SMOOTH",
        "c" => "CURVE",
        "cs" => "CURVE SMOOTH",
        "q" => "QCURVE",
        "qs" => "QCURVE SMOOTH",
        "o" => "OFFCURVE",
        _ => return None,
    };
    Some(format!(
        "{} {} {node_type}",
        format_number(x),
        format_number(y)
    ))
}

fn component_to_v3(component: Plist) -> Plist {
    let Plist::Dictionary(mut component) = component else {
        return component;
    };
    rename_key(&mut component, "name", "ref");
    let affine = component
        .remove("transform")
        .and_then(|t| t.as_str().and_then(parse_transform_string));
    if let Some(affine) = affine {
        let t = from_affine(affine);
        let (x, y) = (round5(t.translate_x), round5(t.translate_y));
        if x != 0.0 || y != 0.0 {
            component.insert("pos".into(), Plist::Array(vec![x.to_plist(), y.to_plist()]));
        }
        let angle = round5(t.rotation);
        if angle != 0.0 {
            component.insert("angle".into(), angle.to_plist());
        }
        let (sx, sy) = (round5(t.scale_x), round5(t.scale_y));
        if sx != 1.0 || sy != 1.0 {
            component.insert("scale".into(), Plist::Array(vec![sx.to_plist(), sy.to_plist()]));
        }
    }
    Plist::Dictionary(component)
}

fn component_to_v2(component: Plist) -> Plist {
    let Plist::Dictionary(mut component) = component else {
        return component;
    };
    rename_key(&mut component, "ref", "name");
    let (translate_x, translate_y) = component
        .remove("pos")
        .as_ref()
        .and_then(point_from_tuple)
        .unwrap_or((0.0, 0.0));
    let rotation = component
        .remove("angle")
        .and_then(|a| a.as_f64())
        .unwrap_or(0.0);
    let (scale_x, scale_y) = component
        .remove("scale")
        .as_ref()
        .and_then(point_from_tuple)
        .unwrap_or((1.0, 1.0));
    let affine = to_affine(&DecomposedTransform {
        translate_x,
        translate_y,
        rotation,
        scale_x,
        scale_y,
        ..Default::default()
    });
    if affine != Affine::IDENTITY {
        component.insert("transform".into(), Plist::String(transform_string(affine)));
    }
    Plist::Dictionary(component)
}

/// Builds the Glyphs 3 shaped font header of a Glyphs 2 font dictionary.
///
/// Only what the typed font view reads is converted; the result is never
/// written back.
pub fn font_to_v3(font: &Dict) -> Plist {
    let mut out: Dict = font
        .iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                "glyphs" | "fontMaster" | "instances" | "features" | "copyright" | "designer"
                    | "designerURL" | "manufacturer" | "manufacturerURL"
            )
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let parameters = font.get("customParameters").and_then(Plist::as_array);
    let parameter = |name: &str| {
        parameters?
            .iter()
            .find(|p| p.get("name").and_then(Plist::as_str) == Some(name))
            .and_then(|p| p.get("value"))
    };

    let axes: Vec<Plist> = match parameter("Axes").and_then(Plist::as_array) {
        Some(axes) => axes
            .iter()
            .map(|axis| {
                let mut v3 = Dict::new();
                for (old, new) in [("Name", "name"), ("Tag", "tag"), ("Hidden", "hidden")] {
                    if let Some(value) = axis.get(old) {
                        v3.insert(new.into(), value.clone());
                    }
                }
                Plist::Dictionary(v3)
            })
            .collect(),
        None => DEFAULT_AXES
            .iter()
            .map(|(name, tag)| {
                Plist::Dictionary(Dict::from([
                    ("name".to_string(), Plist::from(*name)),
                    ("tag".to_string(), Plist::from(*tag)),
                ]))
            })
            .collect(),
    };
    let axis_count = axes.len();
    out.insert("axes".into(), Plist::Array(axes));

    out.insert(
        "metrics".into(),
        Plist::Array(
            ["ascender", "baseline", "descender", "cap height", "x-height", "italic angle"]
                .into_iter()
                .map(|t| Plist::Dictionary(Dict::from([("type".to_string(), Plist::from(t))])))
                .collect(),
        ),
    );

    let masters = array_of(font, "fontMaster")
        .iter()
        .filter_map(Plist::as_dict)
        .map(|master| master_to_v3(master, axis_count))
        .collect();
    out.insert("fontMaster".into(), Plist::Array(masters));

    let instances = array_of(font, "instances")
        .iter()
        .filter_map(Plist::as_dict)
        .map(|instance| instance_to_v3(instance, axis_count))
        .collect();
    out.insert("instances".into(), Plist::Array(instances));

    let mut properties = Vec::new();
    let root_properties = [
        ("copyright", "copyrights"),
        ("designer", "designers"),
        ("designerURL", "designerURL"),
        ("manufacturer", "manufacturers"),
        ("manufacturerURL", "manufacturerURL"),
    ];
    for (old, new) in root_properties {
        if let Some(value) = font.get(old) {
            properties.push(property(new, value.clone()));
        }
    }
    for (old, new) in [("license", "licenses"), ("trademark", "trademarks"), ("vendorID", "vendorID")] {
        if let Some(value) = parameter(old) {
            properties.push(property(new, value.clone()));
        }
    }
    out.insert("properties".into(), Plist::Array(properties));

    let features = array_of(font, "features")
        .iter()
        .cloned()
        .map(|feature| match feature {
            Plist::Dictionary(mut feature) => {
                rename_key(&mut feature, "name", "tag");
                Plist::Dictionary(feature)
            }
            other => other,
        })
        .collect();
    out.insert("features".into(), Plist::Array(features));

    Plist::Dictionary(out)
}

fn master_to_v3(master: &Dict, axis_count: usize) -> Plist {
    let mut out = master.clone();
    let axes_values = MASTER_AXIS_KEYS
        .iter()
        .take(axis_count)
        .map(|(key, default)| take_f64(&mut out, key, *default).to_plist())
        .collect();
    out.insert("axesValues".into(), Plist::Array(axes_values));

    let name = master
        .get("customParameters")
        .and_then(Plist::as_array)
        .and_then(|params| {
            params
                .iter()
                .find(|p| p.get("name").and_then(Plist::as_str) == Some("Master Name"))
        })
        .and_then(|p| p.get("value"))
        .and_then(Plist::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| master_name(master));
    for key in ["weight", "width", "custom"] {
        out.remove(key);
    }
    out.insert("name".into(), name.into());

    let zones: Vec<(f64, f64)> = out
        .remove("alignmentZones")
        .and_then(Plist::into_array)
        .unwrap_or_default()
        .iter()
        .filter_map(|zone| zone.as_str().and_then(parse_point_string))
        .collect();
    let over_at = |pos: f64| {
        zones
            .iter()
            .find(|(zone_pos, _)| *zone_pos == pos)
            .map(|(_, size)| *size)
            .unwrap_or(0.0)
    };
    let ascender = take_f64(&mut out, "ascender", DEFAULT_ASCENDER);
    let descender = take_f64(&mut out, "descender", DEFAULT_DESCENDER);
    let cap_height = take_f64(&mut out, "capHeight", DEFAULT_CAP_HEIGHT);
    let x_height = take_f64(&mut out, "xHeight", DEFAULT_X_HEIGHT);
    let italic_angle = take_f64(&mut out, "italicAngle", 0.0);
    let metric_values = [ascender, 0.0, descender, cap_height, x_height]
        .into_iter()
        .map(|pos| metric_value(pos, over_at(pos)))
        .chain(std::iter::once(metric_value(italic_angle, 0.0)))
        .collect();
    out.insert("metricValues".into(), Plist::Array(metric_values));

    rename_key(&mut out, "guideLines", "guides");
    shapes_to_v3(&mut out);
    Plist::Dictionary(out)
}

fn metric_value(pos: f64, over: f64) -> Plist {
    let mut value = Dict::new();
    if over != 0.0 {
        value.insert("over".into(), over.to_plist());
    }
    if pos != 0.0 {
        value.insert("pos".into(), pos.to_plist());
    }
    Plist::Dictionary(value)
}

/// The name Glyphs 2 derives from a master's width, weight and custom names.
fn master_name(master: &Dict) -> String {
    let get = |key: &str, default: &str| {
        master
            .get(key)
            .and_then(Plist::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let custom = get("custom", "");
    let mut names: Vec<String> = [get("width", "Regular"), get("weight", "Regular"), custom.clone()]
        .into_iter()
        .filter(|n| !n.is_empty())
        .collect();
    while names.len() > 1 {
        match names.iter().position(|n| n == "Regular") {
            Some(index) => {
                names.remove(index);
            }
            None => break,
        }
    }
    let italic = master
        .get("italicAngle")
        .and_then(Plist::as_f64)
        .is_some_and(|angle| angle != 0.0);
    if italic {
        if names == ["Regular"] {
            return "Italic".to_string();
        }
        if !custom.contains("Italic") {
            names.push("Italic".to_string());
        }
    }
    names.join(" ")
}

fn instance_to_v3(instance: &Dict, axis_count: usize) -> Plist {
    let mut out = instance.clone();
    let axes_values = INSTANCE_AXIS_KEYS
        .iter()
        .take(axis_count)
        .map(|(key, default)| take_f64(&mut out, key, *default).to_plist())
        .collect();
    out.insert("axesValues".into(), Plist::Array(axes_values));
    if let Some(weight) = out.remove("weightClass") {
        let class = weight.as_i64().or_else(|| weight.as_str().and_then(weight_class));
        if let Some(class) = class {
            out.insert("weightClass".into(), class.into());
        }
    }
    if let Some(width) = out.remove("widthClass") {
        let class = width.as_i64().or_else(|| width.as_str().and_then(width_class));
        if let Some(class) = class {
            out.insert("widthClass".into(), class.into());
        }
    }
    Plist::Dictionary(out)
}

fn weight_class(name: &str) -> Option<i64> {
    Some(match name {
        "Thin" => 100,
        "ExtraLight" | "UltraLight" => 200,
        "Light" => 300,
        "Normal" | "Regular" => 400,
        "Medium" => 500,
        "DemiBold" | "SemiBold" => 600,
        "Bold" => 700,
        "ExtraBold" | "UltraBold" => 800,
        "Black" | "Heavy" => 900,
        _ => return None,
    })
}

fn width_class(name: &str) -> Option<i64> {
    Some(match name {
        "Ultra Condensed" => 1,
        "Extra Condensed" => 2,
        "Condensed" => 3,
        "SemiCondensed" => 4,
        "Medium (normal)" => 5,
        "Semi Expanded" => 6,
        "Expanded" => 7,
        "Extra Expanded" => 8,
        "Ultra Expanded" => 9,
        _ => return None,
    })
}

fn property(key: &str, value: Plist) -> Plist {
    Plist::Dictionary(Dict::from([
        ("key".to_string(), Plist::from(key)),
        ("value".to_string(), value),
    ]))
}

/// Glyphs 2 code points: hex strings, comma separated for several. A code
/// point made only of decimal digits parses as an integer and is read back
/// as hex too.
fn codepoints_from_hex(unicode: &Plist) -> Option<Plist> {
    let hex = match unicode {
        Plist::String(s) => s.clone(),
        Plist::Integer(i) => i.to_string(),
        _ => return None,
    };
    let codepoints = hex
        .split(',')
        .map(|cp| i64::from_str_radix(cp.trim(), 16).ok().map(Plist::Integer))
        .collect::<Option<Vec<_>>>()?;
    match <[Plist; 1]>::try_from(codepoints) {
        Ok([single]) => Some(single),
        Err(codepoints) => Some(Plist::Array(codepoints)),
    }
}

fn codepoints_to_hex(unicode: &Plist) -> Option<Plist> {
    let codepoints = match unicode {
        Plist::Integer(i) => vec![*i],
        Plist::Array(array) => array.iter().map(Plist::as_i64).collect::<Option<_>>()?,
        _ => return None,
    };
    let hex: Vec<String> = codepoints.iter().map(|cp| format!("{cp:04X}")).collect();
    Some(Plist::String(hex.join(",")))
}

/// The numbers between the braces of a brace layer name, `"Bold {100, 50}"`.
pub fn brace_coordinates(name: &str) -> Option<Vec<f64>> {
    let start = name.find('{')?;
    let end = start + name[start..].find('}')?;
    name[start + 1..end]
        .split(',')
        .map(|v| v.trim().parse().ok())
        .collect()
}

/// `"{12, 34.5}"` to `(12.0, 34.5)`.
pub fn parse_point_string(s: &str) -> Option<(f64, f64)> {
    let inner = s.trim().strip_prefix('{')?.strip_suffix('}')?;
    let (x, y) = inner.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

pub fn point_string((x, y): (f64, f64)) -> String {
    format!("{{{}, {}}}", format_number(x), format_number(y))
}

/// `"{a, b, c, d, tx, ty}"` to an affine matrix.
pub fn parse_transform_string(s: &str) -> Option<Affine> {
    let inner = s.trim().strip_prefix('{')?.strip_suffix('}')?;
    let coeffs: Vec<f64> = inner
        .split(',')
        .map(|v| v.trim().parse().ok())
        .collect::<Option<_>>()?;
    let coeffs: [f64; 6] = coeffs.try_into().ok()?;
    Some(Affine::new(coeffs))
}

pub fn transform_string(affine: Affine) -> String {
    let coeffs: Vec<String> = affine.as_coeffs().into_iter().map(format_number).collect();
    format!("{{{}}}", coeffs.join(", "))
}

/// A number the way Glyphs writes it: at most five decimals, no trailing
/// zeros.
pub fn format_number(value: f64) -> String {
    let value = round5(value);
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn point_from_tuple(plist: &Plist) -> Option<(f64, f64)> {
    match plist.as_array()? {
        [x, y] => Some((x.as_f64()?, y.as_f64()?)),
        _ => None,
    }
}

fn rename_key(dict: &mut Dict, old: &str, new: &str) {
    if let Some(value) = dict.remove(old) {
        dict.insert(new.to_string(), value);
    }
}

fn take_array(dict: &mut Dict, key: &str) -> Vec<Plist> {
    dict.remove(key).and_then(Plist::into_array).unwrap_or_default()
}

fn take_f64(dict: &mut Dict, key: &str, default: f64) -> f64 {
    dict.remove(key)
        .and_then(|value| match value {
            Plist::String(s) => s.parse().ok(),
            value => value.as_f64(),
        })
        .unwrap_or(default)
}

fn array_of<'a>(dict: &'a Dict, key: &str) -> &'a [Plist] {
    dict.get(key).and_then(Plist::as_array).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::font::{Font, MetricType};
    use crate::from_plist::FromPlist;

    fn parse(source: &str) -> Plist {
        Plist::parse(source).unwrap()
    }

    const V2_GLYPH: &str = r#"{
glyphname = Adieresis;
layers = (
{
anchors = (
{
name = top;
position = "{300, 700}";
}
);
components = (
{
name = A;
},
{
name = dieresiscomb;
transform = "{-1, 0, 0, 1, 600, 20}";
}
);
layerId = m01;
paths = (
{
closed = 1;
nodes = (
"10 0 LINE",
"20 10 OFFCURVE",
"30 10 OFFCURVE",
"40 0 CURVE SMOOTH"
);
}
);
width = 600;
}
);
leftKerningGroup = A;
unicode = 00C4;
}"#;

    #[test]
    fn upgrade_glyph() {
        let v3 = glyph_to_v3(parse(V2_GLYPH));
        assert_eq!(v3.get("kernLeft").and_then(Plist::as_str), Some("A"));
        assert_eq!(v3.get("unicode"), Some(&Plist::Integer(0xC4)));

        let layer = &v3.get("layers").unwrap().as_array().unwrap()[0];
        let shapes = layer.get("shapes").unwrap().as_array().unwrap();
        assert_eq!(shapes.len(), 3);
        assert_eq!(
            shapes[0].get("nodes").unwrap().as_array().unwrap()[3],
            parse("(40,0,cs)")
        );
        assert_eq!(shapes[1], parse("{ref = A;}"));
        assert_eq!(shapes[2], parse("{ref = dieresiscomb; pos = (600,20); scale = (-1,1);}"));
        assert_eq!(
            layer.get("anchors").unwrap().as_array().unwrap()[0],
            parse("{name = top; pos = (300,700);}")
        );
    }

    #[test]
    fn downgrade_reverses_upgrade() {
        let original = parse(V2_GLYPH);
        assert_eq!(glyph_to_v2(glyph_to_v3(original.clone())), original);
    }

    #[test]
    fn numeric_hex_codepoints() {
        let glyph = parse("{glyphname = one; unicode = 0031;}");
        assert_eq!(glyph_to_v3(glyph).get("unicode"), Some(&Plist::Integer(0x31)));
        let glyph = parse("{glyphname = uni2000; unicode = 2000;}");
        assert_eq!(glyph_to_v3(glyph).get("unicode"), Some(&Plist::Integer(0x2000)));
        let glyph = parse("{glyphname = two; unicode = \"0032,0033\";}");
        assert_eq!(
            glyph_to_v3(glyph.clone()).get("unicode"),
            Some(&parse("(50, 51)"))
        );
        assert_eq!(glyph_to_v2(glyph_to_v3(glyph.clone())), glyph);
    }

    #[test]
    fn brace_and_smart_layers() {
        let glyph = parse(
            r#"{glyphname = a; layers = (
            {associatedMasterId = m01; layerId = L1; name = "Intermediate {150}"; width = 500;},
            {associatedMasterId = m01; layerId = L2; name = Wide; userData = {PartSelection = {Width = 2;};}; width = 700;}
            );}"#,
        );
        let v3 = glyph_to_v3(glyph.clone());
        let layers = v3.get("layers").unwrap().as_array().unwrap();
        assert_eq!(layers[0].get("attr"), Some(&parse("{coordinates = (150);}")));
        assert_eq!(layers[1].get("partSelection"), Some(&parse("{Width = 2;}")));
        assert!(layers[1].get("userData").is_none());
        assert_eq!(glyph_to_v2(v3), glyph);
    }

    #[test]
    fn font_header() {
        let font = parse(
            r#"{
            copyright = "Someone";
            customParameters = ({name = vendorID; value = ABCD;});
            familyName = Test;
            features = ({code = "sub a by b;"; name = ss01;});
            fontMaster = (
            {alignmentZones = ("{800, 16}", "{0, -16}"); ascender = 800; id = m01; weightValue = 90; xHeight = 480;},
            {id = m02; italicAngle = 10; weight = Bold; weightValue = 190;}
            );
            instances = ({interpolationWeight = 190; name = Bold; weightClass = Bold;});
            }"#,
        );
        let v3 = font_to_v3(font.as_dict().unwrap());
        let font = Font::from_plist(v3).unwrap();

        assert_eq!(font.axes.len(), 3);
        assert_eq!(font.font_master[0].axes_values, vec![90.0, 100.0, 0.0]);
        assert_eq!(font.font_master[0].name, "Regular");
        assert_eq!(font.font_master[1].name, "Bold Italic");
        let master = &font.font_master[0];
        let ascender = font
            .master_metric(master, MetricType::Ascender)
            .unwrap();
        assert_eq!((ascender.pos, ascender.over), (800.0, 16.0));
        let x_height = font
            .master_metric(master, MetricType::XHeight)
            .unwrap();
        assert_eq!(x_height.pos, 480.0);
        let cap_height = font
            .master_metric(master, MetricType::CapHeight)
            .unwrap();
        assert_eq!(cap_height.pos, DEFAULT_CAP_HEIGHT);
        assert_eq!(font.instances[0].axes_values, vec![190.0, 100.0, 0.0]);
        assert_eq!(font.instances[0].weight_class, 700);
        assert_eq!(font.property("copyrights"), Some("Someone"));
        assert_eq!(font.property("vendorID"), Some("ABCD"));
        assert_eq!(font.features[0].tag, "ss01");
    }

    #[test]
    fn numbers_and_transforms() {
        assert_eq!(format_number(600.0), "600");
        assert_eq!(format_number(-0.000001), "0");
        assert_eq!(format_number(12.345678), "12.34568");
        assert_eq!(parse_point_string("{12, -34.5}"), Some((12.0, -34.5)));
        assert_eq!(point_string((12.0, -34.5)), "{12, -34.5}");
        let affine = parse_transform_string("{1, 0, 0, 1, 10, -5}").unwrap();
        assert_eq!(affine, Affine::translate((10.0, -5.0)));
        assert_eq!(transform_string(affine), "{1, 0, 0, 1, 10, -5}");
        assert_eq!(brace_coordinates("Bold {100, 50.5}"), Some(vec![100.0, 50.5]));
        assert_eq!(brace_coordinates("Bold"), None);
    }
}
