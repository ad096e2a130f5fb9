//! Typed Glyphs data <-> host objects.

use std::collections::{BTreeMap, BTreeSet};

use kurbo::{Affine, Point, Vec2};
use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::axes::DesignSpace;
use crate::classes::{
    Anchor, Component, CustomData, FontInfo, FontSource, GlyphAxis, GlyphSource, Guideline, Layer,
    LineMetric, Location, PackedPath, StaticGlyph, VariableGlyph,
};
use crate::error::BackendError;
use crate::font::{
    Font, FontMaster, MetricType, DEFAULT_ASCENDER, DEFAULT_CAP_HEIGHT, DEFAULT_DESCENDER,
    DEFAULT_X_HEIGHT,
};
use crate::from_plist::FromPlist;
use crate::glyph::{self, BackgroundLayer, Color, Glyph, GuideLine, Scale, Shape, SmartComponentAxis};
use crate::location::{
    default_glyph_location, find_nearest_location_index, fix_source_locations, make_dense,
    make_sparse, split_location,
};
use crate::plist::Plist;
use crate::to_plist::ToPlist;
use crate::transform::{from_affine, round5, to_affine};

pub const GLYPH_COLOR_KEY: &str = "com.glyphsapp.glyph-color";
pub const LAYER_ID_KEY: &str = "com.glyphsapp.layer.layerId";
pub const ASSOCIATED_MASTER_ID_KEY: &str = "com.glyphsapp.layer.associatedMasterId";
pub const COMPONENT_ALIGNMENT_KEY: &str = "com.glyphsapp.component.alignment";
const SOURCE_NAME_KEY: &str = "xyz.fontra.source-name";
const LAYER_NAME_KEY: &str = "xyz.fontra.layer-name";

const LOCAL_SUFFIX: &str = " (local)";
const POLE_MIN: i64 = 1;
const POLE_MAX: i64 = 2;
const SKEW_TOLERANCE: f64 = 1e-9;

/// Converts glyphs between the Glyphs model and the host model, given the
/// font they belong to.
pub struct GlyphConverter<'a> {
    pub font: &'a Font,
    pub space: &'a DesignSpace,
}

impl GlyphConverter<'_> {
    pub fn read_glyph(&self, glyph: &Glyph) -> VariableGlyph {
        let mut custom_data = CustomData::new();
        if let Some(color) = &glyph.color {
            custom_data.insert(
                GLYPH_COLOR_KEY.to_string(),
                plist_to_json(&color.clone().to_plist()),
            );
        }

        let local_axes = self.local_axes(glyph);
        let axes_by_name: BTreeMap<&str, &GlyphAxis> = glyph
            .parts_settings
            .iter()
            .map(|axis| axis.name.as_str())
            .zip(local_axes.iter())
            .collect();

        // Group layers by master, masters in order of first appearance.
        let mut master_order: Vec<&str> = Vec::new();
        for layer in &glyph.layers {
            if !master_order.contains(&layer.master_id()) {
                master_order.push(layer.master_id());
            }
        }
        let mut layers: Vec<&glyph::Layer> = glyph.layers.iter().collect();
        layers.sort_by_key(|layer| master_order.iter().position(|id| *id == layer.master_id()));

        let mut sources: Vec<GlyphSource> = Vec::new();
        let mut host_layers = BTreeMap::new();
        let mut seen_locations: Vec<Location> = Vec::new();
        for layer in layers {
            let master_id = layer.master_id();
            let master_name = match self.font.master(master_id) {
                Some(master) => master.name.clone(),
                None => {
                    tracing::warn!(glyph = %glyph.glyphname, master_id, "layer of unknown master");
                    master_id.to_string()
                }
            };
            let brace_location = self.brace_location(layer);
            let smart_location: Location = layer
                .part_selection
                .iter()
                .filter_map(|(name, pole)| {
                    let axis = axes_by_name.get(name.as_str())?;
                    let value = if *pole == POLE_MIN {
                        axis.min_value
                    } else {
                        axis.max_value
                    };
                    (value != axis.default_value).then(|| (axis.name.clone(), value))
                })
                .collect();

            let gs_layer_name = layer.name.clone().unwrap_or_else(|| master_name.clone());
            let source_name = match user_data_str(layer, SOURCE_NAME_KEY) {
                Some(name) => name.to_string(),
                None if !brace_location.is_empty() || !smart_location.is_empty() => {
                    format!("{master_name} / {gs_layer_name}")
                }
                None => gs_layer_name.clone(),
            };
            let mut layer_name = user_data_str(layer, LAYER_NAME_KEY)
                .unwrap_or(&layer.layer_id)
                .to_string();

            let mut location = self
                .space
                .master_locations
                .get(master_id)
                .map(|l| make_sparse(l, &self.space.default_location))
                .unwrap_or_default();
            location.extend(brace_location);
            location.extend(smart_location);

            let (store_layer_id, separator) = if seen_locations.contains(&location) {
                layer_name = format!("{master_id}^{gs_layer_name}");
                (true, '/')
            } else {
                seen_locations.push(location.clone());
                sources.push(GlyphSource {
                    name: source_name,
                    layer_name: layer_name.clone(),
                    location,
                    ..Default::default()
                });
                (layer_name != layer.layer_id, '^')
            };

            let width = layer.width;
            host_layers.insert(
                layer_name.clone(),
                self.read_layer(
                    layer.paths(),
                    layer.components(),
                    &layer.anchors,
                    &layer.guides,
                    width,
                    store_layer_id.then_some(layer.layer_id.as_str()),
                ),
            );
            if let Some(background) = &layer.background {
                host_layers.insert(
                    format!("{layer_name}{separator}background"),
                    self.read_layer(
                        background.paths(),
                        background.components(),
                        &background.anchors,
                        &background.guides,
                        width,
                        None,
                    ),
                );
            }
        }

        let smart_axis_names: BTreeSet<String> =
            local_axes.iter().map(|axis| axis.name.clone()).collect();
        fix_source_locations(&mut sources, &smart_axis_names);

        VariableGlyph {
            name: glyph.glyphname.to_string(),
            axes: local_axes,
            sources,
            layers: host_layers,
            custom_data,
        }
    }

    /// Smart component axes. The default sits at the pole the first layer
    /// uses.
    fn local_axes(&self, glyph: &Glyph) -> Vec<GlyphAxis> {
        let base_poles = glyph.layers.first().map(|layer| &layer.part_selection);
        glyph
            .parts_settings
            .iter()
            .map(|axis| {
                let pole = base_poles.and_then(|poles| poles.get(&axis.name)).copied();
                GlyphAxis {
                    name: self.disambiguate(&axis.name),
                    min_value: axis.bottom_value,
                    default_value: if pole == Some(POLE_MAX) {
                        axis.top_value
                    } else {
                        axis.bottom_value
                    },
                    max_value: axis.top_value,
                    custom_data: Default::default(),
                }
            })
            .collect()
    }

    fn brace_location(&self, layer: &glyph::Layer) -> Location {
        let Some(coordinates) = layer.brace_coordinates() else {
            return Location::new();
        };
        self.font
            .axes
            .iter()
            .zip(coordinates)
            .filter(|(axis, _)| self.space.axes.iter().any(|a| a.name == axis.name))
            .map(|(axis, value)| (axis.name.clone(), *value))
            .collect()
    }

    fn read_layer<'g>(
        &self,
        paths: impl Iterator<Item = &'g glyph::Path>,
        components: impl Iterator<Item = &'g glyph::Component>,
        anchors: &[glyph::Anchor],
        guides: &[GuideLine],
        width: f64,
        layer_id: Option<&str>,
    ) -> Layer {
        let mut custom_data = CustomData::new();
        if let Some(layer_id) = layer_id {
            custom_data.insert(LAYER_ID_KEY.to_string(), layer_id.into());
        }
        Layer {
            glyph: StaticGlyph {
                path: PackedPath::from_glyphs_paths(paths),
                components: components.map(|c| self.read_component(c)).collect(),
                x_advance: Some(width),
                anchors: anchors.iter().map(read_anchor).collect(),
                guidelines: guides.iter().map(read_guideline).collect(),
                ..Default::default()
            },
            custom_data,
        }
    }

    fn read_component(&self, component: &glyph::Component) -> Component {
        let mut custom_data = CustomData::new();
        if component.alignment != 0 {
            custom_data.insert(
                COMPONENT_ALIGNMENT_KEY.to_string(),
                component.alignment.into(),
            );
        }
        Component {
            name: component.reference.clone(),
            transformation: from_affine(component_affine(component)),
            location: component
                .piece
                .iter()
                .map(|(name, value)| (self.disambiguate(name), *value))
                .collect(),
            custom_data,
        }
    }

    fn disambiguate(&self, axis_name: &str) -> String {
        if self.space.axis_names().any(|name| name == axis_name) {
            format!("{axis_name}{LOCAL_SUFFIX}")
        } else {
            axis_name.to_string()
        }
    }

    fn strip_local(&self, axis_name: &str) -> String {
        match axis_name.strip_suffix(LOCAL_SUFFIX) {
            Some(name) if self.space.axis_names().any(|n| n == name) => name.to_string(),
            _ => axis_name.to_string(),
        }
    }

    /// Apply a host glyph to `glyph`, which is the stored version of the
    /// glyph or a fresh one. Nothing is changed when an error is returned,
    /// because `glyph` is consumed and only returned on success.
    pub fn write_glyph(
        &self,
        variable_glyph: &VariableGlyph,
        code_points: &[u32],
        mut glyph: Glyph,
    ) -> Result<Glyph, BackendError> {
        let source_layers = source_layer_names(variable_glyph)?;

        let default_glyph_location = default_glyph_location(&variable_glyph.axes);
        glyph.parts_settings = self.smart_component_axes(variable_glyph)?;

        let mut layer_ids_in_use = BTreeSet::new();
        for source in &variable_glyph.sources {
            let info = self.source_info(source, variable_glyph, &default_glyph_location)?;

            let mut layer_names = vec![source.layer_name.as_str()];
            layer_names.extend(source_layers[source.layer_name.as_str()].iter().copied());
            for layer_name in layer_names {
                let layer_info = setup_layer_info(source, &info, layer_name, variable_glyph, &glyph)?;
                layer_ids_in_use.insert(layer_info.layer_id.clone());
                let host_layer = &variable_glyph.layers[layer_name];

                let gs_layer = glyph.layer_mut_or_insert(&layer_info.layer_id);
                match &layer_info.name {
                    None => {
                        let background = gs_layer.background.get_or_insert_with(Default::default);
                        self.write_background(host_layer, background)?;
                    }
                    Some(gs_name) => {
                        let is_master_layer = gs_layer.layer_id == info.associated_master_id;
                        gs_layer.name = (!is_master_layer).then(|| gs_name.clone());
                        gs_layer.associated_master_id =
                            (!is_master_layer).then(|| info.associated_master_id.clone());
                        if layer_info.is_main_layer {
                            gs_layer.part_selection =
                                self.pole_mapping(&variable_glyph.axes, &info.glyph_location)?;
                        }
                        store_in_dict(
                            &mut gs_layer.user_data,
                            LAYER_NAME_KEY,
                            layer_name,
                            layer_name != layer_info.layer_id && layer_info.store_layer_name,
                        );
                        store_in_dict(
                            &mut gs_layer.user_data,
                            SOURCE_NAME_KEY,
                            &source.name,
                            !source.name.is_empty() && layer_info.store_source_name,
                        );
                        self.write_layer(host_layer, gs_layer)?;
                        if info.is_brace_layer {
                            gs_layer.set_brace_coordinates(Some(info.brace_coordinates.clone()));
                        }
                    }
                }
            }
        }
        glyph
            .layers
            .retain(|layer| layer_ids_in_use.contains(&layer.layer_id));

        glyph.unicode = match code_points {
            [] => None,
            code_points => Some(
                code_points
                    .iter()
                    .map(|cp| {
                        char::from_u32(*cp).ok_or_else(|| {
                            BackendError::InvalidGlyph(format!("bad code point {cp:#X}"))
                        })
                    })
                    .collect::<Result<norad::Codepoints, _>>()?,
            ),
        };
        glyph.color = match variable_glyph.custom_data.get(GLYPH_COLOR_KEY) {
            Some(color) => Some(Color::from_plist(json_to_plist(color))?),
            None => None,
        };
        Ok(glyph)
    }

    fn smart_component_axes(
        &self,
        variable_glyph: &VariableGlyph,
    ) -> Result<Vec<SmartComponentAxis>, BackendError> {
        variable_glyph
            .axes
            .iter()
            .map(|axis| {
                // Glyphs has no axis default; it is one of the poles.
                if axis.default_value != axis.min_value && axis.default_value != axis.max_value {
                    return Err(BackendError::InvalidGlyph(format!(
                        "glyph axis '{}' default value must be at its minimum or maximum",
                        axis.name
                    )));
                }
                Ok(SmartComponentAxis {
                    name: self.strip_local(&axis.name),
                    bottom_value: axis.min_value,
                    top_value: axis.max_value,
                    other_stuff: Default::default(),
                })
            })
            .collect()
    }

    fn pole_mapping(
        &self,
        axes: &[GlyphAxis],
        glyph_location: &Location,
    ) -> Result<BTreeMap<String, i64>, BackendError> {
        axes.iter()
            .map(|axis| {
                let value = glyph_location
                    .get(&axis.name)
                    .copied()
                    .unwrap_or(axis.default_value);
                let pole = if value == axis.min_value {
                    POLE_MIN
                } else if value == axis.max_value {
                    POLE_MAX
                } else {
                    return Err(BackendError::NotImplemented(
                        "intermediate layers within smart glyphs",
                    ));
                };
                Ok((self.strip_local(&axis.name), pole))
            })
            .collect()
    }

    fn source_info(
        &self,
        source: &GlyphSource,
        variable_glyph: &VariableGlyph,
        default_glyph_location: &Location,
    ) -> Result<SourceInfo, BackendError> {
        let mut location = match &source.location_base {
            Some(base) => self.space.master_locations.get(base).cloned().ok_or_else(|| {
                BackendError::InvalidGlyph(format!("unknown location base '{base}'"))
            })?,
            None => Location::new(),
        };
        location.extend(source.location.iter().map(|(k, v)| (k.clone(), *v)));

        let (font_location, glyph_location) = split_location(&location, &variable_glyph.axes);
        let font_location = make_dense(&font_location, &self.space.default_location);
        let glyph_location = make_dense(&glyph_location, default_glyph_location);

        let master_id = self.space.master_at(&font_location).map(str::to_string);
        let is_brace_layer = master_id.is_none();
        let is_smart_layer = glyph_location != *default_glyph_location;
        if is_brace_layer && !variable_glyph.axes.is_empty() {
            return Err(BackendError::NotImplemented(
                "brace layers within smart glyphs",
            ));
        }

        let associated_master_id = match &master_id {
            Some(id) => id.clone(),
            None => source
                .custom_data
                .get(ASSOCIATED_MASTER_ID_KEY)
                .and_then(|id| id.as_str())
                .filter(|id| self.font.master(id).is_some())
                .map(str::to_string)
                .unwrap_or_else(|| self.nearest_master_id(&font_location)),
        };
        let associated_master_name = self
            .font
            .master(&associated_master_id)
            .map(|m| m.name.clone())
            .unwrap_or_default();

        Ok(SourceInfo {
            brace_coordinates: self.brace_coordinates(&font_location, &associated_master_id),
            master_name: master_id
                .as_deref()
                .and_then(|id| self.font.master(id))
                .map(|m| m.name.clone()),
            master_id,
            glyph_location,
            is_brace_layer,
            is_smart_layer,
            associated_master_id,
            associated_master_name,
        })
    }

    /// Brace coordinates cover every Glyphs axis. Axes without a range keep
    /// the value of the associated master.
    fn brace_coordinates(&self, font_location: &Location, associated_master_id: &str) -> Vec<f64> {
        let master = self.font.master(associated_master_id);
        self.font
            .axes
            .iter()
            .enumerate()
            .map(|(index, axis)| {
                font_location.get(&axis.name).copied().unwrap_or_else(|| {
                    master
                        .and_then(|m: &FontMaster| m.axes_values.get(index).copied())
                        .unwrap_or_default()
                })
            })
            .collect()
    }

    fn nearest_master_id(&self, font_location: &Location) -> String {
        let (ids, locations): (Vec<&String>, Vec<&Location>) =
            self.space.master_locations.iter().unzip();
        let index = find_nearest_location_index(font_location, &locations);
        ids.get(index)
            .map(|id| id.to_string())
            .or_else(|| self.font.font_master.first().map(|m| m.id.clone()))
            .unwrap_or_default()
    }

    fn write_layer(&self, layer: &Layer, target: &mut glyph::Layer) -> Result<(), BackendError> {
        target.shapes = self.write_shapes(&layer.glyph)?;
        if let Some(width) = layer.glyph.x_advance {
            target.width = width;
        }
        target.anchors = layer.glyph.anchors.iter().map(write_anchor).collect();
        target.guides = layer.glyph.guidelines.iter().map(write_guideline).collect();
        Ok(())
    }

    fn write_background(
        &self,
        layer: &Layer,
        target: &mut BackgroundLayer,
    ) -> Result<(), BackendError> {
        target.shapes = self.write_shapes(&layer.glyph)?;
        target.anchors = layer.glyph.anchors.iter().map(write_anchor).collect();
        target.guides = layer.glyph.guidelines.iter().map(write_guideline).collect();
        Ok(())
    }

    fn write_shapes(&self, glyph: &StaticGlyph) -> Result<Vec<Shape>, BackendError> {
        let paths = glyph
            .path
            .to_glyphs_paths()
            .into_iter()
            .map(|path| Shape::Path(Box::new(path)));
        let components = glyph
            .components
            .iter()
            .map(|c| self.write_component(c).map(Shape::Component))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths.chain(components).collect())
    }

    fn write_component(&self, component: &Component) -> Result<glyph::Component, BackendError> {
        let t = &component.transformation;
        if t.skew_x.abs() > SKEW_TOLERANCE || t.skew_y.abs() > SKEW_TOLERANCE {
            return Err(BackendError::InvalidGlyph(format!(
                "component '{}' is skewed, which Glyphs does not support",
                component.name
            )));
        }
        let t = from_affine(to_affine(t));
        let mut gs_component = glyph::Component::new(component.name.clone());
        gs_component.pos = Point::new(round5(t.translate_x), round5(t.translate_y));
        gs_component.rotation = round5(t.rotation);
        let (scale_x, scale_y) = (round5(t.scale_x), round5(t.scale_y));
        if scale_x != 1.0 || scale_y != 1.0 {
            gs_component.scale = Some(Scale {
                horizontal: scale_x,
                vertical: scale_y,
            });
        }
        gs_component.alignment = component
            .custom_data
            .get(COMPONENT_ALIGNMENT_KEY)
            .and_then(|a| a.as_i64())
            .unwrap_or_default();
        gs_component.piece = component
            .location
            .iter()
            .map(|(name, value)| (self.strip_local(name), *value))
            .collect();
        Ok(gs_component)
    }
}

struct SourceInfo {
    glyph_location: Location,
    master_id: Option<String>,
    master_name: Option<String>,
    is_brace_layer: bool,
    is_smart_layer: bool,
    associated_master_id: String,
    associated_master_name: String,
    brace_coordinates: Vec<f64>,
}

struct LayerInfo {
    is_main_layer: bool,
    /// `None` for background layers.
    name: Option<String>,
    layer_id: String,
    store_source_name: bool,
    store_layer_name: bool,
}

/// Sub-layer names (`"{layerName}^..."`) of each source layer. Every layer
/// must belong to a source.
fn source_layer_names(
    variable_glyph: &VariableGlyph,
) -> Result<BTreeMap<&str, Vec<&str>>, BackendError> {
    let mut source_layers = BTreeMap::new();
    for source in &variable_glyph.sources {
        if !variable_glyph.layers.contains_key(&source.layer_name) {
            return Err(BackendError::InvalidGlyph(format!(
                "source '{}' refers to missing layer '{}'",
                source.name, source.layer_name
            )));
        }
        let prefix = format!("{}^", source.layer_name);
        // BTreeMap keys iterate sorted.
        let sub_layers: Vec<&str> = variable_glyph
            .layers
            .keys()
            .filter(|name| name.starts_with(&prefix))
            .map(String::as_str)
            .collect();
        source_layers.insert(source.layer_name.as_str(), sub_layers);
    }

    let used: BTreeSet<&str> = source_layers
        .iter()
        .flat_map(|(name, sub_layers)| std::iter::once(*name).chain(sub_layers.iter().copied()))
        .collect();
    if variable_glyph.layers.keys().any(|name| !used.contains(name.as_str())) {
        return Err(BackendError::Unsupported(
            "a layer without glyph source is not supported".into(),
        ));
    }
    Ok(source_layers)
}

fn setup_layer_info(
    source: &GlyphSource,
    info: &SourceInfo,
    layer_name: &str,
    variable_glyph: &VariableGlyph,
    glyph: &Glyph,
) -> Result<LayerInfo, BackendError> {
    let is_main_layer = layer_name == source.layer_name;
    let mut store_source_name = source.name != info.associated_master_name;
    let mut store_layer_name = true;

    let (name, layer_id) = if is_main_layer {
        let (mut name, layer_id) = if info.is_smart_layer {
            (source.name.clone(), layer_id(variable_glyph, layer_name, None))
        } else {
            let name = match &info.master_name {
                Some(master_name) if !info.is_brace_layer => master_name.clone(),
                _ => brace_layer_name(&info.brace_coordinates),
            };
            (
                name,
                layer_id(variable_glyph, layer_name, info.master_id.as_deref()),
            )
        };
        if let Some((master_name, source_name)) = source.name.split_once(" / ") {
            if master_name == info.associated_master_name {
                name = source_name.to_string();
                store_source_name = false;
            }
        }
        (Some(name), layer_id)
    } else {
        let local_name = layer_name
            .split_once('^')
            .map(|(_, local)| local)
            .unwrap_or_default();
        if local_name == "background" || local_name.ends_with("/background") {
            // Drop the separator and "background".
            let base_layer_name = &layer_name[..layer_name.len() - "background".len() - 1];
            let suggested = if local_name == "background" {
                info.master_id.as_deref()
            } else {
                None
            };
            (None, layer_id(variable_glyph, base_layer_name, suggested))
        } else {
            let layer_id = layer_id(variable_glyph, layer_name, None);
            store_layer_name = false;
            if glyph.get_layer(&layer_id).is_none() && info.is_brace_layer {
                return Err(BackendError::Unsupported(
                    "a brace layer can only have an additional source layer named 'background'"
                        .into(),
                ));
            }
            (Some(local_name.to_string()), layer_id)
        }
    };

    Ok(LayerInfo {
        is_main_layer,
        name,
        layer_id,
        store_source_name,
        store_layer_name,
    })
}

/// The Glyphs layer id for a host layer: stored in the layer's custom data,
/// else `suggested`, else the layer name if it is a Glyphs layer id, else
/// derived from the glyph and layer names.
pub fn layer_id(variable_glyph: &VariableGlyph, layer_name: &str, suggested: Option<&str>) -> String {
    let stored = variable_glyph
        .layers
        .get(layer_name)
        .and_then(|layer| layer.custom_data.get(LAYER_ID_KEY))
        .and_then(|id| id.as_str());
    if let Some(id) = stored.or(suggested) {
        return id.to_string();
    }
    if is_glyphs_uuid(layer_name) {
        return layer_name.to_string();
    }
    let digest = Sha1::digest(format!("{}/{layer_name}", variable_glyph.name).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    glyphs_uuid_string(Uuid::from_bytes(bytes))
}

/// Upper-case hyphenated UUIDs, as Glyphs writes them.
fn is_glyphs_uuid(s: &str) -> bool {
    Uuid::parse_str(s).is_ok_and(|uuid| glyphs_uuid_string(uuid) == s)
}

fn glyphs_uuid_string(uuid: Uuid) -> String {
    uuid.hyphenated().to_string().to_uppercase()
}

fn brace_layer_name(coordinates: &[f64]) -> String {
    let values: Vec<String> = coordinates.iter().map(|v| v.to_string()).collect();
    format!("{{{}}}", values.join(","))
}

fn store_in_dict(dict: &mut BTreeMap<String, Plist>, key: &str, value: &str, store: bool) {
    if store {
        dict.insert(key.to_string(), value.into());
    } else {
        dict.remove(key);
    }
}

fn user_data_str<'a>(layer: &'a glyph::Layer, key: &str) -> Option<&'a str> {
    layer.user_data.get(key).and_then(Plist::as_str)
}

/// The affine transformation Glyphs 3 applies to a component.
pub fn component_affine(component: &glyph::Component) -> Affine {
    let scale = component.scale.as_ref();
    Affine::translate(Vec2::new(component.pos.x, component.pos.y))
        * Affine::rotate(component.rotation.to_radians())
        * Affine::scale_non_uniform(
            scale.map(|s| s.horizontal).unwrap_or(1.0),
            scale.map(|s| s.vertical).unwrap_or(1.0),
        )
}

fn read_anchor(anchor: &glyph::Anchor) -> Anchor {
    Anchor {
        name: Some(anchor.name.clone()),
        x: anchor.pos.x,
        y: anchor.pos.y,
        custom_data: anchor
            .user_data
            .iter()
            .map(|(k, v)| (k.clone(), plist_to_json(v)))
            .collect(),
    }
}

fn write_anchor(anchor: &Anchor) -> glyph::Anchor {
    glyph::Anchor {
        name: anchor.name.clone().unwrap_or_default(),
        pos: Point::new(anchor.x, anchor.y),
        user_data: anchor
            .custom_data
            .iter()
            .map(|(k, v)| (k.clone(), json_to_plist(v)))
            .collect(),
        other_stuff: Default::default(),
    }
}

pub(crate) fn read_guideline(guide: &GuideLine) -> Guideline {
    Guideline {
        name: guide.name.clone(),
        x: guide.pos.x,
        y: guide.pos.y,
        angle: guide.angle,
        locked: guide.locked,
        custom_data: Default::default(),
    }
}

fn write_guideline(guideline: &Guideline) -> GuideLine {
    GuideLine {
        name: guideline.name.clone(),
        angle: guideline.angle,
        pos: Point::new(guideline.x, guideline.y),
        locked: guideline.locked,
        other_stuff: Default::default(),
    }
}

/// One source per master, keyed by master id.
pub fn font_sources(font: &Font, space: &DesignSpace) -> BTreeMap<String, FontSource> {
    font.font_master
        .iter()
        .map(|master| {
            let zones = font.alignment_zones(master);
            let zone_at = |value: f64| {
                zones
                    .iter()
                    .find(|(pos, _)| *pos == value)
                    .map(|(_, size)| *size)
                    .unwrap_or(0.0)
            };
            let metric = |metric_type, default| {
                font.master_metric(master, metric_type)
                    .map(|m| m.pos)
                    .unwrap_or(default)
            };
            let line_metrics = [
                ("ascender", metric(MetricType::Ascender, DEFAULT_ASCENDER)),
                ("capHeight", metric(MetricType::CapHeight, DEFAULT_CAP_HEIGHT)),
                ("xHeight", metric(MetricType::XHeight, DEFAULT_X_HEIGHT)),
                ("baseline", 0.0),
                ("descender", metric(MetricType::Descender, DEFAULT_DESCENDER)),
            ]
            .into_iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    LineMetric {
                        value,
                        zone: zone_at(value),
                    },
                )
            })
            .collect();
            let source = FontSource {
                name: master.name.clone(),
                location: space
                    .master_locations
                    .get(&master.id)
                    .cloned()
                    .unwrap_or_default(),
                line_metrics_horizontal_layout: line_metrics,
                italic_angle: metric(MetricType::ItalicAngle, 0.0),
                guidelines: master.guides.iter().map(read_guideline).collect(),
                ..Default::default()
            };
            (master.id.clone(), source)
        })
        .collect()
}

/// Glyphs property keys for each font info field.
const PROPERTIES: &[(&str, &str)] = &[
    ("copyright", "copyrights"),
    ("designer", "designers"),
    ("designerURL", "designerURL"),
    ("licenseDescription", "licenses"),
    ("manufacturer", "manufacturers"),
    ("manufacturerURL", "manufacturerURL"),
    ("trademark", "trademarks"),
    ("vendorID", "vendorID"),
];

pub fn font_info(font: &Font) -> FontInfo {
    let property = |field: &str| {
        PROPERTIES
            .iter()
            .find(|(name, _)| *name == field)
            .and_then(|(_, key)| font.property(key))
            .map(str::to_string)
    };
    FontInfo {
        family_name: (!font.family_name.is_empty()).then(|| font.family_name.clone()),
        version_major: font.version_major,
        version_minor: font.version_minor,
        copyright: property("copyright"),
        trademark: property("trademark"),
        designer: property("designer"),
        designer_url: property("designerURL"),
        manufacturer: property("manufacturer"),
        manufacturer_url: property("manufacturerURL"),
        license_description: property("licenseDescription"),
        vendor_id: property("vendorID"),
        custom_data: Default::default(),
    }
}

pub(crate) fn plist_to_json(plist: &Plist) -> serde_json::Value {
    match plist {
        Plist::Dictionary(dict) => serde_json::Value::Object(
            dict.iter()
                .map(|(k, v)| (k.clone(), plist_to_json(v)))
                .collect(),
        ),
        Plist::Array(array) => array.iter().map(plist_to_json).collect(),
        Plist::String(s) => s.clone().into(),
        Plist::Integer(i) => (*i).into(),
        Plist::Float(f) => (*f).into(),
        Plist::Data(data) => data.iter().map(|b| serde_json::Value::from(*b)).collect(),
    }
}

pub(crate) fn json_to_plist(value: &serde_json::Value) -> Plist {
    use serde_json::Value;
    match value {
        Value::Null => Plist::String(String::new()),
        Value::Bool(b) => b.to_plist(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Plist::Integer(i),
            None => n.as_f64().unwrap_or_default().to_plist(),
        },
        Value::String(s) => s.as_str().into(),
        Value::Array(array) => Plist::Array(array.iter().map(json_to_plist).collect()),
        Value::Object(map) => Plist::Dictionary(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_plist(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::classes::DecomposedTransform;

    const FONT: &str = r#"{
.formatVersion = 3;
axes = ({name = Weight; tag = wght;});
fontMaster = (
{axesValues = (400); id = m01; name = Regular;},
{axesValues = (700); id = m02; name = Bold;}
);
}"#;

    fn font() -> Font {
        Font::from_plist(Plist::parse(FONT).unwrap()).unwrap()
    }

    fn parse_glyph(source: &str) -> Glyph {
        Glyph::from_plist(Plist::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn uuid_layer_ids() {
        assert!(is_glyphs_uuid("9B2B5A1C-7F1A-4C1B-A6B5-25B1E3C9E0AD"));
        assert!(!is_glyphs_uuid("9b2b5a1c-7f1a-4c1b-a6b5-25b1e3c9e0ad"));
        assert!(!is_glyphs_uuid("m01"));

        let variable_glyph = VariableGlyph {
            name: "a".into(),
            ..Default::default()
        };
        let id = layer_id(&variable_glyph, "Light", None);
        assert!(is_glyphs_uuid(&id), "{id}");
        assert_eq!(id, layer_id(&variable_glyph, "Light", None));
        assert_eq!(layer_id(&variable_glyph, "Light", Some("m01")), "m01");
    }

    #[test]
    fn brace_layer_names() {
        assert_eq!(brace_layer_name(&[550.0]), "{550}");
        assert_eq!(brace_layer_name(&[550.5, 100.0]), "{550.5,100}");
    }

    #[test]
    fn json_conversion() {
        let plist = Plist::parse("{a = (1, 2.5, x); b = {c = 0;};}").unwrap();
        let value = plist_to_json(&plist);
        assert_eq!(value, json!({"a": [1, 2.5, "x"], "b": {"c": 0}}));
        assert_eq!(json_to_plist(&value), plist);
    }

    #[test]
    fn master_and_brace_layers() {
        let font = font();
        let space = DesignSpace::new(&font);
        let converter = GlyphConverter {
            font: &font,
            space: &space,
        };
        let glyph = parse_glyph(
            r#"{
glyphname = a;
layers = (
{layerId = m01; width = 500;},
{layerId = m02; width = 600; background = {shapes = ({ref = b;});};},
{associatedMasterId = m01; attr = {coordinates = (550);}; layerId = "B1B1B1B1-0000-0000-0000-000000000000"; name = "{550}"; width = 550;},
{associatedMasterId = m01; layerId = "C2C2C2C2-0000-0000-0000-000000000000"; name = Alt; width = 500;}
);
}"#,
        );
        let variable_glyph = converter.read_glyph(&glyph);
        let names: Vec<&str> = variable_glyph.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Regular", "Regular / {550}", "Bold"]);
        assert_eq!(
            variable_glyph.sources[1].location,
            Location::from([("Weight".to_string(), 550.0)])
        );
        assert!(variable_glyph.layers.contains_key("m01^Alt"));
        assert!(variable_glyph.layers.contains_key("m02^background"));
        assert_eq!(
            variable_glyph.layers["m01^Alt"].custom_data[LAYER_ID_KEY],
            json!("C2C2C2C2-0000-0000-0000-000000000000")
        );
        assert_eq!(variable_glyph.layers["m01"].glyph.x_advance, Some(500.0));

        let written = converter
            .write_glyph(&variable_glyph, &[], glyph.clone())
            .unwrap();
        assert_eq!(written, glyph);

        // Layers must belong to a source.
        let mut orphaned = variable_glyph.clone();
        let alternate = orphaned.layers["m01^Alt"].clone();
        orphaned.layers.insert("Alt".into(), alternate);
        let err = converter
            .write_glyph(&orphaned, &[], glyph.clone())
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported(_)));

        let mut writable = variable_glyph.clone();
        writable.layers.remove("m01^Alt");
        let written = converter.write_glyph(&writable, &[0x61], glyph.clone()).unwrap();
        assert_eq!(written.layers.len(), 3);
        assert_eq!(converter.read_glyph(&written), writable);
        let brace = written
            .get_layer("B1B1B1B1-0000-0000-0000-000000000000")
            .unwrap();
        assert_eq!(brace.name.as_deref(), Some("{550}"));
        assert_eq!(brace.brace_coordinates(), Some(&[550.0][..]));
        assert_eq!(written.unicode, Some(norad::Codepoints::new(['a'])));
    }

    #[test]
    fn new_source_layer_names() {
        let font = font();
        let space = DesignSpace::new(&font);
        let converter = GlyphConverter {
            font: &font,
            space: &space,
        };
        let layer = |width: f64| Layer {
            glyph: StaticGlyph {
                x_advance: Some(width),
                ..Default::default()
            },
            custom_data: Default::default(),
        };
        let variable_glyph = VariableGlyph {
            name: "b".into(),
            sources: vec![
                GlyphSource {
                    name: "Regular".into(),
                    layer_name: "light".into(),
                    ..Default::default()
                },
                GlyphSource {
                    name: "Semi".into(),
                    layer_name: "semi".into(),
                    location: Location::from([("Weight".to_string(), 600.0)]),
                    ..Default::default()
                },
            ],
            layers: BTreeMap::from([
                ("light".to_string(), layer(500.0)),
                ("semi".to_string(), layer(580.0)),
            ]),
            ..Default::default()
        };
        let written = converter
            .write_glyph(&variable_glyph, &[], Glyph::new(norad::Name::new("b").unwrap()))
            .unwrap();
        let master = written.get_layer("m01").unwrap();
        assert_eq!(master.name, None);
        assert_eq!(
            master.user_data.get(LAYER_NAME_KEY),
            Some(&Plist::from("light"))
        );
        let semi = &written.layers[1];
        assert_eq!(semi.associated_master_id.as_deref(), Some("m02"));
        assert_eq!(semi.name.as_deref(), Some("{600}"));
        assert_eq!(semi.user_data.get(SOURCE_NAME_KEY), Some(&Plist::from("Semi")));

        let read_back = converter.read_glyph(&written);
        assert_eq!(read_back.sources[0].layer_name, "light");
        assert_eq!(read_back.sources[1].name, "Semi");
        assert_eq!(read_back.sources[1].layer_name, "semi");
    }

    #[test]
    fn smart_glyph() {
        let font = font();
        let space = DesignSpace::new(&font);
        let converter = GlyphConverter {
            font: &font,
            space: &space,
        };
        let glyph = parse_glyph(
            r#"{
glyphname = _part.stem;
layers = (
{layerId = m01; partSelection = {Height = 1;}; width = 100;},
{associatedMasterId = m01; layerId = "A0A0A0A0-0000-0000-0000-000000000000"; name = Tall; partSelection = {Height = 2;}; width = 100;}
);
partsSettings = ({bottomValue = 0; name = Height; topValue = 100;});
}"#,
        );
        let variable_glyph = converter.read_glyph(&glyph);
        assert_eq!(
            variable_glyph.axes,
            vec![GlyphAxis {
                name: "Height".into(),
                min_value: 0.0,
                default_value: 0.0,
                max_value: 100.0,
                custom_data: Default::default(),
            }]
        );
        assert_eq!(variable_glyph.sources[1].name, "Regular / Tall");
        assert_eq!(
            variable_glyph.sources[1].location,
            Location::from([("Height".to_string(), 100.0)])
        );

        let written = converter
            .write_glyph(&variable_glyph, &[], glyph.clone())
            .unwrap();
        assert_eq!(written, glyph);

        let mut bad = variable_glyph.clone();
        bad.axes[0].default_value = 50.0;
        assert!(matches!(
            converter.write_glyph(&bad, &[], glyph.clone()),
            Err(BackendError::InvalidGlyph(_))
        ));
    }

    #[test]
    fn components() {
        let font = font();
        let space = DesignSpace::new(&font);
        let converter = GlyphConverter {
            font: &font,
            space: &space,
        };
        let component = converter.read_component(&glyph::Component {
            pos: Point::new(100.0, 0.0),
            rotation: 90.0,
            alignment: -1,
            piece: BTreeMap::from([("Weight".to_string(), 1.0)]),
            ..glyph::Component::new("acute")
        });
        assert_eq!(component.location.keys().next().map(String::as_str), Some("Weight (local)"));
        assert_eq!(component.custom_data[COMPONENT_ALIGNMENT_KEY], json!(-1));
        assert!((component.transformation.rotation - 90.0).abs() < 1e-9);

        let written = converter.write_component(&component).unwrap();
        assert_eq!(written.rotation, 90.0);
        assert_eq!(written.pos, Point::new(100.0, 0.0));
        assert_eq!(written.piece.keys().next().map(String::as_str), Some("Weight"));
        assert_eq!(written.alignment, -1);

        let skewed = Component {
            name: "acute".into(),
            transformation: DecomposedTransform {
                skew_x: 10.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            converter.write_component(&skewed),
            Err(BackendError::InvalidGlyph(_))
        ));
    }
}
