//! Typed view of a glyph dictionary, in the Glyphs 3 shape.
//!
//! Glyphs 2 glyphs are migrated to this shape before parsing (see
//! [`crate::migrate`]). Every struct keeps the keys it does not model in an
//! `other_stuff` map, so a glyph that is parsed and serialised again keeps
//! everything it had.

use std::collections::BTreeMap;

use kurbo::Point;
use thiserror::Error;

use crate::from_plist::{FromPlist, GlyphsFromPlistError};
use crate::plist::Plist;
use crate::to_plist::ToPlist;

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Glyph {
    #[plist(always_serialise)]
    pub glyphname: norad::Name,
    pub unicode: Option<norad::Codepoints>,
    #[plist(default, always_serialise)]
    pub layers: Vec<Layer>,
    // Group of the right side, used when this glyph is on the left of a pair.
    pub kern_right: Option<String>,
    pub kern_left: Option<String>,
    pub kern_top: Option<String>,
    pub kern_bottom: Option<String>,
    #[plist(default)]
    pub parts_settings: Vec<SmartComponentAxis>,
    pub color: Option<Color>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

/// A glyph-local axis of a smart glyph.
#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct SmartComponentAxis {
    #[plist(always_serialise)]
    pub name: String,
    #[plist(default, always_serialise)]
    pub bottom_value: f64,
    #[plist(default, always_serialise)]
    pub top_value: f64,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Layer {
    pub attr: Option<LayerAttr>,
    pub name: Option<String>,
    pub background: Option<BackgroundLayer>,
    pub associated_master_id: Option<String>,
    #[plist(always_serialise)]
    pub layer_id: String,
    #[plist(default, always_serialise)]
    pub width: f64,
    #[plist(default)]
    pub shapes: Vec<Shape>,
    #[plist(default)]
    pub anchors: Vec<Anchor>,
    #[plist(default)]
    pub guides: Vec<GuideLine>,
    /// Pole (1 = bottom, 2 = top) of each smart axis this layer sits at.
    #[plist(default)]
    pub part_selection: BTreeMap<String, i64>,
    #[plist(default)]
    pub user_data: BTreeMap<String, Plist>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct LayerAttr {
    pub coordinates: Option<Vec<f64>>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, Default, FromPlist, ToPlist, PartialEq)]
pub struct BackgroundLayer {
    #[plist(default)]
    pub anchors: Vec<Anchor>,
    #[plist(default)]
    pub guides: Vec<GuideLine>,
    #[plist(default)]
    pub shapes: Vec<Shape>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Color {
    Index(i64),
    GreyAlpha(u8, u8),
    Rgba(u8, u8, u8, u8),
    Cmyka(u8, u8, u8, u8, u8),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Path(Box<Path>),
    Component(Component),
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Path {
    #[plist(always_serialise, default = true)]
    pub closed: bool,
    #[plist(default, always_serialise)]
    pub nodes: Vec<Node>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub pt: Point,
    pub node_type: NodeType,
    pub attr: Option<BTreeMap<String, Plist>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeType {
    Line,
    LineSmooth,
    OffCurve,
    Curve,
    CurveSmooth,
    QCurve,
    QCurveSmooth,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Component {
    #[plist(rename = "ref", always_serialise)]
    pub reference: String,
    #[plist(rename = "angle", default)]
    pub rotation: f64,
    #[plist(default)]
    pub pos: Point,
    pub scale: Option<Scale>,
    #[plist(default)]
    pub alignment: i64,
    /// Smart component axis values.
    #[plist(default)]
    pub piece: BTreeMap<String, f64>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Scale {
    pub horizontal: f64,
    pub vertical: f64,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct Anchor {
    #[plist(always_serialise)]
    pub name: String,
    #[plist(default)]
    pub pos: Point,
    #[plist(default)]
    pub user_data: BTreeMap<String, Plist>,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

#[derive(Clone, Debug, FromPlist, ToPlist, PartialEq)]
pub struct GuideLine {
    pub name: Option<String>,
    #[plist(default)]
    pub angle: f64,
    #[plist(default)]
    pub pos: Point,
    #[plist(default)]
    pub locked: bool,

    #[plist(rest)]
    pub other_stuff: BTreeMap<String, Plist>,
}

impl Glyph {
    pub fn new(glyphname: norad::Name) -> Self {
        Self {
            glyphname,
            unicode: None,
            layers: Vec::new(),
            kern_right: None,
            kern_left: None,
            kern_top: None,
            kern_bottom: None,
            parts_settings: Vec::new(),
            color: None,
            other_stuff: Default::default(),
        }
    }

    pub fn get_layer(&self, layer_id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_id == layer_id)
    }

    /// The layer with `layer_id`, appended to the layer list if missing.
    pub fn layer_mut_or_insert(&mut self, layer_id: &str) -> &mut Layer {
        let index = match self.layers.iter().position(|l| l.layer_id == layer_id) {
            Some(index) => index,
            None => {
                self.layers.push(Layer::new(layer_id));
                self.layers.len() - 1
            }
        };
        &mut self.layers[index]
    }
}

impl Layer {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self {
            attr: None,
            name: None,
            background: None,
            associated_master_id: None,
            layer_id: layer_id.into(),
            width: 600.0,
            shapes: Vec::new(),
            anchors: Vec::new(),
            guides: Vec::new(),
            part_selection: BTreeMap::new(),
            user_data: BTreeMap::new(),
            other_stuff: BTreeMap::new(),
        }
    }

    /// Master layers carry no `associatedMasterId`; their id is the master id.
    pub fn master_id(&self) -> &str {
        self.associated_master_id
            .as_deref()
            .unwrap_or(&self.layer_id)
    }

    pub fn is_master_layer(&self) -> bool {
        self.master_id() == self.layer_id
    }

    pub fn brace_coordinates(&self) -> Option<&[f64]> {
        self.attr.as_ref().and_then(|a| a.coordinates.as_deref())
    }

    pub fn set_brace_coordinates(&mut self, coordinates: Option<Vec<f64>>) {
        match (&mut self.attr, coordinates) {
            (Some(attr), coordinates) => attr.coordinates = coordinates,
            (None, Some(coordinates)) => {
                self.attr = Some(LayerAttr {
                    coordinates: Some(coordinates),
                    other_stuff: BTreeMap::new(),
                })
            }
            (None, None) => {}
        }
        if self
            .attr
            .as_ref()
            .is_some_and(|a| a.coordinates.is_none() && a.other_stuff.is_empty())
        {
            self.attr = None;
        }
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Path(path) => Some(path.as_ref()),
            Shape::Component(_) => None,
        })
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Component(component) => Some(component),
            Shape::Path(_) => None,
        })
    }
}

impl BackgroundLayer {
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Path(path) => Some(path.as_ref()),
            Shape::Component(_) => None,
        })
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Component(component) => Some(component),
            Shape::Path(_) => None,
        })
    }
}

impl Component {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            rotation: 0.0,
            pos: Point::ZERO,
            scale: None,
            alignment: 0,
            piece: BTreeMap::new(),
            other_stuff: BTreeMap::new(),
        }
    }
}

impl Path {
    pub fn new(closed: bool) -> Path {
        Path {
            closed,
            nodes: Vec::new(),
            other_stuff: BTreeMap::new(),
        }
    }
}

impl NodeType {
    pub fn is_on_curve(self) -> bool {
        self != NodeType::OffCurve
    }

    pub fn is_smooth(self) -> bool {
        matches!(
            self,
            NodeType::LineSmooth | NodeType::CurveSmooth | NodeType::QCurveSmooth
        )
    }

    pub fn glyphs_str(self) -> &'static str {
        match self {
            NodeType::Line => "l",
            NodeType::LineSmooth => "ls",
            NodeType::Curve => "c",
            NodeType::CurveSmooth => "cs",
            NodeType::QCurve => "q",
            NodeType::QCurveSmooth => "qs",
            NodeType::OffCurve => "o",
        }
    }
}

#[derive(Debug, Error)]
#[error("name must be a non-empty string without control characters")]
pub struct NameConversionError;

impl FromPlist for norad::Name {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let name = String::from_plist(plist).map_err(|_| NameConversionError)?;
        Ok(norad::Name::new(&name).map_err(|_| NameConversionError)?)
    }
}

impl ToPlist for norad::Name {
    fn to_plist(self) -> Plist {
        self.to_string().into()
    }
}

#[derive(Debug, Error)]
pub enum ColorConversionError {
    #[error("color can only be parsed from an integer or integer array")]
    WrongVariant,
    #[error("color array must contain 2 (gray, alpha), 4 (RGBA) or 5 (CMYKA) numbers")]
    UnsupportedArray,
    #[error("{0} is out-of-bounds for a u8")]
    OutOfBounds(i64),
}

impl FromPlist for Color {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::Integer(int) => Ok(Color::Index(int)),
            Plist::Array(array) => {
                let numbers: Result<Vec<u8>, _> = array
                    .iter()
                    .map(|v| {
                        let n = v.as_i64().ok_or(ColorConversionError::WrongVariant)?;
                        n.try_into()
                            .map_err(|_| ColorConversionError::OutOfBounds(n))
                    })
                    .collect();
                match *numbers?.as_slice() {
                    [g, a] => Ok(Color::GreyAlpha(g, a)),
                    [r, g, b, a] => Ok(Color::Rgba(r, g, b, a)),
                    [c, m, y, k, a] => Ok(Color::Cmyka(c, m, y, k, a)),
                    _ => Err(ColorConversionError::UnsupportedArray.into()),
                }
            }
            _ => Err(ColorConversionError::WrongVariant.into()),
        }
    }
}

impl ToPlist for Color {
    fn to_plist(self) -> Plist {
        match self {
            Color::Index(int) => int.into(),
            Color::GreyAlpha(g, a) => Plist::Array(vec![g.into(), a.into()]),
            Color::Rgba(r, g, b, a) => Plist::Array(vec![r.into(), g.into(), b.into(), a.into()]),
            Color::Cmyka(c, m, y, k, a) => {
                Plist::Array(vec![c.into(), m.into(), y.into(), k.into(), a.into()])
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ShapeConversionError {
    #[error("shape can only be parsed from a dictionary")]
    WrongVariant,
    #[error("bad component: {0}")]
    BadComponent(Box<GlyphsFromPlistError>),
    #[error("bad path: {0}")]
    BadPath(Box<GlyphsFromPlistError>),
}

impl FromPlist for Shape {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::Dictionary(ref dict) => {
                if dict.contains_key("ref") {
                    Component::from_plist(plist)
                        .map(Shape::Component)
                        .map_err(|e| ShapeConversionError::BadComponent(Box::new(e)).into())
                } else {
                    Path::from_plist(plist)
                        .map(|path| Shape::Path(Box::new(path)))
                        .map_err(|e| ShapeConversionError::BadPath(Box::new(e)).into())
                }
            }
            _ => Err(ShapeConversionError::WrongVariant.into()),
        }
    }
}

impl ToPlist for Shape {
    fn to_plist(self) -> Plist {
        match self {
            Shape::Path(path) => ToPlist::to_plist(*path),
            Shape::Component(component) => ToPlist::to_plist(component),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodepointsConversionError {
    #[error("unicode code point must be in the range U+0000-U+10FFFF, got U+{0:04X}")]
    InvalidCodepoint(i64),
    #[error("codepoints can only be parsed from an integer or integer array")]
    WrongVariant,
}

impl FromPlist for norad::Codepoints {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let parse_one = |n: i64| {
            let cp: u32 = n
                .try_into()
                .map_err(|_| CodepointsConversionError::InvalidCodepoint(n))?;
            char::try_from(cp).map_err(|_| CodepointsConversionError::InvalidCodepoint(n))
        };
        let codepoints: Result<norad::Codepoints, _> = match plist {
            Plist::Integer(n) => Ok(norad::Codepoints::new([parse_one(n)?])),
            Plist::Array(array) => array
                .into_iter()
                .map(|item| match item {
                    Plist::Integer(n) => parse_one(n),
                    _ => Err(CodepointsConversionError::WrongVariant),
                })
                .collect::<Result<_, _>>(),
            _ => Err(CodepointsConversionError::WrongVariant),
        };
        Ok(codepoints?)
    }
}

impl ToPlist for norad::Codepoints {
    fn to_plist(self) -> Plist {
        let mut codepoints: Vec<Plist> = self.iter().map(|cp| Plist::Integer(cp as i64)).collect();
        if codepoints.len() == 1 {
            codepoints.remove(0)
        } else {
            Plist::Array(codepoints)
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeConversionError {
    #[error("nodes can only be parsed from an array of length 3 or 4")]
    WrongVariant,
    #[error("x coordinate must be a float")]
    NotFloatX,
    #[error("y coordinate must be a float")]
    NotFloatY,
    #[error("invalid node attributes")]
    InvalidAttr,
}

impl FromPlist for Node {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let Plist::Array(tuple) = plist else {
            return Err(NodeConversionError::WrongVariant.into());
        };
        if !(3..=4).contains(&tuple.len()) {
            return Err(NodeConversionError::WrongVariant.into());
        }

        let mut tuple_iter = tuple.into_iter();
        let mut next = || tuple_iter.next().ok_or(NodeConversionError::WrongVariant);
        let x = next()?.as_f64().ok_or(NodeConversionError::NotFloatX)?;
        let y = next()?.as_f64().ok_or(NodeConversionError::NotFloatY)?;
        let node_type = next()?
            .as_str()
            .ok_or(NodeTypeParseError)?
            .parse::<NodeType>()?;
        let attr = match next() {
            Ok(attr) => Some(attr.into_dictionary().ok_or(NodeConversionError::InvalidAttr)?),
            Err(_) => None,
        };

        Ok(Node {
            pt: Point::new(x, y),
            node_type,
            attr,
        })
    }
}

impl ToPlist for Node {
    fn to_plist(self) -> Plist {
        // A tuple of length 3 if there are no attributes, otherwise a tuple of
        // length 4.
        let Node {
            pt,
            node_type,
            attr,
        } = self;

        let mut tuple = vec![
            pt.x.to_plist(),
            pt.y.to_plist(),
            node_type.glyphs_str().into(),
        ];
        if let Some(attr) = attr {
            tuple.push(Plist::Dictionary(attr));
        }
        Plist::Array(tuple)
    }
}

#[derive(Debug, Error)]
#[error(r#"node type must be a string containing only "l", "ls", "c", "cs", "q", "qs", or "o""#)]
pub struct NodeTypeParseError;

impl std::str::FromStr for NodeType {
    type Err = NodeTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l" => Ok(NodeType::Line),
            "ls" => Ok(NodeType::LineSmooth),
            "c" => Ok(NodeType::Curve),
            "cs" => Ok(NodeType::CurveSmooth),
            "q" => Ok(NodeType::QCurve),
            "qs" => Ok(NodeType::QCurveSmooth),
            "o" => Ok(NodeType::OffCurve),
            _ => Err(NodeTypeParseError),
        }
    }
}

#[derive(Debug, Error)]
pub enum PointConversionError {
    #[error("point can only be parsed from an array of length 2")]
    WrongVariant,
    #[error("x coordinate must be a float")]
    NotFloatX,
    #[error("y coordinate must be a float")]
    NotFloatY,
}

#[derive(Debug, Error)]
pub enum ScaleConversionError {
    #[error("scale can only be parsed from an array of length 2")]
    WrongVariant,
    #[error("horizontal value must be a float")]
    NotFloatHorizontal,
    #[error("vertical value must be a float")]
    NotFloatVertical,
}

impl FromPlist for Scale {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let Plist::Array(tuple) = plist else {
            return Err(ScaleConversionError::WrongVariant.into());
        };
        let [horizontal, vertical] = tuple.as_slice() else {
            return Err(ScaleConversionError::WrongVariant.into());
        };
        Ok(Scale {
            horizontal: horizontal
                .as_f64()
                .ok_or(ScaleConversionError::NotFloatHorizontal)?,
            vertical: vertical
                .as_f64()
                .ok_or(ScaleConversionError::NotFloatVertical)?,
        })
    }
}

impl ToPlist for Scale {
    fn to_plist(self) -> Plist {
        Plist::Array(vec![self.horizontal.to_plist(), self.vertical.to_plist()])
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;

    fn parse<T: FromPlist>(source: &str) -> T {
        T::from_plist(Plist::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn always_assumes_closed() {
        // Glyphs treats a path without a 'closed' key as closed.
        let ambiguous = Plist::Dictionary(btreemap! {
            "nodes".to_string() => Plist::Array(vec![]),
        });

        let path = Path::from_plist(ambiguous).unwrap();
        assert!(path.closed);
    }

    #[test]
    fn always_writes_closed() {
        let plist = Path::new(false).to_plist();
        assert_eq!(plist.get("closed"), Some(&Plist::Integer(0)));

        let plist = Path::new(true).to_plist();
        assert_eq!(plist.get("closed"), Some(&Plist::Integer(1)));
    }

    #[test]
    fn node_with_attributes() {
        let node: Node = parse("(10,20.5,cs,{name = hr00;})");
        assert_eq!(node.pt, Point::new(10.0, 20.5));
        assert_eq!(node.node_type, NodeType::CurveSmooth);
        assert_eq!(
            node.attr,
            Some(btreemap! { "name".to_string() => Plist::from("hr00") })
        );
        assert_eq!(
            node.to_plist().to_string(),
            "(\n10,\n20.5,\ncs,\n{\nname = hr00;\n}\n)"
        );
    }

    #[test]
    fn unknown_keys_survive() {
        let source = "{\nglyphname = A;\nlastChange = \"2024-01-01 00:00:00 +0000\";\nlayers = (\n{\nhints = (\n);\nlayerId = m01;\nwidth = 600;\n}\n);\nunicode = 65;\n}";
        let glyph: Glyph = parse(source);
        assert_eq!(glyph.unicode, Some(norad::Codepoints::new(['A'])));
        assert!(glyph.other_stuff.contains_key("lastChange"));
        assert!(glyph.layers[0].other_stuff.contains_key("hints"));
        assert_eq!(glyph.to_plist().to_string(), source);
    }

    #[test]
    fn shapes_tell_paths_from_components() {
        let layer: Layer = parse(
            "{layerId = m01; width = 500; shapes = ({ref = a; pos = (10,0);}, {closed = 1; nodes = ((0,0,l));});}",
        );
        assert_eq!(layer.components().count(), 1);
        assert_eq!(layer.paths().count(), 1);
        assert!(layer.is_master_layer());
        assert_eq!(layer.components().next().unwrap().pos, Point::new(10.0, 0.0));
    }

    #[test]
    fn brace_coordinates_clear_empty_attr() {
        let mut layer = Layer::new("L1");
        layer.set_brace_coordinates(Some(vec![50.0]));
        assert_eq!(layer.brace_coordinates(), Some(&[50.0][..]));
        layer.set_brace_coordinates(None);
        assert!(layer.attr.is_none());
    }

    #[test]
    fn color_variants() {
        assert_eq!(parse::<Color>("3"), Color::Index(3));
        assert_eq!(parse::<Color>("(1,2,3,4)"), Color::Rgba(1, 2, 3, 4));
        assert!(Color::from_plist(Plist::parse("(1,2,3)").unwrap()).is_err());
    }
}
