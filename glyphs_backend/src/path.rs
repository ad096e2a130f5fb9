//! Glyphs paths <-> packed paths.

use crate::classes::{ContourInfo, CustomData, PackedPath, PointType};
use crate::convert::{json_to_plist, plist_to_json};
use crate::glyph::{Node, NodeType, Path};

impl PackedPath {
    /// Pack Glyphs paths. Paths without nodes have no packed form and are
    /// skipped.
    pub fn from_glyphs_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        let mut packed = PackedPath::default();
        let mut attributes: Vec<Option<CustomData>> = Vec::new();
        for path in paths {
            if path.nodes.is_empty() {
                continue;
            }
            let mut nodes: Vec<&Node> = path.nodes.iter().collect();
            if path.closed {
                // In Glyphs.app, the starting node of a closed contour is
                // always stored at the end of the nodes list.
                nodes.rotate_right(1);
            }
            for (i, node) in nodes.iter().enumerate() {
                packed.coordinates.push(node.pt.x);
                packed.coordinates.push(node.pt.y);
                packed.point_types.push(match node.node_type {
                    NodeType::OffCurve => off_curve_type(&nodes, i, path.closed),
                    t if t.is_smooth() => PointType::OnCurveSmooth,
                    _ => PointType::OnCurve,
                });
                attributes.push(node.attr.as_ref().map(|attr| {
                    attr.iter()
                        .map(|(key, value)| (key.clone(), plist_to_json(value)))
                        .collect()
                }));
            }
            packed.contour_info.push(ContourInfo {
                end_point: packed.point_types.len() - 1,
                is_closed: path.closed,
            });
        }
        if attributes.iter().any(Option::is_some) {
            packed.point_attributes = Some(attributes);
        }
        packed
    }

    /// Unpack into Glyphs paths.
    pub fn to_glyphs_paths(&self) -> Vec<Path> {
        let mut paths = Vec::with_capacity(self.contour_info.len());
        let mut start = 0;
        for contour in &self.contour_info {
            let end = (contour.end_point + 1).min(self.point_types.len());
            if end <= start {
                continue;
            }
            let types = &self.point_types[start..end];
            let mut path = Path::new(contour.is_closed);
            for (offset, point_type) in types.iter().enumerate() {
                let index = start + offset;
                let Some((x, y)) = self.point(index) else {
                    break;
                };
                let node_type = match point_type {
                    PointType::OffCurveQuad | PointType::OffCurveCubic => NodeType::OffCurve,
                    on_curve => on_curve_type(types, offset, contour.is_closed, *on_curve),
                };
                let attr = self
                    .point_attributes
                    .as_ref()
                    .and_then(|attributes| attributes.get(index))
                    .and_then(Option::as_ref)
                    .map(|attr| {
                        attr.iter()
                            .map(|(key, value)| (key.clone(), json_to_plist(value)))
                            .collect()
                    });
                path.nodes.push(Node {
                    pt: kurbo::Point::new(x, y),
                    node_type,
                    attr,
                });
            }
            if contour.is_closed {
                path.nodes.rotate_left(1);
            }
            paths.push(path);
            start = end;
        }
        paths
    }
}

/// Off-curves take the curve type of the on-curve that ends their segment.
fn off_curve_type(nodes: &[&Node], index: usize, closed: bool) -> PointType {
    let count = nodes.len();
    let following = (1..count)
        .map(|step| index + step)
        .filter(|i| closed || *i < count)
        .map(|i| nodes[i % count].node_type)
        .find(|t| t.is_on_curve());
    match following {
        Some(NodeType::QCurve | NodeType::QCurveSmooth) => PointType::OffCurveQuad,
        _ => PointType::OffCurveCubic,
    }
}

/// On-curves take their segment type from the point before them. The first
/// point of an open contour starts a line.
fn on_curve_type(types: &[PointType], index: usize, closed: bool, point_type: PointType) -> NodeType {
    let previous = match index {
        0 if closed => types.last(),
        0 => None,
        i => types.get(i - 1),
    };
    let smooth = point_type == PointType::OnCurveSmooth;
    match (previous, smooth) {
        (Some(PointType::OffCurveCubic), false) => NodeType::Curve,
        (Some(PointType::OffCurveCubic), true) => NodeType::CurveSmooth,
        (Some(PointType::OffCurveQuad), false) => NodeType::QCurve,
        (Some(PointType::OffCurveQuad), true) => NodeType::QCurveSmooth,
        (_, false) => NodeType::Line,
        (_, true) => NodeType::LineSmooth,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::from_plist::FromPlist;
    use crate::plist::Plist;

    fn path(source: &str) -> Path {
        Path::from_plist(Plist::parse(source).unwrap()).unwrap()
    }

    #[test]
    fn closed_path_starts_with_last_node() {
        let glyphs_path = path(
            "{closed = 1; nodes = ((100,0,o),(200,100,o),(200,200,cs),(0,200,l),(0,0,l));}",
        );
        let packed = PackedPath::from_glyphs_paths([&glyphs_path]);
        assert_eq!(
            packed.coordinates,
            vec![0.0, 0.0, 100.0, 0.0, 200.0, 100.0, 200.0, 200.0, 0.0, 200.0]
        );
        assert_eq!(
            packed.point_types,
            vec![
                PointType::OnCurve,
                PointType::OffCurveCubic,
                PointType::OffCurveCubic,
                PointType::OnCurveSmooth,
                PointType::OnCurve,
            ]
        );
        assert_eq!(
            packed.contour_info,
            vec![ContourInfo {
                end_point: 4,
                is_closed: true
            }]
        );
        assert_eq!(packed.to_glyphs_paths(), vec![glyphs_path]);
    }

    #[test]
    fn quadratic_off_curves() {
        let glyphs_path = path("{closed = 1; nodes = ((50,100,o),(100,0,q),(0,0,l));}");
        let packed = PackedPath::from_glyphs_paths([&glyphs_path]);
        assert_eq!(
            packed.point_types,
            vec![PointType::OnCurve, PointType::OffCurveQuad, PointType::OnCurve]
        );
        assert_eq!(packed.to_glyphs_paths(), vec![glyphs_path]);
    }

    #[test]
    fn open_path_and_node_attributes() {
        let glyphs_path = path(
            "{closed = 0; nodes = ((0,0,l,{name = start;}),(10,10,o),(20,10,o),(30,0,c));}",
        );
        let packed = PackedPath::from_glyphs_paths([&glyphs_path]);
        assert_eq!(packed.point_types[0], PointType::OnCurve);
        let attributes = packed.point_attributes.as_ref().unwrap();
        assert_eq!(attributes[0].as_ref().unwrap()["name"], "start");
        assert!(attributes[1].is_none());
        assert_eq!(packed.to_glyphs_paths(), vec![glyphs_path]);
    }

    #[test]
    fn several_contours() {
        let a = path("{closed = 1; nodes = ((0,0,l),(10,0,l),(10,10,l));}");
        let b = path("{closed = 1; nodes = ((20,0,l),(30,0,l),(30,10,l));}");
        let packed = PackedPath::from_glyphs_paths([&a, &b]);
        assert_eq!(packed.contour_info[1].end_point, 5);
        assert!(packed.point_attributes.is_none());
        assert_eq!(packed.to_glyphs_paths(), vec![a, b]);
    }
}
