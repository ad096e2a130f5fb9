//! Helpers for design-space locations.

use std::collections::{BTreeMap, BTreeSet};

use crate::classes::{GlyphAxis, GlyphSource, Location};

/// The entries of `location` that differ from `default`.
pub fn make_sparse(location: &Location, default: &Location) -> Location {
    location
        .iter()
        .filter(|(name, value)| default.get(*name) != Some(value))
        .map(|(name, value)| (name.clone(), *value))
        .collect()
}

/// A value for every axis of `default`, taken from `location` where present.
pub fn make_dense(location: &Location, default: &Location) -> Location {
    default
        .iter()
        .map(|(name, value)| (name.clone(), *location.get(name).unwrap_or(value)))
        .collect()
}

/// Split a location into its font-axis and glyph-axis parts.
pub fn split_location(location: &Location, glyph_axes: &[GlyphAxis]) -> (Location, Location) {
    let glyph_axis_names: BTreeSet<&str> = glyph_axes.iter().map(|a| a.name.as_str()).collect();
    location
        .iter()
        .map(|(name, value)| (name.clone(), *value))
        .partition(|(name, _)| !glyph_axis_names.contains(name.as_str()))
}

pub fn default_glyph_location(axes: &[GlyphAxis]) -> Location {
    axes.iter()
        .map(|axis| (axis.name.clone(), axis.default_value))
        .collect()
}

/// Index of the location closest to `target`, or 0 for an empty list.
pub fn find_nearest_location_index(target: &Location, locations: &[&Location]) -> usize {
    let distance = |location: &Location| {
        let names: BTreeSet<&String> = target.keys().chain(location.keys()).collect();
        names
            .into_iter()
            .map(|name| {
                let a = target.get(name).copied().unwrap_or_default();
                let b = location.get(name).copied().unwrap_or_default();
                (a - b).powi(2)
            })
            .sum::<f64>()
    };
    locations
        .iter()
        .enumerate()
        .map(|(i, location)| (i, distance(location)))
        .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
        .unwrap_or_default()
}

/// If a set of sources is controlled equally by a font axis and a glyph axis,
/// drop the font axis from their locations. That way the sources interpolate
/// along the glyph axis only, which is how Glyphs treats them.
pub fn fix_source_locations(sources: &mut [GlyphSource], smart_axis_names: &BTreeSet<String>) {
    // (axis, value) -> indices of the sources having it
    let mut sets: BTreeMap<(String, u64), BTreeSet<usize>> = BTreeMap::new();
    for (i, source) in sources.iter().enumerate() {
        for (name, value) in &source.location {
            sets.entry((name.clone(), value.to_bits()))
                .or_default()
                .insert(i);
        }
    }
    let mut reverse: BTreeMap<BTreeSet<usize>, Vec<(String, u64)>> = BTreeMap::new();
    for (item, indices) in sets {
        reverse.entry(indices).or_default().push(item);
    }

    let to_delete: Vec<(String, f64)> = reverse
        .into_values()
        .filter(|items| items.len() > 1)
        .flatten()
        .filter(|(name, _)| !smart_axis_names.contains(name))
        .map(|(name, bits)| (name, f64::from_bits(bits)))
        .collect();
    for (name, value) in to_delete {
        for source in sources.iter_mut() {
            if source.location.get(&name) == Some(&value) {
                source.location.remove(&name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    use super::*;

    fn loc(items: &[(&str, f64)]) -> Location {
        items.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn sparse_and_dense() {
        let default = loc(&[("Weight", 400.0), ("Width", 100.0)]);
        let location = loc(&[("Weight", 700.0), ("Width", 100.0)]);
        assert_eq!(make_sparse(&location, &default), loc(&[("Weight", 700.0)]));
        assert_eq!(make_dense(&loc(&[("Weight", 700.0)]), &default), location);
    }

    #[test]
    fn split_by_glyph_axes() {
        let axes = vec![GlyphAxis {
            name: "Height".into(),
            min_value: 0.0,
            default_value: 0.0,
            max_value: 100.0,
            ..Default::default()
        }];
        let (font, glyph) = split_location(&loc(&[("Weight", 700.0), ("Height", 100.0)]), &axes);
        assert_eq!(font, loc(&[("Weight", 700.0)]));
        assert_eq!(glyph, loc(&[("Height", 100.0)]));
    }

    #[test]
    fn nearest_location() {
        let a = loc(&[("Weight", 100.0)]);
        let b = loc(&[("Weight", 900.0)]);
        assert_eq!(find_nearest_location_index(&loc(&[("Weight", 600.0)]), &[&a, &b]), 1);
        assert_eq!(find_nearest_location_index(&loc(&[("Weight", 500.0)]), &[&a, &b]), 0);
        assert_eq!(find_nearest_location_index(&a, &[]), 0);
    }

    #[test]
    fn font_axis_shadowed_by_glyph_axis() {
        let source = |name: &str, location: Location| GlyphSource {
            name: name.into(),
            layer_name: name.into(),
            location,
            ..Default::default()
        };
        let mut sources = vec![
            source("Regular", loc(&[])),
            source("Bold", loc(&[("Weight", 700.0)])),
            source("Wide", loc(&[("Weight", 700.0), ("Width", 200.0)])),
        ];
        // Weight 700 and Width 200 are not on the same sources, so nothing
        // moves.
        fix_source_locations(&mut sources, &BTreeSet::new());
        assert_eq!(sources[2].location, loc(&[("Weight", 700.0), ("Width", 200.0)]));

        let mut sources = vec![
            source("Regular", loc(&[])),
            source("Tall", loc(&[("Weight", 700.0), ("Height", 100.0)])),
        ];
        let smart = ["Height".to_string()].into_iter().collect();
        fix_source_locations(&mut sources, &smart);
        assert_eq!(sources[1].location, btreemap! { "Height".to_string() => 100.0 });
    }
}
