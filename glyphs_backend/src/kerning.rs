//! Kerning tables and kerning groups.
//!
//! Glyphs stores groups on the glyphs themselves and prefixes group names in
//! kerning pairs with `@MMK_<side>_`. The host model keeps groups per pair
//! side and writes group names as `@name` in pairs.

use std::collections::{BTreeMap, BTreeSet};

use crate::classes::Kerning;
use crate::error::BackendError;
use crate::font::FormatVersion;
use crate::from_plist::FromPlist;
use crate::plist::Plist;
use crate::to_plist::ToPlist;

type Dict = BTreeMap<String, Plist>;

/// Group name -> member glyph names.
pub type Groups = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PairSide {
    Left,
    Right,
    Top,
    Bottom,
}

impl PairSide {
    pub const ALL: [PairSide; 4] = [
        PairSide::Left,
        PairSide::Right,
        PairSide::Top,
        PairSide::Bottom,
    ];

    fn prefix(self) -> &'static str {
        match self {
            PairSide::Left => "@MMK_L_",
            PairSide::Right => "@MMK_R_",
            PairSide::Top => "@MMK_T_",
            PairSide::Bottom => "@MMK_B_",
        }
    }

    /// The glyph key holding the group used on this side of a pair. A glyph
    /// on the left of a pair is kerned by its right edge.
    fn glyph_key(self, format: FormatVersion) -> &'static str {
        match (format, self) {
            (FormatVersion::V2, PairSide::Left) => "rightKerningGroup",
            (FormatVersion::V2, PairSide::Right) => "leftKerningGroup",
            (FormatVersion::V2, PairSide::Top) => "bottomKerningGroup",
            (FormatVersion::V2, PairSide::Bottom) => "topKerningGroup",
            (FormatVersion::V3, PairSide::Left) => "kernRight",
            (FormatVersion::V3, PairSide::Right) => "kernLeft",
            (FormatVersion::V3, PairSide::Top) => "kernBottom",
            (FormatVersion::V3, PairSide::Bottom) => "kernTop",
        }
    }
}

/// Kerning groups of all four pair sides.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KerningGroups(BTreeMap<PairSide, Groups>);

impl KerningGroups {
    /// Collect groups from raw glyph dictionaries.
    pub fn from_glyphs<'a>(glyphs: impl IntoIterator<Item = &'a Plist>, format: FormatVersion) -> Self {
        let mut groups = KerningGroups::default();
        for glyph in glyphs {
            let Some(glyph_name) = glyph.get("glyphname").and_then(name) else {
                continue;
            };
            for side in PairSide::ALL {
                if let Some(group) = glyph.get(side.glyph_key(format)).and_then(name) {
                    groups
                        .0
                        .entry(side)
                        .or_default()
                        .entry(group)
                        .or_default()
                        .push(glyph_name.clone());
                }
            }
        }
        groups
    }

    pub fn side(&self, side: PairSide) -> Groups {
        self.0.get(&side).cloned().unwrap_or_default()
    }

    fn set_side(&mut self, side: PairSide, groups: Groups) {
        self.0.insert(side, groups);
    }

    fn group_of(&self, side: PairSide, glyph_name: &str) -> Option<&str> {
        self.0.get(&side)?.iter().find_map(|(group, members)| {
            members
                .iter()
                .any(|member| member == glyph_name)
                .then_some(group.as_str())
        })
    }

    /// Make the group keys of raw glyph dictionaries match these groups.
    /// Returns the names of the glyphs that changed.
    pub fn apply_to_glyphs(&self, glyphs: &mut [Plist], format: FormatVersion) -> BTreeSet<String> {
        let mut changed = BTreeSet::new();
        for glyph in glyphs {
            let Some(glyph_name) = glyph.get("glyphname").and_then(name) else {
                continue;
            };
            let Some(dict) = glyph.as_dict_mut() else {
                continue;
            };
            for side in PairSide::ALL {
                let key = side.glyph_key(format);
                let current = dict.get(key).and_then(name);
                let new = self.group_of(side, &glyph_name);
                if current.as_deref() == new {
                    continue;
                }
                changed.insert(glyph_name.clone());
                match new {
                    Some(group) => dict.insert(key.to_string(), group.into()),
                    None => dict.remove(key),
                };
            }
        }
        changed
    }
}

/// A kerning table tag, the font key storing it and its pair sides.
struct Table {
    tag: &'static str,
    side1: PairSide,
    side2: PairSide,
}

const TABLES: [Table; 2] = [
    Table {
        tag: "kern",
        side1: PairSide::Left,
        side2: PairSide::Right,
    },
    Table {
        tag: "vkrn",
        side1: PairSide::Top,
        side2: PairSide::Bottom,
    },
];

impl Table {
    fn font_key(&self, format: FormatVersion) -> &'static str {
        match (self.tag, format) {
            ("kern", FormatVersion::V2) => "kerning",
            ("kern", FormatVersion::V3) => "kerningLTR",
            (_, FormatVersion::V2) => "vertKerning",
            (_, FormatVersion::V3) => "kerningVertical",
        }
    }
}

/// Read the `kern` and `vkrn` tables. Tables without groups or values are
/// left out.
pub fn read_kerning(
    font: &Dict,
    format: FormatVersion,
    groups: &KerningGroups,
    master_ids: &[String],
    default_master_id: Option<&str>,
) -> BTreeMap<String, Kerning> {
    let mut tables = BTreeMap::new();
    for table in &TABLES {
        let masters = font.get(table.font_key(format)).and_then(Plist::as_dict);
        let mut source_identifiers = Vec::new();
        let mut per_pair: BTreeMap<String, BTreeMap<String, BTreeMap<&str, f64>>> =
            BTreeMap::new();
        for master_id in master_ids {
            let pairs = masters
                .and_then(|m| m.get(master_id))
                .and_then(Plist::as_dict)
                .filter(|pairs| !pairs.is_empty());
            // The default master is always a source, so interpolation has a
            // base.
            if pairs.is_none() && Some(master_id.as_str()) != default_master_id {
                continue;
            }
            source_identifiers.push(master_id.clone());
            for (name1, seconds) in pairs.into_iter().flatten() {
                let name1 = host_pair_name(name1, table.side1);
                for (name2, value) in seconds.as_dict().into_iter().flatten() {
                    let Some(value) = value.as_f64() else {
                        tracing::warn!(%master_id, %name1, %name2, "non-numeric kerning value");
                        continue;
                    };
                    per_pair
                        .entry(name1.clone())
                        .or_default()
                        .entry(host_pair_name(name2, table.side2))
                        .or_default()
                        .insert(master_id.as_str(), value);
                }
            }
        }
        let values = per_pair
            .into_iter()
            .map(|(name1, seconds)| {
                let seconds = seconds
                    .into_iter()
                    .map(|(name2, by_source)| {
                        let values = source_identifiers
                            .iter()
                            .map(|id| by_source.get(id.as_str()).copied())
                            .collect();
                        (name2, values)
                    })
                    .collect();
                (name1, seconds)
            })
            .collect();

        let kerning = Kerning {
            groups_side1: groups.side(table.side1),
            groups_side2: groups.side(table.side2),
            source_identifiers,
            values,
        };
        if !kerning.is_empty() {
            tables.insert(table.tag.to_string(), kerning);
        }
    }
    tables
}

/// Replace the kerning tables of `font` and the groups in `groups`. A table
/// missing from `kerning` is cleared. Everything is checked before anything
/// changes.
pub fn write_kerning(
    font: &mut Dict,
    format: FormatVersion,
    groups: &mut KerningGroups,
    kerning: &BTreeMap<String, Kerning>,
    master_ids: &[String],
) -> Result<(), BackendError> {
    let unknown_tags: Vec<&str> = kerning
        .keys()
        .map(String::as_str)
        .filter(|tag| TABLES.iter().all(|t| t.tag != *tag))
        .collect();
    if !unknown_tags.is_empty() {
        return Err(BackendError::Unsupported(format!(
            "'{}' kern type(s) not supported",
            unknown_tags.join(", ")
        )));
    }
    if format == FormatVersion::V2 && kerning.contains_key("vkrn") {
        return Err(BackendError::Unsupported(
            "writing vertical kerning is not supported for the Glyphs 2 format".into(),
        ));
    }
    let unknown_sources: BTreeSet<&str> = kerning
        .values()
        .flat_map(|k| k.source_identifiers.iter())
        .map(String::as_str)
        .filter(|id| !master_ids.iter().any(|m| m == id))
        .collect();
    if !unknown_sources.is_empty() {
        let ids: Vec<&str> = unknown_sources.into_iter().collect();
        return Err(BackendError::Unsupported(format!(
            "can't write kerning, found unknown source identifiers: {}",
            ids.join(", ")
        )));
    }

    for table in &TABLES {
        let key = table.font_key(format);
        let Some(kerning) = kerning.get(table.tag) else {
            font.remove(key);
            groups.set_side(table.side1, Groups::new());
            groups.set_side(table.side2, Groups::new());
            continue;
        };

        let mut per_source: BTreeMap<&str, BTreeMap<String, Dict>> = BTreeMap::new();
        for (name1, seconds) in &kerning.values {
            let name1 = glyphs_pair_name(name1, table.side1);
            for (name2, values) in seconds {
                let name2 = glyphs_pair_name(name2, table.side2);
                for (source, value) in kerning.source_identifiers.iter().zip(values) {
                    let Some(value) = value else {
                        continue;
                    };
                    per_source
                        .entry(source.as_str())
                        .or_default()
                        .entry(name1.clone())
                        .or_default()
                        .insert(name2.clone(), value.to_plist());
                }
            }
        }
        let masters: Dict = master_ids
            .iter()
            .filter_map(|id| {
                let pairs = per_source.remove(id.as_str())?;
                let pairs = pairs.into_iter().map(|(k, v)| (k, Plist::Dictionary(v)));
                Some((id.clone(), Plist::Dictionary(pairs.collect())))
            })
            .collect();
        if masters.is_empty() {
            font.remove(key);
        } else {
            font.insert(key.to_string(), Plist::Dictionary(masters));
        }
        groups.set_side(table.side1, kerning.groups_side1.clone());
        groups.set_side(table.side2, kerning.groups_side2.clone());
    }
    Ok(())
}

fn host_pair_name(name: &str, side: PairSide) -> String {
    match name.strip_prefix(side.prefix()) {
        Some(group) => format!("@{group}"),
        None => name.to_string(),
    }
}

fn glyphs_pair_name(name: &str, side: PairSide) -> String {
    match name.strip_prefix('@') {
        Some(group) => format!("{}{group}", side.prefix()),
        None => name.to_string(),
    }
}

fn name(plist: &Plist) -> Option<String> {
    String::from_plist(plist.clone()).ok()
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    use super::*;

    const GLYPHS: &str = r#"(
{glyphname = A; kernLeft = A; kernRight = A;},
{glyphname = Aacute; kernLeft = A; kernRight = A;},
{glyphname = V; kernLeft = V;},
{glyphname = period;}
)"#;

    const FONT: &str = r#"{
kerningLTR = {
m01 = {
"@MMK_L_A" = {"@MMK_R_V" = -60;};
period = {V = -20.5;};
};
m02 = {
"@MMK_L_A" = {"@MMK_R_V" = -80;};
};
};
}"#;

    fn glyphs() -> Vec<Plist> {
        Plist::parse(GLYPHS).unwrap().into_array().unwrap()
    }

    fn masters() -> Vec<String> {
        vec!["m01".into(), "m02".into(), "m03".into()]
    }

    #[test]
    fn groups_by_pair_side() {
        let groups = KerningGroups::from_glyphs(&glyphs(), FormatVersion::V3);
        assert_eq!(
            groups.side(PairSide::Left),
            btreemap! { "A".to_string() => vec!["A".to_string(), "Aacute".to_string()] }
        );
        assert_eq!(groups.side(PairSide::Right).len(), 2);
        assert!(groups.side(PairSide::Top).is_empty());

        let v2 = Plist::parse("({glyphname = T; rightKerningGroup = T;})").unwrap();
        let groups = KerningGroups::from_glyphs(v2.as_array().unwrap(), FormatVersion::V2);
        assert_eq!(groups.side(PairSide::Left).keys().collect::<Vec<_>>(), vec!["T"]);
    }

    #[test]
    fn read_tables() {
        let font = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let groups = KerningGroups::from_glyphs(&glyphs(), FormatVersion::V3);
        let kerning = read_kerning(&font, FormatVersion::V3, &groups, &masters(), Some("m01"));
        assert_eq!(kerning.keys().collect::<Vec<_>>(), vec!["kern"]);
        let kern = &kerning["kern"];
        assert_eq!(kern.source_identifiers, vec!["m01", "m02"]);
        assert_eq!(kern.values["@A"]["@V"], vec![Some(-60.0), Some(-80.0)]);
        assert_eq!(kern.values["period"]["V"], vec![Some(-20.5), None]);
    }

    #[test]
    fn default_master_is_always_a_source() {
        let font = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let groups = KerningGroups::default();
        let kerning = read_kerning(&font, FormatVersion::V3, &groups, &masters(), Some("m03"));
        assert_eq!(kerning["kern"].source_identifiers, vec!["m01", "m02", "m03"]);
        assert_eq!(kerning["kern"].values["@A"]["@V"], vec![Some(-60.0), Some(-80.0), None]);
    }

    #[test]
    fn write_tables_and_groups() {
        let mut font = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let mut glyphs = glyphs();
        let mut groups = KerningGroups::from_glyphs(&glyphs, FormatVersion::V3);
        let mut kerning = read_kerning(&font, FormatVersion::V3, &groups, &masters(), Some("m01"));

        let kern = kerning.get_mut("kern").unwrap();
        kern.values.remove("period");
        kern.groups_side1
            .insert("A".into(), vec!["A".into(), "Aacute".into(), "V".into()]);
        write_kerning(&mut font, FormatVersion::V3, &mut groups, &kerning, &masters()).unwrap();

        assert_eq!(
            font["kerningLTR"].to_string(),
            "{\nm01 = {\n\"@MMK_L_A\" = {\n\"@MMK_R_V\" = -60;\n};\n};\nm02 = {\n\"@MMK_L_A\" = {\n\"@MMK_R_V\" = -80;\n};\n};\n}"
        );
        let changed = groups.apply_to_glyphs(&mut glyphs, FormatVersion::V3);
        assert_eq!(changed, BTreeSet::from(["V".to_string()]));
        assert_eq!(glyphs[2].get("kernRight"), Some(&Plist::from("A")));
    }

    #[test]
    fn rejected_kerning_changes_nothing() {
        let original = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let mut font = original.clone();
        let mut groups = KerningGroups::from_glyphs(&glyphs(), FormatVersion::V3);
        let before = groups.clone();

        let unknown_tag = btreemap! { "kern".to_string() => Kerning::default(), "dist".to_string() => Kerning::default() };
        assert!(write_kerning(&mut font, FormatVersion::V3, &mut groups, &unknown_tag, &masters()).is_err());

        let unknown_source = btreemap! {
            "kern".to_string() => Kerning {
                source_identifiers: vec!["nope".into()],
                ..Default::default()
            },
        };
        assert!(write_kerning(&mut font, FormatVersion::V3, &mut groups, &unknown_source, &masters()).is_err());

        let vertical = btreemap! { "vkrn".to_string() => Kerning::default() };
        assert!(write_kerning(&mut font, FormatVersion::V2, &mut groups, &vertical, &masters()).is_err());

        assert_eq!(font, original);
        assert_eq!(groups, before);
    }

    #[test]
    fn missing_table_clears_kerning() {
        let mut font = Plist::parse(FONT).unwrap().into_dictionary().unwrap();
        let mut glyphs = glyphs();
        let mut groups = KerningGroups::from_glyphs(&glyphs, FormatVersion::V3);
        write_kerning(&mut font, FormatVersion::V3, &mut groups, &BTreeMap::new(), &masters()).unwrap();
        assert!(!font.contains_key("kerningLTR"));
        let changed = groups.apply_to_glyphs(&mut glyphs, FormatVersion::V3);
        assert_eq!(changed.len(), 3);
        assert!(glyphs[0].get("kernLeft").is_none());
    }
}
