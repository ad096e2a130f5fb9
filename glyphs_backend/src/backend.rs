//! The font backend: Glyphs data behind the host's backend interface.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::axes::DesignSpace;
use crate::classes::{
    Axes, CustomData, FontInfo, FontSource, ImageData, Kerning, OpenTypeFeatures, VariableGlyph,
};
use crate::convert::{font_info, font_sources, GlyphConverter};
use crate::error::BackendError;
use crate::features::{features_to_fea, write_features};
use crate::font::{Font, FormatVersion};
use crate::from_plist::FromPlist;
use crate::glyph::Glyph;
use crate::kerning::{read_kerning, write_kerning, KerningGroups};
use crate::migrate;
use crate::plist::Plist;
use crate::storage::{raw_glyph_name, Dict, GlyphsFile, GlyphsPackage, GlyphsStorage};
use crate::to_plist::ToPlist;

/// Glyph name -> code points.
pub type GlyphMap = BTreeMap<String, Vec<u32>>;

const DEFAULT_UNITS_PER_EM: u16 = 1000;

/// Read access to a font source.
pub trait ReadableFontBackend: Send {
    fn get_glyph_map(&self) -> GlyphMap;
    /// `None` for glyphs the font doesn't have.
    fn get_glyph(&self, glyph_name: &str) -> Result<Option<VariableGlyph>, BackendError>;
    fn get_axes(&self) -> Axes;
    fn get_sources(&self) -> BTreeMap<String, FontSource>;
    fn get_font_info(&self) -> FontInfo;
    fn get_units_per_em(&self) -> u16;
    fn get_kerning(&self) -> BTreeMap<String, Kerning>;
    fn get_features(&self) -> OpenTypeFeatures;
    fn get_background_image(&self, identifier: &str) -> Option<ImageData>;
    fn get_custom_data(&self) -> CustomData;
    /// Sorted names of the glyphs using `glyph_name` as a component.
    fn find_glyphs_that_use_glyph(&self, glyph_name: &str) -> Vec<String>;
    fn close(self: Box<Self>);
}

/// Write access to a font source. Every call writes through to disk.
pub trait WritableFontBackend: ReadableFontBackend {
    fn put_glyph_map(&mut self, glyph_map: &GlyphMap) -> Result<(), BackendError>;
    fn put_glyph(
        &mut self,
        glyph_name: &str,
        glyph: &VariableGlyph,
        code_points: &[u32],
    ) -> Result<(), BackendError>;
    fn delete_glyph(&mut self, glyph_name: &str) -> Result<(), BackendError>;
    fn put_axes(&mut self, axes: &Axes) -> Result<(), BackendError>;
    fn put_sources(&mut self, sources: &BTreeMap<String, FontSource>) -> Result<(), BackendError>;
    fn put_font_info(&mut self, font_info: &FontInfo) -> Result<(), BackendError>;
    fn put_units_per_em(&mut self, units_per_em: u16) -> Result<(), BackendError>;
    fn put_kerning(&mut self, kerning: &BTreeMap<String, Kerning>) -> Result<(), BackendError>;
    fn put_features(&mut self, features: &OpenTypeFeatures) -> Result<(), BackendError>;
    fn put_background_image(
        &mut self,
        identifier: &str,
        image: &ImageData,
    ) -> Result<(), BackendError>;
    fn put_custom_data(&mut self, custom_data: &CustomData) -> Result<(), BackendError>;
}

/// A Glyphs font opened from `S`.
///
/// Glyphs are kept as raw dictionaries in the file's own format and only
/// parsed when they are asked for.
#[derive(Debug)]
pub struct GlyphsBackend<S> {
    storage: S,
    format: FormatVersion,
    raw_font: Dict,
    font: Font,
    space: DesignSpace,
    raw_glyphs: Vec<Plist>,
    glyph_index: BTreeMap<String, usize>,
    glyph_map: GlyphMap,
    kerning_groups: KerningGroups,
}

pub type GlyphsFileBackend = GlyphsBackend<GlyphsFile>;
pub type GlyphsPackageBackend = GlyphsBackend<GlyphsPackage>;

impl<S: GlyphsStorage> GlyphsBackend<S> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let (storage, raw_font, raw_glyphs) = S::load(path)?;
        let format = match raw_font.get(".formatVersion").and_then(Plist::as_i64) {
            Some(version) if version >= 3 => FormatVersion::V3,
            _ => FormatVersion::V2,
        };
        let font = parse_font(&raw_font, format).map_err(|e| BackendError::format(path, e))?;
        let space = DesignSpace::new(&font);

        let mut glyph_map = GlyphMap::new();
        for glyph in &raw_glyphs {
            let name = raw_glyph_name(glyph)
                .ok_or_else(|| BackendError::format(path, "glyph without a name"))?;
            glyph_map.insert(name, code_points(glyph, format));
        }
        let kerning_groups = KerningGroups::from_glyphs(&raw_glyphs, format);

        tracing::debug!(
            path = %path.display(),
            ?format,
            glyphs = raw_glyphs.len(),
            axes = space.axes.len(),
            "opened font"
        );
        let mut backend = GlyphsBackend {
            storage,
            format,
            raw_font,
            font,
            space,
            raw_glyphs,
            glyph_index: BTreeMap::new(),
            glyph_map,
            kerning_groups,
        };
        backend.update_glyph_index();
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn format(&self) -> FormatVersion {
        self.format
    }

    /// Release the backend. Everything was written already.
    pub fn close(self) {
        tracing::debug!(path = %self.storage.path().display(), "closed font");
    }

    fn update_glyph_index(&mut self) {
        self.glyph_index = self
            .raw_glyphs
            .iter()
            .enumerate()
            .filter_map(|(i, glyph)| raw_glyph_name(glyph).map(|name| (name, i)))
            .collect();
    }

    fn converter(&self) -> GlyphConverter<'_> {
        GlyphConverter {
            font: &self.font,
            space: &self.space,
        }
    }

    /// The typed glyph at `index`, in the Glyphs 3 shape.
    fn parse_glyph(&self, index: usize) -> Result<Glyph, BackendError> {
        let raw = self.raw_glyphs[index].clone();
        let raw = match self.format {
            FormatVersion::V2 => migrate::glyph_to_v3(raw),
            FormatVersion::V3 => raw,
        };
        Glyph::from_plist(raw).map_err(|e| BackendError::format(self.storage.path(), e))
    }

    fn master_ids(&self) -> Vec<String> {
        self.font.font_master.iter().map(|m| m.id.clone()).collect()
    }
}

fn parse_font(raw_font: &Dict, format: FormatVersion) -> Result<Font, crate::from_plist::GlyphsFromPlistError> {
    let raw = match format {
        FormatVersion::V2 => migrate::font_to_v3(raw_font),
        FormatVersion::V3 => Plist::Dictionary(raw_font.clone()),
    };
    Font::from_plist(raw)
}

/// Glyphs 3 stores code points as integers; Glyphs 2 as comma separated hex
/// strings, which read as integers when they have no letters.
fn code_points(glyph: &Plist, format: FormatVersion) -> Vec<u32> {
    let Some(unicode) = glyph.get("unicode") else {
        return Vec::new();
    };
    let from_hex = |s: &str| -> Vec<u32> {
        s.split(',')
            .filter_map(|hex| u32::from_str_radix(hex.trim(), 16).ok())
            .collect()
    };
    let as_u32 = |plist: &Plist| plist.as_i64().and_then(|i| u32::try_from(i).ok());
    match (format, unicode) {
        (FormatVersion::V2, Plist::String(s)) => from_hex(s),
        (FormatVersion::V2, Plist::Integer(i)) => from_hex(&i.to_string()),
        (FormatVersion::V3, Plist::Integer(_)) => as_u32(unicode).into_iter().collect(),
        (FormatVersion::V3, Plist::Array(array)) => array.iter().filter_map(as_u32).collect(),
        _ => {
            tracing::warn!(?unicode, "unreadable code points");
            Vec::new()
        }
    }
}

impl<S: GlyphsStorage> ReadableFontBackend for GlyphsBackend<S> {
    fn get_glyph_map(&self) -> GlyphMap {
        self.glyph_map.clone()
    }

    fn get_glyph(&self, glyph_name: &str) -> Result<Option<VariableGlyph>, BackendError> {
        let Some(&index) = self.glyph_index.get(glyph_name) else {
            return Ok(None);
        };
        let glyph = self.parse_glyph(index)?;
        Ok(Some(self.converter().read_glyph(&glyph)))
    }

    fn get_axes(&self) -> Axes {
        Axes {
            axes: self.space.axes.clone(),
            custom_data: CustomData::new(),
        }
    }

    fn get_sources(&self) -> BTreeMap<String, FontSource> {
        font_sources(&self.font, &self.space)
    }

    fn get_font_info(&self) -> FontInfo {
        font_info(&self.font)
    }

    fn get_units_per_em(&self) -> u16 {
        self.font.units_per_em.unwrap_or(DEFAULT_UNITS_PER_EM)
    }

    fn get_kerning(&self) -> BTreeMap<String, Kerning> {
        read_kerning(
            &self.raw_font,
            self.format,
            &self.kerning_groups,
            &self.master_ids(),
            self.space.default_master_id.as_deref(),
        )
    }

    fn get_features(&self) -> OpenTypeFeatures {
        OpenTypeFeatures {
            text: features_to_fea(&self.font),
            ..Default::default()
        }
    }

    fn get_background_image(&self, _identifier: &str) -> Option<ImageData> {
        None
    }

    fn get_custom_data(&self) -> CustomData {
        CustomData::new()
    }

    fn find_glyphs_that_use_glyph(&self, glyph_name: &str) -> Vec<String> {
        let (shapes_key, reference_key) = match self.format {
            FormatVersion::V2 => ("components", "name"),
            FormatVersion::V3 => ("shapes", "ref"),
        };
        let uses_glyph = |glyph: &Plist| {
            glyph
                .get("layers")
                .and_then(Plist::as_array)
                .into_iter()
                .flatten()
                .filter_map(|layer| layer.get(shapes_key).and_then(Plist::as_array))
                .flatten()
                .any(|shape| shape.get(reference_key).and_then(Plist::as_str) == Some(glyph_name))
        };
        let used_by: BTreeSet<String> = self
            .raw_glyphs
            .iter()
            .filter(|glyph| uses_glyph(*glyph))
            .filter_map(raw_glyph_name)
            .collect();
        used_by.into_iter().collect()
    }

    fn close(self: Box<Self>) {
        GlyphsBackend::close(*self)
    }
}

impl<S: GlyphsStorage> WritableFontBackend for GlyphsBackend<S> {
    /// The glyph map follows `put_glyph` and `delete_glyph`.
    fn put_glyph_map(&mut self, _glyph_map: &GlyphMap) -> Result<(), BackendError> {
        Ok(())
    }

    fn put_glyph(
        &mut self,
        glyph_name: &str,
        glyph: &VariableGlyph,
        code_points: &[u32],
    ) -> Result<(), BackendError> {
        let index = self.glyph_index.get(glyph_name).copied();
        let gs_glyph = match index {
            Some(index) => self.parse_glyph(index)?,
            None => Glyph::new(norad::Name::new(glyph_name).map_err(|_| {
                BackendError::InvalidGlyph(format!("bad glyph name '{glyph_name}'"))
            })?),
        };
        let gs_glyph = self.converter().write_glyph(glyph, code_points, gs_glyph)?;
        let raw = match self.format {
            FormatVersion::V2 => migrate::glyph_to_v2(gs_glyph.to_plist()),
            FormatVersion::V3 => gs_glyph.to_plist(),
        };

        let is_new = index.is_none();
        let index = match index {
            Some(index) => {
                self.raw_glyphs[index] = raw;
                index
            }
            None => {
                self.raw_glyphs.push(raw);
                self.glyph_index
                    .insert(glyph_name.to_string(), self.raw_glyphs.len() - 1);
                self.raw_glyphs.len() - 1
            }
        };
        self.glyph_map
            .insert(glyph_name.to_string(), code_points.to_vec());
        tracing::info!(glyph = glyph_name, is_new, "writing glyph");
        self.storage
            .write_glyph(&self.raw_font, &self.raw_glyphs, index, is_new)
    }

    fn delete_glyph(&mut self, glyph_name: &str) -> Result<(), BackendError> {
        let index = self
            .glyph_index
            .get(glyph_name)
            .copied()
            .ok_or_else(|| BackendError::UnknownGlyph(glyph_name.to_string()))?;
        self.raw_glyphs.remove(index);
        self.glyph_map.remove(glyph_name);
        self.update_glyph_index();
        tracing::info!(glyph = glyph_name, "deleting glyph");
        self.storage
            .delete_glyph(&self.raw_font, &self.raw_glyphs, glyph_name)
    }

    fn put_axes(&mut self, _axes: &Axes) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing axes"))
    }

    fn put_sources(&mut self, _sources: &BTreeMap<String, FontSource>) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing font sources"))
    }

    fn put_font_info(&mut self, _font_info: &FontInfo) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing font info"))
    }

    fn put_units_per_em(&mut self, _units_per_em: u16) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing units per em"))
    }

    fn put_kerning(&mut self, kerning: &BTreeMap<String, Kerning>) -> Result<(), BackendError> {
        let mut raw_font = self.raw_font.clone();
        let mut groups = self.kerning_groups.clone();
        write_kerning(
            &mut raw_font,
            self.format,
            &mut groups,
            kerning,
            &self.master_ids(),
        )?;
        self.raw_font = raw_font;
        self.kerning_groups = groups;
        let changed = self
            .kerning_groups
            .apply_to_glyphs(&mut self.raw_glyphs, self.format);
        tracing::info!(tables = kerning.len(), changed_glyphs = changed.len(), "writing kerning");
        self.storage
            .write_font(&self.raw_font, &self.raw_glyphs, &changed)
    }

    fn put_features(&mut self, features: &OpenTypeFeatures) -> Result<(), BackendError> {
        let mut raw_font = self.raw_font.clone();
        write_features(&mut raw_font, self.format, features)?;
        let font = parse_font(&raw_font, self.format)
            .map_err(|e| BackendError::Features(e.to_string()))?;
        self.raw_font = raw_font;
        self.font = font;
        tracing::info!("writing features");
        self.storage
            .write_font(&self.raw_font, &self.raw_glyphs, &BTreeSet::new())
    }

    fn put_background_image(
        &mut self,
        _identifier: &str,
        _image: &ImageData,
    ) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing background images"))
    }

    fn put_custom_data(&mut self, _custom_data: &CustomData) -> Result<(), BackendError> {
        Err(BackendError::NotImplemented("editing custom data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_points_by_format() {
        let glyph = |source: &str| Plist::parse(source).unwrap();
        assert_eq!(
            code_points(&glyph("{unicode = \"0041,00C0\";}"), FormatVersion::V2),
            vec![0x41, 0xC0]
        );
        assert_eq!(
            code_points(&glyph("{unicode = 2000;}"), FormatVersion::V2),
            vec![0x2000]
        );
        assert_eq!(
            code_points(&glyph("{unicode = 1E00;}"), FormatVersion::V2),
            vec![0x1E00]
        );
        assert_eq!(
            code_points(&glyph("{unicode = (65,192);}"), FormatVersion::V3),
            vec![65, 192]
        );
        assert_eq!(code_points(&glyph("{}"), FormatVersion::V3), Vec::<u32>::new());
    }
}
