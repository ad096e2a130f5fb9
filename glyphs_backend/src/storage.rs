//! On-disk layouts: a single `.glyphs` file or a `.glyphspackage`
//! directory.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::BackendError;
use crate::filenames::user_name_to_file_name;
use crate::from_plist::FromPlist;
use crate::plist::{Plist, TuplePaths};

pub type Dict = BTreeMap<String, Plist>;

const GLYPH_SUFFIX: &str = ".glyph";

/// Arrays Glyphs writes on a single line.
pub fn font_tuple_paths() -> &'static TuplePaths {
    static PATHS: OnceLock<TuplePaths> = OnceLock::new();
    PATHS.get_or_init(|| {
        TuplePaths::new([
            &["fontMaster", "*", "guides", "*", "pos"][..],
            &["glyphs", "*", "color"],
            &["glyphs", "*", "layers", "*", "anchors", "*", "pos"],
            &["glyphs", "*", "layers", "*", "annotations", "*", "pos"],
            &["glyphs", "*", "layers", "*", "background", "shapes", "*", "nodes", "*"],
            &["glyphs", "*", "layers", "*", "guides", "*", "pos"],
            &["glyphs", "*", "layers", "*", "hints", "*", "origin"],
            &["glyphs", "*", "layers", "*", "hints", "*", "target"],
            &["glyphs", "*", "layers", "*", "shapes", "*", "nodes", "*"],
            &["glyphs", "*", "layers", "*", "shapes", "*", "pos"],
        ])
    })
}

/// The name of a raw glyph dictionary.
pub fn raw_glyph_name(glyph: &Plist) -> Option<String> {
    glyph
        .get("glyphname")
        .and_then(|name| String::from_plist(name.clone()).ok())
}

/// Where a font lives on disk. The backend owns the parsed data and hands it
/// back for writing.
pub trait GlyphsStorage: Send + Sized {
    /// Read the font dictionary (without glyphs) and the glyph dictionaries
    /// in glyph order.
    fn load(path: &Path) -> Result<(Self, Dict, Vec<Plist>), BackendError>;

    fn path(&self) -> &Path;

    /// Write font-level data, and the glyphs in `changed`.
    fn write_font(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        changed: &BTreeSet<String>,
    ) -> Result<(), BackendError>;

    /// Write the glyph at `index`. `is_new` is set for glyphs that were just
    /// appended.
    fn write_glyph(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        index: usize,
        is_new: bool,
    ) -> Result<(), BackendError>;

    /// Forget `glyph_name`, which was already removed from `glyphs`.
    fn delete_glyph(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        glyph_name: &str,
    ) -> Result<(), BackendError>;
}

fn read_plist(path: &Path) -> Result<Plist, BackendError> {
    let source = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BackendError::NotFound(path.to_path_buf()),
        std::io::ErrorKind::InvalidData => BackendError::format(path, e),
        _ => BackendError::Io(e),
    })?;
    Plist::parse(&source).map_err(|e| BackendError::format(path, e))
}

fn read_dict(path: &Path) -> Result<Dict, BackendError> {
    read_plist(path)?
        .into_dictionary()
        .ok_or_else(|| BackendError::format(path, "expected a dictionary"))
}

/// A whole font in one `.glyphs` file. Every change rewrites the file.
#[derive(Debug)]
pub struct GlyphsFile {
    path: PathBuf,
}

impl GlyphsFile {
    fn write(&self, font: &Dict, glyphs: &[Plist]) -> Result<(), BackendError> {
        let mut font = font.clone();
        font.insert("glyphs".to_string(), Plist::Array(glyphs.to_vec()));
        let text = Plist::Dictionary(font).to_glyphs_string(font_tuple_paths());
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl GlyphsStorage for GlyphsFile {
    fn load(path: &Path) -> Result<(Self, Dict, Vec<Plist>), BackendError> {
        let mut font = read_dict(path)?;
        let glyphs = match font.remove("glyphs") {
            Some(Plist::Array(glyphs)) => glyphs,
            Some(_) => return Err(BackendError::format(path, "'glyphs' must be a list")),
            None => Vec::new(),
        };
        let storage = GlyphsFile {
            path: path.to_path_buf(),
        };
        Ok((storage, font, glyphs))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write_font(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        _changed: &BTreeSet<String>,
    ) -> Result<(), BackendError> {
        self.write(font, glyphs)
    }

    fn write_glyph(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        _index: usize,
        _is_new: bool,
    ) -> Result<(), BackendError> {
        self.write(font, glyphs)
    }

    fn delete_glyph(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        _glyph_name: &str,
    ) -> Result<(), BackendError> {
        self.write(font, glyphs)
    }
}

/// A `.glyphspackage` directory: `fontinfo.plist`, `order.plist` and one
/// file per glyph under `glyphs/`.
#[derive(Debug)]
pub struct GlyphsPackage {
    path: PathBuf,
    /// Glyph name -> file name under `glyphs/`.
    file_names: BTreeMap<String, String>,
}

impl GlyphsPackage {
    fn glyphs_dir(&self) -> PathBuf {
        self.path.join("glyphs")
    }

    fn file_name(&mut self, glyph_name: &str) -> String {
        if let Some(file_name) = self.file_names.get(glyph_name) {
            return file_name.clone();
        }
        let existing: BTreeSet<String> = self
            .file_names
            .values()
            .map(|name| name.to_lowercase())
            .collect();
        let file_name = user_name_to_file_name(glyph_name, GLYPH_SUFFIX, &existing);
        self.file_names
            .insert(glyph_name.to_string(), file_name.clone());
        file_name
    }

    fn write_glyph_file(&mut self, glyph: &Plist) -> Result<(), BackendError> {
        let glyph_name = raw_glyph_name(glyph)
            .ok_or_else(|| BackendError::format(&self.path, "glyph without a name"))?;
        let path = self.glyphs_dir().join(self.file_name(&glyph_name));
        let tuples = font_tuple_paths().subtree(&["glyphs", "*"]);
        fs::create_dir_all(self.glyphs_dir())?;
        fs::write(path, glyph.to_glyphs_string(&tuples))?;
        Ok(())
    }

    fn write_order(&self, glyphs: &[Plist]) -> Result<(), BackendError> {
        let order = glyphs
            .iter()
            .filter_map(raw_glyph_name)
            .map(Plist::String)
            .collect();
        let text = Plist::Array(order).to_glyphs_string(&TuplePaths::default());
        fs::write(self.path.join("order.plist"), text)?;
        Ok(())
    }
}

impl GlyphsStorage for GlyphsPackage {
    fn load(path: &Path) -> Result<(Self, Dict, Vec<Plist>), BackendError> {
        if !path.is_dir() {
            return Err(BackendError::NotFound(path.to_path_buf()));
        }
        let mut font = read_dict(&path.join("fontinfo.plist"))?;
        font.remove("glyphs");

        let order_path = path.join("order.plist");
        let order: Vec<String> = if order_path.exists() {
            let order = read_plist(&order_path)?;
            Vec::<String>::from_plist(order).map_err(|e| BackendError::format(&order_path, e))?
        } else {
            Vec::new()
        };
        let order_index: BTreeMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut glyphs = Vec::new();
        let mut file_names = BTreeMap::new();
        let glyphs_dir = path.join("glyphs");
        if glyphs_dir.is_dir() {
            for entry in fs::read_dir(&glyphs_dir)? {
                let entry_path = entry?.path();
                if entry_path.extension().and_then(|e| e.to_str()) != Some("glyph") {
                    continue;
                }
                let glyph = read_plist(&entry_path)?;
                let glyph_name = raw_glyph_name(&glyph)
                    .ok_or_else(|| BackendError::format(&entry_path, "glyph without a name"))?;
                if let Some(file_name) = entry_path.file_name().and_then(|f| f.to_str()) {
                    file_names.insert(glyph_name.clone(), file_name.to_string());
                }
                glyphs.push((glyph_name, glyph));
            }
        }
        // Ordered glyphs first, then the rest by name.
        glyphs.sort_by(|(a, _), (b, _)| {
            let key = |name: &String| match order_index.get(name.as_str()) {
                Some(index) => (0, *index, String::new()),
                None => (1, 0, name.clone()),
            };
            key(a).cmp(&key(b))
        });

        let storage = GlyphsPackage {
            path: path.to_path_buf(),
            file_names,
        };
        Ok((storage, font, glyphs.into_iter().map(|(_, g)| g).collect()))
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn write_font(
        &mut self,
        font: &Dict,
        glyphs: &[Plist],
        changed: &BTreeSet<String>,
    ) -> Result<(), BackendError> {
        let text = Plist::Dictionary(font.clone()).to_glyphs_string(font_tuple_paths());
        fs::write(self.path.join("fontinfo.plist"), text)?;
        for glyph in glyphs {
            if raw_glyph_name(glyph).is_some_and(|name| changed.contains(&name)) {
                self.write_glyph_file(glyph)?;
            }
        }
        Ok(())
    }

    fn write_glyph(
        &mut self,
        _font: &Dict,
        glyphs: &[Plist],
        index: usize,
        is_new: bool,
    ) -> Result<(), BackendError> {
        if let Some(glyph) = glyphs.get(index) {
            self.write_glyph_file(glyph)?;
        }
        if is_new {
            self.write_order(glyphs)?;
        }
        Ok(())
    }

    fn delete_glyph(
        &mut self,
        _font: &Dict,
        glyphs: &[Plist],
        glyph_name: &str,
    ) -> Result<(), BackendError> {
        if let Some(file_name) = self.file_names.remove(glyph_name) {
            let path = self.glyphs_dir().join(file_name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        self.write_order(glyphs)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn glyph(name: &str) -> Plist {
        Plist::parse(&format!(
            "{{glyphname = {name}; layers = ({{layerId = m01; width = 500;}});}}"
        ))
        .unwrap()
    }

    #[test]
    fn single_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test.glyphs");
        let source = "{\n.formatVersion = 3;\nfamilyName = Test;\nglyphs = (\n{\nglyphname = a;\nlayers = (\n);\n}\n);\n}\n";
        fs::write(&path, source).unwrap();

        let (mut storage, font, glyphs) = GlyphsFile::load(&path).unwrap();
        assert!(!font.contains_key("glyphs"));
        assert_eq!(glyphs.len(), 1);
        storage.write_font(&font, &glyphs, &BTreeSet::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), source);
    }

    #[test]
    fn missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GlyphsFile::load(&dir.path().join("nope.glyphs")),
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            GlyphsPackage::load(&dir.path().join("nope.glyphspackage")),
            Err(BackendError::NotFound(_))
        ));
        let bad = dir.path().join("bad.glyphs");
        fs::write(&bad, "{ unterminated").unwrap();
        assert!(matches!(
            GlyphsFile::load(&bad),
            Err(BackendError::Format { .. })
        ));
    }

    #[test]
    fn package_order_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test.glyphspackage");
        fs::create_dir_all(path.join("glyphs")).unwrap();
        fs::write(path.join("fontinfo.plist"), "{\n.formatVersion = 3;\n}\n").unwrap();
        fs::write(path.join("order.plist"), "(\nb,\nA\n)\n").unwrap();
        for name in ["A", "b", "c", "B"] {
            let file_name = user_name_to_file_name(name, GLYPH_SUFFIX, &BTreeSet::new());
            let text = glyph(name).to_glyphs_string(&TuplePaths::default());
            fs::write(path.join("glyphs").join(file_name), text).unwrap();
        }

        let (mut storage, font, mut glyphs) = GlyphsPackage::load(&path).unwrap();
        let names: Vec<String> = glyphs.iter().filter_map(raw_glyph_name).collect();
        assert_eq!(names, vec!["b", "A", "B", "c"]);

        glyphs.push(glyph("d"));
        storage.write_glyph(&font, &glyphs, 4, true).unwrap();
        assert!(path.join("glyphs/d.glyph").exists());
        assert_eq!(
            fs::read_to_string(path.join("order.plist")).unwrap(),
            "(\nb,\nA,\nB,\nc,\nd\n)\n"
        );

        glyphs.remove(0);
        storage.delete_glyph(&font, &glyphs, "b").unwrap();
        assert!(!path.join("glyphs/b.glyph").exists());
        assert_eq!(
            fs::read_to_string(path.join("order.plist")).unwrap(),
            "(\nA,\nB,\nc,\nd\n)\n"
        );
    }
}
