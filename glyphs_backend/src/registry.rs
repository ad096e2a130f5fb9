//! Picking a backend by file extension.

use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::{GlyphsFileBackend, GlyphsPackageBackend, WritableFontBackend};
use crate::error::BackendError;

pub type OpenBackend = fn(&Path) -> Result<Box<dyn WritableFontBackend>, BackendError>;

/// Backend constructors keyed by file extension, without the dot.
#[derive(Clone, Debug, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, OpenBackend>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `glyphs` and `glyphspackage` backends.
    pub fn with_glyphs_backends() -> Self {
        let mut registry = Self::new();
        register_backends(&mut registry);
        registry
    }

    pub fn register(&mut self, extension: impl Into<String>, open: OpenBackend) {
        self.backends.insert(extension.into(), open);
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn open(&self, path: impl AsRef<Path>) -> Result<Box<dyn WritableFontBackend>, BackendError> {
        let path = path.as_ref();
        let open = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.backends.get(ext))
            .ok_or_else(|| BackendError::UnknownFormat(path.to_path_buf()))?;
        open(path)
    }
}

fn open_glyphs(path: &Path) -> Result<Box<dyn WritableFontBackend>, BackendError> {
    Ok(Box::new(GlyphsFileBackend::open(path)?))
}

fn open_glyphs_package(path: &Path) -> Result<Box<dyn WritableFontBackend>, BackendError> {
    Ok(Box::new(GlyphsPackageBackend::open(path)?))
}

pub fn register_backends(registry: &mut BackendRegistry) {
    registry.register("glyphs", open_glyphs);
    registry.register("glyphspackage", open_glyphs_package);
}

/// Open `path` with the backend for its extension.
pub fn open_font_backend(path: impl AsRef<Path>) -> Result<Box<dyn WritableFontBackend>, BackendError> {
    BackendRegistry::with_glyphs_backends().open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        let registry = BackendRegistry::with_glyphs_backends();
        assert_eq!(
            registry.extensions().collect::<Vec<_>>(),
            vec!["glyphs", "glyphspackage"]
        );
    }

    #[test]
    fn unknown_extension() {
        let result = open_font_backend("font.ufo");
        assert!(matches!(result, Err(BackendError::UnknownFormat(_))));
    }

    #[test]
    fn missing_font() {
        let dir = tempfile::tempdir().unwrap();
        let result = open_font_backend(dir.path().join("missing.glyphs"));
        assert!(matches!(result, Err(BackendError::NotFound(_))));
    }
}
