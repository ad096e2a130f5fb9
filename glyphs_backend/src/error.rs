use std::path::PathBuf;

use thiserror::Error;

use crate::from_plist::GlyphsFromPlistError;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("font source not found: {0}")]
    NotFound(PathBuf),
    #[error("no backend for {0}")]
    UnknownFormat(PathBuf),
    #[error("can't read {path}: {message}")]
    Format { path: PathBuf, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad plist: {0}")]
    Plist(#[from] crate::plist::Error),
    #[error(transparent)]
    FromPlist(#[from] GlyphsFromPlistError),
    #[error("glyph not found: {0}")]
    UnknownGlyph(String),
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("{0}")]
    Unsupported(String),
    #[error("invalid glyph: {0}")]
    InvalidGlyph(String),
    #[error("features: {0}")]
    Features(String),
}

impl BackendError {
    pub(crate) fn format(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        BackendError::Format {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
