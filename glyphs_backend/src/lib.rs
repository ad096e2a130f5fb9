//! Read/write font backends for Glyphs sources, in both the single-file
//! `.glyphs` and the `.glyphspackage` directory layout.

mod axes;
pub mod backend;
pub mod classes;
mod convert;
mod error;
mod features;
mod filenames;
mod font;
mod from_plist;
mod glyph;
mod kerning;
pub mod location;
mod migrate;
mod path;
mod plist;
pub mod registry;
mod storage;
mod to_plist;
mod transform;

pub use axes::DesignSpace;
pub use backend::{
    GlyphMap, GlyphsBackend, GlyphsFileBackend, GlyphsPackageBackend, ReadableFontBackend,
    WritableFontBackend,
};
pub use error::BackendError;
pub use font::{Font, FontMaster, FormatVersion, MasterMetric, MetricType};
pub use from_plist::{FromPlist, GlyphsFromPlistError};
pub use glyph::Glyph;
pub use plist::{Plist, TuplePaths};
pub use registry::{open_font_backend, register_backends, BackendRegistry};
pub use storage::{GlyphsFile, GlyphsPackage, GlyphsStorage};
pub use to_plist::ToPlist;
