//! Print the contents of a Glyphs source as JSON, the way a font editor
//! would receive them from the backend.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::prelude::*;

use glyphs_backend::open_font_backend;

#[derive(Parser)]
#[command(name = "glyphs-dump", about = "Dump a .glyphs or .glyphspackage font as JSON")]
struct Args {
    /// The font source
    path: PathBuf,
    /// Glyphs to include; repeat for more than one
    #[arg(long = "glyph", value_name = "NAME")]
    glyphs: Vec<String>,
    /// Include kerning
    #[arg(long)]
    kerning: bool,
    /// Include the feature code
    #[arg(long)]
    features: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let backend = open_font_backend(&args.path)?;
    let mut dump = json!({
        "unitsPerEm": backend.get_units_per_em(),
        "axes": backend.get_axes(),
        "sources": backend.get_sources(),
        "fontInfo": backend.get_font_info(),
        "glyphMap": backend.get_glyph_map(),
    });

    if !args.glyphs.is_empty() {
        let mut glyphs = serde_json::Map::new();
        for name in &args.glyphs {
            match backend.get_glyph(name)? {
                Some(glyph) => {
                    glyphs.insert(name.clone(), serde_json::to_value(glyph)?);
                }
                None => tracing::warn!(glyph = %name, "no such glyph"),
            }
        }
        dump["glyphs"] = glyphs.into();
    }
    if args.kerning {
        dump["kerning"] = serde_json::to_value(backend.get_kerning())?;
    }
    if args.features {
        dump["features"] = serde_json::to_value(backend.get_features())?;
    }

    println!("{}", serde_json::to_string_pretty(&dump)?);
    backend.close();
    Ok(())
}
