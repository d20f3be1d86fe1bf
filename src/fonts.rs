// fonts.rs — display font for the metadata readout
//
// The manifest may name a font file. Candidates are tried in order:
// - the manifest's `font` entry (relative to the manifest)
// - <exe_dir>/assets/fonts/display.ttf
// - ./assets/fonts/display.ttf
// ab_glyph rejects files egui could not rasterize; those are skipped.
// Without any usable file egui's built-in fonts stay in place.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

const FONT_NAME: &str = "display";
const DEFAULT_FONT_FILE: &str = "display.ttf";

fn load_validated(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    if ab_glyph::FontArc::try_from_vec(bytes.clone()).is_err() {
        bail!("{} is not a usable font", path.display());
    }
    Ok(bytes)
}

pub fn candidates(manifest_font: Option<PathBuf>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    candidates.extend(manifest_font);
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("assets").join("fonts").join(DEFAULT_FONT_FILE));
        }
    }
    candidates.push(PathBuf::from("assets").join("fonts").join(DEFAULT_FONT_FILE));
    candidates
}

/// Installs the first usable candidate as the primary proportional font.
pub fn install(ctx: &egui::Context, candidates: &[PathBuf]) {
    let chosen = candidates.iter().find_map(|p| match load_validated(p) {
        Ok(bytes) => Some((p, bytes)),
        Err(e) => {
            log::debug!("{:#}", e);
            None
        }
    });

    let Some((font_path, font_bytes)) = chosen else {
        log::info!("No display font found; using egui defaults");
        return;
    };
    log::info!("Using display font {}", font_path.display());

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert(FONT_NAME.to_owned(), egui::FontData::from_owned(font_bytes));
    if let Some(family) = fonts.families.get_mut(&egui::FontFamily::Proportional) {
        family.insert(0, FONT_NAME.to_owned());
    }
    ctx.set_fonts(fonts);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_font_is_tried_first() {
        let list = candidates(Some(PathBuf::from("custom.otf")));
        assert_eq!(list[0], PathBuf::from("custom.otf"));
        assert!(list.len() >= 2);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(load_validated(Path::new("missing/font.ttf")).is_err());
    }
}
