// assets.rs — background texture decoding and resolution-tier lookup

use crate::layout::Breakpoint;
use anyhow::{Context, Result};
use image::io::Reader as ImageReader;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

/// Suffix of the reduced-resolution variant used on narrow screens.
const SMALL_SUFFIX: &str = "-small";

/// A decoded texture ready for upload.
pub struct LoadedTexture {
    pub path: PathBuf,
    pub rgba: image::RgbaImage,
}

/// `name.ext` → `name-small.ext`
pub fn small_variant(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let file = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}{SMALL_SUFFIX}.{ext}"),
        None => format!("{stem}{SMALL_SUFFIX}"),
    };
    Some(path.with_file_name(file))
}

/// Picks the asset variant for a breakpoint, keeping the original when no variant exists.
pub fn tiered_path(path: PathBuf, breakpoint: Breakpoint) -> PathBuf {
    if breakpoint != Breakpoint::Narrow {
        return path;
    }
    match small_variant(&path) {
        Some(small) if small.exists() => small,
        _ => path,
    }
}

/// Outcome of one background decode, tagged with the ring generation that asked for it.
pub enum LoadEvent {
    Loaded { generation: u64, texture: LoadedTexture },
    Failed { generation: u64, path: PathBuf },
}

impl LoadEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LoadEvent::Loaded { generation, .. } | LoadEvent::Failed { generation, .. } => *generation,
        }
    }
}

fn decode(path: &Path) -> Result<image::RgbaImage> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", path.display()))?;
    reader.no_limits();
    let img = reader
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Decodes `paths` on a worker thread and sends one event per path as it finishes.
/// Failures are logged; the panel keeps its placeholder.
pub fn spawn_loader(paths: Vec<PathBuf>, generation: u64, tx: Sender<LoadEvent>) {
    thread::spawn(move || {
        for path in paths {
            let event = match decode(&path) {
                Ok(rgba) => {
                    log::debug!("Loaded {} ({}x{})", path.display(), rgba.width(), rgba.height());
                    LoadEvent::Loaded {
                        generation,
                        texture: LoadedTexture { path, rgba },
                    }
                }
                Err(e) => {
                    log::warn!("Texture load failed: {:#}", e);
                    LoadEvent::Failed { generation, path }
                }
            };
            if tx.send(event).is_err() {
                // receiver gone: the ring was torn down
                return;
            }
        }
    });
}
