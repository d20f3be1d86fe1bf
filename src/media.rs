// media.rs — media descriptors, panel metadata and the JSON manifest
//
// Manifest lookup order:
// - CLI: --manifest <path>
// - Env: CAROUSEL_MANIFEST
// - <exe_dir>/assets/carousel.json
// - ./assets/carousel.json (dev working dir)
// - built-in demo list
//
// Relative media paths inside a manifest resolve against the manifest's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "carousel.json";
const MANIFEST_ENV: &str = "CAROUSEL_MANIFEST";

/// Display record shown by the UI chrome while a panel is focused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PanelMeta {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl PanelMeta {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.link.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageItem {
    pub image: String,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub depth: Option<String>,
    #[serde(default)]
    pub background_depth: Option<String>,
    #[serde(flatten)]
    pub meta: PanelMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoItem {
    pub url: String,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(flatten)]
    pub meta: PanelMeta,
}

/// One logical carousel item, images first then videos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaDescriptor {
    Image(ImageItem),
    Video(VideoItem),
}

impl MediaDescriptor {
    pub fn meta(&self) -> &PanelMeta {
        match self {
            MediaDescriptor::Image(item) => &item.meta,
            MediaDescriptor::Video(item) => &item.meta,
        }
    }
}

/// Interaction constants. Every field may be omitted from the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub velocity_scale: f32,
    pub max_velocity: f32,
    pub friction: f32,
    pub stop_threshold: f32,
    pub min_momentum_ms: f64,
    pub min_release_velocity: f32,
    pub snap_duration_s: f32,
    pub idle_rate: f32,
    pub snap_rate: f32,
    pub tilt_max: f32,
    pub tilt_dead_zone: f32,
    pub tilt_rate: f32,
    pub pointer_rate: f32,
    pub sweep_duration_s: f32,
    pub parallax_base: f32,
    pub parallax_boost: f32,
    pub touch_pointer_boost: f32,
    pub drag_grab_scale: f32,
    pub resize_debounce_ms: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            velocity_scale: 0.15,
            max_velocity: 0.02,
            friction: 0.92,
            stop_threshold: 0.0005,
            min_momentum_ms: 500.0,
            min_release_velocity: 0.002,
            snap_duration_s: 0.6,
            idle_rate: 0.1,
            snap_rate: 0.25,
            tilt_max: 0.08,
            tilt_dead_zone: 0.1,
            tilt_rate: 0.05,
            pointer_rate: 0.1,
            sweep_duration_s: 0.8,
            parallax_base: 0.03,
            parallax_boost: 0.06,
            touch_pointer_boost: 1.5,
            drag_grab_scale: 0.002,
            resize_debounce_ms: 250.0,
        }
    }
}

fn within(name: &str, value: f32, default: f32, ok: impl Fn(f32) -> bool) -> f32 {
    if value.is_finite() && ok(value) {
        value
    } else {
        log::warn!("tuning.{} = {} is out of range; using {}", name, value, default);
        default
    }
}

fn within_ms(name: &str, value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        log::warn!("tuning.{} = {} is out of range; using {}", name, value, default);
        default
    }
}

impl Tuning {
    /// Replaces out-of-range values with their defaults. Friction must stay
    /// below 1 and the stop threshold above 0 or momentum would never settle.
    pub fn validated(self) -> Self {
        let d = Tuning::default();
        let positive = |v: f32| v > 0.0;
        let non_negative = |v: f32| v >= 0.0;
        let rate = |v: f32| v > 0.0 && v <= 1.0;
        Tuning {
            velocity_scale: within("velocity_scale", self.velocity_scale, d.velocity_scale, positive),
            max_velocity: within("max_velocity", self.max_velocity, d.max_velocity, positive),
            friction: within("friction", self.friction, d.friction, |v| v > 0.0 && v < 1.0),
            stop_threshold: within("stop_threshold", self.stop_threshold, d.stop_threshold, positive),
            min_momentum_ms: within_ms("min_momentum_ms", self.min_momentum_ms, d.min_momentum_ms),
            min_release_velocity: within(
                "min_release_velocity",
                self.min_release_velocity,
                d.min_release_velocity,
                non_negative,
            ),
            snap_duration_s: within("snap_duration_s", self.snap_duration_s, d.snap_duration_s, positive),
            idle_rate: within("idle_rate", self.idle_rate, d.idle_rate, rate),
            snap_rate: within("snap_rate", self.snap_rate, d.snap_rate, rate),
            tilt_max: within("tilt_max", self.tilt_max, d.tilt_max, non_negative),
            tilt_dead_zone: within("tilt_dead_zone", self.tilt_dead_zone, d.tilt_dead_zone, |v| {
                (0.0..1.0).contains(&v)
            }),
            tilt_rate: within("tilt_rate", self.tilt_rate, d.tilt_rate, rate),
            pointer_rate: within("pointer_rate", self.pointer_rate, d.pointer_rate, rate),
            sweep_duration_s: within("sweep_duration_s", self.sweep_duration_s, d.sweep_duration_s, positive),
            parallax_base: within("parallax_base", self.parallax_base, d.parallax_base, non_negative),
            parallax_boost: within("parallax_boost", self.parallax_boost, d.parallax_boost, non_negative),
            touch_pointer_boost: within(
                "touch_pointer_boost",
                self.touch_pointer_boost,
                d.touch_pointer_boost,
                positive,
            ),
            drag_grab_scale: within("drag_grab_scale", self.drag_grab_scale, d.drag_grab_scale, non_negative),
            resize_debounce_ms: within_ms("resize_debounce_ms", self.resize_debounce_ms, d.resize_debounce_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub images: Vec<ImageItem>,
    #[serde(default)]
    pub videos: Vec<VideoItem>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub tuning: Tuning,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    pub fn from_json(text: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            serde_json::from_str(text).context("manifest is not valid JSON")?;
        manifest.base_dir = base_dir.to_path_buf();
        manifest.tuning = manifest.tuning.validated();
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&text, base_dir)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    /// Built-in list used when no manifest can be found.
    pub fn demo() -> Self {
        let item = |n: usize, title: &str, category: &str| ImageItem {
            image: format!("media/item{n}.webp"),
            background: Some(format!("media/item{n}-bg.webp")),
            depth: Some(format!("media/item{n}-depth.webp")),
            background_depth: None,
            meta: PanelMeta {
                title: Some(title.to_string()),
                category: Some(category.to_string()),
                link: None,
            },
        };
        Self {
            images: vec![
                item(1, "Harbour", "Photography"),
                item(2, "Dunes", "Photography"),
                item(3, "Foundry", "Installation"),
                ImageItem {
                    image: "media/item4.webp".to_string(),
                    background: None,
                    depth: None,
                    background_depth: None,
                    meta: PanelMeta {
                        title: Some("Archive".to_string()),
                        category: Some("Print".to_string()),
                        link: None,
                    },
                },
            ],
            videos: Vec::new(),
            font: None,
            tuning: Tuning::default(),
            base_dir: PathBuf::from("assets"),
        }
    }

    pub fn descriptors(&self) -> Vec<MediaDescriptor> {
        self.images
            .iter()
            .cloned()
            .map(MediaDescriptor::Image)
            .chain(self.videos.iter().cloned().map(MediaDescriptor::Video))
            .collect()
    }

    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Startup options parsed from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub manifest: Option<PathBuf>,
    pub external_scroll: bool,
}

impl LaunchOptions {
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Self {
        let mut options = LaunchOptions::default();
        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--manifest" => options.manifest = it.next().map(PathBuf::from),
                "--external-scroll" => options.external_scroll = true,
                _ => {}
            }
        }
        options
    }
}

/// Finds the manifest to load, honouring the CLI flag first.
pub fn find_manifest(options: &LaunchOptions) -> Option<PathBuf> {
    if let Some(path) = &options.manifest {
        return Some(path.clone());
    }

    if let Ok(v) = std::env::var(MANIFEST_ENV) {
        if !v.trim().is_empty() {
            return Some(PathBuf::from(v));
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join(MANIFEST_FILE);
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join(MANIFEST_FILE);
    if p.exists() {
        return Some(p);
    }

    None
}

/// Loads the configured manifest, falling back to the demo list.
pub fn load_or_demo(options: &LaunchOptions) -> Manifest {
    match find_manifest(options) {
        Some(path) => match Manifest::load(&path) {
            Ok(manifest) => {
                log::info!(
                    "Loaded manifest {} ({} images, {} videos)",
                    path.display(),
                    manifest.images.len(),
                    manifest.videos.len()
                );
                manifest
            }
            Err(e) => {
                log::warn!("{:#}; using demo media", e);
                Manifest::demo()
            }
        },
        None => {
            log::info!("No manifest found; using demo media");
            Manifest::demo()
        }
    }
}
