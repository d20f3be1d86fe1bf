// panel.rs — media panels and the ring that places them

use crate::layout::{self, RingLayout};
use crate::media::{MediaDescriptor, PanelMeta};
use crate::mesh::{build_curved_panel, PanelMesh};
use crate::params::ParameterSet;
use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{PI, TAU};
use std::path::PathBuf;

/// The item list is placed this many times around the ring so drag and
/// momentum can travel past a full lap over a densely populated ring.
pub const RING_COPIES: usize = 3;
/// Rest angle of the first panel.
pub const START_ANGLE: f32 = -PI / 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Which shader a panel is wrapped in and the assets it samples.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelSource {
    Parallax {
        foreground: PathBuf,
        background: PathBuf,
        foreground_depth: PathBuf,
        /// Falls back to `foreground_depth` when the item has no separate one.
        background_depth: PathBuf,
    },
    Flat {
        image: PathBuf,
    },
    Video {
        url: String,
        poster: Option<PathBuf>,
    },
}

impl PanelSource {
    fn from_descriptor(descriptor: &MediaDescriptor, resolve: &impl Fn(&str) -> PathBuf) -> Self {
        match descriptor {
            MediaDescriptor::Image(item) => match (&item.background, &item.depth) {
                (Some(background), Some(depth)) => {
                    let foreground_depth = resolve(depth);
                    let background_depth = item
                        .background_depth
                        .as_deref()
                        .map(resolve)
                        .unwrap_or_else(|| foreground_depth.clone());
                    PanelSource::Parallax {
                        foreground: resolve(&item.image),
                        background: resolve(background),
                        foreground_depth,
                        background_depth,
                    }
                }
                _ => PanelSource::Flat {
                    image: resolve(&item.image),
                },
            },
            MediaDescriptor::Video(item) => PanelSource::Video {
                url: item.url.clone(),
                poster: item.poster.as_deref().map(resolve),
            },
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self {
            PanelSource::Video { .. } => MediaKind::Video,
            _ => MediaKind::Image,
        }
    }

    /// Texture files in shader slot order: foreground, background, foreground depth, background depth.
    pub fn texture_paths(&self) -> [Option<&PathBuf>; 4] {
        match self {
            PanelSource::Parallax {
                foreground,
                background,
                foreground_depth,
                background_depth,
            } => [
                Some(foreground),
                Some(background),
                Some(foreground_depth),
                Some(background_depth),
            ],
            PanelSource::Flat { image } => [Some(image), None, None, None],
            PanelSource::Video { poster, .. } => [poster.as_ref(), None, None, None],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub index: usize,
    /// Index of the logical media item this panel repeats.
    pub item: usize,
    pub source: PanelSource,
    /// Rest angle on the ring, in [0, 2π).
    pub angle: f32,
    pub params: ParameterSet,
    pub meta: PanelMeta,
}

impl Panel {
    pub fn media_kind(&self) -> MediaKind {
        self.source.media_kind()
    }

    /// Position on the unrotated ring.
    pub fn rest_position(&self, radius: f32) -> Vec3 {
        Vec3::new(self.angle.sin() * radius, 0.0, self.angle.cos() * radius)
    }
}

pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// Rotation of the whole ring for a given carousel rotation. A panel whose rest
/// angle equals `rotation` ends up straight ahead of the camera (+Z).
pub fn ring_rotation(rotation: f32) -> Quat {
    Quat::from_rotation_y(-rotation)
}

#[derive(Debug, Clone)]
pub struct Ring {
    pub panels: Vec<Panel>,
    pub layout: RingLayout,
    pub mesh: PanelMesh,
    pub item_count: usize,
    /// Bumped on every rebuild so stale per-panel state can be discarded.
    pub generation: u64,
}

impl Ring {
    pub fn build(
        descriptors: &[MediaDescriptor],
        viewport_width: f32,
        parallax_base: f32,
        generation: u64,
        resolve: impl Fn(&str) -> PathBuf,
    ) -> Self {
        let total = descriptors.len() * RING_COPIES;
        let layout = layout::resolve(viewport_width, total);
        let mesh = build_curved_panel(
            layout.panel_width,
            layout.panel_height,
            layout.segments,
            layout.radius,
        );

        let panels: Vec<Panel> = (0..total)
            .map(|index| {
                let item = index % descriptors.len();
                let descriptor = &descriptors[item];
                let source = PanelSource::from_descriptor(descriptor, &resolve);
                let params = match &source {
                    PanelSource::Parallax { .. } => ParameterSet::parallax(parallax_base),
                    PanelSource::Flat { .. } => ParameterSet::flat(),
                    PanelSource::Video { .. } => ParameterSet::video(),
                };
                Panel {
                    index,
                    item,
                    source,
                    angle: normalize_angle(START_ANGLE + index as f32 * layout.angle_step),
                    params,
                    meta: descriptor.meta().clone(),
                }
            })
            .collect();

        let videos = panels.iter().filter(|p| p.media_kind() == MediaKind::Video).count();
        log::info!(
            "Built ring: {} items x{} = {} panels ({} video), {:?}, radius {:.2}, panel {:.2}x{:.2}",
            descriptors.len(),
            RING_COPIES,
            total,
            videos,
            layout.breakpoint,
            layout.radius,
            layout.panel_width,
            layout.panel_height
        );

        Ring {
            panels,
            layout,
            mesh,
            item_count: descriptors.len(),
            generation,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn angles(&self) -> Vec<f32> {
        self.panels.iter().map(|p| p.angle).collect()
    }

    /// Panel model matrix: placed on the ring facing its centre, then the ring rotated.
    pub fn model_matrix(&self, index: usize, rotation: f32) -> Mat4 {
        let panel = &self.panels[index];
        let local = Mat4::from_rotation_translation(
            Quat::from_rotation_y(panel.angle + PI),
            panel.rest_position(self.layout.radius),
        );
        Mat4::from_quat(ring_rotation(rotation)) * local
    }

    pub fn world_position(&self, index: usize, rotation: f32) -> Vec3 {
        ring_rotation(rotation) * self.panels[index].rest_position(self.layout.radius)
    }
}
