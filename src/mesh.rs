// mesh.rs — curved panel geometry
// A flat width×height plane subdivided segments×segments, bent onto the ring arc.
// Local +Z points at the ring centre; the panel edges curve toward it.

#[derive(Debug, Clone)]
pub struct PanelMesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

/// Maps a flat-plane x onto the arc of `radius`: returns the bent (x, z).
pub fn bend(x: f32, radius: f32) -> (f32, f32) {
    let angle = x / radius;
    let bx = angle.sin() * radius;
    let bz = -angle.cos() * radius + radius * 0.9;
    (bx, bz)
}

pub fn build_curved_panel(width: f32, height: f32, segments: u32, radius: f32) -> PanelMesh {
    let segments = segments.max(1) as usize;
    let verts = (segments + 1) * (segments + 1);
    let mut positions = Vec::with_capacity(verts);
    let mut uvs = Vec::with_capacity(verts);
    let mut indices = Vec::with_capacity(segments * segments * 6);

    for i in 0..=segments {
        let v = i as f32 / segments as f32;
        let y = height * (0.5 - v);

        for j in 0..=segments {
            let u = j as f32 / segments as f32;
            let x = width * (u - 0.5);
            let (bx, bz) = bend(x, radius);

            positions.push([bx, y, bz]);
            uvs.push([u, v]);
        }
    }

    for i in 0..segments {
        for j in 0..segments {
            let a = (i * (segments + 1) + j) as u32;
            let b = a + (segments + 1) as u32;

            indices.extend_from_slice(&[
                a, b, a + 1,
                b, b + 1, a + 1,
            ]);
        }
    }

    PanelMesh {
        positions,
        uvs,
        indices,
    }
}
