//! Global sizing parameters threaded through every pipeline component.

/// Texture resolution, aspect correction, and mesh dimensions.
///
/// Recomputed on resize and handed to each component's `update_globals`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalParams {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub texture_ratio: f32,
    pub texsize_x: u32,
    pub texsize_y: u32,
    pub mesh_width: u32,
    pub mesh_height: u32,
    pub aspect_x: f32,
    pub aspect_y: f32,
}

impl GlobalParams {
    pub fn new(
        width: u32,
        height: u32,
        pixel_ratio: f32,
        texture_ratio: f32,
        mesh_width: u32,
        mesh_height: u32,
    ) -> Self {
        let texsize_x = (width as f32 * pixel_ratio * texture_ratio).round().max(1.0) as u32;
        let texsize_y = (height as f32 * pixel_ratio * texture_ratio).round().max(1.0) as u32;
        let aspect_x = if texsize_y > texsize_x {
            texsize_x as f32 / texsize_y as f32
        } else {
            1.0
        };
        let aspect_y = if texsize_x > texsize_y {
            texsize_y as f32 / texsize_x as f32
        } else {
            1.0
        };
        Self {
            width,
            height,
            pixel_ratio,
            texture_ratio,
            texsize_x,
            texsize_y,
            mesh_width,
            mesh_height,
            aspect_x,
            aspect_y,
        }
    }

    /// Inverse aspect factors, exposed to frame equations.
    pub fn inv_aspect(&self) -> (f32, f32) {
        (1.0 / self.aspect_x, 1.0 / self.aspect_y)
    }

    /// Vertex count of the warp mesh, `(w+1)*(h+1)`.
    pub fn mesh_vertex_count(&self) -> usize {
        (self.mesh_width as usize + 1) * (self.mesh_height as usize + 1)
    }
}

impl Default for GlobalParams {
    fn default() -> Self {
        Self::new(1200, 900, 1.0, 1.0, 48, 36)
    }
}
