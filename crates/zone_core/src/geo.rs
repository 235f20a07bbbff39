//! Small 2D geometry helpers.
//!
//! The world is simulated on the horizontal plane: distances and footprints
//! ignore the vertical axis even though positions are stored as [`Vec3`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned footprint on the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub fn new(x: f32, z: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            z,
            width,
            height,
        }
    }

    /// Whether the point lies inside this footprint.
    #[must_use]
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.z >= self.z && p.z <= self.z + self.height
    }

    /// Center of the footprint, at ground level.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.x + self.width / 2.0, 0.0, self.z + self.height / 2.0)
    }
}

/// Distance between two positions on the horizontal plane.
#[must_use]
pub fn distance_2d(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}
