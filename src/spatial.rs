//! Screen-to-world queries.
//!
//! The host's world tracker answers raycasts; this crate only consumes the
//! answer. `FloorPlaneQuery` is a fixed-camera stand-in used by the demo.

use serde::{Deserialize, Serialize};

use crate::scene::{Transform, Vec3};

/// A point in view coordinates (pixels, origin top-left).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaneAlignment {
    #[default]
    Any,
    Horizontal,
    Vertical,
}

/// A ray through `point`, tested against estimated planes of the given
/// alignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastQuery {
    pub point: ScreenPoint,
    pub alignment: PlaneAlignment,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaycastHit {
    pub world_transform: Transform,
    pub distance: f32,
}

/// Maps a screen point to world intersections, nearest first.
pub trait SpatialQuery: Send {
    fn raycast(&self, query: &RaycastQuery) -> Vec<RaycastHit>;
}

/// A horizontal floor seen from a fixed pinhole camera at the origin looking
/// down -Z. Points above the horizon miss.
#[derive(Clone, Copy, Debug)]
pub struct FloorPlaneQuery {
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Vertical field of view in radians.
    pub vertical_fov: f32,
    /// Camera height above the floor, in metres.
    pub camera_height: f32,
    /// Hits further than this are ignored.
    pub max_distance: f32,
}

impl FloorPlaneQuery {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            vertical_fov: 60f32.to_radians(),
            camera_height: 1.4,
            max_distance: 10.0,
        }
    }
}

impl SpatialQuery for FloorPlaneQuery {
    fn raycast(&self, query: &RaycastQuery) -> Vec<RaycastHit> {
        if query.alignment == PlaneAlignment::Vertical {
            return Vec::new();
        }
        let p = query.point;
        if p.x < 0.0 || p.y < 0.0 || p.x > self.viewport_width || p.y > self.viewport_height {
            return Vec::new();
        }
        let tan = (self.vertical_fov / 2.0).tan();
        let aspect = self.viewport_width / self.viewport_height;
        let ndc_x = 2.0 * p.x / self.viewport_width - 1.0;
        let ndc_y = 1.0 - 2.0 * p.y / self.viewport_height;
        let dir = Vec3::new(ndc_x * tan * aspect, ndc_y * tan, -1.0);
        if dir.y >= 0.0 {
            return Vec::new();
        }
        let t = -self.camera_height / dir.y;
        let hit = Vec3::new(dir.x * t, -self.camera_height, dir.z * t);
        let distance = (hit.x * hit.x + hit.y * hit.y + hit.z * hit.z).sqrt();
        if distance > self.max_distance {
            return Vec::new();
        }
        vec![RaycastHit {
            world_transform: Transform::from_translation(hit),
            distance,
        }]
    }
}
