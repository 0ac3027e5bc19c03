//! In-memory scene state.
//!
//! Placed entities are immutable once added. The only removal path is
//! `SceneGraph::clear`, which drops every entity at once.

use serde::{Deserialize, Serialize};

use crate::assets::ModelAsset;

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }
}

/// Column-major 4x4 world transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Transform {
    pub columns: [[f32; 4]; 4],
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        columns: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn from_translation(t: Vec3) -> Self {
        let mut transform = Self::IDENTITY;
        transform.columns[3] = [t.x, t.y, t.z, 1.0];
        transform
    }

    /// Position encoded in the fourth column.
    pub fn translation(&self) -> Vec3 {
        let c = self.columns[3];
        Vec3::new(c[0], c[1], c[2])
    }
}

// ----------------------------------------------------------------------------
// Entities
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const ORANGE: Rgb = Rgb(255, 165, 0);
    pub const CYAN: Rgb = Rgb(0, 255, 255);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Extruded 3D text with a small anchor sphere at its base.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextBubble {
    pub text: String,
    pub font: &'static str,
    pub font_size: f32,
    pub extrusion_depth: f32,
    pub chamfer_radius: f32,
    /// Uniform scale applied to the text node.
    pub text_scale: f32,
    pub diffuse: Rgb,
    pub specular: Rgb,
    pub double_sided: bool,
    pub sphere_radius: f32,
    pub sphere_color: Rgb,
    /// Turns about the vertical axis only to face the viewer.
    pub billboard_y_only: bool,
}

impl TextBubble {
    pub const DEPTH: f32 = 0.01;

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: "Arial",
            font_size: 0.15,
            extrusion_depth: Self::DEPTH,
            chamfer_radius: Self::DEPTH,
            text_scale: 0.2,
            diffuse: Rgb::ORANGE,
            specular: Rgb::WHITE,
            double_sided: true,
            sphere_radius: 0.005,
            sphere_color: Rgb::CYAN,
            billboard_y_only: true,
        }
    }
}

/// A loaded model asset, uniformly scaled.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelInstance {
    pub asset: ModelAsset,
    pub scale: Vec3,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityKind {
    Text(TextBubble),
    Model(ModelInstance),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(pub u64);

/// An entity placed into the scene. Fields are read-only after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacedObject {
    id: EntityId,
    position: Vec3,
    kind: EntityKind,
}

impl PlacedObject {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }
}

// ----------------------------------------------------------------------------
// SceneGraph
// ----------------------------------------------------------------------------

/// Scene mutation surface: add entities, clear them all.
pub trait SceneGraph {
    fn add(&mut self, position: Vec3, kind: EntityKind) -> EntityId;

    /// Remove every placed entity. Returns how many were removed.
    fn clear(&mut self) -> usize;

    fn entities(&self) -> &[PlacedObject];

    fn len(&self) -> usize {
        self.entities().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scene held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryScene {
    next_id: u64,
    entities: Vec<PlacedObject>,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SceneGraph for MemoryScene {
    fn add(&mut self, position: Vec3, kind: EntityKind) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.push(PlacedObject { id, position, kind });
        id
    }

    fn clear(&mut self) -> usize {
        let removed = self.entities.len();
        self.entities.clear();
        removed
    }

    fn entities(&self) -> &[PlacedObject] {
        &self.entities
    }
}
