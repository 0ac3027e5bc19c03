//! Tap-to-place.
//!
//! A tap is turned into a raycast; on a hit the latest selected label becomes
//! either a text bubble or a model instance at the hit position. Misses,
//! empty labels and unknown assets place nothing and are not errors.

use serde::{Deserialize, Serialize};

use crate::assets::AssetStore;
use crate::prediction::PredictionReader;
use crate::scene::{EntityId, EntityKind, ModelInstance, SceneGraph, TextBubble, Vec3};
use crate::spatial::{PlaneAlignment, RaycastQuery, ScreenPoint, SpatialQuery};

/// Scale applied to loaded models.
pub const DEFAULT_MODEL_SCALE: f32 = 0.001;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    #[default]
    Text,
    Model,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementSettings {
    pub mode: PlacementMode,
    pub alignment: PlaneAlignment,
    pub model_scale: f32,
}

impl PlacementSettings {
    /// Text bubbles go on any surface; models only on horizontal ones.
    pub fn for_mode(mode: PlacementMode) -> Self {
        let alignment = match mode {
            PlacementMode::Text => PlaneAlignment::Any,
            PlacementMode::Model => PlaneAlignment::Horizontal,
        };
        Self {
            mode,
            alignment,
            model_scale: DEFAULT_MODEL_SCALE,
        }
    }
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self::for_mode(PlacementMode::default())
    }
}

/// Discrete user actions from the interactive context.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UiEvent {
    Tap(ScreenPoint),
    Reset,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed(EntityId),
    NoIntersection,
    EmptyLabel,
    AssetNotFound(String),
    /// A reset removed this many entities.
    Cleared(usize),
}

impl PlacementOutcome {
    pub fn placed(&self) -> Option<EntityId> {
        match self {
            PlacementOutcome::Placed(id) => Some(*id),
            _ => None,
        }
    }
}

/// Converts taps into scene mutations using the latest prediction.
pub struct PlacementTrigger {
    query: Box<dyn SpatialQuery>,
    assets: Box<dyn AssetStore>,
    prediction: PredictionReader,
    settings: PlacementSettings,
}

impl PlacementTrigger {
    pub fn new(
        query: Box<dyn SpatialQuery>,
        assets: Box<dyn AssetStore>,
        prediction: PredictionReader,
        settings: PlacementSettings,
    ) -> Self {
        Self {
            query,
            assets,
            prediction,
            settings,
        }
    }

    pub fn settings(&self) -> PlacementSettings {
        self.settings
    }

    pub fn handle(&self, event: UiEvent, scene: &mut dyn SceneGraph) -> PlacementOutcome {
        match event {
            UiEvent::Tap(point) => self.on_tap(point, scene),
            UiEvent::Reset => PlacementOutcome::Cleared(self.reset(scene)),
        }
    }

    /// Place the latest label at the world position under `point`.
    pub fn on_tap(&self, point: ScreenPoint, scene: &mut dyn SceneGraph) -> PlacementOutcome {
        let query = RaycastQuery {
            point,
            alignment: self.settings.alignment,
        };
        let Some(hit) = self.query.raycast(&query).into_iter().next() else {
            log::debug!("tap at ({:.0}, {:.0}): no intersection", point.x, point.y);
            return PlacementOutcome::NoIntersection;
        };
        let position = hit.world_transform.translation();

        let label = self.prediction.latest();
        if label.placement.is_empty() {
            log::debug!("tap ignored: no label yet");
            return PlacementOutcome::EmptyLabel;
        }

        let kind = match self.settings.mode {
            PlacementMode::Text => EntityKind::Text(TextBubble::new(label.placement.clone())),
            PlacementMode::Model => match self.assets.resolve(&label.placement) {
                Some(asset) => EntityKind::Model(ModelInstance {
                    asset,
                    scale: Vec3::splat(self.settings.model_scale),
                }),
                None => {
                    log::debug!("no asset for label {:?}", label.placement);
                    return PlacementOutcome::AssetNotFound(label.placement);
                }
            },
        };

        let id = scene.add(position, kind);
        log::info!(
            "placed {:?} #{} at ({:.2}, {:.2}, {:.2})",
            label.placement,
            id.0,
            position.x,
            position.y,
            position.z
        );
        PlacementOutcome::Placed(id)
    }

    /// Remove every placed entity.
    pub fn reset(&self, scene: &mut dyn SceneGraph) -> usize {
        let removed = scene.clear();
        log::info!("scene reset: removed {} entities", removed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetStore;
    use crate::prediction::{prediction_cell, PredictionWriter};
    use crate::scene::{MemoryScene, Transform};
    use crate::select::SelectedLabel;
    use crate::spatial::RaycastHit;

    struct FixedQuery(Option<Vec3>);

    impl SpatialQuery for FixedQuery {
        fn raycast(&self, _query: &RaycastQuery) -> Vec<RaycastHit> {
            self.0
                .map(|p| RaycastHit {
                    world_transform: Transform::from_translation(p),
                    distance: 1.0,
                })
                .into_iter()
                .collect()
        }
    }

    fn trigger(hit: Option<Vec3>, mode: PlacementMode) -> (PlacementTrigger, PredictionWriter) {
        let (writer, reader) = prediction_cell(SelectedLabel::placeholder(""));
        let trigger = PlacementTrigger::new(
            Box::new(FixedQuery(hit)),
            Box::new(MemoryAssetStore::new(["ball"])),
            reader,
            PlacementSettings::for_mode(mode),
        );
        (trigger, writer)
    }

    fn label(placement: &str) -> SelectedLabel {
        SelectedLabel {
            display: placement.to_string(),
            placement: placement.to_string(),
            confidence: 0.9,
            frame_sequence: Some(1),
        }
    }

    #[test]
    fn text_mode_places_bubble_at_hit() {
        let (trigger, writer) = trigger(Some(Vec3::new(1.0, 0.0, -2.0)), PlacementMode::Text);
        writer.publish(label("cat"));
        let mut scene = MemoryScene::new();

        let outcome = trigger.on_tap(ScreenPoint::new(10.0, 10.0), &mut scene);
        assert!(outcome.placed().is_some());
        assert_eq!(scene.len(), 1);
        let placed = &scene.entities()[0];
        assert_eq!(placed.position(), Vec3::new(1.0, 0.0, -2.0));
        match placed.kind() {
            EntityKind::Text(bubble) => assert_eq!(bubble.text, "cat"),
            other => panic!("unexpected entity {:?}", other),
        }
    }

    #[test]
    fn miss_places_nothing() {
        let (trigger, writer) = trigger(None, PlacementMode::Text);
        writer.publish(label("cat"));
        let mut scene = MemoryScene::new();
        assert_eq!(
            trigger.on_tap(ScreenPoint::new(10.0, 10.0), &mut scene),
            PlacementOutcome::NoIntersection
        );
        assert!(scene.is_empty());
    }

    #[test]
    fn unknown_asset_places_nothing() {
        let (trigger, writer) = trigger(Some(Vec3::default()), PlacementMode::Model);
        writer.publish(label("teapot"));
        let mut scene = MemoryScene::new();
        assert_eq!(
            trigger.on_tap(ScreenPoint::default(), &mut scene),
            PlacementOutcome::AssetNotFound("teapot".to_string())
        );
        assert!(scene.is_empty());
    }

    #[test]
    fn known_asset_is_scaled_down() {
        let (trigger, writer) = trigger(Some(Vec3::default()), PlacementMode::Model);
        writer.publish(label("ball"));
        let mut scene = MemoryScene::new();
        trigger.on_tap(ScreenPoint::default(), &mut scene);
        match scene.entities()[0].kind() {
            EntityKind::Model(model) => {
                assert_eq!(model.asset.name, "ball");
                assert_eq!(model.scale, Vec3::splat(DEFAULT_MODEL_SCALE));
            }
            other => panic!("unexpected entity {:?}", other),
        }
    }

    #[test]
    fn empty_label_places_nothing() {
        let (trigger, _writer) = trigger(Some(Vec3::default()), PlacementMode::Text);
        let mut scene = MemoryScene::new();
        assert_eq!(
            trigger.on_tap(ScreenPoint::default(), &mut scene),
            PlacementOutcome::EmptyLabel
        );
        assert!(scene.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let (trigger, writer) = trigger(Some(Vec3::default()), PlacementMode::Text);
        writer.publish(label("cat"));
        let mut scene = MemoryScene::new();
        for _ in 0..3 {
            trigger.handle(UiEvent::Tap(ScreenPoint::default()), &mut scene);
        }
        assert_eq!(scene.len(), 3);
        assert_eq!(
            trigger.handle(UiEvent::Reset, &mut scene),
            PlacementOutcome::Cleared(3)
        );
        assert_eq!(scene.len(), 0);
    }

    #[test]
    fn settings_alignment_follows_mode() {
        assert_eq!(
            PlacementSettings::for_mode(PlacementMode::Text).alignment,
            PlaneAlignment::Any
        );
        assert_eq!(
            PlacementSettings::for_mode(PlacementMode::Model).alignment,
            PlaneAlignment::Horizontal
        );
    }
}
