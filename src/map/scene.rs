//! Scene-graph seam: where obstacles are instantiated and collisions are queried.

use std::collections::BTreeMap;

use crate::map::generator::{COURSE_HALF_WIDTH, PILLAR_RADIUS};
use crate::map::types::{ObstacleKind, ObstacleSpec};

pub type SceneObjectId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WallSide {
    Left,
    Right,
}

/// A collider currently overlapping the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Contact {
    Obstacle { id: SceneObjectId, kind: ObstacleKind },
    Wall(WallSide),
}

/// The host scene graph as seen by the map manager.
pub trait SceneHost: Send {
    /// Place an obstacle at a world position and return its handle.
    fn instantiate(&mut self, obstacle: &ObstacleSpec, world_position: [f32; 2]) -> SceneObjectId;

    /// Remove an obstacle. Unknown handles are ignored.
    fn destroy(&mut self, id: SceneObjectId);

    /// Colliders overlapping a disc at `position`.
    fn contacts(&self, position: [f32; 2], radius: f32) -> Vec<Contact>;

    /// Number of live obstacles.
    fn object_count(&self) -> usize;
}

#[derive(Clone, Debug)]
struct SceneObject {
    kind: ObstacleKind,
    position: [f32; 2],
}

/// In-process scene with circular pillar colliders and two lateral walls.
#[derive(Clone, Debug)]
pub struct HeadlessScene {
    next_id: SceneObjectId,
    objects: BTreeMap<SceneObjectId, SceneObject>,
    walls: (f32, f32),
}

impl HeadlessScene {
    /// A scene whose course centre line runs along `x = center_x`.
    pub fn new(center_x: f32) -> Self {
        Self {
            next_id: 0,
            objects: BTreeMap::new(),
            walls: (center_x - COURSE_HALF_WIDTH, center_x + COURSE_HALF_WIDTH),
        }
    }
}

impl SceneHost for HeadlessScene {
    fn instantiate(&mut self, obstacle: &ObstacleSpec, world_position: [f32; 2]) -> SceneObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, SceneObject { kind: obstacle.kind, position: world_position });
        id
    }

    fn destroy(&mut self, id: SceneObjectId) {
        self.objects.remove(&id);
    }

    fn contacts(&self, position: [f32; 2], radius: f32) -> Vec<Contact> {
        let mut out: Vec<Contact> = self
            .objects
            .iter()
            .filter(|(_, o)| o.kind.is_solid())
            .filter(|(_, o)| {
                let dx = o.position[0] - position[0];
                let dz = o.position[1] - position[1];
                let reach = radius + PILLAR_RADIUS;
                dx * dx + dz * dz <= reach * reach
            })
            .map(|(&id, o)| Contact::Obstacle { id, kind: o.kind })
            .collect();
        if position[0] - radius <= self.walls.0 {
            out.push(Contact::Wall(WallSide::Left));
        }
        if position[0] + radius >= self.walls.1 {
            out.push(Contact::Wall(WallSide::Right));
        }
        out
    }

    fn object_count(&self) -> usize { self.objects.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::types::Lane;

    fn pillar(kind: ObstacleKind) -> ObstacleSpec {
        ObstacleSpec { kind, position: [0.0, 0.0], rotation: 0.0, lane: Lane::Middle, index: 0 }
    }

    #[test]
    fn only_pillars_and_walls_collide() {
        let mut scene = HeadlessScene::new(0.0);
        let blue = scene.instantiate(&pillar(ObstacleKind::BlueObstacle), [1.0, 5.0]);
        scene.instantiate(&pillar(ObstacleKind::Checkpoint), [0.0, 5.0]);
        assert_eq!(scene.contacts([0.0, 5.0], 0.15), vec![]);
        assert_eq!(
            scene.contacts([0.7, 5.0], 0.15),
            vec![Contact::Obstacle { id: blue, kind: ObstacleKind::BlueObstacle }]
        );
        assert_eq!(scene.contacts([4.9, 0.0], 0.15), vec![Contact::Wall(WallSide::Right)]);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut scene = HeadlessScene::new(20.0);
        let id = scene.instantiate(&pillar(ObstacleKind::RedObstacle), [20.0, 3.0]);
        assert_eq!(scene.object_count(), 1);
        scene.destroy(id);
        scene.destroy(id);
        assert_eq!(scene.object_count(), 0);
        assert_eq!(scene.contacts([20.0, 3.0], 0.5), vec![]);
    }
}
