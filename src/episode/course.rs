//! Goal geometry extracted from an obstacle list, in world coordinates.

use crate::map::{ObstacleKind, ObstacleList, PILLAR_RADIUS};

const DEFAULT_GOAL_HALF_WIDTH: f32 = 1.0;
const FINISH_OVERRUN: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Goal {
    pub index: u32,
    pub center: [f32; 2],
    /// Lateral tolerance around `center` inside which the gate counts as passed.
    pub half_width: f32,
}

/// The ordered goals and the finish line of one spawned map.
#[derive(Clone, Debug, PartialEq)]
pub struct Course {
    goals: Vec<Goal>,
    finish: [f32; 2],
}

impl Course {
    pub fn new(goals: Vec<Goal>, finish: [f32; 2]) -> Self { Self { goals, finish } }

    /// Build from a map spawned at `origin`.
    pub fn from_obstacles(list: &ObstacleList, origin: [f32; 2]) -> Self {
        let world = |p: [f32; 2]| [p[0] + origin[0], p[1] + origin[1]];
        let goals: Vec<Goal> = list
            .of_kind(ObstacleKind::Checkpoint)
            .map(|cp| {
                let pillars: Vec<[f32; 2]> = list
                    .obstacles
                    .iter()
                    .filter(|o| o.kind.is_solid() && o.index == cp.index)
                    .map(|o| o.position)
                    .collect();
                let half_width = match pillars.as_slice() {
                    [a, b] => ((b[0] - a[0]).abs() / 2.0 - PILLAR_RADIUS).max(0.0),
                    _ => DEFAULT_GOAL_HALF_WIDTH,
                };
                Goal { index: cp.index, center: world(cp.position), half_width }
            })
            .collect();
        let finish = match list.finish_line() {
            Some(f) => world(f.position),
            None => {
                let last_z = goals.last().map_or(0.0, |g| g.center[1] - origin[1]);
                world([0.0, last_z + FINISH_OVERRUN])
            }
        };
        Self { goals, finish }
    }

    pub fn goals(&self) -> &[Goal] { &self.goals }

    pub fn finish(&self) -> [f32; 2] { self.finish }
}

/// Lateral position at which the segment `from → to` crosses the line `z = line_z`
/// moving forward, if it does.
pub fn forward_crossing(from: [f32; 2], to: [f32; 2], line_z: f32) -> Option<f32> {
    if from[1] < line_z && to[1] >= line_z {
        let t = (line_z - from[1]) / (to[1] - from[1]);
        Some(from[0] + t * (to[0] - from[0]))
    } else {
        None
    }
}
