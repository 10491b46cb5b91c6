//! Deterministic procedural obstacle-course generator.
//!
//! `generate(map_type, run_id)` is a pure function: every random choice is
//! drawn from [`map_rng`], which is seeded from the run id alone.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{CarsimError, Result};
use crate::map::types::{ColorOrder, Difficulty, Lane, MapType, ObstacleKind, ObstacleList, ObstacleSpec};
use crate::utils::map_rng;

/// Lateral walls sit at `x = ±COURSE_HALF_WIDTH`.
pub const COURSE_HALF_WIDTH: f32 = 5.0;
/// Collider radius of a coloured pillar.
pub const PILLAR_RADIUS: f32 = 0.2;

const FIRST_GOAL_Z: f32 = 6.0;
const GOAL_SPACING: f32 = 6.0;
const SPACING_JITTER: f32 = 0.5;

/// Generator settings that are fixed for the lifetime of a map manager.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Append the finish line one spacing after the last goal.
    pub is_finish_line_last_goal: bool,
    /// Finish-line z when it is not placed after the last goal.
    pub finish_line_distance: f32,
    /// Emit a goal indicator marker for each goal.
    pub goal_indicators: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { is_finish_line_last_goal: true, finish_line_distance: 24.0, goal_indicators: true }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.finish_line_distance.is_finite() && self.finish_line_distance > 0.0) {
            return Err(CarsimError::Configuration(format!(
                "finish_line_distance must be positive, got {}",
                self.finish_line_distance
            )));
        }
        Ok(())
    }
}

struct Recipe {
    lane_offset: f32,
    gate_width: f32,
    lateral_jitter: f32,
    yaw_jitter: f32,
}

impl Recipe {
    fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Recipe { lane_offset: 0.0, gate_width: 3.0, lateral_jitter: 0.0, yaw_jitter: 0.0 },
            Difficulty::Medium => Recipe { lane_offset: 2.0, gate_width: 2.4, lateral_jitter: 0.3, yaw_jitter: 0.0 },
            Difficulty::Hard => Recipe { lane_offset: 2.6, gate_width: 1.8, lateral_jitter: 0.5, yaw_jitter: 10.0 },
        }
    }
}

/// Draws from a symmetric range, or returns 0 without consuming randomness when the range is empty.
fn jitter<R: Rng>(rng: &mut R, amplitude: f32) -> f32 {
    if amplitude > 0.0 { rng.gen_range(-amplitude..=amplitude) } else { 0.0 }
}

#[derive(Clone, Debug, Default)]
pub struct MapGenerator {
    config: GeneratorConfig,
}

impl MapGenerator {
    pub fn new(config: GeneratorConfig) -> Self { Self { config } }

    pub fn config(&self) -> &GeneratorConfig { &self.config }

    pub fn generate(&self, map_type: MapType, run_id: u32) -> ObstacleList {
        let mut rng = map_rng(run_id);

        // Always exactly one draw, so a random type resolving to X yields X's course.
        let candidates = map_type.candidates();
        let pick = rng.gen_range(0..candidates.len() as u32) as usize;
        let layout = candidates[pick];

        let difficulty = layout.difficulty().unwrap_or(Difficulty::Easy);
        let recipe = Recipe::for_difficulty(difficulty);
        let goal_count = layout.goal_count();

        let mut obstacles = Vec::with_capacity(goal_count * 4 + 1);
        let mut lane = layout.first_lane();
        let mut left_is_blue = layout.color_order() == ColorOrder::BlueFirst;
        let mut z = FIRST_GOAL_Z;

        for goal in 0..goal_count {
            if goal > 0 {
                z += GOAL_SPACING + jitter(&mut rng, SPACING_JITTER);
            }
            let cx = lane.side() * recipe.lane_offset + jitter(&mut rng, recipe.lateral_jitter);
            let yaw = jitter(&mut rng, recipe.yaw_jitter);
            let (sin, cos) = yaw.to_radians().sin_cos();
            let half = recipe.gate_width / 2.0;
            let left = [cx - half * cos, z + half * sin];
            let right = [cx + half * cos, z - half * sin];
            let (left_kind, right_kind) = if left_is_blue {
                (ObstacleKind::BlueObstacle, ObstacleKind::RedObstacle)
            } else {
                (ObstacleKind::RedObstacle, ObstacleKind::BlueObstacle)
            };
            let index = goal as u32;
            let spec = |kind, position| ObstacleSpec { kind, position, rotation: yaw, lane, index };

            obstacles.push(spec(ObstacleKind::Checkpoint, [cx, z]));
            obstacles.push(spec(left_kind, left));
            obstacles.push(spec(right_kind, right));
            if self.config.goal_indicators {
                obstacles.push(spec(ObstacleKind::GoalIndicator, [cx, z]));
            }

            lane = lane.opposite();
            left_is_blue = !left_is_blue;
        }

        let finish_z = if self.config.is_finish_line_last_goal {
            z + GOAL_SPACING
        } else {
            self.config.finish_line_distance
        };
        let finish = ObstacleSpec {
            kind: ObstacleKind::FinishLine,
            position: [0.0, finish_z],
            rotation: 0.0,
            lane: Lane::Middle,
            index: goal_count as u32,
        };
        // Insert before the first goal group lying beyond the line, keeping traversal order.
        let at = obstacles
            .iter()
            .position(|o| o.kind == ObstacleKind::Checkpoint && o.position[1] > finish_z)
            .unwrap_or(obstacles.len());
        obstacles.insert(at, finish);

        ObstacleList { map_type, layout, run_id, obstacles }
    }
}

/// Generate with the default settings.
pub fn generate(map_type: MapType, run_id: u32) -> ObstacleList {
    MapGenerator::default().generate(map_type, run_id)
}
