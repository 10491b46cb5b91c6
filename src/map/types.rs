use serde::{Deserialize, Serialize};

use crate::config::named_enum;

/// Course difficulty tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A procedural-generation recipe.
///
/// Concrete variants fix the lane layout and colour order; the `Random*`
/// variants resolve to a concrete layout from the run-id seed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MapType {
    #[default]
    Random,
    EasyGoalLaneMiddleBlueFirst,
    EasyGoalLaneMiddleRedFirst,
    TwoGoalLanesBlueFirstLeftMedium,
    TwoGoalLanesBlueFirstRightMedium,
    TwoGoalLanesRedFirstLeftMedium,
    TwoGoalLanesRedFirstRightMedium,
    TwoGoalLanesBlueFirstLeftHard,
    TwoGoalLanesBlueFirstRightHard,
    TwoGoalLanesRedFirstLeftHard,
    TwoGoalLanesRedFirstRightHard,
    RandomEasy,
    RandomMedium,
    RandomHard,
}

named_enum!(MapType, Difficulty);

/// Which colour stands on the left of the first gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorOrder {
    BlueFirst,
    RedFirst,
}

/// Lateral lane of a goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lane {
    Left,
    Middle,
    Right,
}

impl Lane {
    pub fn opposite(self) -> Lane {
        match self {
            Lane::Left => Lane::Right,
            Lane::Middle => Lane::Middle,
            Lane::Right => Lane::Left,
        }
    }

    /// Sign of the lateral offset (x grows to the right).
    pub fn side(self) -> f32 {
        match self {
            Lane::Left => -1.0,
            Lane::Middle => 0.0,
            Lane::Right => 1.0,
        }
    }
}

pub const CONCRETE_MAP_TYPES: [MapType; 10] = [
    MapType::EasyGoalLaneMiddleBlueFirst,
    MapType::EasyGoalLaneMiddleRedFirst,
    MapType::TwoGoalLanesBlueFirstLeftMedium,
    MapType::TwoGoalLanesBlueFirstRightMedium,
    MapType::TwoGoalLanesRedFirstLeftMedium,
    MapType::TwoGoalLanesRedFirstRightMedium,
    MapType::TwoGoalLanesBlueFirstLeftHard,
    MapType::TwoGoalLanesBlueFirstRightHard,
    MapType::TwoGoalLanesRedFirstLeftHard,
    MapType::TwoGoalLanesRedFirstRightHard,
];

impl MapType {
    /// Stable numeric id used by launchers and evaluation logs.
    pub fn id(self) -> u8 {
        use MapType::*;
        match self {
            Random => 0,
            EasyGoalLaneMiddleBlueFirst => 1,
            EasyGoalLaneMiddleRedFirst => 2,
            TwoGoalLanesBlueFirstLeftMedium => 3,
            TwoGoalLanesBlueFirstRightMedium => 4,
            TwoGoalLanesRedFirstLeftMedium => 5,
            TwoGoalLanesRedFirstRightMedium => 6,
            TwoGoalLanesBlueFirstLeftHard => 7,
            TwoGoalLanesBlueFirstRightHard => 8,
            TwoGoalLanesRedFirstLeftHard => 9,
            TwoGoalLanesRedFirstRightHard => 10,
            RandomEasy => 11,
            RandomMedium => 12,
            RandomHard => 13,
        }
    }

    pub fn is_random(self) -> bool {
        matches!(self, MapType::Random | MapType::RandomEasy | MapType::RandomMedium | MapType::RandomHard)
    }

    /// Difficulty tier; `None` only for the unconstrained `Random`.
    pub fn difficulty(self) -> Option<Difficulty> {
        use MapType::*;
        match self {
            Random => None,
            EasyGoalLaneMiddleBlueFirst | EasyGoalLaneMiddleRedFirst | RandomEasy => Some(Difficulty::Easy),
            TwoGoalLanesBlueFirstLeftMedium
            | TwoGoalLanesBlueFirstRightMedium
            | TwoGoalLanesRedFirstLeftMedium
            | TwoGoalLanesRedFirstRightMedium
            | RandomMedium => Some(Difficulty::Medium),
            TwoGoalLanesBlueFirstLeftHard
            | TwoGoalLanesBlueFirstRightHard
            | TwoGoalLanesRedFirstLeftHard
            | TwoGoalLanesRedFirstRightHard
            | RandomHard => Some(Difficulty::Hard),
        }
    }

    /// Candidate concrete layouts this map type may resolve to.
    pub fn candidates(self) -> Vec<MapType> {
        match (self.is_random(), self.difficulty()) {
            (false, _) => vec![self],
            (true, None) => CONCRETE_MAP_TYPES.to_vec(),
            (true, Some(d)) => MapType::all_of_difficulty(d),
        }
    }

    /// Concrete layouts of a difficulty, in id order.
    pub fn all_of_difficulty(difficulty: Difficulty) -> Vec<MapType> {
        CONCRETE_MAP_TYPES
            .iter()
            .copied()
            .filter(|m| m.difficulty() == Some(difficulty))
            .collect()
    }

    /// Number of goals on the course. Random types report the maximum.
    pub fn goal_count(self) -> usize {
        match self.difficulty() {
            Some(Difficulty::Easy) => 2,
            _ => 3,
        }
    }

    pub fn color_order(self) -> ColorOrder {
        use MapType::*;
        match self {
            EasyGoalLaneMiddleRedFirst
            | TwoGoalLanesRedFirstLeftMedium
            | TwoGoalLanesRedFirstRightMedium
            | TwoGoalLanesRedFirstLeftHard
            | TwoGoalLanesRedFirstRightHard => ColorOrder::RedFirst,
            _ => ColorOrder::BlueFirst,
        }
    }

    /// Lane of the first goal.
    pub fn first_lane(self) -> Lane {
        use MapType::*;
        match self {
            TwoGoalLanesBlueFirstLeftMedium
            | TwoGoalLanesRedFirstLeftMedium
            | TwoGoalLanesBlueFirstLeftHard
            | TwoGoalLanesRedFirstLeftHard => Lane::Left,
            TwoGoalLanesBlueFirstRightMedium
            | TwoGoalLanesRedFirstRightMedium
            | TwoGoalLanesBlueFirstRightHard
            | TwoGoalLanesRedFirstRightHard => Lane::Right,
            _ => Lane::Middle,
        }
    }
}

/// What a generated obstacle is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObstacleKind {
    BlueObstacle,
    RedObstacle,
    /// Trigger line of a goal gate.
    Checkpoint,
    FinishLine,
    /// Visual marker above a goal; no collider.
    GoalIndicator,
}

impl ObstacleKind {
    /// Only the pillars carry colliders.
    pub fn is_solid(self) -> bool {
        matches!(self, ObstacleKind::BlueObstacle | ObstacleKind::RedObstacle)
    }
}

/// One generated obstacle in course-local coordinates (x right, z forward).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub kind: ObstacleKind,
    pub position: [f32; 2],
    /// Yaw in degrees.
    pub rotation: f32,
    pub lane: Lane,
    /// Ordinal of the goal this obstacle belongs to; the finish line takes the goal count.
    pub index: u32,
}

/// A generated course: obstacles in traversal order plus its key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleList {
    /// Requested map type; part of the persistence key.
    pub map_type: MapType,
    /// Concrete layout the request resolved to.
    pub layout: MapType,
    pub run_id: u32,
    pub obstacles: Vec<ObstacleSpec>,
}

impl ObstacleList {
    pub fn len(&self) -> usize { self.obstacles.len() }

    pub fn is_empty(&self) -> bool { self.obstacles.is_empty() }

    pub fn of_kind(&self, kind: ObstacleKind) -> impl Iterator<Item = &ObstacleSpec> {
        self.obstacles.iter().filter(move |o| o.kind == kind)
    }

    pub fn goal_count(&self) -> usize { self.of_kind(ObstacleKind::Checkpoint).count() }

    pub fn finish_line(&self) -> Option<&ObstacleSpec> { self.of_kind(ObstacleKind::FinishLine).next() }
}
