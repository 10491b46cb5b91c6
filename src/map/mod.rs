pub mod evaluation;
pub mod generator;
pub mod manager;
pub mod scene;
pub mod store;
pub mod types;

pub use evaluation::{EvaluationCursor, EvaluationSequence, EvaluationStep, evaluation_schedule};
pub use generator::{COURSE_HALF_WIDTH, GeneratorConfig, MapGenerator, PILLAR_RADIUS, generate};
pub use manager::{INSTANCE_SPACING, MapManager, instance_origin, spawn_heading};
pub use scene::{Contact, HeadlessScene, SceneHost, SceneObjectId, WallSide};
pub use store::{MAP_FORMAT_VERSION, MapStore};
pub use types::{
    CONCRETE_MAP_TYPES, ColorOrder, Difficulty, Lane, MapType, ObstacleKind, ObstacleList, ObstacleSpec,
};
