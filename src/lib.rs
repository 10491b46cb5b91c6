pub mod arena;
pub mod config;
pub mod core;
pub mod episode;
pub mod map;
pub mod spaces;
pub mod utils;
pub mod vector;
pub mod vehicle;

pub use crate::arena::{Arena, ResetOptions};
pub use crate::config::{
    ArenaConfig, CollisionMode, KwArgs, LightSetting, MapSource, RewardCoefficients, SpawnOrientation, StepDriver,
};
pub use crate::core::{CarsimError, Env, Info, InfoValue, Observation, Result, Step, StepResult};
pub use crate::episode::{EndEvent, EpisodeManager, EpisodeSettings, EpisodeStatus, StepAdmission};
pub use crate::map::{
    EvaluationCursor, EvaluationSequence, EvaluationStep, GeneratorConfig, MapGenerator, MapManager, MapStore, MapType,
    ObstacleKind, ObstacleList, ObstacleSpec, generate,
};
pub use crate::spaces::{BoxSpace, Space};
pub use crate::utils::{encode_png, save_png};
pub use crate::vector::SyncVectorEnv;
pub use crate::vehicle::{VehicleHandle, VehicleKind};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// A tiny dummy environment to validate the trait compiles and basic methods work.
    struct CounterEnv {
        state: i32,
    }

    impl Env for CounterEnv {
        type Obs = i32;
        type Act = i32;

        fn reset(&mut self, _seed: Option<u64>) -> Result<(Self::Obs, Info)> {
            self.state = 0;
            Ok((self.state, Info::new()))
        }

        fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>> {
            self.state += action;
            let terminated = self.state >= 3;
            Ok(Step::new(self.state, 1.0, terminated, false, Info::new()))
        }
    }

    #[test]
    fn dummy_env_runs() {
        let mut env = CounterEnv { state: 0 };
        let (_obs, _info) = env.reset(None).unwrap();
        let s1 = env.step(1).unwrap();
        assert_eq!(s1.observation, 1);
        assert!(!s1.terminated);
        let s2 = env.step(2).unwrap();
        assert_eq!(s2.observation, 3);
        assert!(s2.terminated);
        assert!(env.render().is_none());
        env.close();
    }

    #[test]
    fn action_space_samples_stay_inside() {
        let mut rng = StdRng::seed_from_u64(42);
        let b = BoxSpace::wheel_commands();
        for _ in 0..100 {
            let v = b.sample(&mut rng);
            assert!(b.contains(&v));
        }
        assert_eq!(b.clip_command([3.0, f32::NAN]), [1.0, 0.0]);
    }

    #[test]
    fn arena_drives_forward_through_an_easy_course() {
        let mut arena = Arena::new(ArenaConfig {
            image_width: 16,
            image_height: 8,
            collision_mode: CollisionMode::IgnoreCollisions,
            ..ArenaConfig::default()
        })
        .unwrap();
        arena.reset(ResetOptions::new().map_type(MapType::EasyGoalLaneMiddleRedFirst)).unwrap();
        let mut last = None;
        for step in 0..200 {
            let r = arena.step(step, 1.0, 1.0).unwrap();
            assert!(r.reward >= 0.0);
            if r.done {
                last = Some(r);
                break;
            }
        }
        let r = last.expect("episode ends at the finish line");
        assert!(r.terminated);
        assert_eq!(r.info.get("success"), Some(&InfoValue::Bool(true)));
        assert_eq!(r.info.get("end_event"), Some(&InfoValue::Str("success".into())));
    }

    #[cfg(not(feature = "image"))]
    #[test]
    fn encode_png_without_feature_not_supported() {
        let frame = Observation::placeholder(2, 2);
        let err = encode_png(&frame).unwrap_err();
        match err {
            CarsimError::NotSupported(_) => {}
            other => panic!("Expected NotSupported, got {:?}", other),
        }
    }

    #[cfg(feature = "image")]
    #[test]
    fn encode_png_with_feature_produces_png_signature() {
        let frame = Observation { width: 2, height: 2, data: vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255] };
        let bytes = encode_png(&frame).expect("PNG encoding should succeed");
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}
