use carsim_arena::episode::CollisionKind;
use carsim_arena::{
    Arena, ArenaConfig, CarsimError, CollisionMode, GeneratorConfig, InfoValue, MapSource, MapType, Observation,
    ResetOptions, StepDriver, StepResult,
};
use proptest::prelude::*;

fn config() -> ArenaConfig {
    ArenaConfig { image_width: 24, image_height: 12, ..ArenaConfig::default() }
}

fn arena(cfg: ArenaConfig) -> Arena {
    Arena::new(cfg).expect("valid config")
}

fn easy() -> ResetOptions {
    ResetOptions::new().map_type(MapType::EasyGoalLaneMiddleBlueFirst)
}

#[test]
fn second_step_without_a_tick_is_refused() {
    let mut a = arena(ArenaConfig { step_driver: StepDriver::Host, ..config() });
    a.reset(easy()).unwrap();
    let first = a.step(0, 1.0, 1.0).unwrap();
    assert!(!first.previous_step_not_finished);
    let second = a.step(1, 1.0, 1.0).unwrap();
    assert!(second.previous_step_not_finished);
    assert_eq!(second.reward, 0.0);

    for _ in 0..a.config().ticks_per_step() {
        a.tick();
    }
    let third = a.step(1, 1.0, 1.0).unwrap();
    assert!(!third.previous_step_not_finished);
    assert_eq!(third.bootstrapped_rewards.len(), 2);
}

#[test]
fn free_running_mode_accepts_every_step() {
    let mut a = arena(ArenaConfig { fixed_timesteps: false, step_driver: StepDriver::Host, ..config() });
    a.reset(easy()).unwrap();
    for id in 0..5 {
        assert!(!a.step(id, 0.5, 0.5).unwrap().previous_step_not_finished);
    }
}

#[test]
fn wrong_step_id_is_a_protocol_violation() {
    let mut a = arena(config());
    a.reset(easy()).unwrap();
    assert!(matches!(a.step(4, 1.0, 1.0), Err(CarsimError::ProtocolViolation(_))));
}

#[test]
fn part2_without_part1_is_rejected() {
    let mut a = arena(config());
    a.reset(easy()).unwrap();
    assert!(matches!(a.async_step_part2(), Err(CarsimError::ProtocolViolation(_))));
}

#[test]
fn host_driven_async_cycle_reports_reward_gained_while_waiting() {
    let mut a = arena(ArenaConfig { step_driver: StepDriver::Host, ..config() });
    a.reset(easy()).unwrap();
    // Warm up so the vehicle is moving.
    for id in 0..3 {
        a.step(id, 1.0, 1.0).unwrap();
        for _ in 0..a.config().ticks_per_step() {
            a.tick();
        }
    }
    let before = a.episode().unwrap().cumulative_reward();
    a.async_step_part1(1.0, 1.0).unwrap();
    for _ in 0..a.config().ticks_per_step() {
        a.tick();
    }
    let r = a.async_step_part2().unwrap();
    let after = a.episode().unwrap().cumulative_reward();
    assert!(r.reward > 0.0);
    assert!((r.reward - (after - before)).abs() < 1e-5);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // Forward-only driving on centred gates never loses reward between part 1 and part 2.
    #[test]
    fn async_reward_is_non_negative(
        throttle in proptest::collection::vec(0.0f32..=1.0, 1..60),
        run_id in 0u32..1000,
        red_first in any::<bool>(),
    ) {
        let map = if red_first { MapType::EasyGoalLaneMiddleRedFirst } else { MapType::EasyGoalLaneMiddleBlueFirst };
        let mut a = arena(config());
        a.reset(ResetOptions::new().map_type(map).run_id(run_id)).unwrap();
        for t in throttle {
            a.async_step_part1(t, t).unwrap();
            let r = a.async_step_part2().unwrap();
            prop_assert!(r.reward >= 0.0, "reward {} < 0", r.reward);
            if r.done {
                break;
            }
        }
    }
}

fn penalties_after_two_collisions(mode: CollisionMode) -> (InfoValue, bool) {
    let mut a = arena(ArenaConfig { collision_mode: mode, ..config() });
    a.reset(easy()).unwrap();
    a.step(0, 0.0, 0.0).unwrap();
    a.register_collision(CollisionKind::Obstacle).unwrap();
    a.step(1, 0.0, 0.0).unwrap();
    a.register_collision(CollisionKind::Obstacle).unwrap();
    let info = a.info();
    (info.get("collisions").cloned().unwrap(), a.episode().unwrap().is_terminated())
}

#[test]
fn collision_modes_penalise_as_configured() {
    assert_eq!(penalties_after_two_collisions(CollisionMode::Unrestricted), (InfoValue::I64(2), false));
    assert_eq!(penalties_after_two_collisions(CollisionMode::OncePerTimestep), (InfoValue::I64(2), false));
    assert_eq!(penalties_after_two_collisions(CollisionMode::OncePerEpisode), (InfoValue::I64(1), false));
    assert_eq!(penalties_after_two_collisions(CollisionMode::ResetUponCollision), (InfoValue::I64(1), true));
    assert_eq!(penalties_after_two_collisions(CollisionMode::IgnoreCollisions), (InfoValue::I64(0), false));
}

#[test]
fn driving_into_the_wall_ends_the_episode_and_stays_ended() {
    let mut a = arena(ArenaConfig { collision_mode: CollisionMode::ResetUponCollision, ..config() });
    a.reset(easy().spawn_rotation(90.0)).unwrap();
    let mut ended_at = None;
    for id in 0..300 {
        let r = a.step(id, 1.0, 1.0).unwrap();
        if r.done {
            assert!(r.terminated);
            assert_eq!(r.info.get("end_event"), Some(&InfoValue::Str("collision".into())));
            assert_eq!(r.info.get("wall_collisions"), Some(&InfoValue::I64(1)));
            ended_at = Some(id);
            break;
        }
    }
    let ended_at = ended_at.expect("wall reached");
    for id in ended_at + 1..ended_at + 5 {
        let r = a.step(id, 1.0, 1.0).unwrap();
        assert!(r.done);
        assert_eq!(r.reward, 0.0);
    }
}

#[test]
fn step_budget_truncates() {
    let mut a = arena(ArenaConfig { max_steps: 3, ..config() });
    a.reset(easy()).unwrap();
    let results: Vec<_> = (0..3).map(|id| a.step(id, 0.2, 0.2).unwrap()).collect();
    let last = results.last().unwrap();
    assert!(last.done);
    assert!(!last.terminated);
    assert_eq!(last.info.get("end_event"), Some(&InfoValue::Str("outOfTime".into())));
    assert!(!results[1].done);
}

#[test]
fn observation_is_a_placeholder_without_a_vehicle() {
    let mut a = arena(config());
    assert_eq!(a.get_observation(), Observation::placeholder(24, 12));
    let obs = a.reset(easy()).unwrap();
    assert_eq!(obs.data.len(), obs.expected_len());
    assert_ne!(obs, Observation::placeholder(24, 12));
}

#[test]
fn failed_load_leaves_nothing_spawned() {
    let dir = std::env::temp_dir().join(format!("carsim-arena-empty-{}", std::process::id()));
    let mut a = arena(ArenaConfig { map_source: MapSource::Load { dir }, ..config() });
    let err = a.reset(easy()).unwrap_err();
    assert!(err.is_persistence());
    assert_eq!(a.map_manager().scene().object_count(), 0);
    assert_eq!(a.get_observation(), Observation::placeholder(24, 12));
    assert!(matches!(a.step(0, 1.0, 1.0), Err(CarsimError::ProtocolViolation(_))));
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let err = Arena::new(ArenaConfig { physics_dt: 0.0, ..config() }).err().unwrap();
    assert!(matches!(err, CarsimError::Configuration(_)));
}

#[test]
fn eval_mode_is_reported_and_hides_indicators() {
    let mut a = arena(config());
    a.reset(easy().eval_mode(true)).unwrap();
    let info = a.get_info();
    assert_eq!(info.get("eval_mode").map(String::as_str), Some("true"));
    let list = a.map_manager().current_map().unwrap();
    let indicators = list.of_kind(carsim_arena::ObstacleKind::GoalIndicator).count();
    assert_eq!(a.map_manager().spawned_obstacle_count(), list.len() - indicators);
}

fn drive_straight_until_done(cfg: ArenaConfig) -> StepResult {
    let mut a = arena(ArenaConfig { collision_mode: CollisionMode::IgnoreCollisions, ..cfg });
    a.reset(easy().spawn_rotation(0.0)).unwrap();
    for id in 0..400 {
        let r = a.step(id, 1.0, 1.0).unwrap();
        if r.done {
            return r;
        }
    }
    panic!("episode did not end");
}

fn goals_passed_config(finish_line_distance: f32) -> ArenaConfig {
    ArenaConfig {
        generator: GeneratorConfig { is_finish_line_last_goal: false, finish_line_distance, ..GeneratorConfig::default() },
        ..config()
    }
}

#[test]
fn finish_line_after_the_last_goal_ends_in_success() {
    let r = drive_straight_until_done(config());
    assert!(r.terminated);
    assert_eq!(r.info.get("end_event"), Some(&InfoValue::Str("success".into())));
    assert_eq!(r.info.get("passed_goals"), r.info.get("goal_count"));
}

#[test]
fn inner_finish_line_does_not_cut_the_goal_sequence_short() {
    let r = drive_straight_until_done(goals_passed_config(9.0));
    assert!(r.terminated);
    assert_eq!(r.info.get("end_event"), Some(&InfoValue::Str("success".into())));
    assert_eq!(r.info.get("passed_goals"), Some(&InfoValue::I64(2)));
}

#[test]
fn distant_finish_line_does_not_delay_success() {
    let far = drive_straight_until_done(goals_passed_config(60.0));
    let last = drive_straight_until_done(config());
    assert_eq!(far.info.get("success"), Some(&InfoValue::Bool(true)));
    let steps = |r: &StepResult| r.info.get("amount_of_steps").cloned();
    // Ends on the last goal, before the finish line that closes the default course.
    match (steps(&far), steps(&last)) {
        (Some(InfoValue::I64(far)), Some(InfoValue::I64(last))) => assert!(far < last),
        other => panic!("{other:?}"),
    }
}
