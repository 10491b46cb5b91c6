//! Environment facade: one simulated instance driven by one controller.
//!
//! Two stepping protocols are offered. [`Arena::step`] submits an action and
//! returns the result in one call. [`Arena::async_step_part1`] /
//! [`Arena::async_step_part2`] split the same cycle in two so the controller
//! can compute its next action while the simulation advances; the reward
//! returned by part 2 is the cumulative reward gained since part 1.

use std::collections::BTreeMap;

use rand::Rng;

use crate::config::{ArenaConfig, LightSetting, StepDriver};
use crate::core::{CarsimError, Env, Info, Observation, Result, Step, StepResult};
use crate::episode::{CollisionKind, EpisodeManager, EpisodeSettings, StepAdmission, TickInput};
use crate::map::{MapGenerator, MapManager, MapType, spawn_heading};
use crate::spaces::BoxSpace;
use crate::utils::{RUN_IDS_PER_INSTANCE, RngStream, SeedSequence, run_id_base, save_png};
use crate::vehicle::{Pose, VehicleHandle, VehicleKind};

/// Per-reset overrides of the configured defaults.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetOptions {
    pub map_type: Option<MapType>,
    /// Spawn heading in degrees; drawn from the spawn-orientation policy when absent.
    pub spawn_rotation: Option<f32>,
    pub light_setting: Option<LightSetting>,
    pub eval_mode: bool,
    /// Frame path prefix. Frames are written only when recording is enabled.
    pub video_filename: Option<String>,
    pub vehicle_kind: Option<VehicleKind>,
    /// Course seed; the next id of this instance's range when absent.
    pub run_id: Option<u32>,
}

impl ResetOptions {
    pub fn new() -> Self { Self::default() }

    pub fn map_type(mut self, map_type: MapType) -> Self {
        self.map_type = Some(map_type);
        self
    }

    pub fn spawn_rotation(mut self, degrees: f32) -> Self {
        self.spawn_rotation = Some(degrees);
        self
    }

    pub fn light_setting(mut self, light: LightSetting) -> Self {
        self.light_setting = Some(light);
        self
    }

    pub fn eval_mode(mut self, eval_mode: bool) -> Self {
        self.eval_mode = eval_mode;
        self
    }

    pub fn video_filename<S: Into<String>>(mut self, prefix: S) -> Self {
        self.video_filename = Some(prefix.into());
        self
    }

    pub fn vehicle_kind(mut self, kind: VehicleKind) -> Self {
        self.vehicle_kind = Some(kind);
        self
    }

    pub fn run_id(mut self, run_id: u32) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

/// Writes each observation as `<prefix><frame:05>.png`.
struct Recorder {
    prefix: String,
    frame: u32,
}

impl Recorder {
    fn record(&mut self, frame: &Observation) {
        let path = format!("{}{:05}.png", self.prefix, self.frame);
        self.frame += 1;
        if let Err(e) = save_png(&path, frame) {
            tracing::warn!(%path, error = %e, "failed to record frame");
        }
    }
}

pub struct Arena {
    config: ArenaConfig,
    maps: MapManager,
    vehicle: Option<VehicleHandle>,
    action_space: BoxSpace<f32, 2>,
    rng: RngStream,
    light: LightSetting,
    run_id: u32,
    /// Resets that drew their run id from this instance's range.
    implicit_resets: u32,
    /// Cumulative reward snapshot taken by async part 1, awaiting part 2.
    pending_async: Option<f32>,
    recorder: Option<Recorder>,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Result<Self> {
        config.validate()?;
        let maps = MapManager::new(
            MapGenerator::new(config.generator),
            config.map_source.clone(),
            config.instance_number,
        );
        let run_id = run_id_base(config.instance_number);
        Ok(Self {
            maps,
            vehicle: None,
            action_space: BoxSpace::wheel_commands(),
            rng: SeedSequence::new(u64::from(config.instance_number)).next_rng(),
            light: config.light_setting,
            run_id,
            implicit_resets: 0,
            pending_async: None,
            recorder: None,
            config,
        })
    }

    pub fn config(&self) -> &ArenaConfig { &self.config }

    pub fn action_space(&self) -> &BoxSpace<f32, 2> { &self.action_space }

    pub fn map_manager(&self) -> &MapManager { &self.maps }

    pub fn episode(&self) -> Option<&EpisodeManager> { self.vehicle.as_ref().map(|v| &v.episode) }

    pub fn vehicle_pose(&self) -> Option<Pose> { self.vehicle.as_ref().map(|v| v.drive.pose()) }

    pub fn run_id(&self) -> u32 { self.run_id }

    /// Lighting resolved at the last reset.
    pub fn light_setting(&self) -> LightSetting { self.light }

    pub fn is_async_pending(&self) -> bool { self.pending_async.is_some() }

    /// Tear down and rebuild the scene, start a fresh episode and return the
    /// first observation. Supersedes any in-flight step cycle.
    pub fn reset(&mut self, options: ResetOptions) -> Result<Observation> {
        self.config.validate()?;
        self.pending_async = None;
        self.recorder = None;
        self.vehicle = None;

        let map_type = options.map_type.unwrap_or(self.config.map_type);
        let vehicle_kind = options.vehicle_kind.unwrap_or(self.config.vehicle_kind);
        let run_id = match options.run_id {
            Some(id) => id,
            None => {
                let offset = self.implicit_resets % RUN_IDS_PER_INSTANCE;
                self.implicit_resets = self.implicit_resets.wrapping_add(1);
                run_id_base(self.config.instance_number).saturating_add(offset)
            }
        };

        let obstacles = self.maps.initialize_map_with_obstacles(map_type, run_id, options.eval_mode)?;
        let heading = spawn_heading(self.config.spawn_orientation, options.spawn_rotation, &mut self.rng);
        let mut vehicle =
            self.maps.spawn_vehicle(&obstacles, vehicle_kind, heading, EpisodeSettings::from_config(&self.config));
        vehicle.episode.start_episode(options.eval_mode, self.config.collision_mode, map_type, vehicle_kind);
        self.vehicle = Some(vehicle);
        self.run_id = run_id;
        self.light = self.resolve_light(options.light_setting.unwrap_or(self.config.light_setting));

        if self.config.fixed_timesteps {
            // Settle into WaitingForStep so the first step is admitted.
            self.tick();
        }

        self.recorder = match options.video_filename {
            Some(prefix) if self.config.record_video => Some(Recorder { prefix, frame: 0 }),
            Some(_) => {
                tracing::debug!("video filename given but recording is disabled");
                None
            }
            None => None,
        };

        tracing::info!(
            instance = self.config.instance_number,
            %map_type,
            run_id,
            vehicle = %vehicle_kind,
            light = %self.light,
            heading,
            eval_mode = options.eval_mode,
            "arena reset"
        );
        Ok(self.observe())
    }

    fn resolve_light(&mut self, light: LightSetting) -> LightSetting {
        match light {
            LightSetting::Random => match self.rng.gen_range(0..3u8) {
                0 => LightSetting::Bright,
                1 => LightSetting::Standard,
                _ => LightSetting::Dark,
            },
            concrete => concrete,
        }
    }

    /// One physics tick, as run by the host's fixed-update loop.
    pub fn tick(&mut self) {
        let dt = self.config.physics_dt;
        let Some(vehicle) = self.vehicle.as_mut() else { return };
        if !vehicle.episode.begin_tick() {
            return;
        }
        let previous = vehicle.drive.pose();
        vehicle.drive.integrate(dt);
        let current = vehicle.drive.pose();
        let contacts = self.maps.scene().contacts(current.position, vehicle.drive.radius());
        vehicle.episode.end_tick(TickInput {
            previous,
            current,
            forward_speed: vehicle.drive.forward_speed(),
            contacts: &contacts,
        });
    }

    /// Feed a collision event reported by the host outside of [`Arena::tick`].
    pub fn register_collision(&mut self, kind: CollisionKind) -> Result<()> {
        self.vehicle_mut()?.episode.register_collision(kind);
        Ok(())
    }

    fn vehicle_mut(&mut self) -> Result<&mut VehicleHandle> {
        self.vehicle
            .as_mut()
            .ok_or_else(|| protocol_violation("no vehicle spawned; call reset first"))
    }

    /// Admit a step, apply the clamped command and, with the inline driver,
    /// run its physics ticks.
    fn submit(&mut self, step_id: u32, left: f32, right: f32) -> Result<StepAdmission> {
        let [left, right] = self.action_space.clip_command([left, right]);
        let vehicle = self.vehicle_mut()?;
        let admission = vehicle.episode.increase_steps(step_id)?;
        if let StepAdmission::Accepted(_) = admission {
            vehicle.drive.actuate(left, right);
            tracing::debug!(step_id, left, right, "step accepted");
            if self.config.step_driver == StepDriver::Inline {
                self.run_step_ticks();
            }
        }
        Ok(admission)
    }

    fn run_step_ticks(&mut self) {
        if self.config.fixed_timesteps {
            while self.episode().is_some_and(|e| e.pending_ticks() > 0) {
                self.tick();
            }
        } else {
            for _ in 0..self.config.ticks_per_step() {
                if self.episode().is_none_or(|e| e.is_terminated()) {
                    break;
                }
                self.tick();
            }
        }
    }

    /// Synchronous step. A refused submission reports
    /// `previous_step_not_finished` and leaves the episode untouched.
    pub fn step(&mut self, step_id: u32, accel_left: f32, accel_right: f32) -> Result<StepResult> {
        if self.pending_async.is_some() {
            return Err(protocol_violation("step called between async part 1 and part 2"));
        }
        let admission = self.submit(step_id, accel_left, accel_right)?;
        let not_finished = admission == StepAdmission::PreviousStepNotFinished;
        let reward = if not_finished {
            tracing::warn!(step_id, "step refused, previous step not finished");
            0.0
        } else {
            self.vehicle_mut()?.episode.get_reward()
        };
        tracing::debug!(step_id, reward, "step result");
        self.build_result(reward, not_finished)
    }

    /// Submit the next step and snapshot the cumulative reward.
    pub fn async_step_part1(&mut self, accel_left: f32, accel_right: f32) -> Result<StepAdmission> {
        if self.pending_async.is_some() {
            return Err(protocol_violation("async part 1 called twice without part 2"));
        }
        let episode = &self.vehicle_mut()?.episode;
        let step_id = episode.steps_taken();
        let snapshot = episode.cumulative_reward();
        let admission = self.submit(step_id, accel_left, accel_right)?;
        if admission != StepAdmission::PreviousStepNotFinished {
            self.pending_async = Some(snapshot);
        }
        Ok(admission)
    }

    /// Complete the cycle opened by part 1.
    pub fn async_step_part2(&mut self) -> Result<StepResult> {
        let snapshot = self
            .pending_async
            .take()
            .ok_or_else(|| protocol_violation("async part 2 without a matching part 1"))?;
        let episode = &mut self.vehicle_mut()?.episode;
        let reward = episode.cumulative_reward() - snapshot;
        episode.get_reward();
        tracing::debug!(reward, "async step completed");
        self.build_result(reward, false)
    }

    fn build_result(&mut self, reward: f32, previous_step_not_finished: bool) -> Result<StepResult> {
        let observation = self.observe();
        let info = self.info();
        let vehicle = self.vehicle_mut()?;
        let episode = &vehicle.episode;
        let done = episode.is_terminated();
        let terminated = episode.end_event().is_some_and(|e| !e.is_truncation());
        Ok(StepResult {
            observation,
            reward,
            done,
            terminated,
            info,
            bootstrapped_rewards: episode.bootstrapped_rewards().to_vec(),
            previous_step_not_finished,
        })
    }

    /// Current camera image, or a black placeholder when nothing is spawned.
    pub fn get_observation(&self) -> Observation {
        let (w, h) = (self.config.image_width, self.config.image_height);
        match &self.vehicle {
            Some(v) => v.observe(self.light, w, h),
            None => Observation::placeholder(w, h),
        }
    }

    fn observe(&mut self) -> Observation {
        let frame = self.get_observation();
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&frame);
        }
        frame
    }

    /// Episode diagnostics plus arena-level keys.
    pub fn info(&self) -> Info {
        let mut info = match &self.vehicle {
            Some(v) => v.episode.get_info(),
            None => {
                let mut i = Info::new();
                i.insert("status", "notStarted");
                i
            }
        };
        info.insert("light_setting", self.light.to_string());
        info.insert("run_id", self.run_id);
        info.insert("instance", self.config.instance_number);
        info
    }

    /// [`Arena::info`] rendered as strings.
    pub fn get_info(&self) -> BTreeMap<String, String> { self.info().to_string_map() }

    fn next_step_id(&self) -> u32 { self.episode().map_or(0, |e| e.steps_taken()) }
}

fn protocol_violation(msg: &str) -> CarsimError {
    tracing::warn!(msg, "protocol violation");
    CarsimError::ProtocolViolation(msg.to_string())
}

impl Env for Arena {
    type Obs = Observation;
    type Act = [f32; 2];

    /// `seed` selects the run id.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, Info)> {
        let mut options = ResetOptions::new();
        if let Some(seed) = seed {
            let run_id = u32::try_from(seed)
                .map_err(|_| CarsimError::Configuration(format!("seed {seed} does not fit a run id")))?;
            options = options.run_id(run_id);
        }
        let obs = Arena::reset(self, options)?;
        Ok((obs, self.info()))
    }

    fn step(&mut self, action: [f32; 2]) -> Result<Step<Observation>> {
        let step_id = self.next_step_id();
        let r = Arena::step(self, step_id, action[0], action[1])?;
        let truncated = r.done && !r.terminated;
        Ok(Step::new(r.observation, r.reward, r.terminated, truncated, r.info))
    }

    fn render(&self) -> Option<Observation> { Some(self.get_observation()) }

    fn close(&mut self) {
        self.pending_async = None;
        self.recorder = None;
        self.vehicle = None;
        self.maps.destroy_map();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollisionMode;
    use crate::core::InfoValue;
    use crate::episode::EpisodeStatus;

    fn small_config() -> ArenaConfig {
        ArenaConfig { image_width: 16, image_height: 8, ..ArenaConfig::default() }
    }

    #[test]
    fn observation_before_reset_is_a_placeholder() {
        let arena = Arena::new(small_config()).unwrap();
        let obs = arena.get_observation();
        assert_eq!(obs, Observation::placeholder(16, 8));
        assert_eq!(arena.get_info().get("status").map(String::as_str), Some("notStarted"));
    }

    #[test]
    fn step_without_vehicle_is_a_protocol_violation() {
        let mut arena = Arena::new(small_config()).unwrap();
        assert!(matches!(arena.step(0, 1.0, 1.0), Err(CarsimError::ProtocolViolation(_))));
        assert!(matches!(arena.async_step_part1(1.0, 1.0), Err(CarsimError::ProtocolViolation(_))));
    }

    #[test]
    fn reset_settles_into_waiting_for_step() {
        let mut arena = Arena::new(small_config()).unwrap();
        let obs = arena.reset(ResetOptions::new().map_type(MapType::EasyGoalLaneMiddleBlueFirst)).unwrap();
        assert_eq!(obs.data.len(), obs.expected_len());
        assert_eq!(arena.episode().map(|e| e.status()), Some(EpisodeStatus::WaitingForStep));
        let r = arena.step(0, 1.0, 1.0).unwrap();
        assert!(!r.previous_step_not_finished);
        assert_eq!(r.bootstrapped_rewards.len(), 1);
        assert!(r.reward > 0.0);
    }

    #[test]
    fn async_protocol_guards() {
        let mut arena = Arena::new(small_config()).unwrap();
        arena.reset(ResetOptions::new()).unwrap();
        assert!(matches!(arena.async_step_part2(), Err(CarsimError::ProtocolViolation(_))));
        arena.async_step_part1(0.5, 0.5).unwrap();
        assert!(arena.is_async_pending());
        assert!(matches!(arena.async_step_part1(0.5, 0.5), Err(CarsimError::ProtocolViolation(_))));
        assert!(matches!(arena.step(1, 0.5, 0.5), Err(CarsimError::ProtocolViolation(_))));
        let r = arena.async_step_part2().unwrap();
        assert!(r.reward >= 0.0);
        assert!(!arena.is_async_pending());

        arena.async_step_part1(0.5, 0.5).unwrap();
        arena.reset(ResetOptions::new()).unwrap();
        assert!(!arena.is_async_pending());
    }

    #[test]
    fn run_ids_come_from_the_instance_range() {
        let mut arena = Arena::new(ArenaConfig { instance_number: 2, ..small_config() }).unwrap();
        arena.reset(ResetOptions::new()).unwrap();
        assert_eq!(arena.run_id(), run_id_base(2));
        arena.reset(ResetOptions::new()).unwrap();
        assert_eq!(arena.run_id(), run_id_base(2) + 1);
        arena.reset(ResetOptions::new().run_id(7)).unwrap();
        assert_eq!(arena.run_id(), 7);
        assert_eq!(arena.info().get("instance"), Some(&InfoValue::I64(2)));
    }

    #[test]
    fn implicit_run_ids_wrap_inside_the_instance_range() {
        let mut arena = Arena::new(ArenaConfig { instance_number: 1, ..small_config() }).unwrap();
        arena.implicit_resets = RUN_IDS_PER_INSTANCE - 1;
        arena.reset(ResetOptions::new()).unwrap();
        assert_eq!(arena.run_id(), run_id_base(2) - 1);
        arena.reset(ResetOptions::new()).unwrap();
        assert_eq!(arena.run_id(), run_id_base(1));
    }

    #[test]
    fn random_light_resolves_to_a_concrete_setting() {
        let mut arena = Arena::new(small_config()).unwrap();
        arena.reset(ResetOptions::new().light_setting(LightSetting::Random)).unwrap();
        assert_ne!(arena.light_setting(), LightSetting::Random);
    }

    #[test]
    fn env_trait_round() {
        let mut arena = Arena::new(ArenaConfig { collision_mode: CollisionMode::Unrestricted, ..small_config() }).unwrap();
        let (obs, info) = Env::reset(&mut arena, Some(3)).unwrap();
        assert_eq!(obs.width, 16);
        assert_eq!(info.get("run_id"), Some(&InfoValue::I64(3)));
        let s = Env::step(&mut arena, [1.0, 1.0]).unwrap();
        assert!(!s.terminated);
        let s = Env::step(&mut arena, [f32::NAN, 2.0]).unwrap();
        assert!(!s.truncated);
        match s.info.get("rewards") {
            Some(InfoValue::List(slots)) => assert_eq!(slots.len(), 2),
            other => panic!("rewards: {other:?}"),
        }
        assert!(arena.render().is_some());
        arena.close();
        assert_eq!(arena.map_manager().scene().object_count(), 0);
        assert!(Env::reset(&mut arena, Some(u64::MAX)).is_err());
    }
}
