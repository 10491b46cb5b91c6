//! Per-vehicle episode state machine.
//!
//! ```text
//! NotStarted -> Running -> WaitingForStep -> Running -> ... -> Terminated
//! ```
//!
//! The physics host drives the machine with [`EpisodeManager::begin_tick`] /
//! [`EpisodeManager::end_tick`] around each integration step; the controller
//! drives it with [`EpisodeManager::increase_steps`]. Under fixed timesteps a
//! step is admitted only from `WaitingForStep` and then owns exactly
//! `ticks_per_step` physics ticks.

pub mod course;
pub mod reward;

use serde::{Deserialize, Serialize};

use crate::config::{ArenaConfig, CollisionMode, RewardCoefficients, named_enum};
use crate::core::{CarsimError, Info, Result};
use crate::map::{Contact, MapType};
use crate::vehicle::{Pose, VehicleKind};

pub use course::{Course, Goal, forward_crossing};
pub use reward::{RewardBreakdown, RewardEvent, RewardLedger, RewardTerms};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EpisodeStatus {
    #[default]
    NotStarted,
    Running,
    WaitingForStep,
    Terminated,
}

/// Why an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndEvent {
    Success,
    Collision,
    OutOfTime,
    FinishWithoutAllGoals,
}

named_enum!(EpisodeStatus, EndEvent);

impl EndEvent {
    /// Ended by the step budget rather than by the course.
    pub fn is_truncation(self) -> bool { self == EndEvent::OutOfTime }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GoalState {
    Pending,
    Passed,
    Missed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollisionKind {
    Obstacle,
    Wall,
}

/// Outcome of a step submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepAdmission {
    Accepted(u32),
    /// Fixed-timestep discipline: the previous step still owns the physics.
    PreviousStepNotFinished,
    Terminated,
}

/// Timing and reward settings copied from the arena configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EpisodeSettings {
    pub fixed_timesteps: bool,
    pub ticks_per_step: u32,
    pub physics_dt: f32,
    pub max_steps: u32,
    pub coefficients: RewardCoefficients,
    /// The finish line closes the goal sequence. When false the episode
    /// succeeds as soon as the last goal is passed.
    pub finish_line_last_goal: bool,
}

impl EpisodeSettings {
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self {
            fixed_timesteps: config.fixed_timesteps,
            ticks_per_step: config.ticks_per_step(),
            physics_dt: config.physics_dt,
            max_steps: config.max_steps,
            coefficients: config.coefficients,
            finish_line_last_goal: config.generator.is_finish_line_last_goal,
        }
    }

    /// Physics ticks after which the episode runs out of time.
    pub fn tick_budget(&self) -> u64 { u64::from(self.max_steps) * u64::from(self.ticks_per_step) }
}

impl Default for EpisodeSettings {
    fn default() -> Self { Self::from_config(&ArenaConfig::default()) }
}

/// Vehicle state around one physics tick.
#[derive(Clone, Copy, Debug)]
pub struct TickInput<'a> {
    pub previous: Pose,
    pub current: Pose,
    pub forward_speed: f32,
    /// Colliders overlapping the vehicle after the tick.
    pub contacts: &'a [Contact],
}

#[derive(Clone, Debug)]
pub struct EpisodeManager {
    settings: EpisodeSettings,
    course: Course,
    status: EpisodeStatus,
    eval_mode: bool,
    collision_mode: CollisionMode,
    map_type: MapType,
    vehicle_kind: VehicleKind,

    steps: u32,
    current_step: Option<u32>,
    ticks_left: u32,
    ticks_elapsed: u64,

    ledger: RewardLedger,
    end_event: Option<EndEvent>,

    goals: Vec<GoalState>,
    next_goal: usize,

    collisions: u32,
    obstacle_collisions: u32,
    wall_collisions: u32,
    collision_latched: bool,
    collided_this_step: bool,
    active_contacts: Vec<Contact>,
}

impl EpisodeManager {
    pub fn new(course: Course, settings: EpisodeSettings) -> Self {
        let goals = vec![GoalState::Pending; course.goals().len()];
        Self {
            settings,
            course,
            status: EpisodeStatus::NotStarted,
            eval_mode: false,
            collision_mode: CollisionMode::default(),
            map_type: MapType::default(),
            vehicle_kind: VehicleKind::default(),
            steps: 0,
            current_step: None,
            ticks_left: 0,
            ticks_elapsed: 0,
            ledger: RewardLedger::new(),
            end_event: None,
            goals,
            next_goal: 0,
            collisions: 0,
            obstacle_collisions: 0,
            wall_collisions: 0,
            collision_latched: false,
            collided_this_step: false,
            active_contacts: Vec::new(),
        }
    }

    /// Reset all counters and enter `Running`.
    pub fn start_episode(
        &mut self,
        eval_mode: bool,
        collision_mode: CollisionMode,
        map_type: MapType,
        vehicle_kind: VehicleKind,
    ) {
        let course = std::mem::replace(&mut self.course, Course::new(Vec::new(), [0.0, 0.0]));
        *self = Self::new(course, self.settings);
        self.eval_mode = eval_mode;
        self.collision_mode = collision_mode;
        self.map_type = map_type;
        self.vehicle_kind = vehicle_kind;
        self.status = EpisodeStatus::Running;
        tracing::debug!(%map_type, %collision_mode, eval_mode, "episode started");
    }

    /// Submit controller step `step_id`. Ids must be consecutive from 0.
    pub fn increase_steps(&mut self, step_id: u32) -> Result<StepAdmission> {
        match self.status {
            EpisodeStatus::NotStarted => {
                return Err(CarsimError::ProtocolViolation("step submitted before the episode started".into()));
            }
            EpisodeStatus::Terminated => return Ok(StepAdmission::Terminated),
            EpisodeStatus::Running if self.settings.fixed_timesteps => {
                tracing::debug!(step_id, "step refused, previous step not finished");
                return Ok(StepAdmission::PreviousStepNotFinished);
            }
            EpisodeStatus::Running | EpisodeStatus::WaitingForStep => {}
        }
        if step_id != self.steps {
            return Err(CarsimError::ProtocolViolation(format!(
                "expected step id {}, got {step_id}",
                self.steps
            )));
        }
        self.steps += 1;
        self.current_step = Some(step_id);
        self.collided_this_step = false;
        self.ledger.open_step(step_id);
        if self.settings.fixed_timesteps {
            self.status = EpisodeStatus::Running;
            self.ticks_left = self.settings.ticks_per_step;
        }
        Ok(StepAdmission::Accepted(step_id))
    }

    /// Called before integrating a physics tick. Returns whether the vehicle
    /// should move during this tick.
    pub fn begin_tick(&mut self) -> bool {
        match self.status {
            EpisodeStatus::Running if self.settings.fixed_timesteps && self.ticks_left == 0 => {
                self.status = EpisodeStatus::WaitingForStep;
                false
            }
            EpisodeStatus::Running => true,
            _ => false,
        }
    }

    /// Evaluate an integrated tick: goals, collisions, reward and budget.
    pub fn end_tick(&mut self, input: TickInput<'_>) {
        if self.status != EpisodeStatus::Running {
            return;
        }
        self.ticks_elapsed += 1;
        let prev = input.previous.position;
        let now = input.current.position;
        let target = self.target();
        let target_is_finish = self.next_goal >= self.goals.len();
        let mut events = 0.0;
        // Lateral position where the current target's line was crossed.
        let mut crossed_at = None;

        while let Some(goal) = self.course.goals().get(self.next_goal).copied() {
            let Some(x) = forward_crossing(prev, now, goal.center[1]) else { break };
            let passed = (x - goal.center[0]).abs() <= goal.half_width;
            let (state, event) = if passed {
                (GoalState::Passed, RewardEvent::GoalPassed)
            } else {
                (GoalState::Missed, RewardEvent::GoalMissed)
            };
            self.goals[self.next_goal] = state;
            events += event.indicator();
            if crossed_at.is_none() {
                crossed_at = Some(x);
            }
            tracing::debug!(goal = goal.index, passed, "goal crossed");
            self.next_goal += 1;
        }

        let all_passed = self.goals.iter().all(|g| *g == GoalState::Passed);
        let sequence_done = self.next_goal >= self.goals.len();
        let mut finished = None;
        if self.settings.finish_line_last_goal {
            if let Some(x) = forward_crossing(prev, now, self.course.finish()[1]) {
                if target_is_finish {
                    crossed_at = Some(x);
                }
                finished = Some(if all_passed { EndEvent::Success } else { EndEvent::FinishWithoutAllGoals });
            }
        } else if sequence_done && !target_is_finish {
            // The goal sequence completed on this tick.
            finished = Some(if all_passed { EndEvent::Success } else { EndEvent::FinishWithoutAllGoals });
        }
        if finished == Some(EndEvent::Success) {
            events += RewardEvent::FinishedAllGoals.indicator();
        }

        let d_prev = distance(prev, target);
        let d_now = match crossed_at {
            Some(x) => (x - target[0]).abs(),
            None => distance(now, target),
        };
        let terms = RewardTerms {
            progress: d_prev - d_now,
            alignment: input.current.alignment_to(self.target()),
            speed: input.forward_speed,
            events,
        };
        self.record(terms.components(self.settings.physics_dt));

        for contact in input.contacts {
            if !self.active_contacts.contains(contact) {
                let kind = match contact {
                    Contact::Obstacle { .. } => CollisionKind::Obstacle,
                    Contact::Wall(_) => CollisionKind::Wall,
                };
                self.register_collision(kind);
            }
        }
        self.active_contacts = input.contacts.to_vec();

        if let Some(end) = finished {
            self.terminate(end);
        } else if self.ticks_elapsed >= self.settings.tick_budget() {
            self.terminate(EndEvent::OutOfTime);
        }

        if self.settings.fixed_timesteps && self.status == EpisodeStatus::Running {
            self.ticks_left = self.ticks_left.saturating_sub(1);
            if self.ticks_left == 0 {
                self.status = EpisodeStatus::WaitingForStep;
            }
        }
    }

    /// Apply one collision event according to the collision mode.
    pub fn register_collision(&mut self, kind: CollisionKind) {
        if self.is_terminated() || self.status == EpisodeStatus::NotStarted {
            return;
        }
        match kind {
            CollisionKind::Obstacle => self.obstacle_collisions += 1,
            CollisionKind::Wall => self.wall_collisions += 1,
        }
        let penalize = match self.collision_mode {
            CollisionMode::Unrestricted | CollisionMode::ResetUponCollision => true,
            CollisionMode::OncePerTimestep => !self.collided_this_step,
            CollisionMode::OncePerEpisode => !self.collision_latched,
            CollisionMode::IgnoreCollisions => false,
        };
        self.collided_this_step = true;
        if penalize {
            self.collisions += 1;
            self.record(RewardBreakdown::event(RewardEvent::Collision.indicator()));
        }
        match self.collision_mode {
            CollisionMode::OncePerEpisode => self.collision_latched = true,
            CollisionMode::ResetUponCollision => self.terminate(EndEvent::Collision),
            _ => {}
        }
    }

    fn record(&mut self, raw: RewardBreakdown) {
        if let Some(step) = self.current_step {
            self.ledger.record(step, raw, &self.settings.coefficients);
        }
    }

    fn terminate(&mut self, end: EndEvent) {
        if self.is_terminated() {
            return;
        }
        self.status = EpisodeStatus::Terminated;
        self.end_event = Some(end);
        self.ticks_left = 0;
        tracing::info!(
            end_event = %end,
            steps = self.steps,
            cum_reward = self.ledger.cumulative(),
            "episode terminated"
        );
    }

    /// Next pending goal centre, or the finish line.
    fn target(&self) -> [f32; 2] {
        self.course.goals().get(self.next_goal).map_or(self.course.finish(), |g| g.center)
    }

    /// Reward accrued since the previous call.
    pub fn get_reward(&mut self) -> f32 { self.ledger.drain() }

    pub fn cumulative_reward(&self) -> f32 { self.ledger.cumulative() }

    pub fn bootstrapped_rewards(&self) -> &[f32] { self.ledger.bootstrapped() }

    pub fn is_terminated(&self) -> bool { self.status == EpisodeStatus::Terminated }

    pub fn status(&self) -> EpisodeStatus { self.status }

    pub fn end_event(&self) -> Option<EndEvent> { self.end_event }

    pub fn steps_taken(&self) -> u32 { self.steps }

    pub fn current_step(&self) -> Option<u32> { self.current_step }

    /// Physics ticks still owed to the active fixed-timestep step.
    pub fn pending_ticks(&self) -> u32 {
        if self.status == EpisodeStatus::Running { self.ticks_left } else { 0 }
    }

    pub fn settings(&self) -> &EpisodeSettings { &self.settings }

    pub fn course(&self) -> &Course { &self.course }

    pub fn goal_states(&self) -> &[GoalState] { &self.goals }

    pub fn penalized_collisions(&self) -> u32 { self.collisions }

    pub fn get_info(&self) -> Info {
        let passed = self.goals.iter().filter(|g| **g == GoalState::Passed).count();
        let missed = self.goals.iter().filter(|g| **g == GoalState::Missed).count();
        let mut info = Info::new();
        info.insert("end_event", self.end_event.map_or_else(|| "none".to_string(), |e| e.to_string()));
        info.insert("success", self.end_event == Some(EndEvent::Success));
        info.insert("terminated", self.is_terminated());
        info.insert("status", self.status.to_string());
        info.insert("step", self.current_step.map_or(-1, i64::from));
        info.insert("amount_of_steps", self.steps);
        info.insert("cum_reward", self.ledger.cumulative());
        info.insert("rewards", self.ledger.bootstrapped().to_vec());
        let (weighted, raw) = (self.ledger.weighted(), self.ledger.prescale());
        for (name, w, r) in [
            ("distance", weighted.distance, raw.distance),
            ("orientation", weighted.orientation, raw.orientation),
            ("velocity", weighted.velocity, raw.velocity),
            ("event", weighted.event, raw.event),
        ] {
            info.insert(format!("{name}_reward"), w);
            info.insert(format!("prescale_{name}_reward"), r);
        }
        info.insert("duration", self.ticks_elapsed as f64 * f64::from(self.settings.physics_dt));
        info.insert("collisions", self.collisions);
        info.insert("obstacle_collisions", self.obstacle_collisions);
        info.insert("wall_collisions", self.wall_collisions);
        info.insert("collision_latched", self.collision_latched);
        info.insert("passed_goals", passed);
        info.insert("missed_goals", missed);
        info.insert("goal_count", self.goals.len());
        for (i, g) in self.goals.iter().enumerate() {
            info.insert(format!("passed_goal_{i}"), *g == GoalState::Passed);
        }
        info.insert("map_type", self.map_type.to_string());
        info.insert("vehicle", self.vehicle_kind.to_string());
        info.insert("collision_mode", self.collision_mode.to_string());
        info.insert("eval_mode", self.eval_mode);
        info
    }
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = b[0] - a[0];
    let dz = b[1] - a[1];
    (dx * dx + dz * dz).sqrt()
}
