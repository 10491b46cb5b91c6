//! Shaped reward terms and the per-episode reward ledger.

use crate::config::RewardCoefficients;

/// Discrete episode events carrying an indicator weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardEvent {
    GoalPassed,
    GoalMissed,
    Collision,
    FinishedAllGoals,
}

impl RewardEvent {
    pub fn indicator(self) -> f32 {
        match self {
            RewardEvent::GoalPassed | RewardEvent::FinishedAllGoals => 1.0,
            RewardEvent::GoalMissed | RewardEvent::Collision => -1.0,
        }
    }
}

/// Raw measurements of one physics tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RewardTerms {
    /// Distance gained toward the current target, m.
    pub progress: f32,
    /// Cosine between heading and bearing to the target.
    pub alignment: f32,
    /// Forward speed, m/s.
    pub speed: f32,
    /// Sum of event indicators.
    pub events: f32,
}

impl RewardTerms {
    /// Unscaled contribution of each term. Rate terms are integrated over `dt`.
    pub fn components(&self, dt: f32) -> RewardBreakdown {
        RewardBreakdown {
            distance: self.progress,
            orientation: self.alignment * dt,
            velocity: self.speed * dt,
            event: self.events,
        }
    }

    /// Weighted reward of the tick.
    pub fn weighted(&self, c: &RewardCoefficients, dt: f32) -> f32 { self.components(dt).scaled(c).total() }
}

/// Reward split by term.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RewardBreakdown {
    pub distance: f32,
    pub orientation: f32,
    pub velocity: f32,
    pub event: f32,
}

impl RewardBreakdown {
    /// An event-only contribution.
    pub fn event(indicator: f32) -> Self { Self { event: indicator, ..Self::default() } }

    pub fn scaled(&self, c: &RewardCoefficients) -> Self {
        Self {
            distance: c.distance * self.distance,
            orientation: c.orientation * self.orientation,
            velocity: c.velocity * self.velocity,
            event: c.event * self.event,
        }
    }

    pub fn total(&self) -> f32 { self.distance + self.orientation + self.velocity + self.event }

    fn accumulate(&mut self, other: &Self) {
        self.distance += other.distance;
        self.orientation += other.orientation;
        self.velocity += other.velocity;
        self.event += other.event;
    }
}

/// Bookkeeping of accrued reward.
///
/// Every credited amount lands in three places: the cumulative total, the
/// unread counter drained by [`RewardLedger::drain`], and the bootstrapped
/// slot of the step that was active when it accrued. Amounts recorded with
/// [`RewardLedger::record`] are also tallied per term, before and after
/// scaling.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RewardLedger {
    cumulative: f64,
    unread: f64,
    bootstrapped: Vec<f32>,
    prescale: RewardBreakdown,
    weighted: RewardBreakdown,
}

impl RewardLedger {
    pub fn new() -> Self { Self::default() }

    /// Make sure the bootstrapped list has a slot for `step`.
    pub fn open_step(&mut self, step: u32) {
        let needed = step as usize + 1;
        if self.bootstrapped.len() < needed {
            self.bootstrapped.resize(needed, 0.0);
        }
    }

    pub fn credit(&mut self, step: u32, amount: f32) {
        self.open_step(step);
        self.cumulative += f64::from(amount);
        self.unread += f64::from(amount);
        self.bootstrapped[step as usize] += amount;
    }

    /// Credit the scaled total of `raw` and keep its per-term split.
    pub fn record(&mut self, step: u32, raw: RewardBreakdown, c: &RewardCoefficients) {
        let weighted = raw.scaled(c);
        self.prescale.accumulate(&raw);
        self.weighted.accumulate(&weighted);
        self.credit(step, weighted.total());
    }

    /// Reward accrued since the previous drain.
    pub fn drain(&mut self) -> f32 {
        let out = self.unread as f32;
        self.unread = 0.0;
        out
    }

    pub fn cumulative(&self) -> f32 { self.cumulative as f32 }

    pub fn bootstrapped(&self) -> &[f32] { &self.bootstrapped }

    /// Per-term totals before the coefficients are applied.
    pub fn prescale(&self) -> RewardBreakdown { self.prescale }

    /// Per-term totals as credited.
    pub fn weighted(&self) -> RewardBreakdown { self.weighted }
}
