// Fleets of independent environments.
// A simple synchronous vector environment running N copies of an Env in a loop.

use crate::arena::Arena;
use crate::core::{CarsimError, Env, Info, Observation, Result, Step, StepResult};

/// Runs N independent environments in the current thread.
///
/// - Construct with `SyncVectorEnv::new(n, |i| make_env(i))`; the factory
///   receives the instance index so each copy can own its own spatial slot
///   and run-id range.
/// - Step with a batch of actions: `step_all(actions)`
/// - Reset all envs (optionally with a base seed): `reset_all(Some(0))`
pub struct SyncVectorEnv<E: Env> {
    envs: Vec<E>,
}

impl<E: Env> SyncVectorEnv<E> {
    /// Create N environments using the provided factory closure.
    pub fn new<F>(n: usize, factory: F) -> Self
    where
        F: FnMut(usize) -> E,
    {
        Self { envs: (0..n).map(factory).collect() }
    }

    /// Create N environments with a fallible factory, stopping at the first error.
    pub fn try_new<F>(n: usize, factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<E>,
    {
        Ok(Self { envs: (0..n).map(factory).collect::<Result<Vec<E>>>()? })
    }

    /// Number of contained environments.
    pub fn len(&self) -> usize { self.envs.len() }
    /// Whether there are no environments.
    pub fn is_empty(&self) -> bool { self.envs.is_empty() }

    /// Reset all environments. If `base_seed` is provided, env `i` gets `base_seed + i` (wrapping).
    pub fn reset_all(&mut self, base_seed: Option<u64>) -> Result<Vec<(E::Obs, Info)>> {
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(i, e)| e.reset(base_seed.map(|s| s.wrapping_add(i as u64))))
            .collect()
    }

    /// Step all environments with a batch of actions, one per environment.
    pub fn step_all(&mut self, actions: Vec<E::Act>) -> Result<Vec<Step<E::Obs>>> {
        if actions.len() != self.envs.len() {
            return Err(mismatch("actions", actions.len(), self.envs.len()));
        }
        self.envs.iter_mut().zip(actions).map(|(e, a)| e.step(a)).collect()
    }

    /// Render all environments; returns a vector of optional frames (one per env).
    pub fn render_all(&self) -> Vec<Option<Observation>> {
        self.envs.iter().map(|e| e.render()).collect()
    }

    /// Close all environments.
    pub fn close_all(&mut self) {
        for e in &mut self.envs {
            e.close();
        }
    }

    pub fn envs(&self) -> &[E] { &self.envs }
    pub fn envs_mut(&mut self) -> &mut [E] { &mut self.envs }
}

impl SyncVectorEnv<Arena> {
    /// Step every arena with its own step id and wheel command, returning the
    /// full results including bootstrapped rewards.
    pub fn bundled_step(&mut self, step_ids: &[u32], actions: &[[f32; 2]]) -> Result<Vec<StepResult>> {
        if step_ids.len() != self.envs.len() {
            return Err(mismatch("step ids", step_ids.len(), self.envs.len()));
        }
        if actions.len() != self.envs.len() {
            return Err(mismatch("actions", actions.len(), self.envs.len()));
        }
        self.envs
            .iter_mut()
            .zip(step_ids.iter().zip(actions))
            .map(|(arena, (&id, &[left, right]))| arena.step(id, left, right))
            .collect()
    }
}

fn mismatch(what: &str, got: usize, expected: usize) -> CarsimError {
    CarsimError::Configuration(format!("got {got} {what} for {expected} environments"))
}
