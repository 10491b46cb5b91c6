// Core traits and types shared by the map, episode and arena layers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A small ordered info map returned to the controller.
/// Insertion order is preserved so diagnostics read the same every step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Create an empty Info map.
    pub fn new() -> Self { Self { entries: Vec::new() } }

    /// Insert or replace a key with the given value.
    pub fn insert<K: Into<String>, V: Into<InfoValue>>(&mut self, key: K, value: V) {
        let k = key.into();
        let value = value.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(kk, _)| kk == &k) {
            *v = value;
        } else {
            self.entries.push((k, value));
        }
    }

    /// Get a reference to a value by key.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate over entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append every entry of `other`, replacing duplicate keys.
    pub fn extend(&mut self, other: Info) {
        for (k, v) in other.entries {
            self.insert(k, v);
        }
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn len(&self) -> usize { self.entries.len() }

    /// The string-to-string view handed over the controller boundary.
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.to_string())).collect()
    }
}

/// A small set of value types commonly used in info maps.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    List(Vec<f64>),
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Bool(v) => write!(f, "{v}"),
            InfoValue::I64(v) => write!(f, "{v}"),
            InfoValue::F64(v) => write!(f, "{v}"),
            InfoValue::Str(v) => f.write_str(v),
            InfoValue::List(v) => {
                f.write_str("[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{x}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for InfoValue { fn from(v: bool) -> Self { InfoValue::Bool(v) } }
impl From<i64> for InfoValue { fn from(v: i64) -> Self { InfoValue::I64(v) } }
impl From<i32> for InfoValue { fn from(v: i32) -> Self { InfoValue::I64(v as i64) } }
impl From<u32> for InfoValue { fn from(v: u32) -> Self { InfoValue::I64(v as i64) } }
impl From<usize> for InfoValue { fn from(v: usize) -> Self { InfoValue::I64(v as i64) } }
impl From<f64> for InfoValue { fn from(v: f64) -> Self { InfoValue::F64(v) } }
impl From<f32> for InfoValue { fn from(v: f32) -> Self { InfoValue::F64(v as f64) } }
impl From<&str> for InfoValue { fn from(v: &str) -> Self { InfoValue::Str(v.to_string()) } }
impl From<String> for InfoValue { fn from(v: String) -> Self { InfoValue::Str(v) } }
impl From<Vec<f32>> for InfoValue {
    fn from(v: Vec<f32>) -> Self { InfoValue::List(v.into_iter().map(f64::from).collect()) }
}

/// A camera image handed to the controller: row-major RGB, 3 bytes per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Observation {
    /// A uniformly black image, used whenever no vehicle is spawned.
    pub fn placeholder(width: u32, height: u32) -> Self {
        Self { width, height, data: vec![0; (width as usize) * (height as usize) * 3] }
    }

    /// Number of bytes expected for the declared resolution.
    pub fn expected_len(&self) -> usize { (self.width as usize) * (self.height as usize) * 3 }
}

/// A step result in the generic `Env` shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<Obs> {
    pub observation: Obs,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl<Obs> Step<Obs> {
    pub fn new(observation: Obs, reward: f32, terminated: bool, truncated: bool, info: Info) -> Self {
        Self { observation, reward, terminated, truncated, info }
    }
}

/// Everything the controller receives back from `step` / `async_step_part2`.
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    /// Reward accrued since the previous read (or since Part 1 for the async protocol).
    pub reward: f32,
    /// Episode over for any reason, including the step budget.
    pub done: bool,
    /// Episode ended by success, collision policy or finish line (not by the step budget).
    pub terminated: bool,
    pub info: Info,
    /// Per-step reward contributions, indexed by step id.
    pub bootstrapped_rewards: Vec<f32>,
    /// Set when the submission was refused under fixed-timestep discipline.
    pub previous_step_not_finished: bool,
}

/// Errors surfaced by the environment.
#[derive(thiserror::Error, Debug)]
pub enum CarsimError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("Map file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Corrupt map file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl CarsimError {
    /// True for the save/load failure family.
    pub fn is_persistence(&self) -> bool {
        matches!(self, CarsimError::NotFound { .. } | CarsimError::Format { .. } | CarsimError::Io { .. })
    }
}

/// Convenience alias for results using CarsimError.
pub type Result<T> = std::result::Result<T, CarsimError>;

/// Core environment trait following the Gymnasium contract.
pub trait Env {
    type Obs;
    type Act;

    /// Reset the environment to an initial state.
    /// Implementations derive their generation seed from `seed` when provided.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Self::Obs, Info)>;

    /// Apply an action and advance the environment by one step.
    fn step(&mut self, action: Self::Act) -> Result<Step<Self::Obs>>;

    /// Render a frame of the current state, if supported.
    fn render(&self) -> Option<Observation> { None }

    /// Close and release any external resources.
    fn close(&mut self) {}
}
