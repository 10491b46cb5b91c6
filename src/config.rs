//! Externally supplied environment configuration.
//!
//! Everything here is plain data: it is deserialised from JSON or from
//! stringly-typed kwargs and checked by [`ArenaConfig::validate`] at every
//! reset, before any scene state is touched.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{CarsimError, Result};
use crate::map::{GeneratorConfig, MapType};
use crate::utils::RUN_IDS_PER_INSTANCE;
use crate::vehicle::VehicleKind;

/// Key-value kwargs as handed over by a launcher. Values are parsed per key.
pub type KwArgs = HashMap<String, String>;

/// How a collision event mutates the episode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionMode {
    /// Every collision is penalised.
    Unrestricted,
    /// At most one penalised collision per controller step.
    #[default]
    OncePerTimestep,
    /// The first collision is penalised and latched; later ones are ignored.
    OncePerEpisode,
    /// The first collision terminates the episode.
    ResetUponCollision,
    /// Collisions are counted for diagnostics only.
    IgnoreCollisions,
}

/// Scene lighting. Visual only; resolved to a concrete setting at reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightSetting {
    Bright,
    #[default]
    Standard,
    Dark,
    Random,
}

impl LightSetting {
    /// Brightness multiplier applied by cameras.
    pub fn intensity(self) -> f32 {
        match self {
            LightSetting::Bright => 1.3,
            LightSetting::Standard | LightSetting::Random => 1.0,
            LightSetting::Dark => 0.45,
        }
    }
}

/// Spawn heading policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpawnOrientation {
    #[default]
    Fixed,
    OrientationRandom,
    OrientationVeryRandom,
}

impl SpawnOrientation {
    /// Inclusive heading range in degrees.
    pub fn range_degrees(self) -> (f32, f32) {
        match self {
            SpawnOrientation::Fixed => (0.0, 0.0),
            SpawnOrientation::OrientationRandom => (-15.0, 15.0),
            SpawnOrientation::OrientationVeryRandom => (-45.0, 45.0),
        }
    }
}

/// Who advances physics between controller calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepDriver {
    /// `step` and `async_step_part1` run the ticks of the submitted step.
    #[default]
    Inline,
    /// The host's fixed-update loop calls `Arena::tick`.
    Host,
}

/// Where the map manager gets its obstacle lists from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum MapSource {
    #[default]
    Generate,
    Load { dir: PathBuf },
    GenerateAndSave { dir: PathBuf },
}

/// Weights of the shaped reward terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardCoefficients {
    pub distance: f32,
    pub orientation: f32,
    pub velocity: f32,
    pub event: f32,
}

impl Default for RewardCoefficients {
    fn default() -> Self {
        Self { distance: 1.0, orientation: 0.0, velocity: 0.0, event: 10.0 }
    }
}

/// Full environment configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    pub map_type: MapType,
    pub vehicle_kind: VehicleKind,
    pub collision_mode: CollisionMode,
    pub light_setting: LightSetting,
    pub spawn_orientation: SpawnOrientation,
    pub coefficients: RewardCoefficients,
    /// One controller step per fixed window of simulated time.
    pub fixed_timesteps: bool,
    /// Simulated seconds covered by one controller step.
    pub fixed_timestep_length: f32,
    /// Seconds per physics tick.
    pub physics_dt: f32,
    /// Step budget before the episode runs out of time.
    pub max_steps: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub instance_number: u32,
    pub map_source: MapSource,
    pub step_driver: StepDriver,
    pub generator: GeneratorConfig,
    pub record_video: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            map_type: MapType::Random,
            vehicle_kind: VehicleKind::JetBot,
            collision_mode: CollisionMode::default(),
            light_setting: LightSetting::default(),
            spawn_orientation: SpawnOrientation::default(),
            coefficients: RewardCoefficients::default(),
            fixed_timesteps: true,
            fixed_timestep_length: 0.1,
            physics_dt: 0.02,
            max_steps: 1000,
            image_width: 250,
            image_height: 84,
            instance_number: 0,
            map_source: MapSource::default(),
            step_driver: StepDriver::default(),
            generator: GeneratorConfig::default(),
            record_video: false,
        }
    }
}

const MAX_IMAGE_SIDE: u32 = 4096;

impl ArenaConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CarsimError::Configuration(format!("invalid config: {e}")))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| CarsimError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }

    /// Build a config from launcher kwargs on top of the defaults.
    pub fn from_kwargs(kwargs: &KwArgs) -> Result<Self> {
        let mut cfg = Self::default();
        let mut map_dir: Option<PathBuf> = None;
        let mut map_mode: Option<String> = None;
        // Sorted so the first reported error does not depend on hash order.
        let mut keys: Vec<&String> = kwargs.keys().collect();
        keys.sort();
        for key in keys {
            let value = kwargs[key].as_str();
            match key.as_str() {
                "mapType" => cfg.map_type = parse_enum(key, value)?,
                "vehicleKind" => cfg.vehicle_kind = parse_enum(key, value)?,
                "collisionMode" => cfg.collision_mode = parse_enum(key, value)?,
                "lightSetting" => cfg.light_setting = parse_enum(key, value)?,
                "spawnOrientation" => cfg.spawn_orientation = parse_enum(key, value)?,
                "stepDriver" => cfg.step_driver = parse_enum(key, value)?,
                "distanceCoefficient" => cfg.coefficients.distance = parse_value(key, value)?,
                "orientationCoefficient" => cfg.coefficients.orientation = parse_value(key, value)?,
                "velocityCoefficient" => cfg.coefficients.velocity = parse_value(key, value)?,
                "eventCoefficient" => cfg.coefficients.event = parse_value(key, value)?,
                "fixedTimesteps" => cfg.fixed_timesteps = parse_value(key, value)?,
                "fixedTimestepsLength" => cfg.fixed_timestep_length = parse_value(key, value)?,
                "physicsDt" => cfg.physics_dt = parse_value(key, value)?,
                "maxSteps" => cfg.max_steps = parse_value(key, value)?,
                "imageWidth" => cfg.image_width = parse_value(key, value)?,
                "imageHeight" => cfg.image_height = parse_value(key, value)?,
                "instanceNumber" => cfg.instance_number = parse_value(key, value)?,
                "recordVideo" => cfg.record_video = parse_value(key, value)?,
                "isFinishLineLastGoal" => cfg.generator.is_finish_line_last_goal = parse_value(key, value)?,
                "finishLineDistance" => cfg.generator.finish_line_distance = parse_value(key, value)?,
                "goalIndicators" => cfg.generator.goal_indicators = parse_value(key, value)?,
                "mapSource" => map_mode = Some(value.to_string()),
                "mapDir" => map_dir = Some(PathBuf::from(value)),
                other => return Err(CarsimError::Configuration(format!("unknown config key `{other}`"))),
            }
        }
        cfg.map_source = match (map_mode.as_deref(), map_dir) {
            (None | Some("generate"), None) => MapSource::Generate,
            (Some("load"), Some(dir)) => MapSource::Load { dir },
            (Some("generateAndSave"), Some(dir)) => MapSource::GenerateAndSave { dir },
            (Some(mode @ ("load" | "generateAndSave")), None) => {
                return Err(CarsimError::Configuration(format!("mapSource `{mode}` requires mapDir")));
            }
            (None | Some("generate"), Some(_)) => {
                return Err(CarsimError::Configuration("mapDir given without a load/save mapSource".into()));
            }
            (Some(other), _) => {
                return Err(CarsimError::Configuration(format!("unknown mapSource `{other}`")));
            }
        };
        Ok(cfg)
    }

    /// Physics ticks making up one controller step.
    pub fn ticks_per_step(&self) -> u32 {
        ((self.fixed_timestep_length / self.physics_dt).round() as u32).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(CarsimError::Configuration(msg));
        if !(self.physics_dt.is_finite() && self.physics_dt > 0.0) {
            return bad(format!("physics_dt must be positive, got {}", self.physics_dt));
        }
        if !(self.fixed_timestep_length.is_finite() && self.fixed_timestep_length >= self.physics_dt) {
            return bad(format!(
                "fixed_timestep_length {} must be at least one physics tick ({})",
                self.fixed_timestep_length, self.physics_dt
            ));
        }
        if self.max_steps == 0 {
            return bad("max_steps must be positive".into());
        }
        for (name, side) in [("image_width", self.image_width), ("image_height", self.image_height)] {
            if side == 0 || side > MAX_IMAGE_SIDE {
                return bad(format!("{name} must be in 1..={MAX_IMAGE_SIDE}, got {side}"));
            }
        }
        let c = &self.coefficients;
        if ![c.distance, c.orientation, c.velocity, c.event].iter().all(|v| v.is_finite()) {
            return bad("reward coefficients must be finite".into());
        }
        if self.instance_number >= u32::MAX / RUN_IDS_PER_INSTANCE {
            return bad(format!("instance_number {} out of range", self.instance_number));
        }
        self.generator.validate()
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CarsimError::Configuration(format!("invalid value `{value}` for `{key}`: {e}")))
}

fn parse_enum<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    enum_from_name(value).map_err(|e| CarsimError::Configuration(format!("invalid value for `{key}`: {e}")))
}

/// Parse a unit enum variant from its serialized camelCase name.
pub(crate) fn enum_from_name<T: DeserializeOwned>(name: &str) -> Result<T> {
    serde_json::from_value(serde_json::Value::String(name.trim().to_string()))
        .map_err(|_| CarsimError::Configuration(format!("unknown variant `{name}`")))
}

/// The serialized camelCase name of a unit enum variant.
pub(crate) fn enum_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::from("?"),
    }
}

macro_rules! named_enum {
    ($($ty:ty),* $(,)?) => {$(
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&$crate::config::enum_name(self))
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::core::CarsimError;
            fn from_str(s: &str) -> $crate::core::Result<Self> { $crate::config::enum_from_name(s) }
        }
    )*};
}

pub(crate) use named_enum;

named_enum!(CollisionMode, LightSetting, SpawnOrientation, StepDriver);

#[cfg(test)]
mod tests {
    use super::*;

    fn kwargs(pairs: &[(&str, &str)]) -> KwArgs {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_validate() {
        let cfg = ArenaConfig::default();
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.ticks_per_step(), 5);
    }

    #[test]
    fn kwargs_parse_enums_and_numbers() {
        let cfg = ArenaConfig::from_kwargs(&kwargs(&[
            ("collisionMode", "oncePerEpisode"),
            ("mapType", "twoGoalLanesBlueFirstLeftMedium"),
            ("vehicleKind", "differentialJetBot"),
            ("eventCoefficient", "2.5"),
            ("fixedTimesteps", "false"),
            ("mapSource", "load"),
            ("mapDir", "maps"),
        ]))
        .expect("parse");
        assert_eq!(cfg.collision_mode, CollisionMode::OncePerEpisode);
        assert_eq!(cfg.map_type, MapType::TwoGoalLanesBlueFirstLeftMedium);
        assert_eq!(cfg.vehicle_kind, VehicleKind::DifferentialJetBot);
        assert_eq!(cfg.coefficients.event, 2.5);
        assert!(!cfg.fixed_timesteps);
        assert_eq!(cfg.map_source, MapSource::Load { dir: PathBuf::from("maps") });
    }

    #[test]
    fn unknown_vehicle_kind_is_a_configuration_error() {
        let err = ArenaConfig::from_kwargs(&kwargs(&[("vehicleKind", "tank")])).unwrap_err();
        assert!(matches!(err, CarsimError::Configuration(_)));
        let err = ArenaConfig::from_kwargs(&kwargs(&[("wheels", "4")])).unwrap_err();
        assert!(matches!(err, CarsimError::Configuration(_)));
    }

    #[test]
    fn load_without_dir_is_rejected() {
        assert!(ArenaConfig::from_kwargs(&kwargs(&[("mapSource", "load")])).is_err());
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut cfg = ArenaConfig::default();
        cfg.physics_dt = 0.0;
        assert!(cfg.validate().is_err());
        let mut cfg = ArenaConfig::default();
        cfg.image_width = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = ArenaConfig::default();
        cfg.coefficients.velocity = f32::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_round_trip_uses_camel_case_names() {
        let text = r#"{ "collision_mode": "resetUponCollision", "map_source": { "mode": "generateAndSave", "dir": "out" } }"#;
        let cfg = ArenaConfig::from_json_str(text).expect("parse");
        assert_eq!(cfg.collision_mode, CollisionMode::ResetUponCollision);
        assert_eq!(cfg.collision_mode.to_string(), "resetUponCollision");
        assert_eq!("dark".parse::<LightSetting>().expect("parse"), LightSetting::Dark);
    }
}
