//! Map lifecycle: teardown, obstacle generation or loading, instantiation
//! and vehicle spawning for one arena instance.

use rand::Rng;

use crate::config::{MapSource, SpawnOrientation};
use crate::core::Result;
use crate::episode::{Course, EpisodeManager, EpisodeSettings};
use crate::map::generator::{COURSE_HALF_WIDTH, MapGenerator};
use crate::map::scene::{HeadlessScene, SceneHost, SceneObjectId};
use crate::map::store::MapStore;
use crate::map::types::{MapType, ObstacleKind, ObstacleList};
use crate::utils::RngStream;
use crate::vehicle::{DifferentialDrive, Pose, TopDownCamera, VehicleHandle, VehicleKind};

/// Lateral distance between the course centre lines of neighbouring instances.
pub const INSTANCE_SPACING: f32 = 4.0 * COURSE_HALF_WIDTH;

/// Course origin of an instance.
pub fn instance_origin(instance_number: u32) -> [f32; 2] { [instance_number as f32 * INSTANCE_SPACING, 0.0] }

/// Spawn heading in degrees: `requested` when given, otherwise drawn from the policy range.
pub fn spawn_heading(policy: SpawnOrientation, requested: Option<f32>, rng: &mut RngStream) -> f32 {
    if let Some(deg) = requested {
        return deg;
    }
    let (min, max) = policy.range_degrees();
    if max > min { rng.gen_range(min..=max) } else { min }
}

pub struct MapManager {
    generator: MapGenerator,
    source: MapSource,
    scene: Box<dyn SceneHost>,
    instance_number: u32,
    spawned: Vec<SceneObjectId>,
    current: Option<ObstacleList>,
    vehicle_spawned: bool,
    hide_indicators: bool,
}

impl MapManager {
    /// A manager backed by an in-process [`HeadlessScene`].
    pub fn new(generator: MapGenerator, source: MapSource, instance_number: u32) -> Self {
        let scene = HeadlessScene::new(instance_origin(instance_number)[0]);
        Self::with_scene(generator, source, instance_number, Box::new(scene))
    }

    pub fn with_scene(
        generator: MapGenerator,
        source: MapSource,
        instance_number: u32,
        scene: Box<dyn SceneHost>,
    ) -> Self {
        Self {
            generator,
            source,
            scene,
            instance_number,
            spawned: Vec::new(),
            current: None,
            vehicle_spawned: false,
            hide_indicators: false,
        }
    }

    pub fn origin(&self) -> [f32; 2] { instance_origin(self.instance_number) }

    pub fn scene(&self) -> &dyn SceneHost { self.scene.as_ref() }

    pub fn current_map(&self) -> Option<&ObstacleList> { self.current.as_ref() }

    pub fn spawned_obstacle_count(&self) -> usize { self.spawned.len() }

    pub fn has_vehicle(&self) -> bool { self.vehicle_spawned }

    /// Remove every spawned obstacle and forget the vehicle. Safe to repeat.
    pub fn destroy_map(&mut self) {
        if self.spawned.is_empty() && self.current.is_none() && !self.vehicle_spawned {
            return;
        }
        for id in self.spawned.drain(..) {
            self.scene.destroy(id);
        }
        self.current = None;
        self.vehicle_spawned = false;
        tracing::debug!(instance = self.instance_number, "map destroyed");
    }

    /// Tear down the previous map, then obtain and instantiate the course for
    /// `(map_type, run_id)`. Goal indicators are skipped in evaluation mode.
    pub fn initialize_map_with_obstacles(&mut self, map_type: MapType, run_id: u32, eval_mode: bool) -> Result<ObstacleList> {
        self.destroy_map();
        let list = match &self.source {
            MapSource::Generate => self.generator.generate(map_type, run_id),
            MapSource::Load { dir } => MapStore::new(dir).load(map_type, run_id)?,
            MapSource::GenerateAndSave { dir } => {
                let list = self.generator.generate(map_type, run_id);
                MapStore::new(dir).save(run_id, &list)?;
                list
            }
        };
        let origin = self.origin();
        self.hide_indicators = eval_mode;
        for obstacle in &list.obstacles {
            if eval_mode && obstacle.kind == ObstacleKind::GoalIndicator {
                continue;
            }
            let world = [obstacle.position[0] + origin[0], obstacle.position[1] + origin[1]];
            self.spawned.push(self.scene.instantiate(obstacle, world));
        }
        tracing::info!(
            instance = self.instance_number,
            %map_type,
            layout = %list.layout,
            run_id,
            obstacles = self.spawned.len(),
            "map initialized"
        );
        self.current = Some(list.clone());
        Ok(list)
    }

    /// Place a fresh vehicle at the instance origin, facing `heading_degrees`
    /// from the course direction.
    pub fn spawn_vehicle(
        &mut self,
        obstacles: &ObstacleList,
        kind: VehicleKind,
        heading_degrees: f32,
        settings: EpisodeSettings,
    ) -> VehicleHandle {
        let origin = self.origin();
        let pose = Pose { position: origin, heading: heading_degrees.to_radians() };
        let markers = obstacles
            .obstacles
            .iter()
            .filter(|o| !(self.hide_indicators && o.kind == ObstacleKind::GoalIndicator))
            .map(|o| (o.kind, [o.position[0] + origin[0], o.position[1] + origin[1]]))
            .collect();
        self.vehicle_spawned = true;
        tracing::debug!(instance = self.instance_number, vehicle = %kind, heading_degrees, "vehicle spawned");
        VehicleHandle {
            kind,
            drive: Box::new(DifferentialDrive::new(kind.drive_params(), pose)),
            camera: Box::new(TopDownCamera::new(markers)),
            episode: EpisodeManager::new(Course::from_obstacles(obstacles, origin), settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CarsimError;
    use crate::map::generator::generate;
    use crate::utils::rng_from_seed;

    #[test]
    fn reinitializing_replaces_the_previous_obstacles() {
        let mut manager = MapManager::new(MapGenerator::default(), MapSource::Generate, 0);
        manager.destroy_map();
        let first = manager.initialize_map_with_obstacles(MapType::RandomHard, 1, false).unwrap();
        assert_eq!(manager.scene().object_count(), first.len());
        let second = manager.initialize_map_with_obstacles(MapType::EasyGoalLaneMiddleRedFirst, 2, false).unwrap();
        assert_eq!(manager.scene().object_count(), second.len());
        manager.destroy_map();
        manager.destroy_map();
        assert_eq!(manager.scene().object_count(), 0);
        assert!(manager.current_map().is_none());
    }

    #[test]
    fn eval_mode_skips_goal_indicators() {
        let mut manager = MapManager::new(MapGenerator::default(), MapSource::Generate, 0);
        let list = manager.initialize_map_with_obstacles(MapType::RandomEasy, 4, true).unwrap();
        let indicators = list.of_kind(ObstacleKind::GoalIndicator).count();
        assert!(indicators > 0);
        assert_eq!(manager.spawned_obstacle_count(), list.len() - indicators);
    }

    #[test]
    fn load_failure_leaves_nothing_spawned() {
        let dir = std::env::temp_dir().join(format!("carsim-manager-missing-{}", std::process::id()));
        let mut manager = MapManager::new(MapGenerator::default(), MapSource::Generate, 0);
        manager.initialize_map_with_obstacles(MapType::RandomEasy, 0, false).unwrap();
        manager.source = MapSource::Load { dir };
        let err = manager.initialize_map_with_obstacles(MapType::RandomEasy, 0, false).unwrap_err();
        assert!(matches!(err, CarsimError::NotFound { .. }));
        assert_eq!(manager.scene().object_count(), 0);
    }

    #[test]
    fn generate_and_save_then_load_gives_the_same_course() {
        let dir = std::env::temp_dir().join(format!("carsim-manager-save-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut writer = MapManager::new(MapGenerator::default(), MapSource::GenerateAndSave { dir: dir.clone() }, 0);
        let saved = writer.initialize_map_with_obstacles(MapType::RandomMedium, 9, false).unwrap();
        let mut reader = MapManager::new(MapGenerator::default(), MapSource::Load { dir: dir.clone() }, 1);
        let loaded = reader.initialize_map_with_obstacles(MapType::RandomMedium, 9, false).unwrap();
        assert_eq!(saved, loaded);
        assert_eq!(loaded, generate(MapType::RandomMedium, 9));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn instances_are_spatially_separated() {
        let mut a = MapManager::new(MapGenerator::default(), MapSource::Generate, 0);
        let mut b = MapManager::new(MapGenerator::default(), MapSource::Generate, 3);
        let list = a.initialize_map_with_obstacles(MapType::RandomEasy, 0, false).unwrap();
        b.initialize_map_with_obstacles(MapType::RandomEasy, 0, false).unwrap();
        let va = a.spawn_vehicle(&list, VehicleKind::JetBot, 0.0, EpisodeSettings::default());
        let vb = b.spawn_vehicle(&list, VehicleKind::JetBot, 0.0, EpisodeSettings::default());
        assert_eq!(va.drive.pose().position, [0.0, 0.0]);
        assert_eq!(vb.drive.pose().position, [3.0 * INSTANCE_SPACING, 0.0]);
        assert_eq!(vb.episode.course().goals()[0].center[0], 3.0 * INSTANCE_SPACING);
        assert!(b.has_vehicle());
    }

    #[test]
    fn spawn_heading_follows_policy() {
        let mut rng = rng_from_seed(5);
        assert_eq!(spawn_heading(SpawnOrientation::Fixed, None, &mut rng), 0.0);
        assert_eq!(spawn_heading(SpawnOrientation::OrientationVeryRandom, Some(12.0), &mut rng), 12.0);
        for _ in 0..50 {
            let h = spawn_heading(SpawnOrientation::OrientationRandom, None, &mut rng);
            assert!((-15.0..=15.0).contains(&h));
        }
    }
}
