//! Vehicle collaborators: kinematics, camera and the handle bundling them
//! with the episode state of the spawned vehicle.

use serde::{Deserialize, Serialize};

use crate::config::{LightSetting, named_enum};
use crate::core::Observation;
use crate::episode::EpisodeManager;
use crate::map::ObstacleKind;
use crate::utils::render2d::{BLUE, Canvas, FLOOR, GRAY, GREEN, RED, WHITE, YELLOW};

/// Supported robot models.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VehicleKind {
    #[default]
    JetBot,
    DifferentialJetBot,
}

named_enum!(VehicleKind);

/// Kinematic limits of a vehicle model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveParams {
    /// Wheel acceleration at a command of 1.0, m/s².
    pub max_accel: f32,
    pub max_wheel_speed: f32,
    /// Distance between the wheels, m.
    pub track_width: f32,
    /// Linear speed decay per second.
    pub damping: f32,
    /// Collision radius, m.
    pub radius: f32,
}

impl VehicleKind {
    pub fn drive_params(self) -> DriveParams {
        match self {
            VehicleKind::JetBot => DriveParams {
                max_accel: 2.0,
                max_wheel_speed: 2.0,
                track_width: 0.3,
                damping: 0.5,
                radius: 0.15,
            },
            VehicleKind::DifferentialJetBot => DriveParams {
                max_accel: 3.0,
                max_wheel_speed: 2.5,
                track_width: 0.25,
                damping: 0.8,
                radius: 0.13,
            },
        }
    }
}

/// Planar pose. Heading is in radians, 0 along +z, positive turning toward +x.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: [f32; 2],
    pub heading: f32,
}

impl Pose {
    pub fn forward(&self) -> [f32; 2] { [self.heading.sin(), self.heading.cos()] }

    pub fn right(&self) -> [f32; 2] { [self.heading.cos(), -self.heading.sin()] }

    /// Cosine of the angle between the heading and the direction to `target`.
    pub fn alignment_to(&self, target: [f32; 2]) -> f32 {
        let dx = target[0] - self.position[0];
        let dz = target[1] - self.position[1];
        let len = (dx * dx + dz * dz).sqrt();
        if len < 1e-6 {
            return 1.0;
        }
        let f = self.forward();
        (f[0] * dx + f[1] * dz) / len
    }
}

/// Motor actuation and integration, implemented by the physics host.
pub trait Drive: Send {
    /// Set the wheel accelerations, each in `[-1, 1]`.
    fn actuate(&mut self, left: f32, right: f32);

    /// Advance by `dt` seconds.
    fn integrate(&mut self, dt: f32);

    fn pose(&self) -> Pose;

    /// Signed speed along the heading, m/s.
    fn forward_speed(&self) -> f32;

    fn radius(&self) -> f32;
}

/// Two-wheel kinematic model with per-wheel speed limits and linear damping.
#[derive(Clone, Debug)]
pub struct DifferentialDrive {
    params: DriveParams,
    pose: Pose,
    wheel_speed: [f32; 2],
    command: [f32; 2],
}

impl DifferentialDrive {
    pub fn new(params: DriveParams, pose: Pose) -> Self {
        Self { params, pose, wheel_speed: [0.0; 2], command: [0.0; 2] }
    }

    pub fn wheel_speeds(&self) -> [f32; 2] { self.wheel_speed }
}

impl Drive for DifferentialDrive {
    fn actuate(&mut self, left: f32, right: f32) {
        self.command = [left, right];
    }

    fn integrate(&mut self, dt: f32) {
        let p = self.params;
        for (speed, cmd) in self.wheel_speed.iter_mut().zip(self.command) {
            *speed += cmd * p.max_accel * dt;
            *speed -= *speed * p.damping * dt;
            *speed = speed.clamp(-p.max_wheel_speed, p.max_wheel_speed);
        }
        let [left, right] = self.wheel_speed;
        let forward = 0.5 * (left + right);
        let yaw_rate = (left - right) / p.track_width;
        self.pose.heading += yaw_rate * dt;
        let f = self.pose.forward();
        self.pose.position[0] += forward * f[0] * dt;
        self.pose.position[1] += forward * f[1] * dt;
    }

    fn pose(&self) -> Pose { self.pose }

    fn forward_speed(&self) -> f32 { 0.5 * (self.wheel_speed[0] + self.wheel_speed[1]) }

    fn radius(&self) -> f32 { self.params.radius }
}

/// Image source mounted on the vehicle.
pub trait Camera: Send {
    fn capture(&self, pose: &Pose, light: LightSetting, width: u32, height: u32) -> Observation;
}

/// Software camera that renders the course markers seen from above, in the
/// vehicle frame: the vehicle sits at the bottom centre looking up.
#[derive(Clone, Debug)]
pub struct TopDownCamera {
    markers: Vec<(ObstacleKind, [f32; 2])>,
    /// Metres covered by the image height.
    view_range: f32,
}

impl TopDownCamera {
    pub fn new(markers: Vec<(ObstacleKind, [f32; 2])>) -> Self { Self { markers, view_range: 8.0 } }
}

impl Camera for TopDownCamera {
    fn capture(&self, pose: &Pose, light: LightSetting, width: u32, height: u32) -> Observation {
        let k = light.intensity();
        let mut canvas = Canvas::new(width, height);
        canvas.clear(FLOOR.scaled(k));

        let scale = height as f32 / self.view_range;
        let right = pose.right();
        let fwd = pose.forward();
        let to_screen = |p: [f32; 2]| -> (i32, i32) {
            let dx = p[0] - pose.position[0];
            let dz = p[1] - pose.position[1];
            let lx = dx * right[0] + dz * right[1];
            let lz = dx * fwd[0] + dz * fwd[1];
            let sx = width as f32 / 2.0 + lx * scale;
            let sy = height as f32 - 1.0 - lz * scale;
            (sx.round() as i32, sy.round() as i32)
        };

        let pillar_r = ((crate::map::PILLAR_RADIUS * scale).round() as i32).max(1);
        for &(kind, p) in &self.markers {
            let (x, y) = to_screen(p);
            match kind {
                ObstacleKind::BlueObstacle => canvas.fill_circle(x, y, pillar_r, BLUE.scaled(k)),
                ObstacleKind::RedObstacle => canvas.fill_circle(x, y, pillar_r, RED.scaled(k)),
                ObstacleKind::Checkpoint => canvas.fill_circle(x, y, 1, GREEN.scaled(k)),
                ObstacleKind::GoalIndicator => canvas.fill_circle(x, y, 2, YELLOW.scaled(k)),
                ObstacleKind::FinishLine => {
                    let half = (crate::map::COURSE_HALF_WIDTH * scale).round() as i32;
                    canvas.draw_line(x - half, y, x + half, y, WHITE.scaled(k));
                }
            }
        }
        // Bonnet of the vehicle at the bottom edge.
        canvas.fill_rect(width as i32 / 2 - 2, height as i32 - 2, 5, 2, GRAY.scaled(k));
        canvas.into_observation()
    }
}

/// Everything belonging to one spawned vehicle.
pub struct VehicleHandle {
    pub kind: VehicleKind,
    pub drive: Box<dyn Drive>,
    pub camera: Box<dyn Camera>,
    pub episode: EpisodeManager,
}

impl VehicleHandle {
    pub fn observe(&self, light: LightSetting, width: u32, height: u32) -> Observation {
        self.camera.capture(&self.drive.pose(), light, width, height)
    }
}
