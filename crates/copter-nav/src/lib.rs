pub mod control;
pub mod doctor;
pub mod gear;
pub mod geo;
pub mod guided;
pub mod mission;
pub mod vehicle;

pub use gear::ChannelMapping;
pub use vehicle::{Clock, FlightMode, ThreadClock, Vehicle, Waypoint};

use serde::Deserialize;

/// Channel-override mission. Defaults fly the stock sortie: 100 m, then the
/// destination to within 3 m, then settle on -0.17 rad.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Meters above home.
    pub altitude_m: f64,

    /// Arrival radius around `destination`, meters.
    pub precision_m: f64,

    /// Heading to hold once at the destination, radians.
    pub final_yaw_rad: f64,

    pub arm_timeout_s: u64,

    /// Mode flown in after arming; throttle at neutral must hold altitude.
    pub flight_mode: FlightMode,

    pub destination: Waypoint,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            altitude_m: 100.0,
            precision_m: 3.0,
            final_yaw_rad: -0.17,
            arm_timeout_s: 30,
            flight_mode: FlightMode::AltHold,
            destination: Waypoint::new(50.443326, 30.448078),
        }
    }
}

/// Waypoint mission flown with the autopilot's guided commands.
#[derive(Debug, Clone, Deserialize)]
pub struct GuidedConfig {
    /// Takeoff altitude, also used for waypoints without their own.
    pub altitude_m: f32,
    pub waypoints: Vec<Waypoint>,
    /// Absolute heading to turn to after the last waypoint, degrees.
    pub final_heading_deg: Option<f32>,
    #[serde(default = "default_arm_timeout_s")]
    pub arm_timeout_s: u64,
}

fn default_arm_timeout_s() -> u64 {
    30
}
