use anyhow::Result;

use crate::gear::{AxisMapping, ChannelMapping, PWM_MAX, PWM_MIN};
use crate::vehicle::Waypoint;
use crate::{GuidedConfig, MissionConfig};

fn check_axis(name: &str, axis: &AxisMapping) -> Result<()> {
    anyhow::ensure!((1..=8).contains(&axis.channel), "channels.{name}.channel must be 1..8");
    anyhow::ensure!(
        (PWM_MIN..=PWM_MAX).contains(&axis.neutral),
        "channels.{name}.neutral out of PWM range"
    );
    anyhow::ensure!(axis.gears[0] > 0, "channels.{name}.gears must start above zero");
    anyhow::ensure!(
        axis.gears.windows(2).all(|w| w[0] < w[1]),
        "channels.{name}.gears must increase with gear level"
    );
    let top = axis.gears[4];
    anyhow::ensure!(
        axis.neutral - PWM_MIN >= top && PWM_MAX - axis.neutral >= top,
        "channels.{name}: neutral +/- {top} leaves the PWM range"
    );
    Ok(())
}

pub fn check_channel_mapping(m: &ChannelMapping) -> Result<()> {
    check_axis("pitch", &m.pitch)?;
    check_axis("throttle", &m.throttle)?;
    check_axis("yaw", &m.yaw)?;
    anyhow::ensure!(
        m.pitch.channel != m.throttle.channel
            && m.pitch.channel != m.yaw.channel
            && m.throttle.channel != m.yaw.channel,
        "channels: pitch/throttle/yaw must use distinct RC channels"
    );
    Ok(())
}

pub fn check_waypoint(w: &Waypoint) -> Result<()> {
    anyhow::ensure!(w.lat.abs() <= 90.0 && w.lon.abs() <= 180.0, "waypoint coordinates invalid");
    if let Some(s) = w.speed {
        anyhow::ensure!(s > 0.0, "waypoint speed must be positive");
    }
    if let Some(a) = w.alt {
        anyhow::ensure!(a > 0.0, "waypoint altitude must be positive");
    }
    Ok(())
}

pub fn check_mission(cfg: &MissionConfig) -> Result<()> {
    anyhow::ensure!(cfg.altitude_m > 0.0, "mission.altitude_m must be positive");
    anyhow::ensure!(cfg.precision_m > 0.0, "mission.precision_m must be positive");
    anyhow::ensure!(
        cfg.final_yaw_rad.abs() <= std::f64::consts::PI,
        "mission.final_yaw_rad must be within +/- pi"
    );
    anyhow::ensure!(cfg.arm_timeout_s >= 1, "mission.arm_timeout_s too small");
    check_waypoint(&cfg.destination)
}

pub fn check_guided(cfg: &GuidedConfig) -> Result<()> {
    anyhow::ensure!(cfg.altitude_m > 0.0, "guided.altitude_m must be positive");
    anyhow::ensure!(!cfg.waypoints.is_empty(), "guided.waypoints is empty");
    for w in &cfg.waypoints {
        check_waypoint(w)?;
    }
    Ok(())
}
