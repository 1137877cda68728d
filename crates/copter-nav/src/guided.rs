use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, info};

use crate::control::ALTITUDE_TOLERANCE;
use crate::mission::{self, ALTITUDE_INTERVAL, POINT_INTERVAL};
use crate::vehicle::{Clock, Vehicle, Waypoint};
use crate::GuidedConfig;

/// Coordinates match when equal at 5 decimal places (about 1 m).
fn same_coord(a: f64, b: f64) -> bool {
    (a * 1e5).round() == (b * 1e5).round()
}

/// Copter flown through the autopilot's own navigation commands.
pub struct GuidedCopter<V, C> {
    vehicle: V,
    clock: C,
    altitude_m: f32,
}

impl<V: Vehicle, C: Clock> GuidedCopter<V, C> {
    pub fn new(vehicle: V, clock: C, altitude_m: f32) -> Self {
        Self { vehicle, clock, altitude_m }
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn arm(&mut self, timeout: Duration) -> Result<()> {
        mission::arm(&mut self.vehicle, &mut self.clock, timeout)
    }

    pub fn take_off(&mut self, wait_altitude_reached: bool) -> Result<()> {
        info!("taking off to {}m", self.altitude_m);
        self.vehicle.takeoff(self.altitude_m).context("takeoff")?;
        if !wait_altitude_reached {
            return Ok(());
        }
        let floor = f64::from(self.altitude_m) * ALTITUDE_TOLERANCE;
        loop {
            let alt = self.vehicle.telemetry().context("read altitude")?.position.alt;
            if alt >= floor {
                break;
            }
            debug!("altitude: {alt:.1}");
            self.clock.sleep(ALTITUDE_INTERVAL);
        }
        info!("target altitude reached");
        Ok(())
    }

    /// Visit each waypoint in order. A leg ends once latitude and longitude
    /// both match the target.
    pub fn run(&mut self, points: &[Waypoint]) -> Result<()> {
        for point in points {
            let target = Waypoint { alt: point.alt.or(Some(self.altitude_m)), ..point.clone() };
            info!("follow to point: {}, {}", target.lat, target.lon);
            self.vehicle.goto(&target).context("goto")?;
            loop {
                let pos = self.vehicle.telemetry().context("read position")?.position;
                if same_coord(pos.lat, target.lat) && same_coord(pos.lon, target.lon) {
                    break;
                }
                debug!("position: {}, {}", pos.lat, pos.lon);
                self.clock.sleep(POINT_INTERVAL);
            }
            info!("target point reached");
        }
        Ok(())
    }

    pub fn set_yaw(&mut self, heading_deg: f32) -> Result<()> {
        info!("yaw: {}", heading_deg);
        self.vehicle.condition_yaw(heading_deg).context("condition yaw")
    }
}

pub fn run_guided_mission<V: Vehicle, C: Clock>(
    copter: &mut GuidedCopter<V, C>,
    cfg: &GuidedConfig,
) -> Result<()> {
    copter.arm(Duration::from_secs(cfg.arm_timeout_s))?;
    copter.take_off(true)?;
    copter.run(&cfg.waypoints)?;
    if let Some(h) = cfg.final_heading_deg {
        copter.set_yaw(h)?;
    }
    info!("guided mission complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::mock::{sample, MockVehicle, SimClock};
    use crate::vehicle::FlightMode;

    #[test]
    fn test_same_coord_rounds_to_five_places() {
        assert!(same_coord(50.443326, 50.443329));
        assert!(!same_coord(50.443326, 50.44334));
    }

    #[test]
    fn test_take_off_waits_for_altitude() {
        let v = MockVehicle::scripted([0.0, 5.0, 9.95].map(|a| sample(0.0, 0.0, a, 0.0)));
        let mut c = GuidedCopter::new(v, SimClock::default(), 10.0);
        c.take_off(true).unwrap();
        assert_eq!(c.vehicle().takeoffs, vec![10.0]);
        assert_eq!(c.clock.elapsed, Duration::from_secs(2));
    }

    #[test]
    fn test_take_off_without_wait_does_not_sample() {
        let mut c = GuidedCopter::new(MockVehicle::default(), SimClock::default(), 10.0);
        c.take_off(false).unwrap();
        assert_eq!(c.vehicle().samples, 0);
    }

    #[test]
    fn test_run_requires_both_coordinates() {
        let target = Waypoint { lat: 50.443326, lon: 30.448078, speed: Some(5.0), alt: None };
        // latitude matches first, longitude still off: keep polling
        let script = [
            sample(50.44, 30.44, 10.0, 0.0),
            sample(50.443326, 30.44, 10.0, 0.0),
            sample(50.443326, 30.448078, 10.0, 0.0),
        ];
        let mut c = GuidedCopter::new(MockVehicle::scripted(script), SimClock::default(), 10.0);
        c.run(std::slice::from_ref(&target)).unwrap();

        assert_eq!(c.clock.sleeps, 2);
        let sent = &c.vehicle().gotos[0];
        assert_eq!(sent.alt, Some(10.0));
        assert_eq!(sent.speed, Some(5.0));
    }

    #[test]
    fn test_guided_mission_sequence() {
        let cfg = GuidedConfig {
            altitude_m: 10.0,
            waypoints: vec![Waypoint::new(50.4433, 30.4480), Waypoint::new(50.4434, 30.4481)],
            final_heading_deg: Some(90.0),
            arm_timeout_s: 30,
        };
        let script = [
            sample(50.4433, 30.4480, 10.0, 0.0),
            sample(50.4433, 30.4480, 10.0, 0.0),
            sample(50.4434, 30.4481, 10.0, 0.0),
        ];
        let mut v = MockVehicle::scripted(script);
        v.armable_after = Some(0);
        let mut c = GuidedCopter::new(v, SimClock::default(), cfg.altitude_m);
        run_guided_mission(&mut c, &cfg).unwrap();

        let v = c.vehicle();
        assert_eq!(v.modes, vec![FlightMode::Guided]);
        assert_eq!(v.gotos.len(), 2);
        assert_eq!(v.yaws, vec![90.0]);
    }
}
