use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::control::{Approach, ControlOutput, Controller};
use crate::gear::ChannelMapping;
use crate::vehicle::{Clock, FlightMode, Vehicle, Waypoint};
use crate::MissionConfig;

pub const ALTITUDE_INTERVAL: Duration = Duration::from_secs(1);
pub const POINT_INTERVAL: Duration = Duration::from_secs(1);
pub const YAW_INTERVAL: Duration = Duration::from_millis(500);
pub const ARM_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const HOLD_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ARM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissionError {
    #[error("can't arm motors: vehicle not armable after {timeout_s}s")]
    ArmFailure { timeout_s: u64 },
}

/// Wait for the armable flag, switch to GUIDED and arm. Arming itself is
/// not verified.
pub fn arm<V: Vehicle, C: Clock>(vehicle: &mut V, clock: &mut C, timeout: Duration) -> Result<()> {
    info!("arming");
    let mut waited = Duration::ZERO;
    while !vehicle.is_armable().context("poll armable")? {
        if waited >= timeout {
            return Err(MissionError::ArmFailure { timeout_s: timeout.as_secs() }.into());
        }
        debug!("arming: waiting for vehicle to become armable ({}s)", waited.as_secs());
        clock.sleep(ARM_POLL_INTERVAL);
        waited += ARM_POLL_INTERVAL;
    }
    switch_mode(vehicle, FlightMode::Guided)?;
    vehicle.set_armed(true).context("arm motors")?;
    info!("armed");
    Ok(())
}

pub fn switch_mode<V: Vehicle>(vehicle: &mut V, mode: FlightMode) -> Result<()> {
    info!("change mode to {}", mode);
    vehicle.set_mode(mode).with_context(|| format!("set mode {}", mode))
}

/// Copter flown through RC channel overrides.
pub struct Copter<V, C> {
    vehicle: V,
    clock: C,
    ctl: Controller,
}

impl<V: Vehicle, C: Clock> Copter<V, C> {
    pub fn new(vehicle: V, clock: C, mapping: ChannelMapping) -> Self {
        Self { vehicle, clock, ctl: Controller::new(mapping) }
    }

    pub fn output(&self) -> ControlOutput {
        self.ctl.output()
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn arm(&mut self, timeout: Duration) -> Result<()> {
        arm(&mut self.vehicle, &mut self.clock, timeout)
    }

    pub fn switch_mode(&mut self, mode: FlightMode) -> Result<()> {
        switch_mode(&mut self.vehicle, mode)
    }

    /// Climb on throttle until 99% of `altitude` (meters above home).
    pub fn to_altitude(&mut self, altitude: f64) -> Result<()> {
        info!("climbing to {altitude}m");
        loop {
            let tel = self.vehicle.telemetry().context("read altitude")?;
            let step = self.ctl.altitude_step(&tel.position, altitude);
            self.actuate()?;
            if step.converged {
                info!("target altitude reached ({:.1}m)", tel.position.alt);
                return Ok(());
            }
            debug!(alt = tel.position.alt, gap = step.error, gear = ?step.gear, at = %tel.ts, "altitude");
            self.clock.sleep(ALTITUDE_INTERVAL);
        }
    }

    /// Fly to `target`, alternating a blocking heading correction with one
    /// pitch step per tick, until within `precision_m`.
    pub fn to_point(&mut self, target: &Waypoint, precision_m: f64) -> Result<()> {
        info!("follow to point: {}, {}", target.lat, target.lon);
        loop {
            let tel = self.vehicle.telemetry().context("read position")?;
            match self.ctl.approach_step(&tel.position, target, precision_m)? {
                Approach::Arrived(step) => {
                    self.actuate()?;
                    info!("target point reached ({:.1}m off)", step.error);
                    return Ok(());
                }
                Approach::Turn { bearing, distance_m } => {
                    self.ctl.hold_pitch();
                    self.rotate_to(bearing)?;
                    let step = self.ctl.advance(distance_m);
                    self.actuate()?;
                    debug!(distance_m, gear = ?step.gear, "approach");
                    self.clock.sleep(POINT_INTERVAL);
                }
            }
        }
    }

    /// Turn in place until the heading is within 0.9° of `yaw` (radians).
    pub fn rotate_to(&mut self, yaw: f64) -> Result<()> {
        debug!("rotate to {:.1} deg", yaw.to_degrees());
        loop {
            let tel = self.vehicle.telemetry().context("read attitude")?;
            let step = self.ctl.yaw_step(tel.yaw, yaw);
            self.actuate()?;
            if step.converged {
                debug!("heading reached ({:.2} deg off)", step.error);
                return Ok(());
            }
            debug!(gap_deg = step.error, gear = ?step.gear, yaw = step.output.yaw, "rotate");
            self.clock.sleep(YAW_INTERVAL);
        }
    }

    /// Re-send the current output once.
    pub fn run(&mut self) -> Result<()> {
        self.actuate()
    }

    /// Keep re-sending the current output once per second; `ticks == None`
    /// holds forever.
    pub fn hold(&mut self, ticks: Option<u64>) -> Result<()> {
        let mut n = 0u64;
        while ticks.map_or(true, |t| n < t) {
            self.run()?;
            self.clock.sleep(HOLD_INTERVAL);
            n += 1;
        }
        Ok(())
    }

    fn actuate(&mut self) -> Result<()> {
        let ov = self.ctl.overrides();
        self.vehicle.override_channels(&ov).context("apply channel overrides")
    }
}

/// Arm, climb, fly to the destination, settle the final heading and hold.
pub fn run_override_mission<V: Vehicle, C: Clock>(
    copter: &mut Copter<V, C>,
    cfg: &MissionConfig,
    hold_ticks: Option<u64>,
) -> Result<()> {
    copter.arm(Duration::from_secs(cfg.arm_timeout_s))?;
    copter.switch_mode(cfg.flight_mode)?;
    copter.to_altitude(cfg.altitude_m)?;
    copter.to_point(&cfg.destination, cfg.precision_m)?;
    copter.rotate_to(cfg.final_yaw_rad)?;
    info!("mission complete, holding");
    copter.hold(hold_ticks)
}
