//! Gear-based channel controller.
//!
//! Every loop in the mission is a sequence of independent steps: take one
//! telemetry sample, compute the error, pick a gear, write the signed offset
//! for one axis. Nothing is carried between steps except the current
//! [`ControlOutput`], so the same functions serve the real polling loops and
//! the tests.

use crate::gear::{ChannelMapping, Gear, ALTITUDE_BANDS, DISTANCE_BANDS, YAW_BANDS};
use crate::geo::{self, GeoError};
use crate::vehicle::{ChannelOverride, Position, Waypoint};

/// Altitude loop converges at this fraction of the target.
pub const ALTITUDE_TOLERANCE: f64 = 0.99;
/// Yaw loop converges once the heading gap is at or under this, degrees.
pub const YAW_PRECISION_DEG: f64 = 0.9;

/// Signed offsets from neutral for each axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlOutput {
    pub pitch: i32,
    pub throttle: i32,
    pub yaw: i32,
}

/// Result of one controller step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub output: ControlOutput,
    /// Gear chosen this step; `None` once converged.
    pub gear: Option<Gear>,
    /// Error the step was computed from (m or degrees).
    pub error: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Approach {
    /// Within precision; pitch has been reset.
    Arrived(Step),
    /// Turn to `bearing` (radians) and then [`Controller::advance`] over
    /// `distance_m`.
    Turn { bearing: f64, distance_m: f64 },
}

#[derive(Debug, Clone)]
pub struct Controller {
    mapping: ChannelMapping,
    output: ControlOutput,
}

impl Controller {
    pub fn new(mapping: ChannelMapping) -> Self {
        Self { mapping, output: ControlOutput::default() }
    }

    pub fn mapping(&self) -> &ChannelMapping {
        &self.mapping
    }

    pub fn output(&self) -> ControlOutput {
        self.output
    }

    pub fn set_pitch(&mut self, offset: i32) {
        self.output.pitch = offset;
    }

    pub fn set_throttle(&mut self, offset: i32) {
        self.output.throttle = offset;
    }

    pub fn set_yaw(&mut self, offset: i32) {
        self.output.yaw = offset;
    }

    /// Channel values for the current output.
    pub fn overrides(&self) -> ChannelOverride {
        let m = &self.mapping;
        let mut ov = ChannelOverride::default();
        ov.set(m.pitch.channel, m.pitch.pwm(self.output.pitch));
        ov.set(m.throttle.channel, m.throttle.pwm(self.output.throttle));
        ov.set(m.yaw.channel, m.yaw.pwm(self.output.yaw));
        ov
    }

    pub fn altitude_step(&mut self, pos: &Position, target_alt: f64) -> Step {
        let gap = target_alt - pos.alt;
        if pos.alt >= target_alt * ALTITUDE_TOLERANCE {
            self.set_throttle(0);
            return self.done(gap);
        }
        let gear = ALTITUDE_BANDS.select(gap);
        self.set_throttle(i32::from(self.mapping.throttle.magnitude(gear)));
        self.moving(gear, gap)
    }

    /// `yaw` and `target` in radians.
    pub fn yaw_step(&mut self, yaw: f64, target: f64) -> Step {
        let current = yaw.to_degrees();
        let wanted = target.to_degrees();
        let gap = geo::angular_gap(current, wanted);
        if gap <= YAW_PRECISION_DEG {
            self.set_yaw(0);
            return self.done(gap);
        }
        let gear = YAW_BANDS.select(gap);
        let sign = geo::rotation_sign(current, wanted);
        self.set_yaw(sign * i32::from(self.mapping.yaw.magnitude(gear)));
        self.moving(gear, gap)
    }

    pub fn approach_step(
        &mut self,
        pos: &Position,
        target: &Waypoint,
        precision_m: f64,
    ) -> Result<Approach, GeoError> {
        let distance_m = geo::planar_distance((pos.lon, pos.lat), (target.lon, target.lat));
        if distance_m <= precision_m {
            self.set_pitch(0);
            return Ok(Approach::Arrived(self.done(distance_m)));
        }
        let bearing = geo::bearing(pos.lat, pos.lon, target.lat, target.lon)?;
        Ok(Approach::Turn { bearing, distance_m })
    }

    /// Pitch forward for the remaining distance. Forward stick is low PWM on
    /// ArduCopter, hence the negative offset.
    pub fn advance(&mut self, distance_m: f64) -> Step {
        let gear = DISTANCE_BANDS.select(distance_m);
        self.set_pitch(-i32::from(self.mapping.pitch.magnitude(gear)));
        self.moving(gear, distance_m)
    }

    /// Neutral pitch while the heading is corrected.
    pub fn hold_pitch(&mut self) {
        self.set_pitch(0);
    }

    fn moving(&self, gear: Gear, error: f64) -> Step {
        Step { output: self.output, gear: Some(gear), error, converged: false }
    }

    fn done(&self, error: f64) -> Step {
        Step { output: self.output, gear: None, error, converged: true }
    }
}
