use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    /// Altitude above home, meters.
    pub alt: f64,
}

/// One telemetry sample. Fields come from separate messages, so they are
/// not guaranteed to describe the same instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub position: Position,
    /// Radians, as reported by ATTITUDE.
    pub yaw: f64,
    pub ts: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    /// Ground speed in m/s; autopilot default when absent.
    pub speed: Option<f32>,
    /// Relative altitude in meters.
    pub alt: Option<f32>,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, speed: None, alt: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FlightMode {
    Stabilize,
    Acro,
    AltHold,
    Auto,
    Guided,
    Loiter,
    Rtl,
    Circle,
    Land,
    Drift,
    Sport,
    PosHold,
    Brake,
}

impl FlightMode {
    pub const ALL: [FlightMode; 13] = [
        FlightMode::Stabilize,
        FlightMode::Acro,
        FlightMode::AltHold,
        FlightMode::Auto,
        FlightMode::Guided,
        FlightMode::Loiter,
        FlightMode::Rtl,
        FlightMode::Circle,
        FlightMode::Land,
        FlightMode::Drift,
        FlightMode::Sport,
        FlightMode::PosHold,
        FlightMode::Brake,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FlightMode::Stabilize => "STABILIZE",
            FlightMode::Acro => "ACRO",
            FlightMode::AltHold => "ALT_HOLD",
            FlightMode::Auto => "AUTO",
            FlightMode::Guided => "GUIDED",
            FlightMode::Loiter => "LOITER",
            FlightMode::Rtl => "RTL",
            FlightMode::Circle => "CIRCLE",
            FlightMode::Land => "LAND",
            FlightMode::Drift => "DRIFT",
            FlightMode::Sport => "SPORT",
            FlightMode::PosHold => "POSHOLD",
            FlightMode::Brake => "BRAKE",
        }
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FlightMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let want = s.trim().to_ascii_uppercase();
        FlightMode::ALL
            .into_iter()
            .find(|m| m.name() == want)
            .ok_or_else(|| anyhow::anyhow!("unknown flight mode: {}", s))
    }
}

impl TryFrom<String> for FlightMode {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FlightMode> for String {
    fn from(m: FlightMode) -> Self {
        m.name().to_string()
    }
}

/// PWM values to substitute on RC channels, keyed by channel index (1-based).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelOverride {
    values: Vec<(u8, u16)>,
}

impl ChannelOverride {
    pub fn set(&mut self, channel: u8, pwm: u16) {
        match self.values.iter_mut().find(|(c, _)| *c == channel) {
            Some(slot) => slot.1 = pwm,
            None => self.values.push((channel, pwm)),
        }
    }

    pub fn get(&self, channel: u8) -> Option<u16> {
        self.values.iter().find(|(c, _)| *c == channel).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        self.values.iter().copied()
    }
}

/// Capability the mission drives: telemetry in, commands and channel
/// overrides out. Implemented over MAVLink by `copter-fc` and by mocks in
/// tests.
pub trait Vehicle {
    /// Fresh position and attitude sample.
    fn telemetry(&mut self) -> Result<Telemetry>;
    fn is_armable(&mut self) -> Result<bool>;
    fn set_armed(&mut self, armed: bool) -> Result<()>;
    fn set_mode(&mut self, mode: FlightMode) -> Result<()>;
    fn override_channels(&mut self, channels: &ChannelOverride) -> Result<()>;

    // guided navigation
    fn takeoff(&mut self, altitude_m: f32) -> Result<()>;
    fn goto(&mut self, target: &Waypoint) -> Result<()>;
    /// Absolute heading in degrees, clockwise.
    fn condition_yaw(&mut self, heading_deg: f32) -> Result<()>;
}

/// Where the polling loops sleep between ticks.
pub trait Clock {
    fn sleep(&mut self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadClock;

impl Clock for ThreadClock {
    fn sleep(&mut self, d: Duration) {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted vehicle: telemetry pops from `script` and repeats the last
    /// sample once the script runs out. Everything written is recorded.
    #[derive(Debug, Default)]
    pub struct MockVehicle {
        pub script: VecDeque<Telemetry>,
        pub last: Option<Telemetry>,
        pub armable_after: Option<usize>,
        pub armable_polls: usize,
        pub armed: Vec<bool>,
        pub modes: Vec<FlightMode>,
        pub overrides: Vec<ChannelOverride>,
        pub takeoffs: Vec<f32>,
        pub gotos: Vec<Waypoint>,
        pub yaws: Vec<f32>,
        pub samples: usize,
    }

    pub fn sample(lat: f64, lon: f64, alt: f64, yaw: f64) -> Telemetry {
        Telemetry {
            position: Position { lat, lon, alt },
            yaw,
            ts: OffsetDateTime::UNIX_EPOCH,
        }
    }

    impl MockVehicle {
        pub fn scripted(samples: impl IntoIterator<Item = Telemetry>) -> Self {
            Self { script: samples.into_iter().collect(), ..Default::default() }
        }
    }

    impl Vehicle for MockVehicle {
        fn telemetry(&mut self) -> Result<Telemetry> {
            self.samples += 1;
            if let Some(t) = self.script.pop_front() {
                self.last = Some(t);
            }
            self.last.clone().ok_or_else(|| anyhow::anyhow!("mock: no telemetry scripted"))
        }

        fn is_armable(&mut self) -> Result<bool> {
            self.armable_polls += 1;
            Ok(self.armable_after.is_some_and(|n| self.armable_polls > n))
        }

        fn set_armed(&mut self, armed: bool) -> Result<()> {
            self.armed.push(armed);
            Ok(())
        }

        fn set_mode(&mut self, mode: FlightMode) -> Result<()> {
            self.modes.push(mode);
            Ok(())
        }

        fn override_channels(&mut self, channels: &ChannelOverride) -> Result<()> {
            self.overrides.push(channels.clone());
            Ok(())
        }

        fn takeoff(&mut self, altitude_m: f32) -> Result<()> {
            self.takeoffs.push(altitude_m);
            Ok(())
        }

        fn goto(&mut self, target: &Waypoint) -> Result<()> {
            self.gotos.push(target.clone());
            Ok(())
        }

        fn condition_yaw(&mut self, heading_deg: f32) -> Result<()> {
            self.yaws.push(heading_deg);
            Ok(())
        }
    }

    /// Accumulates requested sleeps instead of blocking.
    #[derive(Debug, Default)]
    pub struct SimClock {
        pub elapsed: Duration,
        pub sleeps: usize,
    }

    impl Clock for SimClock {
        fn sleep(&mut self, d: Duration) {
            self.elapsed += d;
            self.sleeps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_mode_parse_roundtrip() {
        for m in FlightMode::ALL {
            assert_eq!(m.name().parse::<FlightMode>().unwrap(), m);
        }
        assert_eq!("alt_hold".parse::<FlightMode>().unwrap(), FlightMode::AltHold);
    }

    #[test]
    fn test_flight_mode_unknown_name_fails() {
        let err = "HOVER".parse::<FlightMode>().unwrap_err();
        assert!(err.to_string().contains("HOVER"));
    }

    #[test]
    fn test_channel_override_set_replaces() {
        let mut ov = ChannelOverride::default();
        ov.set(3, 1500);
        ov.set(3, 1625);
        ov.set(2, 1400);
        assert_eq!(ov.get(3), Some(1625));
        assert_eq!(ov.get(2), Some(1400));
        assert_eq!(ov.get(4), None);
        assert_eq!(ov.iter().count(), 2);
    }
}
