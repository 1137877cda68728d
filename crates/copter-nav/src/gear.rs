use serde::{Deserialize, Serialize};

/// Discrete control-output level, 1 (gentlest) to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Gear(u8);

impl Gear {
    pub const MIN: Gear = Gear(1);
    pub const MAX: Gear = Gear(5);

    pub fn new(level: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0).contains(&level).then_some(Gear(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

/// Ordered threshold table: the first band (highest threshold first) whose
/// threshold the error strictly exceeds picks the gear, else `floor`.
#[derive(Debug, Clone, Copy)]
pub struct GearBands {
    bands: &'static [(f64, Gear)],
    floor: Gear,
}

/// Altitude gap in meters.
pub const ALTITUDE_BANDS: GearBands = GearBands {
    bands: &[(10.0, Gear(5)), (5.0, Gear(2))],
    floor: Gear(1),
};

/// Horizontal distance to the target in meters.
pub const DISTANCE_BANDS: GearBands = GearBands {
    bands: &[(100.0, Gear(5)), (40.0, Gear(4)), (30.0, Gear(3))],
    floor: Gear(1),
};

/// Heading gap in degrees.
pub const YAW_BANDS: GearBands = GearBands {
    bands: &[(100.0, Gear(5)), (30.0, Gear(4))],
    floor: Gear(1),
};

impl GearBands {
    pub fn select(&self, error: f64) -> Gear {
        self.bands
            .iter()
            .find(|(threshold, _)| error > *threshold)
            .map(|(_, gear)| *gear)
            .unwrap_or(self.floor)
    }
}

/// One RC axis: which channel it drives, its neutral PWM and the output
/// magnitude for each gear (index 0 is gear 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub channel: u8,
    pub neutral: u16,
    pub gears: [u16; 5],
}

pub const PWM_MIN: u16 = 1000;
pub const PWM_MAX: u16 = 2000;

impl AxisMapping {
    pub fn magnitude(&self, gear: Gear) -> u16 {
        self.gears[usize::from(gear.level() - 1)]
    }

    /// PWM for a signed offset from neutral, held inside the RC range.
    pub fn pwm(&self, offset: i32) -> u16 {
        let raw = i32::from(self.neutral) + offset;
        raw.clamp(i32::from(PWM_MIN), i32::from(PWM_MAX)) as u16
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMapping {
    pub pitch: AxisMapping,
    pub throttle: AxisMapping,
    pub yaw: AxisMapping,
}

impl Default for ChannelMapping {
    /// ArduCopter RCMAP defaults: pitch on 2, throttle on 3, yaw on 4.
    fn default() -> Self {
        Self {
            pitch: AxisMapping { channel: 2, neutral: 1500, gears: [100, 200, 300, 400, 500] },
            throttle: AxisMapping { channel: 3, neutral: 1500, gears: [125, 200, 300, 400, 500] },
            yaw: AxisMapping { channel: 4, neutral: 1500, gears: [22, 35, 40, 75, 100] },
        }
    }
}
