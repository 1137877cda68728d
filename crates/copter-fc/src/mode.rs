use copter_nav::FlightMode;

/// ArduCopter `custom_mode` number for a flight mode.
pub fn custom_mode(mode: FlightMode) -> u32 {
    match mode {
        FlightMode::Stabilize => 0,
        FlightMode::Acro => 1,
        FlightMode::AltHold => 2,
        FlightMode::Auto => 3,
        FlightMode::Guided => 4,
        FlightMode::Loiter => 5,
        FlightMode::Rtl => 6,
        FlightMode::Circle => 7,
        FlightMode::Land => 9,
        FlightMode::Drift => 11,
        FlightMode::Sport => 13,
        FlightMode::PosHold => 16,
        FlightMode::Brake => 17,
    }
}

pub fn from_custom_mode(n: u32) -> Option<FlightMode> {
    FlightMode::ALL.into_iter().find(|m| custom_mode(*m) == n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_mode_table_is_invertible() {
        for m in FlightMode::ALL {
            assert_eq!(from_custom_mode(custom_mode(m)), Some(m));
        }
    }

    #[test]
    fn test_known_numbers() {
        assert_eq!(custom_mode(FlightMode::AltHold), 2);
        assert_eq!(custom_mode(FlightMode::Guided), 4);
        assert_eq!(from_custom_mode(8), None);
    }
}
