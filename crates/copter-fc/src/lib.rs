pub mod mav;
pub mod mode;
pub mod state;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// MAVLink connection string, e.g. "tcpout:127.0.0.1:5762",
    /// "udpin:0.0.0.0:14550" or "serial:/dev/ttyACM0:115200". A bare device
    /// path is combined with `baud`.
    pub address: String,

    /// Serial baud rate for bare device paths. Default 115200.
    pub baud: Option<u32>,

    /// Block on connect until a heartbeat and first position arrive.
    #[serde(default)]
    pub wait_ready: bool,

    /// MAVLink ids we use (GCS side)
    pub sys_id: u8,
    pub comp_id: u8,

    /// target system/component (FC side). 1/1 is common for ArduPilot.
    pub target_sys: u8,
    pub target_comp: u8,

    /// Requested telemetry stream rate. Default 4Hz.
    pub stream_hz: Option<u16>,

    /// Max wait for a fresh position+attitude sample. Default 5000.
    pub telemetry_timeout_ms: Option<u64>,

    /// Max wait for `wait_ready`. Default 30000.
    pub ready_timeout_ms: Option<u64>,
}

impl LinkConfig {
    pub fn url(&self) -> String {
        if self.address.starts_with('/') {
            format!("serial:{}:{}", self.address, self.baud.unwrap_or(115_200))
        } else {
            self.address.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(address: &str, baud: Option<u32>) -> LinkConfig {
        LinkConfig {
            address: address.into(),
            baud,
            wait_ready: false,
            sys_id: 255,
            comp_id: 190,
            target_sys: 1,
            target_comp: 1,
            stream_hz: None,
            telemetry_timeout_ms: None,
            ready_timeout_ms: None,
        }
    }

    #[test]
    fn test_url_passthrough() {
        assert_eq!(cfg("tcpout:127.0.0.1:5762", None).url(), "tcpout:127.0.0.1:5762");
    }

    #[test]
    fn test_url_bare_device_uses_baud() {
        assert_eq!(cfg("/dev/ttyACM0", Some(57600)).url(), "serial:/dev/ttyACM0:57600");
        assert_eq!(cfg("/dev/ttyUSB0", None).url(), "serial:/dev/ttyUSB0:115200");
    }
}
