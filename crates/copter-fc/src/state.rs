use anyhow::{bail, Context, Result};
use mavlink::common::{GpsFixType, MavMessage, MavModeFlag, MavState, SYS_STATUS_DATA};
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use time::OffsetDateTime;

use copter_nav::vehicle::{Position, Telemetry};
use copter_nav::FlightMode;

use crate::mode::from_custom_mode;

/// Pack readings from SYS_STATUS. Each field keeps its last valid value;
/// the autopilot's "unknown" sentinels leave it untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Battery {
    pub volts: Option<f32>,
    pub amps: Option<f32>,
    pub percent: Option<u8>,
}

impl Battery {
    fn absorb(&mut self, s: &SYS_STATUS_DATA) {
        if s.voltage_battery != u16::MAX {
            self.volts = Some(f32::from(s.voltage_battery) / 1000.0); // mV
        }
        if s.current_battery >= 0 {
            self.amps = Some(f32::from(s.current_battery) / 100.0); // cA
        }
        if let Some(p) = u8::try_from(s.battery_remaining).ok().filter(|p| *p <= 100) {
            self.percent = Some(p);
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.volts {
            Some(v) => write!(f, "{v:.2}V")?,
            None => f.write_str("?V")?,
        }
        match self.amps {
            Some(a) => write!(f, " {a:.2}A")?,
            None => f.write_str(" ?A")?,
        }
        match self.percent {
            Some(p) => write!(f, " {p}%"),
            None => f.write_str(" ?%"),
        }
    }
}

/// Latest values seen on the link. The `*_seq` counters bump on every
/// matching message so callers can wait for a fresh one.
#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    pub last_heartbeat: Option<Instant>,
    pub armed: bool,
    pub custom_mode: Option<u32>,
    pub system_status: Option<MavState>,
    pub gps_fix: Option<GpsFixType>,
    pub position: Option<Position>,
    pub yaw: Option<f64>,
    pub battery: Battery,
    pub position_seq: u64,
    pub attitude_seq: u64,
}

impl VehicleState {
    pub fn update(&mut self, msg: &MavMessage) {
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                self.last_heartbeat = Some(Instant::now());
                self.armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                self.custom_mode = Some(hb.custom_mode);
                self.system_status = Some(hb.system_status);
            }
            MavMessage::GLOBAL_POSITION_INT(p) => {
                // degE7 and millimeters
                self.position = Some(Position {
                    lat: f64::from(p.lat) / 1e7,
                    lon: f64::from(p.lon) / 1e7,
                    alt: f64::from(p.relative_alt) / 1000.0,
                });
                self.position_seq += 1;
            }
            MavMessage::ATTITUDE(a) => {
                self.yaw = Some(f64::from(a.yaw));
                self.attitude_seq += 1;
            }
            MavMessage::GPS_RAW_INT(g) => {
                self.gps_fix = Some(g.fix_type);
            }
            MavMessage::SYS_STATUS(status) => self.battery.absorb(status),
            _ => {}
        }
    }

    /// Autopilot finished booting and has at least a 2D GPS fix.
    pub fn is_armable(&self) -> bool {
        let booted = matches!(
            self.system_status,
            Some(MavState::MAV_STATE_STANDBY | MavState::MAV_STATE_ACTIVE)
        );
        let fix = matches!(
            self.gps_fix,
            Some(
                GpsFixType::GPS_FIX_TYPE_2D_FIX
                    | GpsFixType::GPS_FIX_TYPE_3D_FIX
                    | GpsFixType::GPS_FIX_TYPE_DGPS
                    | GpsFixType::GPS_FIX_TYPE_RTK_FLOAT
                    | GpsFixType::GPS_FIX_TYPE_RTK_FIXED
                    | GpsFixType::GPS_FIX_TYPE_STATIC
                    | GpsFixType::GPS_FIX_TYPE_PPP
            )
        );
        self.last_heartbeat.is_some() && booted && fix
    }

    pub fn mode(&self) -> Option<FlightMode> {
        self.custom_mode.and_then(from_custom_mode)
    }

    pub fn telemetry(&self) -> Option<Telemetry> {
        Some(Telemetry {
            position: self.position?,
            yaw: self.yaw?,
            ts: OffsetDateTime::now_utc(),
        })
    }

    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }
}

/// [`VehicleState`] shared between the link reader thread and the caller.
/// Every applied message wakes waiters, so waits are bounded by their
/// timeout even when the link goes silent.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Shared>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct Shared {
    state: VehicleState,
    closed: Option<String>,
}

impl SharedState {
    pub fn apply(&self, msg: &MavMessage) {
        self.lock().state.update(msg);
        self.changed.notify_all();
    }

    /// Mark the link dead; current and later waits fail with `reason`.
    pub fn close(&self, reason: String) {
        self.lock().closed = Some(reason);
        self.changed.notify_all();
    }

    pub fn snapshot(&self) -> Result<VehicleState> {
        let g = self.lock();
        if let Some(reason) = &g.closed {
            bail!("vehicle link closed: {}", reason);
        }
        Ok(g.state.clone())
    }

    /// Block until `ready` holds for the latest state or `timeout` passes.
    pub fn wait_for(
        &self,
        timeout: Duration,
        mut ready: impl FnMut(&VehicleState) -> bool,
    ) -> Result<VehicleState> {
        let (g, res) = self
            .changed
            .wait_timeout_while(self.lock(), timeout, |s| s.closed.is_none() && !ready(&s.state))
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(reason) = &g.closed {
            bail!("vehicle link closed: {}", reason);
        }
        if res.timed_out() {
            bail!("timed out after {}ms", timeout.as_millis());
        }
        Ok(g.state.clone())
    }

    /// Position and attitude both newer than the ones current at entry.
    pub fn next_telemetry(&self, timeout: Duration) -> Result<Telemetry> {
        let seen = self.snapshot()?;
        let st = self
            .wait_for(timeout, |st| {
                st.position_seq > seen.position_seq && st.attitude_seq > seen.attitude_seq
            })
            .context("no fresh position/attitude")?;
        st.telemetry().context("telemetry incomplete")
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
