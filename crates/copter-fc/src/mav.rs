use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavCmd, MavFrame, MavMessage, COMMAND_INT_DATA, COMMAND_LONG_DATA,
        RC_CHANNELS_OVERRIDE_DATA, REQUEST_DATA_STREAM_DATA,
    },
    error::MessageReadError,
    MavConnection, MavHeader,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use copter_nav::vehicle::{ChannelOverride, Telemetry};
use copter_nav::{FlightMode, Vehicle, Waypoint};

use crate::mode::custom_mode;
use crate::state::{SharedState, VehicleState};
use crate::LinkConfig;

/// RC_CHANNELS_OVERRIDE value meaning "leave this channel alone".
const RC_IGNORE: u16 = u16::MAX;
const MAV_DATA_STREAM_ALL: u8 = 0;
/// MAV_MODE_FLAG_CUSTOM_MODE_ENABLED as a DO_SET_MODE parameter.
const MODE_FLAG_CUSTOM: f32 = 1.0;

type Conn = dyn MavConnection<MavMessage> + Send + Sync;

/// Link to the flight controller. A reader thread owns `recv()` and keeps
/// the shared [`VehicleState`] current; commands are sent from the caller.
pub struct FcLink {
    conn: Arc<Conn>,
    hdr: MavHeader,
    target_sys: u8,
    target_comp: u8,
    telemetry_timeout: Duration,
    shared: Arc<SharedState>,
}

impl FcLink {
    pub fn open(cfg: &LinkConfig) -> Result<Self> {
        let url = cfg.url();
        info!("connecting to {}", url);
        let conn: Arc<Conn> = Arc::from(
            mavlink::connect::<MavMessage>(&url).with_context(|| format!("mavlink connect {}", url))?,
        );

        let shared = Arc::new(SharedState::default());
        spawn_reader(Arc::clone(&conn), Arc::clone(&shared))?;

        let mut link = Self {
            conn,
            hdr: MavHeader { system_id: cfg.sys_id, component_id: cfg.comp_id, sequence: 0 },
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            telemetry_timeout: Duration::from_millis(cfg.telemetry_timeout_ms.unwrap_or(5000)),
            shared,
        };
        link.request_streams(cfg.stream_hz.unwrap_or(4))?;

        if cfg.wait_ready {
            link.wait_ready(Duration::from_millis(cfg.ready_timeout_ms.unwrap_or(30_000)))?;
        }
        info!("vehicle connection established");
        Ok(link)
    }

    /// Copy of the latest state seen on the link.
    pub fn state(&self) -> Result<VehicleState> {
        self.shared.snapshot()
    }

    /// Wait for a heartbeat and a first position fix.
    pub fn wait_ready(&self, timeout: Duration) -> Result<()> {
        self.shared
            .wait_for(timeout, |st| st.last_heartbeat.is_some() && st.position.is_some())
            .with_context(|| format!("vehicle not ready after {}s", timeout.as_secs()))?;
        Ok(())
    }

    fn request_streams(&mut self, hz: u16) -> Result<()> {
        let req = REQUEST_DATA_STREAM_DATA {
            req_message_rate: hz,
            target_system: self.target_sys,
            target_component: self.target_comp,
            req_stream_id: MAV_DATA_STREAM_ALL,
            start_stop: 1,
        };
        debug!("fc: requesting all streams at {}Hz", hz);
        self.send(MavMessage::REQUEST_DATA_STREAM(req))
    }

    fn command_long(&mut self, command: MavCmd, params: [f32; 7]) -> Result<()> {
        let [param1, param2, param3, param4, param5, param6, param7] = params;
        let cmd = COMMAND_LONG_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            command,
            confirmation: 0,
            param1,
            param2,
            param3,
            param4,
            param5,
            param6,
            param7,
        };
        debug!("fc: sending {:?}", command);
        self.send(MavMessage::COMMAND_LONG(cmd))
    }

    fn send(&mut self, msg: MavMessage) -> Result<()> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn.send(&self.hdr, &msg).context("mavlink send")?;
        Ok(())
    }
}

fn spawn_reader(conn: Arc<Conn>, shared: Arc<SharedState>) -> Result<()> {
    thread::Builder::new()
        .name("mav-reader".into())
        .spawn(move || read_loop(conn.as_ref(), &shared))
        .context("spawn mavlink reader")?;
    Ok(())
}

/// Fold every message into `shared` until the link fails. Runs for the life
/// of the process since a blocking recv can't be interrupted.
fn read_loop(conn: &Conn, shared: &SharedState) {
    loop {
        match conn.recv() {
            Ok((_hdr, msg)) => shared.apply(&msg),
            Err(MessageReadError::Parse(e)) => {
                debug!("fc: skipping undecoded frame: {}", e);
            }
            Err(e) => {
                warn!("fc: link lost: {}", e);
                shared.close(e.to_string());
                return;
            }
        }
    }
}

/// Channels 1..8 of an override message; anything not set is ignored.
pub fn override_message(target_sys: u8, target_comp: u8, channels: &ChannelOverride) -> RC_CHANNELS_OVERRIDE_DATA {
    let mut chans = [RC_IGNORE; 8];
    for (ch, pwm) in channels.iter() {
        if let Some(slot) = usize::from(ch).checked_sub(1).and_then(|i| chans.get_mut(i)) {
            *slot = pwm;
        }
    }
    RC_CHANNELS_OVERRIDE_DATA {
        target_system: target_sys,
        target_component: target_comp,
        chan1_raw: chans[0],
        chan2_raw: chans[1],
        chan3_raw: chans[2],
        chan4_raw: chans[3],
        chan5_raw: chans[4],
        chan6_raw: chans[5],
        chan7_raw: chans[6],
        chan8_raw: chans[7],
        ..Default::default()
    }
}

impl Vehicle for FcLink {
    fn telemetry(&mut self) -> Result<Telemetry> {
        self.shared.next_telemetry(self.telemetry_timeout)
    }

    fn is_armable(&mut self) -> Result<bool> {
        Ok(self.shared.snapshot()?.is_armable())
    }

    fn set_armed(&mut self, armed: bool) -> Result<()> {
        let flag = if armed { 1.0 } else { 0.0 };
        self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [flag, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    fn set_mode(&mut self, mode: FlightMode) -> Result<()> {
        let n = custom_mode(mode) as f32;
        self.command_long(MavCmd::MAV_CMD_DO_SET_MODE, [MODE_FLAG_CUSTOM, n, 0.0, 0.0, 0.0, 0.0, 0.0])
    }

    fn override_channels(&mut self, channels: &ChannelOverride) -> Result<()> {
        let msg = override_message(self.target_sys, self.target_comp, channels);
        self.send(MavMessage::RC_CHANNELS_OVERRIDE(msg))
    }

    fn takeoff(&mut self, altitude_m: f32) -> Result<()> {
        info!("FC: sending TAKEOFF to {}m", altitude_m);
        self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m])
    }

    fn goto(&mut self, target: &Waypoint) -> Result<()> {
        if let Some(speed) = target.speed {
            // speed type 1 = ground speed, -1 throttle = unchanged
            self.command_long(MavCmd::MAV_CMD_DO_CHANGE_SPEED, [1.0, speed, -1.0, 0.0, 0.0, 0.0, 0.0])?;
        }
        let cmd = COMMAND_INT_DATA {
            param1: target.speed.unwrap_or(-1.0),
            param2: 0.0,
            param3: 0.0,
            param4: f32::NAN,
            x: (target.lat * 1e7).round() as i32,
            y: (target.lon * 1e7).round() as i32,
            z: target.alt.unwrap_or(0.0),
            command: MavCmd::MAV_CMD_DO_REPOSITION,
            target_system: self.target_sys,
            target_component: self.target_comp,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            current: 0,
            autocontinue: 0,
        };
        info!("FC: sending REPOSITION to {}, {}", target.lat, target.lon);
        self.send(MavMessage::COMMAND_INT(cmd))
    }

    fn condition_yaw(&mut self, heading_deg: f32) -> Result<()> {
        // rate 0 = default, direction 1 = clockwise, relative 0 = absolute
        self.command_long(MavCmd::MAV_CMD_CONDITION_YAW, [heading_deg, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_message_fills_set_channels_only() {
        let mut ov = ChannelOverride::default();
        ov.set(2, 1300);
        ov.set(3, 1625);
        ov.set(4, 1478);
        let msg = override_message(1, 1, &ov);
        assert_eq!(msg.chan1_raw, RC_IGNORE);
        assert_eq!(msg.chan2_raw, 1300);
        assert_eq!(msg.chan3_raw, 1625);
        assert_eq!(msg.chan4_raw, 1478);
        assert_eq!(msg.chan8_raw, RC_IGNORE);
        assert_eq!(msg.target_system, 1);
    }

    #[test]
    fn test_override_message_drops_out_of_range_channels() {
        let mut ov = ChannelOverride::default();
        ov.set(0, 1100);
        ov.set(9, 1900);
        let msg = override_message(1, 1, &ov);
        assert_eq!(msg.chan1_raw, RC_IGNORE);
        assert_eq!(msg.chan8_raw, RC_IGNORE);
    }
}
