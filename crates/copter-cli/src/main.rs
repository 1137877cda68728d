use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use copter_fc::mav::FcLink;
use copter_fc::LinkConfig;
use copter_nav::guided::{run_guided_mission, GuidedCopter};
use copter_nav::mission::{run_override_mission, Copter};
use copter_nav::{doctor, ChannelMapping, GuidedConfig, MissionConfig, ThreadClock, Vehicle};

#[derive(Debug, Parser)]
#[command(name = "copter", version, about = "Scripted multirotor missions over MAVLink")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file without connecting.
    Doctor,
    /// Fly the channel-override mission, then hold the last output forever.
    Mission,
    /// Fly the [guided] waypoint list with autopilot navigation commands.
    Guided,
    /// Connect and print one telemetry sample.
    Status,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    link: LinkConfig,
    #[serde(default)]
    channels: ChannelMapping,
    #[serde(default)]
    mission: MissionConfig,
    guided: Option<GuidedConfig>,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    parse_config(&s)
}

fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config toml")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => check(&cfg),
        Command::Mission => mission(&cfg),
        Command::Guided => guided(&cfg),
        Command::Status => status(&cfg),
    }
}

fn check(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    anyhow::ensure!(!cfg.link.address.is_empty(), "link.address missing");
    doctor::check_channel_mapping(&cfg.channels)?;
    doctor::check_mission(&cfg.mission)?;
    match &cfg.guided {
        Some(g) => doctor::check_guided(g)?,
        None => warn!("doctor: no [guided] section; `copter guided` unavailable"),
    }
    info!("doctor: OK");
    Ok(())
}

fn mission(cfg: &Config) -> Result<()> {
    doctor::check_channel_mapping(&cfg.channels)?;
    doctor::check_mission(&cfg.mission)?;
    let link = FcLink::open(&cfg.link).context("FC open")?;
    let mut copter = Copter::new(link, ThreadClock, cfg.channels.clone());
    run_override_mission(&mut copter, &cfg.mission, None)
}

fn guided(cfg: &Config) -> Result<()> {
    let g = cfg.guided.as_ref().context("no [guided] config section")?;
    doctor::check_guided(g)?;
    let link = FcLink::open(&cfg.link).context("FC open")?;
    let mut copter = GuidedCopter::new(link, ThreadClock, g.altitude_m);
    run_guided_mission(&mut copter, g)
}

fn status(cfg: &Config) -> Result<()> {
    let mut link = FcLink::open(&cfg.link).context("FC open")?;
    let tel = link.telemetry()?;
    let armable = link.is_armable()?;
    let st = link.state()?;
    println!("sampled_at={}", tel.ts);
    println!("position={:.7},{:.7} alt={:.1}m", tel.position.lat, tel.position.lon, tel.position.alt);
    println!("yaw={:.1}deg", tel.yaw.to_degrees());
    println!("mode={:?} armed={} armable={}", st.mode(), st.armed, armable);
    println!("last_heartbeat_age={:?}", st.hb_age());
    println!("battery={}", st.battery);
    Ok(())
}
