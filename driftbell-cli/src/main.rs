//! driftbell CLI: live player, offline renderer and timeline dump.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use driftbell_engine::realtime::list_output_devices;
use driftbell_engine::scheduler::STOP_FADE_SECS;
use driftbell_engine::{
    offline, ComposerConfig, Conductor, CpalProvider, SchedulerProfile, Settings, SongDuration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "driftbell", version, about = "Seeded ambient composer")]
struct Cli {
    /// Composer config (JSON); missing fields take defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listener settings file (JSON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Scheduling profile
    #[arg(long, global = true, value_parser = parse_profile)]
    profile: Option<SchedulerProfile>,

    /// More logging (-v debug, -vv trace); RUST_LOG wins when set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct Tone {
    /// Tone base in Hz, clamped to [100, 200]
    #[arg(long)]
    tone_base: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a live session on an output device
    Play {
        /// Seed; defaults to the wall clock
        #[arg(long)]
        seed: Option<u32>,

        /// Song length: "infinite" or one of 60, 300, 600, 1800, 3600 seconds
        #[arg(long)]
        length: Option<SongDuration>,

        #[command(flatten)]
        tone: Tone,

        /// Output device name (see `devices`)
        #[arg(long)]
        device: Option<String>,

        #[arg(long)]
        sample_rate: Option<u32>,

        #[arg(long)]
        channels: Option<u16>,

        /// Fade out and stop after this many seconds
        #[arg(long)]
        stop_after: Option<u64>,

        /// Re-render the session offline to this WAV file when it ends
        #[arg(long)]
        export: Option<PathBuf>,

        /// Write the effective settings back to --settings
        #[arg(long)]
        save_settings: bool,
    },

    /// Render a seed offline to a 16-bit WAV file
    Render {
        #[arg(long)]
        seed: u32,

        /// Seconds to render (capped by the config's max render length)
        #[arg(long, default_value_t = 300.0)]
        seconds: f64,

        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,

        #[command(flatten)]
        tone: Tone,

        output: PathBuf,
    },

    /// Print the event timeline of a seed as JSON lines
    Timeline {
        #[arg(long)]
        seed: u32,

        #[arg(long, default_value_t = 120.0)]
        seconds: f64,

        #[command(flatten)]
        tone: Tone,
    },

    /// List output devices
    Devices,
}

fn parse_profile(s: &str) -> Result<SchedulerProfile, String> {
    match s {
        "desktop" => Ok(SchedulerProfile::Desktop),
        "mobile" => Ok(SchedulerProfile::Mobile),
        other => Err(format!("unknown profile {other:?} (desktop|mobile)")),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<ComposerConfig> {
    let mut cfg = match &cli.config {
        Some(p) => ComposerConfig::load(p).with_context(|| format!("reading config {}", p.display()))?,
        None => ComposerConfig::default(),
    };
    if let Some(profile) = cli.profile {
        cfg.profile = profile;
    }
    Ok(cfg)
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(p) if p.exists() => {
            Settings::load(p).with_context(|| format!("reading settings {}", p.display()))
        }
        _ => Ok(Settings::default()),
    }
}

fn tone_base(settings: &Settings, tone: &Tone) -> f64 {
    tone.tone_base.map_or(settings.tone_base_hz, Settings::clamp_tone_base)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cfg = load_config(&cli)?;
    let mut settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Command::Devices => {
            println!("Available output devices:");
            for name in list_output_devices()? {
                println!("- {name}");
            }
        }

        Command::Timeline { seed, seconds, tone } => {
            let base = tone_base(&settings, &tone);
            for ev in offline::timeline(seed, &cfg, base, seconds) {
                println!("{}", serde_json::to_string(&ev)?);
            }
        }

        Command::Render { seed, seconds, sample_rate, tone, output } => {
            let base = tone_base(&settings, &tone);
            let started = Instant::now();
            let buf = offline::render(seed, &cfg, base, seconds, sample_rate)?;
            buf.write_wav(&output).with_context(|| format!("writing {}", output.display()))?;
            info!(
                seed,
                secs = buf.duration_secs(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "rendered {}",
                output.display()
            );
        }

        Command::Play {
            seed,
            length,
            tone,
            device,
            sample_rate,
            channels,
            stop_after,
            export,
            save_settings,
        } => {
            if let Some(length) = length {
                settings.song_duration = length;
            }
            settings.tone_base_hz = tone_base(&settings, &tone);
            if save_settings {
                match cli.settings.as_deref() {
                    Some(p) => settings.save(p).with_context(|| format!("writing {}", p.display()))?,
                    None => bail!("--save-settings needs --settings <path>"),
                }
            }

            let provider = CpalProvider { device, sample_rate, channels };
            let mut conductor = Conductor::new(provider, cfg, settings);
            let seed = conductor.start(seed).context("starting live session")?;
            println!("Playing seed {seed}. Press Ctrl+C to stop.");

            let started = Instant::now();
            let deadline = stop_after.map(Duration::from_secs);
            while conductor.is_running() {
                thread::sleep(conductor.tick_interval());
                if let Err(e) = conductor.tick() {
                    warn!(error = %e, "tick failed; stopping");
                    break;
                }
                if deadline.is_some_and(|d| started.elapsed() >= d) {
                    conductor.stop(true);
                    thread::sleep(Duration::from_secs_f64(STOP_FADE_SECS + 0.2));
                    break;
                }
            }

            if let Some(path) = export {
                let secs = conductor
                    .settings()
                    .song_duration
                    .limit_secs()
                    .unwrap_or_else(|| started.elapsed().as_secs_f64());
                let buf = conductor.export_render(secs)?;
                buf.write_wav(&path).with_context(|| format!("writing {}", path.display()))?;
                println!("Exported seed {seed} to {}", path.display());
            }
        }
    }
    Ok(())
}
