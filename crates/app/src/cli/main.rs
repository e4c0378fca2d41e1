//! Bellcurve CLI Application

use anyhow::Context;
use bellcurve_core::domain::{
    validate_sample_rate, AppConfig, ChainSettings, ChainUpdate, ParameterId, ParameterSource,
    ParameterStore, ResponseCurve, Slope,
};
use bellcurve_infra::{spawn_control_task, split, EqRenderer};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bellcurve")]
#[command(about = "A cascaded low-cut / peak / high-cut equalizer", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the magnitude response of the given settings
    Response {
        #[command(flatten)]
        eq: EqArgs,

        /// Number of log-spaced points (overrides the config file)
        #[arg(long)]
        points: Option<usize>,

        /// Sample rate in Hz (overrides the config file)
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run generated noise through the EQ and report output levels
    Render {
        #[command(flatten)]
        eq: EqArgs,

        /// Length of the rendered signal in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,

        /// Sweep the peak frequency from 20 Hz to 20 kHz while rendering
        #[arg(long)]
        sweep: bool,

        /// Render as fast as possible instead of at real-time pace
        #[arg(long)]
        fast: bool,

        /// Noise generator seed
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

/// EQ settings accepted on the command line
#[derive(Args, Clone)]
struct EqArgs {
    /// Low-cut frequency in Hz
    #[arg(long, default_value_t = 20.0)]
    low_cut: f32,

    /// Low-cut slope (12, 24, 36 or 48 dB/Oct)
    #[arg(long, default_value = "12")]
    low_cut_slope: Slope,

    /// Peak frequency in Hz
    #[arg(long, default_value_t = 750.0)]
    peak_freq: f32,

    /// Peak gain in dB
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    peak_gain: f32,

    /// Peak quality
    #[arg(long, default_value_t = 1.0)]
    peak_q: f32,

    /// High-cut frequency in Hz
    #[arg(long, default_value_t = 20000.0)]
    high_cut: f32,

    /// High-cut slope (12, 24, 36 or 48 dB/Oct)
    #[arg(long, default_value = "12")]
    high_cut_slope: Slope,
}

impl EqArgs {
    /// Parameter store holding these settings, clamped to their ranges
    fn store(&self) -> Arc<ParameterStore> {
        Arc::new(ParameterStore::with_settings(&ChainSettings {
            low_cut_freq: self.low_cut,
            high_cut_freq: self.high_cut,
            peak_freq: self.peak_freq,
            peak_gain_in_decibels: self.peak_gain,
            peak_quality: self.peak_q,
            low_cut_slope: self.low_cut_slope,
            high_cut_slope: self.high_cut_slope,
        }))
    }
}

/// Output levels of a render run
#[derive(Debug, Default, Serialize)]
struct RenderStats {
    blocks: usize,
    samples: usize,
    peak: f32,
    rms: f32,
    finite: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎚️ Bellcurve starting...");

    let config = load_config(cli.config).await?;

    match cli.command {
        Command::Response {
            eq,
            points,
            sample_rate,
            json,
        } => print_response(&config, &eq, points, sample_rate, json),
        Command::Render {
            eq,
            seconds,
            sweep,
            fast,
            seed,
        } => render(&config, &eq, seconds, sweep, fast, seed).await,
    }
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let path = match path {
        Some(path) => path,
        None => match AppConfig::default_config_path() {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Using default configuration");
                return Ok(AppConfig::default());
            }
        },
    };

    AppConfig::load_or_default(&path)
        .await
        .with_context(|| format!("failed to load {}", path.display()))
}

fn print_response(
    config: &AppConfig,
    eq: &EqArgs,
    points: Option<usize>,
    sample_rate: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let sample_rate = response_sample_rate(config, sample_rate)?;
    let points = points.unwrap_or(config.response.points);
    let settings = eq.store().chain_settings();
    let update = ChainUpdate::compute(&settings, sample_rate);

    let curve = ResponseCurve::sample(
        points,
        config.response.min_freq,
        config.response.max_freq,
        |freq| update.magnitude_at(freq, sample_rate),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&curve)?);
        return Ok(());
    }

    println!(
        "low-cut {} Hz @ {} | peak {} Hz {:+} dB Q {} | high-cut {} Hz @ {}",
        settings.low_cut_freq,
        settings.low_cut_slope,
        settings.peak_freq,
        settings.peak_gain_in_decibels,
        settings.peak_quality,
        settings.high_cut_freq,
        settings.high_cut_slope,
    );
    println!("{:>12}  {:>10}", "freq (Hz)", "gain (dB)");
    for (freq, db) in curve.points() {
        println!("{freq:>12.1}  {db:>10.2}");
    }

    Ok(())
}

/// Sample rate to evaluate the response at: the override, else the engine rate
fn response_sample_rate(config: &AppConfig, sample_rate: Option<u32>) -> anyhow::Result<f64> {
    let sample_rate = sample_rate.unwrap_or(config.engine.sample_rate) as f64;
    validate_sample_rate(sample_rate).context("invalid --sample-rate")
}

async fn render(
    config: &AppConfig,
    eq: &EqArgs,
    seconds: f64,
    sweep: bool,
    fast: bool,
    seed: u64,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        seconds.is_finite() && seconds > 0.0,
        "render length must be positive, got {seconds}"
    );

    let engine = &config.engine;
    let sample_rate = engine.sample_rate as f64;
    let store = eq.store();

    let (controller, renderer) = split(
        store.clone(),
        sample_rate,
        engine.max_block_size,
        engine.channel_capacity,
    )?;
    let mut updates = controller.subscribe();
    let control = spawn_control_task(controller, engine.update_interval());

    let snapshots = tokio::spawn(async move {
        let mut count = 0usize;
        while updates.changed().await.is_ok() {
            count += 1;
        }
        count
    });

    let total_samples = (seconds * sample_rate) as usize;
    let block_size = engine.max_block_size;
    info!(seconds, sample_rate, block_size, sweep, "Rendering noise");

    let render = tokio::task::spawn_blocking(move || {
        render_noise(renderer, sample_rate, block_size, total_samples, !fast, seed)
    });

    if sweep {
        let steps = (seconds * 1000.0 / 20.0).max(1.0) as usize;
        let mut ticker = tokio::time::interval(Duration::from_millis(20));
        for step in 0..=steps {
            if render.is_finished() {
                break;
            }
            ticker.tick().await;
            let freq = 20.0 * 1000.0_f32.powf(step as f32 / steps as f32);
            store.set(ParameterId::PeakFreq, freq);
        }
    }

    let stats = render.await?;
    control.abort();
    let snapshots = snapshots.await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    info!(snapshots, "Render finished");

    anyhow::ensure!(stats.finite, "renderer produced non-finite samples");
    Ok(())
}

/// Play seeded stereo noise through `renderer` block by block
///
/// With `paced` set, each block takes as long as it would on a live stream,
/// so the control task ticks in between.
fn render_noise(
    mut renderer: EqRenderer,
    sample_rate: f64,
    block_size: usize,
    total_samples: usize,
    paced: bool,
    seed: u64,
) -> RenderStats {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut left = vec![0.0_f32; block_size];
    let mut right = vec![0.0_f32; block_size];
    let block_duration = Duration::from_secs_f64(block_size as f64 / sample_rate);

    let mut stats = RenderStats {
        finite: true,
        ..Default::default()
    };
    let mut sum_squares = 0.0_f64;

    while stats.samples < total_samples {
        let n = block_size.min(total_samples - stats.samples);
        for (l, r) in left[..n].iter_mut().zip(right[..n].iter_mut()) {
            *l = rng.gen_range(-0.5..0.5);
            *r = rng.gen_range(-0.5..0.5);
        }

        renderer.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()], n);

        for &s in left[..n].iter().chain(right[..n].iter()) {
            stats.finite &= s.is_finite();
            stats.peak = stats.peak.max(s.abs());
            sum_squares += (s as f64) * (s as f64);
        }

        stats.blocks += 1;
        stats.samples += n;

        if paced {
            std::thread::sleep(block_duration);
        }
    }

    if stats.samples > 0 {
        stats.rms = (sum_squares / (2 * stats.samples) as f64).sqrt() as f32;
    }
    stats
}
