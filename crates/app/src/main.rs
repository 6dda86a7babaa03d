use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use speech_sync_core::{
    ChannelLayout, MemorySink, PauseAnalyzer, PauseDetector, PhonemeProvider, PlaybackClock,
    SpeechAnimator, SpeedProfile, SyncConfig, TimelineScheduler, VisemeResolver,
};
use tracing_subscriber::EnvFilter;

fn main() -> speech_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { input } => run_analyze(&config, &input),
        Commands::Schedule {
            text,
            speed,
            no_anticipation,
        } => run_schedule(&config, &text, speed.into(), no_anticipation),
        Commands::Simulate {
            text,
            speed,
            audio,
            fps,
        } => run_simulate(config, &text, speed.into(), audio.as_deref(), fps),
    }
}

fn load_config(path: Option<&Path>) -> speech_sync_core::Result<SyncConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            SyncConfig::load(path)
        }
        None => Ok(SyncConfig::default()),
    }
}

fn run_analyze(config: &SyncConfig, input: &Path) -> speech_sync_core::Result<()> {
    tracing::info!(?input, "analysing audio for pauses");

    let bytes = std::fs::read(input)?;
    let analyzer = PauseAnalyzer::wav(PauseDetector::new(config.pause));
    let timeline = analyzer.analyze_bytes(&bytes)?;

    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}

fn run_schedule(
    config: &SyncConfig,
    text: &str,
    speed: SpeedProfile,
    no_anticipation: bool,
) -> speech_sync_core::Result<()> {
    let mut provider = PhonemeProvider::from_config(&config.phonetics)?;
    let phonemes = provider.phonemes(text);

    let mut anticipation = config.anticipation;
    if no_anticipation {
        anticipation.enabled = false;
    }

    let scheduler = TimelineScheduler::new(config.timeline);
    let timeline = scheduler.schedule(&phonemes, config.timeline.speeds.speed_ms(speed), anticipation);

    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}

fn run_simulate(
    config: SyncConfig,
    text: &str,
    speed: SpeedProfile,
    audio: Option<&Path>,
    fps: u32,
) -> speech_sync_core::Result<()> {
    let provider = PhonemeProvider::from_config(&config.phonetics)?;
    let mut animator = SpeechAnimator::new(
        config,
        ChannelLayout::demo(),
        Box::new(VisemeResolver::new()),
        provider,
        MemorySink::new(),
    )?;

    let clock = PlaybackClock::start();
    let raw_audio = audio.map(std::fs::read).transpose()?;
    let pause_sync = animator.set_audio_source(Box::new(clock.clone()), raw_audio.as_deref());

    let duration_ms = animator.speak(text, speed);
    tracing::info!(duration_ms, pause_sync, "simulation started");

    let frame_seconds = 1.0 / f64::from(fps.max(1));
    let mut frames = 0_u64;
    let mut pauses_applied = 0_u64;

    while animator.is_animating() {
        clock.advance(frame_seconds);
        animator.tick(frame_seconds);
        frames += 1;

        let state = animator.tracking_state();
        if state.applications > pauses_applied {
            pauses_applied = state.applications;
            tracing::info!(
                pause = ?state.last_applied_pause_id,
                position = clock.position(),
                "pause applied"
            );
        }
    }

    let final_pose: Vec<_> = animator
        .sink()
        .values()
        .iter()
        .map(|(channel, weight)| serde_json::json!({ "channel": channel.to_string(), "weight": weight }))
        .collect();

    let summary = serde_json::json!({
        "estimated_duration_ms": duration_ms,
        "frames": frames,
        "simulated_ms": frames as f64 * frame_seconds * 1000.0,
        "pause_sync": pause_sync,
        "pauses_applied": pauses_applied,
        "channel_writes": animator.sink().total_writes(),
        "final_pose": final_pose,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Speech timing and pause sync for facial animation", long_about = None)]
struct Cli {
    /// JSON configuration file. Defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect pauses in a WAV file and print them as JSON.
    Analyze {
        /// Path to the WAV file to analyse.
        input: PathBuf,
    },
    /// Print the pose event timeline for a piece of text.
    Schedule {
        text: String,
        #[arg(short, long, value_enum, default_value_t = Speed::Normal)]
        speed: Speed,
        /// Disable co-articulation blending.
        #[arg(long)]
        no_anticipation: bool,
    },
    /// Run the animator headless against a simulated playback clock.
    Simulate {
        text: String,
        #[arg(short, long, value_enum, default_value_t = Speed::Normal)]
        speed: Speed,
        /// WAV file whose pauses drive the pause sync.
        #[arg(short, long)]
        audio: Option<PathBuf>,
        /// Simulated frame rate.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Speed {
    Slow,
    Normal,
    Fast,
}

impl From<Speed> for SpeedProfile {
    fn from(value: Speed) -> Self {
        match value {
            Speed::Slow => SpeedProfile::Slow,
            Speed::Normal => SpeedProfile::Normal,
            Speed::Fast => SpeedProfile::Fast,
        }
    }
}
