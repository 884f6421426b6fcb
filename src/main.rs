use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ziggy_voice::ai::detect_backend;
use ziggy_voice::audio::{AudioPlayback, AudioSource, CpalSource, FrameStream, SourceRecorder};
use ziggy_voice::commands::CommandRouter;
use ziggy_voice::resources::{MemoryProbe, ProfileKind, ResourceManager, SystemProbe};
use ziggy_voice::session::{Collaborators, SessionSettings, resolve_resources, retry_device};
use ziggy_voice::speech::{
    EspeakTts, InterruptibleSpeaker, SpeechRecognizer, TextToSpeech, TranscriptWakeWord,
    WakeWordDetector, WhisperRecognizer,
};
use ziggy_voice::{Config, Error, Session, SessionState};

/// Delay between attempts to open an audio device
const DEVICE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Ziggy - local voice assistant
#[derive(Parser)]
#[command(name = "ziggy", version, about)]
struct Cli {
    /// Wake word to listen for
    #[arg(short, long, env = "ZIGGY_WAKE_WORD")]
    wake_word: Option<String>,

    /// Resource profile (minimal, standard, performance or an alias)
    #[arg(short, long, env = "ZIGGY_PROFILE")]
    profile: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Show resource profiles and the detected memory
    Profiles,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ziggy_voice=info",
        1 => "info,ziggy_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(wake_word) = cli.wake_word {
        config.wake_word = wake_word.trim().to_lowercase();
    }
    if cli.profile.is_some() {
        config.profile = cli.profile;
    }

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => blocking(move || test_mic(duration)).await,
            Command::TestSpeaker => blocking(test_speaker).await,
            Command::TestTts { text } => blocking(move || test_tts(&config, &text)).await,
            Command::Profiles => blocking(show_profiles).await,
        };
    }

    tracing::info!(
        wake_word = %config.wake_word,
        profile = ?config.profile,
        "starting ziggy"
    );

    let session = tokio::task::spawn_blocking(move || build_session(&config)).await??;
    let shutdown = session.shutdown_handle();
    let speaker = session.speaker();

    let mut handle = tokio::task::spawn_blocking(move || {
        let mut session = session;
        session.run()
    });

    tokio::select! {
        result = &mut handle => return Ok(result??),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            shutdown.store(true, Ordering::Release);
            speaker.stop();
        }
    }

    // Second Ctrl-C abandons the blocking session thread; the runtime would
    // otherwise wait for it on drop
    tokio::select! {
        result = handle => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("forced exit");
            std::process::exit(130);
        }
    }

    Ok(())
}

/// Run blocking audio work off the async runtime
async fn blocking<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Wire up the concrete collaborators
fn build_session(config: &Config) -> ziggy_voice::Result<Session> {
    let resources = resolve_resources(config.profile.as_deref(), &SystemProbe);

    let backend = detect_backend(&config.ai.backend_settings())?.ok_or_else(|| {
        Error::Config(format!(
            "no AI backend detected; start Msty ({}) or Ollama ({})",
            config.ai.msty_url, config.ai.ollama_url
        ))
    })?;

    let retries = config.audio.device_retries;
    let source: Arc<dyn AudioSource> =
        Arc::new(retry_device(retries, DEVICE_RETRY_DELAY, CpalSource::new)?);
    let playback = retry_device(retries, DEVICE_RETRY_DELAY, AudioPlayback::new)?;

    let tts: Arc<dyn TextToSpeech> = Arc::new(EspeakTts::new(
        config.tts.binary.as_str(),
        config.tts.voice.as_str(),
        config.tts.speed,
        playback,
    )?);
    let recognizer: Arc<dyn SpeechRecognizer> = Arc::new(WhisperRecognizer::new(
        config.stt.url.as_str(),
        config.stt.model.as_str(),
        config.ai.timeout,
    )?);
    let detector: Arc<dyn WakeWordDetector> = Arc::new(TranscriptWakeWord::new(
        vec![config.wake_word.clone()],
        Arc::clone(&recognizer),
    ));
    let speaker = Arc::new(InterruptibleSpeaker::new(
        tts,
        Arc::clone(&detector),
        Arc::clone(&source),
    ));

    let shutdown = Arc::new(AtomicBool::new(false));
    let collaborators = Collaborators {
        recorder: Arc::new(SourceRecorder::new(source).with_cancel(Arc::clone(&shutdown))),
        recognizer,
        detector,
        speaker,
        backend,
    };

    let mut settings = SessionSettings::from_config(config);
    settings.retry_delay = DEVICE_RETRY_DELAY;

    Ok(Session::new(
        SessionState::new(resources),
        CommandRouter::with_default_handlers(),
        collaborators,
        settings,
    )
    .with_shutdown_handle(shutdown))
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let source = CpalSource::new()?;
    let sample_rate = source.sample_rate();
    let mut stream = source.open()?;
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        let samples = stream.read_frame(sample_rate as usize)?;
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(stream);

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl list sources short");
    println!("  3. Try: pavucontrol (to check input levels)");

    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let never = std::sync::atomic::AtomicBool::new(false);
    playback.play(&samples, sample_rate, &never)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Speak text through the configured TTS engine
fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!(
        "Speaking with {} (voice {}, {} wpm)...",
        config.tts.binary, config.tts.voice, config.tts.speed
    );

    let playback = AudioPlayback::new()?;
    let tts = EspeakTts::new(
        config.tts.binary.as_str(),
        config.tts.voice.as_str(),
        config.tts.speed,
        playback,
    )?;
    tts.speak(text)?;

    println!("Done.");
    Ok(())
}

/// Print every profile with the detected memory
#[allow(clippy::unnecessary_wraps)]
fn show_profiles() -> anyhow::Result<()> {
    let available = SystemProbe.detect_available_memory_mb();
    let selected = ProfileKind::for_memory_mb(available);
    let manager = ResourceManager::new(selected, available);

    #[allow(clippy::cast_precision_loss)]
    let gb = available as f64 / 1024.0;
    println!("Detected memory: {available} MB ({gb:.1} GB)");
    println!("Auto-selected profile: {selected}\n");

    for kind in ProfileKind::ALL {
        let profile = kind.profile();
        let marker = if kind == selected { " *" } else { "" };
        println!("{}{marker} - {}", profile.name, profile.description);
        println!("    requirements:   {}", profile.requirements);
        println!("    context tokens: {}", profile.context_tokens);
        println!("    history limit:  {} exchanges", profile.history_limit);
        println!("    reply tokens:   {}", profile.response_tokens);
        println!(
            "    recording:      {}s command, {}s conversational",
            profile.recording_command_secs, profile.recording_conversational_secs
        );
    }

    println!("\n{}", manager.profile_info());
    Ok(())
}
