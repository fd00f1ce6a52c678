//! Spindle simulator - runs a mixer against simulated devices
//!
//! Wires three threads together the way a real host would:
//! 1. An input thread delivering a sine tone to channel 2 through the router
//! 2. The render loop pulling blocks from the mixer at the audio rate
//! 3. Control actions (track load, passthrough toggle) issued from main
//! 4. A diagnostics thread logging passthrough counter changes twice a
//!    second, since the audio threads only count
//!
//! Channel 1 plays an internal tone the whole time. Channel 2 switches to
//! passthrough for the middle third of the run, then back.
//!
//! ## Command line flags
//!
//! - `--config <path>`: config file (defaults to the platform config dir)
//! - `--seconds <n>`: run length (default 3)
//! - `--block <frames>`: render block size (default 256)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use spindle_core::audio::AudioInput;
use spindle_core::config::{default_config_path, load_config, SpindleConfig};
use spindle_core::engine::{
    command_channel, prepare_track, ChannelCommand, ChannelControl, InputRouter, Mixer,
    StatsSnapshot,
};
use spindle_core::{
    ChannelId, Sample, StereoBuffer, StereoSample, MAX_BUFFER_SIZE, NUM_CHANNELS, SAMPLE_RATE,
};

/// Passthrough channel (input index 1 feeds it)
const INPUT_CHANNEL: usize = 1;

struct Args {
    config: std::path::PathBuf,
    seconds: f32,
    block: usize,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: default_config_path(),
        seconds: 3.0,
        block: 256,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().with_context(|| format!("{} needs a value", arg));
        match arg.as_str() {
            "--config" => args.config = value()?.into(),
            "--seconds" => args.seconds = value()?.parse().context("--seconds")?,
            "--block" => args.block = value()?.parse().context("--block")?,
            other => bail!("unknown argument: {}", other),
        }
    }

    if args.block == 0 || args.block > MAX_BUFFER_SIZE {
        bail!("--block must be between 1 and {}", MAX_BUFFER_SIZE);
    }
    Ok(args)
}

/// Sine oscillator writing interleaved frames
struct Sine {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl Sine {
    fn new(freq: f32, amplitude: f32) -> Self {
        Self {
            phase: 0.0,
            step: freq / SAMPLE_RATE as f32,
            amplitude,
        }
    }

    fn next(&mut self) -> Sample {
        let value = (self.phase * std::f32::consts::TAU).sin() * self.amplitude;
        self.phase = (self.phase + self.step).fract();
        value
    }

    fn fill(&mut self, out: &mut [Sample], channels: usize) {
        for frame in out.chunks_exact_mut(channels) {
            frame.fill(self.next());
        }
    }
}

const DIAGNOSTICS_PERIOD: Duration = Duration::from_millis(500);

fn spawn_diagnostics(
    controls: Vec<ChannelControl>,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("spindle-diagnostics".to_string())
        .spawn(move || {
            let mut seen = vec![StatsSnapshot::default(); controls.len()];
            let mut poll = || {
                for (idx, (control, previous)) in controls.iter().zip(&mut seen).enumerate() {
                    control.log_diagnostics(ChannelId::new(idx), previous);
                }
            };
            while running.load(Ordering::Relaxed) {
                thread::sleep(DIAGNOSTICS_PERIOD);
                poll();
            }
            // Whatever happened after the last tick
            poll();
        })
        .context("Failed to spawn diagnostics thread")
}

fn block_duration(frames: usize) -> Duration {
    Duration::from_secs_f64(frames as f64 / SAMPLE_RATE as f64)
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    log::info!("spindle-sim starting up");

    let config: SpindleConfig = load_config(&args.config);

    rayon::ThreadPoolBuilder::new()
        .num_threads(NUM_CHANNELS)
        .thread_name(|i| format!("rayon-audio-{}", i))
        .build_global()
        .context("Failed to initialize Rayon thread pool")?;
    log::info!("Rayon thread pool initialized with {} threads", NUM_CHANNELS);

    let (mut mixer, inputs) = Mixer::new(&config);
    let controls = mixer.controls();
    let meters: Vec<_> = (0..mixer.num_channels())
        .filter_map(|idx| mixer.channel(idx).and_then(|c| c.meter()))
        .collect();
    let (mut commands, mut command_rx) = command_channel(config.mixer.command_queue_capacity);

    // Internal tone on channel 0, decoded up front like a real track load
    let track_frames = (args.seconds * SAMPLE_RATE as f32) as usize;
    let mut tone = Sine::new(220.0, 0.3);
    let track = StereoBuffer::from_vec(
        (0..track_frames)
            .map(|_| StereoSample::mono(tone.next()))
            .collect(),
    );
    let load = [
        ChannelCommand::LoadTrack {
            channel: 0,
            track: prepare_track(track),
        },
        ChannelCommand::Play { channel: 0 },
    ];
    for cmd in load {
        if let Err(cmd) = commands.send(cmd) {
            bail!("Command queue rejected {:?}", cmd);
        }
    }

    // Input thread
    let running = Arc::new(AtomicBool::new(true));
    let input = AudioInput::new(config.channel.input_kind, INPUT_CHANNEL as u8);
    let block = args.block;
    let input_thread = {
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("spindle-input".to_string())
            .spawn(move || {
                let mut router = InputRouter::new(inputs);
                if let Err(e) = router.connect(input) {
                    log::error!("Failed to connect {}: {}", input, e);
                    return;
                }

                let channels = input.channels();
                let mut sine = Sine::new(440.0, 0.5);
                let mut buffer = vec![0.0; block * channels];
                let period = block_duration(block);
                let mut next = Instant::now();

                while running.load(Ordering::Relaxed) {
                    sine.fill(&mut buffer, channels);
                    // Drops and rejections are counted for the diagnostics thread
                    let _ = router.receive_buffer(input, &buffer, block);
                    next += period;
                    thread::sleep(next.saturating_duration_since(Instant::now()));
                }

                if let Err(e) = router.disconnect(input) {
                    log::warn!("Failed to disconnect {}: {}", input, e);
                }
            })
            .context("Failed to spawn input thread")?
    };

    let diagnostics_thread = spawn_diagnostics(controls.clone(), Arc::clone(&running))?;

    // Render loop
    let total_blocks = (track_frames / block).max(1);
    let period = block_duration(block);
    let mut master = StereoBuffer::silence(block);
    let mut master_peak: f32 = 0.0;
    let mut next = Instant::now() + period * 2;

    for n in 0..total_blocks {
        if n == total_blocks / 3 {
            log::info!("Passthrough on for channel {}", INPUT_CHANNEL + 1);
            controls[INPUT_CHANNEL].set_desired_active(true);
        } else if n == 2 * total_blocks / 3 {
            log::info!("Passthrough off for channel {}", INPUT_CHANNEL + 1);
            controls[INPUT_CHANNEL].set_desired_active(false);
        }

        mixer.process_commands(&mut command_rx);
        mixer.process(&mut master);
        master_peak = master_peak.max(master.peak());

        next += period;
        thread::sleep(next.saturating_duration_since(Instant::now()));
    }

    running.store(false, Ordering::Relaxed);
    if input_thread.join().is_err() {
        bail!("Input thread panicked");
    }
    if diagnostics_thread.join().is_err() {
        bail!("Diagnostics thread panicked");
    }

    log::info!("Rendered {} blocks of {} frames, master peak {:.3}", total_blocks, block, master_peak);
    for (idx, control) in controls.iter().enumerate() {
        let stats = control.stats();
        log::info!(
            "[Channel{}] underflows={} overflowed={} truncated={} rejected={} buffered={}",
            idx + 1,
            stats.underflows(),
            stats.overflowed_samples(),
            stats.truncated_samples(),
            stats.rejected_buffers(),
            control.buffered_samples()
        );
    }
    for (idx, meter) in meters.iter().enumerate() {
        log::info!("[Channel{}] meter L={:.3} R={:.3}", idx + 1, meter.left(), meter.right());
    }

    Ok(())
}
