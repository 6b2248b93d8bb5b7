//! MySynth - audio passthrough latency probe
//!
//! Reads blocks from the capture device, writes each one straight back to the
//! playback device and prints how long every read and write took.

use anyhow::{bail, Context, Result};
use mysynth::audio::engine::{self, CpalDuplex};
use mysynth::audio::noise::{self, NoiseGenerator};
use mysynth::audio::passthrough::{ConsoleReport, IterationTiming, TimingReport};
use mysynth::audio::virtual_device::VirtualDuplex;
use mysynth::config::AppConfig;
use mysynth::{DuplexStream, Passthrough, TimingStore};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the command line asked for
#[derive(Debug, Clone, PartialEq)]
enum Action {
    Passthrough(Options),
    Noise(Options),
    List,
    Version,
    Help,
}

/// Settings from the command line; `None` keeps the config file value
#[derive(Debug, Clone, Default, PartialEq)]
struct Options {
    input: Option<String>,
    output: Option<String>,
    sample_rate: Option<u32>,
    channels: Option<u16>,
    block_frames: Option<usize>,
    iterations: Option<u64>,
    amplitude: Option<f32>,
    virtual_device: bool,
    config_path: Option<PathBuf>,
}

impl Options {
    /// Config file values overridden by the command line
    fn resolve(&self) -> AppConfig {
        let mut config = match &self.config_path {
            Some(path) => AppConfig::load_from(path),
            None => AppConfig::load(),
        };
        if let Some(input) = &self.input {
            config.input_device = Some(input.clone());
        }
        if let Some(output) = &self.output {
            config.output_device = Some(output.clone());
        }
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(frames) = self.block_frames {
            config.block_frames = frames;
        }
        config
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, what: &str) -> Result<T> {
    let raw = args
        .get(i + 1)
        .with_context(|| format!("{} requires a value", args[i]))?;
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}: {}", what, raw))
}

fn parse_args(args: &[String]) -> Result<Action> {
    let mut options = Options::default();
    let mut noise = false;
    let mut i = 1;

    if args.get(1).map(String::as_str) == Some("noise") {
        noise = true;
        i = 2;
    }

    while i < args.len() {
        match args[i].as_str() {
            "--list" | "-l" => return Ok(Action::List),
            "--version" | "-v" => return Ok(Action::Version),
            "--help" | "-h" => return Ok(Action::Help),
            "--input" | "-i" => options.input = Some(parse_value(args, i, "input device")?),
            "--output" | "-o" => options.output = Some(parse_value(args, i, "output device")?),
            "--sample-rate" | "-r" => {
                options.sample_rate = Some(parse_value(args, i, "sample rate")?)
            }
            "--channels" | "-c" => options.channels = Some(parse_value(args, i, "channel count")?),
            "--block" | "-b" => options.block_frames = Some(parse_value(args, i, "block size")?),
            "--iterations" | "-n" => {
                options.iterations = Some(parse_value(args, i, "iteration count")?)
            }
            "--amplitude" | "-a" => options.amplitude = Some(parse_value(args, i, "amplitude")?),
            "--config" => options.config_path = Some(parse_value(args, i, "config path")?),
            "--virtual" => {
                options.virtual_device = true;
                i += 1;
                continue;
            }
            arg => bail!("Unknown argument: {}", arg),
        }
        // Every remaining option takes one value
        i += 2;
    }

    Ok(if noise {
        Action::Noise(options)
    } else {
        Action::Passthrough(options)
    })
}

fn print_help() {
    println!("Usage: mysynth [OPTIONS]");
    println!("       mysynth noise [OPTIONS]");
    println!();
    println!("Without a command, passes audio from input to output and prints");
    println!("the time spent in every read and write.");
    println!();
    println!("Options:");
    println!("  -l, --list               List available audio devices");
    println!("  -i, --input NAME         Capture device (default: host default)");
    println!("  -o, --output NAME        Playback device (default: host default)");
    println!("  -r, --sample-rate RATE   Sample rate in Hz (default: 44100)");
    println!("  -c, --channels N         Channel count (default: 2)");
    println!("  -b, --block FRAMES       Frames per block (default: 1024)");
    println!("  -n, --iterations N       Stop after N blocks (default: run until Ctrl+C)");
    println!("  -a, --amplitude A        Noise amplitude 0.0-1.0 (noise only, default: 0.5)");
    println!("      --virtual            Use the virtual loopback device");
    println!("      --config PATH        Config file (default: {})", AppConfig::path().display());
    println!("  -v, --version            Show version");
    println!("  -h, --help               Show this help");
    println!();
    println!("Examples:");
    println!("  mysynth -i \"USB Audio\" -o \"bcm2835 Headphones\"");
    println!("  mysynth --virtual -n 20");
    println!("  mysynth noise -a 0.2");
}

fn list_devices() -> Result<()> {
    let devices = engine::list_devices().context("Failed to enumerate audio devices")?;
    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    println!();
    for (i, device) in devices.iter().enumerate() {
        let mut markers = String::new();
        if device.is_default_input {
            markers.push_str(" [DEFAULT IN]");
        }
        if device.is_default_output {
            markers.push_str(" [DEFAULT OUT]");
        }
        println!("  {}. {}{}", i + 1, device.name, markers);
        println!(
            "     Channels: {} in, {} out",
            device.input_channels, device.output_channels
        );
        if !device.sample_rates.is_empty() {
            println!("     Sample rates: {:?}", device.sample_rates);
        }
        println!();
    }
    Ok(())
}

/// Prints every cycle and keeps running statistics
struct CliReport {
    console: ConsoleReport<io::Stdout>,
    store: TimingStore,
}

impl TimingReport for CliReport {
    fn report(&mut self, timing: &IterationTiming) -> io::Result<()> {
        self.store.record(timing);
        self.console.report(timing)
    }
}

fn install_stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
    stop
}

fn run_passthrough(options: &Options) -> Result<()> {
    let config = options.resolve();
    let params = config.stream_params()?;

    let mut stream: Box<dyn DuplexStream> = if options.virtual_device {
        info!("Using virtual loopback device");
        Box::new(VirtualDuplex::new(params).paced(true))
    } else {
        let duplex = CpalDuplex::open(params, &config.selection())
            .context("Failed to open duplex stream")?;
        info!(
            "Duplex stream open: in={} out={}",
            duplex.input_name(),
            duplex.output_name()
        );
        Box::new(duplex)
    };

    let mut passthrough = Passthrough::new().with_stop_flag(install_stop_flag());
    if let Some(count) = options.iterations {
        passthrough = passthrough.with_max_iterations(count);
    }

    let mut report = CliReport {
        console: ConsoleReport::stdout(),
        store: TimingStore::new(),
    };
    let result = passthrough.run(&mut stream, &mut report);

    // Release the devices before printing the summary
    drop(stream);
    eprintln!("{}", report.store.summary());

    match result {
        Ok(summary) => {
            info!(
                iterations = summary.iterations,
                bytes = summary.bytes,
                "Done"
            );
            Ok(())
        }
        Err(e) => {
            error!("Passthrough failed: {}", e);
            Err(e.into())
        }
    }
}

fn run_noise(options: &Options) -> Result<()> {
    if options.virtual_device {
        bail!("--virtual is only available for passthrough");
    }
    let config = options.resolve();
    let params = config.stream_params()?;

    let mut generator = NoiseGenerator::default();
    if let Some(amplitude) = options.amplitude {
        generator.set_amplitude(amplitude);
    }

    let mut playback = engine::open_playback(params, config.output_device.as_deref())
        .context("Failed to open playback stream")?;
    let stop = install_stop_flag();
    let blocks = noise::play_noise(&mut playback, &mut generator, options.iterations, Some(&stop))?;
    eprintln!("Blocks written: {}  Underruns: {}", blocks, playback.underruns());
    Ok(())
}

fn main() -> Result<()> {
    // Timing lines own stdout; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mysynth=info".parse()?)
                .add_directive("mysynth_core=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    match parse_args(&args)? {
        Action::List => list_devices(),
        Action::Version => {
            println!("mysynth {} ({})", mysynth::VERSION, mysynth::BUILD_DATE);
            Ok(())
        }
        Action::Help => {
            print_help();
            Ok(())
        }
        Action::Passthrough(options) => run_passthrough(&options),
        Action::Noise(options) => run_noise(&options),
    }
}
