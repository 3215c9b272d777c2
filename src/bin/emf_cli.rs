use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use emf_probe::autobalance::{
    AutobalanceController, AutobalanceEvent, AutobalancePhase, MemoryStore, PhaseOutcome,
    SensorSample,
};
use emf_probe::config::AppConfig;
use emf_probe::measurement::MeasurementEngine;
use emf_probe::protocol::{
    DeviceCommand, LineMode, ProtocolVariant, RawMeasurement, TargetEmf, UnitStatus,
};
use rand::Rng;
use serde::Serialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[command(name = "emf_cli", about = "Diagnostic harness for the EMF probe protocol and calibration")]
struct Cli {
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VariantArg {
    Serial,
    Ble,
}

impl From<VariantArg> for ProtocolVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Serial => ProtocolVariant::Serial,
            VariantArg::Ble => ProtocolVariant::Ble,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PhaseArg {
    Compass,
    Horizontal,
    Vertical,
}

impl From<PhaseArg> for AutobalancePhase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Compass => AutobalancePhase::Compass,
            PhaseArg::Horizontal => AutobalancePhase::Horizontal,
            PhaseArg::Vertical => AutobalancePhase::Vertical,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode a command and print the frame as hex
    Encode {
        /// start, stop, frequency, gain, calibrate, status, autobalance,
        /// version, line, target, unit
        command: String,
        /// Command arguments (e.g. `frequency 22600`, `unit U7 READY`)
        args: Vec<String>,
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },
    /// Decode a hex device response and print it as JSON
    Decode {
        hex: String,
        #[arg(long, value_enum)]
        variant: Option<VariantArg>,
    },
    /// Run one raw measurement through the calibration pipeline
    Reading {
        #[arg(long)]
        signal: f64,
        #[arg(long)]
        frequency: f64,
        #[arg(long)]
        temperature: f64,
        #[arg(long, default_value_t = 0.0)]
        phase: f64,
    },
    /// Simulate one autobalance phase with noisy samples around a fixed offset
    Autobalance {
        #[arg(long, value_enum, default_value_t = PhaseArg::Horizontal)]
        phase: PhaseArg,
        #[arg(long, default_value_t = 40)]
        points: usize,
        #[arg(long, default_value_t = 0.05)]
        noise: f64,
        #[arg(long, default_value_t = 0.3)]
        offset: f64,
    },
}

#[derive(Serialize)]
struct SimulationReport {
    outcome: String,
    events: Vec<AutobalanceEvent>,
    state: emf_probe::AutobalanceState,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    let variant_or_config =
        |arg: Option<VariantArg>| arg.map(ProtocolVariant::from).unwrap_or(config.protocol.variant);

    match cli.command {
        Commands::Encode {
            command,
            args,
            variant,
        } => run_encode(variant_or_config(variant), &command, &args),
        Commands::Decode { hex, variant } => run_decode(variant_or_config(variant), &hex),
        Commands::Reading {
            signal,
            frequency,
            temperature,
            phase,
        } => run_reading(
            &config,
            RawMeasurement {
                frequency,
                magnitude: signal,
                phase,
                temperature,
            },
        ),
        Commands::Autobalance {
            phase,
            points,
            noise,
            offset,
        } => run_autobalance(&config, phase.into(), points, noise, offset),
    }
}

fn run_encode(variant: ProtocolVariant, command: &str, args: &[String]) -> Result<()> {
    let command = parse_command(command, args)?;
    let frame = variant
        .encode_command(&command)
        .with_context(|| format!("encoding {:?} for {}", command, variant))?;
    println!("{}", to_hex(&frame));
    Ok(())
}

fn run_decode(variant: ProtocolVariant, hex: &str) -> Result<()> {
    let frame = from_hex(hex)?;
    let response = variant
        .decode_response(&frame)
        .with_context(|| format!("decoding {} frame", variant))?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_reading(config: &AppConfig, raw: RawMeasurement) -> Result<()> {
    let engine = MeasurementEngine::from_config(&config.measurement);
    match engine.process_now(&raw) {
        Ok(reading) => println!("{}", serde_json::to_string_pretty(&reading)?),
        Err(err) => bail!("measurement rejected: {}", err),
    }
    Ok(())
}

fn run_autobalance(
    config: &AppConfig,
    phase: AutobalancePhase,
    points: usize,
    noise: f64,
    offset: f64,
) -> Result<()> {
    let noise = validate_noise(noise)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(async move {
        let controller =
            AutobalanceController::new(Arc::new(MemoryStore::new()), &config.autobalance);
        let events = BroadcastStream::new(controller.subscribe());

        controller.start(phase).context("starting phase")?;

        let mut rng = rand::thread_rng();
        let mut outcome = None;
        for i in 0..points {
            let jitter = |rng: &mut rand::rngs::ThreadRng| rng.gen_range(-noise..=noise);
            let sample = SensorSample::new(
                offset + jitter(&mut rng),
                -offset + jitter(&mut rng),
                9.81 + offset + jitter(&mut rng),
                i as u64 * 20,
            );
            let finished = controller.ingest(&sample)?;
            if let Some(first) = finished.into_iter().next() {
                outcome = Some(first);
                break;
            }
        }

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => controller.finish(phase).context("finishing phase")?,
        };

        let state = controller.state()?;
        // the stream ends once every sender is gone
        drop(controller);
        let events: Vec<AutobalanceEvent> = tokio::time::timeout(
            Duration::from_secs(1),
            events.filter_map(|event| event.ok()).collect(),
        )
        .await
        .context("draining autobalance events")?;

        let report = SimulationReport {
            outcome: describe_outcome(&outcome),
            events,
            state,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok::<(), anyhow::Error>(())
    })
}

fn validate_noise(noise: f64) -> Result<f64> {
    if !noise.is_finite() || noise < 0.0 {
        bail!("--noise must be a finite, non-negative amplitude, got {}", noise);
    }
    Ok(noise)
}

fn describe_outcome(outcome: &PhaseOutcome) -> String {
    match outcome {
        PhaseOutcome::Finished { phase, collected } => {
            format!("{} finished with {} points", phase.display_name(), collected)
        }
        PhaseOutcome::Abandoned {
            phase,
            collected,
            required,
        } => format!(
            "{} abandoned: {} of {} required points",
            phase.display_name(),
            collected,
            required
        ),
    }
}

fn parse_command(name: &str, args: &[String]) -> Result<DeviceCommand> {
    let arg = |index: usize| -> Result<&str> {
        args.get(index)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("`{}` needs argument {}", name, index + 1))
    };
    let flag = |index: usize| -> Result<bool> {
        match arg(index)? {
            "on" | "1" | "true" => Ok(true),
            "off" | "0" | "false" => Ok(false),
            other => bail!("expected on/off, got {}", other),
        }
    };

    let command = match name {
        "start" => DeviceCommand::StartMeasurement,
        "stop" => DeviceCommand::StopMeasurement,
        "status" => DeviceCommand::GetStatus,
        "version" => DeviceCommand::GetVersion,
        "frequency" => DeviceCommand::SetFrequency {
            hz: arg(0)?.parse().context("frequency in Hz")?,
        },
        "gain" => DeviceCommand::SetGain {
            gain: arg(0)?.parse().context("gain")?,
        },
        "calibrate" => DeviceCommand::Calibrate {
            enable: if args.is_empty() { true } else { flag(0)? },
        },
        "autobalance" => DeviceCommand::Autobalance { enable: flag(0)? },
        "line" => DeviceCommand::LineMode(LineMode {
            length: arg(0)?.parse().context("line length")?,
            points: arg(1)?.parse().context("point count")?,
        }),
        "target" => DeviceCommand::TarEmf(TargetEmf {
            depth: arg(0)?.parse().context("target depth")?,
            signal: arg(1)?.parse().context("target signal")?,
        }),
        "unit" => DeviceCommand::UtEmf(UnitStatus::new(arg(0)?, arg(1)?)),
        other => bail!("unknown command `{}`", other),
    };
    Ok(command)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn from_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("hex string has an odd number of digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte `{}`", &digits[i..i + 2]))
        })
        .collect()
}
