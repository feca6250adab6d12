//! Rapport CLI - replay and inspect recorded keypoint sessions
//!
//! Commands:
//! - score: Replay recorded frames through the live scoring path
//! - classify: Compute axis scores and the communication type
//! - config: Print the default configuration
//! - doctor: Check configuration and environment

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rapport::analyzer::FrameAnalyzer;
use rapport::export::SessionRecordEncoder;
use rapport::scoring::FinalResult;
use rapport::types::{CommunicationScores, RecordedFrame, SessionRecord, TextAxisScores};
use rapport::{RapportConfig, RapportError, PRODUCER_NAME, RAPPORT_VERSION};

/// Rapport - nonverbal signal scoring for live conversation sessions
#[derive(Parser)]
#[command(name = "rapport")]
#[command(version = RAPPORT_VERSION)]
#[command(about = "Score recorded keypoint sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded frames (NDJSON) through the scoring engine
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Emit one live score record per frame instead of the session record
        #[arg(long)]
        live: bool,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compute axis scores and the communication type
    Classify {
        /// Session record or detail scores JSON (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Assertiveness axis score from transcript analysis
        #[arg(long)]
        assertiveness: Option<f64>,

        /// Listening axis score from transcript analysis
        #[arg(long)]
        listening: Option<f64>,

        /// Nonverbal reading axis score from transcript analysis
        #[arg(long)]
        nonverbal_reading: Option<f64>,
    },

    /// Print the default configuration as JSON
    Config,

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| error.message.clone())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rapport=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), RapportCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            live,
            config,
        } => cmd_score(&input, &output, live, config.as_deref()),

        Commands::Classify {
            input,
            assertiveness,
            listening,
            nonverbal_reading,
        } => {
            let text = TextAxisScores {
                assertiveness: assertiveness.unwrap_or(TextAxisScores::NEUTRAL.assertiveness),
                listening: listening.unwrap_or(TextAxisScores::NEUTRAL.listening),
                nonverbal_reading: nonverbal_reading
                    .unwrap_or(TextAxisScores::NEUTRAL.nonverbal_reading),
            };
            cmd_classify(&input, text)
        }

        Commands::Config => {
            println!("{}", RapportConfig::default().to_json()?);
            Ok(())
        }

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_score(
    input: &Path,
    output: &Path,
    live: bool,
    config: Option<&Path>,
) -> Result<(), RapportCliError> {
    let config = match config {
        Some(path) => RapportConfig::from_file(path)?,
        None => RapportConfig::default(),
    };

    let input_data = read_input(input)?;
    let mut analyzer = FrameAnalyzer::new(&config);
    let encoder = SessionRecordEncoder::new();
    let mut live_lines: Vec<String> = Vec::new();
    let mut frames = 0usize;

    for (line_num, line) in input_data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let frame: RecordedFrame = serde_json::from_str(line).map_err(|e| {
            RapportCliError::ParseError(format!("Line {}: {}", line_num + 1, e))
        })?;
        let timestamp = frame.timestamp.unwrap_or_else(Utc::now);
        let scores = analyzer
            .process_frame(timestamp, &frame.keypoints, frame.expressions)
            .map_err(|e| RapportCliError::ParseError(format!("Line {}: {}", line_num + 1, e)))?;
        frames += 1;

        if live {
            live_lines.push(serde_json::to_string(&LiveRecord {
                frame: frames,
                timestamp: timestamp.to_rfc3339(),
                scores,
            })?);
        }
    }

    if frames == 0 {
        return Err(RapportCliError::NoFrames);
    }
    debug!(frames, "replay finished");

    let output_data = if live {
        let mut data = live_lines.join("\n");
        data.push('\n');
        data
    } else {
        encoder.encode_to_json(analyzer.timeline(), analyzer.engine(), None, None)?
    };

    write_output(output, &output_data)?;
    info!(frames, session_id = %encoder.session_id(), "scored recording");
    Ok(())
}

fn cmd_classify(input: &Path, text: TextAxisScores) -> Result<(), RapportCliError> {
    let input_data = read_input(input)?;
    let value: serde_json::Value = serde_json::from_str(&input_data)?;

    // Accept either a full session record or bare detail scores
    let scores: CommunicationScores = if value.get("sessionId").is_some() {
        serde_json::from_value::<SessionRecord>(value)?.scores
    } else {
        serde_json::from_value(value)?
    };

    let result = FinalResult::new(scores, text);
    let report = ClassifyReport {
        code: result.communication_type.code(),
        labels: result.communication_type.labels().to_vec(),
        result,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), RapportCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "rapport_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Rapport version {}", RAPPORT_VERSION),
    });

    match config {
        Some(path) if path.exists() => match RapportConfig::from_file(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration valid ({} fps, live window {}, silence {} ms)",
                    config.capture.frames_per_second,
                    config.scoring.live_window,
                    config.conversation.silence_timeout_ms
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        Some(_) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist, defaults apply".to_string(),
        }),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass --input <file> to score a recording)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: RAPPORT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Rapport Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(RapportCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_input(input: &Path) -> Result<String, RapportCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), RapportCliError> {
    if output.to_string_lossy() == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()?;
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum RapportCliError {
    Io(io::Error),
    Engine(RapportError),
    Json(serde_json::Error),
    NoFrames,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for RapportCliError {
    fn from(e: io::Error) -> Self {
        RapportCliError::Io(e)
    }
}

impl From<RapportError> for RapportCliError {
    fn from(e: RapportError) -> Self {
        RapportCliError::Engine(e)
    }
}

impl From<serde_json::Error> for RapportCliError {
    fn from(e: serde_json::Error) -> Self {
        RapportCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<RapportCliError> for CliError {
    fn from(e: RapportCliError) -> Self {
        match e {
            RapportCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            RapportCliError::Engine(RapportError::Config(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'rapport config' for a valid starting point".to_string()),
            },
            RapportCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            RapportCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            RapportCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Input must contain one JSON frame per line".to_string()),
            },
            RapportCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            RapportCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Frames must be ordered by timestamp and match the keypoint frame format"
                        .to_string(),
                ),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct LiveRecord {
    frame: usize,
    timestamp: String,
    scores: CommunicationScores,
}

#[derive(serde::Serialize)]
struct ClassifyReport {
    code: String,
    labels: Vec<&'static str>,
    #[serde(flatten)]
    result: FinalResult,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
