use std::path::PathBuf;

use clap::{Parser, Subcommand};
use speechbridge_core::config::{Config, PITCH_RANGE, RATE_RANGE};
use speechbridge_core::types::VoiceGender;
use speechbridge_pipeline::worker::WorkerPaths;

mod commands;
mod logging;
mod services;

#[derive(Parser)]
#[command(
    name = "speechbridge",
    about = "Speech recognition, translation and synthesis from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file
    Transcribe {
        file: PathBuf,

        /// Speech locale (default: pipeline.source_language)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate text into one or more languages
    Translate {
        text: String,

        /// Target language codes (default: pipeline.target_languages)
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,

        /// Source language (auto-detected when omitted)
        #[arg(long)]
        from: Option<String>,
    },

    /// Synthesize speech to a WAV file
    Synthesize {
        text: String,

        /// Language code or locale of the text
        #[arg(short, long)]
        language: String,

        /// Voice gender: female or male
        #[arg(long)]
        gender: Option<VoiceGender>,

        /// Speaking rate in percent
        #[arg(
            long,
            allow_hyphen_values = true,
            value_parser = percent(*RATE_RANGE.start(), *RATE_RANGE.end())
        )]
        rate: Option<i32>,

        /// Pitch in percent
        #[arg(
            long,
            allow_hyphen_values = true,
            value_parser = percent(*PITCH_RANGE.start(), *PITCH_RANGE.end())
        )]
        pitch: Option<i32>,

        /// Output path (default: <output>/audio/tts_<timestamp>_<lang>.wav)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Transcribe, translate and synthesize one recording
    Run {
        audio: PathBuf,

        #[arg(short, long)]
        language: Option<String>,

        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,
    },

    /// Batch jobs over directories and CSV files
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },

    /// Download a video's audio and run the pipeline on it
    Youtube {
        url: String,

        #[arg(short, long)]
        language: Option<String>,

        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,

        /// Keep the downloaded WAV
        #[arg(long)]
        keep: bool,
    },

    /// Live recognition worker
    Worker {
        #[command(subcommand)]
        action: WorkerAction,
    },

    /// Start the dashboard server
    Serve {
        /// Port to listen on (default: 8501)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 127.0.0.1)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Diagnose credentials and external tools
    Doctor,

    /// List supported languages and voices
    Languages,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BatchAction {
    /// Transcribe every audio file in a directory into a CSV
    Transcribe {
        dir: PathBuf,

        /// Output CSV (default: <output>/transcripts/transcripts.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip ffmpeg conversion of non-WAV files
        #[arg(long)]
        no_convert: bool,
    },
    /// Translate a transcript CSV
    Translate {
        csv: PathBuf,

        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,
    },
}

#[derive(Subcommand)]
enum WorkerAction {
    /// Run the worker in the foreground
    Run {
        #[arg(short, long)]
        language: Option<String>,

        /// Append logs to live_recognition.log instead of stderr
        #[arg(long)]
        log_to_file: bool,
    },
    /// Start the worker in the background
    Start {
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Stop the background worker
    Stop,
    /// Show worker status
    Status,
    /// Print live transcripts
    Transcripts {
        /// Clear the list after printing
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
}

fn percent(min: i32, max: i32) -> clap::builder::RangedI64ValueParser<i32> {
    clap::value_parser!(i32).range(min as i64..=max as i64)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Credentials usually live in .env next to the recordings
    let dotenv = dotenvy::dotenv();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;

    let log_file = match &cli.command {
        Commands::Worker {
            action: WorkerAction::Run {
                log_to_file: true, ..
            },
        } => Some(WorkerPaths::new(config.worker_state_dir()).log_file()),
        _ => None,
    };
    logging::init(
        &config.logging.clone().unwrap_or_default(),
        cli.verbose,
        log_file.as_deref(),
    )?;
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let explicit_config = cli.config.as_deref();
    match cli.command {
        Commands::Transcribe { file, language } => {
            commands::transcribe(&config, &file, language).await?;
        }
        Commands::Translate { text, to, from } => {
            commands::translate(&config, &text, to, from).await?;
        }
        Commands::Synthesize {
            text,
            language,
            gender,
            rate,
            pitch,
            out,
        } => {
            commands::synthesize(&config, &text, &language, gender, rate, pitch, out).await?;
        }
        Commands::Run {
            audio,
            language,
            to,
        } => {
            commands::run(&config, &audio, language, to).await?;
        }
        Commands::Batch { action } => match action {
            BatchAction::Transcribe {
                dir,
                out,
                no_convert,
            } => commands::batch_transcribe(&config, &dir, out, !no_convert).await?,
            BatchAction::Translate { csv, to } => {
                commands::batch_translate(&config, &csv, to).await?
            }
        },
        Commands::Youtube {
            url,
            language,
            to,
            keep,
        } => {
            commands::youtube_pipeline(&config, &url, language, to, keep).await?;
        }
        Commands::Worker { action } => match action {
            WorkerAction::Run { language, .. } => commands::worker_run(&config, language).await?,
            WorkerAction::Start { language } => {
                commands::worker_start(&config, explicit_config, language).await?
            }
            WorkerAction::Stop => commands::worker_stop(&config).await?,
            WorkerAction::Status => commands::worker_status(&config).await?,
            WorkerAction::Transcripts { clear } => {
                commands::worker_transcripts(&config, clear).await?
            }
        },
        Commands::Serve { port, bind } => {
            commands::serve(config, explicit_config, port, bind).await?;
        }
        Commands::Doctor => commands::doctor(&config, &config_path).await?,
        Commands::Languages => commands::list_languages(),
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config.redacted())?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Set { key, value } => {
                let value = commands::parse_config_value(&value);
                Config::set_path_in_file(&config_path, &key, value)?;
                println!("Set {key} in {}", config_path.display());
            }
        },
    }

    Ok(())
}
