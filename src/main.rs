use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use pdf_translator_rust::{Command, Config, Overrides};

#[derive(Parser, Debug)]
#[command(
    name = "pdf-translator-rust",
    version,
    about = "Translate PDF documents while keeping their layout"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,

    /// Read extra settings from a local TOML file
    #[arg(long = "settings", global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Extract, translate and rebuild a PDF
    Translate {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Also write the extracted blocks to this JSON file
        #[arg(long = "temp-json")]
        temp_json: Option<PathBuf>,

        /// Also write the translated blocks to this JSON file
        #[arg(long = "temp-translated-json")]
        temp_translated_json: Option<PathBuf>,

        /// Write per-page layout overlays into this directory
        #[arg(long = "debug-layout")]
        debug_layout: Option<PathBuf>,

        #[command(flatten)]
        translation: TranslationArgs,
    },
    /// Extract text blocks into a JSON snapshot
    Extract {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Translate a JSON snapshot (blocks already translated are kept)
    TranslateJson {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        #[command(flatten)]
        translation: TranslationArgs,
    },
    /// Rebuild a PDF from a translated snapshot and the original file
    Build {
        #[arg(short = 'j', long = "json")]
        json: PathBuf,

        #[arg(long = "original")]
        original: PathBuf,

        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Report blocks of a snapshot that lack a translation
    Validate {
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct TranslationArgs {
    /// Source language code (default from settings)
    #[arg(long = "source-lang")]
    source_lang: Option<String>,

    /// Target language code (default from settings)
    #[arg(long = "target-lang")]
    target_lang: Option<String>,

    /// Translation engine: libretranslate or openai
    #[arg(long = "engine")]
    engine: Option<String>,

    /// Number of blocks sent per engine request
    #[arg(long = "batch-size")]
    batch_size: Option<usize>,
}

impl From<TranslationArgs> for Overrides {
    fn from(args: TranslationArgs) -> Self {
        Overrides {
            source_lang: args.source_lang,
            target_lang: args.target_lang,
            engine: args.engine,
            batch_size: args.batch_size,
        }
    }
}

fn split_command(command: CliCommand) -> (Command, Overrides) {
    match command {
        CliCommand::Translate {
            input,
            output,
            temp_json,
            temp_translated_json,
            debug_layout,
            translation,
        } => (
            Command::Translate {
                input,
                output,
                temp_json,
                temp_translated_json,
                debug_layout,
            },
            translation.into(),
        ),
        CliCommand::Extract { input, output } => {
            (Command::Extract { input, output }, Overrides::default())
        }
        CliCommand::TranslateJson {
            input,
            output,
            translation,
        } => (Command::TranslateJson { input, output }, translation.into()),
        CliCommand::Build {
            json,
            original,
            output,
        } => (
            Command::Build {
                json,
                original,
                output,
            },
            Overrides::default(),
        ),
        CliCommand::Validate { input } => (Command::Validate { input }, Overrides::default()),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    pdf_translator_rust::logging::init(cli.verbose)?;

    let (command, overrides) = split_command(cli.command);
    let report = pdf_translator_rust::run(Config {
        command,
        settings_path: cli.settings,
        overrides,
    })
    .await?;

    println!("{}", report);
    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
