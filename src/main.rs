//! Mailscribe CLI
//!
//! Runs the extraction, condensation and reply pipeline from the terminal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mailscribe_lib::config::{self, AppConfig};
use mailscribe_lib::pipeline::condense::SalienceCondenser;
use mailscribe_lib::pipeline::processor::{ProcessingError, ReplyAssistant};

#[derive(Parser)]
#[command(name = "mailscribe")]
#[command(version, about = "Draft email replies grounded in PDF attachments", long_about = None)]
struct Cli {
    /// JSON config file (defaults to the per-user config file when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and condense a PDF, printing the result
    Extract {
        pdf: PathBuf,

        /// Print the condensed text instead of just the statistics
        #[arg(long)]
        show_text: bool,
    },

    /// Condense a plain text file
    Condense { file: PathBuf },

    /// Draft and style a reply to an email
    Reply {
        /// File holding the email text
        #[arg(short, long)]
        email: PathBuf,

        /// Optional PDF attachment used as context
        #[arg(short, long)]
        pdf: Option<PathBuf>,

        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot serialize output: {0}")]
    Output(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    mailscribe_lib::init_tracing();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Each layer's message already embeds its cause.
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .config
        .or_else(|| config::default_config_path().filter(|p| p.exists()));
    let config = AppConfig::load(config_path.as_deref())?;

    match cli.command {
        Commands::Extract { pdf, show_text } => {
            let assistant = ReplyAssistant::from_config(&config)?;
            let document = assistant.process_document(&read_bytes(&pdf)?)?;
            println!("source:          {:?}", document.source);
            println!("pages:           {}", document.page_count);
            println!("words:           {}", document.word_count);
            println!("strategy:        {:?}", document.condensed.strategy);
            println!("original length: {}", document.condensed.original_length);
            println!("condensed:       {}", document.condensed.content.chars().count());
            if show_text {
                println!("\n{}", document.condensed.content);
            }
        }
        Commands::Condense { file } => {
            let text = read_text(&file)?;
            let condensed = SalienceCondenser::new(&config.condense).condense(&text);
            println!("{}", serde_json::to_string_pretty(&condensed)?);
        }
        Commands::Reply { email, pdf, json } => {
            let assistant = ReplyAssistant::from_config(&config)?;
            let email_text = read_text(&email)?;
            let pdf_bytes = pdf.as_deref().map(read_bytes).transpose()?;
            let result = assistant.reply_with_document(&email_text, pdf_bytes.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("── Draft ──\n{}\n", result.reply.draft_reply);
                println!("── Final ──\n{}", result.reply.final_reply);
            }
        }
    }
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
