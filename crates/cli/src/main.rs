use clap::{Parser, Subcommand};
use habit_core::{
    constants::DEFAULT_MIN_HABIT_BLOCK_LINES, AnalysisRequest, CoreConfig, PatientId,
    PromptBuilder, ResponseExtractor, ResponseFormat,
};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "habit")]
#[command(about = "Behavioral analysis service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the analysis prompt for the given fields
    Prompt {
        /// Current behavior to analyze
        #[arg(long)]
        behavior: String,
        /// Context in which the behavior occurs
        #[arg(long)]
        antecedent: String,
        /// Immediate consequences of the behavior
        #[arg(long)]
        consequence: String,
        /// Previous attempts to change the behavior
        #[arg(long)]
        previous_attempts: String,
        /// Response format version (v1 or v2)
        #[arg(long, default_value = "v1")]
        format: ResponseFormat,
    },
    /// Extract a structured analysis from a model reply
    Extract {
        /// File holding the reply (stdin if omitted)
        file: Option<PathBuf>,
        /// Response format version (v1 or v2)
        #[arg(long, default_value = "v1")]
        format: ResponseFormat,
        /// Minimum non-empty lines for a habit block to be kept
        #[arg(long, default_value_t = DEFAULT_MIN_HABIT_BLOCK_LINES)]
        min_block_lines: usize,
    },
    /// Validate the server environment and print a redacted summary
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Prompt {
            behavior,
            antecedent,
            consequence,
            previous_attempts,
            format,
        }) => {
            let request = AnalysisRequest {
                patient_id: PatientId::parse("cli")?,
                behavior,
                antecedent,
                consequence,
                previous_attempts,
            };
            println!("{}", PromptBuilder::new(format).render(&request));
        }
        Some(Commands::Extract {
            file,
            format,
            min_block_lines,
        }) => {
            let raw = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let analysis = ResponseExtractor::new(format, min_block_lines.max(1)).extract(&raw);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Some(Commands::CheckConfig) => {
            dotenvy::dotenv().ok();
            match CoreConfig::from_env() {
                Ok(cfg) => {
                    println!("Configuration OK");
                    for (key, value) in cfg.summary() {
                        println!("  {key} = {value}");
                    }
                }
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("Use 'habit --help' for commands");
        }
    }

    Ok(())
}
