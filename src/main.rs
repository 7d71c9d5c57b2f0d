use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use rag_search::commands::{
    ask_question, ingest_directory, search_documents, show_config, show_stats, summarize_file,
};
use rag_search::config::Config;
use rag_search::database::ConnectionPool;

#[derive(Parser)]
#[command(name = "rag-search")]
#[command(about = "Retrieval-augmented question answering over a directory of markdown files")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest all markdown files under a directory into the vector store
    Ingest {
        /// Directory to scan recursively for .md files
        directory: PathBuf,
    },
    /// Answer a question using the ingested documents
    Ask {
        question: String,
        /// Number of chunks to retrieve as context
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// List the chunks most similar to a query
    Search {
        query: String,
        /// Number of results
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
    /// Show collection statistics
    Stats,
    /// Summarize a file with the language model
    Summarize { file: PathBuf },
    /// Show the configuration file location
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_file = cli.config.as_deref();
    let config = Config::load(config_file)?;
    let mut pool = ConnectionPool::new();

    match cli.command {
        Commands::Ingest { directory } => {
            ingest_directory(&config, &mut pool, &directory).await?;
        }
        Commands::Ask { question, limit } => {
            ask_question(&config, &mut pool, &question, limit).await?;
        }
        Commands::Search { query, limit } => {
            search_documents(&config, &mut pool, &query, limit).await?;
        }
        Commands::Stats => {
            show_stats(&config, &mut pool).await?;
        }
        Commands::Summarize { file } => {
            summarize_file(&config, &file).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config, config_file)?;
            } else {
                match config_file.map(PathBuf::from).or_else(Config::default_config_file) {
                    Some(path) => println!("Config file: {}", path.display()),
                    None => println!("No configuration directory available on this platform"),
                }
                println!("Run with --show to print the effective configuration");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_requires_directory() {
        let cli = Cli::try_parse_from(["rag-search", "ingest"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn ingest_command_with_directory() {
        let cli = Cli::try_parse_from(["rag-search", "ingest", "./docs"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { directory } = parsed.command {
                assert_eq!(directory, PathBuf::from("./docs"));
            } else {
                panic!("expected ingest command");
            }
        }
    }

    #[test]
    fn ask_command_with_limit() {
        let cli = Cli::try_parse_from(["rag-search", "ask", "What is RAG?", "--limit", "5"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question, limit } = parsed.command {
                assert_eq!(question, "What is RAG?");
                assert_eq!(limit, Some(5));
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn search_command_defaults_limit() {
        let cli = Cli::try_parse_from(["rag-search", "search", "hello"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Search { query, limit } = parsed.command {
                assert_eq!(query, "hello");
                assert_eq!(limit, None);
            } else {
                panic!("expected search command");
            }
        }
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::try_parse_from(["rag-search", "stats", "--config", "custom.toml"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config, Some(PathBuf::from("custom.toml")));
            assert!(matches!(parsed.command, Commands::Stats));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-search", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["rag-search", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["rag-search", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
