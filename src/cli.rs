use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::StrategyKind;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate one localization table (.csv, .po, .pot)
    Translate {
        /// Input table file
        #[arg(short, long)]
        input: PathBuf,

        /// Source language code
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Target language codes (comma-separated)
        #[arg(short, long, default_value = "zh_cn")]
        targets: String,

        /// Output file, defaults to writing back into the input file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// How rows are packed into each request
        #[arg(long)]
        strategy: Option<StrategyArg>,

        /// Stop the job at the first failed language
        #[arg(long)]
        abort_on_failure: bool,

        /// Model to activate before translating
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Translate every table under a directory
    Batch {
        /// Input directory containing localization tables
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Source language code
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Target language codes (comma-separated)
        #[arg(short, long, default_value = "zh_cn")]
        targets: String,

        /// Output directory mirroring the input layout, defaults to in place
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// How rows are packed into each request
        #[arg(long)]
        strategy: Option<StrategyArg>,

        /// Model to activate before translating
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List installed models, marking the loaded ones
    Models,

    /// Make a model the single resident model and remember it
    Use {
        /// Model name as listed by `models`
        model: String,
    },

    /// Print the system prompt for a language selection
    Prompt {
        /// Source language code
        #[arg(short, long, default_value = "en")]
        source: String,

        /// Target language codes (comma-separated)
        #[arg(short, long, default_value = "zh_cn")]
        targets: String,
    },

    /// List the built-in language catalog
    Languages,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Structured,
    Plain,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Structured => StrategyKind::Structured,
            StrategyArg::Plain => StrategyKind::PlainText,
        }
    }
}

/// Split a comma-separated language list, dropping blanks.
pub fn parse_language_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_translate() {
        let args = Args::parse_from([
            "locaflow", "translate", "-i", "strings.csv", "-t", "zh_cn, ja", "--strategy", "plain",
        ]);
        match args.command {
            Commands::Translate { input, source, targets, strategy, abort_on_failure, .. } => {
                assert_eq!(input, PathBuf::from("strings.csv"));
                assert_eq!(source, "en");
                assert_eq!(parse_language_list(&targets), vec!["zh_cn", "ja"]);
                assert!(matches!(strategy, Some(StrategyArg::Plain)));
                assert!(!abort_on_failure);
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_parse_language_list_skips_blanks() {
        assert_eq!(parse_language_list("ja,,ko ,"), vec!["ja", "ko"]);
        assert!(parse_language_list("").is_empty());
    }
}
