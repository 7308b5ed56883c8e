use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "promptgate", version, about = "Prompt firewall for LLM-bound traffic")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "promptgate.yaml")]
    pub config: PathBuf,

    /// Path to the pattern file (overrides config file setting)
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Path to a policy file (repeatable; overrides config file setting)
    #[arg(long = "policy-file")]
    pub policy_files: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a single prompt and print the result as JSON
    Validate {
        /// The prompt text; reads stdin when omitted
        #[arg(long)]
        prompt: Option<String>,

        /// Policy to evaluate against
        #[arg(long)]
        policy: Option<String>,

        /// User identifier recorded in the decision log
        #[arg(long)]
        user: Option<String>,
    },

    /// Validate a JSONL file of requests and print one result per line
    Batch {
        /// File with one JSON-encoded request per line
        #[arg(long)]
        file: PathBuf,
    },

    /// Load patterns and policies, then print summary counts
    Check,
}
