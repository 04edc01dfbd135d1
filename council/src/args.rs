use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Council of stock experts
#[derive(Debug, Parser)]
#[command(name = "council", about = "Ask a panel of LLM-backed stock experts")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "council.toml", env = "COUNCIL_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a meeting on a topic and print its events as JSON lines
    Ask(AskArgs),
    /// Check which `OpenAI` bindings ignore the system role
    Probe,
    /// Send a minimal request through one binding
    Check {
        /// Binding id from `[llm.providers]`
        provider: String,
    },
    /// Delete a topic's transcript and memory
    Forget {
        topic: String,
    },
    /// List the effective expert panel
    Agents,
}

#[derive(Debug, clap::Args)]
pub struct AskArgs {
    /// Topic id, usually the stock code
    pub topic: String,

    /// The question; `@id` or `@name` addresses agents directly
    pub query: String,

    /// JSON file holding the stock snapshot
    #[arg(long, conflicts_with_all = ["symbol", "name", "price", "change"])]
    pub stock_file: Option<PathBuf>,

    /// Stock symbol; defaults to the topic
    #[arg(long)]
    pub symbol: Option<String>,

    /// Stock display name
    #[arg(long)]
    pub name: Option<String>,

    /// Last price
    #[arg(long)]
    pub price: Option<f64>,

    /// Change in percent
    #[arg(long, allow_hyphen_values = true)]
    pub change: Option<f64>,

    /// Shares held
    #[arg(long, requires = "cost")]
    pub shares: Option<u64>,

    /// Average cost per share
    #[arg(long)]
    pub cost: Option<f64>,

    /// Additional agent ids to address
    #[arg(long = "mention", value_name = "AGENT")]
    pub mentions: Vec<String>,

    /// Id of the message being replied to
    #[arg(long)]
    pub reply_to: Option<String>,

    /// Quoted content of the message being replied to
    #[arg(long)]
    pub reply_content: Option<String>,
}
