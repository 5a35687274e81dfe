use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cfrm",
    about = "Convergent fact-record merge: order-independent merging of publish/retract operations",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge an operation batch and print the canonical document
    Merge(MergeArgs),
    /// Flatten nested JSON documents into operations
    Flatten(FlattenArgs),
    /// Mint operation ids
    Mint(MintArgs),
    /// Check fixture cases over permuted and split deliveries
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct MergeArgs {
    /// JSON array of operations, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: String,
}

#[derive(Args)]
pub struct FlattenArgs {
    /// JSON object (or array of objects), or `-` for stdin
    #[arg(default_value = "-")]
    pub input: String,
}

#[derive(Args)]
pub struct MintArgs {
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Fixture file of `{case, operations, result}` records
    pub fixtures: PathBuf,
    /// Seed for sampled permutations of large cases
    #[arg(long)]
    pub seed: Option<u64>,
}
