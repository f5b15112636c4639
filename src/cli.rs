use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chainrunner", version, about = "Run nested chains of shell commands locally or over SSH")]
#[command(group(ArgGroup::new("source").required(true).args(["file", "raw"])))]
pub struct Cli {
    /// Path to the chain document
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Chain document given inline instead of a file
    #[arg(long)]
    pub raw: Option<String>,

    /// Runner config (defaults to ./chainrunner.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the compiled chain without connecting or running anything
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}
