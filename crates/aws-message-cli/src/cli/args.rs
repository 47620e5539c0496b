use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aws-message",
    version,
    about = "Verify, decode and gather SNS notifications delivered through SQS"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Authenticate one envelope
    Verify(VerifyArgs),
    /// Print the decoded payload of one envelope as JSON
    Decode(DecodeArgs),
    /// Run gather cycles against a directory of message files
    Gather(GatherArgs),
}

/// Settings shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Configuration file (YAML); AWS_MESSAGE_* variables override it
    #[arg(long, env = "AWS_MESSAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// PEM CA bundle for certificate fetches
    #[arg(long)]
    pub trust_bundle: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Envelope file (JSON)
    pub envelope: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Quiet mode - only exit code, no output
    #[arg(long, short)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Envelope file (JSON)
    pub envelope: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Skip signature verification (local fixtures only)
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Args, Debug)]
pub struct GatherArgs {
    /// Directory holding `message*` files
    #[arg(long)]
    pub dir: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    /// Stop after this many cycles (default: until Ctrl-C)
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Pause between cycles in seconds
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Skip signature verification (local fixtures only)
    #[arg(long)]
    pub no_verify: bool,
}
