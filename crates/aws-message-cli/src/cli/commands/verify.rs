//! `aws-message verify` - Authenticate one envelope.

use anyhow::Result;
use aws_message::{message_id_of, EnvelopeDecoder};

use super::{exit_code_for, load_config, read_envelope};
use crate::cli::args::VerifyArgs;
use crate::exit_codes;

pub async fn cmd_verify(args: VerifyArgs) -> i32 {
    match run_verify(&args).await {
        Ok(message_id) => {
            if !args.quiet {
                println!("Verification successful!");
                println!();
                println!("  message_id: {message_id}");
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            if !args.quiet {
                eprintln!("error: {e:#}");
            }
            exit_code_for(&e)
        }
    }
}

async fn run_verify(args: &VerifyArgs) -> Result<String> {
    let envelope = read_envelope(&args.envelope)?;
    let config = load_config(&args.config)?.with_validate_signature(true);
    let decoder = EnvelopeDecoder::from_config(&config)?;

    decoder.verify(&envelope).await?;
    Ok(message_id_of(&envelope).unwrap_or("<unknown>").to_string())
}
