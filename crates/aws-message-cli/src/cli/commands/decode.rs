//! `aws-message decode` - Print the payload of one envelope.

use anyhow::{Context, Result};
use aws_message::{Disposition, EnvelopeDecoder};
use serde_json::{json, Value};

use super::{exit_code_for, load_config, read_envelope};
use crate::cli::args::DecodeArgs;
use crate::exit_codes;

pub async fn cmd_decode(args: DecodeArgs) -> i32 {
    match run_decode(&args).await {
        Ok(output) => {
            println!("{output}");
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    }
}

async fn run_decode(args: &DecodeArgs) -> Result<String> {
    let envelope = read_envelope(&args.envelope)?;
    let mut config = load_config(&args.config)?;
    if args.no_verify {
        config = config.with_validate_signature(false);
    }

    let decoder = EnvelopeDecoder::from_config(&config)?;
    let disposition = decoder.classify(envelope).await?;

    serde_json::to_string_pretty(&render(&disposition)).context("failed to render payload")
}

/// JSON view of a disposition: the payload itself for deliveries, a tagged
/// summary otherwise.
fn render(disposition: &Disposition) -> Value {
    match disposition {
        Disposition::Deliver(payload) => payload.to_json(),
        Disposition::Subscription(request) => json!({
            "subscription": request,
        }),
        Disposition::Unsubscribed { topic_arn } => json!({
            "unsubscribed": { "topic_arn": topic_arn },
        }),
        Disposition::TopicMismatch { expected, actual } => json!({
            "topic_mismatch": { "expected": expected, "actual": actual },
        }),
    }
}
