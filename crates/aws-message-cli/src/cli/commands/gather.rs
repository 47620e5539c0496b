//! `aws-message gather` - Run gather cycles over a directory queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use aws_message::{
    DirectoryQueue, GatherReport, Gatherer, InnerPayload, MessageProcessor, ProcessorError,
};
use tracing::info;

use super::{exit_code_for, load_config};
use crate::cli::args::GatherArgs;
use crate::exit_codes;

/// Logs every payload it receives.
struct LoggingProcessor;

#[async_trait]
impl MessageProcessor for LoggingProcessor {
    async fn process(&self, payload: InnerPayload) -> Result<(), ProcessorError> {
        info!(event = "payload", payload = %payload.to_json());
        Ok(())
    }
}

pub async fn cmd_gather(args: GatherArgs) -> i32 {
    match run_gather(&args).await {
        Ok(totals) => {
            eprintln!(
                "gathered {} messages: {} processed, {} subscriptions, {} retained",
                totals.fetched,
                totals.processed,
                totals.subscriptions.len(),
                totals.retained
            );
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    }
}

async fn run_gather(args: &GatherArgs) -> Result<GatherReport> {
    let mut config = load_config(&args.config)?;
    if args.no_verify {
        config = config.with_validate_signature(false);
    }
    if config.queue.is_none() {
        config = config.with_queue(args.dir.display().to_string());
    }

    let queue = Arc::new(DirectoryQueue::new(&args.dir));
    let gatherer = Gatherer::from_config(&config, queue, Arc::new(LoggingProcessor))?;

    let mut totals = GatherReport::default();
    let mut cycle = 0_u64;
    loop {
        let report = gatherer.gather_events().await?;
        accumulate(&mut totals, report);
        cycle += 1;

        if args.cycles.is_some_and(|limit| cycle >= limit) {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping after cycle {}", cycle);
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(args.interval)) => {}
        }
    }

    Ok(totals)
}

fn accumulate(totals: &mut GatherReport, report: GatherReport) {
    totals.fetched += report.fetched;
    totals.processed += report.processed;
    totals.subscriptions.extend(report.subscriptions);
    totals.soft_rejected += report.soft_rejected;
    totals.retained += report.retained;
    totals.discarded += report.discarded;
}
