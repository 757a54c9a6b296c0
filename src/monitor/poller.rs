use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::engine::MonitorEngine;

/// Ingestion task: sweeps new blocks on a fixed cadence and buffers the
/// transactions that touch a watched address.
pub(crate) async fn run_poller(engine: Arc<MonitorEngine>, cancel: CancellationToken, start: u64) {
    // Blocks at or below the cursor have been swept.
    let mut cursor = start;
    loop {
        tokio::select! {
            _ = sleep(engine.settings().poll_interval) => {}
            _ = cancel.cancelled() => break,
        }
        cursor = poll_once(&engine, &cancel, cursor).await;
    }
    debug!(cursor, "ingestion poller stopped");
}

/// One poll tick. Returns the new cursor; on any fetch failure the cursor
/// stays put so the failed block is retried next tick, keeping the sweep
/// gapless and in block order.
pub(crate) async fn poll_once(
    engine: &MonitorEngine,
    cancel: &CancellationToken,
    cursor: u64,
) -> u64 {
    // Nothing watched means nothing to look for. The tick makes zero chain
    // calls; polling resumes as soon as an address is added.
    if engine.watchlist().is_empty() {
        return cursor;
    }

    let height = match engine.chain().get_height().await {
        Ok(height) => height,
        Err(error) => {
            warn!(%error, "failed to read chain height, retrying next tick");
            return cursor;
        }
    };
    if height <= cursor {
        return cursor;
    }

    let mut swept = cursor;
    let mut buffered = 0usize;
    for number in (cursor + 1)..=height {
        if cancel.is_cancelled() {
            break;
        }
        match engine.chain().get_block_with_txs(number).await {
            Ok(Some(block)) => {
                for mut tx in block.transactions {
                    if !engine.watchlist().is_relevant(&tx.from, tx.to.as_ref()) {
                        continue;
                    }
                    tx.block_number = block.number;
                    tx.block_timestamp = block.timestamp;
                    buffered += 1;
                    if engine.buffer_push(tx) >= engine.settings().transaction_buffer_size {
                        engine.drain_buffer_into_queue();
                    }
                }
                swept = number;
            }
            Ok(None) => {
                debug!(block = number, "block not available yet");
                break;
            }
            Err(error) => {
                warn!(block = number, %error, "block fetch failed, will retry");
                break;
            }
        }
    }

    if buffered > 0 {
        debug!(
            from = cursor + 1,
            to = swept,
            buffered,
            "relevant transactions queued for analysis"
        );
        engine.drain_buffer_into_queue();
    }
    swept
}

/// Analysis task: drains the queue in bounded batches on its own cadence.
pub(crate) async fn run_drainer(engine: Arc<MonitorEngine>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = sleep(engine.settings().analysis_interval) => {}
            _ = cancel.cancelled() => break,
        }
        // Cancellation is only observed between batches, so an in-flight
        // batch always finishes scoring.
        drain_once(&engine).await;
    }
    debug!("analysis drainer stopped");
}

pub(crate) async fn drain_once(engine: &MonitorEngine) {
    let batch = engine.next_batch();
    if batch.is_empty() {
        return;
    }
    debug!(batch = batch.len(), "scoring batch");
    for tx in &batch {
        engine.score_transaction(tx).await;
    }
}
