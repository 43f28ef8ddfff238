//! Backing event processor: poll, fetch, screen, trust, mark processed.
//!
//! One cycle runs to completion before the next starts; nothing is spawned,
//! so the cursor, the processed set and the signing key need no locking.

use alloy::primitives::Address;
use backing_core::{unique_in_order, BlockRange, EventId, TrustReceipt};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dedup::EventDeduplicator;
use crate::error::LedgerError;
use crate::ledger::BackingSource;
use crate::screening::Screener;
use crate::submitter::TrustGranter;

/// Where the processor is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between cycles
    Idle,
    /// Querying events for the block range
    Fetching,
    /// Waiting on the screening service
    Screening,
    /// Waiting on the trust transaction
    Submitting,
}

/// What a single cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Chain head has not moved past the cursor.
    Idle,
    /// Range scanned; nothing that was not already processed.
    NoNewEvents {
        /// Rows returned by the query
        fetched: usize,
    },
    /// Every candidate was flagged; nothing submitted.
    AllFlagged {
        /// Distinct flagged backers
        flagged: usize,
        /// Events marked processed anyway
        retired: usize,
    },
    /// Screening failed in fail-closed mode; events left for a later cycle.
    ScreeningFailed {
        /// Events left unprocessed
        deferred: usize,
    },
    /// Trust batch confirmed; every new event marked processed.
    Trusted {
        /// Receipt of the trust transaction
        receipt: TrustReceipt,
        /// Addresses in the batch
        trusted: usize,
        /// Events marked processed
        retired: usize,
    },
    /// Trust batch not confirmed; events left unprocessed.
    SubmissionFailed {
        /// Events left unprocessed
        deferred: usize,
    },
}

/// Tunables of the processing loop.
#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    /// Sleep between cycles
    pub poll_interval: Duration,
    /// Earliest block ever scanned
    pub deployment_block: u64,
    /// Blocks behind the head scanned on startup
    pub backfill_blocks: u64,
    /// Mark events processed when every candidate was flagged
    pub retire_when_all_flagged: bool,
}

impl ProcessorOptions {
    /// Options from the sync and processing sections of the config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.sync.poll_interval(),
            deployment_block: config.sync.deployment_block,
            backfill_blocks: config.sync.backfill_blocks,
            retire_when_all_flagged: config.processing.retire_when_all_flagged,
        }
    }

    /// Cursor a fresh process starts from: `max(deployment_block, head - backfill)`.
    pub fn initial_cursor(&self, head: u64) -> u64 {
        self.deployment_block
            .max(head.saturating_sub(self.backfill_blocks))
    }
}

/// Drives the poll → fetch → screen → trust → mark-processed cycle.
pub struct BackingEventProcessor<L, S, T> {
    source: L,
    screener: S,
    granter: T,
    options: ProcessorOptions,
    processed: EventDeduplicator,
    cursor: u64,
    phase: Phase,
}

impl<L, S, T> BackingEventProcessor<L, S, T>
where
    L: BackingSource,
    S: Screener,
    T: TrustGranter,
{
    /// Create a processor starting right after `cursor`.
    pub fn new(source: L, screener: S, granter: T, options: ProcessorOptions, cursor: u64) -> Self {
        Self {
            source,
            screener,
            granter,
            options,
            processed: EventDeduplicator::new(),
            cursor,
            phase: Phase::Idle,
        }
    }

    /// Create a processor whose cursor is derived from the current chain head.
    pub async fn start(
        source: L,
        screener: S,
        granter: T,
        options: ProcessorOptions,
    ) -> Result<Self, LedgerError> {
        let head = source.current_block_height().await?;
        let cursor = options.initial_cursor(head);
        info!(
            "Starting event processor from block {} (head {})",
            cursor, head
        );
        Ok(Self::new(source, screener, granter, options, cursor))
    }

    /// Last fully scanned block.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Events acted upon so far.
    pub fn processed(&self) -> &EventDeduplicator {
        &self.processed
    }

    /// Run cycles forever, sleeping the poll interval after each.
    ///
    /// A failed cycle is logged and the loop continues.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(
            "Event processor running (poll interval {:?}, cursor {})",
            self.options.poll_interval, self.cursor
        );

        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Idle) => {
                    debug!("No new blocks past {}", self.cursor);
                }
                Ok(outcome) => {
                    debug!("Cycle finished at block {}: {:?}", self.cursor, outcome);
                }
                Err(e) => {
                    warn!("Error in event processing loop: {}", e);
                }
            }
            self.phase = Phase::Idle;

            tokio::time::sleep(self.options.poll_interval).await;
        }
    }

    /// Run a single cycle.
    ///
    /// Fails only when the chain head cannot be read, in which case the
    /// cursor is left unchanged. Once the head is known the cursor advances
    /// to it whatever happens to the events.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, LedgerError> {
        let head = self.source.current_block_height().await?;

        let Some(range) = BlockRange::after(self.cursor, head) else {
            return Ok(CycleOutcome::Idle);
        };

        info!("Processing blocks {} to {}", range.from(), range.to());
        let outcome = self.process_range(range).await;

        self.cursor = head;
        self.phase = Phase::Idle;

        Ok(outcome)
    }

    async fn process_range(&mut self, range: BlockRange) -> CycleOutcome {
        self.phase = Phase::Fetching;
        let events = self.source.fetch_backing_events(range).await;
        let fetched = events.len();

        let mut seen = HashSet::new();
        let fresh: Vec<_> = events
            .iter()
            .filter(|e| self.processed.is_new(e.event_id()) && seen.insert(e.event_id().clone()))
            .collect();

        if fresh.is_empty() {
            info!("No new backing events found ({} fetched)", fetched);
            return CycleOutcome::NoNewEvents { fetched };
        }

        info!("Found {} new backing events", fresh.len());
        for event in &fresh {
            debug!(
                "Backing event {} in block {}: backer={} instance={}",
                event.event_id(),
                event.block_number(),
                event.backer(),
                event.instance()
            );
        }

        let event_ids: Vec<EventId> = fresh.iter().map(|e| e.event_id().clone()).collect();
        let candidates = unique_in_order(fresh.iter().map(|e| e.backer()));

        self.phase = Phase::Screening;
        let flagged = match self.screener.classify(&candidates).await {
            Ok(flagged) => flagged,
            Err(e) => {
                warn!(
                    "Screening failed, deferring {} events: {}",
                    event_ids.len(),
                    e
                );
                return CycleOutcome::ScreeningFailed {
                    deferred: event_ids.len(),
                };
            }
        };

        let valid: Vec<Address> = candidates
            .iter()
            .copied()
            .filter(|a| !flagged.contains(a))
            .collect();
        let flagged_count = candidates.len() - valid.len();

        if flagged_count > 0 {
            info!("Filtered out {} flagged addresses", flagged_count);
        }

        if valid.is_empty() {
            info!("No valid backers to trust after screening");
            let retired = if self.options.retire_when_all_flagged {
                self.retire(event_ids)
            } else {
                0
            };
            return CycleOutcome::AllFlagged {
                flagged: flagged_count,
                retired,
            };
        }

        info!("Trusting {} addresses...", valid.len());
        self.phase = Phase::Submitting;
        match self.granter.trust_batch(&valid).await {
            Ok(receipt) => {
                info!(
                    "Successfully trusted {} addresses in block {}",
                    valid.len(),
                    receipt.block_number
                );
                let retired = self.retire(event_ids);
                CycleOutcome::Trusted {
                    receipt,
                    trusted: valid.len(),
                    retired,
                }
            }
            Err(e) => {
                warn!("Error executing trust batch: {}", e);
                CycleOutcome::SubmissionFailed {
                    deferred: event_ids.len(),
                }
            }
        }
    }

    fn retire(&mut self, event_ids: Vec<EventId>) -> usize {
        event_ids
            .into_iter()
            .filter(|id| self.processed.mark_processed(id.clone()))
            .count()
    }
}
