//! # Transfer Worker Pool
//!
//! A fixed number of workers drain a shared queue of [`TransferItem`]s. Each
//! item goes through
//!
//! ```text
//! resolve destination folder → fetch → (convert) → write
//! ```
//!
//! and produces exactly one [`TransferRecord`], whatever happens to it:
//! success, failure, a panic inside the pipeline, or a cancel signal before
//! the item was dispatched.

use crate::convert::{select_converter, ContentConverter};
use crate::error::{Result, TransferError};
use crate::folder_cache::FolderResolver;
use crate::item::{ItemLifecycle, ItemState, TransferItem};
use crate::retry::RetryPolicy;
use crate::stats::{StatsAggregator, TransferRecord};
use bridge_traits::storage::{NodeKind, RemoteStore};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_async::sync::{CancellationToken, Mutex};
use core_async::task::JoinSet;
use core_runtime::events::{EventBus, TransferEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Everything a worker needs, shared by all workers of a run
pub struct WorkerContext {
    pub source: Arc<dyn RemoteStore>,
    pub destination: Arc<dyn RemoteStore>,
    /// Destination folder the source root maps to
    pub destination_root: String,
    pub resolver: Arc<FolderResolver>,
    pub stats: Arc<StatsAggregator>,
    pub retry: RetryPolicy,
    pub converters: Vec<Arc<dyn ContentConverter>>,
    pub events: Option<EventBus>,
    pub clock: Arc<dyn Clock>,
}

impl WorkerContext {
    fn emit(&self, event: TransferEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(event);
        }
    }
}

/// What the pool did with the items it was given
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Items a worker picked up
    pub dispatched: usize,
    /// Items left in the queue when the cancel signal was observed
    pub not_dispatched: usize,
}

struct Delivered {
    destination_path: String,
    destination_id: String,
    bytes: u64,
}

pub struct TransferWorkerPool {
    ctx: Arc<WorkerContext>,
    workers: usize,
}

impl TransferWorkerPool {
    pub fn new(ctx: WorkerContext, workers: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            workers: workers.max(1),
        }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Transfers every item, returning once all of them have a record
    ///
    /// After `cancel` fires no new item is dispatched; items already in flight
    /// finish their current attempt. Undispatched items are recorded as failed.
    pub async fn run(&self, items: Vec<TransferItem>, cancel: CancellationToken) -> PoolSummary {
        let total = items.len();
        let queue = Arc::new(Mutex::new(VecDeque::from(items)));
        let mut workers = JoinSet::new();

        for worker_id in 0..self.workers.min(total) {
            let ctx = self.ctx.clone();
            let queue = queue.clone();
            let cancel = cancel.clone();
            workers.spawn(worker_loop(worker_id, ctx, queue, cancel));
        }

        let mut dispatched = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => dispatched += count,
                Err(e) => error!(error = %e, "Transfer worker aborted"),
            }
        }

        let remaining: Vec<TransferItem> = queue.lock().await.drain(..).collect();
        let not_dispatched = remaining.len();
        if not_dispatched > 0 {
            warn!(pending = not_dispatched, "Recording undispatched items as cancelled");
            for item in remaining {
                let now = self.ctx.clock.now();
                let reason = TransferError::Cancelled.record_message();
                self.ctx
                    .stats
                    .record_failure(TransferRecord::failure(&item, reason, 0, now, now))
                    .await;
            }
            self.ctx.emit(TransferEvent::Cancelled {
                pending: not_dispatched,
            });
        }

        PoolSummary {
            dispatched,
            not_dispatched,
        }
    }
}

/// Pops items until the queue is empty or the run is cancelled
async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    queue: Arc<Mutex<VecDeque<TransferItem>>>,
    cancel: CancellationToken,
) -> usize {
    let mut processed = 0;

    loop {
        if cancel.is_cancelled() {
            debug!(worker = worker_id, "Cancel observed, worker stopping");
            break;
        }
        let Some(item) = queue.lock().await.pop_front() else {
            break;
        };
        processed += 1;

        // The pipeline runs in its own task so a panic still yields a record.
        let started_at = ctx.clock.now();
        let task = core_async::spawn(process_item(
            worker_id,
            ctx.clone(),
            item.clone(),
            cancel.clone(),
        ));
        if let Err(e) = task.await {
            error!(worker = worker_id, item = %item.source_path(), error = %e, "Item pipeline panicked");
            let reason = format!("permanent: pipeline aborted: {}", e);
            ctx.stats
                .record_failure(TransferRecord::failure(
                    &item,
                    reason.clone(),
                    0,
                    started_at,
                    ctx.clock.now(),
                ))
                .await;
            ctx.emit(TransferEvent::ItemFailed {
                source_path: item.source_path(),
                class: "permanent".to_string(),
                reason,
            });
        }
    }

    processed
}

#[instrument(skip_all, fields(worker = worker_id, item = %item.source_path()))]
async fn process_item(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    item: TransferItem,
    cancel: CancellationToken,
) {
    let started_at = ctx.clock.now();
    ctx.emit(TransferEvent::ItemStarted {
        source_path: item.source_path(),
    });

    let mut lifecycle = ItemLifecycle::new();
    let mut attempts = 0u32;
    let outcome = transfer(&ctx, &item, &mut lifecycle, &mut attempts, &cancel).await;
    let finished_at = ctx.clock.now();

    match outcome.and_then(|delivered| {
        lifecycle.advance(ItemState::Succeeded)?;
        Ok(delivered)
    }) {
        Ok(delivered) => {
            info!(bytes = delivered.bytes, attempts, "Item transferred");
            ctx.emit(TransferEvent::ItemSucceeded {
                source_path: item.source_path(),
                destination_id: delivered.destination_id.clone(),
                bytes: delivered.bytes,
                attempts,
            });
            let record = TransferRecord::success(
                &item,
                delivered.destination_path,
                delivered.destination_id,
                delivered.bytes,
                attempts,
                started_at,
                finished_at,
            );
            ctx.stats.record_success(delivered.bytes, record).await;
        }
        Err(error) => {
            let failed_in = lifecycle.state();
            lifecycle.fail();
            let class = error.classify();
            warn!(state = %failed_in, class = %class, attempts, error = %error, "Item failed");
            ctx.emit(TransferEvent::ItemFailed {
                source_path: item.source_path(),
                class: class.as_str().to_string(),
                reason: error.to_string(),
            });
            let record = TransferRecord::failure(
                &item,
                error.record_message(),
                attempts,
                started_at,
                finished_at,
            );
            ctx.stats.record_failure(record).await;
        }
    }
}

/// The per-item pipeline; the payload buffer is owned by this call alone
async fn transfer(
    ctx: &WorkerContext,
    item: &TransferItem,
    lifecycle: &mut ItemLifecycle,
    attempts: &mut u32,
    cancel: &CancellationToken,
) -> Result<Delivered> {
    lifecycle.advance(ItemState::FolderResolving)?;
    let parent_id = ctx
        .resolver
        .resolve(&ctx.destination_root, &item.parent_path)
        .await?;

    lifecycle.advance(ItemState::Fetching)?;
    let mut payload = fetch(ctx, item, attempts, cancel).await?;
    let mut name = item.target_name.clone();

    if let Some(converter) = select_converter(&ctx.converters, item) {
        lifecycle.advance(ItemState::Converting)?;
        debug!(converter = converter.name(), "Converting");
        let converted = converter.convert(item, payload).await?;
        if let Some(renamed) = converted.name {
            name = renamed;
        }
        payload = converted.data;
    }

    lifecycle.advance(ItemState::Writing)?;
    let bytes = payload.len() as u64;
    let destination = &ctx.destination;
    let parent = parent_id.as_str();
    let target = name.as_str();
    let (outcome, used) = ctx
        .retry
        .run("upload", Some(cancel), || {
            destination.upload(parent, target, payload.clone())
        })
        .await;
    *attempts += used;
    let node = outcome?;

    Ok(Delivered {
        destination_path: item.parent_path.join_name(&name),
        destination_id: node.id,
        bytes,
    })
}

async fn fetch(
    ctx: &WorkerContext,
    item: &TransferItem,
    attempts: &mut u32,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    let source = &ctx.source;
    let id = item.node.id.as_str();

    let (outcome, used) = match (item.node.kind, &item.export) {
        (NodeKind::File, _) => {
            ctx.retry
                .run("download", Some(cancel), || source.download(id))
                .await
        }
        (NodeKind::ExportableDocument, Some(format)) => {
            ctx.retry
                .run("export", Some(cancel), || source.export_as(id, format))
                .await
        }
        (NodeKind::ExportableDocument, None) => {
            return Err(TransferError::Unsupported(format!(
                "no export format for {}",
                item.node.mime_type.as_deref().unwrap_or("unknown document kind")
            )))
        }
        (NodeKind::Folder, _) => {
            return Err(TransferError::Unsupported(
                "folders are not transferable items".to_string(),
            ))
        }
    };
    *attempts += used;
    outcome
}
