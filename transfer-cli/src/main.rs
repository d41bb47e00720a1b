//! tree-transfer: copy a folder hierarchy between Google Drive, S3 and local disk.

mod args;
mod endpoint;

use anyhow::{Context, Result};
use args::CliArgs;
use clap::Parser;
use core_async::sync::CancellationToken;
use core_runtime::events::{EventBus, Receiver, RecvError, TransferEvent};
use core_runtime::logging::init_logging;
use core_transfer::{export_inventory, list_tree, TransferCoordinator};
use endpoint::Role;
use tracing::{info, warn};

#[core_async::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.logging_config()).context("failed to initialise logging")?;

    let config = args.transfer_config()?;
    let connection = args.connection();
    let source = args.source.open(Role::Source, &connection).await?;
    let cancel = cancel_on_interrupt();

    let Some(destination_endpoint) = &args.destination else {
        info!(source = %args.source, excludes = ?args.effective_excludes(), "Listing tree");
        let inventory = list_tree(source.store, &config, &source.root_id, cancel).await?;
        if let Some(output) = &config.metadata_output {
            export_inventory(&inventory, output)?;
        }
        print!("{inventory}");
        if !inventory.is_complete() {
            std::process::exit(1);
        }
        return Ok(());
    };

    let destination = destination_endpoint
        .open(Role::Destination, &connection)
        .await?;

    info!(
        source = %args.source,
        destination = %destination_endpoint,
        workers = config.workers,
        retries = config.max_retries,
        excludes = ?args.effective_excludes(),
        "Starting transfer"
    );

    let bus = EventBus::default();
    let progress = core_async::spawn(report_progress(bus.subscribe()));

    let coordinator = TransferCoordinator::new(source.store, destination.store, config)?
        .with_event_bus(bus);
    let report = coordinator
        .run(&source.root_id, &destination.root_id, cancel)
        .await?;
    progress.abort();

    print!("{report}");

    if report.has_failures() || report.cancelled {
        std::process::exit(1);
    }
    Ok(())
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    core_async::spawn(async move {
        if core_async::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight items");
            on_signal.cancel();
        }
    });
    cancel
}

/// Logs a running `done/total` count as items finish
async fn report_progress(mut events: Receiver<TransferEvent>) {
    let mut total = 0usize;
    let mut done = 0usize;
    loop {
        match events.recv().await {
            Ok(TransferEvent::WalkCompleted { items, .. }) => total = items,
            Ok(TransferEvent::ItemSucceeded { source_path, .. }) => {
                done += 1;
                info!(done, total, item = %source_path, "Transferred");
            }
            Ok(TransferEvent::ItemFailed { source_path, reason, .. }) => {
                done += 1;
                warn!(done, total, item = %source_path, %reason, "Failed");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => warn!(missed, "Progress reporter fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
