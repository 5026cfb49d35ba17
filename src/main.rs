//! Desktop icons for one directory.
//!
//! Watches the directory, keeps the headless icon grid in step with it and
//! prints each change. Activation and drag-and-drop are reachable through
//! the grid's hooks.

use anyhow::{Context, Result};
use clap::Parser;
use dir_icons::{desktop::WatchBackend, prelude::*};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dir_icons=debug".parse()?),
        )
        .init();

    let config = Config::parse();
    let watch_dir = config.watch_dir()?;
    let icon_size = config.icon_size()?;

    let theme = Arc::new(XdgIconTheme::new(&config.icon_theme));
    let resolver = MetadataResolver::new(theme).with_icon_size(icon_size);
    let (model, desktop, updates) =
        DesktopModelBuilder::new(watch_dir.clone(), EntryStore::new(resolver))
            .launcher(Arc::new(SystemLauncher))
            .build();

    // The subscription must exist before the model scans the directory.
    let watcher = DirectoryWatcher::watch(&watch_dir, config.poll_interval(), desktop.change_sink())
        .with_context(|| format!("cannot watch {}", watch_dir.display()))?;

    println!("Watching: {}\n", watcher.dir().display());

    if watcher.backend() == WatchBackend::Polling {
        println!("Note: Using polling fallback for this directory\n");
    } else {
        println!("Using native file watcher\n");
    }

    let redraw = Arc::new(Notify::new());
    let redraw_requested = Arc::clone(&redraw);
    let mut grid = IconGridBuilder::new(desktop.clone())
        .layout(config.layout())
        .label_style(config.label_style())
        .on_redraw(Box::new(move || redraw_requested.notify_one()))
        .on_notice(Box::new(|msg| println!("[UI] {msg}")))
        .build();
    tracing::debug!("label style: {}", grid.label_style().css());
    grid.setup_update_listener(updates);

    // Stand-in for a real surface: "draw" a frame, then clear the dirty state
    let surface = grid.grid().clone();
    tokio::spawn(async move {
        loop {
            redraw.notified().await;
            let state = surface.state().await;
            if state.needs_full_redraw {
                println!("[UI] Full redraw: {} icons", state.rows.len());
            } else {
                println!(
                    "[UI] Redraw {} cells ({} icons)",
                    state.dirty_rows.len(),
                    state.rows.len()
                );
            }
            surface.clear_dirty().await;
        }
    });

    // Log every update for the demo
    let mut log_rx = model.subscribe();
    tokio::spawn(async move {
        while let Ok(update) = log_rx.recv().await {
            match update {
                DesktopUpdate::Inserted { index, row } => {
                    println!("[Desktop] + {} at {} ({})", row.display_name, index, row.id)
                }
                DesktopUpdate::Removed { index, id } => {
                    println!("[Desktop] - {} from {}", id, index)
                }
                _ => {}
            }
        }
    });

    let model_task = tokio::spawn(model.run());

    println!("Press Ctrl+C to exit\n");

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            println!("\nShutting down...");
        }
        _ = model_task => {
            tracing::warn!("desktop model stopped unexpectedly");
        }
    }

    // Cleanup
    drop(watcher);
    grid.stop().await;
    println!("Done!");

    Ok(())
}
