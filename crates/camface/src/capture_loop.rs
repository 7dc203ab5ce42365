//! The capture loop: one periodic tick and one command stream, multiplexed on
//! a single thread so ticks and actions never interleave.

use crate::app::{App, Command, Update};
use crate::surface::Surface;
use camface_core::FaceAnalyzer;
use camface_hw::{ColorOrder, FrameSource};
use std::future::Future;
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

/// Counters reported when the loop exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub failed_reads: u64,
    pub actions: u64,
}

/// Push an update to the surface. Display failures are logged and dropped.
fn apply_update(surface: &mut dyn Surface, update: Update) {
    if let Some(frame) = update.frame {
        let result = match surface.color_order() {
            ColorOrder::Rgb => surface.show_frame(&frame),
            order => surface.show_frame(&order.convert(&frame)),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to show frame");
        }
    }
    if let Some(status) = update.status {
        if let Err(e) = surface.set_status(&status) {
            tracing::warn!(error = %e, "failed to set status");
        }
    }
    if let Some(preview) = update.preview {
        if let Err(e) = surface.show_preview(&preview) {
            tracing::warn!(error = %e, "failed to show preview");
        }
    }
    if let Some(badge) = update.badge {
        if let Err(e) = surface.show_badge(&badge) {
            tracing::warn!(error = %e, "failed to show badge");
        }
    }
}

/// Drive `app` until a quit command arrives or `shutdown` resolves.
///
/// Every `period` one frame is read and handed to the app. A failed read
/// shows the app's read-failure status and skips the tick; the timer keeps
/// running. Missed ticks are delayed rather than bursted. When the command
/// stream closes the loop keeps ticking. The source is released on exit.
pub async fn run<F>(
    app: &mut dyn App,
    source: &mut dyn FrameSource,
    analyzer: &mut dyn FaceAnalyzer,
    surface: &mut dyn Surface,
    period: Duration,
    mut commands: mpsc::Receiver<Command>,
    shutdown: F,
) -> LoopStats
where
    F: Future<Output = ()>,
{
    let mut stats = LoopStats::default();
    let mut read_streak = 0u64;
    let mut commands_open = true;

    apply_update(surface, app.initial_update());

    let mut timer = time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(app = app.name(), period_ms = period.as_millis() as u64, "capture loop started");

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                tracing::info!("shutdown requested");
                break;
            }

            command = commands.recv(), if commands_open => match command {
                None => {
                    tracing::debug!("command stream closed");
                    commands_open = false;
                }
                Some(Command::Quit) => {
                    tracing::info!("quit command received");
                    break;
                }
                Some(command) => {
                    stats.actions += 1;
                    tracing::debug!(command = command.name(), "handling command");
                    match app.handle(&command, analyzer) {
                        Ok(update) => apply_update(surface, update),
                        Err(e) => {
                            tracing::warn!(command = command.name(), error = %e, "action failed");
                            apply_update(surface, Update::status(e.status()));
                        }
                    }
                }
            },

            _ = timer.tick() => {
                stats.ticks += 1;
                match source.read() {
                    Ok(frame) => {
                        if read_streak > 0 {
                            tracing::info!(failed = read_streak, "camera reads recovered");
                            read_streak = 0;
                        }
                        match app.tick(frame, analyzer) {
                            Ok(update) => apply_update(surface, update),
                            Err(e) => {
                                tracing::warn!(error = %e, "tick failed");
                                apply_update(surface, Update::status(e.status()));
                            }
                        }
                    }
                    Err(e) => {
                        stats.failed_reads += 1;
                        read_streak += 1;
                        if read_streak == 1 {
                            tracing::warn!(error = %e, "frame read failed");
                        } else {
                            tracing::trace!(error = %e, streak = read_streak, "frame read failed");
                        }
                        apply_update(surface, Update::status(app.read_failure_status()));
                    }
                }
            }
        }
    }

    source.release();
    tracing::info!(
        ticks = stats.ticks,
        failed_reads = stats.failed_reads,
        actions = stats.actions,
        "capture loop stopped"
    );
    stats
}

/// Parse commands from `reader` line by line and forward them until the
/// input ends or the loop stops listening.
pub fn read_commands<R: BufRead>(reader: R, tx: &mpsc::Sender<Command>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read command input");
                return;
            }
        };
        match Command::parse(&line) {
            Ok(Some(command)) => {
                if tx.blocking_send(command).is_err() {
                    return;
                }
            }
            Ok(None) => {}
            Err(msg) => tracing::warn!(input = %line.trim(), "{msg}"),
        }
    }
    tracing::debug!("command input ended");
}

/// Read commands from stdin on a dedicated thread. The thread is detached so
/// a pending read never holds up process exit.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("camface-stdin".into())
        .spawn(move || read_commands(std::io::stdin().lock(), &tx))?;
    Ok(())
}
