//! DND Lion - recurring Do Not Disturb windows
//!
//! A small daemon that:
//! - Arms one-shot timers for each selected weekday's window
//! - Toggles notification suppression when they fire, re-arming weekly
//! - Re-arms everything from stored settings after a restart
//! - Texts callers back while the window is active
//!
//! Reads simple commands on stdin: `call <number>`, `status`, `stop`.

use anyhow::Result;
use dndlion::modules::reply::handle_incoming_call;
use dndlion::services::{LogSmsSender, LogSuppression, SystemClock, TokioTimerService};
use dndlion::{Config, Database, Scheduler, SettingsStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    if std::path::Path::new(".env").exists() {
        dotenvy::dotenv()?;
        info!("Loaded environment variables from .env file");
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("DND Lion starting...");

    // Load configuration
    let config = Config::load()?;
    let tz = config.scheduler.tz()?;
    info!("Configuration loaded");
    info!("Timezone: {}", tz);
    info!(
        "Lead time: {}s ({:?})",
        config.scheduler.lead_time_secs, config.scheduler.lead_policy
    );

    // Initialize settings store
    let db = Database::new(&config.database.path)?;
    db.migrate()?;
    let store = Arc::new(db);
    info!("Settings store ready at {}", config.database.path);

    let (timers, mut events) = TokioTimerService::new()?;
    let mut scheduler = Scheduler::new(
        timers,
        LogSuppression::new(),
        store.clone(),
        SystemClock::new(tz),
        config.scheduler.lead()?,
    );

    if let Err(e) = scheduler.check_capabilities() {
        warn!("{}; grant it to get full DND behaviour", e);
    }

    // Seed from config, otherwise recover whatever was stored before the restart
    let armed = match &config.schedule {
        Some(schedule) => scheduler.apply_settings(schedule.to_settings(&config.reply)),
        None => scheduler.recover(),
    };
    match armed {
        Ok(Some(outcome)) => {
            for span in &outcome.spans {
                info!(
                    "{:?}: enable at {}, disable at {}",
                    span.weekday, span.enable_at, span.disable_at
                );
            }
            if outcome.activated_now {
                info!("Window already open, DND active now");
            }
            if outcome.suppression_denied {
                warn!("Running without notification policy access; windows will not silence calls");
            }
        }
        Ok(None) => info!("No schedule configured; waiting for commands"),
        Err(e) => error!("Could not arm schedule: {}", e),
    }

    let scheduler = scheduler.into_shared();

    // Deliver fired timers to the scheduler
    let timer_loop = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = scheduler.lock().await.handle_event(event) {
                    error!("Timer {} handling failed: {}", event.key, e);
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let sms = LogSmsSender;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed; keep serving timers until ctrl-c
                    Ok(None) => {
                        tokio::signal::ctrl_c().await?;
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read command: {}", e);
                        continue;
                    }
                };

                let mut parts = line.split_whitespace();
                match parts.next() {
                    Some("call") => {
                        let _guard = scheduler.lock().await;
                        handle_incoming_call(&store, &sms, parts.next());
                    }
                    Some("status") => {
                        let scheduler = scheduler.lock().await;
                        match store.read() {
                            Ok(settings) => info!(
                                "Active: {}, window {} - {} on {:?}, {} timer(s) pending",
                                settings.is_active,
                                settings.start_time,
                                settings.end_time,
                                settings.days,
                                scheduler.pending().len()
                            ),
                            Err(e) => error!("Could not read settings: {:#}", e),
                        }
                    }
                    Some("stop") => {
                        if let Err(e) = scheduler.lock().await.stop() {
                            error!("Error stopping DND mode: {}", e);
                        }
                    }
                    Some(other) => warn!("Unknown command: {}", other),
                    None => {}
                }
            }
        }
    }

    // Clean shutdown
    timer_loop.abort();
    info!("DND Lion shutting down");

    Ok(())
}
