//! One-shot wake timers
//!
//! The platform only offers one-shot timers. Weekly recurrence is built on top
//! by the scheduler re-arming after every fire.

use crate::modules::recurrence::Edge;
use crate::time_utils::day_name;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc, Weekday};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Offset separating disable keys from enable keys
pub const DISABLE_KEY_OFFSET: u32 = 1000;

/// Stable identity of a pending timer: one per (weekday, edge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub weekday: Weekday,
    pub edge: Edge,
}

impl TimerKey {
    pub fn new(weekday: Weekday, edge: Edge) -> Self {
        Self { weekday, edge }
    }

    /// Integer form handed to the platform; re-registering the same code
    /// replaces the earlier timer
    pub fn code(&self) -> u32 {
        let ordinal = self.weekday.num_days_from_monday();
        match self.edge {
            Edge::Enable => ordinal,
            Edge::Disable => ordinal + DISABLE_KEY_OFFSET,
        }
    }
}

impl Ord for TimerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl PartialOrd for TimerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", day_name(self.weekday), self.edge)
    }
}

/// Delivered when a registered instant elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub key: TimerKey,
    pub scheduled_for: DateTime<Utc>,
}

/// The platform's one-shot timer primitive
pub trait TimerService {
    /// Whether exact timers may be scheduled at all
    fn can_schedule_exact(&self) -> bool;

    /// Register a one-shot timer, replacing any timer with the same key
    fn schedule_one_shot(&self, at: DateTime<Utc>, key: TimerKey) -> Result<()>;

    /// Cancel a timer; unknown keys are ignored
    fn cancel(&self, key: TimerKey);
}

impl<T: TimerService + ?Sized> TimerService for Arc<T> {
    fn can_schedule_exact(&self) -> bool {
        (**self).can_schedule_exact()
    }

    fn schedule_one_shot(&self, at: DateTime<Utc>, key: TimerKey) -> Result<()> {
        (**self).schedule_one_shot(at, key)
    }

    fn cancel(&self, key: TimerKey) {
        (**self).cancel(key)
    }
}

/// Timer service backed by tokio tasks
///
/// Every key owns at most one sleeping task. Fired timers are delivered as
/// [`TimerEvent`]s on an mpsc channel.
#[derive(Debug)]
pub struct TokioTimerService {
    runtime: Handle,
    events: mpsc::UnboundedSender<TimerEvent>,
    tasks: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
}

impl TokioTimerService {
    /// Create the service and the receiving end of its event channel.
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<TimerEvent>)> {
        let runtime = Handle::try_current().context("Timer service needs a tokio runtime")?;
        let (events, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                runtime,
                events,
                tasks: Mutex::new(HashMap::new()),
            },
            rx,
        ))
    }

    /// Number of timers still waiting to fire
    pub fn pending(&self) -> usize {
        super::lock(&self.tasks)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl TimerService for TokioTimerService {
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn schedule_one_shot(&self, at: DateTime<Utc>, key: TimerKey) -> Result<()> {
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let events = self.events.clone();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let event = TimerEvent {
                key,
                scheduled_for: at,
            };
            if events.send(event).is_err() {
                warn!("Timer {} fired but nobody is listening", key);
            }
        });

        if let Some(previous) = super::lock(&self.tasks).insert(key, task) {
            previous.abort();
        }
        debug!("Timer {} (code {}) set for {} (in {:?})", key, key.code(), at, delay);
        Ok(())
    }

    fn cancel(&self, key: TimerKey) {
        if let Some(task) = super::lock(&self.tasks).remove(&key) {
            task.abort();
            debug!("Timer {} cancelled", key);
        }
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for task in super::lock(&self.tasks).values() {
            task.abort();
        }
    }
}
