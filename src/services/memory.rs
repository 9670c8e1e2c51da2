//! In-memory implementations of the platform services
//!
//! Used by the test suites and handy for embedding the scheduler somewhere
//! without a real OS behind it.

use super::lock;
use super::sms::SmsSender;
use super::suppression::SuppressionService;
use super::timer::{TimerKey, TimerService};
use crate::db::{ScheduleSettings, SettingsStore};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Timer service that only records what it was asked to do
#[derive(Debug, Default)]
pub struct ManualTimerService {
    armed: Mutex<BTreeMap<TimerKey, DateTime<Utc>>>,
    /// Remaining capability checks that succeed; `None` means unlimited
    exact_budget: Mutex<Option<usize>>,
    fail_registration: AtomicBool,
}

impl ManualTimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny exact timers outright
    pub fn deny_exact(&self) {
        *lock(&self.exact_budget) = Some(0);
    }

    /// Allow `checks` more capability checks, then deny
    pub fn deny_exact_after(&self, checks: usize) {
        *lock(&self.exact_budget) = Some(checks);
    }

    pub fn allow_exact(&self) {
        *lock(&self.exact_budget) = None;
    }

    /// Make every registration fail with a platform error
    pub fn fail_registrations(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    /// Currently armed timers
    pub fn armed(&self) -> BTreeMap<TimerKey, DateTime<Utc>> {
        lock(&self.armed).clone()
    }

    pub fn get(&self, key: TimerKey) -> Option<DateTime<Utc>> {
        lock(&self.armed).get(&key).copied()
    }

    /// Remove and return a timer as if it had fired
    pub fn fire(&self, key: TimerKey) -> Option<DateTime<Utc>> {
        lock(&self.armed).remove(&key)
    }
}

impl TimerService for ManualTimerService {
    fn can_schedule_exact(&self) -> bool {
        let mut budget = lock(&self.exact_budget);
        match budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }

    fn schedule_one_shot(&self, at: DateTime<Utc>, key: TimerKey) -> Result<()> {
        if self.fail_registration.load(Ordering::SeqCst) {
            bail!("timer registration rejected for {}", key);
        }
        lock(&self.armed).insert(key, at);
        Ok(())
    }

    fn cancel(&self, key: TimerKey) {
        lock(&self.armed).remove(&key);
    }
}

/// Suppression switch with a controllable capability
#[derive(Debug)]
pub struct MemorySuppression {
    granted: AtomicBool,
    suppressed: AtomicBool,
    calls: AtomicUsize,
}

impl Default for MemorySuppression {
    fn default() -> Self {
        Self {
            granted: AtomicBool::new(true),
            suppressed: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemorySuppression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst)
    }

    /// How many times the switch was actually flipped
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SuppressionService for MemorySuppression {
    fn is_capability_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn set_suppressed(&self, suppressed: bool) -> Result<()> {
        if !self.is_capability_granted() {
            // the platform ignores the request without policy access
            return Ok(());
        }
        self.suppressed.store(suppressed, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Settings kept in memory only
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<ScheduleSettings>>,
    fail_writes: AtomicBool,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(settings: ScheduleSettings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make writes fail, to exercise persistence error paths
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read(&self) -> Result<ScheduleSettings> {
        Ok(lock(&self.settings).clone().unwrap_or_default())
    }

    fn write(&self, settings: &ScheduleSettings) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("settings store is read-only");
        }
        *lock(&self.settings) = Some(settings.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.settings) = None;
        Ok(())
    }
}

/// Collects outgoing messages instead of sending them
#[derive(Debug, Default)]
pub struct MemorySmsSender {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl MemorySmsSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// (number, message) pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }
}

impl SmsSender for MemorySmsSender {
    fn send_text(&self, number: &str, message: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("no signal");
        }
        lock(&self.sent).push((number.to_string(), message.to_string()));
        Ok(())
    }
}
