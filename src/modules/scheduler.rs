//! Recurrence scheduler
//!
//! Turns a [`ScheduleRequest`] into armed one-shot timers and keeps them
//! going week after week. The platform has no weekly recurrence, so every
//! enable fire re-arms its weekday one week ahead.
//!
//! All mutating operations take `&mut self`; share the scheduler through
//! [`SharedScheduler`] so UI calls and timer deliveries are serialized.

use crate::db::{ScheduleSettings, SettingsStore};
use crate::error::{Capability, Result, SchedulerError};
use crate::modules::recurrence::{
    current_window, nearest_occurrence, next_window, window_for_date, Edge, LeadTime,
    ScheduleRequest, WindowSpan,
};
use crate::modules::toggle::{WindowState, WindowToggle};
use crate::services::{Clock, SuppressionService, TimerEvent, TimerKey, TimerService};
use crate::time_utils::{day_name, day_of_week, DaySet};
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Scheduler behind the lock every caller goes through
pub type SharedScheduler<T, S, K, C> = Arc<tokio::sync::Mutex<Scheduler<T, S, K, C>>>;

/// Result of a successful [`Scheduler::arm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmOutcome {
    /// Next window per selected weekday, Monday first
    pub spans: Vec<WindowSpan>,
    /// Whether the window was entered immediately
    pub activated_now: bool,
    /// Disable instant armed for the window we are already inside
    pub current_window_end: Option<DateTime<Utc>>,
    /// Notification policy access is missing; windows toggle but suppress nothing
    pub suppression_denied: bool,
}

/// Owns every pending timer and drives the window toggle
#[derive(Debug)]
pub struct Scheduler<T, S, K, C> {
    timers: T,
    toggle: WindowToggle<S>,
    store: K,
    clock: C,
    lead: LeadTime,
    armed: BTreeMap<TimerKey, DateTime<Utc>>,
}

impl<T, S, K, C> Scheduler<T, S, K, C>
where
    T: TimerService,
    S: SuppressionService,
    K: SettingsStore,
    C: Clock,
{
    pub fn new(timers: T, suppression: S, store: K, clock: C, lead: LeadTime) -> Self {
        Self {
            timers,
            toggle: WindowToggle::new(suppression),
            store,
            clock,
            lead,
            armed: BTreeMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedScheduler<T, S, K, C> {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn suppression(&self) -> &S {
        self.toggle.suppression()
    }

    pub fn lead(&self) -> LeadTime {
        self.lead
    }

    /// Timers this scheduler has registered and not yet seen fire or cancelled
    pub fn pending(&self) -> &BTreeMap<TimerKey, DateTime<Utc>> {
        &self.armed
    }

    /// Whether the window is currently active, per the settings store
    pub fn is_active(&self) -> Result<bool> {
        Ok(self.store.read()?.is_active)
    }

    /// Check both platform capabilities, exact timers first
    pub fn check_capabilities(&self) -> Result<()> {
        if !self.timers.can_schedule_exact() {
            return Err(SchedulerError::CapabilityDenied(Capability::ExactTimers));
        }
        if !self.toggle.suppression().is_capability_granted() {
            return Err(SchedulerError::CapabilityDenied(Capability::NotificationPolicy));
        }
        Ok(())
    }

    /// Arm enable/disable timers for every weekday in `request`.
    ///
    /// If the exact-timer capability is denied partway, days armed earlier
    /// in the call stay armed; callers retry the whole operation.
    pub fn arm(&mut self, request: &ScheduleRequest) -> Result<ArmOutcome> {
        let now = self.clock.now();
        let days = request.days();

        // weekdays dropped from the schedule
        let stale: DaySet = self
            .armed
            .keys()
            .map(|key| key.weekday)
            .filter(|day| !days.contains(*day))
            .collect();
        if !stale.is_empty() {
            debug!("Dropping timers for deselected days: {}", stale);
            self.cancel(stale);
        }

        let mut spans = Vec::with_capacity(days.len());
        for day in days.iter() {
            self.cancel_day(day);

            if !self.timers.can_schedule_exact() {
                error!("Cannot schedule exact timers - capability not granted");
                return Err(SchedulerError::CapabilityDenied(Capability::ExactTimers));
            }

            let span = next_window(request, day, &now, self.lead);
            self.register(TimerKey::new(day, Edge::Enable), span.enable_at)?;
            self.register(TimerKey::new(day, Edge::Disable), span.disable_at)?;
            debug!(
                "Scheduled {}: enable={}, disable={}",
                day_name(day),
                span.enable_at,
                span.disable_at
            );
            spans.push(span);
        }

        let current_window_end = match current_window(request, &now) {
            Some((owner, end)) => {
                info!("Already inside the {} window, activating now", day_name(owner));
                self.toggle.apply(WindowState::Active, &self.store)?;
                let at = self.lead.apply(Edge::Disable, end);
                // the enable key keeps its next occurrence so the weekly chain survives
                self.register(TimerKey::new(owner, Edge::Disable), at)?;
                Some(at)
            }
            None => {
                if self.store.read()?.is_active {
                    info!("Stored state says active but no window is open; deactivating");
                    self.toggle.apply(WindowState::Inactive, &self.store)?;
                }
                None
            }
        };

        let suppression_denied = !self.toggle.suppression().is_capability_granted();
        if suppression_denied {
            warn!("Notification policy access not granted; DND windows will not silence anything");
        }

        info!("Armed {} day(s): {}", days.len(), days);
        Ok(ArmOutcome {
            spans,
            activated_now: current_window_end.is_some(),
            current_window_end,
            suppression_denied,
        })
    }

    /// [`arm`](Self::arm) for callers that only need success or failure
    pub fn arm_ok(&mut self, request: &ScheduleRequest) -> bool {
        match self.arm(request) {
            Ok(_) => true,
            Err(e) => {
                error!("Error scheduling DND mode: {}", e);
                false
            }
        }
    }

    /// Cancel both edges for every day in `days`. Unknown timers are ignored.
    pub fn cancel(&mut self, days: DaySet) {
        for day in days.iter() {
            self.cancel_day(day);
        }
        if !days.is_empty() {
            info!("Cancelled timers for {}", days);
        }
    }

    /// Handle a delivered timer event.
    ///
    /// Events for a key that was cancelled or re-registered after the event
    /// was queued are dropped.
    pub fn handle_event(&mut self, event: TimerEvent) -> Result<()> {
        if self.armed.get(&event.key) != Some(&event.scheduled_for) {
            debug!(
                "Dropping stale timer {} (scheduled for {})",
                event.key, event.scheduled_for
            );
            return Ok(());
        }
        debug!("Timer {} fired (scheduled for {})", event.key, event.scheduled_for);
        self.on_timer_fired(event.key.edge, event.key.weekday)
    }

    /// Apply the toggle for a fired edge; an enable fire also re-arms its
    /// weekday for the following week
    pub fn on_timer_fired(&mut self, edge: Edge, weekday: Weekday) -> Result<()> {
        let key = TimerKey::new(weekday, edge);
        self.armed.remove(&key);

        match edge {
            Edge::Enable => {
                let settings = self.store.read()?;
                let request = match settings.to_request() {
                    Ok(request) if request.days().contains(weekday) => request,
                    Ok(_) => {
                        warn!("Ignoring enable for {}: day no longer selected", day_name(weekday));
                        return Ok(());
                    }
                    Err(e) => {
                        warn!("Ignoring enable for {}: no usable schedule ({})", day_name(weekday), e);
                        return Ok(());
                    }
                };

                let applied = self.toggle.apply(WindowState::Active, &self.store);
                self.rearm_after_enable(&request, weekday)?;
                applied?;
            }
            Edge::Disable => {
                self.toggle.apply(WindowState::Inactive, &self.store)?;
            }
        }
        Ok(())
    }

    /// Explicit user stop: cancel everything, deactivate, forget the schedule
    pub fn stop(&mut self) -> Result<()> {
        let mut days: DaySet = self.armed.keys().map(|key| key.weekday).collect();
        match self.store.read() {
            Ok(settings) => {
                for name in &settings.days {
                    match day_of_week(name) {
                        Ok(day) => {
                            days.insert(day);
                        }
                        Err(e) => warn!("Skipping stored day: {}", e),
                    }
                }
            }
            Err(e) => warn!("Could not read stored days while stopping: {:#}", e),
        }

        self.cancel(days);
        self.toggle.apply(WindowState::Inactive, &self.store)?;
        self.store.clear()?;
        info!("DND schedule stopped");
        Ok(())
    }

    /// Validate and persist new settings, then arm them.
    ///
    /// Invalid settings are rejected before anything is written. An empty day
    /// selection clears all timers, closes any open window and returns `None`.
    pub fn apply_settings(&mut self, settings: ScheduleSettings) -> Result<Option<ArmOutcome>> {
        if settings.days.is_empty() {
            let was_active = self.store.read()?.is_active;
            let armed: DaySet = self.armed.keys().map(|key| key.weekday).collect();
            self.cancel(armed);

            let mut stored = settings;
            stored.is_active = was_active;
            self.store.write(&stored)?;
            if was_active {
                info!("No days selected; closing the open window");
                self.toggle.apply(WindowState::Inactive, &self.store)?;
            }
            return Ok(None);
        }

        let request = settings.to_request()?;
        let mut stored = settings;
        stored.is_active = self.store.read()?.is_active;
        self.store.write(&stored)?;
        self.arm(&request).map(Some)
    }

    /// Re-arm from stored settings after a process restart or reboot
    pub fn recover(&mut self) -> Result<Option<ArmOutcome>> {
        let settings = self.store.read()?;
        if !settings.needs_rearm() {
            info!("No stored schedule to recover");
            return Ok(None);
        }

        let request = settings.to_request().map_err(|e| {
            error!("Stored schedule is unusable: {}", e);
            e
        })?;
        info!("Recovering schedule for {}", request.days());
        self.arm(&request).map(Some)
    }

    fn rearm_after_enable(&mut self, request: &ScheduleRequest, weekday: Weekday) -> Result<()> {
        let now = self.clock.now();
        let tz = now.timezone();
        let opened = nearest_occurrence(request, weekday, &now);
        let current = window_for_date(request, opened, &tz, self.lead);
        let following = window_for_date(request, opened + Duration::days(7), &tz, self.lead);

        if !self.timers.can_schedule_exact() {
            error!("Cannot re-arm {} - exact timer capability not granted", day_name(weekday));
            return Err(SchedulerError::CapabilityDenied(Capability::ExactTimers));
        }

        self.register(TimerKey::new(weekday, Edge::Enable), following.enable_at)?;
        self.register(TimerKey::new(weekday, Edge::Disable), current.disable_at)?;
        info!(
            "Re-armed {}: window closes {}, next opens {}",
            day_name(weekday),
            current.disable_at,
            following.enable_at
        );
        debug_assert_eq!(opened.weekday(), weekday);
        Ok(())
    }

    fn register(&mut self, key: TimerKey, at: DateTime<Utc>) -> Result<()> {
        self.timers
            .schedule_one_shot(at, key)
            .with_context(|| format!("Failed to register timer {}", key))?;
        self.armed.insert(key, at);
        Ok(())
    }

    fn cancel_day(&mut self, day: Weekday) {
        for edge in [Edge::Enable, Edge::Disable] {
            let key = TimerKey::new(day, edge);
            self.timers.cancel(key);
            self.armed.remove(&key);
        }
    }
}
