//! Threshold alarm engine with hysteresis
//!
//! ## Overview
//!
//! A two-state machine per `(axis, direction)` pair. A violation on the
//! latest reading moves the pair Inactive→Active, creates an [`Alarm`],
//! records it in a bounded history, and notifies listeners. While Active,
//! further violations on the same pair are absorbed; a reading back inside
//! the bounds moves the pair back to Inactive with no history entry, so the
//! history logs violation onsets only.
//!
//! Only the buffer head is evaluated per call. Bursts between poll ticks are
//! sampled, not exhaustively inspected; this is a monitoring tool, not an
//! audit trail.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::reading::{Axis, Reading};
use crate::time::{TimeSource, Timestamp};

/// Which bound was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Value fell under the configured minimum.
    BelowMin,
    /// Value exceeded the configured maximum.
    AboveMax,
}

impl Direction {
    fn label(&self) -> &'static str {
        match self {
            Direction::BelowMin => "below_min",
            Direction::AboveMax => "above_max",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-axis allowed band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisThreshold {
    /// Lower bound, inclusive.
    pub min: f64,
    /// Upper bound, inclusive.
    pub max: f64,
}

impl Default for AxisThreshold {
    fn default() -> Self {
        Self {
            min: -ThresholdSet::DEFAULT_BOUND,
            max: ThresholdSet::DEFAULT_BOUND,
        }
    }
}

/// Configured bounds for all three axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Bounds for the X axis.
    pub x: AxisThreshold,
    /// Bounds for the Y axis.
    pub y: AxisThreshold,
    /// Bounds for the Z axis.
    pub z: AxisThreshold,
}

impl ThresholdSet {
    /// Default band is symmetric around zero. Typical resting accelerometer
    /// magnitudes are within ±10 m/s² on any axis.
    pub const DEFAULT_BOUND: f64 = 10.0;

    /// Bounds for one axis.
    pub fn axis(&self, axis: Axis) -> &AxisThreshold {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// Replace the bounds for one axis, swapping them if given reversed.
    pub fn set(&mut self, axis: Axis, min: f64, max: f64) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let slot = match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        };
        *slot = AxisThreshold { min, max };
    }
}

/// Display severity derived from how far past the bound the value landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Bound crossed by a modest margin.
    Warning,
    /// Value more than 1.5 times the crossed bound.
    Critical,
}

/// A violation onset record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alarm {
    /// `"<axis>-<direction>-<ms>"`, unique enough for UI keys and logs.
    pub id: String,
    /// Axis that violated its band.
    pub axis: Axis,
    /// Which bound was crossed.
    pub direction: Direction,
    /// The offending axis value.
    pub value: f64,
    /// The bound that was crossed.
    pub threshold: f64,
    /// When the engine observed the violation.
    pub timestamp: Timestamp,
    /// The reading that triggered it.
    pub reading: Reading,
}

impl Alarm {
    /// Derived, not stored: recomputed on demand so a threshold change does
    /// not leave stale severities in history.
    pub fn severity(&self) -> Severity {
        if self.threshold == 0.0 {
            return if self.value == 0.0 {
                Severity::Warning
            } else {
                Severity::Critical
            };
        }
        if (self.value / self.threshold).abs() > 1.5 {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// Listener invoked with each newly triggered alarm.
pub type AlarmListener = dyn Fn(&Alarm) + Send + Sync;

/// Outbound notification boundary, fire-and-forget.
///
/// Delivery failure must never affect alarm state, so the trait cannot
/// return an error to the engine; implementations log their own failures.
pub trait AlarmNotifier: Send + Sync {
    /// Deliver one alarm. Must not panic and must not block for long.
    fn notify(&self, alarm: &Alarm);
}

/// Notifier that writes alarms to the log facade.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl AlarmNotifier for LogNotifier {
    fn notify(&self, alarm: &Alarm) {
        log::warn!(
            "alarm {}: axis {} {} threshold {} with value {}",
            alarm.id,
            alarm.axis,
            alarm.direction,
            alarm.threshold,
            alarm.value
        );
    }
}

/// Maximum violation onsets retained in history.
pub const HISTORY_CAPACITY: usize = 100;

struct EngineState {
    thresholds: ThresholdSet,
    active: HashMap<(Axis, Direction), Alarm>,
    history: VecDeque<Alarm>,
    listeners: Vec<Arc<AlarmListener>>,
}

/// Stateful threshold monitor.
pub struct AlarmEngine {
    state: Mutex<EngineState>,
    notifier: Arc<dyn AlarmNotifier>,
    clock: Arc<dyn TimeSource>,
}

impl AlarmEngine {
    /// Engine with default thresholds and the [`LogNotifier`].
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self::with_notifier(clock, Arc::new(LogNotifier))
    }

    /// Engine with a custom outbound notifier.
    pub fn with_notifier(clock: Arc<dyn TimeSource>, notifier: Arc<dyn AlarmNotifier>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                thresholds: ThresholdSet::default(),
                active: HashMap::new(),
                history: VecDeque::with_capacity(HISTORY_CAPACITY),
                listeners: Vec::new(),
            }),
            notifier,
            clock,
        }
    }

    /// Current bounds.
    pub fn thresholds(&self) -> ThresholdSet {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).thresholds
    }

    /// Replace bounds for one axis, effective from the next evaluation.
    ///
    /// Existing active alarms are not retroactively cleared; they resolve
    /// naturally on the next `check_thresholds` call.
    pub fn set_threshold(&self, axis: Axis, min: f64, max: f64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.thresholds.set(axis, min, max);
    }

    /// Register a listener for newly triggered alarms.
    pub fn add_listener(&self, listener: Arc<AlarmListener>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.listeners.push(listener);
    }

    /// Evaluate the newest reading against the configured bounds.
    ///
    /// Returns alarms whose pair transitioned Inactive→Active on this call.
    /// An in-bounds value resolves both directions for its axis. An empty
    /// window is a no-op.
    pub fn check_thresholds(&self, readings: &[Reading]) -> Vec<Alarm> {
        let head = match readings.first() {
            Some(head) => head.clone(),
            None => return Vec::new(),
        };

        let (new_alarms, listeners) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let now = self.clock.now();
            let mut new_alarms = Vec::new();

            for axis in Axis::ALL {
                let bounds = *state.thresholds.axis(axis);
                let value = head.axis(axis);

                let violation = if value < bounds.min {
                    Some((Direction::BelowMin, bounds.min))
                } else if value > bounds.max {
                    Some((Direction::AboveMax, bounds.max))
                } else {
                    None
                };

                match violation {
                    Some((direction, threshold)) => {
                        let key = (axis, direction);
                        if !state.active.contains_key(&key) {
                            let alarm = Alarm {
                                id: format!("{}-{}-{}", axis.label().to_lowercase(), direction, now),
                                axis,
                                direction,
                                value,
                                threshold,
                                timestamp: now,
                                reading: head.clone(),
                            };
                            state.active.insert(key, alarm.clone());
                            if state.history.len() >= HISTORY_CAPACITY {
                                state.history.pop_front();
                            }
                            state.history.push_back(alarm.clone());
                            new_alarms.push(alarm);
                        }
                    }
                    None => {
                        state.active.remove(&(axis, Direction::BelowMin));
                        state.active.remove(&(axis, Direction::AboveMax));
                    }
                }
            }

            (new_alarms, state.listeners.clone())
        };

        // Notify outside the lock; a listener may query the engine.
        for alarm in &new_alarms {
            self.notifier.notify(alarm);
            for listener in &listeners {
                let result = catch_unwind(AssertUnwindSafe(|| listener(alarm)));
                if result.is_err() {
                    log::error!("alarm listener panicked; continuing");
                }
            }
        }

        new_alarms
    }

    /// Currently unresolved violations.
    pub fn active_alarms(&self) -> Vec<Alarm> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.values().cloned().collect()
    }

    /// Violation onset log, oldest first, at most [`HISTORY_CAPACITY`].
    pub fn history(&self) -> Vec<Alarm> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.history.iter().cloned().collect()
    }

    /// Empty the active set. History is untouched.
    pub fn clear_active_alarms(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.active.clear();
    }
}
