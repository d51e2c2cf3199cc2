use serde::{Deserialize, Serialize};
use time::{Duration, PrimitiveDateTime};

use super::constants::EQUALS_TOLERANCE;

/// How a channel value is compared against the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    GreaterThan,
    LessThan,
    /// Equal within a small tolerance, to absorb round-off in the logged values
    Equals,
}

impl Comparison {
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::Equals => (value - threshold).abs() < EQUALS_TOLERANCE,
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Self::GreaterThan => "greater than",
            Self::LessThan => "less than",
            Self::Equals => "equals",
        }
    }
}

/// The timing rule deciding when a satisfied condition becomes a firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringPolicy {
    /// Fire once the condition has held without interruption for the duration
    #[default]
    ContinuousDuration,
    /// Watch for the duration following the first sample, then stop for good
    TimeBounded,
    /// Ignore everything for the duration following the first sample, then watch forever
    DelayedActivation,
}

/// Evaluation state. Only ever touched by [`TriggerCondition::check_condition`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct TriggerState {
    trigger_start_time: Option<PrimitiveDateTime>,
    monitoring_start_time: Option<PrimitiveDateTime>,
    is_active: bool,
    last_triggered: Option<PrimitiveDateTime>,
}

/// An alert rule on a single channel.
///
/// The condition is driven by feeding it samples in time order through
/// [`TriggerCondition::check_condition`], which reports whether this sample caused a firing.
/// A firing happens on the transition into a satisfied condition; consecutive satisfied samples
/// do not fire again until an unsatisfied sample has re-armed the condition. Sending the alert
/// is up to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerCondition {
    parameter: String,
    comparison: Comparison,
    threshold: f64,
    #[serde(default)]
    duration_minutes: u32,
    #[serde(default)]
    policy: MonitoringPolicy,
    #[serde(skip)]
    state: TriggerState,
}

impl TriggerCondition {
    pub fn new(
        parameter: &str,
        comparison: Comparison,
        threshold: f64,
        duration_minutes: u32,
        policy: MonitoringPolicy,
    ) -> Self {
        Self {
            parameter: parameter.to_string(),
            comparison,
            threshold,
            duration_minutes,
            policy,
            state: TriggerState::default(),
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn policy(&self) -> MonitoringPolicy {
        self.policy
    }

    /// Timestamp of the most recent firing
    pub fn last_triggered(&self) -> Option<PrimitiveDateTime> {
        self.state.last_triggered
    }

    /// True between a firing and the next unsatisfied sample
    pub fn is_active(&self) -> bool {
        self.state.is_active
    }

    /// Evaluate a new sample. Returns true if this sample fires the trigger.
    ///
    /// Missing values are ignored entirely.
    pub fn check_condition(&mut self, value: Option<f64>, timestamp: PrimitiveDateTime) -> bool {
        let Some(value) = value else {
            return false;
        };
        let condition_met = self.comparison.evaluate(value, self.threshold);
        match self.policy {
            MonitoringPolicy::ContinuousDuration => {
                self.check_continuous_duration(condition_met, timestamp)
            }
            MonitoringPolicy::TimeBounded => self.check_time_bounded(condition_met, timestamp),
            MonitoringPolicy::DelayedActivation => {
                self.check_delayed_activation(condition_met, timestamp)
            }
        }
    }

    fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes as i64)
    }

    fn fire(&mut self, timestamp: PrimitiveDateTime) -> bool {
        self.state.is_active = true;
        self.state.last_triggered = Some(timestamp);
        true
    }

    /// Fire on a transition into the satisfied condition; an unsatisfied sample re-arms
    fn check_transition(&mut self, condition_met: bool, timestamp: PrimitiveDateTime) -> bool {
        if condition_met && !self.state.is_active {
            return self.fire(timestamp);
        } else if !condition_met {
            self.state.is_active = false;
        }
        false
    }

    fn check_continuous_duration(
        &mut self,
        condition_met: bool,
        timestamp: PrimitiveDateTime,
    ) -> bool {
        if !condition_met {
            // No partial credit: the run has to start over
            self.state.trigger_start_time = None;
            self.state.is_active = false;
            return false;
        }
        let started = *self.state.trigger_start_time.get_or_insert(timestamp);
        if !self.state.is_active && timestamp - started >= self.duration() {
            return self.fire(timestamp);
        }
        false
    }

    fn check_time_bounded(&mut self, condition_met: bool, timestamp: PrimitiveDateTime) -> bool {
        let started = *self.state.monitoring_start_time.get_or_insert(timestamp);
        if timestamp - started > self.duration() {
            return false;
        }
        self.check_transition(condition_met, timestamp)
    }

    fn check_delayed_activation(
        &mut self,
        condition_met: bool,
        timestamp: PrimitiveDateTime,
    ) -> bool {
        let armed = *self.state.monitoring_start_time.get_or_insert(timestamp);
        if timestamp - armed < self.duration() {
            return false;
        }
        self.check_transition(condition_met, timestamp)
    }

    /// Human readable description of the rule
    pub fn description(&self) -> String {
        let base = format!(
            "{} {} {}",
            self.parameter,
            self.comparison.text(),
            self.threshold
        );
        if self.duration_minutes == 0 {
            return format!("Alert immediately if {base}");
        }
        match self.policy {
            MonitoringPolicy::TimeBounded => format!(
                "Alert if {base} (monitoring for next {} minutes)",
                self.duration_minutes
            ),
            MonitoringPolicy::DelayedActivation => format!(
                "Wait {} minutes, then alert if {base}",
                self.duration_minutes
            ),
            MonitoringPolicy::ContinuousDuration => {
                format!("Alert if {base} for {} minutes", self.duration_minutes)
            }
        }
    }
}
