use std::path::Path;

use time::PrimitiveDateTime;

use super::aggregator::{Sample, UnifiedSeries};
use super::clock::{format_timestamp, local_now};
use super::config::Config;
use super::error::MonitorError;
use super::notifier::{AlertContext, Dispatcher, EmailNotifier};
use super::process::select_time_range;
use super::trigger::TriggerCondition;

/// A trigger firing, as reported by the monitor
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    /// Index of the trigger in the monitor's list
    pub trigger: usize,
    pub parameter: String,
    pub description: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: PrimitiveDateTime,
    /// Whether the dispatcher accepted the alert. False if there is no dispatcher.
    pub delivered: bool,
}

/// The newest timestamp fed to a trigger, and how many samples with exactly that timestamp
/// have been fed. Log timestamps are non-decreasing, not strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Watermark {
    timestamp: PrimitiveDateTime,
    fed_at_timestamp: usize,
}

/// The evaluation loop of a monitoring session.
///
/// The monitor owns its trigger conditions and feeds each of them the samples of its channel
/// that it has not seen yet, in time order. Each trigger keeps a [`Watermark`], so the same
/// series, or a re-read of a growing log, can be fed repeatedly without evaluating a sample
/// twice or skipping one.
pub struct Monitor {
    triggers: Vec<TriggerCondition>,
    watermarks: Vec<Option<Watermark>>,
    since: Option<PrimitiveDateTime>,
    dispatcher: Option<Box<dyn Dispatcher>>,
}

impl Monitor {
    pub fn new(triggers: Vec<TriggerCondition>) -> Self {
        Self {
            watermarks: vec![None; triggers.len()],
            triggers,
            since: None,
            dispatcher: None,
        }
    }

    /// Build a monitor for the triggers of a config, with an email dispatcher if one is set up
    pub fn from_config(config: &Config) -> Self {
        let monitor = Self::new(config.triggers.clone()).since(config.session_start());
        match &config.email {
            Some(email) => monitor.with_dispatcher(Box::new(EmailNotifier::from_config(email))),
            None => monitor,
        }
    }

    /// Ignore samples older than `start`
    pub fn since(mut self, start: PrimitiveDateTime) -> Self {
        self.since = Some(start);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn triggers(&self) -> &[TriggerCondition] {
        &self.triggers
    }

    /// Evaluate every trigger against the samples it has not seen yet.
    ///
    /// Firings are dispatched as they happen; a failed delivery is logged and reported in the
    /// returned [`Firing`], it never stops the evaluation.
    pub fn feed(&mut self, series: &UnifiedSeries) -> Vec<Firing> {
        let mut firings = Vec::new();
        for idx in 0..self.triggers.len() {
            let Some(samples) = series.series(self.triggers[idx].parameter()) else {
                log::debug!(
                    "No data for trigger parameter {}",
                    self.triggers[idx].parameter()
                );
                continue;
            };
            let fresh = self.fresh_samples(idx, samples);
            for sample in fresh {
                self.advance_watermark(idx, sample.timestamp);
                let trigger = &mut self.triggers[idx];
                if !trigger.check_condition(sample.value, sample.timestamp) {
                    continue;
                }
                // check_condition only fires on present values
                let value = sample.value.unwrap_or_default();
                let mut firing = Firing {
                    trigger: idx,
                    parameter: trigger.parameter().to_string(),
                    description: trigger.description(),
                    value,
                    threshold: trigger.threshold(),
                    timestamp: sample.timestamp,
                    delivered: false,
                };
                log::info!(
                    "Trigger fired at {}: {}",
                    format_timestamp(sample.timestamp),
                    firing.description
                );
                firing.delivered = self.dispatch(&firing);
                firings.push(firing);
            }
        }
        firings
    }

    /// Scan the log directory for everything between the session start and now, and feed it
    pub fn poll(&mut self, log_path: &Path, n_threads: usize) -> Result<Vec<Firing>, MonitorError> {
        let now = local_now();
        let start = self.since.unwrap_or(now);
        match select_time_range(log_path, start, now, n_threads, None)? {
            Some(mut selection) => {
                selection.series.sort_chronologically();
                Ok(self.feed(&selection.series))
            }
            None => Ok(vec![]),
        }
    }

    /// The samples of one trigger's channel that it has not been fed yet, oldest first.
    ///
    /// Samples sharing the watermark timestamp are skipped only as many times as they were
    /// fed, so a row appended within the same second is still evaluated.
    fn fresh_samples(&self, idx: usize, samples: &[Sample]) -> Vec<Sample> {
        let mut ordered: Vec<Sample> = samples
            .iter()
            .filter(|sample| self.since.map_or(true, |since| sample.timestamp >= since))
            .copied()
            .collect();
        // Stable, so rows sharing a timestamp keep their file order
        ordered.sort_by_key(|sample| sample.timestamp);

        let Some(mark) = self.watermarks[idx] else {
            return ordered;
        };
        let mut to_skip = mark.fed_at_timestamp;
        ordered
            .into_iter()
            .filter(|sample| {
                if sample.timestamp < mark.timestamp {
                    false
                } else if sample.timestamp == mark.timestamp && to_skip > 0 {
                    to_skip -= 1;
                    false
                } else {
                    true
                }
            })
            .collect()
    }

    fn advance_watermark(&mut self, idx: usize, timestamp: PrimitiveDateTime) {
        self.watermarks[idx] = Some(match self.watermarks[idx] {
            Some(mark) if mark.timestamp == timestamp => Watermark {
                timestamp,
                fed_at_timestamp: mark.fed_at_timestamp + 1,
            },
            _ => Watermark {
                timestamp,
                fed_at_timestamp: 1,
            },
        });
    }

    fn dispatch(&self, firing: &Firing) -> bool {
        let Some(dispatcher) = &self.dispatcher else {
            return false;
        };
        let context = AlertContext {
            parameter: firing.parameter.clone(),
            value: firing.value,
            threshold: firing.threshold,
        };
        let subject = format!("{} alert", firing.parameter);
        let message = format!(
            "{} (triggered at {})",
            firing.description,
            format_timestamp(firing.timestamp)
        );
        match dispatcher.send(&subject, &message, Some(&context)) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to send alert for {}: {e}", firing.parameter);
                false
            }
        }
    }
}
