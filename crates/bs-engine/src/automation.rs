//! In-memory parameter automation.
//!
//! [`ParamTimeline`] is an [`OscillatorSink`] that records what the engine
//! asks for and answers "what is the frequency / gain at time t", so the
//! tone generator and the tests can both read it back.

use alloc::vec::Vec;

use crate::sink::OscillatorSink;

/// How an automation event reaches its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ramp {
    /// Jump at the event time.
    Set,
    /// Linear from the previous event, ending at the event time.
    Linear,
    /// Exponential from the previous event, ending at the event time.
    Exponential,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutomationEvent {
    pub ramp: Ramp,
    pub value: f64,
    pub time: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainTarget {
    pub value: f64,
    pub time: f64,
    pub time_constant: f64,
}

/// One start/stop interval of a source node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Run {
    pub start: f64,
    pub stop: Option<f64>,
}

/// Value between `from` and `to` at fraction `t` of a ramp.
///
/// Exponential ramps need both ends positive; otherwise the start value is
/// held until the ramp ends.
pub fn interpolate(ramp: Ramp, from: f64, to: f64, t: f64) -> f64 {
    match ramp {
        Ramp::Set => from,
        Ramp::Linear => from + (to - from) * t,
        Ramp::Exponential => {
            if from > 0.0 && to > 0.0 {
                from * libm::pow(to / from, t)
            } else {
                from
            }
        }
    }
}

/// Recorded automation of the oscillator frequency and output gain.
#[derive(Clone, Debug)]
pub struct ParamTimeline {
    default_value: f64,
    events: Vec<AutomationEvent>,
    initial_gain: f64,
    gain_targets: Vec<GainTarget>,
    runs: Vec<Run>,
    started: bool,
}

impl ParamTimeline {
    /// A timeline whose frequency sits at `default_value` until automated.
    /// Gain starts silent.
    pub fn new(default_value: f64) -> Self {
        Self {
            default_value,
            events: Vec::new(),
            initial_gain: 0.0,
            gain_targets: Vec::new(),
            runs: Vec::new(),
            started: false,
        }
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    pub fn gain_targets(&self) -> &[GainTarget] {
        &self.gain_targets
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Frequency at time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let next = self.events.partition_point(|e| e.time <= t);
        let (from, from_time) = match next.checked_sub(1) {
            Some(i) => (self.events[i].value, self.events[i].time),
            None => (self.default_value, 0.0),
        };

        match self.events.get(next) {
            Some(e) if e.ramp != Ramp::Set && e.time > from_time => {
                let frac = ((t - from_time) / (e.time - from_time)).clamp(0.0, 1.0);
                interpolate(e.ramp, from, e.value, frac)
            }
            _ => from,
        }
    }

    /// Output gain at time `t`.
    pub fn gain_at(&self, t: f64) -> f64 {
        let mut value = self.initial_gain;
        for (i, target) in self.gain_targets.iter().enumerate() {
            if target.time > t {
                break;
            }
            let until = match self.gain_targets.get(i + 1) {
                Some(next) if next.time <= t => next.time,
                _ => t,
            };
            value = if target.time_constant > 0.0 {
                let decay = libm::exp(-(until - target.time) / target.time_constant);
                target.value + (value - target.value) * decay
            } else {
                target.value
            };
        }
        value
    }

    /// Whether a source node is producing sound at time `t`.
    pub fn is_running(&self, t: f64) -> bool {
        self.runs
            .iter()
            .any(|r| r.start <= t && r.stop.map_or(true, |s| t < s))
    }

    /// Collapse history before `t` into its current state, keeping memory
    /// bounded during long playback.
    pub fn forget_before(&mut self, t: f64) {
        let anchor = self.events.partition_point(|e| e.time <= t);
        if anchor > 1 {
            self.events.drain(..anchor - 1);
        }

        let anchor = self.gain_targets.partition_point(|g| g.time <= t);
        if anchor > 1 {
            let keep = anchor - 1;
            // gain entering the kept target becomes the new starting gain
            self.initial_gain = self.gain_at(self.gain_targets[keep].time);
            self.gain_targets.drain(..keep);
        }

        self.runs.retain(|r| r.stop.map_or(true, |s| s > t));
    }

    fn insert(&mut self, ramp: Ramp, value: f64, time: f64) {
        let at = self.events.partition_point(|e| e.time <= time);
        self.events.insert(at, AutomationEvent { ramp, value, time });
    }
}

impl Default for ParamTimeline {
    fn default() -> Self {
        Self::new(440.0)
    }
}

impl OscillatorSink for ParamTimeline {
    fn set_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(Ramp::Set, value, time);
    }

    fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        self.insert(Ramp::Linear, value, time);
    }

    fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
        if value <= 0.0 {
            log::warn!("exponential ramp to non-positive value {} ignored", value);
            return;
        }
        self.insert(Ramp::Exponential, value, time);
    }

    fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    fn start(&mut self, time: f64) {
        if self.started {
            log::warn!("oscillator already started");
            return;
        }
        self.started = true;
        self.runs.push(Run { start: time, stop: None });
    }

    fn stop(&mut self, time: f64) {
        if let Some(run) = self.runs.last_mut() {
            if run.stop.is_none() {
                run.stop = Some(time.max(run.start));
            }
        }
    }

    fn renew(&mut self) {
        self.started = false;
    }

    fn set_gain_target(&mut self, value: f64, time: f64, time_constant: f64) {
        let at = self.gain_targets.partition_point(|g| g.time <= time);
        self.gain_targets.insert(at, GainTarget { value, time, time_constant });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn interpolate_linear_midpoint() {
        assert_eq!(interpolate(Ramp::Linear, 100.0, 200.0, 0.5), 150.0);
    }

    #[test]
    fn interpolate_exponential_is_geometric() {
        assert!(close(interpolate(Ramp::Exponential, 100.0, 400.0, 0.5), 200.0));
    }

    #[test]
    fn interpolate_exponential_rejects_non_positive_ends() {
        assert_eq!(interpolate(Ramp::Exponential, 0.0, 400.0, 0.5), 0.0);
    }

    #[test]
    fn set_value_holds_until_next_event() {
        let mut tl = ParamTimeline::new(1.0);
        tl.set_value_at_time(100.0, 1.0);
        tl.set_value_at_time(200.0, 2.0);
        assert_eq!(tl.value_at(0.5), 1.0);
        assert_eq!(tl.value_at(1.0), 100.0);
        assert_eq!(tl.value_at(1.99), 100.0);
        assert_eq!(tl.value_at(5.0), 200.0);
    }

    #[test]
    fn ramps_start_at_previous_event() {
        let mut tl = ParamTimeline::new(1.0);
        tl.set_value_at_time(100.0, 1.0);
        tl.linear_ramp_to_value_at_time(200.0, 2.0);
        tl.exponential_ramp_to_value_at_time(800.0, 3.0);
        assert!(close(tl.value_at(1.5), 150.0));
        assert!(close(tl.value_at(2.5), 400.0));
        assert_eq!(tl.value_at(3.5), 800.0);
    }

    #[test]
    fn cancel_drops_events_at_or_after_time() {
        let mut tl = ParamTimeline::new(1.0);
        for i in 0..10 {
            tl.set_value_at_time(i as f64, i as f64);
        }
        tl.cancel_scheduled_values(5.0);
        assert_eq!(tl.events().len(), 5);
        assert_eq!(tl.value_at(9.0), 4.0);
    }

    #[test]
    fn gain_approaches_target() {
        let mut tl = ParamTimeline::default();
        tl.set_gain_target(1.0, 0.0, 0.005);
        assert_eq!(tl.gain_at(0.0), 0.0);
        assert!(tl.gain_at(0.05) > 0.999);
        tl.set_gain_target(0.0001, 1.0, 0.005);
        assert!(tl.gain_at(0.999) > 0.999);
        assert!(tl.gain_at(1.1) < 0.001);
    }

    #[test]
    fn stopped_node_needs_renew_before_restart() {
        let mut tl = ParamTimeline::default();
        tl.start(0.0);
        tl.stop(1.0);
        tl.start(2.0);
        assert_eq!(tl.runs().len(), 1);
        assert!(tl.is_running(0.5));
        assert!(!tl.is_running(1.5));

        tl.renew();
        tl.start(2.0);
        assert!(tl.is_running(2.5));
    }

    #[test]
    fn forget_before_keeps_current_values() {
        let mut tl = ParamTimeline::new(1.0);
        for i in 0..100 {
            tl.set_value_at_time(i as f64, i as f64 * 0.1);
        }
        tl.set_gain_target(1.0, 0.0, 0.005);
        tl.set_gain_target(0.5, 1.0, 0.005);
        tl.set_gain_target(0.25, 2.0, 0.005);

        let value = tl.value_at(5.05);
        let gain = tl.gain_at(5.05);
        tl.forget_before(5.0);
        assert!(tl.events().len() < 60);
        assert_eq!(tl.value_at(5.05), value);
        assert!(close(tl.gain_at(5.05), gain));
    }
}
