//! The parameter-write contract of the external audio graph.

use bs_core::Settings;

/// A frequency parameter plus its one-shot source node and output gain.
///
/// Times are absolute seconds on the same clock the controller is driven
/// with. Exponential ramps require a positive `value`.
pub trait OscillatorSink {
    fn set_value_at_time(&mut self, value: f64, time: f64);
    fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64);
    fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64);
    /// Drop every automation event at or after `time`.
    fn cancel_scheduled_values(&mut self, time: f64);

    fn start(&mut self, time: f64);
    fn stop(&mut self, time: f64);
    /// Replace the stopped node with a fresh one; a stopped node never restarts.
    fn renew(&mut self);

    /// Approach `value` exponentially from `time` with the given time constant.
    fn set_gain_target(&mut self, value: f64, time: f64, time_constant: f64);

    /// Rebuild rate-dependent parts of the graph (filter, LFO).
    fn reconfigure(&mut self, _settings: &Settings) {}
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOscillator;

impl OscillatorSink for NullOscillator {
    fn set_value_at_time(&mut self, _value: f64, _time: f64) {}
    fn linear_ramp_to_value_at_time(&mut self, _value: f64, _time: f64) {}
    fn exponential_ramp_to_value_at_time(&mut self, _value: f64, _time: f64) {}
    fn cancel_scheduled_values(&mut self, _time: f64) {}
    fn start(&mut self, _time: f64) {}
    fn stop(&mut self, _time: f64) {}
    fn renew(&mut self) {}
    fn set_gain_target(&mut self, _value: f64, _time: f64, _time_constant: f64) {}
}
