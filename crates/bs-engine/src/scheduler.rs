//! Event scheduler: turns one block of words into timed sink operations.
//!
//! The scheduler owns every outstanding timer of the current block in a
//! single [`PendingTimers`] set. Any re-plan cancels that whole set before
//! a new one is created, so nothing planned earlier can fire afterwards.
//!
//! Oscillator commands are written to the [`OscillatorSink`] at plan time
//! as automation events; their timers only move the play position. MIDI
//! commands are cached and sent when their timer fires.

use alloc::vec::Vec;

use bs_core::{BitWidth, ByteSource, Command, FrequencyCoefficients, MidiSettings, Settings, TransitionCurve};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::block_planner::MAX_BLOCK_SIZE;
use crate::lattice::NoteLattice;
use crate::mapper::CommandMapper;
use crate::midi::{MidiMessage, MidiSink};
use crate::sink::OscillatorSink;
use crate::timer_queue::{TimerKey, TimerQueue};

/// Floor substituted for unusable exponential-ramp targets.
pub const EXPONENTIAL_FLOOR: f64 = 0.01;

/// Generation counter of block plans. Bumped by every re-plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlanId(pub u64);

/// Payload of every engine timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// Play the command for absolute word `index` of plan `plan`.
    Command { plan: PlanId, index: usize },
    /// Plan the next block starting at `start`.
    AdvanceBlock { block_id: u64, start: usize },
}

/// The live timer set: one timer per planned command plus the block advance.
#[derive(Debug, Default)]
pub struct PendingTimers {
    commands: heapless::Vec<TimerKey, MAX_BLOCK_SIZE>,
    advance: Option<TimerKey>,
}

impl PendingTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every timer in the set.
    pub fn cancel_all(&mut self, queue: &mut TimerQueue<TimerEvent>) {
        for &key in self.commands.iter() {
            queue.cancel(key);
        }
        self.commands.clear();
        if let Some(key) = self.advance.take() {
            queue.cancel(key);
        }
    }
}

/// One block to plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanRequest {
    /// First absolute word index to schedule.
    pub start: usize,
    /// Last absolute word index, inclusive.
    pub end: usize,
    /// Reading steps to wait before the first command.
    pub index_offset: usize,
    pub include_gap: bool,
}

/// Everything a plan reads, snapshotted at plan time.
#[derive(Clone, Copy)]
pub struct PlanContext<'a> {
    pub now: f64,
    pub source: &'a ByteSource,
    pub settings: &'a Settings,
    pub coefficients: &'a FrequencyCoefficients,
    pub lattice: &'a NoteLattice,
}

impl<'a> PlanContext<'a> {
    fn mapper(&self) -> CommandMapper<'a> {
        CommandMapper::new(self.settings, self.coefficients, self.lattice)
    }

    fn word(&self, index: usize, width: BitWidth) -> u16 {
        self.source.word(index, width).unwrap_or_else(|| {
            log::warn!("word {} missing from source, playing 0", index);
            0
        })
    }
}

/// Schedules commands for the oscillator or the MIDI sink.
#[derive(Debug)]
pub struct EventScheduler {
    pending: PendingTimers,
    plan: PlanId,
    /// Absolute index of `times[0]` and `commands[0]`.
    plan_start: usize,
    times: Vec<f64>,
    commands: Vec<Command>,
    /// Last MIDI command sent with a note-on.
    sounding: Option<Command>,
    /// Note left over from a range change, turned off before the next note-on.
    forced_note_off: Option<Command>,
    rng: SmallRng,
}

impl EventScheduler {
    pub fn new(seed: u64) -> Self {
        Self {
            pending: PendingTimers::new(),
            plan: PlanId::default(),
            plan_start: 0,
            times: Vec::with_capacity(MAX_BLOCK_SIZE),
            commands: Vec::with_capacity(MAX_BLOCK_SIZE),
            sounding: None,
            forced_note_off: None,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// The plan whose command timers are live.
    pub fn plan(&self) -> PlanId {
        self.plan
    }

    /// Planned time of absolute word `index` in the current plan.
    pub fn planned_time(&self, index: usize) -> Option<f64> {
        index
            .checked_sub(self.plan_start)
            .and_then(|i| self.times.get(i))
            .copied()
    }

    /// Command of absolute word `index` in the current plan.
    pub fn command(&self, index: usize) -> Option<Command> {
        index
            .checked_sub(self.plan_start)
            .and_then(|i| self.commands.get(i))
            .copied()
    }

    pub fn sounding(&self) -> Option<Command> {
        self.sounding
    }

    pub fn forced_note_off(&self) -> Option<Command> {
        self.forced_note_off
    }

    /// Cancel every pending timer of the current plan.
    pub fn cancel_all(&mut self, queue: &mut TimerQueue<TimerEvent>) {
        self.pending.cancel_all(queue);
    }

    /// Replace the current plan with `req`.
    ///
    /// Cancels the previous timer set first, then creates one command timer
    /// per index in `req.start..=req.end`. Word `start + i` is due
    /// `(i + index_offset) * step` seconds after `now`, plus a random gap
    /// below one step when requested. Returns the number of command timers.
    pub fn plan_block<O: OscillatorSink>(
        &mut self,
        ctx: &PlanContext<'_>,
        req: PlanRequest,
        queue: &mut TimerQueue<TimerEvent>,
        osc: &mut O,
    ) -> usize {
        self.cancel_all(queue);
        self.plan = PlanId(self.plan.0 + 1);
        self.plan_start = req.start;
        self.times.clear();
        self.commands.clear();

        if req.start > req.end {
            return 0;
        }

        let settings = ctx.settings;
        let mapper = ctx.mapper();
        let step = settings.step_seconds();
        let midi = settings.midi_mode;

        for (i, index) in (req.start..=req.end).enumerate() {
            let gap = if req.include_gap {
                self.rng.gen::<f64>() * step
            } else {
                0.0
            };
            let delay = (i + req.index_offset) as f64 * step + gap;
            let time = ctx.now + delay;
            let command = mapper.command(ctx.word(index, settings.bit_width), midi);

            if !midi {
                issue_transition(osc, command, time, settings.transition);
            }

            let key = queue.schedule(ctx.now, delay, TimerEvent::Command { plan: self.plan, index });
            if self.pending.commands.push(key).is_err() {
                log::warn!("block {}..={} exceeds {} commands, truncated", req.start, req.end, MAX_BLOCK_SIZE);
                queue.cancel(key);
                break;
            }
            self.times.push(time);
            self.commands.push(command);
        }

        log::debug!(
            "plan {:?}: words {}..={} offset {} ({} timers)",
            self.plan,
            req.start,
            req.end,
            req.index_offset,
            self.commands.len()
        );
        self.commands.len()
    }

    /// Schedule the block advance, replacing any earlier one.
    pub fn schedule_advance(
        &mut self,
        queue: &mut TimerQueue<TimerEvent>,
        now: f64,
        delay: f64,
        block_id: u64,
        start: usize,
    ) -> TimerKey {
        if let Some(old) = self.pending.advance.take() {
            queue.cancel(old);
        }
        let key = queue.schedule(now, delay, TimerEvent::AdvanceBlock { block_id, start });
        self.pending.advance = Some(key);
        key
    }

    /// Recompute oscillator commands still ahead of `ctx.now` and issue them
    /// again at their planned times. Timers are left alone.
    pub fn reramp_remaining<O: OscillatorSink>(&mut self, ctx: &PlanContext<'_>, osc: &mut O) -> usize {
        let settings = ctx.settings;
        let mapper = ctx.mapper();
        osc.cancel_scheduled_values(ctx.now);

        let mut reissued = 0;
        for (i, (&time, command)) in self.times.iter().zip(self.commands.iter_mut()).enumerate() {
            if time < ctx.now {
                continue;
            }
            *command = mapper.oscillator(ctx.word(self.plan_start + i, settings.bit_width));
            issue_transition(osc, *command, time, settings.transition);
            reissued += 1;
        }
        reissued
    }

    /// Recompute cached MIDI commands from absolute index `from` on. The
    /// note now sounding is turned off before the next note-on.
    pub fn recompute_midi(&mut self, ctx: &PlanContext<'_>, from: usize) -> usize {
        if let Some(sounding) = self.sounding.take() {
            self.forced_note_off = Some(sounding);
        }

        let mapper = ctx.mapper();
        let width = ctx.settings.bit_width;
        let skip = from.saturating_sub(self.plan_start);
        let mut recomputed = 0;
        for (i, command) in self.commands.iter_mut().enumerate().skip(skip) {
            *command = mapper.midi(ctx.word(self.plan_start + i, width));
            recomputed += 1;
        }
        recomputed
    }

    /// Send the MIDI command cached for absolute word `index`.
    ///
    /// Returns whether a note-on went out. In solid mode a command equal to
    /// the sounding one is held rather than retriggered, and no note-off is
    /// sent between different commands.
    pub fn play_command<M: MidiSink>(&mut self, index: usize, midi: &MidiSettings, sink: &mut M) -> bool {
        let Some(command) = self.command(index) else {
            return false;
        };
        let Some(note) = command.note() else {
            return false;
        };

        if midi.solid_mode && self.forced_note_off.is_none() && self.sounding == Some(command) {
            return false;
        }

        let velocity = midi.velocity;
        if let Some(forced) = self.forced_note_off.take() {
            note_off(sink, forced, velocity, midi.channel);
        }
        if !midi.solid_mode {
            if let Some(previous) = self.sounding.take() {
                note_off(sink, previous, velocity, midi.channel);
            }
        }

        sink.send_message(MidiMessage::NoteOn { note, velocity }, midi.channel);
        if let Some(bend) = command.bend() {
            sink.send_message(MidiMessage::PitchBend(bend), midi.channel);
        }
        self.sounding = Some(command);
        true
    }

    /// Turn off the sounding note and any pending forced note-off.
    pub fn release<M: MidiSink>(&mut self, midi: &MidiSettings, sink: &mut M) {
        if let Some(forced) = self.forced_note_off.take() {
            note_off(sink, forced, midi.velocity, midi.channel);
        }
        if let Some(sounding) = self.sounding.take() {
            note_off(sink, sounding, midi.velocity, midi.channel);
        }
    }

    /// [`release`](Self::release) followed by all-sound-off.
    pub fn silence<M: MidiSink>(&mut self, midi: &MidiSettings, sink: &mut M) {
        self.release(midi, sink);
        sink.send_message(MidiMessage::AllSoundOff, midi.channel);
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

fn note_off<M: MidiSink>(sink: &mut M, command: Command, velocity: u8, channel: u8) {
    if let Some(note) = command.note() {
        sink.send_message(MidiMessage::NoteOff { note, velocity }, channel);
    }
}

/// Target actually written for a command: non-finite or missing values fall
/// back to 0, or to [`EXPONENTIAL_FLOOR`] for exponential ramps, which also
/// reject non-positive targets.
pub fn safe_target(value: Option<f64>, curve: TransitionCurve) -> f64 {
    let exponential = curve == TransitionCurve::Exponential;
    match value {
        Some(v) if v.is_finite() && (!exponential || v > 0.0) => v,
        _ if exponential => EXPONENTIAL_FLOOR,
        _ => 0.0,
    }
}

fn issue_transition<O: OscillatorSink>(osc: &mut O, command: Command, time: f64, curve: TransitionCurve) {
    let value = match command {
        Command::Frequency(f) => safe_target(f, curve),
        _ => return,
    };
    match curve {
        TransitionCurve::Immediate => osc.set_value_at_time(value, time),
        TransitionCurve::Linear => osc.linear_ramp_to_value_at_time(value, time),
        TransitionCurve::Exponential => osc.exponential_ramp_to_value_at_time(value, time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use bs_core::{FrequencyMode, Fragment};

    #[derive(Default)]
    struct Ramps(Vec<(f64, f64)>);

    impl OscillatorSink for Ramps {
        fn set_value_at_time(&mut self, value: f64, time: f64) {
            self.0.push((value, time));
        }
        fn linear_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
            self.0.push((value, time));
        }
        fn exponential_ramp_to_value_at_time(&mut self, value: f64, time: f64) {
            self.0.push((value, time));
        }
        fn cancel_scheduled_values(&mut self, time: f64) {
            self.0.retain(|&(_, t)| t < time);
        }
        fn start(&mut self, _time: f64) {}
        fn stop(&mut self, _time: f64) {}
        fn renew(&mut self) {}
        fn set_gain_target(&mut self, _value: f64, _time: f64, _time_constant: f64) {}
    }

    #[derive(Default)]
    struct Wire(Vec<Vec<u8>>);

    impl MidiSink for Wire {
        fn send(&mut self, message: &[u8]) {
            self.0.push(message.to_vec());
        }
    }

    impl Wire {
        fn note_ons(&self) -> usize {
            self.0.iter().filter(|m| m[0] & 0xf0 == 0x90).count()
        }
        fn note_offs(&self) -> usize {
            self.0.iter().filter(|m| m[0] & 0xf0 == 0x80).count()
        }
    }

    struct Fixture {
        source: ByteSource,
        settings: Settings,
        coefficients: FrequencyCoefficients,
        lattice: NoteLattice,
    }

    impl Fixture {
        fn new(bytes: Vec<u8>) -> Self {
            let mut settings = Settings::default();
            settings.random_gap = false;
            settings.fragment = Fragment { from: 0, to: bytes.len() - 1 };
            let coefficients = FrequencyCoefficients::from_settings(&settings);
            Self {
                source: ByteSource::from(bytes),
                settings,
                coefficients,
                lattice: NoteLattice::equal_temperament(),
            }
        }

        fn ctx(&self, now: f64) -> PlanContext<'_> {
            PlanContext {
                now,
                source: &self.source,
                settings: &self.settings,
                coefficients: &self.coefficients,
                lattice: &self.lattice,
            }
        }

        fn refresh(&mut self) {
            self.coefficients = FrequencyCoefficients::from_settings(&self.settings);
        }
    }

    fn request(start: usize, end: usize, index_offset: usize) -> PlanRequest {
        PlanRequest { start, end, index_offset, include_gap: false }
    }

    fn drain(queue: &mut TimerQueue<TimerEvent>, now: f64) -> Vec<TimerEvent> {
        core::iter::from_fn(|| queue.pop_due(now).map(|(_, e)| e)).collect()
    }

    #[test]
    fn plan_creates_one_timer_per_word() {
        let fx = Fixture::new(vec![1; 100]);
        let mut queue = TimerQueue::new();
        let mut osc = Ramps::default();
        let mut sched = EventScheduler::new(1);

        let n = sched.plan_block(&fx.ctx(0.0), request(10, 59, 0), &mut queue, &mut osc);
        assert_eq!(n, 50);
        assert_eq!(queue.len(), 50);
        assert_eq!(osc.0.len(), 50);
    }

    #[test]
    fn command_times_follow_index_offset() {
        let fx = Fixture::new(vec![1; 10]);
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);

        sched.plan_block(&fx.ctx(2.0), request(3, 6, 1), &mut queue, &mut Ramps::default());
        let step = fx.settings.step_seconds();
        for (i, index) in (3..=6).enumerate() {
            let expected = 2.0 + (i + 1) as f64 * step;
            assert!((sched.planned_time(index).unwrap() - expected).abs() < 1e-12);
        }
        assert_eq!(sched.planned_time(2), None);
    }

    #[test]
    fn random_gap_keeps_order_strict() {
        let fx = Fixture::new(vec![9; 300]);
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(42);
        let req = PlanRequest { include_gap: true, ..request(0, 299, 0) };

        sched.plan_block(&fx.ctx(0.0), req, &mut queue, &mut Ramps::default());
        let step = fx.settings.step_seconds();
        let times: Vec<f64> = (0..300).map(|i| sched.planned_time(i).unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        for (i, t) in times.iter().enumerate() {
            assert!(*t >= i as f64 * step && *t < (i + 1) as f64 * step);
        }
    }

    #[test]
    fn replan_cancels_every_earlier_timer() {
        let fx = Fixture::new(vec![5; 1000]);
        let mut queue = TimerQueue::new();
        let mut osc = Ramps::default();
        let mut sched = EventScheduler::new(1);

        sched.plan_block(&fx.ctx(0.0), request(0, 499, 0), &mut queue, &mut osc);
        let first = sched.plan();
        sched.schedule_advance(&mut queue, 0.0, 5.0, 0, 500);
        sched.plan_block(&fx.ctx(0.0), request(500, 999, 0), &mut queue, &mut osc);
        let second = sched.plan();
        assert_ne!(first, second);

        let fired = drain(&mut queue, f64::MAX);
        assert_eq!(fired.len(), 500);
        for event in fired {
            match event {
                TimerEvent::Command { plan, index } => {
                    assert_eq!(plan, second);
                    assert!(index >= 500);
                }
                TimerEvent::AdvanceBlock { .. } => panic!("stale advance fired"),
            }
        }
    }

    #[test]
    fn empty_request_creates_no_timers() {
        let fx = Fixture::new(vec![5; 10]);
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        assert_eq!(sched.plan_block(&fx.ctx(0.0), request(6, 5, 0), &mut queue, &mut Ramps::default()), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn reramp_only_touches_future_events() {
        let mut fx = Fixture::new(vec![200; 100]);
        let mut queue = TimerQueue::new();
        let mut osc = Ramps::default();
        let mut sched = EventScheduler::new(1);

        sched.plan_block(&fx.ctx(0.0), request(0, 99, 0), &mut queue, &mut osc);
        let before: Vec<_> = osc.0.clone();

        fx.settings.frequency_range.to = 1000.0;
        fx.refresh();
        let now = 0.5;
        let reissued = sched.reramp_remaining(&fx.ctx(now), &mut osc);

        let past: Vec<_> = before.iter().filter(|(_, t)| *t < now).copied().collect();
        assert_eq!(reissued, before.len() - past.len());
        assert_eq!(&osc.0[..past.len()], past.as_slice());
        for &(value, time) in &osc.0[past.len()..] {
            assert!(time >= now);
            assert!(value > before[0].0);
        }
        assert_eq!(queue.len(), 100);
    }

    #[test]
    fn solid_mode_holds_repeated_command() {
        let mut fx = Fixture::new(vec![10, 10, 20]);
        fx.settings.midi_mode = true;
        fx.settings.frequency_mode = FrequencyMode::Tempered;
        fx.settings.midi.solid_mode = true;
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        let mut wire = Wire::default();

        sched.plan_block(&fx.ctx(0.0), request(0, 2, 0), &mut queue, &mut Ramps::default());
        let played: Vec<bool> = (0..3).map(|i| sched.play_command(i, &fx.settings.midi, &mut wire)).collect();
        assert_eq!(played, [true, false, true]);
        assert_eq!(wire.note_ons(), 2);
        assert_eq!(wire.note_offs(), 0);
    }

    #[test]
    fn non_solid_mode_turns_previous_note_off() {
        let mut fx = Fixture::new(vec![10, 10, 20]);
        fx.settings.midi_mode = true;
        fx.settings.frequency_mode = FrequencyMode::Tempered;
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        let mut wire = Wire::default();

        sched.plan_block(&fx.ctx(0.0), request(0, 2, 0), &mut queue, &mut Ramps::default());
        for i in 0..3 {
            sched.play_command(i, &fx.settings.midi, &mut wire);
        }
        assert_eq!(wire.note_ons(), 3);
        assert_eq!(wire.note_offs(), 2);
        assert_eq!(wire.0[1], vec![0x80, 36, 120]);
    }

    #[test]
    fn continuous_midi_sends_pitch_bend_after_note_on() {
        let mut fx = Fixture::new(vec![77]);
        fx.settings.midi_mode = true;
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        let mut wire = Wire::default();

        sched.plan_block(&fx.ctx(0.0), request(0, 0, 0), &mut queue, &mut Ramps::default());
        sched.play_command(0, &fx.settings.midi, &mut wire);
        assert_eq!(wire.0.len(), 2);
        assert_eq!(wire.0[0][0], 0x90);
        assert_eq!(wire.0[1][0], 0xE0);
    }

    #[test]
    fn range_change_forces_note_off_before_next_note() {
        let mut fx = Fixture::new(vec![10, 10]);
        fx.settings.midi_mode = true;
        fx.settings.frequency_mode = FrequencyMode::Tempered;
        fx.settings.midi.solid_mode = true;
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        let mut wire = Wire::default();

        sched.plan_block(&fx.ctx(0.0), request(0, 1, 0), &mut queue, &mut Ramps::default());
        sched.play_command(0, &fx.settings.midi, &mut wire);

        fx.settings.note_range.from = 60;
        fx.settings.note_range.to = 72;
        fx.refresh();
        assert_eq!(sched.recompute_midi(&fx.ctx(0.005), 1), 1);
        assert_eq!(sched.forced_note_off(), Some(Command::Note(36)));

        assert!(sched.play_command(1, &fx.settings.midi, &mut wire));
        assert_eq!(wire.0[1], vec![0x80, 36, 120]);
        assert_eq!(wire.0[2], vec![0x90, 60, 120]);
        assert_eq!(sched.forced_note_off(), None);
    }

    #[test]
    fn silence_turns_everything_off() {
        let mut fx = Fixture::new(vec![10]);
        fx.settings.midi_mode = true;
        fx.settings.frequency_mode = FrequencyMode::Tempered;
        let mut queue = TimerQueue::new();
        let mut sched = EventScheduler::new(1);
        let mut wire = Wire::default();

        sched.plan_block(&fx.ctx(0.0), request(0, 0, 0), &mut queue, &mut Ramps::default());
        sched.play_command(0, &fx.settings.midi, &mut wire);
        sched.silence(&fx.settings.midi, &mut wire);
        assert_eq!(wire.0.last().unwrap(), &vec![0xB0, 0x78, 0]);
        assert_eq!(wire.note_offs(), 1);
        assert_eq!(sched.sounding(), None);
    }

    #[test]
    fn safe_target_substitutes_floors() {
        assert_eq!(safe_target(None, TransitionCurve::Immediate), 0.0);
        assert_eq!(safe_target(Some(f64::NAN), TransitionCurve::Linear), 0.0);
        assert_eq!(safe_target(Some(f64::INFINITY), TransitionCurve::Exponential), EXPONENTIAL_FLOOR);
        assert_eq!(safe_target(Some(0.0), TransitionCurve::Exponential), EXPONENTIAL_FLOOR);
        assert_eq!(safe_target(Some(-3.0), TransitionCurve::Immediate), -3.0);
        assert_eq!(safe_target(Some(220.0), TransitionCurve::Exponential), 220.0);
    }
}
