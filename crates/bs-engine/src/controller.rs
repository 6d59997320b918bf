//! Playback controller: the Stopped/Playing state machine.
//!
//! Drives block-to-block advancement through the timer queue and applies
//! live parameter changes by re-planning only the unplayed remainder of
//! the current block. Every operation takes the current clock time; the
//! caller owns the clock and calls [`PlaybackController::poll`] to fire
//! due timers.

use bs_core::{
    BlockRange, ByteSource, Fragment, FrequencyCoefficients, ParamChange, PlaybackStatus,
    ReplanClass, Settings,
};

use crate::block_planner;
use crate::lattice::NoteLattice;
use crate::midi::{MidiMessage, MidiSink};
use crate::scheduler::{EventScheduler, PlanContext, PlanId, PlanRequest, TimerEvent};
use crate::sink::OscillatorSink;
use crate::timer_queue::TimerQueue;

/// Time constant of gain fades.
pub const GAIN_TIME_CONSTANT: f64 = 0.005;
/// Gain target on stop. Exponential approaches never reach zero.
pub const STOP_GAIN: f64 = 0.0001;
/// Delay between the stop fade and halting the oscillator.
pub const STOP_DELAY: f64 = 0.1;

/// Plays a [`ByteSource`] through an oscillator sink or a MIDI sink.
pub struct PlaybackController<O: OscillatorSink, M: MidiSink> {
    settings: Settings,
    coefficients: FrequencyCoefficients,
    lattice: NoteLattice,
    source: ByteSource,
    status: PlaybackStatus,
    queue: TimerQueue<TimerEvent>,
    scheduler: EventScheduler,
    oscillator: O,
    midi: M,
}

impl<O: OscillatorSink, M: MidiSink> PlaybackController<O, M> {
    pub fn new(settings: Settings, oscillator: O, midi: M) -> Self {
        let mut settings = settings;
        settings.clamp_to_nyquist();
        let mut oscillator = oscillator;
        oscillator.reconfigure(&settings);
        Self {
            coefficients: FrequencyCoefficients::from_settings(&settings),
            settings,
            lattice: NoteLattice::equal_temperament(),
            source: ByteSource::empty(),
            status: PlaybackStatus::default(),
            queue: TimerQueue::new(),
            scheduler: EventScheduler::default(),
            oscillator,
            midi,
        }
    }

    /// Seed the random gap generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.scheduler = EventScheduler::new(seed);
        self
    }

    // -- accessors --

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status.playing
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn coefficients(&self) -> &FrequencyCoefficients {
        &self.coefficients
    }

    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    pub fn scheduler(&self) -> &EventScheduler {
        &self.scheduler
    }

    pub fn oscillator(&self) -> &O {
        &self.oscillator
    }

    pub fn oscillator_mut(&mut self) -> &mut O {
        &mut self.oscillator
    }

    pub fn midi(&self) -> &M {
        &self.midi
    }

    pub fn midi_mut(&mut self) -> &mut M {
        &mut self.midi
    }

    /// Live timers, commands and block advance together.
    pub fn pending_timers(&self) -> usize {
        self.queue.len()
    }

    /// When the next timer is due, for drivers that sleep between polls.
    pub fn next_due(&self) -> Option<f64> {
        self.queue.next_due()
    }

    /// The fragment clamped to the active view of the source.
    pub fn fragment(&self) -> Option<Fragment> {
        self.settings
            .fragment
            .clamp_to(self.source.len(self.settings.bit_width))
    }

    // -- source --

    /// Replace the source. Playback stops.
    pub fn load(&mut self, now: f64, source: ByteSource) {
        self.stop(now);
        log::info!("loaded {} bytes", source.as_bytes().len());
        self.source = source;
    }

    /// Drop the source. Playback stops.
    pub fn unload(&mut self, now: f64) {
        self.stop(now);
        self.source = ByteSource::empty();
    }

    // -- state machine --

    /// Start playing at the fragment start. Returns false when already
    /// playing or when there is nothing to play.
    pub fn play(&mut self, now: f64) -> bool {
        if self.status.playing {
            return false;
        }
        let Some(fragment) = self.fragment() else {
            log::warn!("play ignored: no source loaded");
            return false;
        };

        if self.settings.midi_mode {
            self.oscillator
                .set_gain_target(self.settings.gain, now, GAIN_TIME_CONSTANT);
            self.send_modulation();
        } else {
            self.start_oscillator(now);
        }

        self.status = PlaybackStatus {
            playing: true,
            ..PlaybackStatus::default()
        };
        log::info!("play: words {}..={}", fragment.from, fragment.to);
        self.advance_block(now, 0, fragment.from);
        true
    }

    /// Stop playing. A no-op when already stopped.
    pub fn stop(&mut self, now: f64) {
        if !self.status.playing {
            return;
        }
        self.scheduler.cancel_all(&mut self.queue);

        if self.settings.midi_mode {
            self.scheduler.silence(&self.settings.midi, &mut self.midi);
        } else {
            self.halt_oscillator(now);
        }

        self.status.playing = false;
        self.status.offset_in_block = 0;
        log::info!("stop at word {}", self.status.position());
    }

    /// Fire every timer due at or before `now`. Returns how many fired.
    pub fn poll(&mut self, now: f64) -> usize {
        let mut fired = 0;
        while let Some((due, event)) = self.queue.pop_due(now) {
            fired += 1;
            match event {
                TimerEvent::Command { plan, index } => self.on_command(plan, index),
                // the block starts when it was due, keeping timing contiguous
                TimerEvent::AdvanceBlock { block_id, start } => self.advance_block(due, block_id, start),
            }
        }
        fired
    }

    fn on_command(&mut self, plan: PlanId, index: usize) {
        if plan != self.scheduler.plan() {
            log::warn!("timer of superseded plan {:?} for word {} ignored", plan, index);
            return;
        }
        self.status.offset_in_block = (index + 1).saturating_sub(self.status.block.start);
        if self.settings.midi_mode {
            self.scheduler
                .play_command(index, &self.settings.midi, &mut self.midi);
        }
    }

    /// Plan block `block_id` starting at `start`, wrapping or stopping at the
    /// fragment end.
    pub fn advance_block(&mut self, now: f64, block_id: u64, start: usize) {
        self.begin_block(now, block_id, start, 0);
    }

    fn begin_block(&mut self, now: f64, block_id: u64, start: usize, index_offset: usize) {
        if !self.status.playing {
            return;
        }
        let Some(fragment) = self.fragment() else {
            log::warn!("source emptied during playback");
            self.stop(now);
            return;
        };

        if start > fragment.to {
            if self.settings.midi_mode {
                self.scheduler.release(&self.settings.midi, &mut self.midi);
            }
            if self.settings.looping {
                self.status.iteration += 1;
                log::debug!("loop {}: back to word {}", self.status.iteration, fragment.from);
                self.begin_block(now, 0, fragment.from, index_offset);
            } else {
                log::info!("fragment end reached");
                self.stop(now);
            }
            return;
        }

        let end = match block_planner::next_block_end(start, fragment.to, self.settings.bit_width) {
            Ok(end) => end,
            Err(e) => {
                log::warn!("{}", e);
                self.stop(now);
                return;
            }
        };
        self.status.block = BlockRange { start, end };
        self.status.block_id = block_id;
        self.status.offset_in_block = 0;
        self.plan_from(now, start, index_offset);
    }

    /// Plan words `resume..=block.end` and the advance to the next block.
    fn plan_from(&mut self, now: f64, resume: usize, index_offset: usize) {
        let block = self.status.block;
        let req = PlanRequest {
            start: resume,
            end: block.end,
            index_offset,
            include_gap: self.settings.random_gap,
        };
        let ctx = PlanContext {
            now,
            source: &self.source,
            settings: &self.settings,
            coefficients: &self.coefficients,
            lattice: &self.lattice,
        };
        self.scheduler
            .plan_block(&ctx, req, &mut self.queue, &mut self.oscillator);

        let steps = (block.end + 1).saturating_sub(resume) + index_offset;
        let delay = steps as f64 * self.settings.step_seconds();
        self.scheduler.schedule_advance(
            &mut self.queue,
            now,
            delay,
            self.status.block_id + 1,
            block.end + 1,
        );
    }

    /// Steps to wait before the first resumed command: a command already
    /// sounding keeps its full step.
    fn resume_offset(&self) -> usize {
        if self.status.offset_in_block > 0 {
            1
        } else {
            0
        }
    }

    // -- live reconfiguration --

    /// Apply one parameter change and re-plan as its class requires.
    ///
    /// Returns the class that was handled, or `None` when the value did not
    /// change.
    pub fn apply(&mut self, now: f64, change: ParamChange) -> Option<ReplanClass> {
        let old_midi_mode = self.settings.midi_mode;
        let old_channel = self.settings.midi.channel;
        self.settings.apply(change)?;

        let class = change.class();
        if matches!(change, ParamChange::SampleRate(_)) {
            self.settings.clamp_to_nyquist();
        }
        if class == ReplanClass::Range || matches!(change, ParamChange::SampleRate(_)) {
            self.coefficients = FrequencyCoefficients::from_settings(&self.settings);
        }

        log::debug!("{:?} -> {:?} replan", change, class);
        match class {
            ReplanClass::Output => self.apply_output(now, change, old_channel),
            ReplanClass::Passive => {}
            _ if !self.status.playing => {
                if matches!(change, ParamChange::SampleRate(_)) {
                    self.oscillator.reconfigure(&self.settings);
                }
            }
            ReplanClass::Timing => self.replan_timing(now),
            ReplanClass::Range => self.replan_range(now),
            ReplanClass::Topology => self.replan_topology(now, change, old_midi_mode),
        }
        Some(class)
    }

    fn replan_timing(&mut self, now: f64) {
        let position = self.status.position();
        let offset = self.resume_offset();
        if !self.settings.midi_mode {
            self.oscillator.cancel_scheduled_values(now);
        }
        self.plan_from(now, position, offset);
    }

    fn replan_range(&mut self, now: f64) {
        let ctx = PlanContext {
            now,
            source: &self.source,
            settings: &self.settings,
            coefficients: &self.coefficients,
            lattice: &self.lattice,
        };
        if self.settings.midi_mode {
            self.scheduler.recompute_midi(&ctx, self.status.position());
        } else {
            self.scheduler.reramp_remaining(&ctx, &mut self.oscillator);
        }
    }

    fn replan_topology(&mut self, now: f64, change: ParamChange, old_midi_mode: bool) {
        let offset = self.resume_offset();
        self.scheduler.cancel_all(&mut self.queue);

        // silence the old sink before the new one makes a sound
        if old_midi_mode {
            self.scheduler.silence(&self.settings.midi, &mut self.midi);
        } else {
            self.oscillator.cancel_scheduled_values(now);
        }

        match change {
            ParamChange::MidiMode(true) => {
                self.halt_oscillator(now);
                self.send_modulation();
            }
            ParamChange::MidiMode(false) => self.start_oscillator(now),
            ParamChange::SampleRate(_) => {
                self.oscillator.reconfigure(&self.settings);
                if !self.settings.midi_mode {
                    self.oscillator.stop(now);
                    self.oscillator.renew();
                    self.start_oscillator(now);
                }
            }
            _ => {}
        }

        let Some(fragment) = self.fragment() else {
            log::warn!("nothing left to play after {:?}", change);
            self.stop(now);
            return;
        };
        let position = self.status.position();
        let (resume, offset) = if fragment.contains(position) {
            (position, offset)
        } else {
            (fragment.from, 0)
        };
        self.begin_block(now, self.status.block_id, resume, offset);
    }

    fn apply_output(&mut self, now: f64, change: ParamChange, old_channel: u8) {
        match change {
            ParamChange::Gain(gain) => {
                if self.status.playing && !self.settings.midi_mode {
                    self.oscillator.set_gain_target(gain, now, GAIN_TIME_CONSTANT);
                }
            }
            ParamChange::MidiChannel(_) => {
                if self.status.playing && self.settings.midi_mode {
                    let mut old = self.settings.midi;
                    old.channel = old_channel;
                    self.scheduler.silence(&old, &mut self.midi);
                    self.send_modulation();
                }
            }
            ParamChange::Modulation(_) => {
                if self.settings.midi_mode {
                    self.send_modulation();
                }
            }
            ParamChange::FilterCutoff(_) | ParamChange::LfoRate(_) => {
                self.oscillator.reconfigure(&self.settings);
            }
            _ => {}
        }
    }

    // -- sink helpers --

    fn send_modulation(&mut self) {
        let midi = self.settings.midi;
        self.midi
            .send_message(MidiMessage::Modulation(midi.modulation), midi.channel);
    }

    /// Start a run. Values still scheduled from a run halted less than
    /// [`STOP_DELAY`] ago are dropped first.
    fn start_oscillator(&mut self, now: f64) {
        self.oscillator.cancel_scheduled_values(now);
        self.oscillator
            .set_gain_target(self.settings.gain, now, GAIN_TIME_CONSTANT);
        self.oscillator.start(now);
    }

    /// Fade out, halt after [`STOP_DELAY`] and get a fresh node ready.
    fn halt_oscillator(&mut self, now: f64) {
        self.oscillator
            .set_gain_target(STOP_GAIN, now, GAIN_TIME_CONSTANT);
        self.oscillator.stop(now + STOP_DELAY);
        self.oscillator.cancel_scheduled_values(now + STOP_DELAY);
        self.oscillator.renew();
    }
}
