//! Integration test: MIDI mode playback against a recording port.

use bs_core::{ByteSource, Fragment, FrequencyMode, ParamChange, Settings};
use bs_engine::{MidiSink, NullOscillator, PlaybackController};

#[derive(Default)]
struct Wire(Vec<Vec<u8>>);

impl MidiSink for Wire {
    fn send(&mut self, message: &[u8]) {
        self.0.push(message.to_vec());
    }
}

impl Wire {
    fn with_status(&self, status: u8) -> Vec<&Vec<u8>> {
        self.0.iter().filter(|m| m[0] & 0xf0 == status).collect()
    }
}

fn tempered(words: &[u8], solid: bool) -> PlaybackController<NullOscillator, Wire> {
    let mut settings = Settings::default();
    settings.random_gap = false;
    settings.looping = false;
    settings.midi_mode = true;
    settings.frequency_mode = FrequencyMode::Tempered;
    settings.midi.solid_mode = solid;
    settings.fragment = Fragment { from: 0, to: words.len() - 1 };
    let mut ctl = PlaybackController::new(settings, NullOscillator, Wire::default());
    ctl.load(0.0, ByteSource::from(words.to_vec()));
    ctl
}

// Default note range 36..=48 splits the 8-bit words into 13 bins of ~19.7:
// words 10 -> note 36, 20 -> note 37.

#[test]
fn solid_mode_holds_repeated_notes() {
    let mut ctl = tempered(&[10, 10, 20], true);
    ctl.play(0.0);
    ctl.poll(1.0);
    assert!(!ctl.is_playing());

    let wire = &ctl.midi().0;
    assert_eq!(
        wire,
        &vec![
            vec![0xB0, 0x01, 50],
            vec![0x90, 36, 120],
            vec![0x90, 37, 120],
            vec![0x80, 37, 120],
            vec![0xB0, 0x78, 0],
        ]
    );
}

#[test]
fn loop_releases_held_note_before_next_pass() {
    let mut ctl = tempered(&[10, 10], true);
    ctl.apply(0.0, ParamChange::Loop(true));
    ctl.play(0.0);
    // the second pass starts at 0.02
    ctl.poll(0.025);
    assert!(ctl.is_playing());
    assert_eq!(ctl.status().iteration, 1);

    // solid mode would hold note 36 across the wrap without the flush
    let wire = &ctl.midi().0;
    assert_eq!(
        wire,
        &vec![
            vec![0xB0, 0x01, 50],
            vec![0x90, 36, 120],
            vec![0x80, 36, 120],
            vec![0x90, 36, 120],
        ]
    );
}

#[test]
fn non_solid_mode_retriggers_every_word() {
    let mut ctl = tempered(&[10, 10, 20], false);
    ctl.play(0.0);
    ctl.poll(1.0);

    let wire = ctl.midi();
    assert_eq!(wire.with_status(0x90).len(), 3);
    assert_eq!(wire.with_status(0x80).len(), 3);
    // every note-on but the first follows the previous note's note-off
    let ons: Vec<usize> = wire.0.iter().enumerate().filter(|(_, m)| m[0] == 0x90).map(|(i, _)| i).collect();
    for &i in &ons[1..] {
        assert_eq!(wire.0[i - 1][0], 0x80);
    }
}

#[test]
fn continuous_mode_bends_after_note_on() {
    let mut ctl = tempered(&[100, 200], false);
    ctl.apply(0.0, ParamChange::FrequencyMode(FrequencyMode::Continuous));
    ctl.play(0.0);
    ctl.poll(1.0);

    let wire = &ctl.midi().0;
    let on = wire.iter().position(|m| m[0] == 0x90).unwrap();
    assert_eq!(wire[on + 1][0], 0xE0);
    let bend = (wire[on + 1][2] as u16) << 7 | wire[on + 1][1] as u16;
    assert!((4095..=12287).contains(&bend), "bend {}", bend);
}

#[test]
fn stop_sends_note_off_and_all_sound_off() {
    let mut ctl = tempered(&[10, 20, 30, 40, 50], false);
    ctl.play(0.0);
    ctl.poll(0.015);
    ctl.stop(0.015);

    let wire = &ctl.midi().0;
    let n = wire.len();
    assert_eq!(wire[n - 2], vec![0x80, 37, 120]);
    assert_eq!(wire[n - 1], vec![0xB0, 0x78, 0]);
    assert_eq!(ctl.pending_timers(), 0);
    assert!(ctl.scheduler().sounding().is_none());
}

#[test]
fn range_change_turns_off_sounding_note_before_next() {
    let mut ctl = tempered(&[10, 10, 10, 10], true);
    ctl.play(0.0);
    ctl.poll(0.015);
    let pending = ctl.pending_timers();

    let notes = bs_core::NoteRange { from: 60, to: 72 };
    ctl.apply(0.015, ParamChange::NoteRange(notes));
    assert_eq!(ctl.pending_timers(), pending);

    ctl.poll(0.025);
    let wire = &ctl.midi().0;
    let n = wire.len();
    assert_eq!(wire[n - 2], vec![0x80, 36, 120]);
    assert_eq!(wire[n - 1], vec![0x90, 60, 120]);
}

#[test]
fn channel_change_silences_old_channel() {
    let mut ctl = tempered(&[10, 20, 30, 40], false);
    ctl.play(0.0);
    ctl.poll(0.005);
    ctl.apply(0.005, ParamChange::MidiChannel(3));

    let wire = &ctl.midi().0;
    let n = wire.len();
    assert_eq!(wire[n - 3], vec![0x80, 36, 120]);
    assert_eq!(wire[n - 2], vec![0xB0, 0x78, 0]);
    assert_eq!(wire[n - 1], vec![0xB3, 0x01, 50]);

    ctl.poll(0.015);
    assert_eq!(ctl.midi().0.last().unwrap()[0], 0x93);
}

#[test]
fn channel_beyond_sixteen_that_masks_to_current_is_ignored() {
    let mut ctl = tempered(&[10, 20, 30, 40], false);
    ctl.play(0.0);
    ctl.poll(0.005);
    let sent = ctl.midi().0.len();

    // 16 masks to channel 0, already in use
    assert_eq!(ctl.apply(0.005, ParamChange::MidiChannel(16)), None);
    assert_eq!(ctl.midi().0.len(), sent);
    assert_eq!(ctl.settings().midi.channel, 0);
}
