//! Real-time playback driver.
//!
//! One thread owns the controller, the audio stream and the MIDI port.
//! Time is the audio clock of [`CpalOutput`]. Commands arrive over a channel
//! and are applied between chunks; the status is published after every
//! chunk.

use std::sync::Arc;
use std::thread::JoinHandle;

use bs_audio::{AudioError, AudioOutput, CpalOutput, MidirOutput};
use bs_core::{ByteSource, ParamChange, PlaybackStatus, Settings};
use bs_engine::{Frame, ParamTimeline, PlaybackController, ToneGenerator};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::error::SessionError;

/// Frames rendered between two polls of the controller.
const CHUNK: usize = 256;

pub(crate) enum DriverCommand {
    Play,
    Stop,
    Apply(ParamChange),
    Load(ByteSource),
    Shutdown,
}

type Controller = PlaybackController<ParamTimeline, Option<MidirOutput>>;

pub(crate) struct DriverHandle {
    commands: Sender<DriverCommand>,
    status: Arc<Mutex<PlaybackStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle {
    /// Start the driver thread and wait until its outputs are open.
    pub(crate) fn spawn(
        settings: Settings,
        source: ByteSource,
        midi_port: Option<usize>,
        seed: u64,
    ) -> Result<Self, SessionError> {
        let (commands, rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let status = Arc::new(Mutex::new(PlaybackStatus::default()));
        let shared = status.clone();

        let thread = std::thread::Builder::new()
            .name("bs-driver".into())
            .spawn(move || driver_thread(settings, source, midi_port, seed, rx, ready_tx, shared))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                commands,
                status,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e.into())
            }
            Err(_) => {
                let _ = thread.join();
                Err(SessionError::DriverGone)
            }
        }
    }

    pub(crate) fn send(&self, command: DriverCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::DriverGone)
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        *self.status.lock()
    }

    pub(crate) fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(DriverCommand::Shutdown);
            let _ = thread.join();
        }
    }
}

impl Drop for DriverHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_outputs(
    midi_port: Option<usize>,
) -> Result<(CpalOutput, Option<MidirOutput>), AudioError> {
    let mut output = CpalOutput::open()?;
    let midi = midi_port.map(MidirOutput::connect).transpose()?;
    output.start()?;
    Ok((output, midi))
}

fn driver_thread(
    settings: Settings,
    source: ByteSource,
    midi_port: Option<usize>,
    seed: u64,
    commands: Receiver<DriverCommand>,
    ready: Sender<Result<(), AudioError>>,
    status: Arc<Mutex<PlaybackStatus>>,
) {
    let (mut output, midi) = match open_outputs(midi_port) {
        Ok(outputs) => outputs,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // the device decides the rate
    let sample_rate = output.sample_rate();
    let mut settings = settings;
    settings.sample_rate = sample_rate;

    let mut ctl: Controller =
        PlaybackController::new(settings, ParamTimeline::default(), midi).with_seed(seed);
    ctl.load(0.0, source);
    let mut tone = ToneGenerator::new(sample_rate);
    let _ = ready.send(Ok(()));
    log::debug!("driver running at {} Hz", sample_rate);

    let mut chunk = [Frame::silence(); CHUNK];
    let mut underruns = 0;
    loop {
        let now = output.clock();
        if !handle_commands(&mut ctl, &commands, now, sample_rate) {
            ctl.stop(now);
            break;
        }

        ctl.poll(now + tone.duration(CHUNK));
        tone.render(ctl.oscillator(), now, &mut chunk);
        if let Err(e) = output.write_blocking(&chunk) {
            log::error!("{}", e);
            ctl.stop(now);
            break;
        }

        ctl.oscillator_mut().forget_before(now);
        *status.lock() = *ctl.status();
        if output.underruns() > underruns {
            underruns = output.underruns();
            log::debug!("audio underrun ({} so far, {:.3} s queued)", underruns, output.latency());
        }
    }

    // let the stop fade reach the device
    *status.lock() = *ctl.status();
    let now = output.clock();
    let fade = tone.duration(sample_rate as usize / 5);
    while output.clock() < now + fade {
        let t = output.clock();
        tone.render(ctl.oscillator(), t, &mut chunk);
        if output.write_blocking(&chunk).is_err() {
            break;
        }
    }
    if let Err(e) = output.stop() {
        log::warn!("{}", e);
    }
    log::debug!("driver stopped at {:.3} s", output.clock());
}

/// Apply queued commands. Returns false on shutdown or a closed channel.
fn handle_commands(
    ctl: &mut Controller,
    commands: &Receiver<DriverCommand>,
    now: f64,
    device_rate: u32,
) -> bool {
    loop {
        let command = match commands.try_recv() {
            Ok(command) => command,
            Err(crossbeam_channel::TryRecvError::Empty) => return true,
            Err(crossbeam_channel::TryRecvError::Disconnected) => return false,
        };
        match command {
            DriverCommand::Play => {
                ctl.play(now);
            }
            DriverCommand::Stop => ctl.stop(now),
            DriverCommand::Apply(ParamChange::SampleRate(rate)) if rate != device_rate => {
                log::warn!("device runs at {} Hz, ignoring sample rate {}", device_rate, rate);
            }
            DriverCommand::Apply(change) => {
                ctl.apply(now, change);
            }
            DriverCommand::Load(source) => ctl.load(now, source),
            DriverCommand::Shutdown => return false,
        }
    }
}
