//! Headless session for bytesonic.
//!
//! Loads a file and settings from disk, plays through the audio device (and
//! optionally a MIDI port) on a driver thread, and renders offline to WAV.
//! Both the CLI and the integration tests go through this API.

mod driver;
mod error;
mod wav;

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bs_engine::{NullMidi, ParamTimeline, PlaybackController, ToneGenerator};
use driver::{DriverCommand, DriverHandle};

// Re-export common types so callers don't need bs-core/bs-engine directly.
pub use bs_audio::{list_ports, AudioError, MidiPortInfo};
pub use bs_core::{BitWidth, ByteSource, ParamChange, PlaybackStatus, Settings};
pub use bs_engine::Frame;
pub use error::SessionError;
pub use wav::{frames_to_wav, wav_header, write_wav};

/// Frames rendered between two polls when rendering offline.
const RENDER_CHUNK: usize = 256;

/// Parse settings JSON. Missing fields keep their defaults.
pub fn parse_settings(json: &str) -> Result<Settings, SessionError> {
    let mut settings: Settings = serde_json::from_str(json)?;
    settings.clamp_to_nyquist();
    Ok(settings)
}

/// Read settings from a JSON file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings, SessionError> {
    let json = std::fs::read_to_string(path)?;
    parse_settings(&json)
}

/// A loaded file plus settings, with optional real-time playback.
pub struct Session {
    settings: Settings,
    source: ByteSource,
    seed: Option<u64>,
    driver: Option<DriverHandle>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            source: ByteSource::empty(),
            seed: None,
            driver: None,
        }
    }

    /// Fix the random gap seed, for reproducible renders.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    // --- Source management ---

    /// Read a file from disk and make it the source.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        log::info!("read {} ({} bytes)", path.display(), bytes.len());
        self.load_bytes(bytes)
    }

    pub fn load_bytes(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        let source = ByteSource::from(bytes);
        if !source.is_loaded() {
            return Err(SessionError::EmptySource);
        }
        self.source = source.clone();
        if let Some(driver) = &self.driver {
            driver.send(DriverCommand::Load(source))?;
        }
        Ok(())
    }

    // --- Real-time playback ---

    /// Open the audio device, and the MIDI output port at `midi_port` if
    /// given. Replaces any running driver.
    pub fn open_output(&mut self, midi_port: Option<usize>) -> Result<(), SessionError> {
        self.close_output();
        let driver = DriverHandle::spawn(self.settings, self.source.clone(), midi_port, self.seed())?;
        self.driver = Some(driver);
        Ok(())
    }

    pub fn close_output(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.shutdown();
        }
    }

    /// Start playback, opening the audio device first if needed.
    pub fn play(&mut self) -> Result<(), SessionError> {
        if !self.source.is_loaded() {
            return Err(SessionError::EmptySource);
        }
        if self.driver.is_none() {
            self.open_output(None)?;
        }
        self.send(DriverCommand::Play)
    }

    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.send(DriverCommand::Stop)
    }

    /// Change one parameter, live if playing.
    pub fn apply(&mut self, change: ParamChange) -> Result<(), SessionError> {
        self.settings.apply(change);
        if matches!(change, ParamChange::SampleRate(_)) {
            self.settings.clamp_to_nyquist();
        }
        self.send(DriverCommand::Apply(change))
    }

    /// Latest status published by the driver.
    pub fn status(&self) -> PlaybackStatus {
        self.driver
            .as_ref()
            .map(DriverHandle::status)
            .unwrap_or_default()
    }

    pub fn is_playing(&self) -> bool {
        self.status().playing
    }

    fn send(&self, command: DriverCommand) -> Result<(), SessionError> {
        match &self.driver {
            Some(driver) => driver.send(command),
            None => Ok(()),
        }
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        })
    }

    // --- Offline rendering ---

    /// Play the source against a virtual clock at the settings' sample rate.
    ///
    /// Stops after `max_seconds`, or shortly after a non-looping fragment ends.
    pub fn render_frames(&self, max_seconds: f64) -> Result<Vec<Frame>, SessionError> {
        if !self.source.is_loaded() {
            return Err(SessionError::EmptySource);
        }

        let mut ctl = PlaybackController::new(self.settings, ParamTimeline::default(), NullMidi)
            .with_seed(self.seed());
        ctl.load(0.0, self.source.clone());
        ctl.play(0.0);

        let sample_rate = ctl.settings().sample_rate;
        let mut tone = ToneGenerator::new(sample_rate);
        let max_frames = (max_seconds.max(0.0) * sample_rate as f64) as usize;
        let mut frames = Vec::with_capacity(max_frames);
        let mut chunk = [Frame::silence(); RENDER_CHUNK];

        while frames.len() < max_frames {
            let now = tone.duration(frames.len());
            if !ctl.is_playing() && !ctl.oscillator().is_running(now) {
                break;
            }
            ctl.poll(now + tone.duration(RENDER_CHUNK));

            let n = RENDER_CHUNK.min(max_frames - frames.len());
            tone.render(ctl.oscillator(), now, &mut chunk[..n]);
            frames.extend_from_slice(&chunk[..n]);
            ctl.oscillator_mut().forget_before(now);
        }
        log::debug!("rendered {} frames", frames.len());
        Ok(frames)
    }

    pub fn render_to_wav(&self, max_seconds: f64) -> Result<Vec<u8>, SessionError> {
        let frames = self.render_frames(max_seconds)?;
        Ok(wav::frames_to_wav(&frames, self.settings.sample_rate))
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close_output();
    }
}
