//! CPAL-based audio output backend.
//!
//! Frames go through a lock-free ring to the device callback. The number of
//! frames handed over is the playback clock the driver schedules against.

use bs_engine::Frame;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioOutput};

/// Seconds of audio the ring holds.
const RING_SECONDS: f64 = 0.1;

/// Default output device, stereo, fed from a ring of [`Frame`]s.
pub struct CpalOutput {
    config: StreamConfig,
    // dropping the stream closes the device
    stream: Stream,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
    underruns: Arc<AtomicU64>,
    frames_written: u64,
}

impl CpalOutput {
    /// Open the default output device. The stream starts paused.
    pub fn open() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = supported.into();
        config.channels = 2;
        let rate = config.sample_rate.0;
        if let Ok(name) = device.name() {
            log::info!("audio device: {} @ {} Hz", name, rate);
        }

        let capacity = ((rate as f64 * RING_SECONDS) as usize).max(64);
        let (producer, consumer) = HeapRb::<Frame>::new(capacity).split();
        let running = Arc::new(AtomicBool::new(false));
        let underruns = Arc::new(AtomicU64::new(0));

        let callback = Self::callback(consumer, running.clone(), underruns.clone());
        let stream = device
            .build_output_stream(
                &config,
                callback,
                |err| log::error!("audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        Ok(Self {
            config,
            stream,
            producer,
            running,
            underruns,
            frames_written: 0,
        })
    }

    fn callback(
        mut consumer: HeapCons<Frame>,
        running: Arc<AtomicBool>,
        underruns: Arc<AtomicU64>,
    ) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if !running.load(Ordering::Relaxed) {
                data.fill(0.0);
                return;
            }
            let mut starved = false;
            for pair in data.chunks_mut(2) {
                let frame = consumer.try_pop().unwrap_or_else(|| {
                    starved = true;
                    Frame::silence()
                });
                let samples = [frame.left, frame.right];
                for (sample, &value) in pair.iter_mut().zip(samples.iter()) {
                    *sample = value as f32 / 32768.0;
                }
            }
            if starved {
                underruns.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Hand over all of `frames`, spinning while the ring is full.
    pub fn write_blocking(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        let mut rest = frames;
        while !rest.is_empty() {
            let taken = self.write(rest)?;
            rest = &rest[taken..];
            if !rest.is_empty() {
                std::hint::spin_loop();
            }
        }
        Ok(())
    }

    /// Seconds of audio handed to the device so far.
    pub fn clock(&self) -> f64 {
        self.frames_written as f64 / self.sample_rate() as f64
    }

    /// Seconds between writing a frame and hearing it.
    pub fn latency(&self) -> f64 {
        self.producer.occupied_len() as f64 / self.sample_rate() as f64
    }

    /// Callbacks that ran out of frames while running.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> Result<usize, AudioError> {
        let pushed = self.producer.push_slice(frames);
        self.frames_written += pushed as u64;
        Ok(pushed)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        self.stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        self.stream
            .pause()
            .map_err(|e| AudioError::Playback(e.to_string()))
    }
}
