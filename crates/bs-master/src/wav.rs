//! WAV encoding for 16-bit stereo PCM.

use bs_engine::Frame;
use std::io::Write;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Size of the RIFF/fmt/data headers.
pub const HEADER_LEN: usize = 44;

/// Canonical 44-byte header for `frame_count` stereo frames.
pub fn wav_header(frame_count: usize, sample_rate: u32) -> [u8; HEADER_LEN] {
    let data_size = (frame_count as u32).saturating_mul(BLOCK_ALIGN as u32);
    let byte_rate = sample_rate * BLOCK_ALIGN as u32;

    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&data_size.saturating_add(36).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&16u32.to_le_bytes());
    h[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    h[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_size.to_le_bytes());
    h
}

fn push_frame(buf: &mut Vec<u8>, frame: &Frame) {
    buf.extend_from_slice(&frame.left.to_le_bytes());
    buf.extend_from_slice(&frame.right.to_le_bytes());
}

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    w.write_all(&wav_header(frames.len(), sample_rate))?;
    let mut chunk = Vec::with_capacity(4096 * BLOCK_ALIGN as usize);
    for block in frames.chunks(4096) {
        chunk.clear();
        block.iter().for_each(|f| push_frame(&mut chunk, f));
        w.write_all(&chunk)?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + frames.len() * BLOCK_ALIGN as usize);
    buf.extend_from_slice(&wav_header(frames.len(), sample_rate));
    frames.iter().for_each(|f| push_frame(&mut buf, f));
    buf
}
