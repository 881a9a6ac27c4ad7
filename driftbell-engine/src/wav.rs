//! 16-bit PCM WAV export.
//!
//! Canonical 44-byte header (RIFF / `fmt ` / `data`), little endian. All
//! chunk sizes are computed from the sample count and channel count, so the
//! bytes written for a given buffer are always the same.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const HEADER_LEN: usize = 44;
const BYTES_PER_SAMPLE: u16 = 2;

/// Float sample to 16-bit PCM; out-of-range input is clamped first.
#[inline]
pub fn to_pcm16(s: f32) -> i16 {
    let s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
    (s * 32767.0).round() as i16
}

/// Write interleaved `samples` as a WAV stream.
pub fn write_wav<W: Write>(w: &mut W, sample_rate: u32, channels: u16, samples: &[f32]) -> io::Result<()> {
    let block_align = channels * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = u32::try_from(samples.len() * usize::from(BYTES_PER_SAMPLE))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "buffer too large for WAV"))?;

    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_len).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?; // PCM chunk size
    w.write_all(&1u16.to_le_bytes())?; // PCM format
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&(BYTES_PER_SAMPLE * 8).to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())?;
    for &s in samples {
        w.write_all(&to_pcm16(s).to_le_bytes())?;
    }
    Ok(())
}

pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[f32]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + samples.len() * 2);
    write_wav(&mut out, sample_rate, channels, samples)?;
    Ok(out)
}

pub fn write_wav_file(path: &Path, sample_rate: u32, channels: u16, samples: &[f32]) -> io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_wav(&mut w, sample_rate, channels, samples)?;
    w.flush()
}
