//! WAV (RIFF) container helpers.

use speechbridge_core::error::{Result, SpeechBridgeError};

/// Wrap raw 16-bit PCM in a WAV container.
pub fn pcm_to_wav(pcm: &[i16], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let data_len = pcm.len() * 2; // 2 bytes per i16 sample
    let mut wav = wav_header(data_len as u32, sample_rate, channels, bits_per_sample);
    wav.reserve(data_len);
    for &sample in pcm {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

/// 44-byte canonical PCM header for `data_len` bytes of samples.
fn wav_header(data_len: u32, sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    let mut wav = Vec::with_capacity(44);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav
}

/// Split a PCM WAV into standalone WAVs of at most `max_secs` each.
///
/// Short-audio recognition rejects clips much over a minute, so long
/// recordings are sent chunk by chunk. A clip that already fits comes back
/// as a single copy.
pub fn split_wav(bytes: &[u8], max_secs: u32) -> Result<Vec<Vec<u8>>> {
    let info = WavInfo::parse(bytes)?;
    if info.format_tag != 1 {
        return Err(SpeechBridgeError::Media(format!(
            "cannot split non-PCM WAV (format {})",
            info.format_tag
        )));
    }
    let (Some(offset), Some(len)) = (info.data_offset, info.data_len) else {
        return Err(SpeechBridgeError::Media("missing data chunk".into()));
    };

    let block_align = (info.channels as usize * info.bits_per_sample as usize / 8).max(1);
    let bytes_per_sec = info.sample_rate as usize * block_align;
    let chunk_len = (bytes_per_sec * max_secs.max(1) as usize) / block_align * block_align;
    let data = &bytes[offset..(offset + len as usize).min(bytes.len())];

    if data.len() <= chunk_len {
        return Ok(vec![bytes.to_vec()]);
    }

    Ok(data
        .chunks(chunk_len)
        .map(|chunk| {
            let mut wav = wav_header(
                chunk.len() as u32,
                info.sample_rate,
                info.channels,
                info.bits_per_sample,
            );
            wav.extend_from_slice(chunk);
            wav
        })
        .collect())
}

/// Format details read from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Length of the `data` chunk, if one was found.
    pub data_len: Option<u32>,
    data_offset: Option<usize>,
}

impl WavInfo {
    /// Parse the RIFF header and `fmt ` chunk. Chunks before `fmt ` are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(SpeechBridgeError::Media("not a RIFF/WAVE file".into()));
        }

        let mut fmt: Option<(u16, u16, u32, u16)> = None;
        let mut data_len = None;
        let mut data_offset = None;
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = read_u32(bytes, pos + 4);
            let body = pos + 8;
            match id {
                b"fmt " => {
                    if size < 16 || body + 16 > bytes.len() {
                        return Err(SpeechBridgeError::Media("truncated fmt chunk".into()));
                    }
                    fmt = Some((
                        read_u16(bytes, body),
                        read_u16(bytes, body + 2),
                        read_u32(bytes, body + 4),
                        read_u16(bytes, body + 14),
                    ));
                }
                b"data" => {
                    data_len = Some(size);
                    data_offset = Some(body);
                    break;
                }
                _ => {}
            }
            // Chunks are word-aligned
            pos = body + size as usize + (size as usize & 1);
        }

        let (format_tag, channels, sample_rate, bits_per_sample) =
            fmt.ok_or_else(|| SpeechBridgeError::Media("missing fmt chunk".into()))?;
        if channels == 0 || sample_rate == 0 || bits_per_sample == 0 {
            return Err(SpeechBridgeError::Media(format!(
                "invalid fmt chunk ({channels} channels, {sample_rate} Hz, {bits_per_sample} bits)"
            )));
        }
        Ok(Self {
            format_tag,
            channels,
            sample_rate,
            bits_per_sample,
            data_len,
            data_offset,
        })
    }

    /// 16 kHz mono 16-bit PCM, the format short-audio recognition expects.
    pub fn is_speech_ready(&self) -> bool {
        self.format_tag == 1
            && self.channels == 1
            && self.sample_rate == 16000
            && self.bits_per_sample == 16
    }

    /// Duration in seconds, when the data length is known.
    pub fn duration_secs(&self) -> Option<f64> {
        let bytes_per_sec =
            self.sample_rate as u64 * self.channels as u64 * self.bits_per_sample as u64 / 8;
        match (self.data_len, bytes_per_sec) {
            (Some(len), rate) if rate > 0 => Some(len as f64 / rate as f64),
            _ => None,
        }
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
