/// Sound engine: the one procedural click that acknowledges a cascade.
///
/// The click is rendered once into an in-memory WAV buffer at startup.
/// Playback is fire-and-forget through a detached rodio `Sink`.
///
/// Build without the "sound" feature for a silent stub with the same API.

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};
    use tracing::{debug, warn};

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_click: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("no audio output, running silent: {e}");
                    return None;
                }
            };
            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_click: Arc::new(encode_wav(&gen_click())),
            })
        }

        pub fn play_click(&self) {
            let Ok(sink) = Sink::try_new(&self.handle) else {
                debug!("audio sink unavailable, click dropped");
                return;
            };
            let cursor = Cursor::new(self.sfx_click.as_ref().clone());
            if let Ok(src) = rodio::Decoder::new(cursor) {
                sink.append(src);
                sink.detach();
            }
        }
    }

    /// Short woody click: a fast-decaying 1.2 kHz tone over a noise transient.
    pub(super) fn gen_click() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.04) as usize;
        let mut rng: u32 = 0x2545_f491;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = (-(i as f32) / (n as f32 * 0.18)).exp();
                let tone = (t * 1200.0 * 2.0 * std::f32::consts::PI).sin();
                rng ^= rng << 13;
                rng ^= rng >> 17;
                rng ^= rng << 5;
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let transient = if i < n / 8 { noise * 0.5 } else { 0.0 };
                (tone * 0.6 + transient) * env * 0.35
            })
            .collect()
    }

    /// 16-bit mono PCM WAV.
    pub(super) fn encode_wav(samples: &[f32]) -> Vec<u8> {
        const CHANNELS: u16 = 1;
        const BITS: u16 = 16;
        let data_len = samples.len() as u32 * u32::from(BITS / 8);
        let mut buf = Vec::with_capacity(44 + data_len as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_len).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&CHANNELS.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        let block_align = CHANNELS * BITS / 8;
        buf.extend_from_slice(&(SAMPLE_RATE * u32::from(block_align)).to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&BITS.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_len.to_le_bytes());
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: no-ops without the `sound` feature
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_click(&self) {}
}

#[cfg(all(test, feature = "sound"))]
mod tests {
    use super::inner::{encode_wav, gen_click};

    #[test]
    fn click_is_short_and_bounded() {
        let s = gen_click();
        assert!(!s.is_empty());
        assert!(s.len() < 22050 / 10);
        assert!(s.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn wav_header_matches_payload() {
        let wav = encode_wav(&[0.0, 1.0, -1.0]);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), i16::MAX);
    }
}
