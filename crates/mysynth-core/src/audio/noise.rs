//! Pseudo-random noise playback
//!
//! Fills blocks from a 16-bit Galois LFSR and writes them to a playback
//! stream. Useful for checking the output path on its own, without a
//! capture device.

use super::format::{AudioBlock, StreamParams};
use super::stream::{DeviceError, PlaybackStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Feedback mask for x^16 + x^14 + x^13 + x^11 + 1
const LFSR_MASK: u16 = 0xB400;

/// White-ish noise from a maximal-length 16-bit LFSR
///
/// Period is 65535 samples before the sequence repeats.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    state: u16,
    amplitude: f32,
}

impl NoiseGenerator {
    /// Create a generator; a zero seed is replaced by 1
    pub fn new(seed: u16) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
            amplitude: 0.5, // -6dB to leave headroom
        }
    }

    fn step(&mut self) -> u16 {
        let output = self.state & 1;
        self.state >>= 1;
        if output == 1 {
            self.state ^= LFSR_MASK;
        }
        self.state
    }

    /// Next sample, scaled by the amplitude
    pub fn next_sample(&mut self) -> i16 {
        let raw = self.step() as i16;
        (raw as f32 * self.amplitude) as i16
    }

    /// Fill a buffer with sequential samples
    pub fn fill_buffer(&mut self, buffer: &mut [i16]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// One block of noise for `params`
    pub fn next_block(&mut self, params: &StreamParams) -> AudioBlock {
        let mut samples = vec![0i16; params.block_samples()];
        self.fill_buffer(&mut samples);
        AudioBlock::from_samples(&samples)
    }

    /// Set the amplitude scaling factor (clamped to 0.0..=1.0)
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new(0xACE1)
    }
}

/// Write noise blocks until the limit, the stop flag, or a device error
///
/// Returns the number of blocks written.
pub fn play_noise<S>(
    stream: &mut S,
    generator: &mut NoiseGenerator,
    max_blocks: Option<u64>,
    stop: Option<&Arc<AtomicBool>>,
) -> Result<u64, DeviceError>
where
    S: PlaybackStream + ?Sized,
{
    let params = *stream.params();
    let mut written = 0u64;

    tracing::info!(
        "Noise playback started: {}Hz, {} ch, amplitude {:.2}",
        params.sample_rate,
        params.channels,
        generator.amplitude()
    );

    loop {
        if max_blocks.is_some_and(|max| written >= max) {
            break;
        }
        if stop.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            break;
        }
        let block = generator.next_block(&params);
        stream.write_block(&block)?;
        written += 1;
        tracing::trace!(block = written, frames = params.block_frames, "Noise block written");
    }

    tracing::info!(blocks = written, "Noise playback stopped");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink {
        params: StreamParams,
        blocks: Vec<AudioBlock>,
        fail_at: Option<usize>,
    }

    impl PlaybackStream for Sink {
        fn params(&self) -> &StreamParams {
            &self.params
        }

        fn write_block(&mut self, block: &AudioBlock) -> Result<(), DeviceError> {
            if self.fail_at == Some(self.blocks.len()) {
                return Err(DeviceError::Stream("unplugged".into()));
            }
            self.blocks.push(block.clone());
            Ok(())
        }
    }

    fn sink() -> Sink {
        Sink {
            params: StreamParams::new(8000, 1, 64).unwrap(),
            blocks: Vec::new(),
            fail_at: None,
        }
    }

    #[test]
    fn test_lfsr_period() {
        let mut gen = NoiseGenerator::new(1);
        let first = gen.step();
        let mut period = 1;
        while gen.step() != first {
            period += 1;
        }
        assert_eq!(period, 65535);
    }

    #[test]
    fn test_zero_seed_is_not_stuck() {
        let mut gen = NoiseGenerator::new(0);
        let samples: Vec<i16> = (0..16).map(|_| gen.next_sample()).collect();
        assert!(samples.iter().any(|&s| s != 0));
    }

    #[test]
    fn test_amplitude_scales_samples() {
        let mut gen = NoiseGenerator::default();
        gen.set_amplitude(0.25);
        for _ in 0..1000 {
            assert!((gen.next_sample() as i32).abs() <= 8192);
        }

        gen.set_amplitude(3.0);
        assert_eq!(gen.amplitude(), 1.0);
    }

    #[test]
    fn test_play_noise_block_limit() {
        let mut out = sink();
        let mut gen = NoiseGenerator::default();
        let written = play_noise(&mut out, &mut gen, Some(4), None).unwrap();

        assert_eq!(written, 4);
        assert_eq!(out.blocks.len(), 4);
        assert!(out.blocks.iter().all(|b| b.len() == 128));
        assert_ne!(out.blocks[0], out.blocks[1]);
    }

    #[test]
    fn test_play_noise_stops_on_device_error() {
        let mut out = sink();
        out.fail_at = Some(2);
        let mut gen = NoiseGenerator::default();
        let err = play_noise(&mut out, &mut gen, None, None).unwrap_err();

        assert_eq!(err, DeviceError::Stream("unplugged".into()));
        assert_eq!(out.blocks.len(), 2);
    }

    #[test]
    fn test_play_noise_stop_flag() {
        let mut out = sink();
        let mut gen = NoiseGenerator::default();
        let stop = Arc::new(AtomicBool::new(true));
        let written = play_noise(&mut out, &mut gen, None, Some(&stop)).unwrap();
        assert_eq!(written, 0);
    }
}
