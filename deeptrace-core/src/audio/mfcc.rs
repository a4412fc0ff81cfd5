//! MFCC computation.
//!
//! Centred STFT with a periodic Hann window, power spectrum, Slaney-style mel
//! filterbank, power-to-dB with an 80 dB floor and an orthonormal DCT-II.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// STFT window length.
pub const N_FFT: usize = 2048;

/// STFT hop length.
pub const HOP_LENGTH: usize = 512;

/// Number of mel bands fed to the DCT.
pub const N_MELS: usize = 128;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Compute `n_mfcc` coefficients per frame. Returns one row per coefficient.
pub fn mfcc(samples: &[f32], sample_rate: u32, n_mfcc: usize) -> Vec<Vec<f32>> {
    mfcc_limited(samples, sample_rate, n_mfcc, usize::MAX)
}

/// Like [`mfcc`], keeping only the first `max_frames` frames.
///
/// Every frame is still analysed so the 80 dB floor stays relative to the
/// loudest frame of the whole clip, but only `max_frames` columns of mel
/// energies are held in memory. The kept columns are identical to the
/// matching prefix of [`mfcc`].
pub fn mfcc_limited(
    samples: &[f32],
    sample_rate: u32,
    n_mfcc: usize,
    max_frames: usize,
) -> Vec<Vec<f32>> {
    let filters = mel_filterbank(sample_rate, N_FFT, N_MELS);
    let total = frame_count(samples.len());
    let frames = total.min(max_frames);

    let mut stft = Stft::new();
    let mut mel_db = vec![vec![0.0f32; frames]; N_MELS];
    let mut peak = f32::NEG_INFINITY;
    for t in 0..total {
        let spectrum = stft.power(samples, t);
        for (m, filter) in filters.iter().enumerate() {
            let energy: f32 = filter.iter().zip(spectrum).map(|(w, p)| w * p).sum();
            let db = 10.0 * energy.max(AMIN).log10();
            peak = peak.max(db);
            if t < frames {
                mel_db[m][t] = db;
            }
        }
    }

    let floor = peak - TOP_DB;
    for value in mel_db.iter_mut().flatten() {
        *value = value.max(floor);
    }

    let mut out = vec![vec![0.0f32; frames]; n_mfcc];
    let scale_first = (1.0 / N_MELS as f32).sqrt();
    let scale_rest = (2.0 / N_MELS as f32).sqrt();
    for (k, row) in out.iter_mut().enumerate() {
        let scale = if k == 0 { scale_first } else { scale_rest };
        let basis: Vec<f32> = (0..N_MELS)
            .map(|n| (PI * k as f32 * (2 * n + 1) as f32 / (2 * N_MELS) as f32).cos())
            .collect();
        for (t, cell) in row.iter_mut().enumerate() {
            let sum: f32 = basis.iter().enumerate().map(|(n, b)| b * mel_db[n][t]).sum();
            *cell = sum * scale;
        }
    }
    out
}

/// Frames of a centred STFT over `len` samples.
fn frame_count(len: usize) -> usize {
    1 + len / HOP_LENGTH
}

/// One-frame-at-a-time power spectra of a centred, zero-padded STFT.
struct Stft {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
}

impl Stft {
    fn new() -> Self {
        let window = (0..N_FFT)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / N_FFT as f32).cos())
            .collect();
        Self {
            fft: FftPlanner::<f32>::new().plan_fft_forward(N_FFT),
            window,
            buffer: vec![Complex::new(0.0, 0.0); N_FFT],
            spectrum: vec![0.0; N_FFT / 2 + 1],
        }
    }

    /// Power spectrum of frame `t`, centred on sample `t * HOP_LENGTH`.
    fn power(&mut self, samples: &[f32], t: usize) -> &[f32] {
        let start = (t * HOP_LENGTH) as isize - (N_FFT / 2) as isize;
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let idx = start + i as isize;
            let sample = if idx >= 0 {
                samples.get(idx as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);
        for (out, c) in self.spectrum.iter_mut().zip(&self.buffer) {
            *out = c.norm_sqr();
        }
        &self.spectrum
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filters with area normalisation, `n_mels` rows of
/// `n_fft / 2 + 1` weights.
fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;
    let fft_freqs: Vec<f32> = (0..bins)
        .map(|i| i as f32 * nyquist / (bins - 1) as f32)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let mel_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, center, hi) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (hi - lo);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - lo) / (center - lo);
                    let upper = (hi - f) / (hi - center);
                    lower.min(upper).max(0.0) * enorm
                })
                .collect()
        })
        .collect()
}
