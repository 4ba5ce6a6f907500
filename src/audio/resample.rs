use anyhow::{anyhow, Result};
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};

pub(super) const MIN_RATE: u32 = 2_000;
pub(super) const MAX_RATE: u32 = 1_600_000;
const MIN_RATIO: f64 = 0.01;
const MAX_RATIO: f64 = 16.0;
const MAX_DOWNSAMPLING_TAPS: usize = 129;
#[cfg(feature = "high-quality-audio")]
const SINC_CHUNK: usize = 256;

#[cfg(feature = "high-quality-audio")]
static RESAMPLER_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);

/// Mono sample-rate converter for one continuous stream.
///
/// Filter history and any input shorter than a processing block carry over
/// between calls, so a signal fed in arbitrary pieces comes out as one
/// unbroken signal. Output lags input by the filter delay.
pub(super) struct StreamResampler {
    engine: Engine,
}

enum Engine {
    Passthrough,
    #[cfg(feature = "high-quality-audio")]
    Sinc(SincStream),
    Linear(LinearStream),
}

impl StreamResampler {
    /// Uses the sinc resampler when the `high-quality-audio` feature is on and
    /// falls back to FIR + linear interpolation if it cannot be built.
    pub(super) fn new(from_rate: u32, to_rate: u32) -> Self {
        if from_rate == to_rate {
            return Self::passthrough();
        }
        if let Err(err) = check_rates(from_rate, to_rate) {
            tracing::warn!(%err, "leaving audio at its native rate");
            return Self::passthrough();
        }

        #[cfg(feature = "high-quality-audio")]
        {
            match SincStream::new(from_rate, to_rate) {
                Ok(sinc) => {
                    return Self {
                        engine: Engine::Sinc(sinc),
                    }
                }
                Err(err) => {
                    if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                        tracing::warn!(%err, "sinc resampler failed; using basic path");
                    }
                }
            }
        }

        Self::linear(from_rate, to_rate)
    }

    /// FIR low-pass (when decimating) followed by linear interpolation.
    pub(super) fn linear(from_rate: u32, to_rate: u32) -> Self {
        Self {
            engine: Engine::Linear(LinearStream::new(from_rate, to_rate)),
        }
    }

    fn passthrough() -> Self {
        Self {
            engine: Engine::Passthrough,
        }
    }

    /// Feed the next piece of the stream and return whatever output it completes.
    pub(super) fn process(&mut self, input: &[f32]) -> Vec<f32> {
        match &mut self.engine {
            Engine::Passthrough => input.to_vec(),
            #[cfg(feature = "high-quality-audio")]
            Engine::Sinc(sinc) => match sinc.process(input) {
                Ok(output) => output,
                Err(err) => {
                    if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                        tracing::warn!(%err, "sinc resampler failed; using basic path");
                    }
                    let (from_rate, to_rate) = sinc.rates;
                    let mut linear = LinearStream::new(from_rate, to_rate);
                    let output = linear.process(input);
                    self.engine = Engine::Linear(linear);
                    output
                }
            },
            Engine::Linear(linear) => linear.process(input),
        }
    }
}

fn check_rates(from_rate: u32, to_rate: u32) -> Result<f64> {
    for rate in [from_rate, to_rate] {
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(anyhow!("unsupported sample rate {rate}Hz for resampling"));
        }
    }
    let ratio = to_rate as f64 / from_rate as f64;
    if !(MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        return Err(anyhow!("invalid resample ratio {ratio}"));
    }
    Ok(ratio)
}

#[cfg(feature = "high-quality-audio")]
struct SincStream {
    resampler: SincFixedIn<f32>,
    rates: (u32, u32),
    ratio: f64,
    pending: Vec<f32>,
}

#[cfg(feature = "high-quality-audio")]
impl SincStream {
    fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        let ratio = to_rate as f64 / from_rate as f64;
        let params = InterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.90,
            interpolation: InterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, SINC_CHUNK, 1)
            .map_err(|e| anyhow!("failed to construct sinc resampler: {e:?}"))?;
        Ok(Self {
            resampler,
            rates: (from_rate, to_rate),
            ratio,
            pending: Vec::with_capacity(SINC_CHUNK * 2),
        })
    }

    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(input);
        let blocks = self.pending.len() / SINC_CHUNK;
        let expected = (blocks * SINC_CHUNK) as f64 * self.ratio;
        let mut out = Vec::with_capacity(expected as usize + 1);
        for block in self.pending.chunks_exact(SINC_CHUNK) {
            let produced = self
                .resampler
                .process(std::slice::from_ref(&block.to_vec()), None)
                .map_err(|e| anyhow!("resampler process failed: {e:?}"))?;
            out.extend_from_slice(&produced[0]);
        }
        self.pending.drain(..blocks * SINC_CHUNK);
        Ok(out)
    }
}

struct LinearStream {
    /// Input samples advanced per output sample.
    step: f64,
    /// Next output position, counted from `previous`.
    position: f64,
    previous: Option<f32>,
    filter: Option<FirStream>,
}

impl LinearStream {
    fn new(from_rate: u32, to_rate: u32) -> Self {
        let filter = (from_rate > to_rate).then(|| FirStream::new(from_rate, to_rate));
        Self {
            step: from_rate as f64 / to_rate as f64,
            position: 0.0,
            previous: None,
            filter,
        }
    }

    fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let filtered = match self.filter.as_mut() {
            Some(filter) => filter.process(input),
            None => input.to_vec(),
        };
        if filtered.is_empty() {
            return Vec::new();
        }

        let mut window = Vec::with_capacity(filtered.len() + 1);
        window.extend(self.previous);
        window.extend_from_slice(&filtered);
        let last = window.len() - 1;

        let mut output = Vec::with_capacity((filtered.len() as f64 / self.step) as usize + 1);
        while self.position < last as f64 {
            let idx = self.position.floor() as usize;
            let frac = (self.position - idx as f64) as f32;
            output.push(window[idx] * (1.0 - frac) + window[idx + 1] * frac);
            self.position += self.step;
        }
        self.position -= last as f64;
        self.previous = window.last().copied();
        output
    }
}

/// Causal low-pass that keeps its tail between calls.
struct FirStream {
    coeffs: Vec<f32>,
    history: Vec<f32>,
}

impl FirStream {
    fn new(from_rate: u32, to_rate: u32) -> Self {
        // Decimating: low-pass first so content above the new Nyquist does not alias.
        let taps = downsampling_tap_count(from_rate, to_rate);
        let normalized_cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
        Self {
            coeffs: design_low_pass(normalized_cutoff, taps),
            history: vec![0.0; taps - 1],
        }
    }

    fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let mut signal = std::mem::take(&mut self.history);
        signal.extend_from_slice(input);
        let output = signal
            .windows(self.coeffs.len())
            .map(|window| {
                window
                    .iter()
                    .zip(&self.coeffs)
                    .map(|(sample, coeff)| sample * coeff)
                    .sum()
            })
            .collect();
        let keep = signal.len() - (self.coeffs.len() - 1);
        self.history = signal.split_off(keep);
        output
    }
}

pub(super) fn downsampling_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation_ratio = from_rate as f32 / to_rate as f32;
    let mut taps = (decimation_ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_DOWNSAMPLING_TAPS)
}

/// Normalized Hamming-windowed sinc taps.
pub(super) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps.max(2) - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            (2.0 * normalized_cutoff * x.sin()) / x
        };
        let window = if taps <= 1 {
            1.0
        } else {
            0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos()
        };
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= sum;
        }
    }

    coeffs
}
