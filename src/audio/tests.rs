use super::dispatch::{append_downmixed_samples, FrameDispatcher};
use super::resample::{
    design_low_pass, downsampling_tap_count, StreamResampler, MAX_RATE, MIN_RATE,
};
use super::{f32_to_pcm16, pcm16_to_f32, DEFAULT_RECEIVE_RATE, DEFAULT_SEND_RATE};
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn downmixes_multi_channel_audio() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn preserves_single_channel_audio() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn downmix_averages_trailing_partial_frame() {
    let mut buf = Vec::new();
    append_downmixed_samples(&mut buf, &[0.2f32, 0.4, 0.6], 2, |sample| sample);
    assert_eq!(buf.len(), 2);
    assert!((buf[1] - 0.6).abs() < 1e-6);
}

#[test]
fn dispatcher_emits_fixed_size_frames() {
    let (tx, rx) = bounded(8);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(4, tx, dropped.clone());
    dispatcher.push(&[0.1f32; 10], 1, |s| s);
    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert!(rx.try_recv().is_err(), "remaining 2 samples stay pending");
    dispatcher.push(&[0.1f32; 2], 1, |s| s);
    assert_eq!(rx.try_recv().unwrap().len(), 4);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

#[test]
fn dispatcher_counts_frames_it_cannot_queue() {
    let (tx, rx) = bounded(1);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(2, tx, dropped.clone());
    dispatcher.push(&[0.0f32; 6], 1, |s| s);
    assert_eq!(rx.len(), 1);
    assert_eq!(dropped.load(Ordering::Relaxed), 2);
}

#[test]
fn dispatcher_stops_when_reader_is_gone() {
    let (tx, rx) = bounded(4);
    drop(rx);
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = FrameDispatcher::new(2, tx, dropped.clone());
    dispatcher.push(&[0.0f32; 8], 1, |s| s);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
}

/// Sine at `rate`, cut into pieces of `piece` samples.
fn sine_pieces(rate: u32, total: usize, piece: usize) -> Vec<Vec<f32>> {
    let step = 2.0 * std::f32::consts::PI * 440.0 / rate as f32;
    let tone: Vec<f32> = (0..total).map(|i| 0.5 * (i as f32 * step).sin()).collect();
    tone.chunks(piece).map(<[f32]>::to_vec).collect()
}

fn largest_step(samples: &[f32]) -> f32 {
    samples
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .fold(0.0, f32::max)
}

fn stream_through(resampler: &mut StreamResampler, pieces: &[Vec<f32>]) -> Vec<f32> {
    let mut out = Vec::new();
    for piece in pieces {
        out.extend(resampler.process(piece));
    }
    out
}

#[test]
fn stream_resampler_passes_matching_rates_through() {
    let mut resampler = StreamResampler::new(16_000, 16_000);
    assert_eq!(resampler.process(&[0.1, 0.2, 0.3]), vec![0.1, 0.2, 0.3]);
    assert!(resampler.process(&[]).is_empty());
}

#[test]
fn stream_resampler_leaves_out_of_range_rates_untouched() {
    let input = vec![0.5f32; 16];
    assert_eq!(StreamResampler::new(MIN_RATE - 1, 16_000).process(&input), input);
    assert_eq!(StreamResampler::new(16_000, MAX_RATE + 1).process(&input), input);
}

#[test]
fn microphone_frames_resample_without_seams() {
    // 440 Hz at amplitude 0.5 moves at most ~0.086 per sample at 16 kHz.
    let pieces = sine_pieces(48_000, 3072 * 4, 3072);
    let mut resampler = StreamResampler::new(48_000, DEFAULT_SEND_RATE);
    let out = stream_through(&mut resampler, &pieces);

    assert!((out.len() as i64 - 4096).abs() <= 256, "got {}", out.len());
    let settled = &out[64..];
    assert!(largest_step(settled) < 0.1, "step {}", largest_step(settled));
    let peak = settled.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
}

#[test]
fn playback_fragments_resample_without_seams() {
    // Fragment length is not a multiple of any internal block size.
    let pieces = sine_pieces(DEFAULT_RECEIVE_RATE, 24_000, 1000);
    let mut resampler = StreamResampler::new(DEFAULT_RECEIVE_RATE, 44_100);
    let out = stream_through(&mut resampler, &pieces);

    assert!((out.len() as i64 - 44_100).abs() <= 512, "got {}", out.len());
    let settled = &out[128..];
    assert!(largest_step(settled) < 0.045, "step {}", largest_step(settled));
}

#[test]
fn linear_fallback_is_continuous_across_pieces() {
    let pieces = sine_pieces(48_000, 3072 * 4, 3072);
    let mut resampler = StreamResampler::linear(48_000, DEFAULT_SEND_RATE);
    let out = stream_through(&mut resampler, &pieces);

    assert!((out.len() as i64 - 4096).abs() <= 2, "got {}", out.len());
    assert!(largest_step(&out[32..]) < 0.1);

    let mut up = StreamResampler::linear(DEFAULT_RECEIVE_RATE, 48_000);
    let doubled = stream_through(&mut up, &sine_pieces(DEFAULT_RECEIVE_RATE, 2400, 333));
    assert!((doubled.len() as i64 - 4800).abs() <= 2, "got {}", doubled.len());
    assert!(largest_step(&doubled) < 0.04);
}

#[test]
fn linear_fallback_matches_one_shot_output() {
    let input: Vec<f32> = (0..600).map(|i| (i as f32 * 0.01).sin()).collect();
    let whole = StreamResampler::linear(48_000, 16_000).process(&input);
    let mut pieces = StreamResampler::linear(48_000, 16_000);
    let split = stream_through(&mut pieces, &[input[..77].to_vec(), input[77..].to_vec()]);
    assert_eq!(whole.len(), split.len());
    for (a, b) in whole.iter().zip(&split) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn tap_count_is_odd_and_bounded() {
    let taps = downsampling_tap_count(48_000, 16_000);
    assert_eq!(taps % 2, 1);
    assert!(taps >= 11);
    assert!(downsampling_tap_count(1_600_000, 2_000) <= 129);
}

#[test]
fn low_pass_coefficients_are_normalized() {
    let coeffs = design_low_pass(0.2, 31);
    let sum: f32 = coeffs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[test]
fn linear_fallback_preserves_dc() {
    let out = StreamResampler::linear(48_000, 16_000).process(&[0.5f32; 300]);
    assert!((out[50] - 0.5).abs() < 1e-3);
}

#[test]
fn pcm16_packs_little_endian_and_clamps() {
    let bytes = f32_to_pcm16(&[0.0, 1.0, -1.0, 2.0]);
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[0..2], &[0, 0]);
    assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), i16::MAX);
    assert_eq!(i16::from_le_bytes([bytes[4], bytes[5]]), -i16::MAX);
    assert_eq!(i16::from_le_bytes([bytes[6], bytes[7]]), i16::MAX);
}

#[test]
fn pcm16_unpack_ignores_trailing_byte() {
    let samples = pcm16_to_f32(&[0x00, 0x40, 0x00, 0xC0, 0x7F]);
    assert_eq!(samples, vec![0.5, -0.5]);
}
