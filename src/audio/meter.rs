/// Level reported for empty or digitally silent frames.
pub const SILENCE_FLOOR_DB: f32 = -60.0;

/// RMS level of a mono frame in dBFS.
pub fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt().max(1e-6);
    (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
}
