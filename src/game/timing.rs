// Tempo and count-in arithmetic shared by the chart builder and the session.

pub const DEFAULT_BPM: f64 = 125.0;

// The scroll correction constant was tuned at this tempo and scales linearly
// with BPM from there.
pub const CORRECTION_REFERENCE_BPM_SCALE: f64 = 0.01;
pub const DEFAULT_CORRECTION_SECONDS: f32 = 0.5;

/// `bpm * ticks_per_quarter / 60`; a 125 BPM, 480 TPQ file runs at 1000 ticks/s.
#[inline(always)]
pub fn ticks_per_second(bpm: f64, ticks_per_quarter: u16) -> f64 {
    bpm * f64::from(ticks_per_quarter) / 60.0
}

#[inline(always)]
pub fn tick_to_seconds(tick: u64, ticks_per_second: f64) -> f32 {
    (tick as f64 / ticks_per_second) as f32
}

/// How long to hold the music back so the first prompt reaches the judgment
/// line on the first beat. Never negative.
pub fn lead_in_seconds(time_to_line: f32, correction_seconds: f32, bpm: f64) -> f32 {
    let correction = f64::from(correction_seconds) * bpm * CORRECTION_REFERENCE_BPM_SCALE;
    (f64::from(time_to_line) - correction).max(0.0) as f32
}
