use crate::game::life::{HEALTH_START, clamp_health};

/// Score, combo and health for one session. Fields only move through the
/// methods below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunState {
    score: u32,
    combo: u32,
    combo_high: u32,
    health: i32,
    notes_hit: u32,
    notes_total: u32,
}

impl RunState {
    pub fn new(start_health: i32, notes_total: u32) -> Self {
        Self {
            score: 0,
            combo: 0,
            combo_high: 0,
            health: clamp_health(start_health),
            notes_hit: 0,
            notes_total,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn combo_high(&self) -> u32 {
        self.combo_high
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn notes_hit(&self) -> u32 {
        self.notes_hit
    }

    pub fn notes_total(&self) -> u32 {
        self.notes_total
    }

    #[inline(always)]
    pub fn is_out_of_health(&self) -> bool {
        self.health <= 0
    }

    pub fn add_score(&mut self, delta: u32) {
        self.score = self.score.saturating_add(delta);
    }

    pub fn increment_combo(&mut self) {
        self.combo += 1;
        self.combo_high = self.combo_high.max(self.combo);
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    /// Applies `delta` and clamps into `[0, 100]`. Returns the new health.
    pub fn adjust_health(&mut self, delta: i32) -> i32 {
        self.health = clamp_health(self.health.saturating_add(delta));
        self.health
    }

    pub fn record_hit(&mut self) {
        self.notes_hit += 1;
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(HEALTH_START, 0)
    }
}
