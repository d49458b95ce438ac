use crate::game::prompt::PromptId;

pub const DEFAULT_MAX_SCORE_DISTANCE: f32 = 130.0;
pub const DEFAULT_INPUT_LISTEN_DURATION: f32 = 0.25;
pub const DEFAULT_MINIMUM_REACTION_SECONDS: f32 = 0.0;

pub const MAX_HIT_SCORE: u32 = 100;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Hit,
    Miss,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JudgmentSettings {
    /// Prompts farther than this from the line cannot be judged, and a hit
    /// at exactly this distance scores nothing.
    pub max_score_distance: f32,
    pub input_listen_duration: f32,
    /// A prompt younger than this is not judgable yet.
    pub minimum_reaction_seconds: f32,
}

impl Default for JudgmentSettings {
    fn default() -> Self {
        Self {
            max_score_distance: DEFAULT_MAX_SCORE_DISTANCE,
            input_listen_duration: DEFAULT_INPUT_LISTEN_DURATION,
            minimum_reaction_seconds: DEFAULT_MINIMUM_REACTION_SECONDS,
        }
    }
}

/// `round(100 * (1 - distance / max))`, floored at zero.
#[inline(always)]
pub fn hit_score(distance: f32, max_score_distance: f32) -> u32 {
    if max_score_distance <= 0.0 {
        return 0;
    }
    let raw = (MAX_HIT_SCORE as f32 * (1.0 - distance.abs() / max_score_distance)).round();
    raw.max(0.0) as u32
}

/// Bounded input latch for one prompt. Each button is latched independently;
/// the window answers `Hit` as soon as both are in, `Miss` once its time is
/// up. Whoever owns it takes it out of its slot on the first answer, so a
/// window resolves at most once.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ListeningWindow {
    uid: PromptId,
    closes_at: f32,
    first_ok: bool,
    second_ok: bool,
}

impl ListeningWindow {
    pub fn open(uid: PromptId, now: f32, duration: f32, needs_second: bool) -> Self {
        Self {
            uid,
            closes_at: now + duration.max(0.0),
            first_ok: false,
            second_ok: !needs_second,
        }
    }

    #[inline(always)]
    pub fn uid(&self) -> PromptId {
        self.uid
    }

    pub fn latch(&mut self, now: f32, first: bool, second: bool) {
        if now >= self.closes_at {
            return;
        }
        self.first_ok |= first;
        self.second_ok |= second;
    }

    pub fn poll(&self, now: f32) -> Option<Verdict> {
        if self.first_ok && self.second_ok {
            Some(Verdict::Hit)
        } else if now >= self.closes_at {
            Some(Verdict::Miss)
        } else {
            None
        }
    }
}
