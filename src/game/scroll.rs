/// Where prompts start, where they are judged, and where they give up.
/// Positions are in the same screen units `max_score_distance` uses.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScrollLayout {
    pub spawn_y: f32,
    pub judgment_y: f32,
    pub end_y: f32,
    /// Seconds from `spawn_y` to `end_y`.
    pub transition_time: f32,
}

pub const DEFAULT_SPAWN_Y: f32 = 800.0;
pub const DEFAULT_JUDGMENT_Y: f32 = 150.0;
pub const DEFAULT_END_Y: f32 = 20.0;
pub const DEFAULT_TRANSITION_TIME: f32 = 2.0;

impl Default for ScrollLayout {
    fn default() -> Self {
        Self {
            spawn_y: DEFAULT_SPAWN_Y,
            judgment_y: DEFAULT_JUDGMENT_Y,
            end_y: DEFAULT_END_Y,
            transition_time: DEFAULT_TRANSITION_TIME,
        }
    }
}

impl ScrollLayout {
    #[inline(always)]
    pub fn position_at(&self, progress: f32) -> f32 {
        let t = progress.clamp(0.0, 1.0);
        self.spawn_y + (self.end_y - self.spawn_y) * t
    }

    /// Travel time from spawn to the judgment line.
    pub fn time_to_judgment_line(&self) -> f32 {
        let span = self.end_y - self.spawn_y;
        if span.abs() <= f32::EPSILON {
            return self.transition_time;
        }
        let fraction = ((self.judgment_y - self.spawn_y) / span).clamp(0.0, 1.0);
        fraction * self.transition_time
    }

    #[inline(always)]
    pub fn distance_to_line(&self, position: f32) -> f32 {
        (position - self.judgment_y).abs()
    }
}

/// Linear interpolation advanced by the tick clock. Progress is derived from
/// the elapsed time since spawn, so it does not drift with uneven steps.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ScrollTrajectory {
    started_at: f32,
    duration: f32,
}

impl ScrollTrajectory {
    pub fn begin(started_at: f32, duration: f32) -> Self {
        Self {
            started_at,
            duration: duration.max(f32::EPSILON),
        }
    }

    #[inline(always)]
    pub fn progress(&self, now: f32) -> f32 {
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0)
    }

    #[inline(always)]
    pub fn is_complete(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }

    #[inline(always)]
    pub fn started_at(&self) -> f32 {
        self.started_at
    }
}
