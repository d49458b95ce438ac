pub const HEALTH_MIN: i32 = 0;
pub const HEALTH_MAX: i32 = 100;

pub const HEALTH_START: i32 = HEALTH_MAX;
pub const HEALTH_RECOVERY: i32 = 10;
pub const HEALTH_DEPLETION: i32 = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HealthSettings {
    pub start: i32,
    pub recovery: i32,
    pub depletion: i32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            start: HEALTH_START,
            recovery: HEALTH_RECOVERY,
            depletion: HEALTH_DEPLETION,
        }
    }
}

impl HealthSettings {
    /// Out-of-range values from the config are pulled back into the playable
    /// range instead of rejected.
    pub fn sanitized(self) -> Self {
        Self {
            start: self.start.clamp(HEALTH_MIN + 1, HEALTH_MAX),
            recovery: self.recovery.max(0),
            depletion: self.depletion.max(0),
        }
    }
}

#[inline(always)]
pub fn clamp_health(value: i32) -> i32 {
    value.clamp(HEALTH_MIN, HEALTH_MAX)
}
