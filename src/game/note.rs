/// One chart note, created from a MIDI note-on. `time` is fixed at build time;
/// only the progress flags move during a session.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub time: f32,
    spawned: bool,
    passed: bool,
    successful: bool,
}

impl NoteEvent {
    pub fn new(pitch: u8, time: f32) -> Self {
        Self {
            pitch,
            time: time.max(0.0),
            spawned: false,
            passed: false,
            successful: false,
        }
    }

    #[inline(always)]
    pub fn is_spawned(&self) -> bool {
        self.spawned
    }

    #[inline(always)]
    pub fn is_passed(&self) -> bool {
        self.passed
    }

    #[inline(always)]
    pub fn was_successful(&self) -> bool {
        self.successful
    }

    #[inline(always)]
    pub fn is_pending(&self) -> bool {
        !self.spawned && !self.passed
    }

    pub(crate) fn spawn(&mut self) {
        self.spawned = true;
    }

    /// Marks the note as gone past the line. A note that never spawned cannot
    /// pass, so this is a no-op until `spawn` has run.
    pub(crate) fn pass(&mut self, successful: bool) {
        if !self.spawned || self.passed {
            return;
        }
        self.passed = true;
        self.successful = successful;
    }

    pub(crate) fn reset(&mut self) {
        self.spawned = false;
        self.passed = false;
        self.successful = false;
    }
}
