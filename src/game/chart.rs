use crate::core::midi::{MidiEventKind, MidiSource};
use crate::error::ChartError;
use crate::game::note::NoteEvent;
use crate::game::timing::{DEFAULT_BPM, tick_to_seconds, ticks_per_second};
use log::{debug, info};

/// Which tracks contribute notes. Tempo events are read from every track
/// regardless.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackSelection {
    All,
    /// Track `1 + n`, clamped to the last track. Track 0 is the conductor.
    Difficulty(usize),
}

impl TrackSelection {
    fn note_track(self, track_count: usize) -> Option<usize> {
        match self {
            Self::All => None,
            Self::Difficulty(n) => Some((n + 1).min(track_count.saturating_sub(1))),
        }
    }
}

/// Number of playable difficulties a file offers: one per track after the
/// conductor, and at least one.
pub fn difficulty_count(source: &MidiSource) -> usize {
    source.track_count().saturating_sub(1).max(1)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    notes: Vec<NoteEvent>,
    initial_bpm: f64,
}

impl Chart {
    /// Walks every track in file order, keeping a running ticks-per-second
    /// that each tempo event replaces. Notes already converted are not
    /// rescaled when a later tempo event turns up.
    pub fn build(source: &MidiSource, selection: TrackSelection) -> Result<Self, ChartError> {
        if source.tracks.is_empty() {
            return Err(ChartError::NoTracks);
        }
        if source.ticks_per_quarter == 0 {
            return Err(ChartError::MalformedTrack {
                track: 0,
                reason: "ticks per quarter note is zero".to_string(),
            });
        }

        let note_track = selection.note_track(source.track_count());
        let mut tps = ticks_per_second(DEFAULT_BPM, source.ticks_per_quarter);
        let mut initial_bpm: Option<f64> = None;
        let mut notes = Vec::new();

        for (track_idx, track) in source.tracks.iter().enumerate() {
            let takes_notes = note_track.is_none_or(|t| t == track_idx);
            let mut last_tick = 0u64;
            for event in &track.events {
                if event.tick < last_tick {
                    return Err(ChartError::MalformedTrack {
                        track: track_idx,
                        reason: format!("tick {} follows tick {}", event.tick, last_tick),
                    });
                }
                last_tick = event.tick;

                match event.kind {
                    MidiEventKind::Tempo { bpm } => {
                        if !bpm.is_finite() || bpm <= 0.0 {
                            return Err(ChartError::MalformedTrack {
                                track: track_idx,
                                reason: format!("invalid tempo {bpm} BPM"),
                            });
                        }
                        tps = ticks_per_second(bpm, source.ticks_per_quarter);
                        initial_bpm.get_or_insert(bpm);
                    }
                    MidiEventKind::NoteOn { pitch, .. } if takes_notes => {
                        notes.push(NoteEvent::new(pitch, tick_to_seconds(event.tick, tps)));
                    }
                    _ => {}
                }
            }
        }

        notes.sort_by(|a, b| a.time.total_cmp(&b.time));

        let chart = Self {
            notes,
            initial_bpm: initial_bpm.unwrap_or(DEFAULT_BPM),
        };
        info!(
            "Chart built: {} notes ({} combinations), {:.2} BPM, {:?}",
            chart.notes.len(),
            chart.combination_count(),
            chart.initial_bpm,
            selection
        );
        Ok(chart)
    }

    /// Song-list check: the file must have tracks and at least one tempo event
    /// somewhere. Playback itself falls back to the default tempo.
    pub fn validate(source: &MidiSource) -> Result<(), ChartError> {
        if source.tracks.is_empty() {
            return Err(ChartError::NoTracks);
        }
        let has_tempo = source
            .tracks
            .iter()
            .flat_map(|t| t.events.iter())
            .any(|e| matches!(e.kind, MidiEventKind::Tempo { .. }));
        if !has_tempo {
            debug!("MIDI source has {} tracks but no tempo", source.track_count());
            return Err(ChartError::NoTempo);
        }
        Ok(())
    }

    /// Builds straight from `(pitch, seconds)` pairs. Used where no MIDI file
    /// is involved.
    pub fn from_notes(pairs: &[(u8, f32)]) -> Self {
        let mut notes: Vec<NoteEvent> = pairs.iter().map(|&(p, t)| NoteEvent::new(p, t)).collect();
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self {
            notes,
            initial_bpm: DEFAULT_BPM,
        }
    }

    #[inline(always)]
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    #[inline(always)]
    pub(crate) fn notes_mut(&mut self) -> &mut [NoteEvent] {
        &mut self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn initial_bpm(&self) -> f64 {
        self.initial_bpm
    }

    pub fn times(&self) -> Vec<f32> {
        self.notes.iter().map(|n| n.time).collect()
    }

    /// Prompts this chart produces: each run of equal-time notes pairs off
    /// into one combination.
    pub fn combination_count(&self) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < self.notes.len() {
            count += 1;
            if i + 1 < self.notes.len() && self.notes[i + 1].time == self.notes[i].time {
                i += 2;
            } else {
                i += 1;
            }
        }
        count
    }

    pub(crate) fn reset_progress(&mut self) {
        for note in &mut self.notes {
            note.reset();
        }
    }
}
