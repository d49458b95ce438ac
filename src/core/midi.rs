use crate::error::MidiError;
use log::debug;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;

const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MidiEventKind {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    Tempo { bpm: f64 },
    Other,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MidiEvent {
    pub tick: u64,
    pub kind: MidiEventKind,
}

impl MidiEvent {
    pub const fn note_on(tick: u64, pitch: u8) -> Self {
        Self {
            tick,
            kind: MidiEventKind::NoteOn { pitch, velocity: 100 },
        }
    }

    pub const fn tempo(tick: u64, bpm: f64) -> Self {
        Self {
            tick,
            kind: MidiEventKind::Tempo { bpm },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MidiTrack {
    pub events: Vec<MidiEvent>,
}

/// Decoded file: tracks in file order, ticks absolute within each track.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiSource {
    pub ticks_per_quarter: u16,
    pub tracks: Vec<MidiTrack>,
}

impl MidiSource {
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

pub fn load(path: &Path) -> Result<MidiSource, MidiError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Flattens every track into absolute-tick events. `midly` types do not leave
/// this module.
pub fn decode(bytes: &[u8]) -> Result<MidiSource, MidiError> {
    let smf = Smf::parse(bytes).map_err(|e| MidiError::Parse(e.to_string()))?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) => tpq.as_int(),
        Timing::Timecode(_, _) => return Err(MidiError::UnsupportedTiming),
    };

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    for track in &smf.tracks {
        let mut tick = 0u64;
        let mut events = Vec::with_capacity(track.len());
        for event in track {
            tick += u64::from(event.delta.as_int());
            let kind = match event.kind {
                TrackEventKind::Midi { message, .. } => match message {
                    // Running-status files encode note-off as a zero-velocity note-on.
                    MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => MidiEventKind::NoteOff {
                        pitch: key.as_int(),
                    },
                    MidiMessage::NoteOn { key, vel } => MidiEventKind::NoteOn {
                        pitch: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOff { key, .. } => MidiEventKind::NoteOff {
                        pitch: key.as_int(),
                    },
                    _ => MidiEventKind::Other,
                },
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    let us = f64::from(us_per_quarter.as_int());
                    if us > 0.0 {
                        MidiEventKind::Tempo {
                            bpm: MICROSECONDS_PER_MINUTE / us,
                        }
                    } else {
                        MidiEventKind::Other
                    }
                }
                _ => MidiEventKind::Other,
            };
            if kind != MidiEventKind::Other {
                events.push(MidiEvent { tick, kind });
            }
        }
        tracks.push(MidiTrack { events });
    }

    debug!(
        "Decoded MIDI: {} tracks, {} ticks per quarter note",
        tracks.len(),
        ticks_per_quarter
    );
    Ok(MidiSource {
        ticks_per_quarter,
        tracks,
    })
}
