use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartError {
    #[error("the MIDI source has no tracks")]
    NoTracks,
    #[error("no tempo event was found in any track")]
    NoTempo,
    #[error("track {track} is malformed: {reason}")]
    MalformedTrack { track: usize, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    #[error("no playable audio file in '{}'", folder.display())]
    NotFound { folder: PathBuf },
    #[error("{} candidate files in '{}', expected exactly one", candidates.len(), folder.display())]
    Ambiguous {
        folder: PathBuf,
        candidates: Vec<PathBuf>,
    },
    #[error("could not read '{}': {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("a song is already playing")]
    AlreadyPlaying,
    #[error("no song has been fully loaded")]
    LoadIncomplete,
}

#[derive(Error, Debug)]
pub enum MidiError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid MIDI data: {0}")]
    Parse(String),
    #[error("SMPTE timecode timing is not supported")]
    UnsupportedTiming,
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("chart: {0}")]
    Chart(#[from] ChartError),
    #[error("audio: {0}")]
    Asset(#[from] AssetError),
    #[error("midi: {0}")]
    Midi(#[from] MidiError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
