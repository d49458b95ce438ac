use crate::error::AssetError;
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipFormat {
    Wav,
    Mp3,
}

impl ClipFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub format: ClipFormat,
    pub duration_seconds: f32,
}

impl AudioClip {
    /// A clip that exists only in memory, used when the caller already knows
    /// the length (tests, headless runs with a synthetic chart).
    pub fn synthetic(duration_seconds: f32) -> Self {
        Self {
            path: PathBuf::new(),
            format: ClipFormat::Wav,
            duration_seconds,
        }
    }
}

/// Finds the single playable file in `folder`. WAV wins over MP3; more than
/// one file of the winning kind is ambiguous.
pub fn locate_clip(folder: &Path) -> Result<(PathBuf, ClipFormat), AssetError> {
    let entries = std::fs::read_dir(folder).map_err(|e| AssetError::Unreadable {
        path: folder.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut wavs = Vec::new();
    let mut mp3s = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match ClipFormat::from_path(&path) {
            Some(ClipFormat::Wav) => wavs.push(path),
            Some(ClipFormat::Mp3) => mp3s.push(path),
            None => {}
        }
    }

    let (mut candidates, format) = if wavs.is_empty() {
        (mp3s, ClipFormat::Mp3)
    } else {
        (wavs, ClipFormat::Wav)
    };
    match candidates.len() {
        0 => Err(AssetError::NotFound {
            folder: folder.to_path_buf(),
        }),
        1 => Ok((candidates.remove(0), format)),
        _ => {
            candidates.sort();
            Err(AssetError::Ambiguous {
                folder: folder.to_path_buf(),
                candidates,
            })
        }
    }
}

/// Resolves the song's clip and reads its length; playback is not done here.
pub fn fetch_clip(folder: &Path) -> Result<AudioClip, AssetError> {
    let (path, format) = locate_clip(folder)?;
    let duration_seconds = match format {
        ClipFormat::Wav => wav_duration(&path)?,
        ClipFormat::Mp3 => mp3_duration(&path)?,
    };
    info!(
        "Audio clip '{}' ({:?}): {:.2}s",
        path.display(),
        format,
        duration_seconds
    );
    Ok(AudioClip {
        path,
        format,
        duration_seconds,
    })
}

fn unreadable(path: &Path, reason: impl ToString) -> AssetError {
    AssetError::Unreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn wav_duration(path: &Path) -> Result<f32, AssetError> {
    let reader = hound::WavReader::open(path).map_err(|e| unreadable(path, e))?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Err(unreadable(path, "sample rate is zero"));
    }
    Ok(reader.duration() as f32 / rate as f32)
}

fn mp3_duration(path: &Path) -> Result<f32, AssetError> {
    let file = File::open(path).map_err(|e| unreadable(path, e))?;
    let mut decoder = minimp3::Decoder::new(file);
    let mut seconds = 0.0f64;
    let mut frames = 0usize;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.sample_rate > 0 && frame.channels > 0 {
                    let per_channel = frame.data.len() / frame.channels;
                    seconds += per_channel as f64 / f64::from(frame.sample_rate);
                }
                frames += 1;
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(unreadable(path, e)),
        }
    }
    if frames == 0 {
        return Err(unreadable(path, "no MPEG audio frames"));
    }
    debug!("Counted {frames} MP3 frames in '{}'", path.display());
    Ok(seconds as f32)
}
