//! Listener settings: session length and tone base.
//!
//! Stored as a flat JSON object, e.g. `{"songDuration":"infinite","toneBaseHz":110}`.
//! The song duration must be one of the presets; the tone base is clamped
//! into range when read.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const TONE_BASE_MIN_HZ: f64 = 100.0;
pub const TONE_BASE_MAX_HZ: f64 = 200.0;
pub const TONE_BASE_DEFAULT_HZ: f64 = 110.0;

/// Session length presets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "DurationRepr", into = "DurationRepr")]
pub enum SongDuration {
    #[default]
    Infinite,
    Finite(u32),
}

impl SongDuration {
    pub const PRESETS_SECS: [u32; 5] = [60, 300, 600, 1800, 3600];

    pub fn from_secs(secs: u32) -> Option<Self> {
        Self::PRESETS_SECS.contains(&secs).then_some(SongDuration::Finite(secs))
    }

    /// Session limit in seconds, `None` when infinite.
    pub fn limit_secs(self) -> Option<f64> {
        match self {
            SongDuration::Infinite => None,
            SongDuration::Finite(s) => Some(f64::from(s)),
        }
    }
}

impl fmt::Display for SongDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongDuration::Infinite => f.write_str("infinite"),
            SongDuration::Finite(s) => write!(f, "{s}s"),
        }
    }
}

impl std::str::FromStr for SongDuration {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("infinite") {
            return Ok(SongDuration::Infinite);
        }
        let secs: u32 = s
            .trim_end_matches('s')
            .parse()
            .map_err(|_| SessionError::Settings(format!("song duration {s:?}")))?;
        SongDuration::from_secs(secs)
            .ok_or_else(|| SessionError::Settings(format!("song duration {secs}s is not a preset")))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Word(String),
    Secs(u32),
}

impl TryFrom<DurationRepr> for SongDuration {
    type Error = String;

    fn try_from(r: DurationRepr) -> Result<Self, Self::Error> {
        match r {
            DurationRepr::Word(w) if w == "infinite" => Ok(SongDuration::Infinite),
            DurationRepr::Word(w) => Err(format!("unknown song duration {w:?}")),
            DurationRepr::Secs(s) => {
                SongDuration::from_secs(s).ok_or_else(|| format!("song duration {s}s is not a preset"))
            }
        }
    }
}

impl From<SongDuration> for DurationRepr {
    fn from(d: SongDuration) -> Self {
        match d {
            SongDuration::Infinite => DurationRepr::Word("infinite".into()),
            SongDuration::Finite(s) => DurationRepr::Secs(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub song_duration: SongDuration,
    #[serde(default = "Settings::default_tone_base")]
    pub tone_base_hz: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self { song_duration: SongDuration::Infinite, tone_base_hz: TONE_BASE_DEFAULT_HZ }
    }
}

impl Settings {
    fn default_tone_base() -> f64 {
        TONE_BASE_DEFAULT_HZ
    }

    pub fn clamp_tone_base(hz: f64) -> f64 {
        if hz.is_finite() {
            hz.clamp(TONE_BASE_MIN_HZ, TONE_BASE_MAX_HZ)
        } else {
            TONE_BASE_DEFAULT_HZ
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        let mut s: Settings = serde_json::from_str(text)?;
        s.tone_base_hz = Self::clamp_tone_base(s.tone_base_hz);
        Ok(s)
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, SessionError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_and_clamps() {
        let s = Settings::from_json(r#"{"songDuration":600,"toneBaseHz":440}"#).unwrap();
        assert_eq!(s, Settings { song_duration: SongDuration::Finite(600), tone_base_hz: 200.0 });
        let s = Settings::from_json(r#"{"songDuration":"infinite","toneBaseHz":20}"#).unwrap();
        assert_eq!(s.tone_base_hz, 100.0);
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn rejects_unknown_durations() {
        assert!(Settings::from_json(r#"{"songDuration":61}"#).is_err());
        assert!(Settings::from_json(r#"{"songDuration":"forever"}"#).is_err());
        assert!("45".parse::<SongDuration>().is_err());
        assert_eq!("300s".parse::<SongDuration>().unwrap(), SongDuration::Finite(300));
        assert_eq!("infinite".parse::<SongDuration>().unwrap(), SongDuration::Infinite);
    }

    #[test]
    fn json_shape_is_stable() {
        let s = Settings { song_duration: SongDuration::Finite(1800), tone_base_hz: 150.0 };
        let v: serde_json::Value = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        assert_eq!(v, serde_json::json!({"songDuration": 1800, "toneBaseHz": 150.0}));
        assert_eq!(Settings::from_json(&s.to_json().unwrap()).unwrap(), s);
    }

    #[test]
    fn save_and_load_through_a_file() {
        let path = std::env::temp_dir().join(format!("driftbell-settings-{}.json", std::process::id()));
        let s = Settings { song_duration: SongDuration::Finite(60), tone_base_hz: 123.0 };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
        let _ = std::fs::remove_file(&path);
    }
}
