//! Tonal model: scale degrees on a rotating circle-of-fifths key.

use driftbell_core::dsp::semitone_ratio;
use serde::{Deserialize, Serialize};

pub const MAJOR: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
pub const MINOR: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Lowest pitch for bells and swarms.
pub const MELODIC_FLOOR_HZ: f64 = 220.0;
/// Lowest pitch for drone roots (F2).
pub const DRONE_FLOOR_HZ: f64 = 87.31;

/// Position on the circle of fifths plus the major/minor flag.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub circle_pos: i32,
    pub minor: bool,
}

impl Key {
    /// Pitch class of the tonic, 0..12. Minor keys sit on the relative minor.
    pub fn root_pitch_class(self) -> i32 {
        let pos = self.circle_pos.rem_euclid(12);
        let major_root = (pos * 7).rem_euclid(12);
        if self.minor { (major_root + 9) % 12 } else { major_root }
    }

    fn intervals(self) -> &'static [i32; 7] {
        if self.minor { &MINOR } else { &MAJOR }
    }

    /// Semitones above `base` for scale `index` (any integer; 7 steps per octave).
    pub fn semitones(self, index: i32) -> i32 {
        let octave = index.div_euclid(7);
        let degree = index.rem_euclid(7) as usize;
        self.root_pitch_class() + self.intervals()[degree] + 12 * octave
    }

    pub fn frequency(self, base_hz: f64, index: i32) -> f64 {
        scale_frequency(base_hz, index, self.circle_pos, self.minor)
    }
}

/// Frequency of scale degree `index` in the key at `key_position`.
pub fn scale_frequency(base_hz: f64, index: i32, key_position: i32, minor: bool) -> f64 {
    let key = Key { circle_pos: key_position, minor };
    base_hz * semitone_ratio(f64::from(key.semitones(index)))
}

/// Raise `freq` by octaves until it reaches `floor_hz`. Never lowers.
pub fn clamp_to_floor(freq: f64, floor_hz: f64) -> f64 {
    if !(freq > 0.0) || !floor_hz.is_finite() {
        return freq;
    }
    let mut f = freq;
    while f < floor_hz {
        f *= 2.0;
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn c_major_tonic_is_base() {
        assert_eq!(scale_frequency(110.0, 0, 0, false), 110.0);
        let fifth = scale_frequency(110.0, 4, 0, false);
        assert!((fifth - 110.0 * semitone_ratio(7.0)).abs() < 1e-9);
    }

    #[test]
    fn circle_position_moves_by_fifths() {
        // one step clockwise: G, seven semitones up
        assert_eq!(Key { circle_pos: 1, minor: false }.root_pitch_class(), 7);
        // one step counter-clockwise: F
        assert_eq!(Key { circle_pos: -1, minor: false }.root_pitch_class(), 5);
        // wraps after twelve
        assert_eq!(Key { circle_pos: 13, minor: false }.root_pitch_class(), 7);
    }

    #[test]
    fn minor_uses_relative_minor_root() {
        // C major -> A minor
        assert_eq!(Key { circle_pos: 0, minor: true }.root_pitch_class(), 9);
        // G major -> E minor
        assert_eq!(Key { circle_pos: 1, minor: true }.root_pitch_class(), 4);
    }

    #[test]
    fn negative_indices_wrap_down_an_octave() {
        let key = Key { circle_pos: 0, minor: false };
        assert_eq!(key.semitones(-1), -1); // B below
        assert_eq!(key.semitones(-7), -12);
        assert_eq!(key.semitones(7), 12);
        assert_eq!(key.semitones(9), 16);
    }

    #[test]
    fn floor_clamp_doubles_only() {
        assert_eq!(clamp_to_floor(55.0, 220.0), 220.0);
        assert_eq!(clamp_to_floor(300.0, 220.0), 300.0);
        assert_eq!(clamp_to_floor(100.0, 220.0), 400.0);
        assert_eq!(clamp_to_floor(50.0, DRONE_FLOOR_HZ), 100.0);
    }

    proptest! {
        #[test]
        fn floor_clamp_reaches_floor_by_octaves(freq in 1e-3f64..1e5, floor in 1.0f64..1e4) {
            let r = clamp_to_floor(freq, floor);
            prop_assert!(r >= floor);
            let octaves = (r / freq).log2();
            prop_assert!(octaves >= 0.0);
            prop_assert!((octaves - octaves.round()).abs() < 1e-9, "{freq} -> {r}");
            if freq < floor {
                prop_assert!(r < 2.0 * floor, "{freq} -> {r} overshoots {floor}");
            } else {
                prop_assert_eq!(r, freq);
            }
        }
    }
}
