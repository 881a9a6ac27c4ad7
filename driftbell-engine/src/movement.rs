//! Movement state machine: the macro-sections of a session.
//!
//! A session opens with a NORMAL intro of fixed length; the first transition
//! always goes to CHORUS. After that CHORUS and VOID always fall back to
//! NORMAL and the other movements draw the next one from a weighted table.
//! The countdown is fed with musical time from the scheduler, never wall time.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rng::SeededRng;
use crate::tonal::Key;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Movement {
    Normal,
    Sparse,
    Void,
    Chorus,
}

/// What kind of melodic event a movement produces each step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Texture {
    Bell,
    Swarm,
    Silence,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MovementProfile {
    pub density: f64,
    pub texture: Texture,
    pub base_secs: f64,
}

impl Movement {
    pub const ALL: [Movement; 4] = [Movement::Normal, Movement::Sparse, Movement::Void, Movement::Chorus];

    pub fn profile(self) -> MovementProfile {
        match self {
            Movement::Normal => MovementProfile { density: 0.45, texture: Texture::Bell, base_secs: 35.0 },
            Movement::Sparse => MovementProfile { density: 0.25, texture: Texture::Bell, base_secs: 30.0 },
            Movement::Void => MovementProfile { density: 0.10, texture: Texture::Silence, base_secs: 15.0 },
            Movement::Chorus => MovementProfile { density: 1.60, texture: Texture::Swarm, base_secs: 16.0 },
        }
    }

    /// Movements that may carry a drone underneath.
    pub fn allows_drone(self) -> bool {
        matches!(self, Movement::Normal | Movement::Sparse)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: Movement,
    pub to: Movement,
}

impl Transition {
    /// Entering CHORUS from anywhere else cuts the ringing bells.
    pub fn enters_chorus(self) -> bool {
        self.to == Movement::Chorus && self.from != Movement::Chorus
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MovementState {
    current: Movement,
    remaining: f64,
    density: f64,
    opened: bool,
}

impl MovementState {
    /// A NORMAL intro lasting `intro_secs` of musical time.
    pub fn new(intro_secs: f64) -> Self {
        Self {
            current: Movement::Normal,
            remaining: intro_secs,
            density: Movement::Normal.profile().density,
            opened: false,
        }
    }

    #[inline] pub fn current(&self) -> Movement { self.current }
    #[inline] pub fn remaining(&self) -> f64 { self.remaining }
    #[inline] pub fn density(&self) -> f64 { self.density }

    /// Ease the effective density toward the current movement's target.
    pub fn smooth_density(&mut self, factor: f64) {
        let target = self.current.profile().density;
        self.density += (target - self.density) * factor;
    }

    /// Consume `elapsed` seconds of musical time; transition when the
    /// countdown runs out. Leaving CHORUS re-rolls `key`.
    pub fn advance(&mut self, elapsed: f64, rng: &mut SeededRng, key: &mut Key) -> Option<Transition> {
        self.remaining -= elapsed;
        if self.remaining > 0.0 {
            return None;
        }
        let from = self.current;
        let to = self.next_movement(rng);
        if from == Movement::Chorus {
            key.circle_pos += rng.step();
            key.minor = rng.chance(0.3);
        }
        self.current = to;
        self.remaining = to.profile().base_secs * rng.range(0.8, 1.2);
        debug!(?from, ?to, secs = self.remaining, "movement transition");
        Some(Transition { from, to })
    }

    fn next_movement(&mut self, rng: &mut SeededRng) -> Movement {
        if !self.opened {
            self.opened = true;
            return Movement::Chorus;
        }
        match self.current {
            Movement::Chorus | Movement::Void => Movement::Normal,
            Movement::Normal | Movement::Sparse => {
                let roll = rng.next_f64();
                if roll < 0.12 {
                    Movement::Void
                } else if roll < 0.35 {
                    Movement::Sparse
                } else if roll < 0.75 {
                    Movement::Normal
                } else {
                    Movement::Chorus
                }
            }
        }
    }
}
