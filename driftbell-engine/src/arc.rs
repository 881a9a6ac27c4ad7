//! Phrase and arc tracking.
//!
//! A phrase is [`PHRASE_STEPS`] scheduling steps. An arc is 4..=8 phrases with
//! one climax phrase somewhere after the first. Tension climbs from 0 at the
//! arc start to 1 at the climax, holds through the climax phrase, and falls
//! back to 0 by the end of the arc.

use crate::rng::SeededRng;

pub const PHRASE_STEPS: u32 = 16;
pub const MIN_ARC_PHRASES: i32 = 4;
pub const MAX_ARC_PHRASES: i32 = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct ArcTracker {
    /// Step within the phrase; `None` until the first step is taken.
    phrase_step: Option<u32>,
    arc_pos: u32,
    arc_len: u32,
    climax: u32,
    tension: f64,
}

impl ArcTracker {
    /// Draws the first arc's shape from `rng`.
    pub fn new(rng: &mut SeededRng) -> Self {
        let (arc_len, climax) = Self::draw_shape(rng);
        Self { phrase_step: None, arc_pos: 0, arc_len, climax, tension: 0.0 }
    }

    fn draw_shape(rng: &mut SeededRng) -> (u32, u32) {
        let len = rng.int_inclusive(MIN_ARC_PHRASES, MAX_ARC_PHRASES);
        let climax = rng.int_inclusive(1, len - 1);
        (len as u32, climax as u32)
    }

    /// Move one step forward, wrapping phrases and starting new arcs.
    pub fn advance(&mut self, rng: &mut SeededRng) {
        let step = match self.phrase_step {
            None => 0,
            Some(s) if s + 1 >= PHRASE_STEPS => {
                self.arc_pos += 1;
                if self.arc_pos >= self.arc_len {
                    let (len, climax) = Self::draw_shape(rng);
                    self.arc_pos = 0;
                    self.arc_len = len;
                    self.climax = climax;
                }
                0
            }
            Some(s) => s + 1,
        };
        self.phrase_step = Some(step);
        self.tension = self.tension_at(self.arc_pos, step);
    }

    fn tension_at(&self, arc_pos: u32, step: u32) -> f64 {
        let pos = f64::from(arc_pos * PHRASE_STEPS + step);
        let peak_start = f64::from(self.climax * PHRASE_STEPS);
        let peak_end = f64::from((self.climax + 1) * PHRASE_STEPS - 1);
        let last = f64::from(self.arc_len * PHRASE_STEPS - 1);
        let t = if pos < peak_start {
            pos / peak_start
        } else if pos <= peak_end {
            1.0
        } else {
            (last - pos) / (last - peak_end)
        };
        t.clamp(0.0, 1.0)
    }

    #[inline] pub fn phrase_step(&self) -> u32 { self.phrase_step.unwrap_or(0) }
    #[inline] pub fn arc_pos(&self) -> u32 { self.arc_pos }
    #[inline] pub fn arc_len(&self) -> u32 { self.arc_len }
    #[inline] pub fn climax(&self) -> u32 { self.climax }
    #[inline] pub fn tension(&self) -> f64 { self.tension }

    pub fn is_phrase_start(&self) -> bool {
        self.phrase_step() == 0
    }

    pub fn is_arc_start(&self) -> bool {
        self.arc_pos == 0 && self.phrase_step() == 0
    }

    pub fn is_climax(&self) -> bool {
        self.arc_pos == self.climax
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_is_an_arc_start() {
        let mut rng = SeededRng::new(42);
        let mut arc = ArcTracker::new(&mut rng);
        arc.advance(&mut rng);
        assert!(arc.is_arc_start());
        assert_eq!(arc.tension(), 0.0);
    }

    #[test]
    fn phrases_wrap_every_sixteen_steps() {
        let mut rng = SeededRng::new(1);
        let mut arc = ArcTracker::new(&mut rng);
        arc.advance(&mut rng);
        for _ in 0..15 {
            arc.advance(&mut rng);
        }
        assert_eq!(arc.phrase_step(), 15);
        assert_eq!(arc.arc_pos(), 0);
        arc.advance(&mut rng);
        assert_eq!(arc.phrase_step(), 0);
        assert_eq!(arc.arc_pos(), 1);
        assert!(!arc.is_arc_start());
    }

    #[test]
    fn arcs_have_valid_shape_and_bounded_tension() {
        let mut rng = SeededRng::new(77);
        let mut arc = ArcTracker::new(&mut rng);
        let mut arcs = 0;
        let mut hit_peak = false;
        for _ in 0..20_000 {
            arc.advance(&mut rng);
            assert!((4..=8).contains(&arc.arc_len()));
            assert!(arc.climax() >= 1 && arc.climax() < arc.arc_len());
            assert!((0.0..=1.0).contains(&arc.tension()));
            if arc.is_climax() {
                assert_eq!(arc.tension(), 1.0);
                hit_peak = true;
            }
            if arc.is_arc_start() {
                assert_eq!(arc.tension(), 0.0);
                arcs += 1;
            }
        }
        assert!(hit_peak);
        assert!(arcs > 20);
    }
}
