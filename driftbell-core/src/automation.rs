//! Piecewise parameter automation.
//!
//! An [`Automation`] is an initial value plus a time-ordered list of
//! breakpoints. Each breakpoint says how the curve *arrives* at its value:
//!
//! - `Step`        : jump to the value at the breakpoint time
//! - `Linear`      : straight line from the previous breakpoint
//! - `Exponential` : geometric curve from the previous breakpoint
//!
//! Times are seconds on the session clock (`f64`), values are `f32`.
//! Before the first breakpoint the initial value holds; after the last one its
//! value holds. An exponential segment whose endpoints are zero or differ in
//! sign holds the start value until the end of the segment, then jumps.

use crate::dsp::EXP_FLOOR;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Curve {
    Step,
    Linear,
    Exponential,
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Breakpoint {
    time: f64,
    value: f32,
    curve: Curve,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Automation {
    initial: f32,
    points: Vec<Breakpoint>,
}

impl Default for Automation {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl Automation {
    /// A curve that never changes.
    pub fn constant(value: f32) -> Self {
        Self { initial: value, points: Vec::new() }
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Breakpoint { time, value, curve: Curve::Step })
    }

    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) -> &mut Self {
        self.insert(Breakpoint { time: end_time, value, curve: Curve::Linear })
    }

    /// Exponential ramp; a non-positive target is lifted to [`EXP_FLOOR`].
    pub fn exponential_ramp_to(&mut self, value: f32, end_time: f64) -> &mut Self {
        let value = if value <= 0.0 { EXP_FLOOR } else { value };
        self.insert(Breakpoint { time: end_time, value, curve: Curve::Exponential })
    }

    /// Drop every breakpoint at or after `time` and pin the curve to the value
    /// it had at `time`. Used before a fade so the fade starts where the
    /// sound actually is.
    pub fn cancel_and_hold(&mut self, time: f64) -> &mut Self {
        let held = self.value_at(time);
        let keep = self.points.partition_point(|p| p.time < time);
        self.points.truncate(keep);
        self.set_value_at(held, time)
    }

    /// The same curve moved `offset` seconds later.
    pub fn shifted(&self, offset: f64) -> Self {
        let mut out = self.clone();
        for bp in &mut out.points {
            bp.time += offset;
        }
        out
    }

    fn insert(&mut self, bp: Breakpoint) -> &mut Self {
        // equal times keep insertion order
        let at = self.points.partition_point(|p| p.time <= bp.time);
        self.points.insert(at, bp);
        self
    }

    /// Room for `additional` more breakpoints, so later edits such as a
    /// fade do not allocate.
    pub fn reserve(&mut self, additional: usize) {
        self.points.reserve(additional);
    }

    /// Evaluate the curve at time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        // index of the first breakpoint strictly after t
        let next = self.points.partition_point(|p| p.time <= t);
        let (t0, v0) = match next.checked_sub(1) {
            Some(i) => (self.points[i].time, self.points[i].value),
            None => (f64::NEG_INFINITY, self.initial),
        };
        let Some(seg) = self.points.get(next) else {
            return v0;
        };
        if !t0.is_finite() {
            return v0;
        }
        let span = seg.time - t0;
        if span <= 0.0 {
            return seg.value;
        }
        let frac = ((t - t0) / span) as f32;
        match seg.curve {
            Curve::Step => v0,
            Curve::Linear => v0 + (seg.value - v0) * frac,
            Curve::Exponential => {
                if v0 == 0.0 || seg.value == 0.0 || (v0 < 0.0) != (seg.value < 0.0) {
                    v0
                } else {
                    v0 * (seg.value / v0).powf(frac)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_initial_value_before_first_breakpoint() {
        let mut a = Automation::constant(0.25);
        a.set_value_at(1.0, 2.0);
        assert_eq!(a.value_at(0.0), 0.25);
        assert_eq!(a.value_at(2.0), 1.0);
        assert_eq!(a.value_at(10.0), 1.0);
    }

    #[test]
    fn linear_then_exponential_envelope() {
        let mut a = Automation::constant(0.0);
        a.set_value_at(0.0, 1.0)
            .linear_ramp_to(0.5, 1.01)
            .exponential_ramp_to(0.0, 5.0);

        assert!((a.value_at(1.005) - 0.25).abs() < 1e-4);
        assert!((a.value_at(1.01) - 0.5).abs() < 1e-6);
        // geometric midpoint between 0.5 and the floor
        let mid = a.value_at(1.01 + (5.0 - 1.01) / 2.0);
        assert!((mid - (0.5f32 * EXP_FLOOR).sqrt()).abs() < 1e-4, "mid={mid}");
        assert!((a.value_at(5.0) - EXP_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn exponential_with_zero_start_holds() {
        let mut a = Automation::constant(0.0);
        a.set_value_at(0.0, 0.0).exponential_ramp_to(1.0, 1.0);
        assert_eq!(a.value_at(0.5), 0.0);
        assert_eq!(a.value_at(1.0), 1.0);
    }

    #[test]
    fn cancel_and_hold_pins_current_value() {
        let mut a = Automation::constant(0.0);
        a.set_value_at(0.0, 0.0).linear_ramp_to(1.0, 2.0).linear_ramp_to(0.0, 4.0);
        a.cancel_and_hold(1.0).linear_ramp_to(0.0, 1.2);

        assert!((a.value_at(1.0) - 0.5).abs() < 1e-6);
        assert!((a.value_at(1.1) - 0.25).abs() < 1e-5);
        assert_eq!(a.value_at(1.2), 0.0);
        assert_eq!(a.value_at(3.0), 0.0);
    }

    #[test]
    fn breakpoints_stay_sorted() {
        let mut a = Automation::constant(0.0);
        a.set_value_at(3.0, 3.0).set_value_at(1.0, 1.0).set_value_at(2.0, 2.0);
        let held: Vec<f32> = [0.5, 1.5, 2.5, 3.5].iter().map(|t| a.value_at(*t)).collect();
        assert_eq!(held, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
