use driftbell_core::automation::Automation;
use proptest::prelude::*;

proptest! {
    #[test]
    fn linear_ramp_stays_between_endpoints(
        a in -1.0f32..1.0,
        b in -1.0f32..1.0,
        len in 0.01f64..30.0,
        frac in 0.0f64..1.0,
    ) {
        let mut env = Automation::constant(0.0);
        env.set_value_at(a, 0.0).linear_ramp_to(b, len);
        let v = env.value_at(frac * len);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(v >= lo - 1e-5 && v <= hi + 1e-5, "v={} not in [{}, {}]", v, lo, hi);
    }

    #[test]
    fn exponential_decay_is_monotonic(
        start in 0.01f32..1.0,
        len in 0.1f64..30.0,
        t1 in 0.0f64..1.0,
        t2 in 0.0f64..1.0,
    ) {
        let mut env = Automation::constant(0.0);
        env.set_value_at(start, 0.0).exponential_ramp_to(0.0, len);
        let (early, late) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        prop_assert!(env.value_at(early * len) >= env.value_at(late * len) - 1e-7);
    }
}
