//! Easing tweeners: map elapsed time onto an eased value range.

/// The easing families, selectable by name from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    QuadraticIn,
    QuadraticOut,
    QuadraticInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SineIn,
    SineOut,
    SineInOut,
    CircularIn,
    CircularOut,
    CircularInOut,
    ExponentialIn,
    ExponentialOut,
    ExponentialInOut,
}

/// The name/tag table used when parsing script arguments.
pub const EASINGS: [(&str, Easing); 16] = [
    ("linear", Easing::Linear),
    ("quadratic-in", Easing::QuadraticIn),
    ("quadratic-out", Easing::QuadraticOut),
    ("quadratic-in-out", Easing::QuadraticInOut),
    ("cubic-in", Easing::CubicIn),
    ("cubic-out", Easing::CubicOut),
    ("cubic-in-out", Easing::CubicInOut),
    ("sine-in", Easing::SineIn),
    ("sine-out", Easing::SineOut),
    ("sine-in-out", Easing::SineInOut),
    ("circular-in", Easing::CircularIn),
    ("circular-out", Easing::CircularOut),
    ("circular-in-out", Easing::CircularInOut),
    ("exponential-in", Easing::ExponentialIn),
    ("exponential-out", Easing::ExponentialOut),
    ("exponential-in-out", Easing::ExponentialInOut),
];

impl Easing {
    pub fn parse(name: &str) -> Option<Self> {
        EASINGS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, easing)| *easing)
    }

    pub fn name(&self) -> &'static str {
        EASINGS
            .iter()
            .find(|(_, easing)| easing == self)
            .map(|(name, _)| *name)
            .unwrap()
    }

    /// Ease a normalized ratio; `apply(0) == 0` and `apply(1) == 1` for
    /// every family.
    pub fn apply(&self, ratio: f64) -> f64 {
        use std::f64::consts::{FRAC_PI_2, PI};
        let t = ratio;
        match self {
            Self::Linear => t,
            Self::QuadraticIn => t * t,
            Self::QuadraticOut => t * (2.0 - t),
            Self::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    (4.0 - 2.0 * t) * t - 1.0
                }
            }
            Self::CubicIn => t * t * t,
            Self::CubicOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let t = 2.0 * t - 2.0;
                    0.5 * t * t * t + 1.0
                }
            }
            Self::SineIn => 1.0 - (t * FRAC_PI_2).cos(),
            Self::SineOut => (t * FRAC_PI_2).sin(),
            Self::SineInOut => 0.5 * (1.0 - (t * PI).cos()),
            Self::CircularIn => 1.0 - (1.0 - t * t).sqrt(),
            Self::CircularOut => (t * (2.0 - t)).sqrt(),
            Self::CircularInOut => {
                if t < 0.5 {
                    0.5 * (1.0 - (1.0 - 4.0 * t * t).sqrt())
                } else {
                    let t = 2.0 * t - 2.0;
                    0.5 * ((1.0 - t * t).sqrt() + 1.0)
                }
            }
            Self::ExponentialIn => {
                if t == 0.0 {
                    0.0
                } else {
                    (2.0f64).powf(10.0 * (t - 1.0))
                }
            }
            Self::ExponentialOut => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - (2.0f64).powf(-10.0 * t)
                }
            }
            Self::ExponentialInOut => {
                if t == 0.0 {
                    0.0
                } else if t == 1.0 {
                    1.0
                } else if t < 0.5 {
                    0.5 * (2.0f64).powf(20.0 * t - 10.0)
                } else {
                    1.0 - 0.5 * (2.0f64).powf(10.0 - 20.0 * t)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tweener {
    easing: Easing,
    duration: f64,
    from: f64,
    to: f64,
    clamp: bool,
}

impl Tweener {
    pub fn new(easing: Easing, duration: f64, from: f64, to: f64) -> Self {
        Self {
            easing,
            duration,
            from,
            to,
            clamp: true,
        }
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    pub fn set_easing(&mut self, easing: Easing) {
        self.easing = easing;
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    pub fn range(&self) -> (f64, f64) {
        (self.from, self.to)
    }

    pub fn set_range(&mut self, from: f64, to: f64) {
        self.from = from;
        self.to = to;
    }

    pub fn is_clamped(&self) -> bool {
        self.clamp
    }

    pub fn set_clamp(&mut self, clamp: bool) {
        self.clamp = clamp;
    }

    pub fn evaluate(&self, time: f64) -> f64 {
        let mut ratio = time / self.duration;
        if self.clamp {
            ratio = ratio.clamp(0.0, 1.0);
        }
        self.from + (self.to - self.from) * self.easing.apply(ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_easing_is_anchored_at_both_ends() {
        for (_, easing) in EASINGS {
            assert!(easing.apply(0.0).abs() < 1e-9, "{easing:?} at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-9, "{easing:?} at 1");
        }
    }

    #[test]
    fn names_round_trip() {
        for (name, easing) in EASINGS {
            assert_eq!(Easing::parse(name), Some(easing));
            assert_eq!(easing.name(), name);
        }
        assert_eq!(Easing::parse("bouncy"), None);
    }

    #[test]
    fn tweener_maps_onto_its_range() {
        let tweener = Tweener::new(Easing::Linear, 2.0, 10.0, 20.0);
        assert_eq!(tweener.evaluate(0.0), 10.0);
        assert_eq!(tweener.evaluate(1.0), 15.0);
        assert_eq!(tweener.evaluate(2.0), 20.0);
        // Clamped past the duration.
        assert_eq!(tweener.evaluate(5.0), 20.0);
    }

    #[test]
    fn unclamped_tweeners_extrapolate() {
        let mut tweener = Tweener::new(Easing::Linear, 1.0, 0.0, 10.0);
        tweener.set_clamp(false);
        assert_eq!(tweener.evaluate(2.0), 20.0);
    }
}
