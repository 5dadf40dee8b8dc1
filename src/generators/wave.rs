//! Periodic waveform generators.

/// Waveform shapes, selectable by name from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveForm {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl WaveForm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Self::Sine),
            "square" => Some(Self::Square),
            "triangle" => Some(Self::Triangle),
            "sawtooth" => Some(Self::Sawtooth),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
        }
    }

    /// The raw waveform over a unit period, output in `[-1, 1]`.
    fn value(&self, ratio: f64) -> f64 {
        match self {
            Self::Sine => (ratio * std::f64::consts::TAU).sin(),
            Self::Square => {
                if ratio < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Triangle => 1.0 - 4.0 * (ratio - 0.5).abs(),
            Self::Sawtooth => 2.0 * ratio - 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Wave {
    form: WaveForm,
    period: f64,
    amplitude: f64,
}

impl Wave {
    pub fn new(form: WaveForm, period: f64, amplitude: f64) -> Self {
        Self {
            form,
            period,
            amplitude,
        }
    }

    pub fn form(&self) -> WaveForm {
        self.form
    }

    pub fn set_form(&mut self, form: WaveForm) {
        self.form = form;
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn set_period(&mut self, period: f64) {
        self.period = period;
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.amplitude = amplitude;
    }

    pub fn at(&self, time: f64) -> f64 {
        let ratio = (time / self.period).rem_euclid(1.0);
        self.form.value(ratio) * self.amplitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_hits_its_extremes() {
        let wave = Wave::new(WaveForm::Triangle, 1.0, 1.0);
        assert!((wave.at(0.0) - -1.0).abs() < 1e-9);
        assert!((wave.at(0.5) - 1.0).abs() < 1e-9);
        assert!((wave.at(1.0) - -1.0).abs() < 1e-9); // Periodic wrap.
    }

    #[test]
    fn square_flips_at_half_period() {
        let wave = Wave::new(WaveForm::Square, 2.0, 3.0);
        assert_eq!(wave.at(0.1), 3.0);
        assert_eq!(wave.at(1.1), -3.0);
        assert_eq!(wave.at(-0.1), -3.0); // Negative time wraps too.
    }

    #[test]
    fn sine_respects_amplitude() {
        let wave = Wave::new(WaveForm::Sine, 1.0, 0.5);
        assert!((wave.at(0.25) - 0.5).abs() < 1e-9);
        assert!(wave.at(0.0).abs() < 1e-9);
    }

    #[test]
    fn sawtooth_ramps() {
        let wave = Wave::new(WaveForm::Sawtooth, 1.0, 1.0);
        assert!((wave.at(0.0) - -1.0).abs() < 1e-9);
        assert!((wave.at(0.75) - 0.5).abs() < 1e-9);
    }
}
