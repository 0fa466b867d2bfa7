//! Fixed timestep clock
//!
//! Wall-clock frame deltas are folded into an accumulator and paid out as
//! whole simulation steps, so game logic runs at the same rate whatever the
//! display refresh. There is no catch-up cap: a long stall runs every step
//! it owes in one call.

#[derive(Debug, Clone)]
pub struct SimClock {
    fixed_step: f64,
    accumulator: f64,
    elapsed: f64,
    pulse: f32,
    pulse_target: f32,
    pulse_step: f32,
}

impl SimClock {
    pub fn new(fixed_step: f64, pulse_step: f32) -> Self {
        debug_assert!(fixed_step > 0.0);
        Self {
            fixed_step,
            accumulator: 0.0,
            elapsed: 0.0,
            pulse: 0.0,
            pulse_target: 0.0,
            pulse_step,
        }
    }

    /// Consume a wall-clock delta, calling `step` once per fixed step owed
    ///
    /// Negative or non-finite deltas are treated as zero. Returns the number
    /// of steps run.
    pub fn advance(&mut self, wall_dt: f64, mut step: impl FnMut(f64)) -> u32 {
        if wall_dt.is_finite() && wall_dt > 0.0 {
            self.accumulator += wall_dt;
        }

        let mut steps = 0;
        while self.accumulator >= self.fixed_step {
            step(self.fixed_step);
            self.elapsed += self.fixed_step;
            self.ease_pulse();
            self.accumulator -= self.fixed_step;
            steps += 1;
        }
        steps
    }

    fn ease_pulse(&mut self) {
        let delta = self.pulse_target - self.pulse;
        if delta.abs() <= self.pulse_step {
            self.pulse = self.pulse_target;
        } else {
            self.pulse += self.pulse_step.copysign(delta);
        }
    }

    pub fn set_pulse_target(&mut self, target: f32) {
        self.pulse_target = target;
    }

    pub fn pulse_target(&self) -> f32 {
        self.pulse_target
    }

    /// Smoothed scalar fed to `uPulse`
    pub fn pulse(&self) -> f32 {
        self.pulse
    }

    /// Simulated seconds, advanced only by whole steps
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn fixed_step(&self) -> f64 {
        self.fixed_step
    }
}
