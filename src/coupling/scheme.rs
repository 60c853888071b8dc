//! Time-window clock of a coupling scheme.
//!
//! Tracks the computed part of the current window, completed windows and the
//! iteration counter, and decides when the run has reached its stop
//! condition. It does not move data; the session consults it to decide when
//! to exchange.

use crate::coupling::config::SchemeConfig;
use crate::coupling_error::CouplingError;

/// Absolute tolerance on time comparisons, scaled by the magnitude of the
/// compared times when they exceed one.
pub const TIME_TOLERANCE: f64 = 1e-14;

fn eps(scale: f64) -> f64 {
    TIME_TOLERANCE * scale.abs().max(1.0)
}

#[derive(Clone, Debug)]
pub struct WindowClock {
    window_size: f64,
    max_time: Option<f64>,
    max_windows: Option<u64>,
    completed_windows: u64,
    /// Time advanced inside the current window.
    computed: f64,
    /// 1-based iteration inside the current window.
    iteration: u32,
}

impl WindowClock {
    pub fn new(scheme: &SchemeConfig) -> Self {
        Self {
            window_size: scheme.time_window_size,
            max_time: scheme.max_time,
            max_windows: scheme.max_time_windows,
            completed_windows: 0,
            computed: 0.0,
            iteration: 1,
        }
    }

    /// Start of the current window; recomputed from the window count so that
    /// long runs do not accumulate rounding error. Never past `max_time`.
    pub fn window_start(&self) -> f64 {
        let start = self.completed_windows as f64 * self.window_size;
        self.max_time.map_or(start, |t| start.min(t))
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        self.window_start() + self.computed
    }

    /// 1-based index of the window being computed.
    pub fn time_window(&self) -> u64 {
        self.completed_windows + 1
    }

    pub fn completed_windows(&self) -> u64 {
        self.completed_windows
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Length of the current window; the last one is cut at `max_time`.
    fn window_length(&self) -> f64 {
        let start = self.window_start();
        match self.max_time {
            Some(t) => self.window_size.min(t - start),
            None => self.window_size,
        }
    }

    /// False once the configured stop condition is met.
    pub fn is_ongoing(&self) -> bool {
        let windows_left = self
            .max_windows
            .is_none_or(|n| self.completed_windows < n);
        let time_left = self.max_time.is_none_or(|t| {
            let start = self.window_start();
            t - start > eps(t)
        });
        windows_left && time_left
    }

    /// Largest step the participant may take next.
    pub fn max_step(&self) -> f64 {
        if self.is_ongoing() {
            (self.window_length() - self.computed).max(0.0)
        } else {
            0.0
        }
    }

    /// Whether a step of `dt` would reach the end of the current window.
    pub fn reaches_window_end(&self, dt: f64) -> bool {
        let length = self.window_length();
        self.computed + dt >= length - eps(length)
    }

    /// Accounts for a step of `dt`. Returns whether the window end was reached.
    pub fn add_step(&mut self, dt: f64) -> Result<bool, CouplingError> {
        let max = self.max_step();
        if !(dt.is_finite() && dt > 0.0) || dt > max + eps(max) {
            return Err(CouplingError::InvalidStepLength { step: dt, max });
        }
        let reached = self.reaches_window_end(dt);
        self.computed = if reached {
            self.window_length()
        } else {
            self.computed + dt
        };
        Ok(reached)
    }

    /// Moves on to the next window.
    pub fn complete_window(&mut self) {
        self.completed_windows += 1;
        self.computed = 0.0;
        self.iteration = 1;
    }

    /// Rewinds to the start of the current window for another iteration.
    pub fn repeat_window(&mut self) {
        self.computed = 0.0;
        self.iteration += 1;
    }
}
