use std::time::Duration;

use crate::types::PieceColor;

/// Cadence at which an owning loop should call [`ClockState::tick`].
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Ten minutes per side.
pub const DEFAULT_INITIAL_MS: u64 = 10 * 60 * 1000;

/// Two chess clocks (one per player).
///
/// Remaining time saturates at zero. Only the active side decrements, and only
/// while the clock is running. The clock never declares a loss by itself;
/// callers decide what a fallen flag means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockState {
    initial_ms: u64,
    increment_ms: u64,
    white_ms: u64,
    black_ms: u64,
    active: PieceColor,
    running: bool,
}

impl ClockState {
    /// Create a new clock with equal initial time for both sides.
    pub fn new(initial_ms: u64) -> Self {
        Self::with_increment(initial_ms, 0)
    }

    pub fn with_increment(initial_ms: u64, increment_ms: u64) -> Self {
        Self {
            initial_ms,
            increment_ms,
            white_ms: initial_ms,
            black_ms: initial_ms,
            active: PieceColor::White,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Back to the configured allotment, stopped, White active.
    pub fn reset(&mut self) {
        *self = Self::with_increment(self.initial_ms, self.increment_ms);
    }

    /// Make `side` the active clock.
    pub fn switch_to(&mut self, side: PieceColor) {
        self.active = side;
    }

    /// Add the configured increment to `side`, if the clock is running.
    pub fn credit_increment(&mut self, side: PieceColor) {
        let increment_ms = self.increment_ms;
        if self.running && increment_ms > 0 {
            let remaining = self.remaining_mut(side);
            *remaining = remaining.saturating_add(increment_ms);
        }
    }

    /// Deduct elapsed time from the active side's clock.
    pub fn tick(&mut self, elapsed: Duration) {
        if !self.running {
            return;
        }
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let remaining = self.remaining_mut(self.active);
        *remaining = remaining.saturating_sub(elapsed_ms);
    }

    /// Get remaining time for a side in milliseconds.
    pub fn remaining(&self, side: PieceColor) -> u64 {
        match side {
            PieceColor::White => self.white_ms,
            PieceColor::Black => self.black_ms,
        }
    }

    fn remaining_mut(&mut self, side: PieceColor) -> &mut u64 {
        match side {
            PieceColor::White => &mut self.white_ms,
            PieceColor::Black => &mut self.black_ms,
        }
    }

    /// Check if a side's time has run out.
    pub fn is_flag_fallen(&self, side: PieceColor) -> bool {
        self.remaining(side) == 0
    }

    pub fn active(&self) -> PieceColor {
        self.active
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn initial_ms(&self) -> u64 {
        self.initial_ms
    }

    pub fn increment_ms(&self) -> u64 {
        self.increment_ms
    }

    /// Format milliseconds for display. MM:SS or M:SS.s when under 10 seconds.
    pub fn format_time(ms: u64) -> String {
        let total_secs = ms / 1000;
        let minutes = total_secs / 60;
        let seconds = total_secs % 60;

        if total_secs < 10 {
            let tenths = (ms % 1000) / 100;
            format!("{}:{:02}.{}", minutes, seconds, tenths)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }
}

impl Default for ClockState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_MS)
    }
}
