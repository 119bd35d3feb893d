//! Change ticks.
//!
//! Every schedule run is identified by a monotonically increasing `u32` tick.
//! Ticks are compared modularly so the counter may wrap; windows are clamped
//! to at most half of the `u32` space to keep the comparison sound.

/// Identifies a single schedule run. `0` means "never ran".
pub type Tick = u32;

/// The widest span a tick window may cover before its lower bound is raised.
pub const MAX_TICK_DELTA: u32 = i32::MAX as u32 - 1024;

/// Modular ordering: `a` is newer than `b` iff the signed distance is positive.
#[inline]
pub fn is_newer(a: Tick, b: Tick) -> bool {
    a.wrapping_sub(b) as i32 > 0
}

/// Per-cell change metadata, stored alongside every dense component value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CellTicks {
    pub added: Tick,
    pub changed: Tick,
}

impl CellTicks {
    pub fn stamped(tick: Tick) -> Self {
        CellTicks {
            added: tick,
            changed: tick,
        }
    }
}

/// The tick snapshot a system (or direct query) observes.
///
/// `this_run` is the world tick at the start of the schedule run; `last_run`
/// is remembered from the system's previous successful run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickWindow {
    pub last_run: Tick,
    pub this_run: Tick,
}

impl TickWindow {
    /// Builds a window, raising `last_run` if the span exceeds [`MAX_TICK_DELTA`].
    pub fn new(last_run: Tick, this_run: Tick) -> Self {
        let last_run = if this_run.wrapping_sub(last_run) > MAX_TICK_DELTA {
            this_run.wrapping_sub(MAX_TICK_DELTA)
        } else {
            last_run
        };
        TickWindow { last_run, this_run }
    }

    /// Accepts cells added after `last_run` and no later than `this_run`.
    #[inline]
    pub fn accepts_added(&self, ticks: CellTicks) -> bool {
        is_newer(ticks.added, self.last_run) && !is_newer(ticks.added, self.this_run)
    }

    /// Accepts cells changed after `last_run` and no later than `this_run`.
    #[inline]
    pub fn accepts_changed(&self, ticks: CellTicks) -> bool {
        is_newer(ticks.changed, self.last_run) && !is_newer(ticks.changed, self.this_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_is_modular() {
        assert!(is_newer(1, 0));
        assert!(!is_newer(0, 1));
        assert!(!is_newer(7, 7));
        // one past the wrap point is still "newer"
        assert!(is_newer(5, u32::max_value() - 5));
    }

    #[test]
    fn window_accepts_fresh_adds_only() {
        let window = TickWindow::new(10, 12);
        assert!(window.accepts_added(CellTicks::stamped(11)));
        assert!(window.accepts_added(CellTicks::stamped(12)));
        assert!(!window.accepts_added(CellTicks::stamped(10)));
        assert!(!window.accepts_added(CellTicks::stamped(13)));
    }

    #[test]
    fn window_clamps_wide_spans() {
        let window = TickWindow::new(0, MAX_TICK_DELTA + 500);
        assert_eq!(window.last_run, 500);
        assert_eq!(window.this_run, MAX_TICK_DELTA + 500);
    }

    #[test]
    fn changed_tracks_separately_from_added() {
        let window = TickWindow::new(5, 9);
        let ticks = CellTicks {
            added: 2,
            changed: 8,
        };
        assert!(!window.accepts_added(ticks));
        assert!(window.accepts_changed(ticks));
    }
}
