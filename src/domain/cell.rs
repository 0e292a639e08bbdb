/// Per-cell visual states and the fixed-duration sequence a triggered
/// cell passes through.
///
/// Semantics live here; the scheduler only replays `CascadeTiming::phases()`.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub enum CellState {
    /// At rest. Also the state of every cell absent from the live store.
    #[default]
    Idle,
    Exploding,
    Hidden,
    FadingIn,
}

impl CellState {
    /// Does this cell currently occupy an entry in the live store?
    pub fn is_animating(self) -> bool {
        !matches!(self, CellState::Idle)
    }

    /// Short label for logs and the status line.
    pub fn label(self) -> &'static str {
        match self {
            CellState::Idle => "idle",
            CellState::Exploding => "exploding",
            CellState::Hidden => "hidden",
            CellState::FadingIn => "fading-in",
        }
    }
}

/// Upper bound for any single configured duration.
pub const MAX_PHASE_MS: u64 = 60_000;

/// Timing of one cell's sequence and of neighbour propagation, in ms.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CascadeTiming {
    pub explode_ms: u64,
    pub hidden_ms: u64,
    pub fade_in_ms: u64,
    pub propagation_delay_ms: u64,
    pub neighbor_stagger_ms: u64,
}

impl Default for CascadeTiming {
    fn default() -> Self {
        CascadeTiming {
            explode_ms: 300,
            hidden_ms: 1500,
            fade_in_ms: 500,
            propagation_delay_ms: 50,
            neighbor_stagger_ms: 30,
        }
    }
}

impl CascadeTiming {
    /// Every duration multiplied by `factor` (rounded, never negative,
    /// at most `MAX_PHASE_MS`).
    pub fn scaled(&self, factor: f64) -> Self {
        let f = if factor.is_finite() && factor > 0.0 { factor } else { 1.0 };
        let s = |ms: u64| ((ms as f64 * f).round() as u64).min(MAX_PHASE_MS);
        CascadeTiming {
            explode_ms: s(self.explode_ms),
            hidden_ms: s(self.hidden_ms),
            fade_in_ms: s(self.fade_in_ms),
            propagation_delay_ms: s(self.propagation_delay_ms),
            neighbor_stagger_ms: s(self.neighbor_stagger_ms),
        }
    }

    /// Every duration capped at `MAX_PHASE_MS`.
    pub fn clamped(&self) -> Self {
        CascadeTiming {
            explode_ms: self.explode_ms.min(MAX_PHASE_MS),
            hidden_ms: self.hidden_ms.min(MAX_PHASE_MS),
            fade_in_ms: self.fade_in_ms.min(MAX_PHASE_MS),
            propagation_delay_ms: self.propagation_delay_ms.min(MAX_PHASE_MS),
            neighbor_stagger_ms: self.neighbor_stagger_ms.min(MAX_PHASE_MS),
        }
    }

    /// `(offset from trigger, new state)` for one triggered cell.
    /// Offsets are monotonically non-decreasing and end in `Idle`.
    pub fn phases(&self) -> [(u64, CellState); 4] {
        let hidden_at = self.explode_ms;
        let fade_at = hidden_at.saturating_add(self.hidden_ms);
        let idle_at = fade_at.saturating_add(self.fade_in_ms);
        [
            (0, CellState::Exploding),
            (hidden_at, CellState::Hidden),
            (fade_at, CellState::FadingIn),
            (idle_at, CellState::Idle),
        ]
    }

    /// Time from trigger until the cell is back at rest.
    pub fn cycle_ms(&self) -> u64 {
        self.explode_ms
            .saturating_add(self.hidden_ms)
            .saturating_add(self.fade_in_ms)
    }

    /// Longest delay between a cell's trigger and any of its neighbours'
    /// (four neighbours, the last one staggered three times).
    pub fn worst_hop_ms(&self) -> u64 {
        self.propagation_delay_ms
            .saturating_add(self.neighbor_stagger_ms.saturating_mul(3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_phase_table() {
        let t = CascadeTiming::default();
        assert_eq!(
            t.phases(),
            [
                (0, CellState::Exploding),
                (300, CellState::Hidden),
                (1800, CellState::FadingIn),
                (2300, CellState::Idle),
            ]
        );
        assert_eq!(t.cycle_ms(), 2300);
        assert_eq!(t.worst_hop_ms(), 140);
    }

    #[test]
    fn scaling_keeps_proportions() {
        let t = CascadeTiming::default().scaled(0.1);
        assert_eq!(t.explode_ms, 30);
        assert_eq!(t.hidden_ms, 150);
        assert_eq!(t.fade_in_ms, 50);
        assert_eq!(t.propagation_delay_ms, 5);
        assert_eq!(t.neighbor_stagger_ms, 3);
        // Nonsense factors fall back to 1.0
        assert_eq!(CascadeTiming::default().scaled(-2.0), CascadeTiming::default());
        assert_eq!(CascadeTiming::default().scaled(f64::NAN), CascadeTiming::default());
    }

    #[test]
    fn durations_are_capped() {
        let t = CascadeTiming::default().scaled(1e20);
        assert_eq!(t.explode_ms, MAX_PHASE_MS);
        assert_eq!(t.neighbor_stagger_ms, MAX_PHASE_MS);
        assert_eq!(t.cycle_ms(), 3 * MAX_PHASE_MS);

        let huge = CascadeTiming {
            explode_ms: u64::MAX,
            hidden_ms: u64::MAX,
            fade_in_ms: 10,
            propagation_delay_ms: u64::MAX,
            neighbor_stagger_ms: u64::MAX,
        };
        // Unclamped values saturate instead of wrapping
        let offsets: Vec<u64> = huge.phases().iter().map(|(at, _)| *at).collect();
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(huge.cycle_ms(), u64::MAX);
        assert_eq!(huge.worst_hop_ms(), u64::MAX);
        assert_eq!(huge.clamped().explode_ms, MAX_PHASE_MS);
        assert_eq!(huge.clamped().fade_in_ms, 10);
    }

    #[test]
    fn idle_is_default_and_not_animating() {
        assert_eq!(CellState::default(), CellState::Idle);
        assert!(!CellState::Idle.is_animating());
        assert!(CellState::Hidden.is_animating());
        assert_eq!(CellState::FadingIn.label(), "fading-in");
    }
}
