/// Events emitted while the cascade runs.
/// The presentation layer consumes these for sound and redraw.

use crate::domain::cell::CellState;
use crate::domain::grid::CellIndex;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[allow(dead_code)]
pub enum CascadeEvent {
    /// First valid user trigger accepted. Emitted once per session.
    Acknowledged { origin: CellIndex },
    /// A cell moved to a new state. `Idle` means its entry was removed.
    StateChanged { index: CellIndex, state: CellState, at_ms: u64 },
}

impl CascadeEvent {
    pub fn is_acknowledge(&self) -> bool {
        matches!(self, CascadeEvent::Acknowledged { .. })
    }
}
