/// Session guard: the two pieces of bookkeeping that keep a cascade finite.
///
///   - `has_triggered`: set by the first accepted user trigger, never cleared.
///   - `visited`: cells already entered into the current cascade.
///
/// One `CascadeSession` exists per mounted grid. Dropping it is the teardown.

use std::collections::HashSet;

use crate::domain::grid::CellIndex;

/// Outcome of asking the guard whether a trigger may proceed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Admission {
    /// First user trigger of the session: a new cascade begins here.
    CascadeStarted,
    /// Chain reaction reached an unvisited cell.
    ChainEntered,
    /// Cell is already part of the cascade.
    AlreadyVisited,
    /// A user cascade already happened this session.
    SessionSpent,
}

#[derive(Clone, Debug, Default)]
pub struct CascadeSession {
    has_triggered: bool,
    visited: HashSet<CellIndex>,
}

impl CascadeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_triggered(&self) -> bool {
        self.has_triggered
    }

    #[cfg(test)]
    pub fn is_visited(&self, index: CellIndex) -> bool {
        self.visited.contains(&index)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// Admit (or refuse) a trigger, updating the guard on acceptance.
    pub fn admit(&mut self, index: CellIndex, is_chain_reaction: bool) -> Admission {
        if self.visited.contains(&index) {
            return Admission::AlreadyVisited;
        }
        if is_chain_reaction {
            self.visited.insert(index);
            return Admission::ChainEntered;
        }
        if self.has_triggered {
            return Admission::SessionSpent;
        }
        self.has_triggered = true;
        // A fresh cascade starts from a clean visited set. Only reachable
        // once while `has_triggered` is permanent.
        self.visited.clear();
        self.visited.insert(index);
        Admission::CascadeStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_user_trigger_starts_cascade() {
        let mut s = CascadeSession::new();
        assert!(!s.has_triggered());
        assert_eq!(s.admit(3, false), Admission::CascadeStarted);
        assert!(s.has_triggered());
        assert!(s.is_visited(3));
        assert_eq!(s.visited_count(), 1);
    }

    #[test]
    fn second_user_trigger_is_refused() {
        let mut s = CascadeSession::new();
        s.admit(3, false);
        assert_eq!(s.admit(8, false), Admission::SessionSpent);
        assert!(!s.is_visited(8));
        assert!(s.has_triggered());
    }

    #[test]
    fn chain_visits_each_cell_once() {
        let mut s = CascadeSession::new();
        s.admit(0, false);
        assert_eq!(s.admit(1, true), Admission::ChainEntered);
        assert_eq!(s.admit(1, true), Admission::AlreadyVisited);
        assert_eq!(s.admit(0, true), Admission::AlreadyVisited);
        assert_eq!(s.visited_count(), 2);
    }

    #[test]
    fn visited_check_precedes_session_lock() {
        let mut s = CascadeSession::new();
        s.admit(5, false);
        // Re-clicking the origin reports "visited", not "spent"
        assert_eq!(s.admit(5, false), Admission::AlreadyVisited);
    }
}
