/// Cascade scheduler: the propagation engine.
///
/// ## Model
///
/// Instead of nested timers, every future action is an item in a single
/// min-heap keyed by `(fire_at, seq)`. The host advances a virtual
/// millisecond clock with `advance_to()` / `advance_by()`; due items are
/// drained in order and may enqueue further items (never in the past).
///
/// A trigger at time `t` for cell `c`:
///   - writes `Exploding` immediately,
///   - queues `Hidden`, `FadingIn`, `Idle` at the phase offsets,
///   - queues a `Propagate(c)` at `t + propagation_delay`, which queues
///     `Trigger(n_i)` at `+ i * neighbor_stagger` for the i-th neighbour.
///
/// ## Teardown
///
/// `teardown()` clears the queue and the live store and bumps `epoch`.
/// Every item carries the epoch it was queued under; stale items are
/// discarded on pop, so nothing writes to the store after teardown.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::{debug, info, trace};

use crate::domain::cell::{CascadeTiming, CellState};
use crate::domain::grid::{CellIndex, Grid};
use crate::sim::event::CascadeEvent;
use crate::sim::session::{Admission, CascadeSession};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Action {
    SetState(CellIndex, CellState),
    Propagate(CellIndex),
    /// Chain-reaction trigger. User triggers never go through the queue.
    Trigger(CellIndex),
}

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    fire_at: u64,
    seq: u64,
    epoch: u64,
    action: Action,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest first, then enqueue order
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Summary of the session's cascade, for the status line and logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeStats {
    pub origin: Option<CellIndex>,
    pub started_at: Option<u64>,
    pub settled_at: Option<u64>,
    pub cells_exploded: usize,
}

pub struct CascadeScheduler {
    grid: Grid,
    timing: CascadeTiming,
    session: CascadeSession,
    /// Sparse live store: only cells that are mid-sequence.
    states: HashMap<CellIndex, CellState>,
    queue: BinaryHeap<Scheduled>,
    now_ms: u64,
    next_seq: u64,
    epoch: u64,
    torn_down: bool,
    stats: CascadeStats,
}

// ── Construction / accessors ──

impl CascadeScheduler {
    pub fn new(grid: Grid, timing: CascadeTiming) -> Self {
        debug!(
            columns = grid.columns,
            total_cells = grid.total_cells,
            "cascade session mounted"
        );
        CascadeScheduler {
            grid,
            timing,
            session: CascadeSession::new(),
            states: HashMap::new(),
            queue: BinaryHeap::new(),
            now_ms: 0,
            next_seq: 0,
            epoch: 0,
            torn_down: false,
            stats: CascadeStats::default(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn timing(&self) -> CascadeTiming {
        self.timing
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn session(&self) -> &CascadeSession {
        &self.session
    }

    pub fn stats(&self) -> CascadeStats {
        self.stats
    }

    /// Current state of a cell. Absent from the live store ⇒ `Idle`.
    #[inline]
    pub fn state_of(&self, index: CellIndex) -> CellState {
        self.states.get(&index).copied().unwrap_or_default()
    }

    /// Cells currently animating, in no particular order.
    pub fn live_states(&self) -> impl Iterator<Item = (CellIndex, CellState)> + '_ {
        self.states.iter().map(|(i, s)| (*i, *s))
    }

    pub fn live_count(&self) -> usize {
        self.states.len()
    }

    /// Outstanding scheduled items (transitions and chain triggers).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Nothing animating and nothing queued.
    pub fn is_settled(&self) -> bool {
        self.queue.is_empty() && self.states.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Is a cascade currently running?
    pub fn in_flight(&self) -> bool {
        self.session.has_triggered() && !self.is_settled()
    }
}

// ── Public entry points ──

impl CascadeScheduler {
    /// The user-facing trigger (a click on a cell).
    pub fn trigger_explosion(&mut self, index: CellIndex) -> Vec<CascadeEvent> {
        self.trigger(index, false)
    }

    /// Trigger `index` at the current clock time.
    pub fn trigger(&mut self, index: CellIndex, is_chain_reaction: bool) -> Vec<CascadeEvent> {
        let mut out = Vec::new();
        self.fire_trigger(index, is_chain_reaction, &mut out);
        out
    }

    /// Run every item due at or before `now_ms`. The clock never moves back.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<CascadeEvent> {
        let mut out = Vec::new();
        if self.torn_down {
            return out;
        }
        while let Some(top) = self.queue.peek() {
            if top.fire_at > now_ms {
                break;
            }
            let Some(item) = self.queue.pop() else { break };
            if item.epoch != self.epoch {
                continue;
            }
            self.now_ms = self.now_ms.max(item.fire_at);
            self.run(item.action, &mut out);
        }
        self.note_settled();
        self.now_ms = self.now_ms.max(now_ms);
        out
    }

    pub fn advance_by(&mut self, dt_ms: u64) -> Vec<CascadeEvent> {
        self.advance_to(self.now_ms.saturating_add(dt_ms))
    }

    /// Cancel everything. No further writes happen to this scheduler.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        info!(
            pending = self.queue.len(),
            animating = self.states.len(),
            visited = self.session.visited_count(),
            "cascade session torn down"
        );
        self.epoch = self.epoch.wrapping_add(1);
        self.queue.clear();
        self.states.clear();
        self.torn_down = true;
    }
}

// ── Internals ──

impl CascadeScheduler {
    fn fire_trigger(&mut self, index: CellIndex, is_chain_reaction: bool, out: &mut Vec<CascadeEvent>) {
        if self.torn_down {
            return;
        }
        if !self.grid.contains(index) {
            debug!(index, total = self.grid.total_cells, "trigger outside grid ignored");
            return;
        }

        match self.session.admit(index, is_chain_reaction) {
            Admission::CascadeStarted => {
                info!(origin = index, at_ms = self.now_ms, "cascade started");
                self.stats = CascadeStats {
                    origin: Some(index),
                    started_at: Some(self.now_ms),
                    settled_at: None,
                    cells_exploded: 0,
                };
                out.push(CascadeEvent::Acknowledged { origin: index });
            }
            Admission::ChainEntered => {}
            Admission::AlreadyVisited => return,
            Admission::SessionSpent => {
                debug!(index, "user trigger refused: session already used");
                return;
            }
        }

        let anchor = self.now_ms;
        self.stats.cells_exploded += 1;
        for (offset, state) in self.timing.phases() {
            if offset == 0 {
                self.write_state(index, state, out);
            } else {
                self.schedule(anchor.saturating_add(offset), Action::SetState(index, state));
            }
        }
        self.schedule(
            anchor.saturating_add(self.timing.propagation_delay_ms),
            Action::Propagate(index),
        );
    }

    fn run(&mut self, action: Action, out: &mut Vec<CascadeEvent>) {
        match action {
            Action::SetState(index, state) => self.write_state(index, state, out),
            Action::Propagate(index) => {
                let base = self.now_ms;
                for (i, neighbor) in self.grid.neighbors(index).into_iter().enumerate() {
                    let stagger = (i as u64).saturating_mul(self.timing.neighbor_stagger_ms);
                    let at = base.saturating_add(stagger);
                    self.schedule(at, Action::Trigger(neighbor));
                }
            }
            Action::Trigger(index) => self.fire_trigger(index, true, out),
        }
    }

    fn write_state(&mut self, index: CellIndex, state: CellState, out: &mut Vec<CascadeEvent>) {
        trace!(index, state = state.label(), at_ms = self.now_ms, "cell state");
        if state.is_animating() {
            self.states.insert(index, state);
        } else {
            self.states.remove(&index);
        }
        out.push(CascadeEvent::StateChanged { index, state, at_ms: self.now_ms });
    }

    fn schedule(&mut self, fire_at: u64, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { fire_at, seq, epoch: self.epoch, action });
    }

    fn note_settled(&mut self) {
        if self.stats.started_at.is_some() && self.stats.settled_at.is_none() && self.is_settled() {
            self.stats.settled_at = Some(self.now_ms);
            info!(
                cells = self.stats.cells_exploded,
                duration_ms = self.now_ms.saturating_sub(self.stats.started_at.unwrap_or(0)),
                "cascade settled"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};

    fn sched(columns: usize, total: usize) -> CascadeScheduler {
        CascadeScheduler::new(Grid::new(columns, total), CascadeTiming::default())
    }

    /// Drive the clock far enough for any cascade on these grids to finish.
    fn run_to_end(s: &mut CascadeScheduler) -> Vec<CascadeEvent> {
        s.advance_by(1_000_000)
    }

    fn explode_times(events: &[CascadeEvent]) -> HashMap<CellIndex, Vec<u64>> {
        let mut map: HashMap<CellIndex, Vec<u64>> = HashMap::new();
        for e in events {
            if let CascadeEvent::StateChanged { index, state: CellState::Exploding, at_ms } = e {
                map.entry(*index).or_default().push(*at_ms);
            }
        }
        map
    }

    fn eccentricity(grid: Grid, origin: CellIndex) -> u64 {
        let mut dist = vec![u64::MAX; grid.total_cells];
        let mut q = VecDeque::from([origin]);
        dist[origin] = 0;
        while let Some(c) = q.pop_front() {
            for n in grid.neighbors(c) {
                if dist[n] == u64::MAX {
                    dist[n] = dist[c] + 1;
                    q.push_back(n);
                }
            }
        }
        dist.into_iter().filter(|d| *d != u64::MAX).max().unwrap_or(0)
    }

    // ── Single cell sequence ──

    #[test]
    fn one_cell_walks_all_four_phases() {
        let mut s = sched(0, 5); // no columns: no neighbours
        let ev = s.trigger_explosion(2);
        assert!(ev[0].is_acknowledge());
        assert_eq!(s.state_of(2), CellState::Exploding);

        s.advance_to(299);
        assert_eq!(s.state_of(2), CellState::Exploding);
        s.advance_to(300);
        assert_eq!(s.state_of(2), CellState::Hidden);
        s.advance_to(1799);
        assert_eq!(s.state_of(2), CellState::Hidden);
        s.advance_to(1800);
        assert_eq!(s.state_of(2), CellState::FadingIn);
        s.advance_to(2300);
        assert_eq!(s.state_of(2), CellState::Idle);
        assert_eq!(s.live_count(), 0);
        assert!(s.is_settled());
        assert_eq!(s.stats().cells_exploded, 1);
        assert_eq!(s.stats().settled_at, Some(2300));
    }

    #[test]
    fn absent_cells_read_as_idle() {
        let s = sched(5, 25);
        for i in 0..30 {
            assert_eq!(s.state_of(i), CellState::Idle);
        }
        assert_eq!(s.live_states().count(), 0);
    }

    #[test]
    fn single_cell_grid_terminates_after_one_sequence() {
        let mut s = sched(1, 1);
        s.trigger_explosion(0);
        let events = run_to_end(&mut s);
        assert_eq!(explode_times(&events).len(), 0); // Exploding was written at trigger time
        assert!(s.is_settled());
        assert_eq!(s.stats().cells_exploded, 1);
    }

    // ── Propagation order ──

    #[test]
    fn neighbours_fire_with_stagger_in_topological_order() {
        let mut s = sched(5, 25);
        s.trigger_explosion(12);
        let events = s.advance_to(140);
        let times = explode_times(&events);
        assert_eq!(times[&11], vec![50]); // left
        assert_eq!(times[&13], vec![80]); // right
        assert_eq!(times[&7], vec![110]); // top
        assert_eq!(times[&17], vec![140]); // bottom
        // Second ring already started: 11 propagates at 100, left first
        assert_eq!(times[&10], vec![100]);
        assert_eq!(times.len(), 5);
    }

    #[test]
    fn short_last_row_skips_missing_right_slot() {
        // 5 columns, 7 cells: 6 has no right neighbour, so top takes slot 1
        let mut s = sched(5, 7);
        s.trigger_explosion(6);
        let times = explode_times(&s.advance_to(80));
        assert_eq!(times[&5], vec![50]);
        assert_eq!(times[&1], vec![80]);
        assert_eq!(times.len(), 3);
    }

    #[test]
    fn state_writes_happen_in_queue_order() {
        let mut s = sched(3, 9);
        s.trigger_explosion(4);
        let events = run_to_end(&mut s);
        let stamps: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                CascadeEvent::StateChanged { at_ms, .. } => Some(*at_ms),
                _ => None,
            })
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    // ── Properties ──

    #[test]
    fn repeated_user_trigger_acknowledges_once() {
        let mut s = sched(5, 25);
        let first = s.trigger_explosion(12);
        let second = s.trigger_explosion(3);
        let third = s.trigger_explosion(12);
        assert_eq!(first.iter().filter(|e| e.is_acknowledge()).count(), 1);
        assert!(second.is_empty());
        assert!(third.is_empty());
        assert_eq!(s.stats().origin, Some(12));

        let rest = run_to_end(&mut s);
        assert!(!rest.iter().any(|e| e.is_acknowledge()));
    }

    #[test]
    fn no_cell_explodes_twice() {
        for origin in [0, 7, 12, 24] {
            let mut s = sched(5, 25);
            let mut events = s.trigger_explosion(origin);
            events.extend(run_to_end(&mut s));
            let times = explode_times(&events);
            assert_eq!(times.len(), 25, "origin {origin}");
            assert!(times.values().all(|t| t.len() == 1), "origin {origin}");
        }
    }

    #[test]
    fn cascade_converges_within_bound() {
        for (columns, total, origin) in [(5, 25, 12), (5, 25, 0), (28, 300, 150), (10, 47, 46)] {
            let grid = Grid::new(columns, total);
            let mut s = CascadeScheduler::new(grid, CascadeTiming::default());
            let mut events = s.trigger_explosion(origin);
            events.extend(run_to_end(&mut s));

            assert!(s.is_settled());
            assert!((0..total).all(|i| s.state_of(i) == CellState::Idle));

            let t = s.timing();
            let bound = t.cycle_ms() + t.worst_hop_ms() * eccentricity(grid, origin);
            let settled = s.stats().settled_at.unwrap_or(u64::MAX);
            let last_write = events
                .iter()
                .filter_map(|e| match e {
                    CascadeEvent::StateChanged { at_ms, .. } => Some(*at_ms),
                    _ => None,
                })
                .max()
                .unwrap_or(0);
            assert!(last_write <= bound, "{columns}x{total}@{origin}: {last_write} > {bound}");
            assert!(settled >= last_write);
        }
    }

    #[test]
    fn session_lock_survives_cascade() {
        let mut s = sched(10, 100);
        s.trigger_explosion(0);
        s.advance_to(60);
        // Mid-flight: refused, cell 99 still idle
        assert!(s.trigger_explosion(99).is_empty());
        assert_eq!(s.state_of(99), CellState::Idle);

        let events = run_to_end(&mut s);
        // The chain still reaches 99, exactly once
        assert_eq!(explode_times(&events)[&99].len(), 1);

        // After completion: refused, nothing queued
        assert!(s.trigger_explosion(99).is_empty());
        assert!(s.trigger_explosion(50).is_empty());
        assert_eq!(s.pending(), 0);
        assert!(run_to_end(&mut s).is_empty());
    }

    #[test]
    fn teardown_before_first_transition_stops_everything() {
        let mut s = sched(5, 25);
        s.trigger_explosion(12);
        assert!(s.pending() > 0);
        s.teardown();

        assert_eq!(s.pending(), 0);
        assert_eq!(s.live_count(), 0);
        assert!(run_to_end(&mut s).is_empty());
        assert_eq!(s.live_states().count(), 0);
        assert!(s.trigger(3, true).is_empty());
        assert!(s.is_torn_down());
    }

    #[test]
    fn teardown_mid_flight_discards_store() {
        let mut s = sched(5, 25);
        s.trigger_explosion(0);
        s.advance_to(500);
        assert!(s.live_count() > 0);
        s.teardown();
        assert!(s.advance_to(10_000).is_empty());
        assert!((0..25).all(|i| s.state_of(i) == CellState::Idle));
    }

    // ── Edge cases ──

    #[test]
    fn out_of_range_trigger_does_not_spend_session() {
        let mut s = sched(5, 25);
        assert!(s.trigger_explosion(25).is_empty());
        assert!(s.trigger_explosion(usize::MAX).is_empty());
        assert!(!s.session().has_triggered());
        assert!(s.trigger_explosion(24)[0].is_acknowledge());
    }

    #[test]
    fn empty_grid_ignores_everything() {
        let mut s = sched(5, 0);
        assert!(s.trigger_explosion(0).is_empty());
        assert!(s.is_settled());
    }

    #[test]
    fn chain_trigger_without_user_start_does_not_acknowledge() {
        let mut s = sched(5, 25);
        let ev = s.trigger(12, true);
        assert!(!ev.iter().any(|e| e.is_acknowledge()));
        assert_eq!(s.state_of(12), CellState::Exploding);
        // Session lock untouched: a user trigger still acknowledges
        assert!(s.trigger_explosion(0)[0].is_acknowledge());
    }

    #[test]
    fn scaled_clock_keeps_shape() {
        let timing = CascadeTiming::default().scaled(0.1);
        let mut s = CascadeScheduler::new(Grid::new(5, 25), timing);
        s.trigger_explosion(12);
        let times = explode_times(&s.advance_to(14));
        assert_eq!(times[&11], vec![5]);
        assert_eq!(times[&17], vec![14]);
        run_to_end(&mut s);
        assert!(s.is_settled());
    }

    #[test]
    fn saturated_timings_still_settle() {
        let huge = CascadeTiming {
            explode_ms: u64::MAX / 2,
            hidden_ms: u64::MAX / 2,
            fade_in_ms: u64::MAX / 2,
            propagation_delay_ms: u64::MAX / 2,
            neighbor_stagger_ms: u64::MAX / 2,
        };
        let mut s = CascadeScheduler::new(Grid::new(5, 25), huge);
        let ev = s.trigger_explosion(12);
        assert!(ev[0].is_acknowledge());
        let ev = s.advance_to(u64::MAX);
        let times = explode_times(&ev);
        assert_eq!(times.len(), 24);
        assert!(times.values().all(|t| t.len() == 1));
        assert_eq!(s.live_count(), 0);
        assert!(s.is_settled());
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut s = sched(5, 25);
        s.advance_to(1000);
        s.advance_to(10);
        assert_eq!(s.now_ms(), 1000);
        s.trigger_explosion(0);
        let ev = s.advance_to(1050);
        assert!(matches!(
            ev[0],
            CascadeEvent::StateChanged { index: 1, state: CellState::Exploding, at_ms: 1050 }
        ));
    }
}
