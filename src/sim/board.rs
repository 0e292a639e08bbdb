/// Board: the mounted kanji grid.
///
/// Owns the glyph list, the per-cell styling picked at mount time, and the
/// one `CascadeScheduler` for the current layout. The column count is part
/// of the session: when the layout changes, the old session is torn down
/// and a fresh one (with `has_triggered == false`) replaces it.

use rand::Rng;
use tracing::info;

use crate::config::{AppConfig, GridConfig};
use crate::domain::cell::{CascadeTiming, CellState};
use crate::domain::grid::{CellIndex, Grid};
use crate::sim::event::CascadeEvent;
use crate::sim::scheduler::CascadeScheduler;

/// Number of palette colours a cell can be assigned.
pub const PALETTE_SIZE: u8 = 8;
/// Period of the decorative pulse in non-interactive mode.
pub const PULSE_PERIOD_MS: u64 = 2000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CursorMove {
    Left,
    Right,
    Up,
    Down,
}

pub struct Board {
    glyphs: Vec<char>,
    palette_slots: Vec<u8>,
    pulse_offsets: Vec<u64>,
    scheduler: CascadeScheduler,
    timing: CascadeTiming,
    grid_cfg: GridConfig,
    pub interactive: bool,
    pub expand: bool,
    pub cursor: CellIndex,
    remounts: u32,
}

impl Board {
    pub fn new<R: Rng + ?Sized>(
        mut glyphs: Vec<char>,
        config: &AppConfig,
        term_cols: usize,
        rng: &mut R,
    ) -> Self {
        if config.grid.max_cells > 0 {
            glyphs.truncate(config.grid.max_cells);
        }
        let palette_slots = (0..glyphs.len()).map(|_| rng.gen_range(0..PALETTE_SIZE)).collect();
        let pulse_offsets = (0..glyphs.len()).map(|_| rng.gen_range(0..PULSE_PERIOD_MS)).collect();

        let columns = config.grid.columns_for_width(term_cols);
        let grid = Grid::new(columns, glyphs.len());

        Board {
            glyphs,
            palette_slots,
            pulse_offsets,
            scheduler: CascadeScheduler::new(grid, config.timing),
            timing: config.timing,
            grid_cfg: config.grid.clone(),
            interactive: config.interactive,
            expand: config.expand,
            cursor: 0,
            remounts: 0,
        }
    }

    // ── Read side (renderer) ──

    pub fn grid(&self) -> Grid {
        self.scheduler.grid()
    }

    pub fn glyph(&self, index: CellIndex) -> Option<char> {
        self.glyphs.get(index).copied()
    }

    pub fn palette_slot(&self, index: CellIndex) -> u8 {
        self.palette_slots.get(index).copied().unwrap_or(0)
    }

    pub fn pulse_offset(&self, index: CellIndex) -> u64 {
        self.pulse_offsets.get(index).copied().unwrap_or(0)
    }

    pub fn state_of(&self, index: CellIndex) -> CellState {
        self.scheduler.state_of(index)
    }

    pub fn scheduler(&self) -> &CascadeScheduler {
        &self.scheduler
    }

    pub fn remounts(&self) -> u32 {
        self.remounts
    }

    // ── Session lifecycle ──

    /// Re-derive the column count from the terminal width. Returns true when
    /// the layout changed and the session was rebuilt.
    pub fn relayout(&mut self, term_cols: usize, now_ms: u64) -> bool {
        let columns = self.grid_cfg.columns_for_width(term_cols);
        if columns == self.grid().columns {
            return false;
        }
        info!(
            from = self.grid().columns,
            to = columns,
            remounts = self.remounts + 1,
            "layout changed, remounting grid"
        );
        self.scheduler.teardown();
        let mut fresh = CascadeScheduler::new(Grid::new(columns, self.glyphs.len()), self.timing);
        // Start the new session's clock where the host is now
        fresh.advance_to(now_ms);
        self.scheduler = fresh;
        self.remounts += 1;
        true
    }

    pub fn teardown(&mut self) {
        self.scheduler.teardown();
    }

    // ── Write side (input + clock) ──

    /// A click on a cell. Only idle cells of an interactive board respond.
    pub fn click(&mut self, index: CellIndex) -> Vec<CascadeEvent> {
        if !self.interactive || self.state_of(index) != CellState::Idle {
            return Vec::new();
        }
        self.cursor = index;
        self.scheduler.trigger_explosion(index)
    }

    pub fn trigger_at_cursor(&mut self) -> Vec<CascadeEvent> {
        self.click(self.cursor)
    }

    pub fn tick(&mut self, now_ms: u64) -> Vec<CascadeEvent> {
        self.scheduler.advance_to(now_ms)
    }

    pub fn move_cursor(&mut self, dir: CursorMove) {
        let grid = self.grid();
        let Some((col, row)) = grid.position(self.cursor) else {
            self.cursor = 0;
            return;
        };
        let target = match dir {
            CursorMove::Left => col.checked_sub(1).and_then(|c| grid.index_at(c, row)),
            CursorMove::Right => grid.index_at(col + 1, row),
            CursorMove::Up => row.checked_sub(1).and_then(|r| grid.index_at(col, r)),
            CursorMove::Down => grid.index_at(col, row + 1),
        };
        if let Some(t) = target {
            self.cursor = t;
        }
    }
}
