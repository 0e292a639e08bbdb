/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` (a grid of terminal cells)
///   2. Compare each cell with `back` (the previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. Batch everything with `queue!`, flush once, swap buffers
///
/// The renderer only reads the board: glyphs, palette slots and
/// `state_of()` per cell. It never writes cascade state.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::cell::CellState;
use crate::domain::grid::{CellIndex, Grid};
use crate::sim::board::{Board, PULSE_PERIOD_MS};

const BASE_BG: (u8, u8, u8) = (22, 22, 35);

/// Theme colours a cell may be drawn in (indexed by palette slot).
const PALETTE: [(u8, u8, u8); 8] = [
    (232, 93, 117),  // sakura
    (255, 179, 71),  // persimmon
    (129, 199, 132), // matcha
    (100, 181, 246), // sky
    (186, 104, 200), // wisteria
    (255, 238, 88),  // yuzu
    (77, 208, 225),  // ramune
    (240, 240, 240), // washi
];

/// Glyph drawn while a cell is exploding.
const BURST_GLYPH: char = '爆';
const BURST_FG: (u8, u8, u8) = (255, 214, 102);
const BURST_BG: (u8, u8, u8) = (140, 40, 30);
const CURSOR_BG: (u8, u8, u8) = (60, 60, 90);

/// Brightness of the whole grid when not expanded.
const DIM_LEVEL: f32 = 0.3;
/// Brightness of a fading-in glyph relative to its rest colour.
const FADE_LEVEL: f32 = 0.45;

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb { r, g, b }
}

/// Mix `c` toward the background; `level` 1.0 = full colour, 0.0 = background.
fn toward_bg(c: (u8, u8, u8), level: f32) -> (u8, u8, u8) {
    let l = level.clamp(0.0, 1.0);
    let mix = |fg: u8, bg: u8| (bg as f32 + (fg as f32 - bg as f32) * l).round() as u8;
    (mix(c.0, BASE_BG.0), mix(c.1, BASE_BG.1), mix(c.2, BASE_BG.2))
}

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
    wide: bool, // occupies 2 terminal columns
    cont: bool, // right half of a wide char (never printed)
}

impl Cell {
    const BLANK: Cell = Cell {
        ch: ' ',
        fg: Color::White,
        bg: Color::Rgb { r: BASE_BG.0, g: BASE_BG.1, b: BASE_BG.2 },
        wide: false,
        cont: false,
    };

    /// Differs from every real cell, forcing a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta, wide: false, cont: false };

    fn narrow(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg, wide: false, cont: false }
    }
}

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            *self = FrameBuffer::new(w, h);
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Wide glyph at (x, y) plus its continuation half.
    fn put_wide(&mut self, x: usize, y: usize, ch: char, fg: Color, bg: Color) {
        if x + 1 >= self.width {
            return;
        }
        self.set(x, y, Cell { ch, fg, bg, wide: true, cont: false });
        self.set(x + 1, y, Cell { ch: ' ', fg, bg, wide: false, cont: true });
    }

    /// Single-width text; stops at the right edge.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Cell::narrow(ch, fg, Cell::BLANK.bg));
        }
    }
}

// ── Layout ──

/// Each grid cell is 2 terminal columns wide (kanji are full-width).
const CELL_W: usize = 2;
const HUD_ROW: usize = 0;
const GRID_ROW: usize = 2;
/// Rows kept free below the grid (gap + help line).
const FOOTER_ROWS: usize = 2;

/// Where the grid sits on screen for a given terminal size.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GridLayout {
    pub origin_x: usize,
    pub origin_y: usize,
    pub columns: usize,
    /// Grid rows that fit on screen; further rows exist but are not drawn.
    pub visible_rows: usize,
    pub total_cells: usize,
}

impl GridLayout {
    pub fn compute(term_w: usize, term_h: usize, grid: Grid) -> Self {
        let grid_w = grid.columns * CELL_W;
        let room = term_h.saturating_sub(GRID_ROW + FOOTER_ROWS);
        GridLayout {
            origin_x: term_w.saturating_sub(grid_w) / 2,
            origin_y: GRID_ROW,
            columns: grid.columns,
            visible_rows: room.min(grid.rows()),
            total_cells: grid.total_cells,
        }
    }

    /// Cell under terminal position (x, y), if a drawn cell is there.
    pub fn cell_at(&self, x: usize, y: usize) -> Option<CellIndex> {
        if x < self.origin_x || y < self.origin_y {
            return None;
        }
        let col = (x - self.origin_x) / CELL_W;
        let row = y - self.origin_y;
        if col >= self.columns || row >= self.visible_rows {
            return None;
        }
        let index = row * self.columns + col;
        (index < self.total_cells).then_some(index)
    }

    /// Top-left terminal position of a drawn cell.
    pub fn screen_of(&self, index: CellIndex) -> Option<(usize, usize)> {
        if self.columns == 0 || index >= self.total_cells {
            return None;
        }
        let (col, row) = (index % self.columns, index / self.columns);
        (row < self.visible_rows).then(|| (self.origin_x + col * CELL_W, self.origin_y + row))
    }
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(Cell::BLANK.bg),
            Clear(ClearType::All)
        )?;
        self.sync_size()?;
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Terminal size as of the last `init`/`render`.
    pub fn size(&self) -> (usize, usize) {
        (self.term_w, self.term_h)
    }

    pub fn layout(&self, grid: Grid) -> GridLayout {
        GridLayout::compute(self.term_w, self.term_h, grid)
    }

    /// Re-read the terminal size; on change, force a full repaint.
    pub fn sync_size(&mut self) -> io::Result<bool> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        let (tw, th) = (tw as usize, th as usize);
        if tw == self.term_w && th == self.term_h {
            return Ok(false);
        }
        self.term_w = tw;
        self.term_h = th;
        self.front.resize(tw, th);
        self.back.resize(tw, th);
        self.back.cells.fill(Cell::INVALID);
        queue!(self.writer, SetBackgroundColor(Cell::BLANK.bg), Clear(ClearType::All))?;
        Ok(true)
    }

    pub fn render(&mut self, board: &Board, now_ms: u64) -> io::Result<()> {
        self.front.clear();
        self.compose_hud(board);
        self.compose_grid(board, now_ms);
        self.compose_help(board);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Compose: build front buffer content ──

    fn compose_grid(&mut self, board: &Board, now_ms: u64) {
        let layout = self.layout(board.grid());
        let grid_level = if board.expand { 1.0 } else { DIM_LEVEL };
        let cursor_bg = rgb(CURSOR_BG);

        for index in 0..layout.total_cells {
            let Some((x, y)) = layout.screen_of(index) else { break };
            let Some(ch) = board.glyph(index) else { continue };
            let base = PALETTE[board.palette_slot(index) as usize % PALETTE.len()];
            let bg = if board.interactive && index == board.cursor {
                cursor_bg
            } else {
                Cell::BLANK.bg
            };

            if !board.interactive {
                let level = pulse_level(now_ms + board.pulse_offset(index));
                self.front.put_wide(x, y, ch, rgb(toward_bg(base, grid_level * level)), bg);
                continue;
            }

            match board.state_of(index) {
                CellState::Idle => {
                    self.front.put_wide(x, y, ch, rgb(toward_bg(base, grid_level)), bg);
                }
                CellState::Exploding => {
                    self.front.put_wide(x, y, BURST_GLYPH, rgb(BURST_FG), rgb(BURST_BG));
                }
                CellState::Hidden => {
                    self.front.put_wide(x, y, ' ', Cell::BLANK.fg, bg);
                }
                CellState::FadingIn => {
                    let fg = toward_bg(base, grid_level * FADE_LEVEL);
                    self.front.put_wide(x, y, ch, rgb(fg), bg);
                }
            }
        }
    }

    fn compose_hud(&mut self, board: &Board) {
        let title = " 漢字 KANJI CASCADE";
        // The two kanji are double width
        let mut x = 0;
        for ch in title.chars() {
            if ch.is_ascii() {
                self.front.set(x, HUD_ROW, Cell::narrow(ch, rgb(PALETTE[0]), Cell::BLANK.bg));
                x += 1;
            } else {
                self.front.put_wide(x, HUD_ROW, ch, rgb(PALETTE[0]), Cell::BLANK.bg);
                x += 2;
            }
        }

        let status = status_line(board);
        let sx = self.term_w.saturating_sub(status.chars().count() + 1).max(x + 2);
        self.front.put_str(sx, HUD_ROW, &status, Color::Grey);
    }

    fn compose_help(&mut self, board: &Board) {
        if self.term_h == 0 {
            return;
        }
        let help = if board.interactive {
            " click a kanji / arrows+Enter: explode   q: quit"
        } else {
            " q: quit"
        };
        self.front.put_str(0, self.term_h - 1, help, Color::DarkGrey);
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BLANK.bg;
        // Terminal cursor position after the last print, if known
        let mut at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                if cell.cont {
                    x += 1;
                    continue;
                }

                // A wide cell must be redrawn if its right half changed too
                let half_changed = cell.wide && self.front.get(x + 1, y) != self.back.get(x + 1, y);
                if cell == prev && !half_changed {
                    x += 1;
                    continue;
                }

                if at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;

                let step = if cell.wide { 2 } else { 1 };
                x += step;
                at = Some((x, y));
            }
        }

        self.writer.flush()
    }
}

/// Pulse brightness in [0.4, 1.0] for a point in the pulse cycle.
fn pulse_level(t_ms: u64) -> f32 {
    let phase = (t_ms % PULSE_PERIOD_MS) as f32 / PULSE_PERIOD_MS as f32;
    0.7 + 0.3 * (phase * 2.0 * std::f32::consts::PI).cos()
}

fn status_line(board: &Board) -> String {
    let sched = board.scheduler();
    let stats = sched.stats();
    if !board.interactive {
        return String::new();
    }
    if !sched.session().has_triggered() {
        let total = board.grid().total_cells;
        return match board.remounts() {
            0 => format!("{total} kanji, one explosion per session"),
            n => format!("{total} kanji, re-laid out {n}x, one explosion per session"),
        };
    }
    if sched.in_flight() {
        let hidden = sched.live_states().filter(|(_, s)| *s == CellState::Hidden).count();
        return format!(
            "cascade: {} cells, {} animating, {} hidden",
            stats.cells_exploded,
            sched.live_count(),
            hidden
        );
    }
    match (stats.started_at, stats.settled_at) {
        (Some(start), Some(end)) => {
            format!("settled: {} cells in {} ms", stats.cells_exploded, end.saturating_sub(start))
        }
        _ => String::from("spent"),
    }
}
