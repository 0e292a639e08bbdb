/// Input collector.
///
/// Drains every pending terminal event once per frame and keeps:
///   - key presses (edge-triggered; repeats count as presses for cursor travel)
///   - left-button mouse clicks, in terminal coordinates
///   - whether the terminal was resized
///
/// Mouse capture must be enabled by the renderer for clicks to arrive.

use std::time::Duration;

use crossterm::event::{
    self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};

pub struct InputState {
    /// Key presses seen during the most recent drain.
    pressed: Vec<KeyCode>,

    /// Raw key events collected during drain, for modifier checks.
    pub raw_events: Vec<KeyEvent>,

    /// Left clicks as (column, row) during the most recent drain.
    pub clicks: Vec<(u16, u16)>,

    pub resized: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            pressed: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            clicks: Vec::with_capacity(4),
            resized: false,
        }
    }

    /// Drain all pending terminal events without blocking.
    /// Call this once per frame, before advancing the board.
    pub fn drain_events(&mut self) {
        self.pressed.clear();
        self.raw_events.clear();
        self.clicks.clear();
        self.resized = false;

        while poll(Duration::ZERO).unwrap_or(false) {
            match event::read() {
                Ok(ev) => self.accept(ev),
                Err(_) => break,
            }
        }
    }

    fn accept(&mut self, ev: Event) {
        match ev {
            Event::Key(key) => {
                self.raw_events.push(key);
                if key.kind != KeyEventKind::Release {
                    self.pressed.push(key.code);
                }
            }
            Event::Mouse(m) => {
                if let MouseEventKind::Down(MouseButton::Left) = m.kind {
                    self.clicks.push((m.column, m.row));
                }
            }
            Event::Resize(..) => self.resized = true,
            _ => {}
        }
    }

    /// Was this key pressed this frame?
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.pressed.contains(&code)
    }

    /// Convenience: was any of these keys pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, MouseEvent};

    fn key(code: KeyCode, kind: KeyEventKind, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent { code, modifiers, kind, state: KeyEventState::NONE })
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent { kind, column, row, modifiers: KeyModifiers::NONE })
    }

    #[test]
    fn presses_count_releases_do_not() {
        let mut i = InputState::new();
        i.accept(key(KeyCode::Enter, KeyEventKind::Press, KeyModifiers::NONE));
        i.accept(key(KeyCode::Left, KeyEventKind::Release, KeyModifiers::NONE));
        assert!(i.was_pressed(KeyCode::Enter));
        assert!(!i.was_pressed(KeyCode::Left));
        assert!(i.any_pressed(&[KeyCode::Esc, KeyCode::Enter]));
    }

    #[test]
    fn only_left_button_down_is_a_click() {
        let mut i = InputState::new();
        i.accept(mouse(MouseEventKind::Down(MouseButton::Left), 10, 4));
        i.accept(mouse(MouseEventKind::Down(MouseButton::Right), 11, 4));
        i.accept(mouse(MouseEventKind::Up(MouseButton::Left), 10, 4));
        i.accept(mouse(MouseEventKind::Moved, 3, 3));
        assert_eq!(i.clicks, vec![(10, 4)]);
    }

    #[test]
    fn ctrl_c_and_resize() {
        let mut i = InputState::new();
        i.accept(key(KeyCode::Char('c'), KeyEventKind::Press, KeyModifiers::CONTROL));
        i.accept(Event::Resize(120, 40));
        assert!(i.ctrl_c_pressed());
        assert!(i.resized);
    }
}
