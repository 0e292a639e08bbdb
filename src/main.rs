/// Entry point and frame loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::AppConfig;
use sim::board::{Board, CursorMove};
use sim::content;
use sim::event::CascadeEvent;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let _log_guard = init_logging();
    let config = AppConfig::load();
    info!(?config, "starting");

    let mut rng = rand::thread_rng();
    let glyphs = content::shuffled(content::load_glyphs(&config.kanji_dir), &mut rng);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let (term_w, _) = renderer.size();
    let mut board = Board::new(glyphs, &config, term_w, &mut rng);
    let sound = SoundEngine::new();

    let result = frame_loop(&mut board, &mut renderer, sound.as_ref());
    board.teardown();

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        error!("frame loop failed: {e}");
        eprintln!("Error: {e}");
    }

    let stats = board.scheduler().stats();
    if stats.started_at.is_some() {
        println!("Cascade reached {} kanji.", stats.cells_exploded);
    }
}

/// File logging: the terminal is in raw mode, so nothing goes to stderr.
fn init_logging() -> WorkerGuard {
    let log_dir = std::env::var("KANJI_CASCADE_LOG_DIR").unwrap_or_else(|_| "/tmp".to_string());
    let file_appender = tracing_appender::rolling::never(&log_dir, "kanji-cascade.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kanji_cascade=info,warn".into()))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn frame_loop(
    board: &mut Board,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = InputState::new();
    let started = Instant::now();

    loop {
        input.drain_events();
        if input.ctrl_c_pressed() || input.any_pressed(KEYS_QUIT) {
            break;
        }

        let now_ms = started.elapsed().as_millis() as u64;

        // Layout first: a remount must happen before input addresses cells
        if renderer.sync_size()? || input.resized {
            let (term_w, _) = renderer.size();
            board.relayout(term_w, now_ms);
        }

        let mut events = board.tick(now_ms);
        events.extend(handle_input(board, renderer, &input));
        process_sound_events(sound, &events);

        renderer.render(board, now_ms)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn handle_input(board: &mut Board, renderer: &Renderer, input: &InputState) -> Vec<CascadeEvent> {
    let mut events = Vec::new();
    let layout = renderer.layout(board.grid());

    for &(x, y) in &input.clicks {
        if let Some(index) = layout.cell_at(x as usize, y as usize) {
            events.extend(board.click(index));
        }
    }

    if !board.interactive {
        return events;
    }
    for (keys, dir) in [
        (KEYS_LEFT, CursorMove::Left),
        (KEYS_RIGHT, CursorMove::Right),
        (KEYS_UP, CursorMove::Up),
        (KEYS_DOWN, CursorMove::Down),
    ] {
        if input.any_pressed(keys) {
            board.move_cursor(dir);
        }
    }
    if input.any_pressed(KEYS_CONFIRM) {
        events.extend(board.trigger_at_cursor());
    }
    events
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[CascadeEvent]) {
    let Some(sfx) = sound else { return };
    for event in events {
        if event.is_acknowledge() {
            sfx.play_click();
        }
    }
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('h')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('l')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('k')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('j')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];
