/// External configuration loader.
///
/// Reads `config.toml` from the first candidate directory that has one:
/// the executable's directory, the CWD, `~/.local/share/kanji-cascade`,
/// then `/usr/share/kanji-cascade`.
/// Falls back to the stock timings and layout if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::domain::cell::{CascadeTiming, MAX_PHASE_MS};

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Cascade timings with `timing.scale` already applied.
    pub timing: CascadeTiming,
    pub grid: GridConfig,
    pub kanji_dir: PathBuf,
    /// Clicks and keys explode cells. Off = decorative pulse only.
    pub interactive: bool,
    /// Full brightness instead of the dimmed background look.
    pub expand: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridConfig {
    pub wide_columns: usize,
    pub narrow_columns: usize,
    /// Terminal width (in columns) at which the wide layout kicks in.
    pub breakpoint_cols: usize,
    /// Cap on the number of cells; 0 keeps every loaded glyph.
    pub max_cells: usize,
}

impl GridConfig {
    /// Grid column count for a terminal this wide.
    pub fn columns_for_width(&self, term_cols: usize) -> usize {
        if term_cols >= self.breakpoint_cols {
            self.wide_columns
        } else {
            self.narrow_columns
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    grid: TomlGrid,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_explode")]
    explode_ms: u64,
    #[serde(default = "default_hidden")]
    hidden_ms: u64,
    #[serde(default = "default_fade_in")]
    fade_in_ms: u64,
    #[serde(default = "default_propagation")]
    propagation_delay_ms: u64,
    #[serde(default = "default_stagger")]
    neighbor_stagger_ms: u64,
    #[serde(default = "default_scale")]
    scale: f64,
}

#[derive(Deserialize, Debug)]
struct TomlGrid {
    #[serde(default = "default_wide_columns")]
    wide_columns: usize,
    #[serde(default = "default_narrow_columns")]
    narrow_columns: usize,
    #[serde(default = "default_breakpoint")]
    breakpoint_cols: usize,
    #[serde(default)]
    max_cells: usize,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_kanji_dir")]
    kanji_dir: String,
    #[serde(default = "default_interactive")]
    interactive: bool,
    #[serde(default)]
    expand: bool,
}

// ── Defaults ──

fn default_explode() -> u64 { 300 }
fn default_hidden() -> u64 { 1500 }
fn default_fade_in() -> u64 { 500 }
fn default_propagation() -> u64 { 50 }
fn default_stagger() -> u64 { 30 }
fn default_scale() -> f64 { 1.0 }

fn default_wide_columns() -> usize { 28 }
fn default_narrow_columns() -> usize { 10 }
fn default_breakpoint() -> usize { 64 }   // 28 glyphs * 2 cols + margin

fn default_kanji_dir() -> String { "kanji".into() }
fn default_interactive() -> bool { true }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            explode_ms: default_explode(),
            hidden_ms: default_hidden(),
            fade_in_ms: default_fade_in(),
            propagation_delay_ms: default_propagation(),
            neighbor_stagger_ms: default_stagger(),
            scale: default_scale(),
        }
    }
}

impl Default for TomlGrid {
    fn default() -> Self {
        TomlGrid {
            wide_columns: default_wide_columns(),
            narrow_columns: default_narrow_columns(),
            breakpoint_cols: default_breakpoint(),
            max_cells: 0,
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            kanji_dir: default_kanji_dir(),
            interactive: default_interactive(),
            expand: false,
        }
    }
}

// ── Loading ──

impl AppConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory,
    /// (3) `~/.local/share/kanji-cascade`, (4) `/usr/share/kanji-cascade`.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);

        // Resolve kanji directory against the same search path
        let dir_str = &toml_cfg.general.kanji_dir;
        let kanji_dir = if PathBuf::from(dir_str).is_absolute() {
            PathBuf::from(dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(dir_str))
        };

        Self::from_toml(toml_cfg, kanji_dir)
    }

    fn from_toml(cfg: TomlConfig, kanji_dir: PathBuf) -> Self {
        let t = &cfg.timing;
        let raw = CascadeTiming {
            explode_ms: t.explode_ms,
            hidden_ms: t.hidden_ms,
            fade_in_ms: t.fade_in_ms,
            propagation_delay_ms: t.propagation_delay_ms,
            neighbor_stagger_ms: t.neighbor_stagger_ms,
        };
        if raw.clamped() != raw {
            warn!(max_ms = MAX_PHASE_MS, "timing value too large, capped");
        }
        let timing = raw.clamped().scaled(t.scale);

        AppConfig {
            timing,
            grid: GridConfig {
                // A zero-column grid would have no layout at all
                wide_columns: cfg.grid.wide_columns.max(1),
                narrow_columns: cfg.grid.narrow_columns.max(1),
                breakpoint_cols: cfg.grid.breakpoint_cols,
                max_cells: cfg.grid.max_cells,
            },
            kanji_dir,
            interactive: cfg.general.interactive,
            expand: cfg.general.expand,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), PathBuf::from(default_kanji_dir()))
    }
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // XDG data home (~/.local/share/kanji-cascade)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/kanji-cascade");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    let sys = PathBuf::from("/usr/share/kanji-cascade");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => {
                        debug!(path = %path.display(), "loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "config.toml parse error, using defaults: {e}");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
