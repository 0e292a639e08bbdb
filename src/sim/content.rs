/// Glyph content for the grid.
///
/// Kanji lists live as JSON arrays of `{ "kanjiChar": "…" }`, one file per
/// JLPT level (`N5.json`, `N4.json`, `N3.json`) in the kanji directory.
/// Missing or broken files are skipped; with nothing loaded the embedded
/// N5 set is used so the grid is never empty.

use std::io;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Level files, loaded in this order before shuffling.
pub const KANJI_LEVELS: [&str; 3] = ["N5", "N4", "N3"];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no glyphs in {}", .path.display())]
    Empty { path: PathBuf },
}

#[derive(Deserialize, Debug)]
struct RawKanjiEntry {
    #[serde(rename = "kanjiChar")]
    kanji_char: String,
}

/// Parse one level file. Entries with an empty `kanjiChar` are dropped;
/// multi-character entries keep their first character.
pub fn parse_level(text: &str, path: &Path) -> Result<Vec<char>, ContentError> {
    let entries: Vec<RawKanjiEntry> =
        serde_json::from_str(text).map_err(|source| ContentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let glyphs: Vec<char> = entries
        .iter()
        .filter_map(|e| e.kanji_char.trim().chars().next())
        .collect();
    if glyphs.is_empty() {
        return Err(ContentError::Empty { path: path.to_path_buf() });
    }
    Ok(glyphs)
}

pub fn load_level_file(path: &Path) -> Result<Vec<char>, ContentError> {
    let text = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_level(&text, path)
}

/// Load every level file found in `dir`, falling back to the embedded set.
pub fn load_glyphs(dir: &Path) -> Vec<char> {
    let mut glyphs = Vec::new();
    for level in KANJI_LEVELS {
        let path = dir.join(format!("{level}.json"));
        if !path.exists() {
            continue;
        }
        match load_level_file(&path) {
            Ok(list) => {
                info!(level, count = list.len(), "loaded kanji level");
                glyphs.extend(list);
            }
            Err(e) => warn!("skipping kanji level {level}: {e}"),
        }
    }
    if glyphs.is_empty() {
        info!(dir = %dir.display(), "no kanji files found, using embedded set");
        glyphs = embedded_glyphs();
    }
    glyphs
}

pub fn embedded_glyphs() -> Vec<char> {
    EMBEDDED_N5.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Shuffle in place and return the list (content order is never meaningful).
pub fn shuffled<R: Rng + ?Sized>(mut glyphs: Vec<char>, rng: &mut R) -> Vec<char> {
    glyphs.shuffle(rng);
    glyphs
}

/// JLPT N5 kanji.
const EMBEDDED_N5: &str = "
    一二三四五六七八九十百千万円年月日火水木金土曜本人
    今寺時半分上下中外右左前後午先生学校名何来行見聞
    食飲話読書言語休出入大小長高安新古多少白赤青黒山
    川田天気雨電車駅道国友父母男女子目耳口手足力
";
