use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Deserialize;
use tracing::{debug, info};

const THEME_CONFIG_FILE: &str = "embergrid-theme.toml";
const THEME_CONFIG_ENV_VAR: &str = "EMBERGRID_THEME";

pub const LEVEL_COUNT: usize = 5;

/// Display bucket for a day cell, darkest to brightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    None,
    Low,
    Medium,
    High,
    Max,
}

impl Intensity {
    fn index(self) -> usize {
        match self {
            Self::None => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Max => 4,
        }
    }
}

/// One visual rung: an ANSI-256 color for color terminals and a glyph for
/// monochrome output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub color: u8,
    pub glyph: char,
}

/// Enumerated intensity -> display mapping, validated at construction.
/// There is no silent per-level fallback: a theme file either parses into
/// five complete levels or the load fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    levels: [Level; LEVEL_COUNT],
}

#[derive(Debug, Deserialize)]
struct ThemeFile {
    levels: Vec<LevelSpec>,
}

#[derive(Debug, Deserialize)]
struct LevelSpec {
    color: u8,
    glyph: String,
}

impl Default for Theme {
    fn default() -> Self {
        // GitHub-style green gradient on the 256-color cube.
        Self {
            levels: [
                Level { color: 236, glyph: '·' },
                Level { color: 22, glyph: '░' },
                Level { color: 28, glyph: '▒' },
                Level { color: 34, glyph: '▓' },
                Level { color: 40, glyph: '█' },
            ],
        }
    }
}

impl Theme {
    /// Loads the theme from `EMBERGRID_THEME`, then `embergrid-theme.toml`
    /// in the current directory, falling back to the built-in palette when
    /// no file exists. An existing but invalid file is an error.
    #[tracing::instrument]
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = theme_config_path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(file = %path.display(), "no theme file; using built-in palette");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read theme file {}", path.display()))?;
        let parsed: ThemeFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse theme file {}", path.display()))?;

        if parsed.levels.len() != LEVEL_COUNT {
            return Err(anyhow!(
                "theme file {} must define exactly {LEVEL_COUNT} levels, found {}",
                path.display(),
                parsed.levels.len()
            ));
        }

        let mut levels = [Level { color: 0, glyph: ' ' }; LEVEL_COUNT];
        for (idx, spec) in parsed.levels.iter().enumerate() {
            let mut glyphs = spec.glyph.chars();
            let glyph = glyphs
                .next()
                .ok_or_else(|| anyhow!("theme level {idx} has an empty glyph"))?;
            if glyphs.next().is_some() {
                return Err(anyhow!("theme level {idx} glyph must be a single character"));
            }
            levels[idx] = Level {
                color: spec.color,
                glyph,
            };
        }

        info!(file = %path.display(), "loaded theme");
        Ok(Self { levels })
    }

    #[must_use]
    pub fn level(&self, intensity: Intensity) -> Level {
        self.levels[intensity.index()]
    }
}

fn theme_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(THEME_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(THEME_CONFIG_FILE))
}

/// Percentile thresholds over the nonzero daily counts of one grid. Counts
/// map to intensity buckets relative to the window being rendered, not to
/// any absolute scale.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    p25: u64,
    p50: u64,
    p75: u64,
}

impl Thresholds {
    /// `None` when every count is zero; callers render the bottom rung.
    #[must_use]
    pub fn from_counts(counts: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut nonzero: Vec<u64> = counts.into_iter().filter(|&count| count > 0).collect();
        if nonzero.is_empty() {
            return None;
        }
        nonzero.sort_unstable();

        let len = nonzero.len();
        let rank = |fraction: f64| -> u64 {
            let idx = (len as f64 * fraction).ceil() as usize;
            nonzero[idx.saturating_sub(1).min(len - 1)]
        };

        Some(Self {
            p25: rank(0.25),
            p50: rank(0.50),
            p75: rank(0.75),
        })
    }

    #[must_use]
    pub fn intensity(self, count: u64) -> Intensity {
        if count == 0 {
            Intensity::None
        } else if count <= self.p25 {
            Intensity::Low
        } else if count <= self.p50 {
            Intensity::Medium
        } else if count <= self.p75 {
            Intensity::High
        } else {
            Intensity::Max
        }
    }
}
