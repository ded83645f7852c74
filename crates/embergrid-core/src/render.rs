use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::short_month_name;
use crate::grid::ActivityGrid;
use crate::theme::{Intensity, Theme, Thresholds};

/// "Sun " etc.
const ROW_LABEL_WIDTH: usize = 4;
/// Glyph plus one column of gap.
const CELL_WIDTH: usize = 2;

const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    theme: Theme,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        let theme = Theme::load()?;
        Ok(Self { color, theme })
    }

    #[tracing::instrument(skip(self))]
    pub fn print_empty_state(&mut self) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "No activity recorded yet.")?;
        Ok(())
    }

    /// Heatmap view: month labels on top, one row per weekday, a legend
    /// underneath. Cell intensity is relative to the rendered window.
    #[tracing::instrument(skip(self, grid))]
    pub fn print_grid(&mut self, grid: &ActivityGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let thresholds = Thresholds::from_counts(
            grid.weeks
                .iter()
                .flat_map(|week| week.iter().flatten())
                .map(|cell| cell.count),
        );

        writeln!(out, "{}", month_header(grid))?;

        for slot in 0..WEEKDAY_LABELS.len() {
            write!(out, "{:<ROW_LABEL_WIDTH$}", WEEKDAY_LABELS[slot])?;
            for week in &grid.weeks {
                match week[slot] {
                    Some(cell) => {
                        let intensity = thresholds
                            .map(|t| t.intensity(cell.count))
                            .unwrap_or(Intensity::None);
                        let level = self.theme.level(intensity);
                        let glyph = level.glyph.to_string();
                        write!(out, "{} ", self.paint(&glyph, &format!("38;5;{}", level.color)))?;
                    }
                    None => write!(out, "  ")?,
                }
            }
            writeln!(out)?;
        }

        write!(out, "{:<ROW_LABEL_WIDTH$}Less ", "")?;
        for intensity in [
            Intensity::None,
            Intensity::Low,
            Intensity::Medium,
            Intensity::High,
            Intensity::Max,
        ] {
            let level = self.theme.level(intensity);
            let glyph = level.glyph.to_string();
            write!(out, "{}", self.paint(&glyph, &format!("38;5;{}", level.color)))?;
        }
        writeln!(out, " More")?;

        Ok(())
    }

    /// Per-month totals within the rendered window, plus the all-time sum.
    #[tracing::instrument(skip(self, grid))]
    pub fn print_summary(&mut self, grid: &ActivityGrid) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        use chrono::Datelike;

        let mut by_month: BTreeMap<(i32, u32), u64> = BTreeMap::new();
        for cell in grid.weeks.iter().flat_map(|week| week.iter().flatten()) {
            let key = (cell.date.year(), cell.date.month());
            let entry = by_month.entry(key).or_insert(0);
            *entry = entry.saturating_add(cell.count);
        }

        let headers = vec!["Month".to_string(), "Events".to_string()];
        let mut rows = Vec::with_capacity(by_month.len());
        let mut window_total: u64 = 0;
        for ((year, month), total) in by_month {
            window_total = window_total.saturating_add(total);
            rows.push(vec![
                format!("{} {year}", short_month_name(month)),
                self.paint(&total.to_string(), "33"),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out)?;
        writeln!(out, "Window total   {window_total}")?;
        writeln!(out, "All-time total {}", grid.total_count)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Label row aligned to week columns; collision pruning already happened in
/// the builder, so placement here is a straight overlay.
fn month_header(grid: &ActivityGrid) -> String {
    let width = ROW_LABEL_WIDTH + grid.weeks.len() * CELL_WIDTH;
    let mut line = vec![' '; width];

    for label in &grid.month_labels {
        let start = ROW_LABEL_WIDTH + label.week_index * CELL_WIDTH;
        for (offset, ch) in label.text.chars().enumerate() {
            if start + offset < line.len() {
                line[start + offset] = ch;
            }
        }
    }

    let text: String = line.into_iter().collect();
    text.trim_end().to_string()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
