use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::record::ActivityRecord;

/// Local ingestion point for the activity feed: one JSONL file of
/// `ActivityRecord`s under the data directory. Upstream providers (HTTP
/// aggregators and the like) land their output here; the grid builder
/// itself never touches the filesystem.
#[derive(Debug)]
pub struct ActivityStore {
    pub data_dir: PathBuf,
    pub records_path: PathBuf,
}

impl ActivityStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let records_path = data_dir.join("records.data");
        if !records_path.exists() {
            fs::write(&records_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            records = %records_path.display(),
            "opened activity store"
        );

        Ok(Self {
            data_dir,
            records_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_records(&self) -> anyhow::Result<Vec<ActivityRecord>> {
        load_jsonl(&self.records_path).context("failed to load records.data")
    }

    #[tracing::instrument(skip(self, records))]
    pub fn save_records(&self, records: &[ActivityRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.records_path, records).context("failed to save records.data")
    }

    /// Appends `new` and rewrites the file sorted by date. The sort is
    /// stable, so for a repeated date the newest entry stays last and wins
    /// when the grid builder deduplicates.
    #[tracing::instrument(skip(self, new), fields(added = new.len()))]
    pub fn append_records(&self, new: Vec<ActivityRecord>) -> anyhow::Result<Vec<ActivityRecord>> {
        let mut records = self.load_records()?;
        records.extend(new);
        records.sort_by_key(|record| record.date);
        self.save_records(&records)?;
        Ok(records)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<ActivityRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: ActivityRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded records from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic(path: &Path, records: &[ActivityRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
