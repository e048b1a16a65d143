//! Year-partitioned JSONL output with merge-on-reprocess.
//!
//! Records from one source file are bucketed by partition (publication year
//! or "UNKNOWN") and deduplicated by primary key. The first time a partition
//! is touched in a run, any previously exported file for the same source stem
//! is loaded into the buffer, so re-processing a file upserts into its prior
//! export instead of appending duplicates. Each touched partition is
//! rewritten in full at the end, via a tmp file and atomic rename.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A flat record that can live in a partition file.
pub trait PartitionRecord: Serialize + DeserializeOwned {
    /// Primary key (PMID, NCT ID). Last write wins within a partition.
    fn key(&self) -> &str;

    /// Partition name: a four-digit year, or "UNKNOWN" when no date exists.
    fn partition(&self) -> String;
}

/// Counts reported by [`PartitionWriter::finish`].
#[derive(Debug, Default)]
pub struct PartitionStats {
    /// Total records written across all touched partitions (including
    /// records carried over from prior exports).
    pub records_written: usize,
    /// Number of partition files rewritten.
    pub partitions: usize,
    /// Lines in pre-existing partition files that failed to parse and were
    /// dropped during load.
    pub malformed_lines: usize,
}

/// Buffered writer for one source file's partitioned output.
///
/// Output layout: `{output_dir}/{partition}/{stem}.jsonl`.
pub struct PartitionWriter<R> {
    output_dir: PathBuf,
    stem: String,
    // BTreeMap at both levels keeps file contents deterministic across runs.
    buffers: BTreeMap<String, BTreeMap<String, R>>,
    malformed_lines: usize,
}

impl<R: PartitionRecord> PartitionWriter<R> {
    pub fn new(output_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            stem: stem.into(),
            buffers: BTreeMap::new(),
            malformed_lines: 0,
        }
    }

    fn partition_path(&self, partition: &str) -> PathBuf {
        self.output_dir
            .join(partition)
            .join(format!("{}.jsonl", self.stem))
    }

    /// Insert or overwrite a record in its partition buffer.
    pub fn upsert(&mut self, record: R) -> io::Result<()> {
        let partition = record.partition();
        if !self.buffers.contains_key(&partition) {
            let existing = self.load_existing(&self.partition_path(&partition))?;
            self.buffers.insert(partition.clone(), existing);
        }
        self.buffers
            .get_mut(&partition)
            .expect("partition buffer just inserted")
            .insert(record.key().to_string(), record);
        Ok(())
    }

    /// Number of records currently buffered across all partitions.
    pub fn buffered(&self) -> usize {
        self.buffers.values().map(BTreeMap::len).sum()
    }

    fn load_existing(&mut self, path: &Path) -> io::Result<BTreeMap<String, R>> {
        let mut map = BTreeMap::new();
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(map),
            Err(e) => return Err(e),
        };
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<R>(&line) {
                Ok(record) => {
                    map.insert(record.key().to_string(), record);
                }
                Err(e) => {
                    self.malformed_lines += 1;
                    log::warn!("{}: dropping malformed line: {e}", path.display());
                }
            }
        }
        Ok(map)
    }

    /// Rewrite every touched partition file in full from its buffer.
    pub fn finish(self) -> io::Result<PartitionStats> {
        let mut stats = PartitionStats {
            malformed_lines: self.malformed_lines,
            ..Default::default()
        };
        for (partition, map) in &self.buffers {
            let path = self.partition_path(partition);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp_path = path.with_extension("jsonl.tmp");
            {
                let mut writer = BufWriter::new(File::create(&tmp_path)?);
                for record in map.values() {
                    serde_json::to_writer(&mut writer, record).map_err(io::Error::from)?;
                    writer.write_all(b"\n")?;
                }
                writer.flush()?;
            }
            fs::rename(&tmp_path, &path)?;
            stats.records_written += map.len();
            stats.partitions += 1;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        title: Option<String>,
        date: Option<String>,
    }

    impl PartitionRecord for Row {
        fn key(&self) -> &str {
            &self.id
        }

        fn partition(&self) -> String {
            self.date
                .as_deref()
                .map(|d| d[..4].to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string())
        }
    }

    fn row(id: &str, title: &str, date: Option<&str>) -> Row {
        Row {
            id: id.to_string(),
            title: Some(title.to_string()),
            date: date.map(String::from),
        }
    }

    fn read_file(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn writes_year_and_unknown_partitions() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "a", Some("2021-01-01"))).unwrap();
        writer.upsert(row("2", "b", None)).unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats.records_written, 2);
        assert_eq!(stats.partitions, 2);
        assert!(dir.path().join("2021/src0001.jsonl").exists());
        assert!(dir.path().join("UNKNOWN/src0001.jsonl").exists());
    }

    #[test]
    fn last_write_wins_within_run() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "old", Some("2021-01-01"))).unwrap();
        writer.upsert(row("1", "new", Some("2021-01-01"))).unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats.records_written, 1);
        let content = read_file(&dir.path().join("2021/src0001.jsonl"));
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("new"));
        assert!(!content.contains("old"));
    }

    #[test]
    fn reexport_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let input = [
            row("1", "a", Some("2021-03-01")),
            row("2", "b", Some("2021-05-09")),
            row("3", "c", None),
        ];

        for _ in 0..2 {
            let mut writer = PartitionWriter::new(dir.path(), "src0001");
            for r in &input {
                writer.upsert(r.clone()).unwrap();
            }
            writer.finish().unwrap();
        }

        let first = read_file(&dir.path().join("2021/src0001.jsonl"));
        assert_eq!(first.lines().count(), 2);

        // Third run: byte-identical output
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        for r in &input {
            writer.upsert(r.clone()).unwrap();
        }
        writer.finish().unwrap();
        assert_eq!(read_file(&dir.path().join("2021/src0001.jsonl")), first);
    }

    #[test]
    fn reexport_merges_updated_record() {
        let dir = TempDir::new().unwrap();

        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "first title", Some("2021-01-01"))).unwrap();
        writer.upsert(row("2", "other", Some("2021-01-01"))).unwrap();
        writer.finish().unwrap();

        // Same source file, one record revised
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "revised title", Some("2021-01-01"))).unwrap();
        let stats = writer.finish().unwrap();

        // Untouched record "2" carried over from the prior export
        assert_eq!(stats.records_written, 2);
        let content = read_file(&dir.path().join("2021/src0001.jsonl"));
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("revised title"));
        assert!(!content.contains("first title"));
    }

    #[test]
    fn different_stems_do_not_merge() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "a", Some("2021-01-01"))).unwrap();
        writer.finish().unwrap();

        let mut writer = PartitionWriter::new(dir.path(), "src0002");
        writer.upsert(row("1", "b", Some("2021-01-01"))).unwrap();
        writer.finish().unwrap();

        assert_eq!(
            read_file(&dir.path().join("2021/src0001.jsonl"))
                .lines()
                .count(),
            1
        );
        assert_eq!(
            read_file(&dir.path().join("2021/src0002.jsonl"))
                .lines()
                .count(),
            1
        );
    }

    #[test]
    fn malformed_lines_counted_and_dropped() {
        let dir = TempDir::new().unwrap();
        let part_dir = dir.path().join("2021");
        fs::create_dir_all(&part_dir).unwrap();
        fs::write(
            part_dir.join("src0001.jsonl"),
            "{\"id\":\"1\",\"title\":\"kept\",\"date\":\"2021-01-01\"}\nnot json\n\n",
        )
        .unwrap();

        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("2", "new", Some("2021-01-01"))).unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats.malformed_lines, 1);
        assert_eq!(stats.records_written, 2);
        let content = read_file(&part_dir.join("src0001.jsonl"));
        assert!(content.contains("kept"));
        assert!(content.contains("new"));
    }

    #[test]
    fn no_tmp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartitionWriter::new(dir.path(), "src0001");
        writer.upsert(row("1", "a", Some("2021-01-01"))).unwrap();
        writer.finish().unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("2021"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
