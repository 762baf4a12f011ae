//! Per-run artifacts on disk: command script, metadata record and full log.
//!
//! Layout: `<runs_dir>/<run_id>/{run.mac, meta.json, log.txt, <output file>}`.

use crate::error::{DashError, DashResult};
use crate::model::RunRecord;
use std::path::{Path, PathBuf};

pub const SCRIPT_FILE: &str = "run.mac";
pub const RECORD_FILE: &str = "meta.json";
pub const LOG_FILE: &str = "log.txt";

/// Extensions listed as run results.
const RESULT_EXTENSIONS: [&str; 4] = ["root", "mac", "json", "txt"];

#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Create a fresh directory for a run started at `stamp`.
    ///
    /// The stamp is used as the run id unless a run with that id already exists, in which
    /// case `_2`, `_3`, … is appended.
    pub fn create_run_dir(&self, stamp: &str) -> DashResult<(String, PathBuf)> {
        let mut run_id = stamp.to_string();
        let mut n = 1;
        while self.run_dir(&run_id).exists() {
            n += 1;
            run_id = format!("{stamp}_{n}");
        }
        let dir = self.run_dir(&run_id);
        std::fs::create_dir_all(&dir)
            .map_err(|e| DashError::io(format!("create run directory {}", dir.display()), e))?;
        Ok((run_id, dir))
    }

    pub fn write_script(&self, run_dir: &Path, script: &str) -> DashResult<PathBuf> {
        let path = run_dir.join(SCRIPT_FILE);
        write_file(&path, script)?;
        Ok(path)
    }

    pub fn write_record(&self, run_dir: &Path, record: &RunRecord) -> DashResult<()> {
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| DashError::json("serialize run record", e))?;
        write_file(&run_dir.join(RECORD_FILE), &text)
    }

    pub fn write_log(&self, run_dir: &Path, lines: &[String]) -> DashResult<()> {
        write_file(&run_dir.join(LOG_FILE), &lines.join("\n"))
    }

    pub fn read_record(&self, run_id: &str) -> DashResult<RunRecord> {
        let path = self.run_dir(run_id).join(RECORD_FILE);
        let text = read_existing(&path, || format!("run {run_id}"))?;
        let mut record: RunRecord = serde_json::from_str(&text)
            .map_err(|e| DashError::json(format!("parse {}", path.display()), e))?;
        record.run_id = Some(run_id.to_string());
        Ok(record)
    }

    /// Every readable run record, newest run id first.
    pub fn list_runs(&self) -> DashResult<Vec<RunRecord>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DashError::io(
                    format!("list {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(RECORD_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_record(&id) {
                Ok(record) => runs.push(record),
                Err(e) => tracing::debug!(run_id = %id, error = %e, "skipping unreadable run record"),
            }
        }
        Ok(runs)
    }

    /// Names of result artifacts in a run directory, sorted.
    pub fn result_files(&self, run_id: &str) -> DashResult<Vec<String>> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Err(DashError::NotFound(format!("run {run_id}")));
        }
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| DashError::io(format!("list {}", dir.display()), e))?;
        let mut files: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| RESULT_EXTENSIONS.contains(&ext))
            })
            .filter_map(|path| path.file_name()?.to_str().map(str::to_string))
            .collect();
        files.sort();
        Ok(files)
    }

    pub fn read_log(&self, run_id: &str) -> DashResult<String> {
        let path = self.run_dir(run_id).join(LOG_FILE);
        read_existing(&path, || format!("log for run {run_id}"))
    }

    /// Path of an existing artifact inside a run directory.
    pub fn file_path(&self, run_id: &str, name: &str) -> DashResult<PathBuf> {
        let plain_name = Path::new(name)
            .file_name()
            .is_some_and(|f| f == std::ffi::OsStr::new(name));
        let path = self.run_dir(run_id).join(name);
        if !plain_name || !path.is_file() {
            return Err(DashError::NotFound(format!("file {name} in run {run_id}")));
        }
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &str) -> DashResult<()> {
    std::fs::write(path, contents).map_err(|e| DashError::io(format!("write {}", path.display()), e))
}

fn read_existing(path: &Path, what: impl FnOnce() -> String) -> DashResult<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DashError::NotFound(what())),
        Err(e) => Err(DashError::io(format!("read {}", path.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunParams, RunStatus};
    use tempfile::TempDir;

    fn store() -> (TempDir, RunStore) {
        let tmp = TempDir::new().unwrap();
        let store = RunStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn duplicate_stamps_get_suffixes() {
        let (_tmp, store) = store();
        let (a, _) = store.create_run_dir("20250101_120000").unwrap();
        let (b, _) = store.create_run_dir("20250101_120000").unwrap();
        let (c, _) = store.create_run_dir("20250101_120000").unwrap();
        assert_eq!(a, "20250101_120000");
        assert_eq!(b, "20250101_120000_2");
        assert_eq!(c, "20250101_120000_3");
    }

    #[test]
    fn record_round_trips_through_disk() {
        let (_tmp, store) = store();
        let (id, dir) = store.create_run_dir("20250101_120000").unwrap();
        let mut rec = RunParams::default().record(&id, &id);
        store.write_record(&dir, &rec).unwrap();
        rec.status = RunStatus::Failed { code: 2 };
        rec.finished = Some("20250101_120500".into());
        store.write_record(&dir, &rec).unwrap();
        assert_eq!(store.read_record(&id).unwrap(), rec);
    }

    #[test]
    fn list_runs_is_newest_first_and_skips_garbage() {
        let (tmp, store) = store();
        for stamp in ["20250101_000001", "20250301_000001", "20250201_000001"] {
            let (id, dir) = store.create_run_dir(stamp).unwrap();
            store
                .write_record(&dir, &RunParams::default().record(&id, &id))
                .unwrap();
        }
        let (_, broken) = store.create_run_dir("20250401_000001").unwrap();
        std::fs::write(broken.join(RECORD_FILE), "{not json").unwrap();
        std::fs::create_dir(tmp.path().join("no_meta")).unwrap();

        let ids: Vec<_> = store
            .list_runs()
            .unwrap()
            .into_iter()
            .filter_map(|r| r.run_id)
            .collect();
        assert_eq!(ids, ["20250301_000001", "20250201_000001", "20250101_000001"]);
    }

    #[test]
    fn list_runs_on_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = RunStore::new(tmp.path().join("nope"));
        assert!(store.list_runs().unwrap().is_empty());
    }

    #[test]
    fn result_files_filter_by_extension() {
        let (_tmp, store) = store();
        let (id, dir) = store.create_run_dir("20250101_120000").unwrap();
        store.write_script(&dir, "/run/beamOn 1\n").unwrap();
        store.write_log(&dir, &["a".into(), "b".into()]).unwrap();
        std::fs::write(dir.join("G4sim.root"), b"").unwrap();
        std::fs::write(dir.join("core.dump"), b"").unwrap();
        assert_eq!(
            store.result_files(&id).unwrap(),
            ["G4sim.root", "log.txt", "run.mac"]
        );
        assert_eq!(store.read_log(&id).unwrap(), "a\nb");
    }

    #[test]
    fn missing_runs_and_files_are_not_found() {
        let (_tmp, store) = store();
        let (id, _) = store.create_run_dir("20250101_120000").unwrap();
        assert!(matches!(store.result_files("nope"), Err(DashError::NotFound(_))));
        assert!(matches!(store.read_log(&id), Err(DashError::NotFound(_))));
        assert!(matches!(store.read_record("nope"), Err(DashError::NotFound(_))));
        assert!(matches!(
            store.file_path(&id, "G4sim.root"),
            Err(DashError::NotFound(_))
        ));
        assert!(matches!(
            store.file_path(&id, "../secrets"),
            Err(DashError::NotFound(_))
        ));
    }
}
