// The measurements of each batch, persisted as JSON so that a scan can be
// resumed and the ballots can be classified again with other thresholds.
//
// Layout:
//   <root>/batches/<batch file name>.json   one table per batch
//   <root>/manifest.json                     the batches of the last complete scan

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audit::io_common::simplify_file_name;
use crate::audit::*;

const BATCH_DIR: &str = "batches";
const MANIFEST: &str = "manifest.json";

/// One ballot of a batch table.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BallotRow {
    pub ballot: String,
    #[serde(rename = "badBoxes")]
    pub bad_boxes: bool,
    /// In the order of the candidates of the table. Empty for bad boxes.
    #[serde(default)]
    pub darkness: Vec<u64>,
}

/// The measurements of all the ballots of a batch.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BatchTable {
    /// The batch file, as found in the input directory.
    pub batch: String,
    pub precinct: String,
    pub candidates: Vec<String>,
    pub ballots: Vec<BallotRow>,
}

impl BatchTable {
    pub fn from_scans(
        batch: &str,
        precinct: &str,
        candidates: &[String],
        scans: &[BallotScan],
    ) -> BatchTable {
        let ballots = scans
            .iter()
            .map(|s| BallotRow {
                ballot: s.ballot.clone(),
                bad_boxes: s.bad_boxes,
                darkness: s.darkness.iter().map(|(_, d)| *d).collect(),
            })
            .collect();
        BatchTable {
            batch: batch.to_string(),
            precinct: precinct.to_string(),
            candidates: candidates.to_vec(),
            ballots,
        }
    }

    pub fn scans(&self) -> AuditResult<Vec<BallotScan>> {
        let mut res: Vec<BallotScan> = Vec::with_capacity(self.ballots.len());
        for row in self.ballots.iter() {
            if row.bad_boxes {
                res.push(BallotScan::bad_boxes(&row.ballot));
                continue;
            }
            ensure!(
                row.darkness.len() == self.candidates.len(),
                CorruptedBatchSnafu {
                    path: self.batch.clone(),
                    reason: format!(
                        "ballot {} has {} values for {} candidates",
                        row.ballot,
                        row.darkness.len(),
                        self.candidates.len()
                    ),
                }
            );
            res.push(BallotScan {
                ballot: row.ballot.clone(),
                bad_boxes: false,
                darkness: self
                    .candidates
                    .iter()
                    .cloned()
                    .zip(row.darkness.iter().cloned())
                    .collect(),
            });
        }
        Ok(res)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    batches: Vec<String>,
}

/// The directory holding the batch tables.
///
/// Each batch is written by a single worker to its own file, so the store can
/// be shared between threads without locking.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    /// Opens the store, creating its directories if needed.
    pub fn open(root: &str) -> BAuditResult<ResultStore> {
        let store = ResultStore {
            root: PathBuf::from(root),
        };
        let dir = store.root.join(BATCH_DIR);
        fs::create_dir_all(&dir).context(WritingFileSnafu {
            path: dir.display().to_string(),
        })?;
        Ok(store)
    }

    fn batch_path(&self, batch: &str) -> PathBuf {
        self.root
            .join(BATCH_DIR)
            .join(format!("{}.json", simplify_file_name(batch)))
    }

    pub fn contains(&self, batch: &str) -> bool {
        self.batch_path(batch).is_file()
    }

    /// Writes the table of a batch. The file appears complete or not at all.
    pub fn write_batch(&self, table: &BatchTable) -> BAuditResult<()> {
        let path = self.batch_path(&table.batch);
        let js = serde_json::to_string(table).context(WritingJsonSnafu {})?;
        write_atomic(&path, &js)?;
        debug!("write_batch: {} -> {}", table.batch, path.display());
        Ok(())
    }

    pub fn read_batch(&self, batch: &str) -> BAuditResult<BatchTable> {
        let path = self.batch_path(batch);
        Ok(read_json_file(&path)?)
    }

    pub fn write_manifest(&self, batches: &[String]) -> BAuditResult<()> {
        let manifest = Manifest {
            batches: batches.to_vec(),
        };
        let js = serde_json::to_string_pretty(&manifest).context(WritingJsonSnafu {})?;
        write_atomic(&self.root.join(MANIFEST), &js)?;
        info!("write_manifest: {} batches", batches.len());
        Ok(())
    }

    pub fn read_manifest(&self) -> BAuditResult<Option<Vec<String>>> {
        let path = self.root.join(MANIFEST);
        if !path.is_file() {
            return Ok(None);
        }
        let manifest: Manifest = read_json_file(&path)?;
        Ok(Some(manifest.batches))
    }

    /// All the batch tables, in the order of the manifest.
    ///
    /// Without a manifest (the scan was interrupted), every table present in
    /// the store is returned, sorted by file name.
    pub fn all_batches(&self) -> BAuditResult<Vec<BatchTable>> {
        let mut res: Vec<BatchTable> = Vec::new();
        if let Some(batches) = self.read_manifest()? {
            for b in batches.iter() {
                res.push(self.read_batch(b)?);
            }
            return Ok(res);
        }

        warn!(
            "all_batches: no manifest in {}, the scan may be incomplete",
            self.root.display()
        );
        let dir = self.root.join(BATCH_DIR);
        let dir_name = dir.display().to_string();
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&dir).context(ReadingDirSnafu { path: &dir_name })? {
            let p = entry.context(ReadingDirSnafu { path: &dir_name })?.path();
            if p.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(p);
            }
        }
        paths.sort();
        for p in paths.iter() {
            res.push(read_json_file(p)?);
        }
        Ok(res)
    }
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> AuditResult<T> {
    let path_name = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path: &path_name })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path: &path_name })
}

fn write_atomic(path: &Path, contents: &str) -> AuditResult<()> {
    let path_name = path.display().to_string();
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).context(WritingFileSnafu { path: &path_name })?;
    fs::rename(&tmp, path).context(WritingFileSnafu { path: &path_name })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A fresh directory under the system temporary directory.
    pub(crate) fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ballotaudit-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn table(batch: &str) -> BatchTable {
        let names = vec!["clinton".to_string(), "trump".to_string()];
        let scans = vec![
            BallotScan {
                ballot: "0001F.pbm".to_string(),
                bad_boxes: false,
                darkness: vec![("clinton".to_string(), 4000), ("trump".to_string(), 12)],
            },
            BallotScan::bad_boxes("0002F.pbm"),
        ];
        BatchTable::from_scans(batch, &io_common::precinct_name(batch), &names, &scans)
    }

    #[test]
    fn stores_batches() {
        let dir = temp_dir("store");
        let store = ResultStore::open(dir.to_str().unwrap()).unwrap();
        let batch = "wards/Madison City Wards 1-3.zip";
        assert!(!store.contains(batch));
        let t = table(batch);
        store.write_batch(&t).unwrap();
        assert!(store.contains(batch));
        assert!(dir.join("batches/Madison City Wards 1-3.zip.json").is_file());

        let back = store.read_batch(batch).unwrap();
        assert_eq!(back, t);
        let scans = back.scans().unwrap();
        assert_eq!(scans[0].darkness_of("clinton"), Some(4000));
        assert_eq!(scans[1], BallotScan::bad_boxes("0002F.pbm"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn manifest_orders_batches() {
        let dir = temp_dir("manifest");
        let store = ResultStore::open(dir.to_str().unwrap()).unwrap();
        let names = vec!["in/Madison City Wards 2.zip".to_string(), "in/Madison City Wards 1.zip".to_string()];
        for n in names.iter() {
            store.write_batch(&table(n)).unwrap();
        }
        // Without a manifest: sorted by file name.
        let all = store.all_batches().unwrap();
        assert_eq!(all[0].precinct, "Madison City Wards 1");

        assert_eq!(store.read_manifest().unwrap(), None);
        store.write_manifest(&names).unwrap();
        assert_eq!(store.read_manifest().unwrap(), Some(names.clone()));
        let all = store.all_batches().unwrap();
        assert_eq!(all[0].precinct, "Madison City Wards 2");
        assert_eq!(all.len(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupted_rows_are_errors() {
        let mut t = table("Madison City Wards 1.zip");
        t.ballots[0].darkness.pop();
        assert!(matches!(t.scans(), Err(AuditError::CorruptedBatch { .. })));
    }
}
