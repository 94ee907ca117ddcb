// Reading the batches of scanned ballots.

use std::fs::File;
use std::io::Read;

use image::GrayImage;
use rayon::prelude::*;

use crate::audit::io_common::{file_extension, precinct_name};
use crate::audit::store::{BatchTable, ResultStore};
use crate::audit::*;

fn decode_ballot(ballot: &str, bytes: &[u8]) -> AuditResult<GrayImage> {
    let img = image::load_from_memory(bytes).context(DecodingImageSnafu { ballot })?;
    Ok(img.into_luma8())
}

fn scan_zip(path: &str, settings: &ScanSettings) -> BAuditResult<Vec<BallotScan>> {
    let file = File::open(path).context(OpeningFileSnafu { path })?;
    let mut archive = zip::ZipArchive::new(file).context(OpeningArchiveSnafu { path })?;
    let mut res: Vec<BallotScan> = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .context(ArchiveEntrySnafu { path, index })?;
        if entry.is_dir() || !entry.name().ends_with(settings.ballot_suffix.as_str()) {
            debug!("scan_zip: {}: skipping {}", path, entry.name());
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes: Vec<u8> = Vec::new();
        entry.read_to_end(&mut bytes).context(ExtractingEntrySnafu {
            path,
            entry: name.as_str(),
        })?;
        let img = decode_ballot(&name, &bytes)?;
        res.push(scan_ballot(
            &name,
            &img,
            &settings.rules,
            &settings.candidates,
        ));
    }
    Ok(res)
}

fn scan_single(path: &str, settings: &ScanSettings) -> BAuditResult<Vec<BallotScan>> {
    let bytes = fs::read(path).context(OpeningFileSnafu { path })?;
    let name = io_common::simplify_file_name(path);
    let img = decode_ballot(&name, &bytes)?;
    Ok(vec![scan_ballot(
        &name,
        &img,
        &settings.rules,
        &settings.candidates,
    )])
}

/// Measures all the ballots of a batch.
///
/// A `.zip` batch holds many ballots, a `.pbm` batch a single one. Any other
/// file is an error.
pub fn scan_batch(path: &str, settings: &ScanSettings) -> BAuditResult<BatchTable> {
    info!("scan_batch: starting {}", path);
    let scans = match file_extension(path).as_deref() {
        Some("zip") => scan_zip(path, settings)?,
        Some("pbm") => scan_single(path, settings)?,
        _ => return Err(Box::new(AuditError::UnknownBatchType { path: path.to_string() })),
    };
    let bad = scans.iter().filter(|s| s.bad_boxes).count();
    if bad > 0 {
        warn!(
            "scan_batch: {}: registration marks not found on {} of {} ballots",
            path,
            bad,
            scans.len()
        );
    }
    info!("scan_batch: finished {}: {} ballots", path, scans.len());
    Ok(BatchTable::from_scans(
        path,
        &precinct_name(path),
        &settings.candidate_names(),
        &scans,
    ))
}

/// The batch files of a directory, sorted by name. Subdirectories are ignored.
pub fn list_batches(dir: &str) -> BAuditResult<Vec<String>> {
    let mut res: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir).context(ReadingDirSnafu { path: dir })? {
        let p = entry.context(ReadingDirSnafu { path: dir })?.path();
        if p.is_file() {
            res.push(p.display().to_string());
        }
    }
    res.sort();
    Ok(res)
}

/// Scans all the batches of a directory that are not in the store yet.
///
/// Up to `jobs` batches are scanned at the same time (0 for one per core).
/// Each batch is stored as soon as it is done, so an interrupted scan loses
/// at most the batches in progress. The manifest is written once every batch
/// is stored.
pub fn scan_directory(
    dir: &str,
    store: &ResultStore,
    jobs: usize,
    settings: &ScanSettings,
) -> BAuditResult<Vec<String>> {
    let batches = list_batches(dir)?;
    let todo: Vec<&String> = batches.iter().filter(|b| !store.contains(b)).collect();
    info!(
        "scan_directory: {} batches in {}, {} already scanned",
        batches.len(),
        dir,
        batches.len() - todo.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context(ThreadPoolSnafu { jobs })?;
    let results: Vec<BAuditResult<()>> = pool.install(|| {
        todo.par_iter()
            .map(|batch| {
                let table = scan_batch(batch, settings)?;
                store.write_batch(&table)
            })
            .collect()
    });
    for r in results {
        r?;
    }

    store.write_manifest(&batches)?;
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::tests::temp_dir;
    use std::io::{Cursor, Write};

    // A small layout: 2 marks at the top, 6 on the left.
    const TOP_COLS: [u32; 2] = [20, 40];
    const LEFT_ROWS: [u32; 6] = [20, 28, 36, 44, 52, 60];

    fn fill(img: &mut GrayImage, rows: (u32, u32), cols: (u32, u32)) {
        for r in rows.0..rows.1 {
            for c in cols.0..cols.1 {
                img.put_pixel(c, r, image::Luma([0u8]));
            }
        }
    }

    fn settings() -> ScanSettings {
        ScanSettings {
            rules: ScanRules {
                scale_factor: 1.0,
                ignore_left_margin: 5,
                ignore_top_margin: 5,
                tilt_allowance: 4,
                expected_horizontal_marks: 2,
                expected_vertical_marks: 6,
            },
            candidates: vec![CandidateSlot::new("yes", 2, 1), CandidateSlot::new("no", 4, 1)],
            ballot_suffix: "F.png".to_string(),
        }
    }

    /// A ballot of the small layout, with a vote for the given slot.
    fn ballot(vote: Option<u32>) -> GrayImage {
        let mut img = GrayImage::from_pixel(60, 70, image::Luma([255u8]));
        for c in TOP_COLS {
            fill(&mut img, (8, 11), (c, c + 4));
        }
        for r in LEFT_ROWS {
            fill(&mut img, (r, r + 3), (8, 12));
        }
        if let Some(v) = vote {
            let r = LEFT_ROWS[v as usize];
            let shift = TOP_COLS[1] - TOP_COLS[0];
            fill(&mut img, (r, r + 3), (8 + shift, 12 + shift));
        }
        img
    }

    fn png(img: &GrayImage) -> Vec<u8> {
        let mut c = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img.clone())
            .write_to(&mut c, image::ImageOutputFormat::Png)
            .unwrap();
        c.into_inner()
    }

    fn write_zip(path: &std::path::Path, entries: &[(&str, Vec<u8>)]) {
        let mut zw = zip::ZipWriter::new(File::create(path).unwrap());
        zw.add_directory("scans/", zip::write::FileOptions::default())
            .unwrap();
        for (name, bytes) in entries.iter() {
            zw.start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            zw.write_all(bytes).unwrap();
        }
        zw.finish().unwrap();
    }

    #[test]
    fn scans_zip_batch() {
        let dir = temp_dir("zip");
        let path = dir.join("Madison City Wards 1-2.zip");
        write_zip(
            &path,
            &[
                ("scans/0001F.png", png(&ballot(Some(2)))),
                ("scans/0001B.png", png(&ballot(None))),
                ("scans/0002F.png", png(&ballot(Some(4)))),
            ],
        );
        let table = scan_batch(path.to_str().unwrap(), &settings()).unwrap();
        assert_eq!(table.precinct, "Madison City Wards 1-2");
        assert_eq!(table.candidates, vec!["yes", "no"]);
        assert_eq!(table.ballots.len(), 2);
        assert_eq!(table.ballots[0].ballot, "scans/0001F.png");
        let scans = table.scans().unwrap();
        let th = Thresholds::new(1000, 2000).unwrap();
        assert_eq!(classify(&scans[0], &th), Outcome::Candidate("yes".to_string()));
        assert_eq!(classify(&scans[1], &th), Outcome::Candidate("no".to_string()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn undecodable_ballot_is_an_error() {
        let dir = temp_dir("undecodable");
        let path = dir.join("Madison City Wards 3.zip");
        write_zip(&path, &[("0001F.png", b"not an image".to_vec())]);
        let res = scan_batch(path.to_str().unwrap(), &settings());
        assert!(matches!(
            res.map_err(|e| *e),
            Err(AuditError::DecodingImage { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn single_pbm_batch() {
        let dir = temp_dir("pbm");
        let path = dir.join("Madison Town Wards 4.pbm");
        // A plain bitmap without any mark.
        fs::write(&path, "P1\n4 2\n0 0 0 0\n0 0 0 0\n").unwrap();
        let table = scan_batch(path.to_str().unwrap(), &settings()).unwrap();
        assert_eq!(table.precinct, "Madison Town Wards 4");
        assert_eq!(table.ballots.len(), 1);
        assert!(table.ballots[0].bad_boxes);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_batch_type() {
        let dir = temp_dir("unknown");
        let path = dir.join("notes.txt");
        fs::write(&path, "hello").unwrap();
        let res = scan_batch(path.to_str().unwrap(), &settings());
        assert!(matches!(
            res.map_err(|e| *e),
            Err(AuditError::UnknownBatchType { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn scans_directory_and_resumes() {
        let root = temp_dir("directory");
        let input = root.join("wards");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(input.join("ignored")).unwrap();
        write_zip(
            &input.join("Madison City Wards 1.zip"),
            &[("0001F.png", png(&ballot(Some(2))))],
        );
        write_zip(
            &input.join("Madison City Wards 2.zip"),
            &[
                ("0001F.png", png(&ballot(Some(4)))),
                ("0002F.png", png(&ballot(None))),
            ],
        );
        let store = ResultStore::open(root.join("store").to_str().unwrap()).unwrap();
        let batches =
            scan_directory(input.to_str().unwrap(), &store, 2, &settings()).unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| store.contains(b)));
        assert_eq!(store.read_manifest().unwrap(), Some(batches.clone()));

        // A second run only scans the new batch.
        write_zip(&input.join("Madison City Wards 3.zip"), &[]);
        let again = scan_directory(input.to_str().unwrap(), &store, 2, &settings()).unwrap();
        assert_eq!(again.len(), 3);
        let all = store.all_batches().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].ballots.len(), 2);
        assert!(all[2].ballots.is_empty());
        let _ = fs::remove_dir_all(&root);
    }
}
