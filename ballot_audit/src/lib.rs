mod config;
use image::GrayImage;
use log::{debug, warn};

pub use crate::config::*;

pub mod bubbles;
pub mod builder;
pub mod classify;
pub mod manual;
pub mod registration;
pub mod tally;
pub mod wards;

pub use crate::classify::classify;
pub use crate::tally::{
    group_by_locality, LocalityKey, OfficialTally, PrecinctTable, PrecinctTally, Tally,
};
pub use crate::wards::{
    parse_ward_range, reconcile_city_wards, ReconciledGroup, Reconciliation, Township, WardRange,
};

use crate::bubbles::{locate_bubble, measure_darkness};
use crate::registration::{detect_grid, rescale};

/// Measures the darkness of every candidate bubble of a ballot.
///
/// Arguments:
/// * `ballot` the name of the ballot, kept for traceability
/// * `img` the scanned page, at its original resolution
/// * `rules` how to find the registration marks
/// * `candidates` where the bubbles are
///
/// A ballot whose registration marks do not match the layout is flagged with
/// `bad_boxes` and has no darkness. This is not an error: the other ballots
/// are not affected.
pub fn scan_ballot(
    ballot: &str,
    img: &GrayImage,
    rules: &ScanRules,
    candidates: &[CandidateSlot],
) -> BallotScan {
    let scaled = rescale(img, rules.scale_factor);
    let grid = detect_grid(&scaled, rules);
    if !grid.matches(rules) {
        warn!(
            "scan_ballot: {}: found {} horizontal and {} vertical marks, expected {} and {}",
            ballot,
            grid.horizontal.len(),
            grid.vertical.len(),
            rules.expected_horizontal_marks,
            rules.expected_vertical_marks
        );
        return BallotScan::bad_boxes(ballot);
    }

    let mut darkness: Vec<(String, u64)> = Vec::new();
    for slot in candidates.iter() {
        match locate_bubble(&grid, slot) {
            Some(region) => darkness.push((slot.name.clone(), measure_darkness(&scaled, &region))),
            None => {
                // Only happens with slots that were not validated against the rules.
                warn!(
                    "scan_ballot: {}: no bubble for candidate {}",
                    ballot, slot.name
                );
                return BallotScan::bad_boxes(ballot);
            }
        }
    }
    debug!("scan_ballot: {}: {:?}", ballot, darkness);
    BallotScan {
        ballot: ballot.to_string(),
        bad_boxes: false,
        darkness,
    }
}

/// Classifies all the ballots of a precinct and counts the outcomes.
pub fn tally_precinct<'a, I>(precinct: &str, scans: I, thresholds: &Thresholds) -> PrecinctTally
where
    I: IntoIterator<Item = &'a BallotScan>,
{
    let mut b = builder::Builder::new(precinct, thresholds);
    b.add_scans(scans);
    b.build()
}
