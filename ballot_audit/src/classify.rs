use log::debug;

use crate::config::{BallotScan, Outcome, Thresholds};

/// Decides the outcome of a ballot.
///
/// The rules are applied in order, the first one that matches wins:
/// 1. bad registration marks: `BadBoxes`
/// 2. any bubble with a darkness in `[low, high)`: `Fuzzy`
/// 3. more than one bubble strictly darker than `high`: `Multiple`
/// 4. no such bubble: `Blank`
/// 5. exactly one: that candidate
///
/// An ambiguous bubble wins over a clear mark: a ballot with one filled
/// bubble and a smudge on another one is sent for review, not counted.
pub fn classify(scan: &BallotScan, thresholds: &Thresholds) -> Outcome {
    if scan.bad_boxes {
        return Outcome::BadBoxes;
    }
    let is_fuzzy = scan
        .darkness
        .iter()
        .any(|(_, d)| *d >= thresholds.low() && *d < thresholds.high());
    if is_fuzzy {
        debug!("classify: {}: fuzzy {:?}", scan.ballot, scan.darkness);
        return Outcome::Fuzzy;
    }
    let marked: Vec<&String> = scan
        .darkness
        .iter()
        .filter(|(_, d)| *d > thresholds.high())
        .map(|(name, _)| name)
        .collect();
    match marked.as_slice() {
        [] => Outcome::Blank,
        [name] => Outcome::Candidate((*name).clone()),
        _ => Outcome::Multiple,
    }
}
