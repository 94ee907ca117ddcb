pub use crate::config::*;

use crate::classify::classify;
use crate::tally::PrecinctTally;

/// A builder for the tally of one precinct.
///
/// Scans can be added in any order, and partial builders (for instance one
/// per worker) can be merged.
///
/// ```
/// use ballot_audit::builder::Builder;
/// use ballot_audit::{BallotScan, Outcome, Thresholds};
/// # use ballot_audit::ConfigError;
///
/// let mut builder = Builder::new("Madison City Wards 1-3", &Thresholds::new(1200, 1800)?);
///
/// builder.add_scan(&BallotScan {
///     ballot: "0001F.pbm".to_string(),
///     bad_boxes: false,
///     darkness: vec![("clinton".to_string(), 4000), ("trump".to_string(), 30)],
/// });
/// builder.add_scan(&BallotScan::bad_boxes("0002F.pbm"));
///
/// let tally = builder.build();
/// assert_eq!(tally.get(&Outcome::Candidate("clinton".to_string())), 1);
/// assert_eq!(tally.get(&Outcome::BadBoxes), 1);
/// # Ok::<(), ConfigError>(())
/// ```
pub struct Builder {
    pub(crate) _thresholds: Thresholds,
    pub(crate) _tally: PrecinctTally,
}

impl Builder {
    pub fn new(precinct: &str, thresholds: &Thresholds) -> Builder {
        Builder {
            _thresholds: *thresholds,
            _tally: PrecinctTally::new(precinct),
        }
    }

    /// Classifies a scan and counts its outcome.
    pub fn add_scan(&mut self, scan: &BallotScan) -> Outcome {
        let outcome = classify(scan, &self._thresholds);
        self.add_outcome(outcome.clone());
        outcome
    }

    pub fn add_scans<'a, I: IntoIterator<Item = &'a BallotScan>>(&mut self, scans: I) {
        for s in scans {
            self.add_scan(s);
        }
    }

    pub fn add_outcome(&mut self, outcome: Outcome) {
        self._tally.add(outcome, 1);
    }

    pub fn merge(&mut self, other: &Builder) {
        self._tally.merge(&other._tally);
    }

    pub fn build(self) -> PrecinctTally {
        self._tally
    }
}
