// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;
use std::ops::RangeInclusive;

/// The position of the answer bubble of a candidate on the ballot.
///
/// The bubble sits on the line of the `vertical_index`-th mark of the left
/// column (counted from the top) and below the `horizontal_index`-th mark of
/// the top row (counted from the left).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct CandidateSlot {
    pub name: String,
    pub vertical_index: usize,
    pub horizontal_index: usize,
}

impl CandidateSlot {
    pub fn new(name: &str, vertical_index: usize, horizontal_index: usize) -> CandidateSlot {
        CandidateSlot {
            name: name.to_string(),
            vertical_index,
            horizontal_index,
        }
    }
}

/// The candidates of the reference layout (2016 presidential race, Dane County).
pub fn reference_candidates() -> Vec<CandidateSlot> {
    vec![
        CandidateSlot::new("trump", 19, 1),
        CandidateSlot::new("clinton", 21, 1),
        CandidateSlot::new("castle", 23, 1),
        CandidateSlot::new("johnson", 25, 1),
        CandidateSlot::new("stein", 27, 1),
        CandidateSlot::new("moorehead", 29, 1),
        CandidateSlot::new("roque", 31, 1),
        CandidateSlot::new("write-in", 33, 1),
    ]
}

/// The measurements taken on a single ballot.
///
/// When the registration marks could not be found, `bad_boxes` is set and
/// no darkness is recorded.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotScan {
    pub ballot: String,
    pub bad_boxes: bool,
    /// The darkness of each bubble, in the order of the candidate slots.
    pub darkness: Vec<(String, u64)>,
}

impl BallotScan {
    pub fn bad_boxes(ballot: &str) -> BallotScan {
        BallotScan {
            ballot: ballot.to_string(),
            bad_boxes: true,
            darkness: Vec::new(),
        }
    }

    pub fn darkness_of(&self, candidate: &str) -> Option<u64> {
        self.darkness
            .iter()
            .find(|(name, _)| name == candidate)
            .map(|(_, d)| *d)
    }
}

// ******** Output data structures *********

/// The classification of one ballot. Every ballot gets exactly one.
#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub enum Outcome {
    /// The registration marks did not match the layout.
    BadBoxes,
    /// At least one bubble is in the ambiguous band and needs a human.
    Fuzzy,
    Blank,
    Multiple,
    Candidate(String),
}

impl Outcome {
    pub const BAD_BOXES: &'static str = "badBoxes";
    pub const FUZZY: &'static str = "fuzzy";
    pub const BLANK: &'static str = "blank";
    pub const MULTIPLE: &'static str = "multiple";

    pub fn label(&self) -> &str {
        match self {
            Outcome::BadBoxes => Outcome::BAD_BOXES,
            Outcome::Fuzzy => Outcome::FUZZY,
            Outcome::Blank => Outcome::BLANK,
            Outcome::Multiple => Outcome::MULTIPLE,
            Outcome::Candidate(name) => name.as_str(),
        }
    }

    /// The labels of the outcomes that are not candidates.
    pub const RESERVED_LABELS: [&'static str; 4] = [
        Outcome::BAD_BOXES,
        Outcome::FUZZY,
        Outcome::BLANK,
        Outcome::MULTIPLE,
    ];

    /// A candidate with one of these names could not be told apart from the
    /// outcome in a tally.
    pub fn is_reserved_label(label: &str) -> bool {
        Outcome::RESERVED_LABELS.contains(&label)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Errors in the rules given to the audit.
#[derive(PartialEq, Debug, Clone)]
pub enum ConfigError {
    InvalidThresholds { low: u64, high: u64 },
    InvalidScaleFactor { scale_factor: f64 },
    InvalidMarkCounts { horizontal: usize, vertical: usize },
    DuplicateCandidate { name: String },
    ReservedCandidateName { name: String },
    SlotOutsideGrid { name: String },
    EmptyWardUniverse { first: u32, last: u32 },
}

impl Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidThresholds { low, high } => write!(
                f,
                "the low threshold ({}) must be strictly below the high threshold ({})",
                low, high
            ),
            ConfigError::InvalidScaleFactor { scale_factor } => {
                write!(f, "invalid scale factor: {}", scale_factor)
            }
            ConfigError::InvalidMarkCounts {
                horizontal,
                vertical,
            } => write!(
                f,
                "the layout needs at least one mark on each side, got {} horizontal and {} vertical",
                horizontal, vertical
            ),
            ConfigError::DuplicateCandidate { name } => {
                write!(f, "candidate {} is declared more than once", name)
            }
            ConfigError::ReservedCandidateName { name } => write!(
                f,
                "candidate {} has the name of an outcome ({})",
                name,
                Outcome::RESERVED_LABELS.join(", ")
            ),
            ConfigError::SlotOutsideGrid { name } => {
                write!(f, "the bubble of candidate {} is outside the registration grid", name)
            }
            ConfigError::EmptyWardUniverse { first, last } => {
                write!(f, "empty ward universe: {}..={}", first, last)
            }
        }
    }
}

/// Errors that stop the reconciliation with the official results.
///
/// These are never recovered from: they mean that the naming of the precincts
/// does not match what the audit expects.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ReconcileError {
    UnknownPrecinctName { name: String },
    MalformedWardSpec { name: String, item: String },
    WardAlreadyUsed { ward: u32, precinct: String },
    WardOutsideUniverse { ward: u32, precinct: String },
    MissingOfficialPrecinct { name: String, precinct: String },
    DuplicatePrecinct { name: String },
    MissingLocality { name: String },
}

impl Error for ReconcileError {}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::UnknownPrecinctName { name } => {
                write!(f, "unknown precinct name: {:?}", name)
            }
            ReconcileError::MalformedWardSpec { name, item } => {
                write!(f, "malformed ward list {:?} in precinct {:?}", item, name)
            }
            ReconcileError::WardAlreadyUsed { ward, precinct } => write!(
                f,
                "ward {} of precinct {:?} was already used by another precinct",
                ward, precinct
            ),
            ReconcileError::WardOutsideUniverse { ward, precinct } => write!(
                f,
                "ward {} of precinct {:?} is not a known ward number",
                ward, precinct
            ),
            ReconcileError::MissingOfficialPrecinct { name, precinct } => write!(
                f,
                "official results have no row {:?} (needed by precinct {:?})",
                name, precinct
            ),
            ReconcileError::DuplicatePrecinct { name } => {
                write!(f, "precinct {:?} appears more than once", name)
            }
            ReconcileError::MissingLocality { name } => {
                write!(f, "cannot find the locality in precinct name {:?}", name)
            }
        }
    }
}

// ********* Configuration **********

/// How the registration marks are searched for.
#[derive(PartialEq, Debug, Clone)]
pub struct ScanRules {
    /// The image is rescaled by this factor before anything else.
    pub scale_factor: f64,
    /// Marks starting within this many pixels of the left edge are not
    /// part of the left column.
    pub ignore_left_margin: u32,
    /// Marks starting within this many pixels of the top edge are not
    /// part of the top row.
    pub ignore_top_margin: u32,
    /// How far (in pixels) a mark may drift from the first mark of its row
    /// or column.
    pub tilt_allowance: u32,
    pub expected_horizontal_marks: usize,
    pub expected_vertical_marks: usize,
}

impl ScanRules {
    pub const DEFAULT_RULES: ScanRules = ScanRules {
        scale_factor: 0.125,
        ignore_left_margin: 5,
        ignore_top_margin: 5,
        tilt_allowance: 8,
        expected_horizontal_marks: 4,
        expected_vertical_marks: 38,
    };

    pub fn validate(&self, candidates: &[CandidateSlot]) -> Result<(), ConfigError> {
        if !(self.scale_factor > 0.0 && self.scale_factor <= 1.0) {
            return Err(ConfigError::InvalidScaleFactor {
                scale_factor: self.scale_factor,
            });
        }
        if self.expected_horizontal_marks == 0 || self.expected_vertical_marks == 0 {
            return Err(ConfigError::InvalidMarkCounts {
                horizontal: self.expected_horizontal_marks,
                vertical: self.expected_vertical_marks,
            });
        }
        for (idx, c) in candidates.iter().enumerate() {
            if Outcome::is_reserved_label(&c.name) {
                return Err(ConfigError::ReservedCandidateName {
                    name: c.name.clone(),
                });
            }
            if candidates[..idx].iter().any(|c2| c2.name == c.name) {
                return Err(ConfigError::DuplicateCandidate {
                    name: c.name.clone(),
                });
            }
            if c.vertical_index >= self.expected_vertical_marks
                || c.horizontal_index >= self.expected_horizontal_marks
            {
                return Err(ConfigError::SlotOutsideGrid {
                    name: c.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The two darkness thresholds.
///
/// Invariant: `low < high`.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Thresholds {
    low: u64,
    high: u64,
}

impl Thresholds {
    pub fn new(low: u64, high: u64) -> Result<Thresholds, ConfigError> {
        if low >= high {
            return Err(ConfigError::InvalidThresholds { low, high });
        }
        Ok(Thresholds { low, high })
    }

    pub fn low(&self) -> u64 {
        self.low
    }

    pub fn high(&self) -> u64 {
        self.high
    }
}

/// How the official ward names are spelled, and which wards exist.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct WardRules {
    pub municipality: String,
    pub first_ward: u32,
    pub last_ward: u32,
}

impl WardRules {
    pub fn new(municipality: &str, first_ward: u32, last_ward: u32) -> Result<WardRules, ConfigError> {
        if first_ward > last_ward {
            return Err(ConfigError::EmptyWardUniverse {
                first: first_ward,
                last: last_ward,
            });
        }
        Ok(WardRules {
            municipality: municipality.to_string(),
            first_ward,
            last_ward,
        })
    }

    pub fn universe(&self) -> RangeInclusive<u32> {
        self.first_ward..=self.last_ward
    }
}

impl Default for WardRules {
    fn default() -> Self {
        WardRules {
            municipality: "Madison".to_string(),
            first_ward: 1,
            last_ward: 138,
        }
    }
}
