use crate::audit::*;

use serde::{Deserialize, Serialize};

/// The suffix of the ballot entries in a batch archive: the front pages.
pub const DEFAULT_BALLOT_SUFFIX: &str = "F.pbm";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConfigCandidate {
    pub name: String,
    #[serde(rename = "verticalIndex")]
    pub vertical_index: usize,
    #[serde(rename = "horizontalIndex")]
    pub horizontal_index: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WardUniverse {
    pub first: u32,
    pub last: u32,
}

/// The configuration file. Every key is optional.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(rename = "scaleFactor")]
    pub scale_factor: Option<f64>,
    #[serde(rename = "ignoreLeftMargin")]
    pub ignore_left_margin: Option<u32>,
    #[serde(rename = "ignoreTopMargin")]
    pub ignore_top_margin: Option<u32>,
    #[serde(rename = "tiltAllowance")]
    pub tilt_allowance: Option<u32>,
    #[serde(rename = "expectedHorizontalMarks")]
    pub expected_horizontal_marks: Option<usize>,
    #[serde(rename = "expectedVerticalMarks")]
    pub expected_vertical_marks: Option<usize>,
    #[serde(rename = "lowThreshold")]
    pub low_threshold: Option<u64>,
    #[serde(rename = "highThreshold")]
    pub high_threshold: Option<u64>,
    #[serde(rename = "ballotSuffix")]
    pub ballot_suffix: Option<String>,
    pub municipality: Option<String>,
    #[serde(rename = "wardUniverse")]
    pub ward_universe: Option<WardUniverse>,
    pub candidates: Option<Vec<ConfigCandidate>>,
}

/// Everything a worker needs to scan a batch.
#[derive(PartialEq, Debug, Clone)]
pub struct ScanSettings {
    pub rules: ScanRules,
    pub candidates: Vec<CandidateSlot>,
    pub ballot_suffix: String,
}

impl ScanSettings {
    pub fn candidate_names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.name.clone()).collect()
    }
}

impl AuditConfig {
    pub fn scan_rules(&self) -> ScanRules {
        let d = ScanRules::DEFAULT_RULES;
        ScanRules {
            scale_factor: self.scale_factor.unwrap_or(d.scale_factor),
            ignore_left_margin: self.ignore_left_margin.unwrap_or(d.ignore_left_margin),
            ignore_top_margin: self.ignore_top_margin.unwrap_or(d.ignore_top_margin),
            tilt_allowance: self.tilt_allowance.unwrap_or(d.tilt_allowance),
            expected_horizontal_marks: self
                .expected_horizontal_marks
                .unwrap_or(d.expected_horizontal_marks),
            expected_vertical_marks: self
                .expected_vertical_marks
                .unwrap_or(d.expected_vertical_marks),
        }
    }

    pub fn candidate_slots(&self) -> Vec<CandidateSlot> {
        match &self.candidates {
            Some(cs) => cs
                .iter()
                .map(|c| CandidateSlot::new(&c.name, c.vertical_index, c.horizontal_index))
                .collect(),
            None => reference_candidates(),
        }
    }

    /// The scan settings, checked against each other.
    pub fn scan_settings(&self) -> AuditResult<ScanSettings> {
        let rules = self.scan_rules();
        let candidates = self.candidate_slots();
        rules.validate(&candidates).context(InvalidConfigSnafu {})?;
        Ok(ScanSettings {
            rules,
            candidates,
            ballot_suffix: self
                .ballot_suffix
                .clone()
                .unwrap_or_else(|| DEFAULT_BALLOT_SUFFIX.to_string()),
        })
    }

    /// The thresholds given on the command line take precedence over the file.
    pub fn thresholds(&self, low: Option<u64>, high: Option<u64>) -> AuditResult<Thresholds> {
        let low = low
            .or(self.low_threshold)
            .context(MissingThresholdSnafu { name: "lowThreshold" })?;
        let high = high
            .or(self.high_threshold)
            .context(MissingThresholdSnafu {
                name: "highThreshold",
            })?;
        Thresholds::new(low, high).context(InvalidConfigSnafu {})
    }

    pub fn ward_rules(&self) -> AuditResult<WardRules> {
        let d = WardRules::default();
        let municipality = self.municipality.clone().unwrap_or(d.municipality);
        let (first, last) = match &self.ward_universe {
            Some(u) => (u.first, u.last),
            None => (d.first_ward, d.last_ward),
        };
        WardRules::new(&municipality, first, last).context(InvalidConfigSnafu {})
    }
}

/// Reads the configuration file. Without a file, all the defaults apply.
pub fn read_config(path: Option<&str>) -> BAuditResult<AuditConfig> {
    let path = match path {
        Some(p) => p,
        None => {
            info!("read_config: no configuration file, using the defaults");
            return Ok(AuditConfig::default());
        }
    };
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: AuditConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    info!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: AuditConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AuditConfig::default());
        let settings = config.scan_settings().unwrap();
        assert_eq!(settings.rules, ScanRules::DEFAULT_RULES);
        assert_eq!(settings.candidates, reference_candidates());
        assert_eq!(settings.ballot_suffix, "F.pbm");
        assert_eq!(config.ward_rules().unwrap(), WardRules::default());
    }

    #[test]
    fn reads_all_keys() {
        let js = r#"{
            "scaleFactor": 0.25,
            "ignoreLeftMargin": 3,
            "tiltAllowance": 4,
            "expectedVerticalMarks": 10,
            "lowThreshold": 100,
            "highThreshold": 200,
            "ballotSuffix": "F.png",
            "municipality": "Verona",
            "wardUniverse": {"first": 1, "last": 12},
            "candidates": [
                {"name": "yes", "verticalIndex": 2, "horizontalIndex": 1},
                {"name": "no", "verticalIndex": 4, "horizontalIndex": 1}
            ]
        }"#;
        let config: AuditConfig = serde_json::from_str(js).unwrap();
        let settings = config.scan_settings().unwrap();
        assert_eq!(settings.rules.scale_factor, 0.25);
        assert_eq!(settings.rules.ignore_left_margin, 3);
        assert_eq!(settings.rules.ignore_top_margin, 5);
        assert_eq!(settings.rules.expected_vertical_marks, 10);
        assert_eq!(settings.candidate_names(), vec!["yes", "no"]);
        assert_eq!(settings.ballot_suffix, "F.png");
        let th = config.thresholds(None, None).unwrap();
        assert_eq!((th.low(), th.high()), (100, 200));
        let wr = config.ward_rules().unwrap();
        assert_eq!(wr.municipality, "Verona");
        assert_eq!(wr.universe(), 1..=12);
    }

    #[test]
    fn command_line_thresholds_win() {
        let config = AuditConfig {
            low_threshold: Some(100),
            high_threshold: Some(200),
            ..AuditConfig::default()
        };
        let th = config.thresholds(Some(150), None).unwrap();
        assert_eq!((th.low(), th.high()), (150, 200));
        assert!(matches!(
            config.thresholds(Some(300), None),
            Err(AuditError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn thresholds_are_required() {
        let config = AuditConfig::default();
        assert!(matches!(
            config.thresholds(Some(1), None),
            Err(AuditError::MissingThreshold { .. })
        ));
    }

    #[test]
    fn invalid_layouts_are_rejected() {
        let config = AuditConfig {
            expected_vertical_marks: Some(20),
            ..AuditConfig::default()
        };
        // The reference candidates go down to the 34th mark.
        assert!(matches!(
            config.scan_settings(),
            Err(AuditError::InvalidConfig {
                source: ConfigError::SlotOutsideGrid { .. }
            })
        ));
        let config = AuditConfig {
            ward_universe: Some(WardUniverse { first: 5, last: 1 }),
            ..AuditConfig::default()
        };
        assert!(config.ward_rules().is_err());
    }

    #[test]
    fn candidate_named_after_an_outcome() {
        let js = r#"{"candidates": [
            {"name": "clinton", "verticalIndex": 21, "horizontalIndex": 1},
            {"name": "blank", "verticalIndex": 23, "horizontalIndex": 1}
        ]}"#;
        let config: AuditConfig = serde_json::from_str(js).unwrap();
        assert!(matches!(
            config.scan_settings(),
            Err(AuditError::InvalidConfig {
                source: ConfigError::ReservedCandidateName { .. }
            })
        ));
    }

    #[test]
    fn mistyped_values_are_rejected() {
        assert!(serde_json::from_str::<AuditConfig>(r#"{"lowThreshold": "high"}"#).is_err());
        assert!(serde_json::from_str::<AuditConfig>(r#"{"comment": "ok"}"#).is_ok());
    }
}
