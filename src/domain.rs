use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

pub const ALL: &str = "ALL";

/// Flowcell name and run date as encoded in instrument directory names,
/// e.g. `110215_SN123_0042_AB0023XX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowcellIdentity {
    name: String,
    date: String,
}

impl FlowcellIdentity {
    pub fn new(name: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
        }
    }

    /// Parses the final segment of `path`.
    pub fn from_dir(path: &Utf8Path) -> Result<Self, DeliveryError> {
        let segment = path.file_name().unwrap_or(path.as_str());
        segment.parse()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn run_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%y%m%d").ok()
    }

    /// `<date>_<name>`, the default delivery directory name.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.date, self.name)
    }

    /// `<lane>_<date>_<name>`, the prefix shared by every per-lane output.
    pub fn lane_prefix(&self, lane: u32) -> String {
        format!("{lane}_{}_{}", self.date, self.name)
    }

    pub fn barcode_dir_name(&self, lane: u32) -> String {
        format!("{}_barcode", self.lane_prefix(lane))
    }
}

impl fmt::Display for FlowcellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

impl FromStr for FlowcellIdentity {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut name = None;
        let mut date = None;
        // Every qualifying name token overwrites the previous one; the
        // date keeps the last six digit token in the same way.
        for token in value.split('_') {
            if token.ends_with("XX") || token.ends_with("xx") {
                name = Some(token);
            } else if token.len() == 6 && token.bytes().all(|b| b.is_ascii_digit()) {
                date = Some(token);
            }
        }
        match (name, date) {
            (Some(name), Some(date)) => Ok(Self::new(name, date)),
            _ => Err(DeliveryError::FlowcellName(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeDescriptor {
    #[serde(deserialize_with = "deserialize_text")]
    pub barcode_id: String,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub barcode_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// One lane of a run-information document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfoEntry {
    #[serde(deserialize_with = "deserialize_lane")]
    pub lane: u32,
    #[serde(default, deserialize_with = "deserialize_description")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub genome_build: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub researcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplex: Option<Vec<BarcodeDescriptor>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl RunInfoEntry {
    pub fn new(lane: u32, description: impl Into<String>) -> Self {
        Self {
            lane,
            description: description.into(),
            name: None,
            genome_build: None,
            analysis: None,
            researcher: None,
            multiplex: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        self.multiplex
            .as_ref()
            .map(|barcodes| !barcodes.is_empty())
            .unwrap_or(false)
    }
}

/// Scalars that LIMS exports and hand-written run info use interchangeably
/// for ids and names.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl NumberOrText {
    fn into_text(self) -> String {
        match self {
            NumberOrText::Integer(value) => value.to_string(),
            NumberOrText::Float(value) => value.to_string(),
            NumberOrText::Bool(value) => value.to_string(),
            NumberOrText::Text(value) => value,
        }
    }
}

fn deserialize_lane<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Integer(value) => u32::try_from(value).map_err(de::Error::custom),
        other => {
            let value = other.into_text();
            value
                .trim()
                .parse()
                .map_err(|_| de::Error::custom(format!("invalid lane number: {value}")))
        }
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(NumberOrText::deserialize(deserializer)?.into_text())
}

fn deserialize_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumberOrText>::deserialize(deserializer)?.map(NumberOrText::into_text))
}

fn deserialize_description<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_opt_text(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneSelection {
    All,
    Lanes(Vec<u32>),
}

impl LaneSelection {
    pub fn contains(&self, lane: u32) -> bool {
        match self {
            LaneSelection::All => true,
            LaneSelection::Lanes(lanes) => lanes.contains(&lane),
        }
    }
}

impl FromStr for LaneSelection {
    type Err = DeliveryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed == ALL {
            return Ok(LaneSelection::All);
        }
        let lanes = trimmed
            .split(',')
            .map(|token| {
                token
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| DeliveryError::InvalidLanes(value.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LaneSelection::Lanes(lanes))
    }
}

/// Which part of a run belongs to the project being delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectScope {
    pub description: Option<String>,
    pub lanes: Option<LaneSelection>,
}

impl ProjectScope {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.lanes.is_none()
    }

    pub fn label(&self) -> String {
        match (&self.description, &self.lanes) {
            (Some(description), _) => description.clone(),
            (None, Some(LaneSelection::All)) => ALL.to_string(),
            (None, Some(LaneSelection::Lanes(lanes))) => lanes
                .iter()
                .map(|lane| lane.to_string())
                .collect::<Vec<_>>()
                .join(","),
            (None, None) => String::new(),
        }
    }
}
