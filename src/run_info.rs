use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::domain::{ALL, FlowcellIdentity, LaneSelection, ProjectScope, RunInfoEntry};
use crate::error::DeliveryError;
use crate::lims::LimsClient;

pub const PROJECT_RUN_INFO: &str = "project_run_info.yaml";

pub enum RunInfoSource<'a> {
    File(&'a Utf8Path),
    Lims(&'a dyn LimsClient),
}

pub fn load_run_info(
    source: RunInfoSource<'_>,
    flowcell: &FlowcellIdentity,
) -> Result<Vec<RunInfoEntry>, DeliveryError> {
    match source {
        RunInfoSource::File(path) => {
            info!("reading run information from {path}");
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|_| DeliveryError::RunInfoRead(path.to_path_buf()))?;
            parse_run_info(&content)
        }
        RunInfoSource::Lims(client) => {
            info!("retrieving run information for {} from LIMS", flowcell.name());
            client.run_details(flowcell.name())
        }
    }
}

/// Accepts a plain list of lanes or a mapping carrying them under
/// `details`, the shape the LIMS returns.
pub fn parse_run_info(content: &str) -> Result<Vec<RunInfoEntry>, DeliveryError> {
    let document: Value = serde_yaml::from_str(content)
        .map_err(|err| DeliveryError::RunInfoParse(err.to_string()))?;
    let lanes = match document {
        Value::Mapping(mut map) if map.contains_key("details") => {
            map.remove("details").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_yaml::from_value(lanes).map_err(|err| DeliveryError::RunInfoParse(err.to_string()))
}

/// Restricts run information to the lanes, or multiplexed samples, that
/// belong to the project.
pub fn prune(
    entries: &[RunInfoEntry],
    scope: &ProjectScope,
) -> Result<Vec<RunInfoEntry>, DeliveryError> {
    if scope.is_empty() {
        return Err(DeliveryError::MissingScope);
    }

    let keep_all = scope.description.as_deref() == Some(ALL)
        || matches!(scope.lanes, Some(LaneSelection::All));
    let pruned: Vec<RunInfoEntry> = if keep_all {
        entries.to_vec()
    } else if let Some(lanes) = &scope.lanes {
        entries
            .iter()
            .filter(|entry| lanes.contains(entry.lane))
            .cloned()
            .collect()
    } else {
        let description = scope.description.as_deref().unwrap_or_default();
        entries
            .iter()
            .filter_map(|entry| prune_by_description(entry, description))
            .collect()
    };

    if pruned.is_empty() {
        return Err(DeliveryError::EmptySelection(scope.label()));
    }
    debug!(
        "kept lanes {:?} of {}",
        pruned.iter().map(|entry| entry.lane).collect::<Vec<_>>(),
        entries.len()
    );
    Ok(pruned)
}

fn prune_by_description(entry: &RunInfoEntry, description: &str) -> Option<RunInfoEntry> {
    if entry.description == description {
        return Some(entry.clone());
    }
    let barcodes = entry.multiplex.as_ref()?;
    let matching = barcodes
        .iter()
        .filter(|barcode| barcode.description.as_deref() == Some(description))
        .cloned()
        .collect::<Vec<_>>();
    if matching.is_empty() {
        return None;
    }
    let mut lane = entry.clone();
    lane.multiplex = Some(matching);
    Some(lane)
}

pub fn to_yaml(entries: &[RunInfoEntry]) -> Result<String, DeliveryError> {
    serde_yaml::to_string(entries).map_err(|err| DeliveryError::RunInfoParse(err.to_string()))
}

/// Writes `project_run_info.yaml` into `outdir`, replacing the file in one
/// rename.
pub fn save_run_info(
    entries: &[RunInfoEntry],
    outdir: &Utf8Path,
) -> Result<Utf8PathBuf, DeliveryError> {
    let content = to_yaml(entries)?;
    let outfile = outdir.join(PROJECT_RUN_INFO);
    let mut temp = NamedTempFile::new_in(outdir.as_std_path())
        .map_err(|err| DeliveryError::Filesystem(format!("create temp in {outdir}: {err}")))?;
    temp.write_all(content.as_bytes())
        .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
    temp.persist(outfile.as_std_path())
        .map_err(|err| DeliveryError::Filesystem(err.to_string()))?;
    info!("wrote pruned run information to {outfile}");
    Ok(outfile)
}
