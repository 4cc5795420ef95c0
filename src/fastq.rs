use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::{FlowcellIdentity, RunInfoEntry};
use crate::error::DeliveryError;
use crate::fs_util;

/// Single-end or paired fastq files of one lane or barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqPair {
    pub first: Utf8PathBuf,
    pub second: Option<Utf8PathBuf>,
}

impl FastqPair {
    pub fn files(&self) -> impl Iterator<Item = &Utf8PathBuf> {
        std::iter::once(&self.first).chain(self.second.as_ref())
    }
}

pub trait FastqLocator {
    fn barcoded_fastq(
        &self,
        entry: &RunInfoEntry,
        fastq_dir: &Utf8Path,
        flowcell: &FlowcellIdentity,
    ) -> Result<Vec<FastqPair>, DeliveryError>;
}

/// Finds `<lane>_<date>_<flowcell>[_<barcode>]_<read>_fastq.txt` files as
/// written by the demultiplexing step.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobFastqLocator;

impl FastqLocator for GlobFastqLocator {
    fn barcoded_fastq(
        &self,
        entry: &RunInfoEntry,
        fastq_dir: &Utf8Path,
        flowcell: &FlowcellIdentity,
    ) -> Result<Vec<FastqPair>, DeliveryError> {
        match entry.multiplex.as_deref() {
            // An empty barcode list yields no fastq files.
            Some(barcodes) => {
                let bc_dir = fastq_dir.join(flowcell.barcode_dir_name(entry.lane));
                barcodes
                    .iter()
                    .map(|barcode| {
                        let pattern = format!(
                            "{}_*{}_{}_*fastq.txt",
                            entry.lane,
                            flowcell.name(),
                            barcode.barcode_id
                        );
                        fastq_files(&bc_dir, &pattern, entry.lane)
                    })
                    .collect()
            }
            None => {
                let pattern = format!("{}_*{}*_fastq.txt", entry.lane, flowcell.name());
                Ok(vec![fastq_files(fastq_dir, &pattern, entry.lane)?])
            }
        }
    }
}

fn fastq_files(dir: &Utf8Path, pattern: &str, lane: u32) -> Result<FastqPair, DeliveryError> {
    let mut files = fs_util::glob_in(dir, pattern)?.into_iter();
    debug!("fastq lookup {dir}/{pattern}");
    match (files.next(), files.next(), files.next()) {
        (Some(first), second, None) => Ok(FastqPair { first, second }),
        (first, second, third) => {
            let found = [first, second, third].iter().flatten().count() + files.count();
            Err(DeliveryError::FastqNotFound {
                lane,
                dir: dir.to_path_buf(),
                found,
            })
        }
    }
}

/// First `<lane>_*_fastq.txt` of the last lane in `entries`, whose name
/// carries the flowcell identity.
pub fn first_lane_fastq(
    entries: &[RunInfoEntry],
    fastq_dir: &Utf8Path,
) -> Result<Option<Utf8PathBuf>, DeliveryError> {
    let Some(entry) = entries.last() else {
        return Ok(None);
    };
    let pattern = format!("{}_*_fastq.txt", entry.lane);
    Ok(fs_util::glob_in(fastq_dir, &pattern)?.into_iter().next())
}
