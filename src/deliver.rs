use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::domain::{FlowcellIdentity, RunInfoEntry};
use crate::error::DeliveryError;
use crate::fastq::{FastqLocator, FastqPair};
use crate::fs_util;
use crate::run_info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub move_data: bool,
    pub dry_run: bool,
    pub only_fastq: bool,
}

/// Source and destination directories of one flowcell delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPaths {
    pub fc_dir: Utf8PathBuf,
    pub fastq_dir: Utf8PathBuf,
    pub project_dir: Utf8PathBuf,
    pub fc_alias: String,
    pub fc_delivery_dir: Utf8PathBuf,
    pub data_delivery_dir: Utf8PathBuf,
}

impl DeliveryPaths {
    pub fn new(
        fc_dir: &Utf8Path,
        fastq_dir: &Utf8Path,
        project_dir: &Utf8Path,
        data_prefix: Option<&str>,
        fc_alias: Option<&str>,
        flowcell: &FlowcellIdentity,
    ) -> Self {
        let delivery_root = match data_prefix.filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => project_dir.join(prefix),
            None => project_dir.to_path_buf(),
        };
        let fc_alias = fc_alias
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| flowcell.dir_name());
        Self {
            fc_dir: fc_dir.to_path_buf(),
            fastq_dir: fastq_dir.to_path_buf(),
            project_dir: project_dir.to_path_buf(),
            fc_delivery_dir: delivery_root.join(&fc_alias),
            data_delivery_dir: delivery_root.join(flowcell.dir_name()),
            fc_alias,
        }
    }

    /// True when the alias names a link next to the data directory rather
    /// than the data directory itself.
    pub fn has_alias_link(&self) -> bool {
        self.data_delivery_dir.file_name() != Some(self.fc_alias.as_str())
    }

    pub fn fc_bc_dir(&self, flowcell: &FlowcellIdentity, lane: u32) -> Utf8PathBuf {
        self.data_delivery_dir.join(flowcell.barcode_dir_name(lane))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    CopyTree,
    Move,
    Symlink,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Copy => "copyfile",
            TransferMode::CopyTree => "copytree",
            TransferMode::Move => "move",
            TransferMode::Symlink => "symlink",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOp {
    pub source: Utf8PathBuf,
    pub target: Utf8PathBuf,
    pub mode: TransferMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Done,
    /// The target already existed and was left untouched.
    Skipped,
    /// Dry run; nothing was written.
    Planned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub op: TransferOp,
    pub outcome: TransferOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub created_dirs: Vec<Utf8PathBuf>,
    pub transfers: Vec<TransferRecord>,
    pub run_info: Option<Utf8PathBuf>,
}

impl DeliveryReport {
    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.transfers
            .iter()
            .filter(|record| record.outcome == outcome)
            .count()
    }
}

#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    Directory { label: String, path: Utf8PathBuf },
    Transfer(TransferOp),
    RunInfo { path: Utf8PathBuf, yaml: String },
}

/// Receives the operations a dry run would have performed.
pub trait DeliverySink {
    fn event(&self, event: DeliveryEvent);
}

pub struct Deliverer<'a, F: FastqLocator> {
    locator: &'a F,
    flowcell: &'a FlowcellIdentity,
    paths: &'a DeliveryPaths,
    options: DeliveryOptions,
    sink: &'a dyn DeliverySink,
}

impl<'a, F: FastqLocator> Deliverer<'a, F> {
    pub fn new(
        locator: &'a F,
        flowcell: &'a FlowcellIdentity,
        paths: &'a DeliveryPaths,
        options: DeliveryOptions,
        sink: &'a dyn DeliverySink,
    ) -> Self {
        Self {
            locator,
            flowcell,
            paths,
            options,
            sink,
        }
    }

    /// Creates the flowcell delivery directories and the alias link.
    pub fn prepare(&self, report: &mut DeliveryReport) -> Result<(), DeliveryError> {
        if self.paths.has_alias_link() {
            self.make_dir(&self.paths.data_delivery_dir, "data delivery", report)?;
            let source = self
                .paths
                .data_delivery_dir
                .file_name()
                .map(Utf8PathBuf::from)
                .unwrap_or_else(|| self.paths.data_delivery_dir.clone());
            self.transfer(
                TransferOp {
                    source,
                    target: self.paths.fc_delivery_dir.clone(),
                    mode: TransferMode::Symlink,
                },
                report,
            )
        } else {
            self.make_dir(&self.paths.fc_delivery_dir, "flowcell delivery", report)
        }
    }

    pub fn install_run_info(
        &self,
        entries: &[RunInfoEntry],
        report: &mut DeliveryReport,
    ) -> Result<(), DeliveryError> {
        let path = self.paths.fc_delivery_dir.join(run_info::PROJECT_RUN_INFO);
        if self.options.dry_run {
            let yaml = run_info::to_yaml(entries)?;
            self.sink.event(DeliveryEvent::RunInfo { path, yaml });
            return Ok(());
        }
        report.run_info = Some(run_info::save_run_info(
            entries,
            &self.paths.fc_delivery_dir,
        )?);
        Ok(())
    }

    pub fn deliver(
        &self,
        entries: &[RunInfoEntry],
        report: &mut DeliveryReport,
    ) -> Result<(), DeliveryError> {
        for entry in entries {
            self.deliver_lane(entry, report)?;
        }
        Ok(())
    }

    fn deliver_lane(
        &self,
        entry: &RunInfoEntry,
        report: &mut DeliveryReport,
    ) -> Result<(), DeliveryError> {
        info!(
            "Processing sample: {}; lane {}; reference genome {}",
            entry.description,
            entry.lane,
            entry.genome_build.as_deref().unwrap_or("None")
        );
        if let Some(multiplex) = entry.multiplex.as_ref().filter(|_| entry.is_multiplexed()) {
            let ids = multiplex
                .iter()
                .map(|barcode| barcode.barcode_id.as_str())
                .collect::<Vec<_>>();
            debug!(
                "Sample {} is multiplexed as: {}",
                entry.description,
                ids.join(",")
            );
        }

        let pairs = self
            .locator
            .barcoded_fastq(entry, &self.paths.fastq_dir, self.flowcell)?;

        let fc_bc_dir = self.paths.fc_bc_dir(self.flowcell, entry.lane);
        self.make_dir(&fc_bc_dir, "fastq.txt barcode", report)?;

        if !self.options.only_fastq {
            self.deliver_analysis_results(entry.lane, &pairs, report)?;
        }

        for pair in &pairs {
            for source in pair.files() {
                let Some(name) = source.file_name() else {
                    continue;
                };
                let op = TransferOp {
                    source: source.clone(),
                    target: fc_bc_dir.join(name),
                    mode: self.file_mode(source),
                };
                self.transfer(op, report)?;
            }
        }
        Ok(())
    }

    fn deliver_analysis_results(
        &self,
        lane: u32,
        fastq: &[FastqPair],
        report: &mut DeliveryReport,
    ) -> Result<(), DeliveryError> {
        let prefix = self.flowcell.lane_prefix(lane);
        // Fastq files go to the barcode directory only.
        let data = fs_util::glob_in(&self.paths.fc_dir, &format!("{prefix}*.*"))?
            .into_iter()
            .filter(|path| !fastq.iter().any(|pair| pair.files().any(|file| file == path)))
            .collect::<Vec<_>>();
        let fastqc = fs_util::glob_in(&self.paths.fc_dir.join("fastqc"), &format!("{prefix}*"))?;
        debug!(
            "lane {lane}: {} analysis files, {} fastqc results",
            data.len(),
            fastqc.len()
        );

        let outdir = &self.paths.data_delivery_dir;
        for source in data {
            if let Some(name) = source.file_name() {
                let target = outdir.join(name);
                let mode = self.file_mode(&source);
                self.transfer(TransferOp { source, target, mode }, report)?;
            }
        }
        for source in fastqc {
            if let Some(name) = source.file_name() {
                let target = outdir.join("fastqc").join(name);
                let mode = self.file_mode(&source);
                self.transfer(TransferOp { source, target, mode }, report)?;
            }
        }
        Ok(())
    }

    fn file_mode(&self, source: &Utf8Path) -> TransferMode {
        if self.options.move_data {
            TransferMode::Move
        } else if source.is_dir() {
            TransferMode::CopyTree
        } else {
            TransferMode::Copy
        }
    }

    fn make_dir(
        &self,
        dir: &Utf8Path,
        label: &str,
        report: &mut DeliveryReport,
    ) -> Result<(), DeliveryError> {
        if fs_util::path_exists(dir) {
            warn!("{dir} already exists: not creating new directory");
            return Ok(());
        }
        if self.options.dry_run {
            self.sink.event(DeliveryEvent::Directory {
                label: label.to_string(),
                path: dir.to_path_buf(),
            });
            return Ok(());
        }
        fs_util::create_dir(dir)?;
        info!("Creating {label} directory {dir}");
        report.created_dirs.push(dir.to_path_buf());
        Ok(())
    }

    fn transfer(&self, op: TransferOp, report: &mut DeliveryReport) -> Result<(), DeliveryError> {
        if fs_util::path_exists(&op.target) {
            warn!("{} already exists: not doing anything!", op.target);
            report.transfers.push(TransferRecord {
                op,
                outcome: TransferOutcome::Skipped,
            });
            return Ok(());
        }
        if self.options.dry_run {
            self.sink.event(DeliveryEvent::Transfer(op.clone()));
            report.transfers.push(TransferRecord {
                op,
                outcome: TransferOutcome::Planned,
            });
            return Ok(());
        }

        info!("{} file {} to {}", op.mode, op.source, op.target);
        match op.mode {
            TransferMode::Copy => fs_util::copy_file(&op.source, &op.target)?,
            TransferMode::CopyTree => fs_util::copy_tree(&op.source, &op.target)?,
            TransferMode::Move => fs_util::move_path(&op.source, &op.target)?,
            TransferMode::Symlink => fs_util::symlink(&op.source, &op.target)?,
        }
        report.transfers.push(TransferRecord {
            op,
            outcome: TransferOutcome::Done,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alias_is_data_directory() {
        let flowcell = FlowcellIdentity::new("AB0023XX", "110215");
        let paths = DeliveryPaths::new(
            Utf8Path::new("/runs/110215_AB0023XX"),
            Utf8Path::new("/runs/110215_AB0023XX"),
            Utf8Path::new("/projects/p1"),
            None,
            None,
            &flowcell,
        );
        assert_eq!(paths.fc_alias, "110215_AB0023XX");
        assert_eq!(paths.fc_delivery_dir, paths.data_delivery_dir);
        assert!(!paths.has_alias_link());
        assert_eq!(
            paths.fc_bc_dir(&flowcell, 2),
            Utf8PathBuf::from("/projects/p1/110215_AB0023XX/2_110215_AB0023XX_barcode")
        );
    }

    #[test]
    fn prefix_and_alias() {
        let flowcell = FlowcellIdentity::new("AB0023XX", "110215");
        let paths = DeliveryPaths::new(
            Utf8Path::new("/runs/fc"),
            Utf8Path::new("/runs/fc"),
            Utf8Path::new("/projects/p1"),
            Some("data"),
            Some("run_A"),
            &flowcell,
        );
        assert_eq!(
            paths.fc_delivery_dir,
            Utf8PathBuf::from("/projects/p1/data/run_A")
        );
        assert_eq!(
            paths.data_delivery_dir,
            Utf8PathBuf::from("/projects/p1/data/110215_AB0023XX")
        );
        assert!(paths.has_alias_link());
    }

    #[test]
    fn transfer_mode_names() {
        assert_eq!(TransferMode::Copy.to_string(), "copyfile");
        assert_eq!(TransferMode::Symlink.as_str(), "symlink");
    }
}
