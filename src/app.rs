use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, error, info};

use crate::deliver::{
    Deliverer, DeliveryOptions, DeliveryPaths, DeliveryReport, DeliverySink, TransferOutcome,
};
use crate::domain::{FlowcellIdentity, ProjectScope, RunInfoEntry};
use crate::error::DeliveryError;
use crate::fastq::{self, FastqLocator};
use crate::layout::FlowcellLayout;
use crate::run_info::{self, RunInfoSource};

#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub fc_dir: Utf8PathBuf,
    pub project_dir: Utf8PathBuf,
    pub data_prefix: Option<String>,
    pub flowcell_alias: Option<String>,
    pub scope: ProjectScope,
    pub options: DeliveryOptions,
    pub only_run_info: bool,
}

pub struct App<F: FastqLocator> {
    locator: F,
}

impl<F: FastqLocator> App<F> {
    pub fn new(locator: F) -> Self {
        Self { locator }
    }

    pub fn run(
        &self,
        request: &DeliveryRequest,
        source: RunInfoSource<'_>,
        sink: &dyn DeliverySink,
    ) -> Result<DeliveryReport, DeliveryError> {
        ensure_scope(&request.scope)?;

        let fc_dir = request.fc_dir.components().collect::<Utf8PathBuf>();
        let dir_identity = FlowcellIdentity::from_dir(&fc_dir)?;
        let layout = FlowcellLayout::resolve(&fc_dir)?;
        debug!(
            "flowcell layout {:?}; base calls in {}",
            layout.kind(),
            layout.basecall_dir()
        );
        let fastq_dir = layout.fastq_dir();

        let entries = run_info::load_run_info(source, &dir_identity)?;
        let selected = run_info::prune(&entries, &request.scope).inspect_err(|err| {
            if err.is_scope() {
                error!("{err}");
            }
        })?;

        let flowcell = identify_flowcell(&selected, &fc_dir, &fastq_dir)?;
        match flowcell.run_date() {
            Some(date) => info!("delivering flowcell {} run on {date}", flowcell.name()),
            None => info!("delivering flowcell {}", flowcell.name()),
        }

        let paths = DeliveryPaths::new(
            &fc_dir,
            &fastq_dir,
            &request.project_dir,
            request.data_prefix.as_deref(),
            request.flowcell_alias.as_deref(),
            &flowcell,
        );
        let deliverer = Deliverer::new(&self.locator, &flowcell, &paths, request.options, sink);

        let mut report = DeliveryReport::default();
        deliverer.prepare(&mut report)?;
        deliverer.install_run_info(&selected, &mut report)?;
        if request.only_run_info {
            info!("only installing run information; skipping data delivery");
            return Ok(report);
        }
        deliverer.deliver(&selected, &mut report)?;

        info!(
            "delivered {} lanes: {} transferred, {} skipped, {} planned",
            selected.len(),
            report.count(TransferOutcome::Done),
            report.count(TransferOutcome::Skipped),
            report.count(TransferOutcome::Planned)
        );
        Ok(report)
    }
}

/// Deliveries need a project description or a lane list.
pub fn ensure_scope(scope: &ProjectScope) -> Result<(), DeliveryError> {
    if scope.is_empty() {
        let err = DeliveryError::MissingScope;
        error!("{err}");
        return Err(err);
    }
    Ok(())
}

/// Flowcell identity for delivery naming. Fastq file names of the selected
/// lanes take precedence over the directory name, which must parse either way.
pub fn identify_flowcell(
    entries: &[RunInfoEntry],
    fc_dir: &Utf8Path,
    fastq_dir: &Utf8Path,
) -> Result<FlowcellIdentity, DeliveryError> {
    let from_dir = FlowcellIdentity::from_dir(fc_dir)?;
    let Some(file) = fastq::first_lane_fastq(entries, fastq_dir)? else {
        return Ok(from_dir);
    };
    let name = file.file_name().unwrap_or(file.as_str());
    match name.parse::<FlowcellIdentity>() {
        Ok(identity) => Ok(identity),
        Err(_) => {
            debug!("fastq name {name} carries no flowcell id; using {from_dir}");
            Ok(from_dir)
        }
    }
}
