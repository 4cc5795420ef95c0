use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use flowcell_delivery::app::{App, DeliveryRequest, identify_flowcell};
use flowcell_delivery::deliver::{DeliveryEvent, DeliveryOptions, DeliverySink, TransferOutcome};
use flowcell_delivery::domain::{LaneSelection, ProjectScope, RunInfoEntry};
use flowcell_delivery::error::DeliveryError;
use flowcell_delivery::fastq::GlobFastqLocator;
use flowcell_delivery::lims::LimsClient;
use flowcell_delivery::run_info::{RunInfoSource, parse_run_info};

const RUN_INFO: &str = "\
- lane: 1
  description: ProjectA
  genome_build: hg19
- lane: 2
  description: Lab mix
  multiplex:
    - barcode_id: 4
      name: sampleB
      sequence: ACGTAC
      description: ProjectB
    - barcode_id: 5
      name: sampleC
      sequence: TTGGCC
      description: ProjectC
- lane: 3
  description: ProjectC
";

struct NoopSink;

impl DeliverySink for NoopSink {
    fn event(&self, _event: DeliveryEvent) {}
}

struct MockLims {
    calls: Mutex<Vec<String>>,
}

impl LimsClient for MockLims {
    fn run_details(&self, run_id: &str) -> Result<Vec<RunInfoEntry>, DeliveryError> {
        self.calls.lock().unwrap().push(run_id.to_string());
        parse_run_info(RUN_INFO)
    }
}

struct FailingLims;

impl LimsClient for FailingLims {
    fn run_details(&self, _run_id: &str) -> Result<Vec<RunInfoEntry>, DeliveryError> {
        Err(DeliveryError::Remote("unknown run".to_string()))
    }
}

struct Fixture {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
    fc_dir: Utf8PathBuf,
    project_dir: Utf8PathBuf,
    run_info: Utf8PathBuf,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let fc_dir = root.join("110215_SN174_0025_AB0023XX");
    let fastq_dir = fc_dir.join("Data/Intensities/BaseCalls/fastq");
    fs::create_dir_all(&fastq_dir).unwrap();
    fs::write(fastq_dir.join("1_110215_AB0023XX_1_fastq.txt"), b"@r1\n").unwrap();
    fs::write(fastq_dir.join("1_110215_AB0023XX_2_fastq.txt"), b"@r2\n").unwrap();
    let bc_dir = fastq_dir.join("2_110215_AB0023XX_barcode");
    fs::create_dir_all(&bc_dir).unwrap();
    fs::write(bc_dir.join("2_110215_AB0023XX_4_1_fastq.txt"), b"@b4\n").unwrap();
    fs::write(bc_dir.join("2_110215_AB0023XX_5_1_fastq.txt"), b"@b5\n").unwrap();
    fs::write(fc_dir.join("1_110215_AB0023XX-sort.bam"), b"bam").unwrap();

    let run_info = root.join("run_info.yaml");
    fs::write(&run_info, RUN_INFO).unwrap();

    Fixture {
        project_dir: root.join("project"),
        _temp: temp,
        root,
        fc_dir,
        run_info,
    }
}

fn request(fx: &Fixture, scope: ProjectScope) -> DeliveryRequest {
    DeliveryRequest {
        fc_dir: Utf8PathBuf::from(format!("{}/", fx.fc_dir)),
        project_dir: fx.project_dir.clone(),
        data_prefix: Some("data".to_string()),
        flowcell_alias: None,
        scope,
        options: DeliveryOptions::default(),
        only_run_info: false,
    }
}

fn by_description(description: &str) -> ProjectScope {
    ProjectScope {
        description: Some(description.to_string()),
        lanes: None,
    }
}

#[test]
fn delivers_project_lane_from_basecalls_layout() {
    let fx = fixture();
    let app = App::new(GlobFastqLocator);
    let report = app
        .run(
            &request(&fx, by_description("ProjectA")),
            RunInfoSource::File(&fx.run_info),
            &NoopSink,
        )
        .unwrap();

    let data_dir = fx.project_dir.join("data/110215_AB0023XX");
    assert!(data_dir
        .join("1_110215_AB0023XX_barcode/1_110215_AB0023XX_2_fastq.txt")
        .is_file());
    assert!(data_dir.join("1_110215_AB0023XX-sort.bam").is_file());
    assert!(!data_dir.join("2_110215_AB0023XX_barcode").exists());

    let saved = fs::read_to_string(data_dir.join("project_run_info.yaml")).unwrap();
    let lanes = parse_run_info(&saved).unwrap();
    assert_eq!(lanes.len(), 1);
    assert_eq!(lanes[0].genome_build.as_deref(), Some("hg19"));
    assert_eq!(report.count(TransferOutcome::Done), 3);
}

#[test]
fn sample_description_selects_barcodes() {
    let fx = fixture();
    let app = App::new(GlobFastqLocator);
    app.run(
        &request(&fx, by_description("ProjectB")),
        RunInfoSource::File(&fx.run_info),
        &NoopSink,
    )
    .unwrap();

    let bc_dir = fx
        .project_dir
        .join("data/110215_AB0023XX/2_110215_AB0023XX_barcode");
    assert!(bc_dir.join("2_110215_AB0023XX_4_1_fastq.txt").is_file());
    assert!(!bc_dir.join("2_110215_AB0023XX_5_1_fastq.txt").exists());
}

#[test]
fn run_info_from_lims_uses_flowcell_name() {
    let fx = fixture();
    let lims = MockLims {
        calls: Mutex::new(Vec::new()),
    };
    let mut req = request(&fx, ProjectScope {
        description: None,
        lanes: Some(LaneSelection::Lanes(vec![1])),
    });
    req.only_run_info = true;

    let report = App::new(GlobFastqLocator)
        .run(&req, RunInfoSource::Lims(&lims), &NoopSink)
        .unwrap();

    assert_eq!(*lims.calls.lock().unwrap(), vec!["AB0023XX".to_string()]);
    assert!(report.transfers.is_empty());
    assert_eq!(
        report.run_info,
        Some(
            fx.project_dir
                .join("data/110215_AB0023XX/project_run_info.yaml")
        )
    );
    assert!(!fx
        .project_dir
        .join("data/110215_AB0023XX/1_110215_AB0023XX_barcode")
        .exists());
}

#[test]
fn missing_scope_is_rejected() {
    let fx = fixture();
    let err = App::new(GlobFastqLocator)
        .run(
            &request(&fx, ProjectScope::default()),
            RunInfoSource::File(&fx.run_info),
            &NoopSink,
        )
        .unwrap_err();
    assert_matches!(err, DeliveryError::MissingScope);
    assert!(err.is_scope());
    assert!(!fx.project_dir.exists());
}

#[test]
fn unmatched_description_is_rejected() {
    let fx = fixture();
    let err = App::new(GlobFastqLocator)
        .run(
            &request(&fx, by_description("NoSuchProject")),
            RunInfoSource::File(&fx.run_info),
            &NoopSink,
        )
        .unwrap_err();
    assert_matches!(err, DeliveryError::EmptySelection(desc) if desc == "NoSuchProject");
    assert!(!fx.project_dir.exists());
}

#[test]
fn unparsable_flowcell_dir_is_fatal() {
    let fx = fixture();
    let mut req = request(&fx, by_description("ALL"));
    req.fc_dir = fx.root.join("not_a_flowcell");
    fs::create_dir_all(&req.fc_dir).unwrap();

    let err = App::new(GlobFastqLocator)
        .run(&req, RunInfoSource::File(&fx.run_info), &NoopSink)
        .unwrap_err();
    assert_matches!(err, DeliveryError::FlowcellName(name) if name == "not_a_flowcell");
}

#[test]
fn remote_error_propagates() {
    let fx = fixture();
    let err = App::new(GlobFastqLocator)
        .run(
            &request(&fx, by_description("ProjectA")),
            RunInfoSource::Lims(&FailingLims),
            &NoopSink,
        )
        .unwrap_err();
    assert_matches!(err, DeliveryError::Remote(_));
}

#[test]
fn missing_fastq_aborts_delivery() {
    let fx = fixture();
    let err = App::new(GlobFastqLocator)
        .run(
            &request(&fx, by_description("ProjectC")),
            RunInfoSource::File(&fx.run_info),
            &NoopSink,
        )
        .unwrap_err();
    assert_matches!(err, DeliveryError::FastqNotFound { lane: 3, .. });
}

#[test]
fn flowcell_identity_prefers_fastq_names() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let fc_dir = root.join("110215_SN174_0025_AB0023XX");
    fs::create_dir_all(&fc_dir).unwrap();
    fs::write(fc_dir.join("1_110216_AB0023XX_1_fastq.txt"), b"").unwrap();

    let entries = vec![RunInfoEntry::new(1, "ProjectA")];
    let identity = identify_flowcell(&entries, &fc_dir, &fc_dir).unwrap();
    assert_eq!(identity.date(), "110216");

    let other = vec![RunInfoEntry::new(2, "ProjectA")];
    let identity = identify_flowcell(&other, &fc_dir, &fc_dir).unwrap();
    assert_eq!(identity.date(), "110215");
}
