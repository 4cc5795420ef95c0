use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DeliveryError {
    #[error("did not find flowcell name: {0}")]
    #[diagnostic(help("flowcell directories look like <YYMMDD>_<instrument>_<run>_<flowcell>XX"))]
    FlowcellName(String),

    #[error(
        "no project description or lanes provided: cannot deliver files without this information"
    )]
    MissingScope,

    #[error(
        "no lanes found with matching description {0}: please check your flowcell run information"
    )]
    EmptySelection(String),

    #[error("invalid lane list: {0}")]
    InvalidLanes(String),

    #[error("missing config file {0}")]
    MissingConfig(Utf8PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse YAML config: {0}")]
    ConfigParse(String),

    #[error("config key `{0}` is required to query the sequencing LIMS")]
    MissingConfigKey(&'static str),

    #[error("failed to read run information at {0}")]
    RunInfoRead(Utf8PathBuf),

    #[error("failed to parse run information: {0}")]
    RunInfoParse(String),

    #[error("LIMS request failed: {0}")]
    LimsHttp(String),

    #[error("LIMS returned status {status}: {message}")]
    LimsStatus { status: u16, message: String },

    #[error("problem retrieving info: {0}")]
    Remote(String),

    #[error("did not find correct fastq files for lane {lane} in {dir}: found {found}")]
    FastqNotFound {
        lane: u32,
        dir: Utf8PathBuf,
        found: usize,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(String),
}

impl DeliveryError {
    /// Project scoping failures end the run quietly after being logged.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DeliveryError::MissingScope | DeliveryError::EmptySelection(_)
        )
    }
}
