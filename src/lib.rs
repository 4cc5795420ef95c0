pub mod app;
pub mod config;
pub mod deliver;
pub mod domain;
pub mod error;
pub mod fastq;
pub mod fs_util;
pub mod layout;
pub mod lims;
pub mod output;
pub mod run_info;
