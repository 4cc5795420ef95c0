use camino::{Utf8Path, Utf8PathBuf};

use crate::error::DeliveryError;
use crate::fs_util;

/// Where an instrument software generation left its base calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutKind {
    /// `Data/Intensities/BaseCalls` (RTA based pipelines).
    BaseCalls(Utf8PathBuf),
    /// `Data/*Firecrest*/Bustard*` (GA pipeline with off-instrument image analysis).
    Firecrest(Utf8PathBuf),
    /// `Data/Intensities/*Bustard*`.
    Bustard(Utf8PathBuf),
    /// Nothing recognised; the flowcell root already is the output directory.
    Flat,
}

#[derive(Debug, Clone)]
pub struct FlowcellLayout {
    root: Utf8PathBuf,
    kind: LayoutKind,
}

impl FlowcellLayout {
    pub fn resolve(root: &Utf8Path) -> Result<Self, DeliveryError> {
        let kind = detect(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            kind,
        })
    }

    pub fn kind(&self) -> &LayoutKind {
        &self.kind
    }

    pub fn basecall_dir(&self) -> Utf8PathBuf {
        match &self.kind {
            LayoutKind::BaseCalls(dir) => dir.clone(),
            _ => self.root.clone(),
        }
    }

    pub fn fastq_dir(&self) -> Utf8PathBuf {
        match &self.kind {
            LayoutKind::BaseCalls(dir) | LayoutKind::Firecrest(dir) | LayoutKind::Bustard(dir) => {
                dir.join("fastq")
            }
            LayoutKind::Flat => self.root.clone(),
        }
    }
}

pub fn resolve_basecall_dir(root: &Utf8Path) -> Result<Utf8PathBuf, DeliveryError> {
    Ok(FlowcellLayout::resolve(root)?.basecall_dir())
}

pub fn resolve_fastq_dir(root: &Utf8Path) -> Result<Utf8PathBuf, DeliveryError> {
    Ok(FlowcellLayout::resolve(root)?.fastq_dir())
}

fn detect(root: &Utf8Path) -> Result<LayoutKind, DeliveryError> {
    let machine_bc = root.join("Data").join("Intensities").join("BaseCalls");
    if machine_bc.exists() {
        return Ok(LayoutKind::BaseCalls(machine_bc));
    }
    if let Some(dir) = fs_util::glob_in(root, "Data/*Firecrest*/Bustard*")?
        .into_iter()
        .next()
    {
        return Ok(LayoutKind::Firecrest(dir));
    }
    if let Some(dir) = fs_util::glob_in(root, "Data/Intensities/*Bustard*")?
        .into_iter()
        .next()
    {
        return Ok(LayoutKind::Bustard(dir));
    }
    Ok(LayoutKind::Flat)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use assert_matches::assert_matches;

    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn basecalls_win_over_bustard() {
        let (_temp, root) = temp_root();
        fs::create_dir_all(root.join("Data/Intensities/BaseCalls")).unwrap();
        fs::create_dir_all(root.join("Data/Intensities/Bustard1.3")).unwrap();
        fs::create_dir_all(root.join("Data/C1-36_Firecrest1.3/Bustard1.3")).unwrap();

        let layout = FlowcellLayout::resolve(&root).unwrap();
        assert_matches!(layout.kind(), LayoutKind::BaseCalls(_));
        assert_eq!(
            layout.basecall_dir(),
            root.join("Data/Intensities/BaseCalls")
        );
        assert_eq!(
            layout.fastq_dir(),
            root.join("Data/Intensities/BaseCalls/fastq")
        );
    }

    #[test]
    fn firecrest_before_intensities_bustard() {
        let (_temp, root) = temp_root();
        fs::create_dir_all(root.join("Data/Intensities/Bustard1.3")).unwrap();
        fs::create_dir_all(root.join("Data/C1-36_Firecrest1.3/Bustard1.3")).unwrap();

        let fastq = resolve_fastq_dir(&root).unwrap();
        assert_eq!(fastq, root.join("Data/C1-36_Firecrest1.3/Bustard1.3/fastq"));
        assert_eq!(resolve_basecall_dir(&root).unwrap(), root);
    }

    #[test]
    fn intensities_bustard() {
        let (_temp, root) = temp_root();
        fs::create_dir_all(root.join("Data/Intensities/Bustard1.3")).unwrap();

        let fastq = resolve_fastq_dir(&root).unwrap();
        assert_eq!(fastq, root.join("Data/Intensities/Bustard1.3/fastq"));
    }

    #[test]
    fn unknown_layout_falls_back_to_root() {
        let (_temp, root) = temp_root();
        fs::create_dir_all(root.join("fastqc")).unwrap();

        let layout = FlowcellLayout::resolve(&root).unwrap();
        assert_eq!(layout.kind(), &LayoutKind::Flat);
        assert_eq!(layout.fastq_dir(), root);
        assert_eq!(layout.basecall_dir(), root);
    }
}
