use std::path::{Path, PathBuf};

use crate::code::StructureCode;

/// Files kept in a structure's cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFile {
    /// mmCIF with the partial charge table appended
    Structure,
    /// Output of the charge calculation run
    Log,
    Warnings,
    /// `Warnings` resolved to both residue numbering schemes
    RemappedWarnings,
    ChargeListing,
    Pqr,
    Archive,
}

impl ResultFile {
    /// Objects published on the remote store for every calculated structure.
    pub const REMOTE: [ResultFile; 3] = [Self::Structure, Self::Log, Self::Warnings];

    pub fn file_name(&self, code: &StructureCode) -> String {
        match self {
            Self::Structure => format!("{code}.cif"),
            Self::Log => "output.txt".into(),
            Self::Warnings => "residual_warnings.json".into(),
            Self::RemappedWarnings => "modified_residual_warnings.json".into(),
            Self::ChargeListing => format!("{code}_charges.txt"),
            Self::Pqr => format!("{code}.pqr"),
            Self::Archive => format!("{code}_charges.zip"),
        }
    }

    pub fn path(&self, dir: impl AsRef<Path>, code: &StructureCode) -> PathBuf {
        dir.as_ref().join(self.file_name(code))
    }
}
