use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::mmcif::{self, AtomSite, MmcifError};

#[derive(Debug, thiserror::Error)]
pub enum WarningsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid warnings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read atom sites: {0}")]
    Mmcif(#[from] MmcifError),
}

/// Entry of `residual_warnings.json` as produced by the charge calculation.
/// Residues are identified by a single chain and residue number that may be
/// either the author or the label numbering. Both are compared as text, so
/// ids like `52A` or numeric chain names are kept as written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueWarning {
    #[serde(deserialize_with = "id_text")]
    pub chain_id: String,
    #[serde(deserialize_with = "id_text")]
    pub residue_id: String,
    pub residue_name: String,
    pub warning: String,
}

/// A warning pinned to both numbering schemes, as the structure viewer wants it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemappedWarning {
    pub auth_seq_id: String,
    pub label_seq_id: String,
    pub auth_asym_id: String,
    pub label_asym_id: String,
    pub residue_name: String,
    pub warning: String,
}

/// A JSON string as is, any other value as its JSON text.
fn id_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ResidueIds<'a> {
    auth_seq: &'a str,
    label_seq: &'a str,
    auth_asym: &'a str,
    label_asym: &'a str,
}

impl ResidueIds<'_> {
    fn matches(&self, seq: &str, chain: &str) -> bool {
        (self.auth_seq == seq || self.label_seq == seq) && (self.auth_asym == chain || self.label_asym == chain)
    }
}

/// Resolve each warning to exactly one residue of the structure. Warnings that
/// match no residue, or more than one, are dropped. Input order is kept.
pub fn remap_warnings(atoms: &[AtomSite], warnings: &[ResidueWarning]) -> Vec<RemappedWarning> {
    let mut seen = HashSet::with_capacity(atoms.len() / 8);
    let mut residues: HashMap<&str, Vec<ResidueIds>> = HashMap::new();
    for atom in atoms {
        let ids = ResidueIds {
            auth_seq: &atom.auth_seq_id,
            label_seq: &atom.label_seq_id,
            auth_asym: &atom.auth_asym_id,
            label_asym: &atom.label_asym_id,
        };
        if seen.insert((atom.comp_id.as_str(), ids)) {
            residues.entry(atom.comp_id.as_str()).or_default().push(ids);
        }
    }

    warnings
        .iter()
        .filter_map(|w| {
            let mut matching = residues
                .get(w.residue_name.as_str())?
                .iter()
                .filter(|r| r.matches(&w.residue_id, &w.chain_id));
            let residue = matching.next()?;
            if matching.next().is_some() {
                log::debug!(
                    "Ambiguous residue {} {} in chain {}, dropping warning",
                    w.residue_name, w.residue_id, w.chain_id
                );
                return None;
            }
            Some(RemappedWarning {
                auth_seq_id: residue.auth_seq.into(),
                label_seq_id: residue.label_seq.into(),
                auth_asym_id: residue.auth_asym.into(),
                label_asym_id: residue.label_asym.into(),
                residue_name: w.residue_name.clone(),
                warning: w.warning.clone(),
            })
        })
        .collect()
}

pub fn load_warnings(path: impl AsRef<Path>) -> Result<Vec<ResidueWarning>, WarningsError> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

pub fn load_remapped(path: impl AsRef<Path>) -> Result<Vec<RemappedWarning>, WarningsError> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Remap `warnings_file` against the atoms of `cif_file` and write the result
/// to `out_file`. Returns the number of warnings written.
pub fn remap_files(
    cif_file: impl AsRef<Path>,
    warnings_file: impl AsRef<Path>,
    out_file: impl AsRef<Path>,
) -> Result<usize, WarningsError> {
    let atoms = mmcif::read_atom_sites(&fs::read_to_string(cif_file)?)?;
    let warnings = load_warnings(warnings_file)?;
    let remapped = remap_warnings(&atoms, &warnings);
    fs::write(out_file, serde_json::to_string_pretty(&remapped)?)?;
    Ok(remapped.len())
}
