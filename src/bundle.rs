//! Download bundle: the structure file, its remapped warnings, a plain charge
//! listing and a PQR file, zipped together.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use zip::{result::ZipError, write::FileOptions, CompressionMethod, ZipWriter};

use crate::{
    charges::{ChargeRecord, ParseError},
    code::StructureCode,
    mmcif::{self, MmcifError},
    pqr::{self, PqrError},
    result_files::ResultFile,
};

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("required artifact `{0}` is missing")]
    ArtifactMissing(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Mmcif(#[from] MmcifError),
    #[error(transparent)]
    Pqr(#[from] PqrError),
    #[error("failed to write archive: {0}")]
    Zip(#[from] ZipError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write `dest` through a temporary file in `dir`, so it either appears
/// complete or not at all.
fn write_atomic<F>(dir: &Path, dest: &Path, write: F) -> Result<(), BundleError>
where
    F: FnOnce(&mut File) -> Result<(), BundleError>,
{
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Build `{code}_charges.zip` in the structure's cache directory `dir` and
/// return its path.
pub fn bundle_results(dir: &Path, code: &StructureCode) -> Result<PathBuf, BundleError> {
    let structure = ResultFile::Structure.path(dir, code);
    let warnings = ResultFile::RemappedWarnings.path(dir, code);
    for (file, path) in [(ResultFile::Structure, &structure), (ResultFile::RemappedWarnings, &warnings)] {
        if !path.is_file() {
            return Err(BundleError::ArtifactMissing(file.file_name(code)));
        }
    }

    let text = fs::read_to_string(&structure)?;
    let charges = ChargeRecord::parse(&text)?;
    let atoms = mmcif::read_atom_sites(&text)?;

    let listing = ResultFile::ChargeListing.path(dir, code);
    write_atomic(dir, &listing, |f| {
        f.write_all(charges.listing(code).as_bytes())?;
        Ok(())
    })?;

    let pqr_file = ResultFile::Pqr.path(dir, code);
    write_atomic(dir, &pqr_file, |f| {
        let mut out = BufWriter::new(f);
        pqr::write_pqr(&mut out, &atoms, &charges)?;
        out.flush()?;
        Ok(())
    })?;

    // The remapped warnings ship as residual_warnings.json
    let entries = [
        (ResultFile::Structure.file_name(code), structure),
        (ResultFile::Warnings.file_name(code), warnings),
        (ResultFile::ChargeListing.file_name(code), listing),
        (ResultFile::Pqr.file_name(code), pqr_file),
    ];
    let archive = ResultFile::Archive.path(dir, code);
    write_atomic(dir, &archive, |f| {
        let mut zip = ZipWriter::new(f);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, path) in &entries {
            zip.start_file(name.as_str(), options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
        }
        zip.finish()?;
        Ok(())
    })?;
    log::debug!("Bundled results for {code} into {}", archive.display());
    Ok(archive)
}
