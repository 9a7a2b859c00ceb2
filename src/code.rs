use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Longest accepted structure code. Covers classic 4-character PDB ids as
/// well as the extended `pdb_0000xxxx` form.
pub const MAX_CODE_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("structure code is empty")]
    Empty,
    #[error("structure code is longer than {MAX_CODE_LEN} characters")]
    TooLong,
    #[error("structure code may only contain letters, digits and '_'")]
    InvalidCharacter,
}

/// A normalised (trimmed, lowercase) structure database accession.
///
/// The code is used both as a directory name in the local cache and as a
/// path segment on the remote store, so anything outside `[a-z0-9_]` is
/// rejected up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StructureCode(String);

impl StructureCode {
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        let code = raw.trim().to_ascii_lowercase();
        if code.is_empty() {
            return Err(CodeError::Empty);
        }
        if code.len() > MAX_CODE_LEN {
            return Err(CodeError::TooLong);
        }
        if !code.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(CodeError::InvalidCharacter);
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StructureCode {
    type Err = CodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StructureCode {
    type Error = CodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StructureCode> for String {
    fn from(value: StructureCode) -> Self {
        value.0
    }
}

impl AsRef<str> for StructureCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StructureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
