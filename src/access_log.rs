use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDateTime};

use crate::code::StructureCode;

/// Append-only record of which client looked up which structure.
#[derive(Debug, Clone)]
pub struct AccessLog {
    path: PathBuf,
}

impl AccessLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Failures are logged, never returned: a lost log line must not fail the request.
    pub fn record(&self, client: &str, code: &StructureCode) {
        let line = format_entry(client, code, Local::now().naive_local());
        if let Err(e) = self.append(&line) {
            log::warn!("Failed to write access log {}: {e}", self.path.display());
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        // Single write so concurrent appenders don't interleave within a line
        file.write_all(line.as_bytes())
    }
}

pub fn format_entry(client: &str, code: &StructureCode, at: NaiveDateTime) -> String {
    format!("{client} {code} {}\n", at.format("%d/%m/%Y %H:%M:%S"))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_entry() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(14, 7, 9).unwrap();
        let code = StructureCode::parse("1ABC").unwrap();
        assert_eq!(format_entry("10.0.0.1", &code, at), "10.0.0.1 1abc 05/03/2024 14:07:09\n");
    }

    #[test]
    fn test_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::new(dir.path().join("logs").join("accesses.txt"));
        let code = StructureCode::parse("1abc").unwrap();
        log.record("127.0.0.1", &code);
        log.record("127.0.0.2", &code);
        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("127.0.0.1 1abc "));
        assert!(lines[1].starts_with("127.0.0.2 1abc "));
    }
}
