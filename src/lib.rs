pub mod access_log;
pub mod bundle;
pub mod charges;
pub mod code;
pub mod config;
pub mod fetcher;
pub mod mmcif;
pub mod pqr;
pub mod result_files;
pub mod warnings;

#[cfg(test)]
mod fixtures;
