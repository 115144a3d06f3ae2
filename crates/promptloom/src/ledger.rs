use crate::error::Result;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// Append-only record of fragment relative paths already incorporated into a
/// previous successful request.
///
/// The file is newline-delimited UTF-8; membership is line-exact. It is used
/// purely as a filter over the collector's output, never for ordering, and it
/// only grows — an edited fragment whose path is already recorded is never
/// resent.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The set of recorded relative paths. A missing ledger file means an
    /// empty set, not an error.
    pub fn members(&self) -> Result<HashSet<String>> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut members = HashSet::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                members.insert(line);
            }
        }
        Ok(members)
    }

    /// Appends every path not already recorded. Returns how many lines were
    /// written. Existing content is never rewritten.
    pub fn record<'a, I>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut members = self.members()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut appended = 0;
        for path in paths {
            if members.insert(path.to_string()) {
                writeln!(file, "{path}")?;
                appended += 1;
            }
        }
        Ok(appended)
    }
}
