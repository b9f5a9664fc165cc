//! OBD-II sample recording and import
//!
//! Offline discovery correlates against a set of time-value samples of a
//! known PID. Samples are either collected live or imported from delimited
//! text files (one `timestamp, value` pair per line; comma, semicolon and
//! tab separators are all accepted).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{DiagError, Result};

/// One time-aligned PID reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObdSample {
    /// Seconds, relative to the capture start
    pub timestamp: f64,
    /// Physical PID value
    pub value: f64,
}

/// The recorded sample set of a target PID
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    samples: Vec<ObdSample>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[ObdSample] {
        &self.samples
    }

    pub fn push(&mut self, sample: ObdSample) {
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Import samples from a delimited text file
    ///
    /// Malformed or non-numeric lines (including headers) are skipped. On
    /// success the previous sample set is replaced and the number of
    /// imported rows returned; an import yielding zero valid rows fails
    /// with [`DiagError::ImportParse`] and retains the previous samples.
    pub fn import_file(&mut self, path: &Path) -> Result<usize> {
        log::info!("Importing OBD samples from {:?}", path);
        let file = File::open(path)?;
        self.import_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Import samples from any buffered reader; `origin` labels log output
    pub fn import_reader<R: BufRead>(&mut self, reader: R, origin: &str) -> Result<usize> {
        let mut parsed = Vec::new();
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            match parse_sample_line(&line) {
                Some(sample) => parsed.push(sample),
                None => {
                    if !line.trim().is_empty() {
                        skipped += 1;
                    }
                }
            }
        }

        if skipped > 0 {
            log::warn!("{}: skipped {} malformed line(s)", origin, skipped);
        }

        if parsed.is_empty() {
            return Err(DiagError::ImportParse(origin.to_string()));
        }

        log::info!("{}: imported {} sample(s)", origin, parsed.len());
        self.samples = parsed;
        Ok(self.samples.len())
    }
}

/// Parse one `timestamp<sep>value` line; separators are `,`, `;` and tab
fn parse_sample_line(line: &str) -> Option<ObdSample> {
    let mut fields = line.split(|c| c == ',' || c == ';' || c == '\t');
    let timestamp: f64 = fields.next()?.trim().parse().ok()?;
    let value: f64 = fields.next()?.trim().parse().ok()?;
    Some(ObdSample { timestamp, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_sample_line_separators() {
        assert_eq!(
            parse_sample_line("1.5,20.0"),
            Some(ObdSample { timestamp: 1.5, value: 20.0 })
        );
        assert_eq!(
            parse_sample_line("2.5; 30"),
            Some(ObdSample { timestamp: 2.5, value: 30.0 })
        );
        assert_eq!(
            parse_sample_line("3\t40"),
            Some(ObdSample { timestamp: 3.0, value: 40.0 })
        );
        assert_eq!(parse_sample_line("time,value"), None);
        assert_eq!(parse_sample_line("1.5"), None);
    }

    #[test]
    fn test_import_skips_malformed_lines() {
        let text = "timestamp,value\n0.0,10\nnot a line\n1.0,20\n\n2.0,30\n";
        let mut set = SampleSet::new();
        let imported = set.import_reader(Cursor::new(text), "test").unwrap();

        assert_eq!(imported, 3);
        assert_eq!(set.len(), 3);
        assert_eq!(set.samples()[2], ObdSample { timestamp: 2.0, value: 30.0 });
    }

    #[test]
    fn test_import_zero_valid_rows_retains_previous() {
        let mut set = SampleSet::new();
        set.push(ObdSample { timestamp: 0.0, value: 1.0 });

        let result = set.import_reader(Cursor::new("header only\nstill nothing\n"), "test");
        assert!(matches!(result, Err(DiagError::ImportParse(_))));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_import_replaces_previous_on_success() {
        let mut set = SampleSet::new();
        set.push(ObdSample { timestamp: 9.0, value: 9.0 });

        set.import_reader(Cursor::new("0.0,1.0\n1.0,2.0\n"), "test").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.samples()[0].value, 1.0);
    }

    #[test]
    fn test_import_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "0.0,10.0").unwrap();
        writeln!(temp, "1.0,20.0").unwrap();
        temp.flush().unwrap();

        let mut set = SampleSet::new();
        assert_eq!(set.import_file(temp.path()).unwrap(), 2);
    }
}
