//! JSON-lines record dump source.
//!
//! A dump holds one serialized [`Record`] per line, in stream order. Blank
//! lines are ignored. Gzip-compressed dumps are decoded transparently.
//!
//! A line that does not parse is a decode failure of the source: the
//! traversal aborts with `ExtractError::Source` naming the line.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::record::{EventRecord, Record};
use super::{EventSource, Handler, KindSet, SourceOpener};
use crate::error::{ExtractError, Result};
use crate::format::{detect_encoding, DumpEncoding};

/// Opens [`DumpSource`]s for a dump file path.
#[derive(Debug, Clone)]
pub struct DumpOpener {
    path: PathBuf,
}

impl DumpOpener {
    /// Creates an opener for `path`. The file is not touched until
    /// [`SourceOpener::open`] is called.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The dump path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceOpener for DumpOpener {
    fn open(&self) -> Result<Box<dyn EventSource>> {
        Ok(Box::new(DumpSource::open(&self.path)?))
    }
}

/// A single-use source reading a record dump.
pub struct DumpSource {
    reader: Option<Box<dyn BufRead + Send>>,
    tables: HashMap<String, HashMap<u32, String>>,
    tick: u32,
    net_tick: u32,
}

impl std::fmt::Debug for DumpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpSource")
            .field("consumed", &self.reader.is_none())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl DumpSource {
    /// Opens a dump file, detecting gzip compression from its magic bytes.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::Io` if the file cannot be opened or read.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let encoding = detect_encoding(reader.fill_buf()?);

        let reader: Box<dyn BufRead + Send> = match encoding {
            DumpEncoding::Gzip => Box::new(BufReader::new(GzDecoder::new(reader))),
            DumpEncoding::Plain => Box::new(reader),
        };
        tracing::debug!(path = %path.display(), "opened record dump");
        Ok(Self::from_reader(reader))
    }

    /// Wraps an already-decoded JSON-lines reader.
    #[must_use]
    pub fn from_reader(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            reader: Some(reader),
            tables: HashMap::new(),
            tick: 0,
            net_tick: 0,
        }
    }
}

impl EventSource for DumpSource {
    fn start(&mut self, kinds: KindSet, handler: &mut Handler<'_>) -> Result<()> {
        let reader = self.reader.take().ok_or(ExtractError::SourceReused)?;

        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                ExtractError::source(self.tick, format!("line {}: {e}", number + 1))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(&line).map_err(|e| {
                ExtractError::source(self.tick, format!("line {}: {e}", number + 1))
            })?;

            self.tick = record.tick;
            self.net_tick = record.net_tick;
            if let EventRecord::Table(entry) = &record.event {
                self.tables
                    .entry(entry.table.clone())
                    .or_default()
                    .insert(entry.index, entry.key.clone());
            }

            if kinds.contains(record.kind()) && handler(&record).is_break() {
                break;
            }
        }
        Ok(())
    }

    fn tick(&self) -> u32 {
        self.tick
    }

    fn net_tick(&self) -> u32 {
        self.net_tick
    }

    fn lookup_string(&self, table: &str, index: u32) -> Option<String> {
        self.tables.get(table)?.get(&index).cloned()
    }
}
