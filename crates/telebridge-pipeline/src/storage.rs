//! Comma-delimited row log.
//!
//! Minimal quoting with `|` as the quote character: a cell is quoted only
//! when it contains the delimiter, the quote character or a line break, and
//! quote characters inside a quoted cell are doubled.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use telebridge_record::Row;
use tracing::{debug, info};

use crate::error::{Result, SinkError, StartupError};
use crate::sink::StorageSink;

/// Field delimiter.
pub const DELIMITER: char = ',';
/// Quote character.
pub const QUOTE: char = '|';
/// Record terminator.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Append-only CSV log, recreated with a header row at startup.
pub struct CsvLog<W: Write = BufWriter<File>> {
    writer: W,
    path: Option<PathBuf>,
    rows: u64,
}

impl CsvLog {
    /// Create (or truncate) the log file and write the header row.
    pub fn create<S: AsRef<str>>(
        path: impl AsRef<Path>,
        header: &[S],
    ) -> std::result::Result<Self, StartupError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| StartupError::StorageOpen {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = File::create(&path).map_err(open_err)?;

        let mut log = Self::from_writer(BufWriter::new(file));
        log.write_line(header).map_err(open_err)?;
        log.path = Some(path);

        info!(path = ?log.path, "created record log");
        Ok(log)
    }
}

impl<W: Write> CsvLog<W> {
    /// Wrap an arbitrary writer. No header is written.
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            path: None,
            rows: 0,
        }
    }

    /// Path of the backing file, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Data rows appended so far (header excluded).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Consume the log and return the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<S: AsRef<str>>(&mut self, fields: &[S]) -> std::io::Result<()> {
        let line = format_record(fields);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}

impl<W: Write> StorageSink for CsvLog<W> {
    fn append(&mut self, row: &Row) -> Result<()> {
        let fields: Vec<String> = row.iter().map(ToString::to_string).collect();
        self.write_line(&fields).map_err(SinkError::Storage)?;
        self.rows += 1;
        debug!(rows = self.rows, "appended record row");
        Ok(())
    }
}

/// Format one record line, terminator included.
pub fn format_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        push_field(&mut line, field.as_ref());
    }
    line.push_str(LINE_TERMINATOR);
    line
}

fn push_field(line: &mut String, field: &str) {
    let needs_quotes = field
        .chars()
        .any(|c| c == DELIMITER || c == QUOTE || c == '\r' || c == '\n');
    if !needs_quotes {
        line.push_str(field);
        return;
    }

    line.push(QUOTE);
    for c in field.chars() {
        if c == QUOTE {
            line.push(QUOTE);
        }
        line.push(c);
    }
    line.push(QUOTE);
}
