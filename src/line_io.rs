//! Buffered line-oriented file access
//!
//! Thin owners around `BufReader`/`BufWriter`. Each reader or writer is moved
//! into exactly one component (shard reader, merger, swapper) and never shared.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SwapError};

/// Read/write buffer capacity for shard and output files
pub const BUF_CAPACITY: usize = 1024 * 1024;

/// Forward-only line reader over one file (or any `BufRead`)
pub struct LineReader {
    inner: Box<dyn BufRead + Send>,
    name: String,
    line_number: u64,
    eof: bool,
}

impl LineReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| SwapError::io(path, e))?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::with_capacity(BUF_CAPACITY, file),
        ))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(name: impl Into<String>, reader: R) -> Self {
        Self {
            inner: Box::new(reader),
            name: name.into(),
            line_number: 0,
            eof: false,
        }
    }

    /// Next line without its `\n` / `\r\n` terminator, `None` at EOF
    pub fn read_line(&mut self) -> Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let mut line = String::new();
        let n = self.inner.read_line(&mut line).map_err(|e| SwapError::Io {
            context: self.name.clone(),
            source: e,
        })?;
        if n == 0 {
            self.eof = true;
            return Ok(None);
        }
        self.line_number += 1;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// True once a read has hit end-of-file
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// 1-based number of the last line returned
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Buffered writer for the match output
pub struct LineWriter {
    inner: BufWriter<Box<dyn Write + Send>>,
    name: String,
    lines_written: u64,
}

impl LineWriter {
    /// Create (truncate) the output file
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| SwapError::io(path, e))?;
        Ok(Self::from_writer(path.display().to_string(), file))
    }

    pub fn from_writer<W: Write + Send + 'static>(name: impl Into<String>, writer: W) -> Self {
        Self {
            inner: BufWriter::with_capacity(BUF_CAPACITY, Box::new(writer)),
            name: name.into(),
            lines_written: 0,
        }
    }

    /// Write `line` followed by a newline
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.inner
            .write_all(line.as_bytes())
            .and_then(|()| self.inner.write_all(b"\n"))
            .map_err(|e| SwapError::Io {
                context: self.name.clone(),
                source: e,
            })?;
        self.lines_written += 1;
        Ok(())
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Flush and release the underlying file
    pub fn close(mut self) -> Result<()> {
        self.inner.flush().map_err(|e| SwapError::Io {
            context: self.name.clone(),
            source: e,
        })
    }
}
