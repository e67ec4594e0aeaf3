use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Configuration for chunked reading
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Bytes requested per read call (default: 1 MiB)
    pub chunk_size: usize,
    /// Longest line kept in memory; longer lines are dropped (default: 1 MiB)
    pub max_line_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1 << 20,
            max_line_bytes: 1 << 20,
        }
    }
}

/// Where a file's bytes come from
///
/// Sources are opened lazily by the worker that picks the file up, so a batch of
/// thousands of paths never holds more open handles than there are workers.
pub enum ContentSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl ContentSource {
    pub fn memory(bytes: impl Into<Vec<u8>>) -> Self {
        ContentSource::Memory(Arc::from(bytes.into()))
    }

    pub async fn open(self) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            ContentSource::Path(path) => {
                debug!("Opening {}", path.display());
                let file = File::open(&path).await?;
                Ok(Box::new(file))
            }
            ContentSource::Memory(bytes) => Ok(Box::new(io::Cursor::new(bytes))),
            ContentSource::Reader(reader) => Ok(reader),
        }
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ContentSource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            ContentSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// One logical line produced by [`LineSplitter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Line bytes without the terminator (`\n` or `\r\n`)
    Text(&'a [u8]),
    /// A line longer than `max_line_bytes`; its content was discarded
    Oversized,
}

/// Reassembles lines that straddle chunk boundaries
///
/// Only the unfinished tail of the previous chunk is carried over, and that carry is
/// capped at `max_line_bytes`.
#[derive(Debug)]
pub struct LineSplitter {
    carry: Vec<u8>,
    max_line_bytes: usize,
    discarding: bool,
}

impl LineSplitter {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            carry: Vec::new(),
            max_line_bytes,
            discarding: false,
        }
    }

    /// Feed one chunk, emitting every line it completes. Returns the number of lines emitted.
    pub fn push<F, E>(&mut self, chunk: &[u8], on_line: &mut F) -> Result<u64, E>
    where
        F: FnMut(Line<'_>) -> Result<(), E>,
    {
        let mut emitted = 0u64;
        let mut start = 0;

        while let Some(offset) = chunk[start..].iter().position(|&b| b == b'\n') {
            let segment = &chunk[start..start + offset];
            start += offset + 1;
            emitted += 1;

            if self.discarding {
                self.discarding = false;
                on_line(Line::Oversized)?;
                continue;
            }

            if self.carry.is_empty() {
                if segment.len() > self.max_line_bytes {
                    on_line(Line::Oversized)?;
                } else {
                    on_line(Line::Text(trim_cr(segment)))?;
                }
            } else if self.carry.len() + segment.len() > self.max_line_bytes {
                self.carry.clear();
                on_line(Line::Oversized)?;
            } else {
                self.carry.extend_from_slice(segment);
                let result = on_line(Line::Text(trim_cr(&self.carry)));
                self.carry.clear();
                result?;
            }
        }

        let rest = &chunk[start..];
        if !self.discarding && !rest.is_empty() {
            if self.carry.len() + rest.len() > self.max_line_bytes {
                self.carry.clear();
                self.discarding = true;
            } else {
                self.carry.extend_from_slice(rest);
            }
        }

        Ok(emitted)
    }

    /// Flush a trailing line that had no terminator
    pub fn finish<F, E>(&mut self, on_line: &mut F) -> Result<u64, E>
    where
        F: FnMut(Line<'_>) -> Result<(), E>,
    {
        if self.discarding {
            self.discarding = false;
            on_line(Line::Oversized)?;
            return Ok(1);
        }
        if self.carry.is_empty() {
            return Ok(0);
        }
        let result = on_line(Line::Text(trim_cr(&self.carry)));
        self.carry.clear();
        result.map(|_| 1)
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Statistics for one chunked read
#[derive(Debug, Clone, Default)]
pub struct ReadStats {
    pub bytes_read: u64,
    pub lines_read: u64,
    pub chunks_read: u64,
}

/// Stream `reader` in bounded chunks, calling `on_line` for every line
///
/// Peak memory is one chunk buffer plus at most `max_line_bytes` of carried line,
/// regardless of how large the source is. An error from `on_line` stops the read.
pub async fn read_lines<R, F, E>(
    reader: &mut R,
    config: &ReaderConfig,
    mut on_line: F,
) -> Result<ReadStats, E>
where
    R: AsyncRead + Unpin,
    F: FnMut(Line<'_>) -> Result<(), E>,
    E: From<io::Error>,
{
    let mut buf = vec![0u8; config.chunk_size.max(1)];
    let mut splitter = LineSplitter::new(config.max_line_bytes);
    let mut stats = ReadStats::default();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        stats.bytes_read += n as u64;
        stats.chunks_read += 1;
        stats.lines_read += splitter.push(&buf[..n], &mut on_line)?;
    }
    stats.lines_read += splitter.finish(&mut on_line)?;

    Ok(stats)
}
