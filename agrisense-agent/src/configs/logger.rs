use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing_subscriber::fmt::MakeWriter;

/// Append-only text log bounded by line count.
///
/// Once the file grows past `max_lines` it is rewritten with only the newest
/// `keep_lines` lines.
pub struct RotatingLog {
    path: PathBuf,
    max_lines: usize,
    keep_lines: usize,
    lines: Mutex<usize>,
}

impl RotatingLog {
    pub fn open<P: AsRef<Path>>(path: P, max_lines: usize, keep_lines: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lines = match fs::read(&path) {
            Ok(content) => count_lines(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e),
        };

        Ok(Self {
            path,
            max_lines,
            keep_lines: keep_lines.min(max_lines),
            lines: Mutex::new(lines),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(bytes)?;
        *lines += count_lines(bytes);

        if *lines > self.max_lines {
            *lines = self.truncate()?;
        }

        Ok(())
    }

    fn truncate(&self) -> io::Result<usize> {
        let content = fs::read(&self.path)?;
        let content = String::from_utf8_lossy(&content);
        let all: Vec<&str> = content.lines().collect();
        let kept = &all[all.len().saturating_sub(self.keep_lines)..];

        let mut rewritten = kept.join("\n");
        rewritten.push('\n');
        fs::write(&self.path, rewritten)?;

        Ok(kept.len())
    }
}

fn count_lines(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| b == b'\n').count()
}

/// Buffers one formatted event and appends it on drop.
pub struct RotatingLogWriter<'a> {
    log: &'a RotatingLog,
    buffer: Vec<u8>,
}

impl Write for RotatingLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RotatingLogWriter<'_> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            // a full disk must not take the agent down
            let _ = self.log.append(&self.buffer);
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingLog {
    type Writer = RotatingLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingLogWriter {
            log: self,
            buffer: Vec::new(),
        }
    }
}
