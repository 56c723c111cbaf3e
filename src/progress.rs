//! Byte-based progress tracking for dump translation.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;

/// A reader wrapper that tracks bytes read and calls a progress callback.
///
/// Wraps the raw (possibly compressed) file handle, so progress reflects the
/// position in the file on disk rather than the decompressed stream.
pub struct ProgressReader<R: Read> {
    reader: R,
    callback: Box<dyn Fn(u64)>,
    bytes_read: u64,
}

impl<R: Read> ProgressReader<R> {
    /// The callback receives the total bytes read so far after every read.
    pub fn new<F>(reader: R, callback: F) -> Self
    where
        F: Fn(u64) + 'static,
    {
        Self {
            reader,
            callback: Box::new(callback),
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.bytes_read += n as u64;
        (self.callback)(self.bytes_read);
        Ok(n)
    }
}

/// Progress bar sized to the input file.
pub fn byte_progress_bar(total_bytes: u64) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(total_bytes);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
        )?
        .progress_chars("█▓▒░  ")
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_progress_reader_reports_cumulative_bytes() {
        let seen = Rc::new(Cell::new(0u64));
        let seen_clone = seen.clone();
        let data = vec![b'x'; 10_000];
        let mut reader = ProgressReader::new(std::io::Cursor::new(data), move |n| {
            seen_clone.set(n)
        });

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out.len(), 10_000);
        assert_eq!(seen.get(), 10_000);
    }
}
