// ProfLog - platform/fs.rs
//
// Line-oriented file reading with lossy UTF-8 decoding.
// Log files are not guaranteed to be valid UTF-8; invalid sequences are
// replaced rather than failing the line.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Buffered reader yielding lines without their terminator (`\n` or `\r\n`).
pub struct LineFile {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl LineFile {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
            buf: Vec::new(),
        })
    }

    /// Next line, or `None` at end of file.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Read only the first line of a file; `None` when the file is empty.
pub fn read_first_line(path: &Path) -> io::Result<Option<String>> {
    LineFile::open(path)?.read_line()
}
