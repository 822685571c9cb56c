//! User-facing console output
//!
//! Everything the demos print goes through [`Console`] as CRLF-terminated
//! lines. Diagnostics go to the `log` facade instead.

use log::warn;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

pub struct Console {
    out: Box<dyn Write>,
}

impl Console {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Console writing into a buffer the caller can inspect
    pub fn capture() -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    /// Print one line
    pub fn line(&mut self, text: impl fmt::Display) {
        if let Err(e) = write!(self.out, "{}\r\n", text) {
            warn!("Console write failed: {}", e);
        }
    }

    /// Print a prompt without a line break
    pub fn prompt(&mut self, prompt: &str) {
        let result = write!(self.out, "{}", prompt).and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("Console write failed: {}", e);
        }
    }
}

/// Shared byte buffer behind [`Console::capture`]
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }

    /// Return and clear everything captured so far
    pub fn take(&self) -> String {
        let bytes: Vec<u8> = self.bytes.borrow_mut().drain(..).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Captured output split into lines
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
