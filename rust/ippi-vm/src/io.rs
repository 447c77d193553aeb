//! Collaborators the engine talks to: where `write` output goes and where
//! `read` input comes from.

use std::io::{self, BufRead, Write};

/// Destination of `write`.
pub trait OutputSink {
    fn emit(&mut self, text: &[u8]) -> io::Result<()>;
}

impl<W: Write> OutputSink for W {
    fn emit(&mut self, text: &[u8]) -> io::Result<()> {
        self.write_all(text)
    }
}

/// Source of `read`. `Ok(None)` means end of input.
pub trait InputSource {
    fn read_line(&mut self) -> io::Result<Option<String>>;
}

impl<R: BufRead> InputSource for R {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if BufRead::read_line(self, &mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}
