use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, BufRead};

/// Source of input lines for the interactive loop and for `sort`.
///
/// `Ok(None)` is end of input, a terminal condition distinct from an empty line.
pub trait LineReader {
    /// Reads the next line without its trailing newline.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Reads one line as bytes and decodes it, replacing invalid UTF-8 with
/// U+FFFD so a stray byte never fails the whole read.
fn read_lossy_line(reader: &mut dyn BufRead) -> Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Line reader over any buffered byte stream.
pub struct BufLineReader<R> {
    inner: R,
}

impl<R: BufRead> BufLineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> LineReader for BufLineReader<R> {
    fn read_line(&mut self) -> Result<Option<String>> {
        read_lossy_line(&mut self.inner)
    }
}

/// Reads the process standard input, locking it only for the duration of one
/// call so built-ins running in between can read from it too.
impl LineReader for io::Stdin {
    fn read_line(&mut self) -> Result<Option<String>> {
        read_lossy_line(&mut self.lock())
    }
}

/// Interactive line editor used when standard input is a terminal.
pub struct EditorLineReader {
    editor: DefaultEditor,
    prompt: String,
    history: bool,
}

impl EditorLineReader {
    pub fn new(prompt: impl Into<String>, history: bool) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            prompt: prompt.into(),
            history,
        })
    }
}

impl LineReader for EditorLineReader {
    fn read_line(&mut self) -> Result<Option<String>> {
        match self.editor.readline(&self.prompt) {
            Ok(line) => {
                if self.history && !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the current line only.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
