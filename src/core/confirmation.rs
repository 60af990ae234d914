use crossterm::{
    QueueableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use log::{debug, error, info};
use std::io::{self, BufRead, Write};

/// Source of a single line of user input.
pub trait LineReader {
    fn read_line(&mut self) -> io::Result<String>;
}

impl LineReader for Box<dyn LineReader> {
    fn read_line(&mut self) -> io::Result<String> {
        (**self).read_line()
    }
}

/// Reads lines from any buffered source; stdin in production.
pub struct BufLineReader<R> {
    inner: R,
}

impl<R: BufRead> BufLineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl BufLineReader<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> LineReader for BufLineReader<R> {
    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        if self.inner.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input stream closed",
            ));
        }
        Ok(line)
    }
}

/// Answers every prompt the same way without blocking.
pub struct FixedAnswer(pub String);

impl LineReader for FixedAnswer {
    fn read_line(&mut self) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

/// Asks for approval before an expensive generation call.
pub struct ConfirmationGate<R, W> {
    reader: R,
    out: W,
}

impl<R: LineReader, W: Write> ConfirmationGate<R, W> {
    pub fn new(reader: R, out: W) -> Self {
        Self { reader, out }
    }

    /// Returns true when generation may proceed. Anything other than an
    /// explicit `y`/`yes` declines, including read failures.
    pub fn prompt_for_confirmation(&mut self, token_count: i32, threshold: i32) -> bool {
        if threshold <= 0 {
            debug!("Confirmation disabled");
            return true;
        }
        if threshold > token_count {
            debug!(
                "Token count {} is below the confirmation threshold {}",
                token_count, threshold
            );
            return true;
        }

        info!(
            "Token count ({}) meets or exceeds the confirmation threshold ({})",
            token_count, threshold
        );
        if let Err(e) = self.show_prompt(token_count, threshold) {
            error!("Failed to display confirmation prompt: {}", e);
            return false;
        }

        let response = match self.reader.read_line() {
            Ok(line) => line.trim().to_lowercase(),
            Err(e) => {
                error!("Failed to read confirmation response: {}", e);
                return false;
            }
        };

        let approved = response == "y" || response == "yes";
        debug!("Confirmation response {:?}, approved: {}", response, approved);
        approved
    }

    fn show_prompt(&mut self, token_count: i32, threshold: i32) -> io::Result<()> {
        self.out.queue(SetForegroundColor(Color::Yellow))?;
        write!(
            self.out,
            "The context is {} tokens (confirmation threshold: {}).",
            token_count, threshold
        )?;
        self.out.queue(ResetColor)?;
        write!(self.out, "\nDo you want to proceed? [y/N]: ")?;
        self.out.flush()
    }
}
