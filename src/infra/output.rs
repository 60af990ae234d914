use crate::domain::models::GenerationResult;
use log::{debug, warn};
use std::io::{self, Write};

pub trait OutputWriter {
    fn write(&mut self, content: &str) -> anyhow::Result<()>;
}

/// Writes generated content to any sink; stdout in production.
pub struct ConsoleWriter<W> {
    out: W,
}

impl ConsoleWriter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> OutputWriter for ConsoleWriter<W> {
    fn write(&mut self, content: &str) -> anyhow::Result<()> {
        debug!("Writing {} bytes of output", content.len());
        self.out.write_all(content.as_bytes())?;
        if !content.ends_with('\n') {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()?;
        Ok(())
    }
}

pub fn write_generation(writer: &mut dyn OutputWriter, result: &GenerationResult) -> anyhow::Result<()> {
    debug!("Generation finished: {:?}", result.finish_reason);
    if result.content.trim().is_empty() {
        warn!("The model returned an empty response");
    }
    if result.truncated {
        warn!("The response was cut off at the model's output token limit");
    }
    writer.write(&result.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(content: &str) -> GenerationResult {
        GenerationResult {
            content: content.to_string(),
            finish_reason: Some("STOP".to_string()),
            truncated: false,
        }
    }

    #[test]
    fn test_console_writer_adds_trailing_newline() {
        let mut buf = Vec::new();
        ConsoleWriter::new(&mut buf).write("Test output").unwrap();
        assert_eq!(buf, b"Test output\n");

        let mut buf = Vec::new();
        ConsoleWriter::new(&mut buf).write("done\n").unwrap();
        assert_eq!(buf, b"done\n");
    }

    #[test]
    fn test_write_generation() {
        let mut buf = Vec::new();
        let mut writer = ConsoleWriter::new(&mut buf);

        write_generation(&mut writer, &generation("1. Do the thing")).unwrap();

        assert_eq!(String::from_utf8(buf).unwrap(), "1. Do the thing\n");
    }
}
