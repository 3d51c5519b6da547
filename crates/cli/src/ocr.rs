//! Text recognition through an external program.

use deckscan_core::{Error, Result, TextRecognizer};
use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Pipes each picture as PNG to a command and reads the recognized text from
/// its stdout, e.g. `tesseract stdin stdout`.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new<S: Into<String>>(program: impl Into<String>, args: impl IntoIterator<Item = S>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace. Quoting is not supported.
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::InvalidConfigError("empty OCR command".to_string()))?;
        Ok(Self::new(program, parts))
    }
}

impl TextRecognizer for CommandRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| Error::RecognitionError(format!("Failed to encode image: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::RecognitionError(format!("Failed to start {}: {}", self.program, e)))?;

        // stdin is written from its own thread while stdout and stderr drain.
        let png = png.into_inner();
        let stdin = child.stdin.take();
        let writer = thread::spawn(move || match stdin {
            Some(mut stdin) => stdin.write_all(&png),
            None => Ok(()),
        });

        let output = child
            .wait_with_output()
            .map_err(|e| Error::RecognitionError(format!("{} did not finish: {}", self.program, e)))?;
        let sent = writer.join().map_err(|_| {
            Error::RecognitionError(format!("Image writer for {} panicked", self.program))
        })?;

        if !output.status.success() {
            return Err(Error::RecognitionError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        match sent {
            // The command may finish without reading all of its input.
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(Error::RecognitionError(format!(
                    "Failed to send image to {}: {}",
                    self.program, e
                )));
            }
            _ => {}
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
