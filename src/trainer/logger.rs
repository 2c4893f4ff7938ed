use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Receives the loss at the end of every training epoch.
pub trait Logger {
    fn epoch_loss(&mut self, epoch: usize, loss: f32);
}

/// Discards everything it is given.
pub struct MockLogger;

impl Logger for MockLogger {
    fn epoch_loss(&mut self, _epoch: usize, _loss: f32) {}
}

/// Prints every `every`-th epoch to stdout.
pub struct StdoutLogger {
    every: usize,
}

impl StdoutLogger {
    pub fn new(every: usize) -> Self {
        assert!(every > 0, "the reporting interval must be non-zero");
        Self { every }
    }
}

impl Logger for StdoutLogger {
    fn epoch_loss(&mut self, epoch: usize, loss: f32) {
        if epoch % self.every == 0 {
            println!("epoch {}: loss {}", epoch, loss);
        }
    }
}

/// Appends one `epoch,loss` line per epoch to a file.
pub struct LogFile {
    writer: BufWriter<File>,
}

impl LogFile {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Logger for LogFile {
    fn epoch_loss(&mut self, epoch: usize, loss: f32) {
        // a failed log line shouldn't abort a training run
        let _ = writeln!(self.writer, "{},{}", epoch, loss);
    }
}
