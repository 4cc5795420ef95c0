use std::io::{self, Write};

use crate::deliver::{DeliveryEvent, DeliverySink};

/// Prints dry-run plans to stdout, one `DRY_RUN:` line per operation.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn render(event: &DeliveryEvent) -> String {
        match event {
            DeliveryEvent::Directory { label, path } => {
                format!("DRY_RUN: create {label} directory {path}")
            }
            DeliveryEvent::Transfer(op) => {
                format!("DRY_RUN: {} file {} to {}", op.mode, op.source, op.target)
            }
            DeliveryEvent::RunInfo { path, yaml } => {
                format!("DRY_RUN: write {path}\n{}", yaml.trim_end())
            }
        }
    }

    fn print_line(line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl DeliverySink for ConsoleOutput {
    fn event(&self, event: DeliveryEvent) {
        // Best effort: a closed stdout must not abort the run.
        if let Err(err) = Self::print_line(&Self::render(&event)) {
            tracing::debug!("could not print dry-run line: {err}");
        }
    }
}
