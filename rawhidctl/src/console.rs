//! Serializes console output of concurrent workers.
//!
//! Workers never write to stdout themselves. They hand whole lines to a
//! single printer thread, so lines of different workers may interleave but
//! characters never do.

use std::{
    io::Write,
    thread::{self, JoinHandle},
};

use anyhow::{Result, anyhow};
use flume::Sender;

/// The printer thread owning stdout.
pub struct Console {
    tx: Sender<String>,
    printer: JoinHandle<()>,
}

/// A cheap handle for sending lines to the [`Console`].
#[derive(Clone)]
pub struct Printer {
    tx: Sender<String>,
}

impl Console {
    pub fn spawn() -> Self {
        let (tx, rx) = flume::unbounded::<String>();

        let printer = thread::spawn(move || {
            let mut stdout = anstream::stdout();
            for line in rx {
                if writeln!(stdout, "{line}").is_err() {
                    break;
                }
            }
        });

        Self { tx, printer }
    }

    pub fn printer(&self) -> Printer {
        Printer {
            tx: self.tx.clone(),
        }
    }

    /// Waits until every line sent so far has been printed.
    ///
    /// Lines sent through printers still alive afterwards are printed as
    /// well, so all of them should be dropped first.
    pub fn finish(self) -> Result<()> {
        drop(self.tx);
        self.printer
            .join()
            .map_err(|_| anyhow!("the printer thread panicked"))
    }
}

impl Printer {
    pub fn line(&self, line: impl Into<String>) {
        // Only fails once the printer thread is gone, which leaves nobody to
        // print to anyway.
        let _ = self.tx.send(line.into());
    }

    pub fn blank(&self) {
        self.line(String::new());
    }
}
