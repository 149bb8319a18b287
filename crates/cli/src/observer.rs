//! Terminal front end for the scan controller

use scan_core::{Booking, CycleOutcome, LogEntry, LogLevel, LookupResult, ScanObserver};
use std::io::{BufRead, IsTerminal};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;

/// Prints controller output to the terminal
pub struct ConsoleObserver {
    cycles: Option<mpsc::UnboundedSender<CycleOutcome>>,
    interactive: bool,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            cycles: None,
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Forward every completed cycle to `tx`
    pub fn with_cycle_channel(mut self, tx: mpsc::UnboundedSender<CycleOutcome>) -> Self {
        self.cycles = Some(tx);
        self
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanObserver for ConsoleObserver {
    fn log(&self, entry: LogEntry) {
        println!("{}", format_log_line(&entry));
    }

    fn show_booking(&self, result: &LookupResult) {
        println!("{}", format_lookup(result));
    }

    fn alert(&self, message: &str) {
        eprintln!("\n!! {message}");
        if self.interactive {
            eprint!("Press Enter to continue...");
            run_blocking(|| {
                let mut line = String::new();
                let _ = std::io::stdin().lock().read_line(&mut line);
            });
        }
    }

    fn cycle_completed(&self, outcome: &CycleOutcome) {
        if let Some(tx) = &self.cycles {
            let _ = tx.send(outcome.clone());
        }
    }
}

/// Run blocking work without stalling the runtime's other tasks
///
/// Alerts fire from inside controller futures, so a worker thread has to
/// be handed off before waiting on the terminal.
fn run_blocking<R>(work: impl FnOnce() -> R) -> R {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

fn format_log_line(entry: &LogEntry) -> String {
    let level = match entry.level {
        LogLevel::Info => "INFO ",
        LogLevel::Warn => "WARN ",
        LogLevel::Error => "ERROR",
    };
    format!(
        "[{}] {} {}",
        entry.at.format("%H:%M:%S"),
        level,
        entry.message
    )
}

fn format_lookup(result: &LookupResult) -> String {
    match result {
        LookupResult::Found(booking) => format_booking(booking),
        LookupResult::NotFound => "No booking found".to_string(),
        LookupResult::Error(reason) => format!("Lookup failed: {reason}"),
    }
}

fn format_booking(booking: &Booking) -> String {
    let rows = [
        ("Registration", booking.reg.clone()),
        ("Booking", booking.booking_id.clone()),
        ("Status", booking.status.clone()),
        ("Customer", booking.customer.clone()),
        ("Phone", booking.phone.clone()),
        ("Product", booking.product.clone()),
        ("Terminal", booking.terminal.clone()),
        (
            "Arrival",
            booking.arrival.format("%Y-%m-%d %H:%M UTC").to_string(),
        ),
    ];

    let mut out = String::from("Booking found");
    for (label, value) in rows {
        if !value.is_empty() {
            out.push_str(&format!("\n  {label:<13}{value}"));
        }
    }
    out
}
