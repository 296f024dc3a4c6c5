//! Interrupt handling
//!
//! The first Ctrl-C cancels the shared token: chart acquisition aborts at
//! once and the remaining stages stop at their next boundary. A second
//! Ctrl-C exits immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use crate::exit_codes;

/// What an interrupt should do, given how many came before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    Cancel,
    Exit,
}

impl InterruptAction {
    fn for_count(previous: usize) -> Self {
        if previous == 0 {
            InterruptAction::Cancel
        } else {
            InterruptAction::Exit
        }
    }
}

/// Install the process-wide Ctrl-C handler
pub fn install(cancel: CancellationToken) -> Result<(), ctrlc::Error> {
    let count = Arc::new(AtomicUsize::new(0));
    ctrlc::set_handler(move || {
        match InterruptAction::for_count(count.fetch_add(1, Ordering::SeqCst)) {
            InterruptAction::Cancel => {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
            InterruptAction::Exit => {
                eprintln!("interrupted again, exiting");
                std::process::exit(exit_codes::GENERATE_ERROR);
            }
        }
    })
}
