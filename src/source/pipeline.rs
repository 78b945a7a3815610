use super::Records;
use crate::error::ImportError;
use crate::types::Record;
use crossbeam_channel::{bounded, Receiver};
use std::thread::{self, JoinHandle};

/// Runs a record source on a producer thread
///
/// The channel is bounded, so the parser can run at most `capacity` records
/// ahead of the importer. Errors travel through the channel in order, after
/// the records that preceded them. Dropping the pipeline disconnects the
/// channel; the producer notices on its next send and exits.
pub struct Pipeline {
    rx: Option<Receiver<Result<Record, ImportError>>>,
    handle: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Fails only if the operating system refuses to start the thread
    pub fn spawn(records: Records, capacity: usize) -> std::io::Result<Self> {
        let (tx, rx) = bounded(capacity.max(1));

        let handle = thread::Builder::new()
            .name("pji-row-source".to_string())
            .spawn(move || {
                for item in records {
                    let failed = item.is_err();
                    if tx.send(item).is_err() {
                        log::debug!("row source stopped: importer hung up");
                        return;
                    }
                    if failed {
                        return;
                    }
                }
            })?;

        Ok(Pipeline {
            rx: Some(rx),
            handle: Some(handle),
        })
    }
}

impl Iterator for Pipeline {
    type Item = Result<Record, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Disconnect first so a producer blocked on a full channel wakes up
        self.rx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("row source thread panicked");
            }
        }
    }
}
