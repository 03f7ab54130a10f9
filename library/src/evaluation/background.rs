//! Generation-guarded background computation.
//!
//! A long-running `process()` may offload work to a worker thread, but a
//! result may only be published for the request generation that is still
//! current: a computation superseded by a newer request is discarded when
//! it finishes, never committed. Last-writer-wins is not acceptable here.

use std::sync::mpsc;
use std::thread;

use log::debug;

pub struct BackgroundCompute<T: Send + 'static> {
    generation: u64,
    in_flight: bool,
    tx: mpsc::Sender<(u64, T)>,
    rx: mpsc::Receiver<(u64, T)>,
}

impl<T: Send + 'static> BackgroundCompute<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            generation: 0,
            in_flight: false,
            tx,
            rx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Start a computation, superseding any still-running one. The older
    /// computation keeps running to completion but its result is dropped.
    pub fn start<F>(&mut self, f: F)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.generation += 1;
        self.in_flight = true;
        let generation = self.generation;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let value = f();
            // The receiver outlives workers unless the owner was dropped;
            // a send failure then just discards the result.
            let _ = tx.send((generation, value));
        });
    }

    /// Non-blocking: the finished result of the current generation, if it
    /// has arrived. Stale results from superseded generations are drained
    /// and discarded.
    pub fn poll(&mut self) -> Option<T> {
        let mut current = None;
        while let Ok((generation, value)) = self.rx.try_recv() {
            if generation == self.generation {
                current = Some(value);
            } else {
                debug!(
                    "discarding stale background result (generation {} superseded by {})",
                    generation, self.generation
                );
            }
        }
        if current.is_some() {
            self.in_flight = false;
        }
        current
    }

    /// Block until the current generation's result arrives. Returns `None`
    /// if nothing is in flight.
    pub fn block_on_current(&mut self) -> Option<T> {
        if !self.in_flight {
            return None;
        }
        loop {
            match self.rx.recv() {
                Ok((generation, value)) if generation == self.generation => {
                    self.in_flight = false;
                    return Some(value);
                }
                Ok((generation, _)) => {
                    debug!(
                        "discarding stale background result (generation {} superseded by {})",
                        generation, self.generation
                    );
                }
                Err(_) => return None,
            }
        }
    }
}

impl<T: Send + 'static> Default for BackgroundCompute<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_superseded_result_is_discarded() {
        let mut bg: BackgroundCompute<i32> = BackgroundCompute::new();

        let (gate1_tx, gate1_rx) = mpsc::channel::<()>();
        bg.start(move || {
            gate1_rx.recv().unwrap();
            1
        });
        let (gate2_tx, gate2_rx) = mpsc::channel::<()>();
        bg.start(move || {
            gate2_rx.recv().unwrap();
            2
        });

        // Let the stale computation finish first; its result must never be
        // published.
        gate1_tx.send(()).unwrap();
        gate2_tx.send(()).unwrap();
        assert_eq!(bg.block_on_current(), Some(2));
        assert_eq!(bg.poll(), None);
    }

    #[test]
    fn test_block_without_start_returns_none() {
        let mut bg: BackgroundCompute<i32> = BackgroundCompute::new();
        assert_eq!(bg.block_on_current(), None);
    }

    #[test]
    fn test_poll_returns_current_generation() {
        let mut bg: BackgroundCompute<&str> = BackgroundCompute::new();
        bg.start(|| "done");
        assert_eq!(bg.block_on_current(), Some("done"));
        assert!(!bg.is_in_flight());
    }
}
