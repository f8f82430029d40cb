//! Trailing debounce: coalesce a burst of values into one action call.
//!
//! Each `Debouncer` owns a worker thread fed over an mpsc channel. A value
//! arms the timer; further values within the delay replace the pending one;
//! the action fires with the last value once a full delay passes with no new
//! input. Dropping the debouncer flushes a pending value before the worker
//! exits, so a trailing edit is never lost on teardown.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

pub struct Debouncer<T: Send + 'static> {
    tx: Sender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>();
        let spawned = thread::Builder::new()
            .name("debounce".to_string())
            .spawn(move || {
                while let Ok(first) = rx.recv() {
                    let mut pending = first;
                    loop {
                        match rx.recv_timeout(delay) {
                            Ok(next) => pending = next,
                            Err(RecvTimeoutError::Timeout) => {
                                action(pending);
                                break;
                            }
                            Err(RecvTimeoutError::Disconnected) => {
                                action(pending);
                                return;
                            }
                        }
                    }
                }
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn debounce worker: {e}");
        }
        Self { tx }
    }

    /// Feeds one value. Restarts the quiescence timer; only the last value of
    /// a burst reaches the action.
    pub fn call(&self, value: T) {
        if self.tx.send(value).is_err() {
            log::warn!("Debounce worker is gone; dropping value");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn collect() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v| sink.lock().unwrap().push(v))
    }

    #[test]
    fn burst_coalesces_to_last_value() {
        let (seen, action) = collect();
        let debouncer = Debouncer::new(Duration::from_millis(25), action);
        for v in 0..10 {
            debouncer.call(v);
        }
        thread::sleep(Duration::from_millis(150));
        assert_eq!(*seen.lock().unwrap(), vec![9]);
    }

    #[test]
    fn separated_calls_each_fire() {
        let (seen, action) = collect();
        let debouncer = Debouncer::new(Duration::from_millis(10), action);
        debouncer.call(1);
        thread::sleep(Duration::from_millis(80));
        debouncer.call(2);
        thread::sleep(Duration::from_millis(80));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn drop_flushes_pending_value() {
        let (seen, action) = collect();
        let debouncer = Debouncer::new(Duration::from_secs(60), action);
        debouncer.call(7);
        // Give the worker a beat to pick the value up before disconnect.
        thread::sleep(Duration::from_millis(50));
        drop(debouncer);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }
}
