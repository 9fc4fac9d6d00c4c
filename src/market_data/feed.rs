use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

type Callback<T> = Box<dyn FnMut(T) + Send>;

/// Subscriber slot shared between a handle and the tasks it owns.
///
/// Emission holds the slot lock for the duration of the callback, so once
/// `close` has taken the callback out no later emission can reach it.
pub(crate) struct Sink<T> {
    slot: Arc<Mutex<Option<Callback<T>>>>,
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self { slot: Arc::clone(&self.slot) }
    }
}

impl<T> Sink<T> {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        Self { slot: Arc::new(Mutex::new(Some(Box::new(callback)))) }
    }

    /// Deliver `value`; false once the subscriber is gone.
    pub(crate) fn emit(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    fn close(&self) {
        self.slot.lock().take();
    }
}

/// Owner of a running subscription.
///
/// `cancel` stops every task the subscription spawned and drops the callback.
/// It is idempotent, and dropping the handle cancels as well. Do not call it
/// from inside the subscriber callback.
pub struct FeedHandle<T> {
    sink: Sink<T>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancelled: AtomicBool,
}

impl<T> FeedHandle<T> {
    pub(crate) fn new(sink: Sink<T>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { sink, tasks: Mutex::new(tasks), cancelled: AtomicBool::new(false) }
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sink.close();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task.abort();
        }
        debug!(tasks = count, "Feed cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl<T> Drop for FeedHandle<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_stops_after_close() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let sink = Sink::new(move |v: u32| seen_cb.lock().push(v));
        assert!(sink.emit(1));
        let handle = FeedHandle::new(sink.clone(), Vec::new());
        handle.cancel();
        assert!(!sink.emit(2));
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_aborts_tasks() {
        let sink = Sink::new(|_: ()| {});
        let task = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        let handle = FeedHandle::new(sink, vec![task]);
        assert_eq!(handle.task_count(), 1);
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.task_count(), 0);
    }
}
