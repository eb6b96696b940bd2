//! Per-session dispatch worker
//!
//! Each transport session gets one dedicated OS thread fed by an unbounded
//! crossbeam channel, so the dispatcher sees that session's messages one at
//! a time and in order while the socket task keeps reading.

use crate::codec::DecodedMessage;
use crate::traits::Dispatcher;
use crossbeam_channel::{unbounded, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Run the dispatcher on one message, containing errors and panics
pub(crate) fn dispatch_one(dispatcher: &dyn Dispatcher, message: &DecodedMessage) {
    match panic::catch_unwind(AssertUnwindSafe(|| dispatcher.handle(message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("[handler error] {}", e),
        Err(payload) => error!("[handler panic] {}", panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) struct DispatchWorker {
    tx: Option<Sender<DecodedMessage>>,
    handle: Option<thread::JoinHandle<()>>,
    // Used only when the worker thread could not be spawned
    inline: Option<Arc<dyn Dispatcher>>,
    label: String,
}

impl DispatchWorker {
    pub(crate) fn spawn(dispatcher: Arc<dyn Dispatcher>, label: &str) -> Self {
        let (tx, rx) = unbounded::<DecodedMessage>();
        let thread_dispatcher = Arc::clone(&dispatcher);
        let thread_label = label.to_string();

        let spawned = thread::Builder::new()
            .name(format!("dispatch-{}", label))
            .spawn(move || {
                for message in rx.iter() {
                    dispatch_one(thread_dispatcher.as_ref(), &message);
                }
                debug!(session = %thread_label, "Dispatch worker drained, exiting");
            });

        match spawned {
            Ok(handle) => Self {
                tx: Some(tx),
                handle: Some(handle),
                inline: None,
                label: label.to_string(),
            },
            Err(e) => {
                error!(session = %label, "Failed to spawn dispatch thread, dispatching inline: {}", e);
                Self {
                    tx: None,
                    handle: None,
                    inline: Some(dispatcher),
                    label: label.to_string(),
                }
            }
        }
    }

    pub(crate) fn dispatch(&self, message: DecodedMessage) {
        if let Some(tx) = &self.tx {
            // Only fails once the worker thread is gone
            if tx.send(message).is_err() {
                error!(session = %self.label, "Dispatch worker is gone, message dropped");
            }
        } else if let Some(dispatcher) = &self.inline {
            dispatch_one(dispatcher.as_ref(), &message);
        }
    }

    /// Close the channel and wait up to `grace` for queued messages to drain
    pub(crate) async fn finish(mut self, grace: Duration) {
        self.tx.take();
        let Some(handle) = self.handle.take() else {
            return;
        };
        let join = tokio::task::spawn_blocking(move || handle.join());
        match tokio::time::timeout(grace, join).await {
            Ok(_) => debug!(session = %self.label, "Dispatch worker joined"),
            Err(_) => debug!(
                session = %self.label,
                "Dispatch worker still busy after {:?}, detaching", grace
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Fragment;
    use crate::traits::DispatchError;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl Dispatcher for Recorder {
        fn handle(&self, message: &DecodedMessage) -> Result<(), DispatchError> {
            let text = match &message.fragment {
                Fragment::Raw(raw) => raw.clone(),
                Fragment::Structured(v) => v.to_string(),
            };
            if text.contains("panic") {
                panic!("dispatcher blew up");
            }
            if text.contains("fail") {
                return Err(DispatchError::new("refused"));
            }
            self.seen.lock().push(text);
            Ok(())
        }
    }

    fn raw(text: &str) -> DecodedMessage {
        DecodedMessage::from_fragment(Fragment::Raw(text.to_string()))
    }

    #[tokio::test]
    async fn test_errors_and_panics_do_not_stop_the_worker() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let worker = DispatchWorker::spawn(recorder.clone(), "t1");

        for text in ["one", "fail", "panic", "two"] {
            worker.dispatch(raw(text));
        }
        worker.finish(Duration::from_secs(5)).await;

        assert_eq!(*recorder.seen.lock(), vec!["one".to_string(), "two".to_string()]);
    }
}
