use crate::error::{PickerError, Result};
use crate::traits::ContentFrame;
use crate::types::{Endpoint, FrameEvent};
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;

/// Keeps a frame subscription alive; deregisters on drop, exactly once,
/// however `load` settles.
struct SignalGuard<'a, F: ContentFrame + ?Sized> {
    frame: &'a F,
    signals: UnboundedReceiver<FrameEvent>,
}

impl<'a, F: ContentFrame + ?Sized> SignalGuard<'a, F> {
    fn attach(frame: &'a F) -> Self {
        let signals = frame.subscribe();
        Self { frame, signals }
    }
}

impl<F: ContentFrame + ?Sized> Drop for SignalGuard<'_, F> {
    fn drop(&mut self) {
        self.frame.unsubscribe();
    }
}

/// Navigate `frame` to `target` and wait for the first of: load, error, timeout.
///
/// One-shot: retrying is the caller's job.
pub async fn load<F>(frame: &F, target: &Endpoint, timeout: Duration) -> Result<()>
where
    F: ContentFrame + ?Sized,
{
    let mut guard = SignalGuard::attach(frame);
    frame.navigate(target);
    tracing::debug!(%target, timeout_ms = timeout.as_millis() as u64, "Loading content");

    tokio::select! {
        event = guard.signals.recv() => match event {
            Some(FrameEvent::Loaded) => {
                tracing::info!(%target, "Content loaded");
                Ok(())
            }
            Some(FrameEvent::Failed(reason)) => {
                tracing::warn!(%target, %reason, "Content failed to load");
                Err(PickerError::LoadError(reason))
            }
            None => Err(PickerError::LoadError("frame closed before settling".to_string())),
        },
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(%target, "Content load timed out");
            Err(PickerError::LoadTimeout(timeout.as_millis() as u64))
        }
    }
}

/// Native frame: "navigating" fetches the origin root. Any HTTP response
/// fires `Loaded` (an error page still loads); transport failure fires `Failed`.
///
/// At most one navigation is in flight: a new `navigate` or an `unsubscribe`
/// cancels the previous request and closes its connection.
pub struct HttpFrame {
    client: Client,
    listener: Mutex<Option<UnboundedSender<FrameEvent>>>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl HttpFrame {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            listener: Mutex::new(None),
            in_flight: Mutex::new(None),
        })
    }

    fn cancel_in_flight(&self) {
        if let Some(handle) = self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).take() {
            handle.abort();
        }
    }
}

impl ContentFrame for HttpFrame {
    fn subscribe(&self) -> UnboundedReceiver<FrameEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }

    fn unsubscribe(&self) {
        self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.cancel_in_flight();
    }

    fn navigate(&self, target: &Endpoint) {
        self.cancel_in_flight();

        let listener = self.listener.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let request = self.client.get(target.root_url()).send();
        let task = tokio::spawn(async move {
            let event = match request.await {
                Ok(_) => FrameEvent::Loaded,
                Err(e) => FrameEvent::Failed(e.to_string()),
            };
            // Nobody listening any more is fine.
            if let Some(tx) = listener {
                let _ = tx.send(event);
            }
        });
        *self.in_flight.lock().unwrap_or_else(|e| e.into_inner()) = Some(task.abort_handle());
    }
}
