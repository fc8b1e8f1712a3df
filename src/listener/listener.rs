use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures::future::BoxFuture;
use futures::FutureExt;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::dictionary_status;
use crate::AccessTokenProvider;
use crate::DictionaryChangeEvent;
use crate::ListenerError;
use crate::MessageStream;
use crate::OAuth2TokenProvider;
use crate::PushTransport;
use crate::Result;
use crate::Settings;
use crate::SseTransport;
use crate::DICTIONARY_OBJECT_TYPE;
use crate::EVENT_LISTENER_ROUTE;

/// Listener connection lifecycle. There is no retry transition: once
/// `Closed`, a new instance is required to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStatus {
    Uninitialized,
    Connecting,
    Open,
    Closed,
}

/// Outcome of one dictionary callback invocation
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

type StoredCallback = Box<dyn Fn(Value) -> BoxFuture<'static, CallbackResult> + Send + Sync>;

/// Per-status callback slots, looked up at dispatch time so callbacks can be
/// set or cleared at any moment.
#[derive(Default)]
struct CallbackSlots {
    added: ArcSwapOption<StoredCallback>,
    updated: ArcSwapOption<StoredCallback>,
    deleted: ArcSwapOption<StoredCallback>,
}

/// Listens for dictionary changes pushed by the editor backend.
///
/// ```rust,ignore
/// let listener = DictionaryListener::new(None)?;
/// listener.on_dictionary_change(|dictionary| async move {
///     rebuild_dictionary(dictionary).await?;
///     Ok(())
/// });
/// listener.initialize().await?;
/// // ... later
/// listener.cleanup();
/// ```
pub struct DictionaryListener {
    settings: Settings,
    auth: Arc<dyn AccessTokenProvider>,
    transport: Arc<dyn PushTransport>,
    callbacks: Arc<CallbackSlots>,
    status: Arc<Mutex<ListenerStatus>>,
    shutdown: CancellationToken,
}

impl DictionaryListener {
    /// Listener against the configured editor backend. `settings: None`
    /// loads the process-wide configuration.
    pub fn new(settings: Option<Settings>) -> Result<Self> {
        let settings = match settings {
            Some(settings) => settings,
            None => Settings::load(None)?,
        };
        let auth = Arc::new(OAuth2TokenProvider::new(&settings.editor));
        Ok(Self::with_parts(settings, auth, Arc::new(SseTransport::new())))
    }

    /// Assemble a listener from explicit collaborators.
    pub fn with_parts(
        settings: Settings,
        auth: Arc<dyn AccessTokenProvider>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            settings,
            auth,
            transport,
            callbacks: Arc::new(CallbackSlots::default()),
            status: Arc::new(Mutex::new(ListenerStatus::Uninitialized)),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> ListenerStatus {
        *self.status.lock()
    }

    /// Callback for `ADDED` dictionaries.
    pub fn on_dictionary_added<F, Fut>(
        &self,
        callback: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CallbackResult> + Send + 'static,
    {
        self.callbacks.added.store(Some(Arc::new(Box::new(move |dictionary| {
            callback(dictionary).boxed()
        }))));
    }

    /// Callback for `UPDATED` dictionaries.
    pub fn on_dictionary_change<F, Fut>(
        &self,
        callback: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CallbackResult> + Send + 'static,
    {
        self.callbacks.updated.store(Some(Arc::new(Box::new(move |dictionary| {
            callback(dictionary).boxed()
        }))));
    }

    /// Callback for `DELETED` dictionaries.
    pub fn on_dictionary_deleted<F, Fut>(
        &self,
        callback: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CallbackResult> + Send + 'static,
    {
        self.callbacks.deleted.store(Some(Arc::new(Box::new(move |dictionary| {
            callback(dictionary).boxed()
        }))));
    }

    pub fn clear_dictionary_added(&self) {
        self.callbacks.added.store(None);
    }

    pub fn clear_dictionary_change(&self) {
        self.callbacks.updated.store(None);
    }

    pub fn clear_dictionary_deleted(&self) {
        self.callbacks.deleted.store(None);
    }

    /// Open the push connection and start dispatching events.
    ///
    /// Every failure path is logged, leaves the listener `Closed` and is
    /// returned to the caller; nothing panics. Calling this on a listener
    /// that is not fresh fails with [`ListenerError::AlreadyInitialized`].
    pub async fn initialize(&self) -> Result<()> {
        {
            let mut status = self.status.lock();
            if *status != ListenerStatus::Uninitialized {
                warn!("dictionary listener initialize() called twice");
                return Err(ListenerError::AlreadyInitialized.into());
            }
            *status = ListenerStatus::Connecting;
        }

        let token = match self.auth.access_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                error!("dictionary listener initialization failed: no access token");
                *self.status.lock() = ListenerStatus::Closed;
                return Err(ListenerError::MissingAccessToken.into());
            }
            Err(e) => {
                error!("dictionary listener initialization failed: {e}");
                *self.status.lock() = ListenerStatus::Closed;
                return Err(e.into());
            }
        };

        let url = format!(
            "{}/{}/{}",
            self.settings.editor.backend_url.trim_end_matches('/'),
            EVENT_LISTENER_ROUTE,
            token
        );

        let stream = match self.transport.connect(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("dictionary listener connection failed: {e}");
                *self.status.lock() = ListenerStatus::Closed;
                return Err(e.into());
            }
        };

        *self.status.lock() = ListenerStatus::Open;
        self.spawn_pump(stream);

        info!("dictionary listener initialized");
        Ok(())
    }

    /// Close the connection. Safe to call multiple times; a no-op once
    /// closed.
    pub fn cleanup(&self) {
        let mut status = self.status.lock();
        if *status == ListenerStatus::Closed {
            return;
        }
        self.shutdown.cancel();
        *status = ListenerStatus::Closed;
        info!("dictionary listener cleaned up");
    }

    fn spawn_pump(
        &self,
        mut stream: MessageStream,
    ) {
        let callbacks = self.callbacks.clone();
        let status = self.status.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = stream.next() => match message {
                        Some(Ok(payload)) => handle_message(&callbacks, &payload).await,
                        Some(Err(e)) => {
                            // Any transport error tears the listener down;
                            // reconnection is the caller's responsibility.
                            error!("dictionary listener transport error: {e}");
                            close(&status, &shutdown);
                            break;
                        }
                        None => {
                            warn!("dictionary event stream ended by server");
                            close(&status, &shutdown);
                            break;
                        }
                    }
                }
            }
        });
    }
}

impl Drop for DictionaryListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn close(
    status: &Mutex<ListenerStatus>,
    shutdown: &CancellationToken,
) {
    shutdown.cancel();
    *status.lock() = ListenerStatus::Closed;
}

/// Dispatch one pushed batch. Events are handled strictly in arrival order;
/// unknown object types and statuses are skipped, and a failing callback
/// does not abort the rest of the batch.
async fn handle_message(
    callbacks: &CallbackSlots,
    payload: &str,
) {
    let batch: Vec<DictionaryChangeEvent> = match serde_json::from_str(payload) {
        Ok(batch) => batch,
        Err(e) => {
            warn!("skipping malformed dictionary event batch: {e}");
            return;
        }
    };

    for event in batch {
        if event.object_type != DICTIONARY_OBJECT_TYPE {
            warn!(object_type = %event.object_type, "ignoring unknown object type");
            continue;
        }

        let slot = match event.status.as_str() {
            dictionary_status::ADDED => &callbacks.added,
            dictionary_status::UPDATED => &callbacks.updated,
            dictionary_status::DELETED => &callbacks.deleted,
            other => {
                warn!(status = %other, "ignoring unhandled dictionary status");
                continue;
            }
        };

        match slot.load_full() {
            Some(callback) => {
                if let Err(e) = callback(event.dictionary).await {
                    error!("dictionary callback failed: {e}");
                }
            }
            None => debug!(status = %event.status, "no callback registered for event"),
        }
    }
}

#[cfg(test)]
pub(crate) async fn dispatch_batch_for_test(
    listener: &DictionaryListener,
    payload: &str,
) {
    handle_message(&listener.callbacks, payload).await;
}
