//! Debounced request buffer
//!
//! Each call to [`BufferedRequest::request`] opens or extends a debounce
//! window. When the window elapses without another request the supplier runs
//! once, and every caller from that window receives the same value through a
//! shared handle. A request made after the supplier started opens a new
//! window.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::{EngineError, Result};

type Supplier<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Thread-safe request buffer
pub struct BufferedRequest<T> {
    window: Duration,
    runtime: Handle,
    supplier: Supplier<T>,
    /// The active processor, if one has been started
    current: Mutex<Option<Arc<Processor<T>>>>,
}

impl<T> BufferedRequest<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a buffer bound to the current Tokio runtime
    ///
    /// # Arguments
    ///
    /// * `window` - Debounce window restarted by every request
    /// * `supplier` - The buffered work
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRuntime`] outside of a Tokio runtime.
    pub fn new<F>(window: Duration, supplier: F) -> Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(window, runtime, supplier))
    }

    /// Creates a buffer that schedules its work on `runtime`
    pub fn with_runtime<F>(window: Duration, runtime: Handle, supplier: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            window,
            runtime,
            supplier: Arc::new(supplier),
            current: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Makes a request to the buffer
    ///
    /// Never blocks: the returned handle resolves once the window closes and
    /// the supplier has run.
    pub fn request(&self) -> RequestHandle<T> {
        let mut current = self.current.lock();

        if let Some(processor) = current.as_ref() {
            if processor.extend(self) {
                return processor.handle();
            }
        }

        let processor = Processor::start(self);
        let handle = processor.handle();
        *current = Some(processor);
        handle
    }

    /// Whether a window is open and its work has not started yet
    pub fn is_enqueued(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map_or(false, |processor| processor.state.lock().usable)
    }

    /// Runs the supplier on the calling thread, bypassing the buffer
    pub fn request_directly(&self) -> T {
        (self.supplier)()
    }
}

impl<T> fmt::Debug for BufferedRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedRequest")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

struct ProcessorState<T> {
    /// Cleared once the work has started; the processor can no longer be extended
    usable: bool,
    /// Identifier of the only timer task allowed to run the work
    bound_task: u64,
    scheduled: Option<JoinHandle<()>>,
    sender: Option<oneshot::Sender<T>>,
}

struct Processor<T> {
    state: Mutex<ProcessorState<T>>,
    future: Shared<oneshot::Receiver<T>>,
}

impl<T> Processor<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn start(buffer: &BufferedRequest<T>) -> Arc<Self> {
        let (sender, receiver) = oneshot::channel();
        let processor = Arc::new(Self {
            state: Mutex::new(ProcessorState {
                usable: true,
                bound_task: 0,
                scheduled: None,
                sender: Some(sender),
            }),
            future: receiver.shared(),
        });

        {
            let mut state = processor.state.lock();
            processor.schedule(&mut state, buffer);
        }
        processor
    }

    fn handle(&self) -> RequestHandle<T> {
        RequestHandle {
            inner: self.future.clone(),
        }
    }

    /// Restarts the window; `false` if the work already started
    fn extend(self: &Arc<Self>, buffer: &BufferedRequest<T>) -> bool {
        let mut state = self.state.lock();
        if !state.usable {
            return false;
        }
        if let Some(task) = state.scheduled.take() {
            task.abort();
        }
        self.schedule(&mut state, buffer);
        true
    }

    fn schedule(self: &Arc<Self>, state: &mut ProcessorState<T>, buffer: &BufferedRequest<T>) {
        state.bound_task += 1;
        let task_id = state.bound_task;
        let processor = Arc::clone(self);
        let supplier = Arc::clone(&buffer.supplier);
        let window = buffer.window;
        let runtime = buffer.runtime.clone();

        state.scheduled = Some(buffer.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            processor.complete(task_id, supplier, runtime).await;
        }));
    }

    async fn complete(&self, task_id: u64, supplier: Supplier<T>, runtime: Handle) {
        let sender = {
            let mut state = self.state.lock();
            // a reschedule may have raced this timer past its abort
            if !state.usable || state.bound_task != task_id {
                return;
            }
            state.usable = false;
            state.scheduled = None;
            state.sender.take()
        };

        match runtime.spawn_blocking(move || supplier()).await {
            Ok(value) => {
                if let Some(sender) = sender {
                    let _ = sender.send(value);
                }
                debug!("Buffered request completed");
            }
            Err(e) => {
                // dropping the sender resolves every handle with an error
                error!("Buffered request failed while computing a result: {}", e);
            }
        }
    }
}

/// Shared completion handle returned by [`BufferedRequest::request`]
#[derive(Clone)]
pub struct RequestHandle<T> {
    inner: Shared<oneshot::Receiver<T>>,
}

impl<T: Clone> Future for RequestHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx).map(|result| {
            result.map_err(|_| EngineError::Cancelled("buffered work produced no result".into()))
        })
    }
}

impl<T> fmt::Debug for RequestHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle").finish_non_exhaustive()
    }
}
