//! Ordered, idempotent teardown.
//!
//! Order: IRC `QUIT`, then stop producers (listeners, console), then close the
//! log writer so nothing submitted during the first two steps is lost.

use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{journal::LogWriter, ports::IrcPort, Result};

/// How long producer tasks get to wind down before they are abandoned.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Teardown {
    writer: LogWriter,
    tasks: Vec<JoinHandle<()>>,
}

pub struct Shutdown {
    irc: Arc<dyn IrcPort>,
    quit_message: String,
    producers: CancellationToken,
    drain_timeout: Duration,
    teardown: Mutex<Option<Teardown>>,
}

impl Shutdown {
    pub fn new(irc: Arc<dyn IrcPort>, quit_message: impl Into<String>, writer: LogWriter) -> Self {
        Self {
            irc,
            quit_message: quit_message.into(),
            producers: CancellationToken::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            teardown: Mutex::new(Some(Teardown {
                writer,
                tasks: Vec::new(),
            })),
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Token that producers watch; cancelled in the second step of [`stop`].
    ///
    /// [`stop`]: Shutdown::stop
    pub fn producers(&self) -> CancellationToken {
        self.producers.clone()
    }

    /// Register a producer task to be awaited before the log is closed.
    ///
    /// Tasks tracked after shutdown began are aborted.
    pub async fn track(&self, task: JoinHandle<()>) {
        match self.teardown.lock().await.as_mut() {
            Some(t) => t.tasks.push(task),
            None => task.abort(),
        }
    }

    /// Run the teardown. Returns `Ok(false)` if it had already run.
    ///
    /// The error, if any, is the log writer's: a failed final flush means
    /// records were lost.
    pub async fn stop(&self) -> Result<bool> {
        let Some(Teardown { writer, tasks }) = self.teardown.lock().await.take() else {
            debug!("shutdown already done");
            return Ok(false);
        };
        info!("shutting down");

        if let Err(e) = self.irc.quit(&self.quit_message).await {
            warn!("IRC quit failed: {e}");
        }

        self.producers.cancel();
        for task in tasks {
            let abort = task.abort_handle();
            match timeout(self.drain_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => warn!("producer task failed: {e}"),
                Err(_) => {
                    warn!("producer task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }

        let res = writer.shutdown().await;
        match &res {
            Ok(()) => info!("log closed"),
            Err(e) => warn!("log writer failed on close: {e}"),
        }
        res.map(|()| true)
    }
}
