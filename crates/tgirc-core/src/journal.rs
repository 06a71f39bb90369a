//! Daily-rotating audit log writer.
//!
//! Producers hold a cheap [`LogSink`] and push [`LogRecord`]s into a bounded
//! queue. A single worker task owns the open file, so there is never more than
//! one writer per file.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{Local, NaiveDate};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWriteExt, BufWriter, Stdout},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{errors::Error, record::LogRecord, Result};

pub const DEFAULT_QUEUE_CAPACITY: usize = 32;
pub const DEFAULT_FLUSH_EVERY: usize = 5;

/// Source of the calendar day used as the rotation key.
pub trait Clock: Send + Sync + 'static {
    fn today(&self) -> NaiveDate;
}

/// Process-local calendar day.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Clone, Debug)]
pub struct JournalConfig {
    pub dir: PathBuf,
    pub queue_capacity: usize,
    pub flush_every: usize,
    pub echo_stdout: bool,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_every: DEFAULT_FLUSH_EVERY,
            echo_stdout: false,
        }
    }
}

/// File name for a given day, e.g. `2024-05-01.log`.
pub fn file_name(day: NaiveDate) -> String {
    format!("{}.log", day.format("%Y-%m-%d"))
}

/// Producer handle. Cloning is cheap; every clone feeds the same worker.
#[derive(Clone, Debug)]
pub struct LogSink {
    tx: mpsc::Sender<LogRecord>,
}

impl LogSink {
    /// A sink with no file behind it; records arrive on the returned receiver.
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a record, waiting for queue space if the writer is behind.
    pub async fn submit(&self, record: LogRecord) -> Result<()> {
        self.tx.send(record).await.map_err(|_| Error::LogClosed)
    }
}

/// Owner handle of the writer task.
pub struct LogWriter {
    sink: LogSink,
    stop: CancellationToken,
    failed: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl LogWriter {
    /// Open today's file and start the worker.
    ///
    /// Fails if the first file cannot be opened; callers treat that as fatal.
    pub async fn start(cfg: JournalConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let today = clock.today();
        let file = DayFile::open(&cfg.dir, today).await?;

        let (tx, rx) = mpsc::channel(cfg.queue_capacity.max(1));
        let stop = CancellationToken::new();
        let failed = CancellationToken::new();

        let worker = Worker {
            flush_every: cfg.flush_every.max(1),
            stdout: cfg.echo_stdout.then(tokio::io::stdout),
            dir: cfg.dir,
            clock,
            rx,
            stop: stop.clone(),
            file: Some(file),
            pending: 0,
        };
        let task = tokio::spawn(worker.run(failed.clone()));

        Ok(Self {
            sink: LogSink { tx },
            stop,
            failed,
            task,
        })
    }

    pub fn sink(&self) -> LogSink {
        self.sink.clone()
    }

    /// Cancelled when the worker stops because of an I/O failure.
    pub fn failed(&self) -> CancellationToken {
        self.failed.clone()
    }

    /// Flush, fsync and close the current file, returning the worker's outcome.
    ///
    /// Records already queued are written before the file is closed. Producers
    /// should have stopped by now; anything submitted afterwards is rejected
    /// with [`Error::LogClosed`].
    pub async fn shutdown(self) -> Result<()> {
        self.stop.cancel();
        drop(self.sink);
        match self.task.await {
            Ok(res) => res,
            Err(e) => Err(Error::External(format!("log writer task failed: {e}"))),
        }
    }
}

struct DayFile {
    day: NaiveDate,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl DayFile {
    async fn open(dir: &Path, day: NaiveDate) -> Result<Self> {
        let path = dir.join(file_name(day));

        let mut opts = OpenOptions::new();
        opts.create(true).append(true);
        #[cfg(unix)]
        opts.mode(0o600);

        let file = opts.open(&path).await.map_err(|source| Error::LogFile {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "opened log file");

        Ok(Self {
            day,
            path,
            writer: BufWriter::new(file),
        })
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|source| Error::LogFile {
            path: self.path.clone(),
            source,
        })
    }

    async fn close(mut self) -> Result<()> {
        self.flush().await?;
        self.writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|source| Error::LogFile {
                path: self.path.clone(),
                source,
            })?;
        debug!(path = %self.path.display(), "closed log file");
        Ok(())
    }
}

struct Worker {
    dir: PathBuf,
    flush_every: usize,
    stdout: Option<Stdout>,
    clock: Arc<dyn Clock>,
    rx: mpsc::Receiver<LogRecord>,
    stop: CancellationToken,
    file: Option<DayFile>,
    pending: usize,
}

impl Worker {
    async fn run(mut self, failed: CancellationToken) -> Result<()> {
        let res = self.run_inner().await;
        if let Err(e) = &res {
            error!("log writer failed: {e}");
            // Whatever is still buffered is worth one more try.
            if let Some(file) = self.file.as_mut() {
                if let Err(flush_err) = file.flush().await {
                    error!("final log flush failed: {flush_err}");
                }
            }
            failed.cancel();
        }
        res
    }

    async fn run_inner(&mut self) -> Result<()> {
        loop {
            let record = tokio::select! {
                biased;
                _ = self.stop.cancelled() => break,
                rec = self.rx.recv() => match rec {
                    Some(rec) => rec,
                    None => break,
                },
            };
            self.write(record).await?;
        }

        // Stop accepting, then write out whatever was queued before the stop.
        self.rx.close();
        while let Some(record) = self.rx.recv().await {
            self.write(record).await?;
        }

        if let Some(file) = self.file.take() {
            file.close().await?;
        }
        Ok(())
    }

    async fn write(&mut self, record: LogRecord) -> Result<()> {
        let today = self.clock.today();
        if self.file.as_ref().map(|f| f.day) != Some(today) {
            self.rotate(today).await?;
        }

        if let Some(out) = self.stdout.as_mut() {
            let echoed = match out.write_all(record.as_bytes()).await {
                Ok(()) => out.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = echoed {
                warn!("failed to echo log record: {e}");
            }
        }

        let file = self.file.as_mut().ok_or(Error::LogClosed)?;
        file.writer
            .write_all(record.as_bytes())
            .await
            .map_err(|source| Error::LogFile {
                path: file.path.clone(),
                source,
            })?;

        self.pending += 1;
        if self.pending >= self.flush_every {
            self.pending = 0;
            file.flush().await?;
        }
        Ok(())
    }

    /// Close the current day's file before the new one takes any writes.
    async fn rotate(&mut self, today: NaiveDate) -> Result<()> {
        if let Some(old) = self.file.take() {
            info!(from = %old.day, to = %today, "rotating log file");
            old.close().await?;
        }
        self.pending = 0;
        self.file = Some(DayFile::open(&self.dir, today).await?);
        Ok(())
    }
}
