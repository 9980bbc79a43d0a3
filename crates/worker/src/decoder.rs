//! Streaming CSV decoder.
//!
//! The `csv` reader runs on a blocking thread fed through a
//! [`SyncIoBridge`], and hands rows to the async side over a bounded
//! channel. The file is read only as fast as rows are consumed. Dropping the
//! [`RowStream`] fails the reader's pending read, so a thread stuck on a
//! stalled source exits and releases it.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use csv::{ReaderBuilder, StringRecord};
use engine_core::limits::DECODER_CHANNEL_CAPACITY;
use engine_core::{ByteReader, CanonicalRow, Error, Result};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};
use tracing::debug;

/// Rows of one import file, renamed to a platform's canonical headers.
pub struct RowStream {
    rows: mpsc::Receiver<Result<CanonicalRow>>,
    _stop_reader: DropGuard,
}

impl RowStream {
    /// Starts decoding `reader`. The file's own header line is skipped and
    /// columns are named positionally from `headers`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(reader: ByteReader, headers: &'static [&'static str]) -> Self {
        Self::with_capacity(reader, headers, DECODER_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(
        reader: ByteReader,
        headers: &'static [&'static str],
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stop = CancellationToken::new();
        let bridge = SyncIoBridge::new(StoppableReader {
            inner: reader,
            stopped: Box::pin(stop.clone().cancelled_owned()),
        });

        tokio::task::spawn_blocking(move || decode(bridge, headers, tx));

        Self {
            rows: rx,
            _stop_reader: stop.drop_guard(),
        }
    }

    /// Next row, or `None` once the file is exhausted. A decode error ends
    /// the stream.
    pub async fn next(&mut self) -> Option<Result<CanonicalRow>> {
        self.rows.recv().await
    }
}

/// Fails every read, pending ones included, once its token is cancelled.
struct StoppableReader {
    inner: ByteReader,
    stopped: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl AsyncRead for StoppableReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.stopped.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(io::Error::other("row stream dropped")));
        }
        this.inner.as_mut().poll_read(cx, buf)
    }
}

fn decode(
    source: impl std::io::Read,
    headers: &'static [&'static str],
    tx: mpsc::Sender<Result<CanonicalRow>>,
) {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(source);

    let mut record = StringRecord::new();
    let mut line = 1u64;

    loop {
        let item = match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                line += 1;
                to_row(&record, headers, line)
            }
            Err(e) => Err(Error::decode(e.to_string())),
        };

        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("Row consumer dropped, stopping decoder");
            return;
        }
        if failed {
            return;
        }
    }
}

fn to_row(record: &StringRecord, headers: &[&str], line: u64) -> Result<CanonicalRow> {
    if record.len() != headers.len() {
        return Err(Error::decode(format!(
            "record {} has {} fields, expected {}",
            line,
            record.len(),
            headers.len()
        )));
    }

    Ok(headers
        .iter()
        .zip(record.iter())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}
