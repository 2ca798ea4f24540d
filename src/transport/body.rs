//! Request body streaming.

use std::io::{self, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;

/// Callback that serializes the request payload onto a byte sink.
/// Executed on the blocking thread pool; it may block arbitrarily long.
pub type BodyWriter = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + Send + 'static>;

/// Request body handed to the transport: either empty or a stream of
/// chunks produced by a background marshalling task.
pub enum RemotingBody {
    Empty,
    Stream(ChannelBody),
}

impl Body for RemotingBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        match self.get_mut() {
            RemotingBody::Empty => Poll::Ready(None),
            RemotingBody::Stream(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self, RemotingBody::Empty)
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            RemotingBody::Empty => SizeHint::with_exact(0),
            RemotingBody::Stream(_) => SizeHint::default(),
        }
    }
}

/// Body streaming chunks out of a bounded channel.
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        match self.get_mut().rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A marshalled request body plus the slot where a serialization failure
/// is reported. The slot takes precedence over the secondary transport
/// error the failed body causes.
pub struct MarshalledBody {
    pub body: RemotingBody,
    pub error: Arc<Mutex<Option<io::Error>>>,
}

/// Run `writer` on the blocking thread pool, streaming whatever it writes
/// into the returned body. On writer failure the body stream is poisoned
/// with an error frame and the original error is parked in the slot.
pub fn spawn_marshaller(writer: BodyWriter) -> MarshalledBody {
    let (tx, rx) = mpsc::channel(8);
    let slot = Arc::new(Mutex::new(None));
    let error_slot = slot.clone();
    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelWriter { tx: tx.clone() };
        let result = (|| {
            let mut buffered = io::BufWriter::new(&mut sink);
            writer(&mut buffered)?;
            buffered.flush()
        })();
        if let Err(e) = result {
            tracing::debug!(error = %e, "request marshalling failed");
            let poison = io::Error::new(e.kind(), e.to_string());
            if let Ok(mut slot) = error_slot.lock() {
                *slot = Some(e);
            }
            let _ = tx.blocking_send(Err(poison));
        }
        // Dropping tx ends the stream.
    });
    MarshalledBody {
        body: RemotingBody::Stream(ChannelBody { rx }),
        error: slot,
    }
}

struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| {
                io::Error::new(io::ErrorKind::BrokenPipe, "request body receiver dropped")
            })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
