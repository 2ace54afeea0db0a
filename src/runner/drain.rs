//! Drain tasks: copy a child's output pipe into the shared tee.

use std::io::Write;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

use crate::runner::tee::{lock, SharedTee};
use crate::sink::LogSink;

const CHUNK_SIZE: usize = 8 * 1024;

/// Spawn a detached task that copies `source` into `tee` until EOF.
///
/// Read and write errors are reported to the sink at debug level and end the
/// task; they never reach the invocation. Each chunk is written under the
/// tee's lock, so the two drains interleave at chunk granularity.
pub fn spawn_drain<R, S>(stream: &'static str, source: R, tee: SharedTee<S>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: LogSink + 'static,
{
    tokio::spawn(drain(stream, source, tee))
}

async fn drain<R, S>(stream: &'static str, mut source: R, tee: SharedTee<S>)
where
    R: AsyncRead + Unpin,
    S: LogSink,
{
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match source.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let sink = lock(&tee).sink().clone();
                sink.debug("While copying streams", &e);
                break;
            }
        };

        let mut writer = lock(&tee);
        if let Err(e) = writer.write_all(&chunk[..n]) {
            let sink = writer.sink().clone();
            drop(writer);
            sink.debug("While copying streams", &e);
            break;
        }
    }
    tracing::trace!(stream, "drain finished");
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;
    use crate::runner::tee::LineTeeWriter;
    use crate::sink::testing::RecordingSink;

    /// Yields its data once, then fails every read.
    struct BrokenPipe {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "pipe closed",
                ))),
            }
        }
    }

    #[tokio::test]
    async fn test_drain_copies_until_eof() {
        let sink = Arc::new(RecordingSink::default());
        let tee = LineTeeWriter::shared(sink.clone());

        let source: &[u8] = b"a\nb\nc";
        spawn_drain("stdout", source, tee.clone()).await.unwrap();

        assert_eq!(sink.lines(), ["a", "b"]);
        assert_eq!(lock(&tee).pending(), b"c");
        assert!(sink.debugs().is_empty());
    }

    #[tokio::test]
    async fn test_drain_swallows_read_errors() {
        let sink = Arc::new(RecordingSink::default());
        let tee = LineTeeWriter::shared(sink.clone());

        let source = BrokenPipe {
            data: Some(b"before break\n"),
        };
        let result = spawn_drain("stderr", source, tee).await;

        assert!(result.is_ok(), "drain task must finish normally");
        assert_eq!(sink.lines(), ["before break"]);
        assert_eq!(sink.debugs(), ["While copying streams: pipe closed"]);
    }

    #[tokio::test]
    async fn test_two_drains_share_one_tee() {
        let sink = Arc::new(RecordingSink::default());
        let tee = LineTeeWriter::shared(sink.clone());

        let out: &[u8] = b"out-1\nout-2\n";
        let err: &[u8] = b"err-1\n";
        let h1 = spawn_drain("stdout", out, tee.clone());
        let h2 = spawn_drain("stderr", err, tee.clone());
        h1.await.unwrap();
        h2.await.unwrap();

        let mut lines = sink.lines();
        lines.sort();
        assert_eq!(lines, ["err-1", "out-1", "out-2"]);
    }
}
