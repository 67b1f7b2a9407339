//! Parse-until-valid framing over a byte stream.
//!
//! The agent protocol has no length prefix or delimiter: a message is over
//! when the bytes received so far parse as one complete XML document. The
//! receiver reads in chunks, appends to an accumulation buffer, and retries
//! a full parse after every chunk. The first successful parse ends the read
//! — bytes past the root element's close are never consumed.
//!
//! The protocol has no liveness signal either, so every read is bounded by
//! the caller's timeout; a silent peer surfaces as [`AgentError::Timeout`]
//! instead of hanging the call forever.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use storcon_wire::Element;

use crate::error::{AgentError, Result};

const READ_CHUNK: usize = 4096;

/// Receive one document, or `None` if the peer closed the stream before a
/// complete document accumulated.
pub async fn read_document<R>(stream: &mut R, read_timeout: Duration) -> Result<Option<Element>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match time::timeout(read_timeout, stream.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) => return Err(AgentError::Timeout),
        };
        if n == 0 {
            return Ok(Element::parse(&buf).ok());
        }
        buf.extend_from_slice(&chunk[..n]);
        match Element::parse(&buf) {
            Ok(doc) => {
                tracing::trace!(bytes = buf.len(), root = doc.name(), "received document");
                return Ok(Some(doc));
            }
            Err(err) => {
                tracing::trace!(buffered = buf.len(), "document not complete yet: {err}");
            }
        }
    }
}

/// Send one document, retrying partial writes until every byte is out.
pub async fn send_document<W>(stream: &mut W, doc: &Element, write_timeout: Duration) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let xml = doc.to_document_xml();
    tracing::trace!(bytes = xml.len(), root = doc.name(), "sending document");
    match time::timeout(write_timeout, async {
        stream.write_all(xml.as_bytes()).await?;
        stream.flush().await
    })
    .await
    {
        Ok(written) => Ok(written?),
        Err(_) => Err(AgentError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::net::{TcpListener, TcpStream};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn read_assembles_document_from_small_chunks() {
        // A 4-byte pipe forces the reader to accumulate across many reads.
        let (mut tx, mut rx) = duplex(4);
        let writer = tokio::spawn(async move {
            let doc = Element::new("hello")
                .with_attr("authenticated", "false")
                .with_attr("version", "1.0");
            send_document(&mut tx, &doc, TIMEOUT).await.unwrap();
        });

        let doc = read_document(&mut rx, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(doc.name(), "hello");
        assert_eq!(doc.attr("authenticated"), Some("false"));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn read_returns_first_document_and_ignores_trailing_bytes() {
        let (mut tx, mut rx) = duplex(4);
        let writer = tokio::spawn(async move {
            // The reader stops consuming once the document completes, so the
            // tail of this write fails when the read side is dropped.
            let _ = tx
                .write_all(b"<response ok=\"1\"/><second-document-we-never-want")
                .await;
        });

        let doc = read_document(&mut rx, TIMEOUT).await.unwrap().unwrap();
        assert_eq!(doc.name(), "response");
        drop(rx);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn read_reports_no_document_on_early_close() {
        let (mut tx, mut rx) = duplex(64);
        tx.write_all(b"<response><truncated").await.unwrap();
        drop(tx);

        let doc = read_document(&mut rx, TIMEOUT).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn read_reports_no_document_on_empty_close() {
        let (tx, mut rx) = duplex(64);
        drop(tx);
        let doc = read_document(&mut rx, TIMEOUT).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn read_times_out_on_silent_peer() {
        let (_tx, mut rx) = duplex(64);
        let err = read_document(&mut rx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout));
    }

    #[tokio::test]
    async fn send_and_read_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let doc = read_document(&mut stream, TIMEOUT).await.unwrap().unwrap();
            assert_eq!(doc.name(), "request");
            assert_eq!(doc.attr("sequence"), Some("1254"));
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let doc = Element::new("request").with_attr("sequence", "1254");
        send_document(&mut client, &doc, TIMEOUT).await.unwrap();

        server.await.unwrap();
    }
}
