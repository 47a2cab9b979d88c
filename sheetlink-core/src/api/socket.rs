use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::SocketError;
use crate::types::JobEvent;

/// Live job updates over `/api/v1/jobs/{id}/ws`.
///
/// Yields one [`JobEvent`] per text frame. Frames that are not valid event
/// JSON are logged and skipped. A close frame surfaces as
/// [`SocketError::Closed`], after which the stream ends.
pub struct JobSocket {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for JobSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSocket").finish_non_exhaustive()
    }
}

impl JobSocket {
    pub async fn connect(url: &str) -> Result<Self, SocketError> {
        debug!(url, "Opening job socket");
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| SocketError::Connect(e.to_string()))?;
        Ok(Self { ws })
    }

    /// Send a close frame. Errors are ignored; the peer may already be gone.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}

impl Stream for JobSocket {
    type Item = Result<JobEvent, SocketError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let Some(msg) = ready!(self.ws.poll_next_unpin(cx)) else {
                return Poll::Ready(None);
            };
            match msg {
                Ok(Message::Text(text)) => match JobEvent::parse(&text) {
                    Ok(event) => return Poll::Ready(Some(Ok(event))),
                    Err(e) => warn!(error = %e, "Skipping malformed socket frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Job socket closed by server");
                    return Poll::Ready(Some(Err(SocketError::Closed)));
                }
                // Pings are answered by tungstenite; binary frames are not used.
                Ok(_) => {}
                Err(e) => return Poll::Ready(Some(Err(SocketError::Protocol(e.to_string())))),
            }
        }
    }
}
