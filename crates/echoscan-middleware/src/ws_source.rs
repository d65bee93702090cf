//! WebSocket telemetry source.
//!
//! [`WebSocketSource`] dials the rig controller (e.g. `ws://192.168.1.219:81/`)
//! and decodes one reading per inbound text frame.  Binary frames are accepted
//! when they hold UTF-8 JSON.  Control frames are skipped.

use async_trait::async_trait;
use echoscan_types::{Reading, ScanError};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info};

use crate::parser::parse_reading;
use crate::source::TelemetrySource;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Telemetry source that reads JSON frames from a WebSocket server.
pub struct WebSocketSource {
    url: String,
    stream: Option<WsStream>,
}

impl WebSocketSource {
    /// Create a source for `url`.  Nothing is dialled until
    /// [`connect`][TelemetrySource::connect] is called.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn lost(&mut self, details: impl std::fmt::Display) -> ScanError {
        self.stream = None;
        ScanError::transport(self.url.clone(), details)
    }
}

#[async_trait]
impl TelemetrySource for WebSocketSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn connect(&mut self) -> Result<(), ScanError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ScanError::transport(self.url.clone(), e))?;
        info!(url = %self.url, "websocket source connected");
        self.stream = Some(stream);
        Ok(())
    }

    async fn next_reading(&mut self) -> Result<Reading, ScanError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Err(ScanError::transport(self.url.clone(), "not connected"));
            };
            let next = stream.next().await;
            match next {
                Some(Ok(Message::Text(text))) => return parse_reading(text.as_str()),
                Some(Ok(Message::Binary(bytes))) => {
                    let text = std::str::from_utf8(&bytes).map_err(|e| {
                        ScanError::MalformedReading(format!("binary frame is not UTF-8: {e}"))
                    })?;
                    return parse_reading(text);
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(url = %self.url, ?frame, "websocket closed by peer");
                    return Err(self.lost("connection closed by peer"));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(self.lost(e)),
                None => return Err(self.lost("stream ended")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::SensorId;
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const FRAME: &str = r#"{"distanceTopLeft":42,"distanceTopRight":1,"distanceBottomLeft":2,"distanceBottomRight":3,"pitch":0,"roll":0,"yaw":0}"#;

    /// Serve `frames` to the first client, then close.
    async fn serve(frames: Vec<Message>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for frame in frames {
                ws.send(frame).await.unwrap();
            }
            ws.close(None).await.ok();
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn reads_text_frames_in_order() {
        let url = serve(vec![
            Message::Text(FRAME.to_string().into()),
            Message::Text(FRAME.replace("42", "43").into()),
        ])
        .await;
        let mut source = WebSocketSource::new(url);
        source.connect().await.unwrap();

        let first = source.next_reading().await.unwrap();
        let second = source.next_reading().await.unwrap();
        assert_eq!(first.distance(SensorId::TopLeft), 42.0);
        assert_eq!(second.distance(SensorId::TopLeft), 43.0);
    }

    #[tokio::test]
    async fn malformed_frame_does_not_drop_connection() {
        let url = serve(vec![
            Message::Text("{\"pitch\": 1}".to_string().into()),
            Message::Text(FRAME.to_string().into()),
        ])
        .await;
        let mut source = WebSocketSource::new(url);
        source.connect().await.unwrap();

        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::MalformedReading(_))
        ));
        assert!(source.is_connected());
        assert!(source.next_reading().await.is_ok());
    }

    #[tokio::test]
    async fn accepts_utf8_binary_frames() {
        let url = serve(vec![Message::Binary(FRAME.as_bytes().to_vec().into())]).await;
        let mut source = WebSocketSource::new(url);
        source.connect().await.unwrap();
        assert!(source.next_reading().await.is_ok());
    }

    #[tokio::test]
    async fn close_reports_transport_failure() {
        let url = serve(vec![]).await;
        let mut source = WebSocketSource::new(url);
        source.connect().await.unwrap();

        let err = source.next_reading().await.unwrap_err();
        assert!(matches!(err, ScanError::Transport { .. }));
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut source = WebSocketSource::new(format!("ws://{addr}"));
        let err = source.connect().await.unwrap_err();
        assert!(matches!(err, ScanError::Transport { .. }));
    }

    #[tokio::test]
    async fn read_before_connect_is_transport_failure() {
        let mut source = WebSocketSource::new("ws://127.0.0.1:9");
        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::Transport { .. })
        ));
    }
}
