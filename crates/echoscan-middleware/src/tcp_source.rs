//! Line-delimited JSON over TCP.
//!
//! [`TcpLineSource`] connects to `host:port` (a `tcp://` prefix is accepted)
//! and decodes one reading per newline-terminated line.  Blank lines are
//! skipped; end-of-stream is a transport failure so the driver reconnects.
//! A line that is not UTF-8 or longer than [`MAX_READING_BYTES`] is dropped
//! as malformed and the stream stays open.

use std::io;

use async_trait::async_trait;
use echoscan_types::{Reading, ScanError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::parser::{MAX_READING_BYTES, parse_reading};
use crate::source::TelemetrySource;

/// Telemetry source reading newline-delimited JSON from a TCP stream.
pub struct TcpLineSource {
    addr: String,
    reader: Option<BufReader<TcpStream>>,
}

impl TcpLineSource {
    pub fn new(addr: impl Into<String>) -> Self {
        let addr: String = addr.into();
        let addr = addr
            .strip_prefix("tcp://")
            .map(str::to_string)
            .unwrap_or(addr);
        Self { addr, reader: None }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn lost(&mut self, details: impl std::fmt::Display) -> ScanError {
        self.reader = None;
        ScanError::transport(self.addr.clone(), details)
    }
}

/// How a bounded line read ended.
enum LineRead {
    /// `line` holds one line, terminator included when present.
    Complete,
    /// The line ran past the limit; it has been skipped.
    Oversized,
    Eof,
}

/// Read one line into `line`, never buffering more than one reading's worth.
async fn read_line_capped(
    reader: &mut BufReader<TcpStream>,
    line: &mut Vec<u8>,
) -> io::Result<LineRead> {
    // Two bytes of slack for a CRLF terminator.
    let limit = MAX_READING_BYTES as u64 + 2;
    let n = (&mut *reader).take(limit).read_until(b'\n', line).await?;
    if n == 0 {
        return Ok(LineRead::Eof);
    }
    if line.last() == Some(&b'\n') || (n as u64) < limit {
        return Ok(LineRead::Complete);
    }
    skip_line(reader).await?;
    Ok(LineRead::Oversized)
}

/// Discard input up to and including the next newline (or end-of-stream).
async fn skip_line(reader: &mut BufReader<TcpStream>) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf().await?;
        let (used, done) = match buf.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (buf.len(), buf.is_empty()),
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

#[async_trait]
impl TelemetrySource for TcpLineSource {
    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }

    async fn connect(&mut self) -> Result<(), ScanError> {
        let stream = TcpStream::connect(self.addr.as_str())
            .await
            .map_err(|e| ScanError::transport(self.addr.clone(), e))?;
        info!(addr = %self.addr, "tcp line source connected");
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    async fn next_reading(&mut self) -> Result<Reading, ScanError> {
        let mut line = Vec::new();
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Err(ScanError::transport(self.addr.clone(), "not connected"));
            };
            line.clear();
            let read = read_line_capped(reader, &mut line).await;
            match read {
                Ok(LineRead::Complete) => {
                    let text = std::str::from_utf8(&line).map_err(|e| {
                        ScanError::MalformedReading(format!("line is not UTF-8: {e}"))
                    })?;
                    let text = text.trim_end_matches(['\r', '\n']);
                    if text.trim().is_empty() {
                        continue;
                    }
                    return parse_reading(text);
                }
                Ok(LineRead::Oversized) => {
                    debug!(addr = %self.addr, "skipped oversized line");
                    return Err(ScanError::MalformedReading(format!(
                        "line exceeds the limit of {MAX_READING_BYTES} bytes"
                    )));
                }
                Ok(LineRead::Eof) => return Err(self.lost("connection closed by peer")),
                Err(e) => return Err(self.lost(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoscan_types::SensorId;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const LINE: &str = r#"{"distanceTopLeft":5,"distanceTopRight":6,"distanceBottomLeft":7,"distanceBottomRight":8,"pitch":0,"roll":0,"yaw":0}"#;

    async fn serve(payload: impl Into<Vec<u8>>) -> String {
        let payload = payload.into();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&payload).await.unwrap();
            stream.shutdown().await.ok();
        });
        addr.to_string()
    }

    #[test]
    fn strips_tcp_scheme() {
        assert_eq!(TcpLineSource::new("tcp://rig.local:9000").addr(), "rig.local:9000");
        assert_eq!(TcpLineSource::new("10.0.0.2:9000").addr(), "10.0.0.2:9000");
    }

    #[tokio::test]
    async fn reads_lines_and_skips_blanks() {
        let addr = serve(format!("{LINE}\n\n   \n{}\n", LINE.replace("\"yaw\":0", "\"yaw\":90"))).await;
        let mut source = TcpLineSource::new(addr);
        source.connect().await.unwrap();

        let first = source.next_reading().await.unwrap();
        assert_eq!(first.distance(SensorId::BottomRight), 8.0);
        let second = source.next_reading().await.unwrap();
        assert_eq!(second.orientation.yaw, 90.0);
    }

    #[tokio::test]
    async fn malformed_line_then_eof() {
        let addr = serve(format!("garbage\n{LINE}\n")).await;
        let mut source = TcpLineSource::new(addr);
        source.connect().await.unwrap();

        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::MalformedReading(_))
        ));
        assert!(source.next_reading().await.is_ok());
        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::Transport { .. })
        ));
        // Stays disconnected until reconnected.
        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn non_utf8_line_is_dropped_and_stream_stays_open() {
        let mut payload = b"\xff\xfe garbage\n".to_vec();
        payload.extend_from_slice(LINE.as_bytes());
        payload.push(b'\n');
        let addr = serve(payload).await;
        let mut source = TcpLineSource::new(addr);
        source.connect().await.unwrap();

        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::MalformedReading(_))
        ));
        let reading = source.next_reading().await.unwrap();
        assert_eq!(reading.distance(SensorId::TopLeft), 5.0);
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_whole() {
        let huge = "x".repeat(MAX_READING_BYTES * 3);
        let addr = serve(format!("{huge}\n{LINE}\n")).await;
        let mut source = TcpLineSource::new(addr);
        source.connect().await.unwrap();

        assert!(matches!(
            source.next_reading().await,
            Err(ScanError::MalformedReading(_))
        ));
        let reading = source.next_reading().await.unwrap();
        assert_eq!(reading.distance(SensorId::TopRight), 6.0);
    }

    #[tokio::test]
    async fn line_at_the_limit_is_accepted() {
        let padded = format!("{LINE:<width$}", width = MAX_READING_BYTES);
        let addr = serve(format!("{padded}\r\n")).await;
        let mut source = TcpLineSource::new(addr);
        source.connect().await.unwrap();

        assert!(source.next_reading().await.is_ok());
    }
}
