use futures::StreamExt;
use log::debug;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

/// One server-sent event from a streaming subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEvent {
    /// The SSE event name (`put`, `patch`, `keep-alive`, ...).
    pub event: String,
    /// The decoded `data` payload.
    pub data: Value,
    /// The caller-supplied subscription label, if any.
    pub stream_id: Option<String>,
}

/// A live streaming subscription.
///
/// The receive loop runs on a dedicated background task; the caller's handler
/// is invoked there, once per received event, not on the caller's thread.
pub struct Stream {
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Stream {
    pub(crate) fn spawn<F>(
        client: ClientWithMiddleware,
        url: Url,
        mut handler: F,
        stream_id: Option<String>,
    ) -> Self
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let worker = tokio::spawn(async move {
            debug!("opening event stream at {url}");

            let response = match client
                .get(url)
                .header(header::ACCEPT, "text/event-stream")
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    debug!("event stream connection failed: {e}");
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut parser = SseParser::default();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("event stream closed by caller");
                        break;
                    }
                    chunk = body.next() => match chunk {
                        Some(Ok(bytes)) => {
                            for frame in parser.feed(&bytes) {
                                match serde_json::from_str::<Value>(&frame.data) {
                                    Ok(data) => handler(StreamEvent {
                                        event: frame.event,
                                        data,
                                        stream_id: stream_id.clone(),
                                    }),
                                    Err(e) => debug!("discarding undecodable event: {e}"),
                                }
                            }
                        }
                        Some(Err(e)) => {
                            debug!("event stream transport error: {e}");
                            break;
                        }
                        None => {
                            debug!("event stream ended");
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        }
    }

    /// Signals the background worker to stop and waits until it has exited.
    ///
    /// Cancellation is cooperative: a handler that is mid-invocation runs to
    /// completion before the worker observes the signal.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

struct SseFrame {
    event: String,
    data: String,
}

/// Incremental parser for the `text/event-stream` wire format.
///
/// Frames are accumulated line by line and dispatched on the blank line that
/// terminates each event. Comment lines and fields other than `event:` and
/// `data:` are ignored; frames without data are dropped.
#[derive(Default)]
struct SseParser {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    frames.push(SseFrame {
                        event: self.event.take().unwrap_or_else(|| "message".to_string()),
                        data: self.data.join("\n"),
                    });
                }
                self.event = None;
                self.data.clear();
            } else if let Some(value) = line.strip_prefix("event:") {
                self.event = Some(value.trim_start_matches(' ').to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.trim_start_matches(' ').to_string());
            }
            // Comments and other fields (id:, retry:) are ignored.
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_event() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b"event: put\ndata: {\"path\":\"/\",\"data\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "put");
        assert_eq!(frames[0].data, "{\"path\":\"/\",\"data\":1}");
    }

    #[test]
    fn reassembles_events_split_across_chunks() {
        let mut parser = SseParser::default();

        assert!(parser.feed(b"event: pat").is_empty());
        assert!(parser.feed(b"ch\ndata: null").is_empty());
        let frames = parser.feed(b"\n\nevent: put\ndata: 2\n\n");

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "patch");
        assert_eq!(frames[0].data, "null");
        assert_eq!(frames[1].event, "put");
        assert_eq!(frames[1].data, "2");
    }

    #[test]
    fn joins_multi_line_data_and_skips_comments() {
        let mut parser = SseParser::default();

        let frames = parser.feed(b": keep-alive comment\ndata: [1,\ndata: 2]\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "[1,\n2]");
    }

    #[test]
    fn frames_without_data_are_dropped() {
        let mut parser = SseParser::default();

        assert!(parser.feed(b"event: keep-alive\n\n").is_empty());
    }
}
