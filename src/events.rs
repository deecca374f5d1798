//! Delivery of pipeline events to an observer.
//!
//! The pipeline only sees the [`EventSink`] trait. Sinks provided here:
//!
//! | Sink | Used by | Output |
//! |------|---------|--------|
//! | [`ChannelSink`] | `GET /repo/analyze/stream` | `tokio::sync::mpsc` feeding an SSE response |
//! | [`StderrSink`] | `rsum analyze` | `analyze  reading` lines on stderr |
//! | [`JsonSink`] | `rsum analyze --progress json` | one JSON object per line on stderr |
//! | [`NullSink`] | `POST /repo/analyze` | nothing |
//!
//! [`Emitter`] wraps a sink for the duration of one run and makes "no event
//! after the terminal one" a property of the types: the terminal event is sent
//! by [`Emitter::finish`], which consumes the emitter.

use async_trait::async_trait;
use std::io::Write;
use tokio::sync::mpsc;

use crate::models::PipelineEvent;

/// The observer went away; nothing further can be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Receives the events of one run, in order.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Status events may be dropped by the sink under
    /// backpressure; a terminal event must either be delivered or fail with
    /// [`SinkClosed`].
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkClosed>;

    /// Resolves once the observer has disconnected. Sinks that cannot
    /// disconnect never resolve.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

// ============ Channel ============

/// Bounded channel sink for streaming to a remote observer.
pub struct ChannelSink {
    tx: mpsc::Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving half, with room for `capacity` queued events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<PipelineEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkClosed> {
        if event.is_terminal() {
            return self.tx.send(event).await.map_err(|_| SinkClosed);
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::debug!(event = ?dropped, "observer lagging; coalescing status event");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkClosed),
        }
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

// ============ Stderr ============

/// Human-friendly progress on stderr: `analyze  cloning`.
pub struct StderrSink;

#[async_trait]
impl EventSink for StderrSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkClosed> {
        let line = match &event {
            PipelineEvent::Status { message } => format!("analyze  {}\n", message),
            PipelineEvent::Result { payload } => format!("analyze  done  {}\n", payload.id),
            PipelineEvent::Error { message } => format!("analyze  failed  {}\n", message),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
        Ok(())
    }
}

/// Machine-readable progress: the wire JSON of each event, one per line on stderr.
pub struct JsonSink;

#[async_trait]
impl EventSink for JsonSink {
    async fn emit(&self, event: PipelineEvent) -> Result<(), SinkClosed> {
        if let Ok(line) = serde_json::to_string(&event) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
        Ok(())
    }
}

/// Discards everything.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _event: PipelineEvent) -> Result<(), SinkClosed> {
        Ok(())
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn sink(&self) -> Box<dyn EventSink> {
        match self {
            ProgressMode::Off => Box::new(NullSink),
            ProgressMode::Human => Box::new(StderrSink),
            ProgressMode::Json => Box::new(JsonSink),
        }
    }
}

// ============ Emitter ============

/// One run's handle on its sink.
pub struct Emitter<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> Emitter<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    /// Send a status update. A closed sink is not an error here; the
    /// pipeline notices disconnection through [`Emitter::cancelled`].
    pub async fn status(&self, message: &str) {
        if self.sink.emit(PipelineEvent::status(message)).await.is_err() {
            tracing::debug!(status = message, "observer gone; status not delivered");
        }
    }

    /// Resolves when the observer disconnects.
    pub async fn cancelled(&self) {
        self.sink.closed().await
    }

    /// Send the terminal event and give up the sink.
    pub async fn finish(self, event: PipelineEvent) {
        debug_assert!(event.is_terminal());
        if self.sink.emit(event).await.is_err() {
            tracing::info!("observer gone before the terminal event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisRecord;

    #[tokio::test]
    async fn channel_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel(8);
        let emitter = Emitter::new(&sink);
        emitter.status("starting").await;
        emitter.status("reading").await;
        emitter
            .finish(PipelineEvent::Error {
                message: "boom".into(),
            })
            .await;
        drop(sink);

        let mut got = Vec::new();
        while let Some(ev) = rx.recv().await {
            got.push(ev);
        }
        assert_eq!(
            got,
            vec![
                PipelineEvent::status("starting"),
                PipelineEvent::status("reading"),
                PipelineEvent::Error {
                    message: "boom".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn full_channel_coalesces_status_but_not_terminal() {
        let (sink, mut rx) = ChannelSink::channel(1);
        sink.emit(PipelineEvent::status("one")).await.unwrap();
        // Queue is full: this status is dropped without blocking.
        sink.emit(PipelineEvent::status("two")).await.unwrap();

        let record = AnalysisRecord::new("u", "t");
        let terminal = PipelineEvent::Result {
            payload: record.clone(),
        };
        let send = tokio::spawn(async move {
            sink.emit(terminal).await.unwrap();
        });

        assert_eq!(rx.recv().await, Some(PipelineEvent::status("one")));
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::Result { payload: record })
        );
        send.await.unwrap();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_receiver_closes_sink() {
        let (sink, rx) = ChannelSink::channel(4);
        drop(rx);
        sink.closed().await;
        assert_eq!(
            sink.emit(PipelineEvent::Error {
                message: "x".into()
            })
            .await,
            Err(SinkClosed)
        );
    }

    #[test]
    fn progress_mode_parse() {
        assert_eq!(ProgressMode::parse("json"), Some(ProgressMode::Json));
        assert_eq!(ProgressMode::parse("off"), Some(ProgressMode::Off));
        assert_eq!(ProgressMode::parse("loud"), None);
    }
}
