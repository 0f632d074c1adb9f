//! Incremental delivery of reflection turns.
//!
//! A reflection session runs on its own task (the producer) and hands each
//! turn to the caller through a bounded channel. The caller either pulls turns
//! directly ([`ReflectionStream::next_event`]), adapts the channel into a
//! `futures` stream ([`ReflectionStream::into_parts`]), or forwards everything
//! into an [`EventSink`] such as the Server-Sent Events writer [`SseWriter`].
//!
//! Wire format of one SSE frame:
//!
//! ```text
//! event: message
//! data: {"agentId":3,"agentName":"Ada","content":"agree"}
//!
//! ```

use crate::trio::error::TrioError;
use crate::trio::reflection::{ReflectionOrchestrator, ReflectionRequest, SessionReport};
use async_trait::async_trait;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// SSE event name used for every agent turn.
pub const MESSAGE_EVENT: &str = "message";

/// One agent turn as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub agent_id: u64,
    pub agent_name: String,
    pub content: String,
}

/// Encode one SSE frame. Each line of `data` becomes its own `data:` field so
/// embedded newlines survive the framing.
///
/// ```
/// use trio::stream::sse_frame;
///
/// assert_eq!(sse_frame("message", "{}"), "event: message\ndata: {}\n\n");
/// assert_eq!(sse_frame("message", "a\nb"), "event: message\ndata: a\ndata: b\n\n");
/// ```
pub fn sse_frame(event: &str, data: &str) -> String {
    let mut frame = format!("event: {}\n", event);
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line.strip_suffix('\r').unwrap_or(line));
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// Destination for named events. Implemented by transports.
#[async_trait]
pub trait EventSink: Send {
    async fn send_event(&mut self, event: &str, data: &str) -> Result<(), TrioError>;

    /// Flush and release the underlying transport.
    async fn close(&mut self) -> Result<(), TrioError>;
}

/// [`EventSink`] writing SSE frames to any async writer, flushing after every
/// frame so each turn reaches the client as soon as it exists.
pub struct SseWriter<W> {
    writer: W,
}

impl<W> SseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> EventSink for SseWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_event(&mut self, event: &str, data: &str) -> Result<(), TrioError> {
        let frame = sse_frame(event, data);
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| TrioError::Stream(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| TrioError::Stream(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TrioError> {
        self.writer
            .shutdown()
            .await
            .map_err(|e| TrioError::Stream(e.to_string()))
    }
}

/// Starts reflection sessions on their own task.
pub struct StreamEmitter;

impl StreamEmitter {
    /// Spawn the producer for `request` and return the consuming half.
    ///
    /// The channel holds at most one turn per agent, so a slow consumer
    /// suspends the producer after a round's worth of unread turns.
    pub fn spawn(orchestrator: ReflectionOrchestrator, request: ReflectionRequest) -> ReflectionStream {
        let capacity = request.agents.len().max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let producer = tokio::spawn(async move { orchestrator.run(request, sender).await });
        ReflectionStream { receiver, producer }
    }
}

/// Consuming half of a running reflection session.
///
/// Turns arrive in exactly the order they were produced. Dropping the stream
/// (or calling [`finish`](Self::finish) early) disconnects the producer, which
/// stops at its next emission.
pub struct ReflectionStream {
    receiver: mpsc::Receiver<AgentResponse>,
    producer: JoinHandle<Result<SessionReport, TrioError>>,
}

impl ReflectionStream {
    /// Next turn, or `None` once the producer has stopped.
    pub async fn next_event(&mut self) -> Option<AgentResponse> {
        self.receiver.recv().await
    }

    /// Stop consuming and wait for the producer's report. Unread turns are
    /// discarded.
    pub async fn finish(self) -> Result<SessionReport, TrioError> {
        let ReflectionStream { receiver, producer } = self;
        drop(receiver);
        join_producer(producer).await
    }

    /// Drain every turn, then return them with the producer's report.
    pub async fn collect(mut self) -> (Vec<AgentResponse>, Result<SessionReport, TrioError>) {
        let mut turns = Vec::new();
        while let Some(turn) = self.receiver.recv().await {
            turns.push(turn);
        }
        let report = join_producer(self.producer).await;
        (turns, report)
    }

    /// Split into a `futures` stream of turns and the producer handle.
    pub fn into_parts(
        self,
    ) -> (
        ReceiverStream<AgentResponse>,
        JoinHandle<Result<SessionReport, TrioError>>,
    ) {
        (ReceiverStream::new(self.receiver), self.producer)
    }

    /// Forward every turn into `sink` as a [`MESSAGE_EVENT`] with a JSON body,
    /// then close the sink.
    ///
    /// A turn that cannot be serialized is logged and skipped. A failing sink
    /// stops forwarding, disconnects the producer and returns the sink error.
    pub async fn forward_to<S>(mut self, sink: &mut S) -> Result<SessionReport, TrioError>
    where
        S: EventSink + ?Sized,
    {
        while let Some(turn) = self.receiver.recv().await {
            let data = match serde_json::to_string(&turn) {
                Ok(data) => data,
                Err(err) => {
                    error!("Error marshalling response from {}: {}", turn.agent_name, err);
                    continue;
                }
            };
            if let Err(err) = sink.send_event(MESSAGE_EVENT, &data).await {
                warn!("Event sink rejected a turn, stopping: {}", err);
                self.finish().await?;
                return Err(err);
            }
        }
        sink.close().await?;
        join_producer(self.producer).await
    }
}

async fn join_producer(
    producer: JoinHandle<Result<SessionReport, TrioError>>,
) -> Result<SessionReport, TrioError> {
    producer
        .await
        .map_err(|e| TrioError::Stream(format!("reflection task failed: {}", e)))?
}
