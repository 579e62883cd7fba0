// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Streaming executor: one operation template applied to a stream of geometries.
//!
//! A session runs two tasks over one bidirectional RPC. The send task encodes
//! each input into the template's left slot and half-closes once the input
//! ends. The receive task decodes responses in engine order and forwards them.
//! Each direction holds at most one item in flight.

use crate::codec::{self, Geometry, RESULT_ENCODING};
use crate::error::{ChainError, Result};
use crate::executor::GeometryClient;
use crate::ops::UnaryOp;
use crate::reference::SpatialReference;
use crate::transport::ResponseStream;
use futures_util::{Stream, StreamExt};
use geochain_proto::geometry_request::Left;
use geochain_proto::GeometryRequest;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Outbound lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// Not started.
    #[default]
    Idle,
    /// Forwarding input items.
    Sending,
    /// Half-closed, either after the input ended or after a send-side failure.
    Closed,
}

/// Inbound lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiveState {
    /// Not started.
    #[default]
    Idle,
    /// Forwarding responses.
    Receiving,
    /// The engine ended the stream.
    Drained,
    /// Stopped on an error, an aborted session or a dropped consumer.
    Failed,
}

/// Snapshot of both directions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// Outbound direction.
    pub send: SendState,
    /// Inbound direction.
    pub receive: ReceiveState,
}

/// Fixed request shared by every item of a stream.
#[derive(Debug, Clone)]
pub struct StreamTemplate {
    client: GeometryClient,
    request: GeometryRequest,
}

impl StreamTemplate {
    pub(crate) fn new(client: GeometryClient, op: &UnaryOp) -> Self {
        let request = GeometryRequest {
            operator: op.operator() as i32,
            params: op.params(),
            result_proj: op.result_reference().map(SpatialReference::to_proto),
            result_encoding: RESULT_ENCODING as i32,
            ..Default::default()
        };
        Self { client, request }
    }

    /// Request each item is sent as, minus its left operand.
    pub const fn request(&self) -> &GeometryRequest {
        &self.request
    }

    /// Start a session over `input`. Must be called inside a tokio runtime.
    pub fn execute<S>(self, input: S) -> StreamSession
    where
        S: Stream<Item = Geometry> + Send + 'static,
    {
        let (results_tx, results_rx) = mpsc::channel(1);
        let (requests_tx, requests_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let status = Arc::new(status_tx);
        let results = Results::new(results_tx);

        let sender = Sender {
            template: self.request,
            requests: requests_tx,
            results: results.clone(),
            status: Arc::clone(&status),
        };
        tokio::spawn(sender.run(Box::pin(input)));

        let client = self.client;
        tokio::spawn(async move {
            let receiver = Receiver {
                client,
                results,
                status,
            };
            let transport = Arc::clone(receiver.client.transport());
            match transport.operate_bi_stream(requests_rx).await {
                Ok(responses) => receiver.run(responses).await,
                Err(status) => receiver.fail(ChainError::from(status)).await,
            }
        });

        StreamSession {
            results: ReceiverStream::new(results_rx),
            status: status_rx,
        }
    }
}

/// Output of a running stream, in engine response order.
///
/// Yields `Ok` per decoded response. A failure is yielded once as `Err`, and
/// nothing follows it. Dropping the session stops delivery.
#[derive(Debug)]
pub struct StreamSession {
    results: ReceiverStream<Result<Geometry>>,
    status: watch::Receiver<SessionStatus>,
}

impl StreamSession {
    /// Current lifecycle of both directions.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }
}

impl Stream for StreamSession {
    type Item = Result<Geometry>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.results).poll_next(cx)
    }
}

/// Result channel shared by both tasks.
///
/// The first failure marks the session ended under the lock, so it is the
/// last item the consumer sees and a failure from the other task is dropped.
/// The channel itself closes once both tasks have finished.
#[derive(Clone)]
struct Results {
    tx: mpsc::Sender<Result<Geometry>>,
    ended: Arc<Mutex<bool>>,
}

impl Results {
    fn new(tx: mpsc::Sender<Result<Geometry>>) -> Self {
        Self {
            tx,
            ended: Arc::new(Mutex::new(false)),
        }
    }

    /// Forward one decoded item. False once the session has ended or the
    /// consumer went away.
    async fn deliver(&self, geometry: Geometry) -> bool {
        let ended = self.ended.lock().await;
        !*ended && self.tx.send(Ok(geometry)).await.is_ok()
    }

    /// Emit the session's failure. False when another failure already ended it.
    async fn fail(&self, err: ChainError) -> bool {
        let mut ended = self.ended.lock().await;
        if *ended {
            debug!(%err, "session already failed; dropping later error");
            return false;
        }
        *ended = true;
        if self.tx.send(Err(err)).await.is_err() {
            debug!("stream consumer went away before the failure was delivered");
        }
        true
    }

    async fn is_ended(&self) -> bool {
        *self.ended.lock().await
    }
}

struct Sender {
    template: GeometryRequest,
    requests: mpsc::Sender<GeometryRequest>,
    results: Results,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl Sender {
    async fn run(self, mut input: Pin<Box<dyn Stream<Item = Geometry> + Send>>) {
        self.status.send_modify(|s| s.send = SendState::Sending);
        let mut sent = 0usize;
        while let Some(geometry) = input.next().await {
            let payload = match codec::encode(&geometry) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%err, sent, "stream input rejected; closing session");
                    self.status.send_modify(|s| s.send = SendState::Closed);
                    self.results.fail(err).await;
                    return;
                }
            };
            let mut request = self.template.clone();
            request.left = Some(Left::LeftGeometry(payload));
            if self.requests.send(request).await.is_err() {
                debug!(sent, "outbound stream already closed");
                break;
            }
            sent += 1;
        }
        self.status.send_modify(|s| s.send = SendState::Closed);
        debug!(sent, "stream input exhausted; half-closing");
    }
}

struct Receiver {
    client: GeometryClient,
    results: Results,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl Receiver {
    async fn run(self, mut responses: ResponseStream) {
        self.status.send_modify(|s| s.receive = ReceiveState::Receiving);
        let mut received = 0usize;
        loop {
            let next = responses.next().await;
            if self.results.is_ended().await {
                debug!(received, "session ended by send side");
                self.status.send_modify(|s| s.receive = ReceiveState::Failed);
                return;
            }
            let response = match next {
                None => {
                    debug!(received, "engine closed stream");
                    self.status.send_modify(|s| s.receive = ReceiveState::Drained);
                    return;
                }
                Some(Err(status)) => return self.fail(ChainError::from(status)).await,
                Some(Ok(response)) => response,
            };
            let decoded = match response.geometry {
                Some(payload) => self.client.decode(payload).await,
                None => Err(ChainError::IncompleteResult),
            };
            let geometry = match decoded {
                Ok(geometry) => geometry,
                Err(err) => return self.fail(err).await,
            };
            if !self.results.deliver(geometry).await {
                debug!(received, "session ended or consumer went away");
                self.status.send_modify(|s| s.receive = ReceiveState::Failed);
                return;
            }
            received += 1;
        }
    }

    async fn fail(self, err: ChainError) {
        warn!(%err, "stream receive failed");
        self.status.send_modify(|s| s.receive = ReceiveState::Failed);
        self.results.fail(err).await;
    }
}
