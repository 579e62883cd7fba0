// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process geometry engine for exercising chains and streams offline.

use crate::eval;
use async_trait::async_trait;
use futures_util::StreamExt;
use geochain_client::{GeometryClient, GeometryTransport, ResponseStream};
use geochain_proto::{GeometryRequest, GeometryResponse, ProjectionData};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Fake [`GeometryTransport`] that evaluates requests in-process.
///
/// Records every request it receives and can be told to fail. Clones share
/// state, so a test keeps one clone for assertions and hands another to
/// [`GeometryClient`].
///
/// # Example
///
/// ```
/// use geochain_dry_tests::{point, square, FakeEngine};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let engine = FakeEngine::new();
/// let client = engine.client();
/// let inside = client
///     .chain(&square(0.0, 0.0, 4.0))
///     .contains(client.chain(&point(1.0, 1.0)))
///     .await
///     .unwrap();
/// assert!(inside);
/// assert_eq!(engine.unary_calls(), 1);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Mutex<FakeEngineInner>>,
}

#[derive(Default)]
struct FakeEngineInner {
    requests: Vec<GeometryRequest>,
    unary_calls: usize,
    bi_stream_calls: usize,
    client_stream_calls: usize,
    failure: Option<Status>,
    stream_fails_after: Option<usize>,
    strip_references: bool,
    blank_references: bool,
}

impl FakeEngine {
    /// Create an engine that answers everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Client over a clone of this engine.
    pub fn client(&self) -> GeometryClient {
        GeometryClient::new(Arc::new(self.clone()))
    }

    /// Fail every call (unary and stream opens) with `status`; `None` heals.
    pub fn set_failure(&self, status: Option<Status>) {
        self.lock().failure = status;
    }

    /// After `responses` answers, bidirectional streams emit one `ABORTED`
    /// status and stop.
    pub fn fail_stream_after(&self, responses: usize) {
        self.lock().stream_fails_after = Some(responses);
    }

    /// Drop the reference from every geometry result.
    pub fn set_strip_references(&self, strip: bool) {
        self.lock().strip_references = strip;
    }

    /// Replace the reference of every geometry result with a
    /// `ProjectionData` that has no definition.
    pub fn set_blank_references(&self, blank: bool) {
        self.lock().blank_references = blank;
    }

    /// Number of unary `Operate` calls.
    pub fn unary_calls(&self) -> usize {
        self.lock().unary_calls
    }

    /// Number of bidirectional streams opened.
    pub fn bi_stream_calls(&self) -> usize {
        self.lock().bi_stream_calls
    }

    /// Number of client streams opened.
    pub fn client_stream_calls(&self) -> usize {
        self.lock().client_stream_calls
    }

    /// Calls of any kind.
    pub fn total_calls(&self) -> usize {
        let inner = self.lock();
        inner.unary_calls + inner.bi_stream_calls + inner.client_stream_calls
    }

    /// Every request received, streamed ones included, in arrival order.
    pub fn requests(&self) -> Vec<GeometryRequest> {
        self.lock().requests.clone()
    }

    /// Most recent request.
    pub fn last_request(&self) -> Option<GeometryRequest> {
        self.lock().requests.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeEngineInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failure(&self) -> Result<(), Status> {
        self.lock().failure.clone().map_or(Ok(()), Err)
    }

    fn answer(&self, request: &GeometryRequest) -> Result<GeometryResponse, Status> {
        let (strip, blank) = {
            let mut inner = self.lock();
            inner.requests.push(request.clone());
            (inner.strip_references, inner.blank_references)
        };
        let mut response = eval::evaluate(request)?;
        if let Some(geometry) = response.geometry.as_mut() {
            if strip {
                geometry.proj = None;
            } else if blank {
                geometry.proj = Some(ProjectionData::default());
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl GeometryTransport for FakeEngine {
    async fn operate(&self, request: GeometryRequest) -> Result<GeometryResponse, Status> {
        self.lock().unary_calls += 1;
        self.check_failure()?;
        self.answer(&request)
    }

    async fn operate_bi_stream(
        &self,
        mut requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<ResponseStream, Status> {
        self.lock().bi_stream_calls += 1;
        self.check_failure()?;
        let fails_after = self.lock().stream_fails_after;
        let engine = self.clone();
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut answered = 0;
            while let Some(request) = requests.recv().await {
                if fails_after == Some(answered) {
                    let _ = tx.send(Err(Status::aborted("stream reset by engine"))).await;
                    return;
                }
                if tx.send(engine.answer(&request)).await.is_err() {
                    return;
                }
                answered += 1;
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn operate_client_stream(
        &self,
        mut requests: mpsc::Receiver<GeometryRequest>,
    ) -> Result<GeometryResponse, Status> {
        self.lock().client_stream_calls += 1;
        self.check_failure()?;
        let mut batch = Vec::new();
        while let Some(request) = requests.recv().await {
            batch.push(request);
        }
        self.lock().requests.extend(batch.iter().cloned());
        eval::fold_union(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{point, square};
    use geochain_client::ChainError;

    #[tokio::test]
    async fn records_unary_requests() {
        let engine = FakeEngine::new();
        let client = engine.client();

        let area = client.chain(&square(0.0, 0.0, 2.0)).geodetic_area().await.unwrap();

        assert!((area - 4.0).abs() < 1e-9);
        assert_eq!(engine.unary_calls(), 1);
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_reaches_the_client() {
        let engine = FakeEngine::new();
        engine.set_failure(Some(Status::unavailable("down")));

        let result = engine.client().chain(&point(0.0, 0.0)).buffer(1.0).execute().await;

        assert_eq!(result, Err(ChainError::ServiceUnavailable("down".into())));
        assert!(engine.requests().is_empty());
    }
}
