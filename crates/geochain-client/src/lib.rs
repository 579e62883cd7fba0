// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lazy operation chains and streaming execution against a remote geometry engine.
//!
//! Callers describe work as a [`Chain`] (buffer, union, project, ...) without
//! evaluating anything locally. The chain is an owned tree of
//! [`OperationNode`]s; executing it sends the whole tree as one request. For
//! per-item work, [`GeometryClient::stream`] pushes a stream of geometries
//! through one bidirectional RPC with a fixed operator template.
//!
//! ```no_run
//! # async fn demo() -> geochain_client::Result<()> {
//! use geochain_client::{connect, Geometry, SpatialReference};
//!
//! let handle = connect::shared().await?;
//! let lines = Geometry::from_wkt(
//!     "MULTILINESTRING ((-120 -45, -100 -55), (0 0, 1 1))",
//!     SpatialReference::Epsg(4267),
//! )?;
//! let hull = handle
//!     .client()
//!     .chain(&lines)
//!     .buffer(0.5)
//!     .project(SpatialReference::Epsg(4326))
//!     .convex_hull()
//!     .execute()
//!     .await?;
//! # let _ = hull;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod codec;
pub mod connect;
pub mod error;
pub mod executor;
pub mod node;
pub mod ops;
pub mod reference;
pub mod stream;
pub mod transport;

pub use chain::Chain;
pub use codec::{Geometry, Shape};
pub use error::{ChainError, Result};
pub use executor::{GeometryClient, DEFAULT_UNION_BATCH};
pub use node::{OperationNode, Operand};
pub use ops::{BinaryOp, Envelope, OffsetJoin, Predicate, UnaryOp};
pub use reference::{reconcile, CustomProjection, Reconciliation, ReferencePolicy, SpatialReference};
pub use stream::{ReceiveState, SendState, SessionStatus, StreamSession, StreamTemplate};
pub use transport::{GeometryTransport, GrpcTransport, ResponseStream};
