// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stream a batch of lines through a buffer and check each result.
//!
//! Connects to the engine named by the `geometry_service` prefs (or
//! `GEOMETRY_SERVICE_HOST`), buffers N copies of a NAD27 multi-linestring over
//! one bidirectional stream, then asks the engine whether each buffer contains
//! its source. Set `RUST_LOG=geochain_client=debug` to watch the session.
//!
//! Usage: `buffer_stream [distance] [copies]`

use anyhow::{ensure, Context, Result};
use futures_util::StreamExt;
use geochain_client::{connect, Geometry, SpatialReference, UnaryOp};
use tracing::info;

const LINES: &str =
    "MULTILINESTRING ((-120 -45, -100 -55, -90 -63, 0 0, 1 1, 100 25, 170 45, 175 65))";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let distance: f64 = args
        .next()
        .as_deref()
        .unwrap_or("44")
        .parse()
        .context("parse distance")?;
    let copies: usize = args
        .next()
        .as_deref()
        .unwrap_or("8")
        .parse()
        .context("parse copies")?;

    let source = Geometry::from_wkt(LINES, SpatialReference::Epsg(4267)).context("parse lines")?;
    let prefs = connect::resolve_prefs();
    let handle = connect::connect(&prefs)
        .await
        .with_context(|| format!("connect {}", prefs.address))?;
    let client = handle.client();

    let inputs = vec![source.clone(); copies];
    let mut session = client
        .stream(UnaryOp::Buffer { distance })
        .execute(tokio_stream::iter(inputs));

    let mut index = 0usize;
    while let Some(result) = session.next().await {
        let buffered = result.with_context(|| format!("stream item {index}"))?;
        let contains = client
            .chain(&buffered)
            .contains(client.chain(&source))
            .await
            .context("contains")?;
        ensure!(contains, "buffer {index} does not contain its source");
        info!(index, wkt = %buffered.to_wkt(), "buffered");
        index += 1;
    }

    info!(received = index, status = ?session.status(), "stream finished");
    handle.close();
    Ok(())
}
