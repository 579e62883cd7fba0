// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Chains and unions executed against the in-process engine.

use geo_types::Point;
use geochain_client::{
    ChainError, Geometry, ReferencePolicy, Shape, SpatialReference, UnaryOp, DEFAULT_UNION_BATCH,
};
use geochain_dry_tests::{nad27_lines, point, square, FakeEngine};
use geochain_proto::geometry_data::Data;
use geochain_proto::geometry_request::Params;
use geochain_proto::{params, Encoding, GeometryData, OperatorType};
use tonic::Status;

#[tokio::test]
async fn chained_tree_matches_step_by_step_execution() {
    let engine = FakeEngine::new();
    let client = engine.client();
    let lines = nad27_lines();

    let chained = client
        .chain(&lines)
        .simplify(true)
        .buffer(0.5)
        .project(SpatialReference::Epsg(4087))
        .convex_hull()
        .project(SpatialReference::Epsg(4326))
        .execute()
        .await
        .unwrap();
    assert_eq!(engine.unary_calls(), 1);

    let steps = [
        UnaryOp::Simplify { force: true },
        UnaryOp::Buffer { distance: 0.5 },
        UnaryOp::Project {
            target: SpatialReference::Epsg(4087),
        },
        UnaryOp::ConvexHull,
        UnaryOp::Project {
            target: SpatialReference::Epsg(4326),
        },
    ];
    let mut stepped = lines;
    for op in steps {
        stepped = client.chain(&stepped).apply(op).execute().await.unwrap();
    }

    assert_eq!(engine.unary_calls(), 6);
    let first_step = &engine.requests()[1];
    assert_eq!(first_step.operator(), OperatorType::Simplify);
    assert_eq!(
        first_step.params,
        Some(Params::Simplify(params::Simplify { force: true }))
    );
    assert_eq!(chained, stepped);
    assert_eq!(chained.reference, Some(SpatialReference::Epsg(4326)));
}

#[tokio::test]
async fn nested_tree_is_sent_as_one_request() {
    let engine = FakeEngine::new();
    let client = engine.client();

    client
        .chain(&nad27_lines())
        .buffer(1.0)
        .convex_hull()
        .execute()
        .await
        .unwrap();

    let request = engine.last_request().unwrap();
    assert_eq!(request.operator(), OperatorType::ConvexHull);
    assert_eq!(request.depth(), 2);
}

#[tokio::test]
async fn poisoned_chain_never_reaches_the_engine() {
    let engine = FakeEngine::new();
    let client = engine.client();

    let result = client
        .chain(&Geometry::unreferenced(Point::new(1.0, 1.0)))
        .buffer(1.0)
        .union(client.chain(&point(0.0, 0.0)))
        .execute()
        .await;

    assert_eq!(result, Err(ChainError::MissingSpatialReference));
    assert_eq!(engine.total_calls(), 0);
}

#[tokio::test]
async fn malformed_relate_matrix_is_local() {
    let engine = FakeEngine::new();
    let client = engine.client();

    let result = client
        .chain(&square(0.0, 0.0, 2.0))
        .relate(client.chain(&point(1.0, 1.0)), "T*F")
        .await;

    assert!(matches!(result, Err(ChainError::InvalidRelateMatrix(_))));
    assert_eq!(engine.total_calls(), 0);
}

#[tokio::test]
async fn predicates_and_measures_round_trip() {
    let engine = FakeEngine::new();
    let client = engine.client();
    let outer = square(0.0, 0.0, 10.0);
    let inner = point(5.0, 5.0);

    assert!(client
        .chain(&outer)
        .contains(client.chain(&inner))
        .await
        .unwrap());
    assert!(client
        .chain(&inner)
        .within(client.chain(&outer))
        .await
        .unwrap());
    assert!(!client
        .chain(&outer)
        .disjoint(client.chain(&inner))
        .await
        .unwrap());
    assert!(client
        .chain(&outer)
        .relate(client.chain(&inner), "T*****FF*")
        .await
        .unwrap());

    let distance = client
        .chain(&point(0.0, 0.0))
        .distance(client.chain(&point(3.0, 4.0)))
        .await
        .unwrap();
    assert!((distance - 5.0).abs() < 1e-9);
    let area = client.chain(&outer).geodetic_area().await.unwrap();
    assert!((area - 100.0).abs() < 1e-9);
    assert!(client.chain(&nad27_lines()).geodetic_length().await.unwrap() > 0.0);
}

#[tokio::test]
async fn buffered_output_contains_its_input() {
    let engine = FakeEngine::new();
    let client = engine.client();
    let lines = nad27_lines();

    let contained = client
        .chain(&lines)
        .buffer(44.0)
        .contains(client.chain(&lines))
        .await
        .unwrap();

    assert!(contained);
}

#[tokio::test]
async fn result_without_reference_is_incomplete() {
    let engine = FakeEngine::new();
    engine.set_strip_references(true);

    let result = engine
        .client()
        .chain(&point(1.0, 1.0))
        .buffer(1.0)
        .execute()
        .await;

    assert_eq!(result, Err(ChainError::IncompleteResult));
}

#[tokio::test]
async fn result_with_blank_reference_is_incomplete() {
    let engine = FakeEngine::new();
    engine.set_blank_references(true);

    let result = engine
        .client()
        .chain(&point(1.0, 1.0))
        .buffer(1.0)
        .execute()
        .await;

    assert_eq!(result, Err(ChainError::IncompleteResult));
}

#[tokio::test]
async fn unavailable_engine_is_reported_as_such() {
    let engine = FakeEngine::new();
    engine.set_failure(Some(Status::unavailable("engine offline")));

    let result = engine
        .client()
        .chain(&point(1.0, 1.0))
        .convex_hull()
        .execute()
        .await;

    assert_eq!(
        result,
        Err(ChainError::ServiceUnavailable("engine offline".into()))
    );
}

#[tokio::test]
async fn other_failures_keep_their_status_code() {
    let engine = FakeEngine::new();
    engine.set_failure(Some(Status::invalid_argument("bad geometry")));

    let result = engine
        .client()
        .chain(&point(1.0, 1.0))
        .convex_hull()
        .execute()
        .await;

    assert_eq!(
        result,
        Err(ChainError::Transport {
            code: tonic::Code::InvalidArgument,
            message: "bad geometry".into(),
        })
    );
}

#[tokio::test]
async fn esri_seed_is_imported_with_one_request() {
    let engine = FakeEngine::new();
    let payload = GeometryData {
        proj: None,
        data: Some(Data::EsriShape(b"POINT (3 4)".to_vec())),
    };

    let geometry = engine.client().chain_payload(payload).execute().await.unwrap();

    assert_eq!(geometry, point(3.0, 4.0));
    assert_eq!(engine.unary_calls(), 1);
    let request = engine.last_request().unwrap();
    assert_eq!(request.operator(), OperatorType::ExportToWkb);
    assert_eq!(request.result_encoding(), Encoding::Ewkb);
}

#[tokio::test]
async fn mismatched_operands_run_in_left_reference() {
    let engine = FakeEngine::new();
    let client = engine.client();
    let nad27_point = Geometry::new(Point::new(1.0, 1.0), SpatialReference::Epsg(4267));

    let result = client
        .chain(&square(0.0, 0.0, 2.0))
        .intersection(client.chain(&nad27_point))
        .execute()
        .await
        .unwrap();

    assert_eq!(result.reference, Some(SpatialReference::Epsg(4326)));
    let request = engine.last_request().unwrap();
    assert_eq!(
        request.operation_proj,
        Some(SpatialReference::Epsg(4326).to_proto())
    );
}

#[tokio::test]
async fn reject_policy_stops_mismatched_operands() {
    let engine = FakeEngine::new();
    let client = engine.client().with_reference_policy(ReferencePolicy::Reject);
    let nad27_point = Geometry::new(Point::new(1.0, 1.0), SpatialReference::Epsg(4267));

    let result = client
        .chain(&square(0.0, 0.0, 2.0))
        .union(client.chain(&nad27_point))
        .execute()
        .await;

    assert!(matches!(result, Err(ChainError::ReferenceMismatch(_))));
    assert_eq!(engine.total_calls(), 0);
}

fn part_count(geometry: &Geometry) -> usize {
    match &geometry.shape {
        Shape::GeometryCollection(parts) => parts.len(),
        _ => 1,
    }
}

#[tokio::test]
async fn union_all_carries_each_batch_forward() {
    let engine = FakeEngine::new();
    let points = (0..5).map(|i| point(f64::from(i), 0.0));

    let merged = engine.client().union_all(points, 2).await.unwrap();

    assert_eq!(engine.client_stream_calls(), 4);
    assert_eq!(part_count(&merged), 5);
    assert_eq!(merged.reference, Some(SpatialReference::Epsg(4326)));
}

#[tokio::test]
async fn union_all_fits_small_inputs_in_one_batch() {
    let engine = FakeEngine::new();
    let points = (0..5).map(|i| point(f64::from(i), 0.0));

    let merged = engine
        .client()
        .union_all(points, DEFAULT_UNION_BATCH)
        .await
        .unwrap();

    assert_eq!(engine.client_stream_calls(), 1);
    assert_eq!(engine.requests().len(), 5);
    assert_eq!(part_count(&merged), 5);
}

#[tokio::test]
async fn union_all_of_one_geometry_skips_the_engine() {
    let engine = FakeEngine::new();

    let merged = engine
        .client()
        .union_all([point(1.0, 2.0)], DEFAULT_UNION_BATCH)
        .await
        .unwrap();

    assert_eq!(merged, point(1.0, 2.0));
    assert_eq!(engine.total_calls(), 0);
}
