//! GeoServer client against a scripted server.

use std::time::Duration;

use geoserver::{GeoServerClient, GeoServerConfig};
use mosaic_common::{GranuleSelection, MosaicError, MosaicStore};
use test_utils::{utc, MockGeoServer, TempDataDir};

const INDEX: &str = "/rest/workspaces/geonode/coveragestores/gfms_current/coverages/gfms_current/index/granules";
const EXTERNAL: &str = "/rest/workspaces/geonode/coveragestores/gfms_current/external.imagemosaic";
const FILE_MOSAIC: &str = "/rest/workspaces/geonode/coveragestores/gfms_current/file.imagemosaic";
const COVERAGE: &str = "/rest/workspaces/geonode/coveragestores/gfms_current/coverages/gfms_current.json";

fn client(server: &MockGeoServer) -> GeoServerClient {
    let config = GeoServerConfig {
        url: server.url(),
        index_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    GeoServerClient::new(config).unwrap()
}

fn index_json(granules: &[(&str, &str)]) -> String {
    let features: Vec<String> = granules
        .iter()
        .map(|(id, location)| {
            format!(
                r#"{{"type":"Feature","id":"{}","geometry":null,"properties":{{"location":"{}","ingestion":"2024-03-10T15:00:00Z"}}}}"#,
                id, location
            )
        })
        .collect();
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

// ============================================================================
// Index queries
// ============================================================================

#[tokio::test]
async fn test_list_parses_feature_collection() {
    let server = MockGeoServer::start().await;
    server.respond(
        "GET",
        &format!("{}.json", INDEX),
        200,
        index_json(&[
            ("gfms_current.1", "gfms_current_20240310T030000000Z.tif"),
            ("gfms_current.2", "gfms_current_20240310T150000000Z.tif"),
        ]),
    );

    let records = client(&server).list_granules("gfms_current", None).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "gfms_current.1");
    assert_eq!(records[1].location, "gfms_current_20240310T150000000Z.tif");
}

#[tokio::test]
async fn test_selection_sent_as_cql_filter() {
    let server = MockGeoServer::start().await;
    server.respond("GET", &format!("{}.json", INDEX), 200, index_json(&[]));
    let selection = GranuleSelection::at_or_before(utc(2024, 2, 9, 0));

    client(&server)
        .list_granules("gfms_current", Some(&selection))
        .await
        .unwrap();

    let requests = server.requests_to("GET", &format!("{}.json", INDEX));
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].params.get("filter").map(String::as_str),
        Some("ingestion<=2024-02-09T00:00:00.000Z")
    );
}

#[tokio::test]
async fn test_missing_index_is_empty() {
    let server = MockGeoServer::start().await;

    let records = client(&server).list_granules("gfms_current", None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_empty_collection_without_features() {
    let server = MockGeoServer::start().await;
    server.respond("GET", &format!("{}.json", INDEX), 200, r#"{"type":"FeatureCollection"}"#);

    let records = client(&server).list_granules("gfms_current", None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_slow_index_reports_timeout() {
    let server = MockGeoServer::start().await;
    server.respond("GET", &format!("{}.json", INDEX), 200, index_json(&[]));
    server.delay("GET", &format!("{}.json", INDEX), Duration::from_secs(2));

    let err = client(&server)
        .list_granules("gfms_current", None)
        .await
        .unwrap_err();

    assert!(matches!(err, MosaicError::IndexQueryTimeout { .. }));
    assert!(err.is_degradable());
}

#[tokio::test]
async fn test_index_server_error_propagates() {
    let server = MockGeoServer::start().await;
    server.respond("GET", &format!("{}.json", INDEX), 500, "boom");

    let err = client(&server)
        .list_granules("gfms_current", None)
        .await
        .unwrap_err();

    assert!(matches!(err, MosaicError::IndexQuery { .. }));
    assert!(!err.is_degradable());
}

// ============================================================================
// Deletes
// ============================================================================

#[tokio::test]
async fn test_delete_granule_record() {
    let server = MockGeoServer::start().await;
    let path = format!("{}/gfms_current.7", INDEX);
    server.respond("DELETE", &path, 200, "");

    client(&server)
        .delete_granule("gfms_current", "gfms_current.7")
        .await
        .unwrap();
    assert_eq!(server.requests_to("DELETE", &path).len(), 1);
}

#[tokio::test]
async fn test_delete_failure_names_granule() {
    let server = MockGeoServer::start().await;
    server.respond("DELETE", &format!("{}/gfms_current.7", INDEX), 500, "locked");

    let err = client(&server)
        .delete_granule("gfms_current", "gfms_current.7")
        .await
        .unwrap_err();

    match err {
        MosaicError::RemoteDeleteFailure { id, message, .. } => {
            assert_eq!(id, "gfms_current.7");
            assert!(message.contains("locked"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Publication
// ============================================================================

#[tokio::test]
async fn test_publish_posts_file_url() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 202, "");
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    client(&server).publish_granule("gfms_current", &path).await.unwrap();

    let posts = server.requests_to("POST", EXTERNAL);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].body_text(), format!("file://{}", path.display()));
    assert!(server.requests_to("PUT", FILE_MOSAIC).is_empty());
}

#[tokio::test]
async fn test_missing_store_is_bootstrapped_and_retried() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 405, "");
    server.respond("POST", EXTERNAL, 202, "");
    server.respond("PUT", FILE_MOSAIC, 201, "");
    server.respond("PUT", COVERAGE, 200, "");
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    client(&server).publish_granule("gfms_current", &path).await.unwrap();

    assert_eq!(server.requests_to("PUT", FILE_MOSAIC).len(), 1);
    let coverage = server.requests_to("PUT", COVERAGE);
    assert_eq!(coverage.len(), 1);
    assert!(coverage[0].body_text().contains("ISO8601"));
    assert_eq!(server.requests_to("POST", EXTERNAL).len(), 2);
}

#[tokio::test]
async fn test_bootstrap_seed_already_indexed_skips_retry() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 405, "");
    server.respond("PUT", FILE_MOSAIC, 201, "");
    server.respond("PUT", COVERAGE, 200, "");
    server.respond(
        "GET",
        &format!("{}.json", INDEX),
        200,
        index_json(&[("gfms_current.1", "gfms_current_20240310T150000000Z.tif")]),
    );
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    client(&server).publish_granule("gfms_current", &path).await.unwrap();

    assert_eq!(server.requests_to("POST", EXTERNAL).len(), 1);
}

#[tokio::test]
async fn test_second_rejection_is_upload_conflict() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 405, "");
    server.respond("PUT", FILE_MOSAIC, 201, "");
    server.respond("PUT", COVERAGE, 200, "");
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    let err = client(&server)
        .publish_granule("gfms_current", &path)
        .await
        .unwrap_err();

    assert!(matches!(err, MosaicError::UploadConflict { .. }));
    // one retry only
    assert_eq!(server.requests_to("POST", EXTERNAL).len(), 2);
    assert_eq!(server.requests_to("PUT", FILE_MOSAIC).len(), 1);
}

#[tokio::test]
async fn test_failed_bootstrap_propagates() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 405, "");
    server.respond("PUT", FILE_MOSAIC, 500, "no datastore");
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    let err = client(&server)
        .publish_granule("gfms_current", &path)
        .await
        .unwrap_err();

    assert!(matches!(err, MosaicError::Bootstrap { .. }));
    assert!(server.requests_to("PUT", COVERAGE).is_empty());
}

#[tokio::test]
async fn test_other_publish_errors_are_upload_failures() {
    let server = MockGeoServer::start().await;
    server.respond("POST", EXTERNAL, 500, "disk full");
    let data = TempDataDir::new("geonode");
    let path = data.touch_granule("gfms_current", "gfms_current_20240310T150000000Z.tif");

    let err = client(&server)
        .publish_granule("gfms_current", &path)
        .await
        .unwrap_err();

    assert!(matches!(err, MosaicError::Upload { ref message, .. } if message.contains("disk full")));
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
async fn test_truncate_tile_cache() {
    let server = MockGeoServer::start().await;
    let path = "/gwc/rest/seed/geonode:gfms_current.json";
    server.respond("POST", path, 200, "");

    client(&server).truncate_tile_cache("gfms_current").await.unwrap();

    let requests = server.requests_to("POST", path);
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["seedRequest"]["type"], "truncate");
    assert_eq!(body["seedRequest"]["name"], "geonode:gfms_current");
    assert_eq!(body["seedRequest"]["zoomStop"], 19);
}

#[tokio::test]
async fn test_default_style_created_when_missing() {
    let server = MockGeoServer::start().await;
    server.respond("POST", "/rest/styles", 201, "");
    server.respond("PUT", "/rest/styles/gfms", 200, "");
    server.respond("PUT", "/rest/layers/geonode:gfms_current", 200, "");

    client(&server)
        .ensure_default_style("gfms_current", "gfms", "<StyledLayerDescriptor/>")
        .await
        .unwrap();

    let created = server.requests_to("POST", "/rest/styles");
    assert_eq!(created.len(), 1);
    assert!(created[0].body_text().contains("<filename>gfms.sld</filename>"));
    assert_eq!(
        server.requests_to("PUT", "/rest/styles/gfms")[0].body_text(),
        "<StyledLayerDescriptor/>"
    );
    assert!(server.requests_to("PUT", "/rest/layers/geonode:gfms_current")[0]
        .body_text()
        .contains("<defaultStyle><name>gfms</name></defaultStyle>"));
}

#[tokio::test]
async fn test_existing_style_is_reused() {
    let server = MockGeoServer::start().await;
    server.respond("GET", "/rest/styles/gfms.json", 200, "{}");
    server.respond("PUT", "/rest/layers/geonode:gfms_current", 200, "");

    client(&server)
        .ensure_default_style("gfms_current", "gfms", "<StyledLayerDescriptor/>")
        .await
        .unwrap();

    assert!(server.requests_to("POST", "/rest/styles").is_empty());
}

#[tokio::test]
async fn test_publish_feature_type() {
    let server = MockGeoServer::start().await;
    let path = "/rest/workspaces/geonode/datastores/datastore/featuretypes";
    server.respond("POST", path, 201, "");

    client(&server)
        .publish_feature_type("nursing_homes", None)
        .await
        .unwrap();

    assert_eq!(
        server.requests_to("POST", path)[0].body_text(),
        "<featureType><name>nursing_homes</name></featureType>"
    );
}
