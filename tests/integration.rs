//! Integration tests driving the RD cache through transport-agnostic requests

use rust_rdcache::coap_types::{ContentFormat, Method, Request, ResponseCode};
use rust_rdcache::{EndpointRegistry, RdCacheConfig, RdCacheHandler};

const SENSOR_LINKS: &str = r#"</sensors/temp>;rt="temperature-c";if="sensor";ct=0,
</sensors/light>;rt="light-lux core.s";if="sensor";obs,
</>;title="node root""#;

fn handler() -> RdCacheHandler {
    RdCacheHandler::new(RdCacheConfig::default())
}

fn register(handler: &RdCacheHandler, query: &str, payload: &str) -> ResponseCode {
    let request = Request::new(Method::Post)
        .with_query(query)
        .with_payload(payload, ContentFormat::LinkFormat);
    handler.handle(&request).code
}

fn list(handler: &RdCacheHandler) -> String {
    handler.handle(&Request::new(Method::Get)).text()
}

#[test]
fn test_registration_is_idempotent() {
    let handler = handler();
    let directory = handler.directory();

    assert_eq!(register(&handler, "ep=node1", SENSOR_LINKS), ResponseCode::Created);
    let first = directory.read().root().clone();

    assert_eq!(register(&handler, "ep=node1", SENSOR_LINKS), ResponseCode::Changed);
    assert_eq!(directory.read().root(), &first);
    assert_eq!(directory.read().registry().len(), 1);

    let node = first.child("node1").unwrap();
    assert_eq!(node.attributes().first("title"), Some("node root"));
    let light = node.find(&["sensors", "light"]).unwrap();
    assert_eq!(light.attributes().get("rt"), ["light-lux", "core.s"]);
    assert_eq!(light.owner(), Some("node1"));
}

#[test]
fn test_path_materialization() {
    let handler = handler();
    register(&handler, "ep=node1", "</a/b/c>");

    let directory = handler.directory();
    let count = directory.read().root().child("node1").unwrap().node_count();
    assert_eq!(count, 4);

    register(&handler, "ep=node1", "</a/b/c>,</a/b/d>");
    let dir = directory.read();
    let node = dir.root().child("node1").unwrap();
    assert_eq!(node.node_count(), 5);
    assert_eq!(node.find(&["a", "b"]).unwrap().children().len(), 2);
}

#[test]
fn test_lifetime_clamping() {
    let handler = handler();
    register(&handler, "ep=short&lt=10", "");
    register(&handler, "ep=hours&lt=7200", "");
    register(&handler, "ep=default", "");

    let directory = handler.directory();
    let dir = directory.read();
    let lifetime = |ep: &str| {
        (
            dir.root().child(ep).unwrap().lifetime(),
            dir.registry()
                .find_by_name_and_domain(ep, "local")
                .unwrap()
                .lifetime,
        )
    };

    assert_eq!(lifetime("short"), (Some(60), 60));
    assert_eq!(lifetime("hours"), (Some(7200), 7200));
    assert_eq!(lifetime("default"), (Some(86400), 86400));
}

#[test]
fn test_missing_endpoint_name_mutates_nothing() {
    let handler = handler();
    assert_eq!(register(&handler, "d=home&lt=300", SENSOR_LINKS), ResponseCode::BadRequest);

    let directory = handler.directory();
    assert!(directory.read().registry().is_empty());
    assert!(directory.read().root().children().is_empty());
    assert_eq!(list(&handler), "");
}

#[test]
fn test_listing_completeness() {
    let handler = handler();
    register(&handler, "ep=node1", SENSOR_LINKS);
    register(&handler, "ep=node2", "</x>");
    register(&handler, "ep=node1", "</y>");

    let response = handler.handle(&Request::new(Method::Get));
    assert_eq!(response.code, ResponseCode::Content);
    assert_eq!(response.content_format, Some(ContentFormat::LinkFormat));
    assert_eq!(response.text(), "</node1>,</node2>");
}

#[test]
fn test_domains_are_separate_records() {
    let handler = handler();
    assert_eq!(register(&handler, "ep=node1&d=home", ""), ResponseCode::Created);
    assert_eq!(register(&handler, "ep=node1&d=office", ""), ResponseCode::Created);
    assert_eq!(register(&handler, "ep=node1&d=home", ""), ResponseCode::Changed);

    assert_eq!(handler.directory().read().registry().len(), 2);
}

#[test]
fn test_invalid_parameters_roll_back() {
    let handler = handler();
    assert_eq!(
        register(&handler, "ep=node1&con=http://example.com", "</a>"),
        ResponseCode::BadRequest
    );

    let directory = handler.directory();
    assert!(directory.read().registry().is_empty());
    assert_eq!(list(&handler), "");
}

#[test]
fn test_rejected_update_keeps_existing_subtree() {
    let handler = handler();
    assert_eq!(register(&handler, "ep=n", "</a>"), ResponseCode::Created);
    let directory = handler.directory();
    let before = directory.read().root().clone();

    assert_eq!(
        register(&handler, "ep=n&con=ftp://x", "</b>"),
        ResponseCode::BadRequest
    );
    assert!(directory.read().registry().is_empty());
    assert_eq!(directory.read().root(), &before);
    assert_eq!(list(&handler), "</n>");
}

#[test]
fn test_non_utf8_payload_mutates_nothing() {
    let handler = handler();
    let request = Request::new(Method::Post)
        .with_query("ep=n")
        .with_payload(vec![b'<', b'/', 0xff, b'>'], ContentFormat::LinkFormat);
    let response = handler.handle(&request);

    assert_eq!(response.code, ResponseCode::BadRequest);
    assert!(response.text().contains("Malformed link format"));
    assert!(handler.directory().read().registry().is_empty());
    assert_eq!(list(&handler), "");
}

#[test]
fn test_double_slash_uri_is_rejected() {
    let handler = handler();
    assert_eq!(register(&handler, "ep=n", "<//>"), ResponseCode::BadRequest);
    assert!(handler.directory().read().registry().is_empty());
    assert_eq!(list(&handler), "");
}

#[test]
fn test_malformed_payload_mutates_nothing() {
    let handler = handler();
    register(&handler, "ep=node1", "</a>");

    let request = Request::new(Method::Post)
        .with_query("ep=node2")
        .with_payload("</b;rt=\"x\"", ContentFormat::LinkFormat);
    let response = handler.handle(&request);

    assert_eq!(response.code, ResponseCode::BadRequest);
    assert!(response.text().contains("Malformed link format"));
    assert_eq!(handler.directory().read().registry().len(), 1);
    assert_eq!(list(&handler), "</node1>");
}

#[test]
fn test_concurrent_registration_of_one_endpoint() {
    let handler = handler();
    let shared = &handler;

    let codes: Vec<ResponseCode> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| scope.spawn(move || register(shared, "ep=node1&lt=120", SENSOR_LINKS)))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let created = codes.iter().filter(|c| **c == ResponseCode::Created).count();
    assert_eq!(created, 1);
    assert_eq!(handler.directory().read().registry().len(), 1);
    assert_eq!(list(&handler), "</node1>");
}
