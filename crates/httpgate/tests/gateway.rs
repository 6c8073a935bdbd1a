//! A configured gateway, end to end: TOML → chain → endpoint.

use std::fs;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use httpgate::prelude::*;

const POLICY: &str = r#"
package httpgate.authz

import rego.v1

default allow := false

allow if {
    some role in input.roles
    some grant in data.grants[role]
    grant == input.action
}
"#;

fn config_with_policies(dir: &std::path::Path) -> GatewayConfig {
    fs::write(dir.join("authz.rego"), POLICY).unwrap();
    fs::write(
        dir.join("grants.json"),
        r#"{"grants": {"clerk": ["GET:/orders", "GET:/health"]}}"#,
    )
    .unwrap();

    let toml = format!(
        r#"
        [trace_id]
        header_name = "X-Request-ID"

        [interceptor]
        intercept = [404]

        [interceptor.messages]
        404 = "nothing here"

        [authorization]
        enforcer = "rego"
        roles_header = "X-Roles"

        [authorization.rego]
        query = "data.httpgate.authz.allow"
        policies_path = "{}"

        [health]
        version = "2.0.0"
        "#,
        dir.display()
    );

    ConfigLoader::new()
        .with_string(&toml, "toml")
        .unwrap()
        .load()
        .unwrap()
}

fn endpoint(config: &GatewayConfig) -> Endpoint {
    let probe = Probe::new(
        [(
            "policy",
            Arc::new(FnChecker::new(|| async { Ok(()) })) as Arc<dyn Checker>,
        )],
        config.health.clone(),
    );
    let status = Status::with_hostname(config.health.version.clone(), "gate-test");

    build_chain(config)
        .unwrap()
        .endpoint(move |_ctx: &mut RequestContext, request: Request| -> BoxFuture<'static, Response> {
            let probe = probe.clone();
            let status = status.clone();
            Box::pin(async move {
                match request.uri().path() {
                    "/health" => probe.respond().await,
                    "/status" => status.respond(),
                    "/orders" => text_response(StatusCode::OK, "application/json", "[]"),
                    _ => empty_response(StatusCode::NOT_FOUND),
                }
            })
        })
}

fn get(path: &str, roles: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(path)
        .header("x-roles", roles)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[tokio::test]
async fn test_policy_allows_granted_action() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = endpoint(&config_with_policies(dir.path()));

    let response = endpoint.call(get("/orders", "clerk")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_policy_denies_ungranted_action() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = endpoint(&config_with_policies(dir.path()));

    let response = endpoint.call(get("/status", "clerk")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let problem: ProblemDetail = serde_json::from_slice(&body).unwrap();
    assert_eq!(problem.status(), 403);
}

#[tokio::test]
async fn test_health_probe_behind_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = endpoint(&config_with_policies(dir.path()));

    let response = endpoint.call(get("/health", "clerk")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["policy"]["status"], "OK");
}

#[tokio::test]
async fn test_config_error_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_with_policies(dir.path());
    if let Some(section) = config.authorization.as_mut() {
        section.rego = Some(RegoConfig::new("data.httpgate.authz.allow", dir.path().join("none")));
    }
    assert!(matches!(build_chain(&config), Err(BuildError::Authz(_))));
}
