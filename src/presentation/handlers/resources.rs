//! Placeholder resource handlers
//!
//! The CRUD handlers for the school resources live outside this service. These
//! stand-ins report what reached them after the pipeline ran, which is what the
//! pipeline is responsible for.

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, Uri},
    response::Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use url::form_urlencoded;

type Params = BTreeMap<String, Vec<String>>;

/// What a resource handler observed about the request
#[derive(Debug, Serialize)]
pub struct ResourceEcho {
    pub resource: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub method: String,
    pub message: String,
    pub query: Params,
    pub form: Params,
}

fn collect_params(encoded: &[u8]) -> Params {
    let mut params = Params::new();
    for (name, value) in form_urlencoded::parse(encoded) {
        params.entry(name.into_owned()).or_default().push(value.into_owned());
    }
    params
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

fn echo(
    resource: &'static str,
    id: Option<String>,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: &Bytes,
) -> Json<ResourceEcho> {
    let query = uri.query().map(|query| collect_params(query.as_bytes())).unwrap_or_default();
    let form = if is_form(headers) { collect_params(body) } else { Params::new() };

    Json(ResourceEcho {
        resource,
        id,
        method: method.to_string(),
        message: format!("{method} {resource}"),
        query,
        form,
    })
}

pub async fn root(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<ResourceEcho> {
    echo("root", None, &method, &uri, &headers, &body)
}

pub async fn teachers(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ResourceEcho> {
    echo("teachers", None, &method, &uri, &headers, &body)
}

pub async fn teacher(
    Path(id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ResourceEcho> {
    echo("teachers", Some(id), &method, &uri, &headers, &body)
}

pub async fn students(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ResourceEcho> {
    echo("students", None, &method, &uri, &headers, &body)
}

pub async fn execs(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<ResourceEcho> {
    echo("execs", None, &method, &uri, &headers, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_params_keeps_every_value() {
        let params = collect_params(b"name=a&name=b&age=3");

        assert_eq!(params["name"], vec!["a", "b"]);
        assert_eq!(params["age"], vec!["3"]);
    }

    #[tokio::test]
    async fn test_echo_reports_query_and_form() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/x-www-form-urlencoded".parse().unwrap());

        let Json(echo) = teachers(
            Method::POST,
            "/teachers/?sortby=age".parse().unwrap(),
            headers,
            Bytes::from_static(b"name=alice"),
        )
        .await;

        assert_eq!(echo.resource, "teachers");
        assert_eq!(echo.message, "POST teachers");
        assert_eq!(echo.query["sortby"], vec!["age"]);
        assert_eq!(echo.form["name"], vec!["alice"]);
    }

    #[tokio::test]
    async fn test_non_form_body_is_not_parsed() {
        let Json(echo) = students(
            Method::POST,
            "/students/".parse().unwrap(),
            HeaderMap::new(),
            Bytes::from_static(b"name=alice"),
        )
        .await;

        assert!(echo.form.is_empty());
        assert!(echo.query.is_empty());
    }

    #[tokio::test]
    async fn test_teacher_reports_id() {
        let Json(echo) = teacher(
            Path("42".to_string()),
            Method::GET,
            "/teachers/42".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        )
        .await;

        assert_eq!(echo.id.as_deref(), Some("42"));
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["id"], "42");
    }
}
