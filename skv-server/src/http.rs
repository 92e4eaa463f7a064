//! # HTTP Front-End
//!
//! A single route (`/`) whose handler is shared across `GET`, `POST`, and
//! `DELETE` — the HTTP method alone selects the cache command, following
//! the same method-to-command mapping the reference web server used.
//!
//! `key=`/`value=` query parameters may repeat (`?key=a&key=b&value=1&value=2`),
//! so the query string is parsed by hand rather than through axum's
//! `Query<HashMap<_, _>>` extractor, which collapses duplicate keys.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{RawQuery, State};
use axum::http::Method;
use axum::routing::get;
use axum::{Json, Router};
use skv_common::protocol::{CacheResponse, Status};
use skv_core::Dispatcher;

use crate::metrics::Metrics;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<Metrics>,
}

/// Builds the application's router: one route, three methods, one handler.
pub fn build_router(state: AppState) -> Router {
    Router::new().route("/", get(handle).post(handle).delete(handle)).with_state(state)
}

/// Parses `key=`/`value=` pairs out of a raw query string, preserving
/// repetition order. Unrecognized parameters are ignored.
fn parse_query(query: Option<String>) -> (Vec<Arc<[u8]>>, Vec<Arc<[u8]>>) {
    let mut keys = Vec::new();
    let mut values = Vec::new();

    let Some(query) = query else {
        return (keys, values);
    };

    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match name.as_ref() {
            "key" => keys.push(Arc::from(value.as_bytes())),
            "value" => values.push(Arc::from(value.as_bytes())),
            _ => {}
        }
    }

    (keys, values)
}

fn command_for(method: &Method) -> &'static str {
    match *method {
        Method::GET => "get",
        Method::POST => "put",
        Method::DELETE => "del",
        _ => "unsupported",
    }
}

async fn handle(State(state): State<AppState>, method: Method, RawQuery(query): RawQuery) -> Json<CacheResponse> {
    state.metrics.record_request_start();
    let started = Instant::now();

    let (keys, values) = parse_query(query);
    let command = command_for(&method);
    let response = state.dispatcher.dispatch(command, keys, values).await;

    if response.status == Status::Error {
        state.metrics.record_error();
    }
    state.metrics.record_request_end(started.elapsed());

    Json(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Arc<[u8]> {
        Arc::from(s.as_bytes())
    }

    #[test]
    fn parse_query_collects_repeated_params_in_order() {
        let (keys, values) = parse_query(Some("key=a&key=b&value=1&value=2".to_string()));
        assert_eq!(keys, vec![b("a"), b("b")]);
        assert_eq!(values, vec![b("1"), b("2")]);
    }

    #[test]
    fn parse_query_ignores_unknown_params() {
        let (keys, values) = parse_query(Some("key=a&bogus=x".to_string()));
        assert_eq!(keys, vec![b("a")]);
        assert!(values.is_empty());
    }

    #[test]
    fn parse_query_handles_absent_query_string() {
        let (keys, values) = parse_query(None);
        assert!(keys.is_empty());
        assert!(values.is_empty());
    }

    #[test]
    fn command_for_maps_http_methods() {
        assert_eq!(command_for(&Method::GET), "get");
        assert_eq!(command_for(&Method::POST), "put");
        assert_eq!(command_for(&Method::DELETE), "del");
    }
}
