//! skv-server - the HTTP front end for the sharded cache: translates
//! GET/POST/DELETE requests on `/` into dispatcher commands and reports
//! request metrics alongside them.

pub mod http;
pub mod metrics;

pub use http::{build_router, AppState};
pub use metrics::Metrics;
