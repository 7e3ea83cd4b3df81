mod error;
mod headers;

pub use error::{extract_upstream_error, GatewayError, RedirectError, UpstreamErrorBody};
pub use headers::{header_contains, header_get, header_remove, header_set, Headers};
