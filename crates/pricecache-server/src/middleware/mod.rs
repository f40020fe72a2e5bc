//! Middleware stack para el servidor HTTP.
//!
//! - `RequestIdLayer`: genera o propaga X-Request-Id
//! - `LoggingLayer`: logging estructurado de requests, incluyendo el origen
//!   del valor servido en las lecturas del catalogo

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{MAX_REQUEST_ID_LEN, REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};
