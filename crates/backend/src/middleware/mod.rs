//! Request middleware for the backend.
//!
//! [`crate::app`] wraps the routes in the request id tagger, then the trace
//! layer. The binary adds the Sentry layers outside both.

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, RequestId, tag_request};
