//! HTTP client for the Patchbay update service.
//!
//! `HttpTransport` executes single exchanges; `NetworkClient` layers retry
//! with linear backoff, a TTL response cache, and the typed endpoints on
//! top. Batch endpoints preserve input order in their results.

mod cache;
mod client;
mod error;
mod protocol;
mod transport;

pub use cache::ResponseCache;
pub use client::{NetworkClient, NetworkClientConfig};
pub use error::{NetworkError, NetworkResult};
pub use protocol::{UpdateCheckRequest, UpdateDescriptor, UpdatePackage};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
