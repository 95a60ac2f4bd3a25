//! Object storage abstraction for uploaded media (avatars, logos).
//!
//! The HTTP layer validates content type and size; implementations only
//! persist bytes and return a servable path.

use async_trait::async_trait;

use crate::errors::ServiceError;

pub mod local;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store a blob under `folder/filename`, returning its stored path.
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, ServiceError>;
}
