//! Service modules
//!
//! Pure decision logic (routing, priority) and the clients for external
//! collaborators (embedding model, vision captioner, image storage,
//! notification delivery).

pub mod captioner;
pub mod embedding_client;
pub mod image_store;
pub mod notifier;
pub mod priority;
pub mod routing;

pub use captioner::{DisabledCaptioner, GeminiCaptioner};
pub use embedding_client::{DisabledEmbeddingExtractor, HttpEmbeddingExtractor};
pub use image_store::LocalImageStore;
pub use notifier::DbNotificationSink;
pub use routing::assign_department;
