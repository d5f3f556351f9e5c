//! Shared fixtures for civic-intake integration tests
//!
//! Collaborators are replaced by deterministic fakes; the database is a
//! private in-memory SQLite with the production schema.

#![allow(dead_code)]

use async_trait::async_trait;
use civic_intake::config::IntakeSettings;
use civic_intake::index::VisualIndex;
use civic_intake::services::DbNotificationSink;
use civic_intake::spatial::SqliteSpatialIndex;
use civic_intake::types::{
    CaptionResult, Captioner, CollaboratorError, Embedding, EmbeddingExtractor, ImageStore,
    NotificationSink, OutgoingNotification,
};
use civic_intake::workflow::{Collaborators, NewSubmission};
use civic_intake::IssueIngestionPipeline;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Embedding dimension used by the fake extractor
pub const TEST_DIM: usize = 16;

pub const CITY_LAT: f64 = 8.5241;
pub const CITY_LON: f64 = 76.9366;

/// Embeds an image as its byte histogram folded into `TEST_DIM` buckets.
///
/// Images made of one repeated byte land on one axis, so near-identical
/// images score close to 1.0 and images of different bytes score 0.0.
pub struct HistogramExtractor;

#[async_trait]
impl EmbeddingExtractor for HistogramExtractor {
    async fn embed(&self, image: &[u8]) -> Option<Embedding> {
        let mut values = vec![0.0f32; TEST_DIM];
        for byte in image {
            values[*byte as usize % TEST_DIM] += 1.0;
        }
        Embedding::from_raw(values)
    }
}

/// Always fails to embed
pub struct NoEmbedding;

#[async_trait]
impl EmbeddingExtractor for NoEmbedding {
    async fn embed(&self, _image: &[u8]) -> Option<Embedding> {
        None
    }
}

/// Returns the same caption for every image
pub struct FixedCaptioner(pub CaptionResult);

impl FixedCaptioner {
    pub fn tags(caption: &str, tags: &[&str]) -> Self {
        Self(CaptionResult {
            caption: caption.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        })
    }

    pub fn unavailable() -> Self {
        Self(CaptionResult::unavailable())
    }
}

#[async_trait]
impl Captioner for FixedCaptioner {
    async fn analyze(&self, _image: &[u8], _content_type: Option<&str>) -> CaptionResult {
        self.0.clone()
    }
}

/// In-memory image store counting uploads
#[derive(Default)]
pub struct MemoryImageStore {
    pub fail: bool,
    pub uploads: AtomicUsize,
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(
        &self,
        _image: &[u8],
        _content_type: Option<&str>,
    ) -> Result<String, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Storage("bucket unavailable".to_string()));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(format!("http://images.test/{}.jpg", n))
    }
}

/// Notification sink that always fails
pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn send(&self, _notification: OutgoingNotification) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::NotConfigured("smtp".to_string()))
    }
}

pub struct TestContext {
    pub pipeline: Arc<IssueIngestionPipeline>,
    pub db: SqlitePool,
    pub index: Arc<VisualIndex>,
    pub image_store: Arc<MemoryImageStore>,
}

pub struct TestOptions {
    pub extractor: Arc<dyn EmbeddingExtractor>,
    pub captioner: Arc<dyn Captioner>,
    pub image_store_fails: bool,
    pub failing_notifier: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            extractor: Arc::new(HistogramExtractor),
            captioner: Arc::new(FixedCaptioner::tags(
                "Overflowing garbage bin on the street corner",
                &["municipality", "garbage", "overflowing_bin"],
            )),
            image_store_fails: false,
            failing_notifier: false,
        }
    }
}

pub async fn context() -> TestContext {
    context_with(TestOptions::default()).await
}

pub async fn context_with(options: TestOptions) -> TestContext {
    let db = civic_common::db::init_in_memory_database()
        .await
        .expect("in-memory database");
    context_on(db, options)
}

/// Pipeline over an already-initialized pool (e.g. a file-backed database)
pub fn context_on(db: SqlitePool, options: TestOptions) -> TestContext {
    let index = Arc::new(VisualIndex::in_memory(TEST_DIM));
    let image_store = Arc::new(MemoryImageStore {
        fail: options.image_store_fails,
        ..Default::default()
    });
    let notifier: Arc<dyn NotificationSink> = if options.failing_notifier {
        Arc::new(FailingSink)
    } else {
        Arc::new(DbNotificationSink::new(db.clone()))
    };

    let pipeline = Arc::new(IssueIngestionPipeline::new(
        db.clone(),
        Arc::clone(&index),
        Arc::new(SqliteSpatialIndex::new(db.clone())),
        Collaborators {
            extractor: options.extractor,
            captioner: options.captioner,
            image_store: image_store.clone(),
            notifier,
        },
        IntakeSettings::default(),
    ));

    TestContext {
        pipeline,
        db,
        index,
        image_store,
    }
}

/// Image made of one repeated byte, `noise` bytes replaced by a neighbour value
pub fn image(byte: u8, noise: usize) -> Vec<u8> {
    let mut bytes = vec![byte; 200];
    for b in bytes.iter_mut().take(noise) {
        *b = byte.wrapping_add(1);
    }
    bytes
}

pub fn submission_at(latitude: f64, longitude: f64, image: Vec<u8>) -> NewSubmission {
    NewSubmission {
        title: None,
        description: Some("Reported from the field".to_string()),
        latitude,
        longitude,
        image,
        content_type: Some("image/jpeg".to_string()),
    }
}

pub async fn notification_kinds(db: &SqlitePool, token: &str) -> Vec<String> {
    sqlx::query_scalar("SELECT type FROM notifications WHERE citizen_token = ? ORDER BY id")
        .bind(token)
        .fetch_all(db)
        .await
        .expect("notification query")
}
