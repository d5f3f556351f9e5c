//! Issue database operations

use crate::types::{Coordinate, DuplicateConfidence, DuplicateVerdict, IssueId};
use chrono::{DateTime, Utc};
use civic_common::time::{parse_timestamp, to_db_string};
use civic_common::{Department, Error, IssueStatus, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection};

const ISSUE_COLUMNS: &str = "id, title, description, image_url, caption, tags, latitude, longitude, \
     status, department, upvote_count, priority_score, citizen_token, duplicate_of, \
     duplicate_confidence, created_at, updated_at";

/// Persisted issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: String,
    pub caption: Option<String>,
    pub tags: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub status: IssueStatus,
    pub department: Department,
    pub upvote_count: i64,
    pub priority_score: i64,
    /// Ownership token; handed to the submitter once, never serialized
    #[serde(skip_serializing)]
    pub citizen_token: String,
    pub duplicate_of: Option<IssueId>,
    pub duplicate_confidence: DuplicateConfidence,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Fields of an issue about to be written
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: String,
    pub caption: Option<String>,
    pub tags: Vec<String>,
    pub coordinate: Coordinate,
    pub department: Department,
    pub priority_score: i64,
    pub citizen_token: String,
    pub verdict: DuplicateVerdict,
    pub created_at: DateTime<Utc>,
}

/// Staff listing filter
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub department: Option<Department>,
    pub status: Option<IssueStatus>,
    pub limit: i64,
    pub offset: i64,
}

/// Insert a new issue (status Open, no votes) and return its id
pub async fn insert_issue<'e, E>(executor: E, issue: &NewIssue) -> Result<IssueId>
where
    E: Executor<'e, Database = Sqlite>,
{
    let tags = serde_json::to_string(&issue.tags)
        .map_err(|e| Error::Internal(format!("Failed to encode tags: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT INTO issues (
            title, description, image_url, caption, tags, latitude, longitude,
            status, department, upvote_count, priority_score, citizen_token,
            duplicate_of, duplicate_confidence, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&issue.title)
    .bind(&issue.description)
    .bind(&issue.image_url)
    .bind(&issue.caption)
    .bind(tags)
    .bind(issue.coordinate.latitude)
    .bind(issue.coordinate.longitude)
    .bind(IssueStatus::Open.as_str())
    .bind(issue.department.as_str())
    .bind(issue.priority_score)
    .bind(&issue.citizen_token)
    .bind(issue.verdict.matched_issue_id)
    .bind(issue.verdict.confidence.as_str())
    .bind(to_db_string(&issue.created_at))
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load an issue by id
pub async fn get_issue<'e, E>(executor: E, id: IssueId) -> Result<Option<Issue>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {} FROM issues WHERE id = ?", ISSUE_COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(issue_from_row).transpose()
}

/// Load an issue or fail with `NotFound`
pub async fn require_issue<'e, E>(executor: E, id: IssueId) -> Result<Issue>
where
    E: Executor<'e, Database = Sqlite>,
{
    get_issue(executor, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Issue {} not found", id)))
}

/// Newest-first listing with optional department/status filters
pub async fn list_issues<'e, E>(executor: E, filter: &IssueFilter) -> Result<Vec<Issue>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM issues
        WHERE (?1 IS NULL OR department = ?1)
          AND (?2 IS NULL OR status = ?2)
        ORDER BY created_at DESC, id DESC
        LIMIT ?3 OFFSET ?4
        "#,
        ISSUE_COLUMNS
    ))
    .bind(filter.department.map(|d| d.as_str()))
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.limit)
    .bind(filter.offset)
    .fetch_all(executor)
    .await?;

    rows.iter().map(issue_from_row).collect()
}

/// Issues inside a latitude/longitude box (inclusive), optionally excluding one id
///
/// `min_longitude > max_longitude` describes a box crossing the antimeridian.
pub async fn list_in_bounding_box<'e, E>(
    executor: E,
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
    exclude: Option<IssueId>,
) -> Result<Vec<Issue>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM issues
        WHERE latitude BETWEEN ?1 AND ?2
          AND (
                (?3 <= ?4 AND longitude BETWEEN ?3 AND ?4)
             OR (?3 > ?4 AND (longitude >= ?3 OR longitude <= ?4))
          )
          AND (?5 IS NULL OR id != ?5)
        ORDER BY id
        "#,
        ISSUE_COLUMNS
    ))
    .bind(min_latitude)
    .bind(max_latitude)
    .bind(min_longitude)
    .bind(max_longitude)
    .bind(exclude)
    .fetch_all(executor)
    .await?;

    rows.iter().map(issue_from_row).collect()
}

/// Set status and recomputed priority score
pub async fn update_status(
    conn: &mut SqliteConnection,
    id: IssueId,
    status: IssueStatus,
    priority_score: i64,
    now: &DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE issues SET status = ?, priority_score = ?, updated_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(priority_score)
    .bind(to_db_string(now))
    .bind(id)
    .execute(&mut *conn)
    .await?;

    ensure_updated(result.rows_affected(), id)
}

pub async fn update_department(
    conn: &mut SqliteConnection,
    id: IssueId,
    department: Department,
    now: &DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query("UPDATE issues SET department = ?, updated_at = ? WHERE id = ?")
        .bind(department.as_str())
        .bind(to_db_string(now))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    ensure_updated(result.rows_affected(), id)
}

/// Store a recounted upvote total and the score derived from it
pub async fn update_vote_totals(
    conn: &mut SqliteConnection,
    id: IssueId,
    upvote_count: i64,
    priority_score: i64,
) -> Result<()> {
    let result = sqlx::query("UPDATE issues SET upvote_count = ?, priority_score = ? WHERE id = ?")
        .bind(upvote_count)
        .bind(priority_score)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    ensure_updated(result.rows_affected(), id)
}

/// Take the database write lock for a read-modify-write on one issue.
///
/// Must be the first statement of its transaction. SQLite cannot upgrade a
/// WAL read snapshot to a writer once another writer has committed (it fails
/// with SQLITE_BUSY without consulting the busy timeout), so the lock is
/// taken up front with a no-op write; later writers wait on the busy timeout
/// instead. `NotFound` when the issue does not exist.
pub async fn lock_issue(conn: &mut SqliteConnection, id: IssueId) -> Result<()> {
    let result = sqlx::query("UPDATE issues SET upvote_count = upvote_count WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    ensure_updated(result.rows_affected(), id)
}

fn ensure_updated(rows_affected: u64, id: IssueId) -> Result<()> {
    if rows_affected == 0 {
        return Err(Error::NotFound(format!("Issue {} not found", id)));
    }
    Ok(())
}

fn issue_from_row(row: &SqliteRow) -> Result<Issue> {
    let tags_json: String = row.try_get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| Error::Internal(format!("Corrupt tags column: {}", e)))?;

    let status: String = row.try_get("status")?;
    let department: String = row.try_get("department")?;
    let confidence: String = row.try_get("duplicate_confidence")?;

    let created_at: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_at)
        .ok_or_else(|| Error::Internal(format!("Unparsable created_at '{}'", created_at)))?;
    let updated_at: Option<String> = row.try_get("updated_at")?;

    Ok(Issue {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        caption: row.try_get("caption")?,
        tags,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        status: status.parse().map_err(corrupt_column)?,
        department: department.parse().map_err(corrupt_column)?,
        upvote_count: row.try_get("upvote_count")?,
        priority_score: row.try_get("priority_score")?,
        citizen_token: row.try_get("citizen_token")?,
        duplicate_of: row.try_get("duplicate_of")?,
        duplicate_confidence: DuplicateConfidence::parse(&confidence)?,
        created_at,
        updated_at: updated_at.as_deref().and_then(parse_timestamp),
    })
}

/// Stored enum strings are written by this crate; a bad one is corruption,
/// not client input
fn corrupt_column(e: Error) -> Error {
    Error::Internal(format!("Corrupt issue row: {}", e))
}
