//! DuckDB storage for complaints and detection records.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use pothole_core::{Complaint, DetectionRecord, Verification};
use tracing::info;

use crate::{ComplaintStore, StoreError};

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS complaint_seq;
CREATE SEQUENCE IF NOT EXISTS pothole_seq;
CREATE TABLE IF NOT EXISTS complaints (
    id VARCHAR PRIMARY KEY,
    seq BIGINT NOT NULL DEFAULT nextval('complaint_seq'),
    title VARCHAR NOT NULL,
    description VARCHAR NOT NULL,
    location VARCHAR NOT NULL,
    department VARCHAR NOT NULL,
    image_url VARCHAR,
    status VARCHAR NOT NULL,
    ml_verification VARCHAR,
    created_at VARCHAR,
    updated_at VARCHAR
);
CREATE TABLE IF NOT EXISTS potholes (
    id VARCHAR PRIMARY KEY,
    seq BIGINT NOT NULL DEFAULT nextval('pothole_seq'),
    complaint_id VARCHAR NOT NULL,
    complaint VARCHAR NOT NULL,
    pothole_count BIGINT NOT NULL,
    detected_at VARCHAR NOT NULL
);
";

const COMPLAINT_COLUMNS: &str = "id, title, description, location, department, image_url, \
     status, ml_verification, created_at, updated_at";

/// DuckDB-backed store.
///
/// `complaints` holds one row per complaint with the verification sub-record
/// as a JSON column. `potholes` is append-only; each row keeps a JSON snapshot
/// of the complaint as it was read before processing.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// DuckDB calls block, so every query runs on the blocking pool.
pub struct DuckStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened complaint database");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Other(format!("duckdb task failed: {e}")))?
    }
}

fn query_complaints(
    conn: &Connection,
    sql: &str,
    id: Option<&str>,
) -> Result<Vec<Complaint>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match id {
        Some(id) => stmt
            .query_map(params![id], complaint_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt
            .query_map([], complaint_row)?
            .collect::<Result<Vec<_>, _>>()?,
    };
    rows.into_iter().map(ComplaintRow::into_complaint).collect()
}

fn complaint_row(row: &duckdb::Row<'_>) -> duckdb::Result<ComplaintRow> {
    Ok(ComplaintRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        department: row.get(4)?,
        image_url: row.get(5)?,
        status: row.get(6)?,
        ml_verification: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

struct ComplaintRow {
    id: String,
    title: String,
    description: String,
    location: String,
    department: String,
    image_url: Option<String>,
    status: String,
    ml_verification: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl ComplaintRow {
    fn into_complaint(self) -> Result<Complaint, StoreError> {
        let ml_verification = self
            .ml_verification
            .as_deref()
            .map(serde_json::from_str::<Verification>)
            .transpose()?;
        Ok(Complaint {
            id: self.id,
            title: self.title,
            description: self.description,
            location: self.location,
            department: self.department,
            image_url: self.image_url,
            status: self.status,
            ml_verification,
            created_at: parse_ts(self.created_at)?,
            updated_at: parse_ts(self.updated_at)?,
        })
    }
}

fn parse_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|source| StoreError::Timestamp { value: s, source })
        })
        .transpose()
}

fn fmt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

#[async_trait]
impl ComplaintStore for DuckStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| Ok(conn.execute_batch("SELECT 1")?)).await
    }

    async fn list_complaints(&self) -> Result<Vec<Complaint>, StoreError> {
        let sql = format!("SELECT {COMPLAINT_COLUMNS} FROM complaints ORDER BY seq");
        self.with_conn(move |conn| query_complaints(conn, &sql, None)).await
    }

    async fn get_complaint(&self, id: &str) -> Result<Option<Complaint>, StoreError> {
        let sql = format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = ?");
        let id = id.to_owned();
        let rows = self
            .with_conn(move |conn| query_complaints(conn, &sql, Some(&id)))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<(), StoreError> {
        let verification = complaint
            .ml_verification
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let complaint = complaint.clone();
        self.with_conn(move |conn| {
            let exists: i64 = conn.query_row(
                "SELECT count(*) FROM complaints WHERE id = ?",
                params![complaint.id],
                |row| row.get(0),
            )?;
            if exists > 0 {
                return Err(StoreError::Duplicate(complaint.id));
            }

            conn.execute(
                "INSERT INTO complaints (id, title, description, location, department, image_url, \
                 status, ml_verification, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    complaint.id,
                    complaint.title,
                    complaint.description,
                    complaint.location,
                    complaint.department,
                    complaint.image_url,
                    complaint.status,
                    verification,
                    fmt_ts(complaint.created_at),
                    fmt_ts(complaint.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn update_verification(
        &self,
        id: &str,
        status: &str,
        verification: &Verification,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let json = serde_json::to_string(verification)?;
        let (id, status) = (id.to_owned(), status.to_owned());
        let updated_at = updated_at.to_rfc3339();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE complaints SET status = ?, ml_verification = ?, updated_at = ? WHERE id = ?",
                params![status, json, updated_at, id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(&record.complaint)?;
        let id = record.id.clone();
        let complaint_id = record.complaint_id.clone();
        let count = i64::from(record.pothole_count);
        let detected_at = record.detected_at.to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO potholes (id, complaint_id, complaint, pothole_count, detected_at) \
                 VALUES (?, ?, ?, ?, ?)",
                params![id, complaint_id, snapshot, count, detected_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn detections_for(
        &self,
        complaint_id: &str,
    ) -> Result<Vec<DetectionRecord>, StoreError> {
        let complaint_id = complaint_id.to_owned();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, complaint_id, complaint, pothole_count, detected_at \
                     FROM potholes WHERE complaint_id = ? ORDER BY seq",
                )?;
                let rows = stmt
                    .query_map(params![complaint_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, String>(4)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(id, complaint_id, snapshot, count, detected_at)| {
                let pothole_count = u32::try_from(count)
                    .map_err(|_| StoreError::Other(format!("pothole_count out of range: {count}")))?;
                let detected_at = parse_ts(Some(detected_at))?
                    .ok_or_else(|| StoreError::Other("missing detected_at".into()))?;
                Ok(DetectionRecord {
                    id,
                    complaint_id,
                    complaint: serde_json::from_str(&snapshot)?,
                    pothole_count,
                    detected_at,
                })
            })
            .collect()
    }

    async fn detection_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM potholes", [], |row| row.get(0))?)
            })
            .await?;
        Ok(count as usize)
    }
}
