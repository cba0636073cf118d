use crate::core::{
    IncidentError, IncidentRecord, IncidentSource, IncidentStatus, IncidentStore, NewIncident,
};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::spawn_blocking;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    status      TEXT NOT NULL,
    source      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_status ON incidents(status);
";

/// An [`IncidentStore`] backed by a single SQLite connection.
///
/// Queries run on the blocking pool; the connection is shared behind a mutex.
#[derive(Debug, Clone)]
pub struct SqliteIncidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIncidentStore {
    /// Opens (or creates) the database at `path`. The path `:memory:` opens a
    /// private in-memory database.
    pub fn open(path: &Path) -> Result<Self, IncidentError> {
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(storage)?;
        conn.execute_batch(SCHEMA).map_err(storage)?;
        info!(path = %path.display(), "Opened incident store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, IncidentError> {
        Self::open(Path::new(":memory:"))
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T, IncidentError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, IncidentError> + Send + 'static,
    {
        let conn = self.conn.clone();
        spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| IncidentError::Storage("connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| IncidentError::Storage(e.to_string()))?
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn create(&self, incident: NewIncident) -> Result<IncidentRecord, IncidentError> {
        let description = incident.description.trim().to_string();
        if description.is_empty() {
            return Err(IncidentError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        let source = incident.source;
        // Millisecond precision keeps stored and returned timestamps identical.
        let created_at = Utc::now().trunc_subsecs(3);
        let record = self
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO incidents (description, status, source, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        description,
                        IncidentStatus::New.as_str(),
                        source.as_str(),
                        created_at
                    ],
                )
                .map_err(storage)?;
                Ok(IncidentRecord {
                    id: conn.last_insert_rowid(),
                    description,
                    status: IncidentStatus::New,
                    source,
                    created_at,
                })
            })
            .await?;
        debug!(incident_id = record.id, source = record.source.as_str(), "Created incident");
        Ok(record)
    }

    async fn list(
        &self,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<IncidentRecord>, IncidentError> {
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, description, status, source, created_at FROM incidents
                     WHERE ?1 IS NULL OR status = ?1
                     ORDER BY id",
                )
                .map_err(storage)?;
            let rows = stmt
                .query_map(params![status.map(|s| s.as_str())], read_row)
                .map_err(storage)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage)
        })
        .await
    }

    async fn get(&self, id: i64) -> Result<Option<IncidentRecord>, IncidentError> {
        self.with_connection(move |conn| load_incident(conn, id)).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: IncidentStatus,
    ) -> Result<IncidentRecord, IncidentError> {
        let record = self
            .with_connection(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE incidents SET status = ?1 WHERE id = ?2",
                        params![status.as_str(), id],
                    )
                    .map_err(storage)?;
                if changed == 0 {
                    return Err(IncidentError::NotFound(id));
                }
                load_incident(conn, id)?.ok_or(IncidentError::NotFound(id))
            })
            .await?;
        debug!(incident_id = id, status = status.as_str(), "Updated incident status");
        Ok(record)
    }
}

fn load_incident(conn: &Connection, id: i64) -> Result<Option<IncidentRecord>, IncidentError> {
    conn.query_row(
        "SELECT id, description, status, source, created_at FROM incidents WHERE id = ?1",
        params![id],
        read_row,
    )
    .optional()
    .map_err(storage)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<IncidentRecord> {
    let status: String = row.get(2)?;
    let source: String = row.get(3)?;
    let created_at: DateTime<Utc> = row.get(4)?;
    Ok(IncidentRecord {
        id: row.get(0)?,
        description: row.get(1)?,
        status: status.parse::<IncidentStatus>().map_err(|e: String| conversion_error(2, e))?,
        source: source.parse::<IncidentSource>().map_err(|e: String| conversion_error(3, e))?,
        created_at,
    })
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

fn storage(err: rusqlite::Error) -> IncidentError {
    IncidentError::Storage(err.to_string())
}
