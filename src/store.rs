use super::*;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

#[derive(Debug, Error)]
pub(super) enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("array column encoding: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("tag not found or access denied")]
    NotFoundOrForbidden,
    #[error("store connection lock poisoned")]
    Poisoned,
}

/// Row to insert for an ingested message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct NewMessage {
    pub(super) telegram_message_id: i64,
    pub(super) message_type: MessageType,
    pub(super) text_content: Option<String>,
    pub(super) caption: Option<String>,
    pub(super) file: FileDescriptor,
    pub(super) provenance: Option<Provenance>,
    pub(super) urls: Vec<String>,
    pub(super) hashtags: Vec<String>,
    pub(super) mentions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(super) struct Tag {
    pub(super) id: i64,
    pub(super) name: String,
    pub(super) color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(super) struct TagWithCount {
    pub(super) id: i64,
    pub(super) name: String,
    pub(super) color: Option<String>,
    pub(super) created_at: String,
    pub(super) message_count: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(super) struct MessageSummary {
    pub(super) id: i64,
    pub(super) telegram_message_id: i64,
    pub(super) message_type: String,
    pub(super) text_content: Option<String>,
    pub(super) caption: Option<String>,
    pub(super) file_name: Option<String>,
    pub(super) file_size: Option<i64>,
    pub(super) created_at: String,
    pub(super) forwarded_from: Option<String>,
    pub(super) urls: Vec<String>,
    pub(super) hashtags: Vec<String>,
}

/// Handle to the SQLite database. Opened once at startup and shared by the
/// dispatcher and the read API; every query is scoped by the caller's user id.
pub(super) struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub(super) fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        run_migrations(&conn)?;

        info!("store opened at {}", path.display());
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    #[cfg(test)]
    pub(super) fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    pub(super) fn upsert_user(&self, user: &Sender) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            let id = conn.query_row(
                "INSERT INTO users (telegram_id, username, first_name, last_name, is_active)
                 VALUES (?1, ?2, ?3, ?4, 1)
                 ON CONFLICT (telegram_id) DO UPDATE SET
                    username = excluded.username,
                    first_name = excluded.first_name,
                    last_name = excluded.last_name,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
                 RETURNING id",
                params![
                    user.telegram_id,
                    non_empty(user.username.as_deref()),
                    non_empty(Some(user.first_name.as_str())),
                    non_empty(user.last_name.as_deref()),
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
    }

    pub(super) fn find_user_id(&self, telegram_id: i64) -> Result<Option<i64>, StoreError> {
        self.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM users WHERE telegram_id = ?1",
                    params![telegram_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    pub(super) fn save_message(&self, user_id: i64, msg: &NewMessage) -> Result<i64, StoreError> {
        let urls = serde_json::to_string(&msg.urls)?;
        let hashtags = serde_json::to_string(&msg.hashtags)?;
        let mentions = serde_json::to_string(&msg.mentions)?;
        let forwarded_date = msg
            .provenance
            .as_ref()
            .and_then(|p| p.date)
            .map(|date| date.to_rfc3339());
        let forwarded_from = msg.provenance.as_ref().map(|p| p.from.clone());

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO messages (
                    user_id, telegram_message_id, message_type, text_content, caption,
                    file_id, file_name, file_size, mime_type, duration,
                    forwarded_date, forwarded_from, urls, hashtags, mentions
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    user_id,
                    msg.telegram_message_id,
                    msg.message_type.as_str(),
                    msg.text_content,
                    msg.caption,
                    msg.file.file_id,
                    msg.file.file_name,
                    msg.file.file_size,
                    msg.file.mime_type,
                    msg.file.duration,
                    forwarded_date,
                    forwarded_from,
                    urls,
                    hashtags,
                    mentions,
                ],
            );
            match inserted {
                Ok(_) => Ok(conn.last_insert_rowid()),
                Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
                Err(err) => Err(err.into()),
            }
        })
    }

    pub(super) fn resolve_message_id(
        &self,
        user_id: i64,
        telegram_message_id: i64,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id FROM messages WHERE user_id = ?1 AND telegram_message_id = ?2",
                params![user_id, telegram_message_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)
        })
    }

    /// Name-ascending; the numbered text picker depends on this order.
    pub(super) fn list_tags(&self, user_id: i64) -> Result<Vec<Tag>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, color FROM tags WHERE user_id = ?1 ORDER BY name ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                })
            })?;
            let tags = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(tags)
        })
    }

    pub(super) fn get_or_create_tag(&self, user_id: i64, name: &str) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            if let Some(id) = find_tag_id(conn, user_id, name)? {
                return Ok(id);
            }
            insert_tag(conn, user_id, name)
        })
    }

    /// Returns whether a new link row was written; re-linking is a no-op.
    pub(super) fn link_tag(&self, message_id: i64, tag_id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO message_tags (message_id, tag_id) VALUES (?1, ?2)
                 ON CONFLICT (message_id, tag_id) DO NOTHING",
                params![message_id, tag_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub(super) fn tag_name_for_user(&self, tag_id: i64, user_id: i64) -> Result<String, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT name FROM tags WHERE id = ?1 AND user_id = ?2",
                params![tag_id, user_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)
        })
    }

    pub(super) fn list_tags_with_counts(&self, user_id: i64) -> Result<Vec<TagWithCount>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, t.color, t.created_at, COUNT(mt.message_id) AS message_count
                 FROM tags t
                 LEFT JOIN message_tags mt ON mt.tag_id = t.id
                 WHERE t.user_id = ?1
                 GROUP BY t.id, t.name, t.color, t.created_at
                 ORDER BY message_count DESC, t.name ASC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(TagWithCount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                    created_at: row.get(3)?,
                    message_count: row.get(4)?,
                })
            })?;
            let tags = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(tags)
        })
    }

    /// Ownership is checked before anything is read, so a foreign tag id and
    /// a missing one are indistinguishable to the caller.
    pub(super) fn list_messages_for_tag(
        &self,
        user_id: i64,
        tag_id: i64,
    ) -> Result<Vec<MessageSummary>, StoreError> {
        self.with_conn(|conn| {
            let owned: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1 AND user_id = ?2)",
                params![tag_id, user_id],
                |row| row.get(0),
            )?;
            if !owned {
                return Err(StoreError::NotFoundOrForbidden);
            }

            let mut stmt = conn.prepare(
                "SELECT m.id, m.telegram_message_id, m.message_type, m.text_content, m.caption,
                        m.file_name, m.file_size, m.created_at, m.forwarded_from, m.urls, m.hashtags
                 FROM messages m
                 INNER JOIN message_tags mt ON mt.message_id = m.id
                 WHERE mt.tag_id = ?1 AND m.user_id = ?2
                 ORDER BY m.created_at DESC, m.id DESC",
            )?;
            let rows = stmt.query_map(params![tag_id, user_id], |row| {
                Ok((
                    MessageSummary {
                        id: row.get(0)?,
                        telegram_message_id: row.get(1)?,
                        message_type: row.get(2)?,
                        text_content: row.get(3)?,
                        caption: row.get(4)?,
                        file_name: row.get(5)?,
                        file_size: row.get(6)?,
                        created_at: row.get(7)?,
                        forwarded_from: row.get(8)?,
                        urls: Vec::new(),
                        hashtags: Vec::new(),
                    },
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                ))
            })?;

            let mut messages = Vec::new();
            for row in rows {
                let (mut summary, urls, hashtags) = row?;
                summary.urls = serde_json::from_str(&urls)?;
                summary.hashtags = serde_json::from_str(&hashtags)?;
                messages.push(summary);
            }
            Ok(messages)
        })
    }
}

fn find_tag_id(conn: &Connection, user_id: i64, name: &str) -> Result<Option<i64>, StoreError> {
    let id = conn
        .query_row(
            "SELECT id FROM tags WHERE user_id = ?1 AND name = ?2",
            params![user_id, name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Inserts a tag; losing a race on `(user_id, name)` returns the row the
/// other writer created.
pub(super) fn insert_tag(conn: &Connection, user_id: i64, name: &str) -> Result<i64, StoreError> {
    let inserted = conn.execute(
        "INSERT INTO tags (user_id, name) VALUES (?1, ?2)",
        params![user_id, name],
    );
    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(err) if is_unique_violation(&err) => {
            find_tag_id(conn, user_id, name)?.ok_or(StoreError::NotFound)
        }
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    if version < 1 {
        info!("store: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER NOT NULL UNIQUE,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE TABLE messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                telegram_message_id INTEGER NOT NULL,
                message_type TEXT NOT NULL CHECK (message_type IN (
                    'text', 'photo', 'video', 'document', 'audio', 'voice', 'video_note', 'sticker'
                )),
                text_content TEXT,
                caption TEXT,
                file_id TEXT,
                file_name TEXT,
                file_size INTEGER,
                mime_type TEXT,
                duration INTEGER,
                forwarded_date TEXT,
                forwarded_from TEXT,
                urls TEXT NOT NULL DEFAULT '[]',
                hashtags TEXT NOT NULL DEFAULT '[]',
                mentions TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE (user_id, telegram_message_id)
            );

            CREATE TABLE tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                color TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE (user_id, name)
            );

            CREATE TABLE message_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL REFERENCES messages(id),
                tag_id INTEGER NOT NULL REFERENCES tags(id),
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
                UNIQUE (message_id, tag_id)
            );

            CREATE INDEX idx_message_tags_tag ON message_tags(tag_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}
