use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use libsql::Connection;
use libsql::params::IntoParams;
use tokio::sync::Mutex;

use crate::db::Session;
use crate::model::{Bookmark, CreateBookmark, Patch, UpdateBookmark};

const SELECT_BOOKMARKS: &str = r#"
    SELECT id, title, url, description, created_at, updated_at
    FROM bookmarks
"#;

/// Data access for bookmarks over a single borrowed session. Mutations hold
/// the database-wide `tx_lock` from BEGIN until COMMIT or ROLLBACK.
pub struct Bookmarks<'a> {
    conn: &'a Connection,
    tx_lock: &'a Mutex<()>,
}

impl<'a> Bookmarks<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            conn: session.connection(),
            tx_lock: session.tx_lock(),
        }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Bookmark>> {
        let query = format!("{SELECT_BOOKMARKS} WHERE id = ?");
        Ok(self.fetch(&query, libsql::params![id]).await?.pop())
    }

    pub async fn list(&self, skip: u32, limit: u32) -> Result<Vec<Bookmark>> {
        let query = format!("{SELECT_BOOKMARKS} ORDER BY id LIMIT ? OFFSET ?");
        self.fetch(&query, libsql::params![i64::from(limit), i64::from(skip)])
            .await
    }

    /// Exact, case-sensitive match on a single tag.
    pub async fn list_by_tag(&self, tag: &str, skip: u32, limit: u32) -> Result<Vec<Bookmark>> {
        let query = format!(
            r#"{SELECT_BOOKMARKS}
            WHERE id IN (SELECT bookmark_id FROM bookmark_tags WHERE tag = ?)
            ORDER BY id
            LIMIT ? OFFSET ?"#
        );
        self.fetch(&query, libsql::params![tag, i64::from(limit), i64::from(skip)])
            .await
    }

    pub async fn create(&self, input: CreateBookmark) -> Result<Bookmark> {
        let _guard = self.tx_lock.lock().await;
        self.begin().await?;
        let result = self.create_internal(input).await;
        self.finish(result).await
    }

    async fn create_internal(&self, input: CreateBookmark) -> Result<Bookmark> {
        let created_at = format_timestamp(now());
        let query = r#"
            INSERT INTO bookmarks (title, url, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
        "#;

        let mut rows = self
            .conn
            .query(
                query,
                libsql::params![
                    input.title,
                    input.url.to_string(),
                    input.description,
                    created_at.clone(),
                    created_at
                ],
            )
            .await?;

        let id: i64 = if let Some(row) = rows.next().await? {
            row.get(0)?
        } else {
            anyhow::bail!("Failed to create bookmark")
        };
        drop(rows);

        self.insert_tags(id, &input.tags).await?;

        match self.get(id).await? {
            Some(bookmark) => Ok(bookmark),
            None => anyhow::bail!("bookmark {id} vanished after insert"),
        }
    }

    /// Applies only the fields present in `input`. `None` when `id` is unknown.
    pub async fn update(&self, id: i64, input: UpdateBookmark) -> Result<Option<Bookmark>> {
        let _guard = self.tx_lock.lock().await;
        self.begin().await?;
        let result = self.update_internal(id, input).await;
        self.finish(result).await
    }

    async fn update_internal(&self, id: i64, input: UpdateBookmark) -> Result<Option<Bookmark>> {
        let Some(existing) = self.get(id).await? else {
            return Ok(None);
        };

        let mut updates = Vec::new();
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(title) = input.title {
            updates.push("title = ?");
            params.push(title.into());
        }
        if let Some(url) = input.url {
            updates.push("url = ?");
            params.push(url.to_string().into());
        }
        match input.description {
            Patch::Value(description) => {
                updates.push("description = ?");
                params.push(description.into());
            }
            Patch::Null => updates.push("description = NULL"),
            Patch::Missing => {}
        }

        updates.push("updated_at = ?");
        params.push(format_timestamp(next_timestamp(existing.updated_at)).into());
        params.push(id.into());

        let query = format!("UPDATE bookmarks SET {} WHERE id = ?", updates.join(", "));
        self.conn.execute(&query, params).await?;

        if let Some(tags) = input.tags {
            self.conn
                .execute("DELETE FROM bookmark_tags WHERE bookmark_id = ?", libsql::params![id])
                .await?;
            self.insert_tags(id, &tags).await?;
        }

        self.get(id).await
    }

    /// Removes the bookmark and its tags. `false` when `id` is unknown.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let _guard = self.tx_lock.lock().await;
        self.begin().await?;

        let result = async {
            self.conn
                .execute("DELETE FROM bookmark_tags WHERE bookmark_id = ?", libsql::params![id])
                .await?;
            let deleted = self
                .conn
                .execute("DELETE FROM bookmarks WHERE id = ?", libsql::params![id])
                .await?;
            Ok::<bool, anyhow::Error>(deleted > 0)
        }
        .await;

        self.finish(result).await
    }

    pub async fn list_all_tags(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query("SELECT DISTINCT tag FROM bookmark_tags ORDER BY tag", ())
            .await?;
        let mut tags = Vec::new();

        while let Some(row) = rows.next().await? {
            tags.push(row.get(0)?);
        }

        Ok(tags)
    }

    async fn fetch(&self, query: &str, params: impl IntoParams) -> Result<Vec<Bookmark>> {
        let mut rows = self.conn.query(query, params).await?;
        let mut bookmarks = Vec::new();

        while let Some(row) = rows.next().await? {
            bookmarks.push(self.row_to_bookmark(&row)?);
        }
        drop(rows);

        for bookmark in &mut bookmarks {
            bookmark.tags = self.load_tags(bookmark.id).await?;
        }

        Ok(bookmarks)
    }

    async fn load_tags(&self, id: i64) -> Result<Vec<String>> {
        let query = "SELECT tag FROM bookmark_tags WHERE bookmark_id = ? ORDER BY position";
        let mut rows = self.conn.query(query, libsql::params![id]).await?;
        let mut tags = Vec::new();

        while let Some(row) = rows.next().await? {
            tags.push(row.get(0)?);
        }

        Ok(tags)
    }

    async fn insert_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let query = "INSERT INTO bookmark_tags (bookmark_id, position, tag) VALUES (?, ?, ?)";
        for (position, tag) in tags.iter().enumerate() {
            self.conn
                .execute(query, libsql::params![id, position as i64, tag.as_str()])
                .await?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(())
    }

    async fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute("ROLLBACK", ()).await {
                    tracing::warn!(error = %rollback, cause = %format!("{e:#}"), "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn row_to_bookmark(&self, row: &libsql::Row) -> Result<Bookmark> {
        let created_at: String = row.get(4)?;
        let updated_at: String = row.get(5)?;

        Ok(Bookmark {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            description: row.get(3)?,
            tags: vec![],
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

// stored with microsecond precision, so "now" is truncated the same way
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Always moves forward, even when the clock has not ticked since `previous`.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    now().max(previous + Duration::microseconds(1))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("invalid timestamp {raw:?}: {e}"))?
        .with_timezone(&Utc))
}
