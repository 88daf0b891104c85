use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{IndexEntry, VectorIndex};
use crate::db::Db;
use crate::error::{AskragError, Result};

/// Encode an embedding as little-endian f32 bytes.
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob. `None` if the length is not a multiple of 4.
fn parse_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    blob.chunks_exact(4)
        .map(|bytes| bytes.try_into().ok().map(f32::from_le_bytes))
        .collect()
}

/// Persist `index` as the only active index, replacing whatever was stored.
pub async fn save_index(db: &Db, index: &VectorIndex) -> Result<()> {
    let id = index.id().to_string();
    let filename = index.filename().to_string();
    let source_hash = index.source_hash().to_string();
    let created_at = index.created_at().to_rfc3339();
    let rows: Vec<(String, Vec<u8>)> = index
        .entries()
        .iter()
        .map(|e| (e.content.clone(), encode_embedding(&e.embedding)))
        .collect();

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM index_chunks", [])?;
        tx.execute("DELETE FROM indexes", [])?;
        tx.execute(
            "INSERT INTO indexes (index_id, filename, source_hash, chunk_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, filename, source_hash, rows.len() as i64, created_at],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO index_chunks (index_id, position, content, embedding)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, (content, blob)) in rows.iter().enumerate() {
                stmt.execute(params![id, position as i64, content, blob])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
    .await?;

    log::info!("Persisted index {} ({} chunks)", index.id(), index.len());
    Ok(())
}

/// Load the active index, if one has been saved.
pub async fn load_active_index(db: &Db) -> Result<Option<VectorIndex>> {
    db.with_connection(|conn| {
        let header = conn
            .query_row(
                "SELECT index_id, filename, source_hash, created_at FROM indexes
                 ORDER BY created_at DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, filename, source_hash, created_at)) = header else {
            return Ok(None);
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AskragError::Parse(format!("Invalid index timestamp: {}", e)))?;

        let mut stmt = conn.prepare(
            "SELECT content, embedding FROM index_chunks WHERE index_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let entries = rows
            .into_iter()
            .map(|(content, blob)| {
                parse_embedding(&blob)
                    .map(|embedding| IndexEntry { content, embedding })
                    .ok_or_else(|| AskragError::Parse("Corrupt embedding blob".to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        VectorIndex::from_parts(id, filename, source_hash, created_at, entries).map(Some)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_db(temp_dir: &TempDir) -> Db {
        let db = Db::new(temp_dir.path().join("askrag.db"));
        db.init_schema().await.unwrap();
        db
    }

    fn sample(filename: &str) -> VectorIndex {
        VectorIndex::build(
            filename,
            "hash",
            vec!["first".to_string(), "second".to_string()],
            vec![vec![0.25, -1.5], vec![3.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_parse_embedding() {
        let blob = encode_embedding(&[1.0, -2.5, 0.125]);
        assert_eq!(blob.len(), 12);
        assert_eq!(parse_embedding(&blob), Some(vec![1.0, -2.5, 0.125]));
        assert_eq!(parse_embedding(&[0, 1, 2, 3, 4]), None);
        assert_eq!(parse_embedding(&[]), Some(vec![]));
    }

    #[tokio::test]
    async fn test_load_without_saved_index() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;

        assert!(load_active_index(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;
        let index = sample("notes.txt");

        save_index(&db, &index).await.unwrap();
        let loaded = load_active_index(&db).await.unwrap().unwrap();

        assert_eq!(loaded.id(), index.id());
        assert_eq!(loaded.filename(), "notes.txt");
        assert_eq!(loaded.entries(), index.entries());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_index() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;

        save_index(&db, &sample("old.txt")).await.unwrap();
        let newer = sample("new.txt");
        save_index(&db, &newer).await.unwrap();

        let loaded = load_active_index(&db).await.unwrap().unwrap();
        assert_eq!(loaded.id(), newer.id());

        let chunk_rows: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM index_chunks", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(chunk_rows, 2);
    }
}
