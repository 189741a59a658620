use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Executor, Sqlite};
use sysdb_core::{
    CollectionId, CoreError, CoreResult, FilePaths, FlushCollectionCompaction,
    FlushSegmentCompaction, Segment, SegmentId, SegmentMetadata, SegmentScope, UpdateSegment,
};

use crate::store::{column, internal, MetaStore};
use crate::tenant_catalog::SqliteTenantCatalog;
use crate::util::{decode_time, encode_time};

/// SQLite-backed repository for segment records.
pub struct SqliteSegmentRepository {
    store: MetaStore,
}

impl SqliteSegmentRepository {
    pub fn new(store: MetaStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Replaces a segment's file-path mapping via the supplied executor.
    ///
    /// When `collection_id` is given the segment must also belong to that
    /// collection. The whole mapping is written by one statement.
    pub async fn flush_with_executor<'e, E>(
        executor: E,
        flush: &FlushSegmentCompaction,
        collection_id: Option<CollectionId>,
    ) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let file_paths = serde_json::to_string(&flush.file_paths)?;
        let collection_id = collection_id.map(|id| id.to_bytes().to_vec());

        let result = query(
            r#"
            UPDATE segments
               SET file_paths = ?2,
                   updated_at = ?3
             WHERE segment_id = ?1
               AND (?4 IS NULL OR collection_id = ?4)
            "#,
        )
        .bind(flush.id.to_bytes().to_vec())
        .bind(file_paths)
        .bind(encode_time(&Utc::now()))
        .bind(collection_id)
        .execute(executor)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("segment", flush.id.to_string()));
        }
        Ok(())
    }

    fn map_row(row: SqliteRow) -> CoreResult<Segment> {
        let id_bytes: Vec<u8> = column(&row, "segment_id")?;
        let collection_bytes: Vec<u8> = column(&row, "collection_id")?;
        let id = SegmentId::from_bytes(&id_bytes)
            .map_err(|err| CoreError::internal(err.to_string()))?;
        let collection_id = CollectionId::from_bytes(&collection_bytes)
            .map_err(|err| CoreError::internal(err.to_string()))?;
        let scope: String = column(&row, "scope")?;
        let scope = SegmentScope::from_str(&scope)
            .map_err(|_| CoreError::internal(format!("unknown segment scope `{scope}`")))?;
        let metadata: Option<String> = column(&row, "metadata")?;
        let metadata = metadata
            .map(|json| serde_json::from_str::<SegmentMetadata>(&json))
            .transpose()?;
        let file_paths: String = column(&row, "file_paths")?;
        let file_paths: FilePaths = serde_json::from_str(&file_paths)?;
        let created_at: String = column(&row, "created_at")?;
        let updated_at: String = column(&row, "updated_at")?;

        Ok(Segment {
            id,
            segment_type: column(&row, "segment_type")?,
            scope,
            collection_id,
            metadata,
            ts: column(&row, "ts")?,
            file_paths,
            created_at: decode_time("created_at", &created_at)?,
            updated_at: decode_time("updated_at", &updated_at)?,
        })
    }
}

#[async_trait::async_trait]
impl sysdb_core::SegmentRepository for SqliteSegmentRepository {
    async fn insert(&self, segment: &Segment) -> CoreResult<()> {
        let metadata = segment
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let file_paths = serde_json::to_string(&segment.file_paths)?;

        query(
            r#"
            INSERT INTO segments (
                segment_id,
                segment_type,
                scope,
                collection_id,
                metadata,
                ts,
                file_paths,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(segment.id.to_bytes().to_vec())
        .bind(&segment.segment_type)
        .bind(segment.scope.as_str())
        .bind(segment.collection_id.to_bytes().to_vec())
        .bind(metadata)
        .bind(segment.ts)
        .bind(file_paths)
        .bind(encode_time(&segment.created_at))
        .bind(encode_time(&segment.updated_at))
        .execute(self.store.pool())
        .await
        .map(|_| ())
        .map_err(|err| MetaStore::map_error("segment", segment.id.to_string(), err))
    }

    async fn get(&self, segment_id: SegmentId) -> CoreResult<Option<Segment>> {
        let row = query(
            r#"
            SELECT segment_id,
                   segment_type,
                   scope,
                   collection_id,
                   metadata,
                   ts,
                   file_paths,
                   created_at,
                   updated_at
              FROM segments
             WHERE segment_id = ?1
            "#,
        )
        .bind(segment_id.to_bytes().to_vec())
        .fetch_optional(self.store.pool())
        .await
        .map_err(internal)?;

        row.map(Self::map_row).transpose()
    }

    async fn list(&self) -> CoreResult<Vec<Segment>> {
        let rows = query(
            r#"
            SELECT segment_id,
                   segment_type,
                   scope,
                   collection_id,
                   metadata,
                   ts,
                   file_paths,
                   created_at,
                   updated_at
              FROM segments
          ORDER BY created_at ASC, segment_id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(internal)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn update(&self, update: &UpdateSegment) -> CoreResult<()> {
        let metadata = update
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // Merging happens inside SQLite (json_patch) so the update stays a
        // single statement.
        let result = query(
            r#"
            UPDATE segments
               SET metadata = CASE
                       WHEN ?2 THEN ?3
                       WHEN ?3 IS NULL THEN metadata
                       ELSE json_patch(COALESCE(metadata, '{}'), ?3)
                   END,
                   ts = COALESCE(?4, ts),
                   collection_id = COALESCE(?6, collection_id),
                   updated_at = ?5
             WHERE segment_id = ?1
            "#,
        )
        .bind(update.id.to_bytes().to_vec())
        .bind(update.reset_metadata)
        .bind(metadata)
        .bind(update.ts)
        .bind(encode_time(&Utc::now()))
        .bind(update.collection_id.map(|id| id.to_bytes().to_vec()))
        .execute(self.store.pool())
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("segment", update.id.to_string()));
        }
        Ok(())
    }

    async fn flush_compaction(&self, flush: &FlushSegmentCompaction) -> CoreResult<()> {
        Self::flush_with_executor(self.store.pool(), flush, None).await
    }

    async fn flush_collection_compaction(
        &self,
        flush: &FlushCollectionCompaction,
    ) -> CoreResult<()> {
        let mut tx = self.store.begin().await?;

        for segment in &flush.segments {
            Self::flush_with_executor(&mut *tx, segment, Some(flush.collection_id)).await?;
        }
        SqliteTenantCatalog::update_last_compaction_time_with_executor(
            &mut *tx,
            &flush.tenant_id,
            flush.compaction_time,
        )
        .await?;

        tx.commit().await.map_err(internal)
    }
}
