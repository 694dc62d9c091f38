//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::pipeline::BatchSummary;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{IngestError, Storage, StorageError, StorageResult};
use crate::storage::{
    article_title, read_time_minutes, resolve_publish_date, ArticleRecord, IngestRequest,
    RunRecord, RunStatus, SourceRecord,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql, Transaction};
use std::path::Path;

const ARTICLE_COLUMNS: &str = "id, guid, source_id, url, url_hash, content_hash, title, author,
    plain_text, source_html, summary, classification, read_time_minutes, extraction_strategy,
    published_at, fetched_at, last_updated_at, language";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, processed, skipped, failed";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (creating if needed) the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_tags(&self, article_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM tags t
             JOIN article_tags at ON at.tag_id = t.id
             WHERE at.article_id = ?1
             ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![article_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    fn find_article(
        &self,
        column: &str,
        value: &dyn ToSql,
    ) -> StorageResult<Option<ArticleRecord>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE {column} = ?1");
        let article = self
            .conn
            .query_row(&sql, [value], article_from_row)
            .optional()?;

        match article {
            Some(mut article) => {
                article.tags = self.load_tags(article.id)?;
                Ok(Some(article))
            }
            None => Ok(None),
        }
    }

    fn count(&self, table: &str) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleRecord> {
    let classification: Option<String> = row.get(11)?;
    Ok(ArticleRecord {
        id: row.get(0)?,
        guid: row.get(1)?,
        source_id: row.get(2)?,
        url: row.get(3)?,
        url_hash: row.get(4)?,
        content_hash: row.get(5)?,
        title: row.get(6)?,
        author: row.get(7)?,
        plain_text: row.get(8)?,
        source_html: row.get(9)?,
        summary: row.get(10)?,
        classification: classification
            .map(|raw| serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)))
            .unwrap_or(serde_json::Value::Null),
        read_time_minutes: row.get(12)?,
        extraction_strategy: row.get(13)?,
        published_at: row.get(14)?,
        fetched_at: row.get(15)?,
        last_updated_at: row.get(16)?,
        language: row.get(17)?,
        tags: Vec::new(),
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
        processed: row.get::<_, i64>(5)? as u64,
        skipped: row.get::<_, i64>(6)? as u64,
        failed: row.get::<_, i64>(7)? as u64,
    })
}

/// Writes one article with its tags and source inside `tx`
fn write_article(
    tx: &Transaction<'_>,
    request: &IngestRequest<'_>,
    published_at: &str,
) -> Result<i64, IngestError> {
    let IngestRequest {
        item,
        article,
        analysis,
        url_hash,
        content_hash,
        fetched_at,
        keep_source_html,
    } = *request;

    let now = Utc::now().to_rfc3339();
    let fetched_at = fetched_at.to_rfc3339();

    tx.execute(
        "INSERT INTO sources (id, url, last_fetched_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            url = COALESCE(excluded.url, sources.url),
            last_fetched_at = excluded.last_fetched_at",
        params![item.source_id, item.source_url, fetched_at],
    )?;

    let title = article_title(item, article);
    let source_html = keep_source_html.then_some(article.source_html.as_str());
    let classification = if analysis.classification.is_null() {
        None
    } else {
        Some(analysis.classification.to_string())
    };
    let read_time = read_time_minutes(&article.plain_text);

    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM articles WHERE url_hash = ?1 OR content_hash = ?2
             ORDER BY (url_hash = ?1) DESC LIMIT 1",
            params![url_hash.as_str(), content_hash.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    let article_id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE articles SET guid = ?1, source_id = ?2, content_hash = ?3, title = ?4,
                    author = ?5, plain_text = ?6, source_html = ?7, summary = ?8,
                    classification = ?9, read_time_minutes = ?10, extraction_strategy = ?11,
                    published_at = ?12, fetched_at = ?13, last_updated_at = ?14, language = ?15
                 WHERE id = ?16",
                params![
                    item.guid,
                    item.source_id,
                    content_hash.as_str(),
                    title,
                    article.author,
                    article.plain_text,
                    source_html,
                    analysis.summary,
                    classification,
                    read_time,
                    article.strategy,
                    published_at,
                    fetched_at,
                    now,
                    article.language,
                    id
                ],
            )?;
            tx.execute("DELETE FROM article_tags WHERE article_id = ?1", params![id])?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO articles (guid, source_id, url, url_hash, content_hash, title, author,
                    plain_text, source_html, summary, classification, read_time_minutes,
                    extraction_strategy, published_at, fetched_at, last_updated_at, language)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    item.guid,
                    item.source_id,
                    item.url,
                    url_hash.as_str(),
                    content_hash.as_str(),
                    title,
                    article.author,
                    article.plain_text,
                    source_html,
                    analysis.summary,
                    classification,
                    read_time,
                    article.strategy,
                    published_at,
                    fetched_at,
                    now,
                    article.language
                ],
            )?;
            tx.last_insert_rowid()
        }
    };

    for tag in &analysis.tags {
        tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
        let tag_id: i64 =
            tx.query_row("SELECT id FROM tags WHERE name = ?1", params![tag], |row| {
                row.get(0)
            })?;
        tx.execute(
            "INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?1, ?2)",
            params![article_id, tag_id],
        )?;
    }

    Ok(article_id)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &BatchSummary,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, processed = ?3, skipped = ?4,
                failed = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                summary.processed as i64,
                summary.skipped as i64,
                summary.failed as i64,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Articles =====

    fn find_by_url_hash(&self, hash: &str) -> StorageResult<Option<ArticleRecord>> {
        self.find_article("url_hash", &hash)
    }

    fn find_by_content_hash(&self, hash: &str) -> StorageResult<Option<ArticleRecord>> {
        self.find_article("content_hash", &hash)
    }

    fn ingest(&mut self, request: &IngestRequest<'_>) -> Result<i64, IngestError> {
        let published_at = resolve_publish_date(request.item, request.article)?.to_rfc3339();

        let tx = self.conn.transaction()?;
        let article_id = write_article(&tx, request, &published_at)?;
        tx.commit()?;

        tracing::debug!(
            article_id,
            guid = %request.item.guid,
            tags = request.analysis.tags.len(),
            "article ingested"
        );
        Ok(article_id)
    }

    fn get_article(&self, article_id: i64) -> StorageResult<ArticleRecord> {
        self.find_article("id", &article_id)?
            .ok_or(StorageError::ArticleNotFound(article_id))
    }

    fn get_source(&self, source_id: &str) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, url, last_fetched_at FROM sources WHERE id = ?1",
                params![source_id],
                |row| {
                    Ok(SourceRecord {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        last_fetched_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(source)
    }

    // ===== Statistics =====

    fn count_articles(&self) -> StorageResult<u64> {
        self.count("articles")
    }

    fn count_tags(&self) -> StorageResult<u64> {
        self.count("tags")
    }

    fn count_sources(&self) -> StorageResult<u64> {
        self.count("sources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResult;
    use crate::dedup::ContentFingerprint;
    use crate::extract::{detect_language, ExtractedArticle};
    use crate::pipeline::FeedItem;
    use chrono::TimeZone;
    use serde_json::json;

    fn item(url: &str, guid: &str) -> FeedItem {
        FeedItem {
            source_id: "tech-feed".to_string(),
            source_url: Some("https://example.com/feed.xml".to_string()),
            guid: guid.to_string(),
            url: url.to_string(),
            title: "Rates hold".to_string(),
            published_at: Some("Wed, 01 May 2024 09:00:00 +0000".to_string()),
        }
    }

    fn article(text: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: Some("Rates hold steady".to_string()),
            author: Some("Wang Fang".to_string()),
            publish_date: None,
            plain_text: text.to_string(),
            source_html: "<html>raw</html>".to_string(),
            strategy: "structured".to_string(),
            language: None,
        }
    }

    fn analysis(tags: &[&str]) -> AnalysisResult {
        AnalysisResult {
            summary: "Central bank holds rates.".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            classification: json!({"category": "economy"}),
            degraded: false,
        }
    }

    fn ingest(
        storage: &mut SqliteStorage,
        item: &FeedItem,
        article: &ExtractedArticle,
        analysis: &AnalysisResult,
        keep_source_html: bool,
    ) -> Result<i64, IngestError> {
        let url_hash = ContentFingerprint::of_url(&item.url).unwrap();
        let content_hash = ContentFingerprint::of_text(&article.plain_text);
        storage.ingest(&IngestRequest {
            item,
            article,
            analysis,
            url_hash: &url_hash,
            content_hash: &content_hash,
            fetched_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            keep_source_html,
        })
    }

    #[test]
    fn test_create_and_finish_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("test_hash").unwrap();
        assert!(run_id > 0);

        let summary = BatchSummary {
            processed: 3,
            skipped: 2,
            failed: 1,
        };
        storage
            .finish_run(run_id, RunStatus::Completed, &summary)
            .unwrap();

        let run = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!((run.processed, run.skipped, run.failed), (3, 2, 1));
        assert!(run.finished_at.is_some());

        assert!(matches!(
            storage.finish_run(999, RunStatus::Failed, &summary),
            Err(StorageError::RunNotFound(999))
        ));
    }

    #[test]
    fn test_ingest_writes_article_tags_and_source() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let item = item("https://example.com/rates", "g-1");
        let text = "The central bank kept rates unchanged.";

        let id = ingest(&mut storage, &item, &article(text), &analysis(&["economy", "rates"]), false)
            .unwrap();

        let stored = storage.get_article(id).unwrap();
        assert_eq!(stored.title, "Rates hold");
        assert_eq!(stored.author.as_deref(), Some("Wang Fang"));
        assert_eq!(stored.tags, vec!["economy", "rates"]);
        assert_eq!(stored.classification, json!({"category": "economy"}));
        assert_eq!(stored.published_at, "2024-05-01T09:00:00+00:00");
        assert_eq!(stored.source_html, None);
        assert_eq!(stored.read_time_minutes, 0);

        let source = storage.get_source("tech-feed").unwrap().unwrap();
        assert_eq!(source.url.as_deref(), Some("https://example.com/feed.xml"));
        assert_eq!(
            source.last_fetched_at.as_deref(),
            Some("2024-05-01T10:00:00+00:00")
        );

        let by_url = storage
            .find_by_url_hash(ContentFingerprint::of_url("http://www.example.com/rates/").unwrap().as_str())
            .unwrap();
        assert_eq!(by_url.map(|a| a.id), Some(id));
    }

    #[test]
    fn test_language_stored_and_refreshed_on_reingest() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let item = item("https://example.com/rates", "g-1");

        let english = ExtractedArticle {
            language: detect_language("The central bank kept interest rates unchanged this week."),
            ..article("The central bank kept interest rates unchanged this week.")
        };
        let id = ingest(&mut storage, &item, &english, &analysis(&[]), false).unwrap();
        assert_eq!(storage.get_article(id).unwrap().language.as_deref(), Some("en"));

        let chinese = ExtractedArticle {
            language: Some("zh".to_string()),
            ..article("中国人民银行本周宣布维持贷款市场报价利率不变。")
        };
        let again = ingest(&mut storage, &item, &chinese, &analysis(&[]), false).unwrap();
        assert_eq!(again, id);
        assert_eq!(storage.get_article(id).unwrap().language.as_deref(), Some("zh"));

        let undetected = ExtractedArticle {
            language: None,
            ..article("12345")
        };
        ingest(&mut storage, &item, &undetected, &analysis(&[]), false).unwrap();
        assert_eq!(storage.get_article(id).unwrap().language, None);
    }

    #[test]
    fn test_reingest_updates_instead_of_duplicating() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let item = item("https://example.com/rates", "g-1");

        let first = ingest(&mut storage, &item, &article("Version one."), &analysis(&["a", "b"]), true)
            .unwrap();
        let second = ingest(&mut storage, &item, &article("Version two."), &analysis(&["B", "c"]), true)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.count_articles().unwrap(), 1);

        let stored = storage.get_article(first).unwrap();
        assert_eq!(stored.plain_text, "Version two.");
        assert_eq!(stored.source_html.as_deref(), Some("<html>raw</html>"));
        // Tag names are unique regardless of case.
        assert_eq!(stored.tags, vec!["b", "c"]);
        assert_eq!(storage.count_tags().unwrap(), 3);
    }

    #[test]
    fn test_same_content_from_other_url_updates_existing() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let text = "Identical syndicated story text.";

        let first = ingest(
            &mut storage,
            &item("https://a.example.com/1", "g-1"),
            &article(text),
            &analysis(&[]),
            false,
        )
        .unwrap();
        let second = ingest(
            &mut storage,
            &item("https://b.example.com/2", "g-2"),
            &article(text),
            &analysis(&[]),
            false,
        )
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(storage.count_articles().unwrap(), 1);
        assert_eq!(storage.get_article(first).unwrap().url, "https://a.example.com/1");
    }

    #[test]
    fn test_failed_tag_insert_rolls_back_everything() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER refuse_tags BEFORE INSERT ON tags
                 BEGIN SELECT RAISE(ABORT, 'tag insert refused'); END;",
            )
            .unwrap();

        let result = ingest(
            &mut storage,
            &item("https://example.com/rates", "g-1"),
            &article("Some text."),
            &analysis(&["economy"]),
            false,
        );

        assert!(matches!(result, Err(IngestError::Storage(_))));
        assert_eq!(storage.count_articles().unwrap(), 0);
        assert_eq!(storage.count_sources().unwrap(), 0);
        assert_eq!(storage.count_tags().unwrap(), 0);
    }

    #[test]
    fn test_bad_publish_date_stops_before_transaction() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut item = item("https://example.com/rates", "g-1");
        item.published_at = Some("not a date".to_string());

        let result = ingest(&mut storage, &item, &article("Text."), &analysis(&["x"]), false);

        assert!(matches!(result, Err(IngestError::InvalidPublishDate { .. })));
        assert_eq!(storage.count_sources().unwrap(), 0);
        assert_eq!(storage.count_articles().unwrap(), 0);
    }

    #[test]
    fn test_null_classification_stored_as_null() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut result = analysis(&[]);
        result.classification = serde_json::Value::Null;

        let id = ingest(
            &mut storage,
            &item("https://example.com/x", "g-9"),
            &article("Text."),
            &result,
            false,
        )
        .unwrap();

        assert!(storage.get_article(id).unwrap().classification.is_null());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sieve.db");

        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            ingest(
                &mut storage,
                &item("https://example.com/rates", "g-1"),
                &article("Persisted text."),
                &analysis(&["kept"]),
                false,
            )
            .unwrap();
        }

        let storage = SqliteStorage::new(&path).unwrap();
        assert_eq!(storage.count_articles().unwrap(), 1);
        assert_eq!(storage.count_tags().unwrap(), 1);
    }
}
