//! Repository for media and account records.

use exn::ResultExt;
use sqlx::SqlitePool;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{Account, AccountRow, Media, MediaRow};

/// Repository for the media identity records the resolver works against.
///
/// Media rows are created as stubs during a metadata sync and filled in as
/// files are downloaded, hashed and matched. Accounts are referenced by
/// every media row; a stub account is inserted on demand so the foreign key
/// always holds.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lock contention surfaces as a database-level message rather than a
    /// dedicated sqlx variant; map it so the retry policy can see it.
    fn classify(error: &sqlx::Error) -> ErrorKind {
        if let sqlx::Error::Database(db) = error
            && db.message().contains("locked")
        {
            return ErrorKind::Locked;
        }
        ErrorKind::Database
    }

    fn raise<T>(result: sqlx::Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                let kind = Self::classify(&error);
                Err(error).or_raise(|| kind)
            }
        }
    }

    // =========================================================================
    // Media
    // =========================================================================

    pub async fn get_media_by_id(&self, id: i64) -> Result<Option<Media>> {
        let row: Option<MediaRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/get_media_by_id.sql"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await,
        )?;
        row.map(Media::try_from).transpose()
    }

    /// Get the media record holding the given content hash, if any.
    ///
    /// Content hashes are unique in practice (they identify content); if
    /// more than one row carries the same hash the oldest id wins.
    pub async fn get_media_by_hash(&self, content_hash: &str) -> Result<Option<Media>> {
        let row: Option<MediaRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/get_media_by_hash.sql"))
                .bind(content_hash)
                .fetch_optional(&self.pool)
                .await,
        )?;
        row.map(Media::try_from).transpose()
    }

    pub async fn get_media_by_filename(&self, account_id: i64, filename: &str) -> Result<Option<Media>> {
        let row: Option<MediaRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/get_media_by_filename.sql"))
                .bind(account_id)
                .bind(filename)
                .fetch_optional(&self.pool)
                .await,
        )?;
        row.map(Media::try_from).transpose()
    }

    /// List every downloaded media record for an account.
    pub async fn list_downloaded_for_account(&self, account_id: i64) -> Result<Vec<Media>> {
        let rows: Vec<MediaRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/list_downloaded_for_account.sql"))
                .bind(account_id)
                .fetch_all(&self.pool)
                .await,
        )?;
        rows.into_iter().map(Media::try_from).collect()
    }

    /// List media whose stored filename still carries a directory prefix.
    ///
    /// Early releases recorded full relative paths; current records hold a
    /// bare filename. These rows are candidates for filename migration.
    pub async fn list_with_directory_prefix(&self, account_id: i64) -> Result<Vec<Media>> {
        let rows: Vec<MediaRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/list_with_directory_prefix.sql"))
                .bind(account_id)
                .fetch_all(&self.pool)
                .await,
        )?;
        rows.into_iter().map(Media::try_from).collect()
    }

    /// Insert a media stub for an upstream id that has no record yet.
    ///
    /// A no-op if the id already exists.
    pub async fn insert_media_stub(&self, id: i64, account_id: i64, mimetype: &str) -> Result<()> {
        Self::raise(
            sqlx::query(include_str!("../queries/insert_media_stub.sql"))
                .bind(id)
                .bind(account_id)
                .bind(mimetype)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    /// Mark a media record as downloaded, recording its local filename.
    ///
    /// A `None` hash leaves any previously stored hash in place.
    pub async fn mark_downloaded(&self, id: i64, content_hash: Option<&str>, local_filename: &str) -> Result<()> {
        Self::raise(
            sqlx::query(include_str!("../queries/mark_downloaded.sql"))
                .bind(content_hash)
                .bind(local_filename)
                .bind(id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    pub async fn update_media_hash(&self, id: i64, content_hash: &str) -> Result<()> {
        Self::raise(
            sqlx::query(include_str!("../queries/update_media_hash.sql"))
                .bind(content_hash)
                .bind(id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    pub async fn update_media_filename(&self, id: i64, local_filename: &str) -> Result<()> {
        Self::raise(
            sqlx::query(include_str!("../queries/update_media_filename.sql"))
                .bind(local_filename)
                .bind(id)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let row: Option<AccountRow> = Self::raise(
            sqlx::query_as(include_str!("../queries/get_account_by_id.sql"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await,
        )?;
        Ok(row.map(Account::from))
    }

    /// Insert an account stub so media rows have something to reference.
    ///
    /// A no-op if the id already exists.
    pub async fn insert_account_stub(&self, id: i64, username: &str) -> Result<()> {
        Self::raise(
            sqlx::query(include_str!("../queries/insert_account_stub.sql"))
                .bind(id)
                .bind(username)
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        repo.insert_account_stub(7, "creator").await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_insert_stub_and_get_by_id() {
        let repo = repo().await;
        repo.insert_media_stub(100, 7, "image/jpeg").await.unwrap();
        let media = repo.get_media_by_id(100).await.unwrap().unwrap();
        assert_eq!(media.account_id, 7);
        assert_eq!(media.mimetype, "image/jpeg");
        assert!(!media.is_downloaded);
        assert!(media.content_hash.is_none());
    }

    #[tokio::test]
    async fn test_insert_stub_is_idempotent() {
        let repo = repo().await;
        repo.insert_media_stub(100, 7, "image/jpeg").await.unwrap();
        repo.insert_media_stub(100, 7, "video/mp4").await.unwrap();
        let media = repo.get_media_by_id(100).await.unwrap().unwrap();
        assert_eq!(media.mimetype, "image/jpeg", "existing row must not be replaced");
    }

    #[tokio::test]
    async fn test_mark_downloaded_records_hash_and_filename() {
        let repo = repo().await;
        repo.insert_media_stub(100, 7, "video/mp4").await.unwrap();
        repo.mark_downloaded(100, Some("cafe01"), "clip_id_100.mp4").await.unwrap();
        let media = repo.get_media_by_id(100).await.unwrap().unwrap();
        assert!(media.is_downloaded);
        assert_eq!(media.content_hash.as_deref(), Some("cafe01"));
        assert_eq!(media.local_filename.as_deref(), Some("clip_id_100.mp4"));
    }

    #[tokio::test]
    async fn test_mark_downloaded_without_hash_keeps_existing() {
        let repo = repo().await;
        repo.insert_media_stub(100, 7, "video/mp4").await.unwrap();
        repo.update_media_hash(100, "cafe01").await.unwrap();
        repo.mark_downloaded(100, None, "clip_id_100.mp4").await.unwrap();
        let media = repo.get_media_by_id(100).await.unwrap().unwrap();
        assert_eq!(media.content_hash.as_deref(), Some("cafe01"));
    }

    #[tokio::test]
    async fn test_get_by_hash_and_filename() {
        let repo = repo().await;
        repo.insert_media_stub(100, 7, "image/png").await.unwrap();
        repo.mark_downloaded(100, Some("beef02"), "pic_id_100.png").await.unwrap();
        assert_eq!(repo.get_media_by_hash("beef02").await.unwrap().unwrap().id, 100);
        assert_eq!(repo.get_media_by_filename(7, "pic_id_100.png").await.unwrap().unwrap().id, 100);
        assert!(repo.get_media_by_hash("missing").await.unwrap().is_none());
        assert!(repo.get_media_by_filename(7, "missing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_directory_prefix_listing() {
        let repo = repo().await;
        repo.insert_media_stub(1, 7, "image/png").await.unwrap();
        repo.insert_media_stub(2, 7, "image/png").await.unwrap();
        repo.insert_media_stub(3, 7, "image/png").await.unwrap();
        repo.mark_downloaded(1, None, "creator/pic_id_1.png").await.unwrap();
        repo.mark_downloaded(2, None, "creator\\pic_id_2.png").await.unwrap();
        repo.mark_downloaded(3, None, "pic_id_3.png").await.unwrap();
        let prefixed = repo.list_with_directory_prefix(7).await.unwrap();
        let mut ids: Vec<i64> = prefixed.iter().map(|m| m.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_downloaded_listing_excludes_stubs() {
        let repo = repo().await;
        repo.insert_media_stub(1, 7, "image/png").await.unwrap();
        repo.insert_media_stub(2, 7, "image/png").await.unwrap();
        repo.mark_downloaded(1, None, "pic_id_1.png").await.unwrap();
        let downloaded = repo.list_downloaded_for_account(7).await.unwrap();
        assert_eq!(downloaded.len(), 1);
        assert_eq!(downloaded[0].id, 1);
    }

    #[tokio::test]
    async fn test_update_filename() {
        let repo = repo().await;
        repo.insert_media_stub(1, 7, "image/png").await.unwrap();
        repo.mark_downloaded(1, None, "old_id_1.png").await.unwrap();
        repo.update_media_filename(1, "new_id_1.png").await.unwrap();
        let media = repo.get_media_by_id(1).await.unwrap().unwrap();
        assert_eq!(media.local_filename.as_deref(), Some("new_id_1.png"));
    }

    #[tokio::test]
    async fn test_account_stub_roundtrip() {
        let repo = repo().await;
        assert_eq!(repo.get_account(7).await.unwrap().unwrap().username, "creator");
        assert!(repo.get_account(8).await.unwrap().is_none());
        repo.insert_account_stub(7, "renamed").await.unwrap();
        assert_eq!(repo.get_account(7).await.unwrap().unwrap().username, "creator");
    }
}
