//! Reconciliation between files on disk and media records in the store.

use exn::ResultExt;
use keepsake_filename::{normalize_timestamp, tag_with_hash2};
use keepsake_store::{Repository, RetryPolicy};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::classify::{Classification, ClassifiedFile, scan_directory};
use crate::error::{ErrorKind, Result};
use crate::hashing::fingerprint_for;

/// Caller-provided context for one reconciliation run.
#[derive(Debug, Clone)]
pub struct Context {
    pub creator_id: i64,
    pub creator_name: String,
    pub download_root: PathBuf,
}

/// Resolver configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Accept an id-to-filename pairing without re-verifying its content
    /// hash. A fast path for archives already known to be good.
    pub trust_filename: bool,
}

/// Outcome of resolving a single file or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing record matched. `hash_verified` is `false` when the
    /// content could not be verified against the stored hash, so callers
    /// can warn instead of silently trusting stale data.
    Matched { media_id: i64, hash_verified: bool },
    /// The store had no record for this id; one was created.
    Created { media_id: i64 },
    /// A different record already owns this content. The owning record is
    /// reported and nothing is modified; what to do with the duplicate
    /// file is the caller's decision.
    Duplicate { owner_id: i64 },
    /// Could not be resolved; left in place for a later run.
    Skipped,
}

/// Counters accumulated over one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: u64,
    pub created: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failures: u64,
    pub migrated_filenames: u64,
}

/// Resolves file identities against the media store.
///
/// One resolver handles one creator's download directory per call. All
/// store writes go through the retry policy so transient lock contention
/// never fails a batch; a single file's hashing failure is recorded and
/// the batch continues.
#[derive(Debug)]
pub struct Resolver<'a> {
    repo: &'a Repository,
    retry: RetryPolicy,
    config: Config,
}

impl<'a> Resolver<'a> {
    pub fn new(repo: &'a Repository, config: Config) -> Self {
        Self { repo, retry: RetryPolicy::default(), config }
    }

    /// Replace the default retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn with_store<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = keepsake_store::error::Result<T>>,
    {
        self.retry.run(op).await.or_raise(|| ErrorKind::Store)
    }

    /// Reconcile every file under the context's download root.
    ///
    /// Files are resolved in decreasing order of filename reliability:
    /// hash-tagged first, then id-tagged, then content-hashed. Per-file
    /// failures are counted, never fatal.
    #[instrument(skip(self, ctx), fields(creator = %ctx.creator_name))]
    pub async fn reconcile(&self, ctx: &Context) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        self.ensure_account(ctx).await?;
        report.migrated_filenames = self.migrate_legacy_filenames(ctx).await?;

        for file in scan_directory(&ctx.download_root)? {
            let resolution = match &file.classification {
                Classification::Hash2(hash) => self.resolve_by_hash_tag(ctx, &file, hash).await?,
                Classification::MediaId { id, preview } => {
                    self.resolve_by_id(ctx, &file, *id, *preview).await?
                }
                Classification::NeedsHash => match fingerprint_for(&file.path, &file.mimetype) {
                    Ok(Some(hash)) => self.resolve_by_content(ctx, &file, &hash).await?,
                    Ok(None) => Resolution::Skipped,
                    Err(error) => {
                        warn!(
                            file = %file.filename,
                            mimetype = %file.mimetype,
                            %error,
                            "failed to fingerprint file; leaving it unresolved",
                        );
                        report.failures += 1;
                        continue;
                    }
                },
            };
            match resolution {
                Resolution::Matched { .. } => report.matched += 1,
                Resolution::Created { .. } => report.created += 1,
                Resolution::Duplicate { .. } => report.duplicates += 1,
                Resolution::Skipped => report.skipped += 1,
            }
        }
        Ok(report)
    }

    /// Record a freshly downloaded file against its media id.
    ///
    /// If a *different* record already owns the file's fingerprint the
    /// download is reported as a duplicate and the target record is left
    /// untouched. Deleting the surplus file is up to the caller.
    #[instrument(skip(self, ctx, path))]
    pub async fn register_download(
        &self,
        ctx: &Context,
        media_id: i64,
        path: impl AsRef<Path>,
        mimetype: &str,
    ) -> Result<Resolution> {
        let path = path.as_ref();
        let hash = fingerprint_for(path, mimetype).or_raise(|| ErrorKind::Hash)?;
        if let Some(hash) = hash.as_deref()
            && let Some(owner) = self.with_store(|| self.repo.get_media_by_hash(hash)).await?
            && owner.id != media_id
        {
            info!(owner = owner.id, media_id, "download duplicates existing content");
            return Ok(Resolution::Duplicate { owner_id: owner.id });
        }
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            warn!(path = %path.display(), "download path has no usable filename");
            return Ok(Resolution::Skipped);
        };
        self.ensure_account(ctx).await?;
        self.with_store(|| self.repo.insert_media_stub(media_id, ctx.creator_id, mimetype)).await?;
        self.with_store(|| self.repo.mark_downloaded(media_id, hash.as_deref(), filename)).await?;
        Ok(Resolution::Matched { media_id, hash_verified: hash.is_some() })
    }

    /// Create a stub account row when the creator has not been synced yet.
    async fn ensure_account(&self, ctx: &Context) -> Result<()> {
        if self.with_store(|| self.repo.get_account(ctx.creator_id)).await?.is_none() {
            info!(creator = %ctx.creator_name, "creating stub account record");
            self.with_store(|| self.repo.insert_account_stub(ctx.creator_id, &ctx.creator_name)).await?;
        }
        Ok(())
    }

    /// Rewrite stored filenames that still carry a directory prefix.
    ///
    /// Early releases stored full relative paths. Idempotent: a second run
    /// finds nothing left to migrate.
    async fn migrate_legacy_filenames(&self, ctx: &Context) -> Result<u64> {
        let prefixed = self.with_store(|| self.repo.list_with_directory_prefix(ctx.creator_id)).await?;
        let mut migrated = 0u64;
        for media in prefixed {
            let Some(stored) = media.local_filename.as_deref() else { continue };
            let bare = stored.rsplit(['/', '\\']).next().unwrap_or(stored);
            if bare != stored {
                self.with_store(|| self.repo.update_media_filename(media.id, bare)).await?;
                migrated += 1;
            }
        }
        if migrated > 0 {
            info!(migrated, "rewrote stored paths to bare filenames");
        }
        Ok(migrated)
    }

    /// A hash-tagged filename pins content identity; no hashing needed.
    async fn resolve_by_hash_tag(&self, ctx: &Context, file: &ClassifiedFile, hash: &str) -> Result<Resolution> {
        if let Some(media) = self.with_store(|| self.repo.get_media_by_hash(hash)).await? {
            if !media.is_downloaded || media.local_filename.as_deref() != Some(file.filename.as_str()) {
                self.with_store(|| self.repo.mark_downloaded(media.id, None, &file.filename)).await?;
            }
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
        }
        if let Some(media) = self.with_store(|| self.repo.get_media_by_filename(ctx.creator_id, &file.filename)).await? {
            self.with_store(|| self.repo.update_media_hash(media.id, hash)).await?;
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
        }
        warn!(file = %file.filename, "hash-tagged file matches no record");
        Ok(Resolution::Skipped)
    }

    /// An id-tagged filename names its record directly. With
    /// `trust_filename` the pairing is accepted as-is; otherwise the
    /// content is verified against the stored hash. When the recorded
    /// filename gets its timestamp canonicalized the file on disk is
    /// renamed to match, so store and disk never disagree about the name.
    async fn resolve_by_id(
        &self,
        ctx: &Context,
        file: &ClassifiedFile,
        id: i64,
        preview: bool,
    ) -> Result<Resolution> {
        let Some(media) = self.with_store(|| self.repo.get_media_by_id(id)).await? else {
            // Ids are upstream-owned; a missing record means the metadata
            // sync has not caught up. Record what we know under the id the
            // filename claims.
            self.with_store(|| self.repo.insert_media_stub(id, ctx.creator_id, &file.mimetype)).await?;
            if preview {
                // A preview is not the media itself; the stub stays
                // not-downloaded until the full file arrives.
                return Ok(Resolution::Created { media_id: id });
            }
            let hash = match fingerprint_for(&file.path, &file.mimetype) {
                Ok(hash) => hash,
                Err(error) => {
                    warn!(file = %file.filename, %error, "could not fingerprint new file");
                    None
                }
            };
            let recorded = self.rename_to(file, &normalize_timestamp(&file.filename, None));
            self.with_store(|| self.repo.mark_downloaded(id, hash.as_deref(), &recorded)).await?;
            return Ok(Resolution::Created { media_id: id });
        };

        if preview {
            // A preview variant is a different encode by definition, so
            // there is nothing to verify, and it must never claim the
            // record's filename or downloaded flag from the full media.
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: false });
        }

        let normalized = normalize_timestamp(&file.filename, media.created_at);
        if self.config.trust_filename {
            let recorded = self.rename_to(file, &normalized);
            if !media.is_downloaded || media.local_filename.as_deref() != Some(recorded.as_str()) {
                self.with_store(|| self.repo.mark_downloaded(media.id, None, &recorded)).await?;
            }
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
        }

        // Fingerprint before renaming; the walk handed out this path.
        let fingerprinted = fingerprint_for(&file.path, &file.mimetype);
        let recorded = self.rename_to(file, &normalized);
        match fingerprinted {
            Ok(Some(hash)) => match media.content_hash.as_deref() {
                Some(stored) if stored == hash.as_str() => {
                    self.with_store(|| self.repo.mark_downloaded(media.id, None, &recorded)).await?;
                    Ok(Resolution::Matched { media_id: media.id, hash_verified: true })
                }
                Some(_) => {
                    // The stored hash stays authoritative; surfacing an
                    // unverified match lets the caller decide.
                    warn!(file = %file.filename, media_id = media.id, "content does not match stored hash");
                    self.with_store(|| self.repo.mark_downloaded(media.id, None, &recorded)).await?;
                    Ok(Resolution::Matched { media_id: media.id, hash_verified: false })
                }
                None => {
                    self.with_store(|| self.repo.mark_downloaded(media.id, Some(&hash), &recorded)).await?;
                    Ok(Resolution::Matched { media_id: media.id, hash_verified: true })
                }
            },
            Ok(None) => {
                self.with_store(|| self.repo.mark_downloaded(media.id, None, &recorded)).await?;
                Ok(Resolution::Matched { media_id: media.id, hash_verified: false })
            }
            Err(error) => {
                warn!(file = %file.filename, %error, "could not verify content hash");
                self.with_store(|| self.repo.mark_downloaded(media.id, None, &recorded)).await?;
                Ok(Resolution::Matched { media_id: media.id, hash_verified: false })
            }
        }
    }

    /// No filename markers; the freshly computed fingerprint does the
    /// talking. Matching records adopt the file, and the file is renamed
    /// on disk to carry the hash tag so the next scan is cheap.
    async fn resolve_by_content(&self, ctx: &Context, file: &ClassifiedFile, hash: &str) -> Result<Resolution> {
        if let Some(media) = self.with_store(|| self.repo.get_media_by_hash(hash)).await? {
            let duplicate = media.is_downloaded
                && media.local_filename.as_deref().is_some_and(|stored| stored != file.filename);
            if duplicate {
                info!(file = %file.filename, owner = media.id, "content already owned by another file");
                return Ok(Resolution::Duplicate { owner_id: media.id });
            }
            let renamed = self.rename_with_tag(file, hash);
            self.with_store(|| self.repo.mark_downloaded(media.id, Some(hash), &renamed)).await?;
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
        }
        if let Some(media) = self.with_store(|| self.repo.get_media_by_filename(ctx.creator_id, &file.filename)).await? {
            let renamed = self.rename_with_tag(file, hash);
            self.with_store(|| self.repo.mark_downloaded(media.id, Some(hash), &renamed)).await?;
            return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
        }
        // Last resort: compare canonicalized timestamps across everything
        // the account has downloaded.
        let downloaded = self.with_store(|| self.repo.list_downloaded_for_account(ctx.creator_id)).await?;
        let normalized_disk = normalize_timestamp(&file.filename, None);
        for media in downloaded {
            let Some(stored) = media.local_filename.as_deref() else { continue };
            if normalize_timestamp(stored, None) == normalized_disk {
                let renamed = self.rename_with_tag(file, hash);
                self.with_store(|| self.repo.mark_downloaded(media.id, Some(hash), &renamed)).await?;
                return Ok(Resolution::Matched { media_id: media.id, hash_verified: true });
            }
        }
        // Never mint ids here; they belong to the upstream service.
        Ok(Resolution::Skipped)
    }

    /// Rename a freshly hashed file so its name carries the hash tag.
    fn rename_with_tag(&self, file: &ClassifiedFile, hash: &str) -> String {
        self.rename_to(file, &tag_with_hash2(&file.filename, hash))
    }

    /// Rename a file so the store only ever records a name that exists on
    /// disk. Returns the filename to record: the new name on success, the
    /// current name when nothing changed or the rename failed.
    fn rename_to(&self, file: &ClassifiedFile, new_name: &str) -> String {
        if new_name == file.filename {
            return new_name.to_string();
        }
        let target = file.path.with_file_name(new_name);
        match std::fs::rename(&file.path, &target) {
            Ok(()) => new_name.to_string(),
            Err(error) => {
                warn!(file = %file.filename, new_name, %error, "failed to rename file; recording its current name");
                file.filename.clone()
            }
        }
    }
}
