//! File router for Atlas Ingest.
//!
//! Watches an inbox directory and drives each arriving file through the
//! lifecycle `Arrived -> Matching -> Loading -> Staged | Failed`:
//!
//! - claim the file atomically (rename into `processing/`) so no two
//!   workers ever handle the same file
//! - match the filename against the priority-ordered rule table; first
//!   match wins, no match quarantines the file
//! - hand the claimed file to the staging loader under a fixed-size worker
//!   pool, then move it to `processed/` or `failed/`
//!
//! Unmatched and failed files are never deleted. On startup, files left in
//! `processing/` by a crash are re-queued with a bumped attempt count until
//! the retry limit sends them to quarantine.

mod claim;
mod config;
mod dispatch;

pub use claim::{abandoned_claim, claim_file, parse_claim_name, Claim};
pub use config::{RouterConfig, RuleConfig};
pub use dispatch::Dispatcher;

use atlas_db::{AtlasDb, DbError};
use atlas_ids::{BatchId, SessionId};
use atlas_types::{AuditEventType, BatchStatus, ProvenanceContext};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Audit rows for files that never matched a handler have no staging table.
const UNROUTED: &str = "(unrouted)";

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("No handler matched '{0}'")]
    NoHandlerMatched(String),

    /// Another worker claimed the file first. Not a failure.
    #[error("File '{0}' was already claimed")]
    ConcurrentClaimConflict(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;

/// Lifecycle states of one file moving through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Arrived,
    Matching,
    Loading,
    Staged,
    Failed,
}

/// Terminal report for one routed file.
#[derive(Debug, Clone)]
pub struct RouteOutcome {
    pub file_name: String,
    pub state: FileState,
    pub staging_table: Option<String>,
    pub rows_loaded: i64,
    pub error: Option<String>,
}

/// The unit of work a claimed file is handed to.
///
/// The production handler wraps the staging loader; tests substitute their
/// own to observe dispatch behavior.
pub trait FileHandler: Send + Sync + 'static {
    fn handle(
        &self,
        path: &Path,
        staging_table: &str,
        ctx: &ProvenanceContext,
    ) -> impl Future<Output = std::result::Result<i64, String>> + Send;
}

/// Production handler: loads the claimed file into its staging table.
pub struct LoaderHandler {
    db: AtlasDb,
}

impl LoaderHandler {
    pub fn new(db: AtlasDb) -> Self {
        Self { db }
    }
}

impl FileHandler for LoaderHandler {
    async fn handle(
        &self,
        path: &Path,
        staging_table: &str,
        ctx: &ProvenanceContext,
    ) -> std::result::Result<i64, String> {
        atlas_loader::load(&self.db, path, staging_table, ctx)
            .await
            .map(|receipt| receipt.rows_loaded)
            .map_err(|e| e.to_string())
    }
}

struct Shared<H> {
    config: RouterConfig,
    db: AtlasDb,
    dispatcher: Dispatcher,
    handler: H,
    session_id: SessionId,
}

/// The router engine.
pub struct Router<H: FileHandler = LoaderHandler> {
    shared: Arc<Shared<H>>,
    semaphore: Arc<Semaphore>,
}

impl Router<LoaderHandler> {
    /// Router wired to the staging loader.
    pub fn new(config: RouterConfig, db: AtlasDb) -> Result<Self> {
        let handler = LoaderHandler::new(db.clone());
        Self::with_handler(config, db, handler)
    }
}

impl<H: FileHandler> Router<H> {
    pub fn with_handler(config: RouterConfig, db: AtlasDb, handler: H) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;
        let dispatcher = Dispatcher::new(config.rules.clone())?;
        if dispatcher.is_empty() {
            warn!("Router started with no enabled rules; everything will quarantine");
        }
        let workers = config.workers;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                db,
                dispatcher,
                handler,
                session_id: SessionId::new(),
            }),
            semaphore: Arc::new(Semaphore::new(workers)),
        })
    }

    /// One run of the router shares one session id across its batches.
    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    /// Long-lived watcher loop: recover abandoned work, then sweep the
    /// inbox on an interval until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        let recovered = self.recover().await?;
        if !recovered.is_empty() {
            info!(files = recovered.len(), "Recovered abandoned processing files");
        }

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.shared.config.scan_interval_secs));
        loop {
            interval.tick().await;
            if let Err(e) = self.scan_once().await {
                error!(error = %e, "Inbox sweep failed");
            }
        }
    }

    /// One inbox sweep. Claims every visible file, dispatches each under
    /// the worker pool, and waits for all of them to finish.
    pub async fn scan_once(&self) -> Result<Vec<RouteOutcome>> {
        let mut join_set: JoinSet<RouteOutcome> = JoinSet::new();

        for entry in std::fs::read_dir(&self.shared.config.inbox_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Dotfiles and editor temp files are not drops
            if name.starts_with('.') || name.ends_with('~') {
                continue;
            }

            let claimed = match claim_file(&path, &self.shared.config.processing_dir, 1) {
                Ok(claimed) => claimed,
                Err(RouterError::ConcurrentClaimConflict(name)) => {
                    debug!(file = %name, "Lost claim race");
                    continue;
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Claim failed");
                    continue;
                }
            };

            let shared = Arc::clone(&self.shared);
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            join_set.spawn(async move {
                let outcome = process_claim(&shared, claimed).await;
                drop(permit);
                outcome
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Routing task panicked"),
            }
        }
        Ok(outcomes)
    }

    /// Re-queue files a previous run left in `processing/`.
    ///
    /// Each file gets one more attempt than its claim name records; past the
    /// retry limit it is quarantined instead.
    pub async fn recover(&self) -> Result<Vec<RouteOutcome>> {
        let mut outcomes = Vec::new();
        for entry in std::fs::read_dir(&self.shared.config.processing_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(abandoned) = abandoned_claim(&entry.path()) else {
                continue;
            };

            let attempt = abandoned.attempt + 1;
            if attempt > self.shared.config.retry_limit {
                warn!(
                    file = %abandoned.original_name,
                    attempts = abandoned.attempt,
                    "Retry limit reached, quarantining"
                );
                move_into(&self.shared.config.failed_dir, &abandoned.path, &abandoned.original_name)?;
                self.shared
                    .db
                    .record_audit_event(
                        AuditEventType::Upload,
                        UNROUTED,
                        None,
                        &self.shared.config.uploaded_by,
                        &abandoned.original_name,
                        0,
                        Some("retry limit exceeded after abandoned processing"),
                    )
                    .await?;
                outcomes.push(RouteOutcome {
                    file_name: abandoned.original_name,
                    state: FileState::Failed,
                    staging_table: None,
                    rows_loaded: 0,
                    error: Some("retry limit exceeded".into()),
                });
                continue;
            }

            // Re-claim under the bumped attempt and process immediately.
            // Renamed directly so the claim name keeps the true original.
            let new_name = format!(
                "{:02}__{}__{}",
                attempt,
                Uuid::new_v4().simple(),
                abandoned.original_name
            );
            let new_path = self.shared.config.processing_dir.join(&new_name);
            match std::fs::rename(&abandoned.path, &new_path) {
                Ok(()) => {
                    let claimed = Claim {
                        path: new_path,
                        original_name: abandoned.original_name,
                        attempt,
                    };
                    outcomes.push(process_claim(&self.shared, claimed).await);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(outcomes)
    }
}

/// Drive one claimed file to a terminal state.
async fn process_claim<H: FileHandler>(shared: &Shared<H>, claimed: Claim) -> RouteOutcome {
    let file_name = claimed.original_name.clone();

    // Matching
    let Some(rule) = shared.dispatcher.dispatch(&file_name) else {
        return quarantine_unmatched(shared, &claimed).await;
    };
    let staging_table = rule.staging_table.clone();

    // Loading
    let (file_size, file_modified) = file_facts(&claimed.path);
    let ctx = ProvenanceContext {
        batch_id: BatchId::new(),
        session_id: shared.session_id.clone(),
        source_name: rule.id.clone(),
        source_file: file_name.clone(),
        file_size,
        file_modified,
        uploaded_by: shared.config.uploaded_by.clone(),
        client_name: shared.config.client_name.clone(),
    };

    let handled = shared.handler.handle(&claimed.path, &staging_table, &ctx);
    let result = match shared.config.load_timeout_secs {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), handled).await {
            Ok(result) => result,
            Err(_) => {
                let reason = format!("load timed out after {}s", secs);
                settle_cancelled_load(shared, &staging_table, &ctx, &reason).await;
                Err(reason)
            }
        },
        None => handled.await,
    };

    match result {
        Ok(rows_loaded) => {
            if let Err(e) = move_into(&shared.config.processed_dir, &claimed.path, &file_name) {
                // The batch is staged; a stuck file is an operational issue
                error!(file = %file_name, error = %e, "Staged file could not be archived");
            }
            info!(file = %file_name, table = %staging_table, rows = rows_loaded, "File staged");
            RouteOutcome {
                file_name,
                state: FileState::Staged,
                staging_table: Some(staging_table),
                rows_loaded,
                error: None,
            }
        }
        Err(err) => {
            if let Err(e) = move_into(&shared.config.failed_dir, &claimed.path, &file_name) {
                error!(file = %file_name, error = %e, "Failed file could not be quarantined");
            }
            warn!(file = %file_name, table = %staging_table, error = %err, "File failed");
            RouteOutcome {
                file_name,
                state: FileState::Failed,
                staging_table: Some(staging_table),
                rows_loaded: 0,
                error: Some(err),
            }
        }
    }
}

/// A timed-out load is cancelled mid-flight and never reaches the loader's
/// own finalization, so the router settles the books: a batch still in
/// `processing` is failed and the timeout reaches the audit log.
async fn settle_cancelled_load<H>(
    shared: &Shared<H>,
    staging_table: &str,
    ctx: &ProvenanceContext,
    reason: &str,
) {
    match shared.db.get_batch(ctx.batch_id.as_str()).await {
        Ok(Some(batch)) if batch.status == BatchStatus::Processing => {
            if let Err(e) = shared.db.mark_batch_failed(ctx.batch_id.as_str(), reason).await {
                error!(batch_id = ctx.batch_id.as_str(), error = %e, "Cancelled batch could not be failed");
            }
        }
        Ok(_) => {}
        Err(e) => {
            error!(batch_id = ctx.batch_id.as_str(), error = %e, "Batch lookup failed after timeout")
        }
    }
    if let Err(e) = shared
        .db
        .record_audit_event(
            AuditEventType::Upload,
            staging_table,
            None,
            &shared.config.uploaded_by,
            &ctx.source_file,
            0,
            Some(reason),
        )
        .await
    {
        error!(file = %ctx.source_file, error = %e, "Audit write failed after timeout");
    }
}

/// No rule matched: quarantine the file and leave an audit trail.
async fn quarantine_unmatched<H>(shared: &Shared<H>, claimed: &Claim) -> RouteOutcome {
    let reason = RouterError::NoHandlerMatched(claimed.original_name.clone()).to_string();
    if let Err(e) = move_into(
        &shared.config.failed_dir,
        &claimed.path,
        &claimed.original_name,
    ) {
        error!(file = %claimed.original_name, error = %e, "Unmatched file could not be quarantined");
    }
    if let Err(e) = shared
        .db
        .record_audit_event(
            AuditEventType::Upload,
            UNROUTED,
            None,
            &shared.config.uploaded_by,
            &claimed.original_name,
            0,
            Some(&reason),
        )
        .await
    {
        error!(file = %claimed.original_name, error = %e, "Audit write failed");
    }
    warn!(file = %claimed.original_name, "No handler matched, quarantined");
    RouteOutcome {
        file_name: claimed.original_name.clone(),
        state: FileState::Failed,
        staging_table: None,
        rows_loaded: 0,
        error: Some(reason),
    }
}

/// Move a file into a terminal directory under its original name,
/// uniquified if a previous drop already parked there.
fn move_into(dir: &Path, from: &Path, original_name: &str) -> Result<PathBuf> {
    let mut dest = dir.join(original_name);
    if dest.exists() {
        dest = dir.join(format!("{}__{}", Uuid::new_v4().simple(), original_name));
    }
    std::fs::rename(from, &dest)?;
    Ok(dest)
}

fn file_facts(path: &Path) -> (i64, DateTime<Utc>) {
    let metadata = std::fs::metadata(path).ok();
    let size = metadata.as_ref().map(|m| m.len() as i64).unwrap_or(0);
    let modified = metadata
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(Utc::now);
    (size, modified)
}
