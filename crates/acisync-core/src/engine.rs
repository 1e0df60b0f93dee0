// ── Sync engine ──
//
// The per-entity state machine every kind runs through:
//
//   resolve scope → lookup → (absent) create | (present) diff → update
//                                        ↘ optional verify re-read
//
// `KindRun` owns the cache and counters of the kind currently running. It
// is built fresh for every kind and dropped when the kind finishes.

use acisync_api::Endpoint;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::cache::{EntityCache, Scope};
use crate::context::SyncContext;
use crate::destination::Destination;
use crate::diff::{diff_fields, verify_fields};
use crate::error::CoreError;
use crate::kind::EntityKind;
use crate::record::DestRecord;
use crate::settings::{PreloadFailure, SyncSettings};
use crate::stats::{Issue, KindReport};

/// Whether a kind writes, or only resolves identifiers for later kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    ResolveOnly,
}

/// Terminal state of one reconciled object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// The desired state of one destination object.
#[derive(Debug, Clone)]
pub struct Target {
    pub endpoint: Endpoint,
    pub scope: Scope,
    /// Natural key within `scope`.
    pub key: String,
    /// Human-readable identity for logs and the report.
    pub label: String,
    /// Fields diffed on update and checked on verify.
    pub fields: Map<String, Value>,
    /// Fields only sent on create (parent references, immutable names).
    pub create_only: Map<String, Value>,
}

impl Target {
    pub fn new(endpoint: Endpoint, scope: Scope, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            endpoint,
            scope,
            label: key.clone(),
            key,
            fields: Map::new(),
            create_only: Map::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// A tracked field: diffed and verified like mapped fields.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_owned(), value.into());
        self
    }

    pub fn on_create(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.create_only.insert(field.to_owned(), value.into());
        self
    }

    fn create_body(&self) -> Map<String, Value> {
        let mut body = self.fields.clone();
        body.extend(self.create_only.clone());
        body
    }
}

/// State of the kind currently running.
pub struct KindRun<'a, D> {
    dest: &'a D,
    pub settings: &'a SyncSettings,
    pub ctx: &'a mut SyncContext,
    pub cache: EntityCache,
    pub report: KindReport,
    mode: Mode,
}

impl<'a, D: Destination> KindRun<'a, D> {
    pub fn new(
        kind: EntityKind,
        dest: &'a D,
        settings: &'a SyncSettings,
        ctx: &'a mut SyncContext,
        mode: Mode,
    ) -> Self {
        Self {
            dest,
            settings,
            ctx,
            cache: EntityCache::new(),
            report: KindReport::new(kind),
            mode,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.report.kind
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn dest(&self) -> &'a D {
        self.dest
    }

    /// Make sure `scope` of `endpoint` is in the cache, applying the
    /// preload-failure policy when the bulk read fails.
    pub async fn ensure_scope(&mut self, endpoint: Endpoint, scope: &Scope) -> Result<(), CoreError> {
        if self.cache.is_loaded(endpoint, scope) {
            return Ok(());
        }
        match self.cache.preload(self.dest, endpoint, scope).await {
            Ok(_) => Ok(()),
            Err(e @ CoreError::DuplicateNaturalKey { .. }) => {
                error!(kind = %self.kind(), "{e}");
                Err(e)
            }
            Err(e) => match self.settings.on_preload_failure {
                PreloadFailure::AssumeEmpty => {
                    warn!(
                        kind = %self.kind(),
                        %endpoint,
                        %scope,
                        "preload failed ({e}); policy assume-empty, treating scope as empty"
                    );
                    self.cache.mark_empty(endpoint, scope);
                    Ok(())
                }
                PreloadFailure::AbortKind => {
                    error!(
                        kind = %self.kind(),
                        %endpoint,
                        %scope,
                        "preload failed ({e}); policy abort-kind"
                    );
                    if e.is_kind_fatal() {
                        Err(e)
                    } else {
                        Err(CoreError::Connectivity {
                            message: format!("preload of {endpoint} ({scope}) failed: {e}"),
                        })
                    }
                }
            },
        }
    }

    /// Cached lookup without the create path.
    pub async fn find(
        &mut self,
        endpoint: Endpoint,
        scope: &Scope,
        key: &str,
    ) -> Result<Option<DestRecord>, CoreError> {
        self.ensure_scope(endpoint, scope).await?;
        Ok(self.cache.lookup(endpoint, scope, key).cloned())
    }

    /// Reconcile one entity of this kind, updating the kind's counters.
    pub async fn reconcile(&mut self, target: Target) -> Result<(Outcome, DestRecord), CoreError> {
        self.apply(target, true).await
    }

    /// Get-or-create a supporting object (IPAM address, DCIM device, child
    /// entry). Same state machine, but not counted in the kind's stats.
    pub async fn ensure(&mut self, target: Target) -> Result<DestRecord, CoreError> {
        self.apply(target, false).await.map(|(_, rec)| rec)
    }

    async fn apply(
        &mut self,
        target: Target,
        counted: bool,
    ) -> Result<(Outcome, DestRecord), CoreError> {
        self.ensure_scope(target.endpoint, &target.scope).await?;
        let existing = self
            .cache
            .lookup(target.endpoint, &target.scope, &target.key)
            .cloned();

        if self.mode == Mode::ResolveOnly {
            return existing
                .map(|rec| (Outcome::Unchanged, rec))
                .ok_or_else(|| CoreError::not_found(&target.endpoint.to_string(), target.label));
        }

        match existing {
            None => self.create(target, counted).await,
            Some(current) => self.update(target, current, counted).await,
        }
    }

    async fn create(
        &mut self,
        target: Target,
        counted: bool,
    ) -> Result<(Outcome, DestRecord), CoreError> {
        let body = target.create_body();
        let record = if self.settings.dry_run {
            info!(endpoint = %target.endpoint, "[dry-run] would create {}", target.label);
            DestRecord {
                id: self.ctx.plan_id(),
                fields: body,
            }
        } else {
            let created = self.dest.create(target.endpoint, &body).await?;
            info!(endpoint = %target.endpoint, id = %created.id, "created {}", target.label);
            created
        };

        self.cache
            .record(target.endpoint, &target.scope, target.key.clone(), record.clone());
        if counted {
            self.report.stats.created += 1;
            self.verify(&target, &record).await;
        }
        Ok((Outcome::Created, record))
    }

    async fn update(
        &mut self,
        target: Target,
        current: DestRecord,
        counted: bool,
    ) -> Result<(Outcome, DestRecord), CoreError> {
        let changes = diff_fields(&target.fields, &current);
        if changes.is_empty() {
            debug!(endpoint = %target.endpoint, "{} unchanged", target.label);
            if counted {
                self.report.stats.unchanged += 1;
            }
            return Ok((Outcome::Unchanged, current));
        }

        let body = changes.to_body();
        let changed: Vec<&str> = changes.fields().collect();
        let record = if self.settings.dry_run {
            info!(endpoint = %target.endpoint, fields = ?changed, "[dry-run] would update {}", target.label);
            current.merged(&body)
        } else {
            let id = current.id.existing().ok_or_else(|| {
                CoreError::Internal(format!("{} has no destination id", target.label))
            })?;
            let updated = self.dest.update(target.endpoint, id, &body).await?;
            info!(endpoint = %target.endpoint, id, fields = ?changed, "updated {}", target.label);
            updated
        };

        self.cache
            .record(target.endpoint, &target.scope, target.key.clone(), record.clone());
        if counted {
            self.report.stats.updated += 1;
            self.verify(&target, &record).await;
        }
        Ok((Outcome::Updated, record))
    }

    /// Re-read a written object and compare the tracked fields. Mismatches
    /// are counted separately and never change the write's outcome.
    async fn verify(&mut self, target: &Target, written: &DestRecord) {
        if !self.settings.verify || self.settings.dry_run {
            return;
        }
        let Some(id) = written.id.existing() else {
            return;
        };
        match self.dest.get(target.endpoint, id).await {
            Ok(actual) => {
                let mismatched = verify_fields(&target.fields, &actual);
                if mismatched.is_empty() {
                    self.report.stats.verified += 1;
                } else {
                    warn!(endpoint = %target.endpoint, id, fields = ?mismatched, "verification mismatch on {}", target.label);
                    self.report.mismatched += 1;
                    let err = CoreError::VerificationMismatch { fields: mismatched };
                    self.report.issues.push(Issue::new(&target.label, &err));
                }
            }
            Err(e) => {
                warn!(endpoint = %target.endpoint, id, "could not re-read {} for verification: {e}", target.label);
                self.report.issues.push(Issue::new(&target.label, &e));
            }
        }
    }

    /// Count a per-entity failure and keep its cause for the report.
    pub fn record_failure(&mut self, entity: &str, err: &CoreError) {
        error!(kind = %self.kind(), entity, "{err}");
        self.report.stats.failed += 1;
        self.report.issues.push(Issue::new(entity, err));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::record::DestId;

    /// Destination holding one tenant; records every write.
    struct OneTenant {
        stored: Mutex<Map<String, Value>>,
        writes: Mutex<Vec<String>>,
        fail_reads: bool,
        /// Description returned on re-read instead of the stored one.
        reread_description: Option<&'static str>,
    }

    impl OneTenant {
        fn new(fields: Value) -> Self {
            Self {
                stored: Mutex::new(fields.as_object().cloned().unwrap()),
                writes: Mutex::new(Vec::new()),
                fail_reads: false,
                reread_description: None,
            }
        }
    }

    impl Destination for OneTenant {
        async fn list(
            &self,
            _: Endpoint,
            _: &[(&'static str, String)],
        ) -> Result<Vec<DestRecord>, CoreError> {
            if self.fail_reads {
                return Err(CoreError::Connectivity {
                    message: "connection refused".into(),
                });
            }
            Ok(vec![DestRecord {
                id: DestId::Existing(1),
                fields: self.stored.lock().unwrap().clone(),
            }])
        }

        async fn create(&self, _: Endpoint, body: &Map<String, Value>) -> Result<DestRecord, CoreError> {
            self.writes.lock().unwrap().push("create".into());
            Ok(DestRecord {
                id: DestId::Existing(2),
                fields: body.clone(),
            })
        }

        async fn update(
            &self,
            _: Endpoint,
            id: u64,
            body: &Map<String, Value>,
        ) -> Result<DestRecord, CoreError> {
            self.writes.lock().unwrap().push(format!("update {id}"));
            let mut stored = self.stored.lock().unwrap();
            stored.extend(body.clone());
            Ok(DestRecord {
                id: DestId::Existing(id),
                fields: stored.clone(),
            })
        }

        async fn get(&self, _: Endpoint, id: u64) -> Result<DestRecord, CoreError> {
            let mut fields = self.stored.lock().unwrap().clone();
            if let Some(description) = self.reread_description {
                fields.insert("description".into(), description.into());
            }
            Ok(DestRecord {
                id: DestId::Existing(id),
                fields,
            })
        }
    }

    fn target(name: &str, description: &str) -> Target {
        Target::new(Endpoint::Tenants, Scope::Global, name)
            .set("description", description)
            .on_create("name", name)
    }

    #[tokio::test]
    async fn unchanged_object_makes_no_write() {
        let dest = OneTenant::new(json!({"name": "t1", "description": "x"}));
        let settings = SyncSettings::default();
        let mut ctx = SyncContext::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &settings, &mut ctx, Mode::Sync);

        let (outcome, _) = run.reconcile(target("t1", "x")).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(run.report.stats.unchanged, 1);
        assert!(dest.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn changed_object_is_patched_and_verified() {
        let dest = OneTenant::new(json!({"name": "t1", "description": "old"}));
        let settings = SyncSettings::default();
        let mut ctx = SyncContext::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &settings, &mut ctx, Mode::Sync);

        let (outcome, rec) = run.reconcile(target("t1", "new")).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(rec.field("description"), Some(&json!("new")));
        assert_eq!(run.report.stats.updated, 1);
        assert_eq!(run.report.stats.verified, 1);
        assert_eq!(*dest.writes.lock().unwrap(), vec!["update 1".to_owned()]);

        // The cache reflects the write: a second pass in the same run is a no-op.
        let (outcome, _) = run.reconcile(target("t1", "new")).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(run.cache.reads(), 1);
    }

    #[tokio::test]
    async fn verification_mismatch_is_counted_apart_from_the_update() {
        let mut dest = OneTenant::new(json!({"name": "t1", "description": "old"}));
        dest.reread_description = Some("truncated");
        let settings = SyncSettings::default();
        let mut ctx = SyncContext::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &settings, &mut ctx, Mode::Sync);

        let (outcome, _) = run.reconcile(target("t1", "new")).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);
        assert_eq!(run.report.stats.updated, 1);
        assert_eq!(run.report.stats.verified, 0);
        assert_eq!(run.report.stats.failed, 0);
        assert_eq!(run.report.mismatched, 1);
        assert_eq!(run.report.issues.len(), 1);
        assert_eq!(run.report.issues[0].entity, "t1");
        assert_eq!(run.report.issues[0].class, "verification");
    }

    #[tokio::test]
    async fn dry_run_plans_without_writing() {
        let dest = OneTenant::new(json!({"name": "t1", "description": "old"}));
        let settings = SyncSettings {
            dry_run: true,
            ..SyncSettings::default()
        };
        let mut ctx = SyncContext::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &settings, &mut ctx, Mode::Sync);

        let (created, rec) = run.reconcile(target("t2", "")).await.unwrap();
        assert_eq!(created, Outcome::Created);
        assert_eq!(rec.id, DestId::Planned(1));
        let (updated, _) = run.reconcile(target("t1", "new")).await.unwrap();
        assert_eq!(updated, Outcome::Updated);
        assert_eq!(run.report.stats.verified, 0);
        assert!(dest.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_only_never_creates() {
        let dest = OneTenant::new(json!({"name": "t1"}));
        let settings = SyncSettings::default();
        let mut ctx = SyncContext::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &settings, &mut ctx, Mode::ResolveOnly);

        let (_, rec) = run.reconcile(target("t1", "changed")).await.unwrap();
        assert_eq!(rec.id, DestId::Existing(1));
        let err = run.reconcile(target("t9", "")).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(dest.writes.lock().unwrap().is_empty());
        assert_eq!(run.report.stats.processed(), 0);
    }

    #[tokio::test]
    async fn preload_failure_policy_is_explicit() {
        let mut dest = OneTenant::new(json!({"name": "t1"}));
        dest.fail_reads = true;
        let mut ctx = SyncContext::default();

        let abort = SyncSettings::default();
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &abort, &mut ctx, Mode::Sync);
        let err = run.reconcile(target("t1", "")).await.unwrap_err();
        assert!(err.is_kind_fatal());

        let assume = SyncSettings {
            on_preload_failure: PreloadFailure::AssumeEmpty,
            ..SyncSettings::default()
        };
        let mut run = KindRun::new(EntityKind::Tenants, &dest, &assume, &mut ctx, Mode::Sync);
        let (outcome, _) = run.reconcile(target("t1", "")).await.unwrap();
        assert_eq!(outcome, Outcome::Created);
    }
}
