use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::model::{
    CheckDefinition, CheckId, CheckResult, CheckType, NewCheckResult, ResultId, Target, TargetId,
    TargetKind,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("target {0} not found")]
    TargetNotFound(TargetId),
    #[error("check {0} not found")]
    CheckNotFound(CheckId),
    #[error("check {check_id} does not belong to target {target_id}")]
    CheckTargetMismatch {
        check_id: CheckId,
        target_id: TargetId,
    },
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only view of the configured targets and checks, as the scheduler
/// consumes it at startup.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn list_enabled_targets_with_checks(
        &self,
    ) -> Result<Vec<(Arc<Target>, Vec<CheckDefinition>)>, StoreError>;
}

/// Append-only destination for probe results. Called from pool workers, so
/// implementations must be safe to share across tasks.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn save(&self, result: NewCheckResult) -> Result<CheckResult, StoreError>;
}

/// In-process store backing both seams, plus the CRUD the REST layer needs.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_target_id: TargetId,
    next_check_id: CheckId,
    next_result_id: ResultId,
    targets: BTreeMap<TargetId, Arc<Target>>,
    checks: BTreeMap<CheckId, CheckDefinition>,
    results: Vec<CheckResult>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn create_target(
        &self,
        name: String,
        address: String,
        kind: TargetKind,
        enabled: bool,
    ) -> Arc<Target> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_target_id += 1;
        let target = Arc::new(Target {
            id: inner.next_target_id,
            name,
            address,
            kind,
            enabled,
        });
        inner.targets.insert(target.id, Arc::clone(&target));
        target
    }

    pub fn list_targets(&self) -> Vec<Arc<Target>> {
        self.inner.lock().unwrap().targets.values().cloned().collect()
    }

    pub fn add_check(
        &self,
        target_id: TargetId,
        check_type: CheckType,
        parameters: Option<String>,
        interval_seconds: u64,
    ) -> Result<CheckDefinition, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let target = inner
            .targets
            .get(&target_id)
            .cloned()
            .ok_or(StoreError::TargetNotFound(target_id))?;
        inner.next_check_id += 1;
        let check = CheckDefinition {
            id: inner.next_check_id,
            target,
            check_type,
            parameters: parameters.filter(|p| !p.trim().is_empty()),
            interval_seconds,
        };
        inner.checks.insert(check.id, check.clone());
        Ok(check)
    }

    pub fn checks_for_target(
        &self,
        target_id: TargetId,
    ) -> Result<Vec<CheckDefinition>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if !inner.targets.contains_key(&target_id) {
            return Err(StoreError::TargetNotFound(target_id));
        }
        Ok(inner
            .checks
            .values()
            .filter(|c| c.target.id == target_id)
            .cloned()
            .collect())
    }

    /// Deletes a check after verifying it belongs to the given target.
    pub fn delete_check(&self, target_id: TargetId, check_id: CheckId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let check = inner
            .checks
            .get(&check_id)
            .ok_or(StoreError::CheckNotFound(check_id))?;
        if check.target.id != target_id {
            return Err(StoreError::CheckTargetMismatch {
                check_id,
                target_id,
            });
        }
        inner.checks.remove(&check_id);
        Ok(())
    }

    /// Results grouped per check, checks in ascending id order, newest
    /// result first within each check.
    pub fn results_for_target(
        &self,
        target_id: TargetId,
    ) -> Result<Vec<(CheckDefinition, Vec<CheckResult>)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if !inner.targets.contains_key(&target_id) {
            return Err(StoreError::TargetNotFound(target_id));
        }
        let mut grouped = Vec::new();
        for check in inner.checks.values().filter(|c| c.target.id == target_id) {
            let mut rows: Vec<CheckResult> = inner
                .results
                .iter()
                .filter(|r| r.check_id == check.id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            grouped.push((check.clone(), rows));
        }
        Ok(grouped)
    }

    /// Loads a JSON seed document of targets with nested checks. Returns
    /// the number of checks created.
    pub fn load_seed(&self, path: &Path) -> Result<usize, SeedError> {
        let raw = fs::read_to_string(path)?;
        let seeds: Vec<SeedTarget> = serde_json::from_str(&raw)?;
        let mut checks = 0;
        for seed in seeds {
            let target = self.create_target(seed.name, seed.address, seed.kind, seed.enabled);
            for check in seed.checks {
                // The target was just created; the lookup cannot fail.
                let _ = self.add_check(
                    target.id,
                    check.check_type,
                    check.parameters,
                    check.interval_seconds,
                );
                checks += 1;
            }
            debug!("Seeded target '{}'.", target.name);
        }
        Ok(checks)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct SeedTarget {
    name: String,
    address: String,
    kind: TargetKind,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    checks: Vec<SeedCheck>,
}

#[derive(Debug, Deserialize)]
struct SeedCheck {
    check_type: CheckType,
    #[serde(default)]
    parameters: Option<String>,
    interval_seconds: u64,
}

#[async_trait]
impl DefinitionStore for MemoryStore {
    async fn list_enabled_targets_with_checks(
        &self,
    ) -> Result<Vec<(Arc<Target>, Vec<CheckDefinition>)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .targets
            .values()
            .filter(|t| t.enabled)
            .map(|target| {
                let checks = inner
                    .checks
                    .values()
                    .filter(|c| c.target.id == target.id)
                    .cloned()
                    .collect();
                (Arc::clone(target), checks)
            })
            .collect())
    }
}

#[async_trait]
impl ResultSink for MemoryStore {
    async fn save(&self, result: NewCheckResult) -> Result<CheckResult, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_result_id += 1;
        let row = CheckResult {
            id: inner.next_result_id,
            check_id: result.check_id,
            timestamp: result.timestamp,
            success: result.success,
            response_time_ms: result.response_time_ms,
            status_code: result.status_code,
            error_message: result.error_message,
        };
        inner.results.push(row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_result(check_id: CheckId, success: bool) -> NewCheckResult {
        NewCheckResult {
            check_id,
            timestamp: Utc::now(),
            success,
            response_time_ms: 12,
            status_code: None,
            error_message: if success {
                None
            } else {
                Some("boom".to_string())
            },
        }
    }

    #[tokio::test]
    async fn test_save_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let target =
            store.create_target("t".into(), "127.0.0.1".into(), TargetKind::Host, true);
        let check = store.add_check(target.id, CheckType::Ping, None, 30).unwrap();

        let first = store.save(sample_result(check.id, true)).await.unwrap();
        let second = store.save(sample_result(check.id, false)).await.unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_add_check_to_unknown_target() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.add_check(42, CheckType::Ping, None, 30),
            Err(StoreError::TargetNotFound(42))
        ));
    }

    #[test]
    fn test_delete_check_verifies_ownership() {
        let store = MemoryStore::new();
        let first = store.create_target("a".into(), "127.0.0.1".into(), TargetKind::Host, true);
        let second =
            store.create_target("b".into(), "127.0.0.1".into(), TargetKind::Host, true);
        let check = store.add_check(first.id, CheckType::Ping, None, 30).unwrap();

        assert!(matches!(
            store.delete_check(second.id, check.id),
            Err(StoreError::CheckTargetMismatch { .. })
        ));
        assert!(store.delete_check(first.id, check.id).is_ok());
        assert!(matches!(
            store.delete_check(first.id, check.id),
            Err(StoreError::CheckNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_only_enabled_targets_are_listed() {
        let store = MemoryStore::new();
        let enabled =
            store.create_target("on".into(), "127.0.0.1".into(), TargetKind::Host, true);
        store.add_check(enabled.id, CheckType::Ping, None, 30).unwrap();
        let disabled =
            store.create_target("off".into(), "127.0.0.1".into(), TargetKind::Host, false);
        store.add_check(disabled.id, CheckType::Ping, None, 30).unwrap();

        let listed = store.list_enabled_targets_with_checks().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0.id, enabled.id);
        assert_eq!(listed[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_results_are_grouped_and_ordered() {
        let store = MemoryStore::new();
        let target =
            store.create_target("t".into(), "127.0.0.1".into(), TargetKind::Host, true);
        let first_check = store.add_check(target.id, CheckType::Ping, None, 30).unwrap();
        let second_check = store
            .add_check(target.id, CheckType::TcpPort, Some("80".into()), 30)
            .unwrap();
        store.save(sample_result(first_check.id, true)).await.unwrap();
        store.save(sample_result(second_check.id, false)).await.unwrap();
        store.save(sample_result(first_check.id, false)).await.unwrap();

        let grouped = store.results_for_target(target.id).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0.id, first_check.id);
        assert_eq!(grouped[0].1.len(), 2);
        // Newest first within a check.
        assert!(grouped[0].1[0].timestamp >= grouped[0].1[1].timestamp);
        assert_eq!(grouped[1].0.id, second_check.id);
        assert_eq!(grouped[1].1.len(), 1);
    }

    #[test]
    fn test_results_for_unknown_target() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.results_for_target(9),
            Err(StoreError::TargetNotFound(9))
        ));
    }

    #[test]
    fn test_load_seed() {
        let store = MemoryStore::new();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "web", "address": "http://127.0.0.1:8099", "kind": "WEB_APP", "enabled": true,
                 "checks": [{{"check_type": "HTTP_GET", "interval_seconds": 30}}]}},
                {{"name": "db", "address": "127.0.0.1", "kind": "HOST",
                 "checks": [{{"check_type": "TCP_PORT", "parameters": "5432", "interval_seconds": 60}}]}}]"#
        )
        .unwrap();

        let checks = store.load_seed(file.path()).unwrap();
        assert_eq!(checks, 2);
        let targets = store.list_targets();
        assert_eq!(targets.len(), 2);
        // The second target omitted "enabled" and defaults to disabled.
        assert!(targets[0].enabled);
        assert!(!targets[1].enabled);
    }

    #[test]
    fn test_load_seed_rejects_unknown_check_type() {
        let store = MemoryStore::new();
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "x", "address": "h", "kind": "HOST",
                 "checks": [{{"check_type": "UDP", "interval_seconds": 30}}]}}]"#
        )
        .unwrap();

        assert!(matches!(store.load_seed(file.path()), Err(SeedError::Json(_))));
    }
}
