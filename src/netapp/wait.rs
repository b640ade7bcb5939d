//! Convergence polling
//!
//! Resource Manager caches resource state, so a read right after a delete can
//! still find the resource and a read right after a create can miss it. The
//! waits here probe the resource at a fixed interval until it is gone
//! ([`WaitMode::AwaitAbsence`]) or reachable ([`WaitMode::AwaitPresence`]).
//! There is no backoff; the total wait is bounded by `interval * max_retries`.

use super::clients::ClientFactory;
use crate::abort::AbortSignal;
use crate::error::NetAppError;
use crate::uri::{self, ResourceKind};
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Used after a delete: done once the lookup fails
    AwaitAbsence,
    /// Used after a create: done once the lookup succeeds
    AwaitPresence,
}

#[derive(Debug, Clone)]
pub struct PollRequest {
    pub resource_id: String,
    pub interval: Duration,
    pub max_retries: u32,
    pub mode: WaitMode,
    /// Probe volumes through their replication status instead of a plain get
    pub check_replication: bool,
}

impl PollRequest {
    pub fn absence(resource_id: &str, interval: Duration, max_retries: u32) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            interval,
            max_retries,
            mode: WaitMode::AwaitAbsence,
            check_replication: false,
        }
    }

    pub fn presence(resource_id: &str, interval: Duration, max_retries: u32) -> Self {
        Self {
            mode: WaitMode::AwaitPresence,
            ..Self::absence(resource_id, interval, max_retries)
        }
    }

    pub fn with_replication_check(mut self, check_replication: bool) -> Self {
        self.check_replication = check_replication;
        self
    }
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Found,
    Missing(String),
    /// No lookup was made
    Skipped,
}

/// Outcome of a convergence loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Convergence {
    Converged { attempts: u32 },
    Exhausted { attempts: u32, last_error: Option<String> },
    Aborted { attempts: u32 },
}

/// Last thing a probe observed: `Ok` when the resource answered
pub type Observation = std::result::Result<(), String>;

/// Sleep, probe, and stop as soon as `done` accepts the observation.
///
/// The sleep comes first on every attempt, so even an already-converged
/// resource costs one interval. A [`Probe::Skipped`] keeps the previous
/// observation, which starts out as `Ok`.
pub async fn converge<F, Fut>(
    interval: Duration,
    budget: u32,
    abort: &AbortSignal,
    mut probe: F,
    done: fn(&Observation) -> bool,
) -> Convergence
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe>,
{
    let mut observed: Observation = Ok(());

    for attempt in 1..=budget {
        if abort.race(tokio::time::sleep(interval)).await.is_none() {
            return Convergence::Aborted { attempts: attempt - 1 };
        }

        match probe().await {
            Probe::Found => observed = Ok(()),
            Probe::Missing(error) => observed = Err(error),
            Probe::Skipped => {}
        }

        if done(&observed) {
            return Convergence::Converged { attempts: attempt };
        }
    }

    Convergence::Exhausted {
        attempts: budget,
        last_error: observed.err(),
    }
}

/// Existence lookups per resource kind
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    async fn get_snapshot(&self, resource_group: &str, account: &str, pool: &str, volume: &str, snapshot: &str) -> Result<()>;
    async fn get_volume(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()>;
    async fn get_replication_status(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()>;
    async fn get_capacity_pool(&self, resource_group: &str, account: &str, pool: &str) -> Result<()>;
    async fn get_snapshot_policy(&self, resource_group: &str, account: &str, policy: &str) -> Result<()>;
    async fn get_account(&self, resource_group: &str, account: &str) -> Result<()>;
}

/// Probe the resource once, using the lookup that matches its kind
pub async fn probe_resource<L: ResourceLookup + ?Sized>(
    lookup: &L,
    resource_id: &str,
    check_replication: bool,
) -> Probe {
    let rg = uri::resource_group(resource_id);
    let account = uri::account(resource_id);

    let result = match ResourceKind::classify(resource_id) {
        ResourceKind::Snapshot => {
            lookup
                .get_snapshot(
                    &rg,
                    &account,
                    &uri::capacity_pool(resource_id),
                    &uri::volume(resource_id),
                    &uri::snapshot(resource_id),
                )
                .await
        }
        ResourceKind::Volume if check_replication => {
            lookup
                .get_replication_status(
                    &rg,
                    &account,
                    &uri::capacity_pool(resource_id),
                    &uri::volume(resource_id),
                )
                .await
        }
        ResourceKind::Volume => {
            lookup
                .get_volume(
                    &rg,
                    &account,
                    &uri::capacity_pool(resource_id),
                    &uri::volume(resource_id),
                )
                .await
        }
        ResourceKind::CapacityPool => {
            lookup
                .get_capacity_pool(&rg, &account, &uri::capacity_pool(resource_id))
                .await
        }
        ResourceKind::SnapshotPolicy => {
            lookup
                .get_snapshot_policy(&rg, &account, &uri::snapshot_policy(resource_id))
                .await
        }
        ResourceKind::Account => lookup.get_account(&rg, &account).await,
        ResourceKind::Unknown => return Probe::Skipped,
    };

    match result {
        Ok(()) => Probe::Found,
        Err(e) => Probe::Missing(format!("{:#}", e)),
    }
}

/// Wait until the resource converges to the requested state
pub async fn wait_for<L: ResourceLookup + ?Sized>(
    lookup: &L,
    request: &PollRequest,
    abort: &AbortSignal,
) -> std::result::Result<(), NetAppError> {
    let id = request.resource_id.as_str();
    let kind = ResourceKind::classify(id);
    if kind == ResourceKind::Unknown {
        // TODO: reject unknown ids up front once callers stop relying on presence waits passing for them
        tracing::warn!("{} is not a known NetApp resource id, no lookups will be made", id);
    }

    let done: fn(&Observation) -> bool = match request.mode {
        WaitMode::AwaitAbsence => |observed| observed.is_err(),
        WaitMode::AwaitPresence => |observed| observed.is_ok(),
    };

    tracing::debug!(
        "Waiting for {} {} ({:?}, every {:?}, up to {} attempts)",
        kind,
        id,
        request.mode,
        request.interval,
        request.max_retries
    );

    let outcome = converge(
        request.interval,
        request.max_retries,
        abort,
        || probe_resource(lookup, id, request.check_replication),
        done,
    )
    .await;

    match outcome {
        Convergence::Converged { attempts } => {
            tracing::debug!("{} {} converged after {} attempt(s)", kind, id, attempts);
            Ok(())
        }
        Convergence::Exhausted { last_error, .. } => match request.mode {
            WaitMode::AwaitAbsence => Err(NetAppError::RetriesExceeded {
                retries: request.max_retries,
            }),
            WaitMode::AwaitPresence => Err(NetAppError::ResourceNotReady {
                retries: request.max_retries,
                last_error: last_error.unwrap_or_default(),
            }),
        },
        Convergence::Aborted { .. } => Err(NetAppError::Aborted {
            resource_id: id.to_string(),
        }),
    }
}

/// Lookups only check that Resource Manager answers; bodies are not decoded
#[async_trait]
impl ResourceLookup for ClientFactory {
    async fn get_snapshot(&self, resource_group: &str, account: &str, pool: &str, volume: &str, snapshot: &str) -> Result<()> {
        self.snapshots()
            .exists(resource_group, account, pool, volume, snapshot)
            .await
    }

    async fn get_volume(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()> {
        self.volumes().exists(resource_group, account, pool, volume).await
    }

    async fn get_replication_status(&self, resource_group: &str, account: &str, pool: &str, volume: &str) -> Result<()> {
        self.volumes()
            .replication_reachable(resource_group, account, pool, volume)
            .await
    }

    async fn get_capacity_pool(&self, resource_group: &str, account: &str, pool: &str) -> Result<()> {
        self.pools().exists(resource_group, account, pool).await
    }

    async fn get_snapshot_policy(&self, resource_group: &str, account: &str, policy: &str) -> Result<()> {
        self.snapshot_policies()
            .exists(resource_group, account, policy)
            .await
    }

    async fn get_account(&self, resource_group: &str, account: &str) -> Result<()> {
        self.accounts().exists(resource_group, account).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    const ACCOUNT_ID: &str =
        "/subscriptions/s/resourceGroups/rg/providers/Microsoft.NetApp/netAppAccounts/acct";

    /// Lookup that answers from a script of present/absent results
    struct ScriptedLookup {
        /// One entry per call; the last entry repeats
        script: Vec<bool>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedLookup {
        fn always(present: bool) -> Self {
            Self::script(vec![present])
        }

        fn script(script: Vec<bool>) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(&self, call: String) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len().min(self.script.len() - 1);
            calls.push(call);
            if self.script[index] {
                Ok(())
            } else {
                Err(anyhow::anyhow!("API request failed: 404 ResourceNotFound: gone"))
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceLookup for ScriptedLookup {
        async fn get_snapshot(&self, rg: &str, a: &str, p: &str, v: &str, s: &str) -> Result<()> {
            self.answer(format!("snapshot {}/{}/{}/{}/{}", rg, a, p, v, s))
        }

        async fn get_volume(&self, rg: &str, a: &str, p: &str, v: &str) -> Result<()> {
            self.answer(format!("volume {}/{}/{}/{}", rg, a, p, v))
        }

        async fn get_replication_status(&self, rg: &str, a: &str, p: &str, v: &str) -> Result<()> {
            self.answer(format!("replication {}/{}/{}/{}", rg, a, p, v))
        }

        async fn get_capacity_pool(&self, rg: &str, a: &str, p: &str) -> Result<()> {
            self.answer(format!("pool {}/{}/{}", rg, a, p))
        }

        async fn get_snapshot_policy(&self, rg: &str, a: &str, p: &str) -> Result<()> {
            self.answer(format!("policy {}/{}/{}", rg, a, p))
        }

        async fn get_account(&self, rg: &str, a: &str) -> Result<()> {
            self.answer(format!("account {}/{}", rg, a))
        }
    }

    fn volume_id() -> String {
        format!("{}/capacityPools/pool/volumes/vol", ACCOUNT_ID)
    }

    const INTERVAL: Duration = Duration::from_secs(10);

    #[tokio::test(start_paused = true)]
    async fn test_absence_succeeds_on_first_failed_lookup() {
        let lookup = ScriptedLookup::always(false);
        let start = Instant::now();

        let request = PollRequest::absence(&volume_id(), INTERVAL, 3);
        wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();

        assert_eq!(start.elapsed(), INTERVAL);
        assert_eq!(lookup.calls(), vec!["volume rg/acct/pool/vol"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absence_exhausts_retries() {
        let lookup = ScriptedLookup::always(true);
        let start = Instant::now();

        let request = PollRequest::absence(&volume_id(), INTERVAL, 3);
        let err = wait_for(&lookup, &request, &AbortSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, NetAppError::RetriesExceeded { retries: 3 }));
        assert_eq!(err.to_string(), "exceeded number of retries: 3");
        assert_eq!(start.elapsed(), INTERVAL * 3);
        assert_eq!(lookup.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_succeeds_on_first_successful_lookup() {
        let lookup = ScriptedLookup::always(true);
        let start = Instant::now();

        let request = PollRequest::presence(&volume_id(), INTERVAL, 3);
        wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();

        assert_eq!(start.elapsed(), INTERVAL);
        assert_eq!(lookup.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_reports_last_error() {
        let lookup = ScriptedLookup::always(false);
        let start = Instant::now();

        let request = PollRequest::presence(&volume_id(), INTERVAL, 3);
        let err = wait_for(&lookup, &request, &AbortSignal::never())
            .await
            .unwrap_err();

        match err {
            NetAppError::ResourceNotReady { retries, last_error } => {
                assert_eq!(retries, 3);
                assert!(last_error.contains("ResourceNotFound"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(start.elapsed(), INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_after_cache_catches_up() {
        let lookup = ScriptedLookup::script(vec![false, false, true]);
        let start = Instant::now();

        let request = PollRequest::presence(&volume_id(), INTERVAL, 5);
        wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();

        assert_eq!(start.elapsed(), INTERVAL * 3);
        assert_eq!(lookup.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_by_kind() {
        let cases = [
            (
                format!("{}/snapshots/snap", volume_id()),
                "snapshot rg/acct/pool/vol/snap",
            ),
            (volume_id(), "volume rg/acct/pool/vol"),
            (format!("{}/capacityPools/pool", ACCOUNT_ID), "pool rg/acct/pool"),
            (format!("{}/snapshotPolicies/daily", ACCOUNT_ID), "policy rg/acct/daily"),
            (ACCOUNT_ID.to_string(), "account rg/acct"),
        ];

        for (id, expected) in cases {
            let lookup = ScriptedLookup::always(true);
            let request = PollRequest::presence(&id, INTERVAL, 1);
            wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();
            assert_eq!(lookup.calls(), vec![expected.to_string()]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_replication_check_uses_replication_status() {
        let lookup = ScriptedLookup::always(false);
        let request = PollRequest::absence(&volume_id(), INTERVAL, 3).with_replication_check(true);
        wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();
        assert_eq!(lookup.calls(), vec!["replication rg/acct/pool/vol"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replication_check_ignored_for_other_kinds() {
        let lookup = ScriptedLookup::always(false);
        let id = format!("{}/capacityPools/pool", ACCOUNT_ID);
        let request = PollRequest::absence(&id, INTERVAL, 3).with_replication_check(true);
        wait_for(&lookup, &request, &AbortSignal::never()).await.unwrap();
        assert_eq!(lookup.calls(), vec!["pool rg/acct/pool"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kind_makes_no_calls() {
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet";

        let lookup = ScriptedLookup::always(false);
        let err = wait_for(&lookup, &PollRequest::absence(id, INTERVAL, 2), &AbortSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, NetAppError::RetriesExceeded { retries: 2 }));
        assert!(lookup.calls().is_empty());

        // nothing observed yet counts as "no error", so a presence wait passes
        let start = Instant::now();
        wait_for(&lookup, &PollRequest::presence(id, INTERVAL, 2), &AbortSignal::never())
            .await
            .unwrap();
        assert_eq!(start.elapsed(), INTERVAL);
        assert!(lookup.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_before_first_probe() {
        let lookup = ScriptedLookup::always(true);
        let (tx, signal) = AbortSignal::new();
        tx.send(true).unwrap();
        assert!(signal.is_aborted());

        let err = wait_for(&lookup, &PollRequest::absence(&volume_id(), INTERVAL, 3), &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, NetAppError::Aborted { .. }));
        assert!(lookup.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_mid_wait() {
        let lookup = ScriptedLookup::always(true);
        let (tx, signal) = AbortSignal::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            let _ = tx.send(true);
        });

        let start = Instant::now();
        let outcome = converge(
            INTERVAL,
            10,
            &signal,
            || probe_resource(&lookup, ACCOUNT_ID, false),
            |observed| observed.is_err(),
        )
        .await;

        assert_eq!(outcome, Convergence::Aborted { attempts: 2 });
        assert_eq!(start.elapsed(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_probe_keeps_previous_observation() {
        let mut answers = vec![Probe::Skipped, Probe::Skipped, Probe::Missing("gone".to_string())].into_iter();
        let outcome = converge(
            INTERVAL,
            5,
            &AbortSignal::never(),
            || {
                let next = answers.next().unwrap_or(Probe::Skipped);
                async move { next }
            },
            |observed| observed.is_ok(),
        )
        .await;

        assert_eq!(
            outcome,
            Convergence::Converged { attempts: 1 },
            "the initial observation is Ok"
        );

        let mut answers = vec![Probe::Missing("gone".to_string()), Probe::Skipped].into_iter();
        let outcome = converge(
            INTERVAL,
            3,
            &AbortSignal::never(),
            || {
                let next = answers.next().unwrap_or(Probe::Skipped);
                async move { next }
            },
            |observed| observed.is_ok(),
        )
        .await;

        assert_eq!(
            outcome,
            Convergence::Exhausted {
                attempts: 3,
                last_error: Some("gone".to_string())
            }
        );
    }
}
