#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adgate::auth::{
    credentials::AdvertiserCredentialStore,
    orchestrator::{AuthorizationOrchestrator, OrchestratorSettings},
    state::OAuthStateStore,
};
use adgate::cache::MemoryStateCache;
use adgate::clock::ManualTimeProvider;
use adgate::error::ProviderError;
use adgate::models::credential::CredentialTokens;
use adgate::platform::{AdPlatformOAuth, TokenGrant};
use adgate::repos::sqlite::SqliteRepo;
use async_trait::async_trait;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "test-signing-secret-0123456789abcdef";

pub struct TestDb {
    pub _dir: TempDir,
    pub url: String,
    pub repo: Arc<SqliteRepo>,
}

pub fn init_test_db() -> anyhow::Result<TestDb> {
    let dir = TempDir::new()?;
    let url = dir.path().join("test.sqlite").display().to_string();
    let pool = adgate::db::sqlite::open(&url)?;
    Ok(TestDb { _dir: dir, url, repo: SqliteRepo::new(pool) })
}

/// How the fake platform answers refresh calls.
#[derive(Clone)]
pub enum RefreshBehavior {
    Succeed,
    Reject,
    Unavailable,
    Hang,
}

/// In-process stand-in for the ad platform. Each refresh mints `access-N` /
/// `refresh-N` from a counter so callers can tell grants apart.
pub struct FakePlatform {
    pub refresh_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub behavior: Mutex<RefreshBehavior>,
    pub advertiser_ids: Vec<i64>,
    pub delay: Duration,
}

impl FakePlatform {
    pub fn new(advertiser_ids: Vec<i64>) -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            behavior: Mutex::new(RefreshBehavior::Succeed),
            advertiser_ids,
            delay: Duration::from_millis(20),
        })
    }

    pub fn set_behavior(&self, b: RefreshBehavior) {
        *self.behavior.lock().unwrap() = b;
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdPlatformOAuth for FakePlatform {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://platform.test/oauth?app_id=1&state={state}")
    }

    async fn exchange_code(&self, auth_code: &str) -> Result<TokenGrant, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        if auth_code == "bad-code" {
            return Err(ProviderError::Rejected { code: 40102, message: "auth_code invalid".into() });
        }
        Ok(TokenGrant {
            access_token: format!("access-{auth_code}"),
            refresh_token: format!("refresh-{auth_code}"),
            expires_in: 86_400,
            refresh_token_expires_in: 30 * 86_400,
            advertiser_ids: self.advertiser_ids.clone(),
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            RefreshBehavior::Succeed => {
                tokio::time::sleep(self.delay).await;
                Ok(TokenGrant {
                    access_token: format!("access-{n}"),
                    refresh_token: format!("refresh-{n}"),
                    expires_in: 86_400,
                    refresh_token_expires_in: 30 * 86_400,
                    advertiser_ids: vec![],
                })
            }
            RefreshBehavior::Reject => Err(ProviderError::Rejected { code: 40107, message: "refresh_token expired".into() }),
            RefreshBehavior::Unavailable => Err(ProviderError::Unavailable("platform returned 502".into())),
            RefreshBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("timeout should fire first")
            }
        }
    }
}

pub struct Harness {
    pub db: TestDb,
    pub clock: ManualTimeProvider,
    pub platform: Arc<FakePlatform>,
    pub orchestrator: Arc<AuthorizationOrchestrator>,
}

pub fn harness(advertiser_ids: Vec<i64>) -> Harness {
    let db = init_test_db().expect("test db");
    let clock = ManualTimeProvider::starting_now();
    let platform = FakePlatform::new(advertiser_ids);
    let orchestrator = orchestrator_with(&db, &clock, platform.clone(), Duration::from_millis(200));
    Harness { db, clock, platform, orchestrator }
}

/// Orchestrator over an in-memory state cache and the test database.
pub fn orchestrator_with(
    db: &TestDb,
    clock: &ManualTimeProvider,
    platform: Arc<dyn AdPlatformOAuth>,
    provider_timeout: Duration,
) -> Arc<AuthorizationOrchestrator> {
    let cache = Arc::new(MemoryStateCache::new(Arc::new(clock.clone())));
    let states = OAuthStateStore::new(cache, Arc::new(clock.clone()), "oauth:state:");
    Arc::new(AuthorizationOrchestrator::new(
        states,
        AdvertiserCredentialStore::new(db.repo.clone()),
        platform,
        Arc::new(clock.clone()),
        OrchestratorSettings {
            provider_timeout,
            refresh_skew: chrono::Duration::minutes(5),
        },
    ))
}

pub fn tokens(tag: &str, expires_at: chrono::DateTime<chrono::Utc>) -> CredentialTokens {
    CredentialTokens {
        access_token: format!("access-{tag}"),
        refresh_token: format!("refresh-{tag}"),
        token_expires_at: expires_at,
        refresh_token_expires_at: None,
    }
}
