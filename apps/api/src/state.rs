use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;
use uuid::Uuid;

use crate::assessment::skills::{default_categories, SkillCategory};
use crate::assessment::wizard::StepWizardController;
use crate::config::Config;
use crate::submission::controller::SubmissionController;
use crate::submission::feedback::{AnalysisPolicy, FeedbackGenerator, MockFeedbackGenerator};
use crate::submission::intake::{FileIntake, FormatIntake};
use crate::submission::models::{sample_assignment, Assignment};

/// In-memory flow sessions keyed by an opaque id. Each entry is one UI flow;
/// nothing outlives the process, and entries idle for longer than the TTL are
/// evicted by `start_cleanup_task`.
pub struct SessionStore<T> {
    inner: Arc<RwLock<HashMap<Uuid, Entry<T>>>>,
}

struct Entry<T> {
    value: Arc<Mutex<T>>,
    last_activity: Instant,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SessionStore<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> SessionStore<T> {
    pub async fn insert(&self, value: T) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.insert(
            id,
            Entry {
                value: Arc::new(Mutex::new(value)),
                last_activity: Instant::now(),
            },
        );
        id
    }

    /// Looks up a session and marks it active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<T>>> {
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_activity = Instant::now();
        Some(Arc::clone(&entry.value))
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Mutex<T>>> {
        self.inner.write().await.remove(&id).map(|e| e.value)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drops every session idle for longer than `ttl`. Returns how many went.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_activity) <= ttl);
        before - sessions.len()
    }
}

impl<T: Send + 'static> SessionStore<T> {
    /// Spawns the periodic idle sweep. Runs for the life of the process.
    pub fn start_cleanup_task(&self, kind: &'static str, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = (ttl / 4).max(MIN_CLEANUP_INTERVAL);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let evicted = store.evict_idle(ttl).await;
                if evicted > 0 {
                    let remaining = store.len().await;
                    info!(kind, evicted, remaining, "Evicted idle sessions");
                }
            }
        })
    }
}

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub categories: Arc<Vec<SkillCategory>>,
    pub assignment: Arc<Assignment>,
    pub assessments: SessionStore<StepWizardController>,
    pub submissions: SessionStore<SubmissionController>,
    /// Pluggable feedback backend. Default: MockFeedbackGenerator.
    pub feedback: Arc<dyn FeedbackGenerator>,
    pub intake: Arc<dyn FileIntake>,
    pub analysis_policy: AnalysisPolicy,
}

impl AppState {
    /// Default wiring: built-in skill categories, the sample assignment, the mock
    /// feedback backend and extension-based intake.
    pub fn from_config(config: Config) -> Self {
        let assignment = sample_assignment();
        let intake = FormatIntake::new(&assignment.submission_formats, config.max_upload_bytes);
        Self {
            categories: Arc::new(default_categories()),
            assignment: Arc::new(assignment),
            assessments: SessionStore::default(),
            submissions: SessionStore::default(),
            feedback: Arc::new(MockFeedbackGenerator::new(config.analysis_delay())),
            intake: Arc::new(intake),
            analysis_policy: config.analysis_policy(),
            config,
        }
    }

    /// Starts idle eviction for both session kinds.
    pub fn start_cleanup_tasks(&self) {
        let ttl = self.config.session_ttl();
        self.assessments.start_cleanup_task("assessment", ttl);
        self.submissions.start_cleanup_task("submission", ttl);
    }
}
