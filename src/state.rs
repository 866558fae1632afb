//! Application state: backend handles, config, and the id generator.
//!
//! Nothing in here is global; handlers receive `Arc<AppState>` and pass the pieces they
//! need into `logic`, `transform`, `import` and `scoring` explicitly.
//!
//! Backend selection: SUPABASE_URL + SUPABASE_KEY select the hosted backend. Otherwise an
//! in-memory backend is built and seeded with the demo quiz and the config bank.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::backend::memory::{MemoryBlobs, MemoryStore, StaticIdentity};
use crate::backend::supabase::Supabase;
use crate::backend::Backend;
use crate::config::{load_config_from_env, AppConfig};
use crate::domain::User;
use crate::ids::{IdGen, UuidIds};
use crate::scoring::EmptyPolicy;
use crate::seeds::{bank_quizzes, demo_quiz};
use crate::transform::disassemble_quiz;

#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    pub config: AppConfig,
    pub ids: Arc<dyn IdGen>,
}

impl AppState {
    /// Build state from env: load config, pick backend, seed in-memory content.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_config_from_env();
        let ids: Arc<dyn IdGen> = Arc::new(UuidIds);

        let backend = match Supabase::from_env(&config.storage.bucket) {
            Some(sb) => {
                info!(target: "persona_quiz", base_url = %sb.base_url, bucket = %sb.bucket, "Hosted backend enabled.");
                if !config.bank.is_empty() {
                    warn!(target: "persona_quiz", bank = config.bank.len(), "Config bank is only loaded into the in-memory backend; ignoring.");
                }
                let sb = Arc::new(sb);
                Backend { records: sb.clone(), blobs: sb.clone(), identity: sb, label: "supabase" }
            }
            None => {
                info!(target: "persona_quiz", "Hosted backend not in use (SUPABASE_URL/SUPABASE_KEY unset or client failed). Using in-memory store.");
                Self::memory_backend(&config, ids.as_ref())
            }
        };

        Self { backend, config, ids }
    }

    /// In-memory backend seeded with the demo quiz and the config bank.
    pub fn memory_backend(config: &AppConfig, ids: &dyn IdGen) -> Backend {
        let mut quizzes = vec![demo_quiz(ids)];
        quizzes.extend(bank_quizzes(&config.bank, ids));

        let mut sets = Vec::with_capacity(quizzes.len());
        for q in &quizzes {
            match disassemble_quiz(q, ids) {
                Ok(set) => sets.push(set),
                Err(e) => error!(target: "quiz", slug = %q.slug, error = %e, "Seed quiz rejected"),
            }
        }
        info!(target: "quiz", seeded = sets.len(), "Startup quiz inventory");

        let users = config.dev_users.iter().map(|u| {
            (u.token.clone(), User { id: u.id.clone(), email: u.email.clone() })
        });
        Backend {
            records: Arc::new(MemoryStore::with_records(sets)),
            blobs: Arc::new(MemoryBlobs::new(config.storage.public_base_url.clone())),
            identity: Arc::new(StaticIdentity::new(users)),
            label: "memory",
        }
    }

    /// Explicit construction, used by tests.
    pub fn with_backend(backend: Backend, config: AppConfig, ids: Arc<dyn IdGen>) -> Self {
        Self { backend, config, ids }
    }

    pub fn empty_policy(&self) -> EmptyPolicy {
        self.config.scoring.empty_policy()
    }
}
