//! services/portal/src/store/state.rs
//!
//! Defines `Portal`, the shared state created once at startup: one gateway, one
//! cache, one session bus, and every store wired to them.

use pcas_core::domain::{Education, Extracurricular, Family, Profile, SectionRecord};
use pcas_core::ports::{ApiGateway, LocalCache};
use pcas_core::sections::SectionPolicy;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{FileCache, HttpGateway};
use crate::config::Config;
use crate::error::PortalError;
use crate::forms::FormController;
use crate::persistence::FormCache;
use crate::store::application::ApplicationStore;
use crate::store::events::SessionBus;
use crate::store::record::RecordStore;
use crate::store::session::SessionController;
use crate::store::universities::UniversitySelection;

/// What the status widget shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Online,
    Offline(String),
}

#[derive(Clone)]
pub struct Portal {
    pub config: Arc<Config>,
    pub gateway: Arc<dyn ApiGateway>,
    pub cache: Arc<dyn LocalCache>,
    pub bus: SessionBus,
    pub session: Arc<SessionController>,
    pub application: Arc<ApplicationStore>,
    pub universities: Arc<UniversitySelection>,
    pub forms: FormCache,
}

impl Portal {
    /// Builds the real adapters: a file-backed cache and the HTTP gateway.
    pub fn from_config(config: Config) -> Result<Self, PortalError> {
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::open(&config.cache_path)?);
        let gateway: Arc<dyn ApiGateway> =
            Arc::new(HttpGateway::new(config.api_base_url.clone(), cache.clone())?);
        info!(base_url = %config.api_base_url, cache = %config.cache_path.display(), "Adapters ready");
        Ok(Self::with_adapters(gateway, cache, config))
    }

    pub fn with_adapters(
        gateway: Arc<dyn ApiGateway>,
        cache: Arc<dyn LocalCache>,
        config: Config,
    ) -> Self {
        let bus = SessionBus::new();
        let session = Arc::new(SessionController::new(
            gateway.clone(),
            cache.clone(),
            bus.clone(),
        ));
        let application = ApplicationStore::new(gateway.clone(), &bus);
        let universities = Arc::new(UniversitySelection::new(cache.clone()));
        let forms = FormCache::new(cache.clone(), config.cache_max_age);

        Self {
            config: Arc::new(config),
            gateway,
            cache,
            bus,
            session,
            application,
            universities,
            forms,
        }
    }

    pub async fn server_status(&self) -> ServerStatus {
        match self.gateway.health().await {
            Ok(()) => ServerStatus::Online,
            Err(e) => {
                warn!("Health check failed: {}", e);
                ServerStatus::Offline(e.to_string())
            }
        }
    }

    pub fn profile_form(&self) -> FormController<Profile> {
        self.form(&self.application.profile)
    }

    pub fn family_form(&self) -> FormController<Family> {
        self.form(&self.application.family)
    }

    pub fn education_form(&self) -> FormController<Education> {
        self.form(&self.application.education)
    }

    pub fn extracurricular_form(&self) -> FormController<Extracurricular> {
        self.form(&self.application.extracurricular)
    }

    fn form<R: SectionRecord>(&self, store: &Arc<RecordStore<R>>) -> FormController<R> {
        let policy = SectionPolicy::new(R::SECTION, self.config.label_scheme)
            .with_save_incomplete(self.config.save_incomplete);
        FormController::new(
            store.clone(),
            self.session.clone(),
            self.forms.clone(),
            policy,
            self.config.confirmation_delay,
        )
    }
}
