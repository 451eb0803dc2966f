//! services/portal/src/store/application.rs
//!
//! The Aggregate Application Store: a read model over the four section stores.

use chrono::{DateTime, Utc};
use pcas_core::domain::ApplicationData;
use pcas_core::ports::{ApiGateway, HttpMethod, PortResult};
use pcas_core::sections::Section;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{info, warn};

use crate::store::events::{SessionBus, SessionEvent, SessionListener};
use crate::store::record::{EducationStore, ExtracurricularStore, FamilyStore, ProfileStore};

const ALL_PATH: &str = "/api/application/all";

/// Which sections currently hold a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStatus {
    pub profile: bool,
    pub family: bool,
    pub education: bool,
    pub extracurricular: bool,
}

impl CompletionStatus {
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Profile => self.profile,
            Section::Family => self.family,
            Section::Education => self.education,
            Section::Extracurricular => self.extracurricular,
        }
    }

    pub fn completed_count(&self) -> usize {
        Section::ALL.iter().filter(|s| self.get(**s)).count()
    }

    /// Whole-number percentage of sections present.
    pub fn percentage(&self) -> u8 {
        // At most 4 * 100 / 4, so the cast cannot truncate.
        (self.completed_count() * 100 / Section::ALL.len()) as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_synced: Option<DateTime<Utc>>,
}

pub struct ApplicationStore {
    gateway: Arc<dyn ApiGateway>,
    pub profile: Arc<ProfileStore>,
    pub family: Arc<FamilyStore>,
    pub education: Arc<EducationStore>,
    pub extracurricular: Arc<ExtracurricularStore>,
    state: Mutex<AggregateState>,
}

impl ApplicationStore {
    /// Builds the four section stores and the aggregate, all subscribed to `bus`.
    pub fn new(gateway: Arc<dyn ApiGateway>, bus: &SessionBus) -> Arc<Self> {
        let store = Arc::new(Self {
            profile: ProfileStore::new(gateway.clone(), bus),
            family: FamilyStore::new(gateway.clone(), bus),
            education: EducationStore::new(gateway.clone(), bus),
            extracurricular: ExtracurricularStore::new(gateway.clone(), bus),
            gateway,
            state: Mutex::new(AggregateState::default()),
        });
        let listener: Weak<dyn SessionListener> = Arc::downgrade(&store) as Weak<dyn SessionListener>;
        bus.subscribe(listener);
        store
    }

    pub fn snapshot(&self) -> AggregateState {
        self.lock().clone()
    }

    /// Loads every section in one request and seeds all four stores together.
    pub async fn fetch_all(&self) -> PortResult<ApplicationData> {
        {
            let mut state = self.lock();
            state.is_loading = true;
            state.error = None;
        }
        let result = self
            .gateway
            .request(HttpMethod::Get, ALL_PATH, None)
            .await
            .and_then(|envelope| envelope.data_as::<ApplicationData>());

        let mut state = self.lock();
        state.is_loading = false;
        match &result {
            Ok(data) => {
                self.profile.set_local(data.profile.clone());
                self.family.set_local(data.family.clone());
                self.education.set_local(data.education.clone());
                self.extracurricular.set_local(data.extracurricular.clone());
                state.last_synced = Some(Utc::now());
                state.error = None;
                info!("Synchronised all application sections");
            }
            Err(e) => {
                warn!("Fetching the full application failed: {}", e);
                state.error = Some(e.to_string());
            }
        }
        result
    }

    pub fn completion_status(&self) -> CompletionStatus {
        CompletionStatus {
            profile: self.profile.has_record(),
            family: self.family.has_record(),
            education: self.education.has_record(),
            extracurricular: self.extracurricular.has_record(),
        }
    }

    pub fn completion_percentage(&self) -> u8 {
        self.completion_status().percentage()
    }

    pub fn is_section_complete(&self, section: Section) -> bool {
        self.completion_status().get(section)
    }

    pub fn reset(&self) {
        *self.lock() = AggregateState::default();
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionListener for ApplicationStore {
    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::LoggedOut => self.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::none(CompletionStatus::default(), 0)]
    #[case::one(CompletionStatus { profile: true, ..Default::default() }, 25)]
    #[case::three(CompletionStatus { profile: true, family: true, education: true, extracurricular: false }, 75)]
    #[case::all(CompletionStatus { profile: true, family: true, education: true, extracurricular: true }, 100)]
    fn percentage_counts_present_sections(#[case] status: CompletionStatus, #[case] expected: u8) {
        assert_eq!(status.percentage(), expected);
    }
}
