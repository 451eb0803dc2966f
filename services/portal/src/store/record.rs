//! services/portal/src/store/record.rs
//!
//! The Domain Record Store: one generic in-memory container per application
//! section, holding the server-confirmed record plus its loading, error and dirty
//! flags. Instantiated once per `SectionRecord` type.

use chrono::{DateTime, Utc};
use pcas_core::domain::{Education, Extracurricular, Family, Profile, SectionRecord};
use pcas_core::ports::{ApiGateway, HttpMethod, PortError, PortResult};
use pcas_core::sections::Section;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

use crate::store::events::{SessionBus, SessionEvent, SessionListener};

pub type ProfileStore = RecordStore<Profile>;
pub type FamilyStore = RecordStore<Family>;
pub type EducationStore = RecordStore<Education>;
pub type ExtracurricularStore = RecordStore<Extracurricular>;

//=========================================================================================
// State
//=========================================================================================

/// A snapshot of one section's store.
///
/// `is_loading` is only true between a dispatched fetch/save and its settle.
/// `error` is cleared when an attempt starts, never by a success alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordState<R> {
    pub data: Option<R>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_saved: Option<DateTime<Utc>>,
    pub is_dirty: bool,
}

impl<R> Default for RecordState<R> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
            last_saved: None,
            is_dirty: false,
        }
    }
}

//=========================================================================================
// Store
//=========================================================================================

pub struct RecordStore<R: SectionRecord> {
    gateway: Arc<dyn ApiGateway>,
    state: Mutex<RecordState<R>>,
}

impl<R: SectionRecord> RecordStore<R> {
    /// Creates the store and subscribes it to logout broadcasts on `bus`.
    pub fn new(gateway: Arc<dyn ApiGateway>, bus: &SessionBus) -> Arc<Self> {
        let store = Arc::new(Self {
            gateway,
            state: Mutex::new(RecordState::default()),
        });
        let listener: Weak<dyn SessionListener> = Arc::downgrade(&store) as Weak<dyn SessionListener>;
        bus.subscribe(listener);
        store
    }

    pub fn section(&self) -> Section {
        R::SECTION
    }

    pub fn snapshot(&self) -> RecordState<R> {
        self.lock().clone()
    }

    pub fn data(&self) -> Option<R> {
        self.lock().data.clone()
    }

    pub fn has_record(&self) -> bool {
        self.lock().data.is_some()
    }

    /// Loads the record from the server. `Ok(None)` means the server has none yet.
    pub async fn fetch(&self) -> PortResult<Option<R>> {
        self.begin();
        let result = self
            .request_record(HttpMethod::Get, R::SECTION.fetch_path(), None)
            .await;

        let mut state = self.lock();
        state.is_loading = false;
        match &result {
            Ok(record) => {
                state.data = record.clone();
                state.is_dirty = false;
                state.error = None;
            }
            Err(e) => {
                warn!(section = %R::SECTION, "Fetch failed: {}", e);
                state.error = Some(e.to_string());
            }
        }
        result
    }

    /// Creates or updates the record on the server.
    pub async fn save(&self, request: &R::Request) -> PortResult<R> {
        let body = serde_json::to_value(request)
            .map_err(|e| PortError::InvalidInput(format!("could not encode request: {}", e)))?;

        self.begin();
        let result = self
            .request_record(HttpMethod::Post, R::SECTION.save_path(), Some(body))
            .await
            .and_then(|record| {
                record.ok_or_else(|| {
                    PortError::Unexpected(format!("server returned no {} record", R::SECTION))
                })
            });

        let mut state = self.lock();
        state.is_loading = false;
        match &result {
            Ok(record) => {
                debug!(section = %R::SECTION, "Saved record");
                state.data = Some(record.clone());
                state.is_dirty = false;
                state.last_saved = Some(Utc::now());
                state.error = None;
            }
            Err(e) => {
                warn!(section = %R::SECTION, "Save failed: {}", e);
                state.error = Some(e.to_string());
            }
        }
        result
    }

    /// Seeds the record without implying a pending remote write.
    pub fn set_local(&self, record: Option<R>) {
        let mut state = self.lock();
        state.data = record;
        state.is_dirty = false;
    }

    /// Shallow-merges `partial` (camelCase field names) into the current record.
    ///
    /// Does nothing while no record is loaded. A merge that would not decode as a
    /// record is rejected and leaves the state untouched.
    pub fn update_field(&self, partial: Map<String, Value>) -> PortResult<()> {
        let mut state = self.lock();
        let Some(current) = state.data.as_ref() else {
            return Ok(());
        };

        let mut merged = match serde_json::to_value(current) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(PortError::Unexpected(e.to_string())),
        };
        merged.extend(partial);
        let record: R = serde_json::from_value(Value::Object(merged))
            .map_err(|e| PortError::InvalidInput(format!("invalid {} field: {}", R::SECTION, e)))?;

        state.data = Some(record);
        state.is_dirty = true;
        Ok(())
    }

    /// Records a failure that happened before any request was sent.
    pub fn set_error(&self, message: impl Into<String>) {
        self.lock().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    /// Marks local state as matching the server.
    pub fn mark_as_clean(&self) {
        let mut state = self.lock();
        state.is_dirty = false;
        state.last_saved = Some(Utc::now());
    }

    pub fn reset(&self) {
        *self.lock() = RecordState::default();
    }

    /// Full reinitialisation; what the logout broadcast triggers.
    pub fn clear_all(&self) {
        self.reset();
        debug!(section = %R::SECTION, "Cleared record store");
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.is_loading = true;
        state.error = None;
    }

    async fn request_record(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
    ) -> PortResult<Option<R>> {
        let envelope = self.gateway.request(method, path, body).await?;
        envelope.field::<Option<R>>(R::SECTION.data_key())
    }

    fn lock(&self) -> MutexGuard<'_, RecordState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: SectionRecord> SessionListener for RecordStore<R> {
    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::LoggedOut => self.clear_all(),
        }
    }
}
