//! services/portal/src/forms/controller.rs
//!
//! The Form Page Controller, generic over the section record it edits.
//!
//! Mount resolves the values to show through a fixed precedence chain:
//! the record already in the store, then a fresh fetch, then the cached envelope,
//! then built-in defaults. Submit writes the cache first and only then (and only if
//! the section policy allows) the server.

use chrono::{DateTime, Utc};
use pcas_core::domain::{CacheEnvelope, FormValues, SectionRecord, User};
use pcas_core::ports::{PortError, PortResult};
use pcas_core::sections::{FormStatus, Section, SectionPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::forms::confirmation::Confirmation;
use crate::persistence::FormCache;
use crate::store::record::RecordStore;
use crate::store::session::SessionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// A server-confirmed record, already in the store or just fetched.
    Remote,
    Cache,
    Defaults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub values: FormValues,
    pub status: FormStatus,
    pub saved_at: Option<DateTime<Utc>>,
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MountOutcome {
    RedirectToLogin,
    Ready(FormView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    Save,
    SaveAndContinue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSave {
    Saved,
    Failed(String),
    /// The policy kept an incomplete section local.
    Skipped,
}

#[derive(Debug)]
pub struct SubmitOutcome {
    pub values: FormValues,
    pub status: FormStatus,
    pub cached: bool,
    pub remote: RemoteSave,
    /// Present when something was stored and nothing failed.
    pub confirmation: Option<Confirmation>,
}

pub struct FormController<R: SectionRecord> {
    store: Arc<RecordStore<R>>,
    session: Arc<SessionController>,
    forms: FormCache,
    policy: SectionPolicy,
    confirmation_delay: Duration,
}

impl<R: SectionRecord> FormController<R> {
    pub fn new(
        store: Arc<RecordStore<R>>,
        session: Arc<SessionController>,
        forms: FormCache,
        policy: SectionPolicy,
        confirmation_delay: Duration,
    ) -> Self {
        Self {
            store,
            session,
            forms,
            policy,
            confirmation_delay,
        }
    }

    pub fn section(&self) -> Section {
        R::SECTION
    }

    pub fn policy(&self) -> &SectionPolicy {
        &self.policy
    }

    pub async fn mount(&self) -> MountOutcome {
        let user = match self.session.user() {
            Some(user) if self.session.is_authenticated() => user,
            _ => return MountOutcome::RedirectToLogin,
        };
        MountOutcome::Ready(self.resolve(&user).await)
    }

    async fn resolve(&self, user: &User) -> FormView {
        if let Some(record) = self.store.data() {
            return self.remote_view(&record);
        }

        match self.store.fetch().await {
            Ok(Some(record)) => return self.remote_view(&record),
            Ok(None) => debug!(section = %R::SECTION, "No saved record on the server"),
            Err(e) => warn!(section = %R::SECTION, "Falling back to local data: {}", e),
        }

        if let Some(envelope) = self.forms.load(R::SECTION, &user.id, Utc::now()) {
            return FormView {
                values: envelope.values,
                status: envelope.status,
                saved_at: envelope.saved_at,
                source: DataSource::Cache,
            };
        }

        FormView {
            values: R::defaults(user),
            status: FormStatus::NotStarted,
            saved_at: None,
            source: DataSource::Defaults,
        }
    }

    fn remote_view(&self, record: &R) -> FormView {
        let values = record.to_values();
        FormView {
            status: self.policy.status_for(&values),
            saved_at: self.store.snapshot().last_saved,
            values,
            source: DataSource::Remote,
        }
    }

    /// Merges `fields` over `current` and stores the result.
    ///
    /// Fails only when nobody is signed in. Remote failures are reported in the
    /// outcome and on the store's error, never as an `Err`.
    pub async fn submit(
        &self,
        current: &FormValues,
        fields: FormValues,
        action: SubmitAction,
    ) -> PortResult<SubmitOutcome> {
        let user = self
            .session
            .user()
            .ok_or_else(|| PortError::Unauthorized("Not signed in".to_string()))?;

        let mut values = current.clone();
        values.extend(fields);
        let status = self.policy.status_for(&values);

        let envelope = CacheEnvelope::new(values.clone(), status, Utc::now());
        let cached = self.forms.save(R::SECTION, &user.id, &envelope);

        let remote = if self.policy.should_save_remotely(&values) {
            match R::request_from_values(&values) {
                Ok(request) => match self.store.save(&request).await {
                    Ok(_) => RemoteSave::Saved,
                    Err(e) => RemoteSave::Failed(e.to_string()),
                },
                Err(e) => {
                    warn!(section = %R::SECTION, "Could not build a save request: {}", e);
                    self.store.set_error(e.to_string());
                    RemoteSave::Failed(e.to_string())
                }
            }
        } else {
            debug!(section = %R::SECTION, %status, "Incomplete section kept local");
            RemoteSave::Skipped
        };
        info!(section = %R::SECTION, %status, cached, ?remote, "Form submitted");

        let stored = cached || remote == RemoteSave::Saved;
        let failed = matches!(remote, RemoteSave::Failed(_));
        let confirmation = (stored && !failed).then(|| {
            let next = match action {
                SubmitAction::Save => None,
                SubmitAction::SaveAndContinue => R::SECTION.next(),
            };
            Confirmation::new(self.confirmation_delay, next)
        });

        Ok(SubmitOutcome {
            values,
            status,
            cached,
            remote,
            confirmation,
        })
    }
}
