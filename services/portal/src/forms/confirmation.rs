//! services/portal/src/forms/confirmation.rs
//!
//! The transient "saved" overlay shown after a submit. It closes itself after a
//! fixed delay; when the submit asked to continue, closing by timeout moves on to
//! the next section, while a manual dismissal cancels that navigation.

use pcas_core::sections::Section;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_TITLE: &str = "Information saved successfully!";
pub const DEFAULT_DESCRIPTION: &str = "Your changes have been stored.";

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub title: String,
    pub description: String,
    delay: Duration,
    next: Option<Section>,
    token: CancellationToken,
}

impl Confirmation {
    pub fn new(delay: Duration, next: Option<Section>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            delay,
            next,
            token: CancellationToken::new(),
        }
    }

    /// The section this overlay will navigate to if left alone.
    pub fn next(&self) -> Option<Section> {
        self.next
    }

    pub fn dismiss(&self) {
        self.token.cancel();
    }

    pub fn is_dismissed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when the overlay closes. Yields the section to navigate to, or
    /// `None` if the user dismissed it first or there is nowhere to go.
    pub async fn navigation(&self) -> Option<Section> {
        tokio::select! {
            _ = self.token.cancelled() => {
                debug!("Confirmation dismissed; navigation cancelled");
                None
            }
            _ = tokio::time::sleep(self.delay) => {
                self.token.cancel();
                self.next
            }
        }
    }
}
