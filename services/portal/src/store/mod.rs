pub mod application;
pub mod events;
pub mod record;
pub mod session;
pub mod state;
pub mod universities;

pub use application::{ApplicationStore, CompletionStatus};
pub use events::{SessionBus, SessionEvent, SessionListener};
pub use record::{
    EducationStore, ExtracurricularStore, FamilyStore, ProfileStore, RecordState, RecordStore,
};
pub use session::{AuthState, SessionController};
pub use state::{Portal, ServerStatus};
pub use universities::UniversitySelection;
