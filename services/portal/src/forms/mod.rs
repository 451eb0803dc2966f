pub mod confirmation;
pub mod controller;

pub use confirmation::Confirmation;
pub use controller::{
    DataSource, FormController, FormView, MountOutcome, RemoteSave, SubmitAction, SubmitOutcome,
};
