pub mod agent;
pub mod config;
pub mod error;
pub mod form;
pub mod store;

pub use agent::{ActivityAgent, AgentResult, HttpActivityAgent};
pub use config::{load_settings, ClientSettings};
pub use error::{AgentError, FormError, StoreError};
pub use form::{ActivityField, ActivityForm, SubmitKind};
pub use store::{ActionPhase, ActivityStore, StoreAction, StoreEvent, StoreSnapshot};
