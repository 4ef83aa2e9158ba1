//! imgreg Common Library
//!
//! The image registration contract shared by the page server and the
//! end-to-end suite: records, form validation, origin-scoped local storage,
//! and the registrar that ties them together.

pub mod error;
pub mod form;
pub mod registry;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use form::{Rejection, RegistrationForm, Validity};
pub use registry::{Registrar, RegistrationStore, SubmitOutcome};
pub use storage::{LocalStorage, StorageArea, StorageSnapshot};
pub use types::*;

/// imgreg version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
