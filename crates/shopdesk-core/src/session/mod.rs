//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: The authenticated identity (`Session`, `Identity`)
//! - `store`: Single owner of the process-wide session (`SessionStore`)
//! - `file`: Persisting the session between runs (`SessionFile`)

mod file;
mod model;
mod store;

// Re-export public API
pub use file::SessionFile;
pub use model::{ANONYMOUS_LEVEL, Identity, Session, UNSET_SHIFT};
pub use store::SessionStore;
