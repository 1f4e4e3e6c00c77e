//! Principal identifiers, redacted token secrets, and the stored credential model.

pub mod id;
pub mod record;
pub mod secret;

pub use id::*;
pub use record::*;
pub use secret::*;
