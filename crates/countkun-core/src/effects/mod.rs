//! Effect traits for the store's external collaborators
//!
//! The store never reaches for ambient state: the shared document, the wall
//! clock and the sign-in gate are all injected through these traits.
//!
//! - [`DocumentStoreEffects`]: durable, subscribable, versioned document store
//! - [`PhysicalTimeEffects`]: wall-clock milliseconds and sleeping
//! - [`AuthorizationEffects`]: signed-in / signed-out signal
//!
//! Handlers live in `countkun-effects`.

pub mod authorization;
pub mod document;
pub mod time;

pub use authorization::{AuthState, AuthorizationEffects};
pub use document::{
    DocumentError, DocumentEvent, DocumentStoreEffects, DocumentStream, VersionedDocument,
};
pub use time::{PhysicalTimeEffects, TimeError};
