//! Session persistence for cvtailor.
//!
//! The primary store is a small key/value index with a hard per-property
//! size limit; the blob store absorbs everything larger. [`SessionStore`]
//! composes the two with the offload discipline so callers see a single
//! transparent get/put of whole [`cvt_domain::SessionRecord`]s.

pub mod blob;
pub mod lifecycle;
pub mod primary;
pub mod search;
pub mod store;

pub use blob::{BlobStore, FsBlobStore};
pub use lifecycle::cleanup_expired;
pub use primary::{FilePrimaryStore, PrimaryStore};
pub use search::{SearchHit, SessionIndex};
pub use store::SessionStore;
