//! File uploads.
//!
//! Files arrive as multipart form posts, are written to an object store, and
//! the resulting URL is returned to the uploader. The uploader relays that URL
//! to the recipient as an ordinary chat message; the server never does.
//!
//! Storage layout (local store): `{data_dir}/uploads/{hash16}-{sanitized_name}`.

pub mod routes;
pub mod store;
