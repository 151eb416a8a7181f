//! Conversion engine client.
//!
//! `EndpointResolver` produces the ordered candidate list and remembers the
//! last engine that worked; `ConversionClient` delivers one upload by trying
//! those candidates strictly in order until one returns a usable payload.

pub mod engine;
pub mod error;
pub mod resolver;

pub use engine::ConversionClient;
pub use error::ClientError;
pub use resolver::{
    normalize_base_url, EndpointResolver, FilePreferenceStore, MemoryPreferenceStore,
    PreferenceStore,
};
