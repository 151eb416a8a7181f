//! Shared application state.

use std::sync::Arc;

use sheetgate_client::ConversionClient;
use sheetgate_core::{Config, TokenSigner, UploadPolicy};

use crate::transient::TransientStore;

/// Everything a request needs; cloned cheaply behind an `Arc`.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub policy: UploadPolicy,
    pub engine: ConversionClient,
    pub transient: TransientStore,
    /// Verifies inbound bearer tokens.
    pub signer: TokenSigner,
}
