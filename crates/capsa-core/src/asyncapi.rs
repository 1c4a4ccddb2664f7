//! Thin async off-load of the synchronous builder/opener (§5, §12). The core
//! itself never suspends; these wrappers exist purely so a caller on a
//! `tokio` runtime doesn't block its executor on RSA/AES work.

use rsa::{RsaPrivateKey, RsaPublicKey};
use tokio::task;

use crate::builder::{BuiltCapsa, CapsaBuilder, PartyKey};
use crate::error::{CapsaError, Result};
use crate::model::Capsa;
use crate::opener::OpenedCapsa;

/// Run `builder.build(..)` on a blocking-friendly worker thread.
pub async fn build_async(
    builder: CapsaBuilder,
    creator_private_key: RsaPrivateKey,
    party_keys: Vec<PartyKey>,
) -> Result<BuiltCapsa> {
    task::spawn_blocking(move || builder.build(&creator_private_key, party_keys))
        .await
        .map_err(|e| CapsaError::Argument(format!("build task panicked: {e}")))?
}

/// Run `OpenedCapsa::open(..)` on a blocking-friendly worker thread.
pub async fn open_async(
    envelope: Capsa,
    recipient_private_key: RsaPrivateKey,
    party_id: Option<String>,
    creator_public_key: Option<RsaPublicKey>,
    verify_signature: bool,
) -> Result<OpenedCapsa> {
    task::spawn_blocking(move || {
        OpenedCapsa::open(
            envelope,
            &recipient_private_key,
            party_id.as_deref(),
            creator_public_key.as_ref(),
            verify_signature,
        )
    })
    .await
    .map_err(|e| CapsaError::Argument(format!("open task panicked: {e}")))?
}
