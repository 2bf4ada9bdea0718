//! The verification sweep

use std::str::FromStr;

use alloy_primitives::Address;
use tracing::{debug, info};

use super::PassSummary;
use crate::{
    client::SourceVerifier, errors::ScriptError, placeholder::resolve_known_addresses,
    store::StateStore,
};

/// Submit every unit with a known address and no `verified` flag for source
/// verification, marking each as verified once accepted. Proxied units are
/// verified at their implementation.
///
/// The first rejection ends the sweep; units verified before it stay marked in
/// `store`.
pub async fn verify_units<V: SourceVerifier>(
    store: &mut StateStore,
    verifier: &V,
) -> Result<PassSummary, ScriptError> {
    resolve_known_addresses(store.units_mut());

    let mut summary = PassSummary::default();
    for name in store.names() {
        let Some(unit) = store.get(&name) else { continue };
        let (address, constructor_args) = match unit.verification_target() {
            Some(target) if !unit.verified => target,
            _ => {
                debug!("{} already verified or without address", name);
                summary.skipped.push(name);
                continue;
            }
        };

        let parsed = Address::from_str(address)
            .map_err(|e| ScriptError::Verification(format!("{}: {}", name, e)))?;
        let contract = unit.contract_name.as_deref().unwrap_or(&name);
        verifier
            .verify(contract, parsed, constructor_args)
            .await
            .map_err(|e| ScriptError::Verification(format!("{}: {}", name, e)))?;

        info!("Verified {} at {}", name, address);
        if let Some(unit) = store.get_mut(&name) {
            unit.verified = true;
        }
        summary.completed.push(name);
    }

    info!("Verification sweep finished: {}", summary);
    Ok(summary)
}
