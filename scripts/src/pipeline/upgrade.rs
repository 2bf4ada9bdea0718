//! The upgrade engine: swaps the implementation behind every deployed proxy not
//! yet marked upgraded, keeping its address

use std::str::FromStr;

use alloy_primitives::Address;
use tracing::{debug, info, warn};

use super::PassSummary;
use crate::{client::ChainClient, errors::ScriptError, store::StateStore};

/// Run an upgrade pass over `store`. A failing unit is logged and left
/// not upgraded for the next run; the pass itself never fails.
pub async fn upgrade_units<C: ChainClient>(store: &mut StateStore, client: &C) -> PassSummary {
    let mut summary = PassSummary::default();
    for name in store.names() {
        match upgrade_unit(store, client, &name).await {
            Ok(Some(address)) => {
                info!("Upgraded {} at {}", name, address);
                summary.completed.push(name);
            }
            Ok(None) => summary.skipped.push(name),
            Err(e) => {
                let err = e.into_unit_upgrade(&name);
                warn!("{}", err);
                summary.fail(&name, err);
            }
        }
    }

    info!("Upgrade pass finished: {}", summary);
    summary
}

/// Upgrade a single unit, returning its address, or `None` if it is not eligible
async fn upgrade_unit<C: ChainClient>(
    store: &mut StateStore,
    client: &C,
    name: &str,
) -> Result<Option<String>, ScriptError> {
    let unit = store.get(name).ok_or_else(|| ScriptError::UnknownUnit(name.to_string()))?;
    if !unit.deployed || !unit.has_address() || unit.is_upgraded() || unit.is_only_deploy() {
        debug!("{} not eligible for upgrade", name);
        return Ok(None);
    }

    let proxy = Address::from_str(&unit.address)
        .map_err(|e| ScriptError::ContractInteraction(format!("{}: {}", unit.address, e)))?;
    let upgraded = client.upgrade_proxy(proxy, unit.artifact(name)).await?;

    // Keep the recorded spelling of the address when the proxy did not move
    let address = if upgraded.proxy == proxy {
        unit.address.clone()
    } else {
        upgraded.proxy.to_checksum(None)
    };
    if let Some(unit) = store.get_mut(name) {
        unit.mark_upgraded(address.clone(), upgraded.implementation.to_checksum(None));
    }
    Ok(Some(address))
}
