//! The deployment engine: creates every unit not yet deployed, in declaration
//! order, feeding each new address into the arguments of the units after it

use indexmap::IndexMap;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::PassSummary;
use crate::{
    client::ChainClient,
    errors::ScriptError,
    placeholder::{analyze_units, resolve_known_addresses, resolve_unit_args, UnitRef},
    store::StateStore,
    types::{ConfirmationPolicy, DeployFlavor, FailurePolicy, Unit},
};

/// Run a deployment pass over `store`.
///
/// Already deployed units are skipped. Under [`FailurePolicy::Abort`] the first
/// failing unit ends the pass with [`ScriptError::UnitDeploy`]; the units
/// deployed before it remain recorded in `store`.
pub async fn deploy_units<C: ChainClient>(
    store: &mut StateStore,
    client: &C,
    flavor: DeployFlavor,
    on_error: FailurePolicy,
    confirmation: &ConfirmationPolicy,
) -> Result<PassSummary, ScriptError> {
    info!("Deploying {} units from {}", store.units().len(), store.path().display());

    let resolved = resolve_known_addresses(store.units_mut());
    debug!("Resolved {} placeholders from recorded addresses", resolved);
    for issue in analyze_units(store.units()) {
        warn!("{}", issue);
    }

    let mut summary = PassSummary::default();
    for name in store.names() {
        match deploy_unit(store, client, &name, flavor, confirmation).await {
            Ok(Some(address)) => {
                info!("Deployed {} at {}", name, address);
                summary.completed.push(name);
            }
            Ok(None) => summary.skipped.push(name),
            Err(e) => {
                let err = e.into_unit_deploy(&name);
                if on_error == FailurePolicy::Abort {
                    return Err(err);
                }
                warn!("{}", err);
                summary.fail(&name, err);
            }
        }
    }

    for (name, target) in pending_refs(store.units()) {
        warn!("{} was not deployed, it still waits on {}", name, target);
    }
    info!("Deployment pass finished: {}", summary);
    Ok(summary)
}

/// Deploy a single unit, returning its new address, or `None` if it already exists
async fn deploy_unit<C: ChainClient>(
    store: &mut StateStore,
    client: &C,
    name: &str,
    flavor: DeployFlavor,
    confirmation: &ConfirmationPolicy,
) -> Result<Option<String>, ScriptError> {
    let unit = store.get(name).ok_or_else(|| ScriptError::UnknownUnit(name.to_string()))?;
    if unit.deployed {
        info!("{} exists at {}", name, unit.address);
        return Ok(None);
    }

    let contract = unit.artifact(name);
    let address = if flavor == DeployFlavor::Proxy && !unit.is_only_deploy() {
        sleep(confirmation.submit_pause).await;
        let deployment = client.deploy_proxy(contract, unit.upgrade_args()).await?;
        let address = deployment.proxy.to_checksum(None);
        let implementation = deployment.implementation.to_checksum(None);
        debug!("{} proxies {}", address, implementation);
        if let Some(unit) = store.get_mut(name) {
            unit.mark_proxied(address.clone(), implementation);
        }
        address
    } else {
        let address = client.deploy(contract, unit.constructor_args()).await?.to_checksum(None);
        if let Some(unit) = store.get_mut(name) {
            unit.mark_deployed(address.clone());
        }
        address
    };

    let resolved = resolve_unit_args(store.units_mut(), name, &address);
    debug!("Substituted {} into {} argument slots", name, resolved);
    Ok(Some(address))
}

/// The exact placeholder references held by undeployed units whose target
/// has no address yet
fn pending_refs(units: &IndexMap<String, Unit>) -> Vec<(String, UnitRef)> {
    units
        .iter()
        .filter(|(_, u)| !u.deployed)
        .flat_map(|(name, u)| {
            u.constructor_args()
                .iter()
                .chain(u.upgrade_args())
                .filter_map(|arg| arg.as_str().and_then(UnitRef::parse))
                .filter(move |r| !units.get(r.unit()).is_some_and(Unit::has_address))
                .map(move |r| (name.clone(), r))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::Address;
    use serde_json::{json, Value};

    use super::*;
    use crate::client::mock::MockChain;

    /// A store over the given units, never written to disk
    fn store(units: Value) -> StateStore {
        StateStore::from_units(".data.json", serde_json::from_value(units).unwrap())
    }

    /// The checksummed address the mock hands out for its `nonce`-th operation
    fn mock_address(nonce: u64) -> String {
        Address::left_padding_from(&nonce.to_be_bytes()).to_checksum(None)
    }

    /// A policy that never sleeps
    fn policy() -> ConfirmationPolicy {
        ConfirmationPolicy::immediate(Duration::from_secs(1))
    }

    /// Token <- Pool <- Farm, with Pool holding an embedded token as well
    fn chained_units() -> Value {
        json!({
            "Token": { "constructorArgs": ["Game Token", "GT"], "address": "", "deployed": false, "verified": false },
            "Pool": {
                "contractName": "contracts/GamePool.sol:GamePool",
                "constructorArgs": ["${Token.address}", "prefix-${Token.address}"],
                "address": "", "deployed": false, "verified": false
            },
            "Farm": { "constructorArgs": ["${Pool.address}", ["${Token.address}"]], "address": "", "deployed": false, "verified": false }
        })
    }

    #[tokio::test]
    async fn test_placeholders_converge_in_one_pass() {
        let chain = MockChain::new();
        let mut store = store(chained_units());

        let summary =
            deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
                .await
                .unwrap();
        assert_eq!(summary.completed, vec!["Token", "Pool", "Farm"]);

        let token = mock_address(1);
        let pool = mock_address(2);
        assert_eq!(store.get("Token").unwrap().address, token);
        assert_eq!(
            store.get("Pool").unwrap().constructor_args(),
            &[json!(token), json!("prefix-${Token.address}")]
        );
        assert_eq!(store.get("Farm").unwrap().constructor_args()[0], json!(pool));

        let deployments = chain.deployments();
        assert_eq!(deployments[1].contract, "GamePool");
        assert_eq!(deployments[1].args[0], json!(token));
        assert_eq!(deployments[2].args, vec![json!(pool), json!(["${Token.address}"])]);
    }

    #[tokio::test]
    async fn test_second_run_deploys_nothing() {
        let chain = MockChain::new();
        let mut store = store(chained_units());

        deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
            .await
            .unwrap();
        let after_first = store.units().clone();

        let summary =
            deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
                .await
                .unwrap();
        assert!(summary.completed.is_empty());
        assert_eq!(summary.skipped.len(), 3);
        assert_eq!(chain.deployments().len(), 3);
        assert_eq!(store.units(), &after_first);
    }

    #[tokio::test]
    async fn test_recorded_addresses_resolve_at_startup() {
        let chain = MockChain::new();
        let mut store = store(json!({
            "Token": { "address": "0x00000000000000000000000000000000000000aA", "deployed": true, "verified": true },
            "Pool": { "constructorArgs": ["${Token.address}"], "address": "", "deployed": false, "verified": false }
        }));

        deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
            .await
            .unwrap();

        let deployments = chain.deployments();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].args, vec![json!("0x00000000000000000000000000000000000000aA")]);
        assert!(store.get("Token").unwrap().verified);
    }

    #[tokio::test]
    async fn test_proxy_flavor_respects_only_deploy() {
        let chain = MockChain::new();
        let mut store = store(json!({
            "Token": { "onlyDeploy": true, "constructorArgs": ["GT"], "address": "", "deployed": false, "verified": false },
            "Market": { "upgradeArgs": ["${Token.address}", 250], "address": "", "deployed": false, "verified": false }
        }));

        deploy_units(&mut store, &chain, DeployFlavor::Proxy, FailurePolicy::Continue, &policy())
            .await
            .unwrap();

        let deployments = chain.deployments();
        assert!(!deployments[0].proxy);
        assert_eq!(deployments[0].args, vec![json!("GT")]);
        assert!(deployments[1].proxy);
        assert_eq!(deployments[1].args, vec![json!(mock_address(1)), json!(250)]);

        let token = store.get("Token").unwrap();
        assert!(token.deployed && !token.is_upgraded() && token.upgraded_address.is_none());

        let market = store.get("Market").unwrap();
        assert!(market.deployed && market.is_upgraded() && !market.verified);
        assert_eq!(market.address, mock_address(2));
        assert_eq!(market.upgraded_address.as_deref(), Some(mock_address(3).as_str()));
    }

    #[tokio::test]
    async fn test_plain_flavor_leaves_upgraded_unset() {
        let chain = MockChain::new();
        let mut store = store(chained_units());

        deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
            .await
            .unwrap();
        assert!(store.units().values().all(|u| u.upgraded.is_none()));
        assert!(chain.deployments().iter().all(|d| !d.proxy));
    }

    #[tokio::test]
    async fn test_continue_policy_skips_failed_unit() {
        let chain = MockChain::new().failing("Pool");
        let mut store = store(json!({
            "Token": { "address": "", "deployed": false, "verified": false },
            "Pool": { "constructorArgs": ["${Token.address}"], "address": "", "deployed": false, "verified": false },
            "Lock": { "address": "", "deployed": false, "verified": false }
        }));

        let summary =
            deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Continue, &policy())
                .await
                .unwrap();
        assert_eq!(summary.completed, vec!["Token", "Lock"]);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "Pool");

        let pool = store.get("Pool").unwrap();
        assert!(!pool.deployed && !pool.has_address());

        // The failed unit is retried, and only it, once the backend recovers
        chain.recover("Pool");
        let summary =
            deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Continue, &policy())
                .await
                .unwrap();
        assert_eq!(summary.completed, vec!["Pool"]);
        assert_eq!(chain.deployments().len(), 3);
    }

    #[tokio::test]
    async fn test_abort_policy_stops_at_failed_unit() {
        let chain = MockChain::new().failing("Pool");
        let mut store = store(json!({
            "Token": { "address": "", "deployed": false, "verified": false },
            "Pool": { "address": "", "deployed": false, "verified": false },
            "Lock": { "address": "", "deployed": false, "verified": false }
        }));

        let err =
            deploy_units(&mut store, &chain, DeployFlavor::Plain, FailurePolicy::Abort, &policy())
                .await
                .unwrap_err();
        assert!(matches!(err, ScriptError::UnitDeploy { ref unit, .. } if unit == "Pool"));

        assert!(store.get("Token").unwrap().deployed);
        assert!(!store.get("Lock").unwrap().deployed);
        assert_eq!(chain.deployments().len(), 1);
    }

    #[test]
    fn test_pending_refs_lists_missing_targets() {
        let units: IndexMap<String, Unit> = serde_json::from_value(json!({
            "Token": { "address": "", "deployed": false, "verified": false },
            "Pool": { "constructorArgs": ["${Token.address}", "${Lock.address}"], "address": "", "deployed": false, "verified": false },
            "Lock": { "address": "0x01", "deployed": true, "verified": false }
        }))
        .unwrap();

        assert_eq!(pending_refs(&units), vec![("Pool".to_string(), UnitRef::new("Token"))]);
    }
}
