//! The post-deploy call engine.
//!
//! Every active directive not yet marked `called` is invoked once on its
//! target, in declaration order. The `called` flag is committed to disk as soon
//! as the call is confirmed, so an interrupted sweep resumes at the first
//! directive that did not complete. A crash between confirmation and commit
//! replays that one call on the next run.

use std::str::FromStr;

use alloy_primitives::Address;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::PassSummary;
use crate::{
    client::{wait_for_confirmation, ChainClient},
    errors::ScriptError,
    placeholder::{collect_refs, resolve_nested},
    store::{CallManifest, StateStore},
    types::{CallDirective, ConfirmationPolicy},
};

/// A directive with its target and arguments resolved against the state file.
///
/// Resolution happens on this copy only, so the manifest keeps its templates.
#[derive(Clone, Debug, PartialEq)]
struct PreparedCall {
    /// Position of the directive in the manifest
    index: usize,
    /// The name of the targeted unit
    target: String,
    /// The invoked method
    function: String,
    /// The artifact whose ABI encodes the call
    contract: String,
    /// The target address, empty if still unknown
    address: String,
    /// The arguments with every known placeholder substituted
    args: Vec<Value>,
}

impl PreparedCall {
    /// Resolve `directive` against the addresses recorded in `state`
    fn new(index: usize, directive: &CallDirective, state: &StateStore) -> Self {
        let mut address = directive.contract_addr.clone();
        let mut args = directive.args.clone();
        for (unit, unit_address) in state.known_addresses() {
            if address.is_empty() && unit == directive.name {
                address = unit_address.to_string();
            }
            for arg in args.iter_mut() {
                resolve_nested(arg, unit, unit_address);
            }
        }

        Self {
            index,
            target: directive.name.clone(),
            function: directive.function_name.clone(),
            contract: directive.artifact().to_string(),
            address,
            args,
        }
    }

    /// `Target.function`, for logging
    fn label(&self) -> String {
        format!("{}.{}", self.target, self.function)
    }
}

/// Run a call sweep over `manifest`, resolving against the units of `state`.
///
/// The first failing call ends the sweep with [`ScriptError::CallInvocation`];
/// directives committed before it stay marked in the setup file.
pub async fn run_calls<C: ChainClient>(
    manifest: &mut CallManifest,
    state: &StateStore,
    client: &C,
    confirmation: &ConfirmationPolicy,
) -> Result<PassSummary, ScriptError> {
    info!(
        "Running {} call directives from {}",
        manifest.directives().len(),
        manifest.path().display()
    );

    let mut summary = PassSummary::default();
    let mut pending = Vec::new();
    for (index, directive) in manifest.directives().iter().enumerate() {
        let call = PreparedCall::new(index, directive, state);
        if !directive.call || directive.called {
            debug!("{} inactive or already called", call.label());
            summary.skipped.push(call.label());
        } else if call.target.is_empty() || call.address.is_empty() {
            warn!("{} skipped, its target has no address", call.label());
            summary.skipped.push(call.label());
        } else {
            for target in call.args.iter().flat_map(collect_refs) {
                warn!("{} still holds {}, its unit has no address", call.label(), target);
            }
            pending.push(call);
        }
    }

    for call in pending {
        sleep(confirmation.submit_pause).await;
        info!("Calling {} at {}", call.label(), call.address);

        invoke(client, &call, confirmation).await.map_err(|e| ScriptError::CallInvocation {
            target: call.target.clone(),
            function: call.function.clone(),
            reason: e.to_string(),
        })?;
        manifest.commit(call.index)?;
        summary.completed.push(call.label());
    }

    info!("Call sweep finished: {}", summary);
    Ok(summary)
}

/// Submit a prepared call and wait for its successful confirmation
async fn invoke<C: ChainClient>(
    client: &C,
    call: &PreparedCall,
    confirmation: &ConfirmationPolicy,
) -> Result<(), ScriptError> {
    let address = Address::from_str(&call.address)
        .map_err(|e| ScriptError::ContractInteraction(format!("{}: {}", call.address, e)))?;

    let tx_hash = client.send_call(&call.contract, address, &call.function, &call.args).await?;
    wait_for_confirmation(client, tx_hash, confirmation).await?;
    info!("Called {} in transaction {:#x}", call.label(), tx_hash);
    Ok(())
}
