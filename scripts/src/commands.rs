//! Implementations of the pipeline commands: each opens the manifests for the
//! connected chain, runs its engines and writes the results back

use std::path::Path;

use tracing::{error, info, warn};

use crate::{
    client::{ChainClient, SourceVerifier},
    errors::ScriptError,
    pipeline::{deploy_units, run_calls, upgrade_units, verify_units, StatusReport},
    store::{CallManifest, StateStore},
    types::{ConfirmationPolicy, DeployFlavor, FailurePolicy},
};

/// Deploy every pending unit with a plain create.
///
/// The state file is written even when the pass aborts, so the units created
/// before the failure are not created again on the next run.
pub async fn run_deploy<C: ChainClient>(
    client: &C,
    manifest_dir: &Path,
    on_error: FailurePolicy,
    confirmation: &ConfirmationPolicy,
) -> Result<(), ScriptError> {
    let chain_id = client.chain_id().await?;
    let mut store = StateStore::open(manifest_dir, Some(chain_id))?;
    info!("Using state file {}", store.path().display());

    let result =
        deploy_units(&mut store, client, DeployFlavor::Plain, on_error, confirmation).await;
    store.persist()?;
    result.map(|_| ())
}

/// Deploy pending units behind proxies, then upgrade the deployed ones, in a
/// single load and write of the state file
pub async fn run_proxy<C: ChainClient>(
    client: &C,
    manifest_dir: &Path,
    on_error: FailurePolicy,
    skip_upgrade: bool,
    confirmation: &ConfirmationPolicy,
) -> Result<(), ScriptError> {
    let chain_id = client.chain_id().await?;
    let mut store = StateStore::open(manifest_dir, Some(chain_id))?;
    info!("Using state file {}", store.path().display());

    if let Err(e) =
        deploy_units(&mut store, client, DeployFlavor::Proxy, on_error, confirmation).await
    {
        store.persist()?;
        return Err(e);
    }

    if !skip_upgrade {
        let summary = upgrade_units(&mut store, client).await;
        if !summary.is_clean() {
            warn!("{} units left not upgraded, run again to retry", summary.failed.len());
        }
    }
    store.persist()
}

/// Run the post-deploy call directives against the recorded addresses.
///
/// A failing call ends the sweep but not the command: the completed calls are
/// already committed and the next run resumes from the failed one.
pub async fn run_setup<C: ChainClient>(
    client: &C,
    manifest_dir: &Path,
    confirmation: &ConfirmationPolicy,
) -> Result<(), ScriptError> {
    let chain_id = client.chain_id().await?;
    let state = StateStore::open(manifest_dir, Some(chain_id))?;
    let mut manifest = CallManifest::open(manifest_dir, Some(chain_id))?;
    info!(
        "Using state file {} and setup file {}",
        state.path().display(),
        manifest.path().display()
    );

    match run_calls(&mut manifest, &state, client, confirmation).await {
        Ok(_) => {}
        Err(e @ ScriptError::CallInvocation { .. }) => error!("Call sweep aborted: {}", e),
        Err(e) => return Err(e),
    }
    manifest.persist()
}

/// Verify the sources of deployed units, writing the progress made even when
/// a verification is rejected
pub async fn run_verify<V: SourceVerifier>(
    verifier: &V,
    manifest_dir: &Path,
    chain_id: u64,
) -> Result<(), ScriptError> {
    let mut store = StateStore::open(manifest_dir, Some(chain_id))?;
    info!("Using state file {}", store.path().display());

    let result = verify_units(&mut store, verifier).await;
    store.persist()?;
    result.map(|_| ())
}

/// Build the status report of the manifests in `manifest_dir`
pub fn run_status(manifest_dir: &Path, chain_id: Option<u64>) -> Result<StatusReport, ScriptError> {
    let state = StateStore::open(manifest_dir, chain_id)?;
    let calls = CallManifest::open(manifest_dir, chain_id)?;
    Ok(StatusReport::new(&state, &calls))
}
