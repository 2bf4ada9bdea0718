//! Definitions of CLI arguments and commands for the deploy scripts

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    artifacts::ArtifactStore,
    client::{ForgeVerifier, RpcClient},
    commands::{run_deploy, run_proxy, run_setup, run_status, run_verify},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS,
        DEFAULT_PROXY_CONTRACT, DEFAULT_RPC_URL, DEFAULT_SETTLE_DELAY_MS,
    },
    errors::ScriptError,
    types::{ConfirmationPolicy, FailurePolicy},
    utils::fetch_chain_id,
};

/// Drives a manifest of contracts through deployment, upgrade, post-deploy
/// calls and source verification, resuming from the recorded state on each run
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Private key of the deployer
    #[arg(short, long, env = "PKEY", hide_env_values = true)]
    pub priv_key: Option<String>,

    /// Directory holding the `.data.json` and `.setup.json` manifests
    #[arg(short, long, env = "MANIFEST_DIR", default_value = ".")]
    pub manifest_dir: PathBuf,

    /// Directory searched for compiled contract artifacts
    #[arg(short, long, env = "ARTIFACTS_DIR", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// Confirmation polling
    #[command(flatten)]
    pub confirmation: ConfirmationArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// How long to wait for transactions to confirm
#[derive(Args)]
pub struct ConfirmationArgs {
    /// Interval between transaction receipt polls, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Delay after a receipt is observed, in milliseconds
    #[arg(long, env = "SETTLE_DELAY_MS", default_value_t = DEFAULT_SETTLE_DELAY_MS)]
    pub settle_delay_ms: u64,

    /// Bound on waiting for a single receipt, in seconds
    #[arg(
        long,
        env = "CONFIRMATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS
    )]
    pub confirmation_timeout_secs: u64,
}

impl ConfirmationArgs {
    /// The confirmation policy described by the arguments
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
            ..Default::default()
        }
    }
}

/// The pipeline stages, each run as its own invocation
#[derive(Subcommand)]
pub enum Command {
    /// Deploy every pending unit with a plain create
    Deploy(DeployArgs),
    /// Deploy pending units behind upgradeable proxies, then upgrade the
    /// implementation of every deployed proxy not yet upgraded
    Proxy(ProxyArgs),
    /// Run the post-deploy call directives not yet called
    Setup,
    /// Submit the sources of deployed, unverified units for verification
    Verify,
    /// Print the progress recorded in the manifests
    Status(StatusArgs),
}

/// Arguments of the plain deployment pass
#[derive(Args)]
pub struct DeployArgs {
    /// What to do when a unit fails to deploy
    #[arg(long, value_enum, default_value_t = FailurePolicy::Abort)]
    pub on_error: FailurePolicy,
}

/// Arguments of the proxy deployment and upgrade passes
#[derive(Args)]
pub struct ProxyArgs {
    /// What to do when a unit fails to deploy
    #[arg(long, value_enum, default_value_t = FailurePolicy::Continue)]
    pub on_error: FailurePolicy,

    /// Stop after the deployment pass
    #[arg(long)]
    pub skip_upgrade: bool,

    /// Artifact name of the upgradeable proxy wrapping each unit
    #[arg(long, default_value = DEFAULT_PROXY_CONTRACT)]
    pub proxy_contract: String,
}

/// Arguments of the status report
#[derive(Args)]
pub struct StatusArgs {
    /// Read the manifests qualified by this chain id instead of asking the endpoint
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Do not contact the endpoint, reading the unqualified manifests unless
    /// `--chain-id` is given
    #[arg(long)]
    pub offline: bool,
}

impl Cli {
    /// Run the selected command
    pub async fn run(self) -> Result<(), ScriptError> {
        let confirmation = self.confirmation.policy();
        let artifacts = ArtifactStore::new(&self.artifacts_dir);

        match self.command {
            Command::Deploy(DeployArgs { on_error }) => {
                let client = connect(
                    &self.rpc_url,
                    self.priv_key.as_deref(),
                    artifacts,
                    DEFAULT_PROXY_CONTRACT.to_string(),
                    &confirmation,
                )
                .await?;
                run_deploy(&client, &self.manifest_dir, on_error, &confirmation).await
            }
            Command::Proxy(ProxyArgs { on_error, skip_upgrade, proxy_contract }) => {
                let client = connect(
                    &self.rpc_url,
                    self.priv_key.as_deref(),
                    artifacts,
                    proxy_contract,
                    &confirmation,
                )
                .await?;
                run_proxy(&client, &self.manifest_dir, on_error, skip_upgrade, &confirmation).await
            }
            Command::Setup => {
                let client = connect(
                    &self.rpc_url,
                    self.priv_key.as_deref(),
                    artifacts,
                    DEFAULT_PROXY_CONTRACT.to_string(),
                    &confirmation,
                )
                .await?;
                run_setup(&client, &self.manifest_dir, &confirmation).await
            }
            Command::Verify => {
                let chain_id = fetch_chain_id(&self.rpc_url).await?;
                let verifier = ForgeVerifier::new(chain_id, artifacts);
                run_verify(&verifier, &self.manifest_dir, chain_id).await
            }
            Command::Status(StatusArgs { chain_id, offline }) => {
                let chain_id = match chain_id {
                    Some(id) => Some(id),
                    None if offline => None,
                    None => Some(fetch_chain_id(&self.rpc_url).await?),
                };
                let report = run_status(&self.manifest_dir, chain_id)?;
                println!("{}", report);
                Ok(())
            }
        }
    }
}

/// Connect a signing client, failing if no private key was given
async fn connect(
    rpc_url: &str,
    priv_key: Option<&str>,
    artifacts: ArtifactStore,
    proxy_contract: String,
    confirmation: &ConfirmationPolicy,
) -> Result<RpcClient, ScriptError> {
    let priv_key = priv_key.ok_or_else(|| {
        ScriptError::ClientInitialization("a private key is required (--priv-key or PKEY)".into())
    })?;
    RpcClient::connect(rpc_url, priv_key, artifacts, proxy_contract, confirmation.clone()).await
}
