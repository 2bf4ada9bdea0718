//! The chain and verification backends the pipeline drives, and the
//! confirmation poll shared by all of them

use std::future::Future;

use alloy_primitives::{Address, TxHash};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::{errors::ScriptError, types::ConfirmationPolicy};

pub mod forge;
#[cfg(test)]
pub mod mock;
pub mod rpc;

pub use forge::ForgeVerifier;
pub use rpc::RpcClient;

/// The outcome of a mined transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// The transaction executed successfully
    Success,
    /// The transaction was mined but reverted
    Reverted,
}

/// The addresses produced by a proxy deployment or upgrade
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The proxy, the address callers use
    pub proxy: Address,
    /// The implementation the proxy delegates to
    pub implementation: Address,
}

/// The operations of a chain backend consumed by the pipeline.
///
/// Contracts are named by artifact; the backend owns compiling arguments into
/// calldata. Creation methods return once the creating transaction is confirmed.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// The id of the connected chain
    async fn chain_id(&self) -> Result<u64, ScriptError>;

    /// Create `contract` with the given constructor arguments
    async fn deploy(&self, contract: &str, args: &[Value]) -> Result<Address, ScriptError>;

    /// Create `contract` behind an upgradeable proxy whose initializer is run
    /// with `init_args`
    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[Value],
    ) -> Result<ProxyDeployment, ScriptError>;

    /// Swap the implementation behind `proxy` for a fresh build of `contract`.
    ///
    /// Fails without creating anything if `proxy` has no admin recorded.
    async fn upgrade_proxy(
        &self,
        proxy: Address,
        contract: &str,
    ) -> Result<ProxyDeployment, ScriptError>;

    /// Submit a call of `function` on the `contract` at `address`
    async fn send_call(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> Result<TxHash, ScriptError>;

    /// The receipt status of `tx_hash`, `None` while it is pending
    async fn transaction_receipt(&self, tx_hash: TxHash)
        -> Result<Option<ReceiptStatus>, ScriptError>;
}

/// A source verification service
#[allow(async_fn_in_trait)]
pub trait SourceVerifier {
    /// Submit the source of `contract`, deployed at `address` with the given
    /// constructor arguments, for verification
    async fn verify(
        &self,
        contract: &str,
        address: Address,
        constructor_args: &[Value],
    ) -> Result<(), ScriptError>;
}

/// Poll `fetch` until it yields a receipt, then wait out the settle delay.
///
/// Gives up with [`ScriptError::ConfirmationTimeout`] once the policy's bound
/// has elapsed without a receipt.
pub async fn poll_receipt<T, F, Fut>(
    tx_hash: TxHash,
    policy: &ConfirmationPolicy,
    mut fetch: F,
) -> Result<T, ScriptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ScriptError>>,
{
    let started = Instant::now();
    let receipt = loop {
        if let Some(receipt) = fetch().await? {
            break receipt;
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            return Err(ScriptError::ConfirmationTimeout {
                tx_hash: format!("{:#x}", tx_hash),
                waited,
            });
        }
        trace!("No receipt yet for {:#x}", tx_hash);
        sleep(policy.poll_interval).await;
    };

    sleep(policy.settle_delay).await;
    Ok(receipt)
}

/// Wait until `tx_hash` is mined successfully
pub async fn wait_for_confirmation<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    policy: &ConfirmationPolicy,
) -> Result<(), ScriptError> {
    let status = poll_receipt(tx_hash, policy, || client.transaction_receipt(tx_hash)).await?;
    match status {
        ReceiptStatus::Success => Ok(()),
        ReceiptStatus::Reverted => Err(ScriptError::ContractInteraction(format!(
            "transaction {:#x} reverted",
            tx_hash
        ))),
    }
}
