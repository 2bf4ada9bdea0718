//! A [`ChainClient`] backed by a JSON-RPC endpoint and a local signer

use std::str::FromStr;

use alloy::{
    dyn_abi::DynSolValue,
    network::TransactionBuilder,
    providers::{DynProvider, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::SolCall;
use serde_json::Value;
use tracing::{debug, trace};

use super::{poll_receipt, ChainClient, ProxyDeployment, ReceiptStatus};
use crate::{
    artifacts::ArtifactStore,
    constants::{INITIALIZER_FN_NAME, PROXY_ADMIN_STORAGE_SLOT},
    errors::ScriptError,
    solidity::upgradeAndCallCall,
    types::ConfirmationPolicy,
    utils::setup_client,
};

/// A chain client that signs with the deployer key and builds calldata from
/// compiled artifacts
pub struct RpcClient {
    /// The signing provider
    provider: DynProvider,
    /// The address of the deployer, owner of every proxy it creates
    deployer: Address,
    /// Where compiled contracts are looked up
    artifacts: ArtifactStore,
    /// The artifact name of the upgradeable proxy
    proxy_contract: String,
    /// How long to wait for transactions
    confirmation: ConfirmationPolicy,
}

impl RpcClient {
    /// Connect to `rpc_url`, signing with `priv_key`
    pub async fn connect(
        rpc_url: &str,
        priv_key: &str,
        artifacts: ArtifactStore,
        proxy_contract: String,
        confirmation: ConfirmationPolicy,
    ) -> Result<Self, ScriptError> {
        let (provider, deployer) = setup_client(priv_key, rpc_url)?;
        debug!("Deploying from {}", deployer);

        Ok(Self {
            provider,
            deployer,
            artifacts,
            proxy_contract,
            confirmation,
        })
    }

    /// Send a transaction and wait for its successful receipt
    async fn send_and_confirm(
        &self,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, ScriptError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        trace!("Submitted transaction {:#x}", tx_hash);

        let receipt =
            poll_receipt(tx_hash, &self.confirmation, || self.fetch_receipt(tx_hash)).await?;
        if !receipt.status() {
            return Err(ScriptError::ContractInteraction(format!(
                "transaction {:#x} reverted",
                tx_hash
            )));
        }
        Ok(receipt)
    }

    /// Fetch the receipt of `tx_hash`, if mined
    async fn fetch_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ScriptError> {
        self.provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    /// Send a creation transaction, returning the created contract's address
    async fn create(&self, code: Bytes) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self
            .send_and_confirm(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

        receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment("receipt holds no contract address".to_string())
        })
    }

    /// Read the admin of `proxy` from its EIP-1967 admin slot
    async fn proxy_admin(&self, proxy: Address) -> Result<Address, ScriptError> {
        let slot = U256::from_str(PROXY_ADMIN_STORAGE_SLOT)
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let word = self
            .provider
            .get_storage_at(proxy, slot)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok(Address::from_word(B256::from(word.to_be_bytes::<32>())))
    }
}

impl ChainClient for RpcClient {
    async fn chain_id(&self) -> Result<u64, ScriptError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
    }

    async fn deploy(&self, contract: &str, args: &[Value]) -> Result<Address, ScriptError> {
        let artifact = self.artifacts.load(contract)?;
        self.create(artifact.deploy_code(args)?).await
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[Value],
    ) -> Result<ProxyDeployment, ScriptError> {
        let artifact = self.artifacts.load(contract)?;
        let init_data = if init_args.is_empty() && !artifact.has_function(INITIALIZER_FN_NAME) {
            Vec::new()
        } else {
            artifact.encode_call(INITIALIZER_FN_NAME, init_args)?
        };

        let implementation = self.create(artifact.deploy_code(&[])?).await?;
        debug!("{} implementation deployed at {}", contract, implementation);

        let proxy = self.artifacts.load(&self.proxy_contract)?;
        let encoded = proxy.encode_constructor_values(&[
            DynSolValue::Address(implementation),
            DynSolValue::Address(self.deployer),
            DynSolValue::Bytes(init_data),
        ])?;
        let proxy = self.create(proxy.with_constructor_data(encoded)).await?;
        Ok(ProxyDeployment { proxy, implementation })
    }

    async fn upgrade_proxy(
        &self,
        proxy: Address,
        contract: &str,
    ) -> Result<ProxyDeployment, ScriptError> {
        let admin = self.proxy_admin(proxy).await?;
        if admin.is_zero() {
            return Err(ScriptError::ContractInteraction(format!(
                "{} is not an upgradeable proxy",
                proxy
            )));
        }

        let artifact = self.artifacts.load(contract)?;
        let implementation = self.create(artifact.deploy_code(&[])?).await?;
        debug!("{} implementation deployed at {}", contract, implementation);

        let calldata = upgradeAndCallCall {
            proxy,
            implementation,
            data: Bytes::new(),
        }
        .abi_encode();

        let tx = TransactionRequest::default().with_to(admin).with_input(calldata);
        self.send_and_confirm(tx).await?;
        Ok(ProxyDeployment { proxy, implementation })
    }

    async fn send_call(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> Result<TxHash, ScriptError> {
        let artifact = self.artifacts.load(contract)?;
        let calldata = artifact.encode_call(function, args)?;

        let tx = TransactionRequest::default().with_to(address).with_input(calldata);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<ReceiptStatus>, ScriptError> {
        let receipt = self.fetch_receipt(tx_hash).await?;
        Ok(receipt.map(|r| {
            if r.status() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            }
        }))
    }
}
