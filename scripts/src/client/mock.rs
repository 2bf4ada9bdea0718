//! An in-memory chain recording every operation, used to drive the pipeline in tests

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
};

use alloy_primitives::{Address, TxHash, B256};
use serde_json::Value;

use super::{ChainClient, ProxyDeployment, ReceiptStatus, SourceVerifier};
use crate::errors::ScriptError;

/// A contract creation observed by the mock
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDeployment {
    /// The artifact name
    pub contract: String,
    /// Constructor or initializer arguments
    pub args: Vec<Value>,
    /// Whether the contract was created behind a proxy
    pub proxy: bool,
    /// The address handed out
    pub address: Address,
}

/// A method call observed by the mock
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    /// The artifact name
    pub contract: String,
    /// The target address
    pub address: Address,
    /// The invoked method
    pub function: String,
    /// The call arguments
    pub args: Vec<Value>,
}

/// Everything the mock has seen
#[derive(Default)]
struct MockState {
    /// Counter for fresh addresses and hashes
    nonce: u64,
    /// Contract creations
    deployments: Vec<RecordedDeployment>,
    /// `(proxy, contract)` upgrades
    upgrades: Vec<(Address, String)>,
    /// Method calls
    calls: Vec<RecordedCall>,
    /// `(contract, address)` verifications
    verifications: Vec<(String, Address)>,
    /// Keys whose operations fail on submission
    failing: HashSet<String>,
    /// Keys whose transactions revert
    reverting: HashSet<String>,
    /// Submitted transactions: final status and pending polls left
    receipts: HashMap<TxHash, (ReceiptStatus, u32)>,
    /// Number of receipt polls served
    polls: usize,
}

/// An in-memory [`ChainClient`] and [`SourceVerifier`].
///
/// Failures are keyed by contract name for creations, upgrades and
/// verifications, and by `Contract.function` for calls.
pub struct MockChain {
    /// The mutable state
    state: RefCell<MockState>,
    /// How many polls a transaction stays pending before its receipt shows
    pending_polls: u32,
    /// Whether receipts never show
    never_confirm: bool,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// The chain id reported by the mock
    pub const CHAIN_ID: u64 = 31337;

    /// A mock on which everything succeeds at once
    pub fn new() -> Self {
        Self { state: RefCell::new(MockState::default()), pending_polls: 0, never_confirm: false }
    }

    /// Keep each transaction pending for `polls` receipt polls
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Never produce a receipt
    pub fn never_confirming(mut self) -> Self {
        self.never_confirm = true;
        self
    }

    /// Make operations on `key` fail on submission
    pub fn failing(self, key: &str) -> Self {
        self.fail(key);
        self
    }

    /// Make transactions on `key` revert
    pub fn reverting(self, key: &str) -> Self {
        self.state.borrow_mut().reverting.insert(key.to_string());
        self
    }

    /// Make operations on `key` fail from now on
    pub fn fail(&self, key: &str) {
        self.state.borrow_mut().failing.insert(key.to_string());
    }

    /// Let operations on `key` succeed again
    pub fn recover(&self, key: &str) {
        self.state.borrow_mut().failing.remove(key);
    }

    /// Every contract creation so far
    pub fn deployments(&self) -> Vec<RecordedDeployment> {
        self.state.borrow().deployments.clone()
    }

    /// Every upgrade so far
    pub fn upgrades(&self) -> Vec<(Address, String)> {
        self.state.borrow().upgrades.clone()
    }

    /// Every method call so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.borrow().calls.clone()
    }

    /// Every verification so far
    pub fn verifications(&self) -> Vec<(String, Address)> {
        self.state.borrow().verifications.clone()
    }

    /// The number of receipt polls served
    pub fn receipt_polls(&self) -> usize {
        self.state.borrow().polls
    }

    /// Fail if `key` is marked failing
    fn check(&self, key: &str) -> Result<(), ScriptError> {
        if self.state.borrow().failing.contains(key) {
            return Err(ScriptError::ContractInteraction(format!("mock failure on {}", key)));
        }
        Ok(())
    }

    /// A fresh address
    fn next_address(&self) -> Address {
        let mut state = self.state.borrow_mut();
        state.nonce += 1;
        Address::left_padding_from(&state.nonce.to_be_bytes())
    }

    /// Record a creation and hand out its address
    fn create(&self, contract: &str, args: &[Value], proxy: bool) -> Result<Address, ScriptError> {
        self.check(contract)?;
        let address = self.next_address();
        self.state.borrow_mut().deployments.push(RecordedDeployment {
            contract: contract.to_string(),
            args: args.to_vec(),
            proxy,
            address,
        });
        Ok(address)
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, ScriptError> {
        Ok(Self::CHAIN_ID)
    }

    async fn deploy(&self, contract: &str, args: &[Value]) -> Result<Address, ScriptError> {
        self.create(contract, args, false /* proxy */)
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        init_args: &[Value],
    ) -> Result<ProxyDeployment, ScriptError> {
        let proxy = self.create(contract, init_args, true /* proxy */)?;
        Ok(ProxyDeployment { proxy, implementation: self.next_address() })
    }

    /// Addresses the mock never created are taken to be proxies
    async fn upgrade_proxy(
        &self,
        proxy: Address,
        contract: &str,
    ) -> Result<ProxyDeployment, ScriptError> {
        let plain = self.state.borrow().deployments.iter().any(|d| d.address == proxy && !d.proxy);
        if plain {
            return Err(ScriptError::ContractInteraction(format!(
                "{} is not an upgradeable proxy",
                proxy
            )));
        }

        self.check(contract)?;
        self.state.borrow_mut().upgrades.push((proxy, contract.to_string()));
        Ok(ProxyDeployment { proxy, implementation: self.next_address() })
    }

    async fn send_call(
        &self,
        contract: &str,
        address: Address,
        function: &str,
        args: &[Value],
    ) -> Result<TxHash, ScriptError> {
        let key = format!("{}.{}", contract, function);
        self.check(&key)?;

        let mut state = self.state.borrow_mut();
        state.nonce += 1;
        let tx_hash = B256::left_padding_from(&state.nonce.to_be_bytes());
        let status = if state.reverting.contains(&key) {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };

        state.receipts.insert(tx_hash, (status, self.pending_polls));
        state.calls.push(RecordedCall {
            contract: contract.to_string(),
            address,
            function: function.to_string(),
            args: args.to_vec(),
        });
        Ok(tx_hash)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<ReceiptStatus>, ScriptError> {
        let mut state = self.state.borrow_mut();
        state.polls += 1;
        if self.never_confirm {
            return Ok(None);
        }

        match state.receipts.get_mut(&tx_hash) {
            Some((_, pending)) if *pending > 0 => {
                *pending -= 1;
                Ok(None)
            }
            Some((status, _)) => Ok(Some(*status)),
            None => Ok(None),
        }
    }
}

impl SourceVerifier for MockChain {
    async fn verify(
        &self,
        contract: &str,
        address: Address,
        _constructor_args: &[Value],
    ) -> Result<(), ScriptError> {
        self.check(contract)?;
        self.state.borrow_mut().verifications.push((contract.to_string(), address));
        Ok(())
    }
}
