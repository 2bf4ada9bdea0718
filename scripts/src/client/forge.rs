//! A [`SourceVerifier`] shelling out to `forge verify-contract`

use std::process::Command;

use alloy_primitives::Address;
use serde_json::Value;
use tracing::debug;

use super::SourceVerifier;
use crate::{
    artifacts::ArtifactStore,
    constants::{FORGE_COMMAND, VERIFY_CONTRACT_COMMAND},
    errors::ScriptError,
    utils::command_success_or,
};

/// Submits sources through forge against the explorer configured for the
/// current project
pub struct ForgeVerifier {
    /// The chain the contracts live on
    chain_id: u64,
    /// Where constructor ABIs are looked up
    artifacts: ArtifactStore,
}

impl ForgeVerifier {
    /// A verifier for contracts on `chain_id`
    pub fn new(chain_id: u64, artifacts: ArtifactStore) -> Self {
        Self { chain_id, artifacts }
    }

    /// Build the `forge verify-contract` invocation
    fn command(&self, contract: &str, address: Address, encoded_args: &[u8]) -> Command {
        let mut cmd = Command::new(FORGE_COMMAND);
        cmd.arg(VERIFY_CONTRACT_COMMAND)
            .arg(format!("{:#x}", address))
            .arg(contract)
            .arg("--chain")
            .arg(self.chain_id.to_string())
            .arg("--watch");

        if !encoded_args.is_empty() {
            cmd.arg("--constructor-args").arg(format!("0x{}", hex::encode(encoded_args)));
        }
        cmd
    }
}

impl SourceVerifier for ForgeVerifier {
    async fn verify(
        &self,
        contract: &str,
        address: Address,
        constructor_args: &[Value],
    ) -> Result<(), ScriptError> {
        let artifact = self.artifacts.load(contract)?;
        let encoded = artifact.encode_constructor_args(constructor_args)?;

        let cmd = self.command(contract, address, &encoded);
        debug!("Running {:?}", cmd);
        command_success_or(cmd, &format!("failed to verify {} at {:#x}", contract, address))
    }
}
