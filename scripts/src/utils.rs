//! Utilities for the deploy scripts.

use std::{process::Command, str::FromStr};

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use alloy_primitives::Address;

use crate::errors::ScriptError;

/// Sets up the signing provider used to send transactions, returning it along
/// with the address of the deployer derived from the private key.
///
/// The builder's default fillers already manage nonces.
pub fn setup_client(priv_key: &str, rpc_url: &str) -> Result<(DynProvider, Address), ScriptError> {
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let deployer = signer.address();

    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let provider = ProviderBuilder::new().wallet(signer).connect_http(url);

    Ok((DynProvider::new(provider), deployer))
}

/// Reads the chain id of the endpoint at `rpc_url` without a signer
pub async fn fetch_chain_id(rpc_url: &str) -> Result<u64, ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    ProviderBuilder::new()
        .connect_http(url)
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))
}

/// Runs the given command, mapping a spawn failure or a non-zero exit to a
/// verification error carrying `err_msg`
pub fn command_success_or(mut cmd: Command, err_msg: &str) -> Result<(), ScriptError> {
    if !cmd
        .status()
        .map_err(|e| ScriptError::Verification(e.to_string()))?
        .success()
    {
        Err(ScriptError::Verification(String::from(err_msg)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_client_derives_deployer() {
        // The first anvil development key
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let (_, deployer) = setup_client(key, "http://localhost:8545").unwrap();
        assert_eq!(deployer, Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap());
    }

    #[test]
    fn test_setup_client_rejects_bad_inputs() {
        assert!(matches!(
            setup_client("0x1234", "http://localhost:8545"),
            Err(ScriptError::ClientInitialization(_))
        ));
        let key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        assert!(matches!(setup_client(key, "not a url"), Err(ScriptError::ClientInitialization(_))));
    }
}
