//! Definitions of errors that can occur during the execution of the deployment pipeline

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    time::Duration,
};

/// Errors that can occur during the execution of the deployment pipeline
#[derive(Debug)]
pub enum ScriptError {
    /// Error reading a manifest file
    ReadManifest(String),
    /// Error writing a manifest file
    WriteManifest(String),
    /// A manifest file exists but is not valid JSON of the expected shape
    ManifestParse(String),
    /// Error parsing a compiled contract artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method or constructor
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
    /// A deployment unit could not be created
    UnitDeploy {
        /// The name of the unit
        unit: String,
        /// The underlying failure
        reason: String,
    },
    /// A deployment unit could not be upgraded
    UnitUpgrade {
        /// The name of the unit
        unit: String,
        /// The underlying failure
        reason: String,
    },
    /// A post-deploy call directive failed
    CallInvocation {
        /// The name of the targeted unit
        target: String,
        /// The invoked method
        function: String,
        /// The underlying failure
        reason: String,
    },
    /// No receipt was observed for a transaction within the configured bound
    ConfirmationTimeout {
        /// The hash of the transaction, in hex
        tx_hash: String,
        /// How long the receipt was polled for
        waited: Duration,
    },
    /// Error submitting a source verification request
    Verification(String),
    /// A directive or reference names a unit absent from the manifest
    UnknownUnit(String),
}

impl ScriptError {
    /// Wrap this error as the failure to deploy the given unit
    pub fn into_unit_deploy(self, unit: &str) -> Self {
        match self {
            e @ ScriptError::UnitDeploy { .. } => e,
            e => ScriptError::UnitDeploy {
                unit: unit.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Wrap this error as the failure to upgrade the given unit
    pub fn into_unit_upgrade(self, unit: &str) -> Self {
        match self {
            e @ ScriptError::UnitUpgrade { .. } => e,
            e => ScriptError::UnitUpgrade {
                unit: unit.to_string(),
                reason: e.to_string(),
            },
        }
    }
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::ReadManifest(s) => write!(f, "error reading manifest: {}", s),
            ScriptError::WriteManifest(s) => write!(f, "error writing manifest: {}", s),
            ScriptError::ManifestParse(s) => write!(f, "error parsing manifest: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
            ScriptError::UnitDeploy { unit, reason } => {
                write!(f, "error deploying unit `{}`: {}", unit, reason)
            }
            ScriptError::UnitUpgrade { unit, reason } => {
                write!(f, "error upgrading unit `{}`: {}", unit, reason)
            }
            ScriptError::CallInvocation {
                target,
                function,
                reason,
            } => {
                write!(f, "error calling `{}.{}`: {}", target, function, reason)
            }
            ScriptError::ConfirmationTimeout { tx_hash, waited } => write!(
                f,
                "no receipt for transaction {} after {}s",
                tx_hash,
                waited.as_secs()
            ),
            ScriptError::Verification(s) => write!(f, "error verifying contract: {}", s),
            ScriptError::UnknownUnit(s) => write!(f, "unknown unit: {}", s),
        }
    }
}

impl Error for ScriptError {}
