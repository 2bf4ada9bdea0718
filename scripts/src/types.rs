//! Type definitions used throughout the scripts

use std::{
    fmt::{self, Display},
    time::Duration,
};

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{
    artifacts::artifact_name,
    constants::{
        DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_DELAY_MS,
        PRE_TX_PAUSE_MS,
    },
};

/// A named entry of the deployment manifest, keyed by its unit name in the state file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// The contract type to instantiate, defaulting to the unit name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    /// The arguments of a plain create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor_args: Option<Vec<Value>>,
    /// The arguments of the initializer run when deploying behind a proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_args: Option<Vec<Value>>,
    /// Whether the proxy-flavored pipeline should create this unit without a proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_deploy: Option<bool>,
    /// The on-chain address, empty until deployed
    #[serde(default, deserialize_with = "null_as_empty")]
    pub address: String,
    /// Whether the unit has been created on-chain
    #[serde(default)]
    pub deployed: bool,
    /// Whether the proxy behind this unit runs the latest implementation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded: Option<bool>,
    /// Whether the source of this unit has been verified
    #[serde(default)]
    pub verified: bool,
    /// The implementation behind an upgraded proxy, the address submitted for
    /// verification once the unit is upgraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgraded_address: Option<String>,
    /// Fields the pipeline does not interpret, kept as-is on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Unit {
    /// The artifact to instantiate for the unit stored under `name`
    pub fn artifact<'a>(&'a self, name: &'a str) -> &'a str {
        artifact_name(self.contract_name.as_deref().unwrap_or(name))
    }

    /// Whether an address has been recorded
    pub fn has_address(&self) -> bool {
        !self.address.is_empty()
    }

    /// Whether the proxy-flavored pipeline should use a plain create
    pub fn is_only_deploy(&self) -> bool {
        self.only_deploy.unwrap_or(false)
    }

    /// Whether the unit's proxy has been brought up to date
    pub fn is_upgraded(&self) -> bool {
        self.upgraded.unwrap_or(false)
    }

    /// The constructor arguments, empty if none are given
    pub fn constructor_args(&self) -> &[Value] {
        self.constructor_args.as_deref().unwrap_or_default()
    }

    /// The initializer arguments, empty if none are given
    pub fn upgrade_args(&self) -> &[Value] {
        self.upgrade_args.as_deref().unwrap_or_default()
    }

    /// The address whose source is verified, with its constructor arguments.
    ///
    /// A proxied unit is verified at its implementation, which is created
    /// without arguments; any other unit at its recorded address.
    pub fn verification_target(&self) -> Option<(&str, &[Value])> {
        let (address, args) = if self.is_upgraded() && !self.is_only_deploy() {
            (self.upgraded_address.as_deref().unwrap_or_default(), &[][..])
        } else {
            (self.address.as_str(), self.constructor_args())
        };
        (!address.is_empty()).then_some((address, args))
    }

    /// Record a fresh deployment at `address`
    pub fn mark_deployed(&mut self, address: String) {
        self.address = address;
        self.deployed = true;
        self.verified = false;
    }

    /// Record a fresh proxy at `address` running `implementation`
    pub fn mark_proxied(&mut self, address: String, implementation: String) {
        self.mark_deployed(address);
        self.upgraded = Some(true);
        self.upgraded_address = Some(implementation);
    }

    /// Record an in-place upgrade, `address` being the (unchanged) proxy address
    pub fn mark_upgraded(&mut self, address: String, implementation: String) {
        self.address = address;
        self.deployed = true;
        self.upgraded = Some(true);
        self.upgraded_address = Some(implementation);
        self.verified = false;
    }
}

/// An entry of the post-deploy call manifest
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDirective {
    /// The name of the targeted unit
    #[serde(default)]
    pub name: String,
    /// The contract type whose ABI is used for the call, defaulting to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    /// The address of the target, filled in from the state file when empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contract_addr: String,
    /// The method to invoke
    pub function_name: String,
    /// The method arguments, possibly holding nested placeholders
    #[serde(default)]
    pub args: Vec<Value>,
    /// Whether this directive is active
    #[serde(default)]
    pub call: bool,
    /// Whether this directive has already been invoked and confirmed
    #[serde(default)]
    pub called: bool,
    /// Fields the pipeline does not interpret, kept as-is on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallDirective {
    /// The artifact whose ABI encodes the call
    pub fn artifact(&self) -> &str {
        artifact_name(self.contract_name.as_deref().unwrap_or(&self.name))
    }
}

/// Treat a JSON `null` as an empty string
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a deployment pass creates its units
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeployFlavor {
    /// Every unit is a plain create from its constructor arguments
    Plain,
    /// Units are created behind upgradeable proxies unless marked `onlyDeploy`
    Proxy,
}

/// What a pass does when a single unit fails
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the pass and exit with the unit's error
    Abort,
    /// Log the failure and move on to the next unit
    Continue,
}

impl Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// How long to wait for transactions to land
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// The interval between receipt polls
    pub poll_interval: Duration,
    /// The delay applied once a receipt is observed
    pub settle_delay: Duration,
    /// The bound on polling before giving up on a transaction
    pub timeout: Duration,
    /// The pause before submitting a call or a proxy deployment
    pub submit_pause: Duration,
}

impl ConfirmationPolicy {
    /// A policy that never sleeps, giving up once `timeout` has elapsed
    pub fn immediate(timeout: Duration) -> Self {
        Self {
            poll_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            timeout,
            submit_pause: Duration::ZERO,
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            submit_pause: Duration::from_millis(PRE_TX_PAUSE_MS),
        }
    }
}
