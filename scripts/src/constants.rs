//! Constants used in the deploy scripts

/// The file name of the deployment unit manifest
pub const DATA_FILE_STEM: &str = ".data";

/// The file name of the post-deploy call manifest
pub const SETUP_FILE_STEM: &str = ".setup";

/// The extension of both manifest files
pub const MANIFEST_EXTENSION: &str = "json";

/// The opening delimiter of an address placeholder, e.g. `${Token.address}`
pub const PLACEHOLDER_PREFIX: &str = "${";

/// The closing delimiter of an address placeholder
pub const PLACEHOLDER_SUFFIX: &str = ".address}";

/// The name of the initializer invoked on an implementation when it is
/// deployed behind a proxy
pub const INITIALIZER_FN_NAME: &str = "initialize";

/// The default artifact name of the upgradeable proxy wrapping proxy-flavored units
///
/// Compiled from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/transparent/TransparentUpgradeableProxy.sol
pub const DEFAULT_PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The default interval between transaction receipt polls, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// The default delay applied once a receipt is observed, in milliseconds
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// The default upper bound on waiting for a receipt, in seconds
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

/// The pause before each post-deploy call and each proxy deployment, in milliseconds
pub const PRE_TX_PAUSE_MS: u64 = 100;

/// The default RPC endpoint, a local devnet node
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

/// The default directory in which compiled contract artifacts are searched for
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The name of the `forge` command
pub const FORGE_COMMAND: &str = "forge";

/// The name of the forge verification subcommand
pub const VERIFY_CONTRACT_COMMAND: &str = "verify-contract";

/// The default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info";
