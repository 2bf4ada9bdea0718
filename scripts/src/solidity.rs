//! Definitions of Solidity functions called during upgrades

use alloy_sol_types::sol;

sol! {
    function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
}
