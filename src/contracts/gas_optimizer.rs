use ethers::prelude::*;

// GasOptimizer contract ABI
abigen!(
    GasOptimizer,
    r#"[
        function threshold() external view returns (uint256)
        function executeTransaction() external
    ]"#
);
