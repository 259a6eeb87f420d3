//! JSON-RPC `eth_call` client for the lending pool contracts.

use super::{AccountData, ChainReadError, ChainReader, ReserveConfiguration, ReserveInfo, UserReserve};
use crate::domain::Address;
use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

sol! {
    interface IPool {
        struct ReserveConfigurationMap {
            uint256 data;
        }

        struct ReserveData {
            ReserveConfigurationMap configuration;
            uint128 liquidityIndex;
            uint128 currentLiquidityRate;
            uint128 variableBorrowIndex;
            uint128 currentVariableBorrowRate;
            uint128 currentStableBorrowRate;
            uint40 lastUpdateTimestamp;
            uint16 id;
            address aTokenAddress;
            address stableDebtTokenAddress;
            address variableDebtTokenAddress;
            address interestRateStrategyAddress;
            uint128 accruedToTreasury;
            uint128 unbacked;
            uint128 isolationModeTotalDebt;
        }

        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        function getReservesList() external view returns (address[] memory);

        function getReserveData(address asset) external view returns (ReserveData memory);
    }

    interface IPoolAddressesProvider {
        function getPriceOracle() external view returns (address);
    }

    interface IAaveOracle {
        function getAssetsPrices(address[] calldata assets) external view returns (uint256[] memory);
    }

    interface IUiPoolDataProviderV3 {
        struct UserReserveData {
            address underlyingAsset;
            uint256 scaledATokenBalance;
            bool usageAsCollateralEnabledOnUser;
            uint256 stableBorrowRate;
            uint256 scaledVariableDebt;
            uint256 principalStableDebt;
            uint256 stableBorrowLastUpdateTimestamp;
        }

        function getUserReservesData(address provider, address user)
            external
            view
            returns (UserReserveData[] memory, uint8);
    }
}

/// Deployed contract addresses the reader talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractAddresses {
    pub pool: Address,
    pub pool_addresses_provider: Address,
    pub ui_pool_data_provider: Address,
}

impl ContractAddresses {
    pub const BASE_POOL: &'static str = "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5";
    pub const BASE_POOL_ADDRESSES_PROVIDER: &'static str =
        "0xe20fCBdBfFC4Dd138cE8b2E6FBb6CB49777ad64D";
    pub const BASE_UI_POOL_DATA_PROVIDER: &'static str =
        "0x68100bD5345eA474D93577127C11F39FF8463e93";

    /// Aave v3 deployment on Base mainnet.
    pub fn base_mainnet() -> Self {
        Self {
            pool: Address::new(Self::BASE_POOL.to_string()),
            pool_addresses_provider: Address::new(Self::BASE_POOL_ADDRESSES_PROVIDER.to_string()),
            ui_pool_data_provider: Address::new(Self::BASE_UI_POOL_DATA_PROVIDER.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Chain reader backed by an Ethereum JSON-RPC endpoint.
#[derive(Debug)]
pub struct RpcChainReader {
    client: Client,
    rpc_url: String,
    pool: alloy_primitives::Address,
    addresses_provider: alloy_primitives::Address,
    ui_pool_data_provider: alloy_primitives::Address,
    price_oracle: OnceCell<alloy_primitives::Address>,
    request_id: AtomicU64,
}

impl RpcChainReader {
    /// Create a reader for the given endpoint and contract set.
    pub fn new(rpc_url: String, contracts: &ContractAddresses) -> Result<Self, ChainReadError> {
        let parse = |addr: &Address| {
            addr.to_alloy()
                .map_err(|e| ChainReadError::InvalidAddress(e.to_string()))
        };

        Ok(Self {
            client: Client::new(),
            rpc_url,
            pool: parse(&contracts.pool)?,
            addresses_provider: parse(&contracts.pool_addresses_provider)?,
            ui_pool_data_provider: parse(&contracts.ui_pool_data_provider)?,
            price_oracle: OnceCell::new(),
            request_id: AtomicU64::new(1),
        })
    }

    /// Issue an `eth_call` against the latest block and return the raw return data.
    async fn eth_call(
        &self,
        to: alloy_primitives::Address,
        data: Vec<u8>,
    ) -> Result<Vec<u8>, ChainReadError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": format!("0x{}", hex::encode(&data)) },
                "latest"
            ]
        });
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ChainReadError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ChainReadError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ChainReadError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ChainReadError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<JsonRpcResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(ChainReadError::Decode(e.to_string())))
        })
        .await?;

        if let Some(err) = body.error {
            return Err(ChainReadError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = body
            .result
            .ok_or_else(|| ChainReadError::Decode("response has neither result nor error".to_string()))?;
        decode_hex(&result)
    }

    async fn call<C: SolCall>(
        &self,
        to: alloy_primitives::Address,
        call: C,
    ) -> Result<C::Return, ChainReadError> {
        let bytes = self.eth_call(to, call.abi_encode()).await?;
        C::abi_decode_returns(&bytes)
            .map_err(|e| ChainReadError::Decode(format!("{}: {}", C::SIGNATURE, e)))
    }

    /// Oracle address, resolved once from the addresses provider.
    async fn price_oracle(&self) -> Result<alloy_primitives::Address, ChainReadError> {
        self.price_oracle
            .get_or_try_init(|| async {
                let oracle = self
                    .call(
                        self.addresses_provider,
                        IPoolAddressesProvider::getPriceOracleCall {},
                    )
                    .await?;
                debug!("Resolved price oracle {}", oracle);
                Ok(oracle)
            })
            .await
            .copied()
    }
}

fn decode_hex(data: &str) -> Result<Vec<u8>, ChainReadError> {
    let trimmed = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(trimmed).map_err(|e| ChainReadError::Decode(format!("invalid hex: {}", e)))
}

fn to_alloy(user: &Address) -> Result<alloy_primitives::Address, ChainReadError> {
    user.to_alloy()
        .map_err(|e| ChainReadError::InvalidAddress(e.to_string()))
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn get_user_account_data(&self, user: &Address) -> Result<AccountData, ChainReadError> {
        debug!("Reading account data for user={}", user);
        let ret = self
            .call(self.pool, IPool::getUserAccountDataCall { user: to_alloy(user)? })
            .await?;

        Ok(AccountData {
            total_collateral_base: ret.totalCollateralBase,
            total_debt_base: ret.totalDebtBase,
            available_borrows_base: ret.availableBorrowsBase,
            current_liquidation_threshold: ret.currentLiquidationThreshold,
            ltv: ret.ltv,
            health_factor: ret.healthFactor,
        })
    }

    async fn get_reserves(&self) -> Result<Vec<ReserveInfo>, ChainReadError> {
        let assets = self.call(self.pool, IPool::getReservesListCall {}).await?;
        if assets.is_empty() {
            return Ok(Vec::new());
        }
        let oracle = self.price_oracle().await?;

        let prices = self.call(
            oracle,
            IAaveOracle::getAssetsPricesCall {
                assets: assets.clone(),
            },
        );
        let reserve_data = futures::future::try_join_all(
            assets
                .iter()
                .map(|asset| self.call(self.pool, IPool::getReserveDataCall { asset: *asset })),
        );
        let (prices, reserve_data) = tokio::try_join!(prices, reserve_data)?;
        debug!("Read {} reserves", assets.len());

        Ok(assets
            .iter()
            .zip(reserve_data)
            .enumerate()
            .map(|(i, (asset, data))| {
                let bitmap = data.configuration.data;
                let config = ReserveConfiguration::from_bitmap(bitmap);
                ReserveInfo {
                    underlying_asset: Address::from_alloy(*asset),
                    decimals: (!bitmap.is_zero()).then_some(config.decimals),
                    price: prices.get(i).copied().filter(|p| !p.is_zero()),
                    ltv_bps: config.ltv_bps,
                    liquidation_threshold_bps: config.liquidation_threshold_bps,
                    liquidity_index: U256::from(data.liquidityIndex),
                    variable_borrow_index: U256::from(data.variableBorrowIndex),
                }
            })
            .collect())
    }

    async fn get_user_reserves(&self, user: &Address) -> Result<Vec<UserReserve>, ChainReadError> {
        let ret = self
            .call(
                self.ui_pool_data_provider,
                IUiPoolDataProviderV3::getUserReservesDataCall {
                    provider: self.addresses_provider,
                    user: to_alloy(user)?,
                },
            )
            .await?;

        Ok(ret
            ._0
            .into_iter()
            .map(|r| UserReserve {
                underlying_asset: Address::from_alloy(r.underlyingAsset),
                scaled_a_token_balance: r.scaledATokenBalance,
                scaled_variable_debt: r.scaledVariableDebt,
                usage_as_collateral: r.usageAsCollateralEnabledOnUser,
            })
            .collect())
    }
}
