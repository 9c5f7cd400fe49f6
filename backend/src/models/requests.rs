//! # API Request Models
//!
//! Structures for incoming API request bodies.
//! Each struct represents the expected JSON body for an endpoint.

use serde::{Deserialize, Serialize};

use crate::services::CreateLotteryCommand;
use crate::utils::{sanitize_input, validate_bech32};

/// Request to create and draw a lottery.
///
/// ## Example JSON
///
/// ```json
/// {
///     "poolId": "pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r78g",
///     "name": "February lottery",
///     "startEpoch": 320,
///     "endEpoch": 322,
///     "countEpochs": 2,
///     "drawDate": "2022-02-02T10:00:00",
///     "strategyName": "Stake",
///     "ownersAllowed": false,
///     "minLiveStake": 1000000
/// }
/// ```
///
/// ## Notes
///
/// - `minLiveStake` is in lovelace (1 ADA = 1,000,000); the live stake must
///   be strictly above it
/// - `strategyName` is `Fixed` or `Stake`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLotteryRequest {
    /// Bech32 pool id.
    pub pool_id: String,

    pub name: String,
    pub start_epoch: i64,
    pub end_epoch: i64,

    /// Loyalty lookback and stake averaging window.
    pub count_epochs: i64,

    /// When winners become visible.
    pub draw_date: String,

    pub strategy_name: String,

    #[serde(default)]
    pub owners_allowed: bool,

    #[serde(default)]
    pub min_live_stake: i64,
}

impl CreateLotteryRequest {
    /// Sanitize the string fields and build the service command.
    ///
    /// `poolId` must be a bech32 `pool1...` id.
    pub fn into_command(self) -> Result<CreateLotteryCommand, String> {
        let pool_id = sanitize_input("poolId", &self.pool_id)?;
        validate_bech32(&pool_id, "pool")?;

        Ok(CreateLotteryCommand {
            pool_id,
            name: sanitize_input("name", &self.name)?,
            start_epoch: self.start_epoch,
            end_epoch: self.end_epoch,
            count_epochs: self.count_epochs,
            draw_date: sanitize_input("drawDate", &self.draw_date)?,
            strategy_name: sanitize_input("strategyName", &self.strategy_name)?,
            owners_allowed: self.owners_allowed,
            min_live_stake: self.min_live_stake,
        })
    }
}

/// Pool search.
///
/// ```json
/// { "poolFilter": "hippo" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolFilterRequest {
    /// Exact pool id, or a fragment of the ticker or name.
    pub pool_filter: String,
}

/// Query parameters for `GET /lottery/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LotteryQuery {
    /// Include tickets, and winners once the draw date has passed.
    #[serde(default = "default_detailed")]
    pub detailed: bool,
}

fn default_detailed() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const POOL_ID: &str = "pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r78g";

    fn request(pool_id: &str, name: &str) -> CreateLotteryRequest {
        CreateLotteryRequest {
            pool_id: pool_id.to_string(),
            name: name.to_string(),
            start_epoch: 1,
            end_epoch: 2,
            count_epochs: 1,
            draw_date: "2022-02-02".to_string(),
            strategy_name: "Fixed".to_string(),
            owners_allowed: true,
            min_live_stake: 0,
        }
    }

    #[test]
    fn test_create_lottery_request_defaults() {
        let request: CreateLotteryRequest = serde_json::from_str(
            r#"{
                "poolId": " pool1wx83tmlwtxw5nzn4stz02655pnltllq5apgx2mdc6557zw0r78g ",
                "name": "Test",
                "startEpoch": 306,
                "endEpoch": 308,
                "countEpochs": 2,
                "drawDate": "2022-02-02",
                "strategyName": "Fixed"
            }"#,
        )
        .unwrap();

        assert!(!request.owners_allowed);
        assert_eq!(request.min_live_stake, 0);

        let command = request.into_command().unwrap();
        assert_eq!(command.pool_id, POOL_ID);
    }

    #[test]
    fn test_create_lottery_request_rejects_blank_name() {
        assert_eq!(request(POOL_ID, "  ").into_command().unwrap_err(), "name cannot be empty");
    }

    #[test]
    fn test_create_lottery_request_rejects_non_pool_id() {
        assert!(request("stake1u9yrn7z2g0ynx4wtpqfuv7fj3uuasavtzg6ulfv2f647jhcluzuur", "Test")
            .into_command()
            .is_err());
        assert!(request("ea90b56d9c4d04c583ec728c8b415948b310d4653d12bd281aaff9df", "Test")
            .into_command()
            .is_err());
        assert!(request(POOL_ID, "Test").into_command().is_ok());
    }
}
