//! Raydium and price API wire formats

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Common response envelope of the Raydium APIs
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Request id
    pub id: Option<String>,
    /// Whether the API handled the request
    #[serde(default)]
    pub success: bool,
    /// API version
    pub version: Option<String>,
    /// Payload, present on success
    pub data: Option<T>,
    /// Failure reason, present on failure
    pub msg: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Payload on success, otherwise the API's failure message
    pub fn into_result(self) -> std::result::Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(self.msg.unwrap_or_else(|| "response carried no data".to_string())),
            (false, _) => Err(self.msg.unwrap_or_else(|| "request failed".to_string())),
        }
    }
}

/// Priority fee tiers
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityFeeData {
    /// Tiers of the default fee schedule
    pub default: FeeTiers,
}

/// Fee estimates in micro-lamports per compute unit
#[derive(Debug, Clone, Deserialize)]
pub struct FeeTiers {
    /// Recommended estimate
    #[serde(alias = "h")]
    pub estimate: u64,
}

/// Priority fee response. The fee endpoint omits `success`, so it is not an [`ApiEnvelope`].
#[derive(Debug, Clone, Deserialize)]
pub struct PriorityFeeResponse {
    /// Fee schedule
    pub data: PriorityFeeData,
}

/// Body of the transaction build request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSwapBody<'a> {
    /// Priority fee, decimal string
    pub compute_unit_price_micro_lamports: String,
    /// Quote response, verbatim
    pub swap_response: &'a Value,
    /// `V0` or `LEGACY`
    pub tx_version: &'a str,
    /// Signer and fee payer
    pub wallet: String,
    /// Wrap native SOL for the input
    pub wrap_sol: bool,
    /// Unwrap the output into native SOL
    pub unwrap_sol: bool,
    /// Input token account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_account: Option<String>,
    /// Output token account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_account: Option<String>,
}

/// One built transaction
#[derive(Debug, Clone, Deserialize)]
pub struct BuiltTransactionItem {
    /// Base64 serialized transaction
    pub transaction: String,
}

/// Price API response, keyed by token id
#[derive(Debug, Clone, Deserialize)]
pub struct PriceResponse {
    /// Price per requested token; `null` for unknown tokens
    pub data: HashMap<String, Option<PriceEntry>>,
}

/// Price of one token
#[derive(Debug, Clone, Deserialize)]
pub struct PriceEntry {
    /// Price in USD
    #[serde(deserialize_with = "number_or_string")]
    pub price: f64,
}

/// Mint metadata record
#[derive(Debug, Clone, Deserialize)]
pub struct MintRecord {
    /// Mint address
    pub address: String,
    /// Decimals
    pub decimals: u8,
    /// Ticker symbol
    #[serde(default)]
    pub symbol: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("price is not representable as f64")),
        Value::String(s) => s
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid price {:?}: {}", s, e))),
        other => Err(D::Error::custom(format!("unexpected price value: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_failure_carries_message() {
        let envelope: ApiEnvelope<Vec<BuiltTransactionItem>> =
            serde_json::from_value(json!({"id": "x", "success": false, "version": "V1", "msg": "route not found"}))
                .unwrap();

        assert_eq!(envelope.into_result().unwrap_err(), "route not found");
    }

    #[test]
    fn test_fee_accepts_raydium_tier_name() {
        let explicit: PriorityFeeResponse =
            serde_json::from_value(json!({"data": {"default": {"estimate": 5000}}})).unwrap();
        let raydium: PriorityFeeResponse =
            serde_json::from_value(json!({"id": "a", "success": true, "data": {"default": {"vh": 9000, "h": 7000, "m": 3000}}}))
                .unwrap();

        assert_eq!(explicit.data.default.estimate, 5000);
        assert_eq!(raydium.data.default.estimate, 7000);
    }

    #[test]
    fn test_price_number_or_string() {
        let response: PriceResponse = serde_json::from_value(json!({
            "data": {
                "A": {"id": "A", "price": "142.5"},
                "B": {"id": "B", "price": 0.999},
                "C": null
            }
        }))
        .unwrap();

        assert_eq!(response.data["A"].as_ref().map(|e| e.price), Some(142.5));
        assert_eq!(response.data["B"].as_ref().map(|e| e.price), Some(0.999));
        assert!(response.data["C"].is_none());
    }

    #[test]
    fn test_build_body_omits_absent_accounts() {
        let quote = json!({"success": true});
        let body = BuildSwapBody {
            compute_unit_price_micro_lamports: "5000".into(),
            swap_response: &quote,
            tx_version: "V0",
            wallet: "W".into(),
            wrap_sol: false,
            unwrap_sol: true,
            input_account: Some("I".into()),
            output_account: None,
        };

        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["computeUnitPriceMicroLamports"], "5000");
        assert_eq!(value["unwrapSol"], true);
        assert_eq!(value["inputAccount"], "I");
        assert!(value.get("outputAccount").is_none());
    }
}
