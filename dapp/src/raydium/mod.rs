//! Raydium trade API integration
//!
//! [`RaydiumClient`] talks to the quote, transaction build, priority fee and
//! mint metadata endpoints. [`SwapOrchestrator`] drives a full swap against
//! any [`SwapApi`](crate::protocol::SwapApi) implementation.

pub mod client;
pub mod swap;
pub mod types;

pub use client::RaydiumClient;
pub use swap::SwapOrchestrator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DappError, Result};
    use crate::protocol::SwapRequest;
    use mockito::{Matcher, Server, ServerGuard};
    use rayswap_core::config::{ApiSettings, DEFAULT_FEE_RESERVE_LAMPORTS};
    use rayswap_core::testing::{unsigned_payload, MockLedger};
    use rayswap_core::token::{native_mint, OnChainMintMetadata};
    use rayswap_core::{Wallet, WalletIdentity};
    use serde_json::json;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use std::sync::Arc;

    struct Harness {
        server: ServerGuard,
        ledger: Arc<MockLedger>,
        orchestrator: SwapOrchestrator,
        usdc: Pubkey,
    }

    async fn harness() -> Harness {
        let server = Server::new_async().await;
        let settings = ApiSettings {
            swap_host: server.url(),
            api_host: server.url(),
            price_url: format!("{}/price", server.url()),
            ..ApiSettings::default()
        };
        let ledger = Arc::new(MockLedger::new());
        let wallet = Wallet::new(
            WalletIdentity::from_keypair(Keypair::new()),
            ledger.clone(),
            Arc::new(OnChainMintMetadata::new(ledger.clone())),
            DEFAULT_FEE_RESERVE_LAMPORTS,
        );
        let usdc = Pubkey::new_unique();
        ledger.set_lamports(wallet.address(), 1_000_000_000);
        ledger.set_token_balance(wallet.address(), usdc, 5_000_000).unwrap();

        Harness {
            orchestrator: SwapOrchestrator::new(wallet, Arc::new(RaydiumClient::new(&settings).unwrap())),
            server,
            ledger,
            usdc,
        }
    }

    async fn mock_fee_and_quote(server: &mut ServerGuard) {
        server
            .mock("GET", "/main/auto-fee")
            .with_body(r#"{"id":"f","success":true,"data":{"default":{"vh":30000,"h":15000,"m":10000}}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/compute/swap-base-in")
            .match_query(Matcher::Any)
            .with_body(r#"{"id":"q","success":true,"version":"V1","data":{"inputAmount":"1000000","outputAmount":"6543210"}}"#)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_usdc_to_sol_submits_both_transactions_in_order() -> Result<()> {
        let mut h = harness().await;
        let payer = h.orchestrator.wallet().address();
        let first = unsigned_payload(&payer, 1)?;
        let second = unsigned_payload(&payer, 2)?;

        mock_fee_and_quote(&mut h.server).await;
        let build = h
            .server
            .mock("POST", "/transaction/swap-base-in")
            .match_body(Matcher::PartialJson(json!({
                "computeUnitPriceMicroLamports": "15000",
                "wallet": payer.to_string(),
                "wrapSol": false,
                "unwrapSol": true,
            })))
            .with_body(
                json!({"id": "b", "success": true, "version": "V1", "data": [
                    {"transaction": first.as_base64()},
                    {"transaction": second.as_base64()}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let request = SwapRequest::new(h.usdc, native_mint(), 1_000_000, 100);
        let result = h.orchestrator.swap(&request).await?;

        let sent = h.ledger.sent();
        assert_eq!(result.signatures.len(), 2);
        assert_eq!(sent.len(), 2);
        assert_eq!(result.signatures[0], sent[0].signatures[0]);
        assert_eq!(result.signatures[1], sent[1].signatures[0]);
        assert!(sent.iter().all(|tx| tx.verify_with_results().iter().all(|ok| *ok)));
        build.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_route_not_found_is_build_failure() {
        let mut h = harness().await;
        mock_fee_and_quote(&mut h.server).await;
        h.server
            .mock("POST", "/transaction/swap-base-in")
            .with_body(r#"{"id":"b","success":false,"version":"V1","msg":"route not found"}"#)
            .create_async()
            .await;

        let request = SwapRequest::new(h.usdc, native_mint(), 1_000_000, 100);
        let err = h.orchestrator.swap(&request).await.unwrap_err();

        assert!(matches!(err, DappError::BuildFailed(ref msg) if msg.contains("route not found")));
        assert_eq!(h.ledger.send_calls(), 0);
    }
}
