//! Helius API client for holder snapshots and wallet activity
//!
//! Provides access to:
//! - Largest token accounts (Solana RPC `getTokenLargestAccounts`)
//! - Token account owners (Solana RPC `getMultipleAccounts`, jsonParsed)
//! - Wallet transaction history (Helius enhanced transactions API)
//!
//! Every response variant is decoded into a typed struct before it is
//! normalized; shapes we don't recognize become `Error::Deserialization`.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::{ActivityRecord, DataProvider, LargestAccount, TokenLeg};

const LAMPORTS_PER_SOL: f64 = 1e9;

/// `getMultipleAccounts` accepts at most this many keys per call
const MAX_ACCOUNTS_PER_CALL: usize = 100;

/// Helius API client
pub struct HeliusClient {
    /// HTTP client
    client: Client,
    /// API key
    api_key: String,
    /// Base URL for REST API
    rest_base_url: String,
    /// Base URL for RPC API
    rpc_base_url: String,
    /// Request timeout
    timeout: Duration,
}

impl HeliusClient {
    /// Create a client with explicit endpoints
    pub fn with_endpoints(
        api_key: String,
        rest_base_url: String,
        rpc_base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            rest_base_url: rest_base_url.trim_end_matches('/').to_string(),
            rpc_base_url,
            timeout,
        })
    }

    /// Issue a JSON-RPC call and decode its result
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "smart-money",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_base_url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| timeout_or_rpc(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rpc(format!("{} HTTP {}: {}", method, status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Rpc(format!("{} body read failed: {}", method, e)))?;

        decode_rpc_envelope(method, &body)
    }
}

/// Extract `api-key=...` from a Helius URL
pub fn api_key_from_url(url: &str) -> Option<String> {
    let key_start = url.find("api-key=")?;
    let key = &url[key_start + 8..];
    let key = key.split('&').next().unwrap_or(key);
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

fn timeout_or_rpc(e: reqwest::Error, timeout: Duration) -> Error {
    if e.is_timeout() {
        Error::RpcTimeout(timeout.as_millis() as u64)
    } else {
        Error::Rpc(format!("Helius request failed: {}", e))
    }
}

#[async_trait]
impl DataProvider for HeliusClient {
    async fn get_largest_holders(&self, token: &str) -> Result<Vec<LargestAccount>> {
        debug!(mint = %token, "Fetching largest token accounts");

        let result: RpcValue<Vec<LargestAccountEntry>> = self
            .rpc_call("getTokenLargestAccounts", serde_json::json!([token]))
            .await?;

        Ok(normalize_largest_accounts(result.value))
    }

    async fn resolve_owners(&self, token_accounts: &[String]) -> Result<HashMap<String, String>> {
        let mut owners = HashMap::new();

        for chunk in token_accounts.chunks(MAX_ACCOUNTS_PER_CALL) {
            debug!(accounts = chunk.len(), "Resolving token account owners");

            let result: RpcValue<Vec<Option<AccountEntry>>> = self
                .rpc_call(
                    "getMultipleAccounts",
                    serde_json::json!([chunk, { "encoding": "jsonParsed" }]),
                )
                .await?;

            owners.extend(normalize_owners(chunk, result.value));
        }

        Ok(owners)
    }

    async fn get_wallet_activity(&self, wallet: &str, limit: u32) -> Result<Vec<ActivityRecord>> {
        let url = format!(
            "{}/v0/addresses/{}/transactions?api-key={}&limit={}",
            self.rest_base_url, wallet, self.api_key, limit
        );

        debug!(wallet = %wallet, limit, "Fetching wallet activity");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| timeout_or_rpc(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rpc(format!("Helius API error {}: {}", status, body)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Rpc(format!("Helius body read failed: {}", e)))?;

        decode_activity(wallet, &body)
    }
}

/// Decode a JSON-RPC envelope into its result, or the error it carries
fn decode_rpc_envelope<T: DeserializeOwned>(method: &str, body: &str) -> Result<T> {
    let envelope: RpcEnvelope<T> = serde_json::from_str(body).map_err(|e| {
        Error::Deserialization(format!("Unrecognized {} response: {}", method, e))
    })?;

    match envelope {
        RpcEnvelope::Success { result } => Ok(result),
        RpcEnvelope::Failure { error } => Err(Error::Rpc(format!(
            "{} failed ({}): {}",
            method, error.code, error.message
        ))),
    }
}

fn normalize_largest_accounts(entries: Vec<LargestAccountEntry>) -> Vec<LargestAccount> {
    entries
        .into_iter()
        .filter(|entry| !entry.address.is_empty())
        .map(|entry| LargestAccount {
            amount: entry.ui_amount(),
            token_account: entry.address,
        })
        .collect()
}

fn normalize_owners(accounts: &[String], entries: Vec<Option<AccountEntry>>) -> HashMap<String, String> {
    accounts
        .iter()
        .zip(entries)
        .filter_map(|(account, entry)| {
            let owner = entry?.owner()?;
            Some((account.clone(), owner))
        })
        .collect()
}

/// Decode an enhanced transactions response for `wallet`
fn decode_activity(wallet: &str, body: &str) -> Result<Vec<ActivityRecord>> {
    let response: EnhancedTransactionsResponse = serde_json::from_str(body).map_err(|e| {
        Error::Deserialization(format!("Unrecognized transactions response: {}", e))
    })?;

    match response {
        EnhancedTransactionsResponse::Transactions(transactions) => Ok(transactions
            .into_iter()
            .map(|tx| tx.into_record(wallet))
            .collect()),
        EnhancedTransactionsResponse::Error { error } => {
            Err(Error::Rpc(format!("Helius API error: {}", error)))
        }
    }
}

// ============ Helius API Response Types ============
// These structs are for API deserialization - not all fields are used but are required for parsing

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcEnvelope<T> {
    Success { result: T },
    Failure { error: RpcError },
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcValue<T> {
    value: T,
}

/// Amounts arrive as JSON numbers or decimal strings depending on the endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LargestAccountEntry {
    address: String,
    #[serde(default)]
    amount: Option<NumberOrString>,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default)]
    ui_amount: Option<f64>,
    #[serde(default)]
    ui_amount_string: Option<String>,
}

impl LargestAccountEntry {
    fn ui_amount(&self) -> f64 {
        if let Some(ui) = self.ui_amount {
            return ui;
        }
        if let Some(ui) = self.ui_amount_string.as_deref().and_then(|s| s.parse().ok()) {
            return ui;
        }
        let raw = self.amount.as_ref().and_then(NumberOrString::as_f64).unwrap_or(0.0);
        raw / 10f64.powi(self.decimals.unwrap_or(0) as i32)
    }
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    data: AccountData,
}

impl AccountEntry {
    fn owner(self) -> Option<String> {
        match self.data {
            AccountData::Parsed { parsed } => parsed
                .info
                .and_then(|info| info.owner)
                .filter(|owner| !owner.is_empty()),
            // Binary or unknown payloads mean the account is not an SPL token account
            AccountData::Unparsed(IgnoredAny) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountData {
    Parsed { parsed: ParsedAccount },
    Unparsed(IgnoredAny),
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    info: Option<ParsedAccountInfo>,
}

#[derive(Debug, Deserialize)]
struct ParsedAccountInfo {
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnhancedTransactionsResponse {
    Transactions(Vec<EnhancedTransaction>),
    Error { error: String },
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnhancedTransaction {
    #[serde(default)]
    signature: String,
    #[serde(rename = "type", default)]
    tx_type: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    account_data: Vec<AccountDataChange>,
    #[serde(default)]
    token_transfers: Vec<TokenTransfer>,
}

impl EnhancedTransaction {
    fn into_record(self, wallet: &str) -> ActivityRecord {
        // Last matching entry wins if the wallet appears more than once
        let native_delta = self
            .account_data
            .iter()
            .rev()
            .find(|change| change.account == wallet)
            .map(|change| change.native_balance_change as f64 / LAMPORTS_PER_SOL)
            .unwrap_or(0.0);

        let token_legs = self
            .token_transfers
            .into_iter()
            .map(|transfer| TokenLeg {
                amount: transfer
                    .token_amount
                    .as_ref()
                    .and_then(NumberOrString::as_f64)
                    .unwrap_or(0.0),
                mint: transfer.mint,
                from_owner: transfer.from_user_account.filter(|a| !a.is_empty()),
                to_owner: transfer.to_user_account.filter(|a| !a.is_empty()),
            })
            .collect();

        ActivityRecord {
            signature: self.signature,
            timestamp: self.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            native_delta,
            token_legs,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountDataChange {
    #[serde(default)]
    account: String,
    #[serde(default)]
    native_balance_change: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenTransfer {
    #[serde(default)]
    from_user_account: Option<String>,
    #[serde(default)]
    to_user_account: Option<String>,
    #[serde(default)]
    mint: String,
    #[serde(default)]
    token_amount: Option<NumberOrString>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_from_url() {
        assert_eq!(
            api_key_from_url("https://mainnet.helius-rpc.com/?api-key=test123"),
            Some("test123".into())
        );
        assert_eq!(api_key_from_url("https://api.mainnet-beta.solana.com"), None);
        assert_eq!(api_key_from_url("https://x/?api-key=&foo=1"), None);
        assert_eq!(api_key_from_url("https://x/?api-key=abc&foo=1"), Some("abc".into()));
    }

    #[test]
    fn test_decode_largest_accounts() {
        let body = r#"{
            "jsonrpc": "2.0", "id": 1,
            "result": {
                "context": { "slot": 1 },
                "value": [
                    { "address": "Acc1", "amount": "5000000", "decimals": 6, "uiAmount": 5.0, "uiAmountString": "5" },
                    { "address": "Acc2", "amount": "2500000", "decimals": 6, "uiAmount": null, "uiAmountString": "2.5" },
                    { "address": "Acc3", "amount": "1000000", "decimals": 6 }
                ]
            }
        }"#;

        let value: RpcValue<Vec<LargestAccountEntry>> =
            decode_rpc_envelope("getTokenLargestAccounts", body).unwrap();
        let accounts = normalize_largest_accounts(value.value);

        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[0].token_account, "Acc1");
        assert_eq!(accounts[0].amount, 5.0);
        assert_eq!(accounts[1].amount, 2.5);
        assert_eq!(accounts[2].amount, 1.0);
    }

    #[test]
    fn test_decode_rpc_error_envelope() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param"}}"#;
        let err = decode_rpc_envelope::<RpcValue<Vec<LargestAccountEntry>>>("getTokenLargestAccounts", body)
            .unwrap_err();
        assert!(matches!(err, Error::Rpc(ref m) if m.contains("Invalid param")));
    }

    #[test]
    fn test_decode_unrecognized_shape() {
        let err = decode_rpc_envelope::<RpcValue<Vec<LargestAccountEntry>>>("getTokenLargestAccounts", "[1,2,3]")
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn test_decode_owners_mixed_variants() {
        let body = r#"{
            "jsonrpc": "2.0", "id": 1,
            "result": {
                "context": { "slot": 1 },
                "value": [
                    { "data": { "parsed": { "info": { "owner": "OwnerA", "mint": "M" }, "type": "account" }, "program": "spl-token" }, "owner": "Tokenkeg" },
                    null,
                    { "data": ["AAAA", "base64"], "owner": "11111111111111111111111111111111" },
                    { "data": { "parsed": { "type": "mint" } } }
                ]
            }
        }"#;

        let accounts: Vec<String> = ["Acc1", "Acc2", "Acc3", "Acc4"].iter().map(|s| s.to_string()).collect();
        let value: RpcValue<Vec<Option<AccountEntry>>> =
            decode_rpc_envelope("getMultipleAccounts", body).unwrap();
        let owners = normalize_owners(&accounts, value.value);

        assert_eq!(owners.len(), 1);
        assert_eq!(owners.get("Acc1").map(String::as_str), Some("OwnerA"));
    }

    #[test]
    fn test_decode_activity() {
        let body = r#"[
            {
                "signature": "sig1",
                "type": "SWAP",
                "timestamp": 1700000000,
                "accountData": [
                    { "account": "Wallet", "nativeBalanceChange": -2000000000, "tokenBalanceChanges": [] },
                    { "account": "Pool", "nativeBalanceChange": 2000000000 }
                ],
                "tokenTransfers": [
                    { "fromUserAccount": "Pool", "toUserAccount": "Wallet", "mint": "MintA", "tokenAmount": 50 }
                ]
            },
            {
                "signature": "sig2",
                "tokenTransfers": [
                    { "fromUserAccount": "Wallet", "toUserAccount": "", "mint": "MintB", "tokenAmount": "12.5" }
                ]
            }
        ]"#;

        let records = decode_activity("Wallet", body).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].signature, "sig1");
        assert!((records[0].native_delta + 2.0).abs() < 1e-9);
        assert_eq!(records[0].timestamp.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(records[0].token_legs[0].to_owner.as_deref(), Some("Wallet"));
        assert_eq!(records[0].token_legs[0].amount, 50.0);

        assert_eq!(records[1].native_delta, 0.0);
        assert_eq!(records[1].token_legs[0].to_owner, None);
        assert_eq!(records[1].token_legs[0].amount, 12.5);
    }

    #[test]
    fn test_decode_activity_error_object() {
        let err = decode_activity("Wallet", r#"{"error":"rate limited"}"#).unwrap_err();
        assert!(matches!(err, Error::Rpc(ref m) if m.contains("rate limited")));

        let err = decode_activity("Wallet", r#"{"unexpected":true}"#).unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
