use crate::{
    ApplicationId, CardId, CardTransactionId, FraudAlertId, ReferenceNumber,
    TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Generic response for operations that only need to confirm success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMessage {
    pub message: String,
}

/// Result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub message: String,
    pub transaction_id: TransactionId,
    pub reference: ReferenceNumber,
}

/// Result of a deposit, withdrawal or balance adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceMovement {
    pub message: String,
    /// None when an adjustment turned out to be a no-op.
    pub transaction_id: Option<TransactionId>,
    pub account: crate::Account,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReceived {
    pub message: String,
    pub application_id: ApplicationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardIssued {
    pub message: String,
    pub card_id: CardId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPurchaseReceipt {
    pub message: String,
    pub card_transaction_id: CardTransactionId,
    pub authorization_code: String,
    pub available_limit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckResult {
    pub message: String,
    pub score: i16,
    pub triggered_rules: Vec<String>,
    pub alert_id: Option<FraudAlertId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBackfillResult {
    pub transactions_examined: usize,
    pub entries_written: u64,
    pub failures: usize,
}
