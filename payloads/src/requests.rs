use crate::{
    AccountId, AccountStatus, AccountType, CardChannel, CardId,
    CardPrestigeLevel, Currency, EmploymentStatus, FraudRuleType,
    ReferenceNumber, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const EMAIL_MAX_LEN: usize = 255;
pub const NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const MERCHANT_NAME_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccount {
    pub user_id: UserId,
    /// Generated when omitted.
    pub account_number: Option<String>,
    pub account_type: AccountType,
    pub currency: Currency,
    pub daily_transfer_limit: Option<Decimal>,
    pub daily_withdrawal_limit: Option<Decimal>,
    /// Booked as a Deposit transaction so the opening balance is auditable.
    pub opening_deposit: Option<Decimal>,
}

/// Administrative balance correction. Booked as an Adjustment transaction
/// for the difference rather than overwriting the balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBalance {
    pub new_balance: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountStatus {
    pub status: AccountStatus,
}

/// Body for deposits and withdrawals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashMovement {
    pub amount: Decimal,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Lets a caller retry safely: a repeated reference with identical
    /// parameters returns the original receipt instead of moving money again.
    pub reference: Option<ReferenceNumber>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardApplication {
    pub user_id: UserId,
    pub card_type_requested: CardPrestigeLevel,
    pub monthly_income: Decimal,
    pub employment_status: EmploymentStatus,
    pub employer_name: Option<String>,
}

/// Query string of `POST /application/approve/{applicationId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveApplication {
    pub approved_limit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPurchase {
    pub card_id: CardId,
    pub amount: Decimal,
    pub merchant_name: String,
    pub channel: CardChannel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFraudRule {
    pub rule_name: String,
    pub rule_type: FraudRuleType,
    pub description: Option<String>,
    /// Defaults per rule type when omitted.
    pub threshold: Option<Decimal>,
    pub risk_score_weight: i32,
}
