//! Wire types shared by the api server, its integration tests and any other
//! client of the bank simulation API.
//!
//! Row types derive `sqlx::FromRow` only with the `use-sqlx` feature, so the
//! column mapping is fixed at compile time and the crate stays usable without
//! a database driver.

pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError};

use derive_more::Display;
use jiff::Timestamp;
#[cfg(feature = "use-sqlx")]
use jiff_sqlx::Timestamp as SqlxTs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id type wrapper helps ensure we don't mix up ids for different tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct UserId(pub Uuid);

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    Serialize,
    Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct AccountId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct TransactionId(pub Uuid);

/// Caller-visible identifier of a money movement, distinct from the internal
/// transaction id. Unique across all transactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct ReferenceNumber(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct LedgerEntryId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct ApplicationId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct CardId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct CardTransactionId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct FraudRuleId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "use-sqlx", sqlx(transparent))]
pub struct FraudAlertId(pub Uuid);

/// Nullable timestamp column. sqlx can't decode `Option<jiff_sqlx::Timestamp>`
/// into `Option<jiff::Timestamp>` directly, so rows go through this wrapper.
#[cfg(feature = "use-sqlx")]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct OptionalTimestamp(Option<SqlxTs>);

#[cfg(feature = "use-sqlx")]
impl From<OptionalTimestamp> for Option<Timestamp> {
    fn from(value: OptionalTimestamp) -> Self {
        value.0.map(Timestamp::from)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "currency", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[display("TRY")]
    Try,
    #[display("USD")]
    Usd,
    #[display("EUR")]
    Eur,
    #[display("GBP")]
    Gbp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "account_type", rename_all = "snake_case")
)]
pub enum AccountType {
    Checking,
    Savings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "account_status", rename_all = "snake_case")
)]
pub enum AccountStatus {
    Active,
    Frozen,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "transaction_type", rename_all = "snake_case")
)]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
    /// Administrative balance correction. Single-sided, always auditable.
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "transaction_status", rename_all = "snake_case")
)]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Reversed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "ledger_entry_type", rename_all = "snake_case")
)]
pub enum LedgerEntryType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "user_status", rename_all = "snake_case")
)]
pub enum UserStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "card_prestige_level", rename_all = "snake_case")
)]
pub enum CardPrestigeLevel {
    Classic,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "employment_status", rename_all = "snake_case")
)]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Unemployed,
    Retired,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "application_status", rename_all = "snake_case")
)]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "card_brand", rename_all = "snake_case")
)]
pub enum CardBrand {
    Visa,
    Mastercard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "card_status", rename_all = "snake_case")
)]
pub enum CardStatus {
    Active,
    Blocked,
    Expired,
    Cancelled,
}

/// Card-level sub-limits, seeded when a card is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "card_limit_type", rename_all = "snake_case")
)]
pub enum CardLimitType {
    OnlineShopping,
    Contactless,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "card_channel", rename_all = "snake_case")
)]
pub enum CardChannel {
    InStore,
    Online,
    Contactless,
}

impl CardChannel {
    /// The sub-limit a purchase on this channel draws from, if any.
    pub fn limit_type(&self) -> Option<CardLimitType> {
        match self {
            Self::InStore => None,
            Self::Online => Some(CardLimitType::OnlineShopping),
            Self::Contactless => Some(CardLimitType::Contactless),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "fraud_rule_type", rename_all = "snake_case")
)]
pub enum FraudRuleType {
    /// Triggers when the transaction amount exceeds the rule threshold.
    AmountAnomaly,
    /// Triggers when the source account initiated more than `threshold`
    /// transactions within the preceding hour.
    Velocity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "alert_severity", rename_all = "snake_case")
)]
pub enum AlertSeverity {
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "use-sqlx",
    sqlx(type_name = "alert_status", rename_all = "snake_case")
)]
pub enum AlertStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: UserStatus,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    /// IBAN-formatted, unique.
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub balance: Decimal,
    /// Balance minus holds. There is no hold mechanism, so this tracks
    /// `balance` in lockstep, but it is the figure transfers are checked
    /// against.
    pub available_balance: Decimal,
    pub daily_transfer_limit: Decimal,
    pub daily_withdrawal_limit: Decimal,
    pub status: AccountStatus,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub reference_number: ReferenceNumber,
    /// None for deposits and credit adjustments.
    pub from_account_id: Option<AccountId>,
    /// None for withdrawals and debit adjustments.
    pub to_account_id: Option<AccountId>,
    pub amount: Decimal,
    pub currency: Currency,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub description: Option<String>,
    /// 0-100, written by the fraud scorer after commit.
    pub fraud_score: i16,
    pub is_suspicious: bool,
    pub reported_to_masak: bool,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub entry_type: LedgerEntryType,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub description: Option<String>,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CardApplication {
    pub id: ApplicationId,
    pub user_id: UserId,
    pub card_type_requested: CardPrestigeLevel,
    pub monthly_income: Decimal,
    pub employment_status: EmploymentStatus,
    pub employer_name: Option<String>,
    pub status: ApplicationStatus,
    pub approved_by: Option<UserId>,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "OptionalTimestamp"))]
    pub approved_at: Option<Timestamp>,
    pub credit_limit_approved: Option<Decimal>,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

/// A credit card as exposed over the API. The stored digest of the full card
/// number never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CreditCard {
    pub id: CardId,
    pub user_id: UserId,
    pub application_id: ApplicationId,
    pub card_last_four: String,
    pub card_brand: CardBrand,
    pub card_type: CardPrestigeLevel,
    pub credit_limit: Decimal,
    pub available_limit: Decimal,
    pub current_balance: Decimal,
    pub expiry_month: i16,
    pub expiry_year: i16,
    pub status: CardStatus,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub payment_due_at: Timestamp,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub issued_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CardLimit {
    pub card_id: CardId,
    pub limit_type: CardLimitType,
    pub limit_amount: Decimal,
    pub used_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CardTransaction {
    pub id: CardTransactionId,
    pub card_id: CardId,
    pub merchant_name: String,
    pub channel: CardChannel,
    pub amount: Decimal,
    pub currency: Currency,
    pub authorization_code: String,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct FraudRule {
    pub id: FraudRuleId,
    pub rule_name: String,
    pub rule_type: FraudRuleType,
    pub description: Option<String>,
    pub threshold: Decimal,
    pub risk_score_weight: i32,
    pub is_active: bool,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    pub id: FraudAlertId,
    pub user_id: Option<UserId>,
    pub transaction_id: TransactionId,
    pub fraud_score: i16,
    /// Comma separated rule names.
    pub triggered_rules: String,
    pub alert_severity: AlertSeverity,
    pub status: AlertStatus,
    #[cfg_attr(feature = "use-sqlx", sqlx(try_from = "SqlxTs"))]
    pub created_at: Timestamp,
}
