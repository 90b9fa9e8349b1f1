use crate::{
    Account, AccountId, ApplicationId, CardApplication, CardId, CardLimit,
    CreditCard, FraudAlert, FraudRule, LedgerEntry, Transaction,
    TransactionId, User, UserId, requests, responses,
};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// Header carrying the acting user's id.
pub const PRINCIPAL_HEADER: &str = "X-User-Id";

/// An API client for interfacing with the backend.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .post(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        self.inner_client.post(self.format_url(path)).send().await
    }

    async fn put(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.inner_client
            .put(self.format_url(path))
            .json(body)
            .send()
            .await
    }

    async fn empty_get(&self, path: &str) -> ReqwestResult {
        self.inner_client.get(self.format_url(path)).send().await
    }
}

/// Methods on the backend API
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.empty_get("health_check").await?;
        ok_empty(response).await
    }

    pub async fn create_user(
        &self,
        details: &requests::CreateUser,
    ) -> Result<User, ClientError> {
        let response = self.post("users", details).await?;
        ok_body(response).await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<User, ClientError> {
        let response = self.empty_get(&format!("users/{user_id}")).await?;
        ok_body(response).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ClientError> {
        let response = self.empty_get("users").await?;
        ok_body(response).await
    }

    pub async fn create_account(
        &self,
        details: &requests::CreateAccount,
    ) -> Result<Account, ClientError> {
        let response = self.post("accounts", details).await?;
        ok_body(response).await
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, ClientError> {
        let response = self.empty_get("accounts").await?;
        ok_body(response).await
    }

    pub async fn get_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Account, ClientError> {
        let response =
            self.empty_get(&format!("accounts/{account_id}")).await?;
        ok_body(response).await
    }

    pub async fn get_accounts_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Account>, ClientError> {
        let response =
            self.empty_get(&format!("accounts/user/{user_id}")).await?;
        ok_body(response).await
    }

    pub async fn deposit(
        &self,
        account_id: &AccountId,
        details: &requests::CashMovement,
    ) -> Result<responses::BalanceMovement, ClientError> {
        let response = self
            .post(&format!("accounts/{account_id}/deposit"), details)
            .await?;
        ok_body(response).await
    }

    pub async fn withdraw(
        &self,
        account_id: &AccountId,
        details: &requests::CashMovement,
    ) -> Result<responses::BalanceMovement, ClientError> {
        let response = self
            .post(&format!("accounts/{account_id}/withdraw"), details)
            .await?;
        ok_body(response).await
    }

    pub async fn update_account_status(
        &self,
        account_id: &AccountId,
        details: &requests::UpdateAccountStatus,
    ) -> Result<Account, ClientError> {
        let response = self
            .put(&format!("accounts/{account_id}/status"), details)
            .await?;
        ok_body(response).await
    }

    /// Administrative correction, booked as an Adjustment transaction.
    pub async fn update_balance(
        &self,
        account_id: &AccountId,
        details: &requests::UpdateBalance,
    ) -> Result<responses::BalanceMovement, ClientError> {
        let response = self
            .put(&format!("accounts/{account_id}/balance"), details)
            .await?;
        ok_body(response).await
    }

    pub async fn transfer(
        &self,
        details: &requests::Transfer,
    ) -> Result<responses::TransferReceipt, ClientError> {
        let response = self.post("transactions/transfer", details).await?;
        ok_body(response).await
    }

    pub async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Transaction, ClientError> {
        let response = self
            .empty_get(&format!("transactions/{transaction_id}"))
            .await?;
        ok_body(response).await
    }

    /// Newest first.
    pub async fn get_transactions_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<Transaction>, ClientError> {
        let response = self
            .empty_get(&format!("transactions/account/{account_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_ledger_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Vec<LedgerEntry>, ClientError> {
        let response = self
            .empty_get(&format!("ledger/transaction/{transaction_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_ledger_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Vec<LedgerEntry>, ClientError> {
        let response = self
            .empty_get(&format!("ledger/account/{account_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn backfill_ledger(
        &self,
    ) -> Result<responses::LedgerBackfillResult, ClientError> {
        let response = self.empty_post("ledger/backfill").await?;
        ok_body(response).await
    }

    pub async fn apply_for_card(
        &self,
        details: &requests::CardApplication,
    ) -> Result<responses::ApplicationReceived, ClientError> {
        let response = self.post("application/apply", details).await?;
        ok_body(response).await
    }

    pub async fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<CardApplication, ClientError> {
        let response = self
            .empty_get(&format!("application/{application_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_applications_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<CardApplication>, ClientError> {
        let response = self
            .empty_get(&format!("application/user/{user_id}"))
            .await?;
        ok_body(response).await
    }

    /// Approve a pending application. `approver` is sent as the acting
    /// principal and recorded on the application.
    pub async fn approve_application(
        &self,
        application_id: &ApplicationId,
        approved_limit: rust_decimal::Decimal,
        approver: Option<&UserId>,
    ) -> Result<responses::CardIssued, ClientError> {
        let mut request = self
            .inner_client
            .post(self.format_url(&format!(
                "application/approve/{application_id}"
            )))
            .query(&requests::ApproveApplication { approved_limit });
        if let Some(approver) = approver {
            request = request.header(PRINCIPAL_HEADER, approver.to_string());
        }
        let response = request.send().await?;
        ok_body(response).await
    }

    pub async fn reject_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<responses::SuccessMessage, ClientError> {
        let response = self
            .empty_post(&format!("application/reject/{application_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_cards_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<CreditCard>, ClientError> {
        let response = self
            .empty_get(&format!("payments/cards/user/{user_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_card_limits(
        &self,
        card_id: &CardId,
    ) -> Result<Vec<CardLimit>, ClientError> {
        let response = self
            .empty_get(&format!("payments/cards/{card_id}/limits"))
            .await?;
        ok_body(response).await
    }

    pub async fn card_purchase(
        &self,
        details: &requests::CardPurchase,
    ) -> Result<responses::CardPurchaseReceipt, ClientError> {
        let response = self.post("payments/transaction", details).await?;
        ok_body(response).await
    }

    pub async fn create_fraud_rule(
        &self,
        details: &requests::CreateFraudRule,
    ) -> Result<FraudRule, ClientError> {
        let response = self.post("fraud/rules", details).await?;
        ok_body(response).await
    }

    pub async fn list_fraud_rules(&self) -> Result<Vec<FraudRule>, ClientError> {
        let response = self.empty_get("fraud/rules").await?;
        ok_body(response).await
    }

    pub async fn check_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<responses::FraudCheckResult, ClientError> {
        let response = self
            .empty_post(&format!("fraud/check-transaction/{transaction_id}"))
            .await?;
        ok_body(response).await
    }

    pub async fn get_alerts_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Vec<FraudAlert>, ClientError> {
        let response = self
            .empty_get(&format!("fraud/alerts/transaction/{transaction_id}"))
            .await?;
        ok_body(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
