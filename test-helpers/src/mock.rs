//! Demo data for the development server.
//!
//! Two customers with funded accounts, a few transfers between them, an
//! issued card with a purchase on it, and the default fraud rules. Everything
//! goes through the public API so balances, transactions and ledger rows
//! agree with each other.

use crate::{TestApp, transfer_details};
use anyhow::Result;
use jiff::{Span, Timestamp};
use payloads::{
    Account, CardChannel, CreditCard, Currency, FraudRuleType, User,
    requests,
};
use rust_decimal::dec;

pub struct DevDataset {
    pub alice: User,
    pub bob: User,
    pub alice_checking: Account,
    pub alice_savings_eur: Account,
    pub bob_checking: Account,
    pub alice_card: CreditCard,
}

impl DevDataset {
    pub async fn create(app: &TestApp) -> Result<Self> {
        // start yesterday so today's daily limits are untouched
        app.time_source.set(Timestamp::now() - Span::new().hours(24));

        tracing::info!("👤 Creating customers");
        let alice = app.create_test_user("Alice").await?;
        let bob = app.create_test_user("Bob").await?;

        tracing::info!("🏦 Opening accounts");
        let alice_checking =
            app.create_funded_account(&alice.id, dec!(25000)).await?;
        let alice_savings_eur = app
            .create_account_in(&alice.id, Currency::Eur, dec!(1200))
            .await?;
        let bob_checking = app.create_funded_account(&bob.id, dec!(3000)).await?;

        tracing::info!("💸 Moving money around");
        for amount in [dec!(250), dec!(1200.50), dec!(75)] {
            app.client
                .transfer(&transfer_details(
                    &alice_checking.id,
                    &bob_checking.id,
                    amount,
                ))
                .await?;
            app.time_source.advance(Span::new().minutes(20));
        }
        app.client
            .transfer(&transfer_details(
                &bob_checking.id,
                &alice_checking.id,
                dec!(40),
            ))
            .await?;

        tracing::info!("🛡️ Installing fraud rules");
        app.client
            .create_fraud_rule(&requests::CreateFraudRule {
                rule_name: "Large amount".into(),
                rule_type: FraudRuleType::AmountAnomaly,
                description: Some("Single transaction above 50000".into()),
                threshold: None,
                risk_score_weight: 60,
            })
            .await?;
        app.client
            .create_fraud_rule(&requests::CreateFraudRule {
                rule_name: "Burst of transfers".into(),
                rule_type: FraudRuleType::Velocity,
                description: Some("More than 5 outgoing per hour".into()),
                threshold: None,
                risk_score_weight: 40,
            })
            .await?;

        tracing::info!("💳 Issuing a card");
        let alice_card = app.issue_card(&alice.id, dec!(20000)).await?;
        app.client
            .card_purchase(&requests::CardPurchase {
                card_id: alice_card.id,
                amount: dec!(189.90),
                merchant_name: "Corner Bookshop".into(),
                channel: CardChannel::Contactless,
            })
            .await?;

        app.time_source.set(Timestamp::now());

        Ok(Self {
            alice,
            bob,
            alice_checking,
            alice_savings_eur,
            bob_checking,
            alice_card,
        })
    }

    pub fn print_summary(&self) {
        tracing::info!("📋 Demo dataset:");
        for (user, accounts) in [
            (
                &self.alice,
                vec![&self.alice_checking, &self.alice_savings_eur],
            ),
            (&self.bob, vec![&self.bob_checking]),
        ] {
            tracing::info!(
                "   {} {} ({})",
                user.first_name,
                user.last_name,
                user.id
            );
            for account in accounts {
                tracing::info!(
                    "      {} {} {:?} ({})",
                    account.account_number,
                    account.currency,
                    account.account_type,
                    account.id
                );
            }
        }
        tracing::info!(
            "   Card •••• {} ({}), limit {}",
            self.alice_card.card_last_four,
            self.alice_card.id,
            self.alice_card.credit_limit
        );
    }
}
