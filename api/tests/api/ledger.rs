use payloads::{AccountId, LedgerEntryType, TransactionId};
use reqwest::StatusCode;
use rust_decimal::dec;
use test_helpers::{TestApp, assert_status_code, spawn_app, transfer_details};
use uuid::Uuid;

async fn delete_entries(
    app: &TestApp,
    transaction_id: &TransactionId,
    entry_type: Option<LedgerEntryType>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        DELETE FROM general_ledger
        WHERE transaction_id = $1
          AND ($2::ledger_entry_type IS NULL OR entry_type = $2)
        "#,
    )
    .bind(transaction_id)
    .bind(entry_type)
    .execute(&app.db_pool)
    .await?;
    Ok(())
}

#[tokio::test]
async fn transfer_writes_one_debit_and_one_credit() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(200)).await?;

    let receipt = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await?;
    let entries = app
        .client
        .get_ledger_by_transaction(&receipt.transaction_id)
        .await?;

    assert_eq!(entries.len(), 2);
    let side = |entry_type| {
        entries
            .iter()
            .find(|e| e.entry_type == entry_type)
            .expect("missing ledger side")
    };
    let debit = side(LedgerEntryType::Debit);
    let credit = side(LedgerEntryType::Credit);
    assert_eq!(debit.account_id, a.id);
    assert_eq!(debit.debit_amount, dec!(300));
    assert_eq!(debit.credit_amount, dec!(0));
    assert_eq!(credit.account_id, b.id);
    assert_eq!(credit.credit_amount, dec!(300));
    assert_eq!(credit.debit_amount, dec!(0));
    assert!(
        entries
            .iter()
            .all(|e| e.transaction_id == receipt.transaction_id)
    );
    Ok(())
}

#[tokio::test]
async fn every_transfer_is_paired() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(1000)).await?;

    for (from, to, amount) in
        [(&a, &b, dec!(10)), (&b, &a, dec!(20)), (&a, &b, dec!(30.5))]
    {
        app.client
            .transfer(&transfer_details(&from.id, &to.id, amount))
            .await?;
    }

    let unpaired: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM transactions t
        WHERE t.transaction_type = 'transfer'
          AND NOT (
            (SELECT COUNT(*) FROM general_ledger g
             WHERE g.transaction_id = t.id AND g.entry_type = 'debit'
               AND g.account_id = t.from_account_id
               AND g.debit_amount = t.amount) = 1
            AND
            (SELECT COUNT(*) FROM general_ledger g
             WHERE g.transaction_id = t.id AND g.entry_type = 'credit'
               AND g.account_id = t.to_account_id
               AND g.credit_amount = t.amount) = 1
          )
        "#,
    )
    .fetch_one(&app.db_pool)
    .await?;
    assert_eq!(unpaired, 0);

    // ledger agrees with balances
    for account in [&a, &b] {
        let net: rust_decimal::Decimal = app
            .client
            .get_ledger_by_account(&account.id)
            .await?
            .iter()
            .map(|e| e.credit_amount - e.debit_amount)
            .sum();
        assert_eq!(net, app.balance_of(&account.id).await?);
    }
    Ok(())
}

#[tokio::test]
async fn backfill_restores_missing_entries_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(0)).await?;
    let whole = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(100)))
        .await?;
    let half = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(50)))
        .await?;
    let intact = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(25)))
        .await?;

    delete_entries(&app, &whole.transaction_id, None).await?;
    delete_entries(&app, &half.transaction_id, Some(LedgerEntryType::Credit))
        .await?;

    let result = app.client.backfill_ledger().await?;
    assert_eq!(result.transactions_examined, 2);
    assert_eq!(result.entries_written, 3);
    assert_eq!(result.failures, 0);

    for receipt in [&whole, &half, &intact] {
        let entries = app
            .client
            .get_ledger_by_transaction(&receipt.transaction_id)
            .await?;
        assert_eq!(entries.len(), 2);
    }

    let again = app.client.backfill_ledger().await?;
    assert_eq!(again.transactions_examined, 0);
    assert_eq!(again.entries_written, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_ids_are_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;

    assert_status_code(
        app.client
            .get_ledger_by_transaction(&TransactionId(Uuid::new_v4()))
            .await,
        StatusCode::NOT_FOUND,
    );
    assert_status_code(
        app.client
            .get_ledger_by_account(&AccountId(Uuid::new_v4()))
            .await,
        StatusCode::NOT_FOUND,
    );
    Ok(())
}
