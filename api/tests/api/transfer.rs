use jiff::Span;
use payloads::{
    AccountId, AccountStatus, AccountType, Currency, ReferenceNumber,
    TransactionStatus, TransactionType, requests,
};
use reqwest::StatusCode;
use rust_decimal::{Decimal, dec};
use test_helpers::{
    assert_error_contains, assert_status_code, spawn_app, transfer_details,
};
use uuid::Uuid;

#[tokio::test]
async fn transfer_moves_money_and_records_everything() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(200)).await?;
    let transactions_before = app.count_rows("transactions").await?;

    let receipt = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await?;

    assert_eq!(app.balance_of(&a.id).await?, dec!(700));
    assert_eq!(app.balance_of(&b.id).await?, dec!(500));
    assert_eq!(
        app.client.get_account(&a.id).await?.available_balance,
        dec!(700)
    );

    assert_eq!(
        app.count_rows("transactions").await?,
        transactions_before + 1
    );
    let transaction = app.client.get_transaction(&receipt.transaction_id).await?;
    assert_eq!(transaction.amount, dec!(300));
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.transaction_type, TransactionType::Transfer);
    assert_eq!(transaction.currency, Currency::Try);
    assert_eq!(transaction.reference_number, receipt.reference);
    assert_eq!(transaction.from_account_id, Some(a.id));
    assert_eq!(transaction.to_account_id, Some(b.id));

    let entries = app
        .client
        .get_ledger_by_transaction(&receipt.transaction_id)
        .await?;
    assert_eq!(entries.len(), 2);
    Ok(())
}

#[tokio::test]
async fn insufficient_funds_changes_nothing() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(100), dec!(0)).await?;
    let transactions_before = app.count_rows("transactions").await?;

    let result = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await;

    assert_error_contains(result, StatusCode::BAD_REQUEST, "Insufficient funds");
    assert_eq!(app.balance_of(&a.id).await?, dec!(100));
    assert_eq!(app.balance_of(&b.id).await?, dec!(0));
    assert_eq!(app.count_rows("transactions").await?, transactions_before);
    Ok(())
}

#[tokio::test]
async fn missing_destination_is_bad_request() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let a = app.create_funded_account(&user.id, dec!(500)).await?;

    let result = app
        .client
        .transfer(&transfer_details(
            &a.id,
            &AccountId(Uuid::new_v4()),
            dec!(100),
        ))
        .await;

    assert_error_contains(result, StatusCode::BAD_REQUEST, "Account not found");
    assert_eq!(app.balance_of(&a.id).await?, dec!(500));
    Ok(())
}

#[tokio::test]
async fn missing_source_is_bad_request() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let b = app.create_funded_account(&user.id, dec!(500)).await?;

    let result = app
        .client
        .transfer(&transfer_details(
            &AccountId(Uuid::new_v4()),
            &b.id,
            dec!(100),
        ))
        .await;

    assert_error_contains(result, StatusCode::BAD_REQUEST, "Account not found");
    assert_eq!(app.balance_of(&b.id).await?, dec!(500));
    Ok(())
}

#[tokio::test]
async fn invalid_amounts_and_self_transfers_are_rejected() -> anyhow::Result<()>
{
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(500), dec!(0)).await?;

    for amount in [dec!(0), dec!(-10)] {
        let result =
            app.client.transfer(&transfer_details(&a.id, &b.id, amount)).await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "positive");
    }

    let result = app
        .client
        .transfer(&transfer_details(&a.id, &a.id, dec!(10)))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "must differ");

    assert_eq!(app.balance_of(&a.id).await?, dec!(500));
    Ok(())
}

#[tokio::test]
async fn unstorable_amounts_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(200)).await?;
    let total_before = app.total_balance().await?;

    // more than four decimal places, or beyond NUMERIC(19, 4)
    for amount in [
        dec!(0.00005),
        dec!(0.00001),
        dec!(10.12345),
        dec!(1000000000000000),
    ] {
        let result =
            app.client.transfer(&transfer_details(&a.id, &b.id, amount)).await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "decimal places");
    }

    assert_eq!(app.total_balance().await?, total_before);
    assert_eq!(app.balance_of(&a.id).await?, dec!(1000));
    assert_eq!(app.balance_of(&b.id).await?, dec!(200));
    assert_eq!(app.count_rows("general_ledger").await?, 2);

    // trailing zeros beyond the fourth place are fine
    app.client
        .transfer(&transfer_details(&a.id, &b.id, dec!(0.000100)))
        .await?;
    assert_eq!(app.total_balance().await?, total_before);
    assert_eq!(app.balance_of(&b.id).await?, dec!(200.0001));
    Ok(())
}

#[tokio::test]
async fn transfers_conserve_money() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let a = app.create_funded_account(&user.id, dec!(1000)).await?;
    let b = app.create_funded_account(&user.id, dec!(750.50)).await?;
    let c = app.create_funded_account(&user.id, dec!(20)).await?;
    let total_before = app.total_balance().await?;

    let moves = [
        (&a, &b, dec!(125.25)),
        (&b, &c, dec!(800)),
        (&c, &a, dec!(19.99)),
        (&a, &c, dec!(5000)), // fails
        (&b, &a, dec!(0.01)),
    ];
    for (from, to, amount) in moves {
        let before = app.balance_of(&from.id).await?
            + app.balance_of(&to.id).await?;
        let _ = app
            .client
            .transfer(&transfer_details(&from.id, &to.id, amount))
            .await;
        let after = app.balance_of(&from.id).await?
            + app.balance_of(&to.id).await?;
        assert_eq!(before, after);
    }

    assert_eq!(app.total_balance().await?, total_before);
    Ok(())
}

#[tokio::test]
async fn failed_credit_rolls_back_debit() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(200)).await?;
    let transactions_before = app.count_rows("transactions").await?;
    let entries_before = app.count_rows("general_ledger").await?;
    app.fail_account_credits().await?;

    let result = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await;

    assert_error_contains(
        result,
        StatusCode::INTERNAL_SERVER_ERROR,
        "injected fault",
    );
    assert_eq!(app.balance_of(&a.id).await?, dec!(1000));
    assert_eq!(app.balance_of(&b.id).await?, dec!(200));
    assert_eq!(app.count_rows("transactions").await?, transactions_before);
    assert_eq!(app.count_rows("general_ledger").await?, entries_before);

    // the same transfer goes through once the fault is gone
    app.remove_failing_trigger("fail_account_credits", "accounts")
        .await?;
    app.client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await?;
    assert_eq!(app.balance_of(&a.id).await?, dec!(700));
    assert_eq!(app.balance_of(&b.id).await?, dec!(500));
    Ok(())
}

#[tokio::test]
async fn failed_ledger_write_rolls_back_transfer() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(200)).await?;
    let transactions_before = app.count_rows("transactions").await?;
    app.fail_ledger_inserts().await?;

    let result = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await;

    assert_status_code(result, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.balance_of(&a.id).await?, dec!(1000));
    assert_eq!(app.balance_of(&b.id).await?, dec!(200));
    assert_eq!(app.count_rows("transactions").await?, transactions_before);
    Ok(())
}

#[tokio::test]
async fn concurrent_debits_cannot_overdraw() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let a = app.create_funded_account(&user.id, dec!(1000)).await?;
    let b = app.create_funded_account(&user.id, dec!(0)).await?;
    let c = app.create_funded_account(&user.id, dec!(0)).await?;

    let to_b = transfer_details(&a.id, &b.id, dec!(600));
    let to_c = transfer_details(&a.id, &c.id, dec!(600));
    let (first, second) =
        tokio::join!(app.client.transfer(&to_b), app.client.transfer(&to_c));

    assert_eq!(
        first.is_ok() as u8 + second.is_ok() as u8,
        1,
        "exactly one transfer should succeed"
    );
    let failed = if first.is_ok() { second } else { first };
    assert_error_contains(failed, StatusCode::BAD_REQUEST, "Insufficient funds");

    assert_eq!(app.balance_of(&a.id).await?, dec!(400));
    assert_eq!(
        app.balance_of(&b.id).await? + app.balance_of(&c.id).await?,
        dec!(600)
    );
    Ok(())
}

#[tokio::test]
async fn opposing_concurrent_transfers_both_complete() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(1000)).await?;

    let a_to_b = transfer_details(&a.id, &b.id, dec!(100));
    let b_to_a = transfer_details(&b.id, &a.id, dec!(250));
    let (first, second) = tokio::join!(
        app.client.transfer(&a_to_b),
        app.client.transfer(&b_to_a)
    );
    first?;
    second?;

    assert_eq!(app.balance_of(&a.id).await?, dec!(1150));
    assert_eq!(app.balance_of(&b.id).await?, dec!(850));
    Ok(())
}

#[tokio::test]
async fn reference_numbers_are_unique() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(0)).await?;

    let mut references = std::collections::HashSet::new();
    for _ in 0..5 {
        let receipt = app
            .client
            .transfer(&transfer_details(&a.id, &b.id, dec!(10)))
            .await?;
        assert!(references.insert(receipt.reference));
    }

    let duplicates: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT reference_number FROM transactions
            GROUP BY reference_number HAVING COUNT(*) > 1
        ) d
        "#,
    )
    .fetch_one(&app.db_pool)
    .await?;
    assert_eq!(duplicates, 0);
    Ok(())
}

#[tokio::test]
async fn retry_with_same_reference_moves_money_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(0)).await?;
    let reference = ReferenceNumber(Uuid::new_v4());
    let details = requests::Transfer {
        reference: Some(reference),
        ..transfer_details(&a.id, &b.id, dec!(300))
    };

    let first = app.client.transfer(&details).await?;
    let retry = app.client.transfer(&details).await?;

    assert_eq!(first.reference, reference);
    assert_eq!(retry.transaction_id, first.transaction_id);
    assert_eq!(app.balance_of(&a.id).await?, dec!(700));
    assert_eq!(app.balance_of(&b.id).await?, dec!(300));

    // same reference, different amount
    let conflicting = requests::Transfer {
        amount: dec!(301),
        ..details
    };
    let result = app.client.transfer(&conflicting).await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "Reference number");
    assert_eq!(app.balance_of(&a.id).await?, dec!(700));
    Ok(())
}

#[tokio::test]
async fn daily_transfer_limit_is_enforced_per_utc_day() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let a = app
        .client
        .create_account(&requests::CreateAccount {
            user_id: user.id,
            account_number: None,
            account_type: AccountType::Checking,
            currency: Currency::Try,
            daily_transfer_limit: Some(dec!(1000)),
            daily_withdrawal_limit: None,
            opening_deposit: Some(dec!(5000)),
        })
        .await?;
    let b = app.create_funded_account(&user.id, dec!(0)).await?;

    app.client
        .transfer(&transfer_details(&a.id, &b.id, dec!(800)))
        .await?;
    let result = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(300)))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "Daily transfer limit");

    // deposits and withdrawals don't count towards the transfer limit
    app.client
        .withdraw(
            &a.id,
            &requests::CashMovement {
                amount: dec!(100),
                description: None,
            },
        )
        .await?;
    app.client
        .transfer(&transfer_details(&a.id, &b.id, dec!(200)))
        .await?;

    // 2025-01-01T09:00Z + 15h is midnight
    app.time_source.advance(Span::new().hours(15));
    app.client
        .transfer(&transfer_details(&a.id, &b.id, dec!(1000)))
        .await?;

    assert_eq!(app.balance_of(&a.id).await?, dec!(2900));
    assert_eq!(app.balance_of(&b.id).await?, dec!(2000));
    Ok(())
}

#[tokio::test]
async fn currency_mismatch_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let lira = app.create_funded_account(&user.id, dec!(1000)).await?;
    let euro = app
        .create_account_in(&user.id, Currency::Eur, dec!(0))
        .await?;

    let result = app
        .client
        .transfer(&transfer_details(&lira.id, &euro.id, dec!(10)))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "currencies");
    assert_eq!(app.balance_of(&lira.id).await?, dec!(1000));
    Ok(())
}

#[tokio::test]
async fn inactive_accounts_cannot_send_or_receive() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(1000)).await?;
    app.client
        .update_account_status(
            &b.id,
            &requests::UpdateAccountStatus {
                status: AccountStatus::Frozen,
            },
        )
        .await?;

    let result = app
        .client
        .transfer(&transfer_details(&a.id, &b.id, dec!(10)))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "not active");
    let result = app
        .client
        .transfer(&transfer_details(&b.id, &a.id, dec!(10)))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "not active");

    assert_eq!(app.total_balance().await?, dec!(2000));
    Ok(())
}

#[tokio::test]
async fn transactions_are_listed_newest_first() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (a, b) = app.create_account_pair(dec!(1000), dec!(0)).await?;

    for amount in [dec!(1), dec!(2), dec!(3)] {
        app.client
            .transfer(&transfer_details(&a.id, &b.id, amount))
            .await?;
    }
    app.time_source.advance(Span::new().minutes(5));
    app.client
        .transfer(&transfer_details(&b.id, &a.id, dec!(4)))
        .await?;

    let amounts: Vec<Decimal> = app
        .client
        .get_transactions_by_account(&a.id)
        .await?
        .into_iter()
        .map(|t| t.amount)
        .collect();
    assert_eq!(amounts, vec![dec!(4), dec!(3), dec!(2), dec!(1), dec!(1000)]);

    let b_transactions = app.client.get_transactions_by_account(&b.id).await?;
    assert_eq!(b_transactions.len(), 4);
    Ok(())
}
