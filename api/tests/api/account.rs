use jiff::Span;
use payloads::{
    AccountId, AccountStatus, AccountType, Currency, LedgerEntryType,
    TransactionType, UserId, requests,
};
use reqwest::StatusCode;
use rust_decimal::dec;
use test_helpers::{assert_error_contains, assert_status_code, spawn_app};
use uuid::Uuid;

fn account_request(user_id: UserId) -> requests::CreateAccount {
    requests::CreateAccount {
        user_id,
        account_number: None,
        account_type: AccountType::Savings,
        currency: Currency::Try,
        daily_transfer_limit: None,
        daily_withdrawal_limit: None,
        opening_deposit: None,
    }
}

#[tokio::test]
async fn new_account_gets_generated_iban_and_defaults() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;

    let account = app.client.create_account(&account_request(user.id)).await?;

    assert!(account.account_number.starts_with("TR"));
    assert_eq!(account.account_number.len(), 26);
    assert_eq!(account.balance, dec!(0));
    assert_eq!(account.available_balance, dec!(0));
    assert_eq!(account.daily_transfer_limit, dec!(50000));
    assert_eq!(account.daily_withdrawal_limit, dec!(10000));
    assert_eq!(account.status, AccountStatus::Active);

    assert_eq!(app.client.get_account(&account.id).await?, account);
    assert_eq!(
        app.client.get_accounts_by_user(&user.id).await?,
        vec![account.clone()]
    );
    assert_eq!(app.client.list_accounts().await?, vec![account]);
    Ok(())
}

#[tokio::test]
async fn opening_deposit_is_booked() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;

    let account = app.create_funded_account(&user.id, dec!(1000)).await?;
    assert_eq!(account.balance, dec!(1000));
    assert_eq!(account.available_balance, dec!(1000));

    let transactions =
        app.client.get_transactions_by_account(&account.id).await?;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].transaction_type, TransactionType::Deposit);
    assert_eq!(transactions[0].to_account_id, Some(account.id));
    assert_eq!(transactions[0].from_account_id, None);

    let entries = app.client.get_ledger_by_account(&account.id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Credit);
    assert_eq!(entries[0].credit_amount, dec!(1000));
    assert_eq!(entries[0].debit_amount, dec!(0));
    Ok(())
}

#[tokio::test]
async fn supplied_iban_is_validated() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;

    let mut details = account_request(user.id);
    details.account_number = Some("tr33 0006 1005 1978 6457 8413 26".into());
    let account = app.client.create_account(&details).await?;
    assert_eq!(account.account_number, "TR330006100519786457841326");

    // check digits off by one
    details.account_number = Some("TR340006100519786457841326".into());
    let result = app.client.create_account(&details).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    // already taken
    details.account_number = Some("TR330006100519786457841326".into());
    let result = app.client.create_account(&details).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn account_for_unknown_user_is_bad_request() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app
        .client
        .create_account(&account_request(UserId(Uuid::new_v4())))
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "User not found");
    assert_eq!(app.count_rows("accounts").await?, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_account_is_not_found() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let missing = AccountId(Uuid::new_v4());

    assert_status_code(
        app.client.get_account(&missing).await,
        StatusCode::NOT_FOUND,
    );
    assert_status_code(
        app.client.get_transactions_by_account(&missing).await,
        StatusCode::NOT_FOUND,
    );
    Ok(())
}

#[tokio::test]
async fn deposit_and_withdraw() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(100)).await?;

    let deposited = app
        .client
        .deposit(
            &account.id,
            &requests::CashMovement {
                amount: dec!(50.25),
                description: Some("ATM".into()),
            },
        )
        .await?;
    assert_eq!(deposited.account.balance, dec!(150.25));

    let withdrawn = app
        .client
        .withdraw(
            &account.id,
            &requests::CashMovement {
                amount: dec!(0.25),
                description: None,
            },
        )
        .await?;
    assert_eq!(withdrawn.account.balance, dec!(150));
    assert_eq!(withdrawn.account.available_balance, dec!(150));

    let withdrawal_id = withdrawn.transaction_id.unwrap();
    let entries = app.client.get_ledger_by_transaction(&withdrawal_id).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Debit);
    assert_eq!(entries[0].debit_amount, dec!(0.25));
    Ok(())
}

#[tokio::test]
async fn withdrawal_cannot_overdraw() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(100)).await?;

    let result = app
        .client
        .withdraw(
            &account.id,
            &requests::CashMovement {
                amount: dec!(100.01),
                description: None,
            },
        )
        .await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "Insufficient funds");
    assert_eq!(app.balance_of(&account.id).await?, dec!(100));
    Ok(())
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(100)).await?;

    for amount in [dec!(0), dec!(-5)] {
        let movement = requests::CashMovement {
            amount,
            description: None,
        };
        assert_status_code(
            app.client.deposit(&account.id, &movement).await,
            StatusCode::BAD_REQUEST,
        );
        assert_status_code(
            app.client.withdraw(&account.id, &movement).await,
            StatusCode::BAD_REQUEST,
        );
    }
    assert_eq!(app.balance_of(&account.id).await?, dec!(100));
    Ok(())
}

#[tokio::test]
async fn unstorable_amounts_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(100)).await?;

    for amount in [dec!(0.00005), dec!(10000000000000000)] {
        let movement = requests::CashMovement {
            amount,
            description: None,
        };
        let result = app.client.deposit(&account.id, &movement).await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "decimal places");
        let result = app.client.withdraw(&account.id, &movement).await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "decimal places");
        let result = app
            .client
            .update_balance(
                &account.id,
                &requests::UpdateBalance {
                    new_balance: amount,
                    reason: None,
                },
            )
            .await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "decimal places");
    }

    for request in [
        requests::CreateAccount {
            daily_transfer_limit: Some(dec!(10000000000000000)),
            ..account_request(user.id)
        },
        requests::CreateAccount {
            daily_withdrawal_limit: Some(dec!(0.12345)),
            ..account_request(user.id)
        },
        requests::CreateAccount {
            opening_deposit: Some(dec!(10000000000000000)),
            ..account_request(user.id)
        },
    ] {
        let result = app.client.create_account(&request).await;
        assert_error_contains(result, StatusCode::BAD_REQUEST, "decimal places");
    }

    assert_eq!(app.balance_of(&account.id).await?, dec!(100));
    assert_eq!(app.total_balance().await?, dec!(100));
    assert_eq!(app.count_rows("accounts").await?, 1);
    assert_eq!(app.count_rows("transactions").await?, 1);
    Ok(())
}

#[tokio::test]
async fn deposit_past_the_balance_range_is_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app
        .create_funded_account(&user.id, dec!(999999999999000))
        .await?;

    let movement = requests::CashMovement {
        amount: dec!(1000),
        description: None,
    };
    let result = app.client.deposit(&account.id, &movement).await;

    assert_error_contains(result, StatusCode::BAD_REQUEST, "out of range");
    assert_eq!(
        app.balance_of(&account.id).await?,
        dec!(999999999999000)
    );
    assert_eq!(app.count_rows("transactions").await?, 1);
    assert_eq!(app.count_rows("general_ledger").await?, 1);
    Ok(())
}

#[tokio::test]
async fn daily_withdrawal_limit_resets_at_midnight() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(30000)).await?;
    let movement = |amount| requests::CashMovement {
        amount,
        description: None,
    };

    app.client.withdraw(&account.id, &movement(dec!(6000))).await?;
    let result = app.client.withdraw(&account.id, &movement(dec!(5000))).await;
    assert_error_contains(result, StatusCode::BAD_REQUEST, "4000");

    // exactly the remainder is still allowed
    app.client.withdraw(&account.id, &movement(dec!(4000))).await?;

    app.time_source.advance(Span::new().hours(15));
    app.client.withdraw(&account.id, &movement(dec!(5000))).await?;
    assert_eq!(app.balance_of(&account.id).await?, dec!(15000));
    Ok(())
}

#[tokio::test]
async fn frozen_account_rejects_movements() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(100)).await?;

    let frozen = app
        .client
        .update_account_status(
            &account.id,
            &requests::UpdateAccountStatus {
                status: AccountStatus::Frozen,
            },
        )
        .await?;
    assert_eq!(frozen.status, AccountStatus::Frozen);

    let movement = requests::CashMovement {
        amount: dec!(10),
        description: None,
    };
    assert_error_contains(
        app.client.deposit(&account.id, &movement).await,
        StatusCode::BAD_REQUEST,
        "not active",
    );
    assert_status_code(
        app.client.withdraw(&account.id, &movement).await,
        StatusCode::BAD_REQUEST,
    );

    // frozen accounts can be reactivated
    app.client
        .update_account_status(
            &account.id,
            &requests::UpdateAccountStatus {
                status: AccountStatus::Active,
            },
        )
        .await?;
    app.client.deposit(&account.id, &movement).await?;
    assert_eq!(app.balance_of(&account.id).await?, dec!(110));
    Ok(())
}

#[tokio::test]
async fn closed_account_cannot_be_reopened() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(0)).await?;

    app.client
        .update_account_status(
            &account.id,
            &requests::UpdateAccountStatus {
                status: AccountStatus::Closed,
            },
        )
        .await?;
    let result = app
        .client
        .update_account_status(
            &account.id,
            &requests::UpdateAccountStatus {
                status: AccountStatus::Active,
            },
        )
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);
    assert_eq!(
        app.client.get_account(&account.id).await?.status,
        AccountStatus::Closed
    );
    Ok(())
}

#[tokio::test]
async fn balance_update_is_booked_as_adjustment() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(1000)).await?;

    let raised = app
        .client
        .update_balance(
            &account.id,
            &requests::UpdateBalance {
                new_balance: dec!(1500),
                reason: Some("Correction".into()),
            },
        )
        .await?;
    assert_eq!(raised.account.balance, dec!(1500));
    let raise_id = raised.transaction_id.unwrap();
    let adjustment = app.client.get_transaction(&raise_id).await?;
    assert_eq!(adjustment.transaction_type, TransactionType::Adjustment);
    assert_eq!(adjustment.amount, dec!(500));
    assert_eq!(adjustment.to_account_id, Some(account.id));

    let lowered = app
        .client
        .update_balance(
            &account.id,
            &requests::UpdateBalance {
                new_balance: dec!(200),
                reason: None,
            },
        )
        .await?;
    assert_eq!(lowered.account.balance, dec!(200));
    let entries = app
        .client
        .get_ledger_by_transaction(&lowered.transaction_id.unwrap())
        .await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, LedgerEntryType::Debit);
    assert_eq!(entries[0].debit_amount, dec!(1300));

    // ledger agrees with the balance
    let entries = app.client.get_ledger_by_account(&account.id).await?;
    let net: rust_decimal::Decimal = entries
        .iter()
        .map(|e| e.credit_amount - e.debit_amount)
        .sum();
    assert_eq!(net, dec!(200));
    Ok(())
}

#[tokio::test]
async fn balance_update_edge_cases() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.create_test_user("Alice").await?;
    let account = app.create_funded_account(&user.id, dec!(1000)).await?;

    let unchanged = app
        .client
        .update_balance(
            &account.id,
            &requests::UpdateBalance {
                new_balance: dec!(1000),
                reason: None,
            },
        )
        .await?;
    assert_eq!(unchanged.transaction_id, None);
    assert_eq!(app.count_rows("transactions").await?, 1);

    let result = app
        .client
        .update_balance(
            &account.id,
            &requests::UpdateBalance {
                new_balance: dec!(-1),
                reason: None,
            },
        )
        .await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let result = app
        .client
        .update_balance(
            &AccountId(Uuid::new_v4()),
            &requests::UpdateBalance {
                new_balance: dec!(1),
                reason: None,
            },
        )
        .await;
    assert_status_code(result, StatusCode::NOT_FOUND);
    Ok(())
}
