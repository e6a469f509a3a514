//! Balance service - Core business logic for recharges and payments.
//!
//! This service handles:
//! - Actor resolution (user id or card number) under a row lock
//! - Fare pricing with the subsidized discount
//! - Balance validation
//! - Atomic balance update plus ledger append
//!
//! # Atomicity Guarantees
//!
//! Every intent runs inside one [`AtomicUnit`]. The unit is committed only
//! when every step succeeded; on any error it is rolled back before the error
//! is returned, so balance and ledger are either both updated or both
//! untouched.

use crate::{
    error::AppError,
    models::{
        account::Account,
        intent::{Actor, PaymentIntent, PaymentReceipt, RechargeIntent, RechargeReceipt},
        ledger::{EntryKind, LedgerEntry, NewLedgerEntry},
    },
    services::pricing::{MAX_MONEY, price_for, round_money},
    store::{AtomicUnit, Store},
};

/// Execute a recharge (add money to the actor's balance).
///
/// # Process
///
/// 1. Open a unit of work
/// 2. Lock the account (card path: must be active)
/// 3. Compute the new balance
/// 4. Write the balance and append a `recharge` ledger entry
/// 5. Commit (or roll back on error)
///
/// # Errors
///
/// - `AccountNotFound`: No account, or the card is inactive
/// - `InvalidAmount`: The new balance would exceed `MAX_MONEY`
/// - `Conflict`: The balance changed under the unit
/// - `Database` / `Storage`: Storage failed; nothing was written
pub async fn execute_recharge<S: Store>(
    store: &S,
    actor: &Actor,
    intent: RechargeIntent,
) -> Result<RechargeReceipt, AppError> {
    let mut unit = store.begin().await?;
    let outcome = recharge_in_unit(&mut unit, actor, &intent).await;
    let entry = finish(unit, actor, outcome).await?;

    tracing::info!(
        account_id = entry.account_id,
        amount = %entry.amount,
        balance_after = %entry.balance_after,
        "recharge committed"
    );

    Ok(RechargeReceipt::new(actor, entry))
}

/// Execute a payment for a service.
///
/// # Process
///
/// 1. Open a unit of work
/// 2. Lock the account (card path: must be active)
/// 3. Look up the service rate and price it for the account's class
/// 4. Reject if the balance does not cover the price
/// 5. Write the balance and append a ledger entry of the service's kind
/// 6. Commit (or roll back on error)
///
/// # Errors
///
/// - `AccountNotFound`: No account, or the card is inactive
/// - `RateNotFound`: The rate table has no row for the service
/// - `InsufficientBalance`: Balance is lower than the price
/// - `Conflict`: The balance changed under the unit
/// - `Database` / `Storage`: Storage failed; nothing was written
pub async fn execute_payment<S: Store>(
    store: &S,
    actor: &Actor,
    intent: PaymentIntent,
) -> Result<PaymentReceipt, AppError> {
    let mut unit = store.begin().await?;
    let outcome = pay_in_unit(&mut unit, actor, &intent).await;
    let entry = finish(unit, actor, outcome).await?;

    tracing::info!(
        account_id = entry.account_id,
        service = %intent.service,
        amount = %entry.amount,
        balance_after = %entry.balance_after,
        "payment committed"
    );

    Ok(PaymentReceipt::new(actor, intent.service, entry))
}

async fn recharge_in_unit<U: AtomicUnit>(
    unit: &mut U,
    actor: &Actor,
    intent: &RechargeIntent,
) -> Result<LedgerEntry, AppError> {
    let account = resolve_actor(unit, actor).await?;

    let balance_before = account.balance;
    let balance_after = balance_before
        .checked_add(intent.amount)
        .map(round_money)
        .filter(|balance| *balance <= MAX_MONEY)
        .ok_or_else(|| {
            AppError::InvalidAmount(format!("Balance would exceed {MAX_MONEY}"))
        })?;

    commit_delta(
        unit,
        NewLedgerEntry {
            account_id: account.id,
            kind: EntryKind::Recharge,
            amount: intent.amount,
            balance_before,
            balance_after,
            service_details: None,
        },
    )
    .await
}

async fn pay_in_unit<U: AtomicUnit>(
    unit: &mut U,
    actor: &Actor,
    intent: &PaymentIntent,
) -> Result<LedgerEntry, AppError> {
    let account = resolve_actor(unit, actor).await?;

    let rate = unit
        .lookup_rate(intent.service)
        .await?
        .ok_or(AppError::RateNotFound)?;
    let amount = price_for(&rate, account.user_class);

    let balance_before = account.balance;
    if balance_before < amount {
        return Err(AppError::InsufficientBalance);
    }
    let balance_after = round_money(balance_before - amount);

    commit_delta(
        unit,
        NewLedgerEntry {
            account_id: account.id,
            kind: EntryKind::Payment(intent.service),
            amount,
            balance_before,
            balance_after,
            service_details: intent.service_details.clone(),
        },
    )
    .await
}

/// Lock the account the actor refers to.
///
/// The card path never succeeds against a deactivated account.
async fn resolve_actor<U: AtomicUnit>(unit: &mut U, actor: &Actor) -> Result<Account, AppError> {
    match actor {
        Actor::User { user_id } => unit
            .lock_account(*user_id)
            .await?
            .ok_or(AppError::AccountNotFound),
        Actor::Card { card_number } => {
            let account = unit
                .lock_card(card_number)
                .await?
                .ok_or(AppError::AccountNotFound)?;
            if !account.is_active {
                tracing::warn!(account_id = account.id, "rejected inactive card");
                return Err(AppError::AccountNotFound);
            }
            Ok(account)
        }
    }
}

/// Write the balance and append the matching ledger entry.
async fn commit_delta<U: AtomicUnit>(
    unit: &mut U,
    entry: NewLedgerEntry,
) -> Result<LedgerEntry, AppError> {
    unit.apply_delta(entry.account_id, entry.balance_before, entry.balance_after)
        .await?;
    unit.append(entry).await
}

/// Commit the unit if `outcome` succeeded, otherwise roll it back.
async fn finish<U: AtomicUnit, T>(
    unit: U,
    actor: &Actor,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    match outcome {
        Ok(value) => {
            unit.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            tracing::warn!(actor = ?actor, error = %err, "balance intent aborted");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            account::{NewAccount, UserClass},
            rate::{Rate, ServiceCode},
        },
        store::memory::{Fault, MemoryStore},
    };
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    async fn open_account(store: &MemoryStore, class: UserClass, balance: Decimal) -> Account {
        let account = store
            .create_account(NewAccount {
                full_name: "Test Rider".to_string(),
                email: format!("rider{}@example.com", uuid::Uuid::new_v4()),
                user_class: class,
            })
            .await
            .unwrap();

        if balance > Decimal::ZERO {
            execute_recharge(
                store,
                &Actor::User {
                    user_id: account.id,
                },
                RechargeIntent { amount: balance },
            )
            .await
            .unwrap();
        }

        store.find_account(account.id).await.unwrap().unwrap()
    }

    fn pay(service: ServiceCode) -> PaymentIntent {
        PaymentIntent {
            service,
            service_details: None,
        }
    }

    async fn snapshot(store: &MemoryStore, id: i64) -> (Account, Vec<LedgerEntry>) {
        (
            store.find_account(id).await.unwrap().unwrap(),
            store.list_entries(id).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_recharge_adds_amount_and_records_entry() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(1000.00)).await;
        let actor = Actor::User {
            user_id: account.id,
        };

        let receipt = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(250.50) })
            .await
            .unwrap();

        assert_eq!(receipt.balance, dec!(1250.50));
        assert_eq!(receipt.card_number, None);

        let entries = store.list_entries(account.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        let newest = &entries[0];
        assert_eq!(newest.kind, EntryKind::Recharge);
        assert_eq!(newest.amount, dec!(250.50));
        assert_eq!(newest.balance_before, dec!(1000.00));
        assert_eq!(newest.balance_after, dec!(1250.50));
    }

    #[tokio::test]
    async fn test_card_recharge_echoes_card_number() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, Decimal::ZERO).await;
        let actor = Actor::Card {
            card_number: account.card_number.clone(),
        };

        let receipt = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(5000.00) })
            .await
            .unwrap();

        assert_eq!(receipt.card_number.as_deref(), Some(account.card_number.as_str()));
        assert_eq!(receipt.balance, dec!(5000.00));
    }

    #[tokio::test]
    async fn test_recharge_caps_balance_at_column_limit() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(9999999000.00)).await;
        let actor = Actor::User {
            user_id: account.id,
        };

        let result = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(1000.00) }).await;
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));

        let (stored, entries) = snapshot(&store, account.id).await;
        assert_eq!(stored.balance, dec!(9999999000.00));
        assert_eq!(entries.len(), 1);

        let receipt = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(999.99) })
            .await
            .unwrap();
        assert_eq!(receipt.balance, MAX_MONEY);
    }

    #[tokio::test]
    async fn test_subsidized_bike_payment() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Subsidized, dec!(3000.00)).await;
        let actor = Actor::User {
            user_id: account.id,
        };

        let receipt = execute_payment(
            &store,
            &actor,
            PaymentIntent {
                service: ServiceCode::Bicicleta,
                service_details: Some("Estación Calle 26".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(receipt.amount_paid, dec!(1000.00));
        assert_eq!(receipt.new_balance, dec!(2000.00));
        assert_eq!(receipt.service, ServiceCode::Bicicleta);

        let entries = store.list_entries(account.id).await.unwrap();
        assert_eq!(entries[0].kind, EntryKind::Payment(ServiceCode::Bicicleta));
        assert_eq!(entries[0].service_details.as_deref(), Some("Estación Calle 26"));
    }

    #[rstest]
    #[case::normal(UserClass::Normal, dec!(2700.00))]
    #[case::subsidized(UserClass::Subsidized, dec!(2025.00))]
    #[case::operator(UserClass::Operator, dec!(2700.00))]
    #[case::bike_operator(UserClass::BikeOperator, dec!(2700.00))]
    #[case::parking_operator(UserClass::ParkingOperator, dec!(2700.00))]
    #[tokio::test]
    async fn test_payment_price_by_class(#[case] class: UserClass, #[case] price: Decimal) {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, class, dec!(10000.00)).await;

        let receipt = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Transmilenio),
        )
        .await
        .unwrap();

        assert_eq!(receipt.amount_paid, price);
        assert_eq!(receipt.new_balance, dec!(10000.00) - price);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_state_untouched() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(500.00)).await;
        let before = snapshot(&store, account.id).await;

        let result = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Transmilenio),
        )
        .await;

        assert!(matches!(result, Err(AppError::InsufficientBalance)));
        assert_eq!(snapshot(&store, account.id).await, before);
    }

    #[tokio::test]
    async fn test_exact_balance_can_be_spent() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(2700.00)).await;

        let receipt = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Transmilenio),
        )
        .await
        .unwrap();

        assert_eq!(receipt.new_balance, dec!(0.00));
    }

    #[tokio::test]
    async fn test_inactive_card_is_not_found() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(5000.00)).await;
        store.set_active(account.id, false).await.unwrap();
        let before = snapshot(&store, account.id).await;
        let actor = Actor::Card {
            card_number: account.card_number.clone(),
        };

        let recharge = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(10.00) }).await;
        let payment = execute_payment(&store, &actor, pay(ServiceCode::Parqueadero)).await;

        assert!(matches!(recharge, Err(AppError::AccountNotFound)));
        assert!(matches!(payment, Err(AppError::AccountNotFound)));
        assert_eq!(snapshot(&store, account.id).await, before);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_not_found() {
        let store = MemoryStore::seeded().await;

        let by_user = execute_recharge(
            &store,
            &Actor::User { user_id: 99 },
            RechargeIntent { amount: dec!(10.00) },
        )
        .await;
        let by_card = execute_payment(
            &store,
            &Actor::Card {
                card_number: "1000000099".to_string(),
            },
            pay(ServiceCode::Bicicleta),
        )
        .await;

        assert!(matches!(by_user, Err(AppError::AccountNotFound)));
        assert!(matches!(by_card, Err(AppError::AccountNotFound)));
    }

    #[tokio::test]
    async fn test_missing_rate_is_reported() {
        let store = MemoryStore::new();
        store
            .insert_rate(Rate {
                service_name: ServiceCode::Transmilenio,
                base_rate: dec!(2700.00),
                subsidized_discount: dec!(0.25),
            })
            .await;
        let account = open_account(&store, UserClass::Normal, dec!(5000.00)).await;
        let before = snapshot(&store, account.id).await;

        let result = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Parqueadero),
        )
        .await;

        assert!(matches!(result, Err(AppError::RateNotFound)));
        assert_eq!(snapshot(&store, account.id).await, before);
    }

    #[rstest]
    #[case::append(Fault::Append)]
    #[case::commit(Fault::Commit)]
    #[tokio::test]
    async fn test_storage_failure_rolls_back(#[case] fault: Fault) {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(5000.00)).await;
        let before = snapshot(&store, account.id).await;
        store.fail_next(fault).await;

        let result = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Parqueadero),
        )
        .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(snapshot(&store, account.id).await, before);

        // The store stays usable after the failed unit
        let receipt = execute_payment(
            &store,
            &Actor::User {
                user_id: account.id,
            },
            pay(ServiceCode::Parqueadero),
        )
        .await
        .unwrap();
        assert_eq!(receipt.new_balance, dec!(1000.00));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recharges_do_not_lose_updates() {
        const REQUESTS: usize = 64;
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Normal, dec!(100.00)).await;

        let handles: Vec<_> = (0..REQUESTS)
            .map(|i| {
                let store = store.clone();
                let actor = if i % 2 == 0 {
                    Actor::User {
                        user_id: account.id,
                    }
                } else {
                    Actor::Card {
                        card_number: account.card_number.clone(),
                    }
                };
                tokio::spawn(async move {
                    execute_recharge(&store, &actor, RechargeIntent { amount: dec!(12.50) }).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let (stored, entries) = snapshot(&store, account.id).await;
        assert_eq!(stored.balance, dec!(100.00) + dec!(12.50) * Decimal::from(REQUESTS));
        // One entry from opening the account plus one per request
        assert_eq!(entries.len(), REQUESTS + 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_payments_never_overdraw() {
        let store = MemoryStore::seeded().await;
        // Enough for exactly three bike rides
        let account = open_account(&store, UserClass::Normal, dec!(6000.00)).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                let actor = Actor::User {
                    user_id: account.id,
                };
                tokio::spawn(async move {
                    execute_payment(&store, &actor, pay(ServiceCode::Bicicleta)).await
                })
            })
            .collect();

        let mut paid = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => paid += 1,
                Err(AppError::InsufficientBalance) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let (stored, _) = snapshot(&store, account.id).await;
        assert_eq!(paid, 3);
        assert_eq!(stored.balance, dec!(0.00));
    }

    #[tokio::test]
    async fn test_ledger_reconstructs_balance() {
        let store = MemoryStore::seeded().await;
        let account = open_account(&store, UserClass::Subsidized, dec!(20000.00)).await;
        let actor = Actor::Card {
            card_number: account.card_number.clone(),
        };

        for service in [
            ServiceCode::Transmilenio,
            ServiceCode::Bicicleta,
            ServiceCode::Parqueadero,
            ServiceCode::Transmilenio,
        ] {
            execute_payment(&store, &actor, pay(service)).await.unwrap();
        }
        execute_recharge(&store, &actor, RechargeIntent { amount: dec!(333.33) })
            .await
            .unwrap();
        // Rejected intents leave no trace in the ledger
        store.set_active(account.id, false).await.unwrap();
        let _ = execute_recharge(&store, &actor, RechargeIntent { amount: dec!(1.00) }).await;

        let (stored, entries) = snapshot(&store, account.id).await;
        let total: Decimal = entries
            .iter()
            .map(|entry| entry.kind.signed(entry.amount))
            .sum();
        assert_eq!(total, stored.balance);

        // Newest first, and each entry starts where the previous one ended
        for pair in entries.windows(2) {
            assert_eq!(pair[0].balance_before, pair[1].balance_after);
        }
        assert_eq!(entries.last().unwrap().balance_before, dec!(0.00));
    }
}
