//! Concurrent transfer load test
//!
//! Seeds two accounts, fires opposite-direction transfers between them from
//! many tasks at once and checks that their total balance is unchanged.
//!
//! Run with: cargo run --bin load_test --release -- --transfers 1000 --concurrency 32

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;
use uuid::Uuid;

use wallet_ledger::handlers::{TransferCommand, TransferHandler};
use wallet_ledger::{db, IdempotencyKey, LedgerError, LedgerStore, OperationContext, PgLedgerStore};

/// Starting balance of each seeded account, in minor units
const SEED_BALANCE: i64 = 1_000_000;

fn arg(args: &[String], name: &str, default: usize) -> usize {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

async fn seed_account(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query_scalar("INSERT INTO users (name, balance) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(SEED_BALANCE)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let transfers = arg(&args, "--transfers", 1000);
    let concurrency = arg(&args, "--concurrency", 32).max(1);

    let database_url = std::env::var("DATABASE_URL")?;

    println!(
        "Load Test - {} transfers, {} concurrent",
        transfers, concurrency
    );
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(concurrency as u32 + 2)
        .connect(&database_url)
        .await?;
    db::run_migrations(&pool).await?;

    let run = Uuid::new_v4().simple().to_string();
    let alice = seed_account(&pool, &format!("load-a-{}", &run[..8])).await?;
    let bob = seed_account(&pool, &format!("load-b-{}", &run[..8])).await?;

    let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
    let permits = Arc::new(Semaphore::new(concurrency));

    let start = Instant::now();
    let mut tasks = Vec::with_capacity(transfers);

    for i in 0..transfers {
        let (from, to) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
        let handler = TransferHandler::new(store.clone());
        let permits = permits.clone();

        tasks.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let amount = Decimal::new((i as i64 % 500) + 1, 2);
            let command = TransferCommand::new(from, to, amount, IdempotencyKey::new(Uuid::new_v4()));
            handler.execute(command, &OperationContext::new()).await
        }));
    }

    let mut succeeded = 0u64;
    let mut insufficient = 0u64;
    let mut failed = 0u64;

    for task in tasks {
        match task.await? {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientFunds { .. }) => insufficient += 1,
            Err(e) => {
                failed += 1;
                eprintln!("transfer failed: {}", e);
            }
        }
    }

    let elapsed = start.elapsed();
    let rate = succeeded as f64 / elapsed.as_secs_f64();

    let total: i64 = sqlx::query_scalar("SELECT SUM(balance)::BIGINT FROM users WHERE id = ANY($1)")
        .bind(vec![alice, bob])
        .fetch_one(&pool)
        .await?;

    println!("\n=== Load Test Results ===");
    println!("Total transfers: {}", transfers);
    println!("Successful: {}", succeeded);
    println!("Insufficient funds: {}", insufficient);
    println!("Failed: {}", failed);
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Rate: {:.0} transfers/sec", rate);
    println!("Total balance: {} (expected {})", total, 2 * SEED_BALANCE);

    pool.close().await;

    if total != 2 * SEED_BALANCE {
        anyhow::bail!("balance not conserved: {} != {}", total, 2 * SEED_BALANCE);
    }

    Ok(())
}
