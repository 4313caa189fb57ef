//! Common test utilities

#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub const ALICE: i64 = 1;
pub const BOB: i64 = 2;
pub const CAROL: i64 = 3;

/// Setup test database - migrate, truncate tables and seed test accounts
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    wallet_ledger::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE transactions, users RESTART IDENTITY CASCADE")
        .execute(&mut *tx)
        .await
        .expect("Failed to clean up DB");

    sqlx::query(
        r#"
        INSERT INTO users (id, name, balance)
        VALUES ($1, 'Alice', 15000), ($2, 'Bob', 0), ($3, 'Carol', 5000)
        "#,
    )
    .bind(ALICE)
    .bind(BOB)
    .bind(CAROL)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed users");

    sqlx::query("SELECT setval('users_id_seq', (SELECT MAX(id) FROM users))")
        .execute(&mut *tx)
        .await
        .expect("Failed to bump users sequence");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}

/// Current balance of an account in minor units
pub async fn balance_of(pool: &PgPool, account_id: i64) -> i64 {
    sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}

/// Number of stored transaction records
pub async fn transaction_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await
        .expect("Failed to count transactions")
}
