use anyhow::Result;
use log::info;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:gym.db";

/// One schema migration: applied once, tracked by version.
struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Ordered schema history. Never edit an applied migration; append a new one.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create members table",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS members (
                id TEXT PRIMARY KEY,
                member_number TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                registration_fee REAL NOT NULL DEFAULT 0,
                package_fee REAL,
                membership_fees REAL,
                discount REAL NOT NULL DEFAULT 0,
                paid_amount REAL NOT NULL DEFAULT 0,
                subscription_start TEXT,
                subscription_end TEXT,
                plan_type TEXT,
                subscription_status TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#],
    },
    Migration {
        version: 2,
        description: "create receipts table",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS receipts (
                id TEXT PRIMARY KEY,
                receipt_number TEXT NOT NULL UNIQUE,
                member_id TEXT REFERENCES members (id) ON DELETE CASCADE,
                payer_name TEXT NOT NULL,
                amount REAL NOT NULL,
                amount_paid REAL NOT NULL,
                due_amount REAL NOT NULL,
                payment_method TEXT NOT NULL,
                description TEXT,
                receipt_category TEXT,
                is_initial INTEGER NOT NULL DEFAULT 0,
                original_receipt_id TEXT,
                version_number INTEGER NOT NULL DEFAULT 1,
                is_current_version INTEGER NOT NULL DEFAULT 1,
                superseded_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_receipts_member_id
            ON receipts(member_id);
            "#,
            // One initial receipt per (member, category). Duplicate initial
            // receipts are suppressed by catching this constraint at insert
            // time, not by a pre-check query.
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_receipts_initial
            ON receipts(member_id, receipt_category) WHERE is_initial = 1;
            "#,
        ],
    },
    Migration {
        version: 3,
        description: "create deleted_members archive table",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS deleted_members (
                id TEXT PRIMARY KEY,
                member_id TEXT NOT NULL,
                member_number TEXT NOT NULL,
                member_json TEXT NOT NULL,
                deleted_by TEXT NOT NULL,
                delete_reason TEXT,
                deleted_at TEXT NOT NULL
            );
            "#],
    },
    Migration {
        version: 4,
        description: "create counters table",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            "#],
    },
    Migration {
        version: 5,
        description: "create member-dependent tables",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS invoices (
                id TEXT PRIMARY KEY,
                invoice_number TEXT NOT NULL UNIQUE,
                member_id TEXT REFERENCES members (id) ON DELETE CASCADE,
                amount REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                member_id TEXT NOT NULL REFERENCES members (id) ON DELETE CASCADE,
                check_in TEXT NOT NULL,
                check_out TEXT
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS body_measurements (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                member_id TEXT NOT NULL REFERENCES members (id) ON DELETE CASCADE,
                recorded_at TEXT NOT NULL,
                weight REAL,
                height REAL
            );
            "#,
        ],
    },
];

/// DbConnection manages database operations
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        // The store is single-process: one connection serializes all ledger
        // operations, so multi-step mutations never interleave.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    #[cfg(test)]
    pub async fn init_test() -> Result<Self> {
        // Generate a unique database name for tests
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending schema migrations in order, each in its own transaction.
    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        let current: i64 = sqlx::query("SELECT COALESCE(MAX(version), 0) AS v FROM schema_migrations")
            .fetch_one(pool)
            .await?
            .get("v");

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            info!(
                "Applying schema migration {}: {}",
                migration.version, migration.description
            );

            let mut tx = pool.begin().await?;
            for statement in migration.statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?, ?, ?)",
            )
            .bind(migration.version)
            .bind(migration.description)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = DbConnection::init_test().await.expect("init failed");

        // Re-running against an already migrated database applies nothing
        DbConnection::run_migrations(db.pool())
            .await
            .expect("second run failed");

        let row = sqlx::query("SELECT COUNT(*) AS n FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .expect("query failed");
        let applied: i64 = row.get("n");
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_schema_tables_exist() {
        let db = DbConnection::init_test().await.expect("init failed");

        for table in [
            "members",
            "receipts",
            "deleted_members",
            "counters",
            "invoices",
            "attendance",
            "body_measurements",
        ] {
            let row = sqlx::query("SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(db.pool())
                .await
                .expect("query failed");
            let n: i64 = row.get("n");
            assert_eq!(n, 1, "missing table {}", table);
        }
    }
}
