//! Schema migration — converges the store onto a single target version.
//!
//! The `db_version` table holds at most one row. A missing row, a NULL value
//! and 0 all mean "fresh store". Running `migrate` N times has the same
//! effect as running it once.

use sqlx::PgPool;

use crate::error::RosterError;

pub const TARGET_VERSION: i32 = 1;

pub const SEED_STUDENTS: [(&str, i32); 3] = [("Alice", 20), ("Bob", 22), ("Charlie", 21)];

const CREATE_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS db_version (version INT)";

const CREATE_STUDENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS students (
    id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    age INT NOT NULL
)
"#;

const SEED_STUDENT: &str =
    "INSERT INTO students (name, age) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING";

/// Version marker as found in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredVersion {
    pub row_present: bool,
    pub version: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPlan {
    UpToDate,
    Initialize,
    Upgrade,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate { version: i32 },
    /// `seeded` counts seed rows actually inserted.
    Initialized { seeded: u64 },
    Upgraded { from: i32 },
}

pub fn plan(current: i32, target: i32) -> MigrationPlan {
    if current >= target {
        MigrationPlan::UpToDate
    } else if current == 0 {
        MigrationPlan::Initialize
    } else {
        MigrationPlan::Upgrade
    }
}

pub async fn read_version(pool: &PgPool) -> Result<StoredVersion, RosterError> {
    let row: Option<(Option<i32>,)> = sqlx::query_as("SELECT version FROM db_version LIMIT 1")
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some((version,)) => StoredVersion {
            row_present: true,
            version: version.unwrap_or(0),
        },
        None => StoredVersion {
            row_present: false,
            version: 0,
        },
    })
}

pub async fn migrate(pool: &PgPool) -> Result<MigrationOutcome, RosterError> {
    migrate_to(pool, TARGET_VERSION).await
}

pub async fn migrate_to(pool: &PgPool, target: i32) -> Result<MigrationOutcome, RosterError> {
    sqlx::query(CREATE_VERSION_TABLE).execute(pool).await?;

    let stored = read_version(pool).await?;

    let outcome = match plan(stored.version, target) {
        MigrationPlan::UpToDate => {
            tracing::info!(version = stored.version, "Database is already up-to-date.");
            return Ok(MigrationOutcome::UpToDate {
                version: stored.version,
            });
        }
        MigrationPlan::Initialize => {
            tracing::info!("Initializing database...");
            sqlx::query(CREATE_STUDENTS_TABLE).execute(pool).await?;

            let mut seeded = 0;
            for (name, age) in SEED_STUDENTS {
                seeded += sqlx::query(SEED_STUDENT)
                    .bind(name)
                    .bind(age)
                    .execute(pool)
                    .await?
                    .rows_affected();
            }
            MigrationOutcome::Initialized { seeded }
        }
        MigrationPlan::Upgrade => MigrationOutcome::Upgraded {
            from: stored.version,
        },
    };

    write_version(pool, stored, target).await?;
    tracing::info!(version = target, "Database initialized and sample data inserted.");
    Ok(outcome)
}

async fn write_version(
    pool: &PgPool,
    stored: StoredVersion,
    target: i32,
) -> Result<(), RosterError> {
    let statement = if stored.row_present {
        "UPDATE db_version SET version = $1"
    } else {
        "INSERT INTO db_version (version) VALUES ($1)"
    };
    sqlx::query(statement).bind(target).execute(pool).await?;
    Ok(())
}
