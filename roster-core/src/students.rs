//! Single-statement access to the `students` table.
//!
//! Each function issues exactly one statement against the pool; atomicity
//! is whatever the store gives a single statement.

use sqlx::PgPool;

use crate::error::RosterError;
use crate::models::{Student, StudentInput};

pub async fn list(pool: &PgPool) -> Result<Vec<Student>, RosterError> {
    let students = sqlx::query_as::<_, Student>("SELECT id, name, age FROM students ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(students)
}

/// Insert a student and return the id the store assigned.
pub async fn insert(pool: &PgPool, input: &StudentInput) -> Result<i32, RosterError> {
    let id: i32 = sqlx::query_scalar("INSERT INTO students (name, age) VALUES ($1, $2) RETURNING id")
        .bind(input.name.as_deref())
        .bind(input.age)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<Student>, RosterError> {
    let student =
        sqlx::query_as::<_, Student>("SELECT id, name, age FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(student)
}

/// Returns the number of rows touched; callers do not treat 0 as an error.
pub async fn update(pool: &PgPool, id: i32, input: &StudentInput) -> Result<u64, RosterError> {
    let result = sqlx::query("UPDATE students SET name = $1, age = $2 WHERE id = $3")
        .bind(input.name.as_deref())
        .bind(input.age)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete(pool: &PgPool, id: i32) -> Result<u64, RosterError> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
