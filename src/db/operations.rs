use sqlx::SqlitePool;
use crate::models::AnalysisResult;
use crate::types::AppResult;

pub struct DatabaseOperations;

impl DatabaseOperations {
    pub async fn insert_analysis_result(
        pool: &SqlitePool,
        query: &str,
        analysis: &str,
        file_name: &str,
    ) -> AppResult<AnalysisResult> {
        let row = sqlx::query_as::<_, AnalysisResult>(
            r#"
            INSERT INTO analysis_results (query, analysis, file_name)
            VALUES (?, ?, ?)
            RETURNING id, query, analysis, file_name
            "#,
        )
        .bind(query)
        .bind(analysis)
        .bind(file_name)
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    pub async fn get_analysis_result(
        pool: &SqlitePool,
        id: i64,
    ) -> AppResult<Option<AnalysisResult>> {
        let row = sqlx::query_as::<_, AnalysisResult>(
            "SELECT id, query, analysis, file_name FROM analysis_results WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }

    /// Newest first.
    pub async fn list_analysis_results(
        pool: &SqlitePool,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<AnalysisResult>> {
        let rows = sqlx::query_as::<_, AnalysisResult>(
            r#"
            SELECT id, query, analysis, file_name FROM analysis_results
            ORDER BY id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_analysis_results(pool: &SqlitePool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
