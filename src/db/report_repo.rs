// src/db/report_repo.rs

use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::report::{Report, ReportComment, ReportFieldValue, ReportTemplate, TemplateField},
};

#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  MODELOS DE RELATÓRIO
    // =========================================================================

    pub async fn insert_template(
        &self,
        name: &str,
        category: &str,
        fields: &[TemplateField],
    ) -> Result<ReportTemplate, AppError> {
        let template = sqlx::query_as::<_, ReportTemplate>(
            r#"
            INSERT INTO report_templates (name, category, fields)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(category)
        .bind(Json(fields))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "Já existe um modelo de relatório com este nome.".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(template)
    }

    pub async fn find_template(&self, id: Uuid) -> Result<Option<ReportTemplate>, AppError> {
        let maybe =
            sqlx::query_as::<_, ReportTemplate>("SELECT * FROM report_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(maybe)
    }

    pub async fn list_templates(&self) -> Result<Vec<ReportTemplate>, AppError> {
        let rows =
            sqlx::query_as::<_, ReportTemplate>("SELECT * FROM report_templates ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    // =========================================================================
    //  RELATÓRIOS
    // =========================================================================

    pub async fn insert_report<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        template_id: Uuid,
        submitted_by: Uuid,
        data: &[ReportFieldValue],
        attachment_urls: &[String],
    ) -> Result<Report, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let report = sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (task_id, template_id, submitted_by, data, attachment_urls)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(template_id)
        .bind(submitted_by)
        .bind(Json(data))
        .bind(attachment_urls)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    // UNIQUE(task_id): o banco é a última linha de defesa
                    // contra a dupla submissão concorrente.
                    return AppError::Conflict("Esta tarefa já possui um relatório.".into());
                }
            }
            e.into()
        })?;

        Ok(report)
    }

    pub async fn find_report(&self, id: Uuid) -> Result<Option<Report>, AppError> {
        let maybe = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_report_by_task(&self, task_id: Uuid) -> Result<Option<Report>, AppError> {
        let maybe = sqlx::query_as::<_, Report>("SELECT * FROM reports WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    /// Remoção do relatório na reatribuição da tarefa. Destrutivo e
    /// irrecuperável: o novo técnico não responde pelo relatório do
    /// antecessor.
    pub async fn delete_report_by_task<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM reports WHERE task_id = $1")
            .bind(task_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    //  COMENTÁRIOS
    // =========================================================================

    pub async fn insert_comment(
        &self,
        report_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<ReportComment, AppError> {
        let comment = sqlx::query_as::<_, ReportComment>(
            r#"
            WITH inserted AS (
                INSERT INTO report_comments (report_id, author_id, body)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT i.id, i.report_id, i.author_id, a.email AS author_email, i.body, i.created_at
            FROM inserted i
            JOIN accounts a ON a.id = i.author_id
            "#,
        )
        .bind(report_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment)
    }

    /// Comentários do mais recente para o mais antigo, como a tela exibe.
    pub async fn list_comments(&self, report_id: Uuid) -> Result<Vec<ReportComment>, AppError> {
        let rows = sqlx::query_as::<_, ReportComment>(
            r#"
            SELECT c.id, c.report_id, c.author_id, a.email AS author_email, c.body, c.created_at
            FROM report_comments c
            JOIN accounts a ON a.id = c.author_id
            WHERE c.report_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
