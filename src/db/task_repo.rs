// src/db/task_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::task::{Task, TaskStatus, Technician, TechnicianStatus},
};

#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  TÉCNICOS
    // =========================================================================

    pub async fn insert_technician<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        sub_city: &str,
        woreda: &str,
    ) -> Result<Technician, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let technician = sqlx::query_as::<_, Technician>(
            r#"
            INSERT INTO technicians (account_id, sub_city, woreda)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(sub_city)
        .bind(woreda)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "Esta conta já possui um registro de técnico.".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(technician)
    }

    pub async fn find_technician(&self, id: Uuid) -> Result<Option<Technician>, AppError> {
        let maybe = sqlx::query_as::<_, Technician>("SELECT * FROM technicians WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_technician_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<Technician>, AppError> {
        let maybe =
            sqlx::query_as::<_, Technician>("SELECT * FROM technicians WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(maybe)
    }

    pub async fn list_technicians(&self) -> Result<Vec<Technician>, AppError> {
        let rows = sqlx::query_as::<_, Technician>(
            "SELECT * FROM technicians ORDER BY sub_city, woreda",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Reivindica um técnico disponível para uma nova tarefa. Atualização
    /// condicional em vez de ler-e-depois-gravar: se duas atribuições
    /// correrem, só uma encontra `status = 'available'`.
    pub async fn claim_technician<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE technicians
            SET status = 'assigned', updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Mudança de status condicionada ao estado corrente. Retorna false
    /// quando a linha não estava no estado esperado (ou não existe) —
    /// fecha a janela ler-e-depois-gravar da mudança de licença.
    pub async fn set_technician_status_if(
        &self,
        id: Uuid,
        from: TechnicianStatus,
        to: TechnicianStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE technicians SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_technician_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: TechnicianStatus,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE technicians SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  TAREFAS
    // =========================================================================

    pub async fn insert_task<'e, E>(
        &self,
        executor: E,
        application_id: Uuid,
        receipt_id: Uuid,
        technician_id: Uuid,
        customer_id: Uuid,
        assigned_by: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Task, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (application_id, receipt_id, technician_id, customer_id, assigned_by, scheduled_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(receipt_id)
        .bind(technician_id)
        .bind(customer_id)
        .bind(assigned_by)
        .bind(scheduled_at)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "Esta requisição já possui uma tarefa atribuída.".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(task)
    }

    pub async fn find_task(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let maybe = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    /// Trava a linha da tarefa pela duração da transação, serializando
    /// transições concorrentes sobre a mesma tarefa.
    pub async fn find_task_for_update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Task>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(maybe)
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_tasks_by_technician(&self, technician_id: Uuid) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE technician_id = $1 ORDER BY scheduled_at ASC",
        )
        .bind(technician_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_tasks_by_customer(&self, customer_id: Uuid) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Aplica uma transição já validada, carimbando started_at /
    /// completed_at quando fornecidos.
    pub async fn set_task_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: TaskStatus,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Task, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET status = $2,
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(started_at)
        .bind(completed_at)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Tarefa"))?;
        Ok(task)
    }

    /// Liga o relatório 1:1 à tarefa. O guarda `report_id IS NULL` faz a
    /// submissão concorrente perder em vez de sobrescrever.
    pub async fn link_report_if_unlinked<'e, E>(
        &self,
        executor: E,
        task_id: Uuid,
        report_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET report_id = $2, updated_at = NOW()
            WHERE id = $1 AND report_id IS NULL
            "#,
        )
        .bind(task_id)
        .bind(report_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Reatribuição: novo técnico, status de volta para 'assigned',
    /// carimbos e vínculo de relatório limpos.
    pub async fn reassign_task<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        new_technician_id: Uuid,
    ) -> Result<Task, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET technician_id = $2, status = 'assigned',
                started_at = NULL, completed_at = NULL, report_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_technician_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Tarefa"))?;
        Ok(task)
    }
}
