// src/services/report_service.rs

use sqlx::PgPool;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::{ReportRepository, TaskRepository},
    models::{
        account::{Account, Role},
        report::{
            FieldType, Report, ReportComment, ReportSubmission, ReportTemplate, TemplateField,
            validate_report_data,
        },
        task::Task,
    },
};

#[derive(Clone)]
pub struct ReportService {
    report_repo: ReportRepository,
    task_repo: TaskRepository,
    pool: PgPool,
}

impl ReportService {
    pub fn new(report_repo: ReportRepository, task_repo: TaskRepository, pool: PgPool) -> Self {
        Self { report_repo, task_repo, pool }
    }

    // =========================================================================
    //  MODELOS
    // =========================================================================

    pub async fn create_template(
        &self,
        name: &str,
        category: &str,
        fields: Vec<TemplateField>,
    ) -> Result<ReportTemplate, AppError> {
        let mut errors = ValidationErrors::new();
        if fields.is_empty() {
            let mut err = ValidationError::new("length");
            err.message = Some("O modelo precisa de ao menos um campo.".into());
            errors.add("fields".into(), err);
        }
        for field in &fields {
            if field.field_type == FieldType::Select
                && field.options.as_ref().is_none_or(|o| o.is_empty())
            {
                let mut err = ValidationError::new("options");
                err.message =
                    Some(format!("O campo '{}' do tipo SELECT precisa de opções.", field.name).into());
                errors.add(Box::leak(field.name.clone().into_boxed_str()), err);
            }
        }
        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }

        self.report_repo.insert_template(name, category, &fields).await
    }

    pub async fn list_templates(&self) -> Result<Vec<ReportTemplate>, AppError> {
        self.report_repo.list_templates().await
    }

    // =========================================================================
    //  SUBMISSÃO
    // =========================================================================

    /// Submissão direta do relatório de uma tarefa. O pré-check de
    /// duplicidade responde 409 cedo; quem decide de verdade é o vínculo
    /// condicional (e, por último, o UNIQUE do banco).
    pub async fn submit_report(
        &self,
        task_id: Uuid,
        submission: ReportSubmission,
        submitter: &Account,
    ) -> Result<Report, AppError> {
        let task = self
            .task_repo
            .find_task(task_id)
            .await?
            .ok_or(AppError::NotFound("Tarefa"))?;

        self.ensure_submitter(&task, submitter).await?;

        if task.report_id.is_some() {
            return Err(AppError::Conflict("Esta tarefa já possui um relatório.".into()));
        }

        let template = self
            .report_repo
            .find_template(submission.template_id)
            .await?
            .ok_or(AppError::NotFound("Modelo de relatório"))?;
        validate_report_data(&template.fields.0, &submission.data)?;

        let mut tx = self.pool.begin().await?;

        let report = self
            .report_repo
            .insert_report(
                &mut *tx,
                task.id,
                submission.template_id,
                submitter.id,
                &submission.data,
                &submission.attachment_urls,
            )
            .await?;

        if !self.task_repo.link_report_if_unlinked(&mut *tx, task.id, report.id).await? {
            return Err(AppError::Conflict("Esta tarefa já possui um relatório.".into()));
        }

        tx.commit().await?;
        Ok(report)
    }

    pub async fn get_report_for_task(
        &self,
        task_id: Uuid,
        requester: &Account,
    ) -> Result<Report, AppError> {
        let task = self
            .task_repo
            .find_task(task_id)
            .await?
            .ok_or(AppError::NotFound("Tarefa"))?;
        if !requester.role.is_staff() && task.customer_id != requester.id {
            return Err(AppError::Forbidden(
                "Você não tem relação com esta tarefa.".into(),
            ));
        }

        self.report_repo
            .find_report_by_task(task_id)
            .await?
            .ok_or(AppError::NotFound("Relatório"))
    }

    pub async fn get_report(&self, id: Uuid, requester: &Account) -> Result<Report, AppError> {
        let report = self
            .report_repo
            .find_report(id)
            .await?
            .ok_or(AppError::NotFound("Relatório"))?;
        self.ensure_related(&report, requester).await?;
        Ok(report)
    }

    // =========================================================================
    //  COMENTÁRIOS
    // =========================================================================

    /// Comentários são imutáveis e só de quem tem relação com a tarefa:
    /// equipe, ou o cliente dono da requisição subjacente.
    pub async fn add_comment(
        &self,
        report_id: Uuid,
        author: &Account,
        body: &str,
    ) -> Result<ReportComment, AppError> {
        if body.trim().is_empty() {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("length");
            err.message = Some("O comentário não pode ser vazio.".into());
            errors.add("body".into(), err);
            return Err(AppError::ValidationError(errors));
        }

        let report = self
            .report_repo
            .find_report(report_id)
            .await?
            .ok_or(AppError::NotFound("Relatório"))?;
        self.ensure_related(&report, author).await?;

        self.report_repo.insert_comment(report_id, author.id, body).await
    }

    pub async fn list_comments(
        &self,
        report_id: Uuid,
        requester: &Account,
    ) -> Result<Vec<ReportComment>, AppError> {
        let report = self
            .report_repo
            .find_report(report_id)
            .await?
            .ok_or(AppError::NotFound("Relatório"))?;
        self.ensure_related(&report, requester).await?;

        self.report_repo.list_comments(report_id).await
    }

    async fn ensure_submitter(&self, task: &Task, submitter: &Account) -> Result<(), AppError> {
        match submitter.role {
            Role::Customer => {
                Err(AppError::Forbidden("Clientes não submetem relatórios.".into()))
            }
            Role::Technician => {
                let technician = self
                    .task_repo
                    .find_technician_by_account(submitter.id)
                    .await?
                    .ok_or(AppError::NotFound("Técnico"))?;
                if technician.id != task.technician_id {
                    return Err(AppError::Forbidden(
                        "Esta tarefa está atribuída a outro técnico.".into(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn ensure_related(&self, report: &Report, account: &Account) -> Result<(), AppError> {
        if account.role.is_staff() {
            return Ok(());
        }
        let task = self
            .task_repo
            .find_task(report.task_id)
            .await?
            .ok_or(AppError::NotFound("Tarefa"))?;
        if task.customer_id != account.id {
            return Err(AppError::Forbidden(
                "Você não tem relação com este relatório.".into(),
            ));
        }
        Ok(())
    }
}
