// src/services/dispatch_service.rs

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::{ApplicationRepository, ReportRepository, TaskRepository},
    models::{
        account::{Account, Role},
        application::ApprovalStatus,
        report::{ReportSubmission, validate_report_data},
        task::{Task, TaskStatus, Technician, TechnicianStatus},
    },
};

#[derive(Clone)]
pub struct DispatchService {
    task_repo: TaskRepository,
    application_repo: ApplicationRepository,
    report_repo: ReportRepository,
    pool: PgPool,
    // Resolução explícita da ambiguidade da reatribuição: por padrão o
    // técnico liberado volta para 'available'; configurável via
    // REASSIGN_RELEASES_TECHNICIAN.
    release_technician_on_reassign: bool,
}

impl DispatchService {
    pub fn new(
        task_repo: TaskRepository,
        application_repo: ApplicationRepository,
        report_repo: ReportRepository,
        pool: PgPool,
        release_technician_on_reassign: bool,
    ) -> Self {
        Self {
            task_repo,
            application_repo,
            report_repo,
            pool,
            release_technician_on_reassign,
        }
    }

    // =========================================================================
    //  TÉCNICOS
    // =========================================================================

    pub async fn register_technician(
        &self,
        account_id: Uuid,
        sub_city: &str,
        woreda: &str,
    ) -> Result<Technician, AppError> {
        self.task_repo
            .insert_technician(&self.pool, account_id, sub_city, woreda)
            .await
    }

    pub async fn list_technicians(&self) -> Result<Vec<Technician>, AppError> {
        self.task_repo.list_technicians().await
    }

    /// Mudança de licença via update condicional: não existe janela entre
    /// "ler o status" e "gravar a licença", então uma atribuição
    /// concorrente não deixa um técnico de licença com tarefa ativa.
    pub async fn set_technician_on_leave(&self, id: Uuid, on_leave: bool) -> Result<(), AppError> {
        let (from, to) = TechnicianStatus::leave_change(on_leave);

        if self.task_repo.set_technician_status_if(id, from, to).await? {
            return Ok(());
        }

        // O guarda não encontrou a linha: técnico inexistente ou fora do
        // estado de origem (ex.: com tarefa ativa).
        let technician = self
            .task_repo
            .find_technician(id)
            .await?
            .ok_or(AppError::NotFound("Técnico"))?;
        Err(AppError::InvalidTransition {
            from: technician.status.as_str().into(),
            to: to.as_str().into(),
        })
    }

    // =========================================================================
    //  ATRIBUIÇÃO
    // =========================================================================

    /// Cria a ordem de serviço. Pré-condições independentes: requisição
    /// aprovada, recibo aprovado e técnico disponível — a última via
    /// update condicional dentro da transação, para duas atribuições
    /// concorrentes não reivindicarem o mesmo técnico.
    pub async fn assign_task(
        &self,
        application_id: Uuid,
        technician_id: Uuid,
        scheduled_at: DateTime<Utc>,
        assigner: &Account,
    ) -> Result<Task, AppError> {
        let application = self
            .application_repo
            .find_application(application_id)
            .await?
            .ok_or(AppError::NotFound("Requisição"))?;

        let receipt = self
            .application_repo
            .find_receipt_by_application(application_id)
            .await?
            .ok_or(AppError::NotFound("Recibo"))?;

        let technician = self
            .task_repo
            .find_technician(technician_id)
            .await?
            .ok_or(AppError::NotFound("Técnico"))?;

        assignment_gate(application.status, receipt.status, technician.status)?;

        let mut tx = self.pool.begin().await?;

        if !self.task_repo.claim_technician(&mut *tx, technician_id).await? {
            return Err(AppError::PreconditionFailed(
                "O técnico não está disponível.".into(),
            ));
        }

        let task = self
            .task_repo
            .insert_task(
                &mut *tx,
                application_id,
                receipt.id,
                technician_id,
                application.account_id,
                assigner.id,
                scheduled_at,
            )
            .await?;

        tx.commit().await?;
        Ok(task)
    }

    // =========================================================================
    //  TRANSIÇÕES
    // =========================================================================

    pub async fn get_task(&self, id: Uuid) -> Result<Task, AppError> {
        self.task_repo.find_task(id).await?.ok_or(AppError::NotFound("Tarefa"))
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, AppError> {
        self.task_repo.list_tasks().await
    }

    pub async fn list_tasks_for(&self, account: &Account) -> Result<Vec<Task>, AppError> {
        match account.role {
            Role::Customer => self.task_repo.list_tasks_by_customer(account.id).await,
            Role::Technician => {
                let technician = self
                    .task_repo
                    .find_technician_by_account(account.id)
                    .await?
                    .ok_or(AppError::NotFound("Técnico"))?;
                self.task_repo.list_tasks_by_technician(technician.id).await
            }
            _ => self.task_repo.list_tasks().await,
        }
    }

    /// Transição de status da tarefa, com os carimbos de tempo e os
    /// efeitos colaterais de cada chegada:
    ///   assigned -> in_progress   carimba started_at
    ///   in_progress -> completed  carimba completed_at, liga o relatório
    ///                             (se enviado) e libera o técnico
    ///   {assigned,in_progress} -> cancelled  libera o técnico
    pub async fn update_task_status(
        &self,
        task_id: Uuid,
        new_status: TaskStatus,
        report: Option<ReportSubmission>,
        actor: &Account,
    ) -> Result<Task, AppError> {
        report_timing_gate(new_status, report.is_some())?;

        // Leitura do modelo e validação dos dados antes de abrir a
        // transação: nenhuma segunda conexão do pool fica presa enquanto a
        // linha da tarefa está travada com FOR UPDATE.
        let report = match report {
            Some(submission) => {
                let template = self
                    .report_repo
                    .find_template(submission.template_id)
                    .await?
                    .ok_or(AppError::NotFound("Modelo de relatório"))?;
                validate_report_data(&template.fields.0, &submission.data)?;
                Some(submission)
            }
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        let task = self
            .task_repo
            .find_task_for_update(&mut *tx, task_id)
            .await?
            .ok_or(AppError::NotFound("Tarefa"))?;

        self.ensure_actor_may_touch(&task, actor).await?;

        if !task.status.can_transition(new_status) {
            return Err(AppError::InvalidTransition {
                from: task.status.as_str().into(),
                to: new_status.as_str().into(),
            });
        }

        let now = Utc::now();
        let (started_at, completed_at) = match new_status {
            TaskStatus::InProgress => (Some(now), None),
            TaskStatus::Completed => (None, Some(now)),
            _ => (None, None),
        };

        if let Some(submission) = report {
            if task.report_id.is_some() {
                return Err(AppError::Conflict("Esta tarefa já possui um relatório.".into()));
            }

            let created = self
                .report_repo
                .insert_report(
                    &mut *tx,
                    task.id,
                    submission.template_id,
                    actor.id,
                    &submission.data,
                    &submission.attachment_urls,
                )
                .await?;

            if !self
                .task_repo
                .link_report_if_unlinked(&mut *tx, task.id, created.id)
                .await?
            {
                return Err(AppError::Conflict("Esta tarefa já possui um relatório.".into()));
            }
        }

        let updated = self
            .task_repo
            .set_task_status(&mut *tx, task.id, new_status, started_at, completed_at)
            .await?;

        if new_status.is_terminal() {
            self.task_repo
                .set_technician_status(&mut *tx, task.technician_id, TechnicianStatus::Available)
                .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Reatribuição: apaga o relatório anterior (destrutivo — o novo
    /// técnico não responde pelo relatório do antecessor), volta o status
    /// para 'assigned' e reivindica o novo técnico.
    pub async fn reassign_task(
        &self,
        task_id: Uuid,
        new_technician_id: Uuid,
    ) -> Result<Task, AppError> {
        let mut tx = self.pool.begin().await?;

        let task = self
            .task_repo
            .find_task_for_update(&mut *tx, task_id)
            .await?
            .ok_or(AppError::NotFound("Tarefa"))?;

        if task.status.is_terminal() {
            return Err(AppError::PreconditionFailed(
                "Uma tarefa encerrada não pode ser reatribuída.".into(),
            ));
        }
        if task.technician_id == new_technician_id {
            return Err(AppError::Conflict("O técnico já é o responsável pela tarefa.".into()));
        }

        self.task_repo
            .find_technician(new_technician_id)
            .await?
            .ok_or(AppError::NotFound("Técnico"))?;

        if !self.task_repo.claim_technician(&mut *tx, new_technician_id).await? {
            return Err(AppError::PreconditionFailed(
                "O novo técnico não está disponível.".into(),
            ));
        }

        // Primeiro o relatório, para o vínculo (report_id) já cair junto.
        self.report_repo.delete_report_by_task(&mut *tx, task.id).await?;

        if self.release_technician_on_reassign {
            self.task_repo
                .set_technician_status(&mut *tx, task.technician_id, TechnicianStatus::Available)
                .await?;
        }

        let updated = self.task_repo.reassign_task(&mut *tx, task.id, new_technician_id).await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Técnico só mexe na própria tarefa; o restante da equipe pode tudo.
    async fn ensure_actor_may_touch(&self, task: &Task, actor: &Account) -> Result<(), AppError> {
        match actor.role {
            Role::Customer => {
                Err(AppError::Forbidden("Clientes não alteram o status de tarefas.".into()))
            }
            Role::Technician => {
                let technician = self
                    .task_repo
                    .find_technician_by_account(actor.id)
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
}

/// Pré-condições independentes da atribuição: requisição aprovada, recibo
/// aprovado e técnico disponível. A disponibilidade ainda é reivindicada
/// por update condicional dentro da transação; aqui ela só produz o erro
/// certo sem abrir transação à toa.
fn assignment_gate(
    application_status: ApprovalStatus,
    receipt_status: ApprovalStatus,
    technician_status: TechnicianStatus,
) -> Result<(), AppError> {
    if application_status != ApprovalStatus::Approved {
        return Err(AppError::PreconditionFailed(
            "A requisição ainda não está aprovada.".into(),
        ));
    }
    if receipt_status != ApprovalStatus::Approved {
        return Err(AppError::PreconditionFailed(
            "O recibo desta requisição ainda não está aprovado.".into(),
        ));
    }
    if technician_status != TechnicianStatus::Available {
        return Err(AppError::PreconditionFailed(
            "O técnico não está disponível.".into(),
        ));
    }
    Ok(())
}

/// O relatório só acompanha a transição para 'completed'. Mandá-lo junto
/// de qualquer outra transição é erro do chamador, não dado a descartar.
fn report_timing_gate(new_status: TaskStatus, has_report: bool) -> Result<(), AppError> {
    if has_report && new_status != TaskStatus::Completed {
        let mut errors = ValidationErrors::new();
        let mut err = ValidationError::new("report");
        err.message = Some("O relatório só pode acompanhar a transição para 'completed'.".into());
        errors.add("report".into(), err);
        return Err(AppError::ValidationError(errors));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atribuicao_exige_requisicao_aprovada() {
        let result = assignment_gate(
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            TechnicianStatus::Available,
        );
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[test]
    fn atribuicao_exige_recibo_aprovado() {
        // Requisição aprovada não basta: o recibo ainda pendente (não
        // pago) barra a atribuição sozinho.
        let result = assignment_gate(
            ApprovalStatus::Approved,
            ApprovalStatus::Pending,
            TechnicianStatus::Available,
        );
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[test]
    fn atribuicao_exige_tecnico_disponivel() {
        for status in [TechnicianStatus::Assigned, TechnicianStatus::OnLeave] {
            let result =
                assignment_gate(ApprovalStatus::Approved, ApprovalStatus::Approved, status);
            assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
        }
    }

    #[test]
    fn atribuicao_passa_com_os_tres_portoes() {
        assert!(
            assignment_gate(
                ApprovalStatus::Approved,
                ApprovalStatus::Approved,
                TechnicianStatus::Available,
            )
            .is_ok()
        );
    }

    #[test]
    fn relatorio_fora_da_conclusao_e_rejeitado() {
        for status in [TaskStatus::InProgress, TaskStatus::Cancelled] {
            let result = report_timing_gate(status, true);
            assert!(matches!(result, Err(AppError::ValidationError(_))));
        }
    }

    #[test]
    fn relatorio_junto_da_conclusao_e_aceito() {
        assert!(report_timing_gate(TaskStatus::Completed, true).is_ok());
        // Sem relatório, qualquer transição passa por este portão.
        assert!(report_timing_gate(TaskStatus::Cancelled, false).is_ok());
    }
}

// Fluxos que atravessam os guardas do banco. Precisam de um Postgres
// acessível: cargo test --features pg-tests
#[cfg(all(test, feature = "pg-tests"))]
mod pg_tests {
    use super::*;

    use crate::db::AccountRepository;

    fn service(pool: &PgPool) -> DispatchService {
        DispatchService::new(
            TaskRepository::new(pool.clone()),
            ApplicationRepository::new(pool.clone()),
            ReportRepository::new(pool.clone()),
            pool.clone(),
            true,
        )
    }

    async fn tecnico(pool: &PgPool) -> Technician {
        let account = AccountRepository::new(pool.clone())
            .insert(pool, "ext-tecnico", "tecnico@example.com", Role::Technician)
            .await
            .unwrap();
        TaskRepository::new(pool.clone())
            .insert_technician(pool, account.id, "Bole", "03")
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn licenca_recusada_para_tecnico_com_tarefa(pool: PgPool) {
        let technician = tecnico(&pool).await;
        let task_repo = TaskRepository::new(pool.clone());

        // Uma atribuição concorrente reivindicou o técnico.
        assert!(task_repo.claim_technician(&pool, technician.id).await.unwrap());

        let err = service(&pool)
            .set_technician_on_leave(technician.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        let technician = task_repo.find_technician(technician.id).await.unwrap().unwrap();
        assert_eq!(technician.status, TechnicianStatus::Assigned);
    }

    #[sqlx::test]
    async fn licenca_e_retorno_para_tecnico_disponivel(pool: PgPool) {
        let technician = tecnico(&pool).await;
        let service = service(&pool);

        service.set_technician_on_leave(technician.id, true).await.unwrap();
        service.set_technician_on_leave(technician.id, false).await.unwrap();

        let technician = TaskRepository::new(pool.clone())
            .find_technician(technician.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(technician.status, TechnicianStatus::Available);
    }
}
