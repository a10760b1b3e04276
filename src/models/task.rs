// src/models/task.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "technician_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TechnicianStatus {
    Available,
    Assigned,
    OnLeave,
}

impl TechnicianStatus {
    /// Estado de origem exigido para cada lado da mudança de licença:
    /// entrar em licença exige 'available', voltar exige 'on_leave'.
    /// Um técnico com tarefa ativa ('assigned') nunca é origem válida.
    pub fn leave_change(on_leave: bool) -> (TechnicianStatus, TechnicianStatus) {
        if on_leave {
            (TechnicianStatus::Available, TechnicianStatus::OnLeave)
        } else {
            (TechnicianStatus::OnLeave, TechnicianStatus::Available)
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TechnicianStatus::Available => "available",
            TechnicianStatus::Assigned => "assigned",
            TechnicianStatus::OnLeave => "on_leave",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub id: Uuid,
    pub account_id: Uuid,
    pub sub_city: String,
    pub woreda: String,
    // "assigned" sse exatamente uma tarefa ativa referencia este técnico;
    // volta para "available" quando essa tarefa chega a um estado terminal.
    pub status: TechnicianStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Matriz de transições: assigned -> in_progress -> completed,
    /// e {assigned, in_progress} -> cancelled. Todo o resto é rejeitado.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        matches!(
            (self, to),
            (TaskStatus::Assigned, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::Assigned, TaskStatus::Cancelled)
                | (TaskStatus::InProgress, TaskStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

// Ordem de serviço: criada apenas quando requisição e recibo estão
// aprovados e o técnico está disponível.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub application_id: Uuid,
    pub receipt_id: Uuid,
    pub technician_id: Uuid,
    pub customer_id: Uuid,
    pub assigned_by: Uuid,
    pub status: TaskStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub report_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    const ALL: [TaskStatus; 4] = [Assigned, InProgress, Completed, Cancelled];

    #[test]
    fn matriz_de_transicoes_completa() {
        let permitidas = [
            (Assigned, InProgress),
            (InProgress, Completed),
            (Assigned, Cancelled),
            (InProgress, Cancelled),
        ];
        for from in ALL {
            for to in ALL {
                let esperado = permitidas.contains(&(from, to));
                assert_eq!(
                    from.can_transition(to),
                    esperado,
                    "transição {:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn licenca_nunca_parte_de_tecnico_atribuido() {
        // As duas direções da mudança de licença exigem um estado de
        // origem que nunca é 'assigned': com tarefa ativa, nem entra
        // de licença nem "volta" para disponível por esta via.
        let (entrada, _) = TechnicianStatus::leave_change(true);
        let (saida, _) = TechnicianStatus::leave_change(false);
        assert_eq!(entrada, TechnicianStatus::Available);
        assert_eq!(saida, TechnicianStatus::OnLeave);
        assert_ne!(entrada, TechnicianStatus::Assigned);
        assert_ne!(saida, TechnicianStatus::Assigned);
    }

    #[test]
    fn destino_da_mudanca_de_licenca() {
        assert_eq!(
            TechnicianStatus::leave_change(true),
            (TechnicianStatus::Available, TechnicianStatus::OnLeave)
        );
        assert_eq!(
            TechnicianStatus::leave_change(false),
            (TechnicianStatus::OnLeave, TechnicianStatus::Available)
        );
    }

    #[test]
    fn estados_terminais() {
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Assigned.is_terminal());
        assert!(!InProgress.is_terminal());
    }
}
