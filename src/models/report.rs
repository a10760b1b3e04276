// src/models/report.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
    Select,
}

// Esquema de um campo do modelo de relatório.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub name: String,
    pub label: String,
    pub field_type: FieldType,
    pub required: bool,
    pub options: Option<Vec<String>>, // Somente para SELECT
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: String, // Ex: "technical"
    pub fields: Json<Vec<TemplateField>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportFieldValue {
    pub field_name: String,
    pub value: serde_json::Value,
}

// Relatório de conclusão, ligado 1:1 à tarefa. Não há ciclo de revisão:
// existir já significa "submetido".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub task_id: Uuid,
    pub template_id: Uuid,
    pub submitted_by: Uuid,
    pub data: Json<Vec<ReportFieldValue>>,
    pub attachment_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// Comentário de um relatório, imutável depois de criado; a listagem
// vem ordenada do mais recente para o mais antigo.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReportComment {
    pub id: Uuid,
    pub report_id: Uuid,
    pub author_id: Uuid,
    pub author_email: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// Conteúdo de uma submissão de relatório (direta ou junto com a
// conclusão da tarefa).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSubmission {
    pub template_id: Uuid,
    pub data: Vec<ReportFieldValue>,
    #[serde(default)]
    pub attachment_urls: Vec<String>,
}

fn field_error(message: String) -> ValidationError {
    let mut err = ValidationError::new("report_field");
    err.message = Some(message.into());
    err
}

/// Valida os valores enviados contra o esquema do modelo: campos
/// obrigatórios presentes, tipos corretos e opções de SELECT respeitadas.
/// Campos que não existem no esquema são rejeitados.
pub fn validate_report_data(
    schema: &[TemplateField],
    values: &[ReportFieldValue],
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    for field in schema {
        let value = values
            .iter()
            .find(|v| v.field_name == field.name)
            .map(|v| &v.value);

        let value = match value {
            Some(v) if !v.is_null() => v,
            _ => {
                if field.required {
                    errors.add(
                        Box::leak(field.name.clone().into_boxed_str()),
                        field_error(format!("O campo '{}' é obrigatório.", field.label)),
                    );
                }
                continue;
            }
        };

        let ok = match field.field_type {
            FieldType::Text => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            FieldType::Select => {
                let options = field.options.as_deref().unwrap_or(&[]);
                value
                    .as_str()
                    .is_some_and(|s| options.iter().any(|o| o == s))
            }
        };

        if !ok {
            errors.add(
                Box::leak(field.name.clone().into_boxed_str()),
                field_error(format!("Valor inválido para o campo '{}'.", field.label)),
            );
        }
    }

    for value in values {
        if !schema.iter().any(|f| f.name == value.field_name) {
            errors.add(
                Box::leak(value.field_name.clone().into_boxed_str()),
                field_error(format!(
                    "O campo '{}' não existe no modelo de relatório.",
                    value.field_name
                )),
            );
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Vec<TemplateField> {
        vec![
            TemplateField {
                name: "meter_reading".into(),
                label: "Leitura do medidor".into(),
                field_type: FieldType::Number,
                required: true,
                options: None,
            },
            TemplateField {
                name: "inspection_date".into(),
                label: "Data da inspeção".into(),
                field_type: FieldType::Date,
                required: true,
                options: None,
            },
            TemplateField {
                name: "result".into(),
                label: "Resultado".into(),
                field_type: FieldType::Select,
                required: true,
                options: Some(vec!["PASS".into(), "FAIL".into()]),
            },
            TemplateField {
                name: "notes".into(),
                label: "Observações".into(),
                field_type: FieldType::Text,
                required: false,
                options: None,
            },
        ]
    }

    fn value(name: &str, v: serde_json::Value) -> ReportFieldValue {
        ReportFieldValue { field_name: name.into(), value: v }
    }

    #[test]
    fn dados_completos_passam() {
        let values = vec![
            value("meter_reading", json!(1532.5)),
            value("inspection_date", json!("2024-06-01")),
            value("result", json!("PASS")),
        ];
        assert!(validate_report_data(&schema(), &values).is_ok());
    }

    #[test]
    fn obrigatorio_ausente_falha() {
        let values = vec![
            value("meter_reading", json!(10)),
            value("result", json!("PASS")),
        ];
        let err = validate_report_data(&schema(), &values).unwrap_err();
        assert!(err.field_errors().contains_key("inspection_date"));
    }

    #[test]
    fn tipo_errado_falha() {
        let values = vec![
            value("meter_reading", json!("não é número")),
            value("inspection_date", json!("2024-06-01")),
            value("result", json!("PASS")),
        ];
        assert!(validate_report_data(&schema(), &values).is_err());
    }

    #[test]
    fn opcao_fora_da_lista_falha() {
        let values = vec![
            value("meter_reading", json!(1)),
            value("inspection_date", json!("2024-06-01")),
            value("result", json!("TALVEZ")),
        ];
        assert!(validate_report_data(&schema(), &values).is_err());
    }

    #[test]
    fn campo_desconhecido_falha() {
        let values = vec![
            value("meter_reading", json!(1)),
            value("inspection_date", json!("2024-06-01")),
            value("result", json!("PASS")),
            value("intruso", json!("x")),
        ];
        assert!(validate_report_data(&schema(), &values).is_err());
    }

    #[test]
    fn opcional_pode_faltar() {
        let values = vec![
            value("meter_reading", json!(1)),
            value("inspection_date", json!("2024-06-01")),
            value("result", json!("FAIL")),
        ];
        assert!(validate_report_data(&schema(), &values).is_ok());
    }
}
