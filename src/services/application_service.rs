// src/services/application_service.rs

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    clients::{
        identity::IdentityProvider,
        payment::{CheckoutSession, InitializePayment, PaymentGateway, PaymentStatus},
    },
    common::error::AppError,
    db::{ApplicationRepository, PricingRepository},
    models::{
        account::Account,
        application::{
            ApplicationDetails, ApprovalStatus, ConnectionPricing, ConnectionType, CostEstimate,
            MeterPricing, MeterType, Receipt, ServiceApplication, ServiceCategory, VoltageLevel,
            compute_estimate,
        },
    },
};

#[derive(Clone)]
pub struct ApplicationService {
    application_repo: ApplicationRepository,
    pricing_repo: PricingRepository,
    payment: Arc<dyn PaymentGateway>,
    identity: Arc<dyn IdentityProvider>,
    pool: PgPool,
    payment_callback_url: String,
    payment_return_url: String,
}

impl ApplicationService {
    pub fn new(
        application_repo: ApplicationRepository,
        pricing_repo: PricingRepository,
        payment: Arc<dyn PaymentGateway>,
        identity: Arc<dyn IdentityProvider>,
        pool: PgPool,
        payment_callback_url: String,
        payment_return_url: String,
    ) -> Self {
        Self {
            application_repo,
            pricing_repo,
            payment,
            identity,
            pool,
            payment_callback_url,
            payment_return_url,
        }
    }

    // --- CRIAÇÃO DA REQUISIÇÃO ---
    // Categorias precificadas ganham um recibo pendente na mesma
    // transação, calculado a partir das tabelas de referência.
    pub async fn create_application(
        &self,
        account: &Account,
        category: ServiceCategory,
        service_type: &str,
        details: ApplicationDetails,
        document_urls: Vec<String>,
    ) -> Result<(ServiceApplication, Option<Receipt>), AppError> {
        if !account.is_verified {
            return Err(AppError::Forbidden(
                "Sua conta ainda não passou pela verificação de identidade.".into(),
            ));
        }

        if !details.matches_category(category) {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("details");
            err.message = Some("Os detalhes não correspondem à categoria informada.".into());
            errors.add("details".into(), err);
            return Err(AppError::ValidationError(errors));
        }

        let estimate = self.estimate_for(&details).await?;

        let mut tx = self.pool.begin().await?;

        let application = self
            .application_repo
            .insert_application(
                &mut *tx,
                account.id,
                category,
                service_type,
                &details,
                &document_urls,
            )
            .await?;

        let receipt = match &estimate {
            Some(est) => Some(
                self.application_repo
                    .insert_receipt(&mut *tx, application.id, account.id, est)
                    .await?,
            ),
            None => None,
        };

        tx.commit().await?;
        Ok((application, receipt))
    }

    /// Tabela de preços por tipo de ligação × nível de tensão (ou tipo de
    /// medidor), mais o imposto fixo. Categoria sem preço configurado é um
    /// portão não satisfeito, não um erro interno.
    async fn estimate_for(
        &self,
        details: &ApplicationDetails,
    ) -> Result<Option<CostEstimate>, AppError> {
        match details {
            ApplicationDetails::NewConnection { connection_type, voltage_level, .. } => {
                let price = self
                    .pricing_repo
                    .connection_price(*connection_type, *voltage_level)
                    .await?
                    .ok_or_else(|| {
                        AppError::PreconditionFailed(
                            "Não há preço configurado para este tipo de ligação.".into(),
                        )
                    })?;
                Ok(Some(compute_estimate(price.base_cost, price.voltage_rate)))
            }
            ApplicationDetails::MeterReplacement { meter_type, .. } => {
                let price = self
                    .pricing_repo
                    .meter_price(*meter_type)
                    .await?
                    .ok_or_else(|| {
                        AppError::PreconditionFailed(
                            "Não há preço configurado para este tipo de medidor.".into(),
                        )
                    })?;
                Ok(Some(compute_estimate(price.base_cost, price.installation_fee)))
            }
            ApplicationDetails::Generic { .. } => Ok(None),
        }
    }

    // --- TABELAS DE PREÇOS ---

    pub async fn list_connection_prices(&self) -> Result<Vec<ConnectionPricing>, AppError> {
        self.pricing_repo.list_connection_prices().await
    }

    pub async fn list_meter_prices(&self) -> Result<Vec<MeterPricing>, AppError> {
        self.pricing_repo.list_meter_prices().await
    }

    pub async fn upsert_connection_price(
        &self,
        connection_type: ConnectionType,
        voltage_level: VoltageLevel,
        base_cost: Decimal,
        voltage_rate: Decimal,
    ) -> Result<ConnectionPricing, AppError> {
        Self::ensure_non_negative(&[("baseCost", base_cost), ("voltageRate", voltage_rate)])?;
        self.pricing_repo
            .upsert_connection_price(connection_type, voltage_level, base_cost, voltage_rate)
            .await
    }

    pub async fn upsert_meter_price(
        &self,
        meter_type: MeterType,
        base_cost: Decimal,
        installation_fee: Decimal,
    ) -> Result<MeterPricing, AppError> {
        Self::ensure_non_negative(&[("baseCost", base_cost), ("installationFee", installation_fee)])?;
        self.pricing_repo
            .upsert_meter_price(meter_type, base_cost, installation_fee)
            .await
    }

    fn ensure_non_negative(values: &[(&'static str, Decimal)]) -> Result<(), AppError> {
        let mut errors = ValidationErrors::new();
        for (field, value) in values {
            if value.is_sign_negative() {
                let mut err = ValidationError::new("range");
                err.message = Some("O valor não pode ser negativo.".into());
                errors.add((*field).into(), err);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(AppError::ValidationError(errors)) }
    }

    pub async fn get_application(&self, id: Uuid) -> Result<ServiceApplication, AppError> {
        self.application_repo
            .find_application(id)
            .await?
            .ok_or(AppError::NotFound("Requisição"))
    }

    pub async fn list_applications(&self) -> Result<Vec<ServiceApplication>, AppError> {
        self.application_repo.list_applications().await
    }

    pub async fn list_applications_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ServiceApplication>, AppError> {
        self.application_repo.list_applications_by_account(account_id).await
    }

    // --- DECISÃO DA EQUIPE ---
    pub async fn decide_application(
        &self,
        id: Uuid,
        status: ApprovalStatus,
        reason: Option<&str>,
    ) -> Result<ServiceApplication, AppError> {
        if status == ApprovalStatus::Pending {
            return Err(AppError::PreconditionFailed(
                "Uma decisão precisa aprovar ou rejeitar a requisição.".into(),
            ));
        }
        if status == ApprovalStatus::Rejected
            && reason.map(str::trim).unwrap_or_default().is_empty()
        {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("length");
            err.message = Some("O motivo da rejeição é obrigatório.".into());
            errors.add("reason".into(), err);
            return Err(AppError::ValidationError(errors));
        }

        let decided = self
            .application_repo
            .decide_application_if_pending(&self.pool, id, status, reason)
            .await?;

        match decided {
            Some(application) => Ok(application),
            None => {
                let current = self
                    .application_repo
                    .find_application(id)
                    .await?
                    .ok_or(AppError::NotFound("Requisição"))?;
                Err(AppError::InvalidTransition {
                    from: current.status.as_str().into(),
                    to: status.as_str().into(),
                })
            }
        }
    }

    // --- RECIBOS E PAGAMENTO ---

    pub async fn get_receipt(&self, id: Uuid) -> Result<Receipt, AppError> {
        self.application_repo
            .find_receipt(id)
            .await?
            .ok_or(AppError::NotFound("Recibo"))
    }

    pub async fn list_receipts_by_account(&self, account_id: Uuid) -> Result<Vec<Receipt>, AppError> {
        self.application_repo.list_receipts_by_account(account_id).await
    }

    /// Abre uma sessão de checkout no gateway para um recibo em aberto.
    pub async fn init_payment(
        &self,
        receipt_id: Uuid,
        account: &Account,
    ) -> Result<CheckoutSession, AppError> {
        let receipt = self.get_receipt(receipt_id).await?;

        if receipt.account_id != account.id {
            return Err(AppError::Forbidden("Este recibo não pertence à sua conta.".into()));
        }

        let application = self.get_application(receipt.application_id).await?;
        payment_gate(application.status, receipt.paid)?;

        // tx_ref determinístico por recibo: reabrir o checkout não gera
        // uma segunda referência de transação.
        let tx_ref = format!("rcpt-{}", receipt.id);

        // Enriquecimento com o nome do provedor; se ele falhar, o e-mail
        // serve de nome e a requisição segue.
        let name = match self.identity.get_user(&account.external_id).await {
            Ok(user) => user.display_name(),
            Err(e) => {
                tracing::warn!("Falha ao buscar nome no provedor de identidade: {}", e);
                account.email.clone()
            }
        };

        let session = self
            .payment
            .initialize(&InitializePayment {
                amount: receipt.grand_total,
                currency: "ETB".into(),
                email: account.email.clone(),
                name,
                tx_ref: tx_ref.clone(),
                callback_url: self.payment_callback_url.clone(),
                return_url: self.payment_return_url.clone(),
            })
            .await?;

        self.application_repo.set_tx_ref(&self.pool, receipt.id, &tx_ref).await?;

        Ok(session)
    }

    /// Confirmação de pagamento, idempotente: se o recibo já está pago, o
    /// estado gravado volta intacto ("já processado", não é erro). No
    /// sucesso, o recibo é aprovado e a requisição dona aprovada em
    /// cascata, tudo na mesma transação.
    pub async fn record_payment(
        &self,
        receipt_id: Uuid,
        tx_ref: &str,
        success: bool,
    ) -> Result<Receipt, AppError> {
        let mut tx = self.pool.begin().await?;

        // Só a confirmação de sucesso tenta a transição monotônica
        // paid = FALSE -> TRUE; o guarda no UPDATE decide atomicamente
        // qual entrega chegou primeiro.
        let updated = if success {
            self.application_repo
                .mark_paid_if_unpaid(&mut *tx, receipt_id, tx_ref, Utc::now())
                .await?
        } else {
            None
        };

        match settlement_action(success, updated) {
            Settlement::Settled(receipt) => {
                self.application_repo
                    .approve_application_if_pending(&mut *tx, receipt.application_id)
                    .await?;
                tx.commit().await?;
                Ok(receipt)
            }
            Settlement::AlreadyProcessed => {
                // Reentrega de webhook ou segunda confirmação: nada muda.
                tx.rollback().await?;
                self.get_receipt(receipt_id).await
            }
            Settlement::FailureLogged => {
                tx.rollback().await?;
                tracing::info!(
                    "Pagamento malsucedido para o recibo {} (tx_ref {})",
                    receipt_id,
                    tx_ref
                );
                self.get_receipt(receipt_id).await
            }
        }
    }

    /// Callback assíncrono do gateway. O status informado no corpo não é
    /// confiável por si só: reverificamos o tx_ref direto no gateway.
    pub async fn handle_payment_webhook(&self, tx_ref: &str) -> Result<Receipt, AppError> {
        let receipt = self
            .application_repo
            .find_receipt_by_tx_ref(tx_ref)
            .await?
            .ok_or(AppError::NotFound("Recibo"))?;

        let status = self.payment.verify(tx_ref).await?;
        self.record_payment(receipt.id, tx_ref, status == PaymentStatus::Success).await
    }
}

/// Portões do checkout: um recibo pago é imutável e uma requisição
/// rejeitada pela equipe não aceita mais pagamento.
fn payment_gate(application_status: ApprovalStatus, receipt_paid: bool) -> Result<(), AppError> {
    if application_status == ApprovalStatus::Rejected {
        return Err(AppError::PreconditionFailed(
            "A requisição deste recibo foi rejeitada.".into(),
        ));
    }
    if receipt_paid {
        return Err(AppError::Conflict("Este recibo já foi pago.".into()));
    }
    Ok(())
}

// Resultado da tentativa de liquidação de um recibo.
#[derive(Debug)]
enum Settlement {
    // Primeira confirmação de sucesso: o recibo foi marcado como pago
    // nesta chamada e a cascata de aprovação deve rodar.
    Settled(Receipt),
    // O guarda `paid = FALSE` não encontrou a linha: reentrega de webhook
    // ou segunda confirmação. Nenhuma escrita.
    AlreadyProcessed,
    // Confirmação de falha: nada muda além do log.
    FailureLogged,
}

fn settlement_action(success: bool, updated: Option<Receipt>) -> Settlement {
    match (success, updated) {
        (false, _) => Settlement::FailureLogged,
        (true, Some(receipt)) => Settlement::Settled(receipt),
        (true, None) => Settlement::AlreadyProcessed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recibo(paid: bool) -> Receipt {
        Receipt {
            id: Uuid::new_v4(),
            application_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            base_cost: Decimal::from(1000),
            rate: Decimal::from(200),
            tax_amount: Decimal::from(180),
            grand_total: Decimal::from(1380),
            status: ApprovalStatus::Pending,
            paid,
            payment_date: None,
            tx_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn checkout_recusado_para_requisicao_rejeitada() {
        // Mesmo com o recibo em aberto, a rejeição da equipe fecha a
        // porta do pagamento: sem nova sessão de checkout.
        let result = payment_gate(ApprovalStatus::Rejected, false);
        assert!(matches!(result, Err(AppError::PreconditionFailed(_))));
    }

    #[test]
    fn checkout_recusado_para_recibo_pago() {
        let result = payment_gate(ApprovalStatus::Approved, true);
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn checkout_aberto_para_recibo_em_aberto() {
        assert!(payment_gate(ApprovalStatus::Pending, false).is_ok());
        assert!(payment_gate(ApprovalStatus::Approved, false).is_ok());
    }

    #[test]
    fn reentrega_de_webhook_nao_liquida_de_novo() {
        // Segunda entrega: o guarda monotônico não encontra linha para
        // atualizar e a resposta é o estado já gravado, sem escritas.
        assert!(matches!(
            settlement_action(true, None),
            Settlement::AlreadyProcessed
        ));
    }

    #[test]
    fn confirmacao_de_falha_nunca_liquida() {
        assert!(matches!(
            settlement_action(false, None),
            Settlement::FailureLogged
        ));
        assert!(matches!(
            settlement_action(false, Some(recibo(false))),
            Settlement::FailureLogged
        ));
    }

    #[test]
    fn primeira_confirmacao_liquida_exatamente_uma_vez() {
        let receipt = recibo(true);
        match settlement_action(true, Some(receipt.clone())) {
            Settlement::Settled(settled) => assert_eq!(settled.id, receipt.id),
            other => panic!("esperava Settled, veio {:?}", other),
        }
    }
}

// Fluxos que atravessam os guardas do banco. Precisam de um Postgres
// acessível: cargo test --features pg-tests
#[cfg(all(test, feature = "pg-tests"))]
mod pg_tests {
    use super::*;
    use async_trait::async_trait;

    use crate::clients::identity::{CreateProviderUser, ProviderMetadata, ProviderUser};
    use crate::db::AccountRepository;
    use crate::models::account::Role;

    struct StubIdentity;

    #[async_trait]
    impl IdentityProvider for StubIdentity {
        async fn get_user(&self, external_id: &str) -> Result<ProviderUser, AppError> {
            Ok(ProviderUser {
                id: external_id.to_string(),
                first_name: None,
                last_name: None,
                email: "cliente@example.com".into(),
            })
        }

        async fn create_user(&self, _user: &CreateProviderUser) -> Result<String, AppError> {
            Ok("ext-criado".into())
        }

        async fn delete_user(&self, _external_id: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn set_disabled(&self, _external_id: &str, _disabled: bool) -> Result<(), AppError> {
            Ok(())
        }

        async fn update_metadata(
            &self,
            _external_id: &str,
            _metadata: &ProviderMetadata,
        ) -> Result<(), AppError> {
            Ok(())
        }
    }

    struct StubGateway;

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn initialize(
            &self,
            _request: &InitializePayment,
        ) -> Result<CheckoutSession, AppError> {
            Ok(CheckoutSession { checkout_url: "https://checkout.example/sessao".into() })
        }

        async fn verify(&self, _tx_ref: &str) -> Result<PaymentStatus, AppError> {
            Ok(PaymentStatus::Success)
        }
    }

    fn service(pool: &PgPool) -> ApplicationService {
        ApplicationService::new(
            ApplicationRepository::new(pool.clone()),
            PricingRepository::new(pool.clone()),
            Arc::new(StubGateway),
            Arc::new(StubIdentity),
            pool.clone(),
            "https://backoffice.example/api/payments/webhook".into(),
            "https://backoffice.example/retorno".into(),
        )
    }

    async fn cliente_verificado(pool: &PgPool) -> Account {
        let repo = AccountRepository::new(pool.clone());
        let account = repo
            .insert(pool, "ext-cliente", "cliente@example.com", Role::Customer)
            .await
            .unwrap();
        repo.set_verified(pool, account.id, true).await.unwrap();
        repo.find_by_id(account.id).await.unwrap().unwrap()
    }

    async fn requisicao_com_recibo(
        pool: &PgPool,
        service: &ApplicationService,
        account: &Account,
    ) -> (ServiceApplication, Receipt) {
        PricingRepository::new(pool.clone())
            .upsert_connection_price(
                ConnectionType::Residential,
                VoltageLevel::SinglePhase,
                Decimal::from(1000),
                Decimal::from(200),
            )
            .await
            .unwrap();

        let details = ApplicationDetails::NewConnection {
            connection_type: ConnectionType::Residential,
            voltage_level: VoltageLevel::SinglePhase,
            plot_number: None,
        };
        let (application, receipt) = service
            .create_application(
                account,
                ServiceCategory::NewConnections,
                "nova ligação residencial",
                details,
                vec![],
            )
            .await
            .unwrap();
        (application, receipt.unwrap())
    }

    #[sqlx::test]
    async fn pagamento_nao_reaprova_requisicao_rejeitada(pool: PgPool) {
        let service = service(&pool);
        let account = cliente_verificado(&pool).await;
        let (application, receipt) = requisicao_com_recibo(&pool, &service, &account).await;

        service
            .decide_application(
                application.id,
                ApprovalStatus::Rejected,
                Some("documentação insuficiente"),
            )
            .await
            .unwrap();

        // O webhook ainda pode chegar para um checkout aberto antes da
        // rejeição: o pagamento é gravado, mas a decisão da equipe fica.
        let paid = service.record_payment(receipt.id, "tx-tardio", true).await.unwrap();
        assert!(paid.paid);

        let application = service.get_application(application.id).await.unwrap();
        assert_eq!(application.status, ApprovalStatus::Rejected);
    }

    #[sqlx::test]
    async fn segunda_confirmacao_nao_altera_o_estado_gravado(pool: PgPool) {
        let service = service(&pool);
        let account = cliente_verificado(&pool).await;
        let (application, receipt) = requisicao_com_recibo(&pool, &service, &account).await;

        let primeira = service.record_payment(receipt.id, "tx-1", true).await.unwrap();
        let segunda = service.record_payment(receipt.id, "tx-2", true).await.unwrap();

        assert!(segunda.paid);
        assert_eq!(segunda.tx_ref, primeira.tx_ref);
        assert_eq!(segunda.payment_date, primeira.payment_date);
        assert_eq!(segunda.status, ApprovalStatus::Approved);

        let application = service.get_application(application.id).await.unwrap();
        assert_eq!(application.status, ApprovalStatus::Approved);
    }
}
