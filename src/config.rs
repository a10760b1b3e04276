// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    clients::{
        chat::{ChatVendor, HttpChatVendor},
        identity::{HttpIdentityProvider, IdentityProvider},
        payment::{HttpPaymentGateway, PaymentGateway},
    },
    db::{
        AccountRepository, ApplicationRepository, PricingRepository, ReportRepository,
        TaskRepository, VerificationRepository,
    },
    services::{
        AccountService, ApplicationService, DispatchService, ReportService, VerificationService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub account_service: AccountService,
    pub verification_service: VerificationService,
    pub application_service: ApplicationService,
    pub dispatch_service: DispatchService,
    pub report_service: ReportService,
    pub chat: Arc<dyn ChatVendor>,
    pub chat_site_id: String,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");

        let identity_api_url =
            env::var("IDENTITY_API_URL").expect("IDENTITY_API_URL deve ser definida");
        let identity_api_key =
            env::var("IDENTITY_API_KEY").expect("IDENTITY_API_KEY deve ser definida");

        let payment_api_url =
            env::var("PAYMENT_API_URL").expect("PAYMENT_API_URL deve ser definida");
        let payment_secret_key =
            env::var("PAYMENT_SECRET_KEY").expect("PAYMENT_SECRET_KEY deve ser definida");
        let payment_callback_url =
            env::var("PAYMENT_CALLBACK_URL").expect("PAYMENT_CALLBACK_URL deve ser definida");
        let payment_return_url =
            env::var("PAYMENT_RETURN_URL").expect("PAYMENT_RETURN_URL deve ser definida");

        let chat_api_url = env::var("CHAT_API_URL").expect("CHAT_API_URL deve ser definida");
        let chat_api_key = env::var("CHAT_API_KEY").expect("CHAT_API_KEY deve ser definida");
        let chat_site_id = env::var("CHAT_SITE_ID").expect("CHAT_SITE_ID deve ser definido");

        // Resolução da ambiguidade da reatribuição: por padrão o técnico
        // substituído volta para 'available'.
        let release_technician_on_reassign = env::var("REASSIGN_RELEASES_TECHNICIAN")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Clientes dos serviços externos ---
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(HttpIdentityProvider::new(identity_api_url, identity_api_key));
        let payment: Arc<dyn PaymentGateway> =
            Arc::new(HttpPaymentGateway::new(payment_api_url, payment_secret_key));
        let chat: Arc<dyn ChatVendor> = Arc::new(HttpChatVendor::new(chat_api_url, chat_api_key));

        // --- Monta o gráfico de dependências ---
        let account_repo = AccountRepository::new(db_pool.clone());
        let verification_repo = VerificationRepository::new(db_pool.clone());
        let application_repo = ApplicationRepository::new(db_pool.clone());
        let pricing_repo = PricingRepository::new(db_pool.clone());
        let task_repo = TaskRepository::new(db_pool.clone());
        let report_repo = ReportRepository::new(db_pool.clone());

        let account_service = AccountService::new(
            account_repo.clone(),
            task_repo.clone(),
            identity.clone(),
            db_pool.clone(),
        );
        let verification_service = VerificationService::new(
            verification_repo,
            account_repo,
            identity.clone(),
            db_pool.clone(),
        );
        let application_service = ApplicationService::new(
            application_repo.clone(),
            pricing_repo,
            payment,
            identity,
            db_pool.clone(),
            payment_callback_url,
            payment_return_url,
        );
        let dispatch_service = DispatchService::new(
            task_repo.clone(),
            application_repo,
            report_repo.clone(),
            db_pool.clone(),
            release_technician_on_reassign,
        );
        let report_service = ReportService::new(report_repo, task_repo, db_pool.clone());

        Ok(Self {
            db_pool,
            jwt_secret,
            account_service,
            verification_service,
            application_service,
            dispatch_service,
            report_service,
            chat,
            chat_site_id,
        })
    }
}
