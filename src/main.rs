//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, patch, post, put},
};
use tokio::net::TcpListener;

mod clients;
mod common;
mod config;
mod db;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let account_routes = Router::new()
        .route("/me", get(handlers::accounts::get_me))
        .route("/", get(handlers::accounts::list_accounts))
        .route("/staff", post(handlers::accounts::create_staff))
        .route("/{id}/role", patch(handlers::accounts::set_role))
        .route("/{id}/disabled", patch(handlers::accounts::set_disabled))
        .route("/sync/retry", post(handlers::accounts::retry_pending_sync));

    let verification_routes = Router::new()
        .route(
            "/",
            post(handlers::verifications::submit_verification),
        )
        .route("/me", get(handlers::verifications::my_verification))
        .route("/pending", get(handlers::verifications::list_pending))
        .route("/{id}/approve", post(handlers::verifications::approve_verification))
        .route("/{id}/reject", post(handlers::verifications::reject_verification));

    let application_routes = Router::new()
        .route(
            "/",
            post(handlers::applications::create_application)
                .get(handlers::applications::list_applications),
        )
        .route("/mine", get(handlers::applications::list_my_applications))
        .route("/{id}", get(handlers::applications::get_application))
        .route("/{id}/decision", post(handlers::applications::decide_application));

    let pricing_routes = Router::new()
        .route("/", get(handlers::applications::list_pricing))
        .route("/connection", put(handlers::applications::upsert_connection_price))
        .route("/meter", put(handlers::applications::upsert_meter_price));

    let receipt_routes = Router::new()
        .route("/mine", get(handlers::payments::list_my_receipts))
        .route("/{id}", get(handlers::payments::get_receipt))
        .route("/{id}/pay", post(handlers::payments::init_payment));

    let technician_routes = Router::new()
        .route(
            "/",
            post(handlers::tasks::register_technician).get(handlers::tasks::list_technicians),
        )
        .route("/{id}/leave", patch(handlers::tasks::set_technician_on_leave));

    let task_routes = Router::new()
        .route(
            "/",
            post(handlers::tasks::assign_task).get(handlers::tasks::list_tasks),
        )
        .route("/{id}", get(handlers::tasks::get_task))
        .route("/{id}/status", patch(handlers::tasks::update_task_status))
        .route("/{id}/reassign", post(handlers::tasks::reassign_task))
        .route(
            "/{id}/report",
            post(handlers::reports::submit_report).get(handlers::reports::get_task_report),
        );

    let template_routes = Router::new().route(
        "/",
        post(handlers::reports::create_template).get(handlers::reports::list_templates),
    );

    let report_routes = Router::new()
        .route("/{id}", get(handlers::reports::get_report))
        .route(
            "/{id}/comments",
            post(handlers::reports::add_comment).get(handlers::reports::list_comments),
        );

    let support_routes = Router::new()
        .route("/chats", get(handlers::support::list_chats))
        .route(
            "/chats/{chat_id}/messages",
            get(handlers::support::get_messages).post(handlers::support::send_message),
        );

    // Tudo que é protegido fica atrás do auth_guard; o webhook do gateway
    // é a única rota de escrita pública.
    let protected = Router::new()
        .nest("/api/accounts", account_routes)
        .nest("/api/verifications", verification_routes)
        .nest("/api/applications", application_routes)
        .nest("/api/pricing", pricing_routes)
        .nest("/api/receipts", receipt_routes)
        .nest("/api/technicians", technician_routes)
        .nest("/api/tasks", task_routes)
        .nest("/api/templates", template_routes)
        .nest("/api/reports", report_routes)
        .nest("/api/support", support_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/payments/webhook", post(handlers::payments::payment_webhook))
        .merge(protected)
        .with_state(app_state);

    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
