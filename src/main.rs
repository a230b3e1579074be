//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::{auth::auth_guard, tenancy::company_guard};

#[tokio::main]
async fn main() {
    // Logger configurável via RUST_LOG, com "info" como padrão.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .compact()
        .init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Todas as rotas de negócio exigem token + X-Company-ID com vínculo ativo
    let invoice_routes = Router::new()
        .route(
            "/",
            post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
        )
        .route(
            "/{id}",
            get(handlers::invoices::get_invoice)
                .put(handlers::invoices::update_invoice)
                .delete(handlers::invoices::delete_invoice),
        )
        .route("/{id}/approve", post(handlers::invoices::approve_invoice))
        .route("/{id}/reject", post(handlers::invoices::reject_invoice))
        .route("/{id}/pay", post(handlers::invoices::pay_invoice))
        .route("/{id}/process", post(handlers::invoices::process_invoice))
        .route("/{id}/post", post(handlers::invoices::post_invoice))
        .route("/{id}/file", post(handlers::invoices::upload_invoice_file));

    let vendor_routes = Router::new()
        .route(
            "/",
            post(handlers::vendors::create_vendor).get(handlers::vendors::list_vendors),
        )
        .route("/{vendorId}/templates", post(handlers::vendors::create_template));

    let template_routes = Router::new()
        .route("/", get(handlers::vendors::list_templates))
        .route("/{id}", put(handlers::vendors::update_template));

    let ledger_routes = Router::new()
        .route("/accounts", get(handlers::ledger::list_accounts))
        .route("/sync", post(handlers::ledger::sync_accounts))
        .route("/test-credentials", post(handlers::ledger::test_credentials));

    let protected = Router::new()
        .nest("/api/invoices", invoice_routes)
        .nest("/api/vendors", vendor_routes)
        .nest("/api/templates", template_routes)
        .nest("/api/ledger", ledger_routes)
        // Camadas em ordem reversa: auth_guard roda primeiro, depois o
        // company_guard já encontra o usuário nos extensions.
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            company_guard,
        ))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .merge(protected)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
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
