use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryBlobStore, InMemoryComplianceStore};
use crate::routes::with_numbering_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sender_compliance::config::AppConfig;
use sender_compliance::error::AppError;
use sender_compliance::telemetry;
use sender_compliance::workflows::generation::HttpTextGenerator;
use sender_compliance::workflows::numbering::{
    BriefTemplateDraft, NumberingKind, NumberingLifecycle, ProviderId,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let addr = config.server.socket_addr()?;
    let store = Arc::new(InMemoryComplianceStore::seeded());
    let blobs = Arc::new(InMemoryBlobStore::new(format!("http://{addr}/files")));
    let generator = Arc::new(HttpTextGenerator::from_config(&config.generation)?);
    let lifecycle = Arc::new(NumberingLifecycle::new(
        store,
        blobs,
        generator,
        config.lifecycle.clone(),
    ));

    if let Some(path) = args.brief_template.take() {
        let binary = std::fs::read(&path)?;
        let template = lifecycle.publish_template(
            BriefTemplateDraft {
                provider_id: ProviderId(args.template_provider),
                did_type: args.template_kind.into(),
                placeholders: Vec::new(),
                format_version: 1,
                description: Some(path.display().to_string()),
            },
            &binary,
        )?;
        info!(
            template_id = template.id.0,
            provider_id = args.template_provider,
            placeholders = ?template.placeholders,
            "brief template loaded"
        );
    }

    let app = with_numbering_routes(lifecycle)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, endpoint = %config.generation.endpoint, "sender compliance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

impl From<crate::cli::KindArg> for NumberingKind {
    fn from(value: crate::cli::KindArg) -> Self {
        match value {
            crate::cli::KindArg::TenDlc => NumberingKind::TenDlc,
            crate::cli::KindArg::TollFree => NumberingKind::TollFree,
        }
    }
}
