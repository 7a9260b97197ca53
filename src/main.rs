use lms::api::{build_router, AppState};
use lms::config::Config;
use lms::db::pool::SessionPool;
use lms::db::directory;
use lms::scanner::{LibraryRoot, PipelineConfig, ScannerService};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .parse_lossy("lms=info,sqlx=warn,tower_http=warn"),
        )
        .init();

    let config = Config::load();

    let pool = SessionPool::connect(&config.database_path(), config.session_pool_size)
        .await
        .expect("failed to open catalog database");

    let libraries = register_libraries(&pool, &config).await;

    let pipeline_config = PipelineConfig {
        audio_extensions: config.audio_extensions.clone(),
        exclude_sentinel: config.exclude_sentinel.clone(),
        worker_count: config.scanner_worker_count,
    };
    let scanner = ScannerService::spawn(pool.clone(), pipeline_config, libraries);

    let state = AppState::new(pool, config, scanner);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4533")
        .await
        .expect("failed to bind to 0.0.0.0:4533");
    tracing::info!("listening on http://0.0.0.0:4533");

    axum::serve(listener, app).await.expect("server error");
}

/// Registers every configured media library root in the catalog,
/// creating rows for any the database hasn't seen before, and returns
/// the handles the scanner needs to walk them.
async fn register_libraries(pool: &SessionPool, config: &Config) -> Vec<LibraryRoot> {
    let mut libraries = Vec::with_capacity(config.media_library_roots.len());
    for root in &config.media_library_roots {
        let session = pool.session().await.expect("failed to borrow a session");
        let mut tx = session.write().await.expect("failed to start a write transaction");
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Music")
            .to_string();
        let id = directory::find_or_create_library(&mut tx, &name, &root.to_string_lossy())
            .await
            .expect("failed to register media library");
        tx.commit().await.expect("failed to commit media library registration");
        libraries.push(LibraryRoot { id, path: root.clone() });
    }
    libraries
}
