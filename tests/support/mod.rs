use std::path::Path;

use lms::api::AppState;
use lms::config::Config;
use lms::db::models::UserType;
use lms::db::pool::SessionPool;
use lms::db::user;
use lms::ids::UserId;
use lms::scanner::{PipelineConfig, ScannerService};

/// Brings up a pool + scanner against a tempdir-backed SQLite file and
/// wraps them in an `AppState`, the same assembly `main` does.
pub async fn spawn_app(tempdir: &Path) -> AppState {
    let pool = SessionPool::connect(&tempdir.join("lms.db"), 8)
        .await
        .expect("failed to open test database");

    let config = Config {
        working_dir: tempdir.to_path_buf(),
        ..Config::default()
    };

    let pipeline_config = PipelineConfig {
        audio_extensions: config.audio_extensions.clone(),
        exclude_sentinel: config.exclude_sentinel.clone(),
        worker_count: 1,
    };
    let scanner = ScannerService::spawn(pool.clone(), pipeline_config, Vec::new());

    AppState::new(pool, config, scanner)
}

/// Creates a user directly through the store, bypassing the API layer.
pub async fn create_user(pool: &SessionPool, name: &str, user_type: UserType) -> UserId {
    let session = pool.session().await.expect("session");
    let mut tx = session.write().await.expect("write tx");
    let id = user::create(&mut tx, name, user_type).await.expect("create user");
    tx.commit().await.expect("commit");
    id
}
