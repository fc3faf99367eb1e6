use log::*;
use psp_engine::{traits::OrderRepository, SqliteDatabase};
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub fn init_logging() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

/// Creates a fresh database at `url` and brings its schema up to date.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    init_logging();
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("🚀️ Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 1).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Created Sqlite database {url}");
    db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.pool().close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e:?}");
    }
}
