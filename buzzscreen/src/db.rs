//! Persistence of the service.
//!
//! Postgres keeps the catalog (units, content campaigns, devices) and the referral users,
//! Redis keeps everything short-lived: the activity log, the tracking URLs, cached content
//! campaigns, counters and resolved auth tokens.
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use redis::{aio::MultiplexedConnection, ConnectionInfo, RedisError};
use thiserror::Error;
use tokio_postgres::NoTls;

pub use deadpool_postgres::{BuildError, PoolError};

pub use self::{
    activity::{ActivityRepository, RedisActivityRepository},
    content_campaign::{CachedContentCampaigns, ContentCampaignRepository},
    device::DeviceRepository,
    referral::ReferralRepository,
    tracking_url::{RedisTrackingUrlRepository, TrackingUrlRepository},
    unit::UnitRepository,
};

pub mod activity;
pub mod content_campaign;
pub mod device;
pub mod referral;
pub mod tracking_url;
pub mod unit;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod memory;

pub type DbPool = Pool;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Postgres pool: {0}")]
    Pool(#[from] PoolError),
    #[error("Postgres: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("Redis: {0}")]
    Redis(#[from] RedisError),
    #[error("Serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The Postgres repository of every table of the service.
///
/// Cheap to clone, it only holds the pool.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: DbPool,
}

impl PostgresRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
}

pub async fn redis_connection(url: ConnectionInfo) -> Result<MultiplexedConnection, RedisError> {
    let client = redis::Client::open(url)?;

    client.get_multiplexed_tokio_connection().await
}

pub fn postgres_connection(
    settings: &PostgresSettings,
    max_size: usize,
) -> Result<DbPool, BuildError> {
    let mut config = tokio_postgres::Config::new();

    config
        .user(&settings.user)
        .password(&settings.password)
        .host(&settings.host)
        .port(settings.port);
    if let Some(database) = settings.database.as_ref() {
        config.dbname(database);
    }

    let manager = Manager::from_config(
        config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    Pool::builder(manager).max_size(max_size).build()
}

/// Applies every embedded migration that has not been applied yet.
pub fn migrations(settings: &PostgresSettings) -> Result<(), migrant_lib::Error> {
    use migrant_lib::{Config, Direction, Migrator, Settings};

    let mut builder = Settings::configure_postgres();
    builder
        .database_user(&settings.user)
        .database_password(&settings.password)
        .database_host(&settings.host)
        .database_port(settings.port);
    if let Some(database) = settings.database.as_ref() {
        builder.database_name(database);
    }
    let settings = builder.build()?;

    let mut config = Config::with_settings(&settings);
    config.setup()?;
    config.use_cli_compatible_tags(true);

    macro_rules! make_migration {
        ($tag:expr) => {
            migrant_lib::EmbeddedMigration::with_tag($tag)
                .up(include_str!(concat!("../migrations/", $tag, "/up.sql")))
                .down(include_str!(concat!("../migrations/", $tag, "/down.sql")))
                .boxed()
        };
    }

    config.use_migrations(&[make_migration!("20210601000000_initial_tables")])?;

    Migrator::with_config(&config)
        .direction(Direction::Up)
        .all(true)
        // by default this will set the `swallow_completion` to `false`
        // so no error will be returned if all migrations have already been ran
        .apply()?;

    config.reload()?;

    Ok(())
}
