#![deny(clippy::all)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use adapter::ServiceToken;
use buzzscreen::{
    application::EnvConfig,
    db::{
        content_campaign::CachedContentCampaigns, migrations, postgres_connection,
        redis_connection, PostgresRepository, RedisActivityRepository,
        RedisTrackingUrlRepository,
    },
    publisher::AmqpPublisher,
    upstream::{
        CachedAuthService, HttpAdBackend, HttpAuthService, HttpLedger, HttpProfileService, HttpWeb,
    },
    Application, Repositories, Settings, Upstreams,
};
use chrono::Duration;
use clap::{crate_version, Arg, Command};
use primitives::{
    config::configuration,
    util::logging::{new_event_logger, new_logger},
    Clock, SystemClock,
};
use rand::{rngs::StdRng, SeedableRng};
use slog::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Command::new("buzzscreen")
        .version(crate_version!())
        .arg(
            Arg::new("config")
                .long("config")
                .help("the config file for the lockscreen API")
                .takes_value(true),
        )
        .arg(
            Arg::new("migrate")
                .long("migrate")
                .help("applies the database migrations before starting"),
        )
        .get_matches();

    let env_config = EnvConfig::from_env()?;
    let config = configuration(env_config.env, cli.value_of("config"))?;

    let logger = new_logger("buzzscreen");
    let event_logger = new_event_logger();

    let postgres_settings = env_config.postgres();
    if cli.is_present("migrate") {
        migrations(&postgres_settings)?;
        info!(&logger, "Migrations applied");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let redis = redis_connection(env_config.redis_url.clone()).await?;
    let postgres = PostgresRepository::new(postgres_connection(
        &postgres_settings,
        env_config.postgres_pool_size,
    )?);

    let repositories = Repositories {
        units: Arc::new(postgres.clone()),
        devices: Arc::new(postgres.clone()),
        referrals: Arc::new(postgres.clone()),
        content_campaigns: Arc::new(CachedContentCampaigns::new(
            redis.clone(),
            postgres,
            clock.clone(),
            Duration::seconds(config.cache.content_campaign_ttl.into()),
            Duration::seconds(config.cache.content_campaign_freshness.into()),
        )),
        activities: Arc::new(RedisActivityRepository::new(
            redis.clone(),
            Duration::seconds(config.cache.activity_ttl.into()),
        )),
        tracking_urls: Arc::new(RedisTrackingUrlRepository::new(
            redis.clone(),
            Duration::seconds(config.cache.tracking_url_ttl.into()),
        )),
    };

    let upstreams = Upstreams {
        ledger: Arc::new(HttpLedger::new(
            &env_config.buzzcon_internal_url,
            ServiceToken::new(
                &env_config.service_token_secret,
                Duration::seconds(config.reward.service_token_ttl.into()),
            ),
            clock.clone(),
            config.timeouts.ledger(),
        )?),
        ad_backend: Arc::new(HttpAdBackend::new(
            &env_config.buzzad_url,
            &env_config.buzzad_access_token,
            config.timeouts.ad_backend(),
        )?),
        auth: Arc::new(CachedAuthService::new(
            HttpAuthService::new(&env_config.auth_service_url, config.timeouts.auth())?,
            redis,
            config.cache.auth_ttl,
        )),
        profile: Arc::new(HttpProfileService::new(
            &env_config.profile_service_url,
            config.timeouts.profile(),
        )?),
        web: Arc::new(HttpWeb::new(
            config.timeouts.tracker(),
            config.timeouts.verification(),
        )?),
        publisher: Arc::new(
            AmqpPublisher::connect(
                &env_config.amqp_url,
                &env_config.amqp_exchange,
                clock.clone(),
            )
            .await?,
        ),
    };

    let settings = Settings {
        environment: env_config.env,
        config,
        internal_ad_url: env_config.buzzad_url.clone(),
        public_base_url: env_config.public_base_url.clone(),
        event_token_secret: env_config.event_token_secret.clone(),
    };

    let app = Application::new(
        settings,
        logger,
        event_logger,
        clock,
        repositories,
        upstreams,
        StdRng::from_entropy(),
    )?;

    app.run(env_config.socket_addr()).await;

    Ok(())
}
