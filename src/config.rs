//! Service configuration, assembled once from the environment.

use crate::domain::CancellationPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// NATS endpoint; events are dropped (with a warning) when unset.
    pub nats_url: Option<String>,
    pub cancellation_policy: CancellationPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()?;
        let nats_url = std::env::var("NATS_URL").ok();
        let cancellation_policy = match std::env::var("CANCELLATION_POLICY") {
            Ok(raw) => CancellationPolicy::parse(&raw)
                .ok_or_else(|| anyhow::anyhow!("unknown CANCELLATION_POLICY: {raw}"))?,
            Err(_) => CancellationPolicy::default(),
        };
        Ok(Self { database_url, port, nats_url, cancellation_policy })
    }
}
