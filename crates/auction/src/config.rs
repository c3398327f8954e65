use {
    anyhow::{anyhow, ensure},
    bigdecimal::{BigDecimal, Zero},
    serde::{Deserialize, Serialize},
    std::{path::Path, time::Duration},
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Config {
    /// How long a session accepts bids once opened.
    #[serde(with = "humantime_serde")]
    pub auction_duration: Duration,

    /// Smallest allowed bid step; every bid must be a positive multiple.
    pub bid_increment: BigDecimal,

    /// How often the recovery sweep looks for expired sessions and recruits
    /// left locked without one.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auction_duration: Duration::from_secs(25 * 60),
            // 0.5 points
            bid_increment: BigDecimal::new(5.into(), 1),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub async fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(&path).await?;
        let config: Self = toml::from_str(&raw).map_err(|err| {
            anyhow!(
                "failed to parse TOML config at {}: {err}",
                path.as_ref().display()
            )
        })?;
        config.validate()
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            self.bid_increment > BigDecimal::zero(),
            "bid-increment must be positive"
        );
        ensure!(
            !self.auction_duration.is_zero(),
            "auction-duration must be positive"
        );
        ensure!(
            !self.sweep_interval.is_zero(),
            "sweep-interval must be positive"
        );
        Ok(self)
    }

    /// Whether an amount is a positive multiple of the bid increment.
    pub fn is_valid_amount(&self, amount: &BigDecimal) -> bool {
        *amount > BigDecimal::zero() && (amount / &self.bid_increment).is_integer()
    }
}
