//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,

    /// Authoritative ticks per second
    pub tick_rate: u32,
    /// Application-level silence before a connection is swept
    pub heartbeat_timeout: Duration,
    /// Period of the heartbeat sweep
    pub heartbeat_sweep: Duration,
    /// Transport-level silence before the socket is closed
    pub idle_timeout: Duration,
    /// Max inbound messages per second per connection
    pub input_rate_limit: u32,

    /// Simulation tuning
    pub game: GameConfig,
}

/// Gameplay constants that the authoritative simulation enforces
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GameConfig {
    /// Max distance a single PLAYER_UPDATE may move a player
    pub max_move_distance: f32,
    /// Projectile/player hit radius
    pub hit_radius: f32,
    /// Projectile lifetime cap in milliseconds
    pub projectile_lifetime_ms: u64,
    /// Damage applied by one projectile hit
    pub projectile_damage: u32,
    /// Fastest projectile a client may spawn (units/s)
    pub max_projectile_speed: f32,
    /// Delay between death and automatic respawn
    pub respawn_delay_ms: u64,
    /// How long isAttacking stays set after PLAYER_ATTACK
    pub attack_duration_ms: u64,
    /// Players hovering above this height are candidates for stuck recovery
    pub stuck_height: f32,
    /// Vertical movement below this counts as "not moving"
    pub stuck_epsilon: f32,
    /// How long a hovering player may stay still before being grounded
    pub stuck_timeout_ms: u64,
    /// Upper bound on the per-tick delta time (seconds)
    pub max_tick_delta: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_move_distance: 10.0,
            hit_radius: 2.0,
            projectile_lifetime_ms: 5_000,
            projectile_damage: 10,
            max_projectile_speed: 100.0,
            respawn_delay_ms: 3_000,
            attack_duration_ms: 800,
            stuck_height: 0.5,
            stuck_epsilon: 0.01,
            stuck_timeout_ms: 3_000,
            max_tick_delta: 0.25,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            tick_rate: 20,
            heartbeat_timeout: Duration::from_secs(30),
            heartbeat_sweep: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            input_rate_limit: 120,
            game: GameConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        // PORT wins over SERVER_ADDR so hosted deployments can inject it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| defaults.server_addr.to_string())
        };

        let game_defaults = defaults.game;
        let game = GameConfig {
            max_move_distance: parse_var("MAX_MOVE_DISTANCE", game_defaults.max_move_distance)?,
            hit_radius: parse_var("HIT_RADIUS", game_defaults.hit_radius)?,
            projectile_lifetime_ms: parse_var(
                "PROJECTILE_LIFETIME_MS",
                game_defaults.projectile_lifetime_ms,
            )?,
            projectile_damage: parse_var("PROJECTILE_DAMAGE", game_defaults.projectile_damage)?,
            max_projectile_speed: parse_var(
                "MAX_PROJECTILE_SPEED",
                game_defaults.max_projectile_speed,
            )?,
            respawn_delay_ms: parse_var("RESPAWN_DELAY_MS", game_defaults.respawn_delay_ms)?,
            attack_duration_ms: parse_var("ATTACK_DURATION_MS", game_defaults.attack_duration_ms)?,
            ..game_defaults
        };

        let tick_rate: u32 = parse_var("TICK_RATE", defaults.tick_rate)?;
        if tick_rate == 0 {
            return Err(ConfigError::Invalid("TICK_RATE"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or(defaults.client_origin),
            tick_rate,
            heartbeat_timeout: Duration::from_secs(parse_var(
                "HEARTBEAT_TIMEOUT_SECS",
                defaults.heartbeat_timeout.as_secs(),
            )?),
            heartbeat_sweep: Duration::from_secs(parse_var(
                "HEARTBEAT_SWEEP_SECS",
                defaults.heartbeat_sweep.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(parse_var(
                "IDLE_TIMEOUT_SECS",
                defaults.idle_timeout.as_secs(),
            )?),
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
            game,
        })
    }

    /// Duration of one authoritative tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
