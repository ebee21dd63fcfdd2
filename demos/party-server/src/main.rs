//! Hotseat party server.
//!
//! Every setting is a flag with an environment fallback; run with `--help`
//! for the list. `RUST_LOG` sets the log filter (default `info`).

use std::time::Duration;

use clap::Parser;
use hotseat::prelude::*;
use tracing_subscriber::EnvFilter;

/// Server settings.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Settings {
    /// Interface to listen on
    #[arg(long, env = "HOTSEAT_BIND", default_value = "0.0.0.0")]
    bind: String,
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Roster cap per room
    #[arg(long, env = "HOTSEAT_MAX_PLAYERS", default_value_t = 25, value_parser = max_players)]
    max_players: usize,
    /// Drop connections that stay silent this many seconds
    #[arg(long, env = "HOTSEAT_IDLE_TIMEOUT_SECS", default_value_t = 30)]
    idle_timeout_secs: u64,
    /// Fixed seed for room codes and shuffles, for replaying a session
    #[arg(long, env = "HOTSEAT_SEED")]
    seed: Option<u64>,
}

impl Settings {
    fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn room_config(&self) -> RoomConfig {
        RoomConfig {
            max_players: self.max_players,
            rng_seed: self.seed,
            ..RoomConfig::default()
        }
    }
}

/// A room must be able to seat the smallest playable table.
fn max_players(raw: &str) -> Result<usize, String> {
    let max: usize = raw.parse().map_err(|e| format!("{e}"))?;
    let min = RoomConfig::default().min_players;
    if max < min {
        return Err(format!("must be at least {min}"));
    }
    Ok(max)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::parse();
    tracing::info!(bind = %settings.addr(), max_players = settings.max_players, "starting party server");

    let server = HotseatServer::builder()
        .bind(&settings.addr())
        .idle_timeout(settings.idle_timeout())
        .room_config(settings.room_config())
        .build()
        .await?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s = Settings::try_parse_from(["party-server"]).unwrap();
        assert_eq!(s.idle_timeout(), Duration::from_secs(30));
        assert_eq!(s.room_config().min_players, 3);
    }

    #[test]
    fn test_settings_reads_overrides() {
        let s = Settings::try_parse_from([
            "party-server",
            "--bind",
            "127.0.0.1",
            "--port",
            "8080",
            "--max-players",
            "10",
            "--seed",
            "99",
        ])
        .unwrap();
        assert_eq!(s.addr(), "127.0.0.1:8080");
        let config = s.room_config();
        assert_eq!(config.max_players, 10);
        assert_eq!(config.rng_seed, Some(99));
    }

    #[test]
    fn test_settings_bad_port_rejected() {
        let err = Settings::try_parse_from(["party-server", "--port", "eighty"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_settings_max_players_below_minimum_rejected() {
        let err = Settings::try_parse_from(["party-server", "--max-players", "2"]).unwrap_err();
        assert!(err.to_string().contains("at least 3"));
    }
}
