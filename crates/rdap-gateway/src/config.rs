// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime configuration: CLI flags for transport, environment variables for
//! everything that names a secret or an external endpoint.

use clap::Parser;

/// `rdap-gateway` CLI flags. Everything that names a secret or an external
/// endpoint instead comes from the environment (see [`RuntimeConfig::from_env_and_args`]).
#[derive(Parser, Debug)]
#[command(name = "rdap-gateway")]
#[command(about = "RDAP resolution gateway")]
#[command(version)]
pub struct Args {
    /// HTTP server port.
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Bind address.
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Directory holding the IANA bootstrap JSON files.
    #[arg(long, env = "CONFIG_DIR", default_value = "./bootstrap")]
    pub config_dir: String,
}

/// The fully resolved configuration the binary needs to start serving.
pub struct RuntimeConfig {
    pub bind_addr: String,
    pub log_level: String,
    pub config_dir: String,
    pub redis_url: String,
    pub kafka_brokers: String,
    pub environment: String,
}

impl RuntimeConfig {
    pub fn from_env_and_args(args: Args) -> Self {
        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis:6379".to_string());
        let kafka_brokers =
            std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let environment = std::env::var("ENV").unwrap_or_else(|_| "development".to_string());

        Self {
            bind_addr: format!("{}:{}", args.bind, args.port),
            log_level: args.log_level,
            config_dir: args.config_dir,
            redis_url,
            kafka_brokers,
            environment,
        }
    }
}
