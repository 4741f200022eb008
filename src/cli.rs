//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Gadget OAuth - OAuth 1.0a signing and token lifecycle for hosted gadgets
#[derive(Parser, Debug)]
#[command(name = "gadget-oauth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "GADGET_OAUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "GADGET_OAUTH_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "GADGET_OAUTH_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign a request and print it, without sending it
    Sign {
        /// Request URL
        #[arg(required = true)]
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Consumer key
        #[arg(long, env = "GADGET_OAUTH_CONSUMER_KEY")]
        consumer_key: String,

        /// HMAC consumer secret
        #[arg(long, env = "GADGET_OAUTH_CONSUMER_SECRET", conflicts_with = "rsa_key")]
        consumer_secret: Option<String>,

        /// PEM file with an RSA private key (RSA-SHA1)
        #[arg(long)]
        rsa_key: Option<PathBuf>,

        /// Token
        #[arg(long)]
        token: Option<String>,

        /// Token secret
        #[arg(long, requires = "token")]
        token_secret: Option<String>,

        /// Parameter location (auth-header, uri-query, post-body)
        #[arg(long, default_value = "auth-header")]
        location: String,

        /// Form-encoded request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Load the configuration and report what it wires up
    CheckConfig,

    /// Unseal a client state blob and print its contents (secrets masked)
    InspectState {
        /// Sealed `oauthState` value
        #[arg(required = true)]
        blob: String,
    },

    /// Print a fresh random master key for `state.master_key`
    GenerateKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sign() {
        let cli = Cli::try_parse_from([
            "gadget-oauth",
            "sign",
            "https://api.example.com/photos?size=original",
            "-X",
            "post",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--location",
            "post-body",
        ])
        .unwrap();

        match cli.command {
            Command::Sign {
                url,
                method,
                consumer_key,
                consumer_secret,
                location,
                ..
            } => {
                assert_eq!(url, "https://api.example.com/photos?size=original");
                assert_eq!(method, "post");
                assert_eq!(consumer_key, "ck");
                assert_eq!(consumer_secret.as_deref(), Some("cs"));
                assert_eq!(location, "post-body");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn token_secret_requires_token() {
        let result = Cli::try_parse_from([
            "gadget-oauth",
            "sign",
            "https://api.example.com/",
            "--consumer-key",
            "ck",
            "--token-secret",
            "ts",
        ]);
        assert!(result.is_err());
    }
}
