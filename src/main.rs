//! Gadget OAuth - OAuth 1.0a signing and token lifecycle for hosted gadgets

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{error, info};
use url::Url;

use gadget_oauth::{
    cli::{Cli, Command},
    config::Config,
    crypto::{AesBlobCrypter, BlobCrypter},
    oauth::{ClientState, ConsumerSecret, Credentials, ParamLocation, sign_request},
    setup_tracing,
    transport::{HttpMethod, HttpRequest},
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Sign {
            url,
            method,
            consumer_key,
            consumer_secret,
            rsa_key,
            token,
            token_secret,
            location,
            data,
        } => run_sign(&SignArgs {
            url,
            method,
            consumer_key,
            consumer_secret,
            rsa_key,
            token,
            token_secret,
            location,
            data,
        }),
        Command::CheckConfig => run_check_config(cli.config.as_deref()),
        Command::InspectState { blob } => run_inspect_state(cli.config.as_deref(), &blob),
        Command::GenerateKey => {
            println!("{}", AesBlobCrypter::generate_key());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

struct SignArgs {
    url: String,
    method: String,
    consumer_key: String,
    consumer_secret: Option<String>,
    rsa_key: Option<std::path::PathBuf>,
    token: Option<String>,
    token_secret: Option<String>,
    location: String,
    data: Option<String>,
}

/// Sign a request and print it
fn run_sign(args: &SignArgs) -> anyhow::Result<()> {
    let url = Url::parse(&args.url).with_context(|| format!("Invalid URL: {}", args.url))?;
    let Some(method) = HttpMethod::parse(&args.method) else {
        bail!("Unsupported method: {}", args.method);
    };
    let Some(location) = ParamLocation::parse(&args.location) else {
        bail!("Unknown parameter location: {}", args.location);
    };

    let secret = match (&args.consumer_secret, &args.rsa_key) {
        (_, Some(path)) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            ConsumerSecret::rsa_from_pem(&pem)?
        }
        (Some(secret), None) => ConsumerSecret::Hmac(secret.clone()),
        (None, None) => bail!("Either --consumer-secret or --rsa-key is required"),
    };

    let mut request = HttpRequest::new(method, url);
    if let Some(data) = &args.data {
        request = request
            .with_header("Content-Type", gadget_oauth::transport::FORM_CONTENT_TYPE)
            .with_body(data.as_bytes());
    }

    let credentials = Credentials {
        consumer_key: &args.consumer_key,
        consumer_secret: &secret,
        token: args.token.as_deref(),
        token_secret: args.token_secret.as_deref(),
    };
    let signed = sign_request(&request, &credentials, &[], location)?;

    info!(
        method = %signed.method,
        signature_method = secret.signature_method().as_str(),
        location = location.as_str(),
        "Signed request"
    );

    println!("{} {}", signed.method, signed.url);
    for (name, value) in &signed.headers {
        println!("{name}: {value}");
    }
    if !signed.body.is_empty() {
        println!();
        println!("{}", signed.body_text());
    }
    Ok(())
}

/// Load configuration and report what it wires up
fn run_check_config(path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = Config::load(path).context("Failed to load configuration")?;

    let store = config.build_store().context("Failed to load consumers")?;
    let crypter_ok = match config.build_crypter() {
        Ok(_) => true,
        Err(e) => {
            println!("⚠️  Client state disabled: {e}");
            false
        }
    };

    println!("✅ Configuration valid");
    println!("   Token persistence: {:?}", config.fetcher.token_persistence);
    println!("   Client state: {}", if crypter_ok { "enabled" } else { "disabled" });
    println!("   State max age: {}s", config.state.max_age_secs);
    println!("   Default signing key: {}", if store.has_default_key() { "yes" } else { "no" });
    if config.cache.enabled {
        println!(
            "   Result cache: {} entries, {}s TTL",
            config.cache.max_entries, config.cache.ttl_secs
        );
    } else {
        println!("   Result cache: disabled");
    }

    let consumers = store.consumer_summaries();
    println!("\nConsumers ({}):", consumers.len());
    for c in consumers {
        let service = if c.service_name.is_empty() { "*" } else { &c.service_name };
        println!(
            "  {} [{}] key={} ({:?})",
            c.gadget_uri, service, c.consumer_key, c.key_type
        );
    }

    if !crypter_ok {
        bail!("state.master_key is required for the fetcher");
    }
    Ok(())
}

/// Unseal a client state blob and print it with secrets masked
fn run_inspect_state(path: Option<&std::path::Path>, blob: &str) -> anyhow::Result<()> {
    let config = Config::load(path).context("Failed to load configuration")?;
    let crypter = config.build_crypter()?;

    crypter
        .unseal(blob)
        .context("State does not unseal with the configured master key")?;

    let max_age = Duration::from_secs(config.state.max_age_secs);
    let state = ClientState::decode(&crypter, Some(blob), max_age);
    if state.is_empty() {
        bail!("State is malformed or older than {}s", config.state.max_age_secs);
    }

    let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "-" };
    println!("owner:          {}", state.owner.as_deref().unwrap_or("-"));
    println!("request token:  {}", mask(&state.request_token));
    println!("access token:   {}", mask(&state.access_token));
    println!("session handle: {}", mask(&state.session_handle));
    println!(
        "expires:        {}",
        state
            .token_expire_millis
            .map_or_else(|| "-".to_string(), |ms| format!("{ms} (epoch millis)"))
    );
    println!("callback:       {}", state.callback_url.as_deref().unwrap_or("-"));
    Ok(())
}
