//! rayswap CLI
//!
//! Command-line interface for a Solana wallet trading through Raydium.
//! Checks balances, manages associated token accounts, sends SOL and SPL
//! tokens, quotes and executes swaps, and streams token prices.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use rayswap_core::config::{LogFormat, LoggingSettings};
use rayswap_core::token::utils::{format_token_amount, parse_amount, to_base_units};
use rayswap_core::token::{native_mint, parse_address, NATIVE_DECIMALS};
use rayswap_core::{ClientConfig, MintMetadataProvider, Wallet, WalletIdentity};
use rayswap_dapp::{PricePoller, RaydiumClient, SwapOrchestrator, SwapRequest, DEFAULT_SLIPPAGE_BPS};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// rayswap CLI
#[derive(Parser, Debug)]
#[command(
    name = "rayswap",
    version = env!("CARGO_PKG_VERSION"),
    about = "Raydium swaps, balances and transfers on Solana",
    long_about = "Trade through the Raydium API from a local Solana wallet: \
                 check balances, create token accounts, send SOL and SPL tokens, \
                 quote and execute swaps, and watch token prices."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// RPC endpoint, overrides the configuration
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Wallet secret key, base58 or JSON byte array
    #[arg(long, global = true, env = "RAYSWAP_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Wallet keypair file, as written by solana-keygen
    #[arg(short, long, global = true, conflicts_with = "secret_key")]
    keypair: Option<String>,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Main CLI commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the wallet's SOL balance
    #[command(alias = "bal")]
    Balance,

    /// Show the wallet's balance of a token
    TokenBalance {
        /// Token mint address, or SOL
        mint: String,
    },

    /// Create the wallet's token account for a mint if it is missing
    EnsureAccount {
        /// Token mint address
        mint: String,
    },

    /// Send SOL
    SendSol {
        /// Recipient address
        to: String,

        /// Amount in SOL
        amount: String,
    },

    /// Send an SPL token
    SendToken {
        /// Token mint address
        mint: String,

        /// Recipient wallet address
        to: String,

        /// Amount in whole tokens
        amount: String,
    },

    /// Quote a swap without executing it
    Quote(SwapArgs),

    /// Execute a swap
    Swap(SwapArgs),

    /// Print token prices until interrupted
    #[command(alias = "watch")]
    WatchPrice {
        /// Token ids to watch
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Polling interval in milliseconds, defaults to the configured interval
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// Configuration management
    #[command(subcommand, alias = "cfg")]
    Config(ConfigCommands),
}

/// Swap parameters
#[derive(clap::Args, Debug)]
struct SwapArgs {
    /// Input token mint, or SOL
    #[arg(long)]
    input: String,

    /// Output token mint, or SOL
    #[arg(long)]
    output: String,

    /// Input amount in whole tokens
    #[arg(long)]
    amount: String,

    /// Slippage tolerance in basis points
    #[arg(long, default_value_t = DEFAULT_SLIPPAGE_BPS)]
    slippage_bps: u16,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show as JSON instead of YAML
        #[arg(short, long)]
        json: bool,
    },
}

/// Everything a command needs
struct AppContext {
    config: ClientConfig,
    config_path: PathBuf,
    secret_key: Option<String>,
    keypair: Option<String>,
    yes: bool,
}

impl AppContext {
    fn identity(&self) -> Result<WalletIdentity> {
        if let Some(path) = &self.keypair {
            let path = shellexpand::tilde(path).into_owned();
            return WalletIdentity::from_file(&path)
                .with_context(|| format!("loading keypair from {}", path));
        }
        match &self.secret_key {
            Some(secret) => WalletIdentity::from_secret_str(secret).context("decoding secret key"),
            None => bail!("no wallet: pass --keypair or --secret-key, or set RAYSWAP_SECRET_KEY"),
        }
    }

    fn raydium(&self) -> Result<Arc<RaydiumClient>> {
        Ok(Arc::new(RaydiumClient::new(&self.config.api)?))
    }

    fn wallet(&self) -> Result<(Wallet, Arc<RaydiumClient>)> {
        let raydium = self.raydium()?;
        let wallet = Wallet::connect(&self.config, self.identity()?).with_metadata_provider(raydium.clone());
        debug!(address = %wallet.address(), rpc = %self.config.rpc.url, "Wallet loaded");
        Ok((wallet, raydium))
    }

    fn confirm(&self, prompt: String) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
    }
}

/// Default configuration location under the platform config directory
fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("io", "rayswap", "rayswap")
        .map(|dirs| dirs.config_dir().join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("rayswap.yaml"))
}

fn resolve_config_path(arg: Option<&str>) -> PathBuf {
    match arg {
        Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
        None => default_config_path(),
    }
}

/// Load the config file when present, otherwise defaults; env overrides apply on top
fn load_config(path: &Path) -> Result<ClientConfig> {
    let config = if path.exists() {
        ClientConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        ClientConfig::default()
    };
    Ok(config.with_env_overrides())
}

/// Token argument: a mint address, or `SOL` for the native mint
fn parse_mint(value: &str) -> Result<Pubkey> {
    if value.eq_ignore_ascii_case("sol") {
        return Ok(native_mint());
    }
    Ok(parse_address(value)?)
}

/// Initialize logging from verbosity and the logging settings
fn init_logging(verbose: bool, settings: &LoggingSettings) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        settings.level.to_tracing_level()
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);

    match settings.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

fn spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message(message.into());
    Ok(bar)
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let mut config = load_config(&config_path)?;
    if let Some(url) = cli.rpc_url {
        config.rpc.url = url;
    }
    init_logging(cli.verbose, &config.monitoring.logging)?;
    debug!("rayswap v{}", env!("CARGO_PKG_VERSION"));

    let ctx = AppContext {
        config,
        config_path,
        secret_key: cli.secret_key,
        keypair: cli.keypair,
        yes: cli.yes,
    };

    match cli.command {
        Commands::Balance => {
            let (wallet, _) = ctx.wallet()?;
            let lamports = wallet.native_balance().await?;
            println!("{}", wallet.address());
            println!("{}", format_token_amount(lamports, NATIVE_DECIMALS, Some("SOL")));
        }
        Commands::TokenBalance { mint } => {
            let (wallet, _) = ctx.wallet()?;
            let mint = parse_mint(&mint)?;
            let units = wallet.token_balance(&mint).await?;
            let info = wallet.metadata().mint_info(&mint).await?;
            match info {
                Some(info) => println!(
                    "{}",
                    format_token_amount(units, info.decimals, info.symbol.as_deref())
                ),
                None => println!("{} (base units)", units),
            }
        }
        Commands::EnsureAccount { mint } => {
            let (wallet, _) = ctx.wallet()?;
            let mint = parse_mint(&mint)?;
            let bar = spinner("Resolving token account")?;
            let account = wallet.ensure_token_account(&mint).await;
            bar.finish_and_clear();
            println!("{}", account?.address);
        }
        Commands::SendSol { to, amount } => {
            let (wallet, _) = ctx.wallet()?;
            let to = parse_address(&to)?;
            let amount = parse_amount(&amount)?;
            if !ctx.confirm(format!("Send {} SOL to {}?", amount, to))? {
                bail!("aborted");
            }
            let bar = spinner("Sending SOL")?;
            let signature = wallet.send_native(&to, amount).await;
            bar.finish_and_clear();
            println!("{}", signature?);
        }
        Commands::SendToken { mint, to, amount } => {
            let (wallet, _) = ctx.wallet()?;
            let mint = parse_mint(&mint)?;
            let to = parse_address(&to)?;
            let amount = parse_amount(&amount)?;
            if !ctx.confirm(format!("Send {} of {} to {}?", amount, mint, to))? {
                bail!("aborted");
            }
            let bar = spinner("Sending tokens")?;
            let signature = wallet.send_token(&to, &mint, amount).await;
            bar.finish_and_clear();
            println!("{}", signature?);
        }
        Commands::Quote(args) => handle_quote(&ctx, args).await?,
        Commands::Swap(args) => handle_swap(&ctx, args).await?,
        Commands::WatchPrice {
            tokens,
            interval_ms,
        } => handle_watch(&ctx, tokens, interval_ms).await?,
        Commands::Config(cmd) => handle_config_command(&ctx, cmd)?,
    }

    Ok(())
}

/// Swap request with the input amount converted to smallest units
async fn build_request(wallet: &Wallet, args: &SwapArgs) -> Result<(SwapRequest, u8)> {
    let input = parse_mint(&args.input)?;
    let output = parse_mint(&args.output)?;
    let (input_decimals, output_decimals) = futures::try_join!(
        wallet.metadata().decimals(&input),
        wallet.metadata().decimals(&output)
    )?;
    let amount = to_base_units(parse_amount(&args.amount)?, input_decimals)?;

    Ok((
        SwapRequest::new(input, output, amount, args.slippage_bps),
        output_decimals,
    ))
}

async fn handle_quote(ctx: &AppContext, args: SwapArgs) -> Result<()> {
    let (wallet, raydium) = ctx.wallet()?;
    let (request, output_decimals) = build_request(&wallet, &args).await?;
    let orchestrator = SwapOrchestrator::new(wallet, raydium);

    let quote = orchestrator.quote(&request).await?;
    match quote.output_amount() {
        Some(out) => println!("Output:      {}", format_token_amount(out, output_decimals, None)),
        None => println!("Output:      unknown"),
    }
    if let Some(min) = quote.other_amount_threshold() {
        println!("Minimum out: {}", format_token_amount(min, output_decimals, None));
    }
    if let Some(impact) = quote.price_impact_pct() {
        println!("Impact:      {:.4}%", impact);
    }
    Ok(())
}

async fn handle_swap(ctx: &AppContext, args: SwapArgs) -> Result<()> {
    let (wallet, raydium) = ctx.wallet()?;
    let (request, _) = build_request(&wallet, &args).await?;

    let prompt = format!(
        "Swap {} of {} for {} at {} bps slippage?",
        args.amount,
        request.input_mint(),
        request.output_mint(),
        request.slippage_bps()
    );
    if !ctx.confirm(prompt)? {
        bail!("aborted");
    }

    let orchestrator = SwapOrchestrator::new(wallet, raydium);
    let bar = spinner("Swapping")?;
    let result = orchestrator.swap(&request).await;
    bar.finish_and_clear();

    let result = result?;
    info!(transactions = result.signatures.len(), "Swap complete");
    for signature in &result.signatures {
        println!("{}", signature);
    }
    Ok(())
}

async fn handle_watch(ctx: &AppContext, tokens: Vec<String>, interval_ms: Option<u64>) -> Result<()> {
    let mut poller = PricePoller::new(ctx.raydium()?, ctx.config.poll_interval());
    let interval = interval_ms.map(Duration::from_millis);

    for token in tokens {
        poller.subscribe(
            token,
            |tick| {
                let at = chrono::DateTime::from_timestamp_millis(tick.timestamp_ms)
                    .map(|t| t.format("%H:%M:%S%.3f").to_string())
                    .unwrap_or_default();
                println!("{} {} {}", at, tick.token_id, tick.price);
            },
            interval,
        );
    }

    info!(tokens = ?poller.active_subscriptions(), "Watching prices, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    poller.unsubscribe_all();
    Ok(())
}

/// Handle configuration commands
fn handle_config_command(ctx: &AppContext, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if ctx.config_path.exists() && !force {
                bail!(
                    "{} already exists, use --force to overwrite",
                    ctx.config_path.display()
                );
            }
            ClientConfig::default().save_to_file(&ctx.config_path)?;
            println!("{}", ctx.config_path.display());
        }
        ConfigCommands::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ctx.config)?);
            } else {
                print!("{}", serde_yaml::to_string(&ctx.config)?);
            }
        }
    }
    Ok(())
}
