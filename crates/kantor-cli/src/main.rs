//! kantor - command-line client for the currency-exchange wallet service.
//!
//! Every invocation restores the stored session first, runs one command,
//! and exits. Credentials persist between runs in the configured backend.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use kantor_core::api::client::DEFAULT_PAGE_SIZE;
use kantor_core::models::ExchangeRequest;
use kantor_core::{Config, Kantor, SessionStatus};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "\
Usage: kantor <command> [args]

Commands:
  status                          Show the current session
  login [email]                   Log in (prompts for the password)
  register <name> <email>         Create an account (prompts for the password)
  logout                          Forget the stored credential
  wallets                         List wallet balances
  topup <amount>                  Add funds to the base wallet
  exchange <from> <to> <amount>   Exchange between currencies
  rates [code]                    Show current exchange rates
  history [page]                  Show transaction history
  health                          Check the service is reachable";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=kantor_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    let kantor = Kantor::from_config(&config).context("Failed to initialize client")?;
    kantor.session.restore_session().await;
    info!(status = %kantor.session.status(), "kantor starting");

    let rest = &args[1..];
    match command {
        "status" | "whoami" => status(&kantor),
        "login" => login(&kantor, &mut config, rest.first()).await,
        "register" => register(&kantor, rest).await,
        "logout" => {
            kantor.session.logout().await;
            println!("Logged out.");
            Ok(())
        }
        "wallets" => wallets(&kantor).await,
        "topup" => top_up(&kantor, rest).await,
        "exchange" => exchange(&kantor, rest).await,
        "rates" => rates(&kantor, rest.first()).await,
        "history" => history(&kantor, rest.first()).await,
        "health" => {
            let message = kantor.api.health().await?;
            println!("{}", message.trim());
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

fn status(kantor: &Kantor) -> Result<()> {
    match kantor.session.status() {
        SessionStatus::Authenticated => {
            let who = kantor
                .session
                .profile()
                .map(|p| p.display_name())
                .unwrap_or_else(|| "unknown user".to_string());
            println!("Logged in as {}", who);
        }
        SessionStatus::Anonymous => println!("Not logged in."),
        status => println!("{}", status),
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        bail!("Password required");
    }
    Ok(password)
}

async fn login(kantor: &Kantor, config: &mut Config, email: Option<&String>) -> Result<()> {
    let email = match email.cloned().or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email")?,
    };
    if email.is_empty() {
        bail!("Email required");
    }
    let password = prompt_password()?;

    kantor
        .session
        .try_login(&email, &password)
        .await
        .context("Login failed")?;

    config.last_email = Some(email.trim().to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    status(kantor)
}

async fn register(kantor: &Kantor, args: &[String]) -> Result<()> {
    let [name, email] = args else {
        bail!("Usage: kantor register <name> <email>");
    };
    let password = prompt_password()?;

    kantor
        .session
        .try_register(name, email, &password)
        .await
        .context("Registration failed")?;
    println!("Account created. Run `kantor login {}` to sign in.", email);
    Ok(())
}

fn require_login(kantor: &Kantor) -> Result<()> {
    if kantor.session.status() != SessionStatus::Authenticated {
        bail!("Not logged in. Run `kantor login` first.");
    }
    Ok(())
}

async fn wallets(kantor: &Kantor) -> Result<()> {
    require_login(kantor)?;
    let wallets = kantor.api.wallets().await?;
    if wallets.is_empty() {
        println!("No wallets.");
    }
    for wallet in wallets {
        println!("{:>16}", wallet.display_balance());
    }
    Ok(())
}

fn parse_amount(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .with_context(|| format!("Invalid amount: {}", raw))
}

async fn top_up(kantor: &Kantor, args: &[String]) -> Result<()> {
    let [amount] = args else {
        bail!("Usage: kantor topup <amount>");
    };
    require_login(kantor)?;
    let wallet = kantor.api.top_up(parse_amount(amount)?).await?;
    println!("Balance: {}", wallet.display_balance());
    Ok(())
}

async fn exchange(kantor: &Kantor, args: &[String]) -> Result<()> {
    let [from, to, amount] = args else {
        bail!("Usage: kantor exchange <from> <to> <amount>");
    };
    require_login(kantor)?;
    let request = ExchangeRequest::new(from, to, parse_amount(amount)?);
    let tx = kantor.api.exchange(&request).await?;
    println!("{:?} {:?}: {}", tx.kind, tx.status, tx.summary());
    Ok(())
}

async fn rates(kantor: &Kantor, code: Option<&String>) -> Result<()> {
    let rates = match code {
        Some(code) => vec![kantor.api.rate(code).await?],
        None => kantor.api.current_rates().await?,
    };

    let fmt_rate = |r: Option<f64>| r.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string());
    println!("{:<5} {:>10} {:>10} {:>10}", "CODE", "BID", "ASK", "MID");
    for rate in &rates {
        println!(
            "{:<5} {:>10} {:>10} {:>10}",
            rate.code_display(),
            fmt_rate(rate.bid),
            fmt_rate(rate.ask),
            fmt_rate(rate.mid_rate)
        );
    }
    Ok(())
}

async fn history(kantor: &Kantor, page: Option<&String>) -> Result<()> {
    let page = match page {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("Invalid page: {}", raw))?,
        None => 0,
    };
    require_login(kantor)?;

    let history = kantor.api.transaction_history(page, DEFAULT_PAGE_SIZE).await?;
    for tx in &history.content {
        let when = tx
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let kind = format!("{:?}", tx.kind);
        let status = format!("{:?}", tx.status);
        println!("{:<16} {:<10} {:<10} {}", when, kind, status, tx.summary());
    }
    println!("Page {} of {}", history.number + 1, history.total_pages.max(1));
    Ok(())
}
