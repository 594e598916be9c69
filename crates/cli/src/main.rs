//! Guest Pay CLI - run checkout attempts from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Pay as a guest
//! guestpay pay -c Q2hlY2tvdXQ6MQ== -e shopper@example.net
//!
//! # Create an account while paying
//! guestpay pay -c Q2hlY2tvdXQ6MQ== -e new@example.net --create-account --password longenough
//! ```
//!
//! # Commands
//!
//! - `pay` - Register (optionally), link and pay one checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "guestpay")]
#[command(author, version, about = "Guest Pay CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one checkout attempt and print its report
    Pay(commands::pay::PayArgs),
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestpay_storefront=info,guestpay=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Pay(args) => {
            let outcome = commands::pay::run(args).await?;
            if !outcome.report.outcome.is_completed() {
                return Err("checkout did not complete".into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_pay_arguments_parse() {
        let cli = Cli::try_parse_from([
            "guestpay",
            "pay",
            "-c",
            "Q2hlY2tvdXQ6MQ==",
            "-e",
            "new@x.com",
            "--create-account",
            "--password",
            "longenough",
        ])
        .unwrap();

        let Commands::Pay(args) = cli.command;
        assert_eq!(args.checkout_id, "Q2hlY2tvdXQ6MQ==");
        assert_eq!(args.email, "new@x.com");
        assert!(args.create_account);
        assert_eq!(args.password.as_deref(), Some("longenough"));
    }
}
