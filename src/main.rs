// src/main.rs
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, error, info};
use std::error::Error;
use stock_dashboard::models::{AddStockRequest, RegisterRequest, UpdateStockRequest};
use stock_dashboard::{
    fetch_batch_stock_prices, filter_valid_symbols, ApiClient, AuthService, CancelToken, Config,
    CredentialStore, PortfolioService, StockListFilter,
};

#[derive(Parser)]
#[command(name = "stock_dashboard", about = "Stock market dashboard client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List sectors with prices for the displayed stocks
    Sectors {
        #[arg(long, default_value_t = 5)]
        concurrency: usize,
    },
    /// Price of one symbol
    Price { symbol: String },
    /// Prices of several symbols, with placeholders for failures
    Batch { symbols: Vec<String> },
    /// Keep only the symbols that pass validation
    Validate { symbols: Vec<String> },
    Search { query: String },
    Profile { symbol: String },
    History {
        symbol: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
    Register {
        name: String,
        email: String,
        password: String,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Store an existing bearer token
    Login { token: String },
    Logout,
    /// Check the stored token with the backend
    Whoami,
    Portfolio,
    Performance,
    Add {
        symbol: String,
        quantity: f64,
        buy_price: f64,
    },
    Update {
        symbol: String,
        #[arg(long)]
        quantity: Option<f64>,
        #[arg(long)]
        buy_price: Option<f64>,
    },
    Remove { symbol: String },
}

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    let cancel = CancelToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    if let Err(e) = run(cli, &cancel).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, cancel: &CancelToken) -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    if matches!(cli.command, Command::Login { .. } | Command::Register { .. }) {
        config.require_token_file()?;
    }
    let client = ApiClient::new(&config, config.credential_store())?;
    info!("Using backend at {}", client.base_url());
    if let Some(path) = &config.token_file {
        debug!("Token file: {}", path.display());
    }

    match cli.command {
        Command::Sectors { concurrency } => {
            let filter = StockListFilter::from_config(&config);
            for sector in client.get_sectors(cancel).await? {
                let shown = filter
                    .filter_displayable(&client, &sector.stocks, concurrency, cancel)
                    .await?;
                let symbols: Vec<String> = shown.iter().map(|s| s.symbol.clone()).collect();
                let prices = fetch_batch_stock_prices(&client, &symbols, cancel).await?;

                println!("{}", sector.category);
                for stock in &shown {
                    let Some(price) = prices.get(&stock.symbol) else {
                        continue;
                    };
                    let marker = if price.fallback { " (unavailable)" } else { "" };
                    println!(
                        "  {:<10} {:>12.2} {:>+7.2}%{}",
                        stock.symbol, price.current_price, price.percent_change, marker
                    );
                }
            }
        }
        Command::Price { symbol } => {
            let price = client.get_stock_price(&symbol, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&price)?);
        }
        Command::Batch { symbols } => {
            let prices = fetch_batch_stock_prices(&client, &symbols, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&prices)?);
        }
        Command::Validate { symbols } => {
            let valid =
                filter_valid_symbols(&client, &symbols, config.validation_timeout, cancel).await?;
            println!("{}", valid.join(" "));
        }
        Command::Search { query } => {
            let matches = client.search_stocks(&query, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
        Command::Profile { symbol } => {
            let profile = client.get_stock_profile(&symbol, cancel).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::History {
            symbol,
            period,
            interval,
        } => {
            let points = client
                .get_historical_data(&symbol, period.as_deref(), interval.as_deref(), cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
        Command::Register {
            name,
            email,
            password,
            phone,
        } => {
            let auth = AuthService::new(client);
            let request = RegisterRequest {
                name,
                email,
                password,
                phone,
            };
            let reply = auth.register(&request, cancel).await?;
            println!("{}", reply.message.as_deref().unwrap_or("Registration successful"));
        }
        Command::Login { token } => {
            client.credentials().set_token(&token)?;
            println!("Token stored");
        }
        Command::Logout => AuthService::new(client).logout()?,
        Command::Whoami => {
            let valid = AuthService::new(client).validate(cancel).await?;
            println!("{}", if valid { "authenticated" } else { "not authenticated" });
        }
        Command::Portfolio => {
            let portfolio = PortfolioService::new(client).get_portfolio(cancel).await?;
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
        }
        Command::Performance => {
            let performance = PortfolioService::new(client).get_performance(cancel).await?;
            println!("{}", serde_json::to_string_pretty(&performance)?);
        }
        Command::Add {
            symbol,
            quantity,
            buy_price,
        } => {
            if quantity <= 0.0 || buy_price <= 0.0 {
                return Err("quantity and buy price must be positive".into());
            }
            let request = AddStockRequest {
                symbol,
                quantity,
                buy_price,
            };
            let portfolio = PortfolioService::new(client)
                .add_stock(&request, cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
        }
        Command::Update {
            symbol,
            quantity,
            buy_price,
        } => {
            let update = UpdateStockRequest {
                quantity,
                buy_price,
            };
            let portfolio = PortfolioService::new(client)
                .update_stock(&symbol, &update, cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
        }
        Command::Remove { symbol } => {
            let portfolio = PortfolioService::new(client)
                .remove_stock(&symbol, cancel)
                .await?;
            println!("{}", serde_json::to_string_pretty(&portfolio)?);
        }
    }

    Ok(())
}
