//! `console-gateway` command-line front end.
//!
//! Logs in against the configured API, keeps the session on disk and sends
//! ad-hoc requests through the same pipeline the console uses.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::{json, Value};

use console_gateway::config::loader::{default_config, load_config};
use console_gateway::http::{ApiClient, RequestDescriptor};
use console_gateway::observability::logging::init_logging;
use console_gateway::session::{
    login_target, unix_now, FileStore, KeyValueStore, MemoryStore, Navigator, SessionStore,
    TeardownAndRedirect,
};
use console_gateway::GatewayConfig;

#[derive(Parser)]
#[command(name = "console-gateway")]
#[command(about = "Authenticated client for the merchant console API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange credentials for a session token
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Status,
    /// Send a request and print the envelope data
    Request {
        method: String,
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE")]
        query: Vec<String>,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

/// Token payload returned by the login endpoint.
#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
    #[serde(default, alias = "expiredAt")]
    expired_at: Option<i64>,
}

/// Tells the user where to log in again.
struct ConsoleNavigator {
    login_path: String,
}

impl Navigator for ConsoleNavigator {
    fn redirect_to_login(&self, return_path: &str) {
        eprintln!("Session expired. Run `console-gateway login <username>` to continue.");
        eprintln!("Console login: {}", login_target(&self.login_path, return_path));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };
    if let Some(url) = &cli.url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.observability);

    let store = Arc::new(open_session_store(&config)?);
    let navigator = Arc::new(ConsoleNavigator {
        login_path: config.api.login_path.clone(),
    });
    let client = ApiClient::from_config(
        &config,
        store.clone(),
        Arc::new(TeardownAndRedirect::new(store.clone(), navigator)),
    )?;

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let data: LoginData = client
                .send_json(
                    RequestDescriptor::post(config.api.login_endpoint.clone())
                        .json(&json!({ "username": username, "password": password })),
                )
                .await?;
            store.login(data.token, data.expired_at)?;
            println!("Logged in as {}", username);
        }
        Commands::Logout => {
            store.logout()?;
            println!("Logged out");
        }
        Commands::Status => {
            let session = store.snapshot();
            println!("API:      {}", client.base_url());
            if !session.is_authenticated() {
                println!("Session:  none");
            } else if session.is_expired(unix_now()) {
                println!("Session:  expired");
            } else {
                println!("Session:  active");
            }
            if let Some(at) = session.expired_at {
                println!("Expires:  {} (unix)", at);
            }
        }
        Commands::Request {
            method,
            path,
            query,
            data,
        } => {
            let method = method.to_ascii_uppercase().parse::<http::Method>()?;
            let mut descriptor = RequestDescriptor::new(method, path);
            for pair in &query {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("query parameter '{}' must be KEY=VALUE", pair))?;
                descriptor = descriptor.query(key, value);
            }
            if let Some(raw) = data {
                let body: Value = serde_json::from_str(&raw)?;
                descriptor = descriptor.json(&body);
            }

            let data: Value = client.send_json(descriptor).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }

    Ok(())
}

fn open_session_store(config: &GatewayConfig) -> Result<SessionStore, Box<dyn std::error::Error>> {
    let backend: Arc<dyn KeyValueStore> = match &config.session.store_path {
        Some(path) => Arc::new(FileStore::open(path)?),
        None => {
            tracing::warn!("No session.store_path configured, the session will not outlive this process");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(SessionStore::load(backend, config.session.key.clone())?)
}

fn prompt(label: &str) -> io::Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
