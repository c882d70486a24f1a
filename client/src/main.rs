use clap::Parser;
use client::auth::DEFAULT_AUTH_SERVER;
use client::config::{ServerAddress, SessionConfig};
use client::session::{Login, Session};
use log::info;
use std::io::{self, BufRead, Write};
use std::time::Duration;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Username to log in with
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Password to log in with
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Server host or host:port (enclose IPv6 addresses in square brackets)
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Connect to a server in offline mode (no password required)
    #[arg(short = 'o', long)]
    offline: bool,

    /// Print sent and received packets to standard error
    #[arg(short = 'd', long)]
    dump_packets: bool,

    /// Give up if the server has not acknowledged the join within this many seconds
    #[arg(long)]
    join_timeout: Option<u64>,

    /// Identity service base URL
    #[arg(long, default_value = DEFAULT_AUTH_SERVER)]
    auth_server: String,
}

fn prompt(text: &str) -> io::Result<String> {
    print!("{}", text);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let username = match args.username {
        Some(username) => username,
        None => prompt("Enter your username: ")?,
    };

    let mut offline = args.offline;
    let password = match args.password {
        Some(password) => password,
        None if offline => String::new(),
        None => prompt("Enter your password (leave blank for offline mode): ")?,
    };
    offline = offline || password.is_empty();

    let server = match args.server {
        Some(server) => server,
        None => prompt(
            "Enter server host or host:port (enclose IPv6 addresses in square brackets): ",
        )?,
    };

    let address: ServerAddress = match server.parse() {
        Ok(address) => address,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let config = SessionConfig {
        dump_packets: args.dump_packets,
        join_timeout: args.join_timeout.map(Duration::from_secs),
        ..SessionConfig::default()
    };

    let login = if offline {
        Login::Offline { username }
    } else {
        Login::Online {
            username,
            password,
            auth_server: args.auth_server,
        }
    };

    let mut session = Session::new(config);
    let credentials = match session.login(login).await {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Connecting to {}:{}", address.host, address.port);
    session.open(&address, credentials).await?;

    let outcome = session
        .run(
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            tokio::signal::ctrl_c(),
        )
        .await;

    // The blocking stdin read cannot be cancelled, and returning from main
    // would wait on it until the operator presses Enter.
    match outcome {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
