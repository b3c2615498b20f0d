//! simple-socket - Entry Point
//!
//! Runs a server from `config.toml` that logs every parsed command.

use log::{error, info};

use simple_socket::error::handle_error;
use simple_socket::{Server, Settings};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Launching server on {}...", settings.server.socket_addr_str());

    let server = match Server::builder(settings.server)
        .handler(|args, conn| {
            let args: Vec<_> = args.iter().map(|a| String::from_utf8_lossy(a)).collect();
            match conn {
                Some(conn) => info!("{} -> {:?}", conn.label(), args),
                None => info!("{:?}", args),
            }
            Ok(())
        })
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    let accepter = server.start();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            server.close();
        }
        result = accepter => {
            match result {
                Ok(Err(e)) => handle_error(&e),
                Err(e) => error!("Accept task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
    }

    info!("Server stopped ({} clients still connected)", server.client_count().await);
}
