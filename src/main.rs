// src/main.rs
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use userop_relay::config::{RelayConfig, DEFAULT_ENTRY_POINT, DEFAULT_NAMESPACE};
use userop_relay::rpc::{self, OperationRpcImpl};
use userop_relay::{HttpTransport, OperationSigner, Relayer};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, env = "RPC_SERVER_ADDR", default_value = "127.0.0.1:8545")]
    rpc_server_addr: String,

    #[clap(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    #[clap(short, long, env = "CHAIN_ID")]
    chain_id: u64,

    /// Bundler/paymaster endpoint, API key included
    #[clap(long, env = "RELAY_URL", hide_env_values = true)]
    relay_url: String,

    #[clap(long, env = "ENTRY_POINT", default_value = DEFAULT_ENTRY_POINT)]
    entry_point: String,

    /// Gas manager policy sponsoring the operations
    #[clap(long, env = "POLICY_ID")]
    policy_id: String,

    /// Factory used to deploy wallets on their first operation
    #[clap(long, env = "ACCOUNT_FACTORY")]
    account_factory: Option<String>,

    #[clap(long, env = "RELAY_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    relay_namespace: String,

    /// Pass the EntryPoint as second eth_sendUserOperation parameter
    #[clap(long, env = "APPEND_ENTRY_POINT")]
    append_entry_point: bool,
}

impl Args {
    fn relay_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::new(&self.relay_url, &self.policy_id, self.chain_id)?
            .with_entry_point(&self.entry_point)?
            .with_namespace(&self.relay_namespace)
            .appending_entry_point(self.append_entry_point);
        if let Some(factory) = &self.account_factory {
            config = config.with_account_factory(factory)?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = args.relay_config()?;

    let signer = OperationSigner::from_private_key(&args.private_key)?;
    let transport = HttpTransport::new(config.relay_url.clone());
    let relayer = Relayer::new(transport, signer, config);
    info!(
        "Signing operations as {:?} on chain {} via EntryPoint {:?}",
        relayer.signer().address(),
        relayer.config().chain_id,
        relayer.config().entry_point
    );

    let server_addr: SocketAddr = args.rpc_server_addr.parse()?;
    let operation_rpc = OperationRpcImpl::new(Arc::new(relayer));

    info!("Starting user operation relay RPC server on {}", server_addr);

    let server_handle = start_server(server_addr, operation_rpc).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;
    server_handle.stop()?;
    info!("Server stopped");

    Ok(())
}

async fn start_server(
    server_addr: SocketAddr,
    operation_rpc: OperationRpcImpl,
) -> anyhow::Result<ServerHandle> {
    let server = ServerBuilder::default().build(server_addr).await?;
    let server_handle = server.start(rpc::rpc_module(operation_rpc));

    Ok(server_handle)
}
