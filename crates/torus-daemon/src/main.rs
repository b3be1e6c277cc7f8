//! torus-daemon: a ring-DHT node serving HTTP.
//!
//! One OS process, one thread: a current-thread Tokio runtime whose single
//! task multiplexes the TCP listener, the UDP control socket and the
//! stabilization timer. Startup faults (bad arguments, unresolvable hosts,
//! bind failures) exit non-zero before the loop starts.

mod config;
mod server;

use anyhow::Context;
use tracing::info;

use torus_store::{MemoryStore, ObjectStore};

use crate::config::ServerConfig;
use crate::server::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("torus=info".parse()?),
        )
        .init();

    let config = ServerConfig::load(std::env::args().skip(1))?;

    let mut store = MemoryStore::new(config.tunables.store_capacity);
    seed_store(&mut store).context("seeding the object store")?;

    let mut server = Server::bind(config, store).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            Ok(())
        }
    }
}

/// Create the resource tree the server starts with: the two top-level
/// directories and a little static content.
fn seed_store(store: &mut MemoryStore) -> torus_store::Result<()> {
    store.make_dir("/static")?;
    store.make_dir("/dynamic")?;
    store.write("/static/foo", b"Foo")?;
    store.write("/static/bar", b"Bar")?;
    store.write("/static/baz", b"Baz")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_store_contents() {
        let mut store = MemoryStore::new(100);
        seed_store(&mut store).expect("seed");
        assert_eq!(store.read("/static/foo").expect("read"), b"Foo");
        assert_eq!(store.read("/static/bar").expect("read"), b"Bar");
        assert_eq!(store.read("/static/baz").expect("read"), b"Baz");
        assert!(store.exists("/dynamic"));
    }
}
