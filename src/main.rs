use ferrum_storage::{ChangeEvent, MemoryStorage, Observer, Storage, StorageConfig, StorageExt};
use serde_json::json;
use tracing::info;

// RUST_LOG=ferrum_storage=trace cargo run -- storage.json

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (DEBUG level for detailed operation tracing)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .init();

    // Optional JSON configuration file as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => StorageConfig::load(&path)?,
        None => StorageConfig::default(),
    };

    let storage = MemoryStorage::with_config(config)?;
    info!("Storage '{}' ready", storage.name());

    let observer = Observer::new(|event: &ChangeEvent| match serde_json::to_string(event) {
        Ok(text) => info!("Change event: {}", text),
        Err(e) => info!("Change event on {} keys (unprintable: {})", event.len(), e),
    });
    storage.add_observer(observer.clone());

    storage
        .set_items(
            [
                ("font-size".to_string(), json!(15)),
                ("theme".to_string(), json!({"background": "#101010", "cursor": "block"})),
            ]
            .into_iter()
            .collect(),
        )
        .await;
    storage.set_value("scrollback", &10_000u32)?.await;

    let theme = storage.get_item("theme").await;
    info!("theme = {:?}", theme);

    let mut wanted = vec!["font-size".to_string(), "missing".to_string()];
    let found = storage.get_items(Some(&mut wanted)).await;
    info!("Found {} of the requested keys: {:?}", found.len(), wanted);

    storage.remove_item("scrollback").await;
    storage.clear().await;
    storage.remove_observer(&observer);

    info!("Final stats: {:?}", storage.stats());
    Ok(())
}
