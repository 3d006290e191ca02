use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use identity::{
    BroadcastIdentifierProvider, CryptogramProvider, Encrypter, IdentifierSigner,
    InMemoryCryptogramStorage, InMemoryKeyStorage, StaticResidentIdProvider,
};
use proximity::{
    BtleRadioAdapter, CoLocationDataProvider, ContactEventStore, InMemoryContactEventStore,
    SaveContactWorker, Scanner, TracingEventEmitter,
};
use shared::config::{Config, IdentityConfig};
use shared::{Clock, SystemClock};
use status::{HealthStateHolder, InMemoryStateStorage, MockReminderScheduler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Transmit power carried in our own identifier
const TX_POWER_IN_PROTOCOL: i8 = -4;

#[tokio::main]
async fn main() -> Result<()> {
    shared::logging::init_logging();

    tracing::info!("Starting proximity tracer");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Own identity
    let identifiers = build_identifier_provider(&config.identity, clock.clone())?;
    announce_identifier(&identifiers).await;

    // Health state
    let health = HealthStateHolder::load(
        Arc::new(InMemoryStateStorage::new()),
        Arc::new(MockReminderScheduler::new()),
        clock.clone(),
    )
    .await;
    let state = health.refresh().await;
    tracing::info!("Health status: {:?}", state.display_state());

    // Radio
    let adapter = Arc::new(BtleRadioAdapter::new().await?);
    tracing::info!("Bluetooth adapter initialized");

    let store: Arc<dyn ContactEventStore> = Arc::new(InMemoryContactEventStore::new());
    let worker = SaveContactWorker::start(store.clone(), &config.contact_events);
    let scanner = Scanner::new(
        adapter,
        worker.clone(),
        Arc::new(TracingEventEmitter),
        clock.clone(),
        config.scanner.clone(),
    );

    let shutdown = CancellationToken::new();
    scanner.start(&shutdown).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    shutdown.cancel();
    scanner.stop().await;
    worker.flush().await;

    let events = CoLocationDataProvider::new(store).get_events().await?;
    tracing::info!("Collected {} contact events", events.len());
    println!("{}", serde_json::to_string_pretty(&events)?);

    Ok(())
}

/// Try to build our identifier once. Failure is logged and never fatal.
async fn announce_identifier(identifiers: &BroadcastIdentifierProvider) -> bool {
    if !identifiers.can_provide() {
        tracing::warn!("Not registered, broadcast identifier unavailable");
        return false;
    }

    match identifiers.provide_identifier(TX_POWER_IN_PROTOCOL).await {
        Ok(identifier) => {
            tracing::info!(
                "Broadcast identifier ready for {}",
                String::from_utf8_lossy(&identifier.country_code)
            );
            true
        }
        Err(e) => {
            tracing::warn!("Broadcast identifier unavailable for now: {}", e);
            false
        }
    }
}

fn build_identifier_provider(
    config: &IdentityConfig,
    clock: Arc<dyn Clock>,
) -> Result<BroadcastIdentifierProvider> {
    let resident_id = config
        .resident_id
        .as_deref()
        .map(Uuid::parse_str)
        .transpose()
        .context("RESIDENT_ID is not a UUID")?;

    let server_public_key = config
        .server_public_key
        .as_deref()
        .map(|encoded| -> Result<[u8; 32]> {
            let bytes = STANDARD.decode(encoded)?;
            <[u8; 32]>::try_from(bytes.as_slice()).context("expected 32 bytes")
        })
        .transpose()
        .context("SERVER_PUBLIC_KEY is not a base64 X25519 key")?;

    let signing_secret = config
        .signing_secret
        .as_deref()
        .map(|encoded| STANDARD.decode(encoded))
        .transpose()
        .context("SIGNING_SECRET is not base64")?;

    let keys = Arc::new(InMemoryKeyStorage::new(server_public_key, signing_secret));
    let cryptograms = Arc::new(CryptogramProvider::new(
        Arc::new(StaticResidentIdProvider::new(resident_id)),
        Encrypter::new(keys.clone()),
        Arc::new(InMemoryCryptogramStorage::new()),
        clock.clone(),
        config.country_code_bytes(),
    ));

    Ok(BroadcastIdentifierProvider::new(
        cryptograms,
        IdentifierSigner::new(keys),
        clock,
    ))
}
