//! Main entry point for the laundry service.
//!
//! Runs the laundry engine for the configured session: it keeps the order
//! status flow and the subscription snapshot fresh, dispatches order
//! notifications and, when enabled, serves the HTTP API used by the counter
//! and back-office clients.

use clap::Parser;
use laundry_config::Config;
use laundry_core::{LaundryBuilder, LaundryEngine, LaundryFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use laundry_backend::implementations::memory::create_backend as create_memory_backend;
use laundry_backend::implementations::rest::create_backend as create_rest_backend;
use laundry_notify::implementations::log::create_notifier as create_log_notifier;
use laundry_notify::implementations::webhook::create_notifier as create_webhook_notifier;
use laundry_storage::implementations::file::create_storage as create_file_storage;
use laundry_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the laundry service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "LAUNDRY_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started laundry service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = build_engine(config.clone())?;
	engine.initialize().await?;
	let engine = Arc::new(engine);

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		}
		None => {
			tracing::info!("Starting engine only");
			engine.run().await?;
		}
	}

	tracing::info!("Stopped laundry service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};

    // Variant for backends, which hand out a bundle of services
    (backend, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as laundry_backend::BackendFactory
            );
        )*
        factories
    }};
}

/// Builds the engine with every available implementation.
pub(crate) fn build_engine(config: Config) -> Result<LaundryEngine, Box<dyn std::error::Error>> {
	let builder = LaundryBuilder::new(config);

	let storage_factories = create_factory_map!(
		laundry_storage::StorageInterface,
		laundry_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let backend_factories = create_factory_map!(
		backend,
		"memory" => create_memory_backend,
		"rest" => create_rest_backend,
	);

	let notification_factories = create_factory_map!(
		laundry_notify::NotificationInterface,
		laundry_notify::NotifyError,
		"log" => create_log_notifier,
		"webhook" => create_webhook_notifier,
	);

	let factories = LaundryFactories {
		storage_factories,
		backend_factories,
		notification_factories,
	};

	Ok(builder.build(factories)?)
}
