//! Main entry point for the banklink gateway.
//!
//! This binary loads a gateway configuration and exposes the banklink
//! operations on the command line: reference numbers, signed payment forms,
//! callback verification and gateway availability.

use banklink_config::Config;
use banklink_core::GatewayService;
use banklink_protocol::{is_digit_string, reference_with_checksum};
use banklink_storage::{create_backend, OrderStore, StorageOrderStore, StorageService};
use banklink_types::{FieldMap, Order};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod observer;

/// Command-line arguments for the banklink gateway.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", global = true)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the reference number for an order id
	Reference { stamp: String },
	/// Build the signed bank form for an order
	Request {
		gateway: String,
		order_id: String,
		/// Store the order from this JSON file before building the form
		#[arg(long)]
		order: Option<PathBuf>,
	},
	/// Verify a bank callback given as a JSON object of fields
	Callback { gateway: String, fields: PathBuf },
	/// List the gateways available for a billing country
	Gateways {
		#[arg(long)]
		country: Option<String>,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.init();

	if let Command::Reference { stamp } = &args.command {
		println!("{}", reference(stamp)?);
		return Ok(());
	}

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let store = open_store(&config)?;
	let service = GatewayService::from_config(&config, store.clone())?;

	let output = run(args.command, &service, store.as_ref()).await?;
	println!("{}", output);
	Ok(())
}

/// Reference number for a stamp. Non-digit stamps are refused.
fn reference(stamp: &str) -> Result<String, Box<dyn std::error::Error>> {
	if !is_digit_string(stamp) {
		return Err(format!("Order id '{}' is not a digit string", stamp).into());
	}
	Ok(reference_with_checksum(stamp))
}

/// Opens the primary storage backend as an Order Store.
fn open_store(config: &Config) -> Result<Arc<StorageOrderStore>, Box<dyn std::error::Error>> {
	let primary = &config.storage.primary;
	let backend_config = config
		.storage
		.implementations
		.get(primary)
		.ok_or_else(|| format!("Storage '{}' is not configured", primary))?;
	let backend = create_backend(primary, backend_config)?;
	Ok(Arc::new(StorageOrderStore::new(StorageService::new(backend))))
}

/// Runs one command and returns what it prints.
async fn run(
	command: Command,
	service: &GatewayService,
	store: &dyn OrderStore,
) -> Result<String, Box<dyn std::error::Error>> {
	match command {
		Command::Reference { stamp } => reference(&stamp),
		Command::Request {
			gateway,
			order_id,
			order,
		} => {
			if let Some(path) = order {
				let order: Order = read_json(&path).await?;
				store.insert_order(&order).await?;
			}
			let now = chrono::Local::now().fixed_offset();
			let prepared = service.prepare_payment(&gateway, &order_id, now).await?;
			observer::report(&prepared.events);
			Ok(serde_json::to_string_pretty(&prepared.form)?)
		},
		Command::Callback { gateway, fields } => {
			let fields: FieldMap = read_json(&fields).await?;
			let report = service.handle_callback(&gateway, &fields).await?;
			observer::report(&report.events);
			Ok(serde_json::to_string_pretty(&serde_json::json!({
				"result": report.result,
				"status": report.status,
				"redirect_url": report.redirect_url,
			}))?)
		},
		Command::Gateways { country } => {
			let lines: Vec<String> = service
				.available_gateways(country.as_deref())
				.into_iter()
				.filter_map(|name| service.driver(name))
				.map(|driver| format!("{}\t{}", driver.name(), driver.variant().display_name))
				.collect();
			Ok(lines.join("\n"))
		},
	}
}

async fn read_json<T: serde::de::DeserializeOwned>(
	path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
	let content = tokio::fs::read_to_string(path).await?;
	Ok(serde_json::from_str(&content)?)
}
