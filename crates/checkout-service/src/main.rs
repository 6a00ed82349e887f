//! Main entry point for the marketplace checkout service.
//!
//! Wires the pluggable implementations (session storage, ledger client,
//! payment client) into a checkout engine from configuration and drives
//! one checkout end-to-end. Running it again with the same session key
//! resumes the persisted session instead of starting over, which makes it
//! a convenient harness for exercising the idempotence guarantees against
//! any configured backend.

use checkout_config::Config;
use checkout_core::{CheckoutBuilder, CheckoutEngine, CheckoutError};
use checkout_payment::PaymentMethodParams;
use checkout_types::{Money, OrderParams};
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Command-line arguments for the checkout service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Session key identifying the checkout to run or resume
	#[arg(long, default_value = "local-checkout")]
	session: String,

	/// Process to check out under
	#[arg(long, default_value = "default-booking")]
	process: String,

	/// Listing to purchase or book
	#[arg(long, default_value = "listing-demo")]
	listing: String,

	/// Customer identity to check out as
	#[arg(long, default_value = "customer-demo")]
	customer: String,

	/// Total payin, in major units
	#[arg(long, default_value = "120.00")]
	total: Decimal,

	/// Payin currency
	#[arg(long, default_value = "USD")]
	currency: String,

	/// Initial message delivered to the provider
	#[arg(long)]
	message: Option<String>,

	/// Keep the payment method on file after checkout
	#[arg(long)]
	save_payment_method: bool,
}

/// Main entry point for the checkout service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the checkout engine with all implementations
/// 5. Runs (or resumes) the requested checkout and reports the outcome
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.to_string()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	tracing::info!("Started checkout service");

	let config_path = args
		.config
		.to_str()
		.ok_or("config path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.checkout.marketplace);

	let engine = build_engine(config)?;
	let processes: Vec<&str> = engine.registry().names().collect();
	tracing::info!(processes = ?processes, "Process registry ready");

	let order = OrderParams {
		process_name: args.process,
		listing_id: args.listing,
		customer_id: args.customer,
		units: 1,
		total: Money::new(args.total, args.currency),
		booking: None,
		message: args.message,
		save_payment_method: args.save_payment_method,
		extra: serde_json::Value::Null,
	};
	let payment_method = PaymentMethodParams {
		payment_method_token: "tok_demo".to_string(),
		billing_name: None,
	};

	let outcome = engine
		.run_checkout(&args.session, order, payment_method)
		.await?;
	tracing::info!(
		transaction = %outcome.transaction_id,
		payment_method_saved = outcome.payment_method_saved,
		message_sent = outcome.message_sent,
		"Checkout finished"
	);

	Ok(())
}

/// Builds the checkout engine with all built-in implementations.
///
/// Every implementation registers itself with its configuration name and
/// factory; the builder picks whichever each section's `primary` selects.
fn build_engine(config: Config) -> Result<CheckoutEngine, CheckoutError> {
	let mut builder = CheckoutBuilder::new(config);

	for (name, factory) in checkout_storage::get_all_implementations() {
		builder = builder.with_storage_factory(name, factory);
	}
	for (name, factory) in checkout_ledger::get_all_implementations() {
		builder = builder.with_ledger_factory(name, factory);
	}
	for (name, factory) in checkout_payment::get_all_implementations() {
		builder = builder.with_payment_factory(name, factory);
	}

	builder.build()
}
