//! Order intent types supplied by the UI layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of money in a specific currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
	/// Decimal amount in major units.
	pub amount: Decimal,
	/// ISO 4217 currency code.
	pub currency: String,
}

impl Money {
	/// Creates a new amount.
	pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
		Self {
			amount,
			currency: currency.into(),
		}
	}
}

/// Booking window for time-based listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingWindow {
	pub start: DateTime<Utc>,
	pub end: DateTime<Utc>,
}

/// Order intent for one checkout: which listing, under which process, and
/// the customer's choices. Passed through to the ledger when the
/// transaction is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderParams {
	/// Name of the process the listing is sold under.
	pub process_name: String,
	/// Listing being purchased or booked.
	pub listing_id: String,
	/// Identity of the customer checking out, from the auth context.
	pub customer_id: String,
	/// Number of units or seats; 1 for plain bookings.
	#[serde(default = "default_units")]
	pub units: u32,
	/// Total payin charged to the customer.
	pub total: Money,
	/// Booking window, for time-based processes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub booking: Option<BookingWindow>,
	/// Initial message delivered to the provider once payment completes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	/// Whether the customer opted in to keeping the payment method on file.
	#[serde(default)]
	pub save_payment_method: bool,
	/// Additional process-specific parameters passed through verbatim.
	#[serde(default)]
	pub extra: serde_json::Value,
}

fn default_units() -> u32 {
	1
}
