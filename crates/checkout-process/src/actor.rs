//! Pure role resolution for transaction parties.

use crate::ProcessError;
use checkout_types::{PartyRole, Transaction};

/// Determines which role the authenticated caller holds on a transaction.
///
/// This is a strict equality check against the transaction's two party
/// identifiers. An empty caller id or an id matching neither party is a
/// programmer or auth error and propagates as
/// [`ProcessError::RoleResolution`]; the function never silently defaults
/// to a role.
pub fn role_of(current_user_id: &str, tx: &Transaction) -> Result<PartyRole, ProcessError> {
	if current_user_id.is_empty() {
		return Err(ProcessError::RoleResolution(
			"current user id is empty".to_string(),
		));
	}
	if current_user_id == tx.customer_id {
		Ok(PartyRole::Customer)
	} else if current_user_id == tx.provider_id {
		Ok(PartyRole::Provider)
	} else {
		Err(ProcessError::RoleResolution(format!(
			"user '{}' is party to neither side of transaction '{}'",
			current_user_id, tx.id
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn transaction() -> Transaction {
		Transaction {
			id: "tx-9".to_string(),
			process_name: "default-booking".to_string(),
			customer_id: "user-a".to_string(),
			provider_id: "user-b".to_string(),
			last_transition: None,
			transitions: Vec::new(),
			protected_data: serde_json::Value::Null,
		}
	}

	#[test]
	fn resolves_both_parties() {
		let tx = transaction();
		assert_eq!(role_of("user-a", &tx).unwrap(), PartyRole::Customer);
		assert_eq!(role_of("user-b", &tx).unwrap(), PartyRole::Provider);
	}

	#[test]
	fn strangers_and_empty_ids_are_rejected() {
		let tx = transaction();
		assert!(matches!(
			role_of("user-c", &tx),
			Err(ProcessError::RoleResolution(_))
		));
		assert!(matches!(
			role_of("", &tx),
			Err(ProcessError::RoleResolution(_))
		));
	}
}
