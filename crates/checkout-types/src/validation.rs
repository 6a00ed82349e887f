//! Configuration validation framework for TOML sections.
//!
//! Every pluggable implementation (storage backend, ledger client, payment
//! client) receives its own opaque TOML section and validates it against a
//! schema before being constructed. Schemas carry required and optional
//! fields with type checks and optional custom validators.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field is present but holds an unacceptable value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field is present with the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// The section itself is not a TOML table.
	#[error("Expected a table, got {0}")]
	NotATable(String),
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A boolean value.
	Boolean,
	/// An array whose elements all share one type.
	Array(Box<FieldType>),
	/// A nested table with its own schema.
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
			FieldType::Array(_) => "array",
			FieldType::Table(_) => "table",
		}
	}
}

/// Custom validator run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// One field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a field with the given name and expected type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Validation schema for one TOML section: required fields that must be
/// present plus optional fields that are type-checked when present.
/// Unknown fields are tolerated so implementations can evolve their
/// sections without breaking older configs.
#[derive(Debug)]
pub struct Schema {
	required: Vec<Field>,
	optional: Vec<Field>,
}

impl Schema {
	/// Creates a schema from required and optional field lists.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::NotATable(toml_type_name(config).to_string()))?;

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => check_field(field, value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	check_type(&field.name, &field.field_type, value)?;

	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}

	Ok(())
}

fn check_type(name: &str, field_type: &FieldType, value: &toml::Value) -> Result<(), ValidationError> {
	let matches = match field_type {
		FieldType::String => value.is_str(),
		FieldType::Integer { .. } => value.is_integer(),
		FieldType::Boolean => value.is_bool(),
		FieldType::Array(_) => value.is_array(),
		FieldType::Table(_) => value.is_table(),
	};
	if !matches {
		return Err(ValidationError::TypeMismatch {
			field: name.to_string(),
			expected: field_type.name().to_string(),
			actual: toml_type_name(value).to_string(),
		});
	}

	match field_type {
		FieldType::Integer { min, max } => {
			// Checked above, so as_integer cannot fail here.
			if let Some(n) = value.as_integer() {
				if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
					return Err(ValidationError::InvalidValue {
						field: name.to_string(),
						message: format!("{} is out of bounds", n),
					});
				}
			}
		}
		FieldType::Array(element_type) => {
			if let Some(elements) = value.as_array() {
				let element_name = format!("{}[]", name);
				for element in elements {
					check_type(&element_name, element_type, element)?;
				}
			}
		}
		FieldType::Table(schema) => schema.validate(value)?,
		_ => {}
	}

	Ok(())
}

fn toml_type_name(value: &toml::Value) -> &'static str {
	match value {
		toml::Value::String(_) => "string",
		toml::Value::Integer(_) => "integer",
		toml::Value::Float(_) => "float",
		toml::Value::Boolean(_) => "boolean",
		toml::Value::Datetime(_) => "datetime",
		toml::Value::Array(_) => "array",
		toml::Value::Table(_) => "table",
	}
}

/// Trait implemented by every pluggable implementation to expose its
/// configuration requirements.
pub trait ConfigSchema: Send + Sync {
	/// Validates the implementation's TOML section.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	#[test]
	fn required_field_must_be_present() {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		assert!(schema.validate(&parse("path = \"./data\"")).is_ok());
		let err = schema.validate(&parse("other = 1")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "path"));
	}

	#[test]
	fn type_mismatch_is_reported() {
		let schema = Schema::new(vec![Field::new("path", FieldType::String)], vec![]);
		let err = schema.validate(&parse("path = 42")).unwrap_err();
		assert!(matches!(err, ValidationError::TypeMismatch { .. }));
	}

	#[test]
	fn integer_bounds_are_enforced() {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"ttl_seconds",
				FieldType::Integer {
					min: Some(0),
					max: Some(86400),
				},
			)],
		);
		assert!(schema.validate(&parse("ttl_seconds = 3600")).is_ok());
		assert!(schema.validate(&parse("ttl_seconds = -1")).is_err());
		assert!(schema.validate(&parse("ttl_seconds = 100000")).is_err());
	}

	#[test]
	fn custom_validator_runs_after_type_check() {
		let schema = Schema::new(
			vec![Field::new("currency", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(s) if s.len() == 3 => Ok(()),
					_ => Err("must be a 3-letter code".to_string()),
				}
			})],
			vec![],
		);
		assert!(schema.validate(&parse("currency = \"USD\"")).is_ok());
		assert!(schema.validate(&parse("currency = \"dollars\"")).is_err());
	}

	#[test]
	fn array_elements_are_type_checked() {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"transitions",
				FieldType::Array(Box::new(FieldType::String)),
			)],
		);
		assert!(schema
			.validate(&parse("transitions = [\"a\", \"b\"]"))
			.is_ok());
		assert!(schema.validate(&parse("transitions = [1, 2]")).is_err());
	}

	#[test]
	fn unknown_fields_are_tolerated() {
		let schema = Schema::new(vec![], vec![]);
		assert!(schema.validate(&parse("anything = true")).is_ok());
	}
}
