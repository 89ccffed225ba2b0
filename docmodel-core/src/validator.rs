use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    field::Field,
    value::Value,
};

/// Applies a field's declared options to a value before it is converted for storage.
///
/// The steps run in a fixed order: option check, default substitution, required check,
/// length truncation.
#[derive(Debug, Clone, Copy)]
pub struct AttributeValidator<'a> {
    field: &'a Field,
}

impl<'a> AttributeValidator<'a> {
    pub fn new(field: &'a Field) -> Self {
        Self { field }
    }

    pub fn validate(&self, value: Value) -> DocumentStoreResult<Value> {
        self.field.check_options()?;

        let value = self.apply_default(value);
        self.check_required(&value)?;

        Ok(self.truncate(value))
    }

    fn apply_default(&self, value: Value) -> Value {
        match (value, self.field.default_value()) {
            (Value::Null, Some(default)) => default.clone(),
            (value, _) => value,
        }
    }

    fn check_required(&self, value: &Value) -> DocumentStoreResult<()> {
        // The identifier is generated on write when missing.
        if value.is_null() && !self.field.is_blank() && !self.field.is_id() {
            return Err(DocumentStoreError::RequiredValue(self.field.name().to_string()));
        }

        Ok(())
    }

    fn truncate(&self, value: Value) -> Value {
        let Some(max_length) = self.field.max_length_value() else {
            return value;
        };

        match value {
            Value::String(text) if text.chars().count() > max_length => {
                Value::String(text.chars().take(max_length).collect())
            }
            Value::List(mut items) => {
                items.truncate(max_length);
                Value::List(items)
            }
            value => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(mut field: Field) -> Field {
        field.bind("Profile", "bio");
        field
    }

    #[test]
    fn falsy_defaults_are_still_applied() {
        for default in [Value::from(false), Value::from(0), Value::from(""), Value::List(vec![])] {
            let field = bound(Field::text().default(default.clone()));
            let validated = AttributeValidator::new(&field).validate(Value::Null).unwrap();
            assert_eq!(validated, default);
        }
    }

    #[test]
    fn supplied_values_win_over_defaults() {
        let field = bound(Field::text().default("fallback"));

        let validated = AttributeValidator::new(&field)
            .validate(Value::from("given"))
            .unwrap();

        assert_eq!(validated, Value::from("given"));
    }

    #[test]
    fn blank_allows_null() {
        let field = bound(Field::text().blank());

        assert_eq!(
            AttributeValidator::new(&field).validate(Value::Null).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn truncation_counts_characters() {
        let field = bound(Field::text().max_length(3));

        let validated = AttributeValidator::new(&field)
            .validate(Value::from("héllo"))
            .unwrap();

        assert_eq!(validated, Value::from("hél"));
    }

    #[test]
    fn option_errors_come_first() {
        let field = bound(Field::boolean().max_length(1));

        let err = AttributeValidator::new(&field).validate(Value::Null).unwrap_err();

        assert!(matches!(err, DocumentStoreError::Configuration(_)));
    }
}
