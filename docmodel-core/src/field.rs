//! Typed field descriptors.
//!
//! A [`Field`] is the converter plus option set for one declared attribute of a model. The
//! closed [`FieldKind`] enum carries the per-kind conversion rules:
//!
//! | kind        | native                  | stored                      | options                 |
//! |-------------|-------------------------|-----------------------------|-------------------------|
//! | `Id`        | string                  | string (document key)       | none                    |
//! | `Integer`   | int                     | int64                       | blank, default          |
//! | `Text`      | string                  | string                      | blank, default, max_length |
//! | `Timestamp` | UTC date-time           | BSON date-time              | blank, default          |
//! | `Boolean`   | bool                    | bool                        | blank, default          |
//! | `List`      | list                    | array                       | blank, default          |
//! | `Map`       | map                     | embedded document           | blank, default          |
//! | `GeoPoint`  | [`GeoPoint`]            | `{latitude, longitude}`     | blank, default          |
//! | `Reference` | instance of target type | slash-joined document path  | blank                   |
//!
//! Both conversion directions are pure functions of a single value.

use bson::Bson;
use chrono::{DateTime, Utc};
use std::fmt::{self, Display};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    model::Model,
    path::PATH_SEPARATOR,
    validator::AttributeValidator,
    value::{GeoPoint, Value},
};

/// A declarable per-field option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOption {
    /// The field may be left empty.
    Blank,
    /// Value substituted when none is supplied.
    Default,
    /// Sequence values are truncated to this many items.
    MaxLength,
}

impl FieldOption {
    /// Every option a field can be declared with.
    pub const ALL: [FieldOption; 3] = [FieldOption::Blank, FieldOption::Default, FieldOption::MaxLength];

    pub fn name(&self) -> &'static str {
        match self {
            FieldOption::Blank => "blank",
            FieldOption::Default => "default",
            FieldOption::MaxLength => "max_length",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        FieldOption::ALL
            .into_iter()
            .find(|option| option.name() == name)
    }
}

impl Display for FieldOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    Id,
    Integer,
    Text,
    Timestamp,
    Boolean,
    List,
    Map,
    GeoPoint,
    /// A pointer to a document of the target model (or one of its subtypes).
    Reference(Model),
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Id => "IdField",
            FieldKind::Integer => "IntegerField",
            FieldKind::Text => "TextField",
            FieldKind::Timestamp => "TimestampField",
            FieldKind::Boolean => "BooleanField",
            FieldKind::List => "ListField",
            FieldKind::Map => "MapField",
            FieldKind::GeoPoint => "GeoPointField",
            FieldKind::Reference(_) => "ReferenceField",
        }
    }

    pub fn allowed_options(&self) -> &'static [FieldOption] {
        match self {
            FieldKind::Id => &[],
            FieldKind::Text => &[FieldOption::Blank, FieldOption::Default, FieldOption::MaxLength],
            FieldKind::Reference(_) => &[FieldOption::Blank],
            FieldKind::Integer
            | FieldKind::Timestamp
            | FieldKind::Boolean
            | FieldKind::List
            | FieldKind::Map
            | FieldKind::GeoPoint => &[FieldOption::Blank, FieldOption::Default],
        }
    }

    pub fn allows(&self, option: FieldOption) -> bool {
        self.allowed_options().contains(&option)
    }

    fn expected(&self) -> String {
        match self {
            FieldKind::Id | FieldKind::Text => "string".to_string(),
            FieldKind::Integer => "int".to_string(),
            FieldKind::Timestamp => "timestamp".to_string(),
            FieldKind::Boolean => "bool".to_string(),
            FieldKind::List => "list".to_string(),
            FieldKind::Map => "map".to_string(),
            FieldKind::GeoPoint => "geo_point".to_string(),
            FieldKind::Reference(target) => target.name().to_string(),
        }
    }

    fn type_error(&self, value: &Value) -> DocumentStoreError {
        let actual = match value {
            Value::Reference(instance) => instance.model().name().to_string(),
            other => other.type_name().to_string(),
        };
        DocumentStoreError::ValueType(self.name().to_string(), self.expected(), actual)
    }

    fn invalid_stored(&self, stored: &Bson) -> DocumentStoreError {
        DocumentStoreError::InvalidDocument(format!(
            "{} cannot read stored value {}",
            self.name(),
            stored
        ))
    }

    /// Converts a native value into its stored form. `Null` always stores as `Null`.
    pub fn to_stored(&self, value: &Value) -> DocumentStoreResult<Bson> {
        if value.is_null() {
            return Ok(Bson::Null);
        }

        match self {
            FieldKind::Id => match value {
                Value::String(id) if id.contains(PATH_SEPARATOR) => Err(DocumentStoreError::config(
                    format!("identifier `{id}` must not contain `{PATH_SEPARATOR}`"),
                )),
                Value::String(id) => Ok(Bson::String(id.clone())),
                Value::Int(id) => Ok(Bson::String(id.to_string())),
                other => Err(self.type_error(other)),
            },
            FieldKind::Integer => match value {
                Value::Int(number) => Ok(Bson::Int64(*number)),
                Value::Float(number) if number.is_finite() => Ok(Bson::Int64(number.trunc() as i64)),
                Value::Bool(flag) => Ok(Bson::Int64(i64::from(*flag))),
                Value::String(text) => text
                    .trim()
                    .parse::<i64>()
                    .map(Bson::Int64)
                    .map_err(|_| self.type_error(value)),
                other => Err(self.type_error(other)),
            },
            FieldKind::Text => match value {
                Value::String(text) => Ok(Bson::String(text.clone())),
                Value::Int(number) => Ok(Bson::String(number.to_string())),
                Value::Float(number) => Ok(Bson::String(number.to_string())),
                Value::Bool(flag) => Ok(Bson::String(flag.to_string())),
                Value::Timestamp(time) => Ok(Bson::String(time.to_rfc3339())),
                other => Err(self.type_error(other)),
            },
            FieldKind::Timestamp => match value {
                Value::Timestamp(time) => Ok(Bson::DateTime(bson::DateTime::from_chrono(*time))),
                other => Err(self.type_error(other)),
            },
            FieldKind::Boolean => Ok(Bson::Boolean(value.is_truthy())),
            FieldKind::List => match value {
                Value::List(_) => value.to_bson(),
                other => Err(self.type_error(other)),
            },
            FieldKind::Map => match value {
                Value::Map(_) => value.to_bson(),
                other => Err(self.type_error(other)),
            },
            FieldKind::GeoPoint => match value {
                Value::GeoPoint(_) => value.to_bson(),
                other => Err(self.type_error(other)),
            },
            FieldKind::Reference(target) => match value {
                Value::Reference(instance) if instance.model().is_subtype_of(target) => {
                    Ok(Bson::String(instance.document_path()?.to_string()))
                }
                other => Err(self.type_error(other)),
            },
        }
    }

    /// Converts a stored value back into its native form.
    ///
    /// Malformed stored data fails with [`DocumentStoreError::InvalidDocument`]. Reference
    /// fields yield the raw document path as a string; resolving it is the materializer's job.
    pub fn to_native(&self, stored: Bson) -> DocumentStoreResult<Value> {
        if matches!(stored, Bson::Null | Bson::Undefined) {
            return Ok(Value::Null);
        }

        match self {
            FieldKind::Id => match stored {
                Bson::String(id) if id.is_empty() => Ok(Value::Null),
                Bson::String(id) => Ok(Value::String(id)),
                Bson::Int32(id) => Ok(Value::String(id.to_string())),
                Bson::Int64(id) => Ok(Value::String(id.to_string())),
                other => Err(self.invalid_stored(&other)),
            },
            FieldKind::Integer => match stored {
                Bson::Int32(number) => Ok(Value::Int(number as i64)),
                Bson::Int64(number) => Ok(Value::Int(number)),
                Bson::Double(number) if number.is_finite() => Ok(Value::Int(number.trunc() as i64)),
                Bson::Boolean(flag) => Ok(Value::Int(i64::from(flag))),
                Bson::String(ref text) => text.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    DocumentStoreError::InvalidDocument(format!(
                        "invalid literal for integer: '{text}'"
                    ))
                }),
                other => Err(self.invalid_stored(&other)),
            },
            FieldKind::Text => match stored {
                Bson::String(text) => Ok(Value::String(text)),
                other => Value::from_bson(other),
            },
            FieldKind::Timestamp => match stored {
                Bson::DateTime(time) => Ok(Value::Timestamp(time.to_chrono())),
                Bson::String(ref text) => DateTime::parse_from_rfc3339(text)
                    .map(|time| Value::Timestamp(time.with_timezone(&Utc)))
                    .map_err(|_| self.invalid_stored(&stored)),
                other => Err(self.invalid_stored(&other)),
            },
            FieldKind::Boolean => match stored {
                Bson::Boolean(flag) => Ok(Value::Bool(flag)),
                other => Ok(Value::Bool(Value::from_bson(other)?.is_truthy())),
            },
            FieldKind::List => match stored {
                Bson::Array(_) => Value::from_bson(stored),
                other => Err(self.invalid_stored(&other)),
            },
            FieldKind::Map => match stored {
                Bson::Document(_) => Value::from_bson(stored),
                other => Err(self.invalid_stored(&other)),
            },
            FieldKind::GeoPoint => {
                let point = stored
                    .as_document()
                    .and_then(|document| {
                        Some(GeoPoint::new(
                            number(document.get("latitude")?)?,
                            number(document.get("longitude")?)?,
                        ))
                    })
                    .ok_or_else(|| self.invalid_stored(&stored))?;

                Ok(Value::GeoPoint(point))
            }
            FieldKind::Reference(_) => match stored {
                Bson::String(path) if path.is_empty() => Ok(Value::Null),
                Bson::String(path) => Ok(Value::String(path)),
                other => Err(self.invalid_stored(&other)),
            },
        }
    }
}

fn number(bson: &Bson) -> Option<f64> {
    match bson {
        Bson::Double(value) => Some(*value),
        Bson::Int32(value) => Some(*value as f64),
        Bson::Int64(value) => Some(*value as f64),
        _ => None,
    }
}

/// A declared field: kind, options and, once bound to a model, its name and column.
///
/// ```ignore
/// let name = Field::text().max_length(40);
/// let active = Field::boolean().default(false).column_name("is_active");
/// let owner = Field::reference(&user).blank();
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    kind: FieldKind,
    name: String,
    model: String,
    column_name: Option<String>,
    blank: Option<bool>,
    default: Option<Value>,
    max_length: Option<usize>,
    option_errors: Vec<String>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            name: String::new(),
            model: String::new(),
            column_name: None,
            blank: None,
            default: None,
            max_length: None,
            option_errors: Vec::new(),
        }
    }

    /// Identifier field. Models receive one automatically; declaring it is rejected.
    pub fn id() -> Self {
        Self::new(FieldKind::Id)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldKind::Timestamp)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn list() -> Self {
        Self::new(FieldKind::List)
    }

    pub fn map() -> Self {
        Self::new(FieldKind::Map)
    }

    pub fn geo_point() -> Self {
        Self::new(FieldKind::GeoPoint)
    }

    pub fn reference(target: &Model) -> Self {
        Self::new(FieldKind::Reference(target.clone()))
    }

    pub fn blank(mut self) -> Self {
        self.blank = Some(true);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Stores the field under a different key in the backend document.
    pub fn column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    /// Sets an option by name. Unrecognized names are kept and reported when the field is
    /// registered or written.
    pub fn option(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match FieldOption::from_name(name) {
            Some(FieldOption::Blank) => self.blank = Some(value.is_truthy()),
            Some(FieldOption::Default) => self.default = Some(value),
            Some(FieldOption::MaxLength) => match value.as_i64().map(usize::try_from) {
                Some(Ok(max_length)) => self.max_length = Some(max_length),
                _ => self.option_errors.push(format!(
                    "attribute max_length of {} requires a non-negative integer, got {}",
                    self.kind.name(),
                    value.type_name()
                )),
            },
            None => self
                .option_errors
                .push(format!("attribute {name} not recognized")),
        }
        self
    }

    pub(crate) fn bind(&mut self, model: &str, name: &str) {
        self.model = model.to_string();
        self.name = name.to_string();
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the model that owns this descriptor.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Key the value is stored under in the backend document.
    pub fn column(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_blank(&self) -> bool {
        self.blank.unwrap_or(false)
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn max_length_value(&self) -> Option<usize> {
        self.max_length
    }

    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id)
    }

    pub fn reference_target(&self) -> Option<&Model> {
        match &self.kind {
            FieldKind::Reference(target) => Some(target),
            _ => None,
        }
    }

    /// Options this field was declared with.
    pub fn declared_options(&self) -> Vec<FieldOption> {
        [
            (FieldOption::Blank, self.blank.is_some()),
            (FieldOption::Default, self.default.is_some()),
            (FieldOption::MaxLength, self.max_length.is_some()),
        ]
        .into_iter()
        .filter_map(|(option, declared)| declared.then_some(option))
        .collect()
    }

    /// Fails on unknown options, malformed option values and options the kind disallows.
    pub fn check_options(&self) -> DocumentStoreResult<()> {
        if let Some(message) = self.option_errors.first() {
            return Err(DocumentStoreError::config(message.clone()));
        }

        match self
            .declared_options()
            .into_iter()
            .find(|option| !self.kind.allows(*option))
        {
            Some(option) => Err(DocumentStoreError::config(format!(
                "{} not allow attribute {}",
                self.kind.name(),
                option
            ))),
            None => Ok(()),
        }
    }

    /// Runs the attribute validator: option check, default, required, truncation.
    pub fn prepare(&self, value: Value) -> DocumentStoreResult<Value> {
        AttributeValidator::new(self).validate(value)
    }

    /// Validates `value` and converts it into its stored form.
    pub fn lookup_value(&self, value: Value) -> DocumentStoreResult<Bson> {
        let value = self.prepare(value)?;
        self.kind.to_stored(&value)
    }

    /// Validates `value` and returns both its canonical native form and its stored form.
    pub fn coerce(&self, value: Value) -> DocumentStoreResult<(Value, Bson)> {
        let value = self.prepare(value)?;
        let stored = self.kind.to_stored(&value)?;
        let native = match (&self.kind, value) {
            (FieldKind::Reference(_), value) => value,
            (_, Value::Null) => Value::Null,
            (kind, _) => kind.to_native(stored.clone())?,
        };

        Ok((native, stored))
    }

    pub fn to_stored(&self, value: &Value) -> DocumentStoreResult<Bson> {
        self.kind.to_stored(value)
    }

    pub fn to_native(&self, stored: Bson) -> DocumentStoreResult<Value> {
        self.kind.to_native(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelSchema;
    use crate::registry::Registry;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn named(field: Field, name: &str) -> Field {
        let mut field = field;
        field.bind("TestModel", name);
        field
    }

    #[test]
    fn column_name_defaults_to_field_name() {
        let field = named(Field::text(), "test_field");
        assert_eq!(field.column(), "test_field");

        let field = named(Field::text().column_name("testField"), "test_field");
        assert_eq!(field.column(), "testField");
    }

    #[test]
    fn id_field_stringifies() {
        let field = named(Field::id(), "id");

        assert_eq!(field.lookup_value(Value::from(10)).unwrap(), Bson::String("10".into()));
        assert_eq!(field.to_native(Bson::Int64(100)).unwrap(), Value::from("100"));
        assert_eq!(field.lookup_value(Value::Null).unwrap(), Bson::Null);
        assert!(matches!(
            field.lookup_value(Value::from(true)),
            Err(DocumentStoreError::ValueType(..))
        ));
    }

    #[test]
    fn identifiers_cannot_contain_the_path_separator() {
        let field = named(Field::id(), "id");

        assert!(matches!(
            field.lookup_value(Value::from("a/b")),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert_eq!(field.lookup_value(Value::from("a-b")).unwrap(), Bson::String("a-b".into()));
    }

    #[test]
    fn integer_field_rejects_disallowed_option() {
        let field = named(
            Field::integer().column_name("iField").max_length(100).default(0),
            "integer_field",
        );

        let err = field.lookup_value(Value::Null).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Configuration error: IntegerField not allow attribute max_length"
        );
    }

    #[test]
    fn integer_field_requires_value_without_blank_or_default() {
        let field = named(Field::integer(), "integer_field");

        let err = field.lookup_value(Value::Null).unwrap_err();

        assert!(matches!(err, DocumentStoreError::RequiredValue(ref name) if name == "integer_field"));
        assert_eq!(err.to_string(), "Field integer_field required value");
    }

    #[test]
    fn integer_field_coerces_and_defaults() {
        let blank = named(Field::integer().blank(), "integer_field");
        assert_eq!(blank.lookup_value(Value::Null).unwrap(), Bson::Null);

        let defaulted = named(Field::integer().default(100), "integer_field");
        assert_eq!(defaulted.lookup_value(Value::Null).unwrap(), Bson::Int64(100));
        assert_eq!(defaulted.lookup_value(Value::from("42")).unwrap(), Bson::Int64(42));
        assert_eq!(defaulted.lookup_value(Value::from(3.9)).unwrap(), Bson::Int64(3));

        let bad_default = named(Field::integer().default("Not Allowed"), "integer_field");
        let err = bad_default.lookup_value(Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "IntegerField required value type int, got string");
    }

    #[test]
    fn integer_field_propagates_malformed_stored_data() {
        let field = named(Field::integer(), "integer_field");

        assert_eq!(field.to_native(Bson::Int32(100)).unwrap(), Value::Int(100));

        let err = field.to_native(Bson::String("AAAAA".into())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid document: invalid literal for integer: 'AAAAA'"
        );
    }

    #[test]
    fn text_field_truncates_from_the_start() {
        let field = named(Field::text().max_length(5).default("0".repeat(6)), "text_field");

        assert_eq!(field.lookup_value(Value::Null).unwrap(), Bson::String("00000".into()));
        assert_eq!(
            field.lookup_value(Value::from("a".repeat(20))).unwrap(),
            Bson::String("aaaaa".into())
        );
        assert_eq!(
            field.lookup_value(Value::from("Too long text for this f...")).unwrap(),
            Bson::String("Too l".into())
        );
    }

    #[test]
    fn text_field_stringifies_scalars() {
        let field = named(Field::text(), "text_field");

        assert_eq!(field.lookup_value(Value::from(12)).unwrap(), Bson::String("12".into()));
        assert!(field.lookup_value(Value::List(vec![])).is_err());
    }

    #[test]
    fn timestamp_field_requires_date_time() {
        let field = named(Field::timestamp(), "created");
        let now = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();

        let stored = field.lookup_value(Value::from(now)).unwrap();
        assert_eq!(stored, Bson::DateTime(bson::DateTime::from_chrono(now)));
        assert_eq!(field.to_native(stored).unwrap(), Value::Timestamp(now));

        let err = field.lookup_value(Value::from("2021-03-04")).unwrap_err();
        assert_eq!(err.to_string(), "TimestampField required value type timestamp, got string");
    }

    #[test]
    fn boolean_field_uses_truthiness() {
        let field = named(Field::boolean().blank(), "active");

        assert_eq!(field.lookup_value(Value::from(1)).unwrap(), Bson::Boolean(true));
        assert_eq!(field.lookup_value(Value::from("")).unwrap(), Bson::Boolean(false));
        assert_eq!(field.lookup_value(Value::List(vec![])).unwrap(), Bson::Boolean(false));
        assert_eq!(field.to_native(Bson::Boolean(true)).unwrap(), Value::Bool(true));
    }

    #[test]
    fn list_and_map_fields_check_shape() {
        let list = named(Field::list(), "list_f");
        let map = named(Field::map(), "map_f");

        assert!(matches!(
            list.lookup_value(Value::from("abc")),
            Err(DocumentStoreError::ValueType(..))
        ));
        assert!(matches!(
            map.lookup_value(Value::from(vec![1])),
            Err(DocumentStoreError::ValueType(..))
        ));

        let mut entries = BTreeMap::new();
        entries.insert("key".to_string(), Value::from("val"));
        assert_eq!(
            map.lookup_value(Value::Map(entries)).unwrap(),
            Bson::Document(bson::doc! { "key": "val" })
        );
    }

    #[test]
    fn list_field_ignores_max_length_it_does_not_allow() {
        let list = named(Field::list().option("max_length", 2), "list_f");

        assert_eq!(
            list.lookup_value(Value::from(vec![1, 2, 3])).unwrap_err().to_string(),
            "Configuration error: ListField not allow attribute max_length"
        );
    }

    #[test]
    fn unknown_option_is_reported() {
        let field = named(Field::text().option("unique", true), "name");

        assert_eq!(
            field.check_options().unwrap_err().to_string(),
            "Configuration error: attribute unique not recognized"
        );
    }

    #[test]
    fn geo_point_field_round_trips() {
        let field = named(Field::geo_point(), "location");
        let point = Value::GeoPoint(GeoPoint::new(52.52, 13.405));

        let stored = field.lookup_value(point.clone()).unwrap();

        assert_eq!(field.to_native(stored).unwrap(), point);
        assert!(field.to_native(Bson::String("52,13".into())).is_err());
        assert!(field.lookup_value(Value::from(vec![52.52, 13.405])).is_err());
    }

    #[test]
    fn every_kind_round_trips_valid_values() {
        let mut entries = BTreeMap::new();
        entries.insert("nested".to_string(), Value::from(vec!["a", "b"]));
        let cases = vec![
            (Field::id(), Value::from("7f3c")),
            (Field::integer(), Value::from(-12)),
            (Field::text(), Value::from("hello")),
            (
                Field::timestamp(),
                Value::from(Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap()),
            ),
            (Field::boolean(), Value::from(false)),
            (Field::list(), Value::from(vec![Value::from(1), Value::from("two")])),
            (Field::map(), Value::Map(entries)),
            (Field::geo_point(), Value::GeoPoint(GeoPoint::new(-33.9, 151.2))),
        ];

        for (field, value) in cases {
            let field = named(field, "f");
            let stored = field.to_stored(&value).unwrap();
            assert_eq!(field.to_native(stored).unwrap(), value, "{}", field.kind().name());
        }
    }

    #[test]
    fn reference_field_checks_target_type() {
        let registry = Registry::new();
        let base = registry
            .register(ModelSchema::builder("Animal").abstract_model(true))
            .unwrap();
        let dog = registry
            .register(ModelSchema::builder("Dog").extends(&base))
            .unwrap();
        let car = registry.register(ModelSchema::builder("Car")).unwrap();

        let field = named(Field::reference(&base), "pet");

        let mut rex = dog.new_instance(crate::fields! {}).unwrap();
        rex.set("id", "rex").unwrap();
        assert_eq!(
            field.lookup_value(Value::from(&rex)).unwrap(),
            Bson::String("dog/rex".into())
        );

        let mut herbie = car.new_instance(crate::fields! {}).unwrap();
        herbie.set("id", "herbie").unwrap();
        let err = field.lookup_value(Value::from(&herbie)).unwrap_err();
        assert_eq!(err.to_string(), "ReferenceField required value type Animal, got Car");

        assert_eq!(
            field.to_native(Bson::String("dog/rex".into())).unwrap(),
            Value::from("dog/rex")
        );
    }
}
