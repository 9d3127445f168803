//! Input schema synthesis for tool parameter types.
//!
//! Parameter types derive [`schemars::JsonSchema`]; the derived schema is
//! generated fully inlined and then normalised into the document advertised
//! in `tools/list`:
//!
//! - `type` is `"object"` with one property per field
//! - field descriptions come from doc comments (or `#[schemars(description = "...")]`)
//! - every property is listed in `required`, whatever its actual optionality,
//!   in nested records as well as at the top level
//!
//! Types that recurse below the root cannot be inlined; their definitions stay
//! under `$defs` so that every `$ref` in the document resolves.
//!
//! Parameter types that are not records (primitives, maps, sequences) get the
//! permissive fallback `{"type": "object", "properties": {}}`. The registry
//! rejects such types before they are ever advertised; see
//! [`ParameterShape::is_record`].

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{json, Map, Value};

use crate::error::SchemaGenerationError;

/// The machine type of a single parameter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Floating point or arbitrary JSON number.
    Number,
    /// Integer number.
    Integer,
    /// String.
    String,
    /// Boolean.
    Boolean,
    /// Nested object.
    Object,
    /// Sequence.
    Array,
    /// Only `null` is accepted.
    Null,
    /// Anything else (unions, enums of mixed type, untyped values).
    Any,
}

impl FieldKind {
    fn from_type_name(name: &str) -> Self {
        match name {
            "number" => Self::Number,
            "integer" => Self::Integer,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "null" => Self::Null,
            _ => Self::Any,
        }
    }

    /// Reads the kind from a property schema.
    ///
    /// `["number", "null"]` (an `Option<f64>` field) counts as `Number`.
    fn from_schema(schema: &Value) -> Self {
        match schema.get("type") {
            Some(Value::String(name)) => Self::from_type_name(name),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .find(|name| *name != "null")
                .map_or(Self::Null, Self::from_type_name),
            _ => Self::Any,
        }
    }
}

/// One field of a parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldShape {
    /// Field name as it appears on the wire.
    pub name: String,
    /// Machine type of the field.
    pub kind: FieldKind,
    /// Description taken from the field's documentation.
    pub description: Option<String>,
}

/// Structural description of a handler's parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterShape {
    type_name: String,
    record: bool,
    fields: Vec<FieldShape>,
}

impl ParameterShape {
    /// Name of the parameter type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    /// Looks up a field by wire name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldShape> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the type is a record (a struct with named fields).
    #[must_use]
    pub const fn is_record(&self) -> bool {
        self.record
    }
}

/// Shape and input schema of a parameter type, produced by one introspection pass.
#[derive(Debug, Clone)]
pub struct Introspection {
    /// Structural description of the type.
    pub shape: ParameterShape,
    /// Normalised input schema document.
    pub schema: Value,
}

/// Introspects `P` once, producing both its shape and its input schema.
///
/// # Errors
///
/// Returns [`SchemaGenerationError`] if the generated schema cannot be
/// converted into a JSON document.
pub fn introspect<P: JsonSchema>() -> Result<Introspection, SchemaGenerationError> {
    let type_name = P::schema_name().to_string();
    let document = generate::<P>(&type_name)?;

    let record = is_record(&document);
    let shape = ParameterShape {
        fields: if record { field_shapes(&document) } else { Vec::new() },
        type_name,
        record,
    };
    let schema = if record {
        normalise(document)
    } else {
        fallback_schema()
    };

    Ok(Introspection { shape, schema })
}

/// Synthesises the input schema for `P`.
///
/// # Errors
///
/// Returns [`SchemaGenerationError`] if the generated schema cannot be
/// converted into a JSON document.
pub fn synthesize<P: JsonSchema>() -> Result<Value, SchemaGenerationError> {
    introspect::<P>().map(|i| i.schema)
}

/// Describes the structure of `P`.
///
/// # Errors
///
/// Returns [`SchemaGenerationError`] if the generated schema cannot be
/// converted into a JSON document.
pub fn describe<P: JsonSchema>() -> Result<ParameterShape, SchemaGenerationError> {
    introspect::<P>().map(|i| i.shape)
}

/// Generates the raw, fully inlined schema object for `P`.
fn generate<P: JsonSchema>(type_name: &str) -> Result<Map<String, Value>, SchemaGenerationError> {
    let generator = SchemaSettings::draft2020_12()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    let schema = generator.into_root_schema_for::<P>();

    let value = serde_json::to_value(&schema).map_err(|source| SchemaGenerationError {
        type_name: type_name.to_string(),
        source,
    })?;

    // Boolean schemas (`true`/`false`) carry no structure.
    Ok(match value {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

fn is_record(document: &Map<String, Value>) -> bool {
    let is_object = document.get("type").and_then(Value::as_str) == Some("object");
    let has_properties = document.get("properties").is_some_and(Value::is_object);
    // Maps describe their values through `additionalProperties` instead of named fields.
    let open_map = document
        .get("additionalProperties")
        .is_some_and(|v| v != &Value::Bool(false));
    is_object && (has_properties || !open_map)
}

fn field_shapes(document: &Map<String, Value>) -> Vec<FieldShape> {
    let Some(properties) = document.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, schema)| FieldShape {
            name: name.clone(),
            kind: FieldKind::from_schema(schema),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

/// Strips generator metadata and marks every property as required.
fn normalise(mut document: Map<String, Value>) -> Value {
    document.remove("$schema");
    document
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));

    require_all(&mut document);

    let defs_referenced = document
        .iter()
        .any(|(key, value)| key != "$defs" && references_defs(value));
    if !defs_referenced {
        document.remove("$defs");
    }

    Value::Object(document)
}

/// Lists every property of `schema` and of its subschemas in `required`.
fn require_all(schema: &mut Map<String, Value>) {
    if let Some(Value::Object(properties)) = schema.get_mut("properties") {
        for property in properties.values_mut() {
            if let Value::Object(property) = property {
                require_all(property);
            }
        }
        let required: Vec<Value> = properties.keys().cloned().map(Value::String).collect();
        schema.insert("required".to_string(), Value::Array(required));
    }

    for key in ["items", "additionalProperties", "not"] {
        if let Some(Value::Object(sub)) = schema.get_mut(key) {
            require_all(sub);
        }
    }

    for key in ["anyOf", "oneOf", "allOf", "prefixItems"] {
        if let Some(Value::Array(subs)) = schema.get_mut(key) {
            for sub in subs.iter_mut().filter_map(Value::as_object_mut) {
                require_all(sub);
            }
        }
    }

    if let Some(Value::Object(defs)) = schema.get_mut("$defs") {
        for def in defs.values_mut().filter_map(Value::as_object_mut) {
            require_all(def);
        }
    }
}

/// Whether `value` contains a `$ref` into `$defs`.
fn references_defs(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, value)| {
            (key == "$ref" && value.as_str().is_some_and(|r| r.starts_with("#/$defs/")))
                || references_defs(value)
        }),
        Value::Array(items) => items.iter().any(references_defs),
        _ => false,
    }
}

fn fallback_schema() -> Value {
    json!({"type": "object", "properties": {}})
}
