//! Purpose: Decode a JSON document into a runtime value conforming to a message descriptor.
//! Exports: `decode_document`, `decode_message`, `DynamicMessage`, `DynamicValue`, `MapKey`.
//! Role: Schema-interpreted decoder; one generic recursive walk keyed on field kinds.
//! Invariants: Strict and total; the first violation aborts with one error and a JSON field path.
//! Invariants: Unknown JSON keys fail; at most one member per oneof group may be populated.
//! Invariants: 64-bit integers are accepted only in their string encoding.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::{
    STANDARD as BASE64_STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD,
};
use serde_json::Value;
use tracing::debug;

use crate::core::ast::ScalarKind;
use crate::core::descriptor::{
    DescriptorGraph, FieldDescriptor, FieldKind, MessageDescriptor, TypeId,
};
use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub enum DynamicValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Enum fields store the number; the symbol is recovered via the descriptor.
    Enum(i32),
    Message(DynamicMessage),
    List(Vec<DynamicValue>),
    Map(BTreeMap<MapKey, DynamicValue>),
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DynamicMessage {
    pub type_id: TypeId,
    /// Populated fields, keyed by field number.
    pub fields: BTreeMap<u32, DynamicValue>,
    /// Which member (by field number) is set per oneof group index.
    pub oneofs: BTreeMap<usize, u32>,
}

/// Decode a JSON document (text) against a message descriptor.
pub fn decode_document(
    graph: &DescriptorGraph,
    message: &MessageDescriptor,
    text: &str,
) -> Result<DynamicMessage, Error> {
    let value: Value = serde_json::from_str(text).map_err(|err| {
        let (line, column) = (err.line() as u32, err.column() as u32);
        Error::new(ErrorKind::Parse)
            .with_message("document is not valid JSON")
            .with_line_col(line, column)
            .with_source(err)
    })?;
    decode_message(graph, message, &value)
}

/// Decode an already-parsed JSON value against a message descriptor.
pub fn decode_message(
    graph: &DescriptorGraph,
    message: &MessageDescriptor,
    value: &Value,
) -> Result<DynamicMessage, Error> {
    debug!(message = %message.full_name, "decoding document");
    Decoder {
        graph,
        path: Vec::new(),
    }
    .message(message, value)
}

struct Decoder<'a> {
    graph: &'a DescriptorGraph,
    path: Vec<PathSegment>,
}

enum PathSegment {
    Field(String),
    Index(usize),
    Key(String),
}

impl Decoder<'_> {
    fn message(
        &mut self,
        descriptor: &MessageDescriptor,
        value: &Value,
    ) -> Result<DynamicMessage, Error> {
        let Value::Object(entries) = value else {
            return Err(self.fail(
                ErrorKind::Shape,
                format!(
                    "expected a JSON object for message `{}`, found {}",
                    descriptor.full_name,
                    json_shape(value)
                ),
            ));
        };

        let type_id = self
            .graph
            .lookup(&descriptor.full_name)
            .ok_or_else(|| {
                Error::new(ErrorKind::Internal)
                    .with_message(format!("descriptor `{}` not in graph", descriptor.full_name))
            })?;
        let mut decoded = DynamicMessage {
            type_id,
            fields: BTreeMap::new(),
            oneofs: BTreeMap::new(),
        };

        for (key, entry) in entries {
            let Some(field) = descriptor.field_by_json_key(key) else {
                self.path.push(PathSegment::Field(key.clone()));
                return Err(self.fail(
                    ErrorKind::UnknownField,
                    format!(
                        "message `{}` has no field named `{key}`",
                        descriptor.full_name
                    ),
                ));
            };

            // null means "field unset" and never occupies a oneof slot.
            if entry.is_null() {
                continue;
            }

            self.path.push(PathSegment::Field(key.clone()));
            if let Some(group) = field.oneof {
                if let Some(&previous) = decoded.oneofs.get(&group) {
                    let group_name = descriptor
                        .oneofs
                        .get(group)
                        .map(String::as_str)
                        .unwrap_or("?");
                    let previous_name = descriptor
                        .field_by_number(previous)
                        .map(|field| field.name.as_str())
                        .unwrap_or("?");
                    return Err(self.fail(
                        ErrorKind::OneofConflict,
                        format!(
                            "oneof `{group_name}` of `{}` has multiple fields set: `{previous_name}` and `{}`",
                            descriptor.full_name, field.name
                        ),
                    ));
                }
                decoded.oneofs.insert(group, field.number);
            }

            let decoded_value = self.field(field, entry)?;
            decoded.fields.insert(field.number, decoded_value);
            self.path.pop();
        }

        Ok(decoded)
    }

    fn field(&mut self, field: &FieldDescriptor, value: &Value) -> Result<DynamicValue, Error> {
        if field.is_map(self.graph) {
            return self.map_field(field, value);
        }
        if field.repeated {
            let Value::Array(items) = value else {
                return Err(self.fail(
                    ErrorKind::TypeMismatch,
                    format!(
                        "repeated field `{}` requires a JSON array, found {}",
                        field.name,
                        json_shape(value)
                    ),
                ));
            };
            let mut list = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                self.path.push(PathSegment::Index(index));
                if item.is_null() {
                    return Err(self.fail(
                        ErrorKind::TypeMismatch,
                        format!("repeated field `{}` may not contain null", field.name),
                    ));
                }
                list.push(self.single(field.kind, item)?);
                self.path.pop();
            }
            return Ok(DynamicValue::List(list));
        }
        self.single(field.kind, value)
    }

    fn map_field(&mut self, field: &FieldDescriptor, value: &Value) -> Result<DynamicValue, Error> {
        let FieldKind::Message(entry_id) = field.kind else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!("map field `{}` lacks an entry message", field.name)));
        };
        let graph = self.graph;
        let entry = graph.message_by_id(entry_id);
        let (Some(key_field), Some(value_field)) =
            (entry.field_by_number(1), entry.field_by_number(2))
        else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!("malformed map entry `{}`", entry.full_name)));
        };
        let FieldKind::Scalar(key_kind) = key_field.kind else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message(format!("non-scalar map key in `{}`", entry.full_name)));
        };

        let Value::Object(entries) = value else {
            return Err(self.fail(
                ErrorKind::TypeMismatch,
                format!(
                    "map field `{}` requires a JSON object, found {}",
                    field.name,
                    json_shape(value)
                ),
            ));
        };

        let mut map = BTreeMap::new();
        for (key_text, entry_value) in entries {
            self.path.push(PathSegment::Key(key_text.clone()));
            let key = self.map_key(key_kind, key_text)?;
            let value = self.single(value_field.kind, entry_value)?;
            map.insert(key, value);
            self.path.pop();
        }
        Ok(DynamicValue::Map(map))
    }

    /// Map keys are always JSON strings; numeric and bool key kinds are
    /// parsed from the string form, per protobuf's map JSON convention.
    fn map_key(&self, kind: ScalarKind, text: &str) -> Result<MapKey, Error> {
        Ok(match kind {
            ScalarKind::Bool => match text {
                "true" => MapKey::Bool(true),
                "false" => MapKey::Bool(false),
                _ => {
                    return Err(self.fail(
                        ErrorKind::TypeMismatch,
                        format!("map key `{text}` is not `true` or `false`"),
                    ));
                }
            },
            ScalarKind::String => MapKey::String(text.to_string()),
            ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
                MapKey::I32(self.integer_from_text(text, "int32")?)
            }
            ScalarKind::Uint32 | ScalarKind::Fixed32 => {
                MapKey::U32(self.integer_from_text(text, "uint32")?)
            }
            ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => {
                MapKey::I64(self.integer_from_text(text, "int64")?)
            }
            ScalarKind::Uint64 | ScalarKind::Fixed64 => {
                MapKey::U64(self.integer_from_text(text, "uint64")?)
            }
            ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes => {
                return Err(Error::new(ErrorKind::Internal)
                    .with_message(format!("`{}` is not a valid map key kind", kind.keyword())));
            }
        })
    }

    fn single(&mut self, kind: FieldKind, value: &Value) -> Result<DynamicValue, Error> {
        match kind {
            FieldKind::Scalar(scalar) => self.scalar(scalar, value),
            FieldKind::Message(id) => {
                let graph = self.graph;
                let descriptor = graph.message_by_id(id);
                Ok(DynamicValue::Message(self.message(descriptor, value)?))
            }
            FieldKind::Enum(id) => {
                let descriptor = self.graph.enum_by_id(id);
                match value {
                    Value::String(name) => match descriptor.number_for(name) {
                        Some(number) => Ok(DynamicValue::Enum(number)),
                        None => Err(self.fail(
                            ErrorKind::UnknownEnumValue,
                            format!(
                                "enum `{}` has no value named `{name}`",
                                descriptor.full_name
                            ),
                        )),
                    },
                    Value::Number(_) => {
                        // Unknown numbers are kept, matching protobuf's
                        // open-enum semantics; only symbols are checked.
                        let number = self.json_i64(value, "enum")?;
                        let number = i32::try_from(number).map_err(|_| {
                            self.fail(
                                ErrorKind::Range,
                                format!(
                                    "enum value {number} out of range for `{}`",
                                    descriptor.full_name
                                ),
                            )
                        })?;
                        Ok(DynamicValue::Enum(number))
                    }
                    other => Err(self.fail(
                        ErrorKind::TypeMismatch,
                        format!(
                            "enum `{}` requires a string or integer, found {}",
                            descriptor.full_name,
                            json_shape(other)
                        ),
                    )),
                }
            }
        }
    }

    fn scalar(&self, kind: ScalarKind, value: &Value) -> Result<DynamicValue, Error> {
        match kind {
            ScalarKind::Bool => match value {
                Value::Bool(b) => Ok(DynamicValue::Bool(*b)),
                other => Err(self.type_mismatch("bool", "a JSON boolean", other)),
            },
            ScalarKind::String => match value {
                Value::String(text) => Ok(DynamicValue::String(text.clone())),
                other => Err(self.type_mismatch("string", "a JSON string", other)),
            },
            ScalarKind::Bytes => match value {
                Value::String(text) => Ok(DynamicValue::Bytes(self.base64(text)?)),
                other => Err(self.type_mismatch("bytes", "a base64 JSON string", other)),
            },
            ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
                let wide = self.json_i64(value, kind.keyword())?;
                let narrow = i32::try_from(wide).map_err(|_| {
                    self.fail(
                        ErrorKind::Range,
                        format!("value {wide} out of range for {}", kind.keyword()),
                    )
                })?;
                Ok(DynamicValue::I32(narrow))
            }
            ScalarKind::Uint32 | ScalarKind::Fixed32 => {
                let wide = self.json_i64(value, kind.keyword())?;
                let narrow = u32::try_from(wide).map_err(|_| {
                    self.fail(
                        ErrorKind::Range,
                        format!("value {wide} out of range for {}", kind.keyword()),
                    )
                })?;
                Ok(DynamicValue::U32(narrow))
            }
            ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => match value {
                Value::String(text) => Ok(DynamicValue::I64(
                    self.integer_from_text(text, kind.keyword())?,
                )),
                other => Err(self.int64_shape_mismatch(kind, other)),
            },
            ScalarKind::Uint64 | ScalarKind::Fixed64 => match value {
                Value::String(text) => Ok(DynamicValue::U64(
                    self.integer_from_text(text, kind.keyword())?,
                )),
                other => Err(self.int64_shape_mismatch(kind, other)),
            },
            ScalarKind::Double => Ok(DynamicValue::F64(self.json_float(value, "double")?)),
            ScalarKind::Float => {
                let wide = self.json_float(value, "float")?;
                if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
                    return Err(self.fail(
                        ErrorKind::Range,
                        format!("value {wide} out of range for float"),
                    ));
                }
                Ok(DynamicValue::F32(wide as f32))
            }
        }
    }

    /// 32-bit kinds accept JSON numbers with an integral value.
    fn json_i64(&self, value: &Value, kind: &str) -> Result<i64, Error> {
        let Value::Number(number) = value else {
            return Err(self.type_mismatch(kind, "a JSON number", value));
        };
        if let Some(int) = number.as_i64() {
            return Ok(int);
        }
        if number.as_u64().is_some() {
            // Over i64::MAX; 32-bit range checks will reject it anyway.
            return Err(self.fail(
                ErrorKind::Range,
                format!("value {number} out of range for {kind}"),
            ));
        }
        let float = number.as_f64().unwrap_or(f64::NAN);
        if float.fract() != 0.0 || !float.is_finite() {
            return Err(self.fail(
                ErrorKind::TypeMismatch,
                format!("{kind} requires an integral JSON number, found {number}"),
            ));
        }
        if float < i64::MIN as f64 || float > i64::MAX as f64 {
            return Err(self.fail(
                ErrorKind::Range,
                format!("value {number} out of range for {kind}"),
            ));
        }
        Ok(float as i64)
    }

    fn json_float(&self, value: &Value, kind: &str) -> Result<f64, Error> {
        match value {
            Value::Number(number) => Ok(number.as_f64().unwrap_or(f64::NAN)),
            // The canonical mapping spells non-finite floats as strings.
            Value::String(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => Err(self.fail(
                    ErrorKind::TypeMismatch,
                    format!(
                        "{kind} accepts only \"NaN\", \"Infinity\", or \"-Infinity\" as strings"
                    ),
                )),
            },
            other => Err(self.type_mismatch(kind, "a JSON number", other)),
        }
    }

    /// Parse a decimal integer from its string encoding. Non-numeric text is
    /// a type mismatch; numeric text that overflows the target is a range error.
    fn integer_from_text<T: std::str::FromStr>(&self, text: &str, kind: &str) -> Result<T, Error> {
        match text.parse::<T>() {
            Ok(value) => Ok(value),
            Err(_) => {
                let body = text.strip_prefix('-').unwrap_or(text);
                if !body.is_empty() && body.bytes().all(|byte| byte.is_ascii_digit()) {
                    Err(self.fail(
                        ErrorKind::Range,
                        format!("value {text} out of range for {kind}"),
                    ))
                } else {
                    Err(self.fail(
                        ErrorKind::TypeMismatch,
                        format!("`{text}` is not a decimal {kind}"),
                    ))
                }
            }
        }
    }

    fn base64(&self, text: &str) -> Result<Vec<u8>, Error> {
        // Both alphabets, padded or not, per the JSON mapping's leniency.
        for engine in [
            &BASE64_STANDARD,
            &URL_SAFE,
            &STANDARD_NO_PAD,
            &URL_SAFE_NO_PAD,
        ] {
            if let Ok(bytes) = engine.decode(text) {
                return Ok(bytes);
            }
        }
        Err(self.fail(
            ErrorKind::Encoding,
            "bytes field is not valid base64".to_string(),
        ))
    }

    fn int64_shape_mismatch(&self, kind: ScalarKind, found: &Value) -> Error {
        self.fail(
            ErrorKind::TypeMismatch,
            format!(
                "{} requires a string-encoded integer (e.g. \"42\"), found {}",
                kind.keyword(),
                json_shape(found)
            ),
        )
    }

    fn type_mismatch(&self, kind: &str, wanted: &str, found: &Value) -> Error {
        self.fail(
            ErrorKind::TypeMismatch,
            format!("{kind} requires {wanted}, found {}", json_shape(found)),
        )
    }

    fn fail(&self, kind: ErrorKind, message: String) -> Error {
        let err = Error::new(kind).with_message(message);
        if self.path.is_empty() {
            return err;
        }
        err.with_field_path(self.render_path())
    }

    fn render_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
                PathSegment::Key(key) => {
                    out.push_str(&format!("[{}]", serde_json::Value::from(key.as_str())));
                }
            }
        }
        out
    }
}

impl DynamicMessage {
    /// Re-encode into protobuf's canonical JSON: JSON names as keys, 64-bit
    /// integers as strings, bytes as standard base64, enums by symbol where
    /// one exists.
    pub fn to_canonical_json(&self, graph: &DescriptorGraph) -> Value {
        let descriptor = graph.message_by_id(self.type_id);
        let mut out = serde_json::Map::new();
        for (number, value) in &self.fields {
            let Some(field) = descriptor.field_by_number(*number) else {
                continue;
            };
            out.insert(
                field.json_name.clone(),
                encode_value(graph, field.kind, value),
            );
        }
        Value::Object(out)
    }
}

fn encode_value(graph: &DescriptorGraph, kind: FieldKind, value: &DynamicValue) -> Value {
    match value {
        DynamicValue::Bool(b) => Value::Bool(*b),
        DynamicValue::I32(n) => Value::from(*n),
        DynamicValue::U32(n) => Value::from(*n),
        DynamicValue::I64(n) => Value::String(n.to_string()),
        DynamicValue::U64(n) => Value::String(n.to_string()),
        DynamicValue::F32(n) => encode_float(f64::from(*n)),
        DynamicValue::F64(n) => encode_float(*n),
        DynamicValue::String(text) => Value::String(text.clone()),
        DynamicValue::Bytes(bytes) => Value::String(BASE64_STANDARD.encode(bytes)),
        DynamicValue::Enum(number) => {
            if let FieldKind::Enum(id) = kind
                && let Some(name) = graph.enum_by_id(id).name_for(*number)
            {
                Value::String(name.to_string())
            } else {
                Value::from(*number)
            }
        }
        DynamicValue::Message(message) => message.to_canonical_json(graph),
        DynamicValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| encode_value(graph, kind, item))
                .collect(),
        ),
        DynamicValue::Map(entries) => {
            let value_kind = map_value_kind(graph, kind);
            let mut out = serde_json::Map::new();
            for (key, entry) in entries {
                out.insert(map_key_text(key), encode_value(graph, value_kind, entry));
            }
            Value::Object(out)
        }
    }
}

fn map_value_kind(graph: &DescriptorGraph, kind: FieldKind) -> FieldKind {
    if let FieldKind::Message(id) = kind
        && let Some(value_field) = graph.message_by_id(id).field_by_number(2)
    {
        return value_field.kind;
    }
    kind
}

fn map_key_text(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(text) => text.clone(),
    }
}

fn encode_float(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".to_string())
    } else if value == f64::INFINITY {
        Value::String("Infinity".to_string())
    } else if value == f64::NEG_INFINITY {
        Value::String("-Infinity".to_string())
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
