//! Purpose: Bind the parsed AST forest into one immutable, cross-file-linked descriptor graph.
//! Exports: `DescriptorGraph`, `TypeDescriptor`, `MessageDescriptor`, `EnumDescriptor`,
//! `FieldDescriptor`, `FieldKind`, `TypeId`.
//! Role: Arena of type descriptors addressed by index, with a fully-qualified-name table.
//! Invariants: No dangling references; every field's declared type resolves or building fails.
//! Invariants: The graph is built once per run and shared read-only by the decoder.

use std::collections::HashMap;

use crate::core::ast::{
    FieldDecl, Label, MessageDecl, ScalarKind, SourceUnit, TypeDecl, TypeRef, default_json_name,
};
use crate::core::error::{Error, ErrorKind};

pub type TypeId = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescriptor {
    Message(MessageDescriptor),
    Enum(EnumDescriptor),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageDescriptor {
    pub full_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub oneofs: Vec<String>,
    /// Synthetic key/value entry message backing a `map<K, V>` field.
    pub is_map_entry: bool,
}

impl MessageDescriptor {
    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.number == number)
    }

    /// Look up a field by proto name or JSON name (both spellings accepted,
    /// per protobuf's JSON mapping).
    pub fn field_by_json_key(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.name == key || field.json_name == key)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDescriptor {
    pub full_name: String,
    pub values: Vec<(String, i32)>,
}

impl EnumDescriptor {
    pub fn number_for(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(value_name, _)| value_name == name)
            .map(|(_, number)| *number)
    }

    pub fn name_for(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, value_number)| *value_number == number)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Message(TypeId),
    Enum(TypeId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub json_name: String,
    pub number: u32,
    pub repeated: bool,
    pub kind: FieldKind,
    /// Index into the owning message's `oneofs`.
    pub oneof: Option<usize>,
}

impl FieldDescriptor {
    /// True when the field is a `map<K, V>` (a repeated synthetic entry message).
    pub fn is_map(&self, graph: &DescriptorGraph) -> bool {
        self.repeated
            && matches!(
                self.kind,
                FieldKind::Message(id) if matches!(
                    graph.get(id),
                    TypeDescriptor::Message(entry) if entry.is_map_entry
                )
            )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DescriptorGraph {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
}

impl DescriptorGraph {
    pub fn build(units: &[SourceUnit]) -> Result<Self, Error> {
        Builder::default().build(units)
    }

    pub fn get(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id]
    }

    pub fn lookup(&self, full_name: &str) -> Option<TypeId> {
        self.by_name.get(full_name.trim_start_matches('.')).copied()
    }

    /// Exact fully-qualified message lookup; no fuzzy matching.
    pub fn message(&self, full_name: &str) -> Option<&MessageDescriptor> {
        match self.lookup(full_name).map(|id| self.get(id)) {
            Some(TypeDescriptor::Message(message)) => Some(message),
            _ => None,
        }
    }

    pub fn message_by_id(&self, id: TypeId) -> &MessageDescriptor {
        match self.get(id) {
            TypeDescriptor::Message(message) => message,
            TypeDescriptor::Enum(decl) => {
                unreachable!("type id for `{}` is not a message", decl.full_name)
            }
        }
    }

    pub fn enum_by_id(&self, id: TypeId) -> &EnumDescriptor {
        match self.get(id) {
            TypeDescriptor::Enum(decl) => decl,
            TypeDescriptor::Message(message) => {
                unreachable!("type id for `{}` is not an enum", message.full_name)
            }
        }
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }
}

/// One message or enum awaiting field binding, with enough scope context to
/// resolve relative type references.
struct Pending {
    id: TypeId,
    full_name: String,
    package: Option<String>,
    decl: PendingDecl,
}

enum PendingDecl {
    Message {
        fields: Vec<FieldDecl>,
        oneofs: Vec<String>,
        is_map_entry: bool,
    },
    Enum,
}

#[derive(Default)]
struct Builder {
    types: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
    declared_in: HashMap<String, String>,
    packages: Vec<String>,
    pending: Vec<Pending>,
}

impl Builder {
    fn build(mut self, units: &[SourceUnit]) -> Result<DescriptorGraph, Error> {
        for unit in units {
            if let Some(package) = &unit.package
                && !self.packages.contains(package)
            {
                self.packages.push(package.clone());
            }
        }
        self.packages.sort();

        for unit in units {
            let prefix = unit.package.clone().unwrap_or_default();
            for decl in &unit.types {
                self.register(decl, &prefix, unit)?;
            }
        }

        let pending = std::mem::take(&mut self.pending);
        for entry in &pending {
            self.bind(entry)?;
        }

        Ok(DescriptorGraph {
            types: self.types,
            by_name: self.by_name,
        })
    }

    fn register(&mut self, decl: &TypeDecl, scope: &str, unit: &SourceUnit) -> Result<(), Error> {
        let full_name = if scope.is_empty() {
            decl.name().to_string()
        } else {
            format!("{scope}.{}", decl.name())
        };

        if let Some(previous) = self.declared_in.get(&full_name) {
            return Err(Error::new(ErrorKind::Parse)
                .with_message(format!(
                    "type `{full_name}` declared in both {previous} and {}",
                    unit.path.display()
                ))
                .with_path(&unit.path));
        }
        self.declared_in
            .insert(full_name.clone(), unit.path.display().to_string());

        let id = self.types.len();
        self.by_name.insert(full_name.clone(), id);

        match decl {
            TypeDecl::Message(message) => {
                // Placeholder; fields are bound in the second pass.
                self.types.push(TypeDescriptor::Message(MessageDescriptor {
                    full_name: full_name.clone(),
                    fields: Vec::new(),
                    oneofs: message.oneofs.clone(),
                    is_map_entry: false,
                }));
                self.pending.push(Pending {
                    id,
                    full_name: full_name.clone(),
                    package: unit.package.clone(),
                    decl: PendingDecl::Message {
                        fields: message.fields.clone(),
                        oneofs: message.oneofs.clone(),
                        is_map_entry: false,
                    },
                });

                self.register_map_entries(message, &full_name, unit)?;
                for nested in &message.nested {
                    self.register(nested, &full_name, unit)?;
                }
            }
            TypeDecl::Enum(decl) => {
                self.types.push(TypeDescriptor::Enum(EnumDescriptor {
                    full_name: full_name.clone(),
                    values: decl.values.clone(),
                }));
                self.pending.push(Pending {
                    id,
                    full_name,
                    package: unit.package.clone(),
                    decl: PendingDecl::Enum,
                });
            }
        }
        Ok(())
    }

    /// Synthesize the `FooEntry` message protobuf models a `map<K, V>` field as.
    fn register_map_entries(
        &mut self,
        message: &MessageDecl,
        message_fqn: &str,
        unit: &SourceUnit,
    ) -> Result<(), Error> {
        for field in &message.fields {
            let TypeRef::Map { key, value } = &field.type_ref else {
                continue;
            };
            let entry_fqn = format!("{message_fqn}.{}", map_entry_name(&field.name));
            if self.declared_in.contains_key(&entry_fqn) {
                return Err(Error::new(ErrorKind::Parse)
                    .with_message(format!(
                        "map field `{}` collides with declared type `{entry_fqn}`",
                        field.name
                    ))
                    .with_path(&unit.path)
                    .with_line_col(field.line, field.column));
            }
            self.declared_in
                .insert(entry_fqn.clone(), unit.path.display().to_string());

            let id = self.types.len();
            self.by_name.insert(entry_fqn.clone(), id);
            self.types.push(TypeDescriptor::Message(MessageDescriptor {
                full_name: entry_fqn.clone(),
                fields: Vec::new(),
                oneofs: Vec::new(),
                is_map_entry: true,
            }));
            self.pending.push(Pending {
                id,
                full_name: entry_fqn,
                package: unit.package.clone(),
                decl: PendingDecl::Message {
                    fields: vec![
                        FieldDecl {
                            name: "key".to_string(),
                            number: 1,
                            label: Label::Singular,
                            type_ref: TypeRef::Scalar(*key),
                            oneof: None,
                            json_name: None,
                            line: field.line,
                            column: field.column,
                        },
                        FieldDecl {
                            name: "value".to_string(),
                            number: 2,
                            label: Label::Singular,
                            type_ref: (**value).clone(),
                            oneof: None,
                            json_name: None,
                            line: field.line,
                            column: field.column,
                        },
                    ],
                    oneofs: Vec::new(),
                    is_map_entry: true,
                },
            });
        }
        Ok(())
    }

    fn bind(&mut self, entry: &Pending) -> Result<(), Error> {
        let PendingDecl::Message {
            fields,
            oneofs,
            is_map_entry,
        } = &entry.decl
        else {
            return Ok(());
        };

        let mut bound = Vec::with_capacity(fields.len());
        let mut json_keys: HashMap<String, String> = HashMap::new();
        for field in fields {
            let descriptor = self.bind_field(entry, field)?;

            if descriptor.is_map_by_kind(&self.types) && field.oneof.is_some() {
                return Err(Error::new(ErrorKind::Parse)
                    .with_message(format!(
                        "map field `{}` cannot be a member of oneof `{}`",
                        field.name,
                        oneofs
                            .get(field.oneof.unwrap_or_default())
                            .map(String::as_str)
                            .unwrap_or("?")
                    ))
                    .with_line_col(field.line, field.column));
            }

            for key in [&descriptor.name, &descriptor.json_name] {
                if let Some(other) = json_keys.get(key)
                    && *other != descriptor.name
                {
                    return Err(Error::new(ErrorKind::Parse)
                        .with_message(format!(
                            "fields `{other}` and `{}` of `{}` share the JSON key `{key}`",
                            descriptor.name, entry.full_name
                        ))
                        .with_line_col(field.line, field.column));
                }
                json_keys.insert(key.clone(), descriptor.name.clone());
            }

            bound.push(descriptor);
        }

        self.types[entry.id] = TypeDescriptor::Message(MessageDescriptor {
            full_name: entry.full_name.clone(),
            fields: bound,
            oneofs: oneofs.clone(),
            is_map_entry: *is_map_entry,
        });
        Ok(())
    }

    fn bind_field(&self, entry: &Pending, field: &FieldDecl) -> Result<FieldDescriptor, Error> {
        let (kind, repeated) = match &field.type_ref {
            TypeRef::Scalar(scalar) => (FieldKind::Scalar(*scalar), field.label == Label::Repeated),
            TypeRef::Named(name) => {
                let id = self.resolve_named(name, entry).ok_or_else(|| {
                    Error::new(ErrorKind::UnresolvedType)
                        .with_message(format!(
                            "field `{}` of `{}` references unknown type `{name}`",
                            field.name, entry.full_name
                        ))
                        .with_line_col(field.line, field.column)
                })?;
                let kind = match &self.types[id] {
                    TypeDescriptor::Message(_) => FieldKind::Message(id),
                    TypeDescriptor::Enum(_) => FieldKind::Enum(id),
                };
                (kind, field.label == Label::Repeated)
            }
            TypeRef::Map { .. } => {
                let entry_fqn = format!("{}.{}", entry.full_name, map_entry_name(&field.name));
                let id = self.by_name.get(&entry_fqn).copied().ok_or_else(|| {
                    Error::new(ErrorKind::Internal)
                        .with_message(format!("missing synthetic map entry `{entry_fqn}`"))
                })?;
                // Maps decode as repeated entry messages.
                (FieldKind::Message(id), true)
            }
        };

        Ok(FieldDescriptor {
            name: field.name.clone(),
            json_name: field
                .json_name
                .clone()
                .unwrap_or_else(|| default_json_name(&field.name)),
            number: field.number,
            repeated,
            kind,
            oneof: field.oneof,
        })
    }

    /// Resolve a type reference: absolute names exactly; relative names
    /// through the declaring scope chain (innermost outward), then through
    /// the packages of all parsed files (sorted, so resolution is
    /// deterministic).
    fn resolve_named(&self, name: &str, entry: &Pending) -> Option<TypeId> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.by_name.get(absolute).copied();
        }

        // The declaring message's own scope comes first: its nested types
        // shadow siblings and package-level declarations.
        if let Some(id) = self.by_name.get(&format!("{}.{name}", entry.full_name)) {
            return Some(*id);
        }

        let mut scope = entry.full_name.as_str();
        loop {
            let Some(split) = scope.rfind('.') else {
                break;
            };
            scope = &scope[..split];
            if let Some(id) = self.by_name.get(&format!("{scope}.{name}")) {
                return Some(*id);
            }
            if Some(scope) == entry.package.as_deref() {
                break;
            }
        }

        if let Some(package) = &entry.package
            && let Some(id) = self.by_name.get(&format!("{package}.{name}"))
        {
            return Some(*id);
        }
        if let Some(id) = self.by_name.get(name) {
            return Some(*id);
        }
        for package in &self.packages {
            if let Some(id) = self.by_name.get(&format!("{package}.{name}")) {
                return Some(*id);
            }
        }
        None
    }
}

impl FieldDescriptor {
    fn is_map_by_kind(&self, types: &[TypeDescriptor]) -> bool {
        self.repeated
            && matches!(
                self.kind,
                FieldKind::Message(id) if matches!(
                    &types[id],
                    TypeDescriptor::Message(entry) if entry.is_map_entry
                )
            )
    }
}

fn map_entry_name(field_name: &str) -> String {
    let mut name = default_json_name(field_name);
    if let Some(first) = name.get(..1) {
        let upper = first.to_ascii_uppercase();
        name.replace_range(..1, &upper);
    }
    name.push_str("Entry");
    name
}

#[cfg(test)]
mod tests {
    use super::{DescriptorGraph, FieldKind, TypeDescriptor};
    use crate::core::ast::ScalarKind;
    use crate::core::error::ErrorKind;
    use crate::core::parser::parse_source;
    use std::path::Path;

    fn graph(sources: &[(&str, &str)]) -> Result<DescriptorGraph, crate::core::error::Error> {
        let units = sources
            .iter()
            .map(|(path, source)| parse_source(Path::new(path), source).expect("parse"))
            .collect::<Vec<_>>();
        DescriptorGraph::build(&units)
    }

    #[test]
    fn binds_qualified_names_with_nesting() {
        let graph = graph(&[(
            "a.proto",
            r#"syntax = "proto3";
package pkg;
message Outer {
  message Inner { string id = 1; }
  Inner inner = 1;
}"#,
        )])
        .expect("build");
        assert!(graph.message("pkg.Outer").is_some());
        assert!(graph.message("pkg.Outer.Inner").is_some());
        assert!(graph.message(".pkg.Outer.Inner").is_some());
        assert!(graph.message("Outer.Inner").is_none());

        let outer = graph.message("pkg.Outer").unwrap();
        let FieldKind::Message(inner_id) = outer.fields[0].kind else {
            panic!("inner field should bind to a message");
        };
        assert_eq!(graph.message_by_id(inner_id).full_name, "pkg.Outer.Inner");
    }

    #[test]
    fn resolves_cross_file_references() {
        let graph = graph(&[
            (
                "common.proto",
                r#"syntax = "proto3";
package common;
message Money { int64 units = 1; }"#,
            ),
            (
                "order.proto",
                r#"syntax = "proto3";
package shop;
message Order { common.Money total = 1; }"#,
            ),
        ])
        .expect("build");
        let order = graph.message("shop.Order").unwrap();
        let FieldKind::Message(id) = order.fields[0].kind else {
            panic!("total should bind");
        };
        assert_eq!(graph.message_by_id(id).full_name, "common.Money");
    }

    #[test]
    fn unresolved_reference_names_field_and_type() {
        let err = graph(&[(
            "a.proto",
            r#"syntax = "proto3";
message M { Missing thing = 1; }"#,
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedType);
        let message = err.message().unwrap();
        assert!(message.contains("thing"));
        assert!(message.contains("Missing"));
    }

    #[test]
    fn map_fields_become_synthetic_entries() {
        let graph = graph(&[(
            "a.proto",
            r#"syntax = "proto3";
message M { map<string, int64> counts_by_name = 1; }"#,
        )])
        .expect("build");
        let message = graph.message("M").unwrap();
        let field = &message.fields[0];
        assert!(field.repeated);
        assert!(field.is_map(&graph));
        let FieldKind::Message(entry_id) = field.kind else {
            panic!("map binds to entry message");
        };
        let entry = graph.message_by_id(entry_id);
        assert_eq!(entry.full_name, "M.CountsByNameEntry");
        assert!(entry.is_map_entry);
        assert_eq!(
            entry.fields[0].kind,
            FieldKind::Scalar(ScalarKind::String)
        );
        assert_eq!(entry.fields[1].kind, FieldKind::Scalar(ScalarKind::Int64));
    }

    #[test]
    fn duplicate_type_names_across_files_fail() {
        let err = graph(&[
            ("a.proto", "syntax = \"proto3\"; package p; message M {}"),
            ("b.proto", "syntax = \"proto3\"; package p; message M {}"),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        let message = err.message().unwrap();
        assert!(message.contains("a.proto"));
        assert!(message.contains("b.proto"));
    }

    #[test]
    fn enum_descriptor_maps_names_and_numbers() {
        let graph = graph(&[(
            "a.proto",
            r#"syntax = "proto3";
enum Color { COLOR_UNSPECIFIED = 0; RED = 1; BLUE = 2; }"#,
        )])
        .expect("build");
        let id = graph.lookup("Color").unwrap();
        let TypeDescriptor::Enum(color) = graph.get(id) else {
            panic!("expected enum");
        };
        assert_eq!(color.number_for("RED"), Some(1));
        assert_eq!(color.name_for(2), Some("BLUE"));
        assert_eq!(color.number_for("GREEN"), None);
    }

    #[test]
    fn building_twice_yields_equal_graphs() {
        let sources = &[(
            "a.proto",
            r#"syntax = "proto3";
package p;
message M {
  map<int32, string> m = 1;
  oneof o { string a = 2; int32 b = 3; }
}"#,
        )];
        assert_eq!(graph(sources).expect("first"), graph(sources).expect("second"));
    }

    #[test]
    fn json_key_collision_fails() {
        let err = graph(&[(
            "a.proto",
            r#"syntax = "proto3";
message M {
  string foo_bar = 1;
  string fooBar = 2;
}"#,
        )])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().unwrap().contains("fooBar"));
    }
}
