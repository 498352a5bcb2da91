//! Purpose: Model one parsed `.proto` file before cross-file binding.
//! Exports: `SourceUnit`, `TypeDecl`, `MessageDecl`, `EnumDecl`, `FieldDecl`, `ScalarKind`.
//! Role: Parser output, consumed by the import resolver and descriptor builder.
//! Invariants: A `SourceUnit` is immutable once parsed.
//! Invariants: Per-file invariants (unique field numbers, reserved ranges) are
//! enforced by the parser; cross-file invariants belong to the descriptor builder.

use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Syntax {
    Proto2,
    Proto3,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportModifier {
    None,
    Public,
    Weak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportDecl {
    /// Import path exactly as written in the source.
    pub path: String,
    /// Recorded but does not change resolution.
    pub modifier: ImportModifier,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub syntax: Syntax,
    pub package: Option<String>,
    pub imports: Vec<ImportDecl>,
    pub types: Vec<TypeDecl>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeDecl {
    Message(MessageDecl),
    Enum(EnumDecl),
}

impl TypeDecl {
    pub fn name(&self) -> &str {
        match self {
            TypeDecl::Message(message) => &message.name,
            TypeDecl::Enum(decl) => &decl.name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessageDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    /// Oneof group names; fields reference their group by index.
    pub oneofs: Vec<String>,
    pub nested: Vec<TypeDecl>,
    pub reserved_ranges: Vec<(u32, u32)>,
    pub reserved_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    /// Declaration order is preserved; aliases may repeat numbers.
    pub values: Vec<(String, i32)>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Label {
    Singular,
    Optional,
    Repeated,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
    Scalar(ScalarKind),
    /// Unresolved message/enum reference; a leading dot means absolute.
    Named(String),
    Map {
        key: ScalarKind,
        value: Box<TypeRef>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub number: u32,
    pub label: Label,
    pub type_ref: TypeRef,
    /// Index into the enclosing message's `oneofs`.
    pub oneof: Option<usize>,
    /// Explicit `json_name` option, when present.
    pub json_name: Option<String>,
    pub line: u32,
    pub column: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "double" => ScalarKind::Double,
            "float" => ScalarKind::Float,
            "int32" => ScalarKind::Int32,
            "int64" => ScalarKind::Int64,
            "uint32" => ScalarKind::Uint32,
            "uint64" => ScalarKind::Uint64,
            "sint32" => ScalarKind::Sint32,
            "sint64" => ScalarKind::Sint64,
            "fixed32" => ScalarKind::Fixed32,
            "fixed64" => ScalarKind::Fixed64,
            "sfixed32" => ScalarKind::Sfixed32,
            "sfixed64" => ScalarKind::Sfixed64,
            "bool" => ScalarKind::Bool,
            "string" => ScalarKind::String,
            "bytes" => ScalarKind::Bytes,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ScalarKind::Double => "double",
            ScalarKind::Float => "float",
            ScalarKind::Int32 => "int32",
            ScalarKind::Int64 => "int64",
            ScalarKind::Uint32 => "uint32",
            ScalarKind::Uint64 => "uint64",
            ScalarKind::Sint32 => "sint32",
            ScalarKind::Sint64 => "sint64",
            ScalarKind::Fixed32 => "fixed32",
            ScalarKind::Fixed64 => "fixed64",
            ScalarKind::Sfixed32 => "sfixed32",
            ScalarKind::Sfixed64 => "sfixed64",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
            ScalarKind::Bytes => "bytes",
        }
    }

    /// Valid map key kinds per the proto IDL: integral, bool, and string.
    pub fn valid_map_key(self) -> bool {
        !matches!(
            self,
            ScalarKind::Double | ScalarKind::Float | ScalarKind::Bytes
        )
    }
}

/// Protobuf's default JSON name: lowerCamelCase of the proto field name.
pub fn default_json_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len());
    let mut upper_next = false;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
