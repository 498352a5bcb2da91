//! Purpose: Define the stable public Rust API boundary for pbvalidate.
//! Exports: Core types and operations needed by the CLI and library users.
//! Role: Public, additive-only surface; hides internal compilation modules.
//! Invariants: This module is the only public path to the compiler and decoder.
//! Invariants: Internal pipeline stages remain reachable but are not re-exported wholesale.

mod validator;

pub use crate::core::decode::{DynamicMessage, DynamicValue, MapKey, decode_document, decode_message};
pub use crate::core::descriptor::{
    DescriptorGraph, EnumDescriptor, FieldDescriptor, FieldKind, MessageDescriptor, TypeDescriptor,
    TypeId,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::resolve::{FsLoader, Resolver, SourceLoader};
pub use validator::{ValidationReport, Validator};
