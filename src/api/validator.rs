//! Purpose: Tie compilation, message lookup, and decoding into one validation entry point.
//! Exports: `Validator`, `ValidationReport`.
//! Role: Shared contract for CLI diagnostics and library users.
//! Invariants: A `Validator` is immutable once compiled; one compile serves many documents.
//! Invariants: Reports describe success only; failures travel as [`Error`] values.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::core::decode::{DynamicMessage, decode_document};
use crate::core::descriptor::{DescriptorGraph, MessageDescriptor, TypeDescriptor};
use crate::core::error::{Error, ErrorKind};
use crate::core::resolve::{FsLoader, Resolver, SourceLoader};

/// A compiled schema, ready to validate documents against any of its messages.
#[derive(Debug)]
pub struct Validator {
    schema: PathBuf,
    graph: DescriptorGraph,
    files_parsed: usize,
}

/// Summary of a successful validation, serializable for `--json` output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationReport {
    pub schema: PathBuf,
    pub message: String,
    pub document: PathBuf,
    pub files_parsed: usize,
    pub valid: bool,
}

impl Validator {
    /// Compile a schema file and its transitive imports from the filesystem.
    pub fn compile(schema: &Path, import_roots: &[PathBuf]) -> Result<Self, Error> {
        Self::compile_with(schema, import_roots, &FsLoader)
    }

    /// Compile through an explicit loader; the seam tests use.
    pub fn compile_with(
        schema: &Path,
        import_roots: &[PathBuf],
        loader: &dyn SourceLoader,
    ) -> Result<Self, Error> {
        let units = Resolver::new(import_roots.to_vec(), loader).resolve_root(schema)?;
        let files_parsed = units.len();
        let graph = DescriptorGraph::build(&units)?;
        debug!(
            schema = %schema.display(),
            files = files_parsed,
            types = graph.type_count(),
            "schema compiled"
        );
        Ok(Self {
            schema: schema.to_path_buf(),
            graph,
            files_parsed,
        })
    }

    pub fn graph(&self) -> &DescriptorGraph {
        &self.graph
    }

    pub fn files_parsed(&self) -> usize {
        self.files_parsed
    }

    /// Look up a message by fully-qualified name. Exact match only; a close
    /// miss produces a hint rather than a fuzzy result.
    pub fn message(&self, full_name: &str) -> Result<&MessageDescriptor, Error> {
        if let Some(message) = self.graph.message(full_name) {
            return Ok(message);
        }

        let err = Error::new(ErrorKind::MessageNotFound)
            .with_message(format!("message `{full_name}` not found in compiled schema"))
            .with_path(&self.schema);
        if self.graph.lookup(full_name).is_some() {
            return Err(err.with_hint(format!("`{full_name}` is an enum, not a message.")));
        }
        if let Some(suggestion) = self.suggest(full_name) {
            return Err(err.with_hint(format!("Did you mean `{suggestion}`?")));
        }
        Err(err.with_hint(
            "Use the fully-qualified name, including the package (e.g. `pkg.Message`).",
        ))
    }

    /// Decode one JSON document (text) against the named message.
    pub fn validate_text(
        &self,
        full_name: &str,
        document: &str,
    ) -> Result<DynamicMessage, Error> {
        let message = self.message(full_name)?;
        decode_document(&self.graph, message, document)
    }

    /// Validate a document and summarize the run for reporting.
    pub fn validate_document(
        &self,
        full_name: &str,
        document_path: &Path,
        document: &str,
    ) -> Result<(DynamicMessage, ValidationReport), Error> {
        let decoded = self
            .validate_text(full_name, document)
            .map_err(|err| err.with_default_path(document_path))?;
        let report = ValidationReport {
            schema: self.schema.clone(),
            message: full_name.to_string(),
            document: document_path.to_path_buf(),
            files_parsed: self.files_parsed,
            valid: true,
        };
        Ok((decoded, report))
    }

    /// A message whose unqualified name matches the request, if exactly one exists.
    fn suggest(&self, requested: &str) -> Option<&str> {
        let bare = requested.rsplit('.').next()?;
        let mut matches = (0..self.graph.type_count()).filter_map(|id| match self.graph.get(id) {
            TypeDescriptor::Message(message)
                if !message.is_map_entry
                    && message.full_name.rsplit('.').next() == Some(bare) =>
            {
                Some(message.full_name.as_str())
            }
            _ => None,
        });
        let candidate = matches.next()?;
        matches.next().is_none().then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::Validator;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::resolve::SourceLoader;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    struct MapLoader(HashMap<PathBuf, String>);

    impl MapLoader {
        fn new(files: &[(&str, &str)]) -> Self {
            Self(
                files
                    .iter()
                    .map(|(path, source)| (PathBuf::from(path), source.to_string()))
                    .collect(),
            )
        }
    }

    impl SourceLoader for MapLoader {
        fn load(&self, path: &Path) -> Result<Option<String>, Error> {
            Ok(self.0.get(path).cloned())
        }
    }

    fn validator() -> Validator {
        let loader = MapLoader::new(&[
            (
                "r/user.proto",
                r#"syntax = "proto3";
package app;
import "common.proto";
enum Role { ROLE_UNSPECIFIED = 0; ADMIN = 1; }
message User { string name = 1; Role role = 2; common.Money balance = 3; }"#,
            ),
            (
                "r/common.proto",
                r#"syntax = "proto3";
package common;
message Money { int64 units = 1; }"#,
            ),
        ]);
        Validator::compile_with(Path::new("user.proto"), &[PathBuf::from("r")], &loader)
            .expect("compile")
    }

    #[test]
    fn compiles_and_counts_parsed_files() {
        let validator = validator();
        assert_eq!(validator.files_parsed(), 2);
        assert!(validator.message("app.User").is_ok());
        assert!(validator.message("common.Money").is_ok());
    }

    #[test]
    fn duplicate_field_names_do_not_compile() {
        let loader = MapLoader::new(&[(
            "r/dup.proto",
            "syntax = \"proto3\";\nmessage M { string foo = 1; int32 foo = 2; }\n",
        )]);
        let err = Validator::compile_with(Path::new("dup.proto"), &[PathBuf::from("r")], &loader)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().unwrap().contains("duplicate field name `foo`"));
    }

    #[test]
    fn unknown_message_suggests_qualified_name() {
        let validator = validator();
        let err = validator.message("User").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MessageNotFound);
        assert!(err.hint().unwrap().contains("app.User"));
    }

    #[test]
    fn enum_name_is_rejected_with_hint() {
        let validator = validator();
        let err = validator.message("app.Role").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MessageNotFound);
        assert!(err.hint().unwrap().contains("enum"));
    }

    #[test]
    fn validate_document_reports_success() {
        let validator = validator();
        let (decoded, report) = validator
            .validate_document(
                "app.User",
                Path::new("doc.json"),
                r#"{"name": "Ada", "role": "ADMIN", "balance": {"units": "12"}}"#,
            )
            .expect("valid");
        assert_eq!(decoded.fields.len(), 3);
        assert!(report.valid);
        assert_eq!(report.message, "app.User");
        assert_eq!(report.files_parsed, 2);
    }

    #[test]
    fn decode_failure_names_the_document() {
        let validator = validator();
        let err = validator
            .validate_document("app.User", Path::new("doc.json"), r#"{"name": 1}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.path().unwrap().ends_with("doc.json"));
    }
}
