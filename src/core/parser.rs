//! Purpose: Parse one `.proto` token stream into a `SourceUnit` AST.
//! Exports: `parse_source`.
//! Role: Recursive-descent front end; strict gate, no error recovery.
//! Invariants: The first syntax error aborts the whole file with expected/found context.
//! Invariants: Per-file semantic checks (duplicate field numbers, reserved
//! violations, proto3 enum zero value) fail here, before cross-file binding.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::ast::{
    EnumDecl, FieldDecl, ImportDecl, ImportModifier, Label, MessageDecl, ScalarKind, SourceUnit,
    Syntax, TypeDecl, TypeRef,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::lexer::{Lexer, Spanned, Token};

/// Field numbers protobuf reserves for its own wire-format use.
const IMPL_RESERVED: (u32, u32) = (19_000, 19_999);
const MAX_FIELD_NUMBER: u32 = 536_870_911;

pub fn parse_source(path: &Path, source: &str) -> Result<SourceUnit, Error> {
    let tokens = Lexer::tokenize(source).map_err(|err| err.with_default_path(path))?;
    Parser {
        path: path.to_path_buf(),
        tokens,
        pos: 0,
    }
    .parse_file()
}

struct Parser {
    path: PathBuf,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn parse_file(mut self) -> Result<SourceUnit, Error> {
        let syntax = self.parse_syntax_decl()?;
        let mut package = None;
        let mut imports = Vec::new();
        let mut types = Vec::new();

        while let Some(spanned) = self.peek() {
            match &spanned.token {
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(name) => match name.as_str() {
                    "package" => {
                        self.advance();
                        if package.is_some() {
                            return Err(self.error_at_prev("duplicate package statement"));
                        }
                        package = Some(self.parse_full_ident()?);
                        self.expect_punct(';')?;
                    }
                    "import" => {
                        self.advance();
                        imports.push(self.parse_import()?);
                    }
                    "option" => {
                        self.advance();
                        self.parse_option_body()?;
                    }
                    "message" => {
                        self.advance();
                        types.push(TypeDecl::Message(self.parse_message(syntax)?));
                    }
                    "enum" => {
                        self.advance();
                        types.push(TypeDecl::Enum(self.parse_enum(syntax)?));
                    }
                    "service" => {
                        self.advance();
                        self.skip_service()?;
                    }
                    _ => {
                        return Err(self.error_expected(
                            "`package`, `import`, `option`, `message`, `enum`, or `service`",
                        ));
                    }
                },
                _ => {
                    return Err(self.error_expected(
                        "`package`, `import`, `option`, `message`, `enum`, or `service`",
                    ));
                }
            }
        }

        Ok(SourceUnit {
            path: self.path,
            syntax,
            package,
            imports,
            types,
        })
    }

    fn parse_syntax_decl(&mut self) -> Result<Syntax, Error> {
        if !self.eat_keyword("syntax") {
            // Missing syntax statement defaults to proto2, as protoc does.
            return Ok(Syntax::Proto2);
        }
        self.expect_punct('=')?;
        let value = self.expect_string()?;
        self.expect_punct(';')?;
        match value.as_str() {
            "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            other => Err(self.error_at_prev(format!(
                "unsupported syntax `{other}` (expected \"proto2\" or \"proto3\")"
            ))),
        }
    }

    fn parse_import(&mut self) -> Result<ImportDecl, Error> {
        let modifier = if self.eat_keyword("public") {
            ImportModifier::Public
        } else if self.eat_keyword("weak") {
            ImportModifier::Weak
        } else {
            ImportModifier::None
        };
        let path = self.expect_string()?;
        self.expect_punct(';')?;
        Ok(ImportDecl { path, modifier })
    }

    fn parse_message(&mut self, syntax: Syntax) -> Result<MessageDecl, Error> {
        let name = self.expect_ident()?;
        self.expect_punct('{')?;

        let mut message = MessageDecl {
            name,
            fields: Vec::new(),
            oneofs: Vec::new(),
            nested: Vec::new(),
            reserved_ranges: Vec::new(),
            reserved_names: Vec::new(),
        };

        loop {
            let Some(spanned) = self.peek() else {
                return Err(self.error_expected("`}` closing message body"));
            };
            match &spanned.token {
                Token::Punct('}') => {
                    self.advance();
                    break;
                }
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(word) => match word.as_str() {
                    "message" => {
                        self.advance();
                        message
                            .nested
                            .push(TypeDecl::Message(self.parse_message(syntax)?));
                    }
                    "enum" => {
                        self.advance();
                        message.nested.push(TypeDecl::Enum(self.parse_enum(syntax)?));
                    }
                    "oneof" => {
                        self.advance();
                        self.parse_oneof(&mut message)?;
                    }
                    "option" => {
                        self.advance();
                        self.parse_option_body()?;
                    }
                    "reserved" => {
                        self.advance();
                        self.parse_reserved(&mut message)?;
                    }
                    "extensions" | "extend" => {
                        return Err(self.error_expected(
                            "a field, `oneof`, `map`, nested type, `option`, or `reserved` \
                             (proto2 extensions are not supported)",
                        ));
                    }
                    _ => {
                        let field = self.parse_field(None)?;
                        message.fields.push(field);
                    }
                },
                _ => {
                    return Err(self.error_expected(
                        "a field, `oneof`, `map`, nested type, `option`, or `reserved`",
                    ));
                }
            }
        }

        self.check_message_invariants(&message)?;
        Ok(message)
    }

    fn parse_oneof(&mut self, message: &mut MessageDecl) -> Result<(), Error> {
        let group = self.expect_ident()?;
        message.oneofs.push(group);
        let oneof_index = message.oneofs.len() - 1;
        self.expect_punct('{')?;
        loop {
            let Some(spanned) = self.peek() else {
                return Err(self.error_expected("`}` closing oneof body"));
            };
            match &spanned.token {
                Token::Punct('}') => {
                    self.advance();
                    return Ok(());
                }
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(word) if word == "option" => {
                    self.advance();
                    self.parse_option_body()?;
                }
                Token::Ident(word)
                    if matches!(word.as_str(), "repeated" | "optional" | "required") =>
                {
                    return Err(self.error_expected("an unlabeled field (oneof members take no label)"));
                }
                Token::Ident(_) => {
                    let field = self.parse_field(Some(oneof_index))?;
                    message.fields.push(field);
                }
                _ => return Err(self.error_expected("a oneof member field or `}`")),
            }
        }
    }

    fn parse_field(&mut self, oneof: Option<usize>) -> Result<FieldDecl, Error> {
        let label = if oneof.is_some() {
            Label::Singular
        } else if self.eat_keyword("repeated") {
            Label::Repeated
        } else if self.eat_keyword("optional") {
            Label::Optional
        } else if self.eat_keyword("required") {
            // proto2; required-ness carries no weight in JSON validation.
            Label::Singular
        } else {
            Label::Singular
        };

        let type_ref = if self.peek_keyword("map") {
            self.advance();
            if label != Label::Singular {
                return Err(self.error_at_prev("map fields cannot take a label"));
            }
            self.parse_map_type()?
        } else {
            self.parse_type_ref()?
        };

        let (name, line, column) = self.expect_ident_spanned()?;
        self.expect_punct('=')?;
        let number = self.expect_field_number()?;
        let json_name = self.parse_field_options()?;
        self.expect_punct(';')?;

        Ok(FieldDecl {
            name,
            number,
            label,
            type_ref,
            oneof,
            json_name,
            line,
            column,
        })
    }

    fn parse_map_type(&mut self) -> Result<TypeRef, Error> {
        self.expect_punct('<')?;
        let key_name = self.expect_ident()?;
        let key = ScalarKind::from_keyword(&key_name)
            .filter(|kind| kind.valid_map_key())
            .ok_or_else(|| {
                self.error_at_prev(format!("`{key_name}` is not a valid map key type"))
            })?;
        self.expect_punct(',')?;
        let value = self.parse_type_ref()?;
        if matches!(value, TypeRef::Map { .. }) {
            return Err(self.error_at_prev("map values cannot themselves be maps"));
        }
        self.expect_punct('>')?;
        Ok(TypeRef::Map {
            key,
            value: Box::new(value),
        })
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef, Error> {
        let mut name = String::new();
        if self.eat_punct('.') {
            name.push('.');
        }
        let first = self.expect_ident()?;
        if name.is_empty() {
            if let Some(scalar) = ScalarKind::from_keyword(&first) {
                return Ok(TypeRef::Scalar(scalar));
            }
        }
        name.push_str(&first);
        while self.eat_punct('.') {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(TypeRef::Named(name))
    }

    /// Parse `[opt = value, ...]`, returning the `json_name` override if set.
    fn parse_field_options(&mut self) -> Result<Option<String>, Error> {
        if !self.eat_punct('[') {
            return Ok(None);
        }
        let mut json_name = None;
        loop {
            let option_name = self.parse_option_name()?;
            self.expect_punct('=')?;
            let value = self.parse_constant()?;
            if option_name == "json_name" {
                match value {
                    Constant::Str(text) => json_name = Some(text),
                    _ => {
                        return Err(self.error_at_prev("json_name option requires a string value"));
                    }
                }
            }
            if self.eat_punct(',') {
                continue;
            }
            self.expect_punct(']')?;
            return Ok(json_name);
        }
    }

    fn parse_reserved(&mut self, message: &mut MessageDecl) -> Result<(), Error> {
        if matches!(self.peek().map(|s| &s.token), Some(Token::StrLit(_))) {
            loop {
                message.reserved_names.push(self.expect_string()?);
                if self.eat_punct(',') {
                    continue;
                }
                break;
            }
        } else {
            loop {
                let start = self.expect_field_number()?;
                let end = if self.eat_keyword("to") {
                    if self.eat_keyword("max") {
                        MAX_FIELD_NUMBER
                    } else {
                        self.expect_field_number()?
                    }
                } else {
                    start
                };
                if end < start {
                    return Err(self.error_at_prev("reserved range end precedes its start"));
                }
                message.reserved_ranges.push((start, end));
                if self.eat_punct(',') {
                    continue;
                }
                break;
            }
        }
        self.expect_punct(';')?;
        Ok(())
    }

    fn parse_enum(&mut self, syntax: Syntax) -> Result<EnumDecl, Error> {
        let name = self.expect_ident()?;
        self.expect_punct('{')?;
        let mut values: Vec<(String, i32)> = Vec::new();
        let mut allow_alias = false;

        loop {
            let Some(spanned) = self.peek() else {
                return Err(self.error_expected("`}` closing enum body"));
            };
            match &spanned.token {
                Token::Punct('}') => {
                    self.advance();
                    break;
                }
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(word) if word == "option" => {
                    self.advance();
                    if let Some(Constant::Bool(true)) =
                        self.parse_option_body_named("allow_alias")?
                    {
                        allow_alias = true;
                    }
                }
                Token::Ident(word) if word == "reserved" => {
                    self.advance();
                    // Reserved enum numbers/names are accepted and skipped;
                    // they never surface in JSON decoding.
                    let mut scratch = MessageDecl {
                        name: String::new(),
                        fields: Vec::new(),
                        oneofs: Vec::new(),
                        nested: Vec::new(),
                        reserved_ranges: Vec::new(),
                        reserved_names: Vec::new(),
                    };
                    self.parse_reserved(&mut scratch)?;
                }
                Token::Ident(_) => {
                    let value_name = self.expect_ident()?;
                    self.expect_punct('=')?;
                    let number = self.expect_enum_number()?;
                    // Enum value options (e.g. deprecated) are parsed and dropped.
                    self.parse_field_options()?;
                    self.expect_punct(';')?;

                    if values.iter().any(|(existing, _)| *existing == value_name) {
                        return Err(
                            self.error_at_prev(format!("duplicate enum value name `{value_name}`"))
                        );
                    }
                    if !allow_alias && values.iter().any(|(_, existing)| *existing == number) {
                        return Err(self.error_at_prev(format!(
                            "duplicate enum value number {number} (set `option allow_alias = true;` to permit aliases)"
                        )));
                    }
                    values.push((value_name, number));
                }
                _ => return Err(self.error_expected("an enum value, `option`, `reserved`, or `}`")),
            }
        }

        if values.is_empty() {
            return Err(self.error_at_prev(format!("enum `{name}` defines no values")));
        }
        if syntax == Syntax::Proto3 && !values.iter().any(|(_, number)| *number == 0) {
            return Err(self.error_at_prev(format!(
                "proto3 enum `{name}` must define a zero value"
            )));
        }

        Ok(EnumDecl { name, values })
    }

    fn check_message_invariants(&self, message: &MessageDecl) -> Result<(), Error> {
        let mut numbers = HashSet::new();
        let mut names = HashSet::new();
        let reserved_names: HashSet<&str> = message
            .reserved_names
            .iter()
            .map(|name| name.as_str())
            .collect();

        for field in &message.fields {
            let position = |err: Error| err.with_line_col(field.line, field.column);
            if !numbers.insert(field.number) {
                return Err(position(self.error(format!(
                    "duplicate field number {} in message `{}`",
                    field.number, message.name
                ))));
            }
            if !names.insert(field.name.as_str()) {
                return Err(position(self.error(format!(
                    "duplicate field name `{}` in message `{}`",
                    field.name, message.name
                ))));
            }
            if field.number >= IMPL_RESERVED.0 && field.number <= IMPL_RESERVED.1 {
                return Err(position(self.error(format!(
                    "field number {} is in the protobuf-reserved range {}-{}",
                    field.number, IMPL_RESERVED.0, IMPL_RESERVED.1
                ))));
            }
            if message
                .reserved_ranges
                .iter()
                .any(|(start, end)| field.number >= *start && field.number <= *end)
            {
                return Err(position(self.error(format!(
                    "field number {} is reserved in message `{}`",
                    field.number, message.name
                ))));
            }
            if reserved_names.contains(field.name.as_str()) {
                return Err(position(self.error(format!(
                    "field name `{}` is reserved in message `{}`",
                    field.name, message.name
                ))));
            }
        }
        Ok(())
    }

    // ── Option plumbing ──────────────────────────────────────────────────

    fn parse_option_body(&mut self) -> Result<(), Error> {
        self.parse_option_body_named("")?;
        Ok(())
    }

    /// Parse `name = constant ;`, returning the constant when the option
    /// name matches `wanted` (empty `wanted` matches nothing).
    fn parse_option_body_named(&mut self, wanted: &str) -> Result<Option<Constant>, Error> {
        let name = self.parse_option_name()?;
        self.expect_punct('=')?;
        let value = self.parse_constant()?;
        self.expect_punct(';')?;
        if !wanted.is_empty() && name == wanted {
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    fn parse_option_name(&mut self) -> Result<String, Error> {
        let mut name = String::new();
        if self.eat_punct('(') {
            if self.eat_punct('.') {
                name.push('.');
            }
            name.push_str(&self.parse_full_ident()?);
            self.expect_punct(')')?;
        } else {
            name.push_str(&self.expect_ident()?);
        }
        while self.eat_punct('.') {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn parse_constant(&mut self) -> Result<Constant, Error> {
        let negative = self.eat_punct('-');
        if !negative && self.eat_punct('+') {
            // explicit plus sign; fall through to the numeric cases
        }
        let Some(spanned) = self.peek().cloned() else {
            return Err(self.error_expected("an option value"));
        };
        match spanned.token {
            Token::StrLit(text) if !negative => {
                self.advance();
                Ok(Constant::Str(text))
            }
            Token::IntLit(value) => {
                self.advance();
                Ok(Constant::Int(if negative {
                    -(value as i64)
                } else {
                    value as i64
                }))
            }
            Token::FloatLit(value) => {
                self.advance();
                Ok(Constant::Float(if negative { -value } else { value }))
            }
            Token::Ident(word) if !negative => {
                if word == "true" || word == "false" {
                    self.advance();
                    Ok(Constant::Bool(word == "true"))
                } else {
                    Ok(Constant::Ident(self.parse_full_ident()?))
                }
            }
            Token::Punct('{') if !negative => {
                self.skip_aggregate()?;
                Ok(Constant::Aggregate)
            }
            _ => Err(self.error_expected("an option value")),
        }
    }

    /// Service blocks are accepted and skipped by brace matching; RPC
    /// definitions play no part in JSON validation.
    fn skip_service(&mut self) -> Result<(), Error> {
        self.expect_ident()?;
        self.expect_punct('{')?;
        let mut depth = 1usize;
        while depth > 0 {
            let Some(spanned) = self.peek() else {
                return Err(self.error_expected("`}` closing service body"));
            };
            match spanned.token {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    /// Skip a text-format aggregate option value by brace matching.
    fn skip_aggregate(&mut self) -> Result<(), Error> {
        self.expect_punct('{')?;
        let mut depth = 1usize;
        while depth > 0 {
            let Some(spanned) = self.peek() else {
                return Err(self.error_expected("`}` closing aggregate option value"));
            };
            match spanned.token {
                Token::Punct('{') => depth += 1,
                Token::Punct('}') => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    // ── Token helpers ────────────────────────────────────────────────────

    fn parse_full_ident(&mut self) -> Result<String, Error> {
        let mut name = self.expect_ident()?;
        while self.eat_punct('.') {
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn expect_field_number(&mut self) -> Result<u32, Error> {
        match self.peek().cloned() {
            Some(Spanned {
                token: Token::IntLit(value),
                line,
                column,
            }) => {
                self.advance();
                if value == 0 || value > u64::from(MAX_FIELD_NUMBER) {
                    return Err(self
                        .error(format!(
                            "field number {value} out of range (1..={MAX_FIELD_NUMBER})"
                        ))
                        .with_line_col(line, column));
                }
                Ok(value as u32)
            }
            _ => Err(self.error_expected("a field number")),
        }
    }

    fn expect_enum_number(&mut self) -> Result<i32, Error> {
        let negative = self.eat_punct('-');
        match self.peek().cloned() {
            Some(Spanned {
                token: Token::IntLit(value),
                line,
                column,
            }) => {
                self.advance();
                let signed = if negative {
                    -(value as i64)
                } else {
                    value as i64
                };
                i32::try_from(signed).map_err(|_| {
                    self.error(format!("enum value {signed} out of i32 range"))
                        .with_line_col(line, column)
                })
            }
            _ => Err(self.error_expected("an enum value number")),
        }
    }

    fn expect_ident(&mut self) -> Result<String, Error> {
        self.expect_ident_spanned().map(|(name, _, _)| name)
    }

    fn expect_ident_spanned(&mut self) -> Result<(String, u32, u32), Error> {
        match self.peek().cloned() {
            Some(Spanned {
                token: Token::Ident(name),
                line,
                column,
            }) => {
                self.advance();
                Ok((name, line, column))
            }
            _ => Err(self.error_expected("an identifier")),
        }
    }

    fn expect_string(&mut self) -> Result<String, Error> {
        match self.peek().cloned() {
            Some(Spanned {
                token: Token::StrLit(text),
                ..
            }) => {
                self.advance();
                Ok(text)
            }
            _ => Err(self.error_expected("a string literal")),
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), Error> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(self.error_expected(&format!("`{c}`")))
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if matches!(self.peek(), Some(spanned) if spanned.token == Token::Punct(c)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Spanned { token: Token::Ident(name), .. }) if name == keyword
        )
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Parse)
            .with_message(message)
            .with_path(&self.path)
    }

    fn error_expected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(spanned) => self
                .error(format!(
                    "expected {expected}, found {}",
                    spanned.token.describe()
                ))
                .with_line_col(spanned.line, spanned.column),
            None => {
                let err = self.error(format!("expected {expected}, found end of file"));
                match self.tokens.last() {
                    Some(last) => err.with_line_col(last.line, last.column),
                    None => err,
                }
            }
        }
    }

    /// Position an error at the most recently consumed token.
    fn error_at_prev(&self, message: impl Into<String>) -> Error {
        let err = self.error(message);
        match self.tokens.get(self.pos.saturating_sub(1)) {
            Some(spanned) => err.with_line_col(spanned.line, spanned.column),
            None => err,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Constant {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Ident(String),
    Aggregate,
}

#[cfg(test)]
mod tests {
    use super::parse_source;
    use crate::core::ast::{Label, ScalarKind, Syntax, TypeDecl, TypeRef};
    use crate::core::error::ErrorKind;
    use std::path::Path;

    fn parse(source: &str) -> crate::core::ast::SourceUnit {
        parse_source(Path::new("test.proto"), source).expect("parse")
    }

    fn parse_err(source: &str) -> crate::core::error::Error {
        parse_source(Path::new("test.proto"), source).unwrap_err()
    }

    #[test]
    fn parses_point_message() {
        let unit = parse(
            r#"syntax = "proto3";
package geo;
message Point {
  int32 x = 1;
  int32 y = 2;
}"#,
        );
        assert_eq!(unit.syntax, Syntax::Proto3);
        assert_eq!(unit.package.as_deref(), Some("geo"));
        let TypeDecl::Message(point) = &unit.types[0] else {
            panic!("expected message");
        };
        assert_eq!(point.name, "Point");
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.fields[0].number, 1);
        assert_eq!(point.fields[0].type_ref, TypeRef::Scalar(ScalarKind::Int32));
    }

    #[test]
    fn parses_nested_types_oneof_and_map() {
        let unit = parse(
            r#"syntax = "proto3";
message Outer {
  message Inner { string id = 1; }
  enum Kind { KIND_UNSPECIFIED = 0; KIND_A = 1; }
  Inner inner = 1;
  Kind kind = 2;
  repeated int32 values = 3;
  map<string, Inner> by_name = 4;
  oneof choice {
    string a = 5;
    string b = 6;
  }
}"#,
        );
        let TypeDecl::Message(outer) = &unit.types[0] else {
            panic!("expected message");
        };
        assert_eq!(outer.nested.len(), 2);
        assert_eq!(outer.oneofs, vec!["choice".to_string()]);
        assert_eq!(outer.fields.len(), 6);
        assert_eq!(outer.fields[2].label, Label::Repeated);
        assert!(matches!(outer.fields[3].type_ref, TypeRef::Map { .. }));
        assert_eq!(outer.fields[4].oneof, Some(0));
        assert_eq!(outer.fields[5].oneof, Some(0));
    }

    #[test]
    fn records_json_name_option_and_import_modifiers() {
        let unit = parse(
            r#"syntax = "proto3";
import public "other.proto";
import "common.proto";
message M {
  string display_name = 1 [json_name = "displayName2", deprecated = true];
}"#,
        );
        assert_eq!(unit.imports.len(), 2);
        let TypeDecl::Message(message) = &unit.types[0] else {
            panic!("expected message");
        };
        assert_eq!(message.fields[0].json_name.as_deref(), Some("displayName2"));
    }

    #[test]
    fn service_blocks_are_skipped() {
        let unit = parse(
            r#"syntax = "proto3";
message Ping { string id = 1; }
service Echo {
  rpc Send (Ping) returns (Ping);
  rpc Watch (Ping) returns (stream Ping) {
    option deprecated = true;
  }
}"#,
        );
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.types[0].name(), "Ping");

        let err = parse_err(
            r#"syntax = "proto3";
service Echo { rpc Send"#,
        );
        assert!(err.message().unwrap().contains("service body"));
    }

    #[test]
    fn duplicate_field_number_fails() {
        let err = parse_err(
            r#"syntax = "proto3";
message M {
  int32 a = 1;
  int32 b = 1;
}"#,
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().unwrap().contains("duplicate field number 1"));
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn duplicate_field_name_fails() {
        let err = parse_err(
            r#"syntax = "proto3";
message M {
  string foo = 1;
  int32 foo = 2;
}"#,
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().unwrap().contains("duplicate field name `foo`"));
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn reserved_range_and_name_violations_fail() {
        let err = parse_err(
            r#"syntax = "proto3";
message M {
  reserved 2 to 5, 9;
  int32 a = 3;
}"#,
        );
        assert!(err.message().unwrap().contains("reserved"));

        let err = parse_err(
            r#"syntax = "proto3";
message M {
  reserved "old_name";
  int32 old_name = 1;
}"#,
        );
        assert!(err.message().unwrap().contains("old_name"));
    }

    #[test]
    fn implementation_reserved_range_fails() {
        let err = parse_err(
            r#"syntax = "proto3";
message M { int32 a = 19500; }"#,
        );
        assert!(err.message().unwrap().contains("19000"));
    }

    #[test]
    fn duplicate_enum_value_name_fails() {
        let err = parse_err(
            r#"syntax = "proto3";
enum E { A = 0; A = 1; }"#,
        );
        assert!(err.message().unwrap().contains("duplicate enum value name"));
    }

    #[test]
    fn proto3_enum_requires_zero_value() {
        let err = parse_err(
            r#"syntax = "proto3";
enum E { A = 1; }"#,
        );
        assert!(err.message().unwrap().contains("zero value"));

        // proto2 has no such requirement.
        parse_source(
            Path::new("test.proto"),
            r#"syntax = "proto2";
enum E { A = 1; }"#,
        )
        .expect("proto2 enum without zero");
    }

    #[test]
    fn enum_alias_requires_allow_alias() {
        let err = parse_err(
            r#"syntax = "proto3";
enum E { A = 0; B = 0; }"#,
        );
        assert!(err.message().unwrap().contains("allow_alias"));

        parse(
            r#"syntax = "proto3";
enum E {
  option allow_alias = true;
  A = 0;
  B = 0;
}"#,
        );
    }

    #[test]
    fn unmatched_brace_reports_expected_and_found() {
        let err = parse_err(
            r#"syntax = "proto3";
message M { int32 a = 1;"#,
        );
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().unwrap().contains("expected"));
        assert!(err.message().unwrap().contains("end of file"));
    }

    #[test]
    fn label_inside_oneof_fails() {
        let err = parse_err(
            r#"syntax = "proto3";
message M {
  oneof choice { repeated int32 xs = 1; }
}"#,
        );
        assert!(err.message().unwrap().contains("oneof"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = r#"syntax = "proto3";
package a.b;
import "x.proto";
message M {
  map<int64, string> m = 1;
  oneof o { bool p = 2; bytes q = 3; }
}"#;
        assert_eq!(parse(source), parse(source));
    }
}
