use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, SchemaError};
use crate::model::{
    Declaration, EnumDef, Enumerator, Field, FieldType, Primitive, StructDef, TypeScope,
};
use crate::tokenizer::{parse_integer, tokenize, Token};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

const KEYWORDS: &[&str] = &["struct", "enum", "typedef"];

/// Parse every declaration in `text`.
///
/// Field types must name a primitive, a declaration earlier in the same
/// text, or an entry of `scope` (the types pulled in by includes).
/// Declarations are returned in source order.
pub fn parse_declarations(text: &str, file: &Path, scope: &TypeScope) -> Result<Vec<Declaration>> {
    let tokens = tokenize(text, file)?;
    let mut parser = Parser {
        tokens: &tokens,
        index: 0,
        file,
        scope,
        declared: Vec::new(),
    };
    parser.parse_file()?;
    Ok(parser.declared)
}

struct Parser<'a> {
    tokens: &'a [Token],
    index: usize,
    file: &'a Path,
    scope: &'a TypeScope,
    declared: Vec<Declaration>,
}

impl<'a> Parser<'a> {
    fn parse_file(&mut self) -> Result<()> {
        while !self.current().is_eof() {
            let declaration = self.parse_declaration()?;
            if self.declared.iter().any(|d| d.name() == declaration.name()) {
                return Err(SchemaError::Duplicate {
                    kind: "declaration",
                    name: declaration.name().to_string(),
                    file: self.file.to_path_buf(),
                    line: declaration.line(),
                });
            }
            self.declared.push(declaration);
        }
        Ok(())
    }

    fn parse_declaration(&mut self) -> Result<Declaration> {
        let line = self.current().line;
        if self.eat("typedef") {
            if self.eat("struct") {
                self.eat_tag();
                let fields = self.parse_struct_body()?;
                let name = self.expect_identifier("type name")?;
                self.expect(";")?;
                return Ok(Declaration::Struct(StructDef { name, fields, line }));
            }
            if self.eat("enum") {
                self.eat_tag();
                let backing = self.parse_backing()?;
                let values = self.parse_enum_body(backing)?;
                let name = self.expect_identifier("type name")?;
                self.expect(";")?;
                return Ok(Declaration::Enum(EnumDef {
                    name,
                    backing,
                    values,
                    line,
                }));
            }
            return Err(self.unexpected("`struct` or `enum`"));
        }
        if self.eat("struct") {
            let name = self.expect_identifier("struct name")?;
            let fields = self.parse_struct_body()?;
            self.expect(";")?;
            return Ok(Declaration::Struct(StructDef { name, fields, line }));
        }
        if self.eat("enum") {
            let name = self.expect_identifier("enum name")?;
            let backing = self.parse_backing()?;
            let values = self.parse_enum_body(backing)?;
            self.expect(";")?;
            return Ok(Declaration::Enum(EnumDef {
                name,
                backing,
                values,
                line,
            }));
        }
        Err(self.unexpected("`struct`, `enum` or `typedef`"))
    }

    /// Optional tag in `typedef struct Tag { ... } Name;`. The tag is not a
    /// usable type name; only the typedef name is declared.
    fn eat_tag(&mut self) {
        if is_identifier(&self.current().text) {
            self.index += 1;
        }
    }

    fn parse_backing(&mut self) -> Result<Primitive> {
        if !self.eat(":") {
            return Ok(Primitive::Uint32);
        }
        let token = self.current().clone();
        match Primitive::from_name(&token.text) {
            Some(primitive) if primitive.is_integer() => {
                self.index += 1;
                Ok(primitive)
            }
            _ => Err(self.error_at(
                &token,
                format!("enum backing type must be an integer primitive, found {:?}", token.text),
            )),
        }
    }

    fn parse_enum_body(&mut self, backing: Primitive) -> Result<Vec<Enumerator>> {
        self.expect("{")?;
        let mut values: Vec<Enumerator> = Vec::new();
        let mut next = 0i128;

        while !self.eat("}") {
            let token = self.current().clone();
            let name = self.expect_identifier("enumerator")?;
            let value = if self.eat("=") {
                self.expect_integer()?
            } else {
                next
            };

            if values.iter().any(|e| e.name == name) {
                return Err(SchemaError::Duplicate {
                    kind: "enumerator",
                    name,
                    file: self.file.to_path_buf(),
                    line: token.line,
                });
            }
            if let Some((min, max)) = backing.range() {
                if value < min || value > max {
                    return Err(SchemaError::EnumValueOutOfRange {
                        enumerator: name,
                        value,
                        backing: backing.name(),
                        file: self.file.to_path_buf(),
                        line: token.line,
                    });
                }
            }

            values.push(Enumerator { name, value });
            next = value + 1;

            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(values)
    }

    fn parse_struct_body(&mut self) -> Result<Vec<Field>> {
        self.expect("{")?;
        let mut fields: Vec<Field> = Vec::new();
        while !self.eat("}") {
            let field = self.parse_field()?;
            if fields.iter().any(|f| f.name == field.name) {
                return Err(SchemaError::Duplicate {
                    kind: "field",
                    name: field.name,
                    file: self.file.to_path_buf(),
                    line: field.line,
                });
            }
            fields.push(field);
        }
        Ok(fields)
    }

    fn parse_field(&mut self) -> Result<Field> {
        let line = self.current().line;
        // Elaborated C spellings: `struct Point p;`, `enum Color c;`
        let _ = self.eat("struct") || self.eat("enum");

        let type_token = self.current().clone();
        let type_name = self.expect_identifier("field type")?;
        let base = match Primitive::from_name(&type_name) {
            Some(primitive) => FieldType::Primitive(primitive),
            None if self.lookup(&type_name).is_some() => FieldType::Named(type_name),
            None => {
                return Err(SchemaError::UnknownType {
                    name: type_name,
                    file: self.file.to_path_buf(),
                    line: type_token.line,
                })
            }
        };

        let name = self.expect_identifier("field name")?;

        let ty = if self.eat("[") {
            let count = self.expect_integer()?;
            self.expect("]")?;
            if count <= 0 {
                return Err(SchemaError::InvalidArray {
                    field: name,
                    file: self.file.to_path_buf(),
                    line,
                });
            }
            FieldType::Array {
                of: Box::new(base),
                count: usize::try_from(count).map_err(|_| SchemaError::InvalidArray {
                    field: name.clone(),
                    file: self.file.to_path_buf(),
                    line,
                })?,
            }
        } else {
            base
        };

        let bits = if self.eat(":") {
            let width = self.expect_integer()?;
            Some(self.check_bit_width(&name, &ty, width, line)?)
        } else {
            None
        };

        self.expect(";")?;
        Ok(Field {
            name,
            ty,
            bits,
            line,
        })
    }

    fn check_bit_width(&self, field: &str, ty: &FieldType, width: i128, line: usize) -> Result<u32> {
        let invalid = |message: String| SchemaError::InvalidBitField {
            field: field.to_string(),
            file: self.file.to_path_buf(),
            line,
            message,
        };

        let storage = match ty {
            FieldType::Primitive(p) if p.is_integer() => *p,
            FieldType::Primitive(p) => {
                return Err(invalid(format!("{p} is not an integer type")));
            }
            FieldType::Named(name) => match self.lookup(name) {
                Some(Declaration::Enum(def)) => def.backing,
                _ => return Err(invalid(format!("{name} is not an integer or enum type"))),
            },
            FieldType::Array { .. } => {
                return Err(invalid("arrays cannot be bit-fields".to_string()));
            }
        };

        if width < 1 || width > storage.bits() as i128 {
            return Err(invalid(format!(
                "width {width} outside 1..={} for {storage}",
                storage.bits()
            )));
        }
        Ok(width as u32)
    }

    fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.declared
            .iter()
            .find(|d| d.name() == name)
            .or_else(|| self.scope.declaration(name))
    }

    fn current(&self) -> &Token {
        // The token list always ends with an end-of-file token and `index`
        // never advances past it.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn eat(&mut self, text: &str) -> bool {
        let current = self.current();
        if !current.is_eof() && current.text == text {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<()> {
        if self.eat(text) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{text}`")))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        let token = self.current();
        if is_identifier(&token.text) {
            let text = token.text.clone();
            self.index += 1;
            Ok(text)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_integer(&mut self) -> Result<i128> {
        match parse_integer(&self.current().text) {
            Some(value) => {
                self.index += 1;
                Ok(value)
            }
            None => Err(self.unexpected("integer literal")),
        }
    }

    fn unexpected(&self, expected: &str) -> SchemaError {
        let token = self.current();
        let found = if token.is_eof() {
            "end of file".to_string()
        } else {
            format!("`{}`", token.text)
        };
        self.error_at(token, format!("expected {expected} but found {found}"))
    }

    fn error_at(&self, token: &Token, message: String) -> SchemaError {
        SchemaError::Syntax {
            file: self.file.to_path_buf(),
            line: token.line,
            column: token.column,
            message,
        }
    }
}

fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text) && !KEYWORDS.contains(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Vec<Declaration>> {
        parse_declarations(text, Path::new("test.th"), &TypeScope::new())
    }

    fn only_struct(text: &str) -> StructDef {
        match parse(text).unwrap().remove(0) {
            Declaration::Struct(def) => def,
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn plain_struct() {
        let def = only_struct("struct A { uint8 x; uint16_t y; float z; };");
        assert_eq!(def.name, "A");
        let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
        assert_eq!(def.fields[1].ty, FieldType::Primitive(Primitive::Uint16));
    }

    #[test]
    fn typedef_struct_with_and_without_tag() {
        let decls = parse(
            "typedef struct { uint8 a; } Plain;\ntypedef struct tag_t { uint8 b; } Tagged;",
        )
        .unwrap();
        let names: Vec<_> = decls.iter().map(Declaration::name).collect();
        assert_eq!(names, vec!["Plain", "Tagged"]);
    }

    #[test]
    fn arrays_and_bitfields() {
        let def = only_struct("struct Px { uint8 data[32]; uint8 r : 3; uint8 g : 5; };");
        assert_eq!(
            def.fields[0].ty,
            FieldType::Array {
                of: Box::new(FieldType::Primitive(Primitive::Uint8)),
                count: 32
            }
        );
        assert_eq!(def.fields[1].bits, Some(3));
        assert_eq!(def.fields[2].bits, Some(5));
    }

    #[test]
    fn enum_positional_and_explicit_values() {
        let decls = parse("enum Mode : uint8 { Off, On = 4, Blink, Max = 0xFF };").unwrap();
        let def = decls[0].as_enum().unwrap();
        assert_eq!(def.backing, Primitive::Uint8);
        let values: Vec<_> = def.values.iter().map(|e| (e.name.as_str(), e.value)).collect();
        assert_eq!(values, vec![("Off", 0), ("On", 4), ("Blink", 5), ("Max", 255)]);
    }

    #[test]
    fn enum_defaults_to_uint32_and_allows_trailing_comma() {
        let decls = parse("typedef enum { A, B, } Letters;").unwrap();
        let def = decls[0].as_enum().unwrap();
        assert_eq!(def.name, "Letters");
        assert_eq!(def.backing, Primitive::Uint32);
        assert_eq!(def.values.len(), 2);
    }

    #[test]
    fn named_references_resolve_in_order() {
        let decls = parse(
            "enum Color : uint8 { Red, Green };\nstruct A { uint8 x; };\nstruct B { A a; Color c : 2; struct A again; };",
        )
        .unwrap();
        let b = decls[2].as_struct().unwrap();
        assert_eq!(b.fields[0].ty, FieldType::Named("A".into()));
        assert_eq!(b.fields[1].bits, Some(2));
        assert_eq!(b.fields[2].ty, FieldType::Named("A".into()));
    }

    #[test]
    fn names_from_scope_are_visible() {
        let mut scope = TypeScope::new();
        let base = parse("struct Base { uint8 v; };").unwrap().remove(0);
        scope.insert(base, Path::new("base.th"));

        let decls =
            parse_declarations("struct Derived { Base b; };", Path::new("d.th"), &scope).unwrap();
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn forward_reference_is_unknown() {
        let err = parse("struct B { A a; };\nstruct A { uint8 x; };").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { ref name, line: 1, .. } if name == "A"));
    }

    #[test]
    fn self_reference_is_unknown() {
        let err = parse("struct Node { Node next; };").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn zero_length_array() {
        let err = parse("struct A {\n uint8 data[0];\n};").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidArray { ref field, line: 2, .. } if field == "data"));
    }

    #[test]
    fn bitfield_errors() {
        for text in [
            "struct A { uint8 x : 9; };",
            "struct A { uint8 x : 0; };",
            "struct A { float x : 3; };",
            "struct A { uint8 x[2] : 3; };",
            "struct B { uint8 v; };\nstruct A { B b : 1; };",
        ] {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidBitField { .. }),
                "{text}: {err:?}"
            );
        }
    }

    #[test]
    fn enum_bitfield_uses_backing_width() {
        let err = parse("enum E : uint8 { A };\nstruct S { E e : 9; };").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBitField { .. }));
    }

    #[test]
    fn duplicates() {
        let cases = [
            ("struct A { uint8 x; };\nstruct A { uint8 y; };", "declaration"),
            ("struct A { uint8 x; uint16 x; };", "field"),
            ("enum E { A, A };", "enumerator"),
        ];
        for (text, expected) in cases {
            match parse(text).unwrap_err() {
                SchemaError::Duplicate { kind, .. } => assert_eq!(kind, expected),
                other => panic!("{text}: {other:?}"),
            }
        }
    }

    #[test]
    fn enum_value_out_of_range() {
        let err = parse("enum E : uint8 { A = 256 };").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::EnumValueOutOfRange { value: 256, backing: "uint8", .. }
        ));
        let err = parse("enum E : uint8 { A = 255, B };").unwrap_err();
        assert!(matches!(err, SchemaError::EnumValueOutOfRange { value: 256, .. }));
    }

    #[test]
    fn non_integer_backing_rejected() {
        let err = parse("enum E : float { A };").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax { .. }));
    }

    #[test]
    fn syntax_error_position() {
        let err = parse("struct A {\n  uint8 x\n};").unwrap_err();
        match err {
            SchemaError::Syntax {
                line,
                column,
                message,
                ..
            } => {
                assert_eq!((line, column), (3, 1));
                assert!(message.contains("`;`"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_at_eof() {
        let err = parse("struct A { uint8 x; }").unwrap_err();
        assert!(
            matches!(err, SchemaError::Syntax { ref message, .. } if message.contains("end of file"))
        );
    }

    #[test]
    fn empty_input() {
        assert!(parse("// nothing here\n").unwrap().is_empty());
    }
}
