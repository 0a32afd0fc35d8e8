//! Declarations produced by the parser.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Char,
    /// IEEE-754 binary16.
    Half,
    Float,
    Double,
}

impl Primitive {
    /// Look up a primitive by its schema spelling. `stdint` aliases
    /// (`uint8_t`, ...) are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        let primitive = match name {
            "uint8" | "uint8_t" => Primitive::Uint8,
            "uint16" | "uint16_t" => Primitive::Uint16,
            "uint32" | "uint32_t" => Primitive::Uint32,
            "uint64" | "uint64_t" => Primitive::Uint64,
            "int8" | "int8_t" => Primitive::Int8,
            "int16" | "int16_t" => Primitive::Int16,
            "int32" | "int32_t" => Primitive::Int32,
            "int64" | "int64_t" => Primitive::Int64,
            "char" => Primitive::Char,
            "half" => Primitive::Half,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            _ => return None,
        };
        Some(primitive)
    }

    /// Canonical schema spelling.
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Char => "char",
            Primitive::Half => "half",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    /// Wire size in bytes.
    pub fn size(self) -> usize {
        match self {
            Primitive::Uint8 | Primitive::Int8 | Primitive::Char => 1,
            Primitive::Uint16 | Primitive::Int16 | Primitive::Half => 2,
            Primitive::Uint32 | Primitive::Int32 | Primitive::Float => 4,
            Primitive::Uint64 | Primitive::Int64 | Primitive::Double => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.size() as u32 * 8
    }

    /// Integer types, including `char`, may carry bit widths and back enums.
    pub fn is_integer(self) -> bool {
        !matches!(self, Primitive::Half | Primitive::Float | Primitive::Double)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64
        )
    }

    /// Inclusive value range of an integer primitive.
    pub fn range(self) -> Option<(i128, i128)> {
        if !self.is_integer() {
            return None;
        }
        let bits = self.bits();
        if self.is_signed() {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a struct field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// A previously declared enum or struct.
    Named(String),
    Array { of: Box<FieldType>, count: usize },
}

impl FieldType {
    /// Innermost element type of an array, or the type itself.
    pub fn element(&self) -> &FieldType {
        match self {
            FieldType::Array { of, .. } => of.element(),
            other => other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => write!(f, "{p}"),
            FieldType::Named(name) => f.write_str(name),
            FieldType::Array { of, count } => write!(f, "{of}[{count}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// Bit width for bit-fields.
    pub bits: Option<u32>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub name: String,
    pub value: i128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    /// Integer type carrying the value on the wire. Default: `uint32`.
    pub backing: Primitive,
    pub values: Vec<Enumerator>,
    pub line: usize,
}

impl EnumDef {
    pub fn name_of(&self, value: i128) -> Option<&str> {
        self.values
            .iter()
            .find(|e| e.value == value)
            .map(|e| e.name.as_str())
    }

    pub fn value_of(&self, name: &str) -> Option<i128> {
        self.values.iter().find(|e| e.name == name).map(|e| e.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    /// Fields in declaration order; this order is the wire order.
    pub fields: Vec<Field>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Enum(EnumDef),
    Struct(StructDef),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Enum(def) => &def.name,
            Declaration::Struct(def) => &def.name,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Declaration::Enum(def) => def.line,
            Declaration::Struct(def) => def.line,
        }
    }

    pub fn as_struct(&self) -> Option<&StructDef> {
        match self {
            Declaration::Struct(def) => Some(def),
            Declaration::Enum(_) => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDef> {
        match self {
            Declaration::Enum(def) => Some(def),
            Declaration::Struct(_) => None,
        }
    }
}

/// A declaration together with the file that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedType {
    pub declaration: Declaration,
    pub file: PathBuf,
}

/// Names visible to the parser, keyed by declared name.
#[derive(Debug, Clone, Default)]
pub struct TypeScope {
    entries: HashMap<String, ScopedType>,
}

impl TypeScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ScopedType> {
        self.entries.get(name)
    }

    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.entries.get(name).map(|entry| &entry.declaration)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Insert a declaration, returning the entry it replaced.
    pub fn insert(&mut self, declaration: Declaration, file: &Path) -> Option<ScopedType> {
        self.entries.insert(
            declaration.name().to_string(),
            ScopedType {
                declaration,
                file: file.to_path_buf(),
            },
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdint_aliases() {
        assert_eq!(Primitive::from_name("uint16_t"), Some(Primitive::Uint16));
        assert_eq!(Primitive::from_name("uint16"), Some(Primitive::Uint16));
        assert_eq!(Primitive::from_name("bool"), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(Primitive::Uint8.range(), Some((0, 255)));
        assert_eq!(Primitive::Int16.range(), Some((-32768, 32767)));
        assert_eq!(Primitive::Uint64.range(), Some((0, u64::MAX as i128)));
        assert_eq!(Primitive::Float.range(), None);
    }

    #[test]
    fn array_display() {
        let ty = FieldType::Array {
            of: Box::new(FieldType::Primitive(Primitive::Uint8)),
            count: 32,
        };
        assert_eq!(ty.to_string(), "uint8[32]");
        assert_eq!(ty.element(), &FieldType::Primitive(Primitive::Uint8));
    }
}
