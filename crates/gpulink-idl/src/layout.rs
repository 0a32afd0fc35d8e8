//! Wire layout of structs.
//!
//! Fields are laid out in declaration order with no padding. Bit-fields pack
//! LSB-first into a storage unit of their integer type (an enum's backing
//! type), and consecutive bit-fields of one storage type share the unit.
//!
//! A run must fill its unit exactly. Packed C++ structs place bit-fields at
//! bit granularity while `ctypes` allocates whole units, and the two only
//! agree when no unit is left partially used or overflowed.

use std::path::Path;

use crate::context::CompilationContext;
use crate::error::{Result, SchemaError};
use crate::model::{Declaration, Field, FieldType, Primitive};

/// Largest message payload the 16-bit frame size field can carry.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutKind {
    Scalar(Primitive),
    Enum {
        name: String,
        backing: Primitive,
    },
    /// `width` bits at `shift` within the storage unit at the field offset.
    Bits {
        storage: Primitive,
        shift: u32,
        width: u32,
        /// Set when the bit-field's declared type is an enum.
        enum_name: Option<String>,
    },
    Array {
        element: Box<LayoutKind>,
        count: usize,
    },
    Struct(Box<StructLayout>),
}

impl LayoutKind {
    /// Bytes occupied; for bit-fields, the size of the shared storage unit.
    ///
    /// Layouts built by [`struct_layout`] never overflow here.
    pub fn size(&self) -> usize {
        match self {
            LayoutKind::Scalar(p) => p.size(),
            LayoutKind::Enum { backing, .. } => backing.size(),
            LayoutKind::Bits { storage, .. } => storage.size(),
            LayoutKind::Array { element, count } => element.size() * count,
            LayoutKind::Struct(layout) => layout.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    pub kind: LayoutKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub name: String,
    /// Packed size in bytes; equals the payload size of a message.
    pub size: usize,
    pub fields: Vec<FieldLayout>,
}

struct BitUnit<'a> {
    storage: Primitive,
    used: u32,
    last: &'a Field,
}

impl BitUnit<'_> {
    fn is_full(&self) -> bool {
        self.used == self.storage.bits()
    }
}

/// Compute the packed layout of a declared struct.
pub fn struct_layout(ctx: &CompilationContext, name: &str) -> Result<StructLayout> {
    let def = ctx.struct_def(name)?;
    let file = ctx
        .lookup(name)
        .map(|entry| entry.file.clone())
        .unwrap_or_default();
    let overflow = || SchemaError::LayoutOverflow {
        name: def.name.clone(),
    };

    let mut offset = 0usize;
    let mut unit: Option<BitUnit> = None;
    let mut fields = Vec::with_capacity(def.fields.len());

    for field in &def.fields {
        let Some(width) = field.bits else {
            if let Some(open) = unit.take() {
                return Err(unfilled(&open, &file));
            }
            let kind = kind_of(ctx, &field.ty, &def.name)?;
            fields.push(FieldLayout {
                name: field.name.clone(),
                offset,
                kind: kind.clone(),
            });
            offset = offset.checked_add(kind.size()).ok_or_else(overflow)?;
            continue;
        };

        let (storage, enum_name) = bit_storage(ctx, field)?;
        let shift = match unit.as_mut() {
            Some(open) if open.storage != storage => {
                return Err(invalid_bits(
                    field,
                    &file,
                    format!(
                        "starts a `{storage}` run while a `{}` run has {} unused bits",
                        open.storage,
                        open.storage.bits() - open.used
                    ),
                ));
            }
            Some(open) if open.used + width > storage.bits() => {
                return Err(invalid_bits(
                    field,
                    &file,
                    format!(
                        "{width} bits overflow the `{storage}` unit ({} of {} bits free)",
                        storage.bits() - open.used,
                        storage.bits()
                    ),
                ));
            }
            Some(open) => {
                let shift = open.used;
                open.used += width;
                open.last = field;
                shift
            }
            None => {
                offset = offset.checked_add(storage.size()).ok_or_else(overflow)?;
                unit = Some(BitUnit {
                    storage,
                    used: width,
                    last: field,
                });
                0
            }
        };
        fields.push(FieldLayout {
            name: field.name.clone(),
            offset: offset - storage.size(),
            kind: LayoutKind::Bits {
                storage,
                shift,
                width,
                enum_name,
            },
        });
        if unit.as_ref().is_some_and(BitUnit::is_full) {
            unit = None;
        }
    }
    if let Some(open) = unit {
        return Err(unfilled(&open, &file));
    }

    Ok(StructLayout {
        name: def.name.clone(),
        size: offset,
        fields,
    })
}

fn invalid_bits(field: &Field, file: &Path, message: String) -> SchemaError {
    SchemaError::InvalidBitField {
        field: field.name.clone(),
        file: file.to_path_buf(),
        line: field.line,
        message,
    }
}

fn unfilled(unit: &BitUnit, file: &Path) -> SchemaError {
    invalid_bits(
        unit.last,
        file,
        format!(
            "ends a `{}` run with {} unused bits; pad the run to {} bits",
            unit.storage,
            unit.storage.bits() - unit.used,
            unit.storage.bits()
        ),
    )
}

fn kind_of(ctx: &CompilationContext, ty: &FieldType, owner: &str) -> Result<LayoutKind> {
    match ty {
        FieldType::Primitive(p) => Ok(LayoutKind::Scalar(*p)),
        FieldType::Named(name) => match ctx.lookup(name).map(|entry| &entry.declaration) {
            Some(Declaration::Enum(def)) => Ok(LayoutKind::Enum {
                name: def.name.clone(),
                backing: def.backing,
            }),
            Some(Declaration::Struct(def)) => {
                Ok(LayoutKind::Struct(Box::new(struct_layout(ctx, &def.name)?)))
            }
            None => Err(SchemaError::UnknownStruct(name.clone())),
        },
        FieldType::Array { of, count } => {
            let element = kind_of(ctx, of, owner)?;
            if element.size().checked_mul(*count).is_none() {
                return Err(SchemaError::LayoutOverflow {
                    name: owner.to_string(),
                });
            }
            Ok(LayoutKind::Array {
                element: Box::new(element),
                count: *count,
            })
        }
    }
}

fn bit_storage(ctx: &CompilationContext, field: &Field) -> Result<(Primitive, Option<String>)> {
    match &field.ty {
        FieldType::Primitive(p) => Ok((*p, None)),
        FieldType::Named(name) => match ctx.lookup(name).map(|entry| &entry.declaration) {
            Some(Declaration::Enum(def)) => Ok((def.backing, Some(def.name.clone()))),
            _ => Err(SchemaError::UnknownStruct(name.clone())),
        },
        FieldType::Array { .. } => Err(SchemaError::UnknownStruct(field.ty.to_string())),
    }
}
