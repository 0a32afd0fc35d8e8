//! Payload encoding by declared struct layout.
//!
//! Fields are little-endian at their natural width. Bit-fields occupy
//! `width` bits at `shift` within a shared storage unit, LSB first; signed
//! storage sign-extends on decode.

use gpulink_idl::{CompilationContext, FieldLayout, LayoutKind, Primitive, StructLayout};

use crate::error::{HostError, Result};
use crate::value::Value;

/// Decode a packed struct. `bytes` must hold at least `layout.size` bytes
/// from `offset`.
pub(crate) fn decode_struct(
    ctx: &CompilationContext,
    layout: &StructLayout,
    bytes: &[u8],
    offset: usize,
) -> Value {
    Value::Struct(
        layout
            .fields
            .iter()
            .map(|field| {
                (
                    field.name.clone(),
                    decode_kind(ctx, &field.kind, bytes, offset + field.offset),
                )
            })
            .collect(),
    )
}

fn decode_kind(ctx: &CompilationContext, kind: &LayoutKind, bytes: &[u8], offset: usize) -> Value {
    match kind {
        LayoutKind::Scalar(p) => decode_scalar(*p, read_uint(bytes, offset, p.size())),
        LayoutKind::Enum { name, backing } => {
            let raw = read_uint(bytes, offset, backing.size());
            enum_value(ctx, name, integer(*backing, raw, backing.bits()))
        }
        LayoutKind::Bits {
            storage,
            shift,
            width,
            enum_name,
        } => {
            let unit = read_uint(bytes, offset, storage.size());
            let raw = (unit >> shift) & mask(*width);
            let value = integer(*storage, raw, *width);
            match enum_name {
                Some(name) => enum_value(ctx, name, value),
                None if storage.is_signed() => Value::Int(value as i64),
                None => Value::UInt(value as u64),
            }
        }
        LayoutKind::Array { element, count } => Value::Array(
            (0..*count)
                .map(|i| decode_kind(ctx, element, bytes, offset + i * element.size()))
                .collect(),
        ),
        LayoutKind::Struct(layout) => decode_struct(ctx, layout, bytes, offset),
    }
}

fn decode_scalar(p: Primitive, raw: u64) -> Value {
    match p {
        Primitive::Half => Value::Float(f16_to_f64(raw as u16)),
        Primitive::Float => Value::Float(f64::from(f32::from_bits(raw as u32))),
        Primitive::Double => Value::Float(f64::from_bits(raw)),
        p if p.is_signed() => Value::Int(integer(p, raw, p.bits()) as i64),
        _ => Value::UInt(raw),
    }
}

fn enum_value(ctx: &CompilationContext, name: &str, value: i128) -> Value {
    let enumerator = ctx
        .scope()
        .declaration(name)
        .and_then(|d| d.as_enum())
        .and_then(|def| def.name_of(value))
        .map(str::to_string);
    Value::Enum {
        name: enumerator,
        value,
    }
}

/// Interpret the low `bits` of `raw` as an integer of the storage's signedness.
fn integer(storage: Primitive, raw: u64, bits: u32) -> i128 {
    if storage.is_signed() && raw & (1u64 << (bits - 1)) != 0 {
        i128::from(raw) - (1i128 << bits)
    } else {
        i128::from(raw)
    }
}

fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

fn read_uint(bytes: &[u8], offset: usize, size: usize) -> u64 {
    bytes[offset..offset + size]
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

fn write_uint(bytes: &mut [u8], offset: usize, size: usize, value: u64) {
    for (i, byte) in bytes[offset..offset + size].iter_mut().enumerate() {
        *byte = (value >> (8 * i)) as u8;
    }
}

/// Encode a struct value into a zeroed buffer of `layout.size` bytes.
pub(crate) fn encode_struct(layout: &StructLayout, value: &Value) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; layout.size];
    encode_fields(layout, value, &mut bytes, 0, &layout.name)?;
    Ok(bytes)
}

fn encode_fields(
    layout: &StructLayout,
    value: &Value,
    bytes: &mut [u8],
    offset: usize,
    path: &str,
) -> Result<()> {
    let Value::Struct(_) = value else {
        return Err(HostError::invalid(path, "expected a struct value"));
    };
    for field in &layout.fields {
        let path = format!("{path}.{}", field.name);
        let field_value = value
            .field(&field.name)
            .ok_or_else(|| HostError::invalid(&path, "missing"))?;
        encode_field(field, field_value, bytes, offset, &path)?;
    }
    Ok(())
}

fn encode_field(
    field: &FieldLayout,
    value: &Value,
    bytes: &mut [u8],
    base: usize,
    path: &str,
) -> Result<()> {
    encode_kind(&field.kind, value, bytes, base + field.offset, path)
}

fn encode_kind(
    kind: &LayoutKind,
    value: &Value,
    bytes: &mut [u8],
    offset: usize,
    path: &str,
) -> Result<()> {
    match kind {
        LayoutKind::Scalar(p) if !p.is_integer() => {
            let v = value
                .as_f64()
                .ok_or_else(|| HostError::invalid(path, "expected a number"))?;
            let raw = match p {
                Primitive::Half => u64::from(f64_to_f16(v)),
                Primitive::Float => u64::from((v as f32).to_bits()),
                _ => v.to_bits(),
            };
            write_uint(bytes, offset, p.size(), raw);
        }
        LayoutKind::Scalar(p) | LayoutKind::Enum { backing: p, .. } => {
            let v = checked_integer(value, *p, p.bits(), path)?;
            write_uint(bytes, offset, p.size(), v as u64);
        }
        LayoutKind::Bits {
            storage,
            shift,
            width,
            ..
        } => {
            let v = checked_integer(value, *storage, *width, path)?;
            let unit = read_uint(bytes, offset, storage.size());
            let unit = unit | (((v as u64) & mask(*width)) << shift);
            write_uint(bytes, offset, storage.size(), unit);
        }
        LayoutKind::Array { element, count } => {
            let Value::Array(items) = value else {
                return Err(HostError::invalid(path, "expected an array"));
            };
            if items.len() != *count {
                return Err(HostError::invalid(
                    path,
                    format!("expected {count} elements, got {}", items.len()),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let path = format!("{path}[{i}]");
                encode_kind(element, item, bytes, offset + i * element.size(), &path)?;
            }
        }
        LayoutKind::Struct(layout) => encode_fields(layout, value, bytes, offset, path)?,
    }
    Ok(())
}

fn checked_integer(value: &Value, storage: Primitive, bits: u32, path: &str) -> Result<i128> {
    let v = value
        .as_i128()
        .ok_or_else(|| HostError::invalid(path, "expected an integer"))?;
    let (min, max) = if storage.is_signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if v < min || v > max {
        return Err(HostError::invalid(
            path,
            format!("{v} out of range {min}..={max}"),
        ));
    }
    Ok(v)
}

/// Build a [`Value`] for `layout` from JSON.
///
/// Enums accept an enumerator name or a number. `char` arrays also accept a
/// string, zero-padded to the array length.
pub(crate) fn value_from_json(
    ctx: &CompilationContext,
    layout: &StructLayout,
    json: &serde_json::Value,
    path: &str,
) -> Result<Value> {
    let object = json
        .as_object()
        .ok_or_else(|| HostError::invalid(path, "expected a JSON object"))?;
    if let Some(unknown) = object
        .keys()
        .find(|key| !layout.fields.iter().any(|f| &f.name == *key))
    {
        return Err(HostError::invalid(&format!("{path}.{unknown}"), "no such field"));
    }

    let mut fields = Vec::with_capacity(layout.fields.len());
    for field in &layout.fields {
        let path = format!("{path}.{}", field.name);
        let json = object
            .get(&field.name)
            .ok_or_else(|| HostError::invalid(&path, "missing"))?;
        fields.push((field.name.clone(), kind_from_json(ctx, &field.kind, json, &path)?));
    }
    Ok(Value::Struct(fields))
}

fn kind_from_json(
    ctx: &CompilationContext,
    kind: &LayoutKind,
    json: &serde_json::Value,
    path: &str,
) -> Result<Value> {
    match kind {
        LayoutKind::Scalar(p) if !p.is_integer() => json
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| HostError::invalid(path, "expected a number")),
        LayoutKind::Scalar(p)
        | LayoutKind::Bits {
            storage: p,
            enum_name: None,
            ..
        } => json_integer(json, p.is_signed(), path),
        LayoutKind::Enum { name, .. }
        | LayoutKind::Bits {
            enum_name: Some(name),
            ..
        } => {
            let def = ctx
                .scope()
                .declaration(name)
                .and_then(|d| d.as_enum())
                .ok_or_else(|| HostError::invalid(path, format!("unknown enum `{name}`")))?;
            let value = match json {
                serde_json::Value::String(enumerator) => def.value_of(enumerator).ok_or_else(|| {
                    HostError::invalid(path, format!("`{enumerator}` is not a {name} value"))
                })?,
                other => other
                    .as_i64()
                    .map(i128::from)
                    .or_else(|| other.as_u64().map(i128::from))
                    .ok_or_else(|| HostError::invalid(path, "expected an integer"))?,
            };
            Ok(Value::Enum {
                name: def.name_of(value).map(str::to_string),
                value,
            })
        }
        LayoutKind::Array { element, count } => {
            if let (LayoutKind::Scalar(Primitive::Char), Some(text)) = (element.as_ref(), json.as_str())
            {
                if text.len() > *count {
                    return Err(HostError::invalid(
                        path,
                        format!("string of {} bytes does not fit {count}", text.len()),
                    ));
                }
                let mut items: Vec<Value> = text.bytes().map(|b| Value::UInt(u64::from(b))).collect();
                items.resize(*count, Value::UInt(0));
                return Ok(Value::Array(items));
            }
            let items = json
                .as_array()
                .ok_or_else(|| HostError::invalid(path, "expected an array"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| kind_from_json(ctx, element, item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        LayoutKind::Struct(layout) => value_from_json(ctx, layout, json, path),
    }
}

fn json_integer(json: &serde_json::Value, signed: bool, path: &str) -> Result<Value> {
    let value = if signed {
        json.as_i64().map(Value::Int)
    } else {
        json.as_u64().map(Value::UInt)
    };
    value.ok_or_else(|| {
        let expected = if signed { "an integer" } else { "a non-negative integer" };
        HostError::invalid(path, format!("expected {expected}"))
    })
}

/// IEEE-754 binary16 to f64.
pub(crate) fn f16_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let fraction = f64::from(bits & 0x03ff);
    match exponent {
        0 => sign * fraction * 2f64.powi(-24),
        0x1f if fraction == 0.0 => sign * f64::INFINITY,
        0x1f => f64::NAN,
        _ => sign * (1.0 + fraction / 1024.0) * 2f64.powi(exponent - 15),
    }
}

/// f64 to IEEE-754 binary16, rounding to nearest even.
pub(crate) fn f64_to_f16(value: f64) -> u16 {
    let bits = (value as f32).to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        return sign | 0x7c00 | if mantissa != 0 { 0x0200 } else { 0 };
    }
    let half_exponent = exponent - 127 + 15;
    if half_exponent >= 0x1f {
        return sign | 0x7c00;
    }
    if half_exponent <= 0 {
        if half_exponent < -10 {
            return sign;
        }
        let m = mantissa | 0x0080_0000;
        let shift = (14 - half_exponent) as u32;
        let halfway = 1u32 << (shift - 1);
        let rounded = (m + halfway - 1 + ((m >> shift) & 1)) >> shift;
        return sign | rounded as u16;
    }

    let rounded = mantissa + 0x0fff + ((mantissa >> 13) & 1);
    if rounded & 0x0080_0000 != 0 {
        let half_exponent = half_exponent + 1;
        if half_exponent >= 0x1f {
            return sign | 0x7c00;
        }
        return sign | ((half_exponent as u16) << 10);
    }
    sign | ((half_exponent as u16) << 10) | ((rounded >> 13) as u16)
}
