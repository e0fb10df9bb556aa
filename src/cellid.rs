//! Composite cell-identifier codec
//!
//! A calorimeter cell is identified by a packed 64-bit key whose sub-fields
//! (layer, stave, module, ...) are laid out according to a descriptor
//! string attached to each hit collection, e.g.
//! `"module:3,stave:4,layer:6,x:32:-16,y:-16"`. A field spec is either
//! `name:width` (placed right after the previous field) or
//! `name:start:width`; a negative width marks the field as signed.

use crate::Result;
use anyhow::{bail, ensure, format_err, Context};

/// One sub-field of the packed cell identifier
struct BitField {
    name: String,
    offset: u32,
    width: u32,
    signed: bool,
}

/// Decoder/encoder for packed cell identifiers, built from a collection's
/// encoding descriptor string
pub struct CellIdCodec {
    fields: Vec<BitField>,
}
//
impl CellIdCodec {
    /// Parse an encoding descriptor
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut fields: Vec<BitField> = Vec::new();
        let mut next_offset = 0u32;
        for spec in descriptor.split(',') {
            let tokens: Vec<&str> = spec.split(':').map(str::trim).collect();
            let (name, offset, width_token) = match tokens.as_slice() {
                [name, width] => (*name, next_offset, *width),
                [name, offset, width] => {
                    let offset = offset
                        .parse::<u32>()
                        .with_context(|| format!("bad field offset in \"{spec}\""))?;
                    (*name, offset, *width)
                }
                _ => bail!("malformed cell ID field spec \"{spec}\" in \"{descriptor}\""),
            };
            ensure!(!name.is_empty(), "empty field name in \"{descriptor}\"");
            let width = width_token
                .parse::<i32>()
                .with_context(|| format!("bad field width in \"{spec}\""))?;
            let signed = width < 0;
            let width = width.unsigned_abs();
            ensure!(
                width > 0 && offset + width <= 64,
                "field \"{name}\" does not fit in a 64-bit cell ID"
            );
            next_offset = offset + width;
            fields.push(BitField {
                name: name.to_owned(),
                offset,
                width,
                signed,
            });
        }
        ensure!(!fields.is_empty(), "empty cell ID encoding descriptor");
        Ok(Self { fields })
    }

    fn field(&self, name: &str) -> Result<&BitField> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .ok_or_else(|| format_err!("no field \"{name}\" in cell ID encoding"))
    }

    /// Extract one named sub-field from a packed cell identifier
    pub fn decode(&self, cell_id: u64, name: &str) -> Result<i64> {
        let field = self.field(name)?;
        let mask = mask_of(field.width);
        let raw = (cell_id >> field.offset) & mask;
        let value = if field.signed && raw & (1 << (field.width - 1)) != 0 {
            (raw | !mask) as i64
        } else {
            raw as i64
        };
        Ok(value)
    }

    /// Pack named sub-field values into a cell identifier
    ///
    /// Fields that are not mentioned stay zero.
    pub fn encode(&self, values: &[(&str, i64)]) -> Result<u64> {
        let mut cell_id = 0u64;
        for &(name, value) in values {
            let field = self.field(name)?;
            let mask = mask_of(field.width);
            let raw = (value as u64) & mask;
            // reject values that do not survive the field's range
            let check = if field.signed && raw & (1 << (field.width - 1)) != 0 {
                (raw | !mask) as i64
            } else {
                raw as i64
            };
            ensure!(
                check == value,
                "value {value} does not fit in cell ID field \"{name}\""
            );
            cell_id |= raw << field.offset;
        }
        Ok(cell_id)
    }
}

fn mask_of(width: u32) -> u64 {
    if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = "module:3,stave:4,layer:6,x:32:-16,y:-16";

    #[test]
    fn unsigned_fields_round_trip() {
        let codec = CellIdCodec::parse(DESCRIPTOR).unwrap();
        let id = codec
            .encode(&[("module", 5), ("stave", 11), ("layer", 42)])
            .unwrap();
        assert_eq!(codec.decode(id, "module").unwrap(), 5);
        assert_eq!(codec.decode(id, "stave").unwrap(), 11);
        assert_eq!(codec.decode(id, "layer").unwrap(), 42);
    }

    #[test]
    fn signed_fields_round_trip() {
        let codec = CellIdCodec::parse(DESCRIPTOR).unwrap();
        let id = codec.encode(&[("x", -123), ("y", -1)]).unwrap();
        assert_eq!(codec.decode(id, "x").unwrap(), -123);
        assert_eq!(codec.decode(id, "y").unwrap(), -1);
    }

    #[test]
    fn explicit_offsets_are_honored() {
        let codec = CellIdCodec::parse("a:4,b:32:8").unwrap();
        let id = codec.encode(&[("b", 0xff)]).unwrap();
        assert_eq!(id, 0xff_0000_0000);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let codec = CellIdCodec::parse(DESCRIPTOR).unwrap();
        assert!(codec.encode(&[("module", 8)]).is_err());
        assert!(codec.encode(&[("x", 40000)]).is_err());
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        assert!(CellIdCodec::parse("").is_err());
        assert!(CellIdCodec::parse("name").is_err());
        assert!(CellIdCodec::parse("a:0").is_err());
        assert!(CellIdCodec::parse("a:60,b:10").is_err());
    }

    #[test]
    fn unknown_field_is_an_error() {
        let codec = CellIdCodec::parse(DESCRIPTOR).unwrap();
        assert!(codec.decode(0, "tower").is_err());
    }
}
