// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Little-endian field readers over one raw block.
//!
//! Every reader returns a finished [`Field`]. Out-of-range reads and
//! malformed text degrade into `unknown` fields whose provenance carries the
//! reason, so a single bad range never aborts a group.

use crate::snapshot::BlockId;
use crate::units::Unit;
use crate::value::{DisplayHint, Field, Provenance, Value};

/// View over one block's bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Block<'a> {
    id: &'a BlockId,
    bytes: &'a [u8],
    base: usize,
}

impl<'a> Block<'a> {
    pub(crate) fn new(id: &'a BlockId, bytes: &'a [u8]) -> Self {
        Self { id, bytes, base: 0 }
    }

    /// A sub-view starting at `offset` (offsets in provenance stay absolute).
    pub(crate) fn at(&self, offset: usize, len: usize) -> Self {
        let start = offset.min(self.bytes.len());
        let end = offset.saturating_add(len).min(self.bytes.len());
        Self {
            id: self.id,
            bytes: &self.bytes[start..end],
            base: self.base + offset,
        }
    }

    pub(crate) fn id(&self) -> &'a BlockId {
        self.id
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn prov(&self, offset: usize, len: usize) -> Provenance {
        Provenance::block(self.id, self.base + offset, self.base + offset + len)
    }

    pub(crate) fn slice(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.bytes.get(offset..offset.checked_add(len)?)
    }

    /// Little-endian unsigned integer of `len` (1..=16) bytes.
    pub(crate) fn le(&self, offset: usize, len: usize) -> Option<u128> {
        let raw = self.slice(offset, len)?;
        Some(
            raw.iter()
                .rev()
                .fold(0u128, |acc, &b| (acc << 8) | u128::from(b)),
        )
    }

    pub(crate) fn byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    fn truncated(&self, offset: usize, len: usize, unit: Unit) -> Field {
        Field::unknown(unit, self.prov(offset, len), "truncated block")
    }

    /// Integer field.
    pub(crate) fn int(&self, offset: usize, len: usize, unit: Unit) -> Field {
        match self.le(offset, len) {
            Some(v) => Field::new(Value::Int(v), unit, self.prov(offset, len)),
            None => self.truncated(offset, len, unit),
        }
    }

    /// Integer field rendered in hex.
    pub(crate) fn hex(&self, offset: usize, len: usize) -> Field {
        self.int(offset, len, Unit::Unitless).with_hint(DisplayHint::HEX)
    }

    /// Integer transformed by `f` (bit extraction, `+1` counts, scaling).
    pub(crate) fn int_with(
        &self,
        offset: usize,
        len: usize,
        unit: Unit,
        f: impl FnOnce(u128) -> Value,
    ) -> Field {
        match self.le(offset, len) {
            Some(v) => Field::new(f(v), unit, self.prov(offset, len)),
            None => self.truncated(offset, len, unit),
        }
    }

    /// Bits `lo..=hi` of the integer at `offset`.
    pub(crate) fn bits(&self, offset: usize, len: usize, lo: u32, hi: u32, unit: Unit) -> Field {
        self.int_with(offset, len, unit, |v| Value::Int(extract(v, lo, hi)))
    }

    /// Single flag bit.
    pub(crate) fn flag(&self, offset: usize, len: usize, bit: u32) -> Field {
        self.int_with(offset, len, Unit::Unitless, |v| Value::Bool((v >> bit) & 1 == 1))
    }

    /// Symbol looked up from bits `lo..=hi`.
    pub(crate) fn symbol(
        &self,
        offset: usize,
        len: usize,
        lo: u32,
        hi: u32,
        table: &[(u128, &str)],
    ) -> Field {
        self.int_with(offset, len, Unit::Unitless, |v| {
            let code = extract(v, lo, hi);
            let name = table
                .iter()
                .find(|(c, _)| *c == code)
                .map_or("reserved", |(_, n)| *n);
            Value::Enum(name.to_owned())
        })
    }

    /// Kelvin temperature; zero means the sensor is not reported.
    pub(crate) fn kelvin(&self, offset: usize) -> Field {
        self.int_with(offset, 2, Unit::Kelvin, |v| {
            if v == 0 {
                Value::Absent
            } else {
                Value::Int(v)
            }
        })
    }

    /// Space/NUL padded ASCII. Empty text is `absent`, non-ASCII is `unknown`.
    pub(crate) fn ascii(&self, offset: usize, len: usize) -> Field {
        let Some(raw) = self.slice(offset, len) else {
            return self.truncated(offset, len, Unit::Unitless);
        };
        let prov = self.prov(offset, len);
        if !raw.iter().all(|b| *b == 0 || (0x20..0x7f).contains(b)) {
            return Field::unknown(Unit::Unitless, prov, "non-ascii bytes in text field");
        }
        let text: String = raw
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| char::from(*b))
            .collect();
        let text = text.trim();
        if text.is_empty() {
            Field::new(Value::Absent, Unit::Unitless, prov)
        } else {
            Field::new(Value::Text(text.to_owned()), Unit::Unitless, prov)
        }
    }

    /// Raw bytes; all-zero identifiers are `absent` when `zero_is_absent`.
    pub(crate) fn raw(&self, offset: usize, len: usize, zero_is_absent: bool) -> Field {
        match self.slice(offset, len) {
            Some(b) if zero_is_absent && b.iter().all(|x| *x == 0) => {
                Field::new(Value::Absent, Unit::Unitless, self.prov(offset, len))
            }
            Some(b) => Field::new(Value::Bytes(b.to_vec()), Unit::Unitless, self.prov(offset, len)),
            None => self.truncated(offset, len, Unit::Unitless),
        }
    }
}

/// Bits `lo..=hi` of `v`.
pub(crate) fn extract(v: u128, lo: u32, hi: u32) -> u128 {
    let width = hi - lo + 1;
    let mask = if width >= 128 { u128::MAX } else { (1u128 << width) - 1 };
    (v >> lo) & mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_and_128_bit() {
        let id = BlockId::Smart;
        let mut bytes = vec![0u8; 32];
        bytes[0] = 0x34;
        bytes[1] = 0x12;
        bytes[16..32].copy_from_slice(&u128::MAX.to_le_bytes());
        let b = Block::new(&id, &bytes);
        assert_eq!(b.le(0, 2), Some(0x1234));
        assert_eq!(b.int(16, 16, Unit::DataUnits).value(), &Value::Int(u128::MAX));
        assert_eq!(b.le(31, 2), None);
    }

    #[test]
    fn truncated_reads_become_unknown() {
        let id = BlockId::Smart;
        let b = Block::new(&id, &[1, 2]);
        let f = b.int(1, 4, Unit::Count);
        assert_eq!(f.value(), &Value::Unknown);
        assert_eq!(f.provenance().error(), Some("truncated block"));
    }

    #[test]
    fn ascii_edge_cases() {
        let id = BlockId::IdentifyController;
        let bytes = b"AB  \0\0\xffX    ";
        let b = Block::new(&id, bytes);
        assert_eq!(b.ascii(0, 6).value(), &Value::Text("AB".into()));
        assert_eq!(b.ascii(2, 4).value(), &Value::Absent);
        assert_eq!(b.ascii(6, 2).value(), &Value::Unknown);
    }

    #[test]
    fn sub_views_keep_absolute_offsets() {
        let id = BlockId::ErrorLog;
        let bytes = [0u8; 128];
        let entry = Block::new(&id, &bytes).at(64, 64);
        assert_eq!(
            entry.int(8, 2, Unit::Unitless).provenance(),
            &Provenance::block(&id, 72, 74)
        );
    }

    #[test]
    fn zero_kelvin_is_absent() {
        let id = BlockId::Smart;
        let b = Block::new(&id, &[0, 0, 0x36, 0x01]);
        assert_eq!(b.kelvin(0).value(), &Value::Absent);
        assert_eq!(b.kelvin(2).value(), &Value::Int(310));
    }

    #[test]
    fn bit_extraction() {
        assert_eq!(extract(0b1011_0110, 4, 6), 0b011);
        assert_eq!(extract(u128::MAX, 0, 127), u128::MAX);
    }
}
