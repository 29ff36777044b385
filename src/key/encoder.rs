//! Canonical structural encoding of `Serialize` values.
//!
//! Every value is written as a one-byte tag followed by its payload, and every
//! compound value is closed by an end tag, so the encoding is prefix-free:
//! concatenating encodings never makes two different values look alike.
//! Map entries (and, when configured, sequence elements) are encoded into
//! their own buffers and emitted in sorted order.

use std::hash::Hasher;

use serde::ser::{self, Serialize};

use super::fnv::Fnv1a;
use crate::config::KeyConfig;
use crate::error::KeyError;

/// Destination for encoded bytes.
pub trait Sink {
    fn put(&mut self, bytes: &[u8]);
}

impl Sink for Vec<u8> {
    fn put(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

impl Sink for Fnv1a {
    fn put(&mut self, bytes: &[u8]) {
        self.write(bytes);
    }
}

mod tag {
    pub const UNIT: u8 = 0x00;
    pub const BOOL: u8 = 0x01;
    pub const I8: u8 = 0x02;
    pub const I16: u8 = 0x03;
    pub const I32: u8 = 0x04;
    pub const I64: u8 = 0x05;
    pub const I128: u8 = 0x06;
    pub const U8: u8 = 0x07;
    pub const U16: u8 = 0x08;
    pub const U32: u8 = 0x09;
    pub const U64: u8 = 0x0a;
    pub const U128: u8 = 0x0b;
    pub const F32: u8 = 0x0c;
    pub const F64: u8 = 0x0d;
    pub const CHAR: u8 = 0x0e;
    pub const STR: u8 = 0x0f;
    pub const BYTES: u8 = 0x10;
    pub const NONE: u8 = 0x11;
    pub const SOME: u8 = 0x12;
    pub const UNIT_STRUCT: u8 = 0x13;
    pub const UNIT_VARIANT: u8 = 0x14;
    pub const NEWTYPE_STRUCT: u8 = 0x15;
    pub const NEWTYPE_VARIANT: u8 = 0x16;
    pub const SEQ: u8 = 0x17;
    pub const TUPLE: u8 = 0x18;
    pub const TUPLE_STRUCT: u8 = 0x19;
    pub const TUPLE_VARIANT: u8 = 0x1a;
    pub const MAP: u8 = 0x1b;
    pub const STRUCT: u8 = 0x1c;
    pub const STRUCT_VARIANT: u8 = 0x1d;
    pub const SKIPPED: u8 = 0x1e;
    pub const END: u8 = 0xff;
}

/// Encodes `value` into `sink`.
pub fn encode_into<S, P>(sink: &mut S, value: &P, config: KeyConfig) -> Result<(), KeyError>
where
    S: Sink + ?Sized,
    P: Serialize + ?Sized,
{
    let mut encoder = Encoder::new(sink, config);
    value.serialize(&mut encoder)
}

/// Encodes `value` into a fresh buffer.
pub fn encode_to_vec<P: Serialize + ?Sized>(value: &P, config: KeyConfig) -> Result<Vec<u8>, KeyError> {
    let mut buffer = Vec::new();
    encode_into(&mut buffer, value, config)?;
    Ok(buffer)
}

pub struct Encoder<'s, S: ?Sized> {
    sink: &'s mut S,
    depth: usize,
    config: KeyConfig,
}

impl<'s, S: Sink + ?Sized> Encoder<'s, S> {
    pub fn new(sink: &'s mut S, config: KeyConfig) -> Self {
        Self {
            sink,
            depth: 0,
            config,
        }
    }

    fn tag(&mut self, tag: u8) {
        self.sink.put(&[tag]);
    }

    fn scalar(&mut self, tag: u8, bytes: &[u8]) -> Result<(), KeyError> {
        self.tag(tag);
        self.sink.put(bytes);
        Ok(())
    }

    fn len(&mut self, len: usize) {
        self.sink.put(&(len as u64).to_le_bytes());
    }

    fn name(&mut self, name: &str) {
        self.len(name.len());
        self.sink.put(name.as_bytes());
    }

    fn variant(&mut self, name: &str, index: u32) {
        self.name(name);
        self.sink.put(&index.to_le_bytes());
    }

    fn enter(&mut self) -> Result<(), KeyError> {
        if self.depth >= self.config.max_depth {
            return Err(KeyError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn open<'a>(
        encoder: &'a mut Self,
        tag: u8,
        sorted: bool,
    ) -> Result<Compound<'a, 's, S>, KeyError> {
        encoder.enter()?;
        encoder.tag(tag);
        Ok(Compound {
            encoder,
            sorted: sorted.then(Sorted::default),
        })
    }

    fn wrapped<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        value.serialize(&mut *self)?;
        self.leave();
        Ok(())
    }
}

impl<'a, 's, S: Sink + ?Sized> ser::Serializer for &'a mut Encoder<'s, S> {
    type Ok = ();
    type Error = KeyError;

    type SerializeSeq = Compound<'a, 's, S>;
    type SerializeTuple = Compound<'a, 's, S>;
    type SerializeTupleStruct = Compound<'a, 's, S>;
    type SerializeTupleVariant = Compound<'a, 's, S>;
    type SerializeMap = Compound<'a, 's, S>;
    type SerializeStruct = Compound<'a, 's, S>;
    type SerializeStructVariant = Compound<'a, 's, S>;

    fn is_human_readable(&self) -> bool {
        false
    }

    fn serialize_bool(self, v: bool) -> Result<(), KeyError> {
        self.scalar(tag::BOOL, &[u8::from(v)])
    }

    fn serialize_i8(self, v: i8) -> Result<(), KeyError> {
        self.scalar(tag::I8, &v.to_le_bytes())
    }

    fn serialize_i16(self, v: i16) -> Result<(), KeyError> {
        self.scalar(tag::I16, &v.to_le_bytes())
    }

    fn serialize_i32(self, v: i32) -> Result<(), KeyError> {
        self.scalar(tag::I32, &v.to_le_bytes())
    }

    fn serialize_i64(self, v: i64) -> Result<(), KeyError> {
        self.scalar(tag::I64, &v.to_le_bytes())
    }

    fn serialize_i128(self, v: i128) -> Result<(), KeyError> {
        self.scalar(tag::I128, &v.to_le_bytes())
    }

    fn serialize_u8(self, v: u8) -> Result<(), KeyError> {
        self.scalar(tag::U8, &[v])
    }

    fn serialize_u16(self, v: u16) -> Result<(), KeyError> {
        self.scalar(tag::U16, &v.to_le_bytes())
    }

    fn serialize_u32(self, v: u32) -> Result<(), KeyError> {
        self.scalar(tag::U32, &v.to_le_bytes())
    }

    fn serialize_u64(self, v: u64) -> Result<(), KeyError> {
        self.scalar(tag::U64, &v.to_le_bytes())
    }

    fn serialize_u128(self, v: u128) -> Result<(), KeyError> {
        self.scalar(tag::U128, &v.to_le_bytes())
    }

    // All NaNs collapse to one bit pattern; -0.0 stays distinct from 0.0.
    fn serialize_f32(self, v: f32) -> Result<(), KeyError> {
        let bits = if v.is_nan() {
            f32::NAN.to_bits()
        } else {
            v.to_bits()
        };
        self.scalar(tag::F32, &bits.to_le_bytes())
    }

    fn serialize_f64(self, v: f64) -> Result<(), KeyError> {
        let bits = if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        };
        self.scalar(tag::F64, &bits.to_le_bytes())
    }

    fn serialize_char(self, v: char) -> Result<(), KeyError> {
        self.scalar(tag::CHAR, &u32::from(v).to_le_bytes())
    }

    fn serialize_str(self, v: &str) -> Result<(), KeyError> {
        self.tag(tag::STR);
        self.name(v);
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<(), KeyError> {
        self.tag(tag::BYTES);
        self.len(v.len());
        self.sink.put(v);
        Ok(())
    }

    fn serialize_none(self) -> Result<(), KeyError> {
        self.scalar(tag::NONE, &[])
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), KeyError> {
        self.enter()?;
        self.tag(tag::SOME);
        self.wrapped(value)
    }

    fn serialize_unit(self) -> Result<(), KeyError> {
        self.scalar(tag::UNIT, &[])
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<(), KeyError> {
        self.tag(tag::UNIT_STRUCT);
        self.name(name);
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<(), KeyError> {
        self.tag(tag::UNIT_VARIANT);
        self.variant(name, variant_index);
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.enter()?;
        self.tag(tag::NEWTYPE_STRUCT);
        self.name(name);
        self.wrapped(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.enter()?;
        self.tag(tag::NEWTYPE_VARIANT);
        self.variant(name, variant_index);
        self.wrapped(value)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, KeyError> {
        let sorted = self.config.canonical_seqs;
        Encoder::open(self, tag::SEQ, sorted)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, KeyError> {
        Encoder::open(self, tag::TUPLE, false)
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, KeyError> {
        let mut compound = Encoder::open(self, tag::TUPLE_STRUCT, false)?;
        compound.encoder.name(name);
        Ok(compound)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, KeyError> {
        let mut compound = Encoder::open(self, tag::TUPLE_VARIANT, false)?;
        compound.encoder.variant(name, variant_index);
        Ok(compound)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, KeyError> {
        Encoder::open(self, tag::MAP, true)
    }

    fn serialize_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, KeyError> {
        let mut compound = Encoder::open(self, tag::STRUCT, false)?;
        compound.encoder.name(name);
        Ok(compound)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, KeyError> {
        let mut compound = Encoder::open(self, tag::STRUCT_VARIANT, false)?;
        compound.encoder.variant(name, variant_index);
        Ok(compound)
    }
}

#[derive(Default)]
struct Sorted {
    entries: Vec<Vec<u8>>,
    current: Vec<u8>,
}

/// In-progress compound value.
pub struct Compound<'a, 's, S: ?Sized> {
    encoder: &'a mut Encoder<'s, S>,
    sorted: Option<Sorted>,
}

impl<S: Sink + ?Sized> Compound<'_, '_, S> {
    fn element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        match &mut self.sorted {
            None => value.serialize(&mut *self.encoder),
            Some(sorted) => {
                let mut child = Encoder {
                    sink: &mut sorted.current,
                    depth: self.encoder.depth,
                    config: self.encoder.config,
                };
                value.serialize(&mut child)
            }
        }
    }

    fn seal_entry(&mut self) {
        if let Some(sorted) = &mut self.sorted {
            let entry = std::mem::take(&mut sorted.current);
            sorted.entries.push(entry);
        }
    }

    fn skipped(&mut self, key: &'static str) {
        self.encoder.tag(tag::SKIPPED);
        self.encoder.name(key);
    }

    fn finish(self) -> Result<(), KeyError> {
        let Compound { encoder, sorted } = self;
        if let Some(mut sorted) = sorted {
            sorted.entries.sort_unstable();
            for entry in &sorted.entries {
                encoder.sink.put(entry);
            }
        }
        encoder.tag(tag::END);
        encoder.leave();
        Ok(())
    }
}

impl<S: Sink + ?Sized> ser::SerializeSeq for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)?;
        self.seal_entry();
        Ok(())
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeTuple for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeTupleStruct for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeTupleVariant for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeMap for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), KeyError> {
        self.element(key)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.element(value)?;
        self.seal_entry();
        Ok(())
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeStruct for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.element(value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), KeyError> {
        self.skipped(key);
        Ok(())
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}

impl<S: Sink + ?Sized> ser::SerializeStructVariant for Compound<'_, '_, S> {
    type Ok = ();
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.element(value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), KeyError> {
        self.skipped(key);
        Ok(())
    }

    fn end(self) -> Result<(), KeyError> {
        self.finish()
    }
}
