//! MessagePack トークンを読み込んで型記述子に従って値を再構築するデコーダです。
use std::any::Any;

use crate::codec::Reader;
use crate::context::{Context, Convention};
use crate::descriptor::{Category, ObjectShape, PrimitiveKind, TypeDescriptor};
use crate::error::Error;
use crate::value::{Tag, Value};
use crate::Result;


/// バイト列から値を復元するデコーダ。
///
/// どの位置であっても nil トークンは値が存在しないことを表し、null 許容型では `None`、それ以外の型では
/// その型の既定値になります。
pub struct Builder<'a, 'c> {
  reader: Reader<'a>,
  context: &'c Context,
  depth: usize,
}

impl<'a, 'c> Builder<'a, 'c> {
  pub fn new(buf: &'a [u8], context: &'c Context) -> Builder<'a, 'c> {
    Builder { reader: Reader::new(buf), context, depth: 0 }
  }

  /// すべての入力を読み終えていることを確認します。
  pub fn finish(&self) -> Result<()> {
    match self.reader.remaining() {
      0 => Ok(()),
      remaining => Err(Error::TrailingBytes { offset: self.reader.position(), remaining }),
    }
  }

  /// `descriptor` が表す型の値を 1 つ読み込みます。
  pub fn decode(&mut self, descriptor: &TypeDescriptor) -> Result<Box<dyn Any>> {
    self.enter()?;
    let result = self.decode_value(descriptor);
    self.depth -= 1;
    result
  }

  fn enter(&mut self) -> Result<()> {
    if self.depth >= self.context.max_depth() {
      return Err(Error::NestingTooDeep { maximum: self.context.max_depth() });
    }
    self.depth += 1;
    Ok(())
  }

  fn decode_value(&mut self, descriptor: &TypeDescriptor) -> Result<Box<dyn Any>> {
    if self.reader.is_nil()? {
      self.reader.read_nil()?;
      return match descriptor.category() {
        Category::Nullable(shape) => (shape.wrap)(None),
        _ => Ok(descriptor.default_value()),
      };
    }

    match descriptor.category() {
      Category::Primitive(kind) => self.decode_primitive(*kind),
      Category::Enum(shape) => (shape.from_int)(self.reader.read_int::<i64>()?),
      Category::Nullable(shape) => {
        let inner = shape.inner.descriptor()?;
        (shape.wrap)(Some(self.decode(&inner)?))
      }
      Category::Shared(shape) => {
        let inner = shape.inner.descriptor()?;
        (shape.wrap)(self.decode(&inner)?)
      }
      Category::List(shape) => {
        let element = shape.element.descriptor()?;
        let length = self.reader.read_array_len()?;
        // 宣言された要素数は信用せず、残りのバイト数を超えて事前確保しない
        let mut items = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
          items.push(self.decode(&element)?);
        }
        (shape.collect)(items)
      }
      Category::Map(shape) => {
        let key = shape.key.descriptor()?;
        let value = shape.value.descriptor()?;
        let length = self.reader.read_map_len()?;
        let mut entries = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
          let k = self.decode(&key)?;
          let v = self.decode(&value)?;
          entries.push((k, v));
        }
        (shape.collect)(entries)
      }
      Category::Object(shape) => match self.context.convention_for(descriptor.type_id()) {
        Convention::Map => self.decode_object_from_map(descriptor, shape),
        Convention::Array => self.decode_object_from_array(descriptor, shape),
      },
      Category::Dynamic => Ok(Box::new(self.decode_dynamic()?)),
    }
  }

  fn decode_primitive(&mut self, kind: PrimitiveKind) -> Result<Box<dyn Any>> {
    let value: Box<dyn Any> = match kind {
      PrimitiveKind::Bool => Box::new(self.reader.read_bool()?),
      PrimitiveKind::I8 => Box::new(self.reader.read_int::<i8>()?),
      PrimitiveKind::I16 => Box::new(self.reader.read_int::<i16>()?),
      PrimitiveKind::I32 => Box::new(self.reader.read_int::<i32>()?),
      PrimitiveKind::I64 => Box::new(self.reader.read_int::<i64>()?),
      PrimitiveKind::U8 => Box::new(self.reader.read_int::<u8>()?),
      PrimitiveKind::U16 => Box::new(self.reader.read_int::<u16>()?),
      PrimitiveKind::U32 => Box::new(self.reader.read_int::<u32>()?),
      PrimitiveKind::U64 => Box::new(self.reader.read_int::<u64>()?),
      PrimitiveKind::F32 => Box::new(self.reader.read_f32()?),
      PrimitiveKind::F64 => Box::new(self.reader.read_f64()?),
      PrimitiveKind::Char => {
        let code = self.reader.read_int::<u32>()?;
        let c = char::from_u32(code).ok_or_else(|| Error::mismatch("char", format!("code point {:#X}", code)))?;
        Box::new(c)
      }
      PrimitiveKind::String => Box::new(self.reader.read_str()?.to_string()),
      PrimitiveKind::Binary => Box::new(Box::<[u8]>::from(self.reader.read_bin()?)),
    };
    Ok(value)
  }

  /// マップ規約: 未知のキーは読み飛ばし、ストリームに含まれないメンバーは既定値のまま残します。
  fn decode_object_from_map(&mut self, descriptor: &TypeDescriptor, shape: &ObjectShape) -> Result<Box<dyn Any>> {
    let mut object = descriptor.default_value();
    let length = self.reader.read_map_len()?;
    for _ in 0..length {
      let name = self.reader.read_str()?;
      match shape.member(name) {
        Some(member) => {
          let descriptor = member.descriptor()?;
          let value = self.decode(&descriptor)?;
          member.assign(&mut *object, value)?;
        }
        None => {
          log::trace!("unknown member skipped: {}.{}", descriptor.name(), name);
          self.reader.skip()?;
        }
      }
    }
    Ok(object)
  }

  /// 配列規約: スロットを宣言順のメンバーに対応付けます。不足するメンバーは既定値のまま残し、余分なスロットは
  /// 読み飛ばします。
  fn decode_object_from_array(&mut self, descriptor: &TypeDescriptor, shape: &ObjectShape) -> Result<Box<dyn Any>> {
    let mut object = descriptor.default_value();
    let length = self.reader.read_array_len()?;
    for i in 0..length {
      match shape.members().get(i) {
        Some(member) => {
          let descriptor = member.descriptor()?;
          let value = self.decode(&descriptor)?;
          member.assign(&mut *object, value)?;
        }
        None => {
          log::trace!("excess slot skipped: {}[{}]", descriptor.name(), i);
          self.reader.skip()?;
        }
      }
    }
    Ok(object)
  }

  fn decode_dynamic(&mut self) -> Result<Value> {
    if self.reader.is_nil()? {
      self.reader.read_nil()?;
      return Ok(Value::Nil);
    }
    let length = self.reader.read_array_len()?;
    if length != 2 {
      return Err(Error::mismatch("tagged value [tag, payload]", format!("array of {} elements", length)));
    }
    let tag = self.reader.read_int::<u64>()?;
    let tag = match u8::try_from(tag).ok().and_then(Tag::from_u8) {
      Some(tag) => tag,
      None => return Err(Error::unsupported(format!("dynamic value tag {}", tag))),
    };
    Ok(match tag {
      Tag::Bool => Value::Bool(self.reader.read_bool()?),
      Tag::Int => Value::Int(self.reader.read_int::<i64>()?),
      Tag::UInt => Value::UInt(self.reader.read_int::<u64>()?),
      Tag::F32 => Value::F32(self.reader.read_f32()?),
      Tag::F64 => Value::F64(self.reader.read_f64()?),
      Tag::String => Value::String(self.reader.read_str()?.to_string()),
      Tag::Binary => Value::Binary(self.reader.read_bin()?.to_vec()),
      Tag::Array => {
        let length = self.reader.read_array_len()?;
        let mut values = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
          values.push(self.decode_nested_dynamic()?);
        }
        Value::Array(values)
      }
      Tag::Map => {
        let length = self.reader.read_map_len()?;
        let mut entries = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
          let key = self.decode_nested_dynamic()?;
          let value = self.decode_nested_dynamic()?;
          entries.push((key, value));
        }
        Value::Map(entries)
      }
    })
  }

  fn decode_nested_dynamic(&mut self) -> Result<Value> {
    self.enter()?;
    let result = self.decode_dynamic();
    self.depth -= 1;
    result
  }
}
