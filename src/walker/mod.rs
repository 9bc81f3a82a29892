//! オブジェクトグラフを走査して MessagePack トークンを生成するエンコーダです。
use std::any::{Any, TypeId};
use std::io::Write;

use crate::codec::Writer;
use crate::context::{Context, Convention};
use crate::descriptor::{downcast, Category, MemberDescriptor, ObjectShape, PrimitiveKind, TypeDescriptor};
use crate::error::Error;
use crate::value::Value;
use crate::Result;

#[cfg(test)]
mod test;

/// 値とその型記述子から MessagePack トークンを書き込むエンコーダ。
///
/// 現在の再帰経路上にあるオブジェクトと共有参照の同一性を保持し、同じインスタンスが再び現れた場合は
/// `CyclicReference` で失敗します。
pub struct Walker<'c, W: Write> {
  writer: Writer<W>,
  context: &'c Context,
  path: Vec<(TypeId, usize)>,
  depth: usize,
}

impl<'c, W: Write> Walker<'c, W> {
  pub fn new(buf: W, context: &'c Context) -> Walker<'c, W> {
    Walker { writer: Writer::new(buf), context, path: Vec::new(), depth: 0 }
  }

  pub fn into_inner(self) -> W {
    self.writer.into_inner()
  }

  /// `value` を `descriptor` に従ってエンコードします。`value` は `descriptor` が表す型の値でなければなりません。
  pub fn encode(&mut self, value: &dyn Any, descriptor: &TypeDescriptor) -> Result<()> {
    self.enter()?;
    let result = self.encode_value(value, descriptor);
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

  fn encode_value(&mut self, value: &dyn Any, descriptor: &TypeDescriptor) -> Result<()> {
    match descriptor.category() {
      Category::Primitive(kind) => self.encode_primitive(value, *kind),
      Category::Enum(shape) => self.writer.write_int((shape.to_int)(value)?),
      Category::Nullable(shape) => {
        let inner = shape.inner.descriptor()?;
        (shape.visit)(value, &mut |item| match item {
          Some(item) => self.encode(item, &inner),
          None => self.writer.write_nil(),
        })
      }
      Category::Shared(shape) => {
        let inner = shape.inner.descriptor()?;
        let identity = (descriptor.type_id(), (shape.identity)(value)?);
        self.push(identity, descriptor)?;
        let result = (shape.visit)(value, &mut |item| self.encode(item, &inner));
        self.path.pop();
        result
      }
      Category::List(shape) => {
        let element = shape.element.descriptor()?;
        self.writer.write_array_len((shape.len)(value)?)?;
        (shape.for_each)(value, &mut |item| self.encode(item, &element))
      }
      Category::Map(shape) => {
        let key = shape.key.descriptor()?;
        let val = shape.value.descriptor()?;
        self.writer.write_map_len((shape.len)(value)?)?;
        (shape.for_each)(value, &mut |k, v| {
          self.encode(k, &key)?;
          self.encode(v, &val)
        })
      }
      Category::Object(shape) => {
        let identity = (descriptor.type_id(), value as *const dyn Any as *const () as usize);
        self.push(identity, descriptor)?;
        let result = match self.context.convention_for(descriptor.type_id()) {
          Convention::Map => self.encode_object_as_map(value, shape),
          Convention::Array => self.encode_object_as_array(value, shape),
        };
        self.path.pop();
        result
      }
      Category::Dynamic => self.encode_dynamic(downcast::<Value>(value)?),
    }
  }

  fn push(&mut self, identity: (TypeId, usize), descriptor: &TypeDescriptor) -> Result<()> {
    if self.path.contains(&identity) {
      return Err(Error::CyclicReference { name: descriptor.name().to_string() });
    }
    self.path.push(identity);
    Ok(())
  }

  fn encode_primitive(&mut self, value: &dyn Any, kind: PrimitiveKind) -> Result<()> {
    match kind {
      PrimitiveKind::Bool => self.writer.write_bool(*downcast::<bool>(value)?),
      PrimitiveKind::I8 => self.writer.write_int(*downcast::<i8>(value)? as i64),
      PrimitiveKind::I16 => self.writer.write_int(*downcast::<i16>(value)? as i64),
      PrimitiveKind::I32 => self.writer.write_int(*downcast::<i32>(value)? as i64),
      PrimitiveKind::I64 => self.writer.write_int(*downcast::<i64>(value)?),
      PrimitiveKind::U8 => self.writer.write_uint(*downcast::<u8>(value)? as u64),
      PrimitiveKind::U16 => self.writer.write_uint(*downcast::<u16>(value)? as u64),
      PrimitiveKind::U32 => self.writer.write_uint(*downcast::<u32>(value)? as u64),
      PrimitiveKind::U64 => self.writer.write_uint(*downcast::<u64>(value)?),
      PrimitiveKind::F32 => self.writer.write_f32(*downcast::<f32>(value)?),
      PrimitiveKind::F64 => self.writer.write_f64(*downcast::<f64>(value)?),
      PrimitiveKind::Char => self.writer.write_uint(*downcast::<char>(value)? as u64),
      PrimitiveKind::String => self.writer.write_str(downcast::<String>(value)?),
      PrimitiveKind::Binary => self.writer.write_bin(downcast::<Box<[u8]>>(value)?),
    }
  }

  /// マップ規約: 値が存在するメンバーのみを名前をキーとして書き込みます。
  fn encode_object_as_map(&mut self, object: &dyn Any, shape: &ObjectShape) -> Result<()> {
    let mut present = Vec::with_capacity(shape.members().len());
    for member in shape.members() {
      let descriptor = member.descriptor()?;
      if !is_absent(object, member, &descriptor)? {
        present.push((member, descriptor));
      }
    }
    self.writer.write_map_len(present.len())?;
    for (member, descriptor) in present {
      self.writer.write_str(member.name())?;
      member.visit(object, &mut |field| self.encode(field, &descriptor))?;
    }
    Ok(())
  }

  /// 配列規約: すべてのメンバーを宣言順に書き込みます。値が存在しないメンバーも nil としてスロットを占有します。
  fn encode_object_as_array(&mut self, object: &dyn Any, shape: &ObjectShape) -> Result<()> {
    self.writer.write_array_len(shape.members().len())?;
    for member in shape.members() {
      let descriptor = member.descriptor()?;
      member.visit(object, &mut |field| self.encode(field, &descriptor))?;
    }
    Ok(())
  }

  /// `Nil` 以外の値は `[tag, payload]` として書き込みます。配列やマップの要素もそれぞれタグ付きで書き込まれます。
  fn encode_dynamic(&mut self, value: &Value) -> Result<()> {
    let tag = match value.tag() {
      Some(tag) => tag,
      None => return self.writer.write_nil(),
    };
    self.writer.write_array_len(2)?;
    self.writer.write_uint(tag as u64)?;
    match value {
      Value::Nil => unreachable!(),
      Value::Bool(value) => self.writer.write_bool(*value),
      Value::Int(value) => self.writer.write_int(*value),
      Value::UInt(value) => self.writer.write_uint(*value),
      Value::F32(value) => self.writer.write_f32(*value),
      Value::F64(value) => self.writer.write_f64(*value),
      Value::String(value) => self.writer.write_str(value),
      Value::Binary(value) => self.writer.write_bin(value),
      Value::Array(values) => {
        self.writer.write_array_len(values.len())?;
        for value in values {
          self.encode_nested_dynamic(value)?;
        }
        Ok(())
      }
      Value::Map(entries) => {
        self.writer.write_map_len(entries.len())?;
        for (key, value) in entries {
          self.encode_nested_dynamic(key)?;
          self.encode_nested_dynamic(value)?;
        }
        Ok(())
      }
    }
  }

  fn encode_nested_dynamic(&mut self, value: &Value) -> Result<()> {
    self.enter()?;
    let result = self.encode_dynamic(value);
    self.depth -= 1;
    result
  }
}

/// メンバーの値が存在しない (null 許容型で値を持たない) かを判定します。
fn is_absent(object: &dyn Any, member: &MemberDescriptor, descriptor: &TypeDescriptor) -> Result<bool> {
  match descriptor.category() {
    Category::Nullable(shape) => {
      let mut absent = false;
      member.visit(object, &mut |field| {
        (shape.visit)(field, &mut |item| {
          absent = item.is_none();
          Ok(())
        })
      })?;
      Ok(absent)
    }
    _ => Ok(false),
  }
}
