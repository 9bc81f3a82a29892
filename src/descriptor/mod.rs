//! 実行時の型からシリアライズ計画 (型記述子) を解決するためのモジュールです。
//!
//! Rust には実行時リフレクションがないため、シリアライズ可能な型は [`Packable`] を実装してその分類を自己申告します。
//! 構築された [`TypeDescriptor`] は型ごとにプロセス全体でキャッシュされ、一度公開された記述子が変更されることは
//! ありません。
use std::any::{type_name, Any, TypeId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::error::Error;
use crate::Result;

pub use object::{MemberDescriptor, ObjectBuilder, ObjectShape};
pub use registry::resolve;

mod impls;
mod object;
mod registry;


/// MessagePack にシリアライズすることのできる型です。
///
/// 値が存在しない (nil を読み込んだ) 場合や、マップ規約でメンバーがストリームに含まれていない場合は
/// `Default::default()` の値が使用されます。
pub trait Packable: Any + Default {
  /// この型の分類を構築します。内包する型は [`TypeRef`] で遅延参照するため、自身を再帰的に含む型も記述できます。
  fn category() -> Result<Category>;
}

/// 判別値 (`i64`) で表現される列挙型です。通常は `packable_enum!` によって実装されます。
pub trait PackableEnum: Packable + Copy {
  fn to_discriminant(self) -> i64;
  fn from_discriminant(value: i64) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
  Bool,
  I8,
  I16,
  I32,
  I64,
  U8,
  U16,
  U32,
  U64,
  F32,
  F64,
  /// Unicode スカラー値を整数として表現します。
  Char,
  String,
  /// `Box<[u8]>` をバイナリとして表現します。
  Binary,
}

/// 型の分類。オブジェクト以外の複合型は要素の型を [`TypeRef`] として保持します。
pub enum Category {
  Primitive(PrimitiveKind),
  Enum(EnumShape),
  Nullable(NullableShape),
  /// `Rc<RefCell<T>>` のように同一インスタンスを複数箇所から参照できる型。循環参照の検出対象となります。
  Shared(SharedShape),
  List(ListShape),
  Map(MapShape),
  Object(ObjectShape),
  /// 具象型が宣言から定まらず、値ごとに型タグを埋め込む必要がある `Value` 型。
  Dynamic,
}

impl Category {
  /// 列挙型の分類を構築します。
  pub fn enumeration<E: PackableEnum>() -> Category {
    fn to_int<E: PackableEnum>(value: &dyn Any) -> Result<i64> {
      Ok(downcast::<E>(value)?.to_discriminant())
    }
    fn from_int<E: PackableEnum>(value: i64) -> Result<Box<dyn Any>> {
      match E::from_discriminant(value) {
        Some(e) => Ok(Box::new(e)),
        None => Err(Error::mismatch(type_name::<E>(), format!("discriminant {}", value))),
      }
    }
    Category::Enum(EnumShape { to_int: to_int::<E>, from_int: from_int::<E> })
  }

  pub fn name(&self) -> &'static str {
    match self {
      Category::Primitive(_) => "primitive",
      Category::Enum(_) => "enum",
      Category::Nullable(_) => "nullable",
      Category::Shared(_) => "shared",
      Category::List(_) => "list",
      Category::Map(_) => "map",
      Category::Object(_) => "object",
      Category::Dynamic => "dynamic",
    }
  }

  /// この分類が直接参照している型。
  pub fn children(&self) -> Vec<TypeRef> {
    match self {
      Category::Primitive(_) | Category::Enum(_) | Category::Dynamic => Vec::new(),
      Category::Nullable(shape) => vec![shape.inner],
      Category::Shared(shape) => vec![shape.inner],
      Category::List(shape) => vec![shape.element],
      Category::Map(shape) => vec![shape.key, shape.value],
      Category::Object(shape) => shape.members().iter().map(MemberDescriptor::type_ref).collect(),
    }
  }
}

impl Debug for Category {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Category::Primitive(kind) => write!(f, "Primitive({:?})", kind),
      Category::Nullable(shape) => write!(f, "Nullable({})", shape.inner.name()),
      Category::Shared(shape) => write!(f, "Shared({})", shape.inner.name()),
      Category::List(shape) => write!(f, "List({})", shape.element.name()),
      Category::Map(shape) => write!(f, "Map({}, {})", shape.key.name(), shape.value.name()),
      Category::Object(shape) => f.debug_tuple("Object").field(&shape.members()).finish(),
      Category::Enum(_) => write!(f, "Enum"),
      Category::Dynamic => write!(f, "Dynamic"),
    }
  }
}

pub struct EnumShape {
  pub(crate) to_int: fn(&dyn Any) -> Result<i64>,
  pub(crate) from_int: fn(i64) -> Result<Box<dyn Any>>,
}

pub struct NullableShape {
  pub(crate) inner: TypeRef,
  pub(crate) visit: fn(&dyn Any, &mut dyn FnMut(Option<&dyn Any>) -> Result<()>) -> Result<()>,
  pub(crate) wrap: fn(Option<Box<dyn Any>>) -> Result<Box<dyn Any>>,
}

pub struct SharedShape {
  pub(crate) inner: TypeRef,
  /// 参照先インスタンスのアドレス。
  pub(crate) identity: fn(&dyn Any) -> Result<usize>,
  pub(crate) visit: fn(&dyn Any, &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()>,
  pub(crate) wrap: fn(Box<dyn Any>) -> Result<Box<dyn Any>>,
}

pub struct ListShape {
  pub(crate) element: TypeRef,
  pub(crate) len: fn(&dyn Any) -> Result<usize>,
  pub(crate) for_each: fn(&dyn Any, &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()>,
  pub(crate) collect: fn(Vec<Box<dyn Any>>) -> Result<Box<dyn Any>>,
}

pub struct MapShape {
  pub(crate) key: TypeRef,
  pub(crate) value: TypeRef,
  pub(crate) len: fn(&dyn Any) -> Result<usize>,
  pub(crate) for_each: fn(&dyn Any, &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>) -> Result<()>,
  pub(crate) collect: fn(Vec<(Box<dyn Any>, Box<dyn Any>)>) -> Result<Box<dyn Any>>,
}

/// 型記述子への遅延参照。参照先はプロセス全体のキャッシュから解決されます。
#[derive(Clone, Copy)]
pub struct TypeRef {
  type_id: fn() -> TypeId,
  name: fn() -> &'static str,
  lookup: fn() -> Result<Arc<TypeDescriptor>>,
}

impl TypeRef {
  pub fn of<T: Packable>() -> TypeRef {
    TypeRef { type_id: TypeId::of::<T>, name: type_name::<T>, lookup: registry::lookup::<T> }
  }

  pub fn type_id(&self) -> TypeId {
    (self.type_id)()
  }

  pub fn name(&self) -> &'static str {
    (self.name)()
  }

  /// 参照先の型記述子を参照します。未構築の場合はここで構築されます。
  pub fn descriptor(&self) -> Result<Arc<TypeDescriptor>> {
    (self.lookup)()
  }
}

impl Debug for TypeRef {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// 1 つの型をどのようにエンコード/デコードするかを表す不変の記述子です。
pub struct TypeDescriptor {
  name: &'static str,
  type_id: TypeId,
  category: Category,
  default: fn() -> Box<dyn Any>,
}

impl TypeDescriptor {
  pub(crate) fn new<T: Packable>(category: Category) -> TypeDescriptor {
    fn default_value<T: Packable>() -> Box<dyn Any> {
      Box::new(T::default())
    }
    TypeDescriptor { name: type_name::<T>(), type_id: TypeId::of::<T>(), category, default: default_value::<T> }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn type_id(&self) -> TypeId {
    self.type_id
  }

  pub fn category(&self) -> &Category {
    &self.category
  }

  /// 型の既定値を構築します。
  pub fn default_value(&self) -> Box<dyn Any> {
    (self.default)()
  }

  pub fn is_nullable(&self) -> bool {
    matches!(self.category, Category::Nullable(_))
  }
}

impl Debug for TypeDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TypeDescriptor").field("name", &self.name).field("category", &self.category).finish()
  }
}

#[inline]
pub(crate) fn downcast<T: Any>(value: &dyn Any) -> Result<&T> {
  value.downcast_ref::<T>().ok_or_else(|| Error::mismatch(type_name::<T>(), "value of another type"))
}

#[inline]
pub(crate) fn downcast_mut<T: Any>(value: &mut dyn Any) -> Result<&mut T> {
  value.downcast_mut::<T>().ok_or_else(|| Error::mismatch(type_name::<T>(), "value of another type"))
}

#[inline]
pub(crate) fn unbox<T: Any>(value: Box<dyn Any>) -> Result<T> {
  match value.downcast::<T>() {
    Ok(value) => Ok(*value),
    Err(_) => Err(Error::mismatch(type_name::<T>(), "value of another type")),
  }
}
