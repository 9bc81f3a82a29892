use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::descriptor::{downcast, downcast_mut, unbox, Category, Packable, TypeDescriptor, TypeRef};
use crate::error::Error;
use crate::Result;

/// 型消去されたメンバーへのアクセサ。
trait Accessor: Send + Sync {
  fn visit(&self, object: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()>;
  fn assign(&self, object: &mut dyn Any, value: Box<dyn Any>) -> Result<()>;
}

struct FieldAccessor<T, F> {
  get: fn(&T) -> &F,
  get_mut: fn(&mut T) -> &mut F,
}

impl<T: Packable, F: Packable> Accessor for FieldAccessor<T, F> {
  fn visit(&self, object: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()> {
    let field = (self.get)(downcast::<T>(object)?);
    f(field as &dyn Any)
  }

  fn assign(&self, object: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
    *(self.get_mut)(downcast_mut::<T>(object)?) = unbox::<F>(value)?;
    Ok(())
  }
}

/// オブジェクトのメンバー 1 つを表す記述子です。
pub struct MemberDescriptor {
  name: &'static str,
  type_ref: TypeRef,
  accessor: Box<dyn Accessor>,
}

impl MemberDescriptor {
  pub fn name(&self) -> &'static str {
    self.name
  }

  /// メンバーの宣言型。
  pub fn type_ref(&self) -> TypeRef {
    self.type_ref
  }

  pub fn descriptor(&self) -> Result<Arc<TypeDescriptor>> {
    self.type_ref.descriptor()
  }

  /// `object` のこのメンバーの値を `f` に渡します。
  pub fn visit(&self, object: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()> {
    self.accessor.visit(object, f)
  }

  /// `object` のこのメンバーに `value` を設定します。
  pub fn assign(&self, object: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
    self.accessor.assign(object, value)
  }
}

impl Debug for MemberDescriptor {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.name, self.type_ref.name())
  }
}

/// ユーザ定義オブジェクトのメンバー構成。メンバーは登録された順序 (宣言順) を保持します。
pub struct ObjectShape {
  members: Vec<MemberDescriptor>,
  index: HashMap<&'static str, usize>,
}

impl ObjectShape {
  /// 宣言順のメンバー。
  pub fn members(&self) -> &[MemberDescriptor] {
    &self.members
  }

  pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
    self.index.get(name).map(|i| &self.members[*i])
  }
}

/// ユーザ定義オブジェクトのメンバーを宣言順に登録するためのビルダーです。
///
/// ```
/// use msgpacker::descriptor::{Category, ObjectBuilder};
///
/// #[derive(Default)]
/// struct Point {
///   x: i32,
///   y: i32,
///   label: String,
/// }
///
/// impl msgpacker::Packable for Point {
///   fn category() -> msgpacker::Result<Category> {
///     // label はシリアライズしない
///     ObjectBuilder::<Point>::new().member("x", |p| &p.x, |p| &mut p.x).member("y", |p| &p.y, |p| &mut p.y).build()
///   }
/// }
///
/// let descriptor = msgpacker::resolve::<Point>().unwrap();
/// assert_eq!("object", descriptor.category().name());
/// ```
pub struct ObjectBuilder<T: Packable> {
  members: Vec<MemberDescriptor>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Packable> ObjectBuilder<T> {
  pub fn new() -> ObjectBuilder<T> {
    ObjectBuilder { members: Vec::new(), _marker: PhantomData }
  }

  /// メンバーを追加します。
  pub fn member<F: Packable>(
    mut self,
    name: &'static str,
    get: fn(&T) -> &F,
    get_mut: fn(&mut T) -> &mut F,
  ) -> ObjectBuilder<T> {
    let accessor = Box::new(FieldAccessor { get, get_mut });
    self.members.push(MemberDescriptor { name, type_ref: TypeRef::of::<F>(), accessor });
    self
  }

  /// オブジェクトの分類を構築します。メンバーが 1 つもない場合や、同じ名前のメンバーが重複している場合は
  /// `UnsupportedType` で失敗します。
  pub fn build(self) -> Result<Category> {
    if self.members.is_empty() {
      return Err(Error::unsupported(format!("{} has no serializable members", type_name::<T>())));
    }
    let mut index = HashMap::with_capacity(self.members.len());
    for (i, member) in self.members.iter().enumerate() {
      if index.insert(member.name, i).is_some() {
        return Err(Error::unsupported(format!("{} has duplicate member: {}", type_name::<T>(), member.name)));
      }
    }
    Ok(Category::Object(ObjectShape { members: self.members, index }))
  }
}

impl<T: Packable> Default for ObjectBuilder<T> {
  fn default() -> Self {
    ObjectBuilder::new()
  }
}
