use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use crate::descriptor::{
  downcast, unbox, Category, ListShape, MapShape, NullableShape, Packable, PrimitiveKind, SharedShape, TypeRef,
};
use crate::error::Error;
use crate::value::Value;
use crate::Result;

macro_rules! primitive {
  ($($ty:ty => $kind:ident),+ $(,)?) => {
    $(
      impl Packable for $ty {
        fn category() -> Result<Category> {
          Ok(Category::Primitive(PrimitiveKind::$kind))
        }
      }
    )+
  };
}

primitive!(
  bool => Bool,
  i8 => I8,
  i16 => I16,
  i32 => I32,
  i64 => I64,
  u8 => U8,
  u16 => U16,
  u32 => U32,
  u64 => U64,
  f32 => F32,
  f64 => F64,
  char => Char,
  String => String,
  Box<[u8]> => Binary,
);

impl Packable for Value {
  fn category() -> Result<Category> {
    Ok(Category::Dynamic)
  }
}

impl<T: Packable> Packable for Option<T> {
  fn category() -> Result<Category> {
    fn visit<T: Packable>(value: &dyn Any, f: &mut dyn FnMut(Option<&dyn Any>) -> Result<()>) -> Result<()> {
      match downcast::<Option<T>>(value)? {
        Some(inner) => f(Some(inner as &dyn Any)),
        None => f(None),
      }
    }
    fn wrap<T: Packable>(value: Option<Box<dyn Any>>) -> Result<Box<dyn Any>> {
      let value = match value {
        Some(inner) => Some(unbox::<T>(inner)?),
        None => None,
      };
      Ok(Box::new(value))
    }
    Ok(Category::Nullable(NullableShape { inner: TypeRef::of::<T>(), visit: visit::<T>, wrap: wrap::<T> }))
  }
}

impl<T: Packable> Packable for Rc<RefCell<T>> {
  fn category() -> Result<Category> {
    fn identity<T: Packable>(value: &dyn Any) -> Result<usize> {
      Ok(Rc::as_ptr(downcast::<Rc<RefCell<T>>>(value)?) as *const () as usize)
    }
    fn visit<T: Packable>(value: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()> {
      let shared = downcast::<Rc<RefCell<T>>>(value)?;
      let inner = shared.try_borrow().map_err(|_| Error::Borrowed { name: type_name::<T>().to_string() })?;
      f(&*inner as &dyn Any)
    }
    fn wrap<T: Packable>(value: Box<dyn Any>) -> Result<Box<dyn Any>> {
      Ok(Box::new(Rc::new(RefCell::new(unbox::<T>(value)?))))
    }
    Ok(Category::Shared(SharedShape {
      inner: TypeRef::of::<T>(),
      identity: identity::<T>,
      visit: visit::<T>,
      wrap: wrap::<T>,
    }))
  }
}

macro_rules! sequence {
  ($($seq:ident),+) => {
    $(
      impl<T: Packable> Packable for $seq<T> {
        fn category() -> Result<Category> {
          fn len<T: Packable>(value: &dyn Any) -> Result<usize> {
            Ok(downcast::<$seq<T>>(value)?.len())
          }
          fn for_each<T: Packable>(value: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()> {
            downcast::<$seq<T>>(value)?.iter().try_for_each(|item| f(item as &dyn Any))
          }
          fn collect<T: Packable>(items: Vec<Box<dyn Any>>) -> Result<Box<dyn Any>> {
            Ok(Box::new(items.into_iter().map(unbox::<T>).collect::<Result<$seq<T>>>()?))
          }
          Ok(Category::List(ListShape {
            element: TypeRef::of::<T>(),
            len: len::<T>,
            for_each: for_each::<T>,
            collect: collect::<T>,
          }))
        }
      }
    )+
  };
}

sequence!(Vec, VecDeque);

macro_rules! mapping {
  ($map:ident, $($bound:tt)+) => {
    impl<K: Packable + $($bound)+, V: Packable> Packable for $map<K, V> {
      fn category() -> Result<Category> {
        fn len<K: Packable + $($bound)+, V: Packable>(value: &dyn Any) -> Result<usize> {
          Ok(downcast::<$map<K, V>>(value)?.len())
        }
        fn for_each<K: Packable + $($bound)+, V: Packable>(
          value: &dyn Any,
          f: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>,
        ) -> Result<()> {
          downcast::<$map<K, V>>(value)?.iter().try_for_each(|(k, v)| f(k as &dyn Any, v as &dyn Any))
        }
        fn collect<K: Packable + $($bound)+, V: Packable>(
          entries: Vec<(Box<dyn Any>, Box<dyn Any>)>,
        ) -> Result<Box<dyn Any>> {
          let map = entries.into_iter().map(|(k, v)| Ok((unbox::<K>(k)?, unbox::<V>(v)?))).collect::<Result<$map<K, V>>>()?;
          Ok(Box::new(map))
        }
        Ok(Category::Map(MapShape {
          key: TypeRef::of::<K>(),
          value: TypeRef::of::<V>(),
          len: len::<K, V>,
          for_each: for_each::<K, V>,
          collect: collect::<K, V>,
        }))
      }
    }
  };
}

mapping!(HashMap, Eq + Hash);
mapping!(BTreeMap, Ord);
