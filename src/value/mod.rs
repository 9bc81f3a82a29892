//! 宣言型から具象型が定まらない位置 (Dynamic スロット) に格納される値です。


/// 任意の MessagePack 値を保持する閉じた列挙型です。Dynamic スロットではシリアライズ時に値ごとの型タグが埋め込まれる
/// ため、32 bit と 64 bit の浮動小数点や符号の有無も含めて元の型のまま復元されます。
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Nil,
  Bool(bool),
  Int(i64),
  UInt(u64),
  F32(f32),
  F64(f64),
  String(String),
  Binary(Vec<u8>),
  Array(Vec<Value>),
  /// キーの順序を保持するマップ。キーも任意の値をとることができます。
  Map(Vec<(Value, Value)>),
}

impl Value {
  pub fn is_nil(&self) -> bool {
    matches!(self, Value::Nil)
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(value) => Some(*value),
      _ => None,
    }
  }

  /// 整数値を `i64` として参照します。`UInt` の場合は範囲に収まる場合のみ値を返します。
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Value::Int(value) => Some(*value),
      Value::UInt(value) => i64::try_from(*value).ok(),
      _ => None,
    }
  }

  pub fn as_u64(&self) -> Option<u64> {
    match self {
      Value::UInt(value) => Some(*value),
      Value::Int(value) => u64::try_from(*value).ok(),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Value::F32(value) => Some(*value as f64),
      Value::F64(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_array(&self) -> Option<&[Value]> {
    match self {
      Value::Array(values) => Some(values),
      _ => None,
    }
  }

  /// マップから文字列キー `key` に対応する値を参照します。
  pub fn get(&self, key: &str) -> Option<&Value> {
    match self {
      Value::Map(entries) => entries.iter().find(|(k, _)| k.as_str() == Some(key)).map(|(_, v)| v),
      _ => None,
    }
  }

  /// この値に付与される型タグ。`Nil` はタグを持たず nil トークンそのもので表現されます。
  pub fn tag(&self) -> Option<Tag> {
    match self {
      Value::Nil => None,
      Value::Bool(_) => Some(Tag::Bool),
      Value::Int(_) => Some(Tag::Int),
      Value::UInt(_) => Some(Tag::UInt),
      Value::F32(_) => Some(Tag::F32),
      Value::F64(_) => Some(Tag::F64),
      Value::String(_) => Some(Tag::String),
      Value::Binary(_) => Some(Tag::Binary),
      Value::Array(_) => Some(Tag::Array),
      Value::Map(_) => Some(Tag::Map),
    }
  }
}

/// Dynamic スロットの値の前に置かれる型タグ。ワイヤ上では `[tag, payload]` の 2 要素配列の先頭に
/// positive fixint として書き込まれます。
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
  Bool = 1,
  Int = 2,
  UInt = 3,
  F32 = 4,
  F64 = 5,
  String = 6,
  Binary = 7,
  Array = 8,
  Map = 9,
}

impl Tag {
  pub fn from_u8(value: u8) -> Option<Tag> {
    match value {
      1 => Some(Tag::Bool),
      2 => Some(Tag::Int),
      3 => Some(Tag::UInt),
      4 => Some(Tag::F32),
      5 => Some(Tag::F64),
      6 => Some(Tag::String),
      7 => Some(Tag::Binary),
      8 => Some(Tag::Array),
      9 => Some(Tag::Map),
      _ => None,
    }
  }
}

macro_rules! from_value {
  ($($ty:ty => |$v:ident| $convert:expr),+ $(,)?) => {
    $(
      impl From<$ty> for Value {
        fn from($v: $ty) -> Value {
          $convert
        }
      }
    )+
  };
}

from_value!(
  bool => |v| Value::Bool(v),
  i8 => |v| Value::Int(v as i64),
  i16 => |v| Value::Int(v as i64),
  i32 => |v| Value::Int(v as i64),
  i64 => |v| Value::Int(v),
  u8 => |v| Value::UInt(v as u64),
  u16 => |v| Value::UInt(v as u64),
  u32 => |v| Value::UInt(v as u64),
  u64 => |v| Value::UInt(v),
  f32 => |v| Value::F32(v),
  f64 => |v| Value::F64(v),
  &str => |v| Value::String(v.to_string()),
  String => |v| Value::String(v),
  Vec<u8> => |v| Value::Binary(v),
  Vec<Value> => |v| Value::Array(v),
);

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(value: Option<T>) -> Value {
    match value {
      Some(value) => value.into(),
      None => Value::Nil,
    }
  }
}
