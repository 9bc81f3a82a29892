//! MessagePack の原始トークンを読み書きするためのコーデックです。
//! このモジュールはオブジェクトの型について何も知らず、nil, boolean, 整数, 浮動小数点, 文字列, バイナリ,
//! 配列ヘッダ, マップヘッダのみを扱います。
use std::io::Write;

use byteorder::{BigEndian, ByteOrder};
use rmp as msgpack;
use rmp::Marker;

use crate::error::Error;
use crate::Result;


/// MessagePack トークンを任意の `Write` に書き込むためのライター。整数は値と符号を表現できる最小のタグで
/// 書き込まれます。
pub struct Writer<W: Write> {
  buf: W,
}

impl<W: Write> Writer<W> {
  pub fn new(buf: W) -> Writer<W> {
    Writer { buf }
  }

  pub fn get_ref(&self) -> &W {
    &self.buf
  }

  pub fn into_inner(self) -> W {
    self.buf
  }

  #[inline]
  pub fn write_nil(&mut self) -> Result<()> {
    msgpack::encode::write_nil(&mut self.buf).map_err(Error::from)
  }

  #[inline]
  pub fn write_bool(&mut self, value: bool) -> Result<()> {
    msgpack::encode::write_bool(&mut self.buf, value).map_err(Error::from)
  }

  /// 符号付き整数を書き込みます。非負の値は positive fixint または uint 系のタグで表現されます。
  #[inline]
  pub fn write_int(&mut self, value: i64) -> Result<()> {
    msgpack::encode::write_sint(&mut self.buf, value)?;
    Ok(())
  }

  #[inline]
  pub fn write_uint(&mut self, value: u64) -> Result<()> {
    msgpack::encode::write_uint(&mut self.buf, value)?;
    Ok(())
  }

  #[inline]
  pub fn write_f32(&mut self, value: f32) -> Result<()> {
    msgpack::encode::write_f32(&mut self.buf, value).map_err(Error::from)
  }

  #[inline]
  pub fn write_f64(&mut self, value: f64) -> Result<()> {
    msgpack::encode::write_f64(&mut self.buf, value).map_err(Error::from)
  }

  #[inline]
  pub fn write_str(&mut self, value: &str) -> Result<()> {
    verify_length(value.len(), "string")?;
    msgpack::encode::write_str(&mut self.buf, value).map_err(Error::from)
  }

  #[inline]
  pub fn write_bin(&mut self, value: &[u8]) -> Result<()> {
    verify_length(value.len(), "binary")?;
    msgpack::encode::write_bin(&mut self.buf, value).map_err(Error::from)
  }

  #[inline]
  pub fn write_array_len(&mut self, len: usize) -> Result<()> {
    msgpack::encode::write_array_len(&mut self.buf, verify_length(len, "array")?)?;
    Ok(())
  }

  #[inline]
  pub fn write_map_len(&mut self, len: usize) -> Result<()> {
    msgpack::encode::write_map_len(&mut self.buf, verify_length(len, "map")?)?;
    Ok(())
  }
}

fn verify_length(len: usize, kind: &str) -> Result<u32> {
  u32::try_from(len).map_err(|_| Error::unsupported(format!("{} of length {}", kind, len)))
}

/// ワイヤ上の整数。符号付きのタグで書かれた値は `Signed`、それ以外は `Unsigned` になります。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Integer {
  Unsigned(u64),
  Signed(i64),
}

impl std::fmt::Display for Integer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Integer::Unsigned(value) => write!(f, "integer {}", value),
      Integer::Signed(value) => write!(f, "integer {}", value),
    }
  }
}

impl Integer {
  /// 浮動小数点に変換した `converted` がこの整数と厳密に等しい場合に true を返します。
  fn is_exactly(self, converted: f64) -> bool {
    // 範囲外の値は飽和して元の整数と一致してしまうため先に除外する
    match self {
      Integer::Unsigned(value) => converted < 18_446_744_073_709_551_616.0 && converted as u64 == value,
      Integer::Signed(value) => converted < 9_223_372_036_854_775_808.0 && converted as i64 == value,
    }
  }
}

/// バイトスライスから MessagePack トークンを読み出すためのリーダー。
///
/// 宣言された長さが残りのバイト数を超える場合は `TruncatedInput`、未定義の先頭バイト (0xC1) を検出した場合は
/// `Format` で失敗します。期待と異なるトークンの場合は `SchemaMismatch` になります。
pub struct Reader<'a> {
  buf: &'a [u8],
  position: usize,
}

impl<'a> Reader<'a> {
  pub fn new(buf: &'a [u8]) -> Reader<'a> {
    Reader { buf, position: 0 }
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn remaining(&self) -> usize {
    self.buf.len() - self.position
  }

  fn take(&mut self, length: usize) -> Result<&'a [u8]> {
    if self.remaining() < length {
      return Err(Error::TruncatedInput { required: length, remaining: self.remaining() });
    }
    let bytes = &self.buf[self.position..self.position + length];
    self.position += length;
    Ok(bytes)
  }

  #[inline]
  fn take_u8(&mut self) -> Result<u8> {
    Ok(self.take(1)?[0])
  }

  /// 次のトークンのマーカーを消費せずに参照します。
  pub fn peek_marker(&self) -> Result<Marker> {
    match self.buf.get(self.position) {
      None => Err(Error::TruncatedInput { required: 1, remaining: 0 }),
      Some(&byte) => match Marker::from_u8(byte) {
        Marker::Reserved => Err(Error::Format { marker: byte, offset: self.position }),
        marker => Ok(marker),
      },
    }
  }

  fn read_marker(&mut self) -> Result<Marker> {
    let marker = self.peek_marker()?;
    self.position += 1;
    Ok(marker)
  }

  pub fn is_nil(&self) -> Result<bool> {
    Ok(self.peek_marker()? == Marker::Null)
  }

  pub fn read_nil(&mut self) -> Result<()> {
    match self.read_marker()? {
      Marker::Null => Ok(()),
      unexpected => Err(Error::mismatch("nil", describe(unexpected))),
    }
  }

  pub fn read_bool(&mut self) -> Result<bool> {
    match self.read_marker()? {
      Marker::True => Ok(true),
      Marker::False => Ok(false),
      unexpected => Err(Error::mismatch("boolean", describe(unexpected))),
    }
  }

  /// 任意の幅の整数トークンを読み出します。
  pub fn read_integer(&mut self) -> Result<Integer> {
    let marker = self.read_marker()?;
    self.read_integer_body(marker)
  }

  fn read_integer_body(&mut self, marker: Marker) -> Result<Integer> {
    Ok(match marker {
      Marker::FixPos(value) => Integer::Unsigned(value as u64),
      Marker::FixNeg(value) => Integer::Signed(value as i64),
      Marker::U8 => Integer::Unsigned(self.take_u8()? as u64),
      Marker::U16 => Integer::Unsigned(BigEndian::read_u16(self.take(2)?) as u64),
      Marker::U32 => Integer::Unsigned(BigEndian::read_u32(self.take(4)?) as u64),
      Marker::U64 => Integer::Unsigned(BigEndian::read_u64(self.take(8)?)),
      Marker::I8 => Integer::Signed(self.take_u8()? as i8 as i64),
      Marker::I16 => Integer::Signed(BigEndian::read_i16(self.take(2)?) as i64),
      Marker::I32 => Integer::Signed(BigEndian::read_i32(self.take(4)?) as i64),
      Marker::I64 => Integer::Signed(BigEndian::read_i64(self.take(8)?)),
      unexpected => return Err(Error::mismatch("integer", describe(unexpected))),
    })
  }

  /// 整数トークンを `T` として読み出します。タグの幅は問わず、値が `T` の範囲に収まる場合のみ成功します。
  pub fn read_int<T>(&mut self) -> Result<T>
  where
    T: TryFrom<u64> + TryFrom<i64>,
  {
    let value = self.read_integer()?;
    let converted = match value {
      Integer::Unsigned(v) => <T as TryFrom<u64>>::try_from(v).ok(),
      Integer::Signed(v) => <T as TryFrom<i64>>::try_from(v).ok(),
    };
    converted.ok_or_else(|| Error::mismatch(std::any::type_name::<T>(), value.to_string()))
  }

  /// 浮動小数点トークンを `f32` として読み出します。`float64` や整数のトークンは誤差なく変換できる場合のみ
  /// 受け付けます。
  pub fn read_f32(&mut self) -> Result<f32> {
    match self.read_marker()? {
      Marker::F32 => Ok(BigEndian::read_f32(self.take(4)?)),
      Marker::F64 => {
        let value = BigEndian::read_f64(self.take(8)?);
        let narrowed = value as f32;
        if narrowed as f64 == value || value.is_nan() {
          Ok(narrowed)
        } else {
          Err(Error::mismatch("f32", format!("float64 {}", value)))
        }
      }
      marker => {
        let value = self.read_integer_body(marker)?;
        let converted = match value {
          Integer::Unsigned(v) => v as f32,
          Integer::Signed(v) => v as f32,
        };
        if value.is_exactly(converted as f64) {
          Ok(converted)
        } else {
          Err(Error::mismatch("f32", value.to_string()))
        }
      }
    }
  }

  /// 浮動小数点トークンを `f64` として読み出します。整数のトークンは誤差なく変換できる場合のみ受け付けます。
  pub fn read_f64(&mut self) -> Result<f64> {
    match self.read_marker()? {
      Marker::F32 => Ok(BigEndian::read_f32(self.take(4)?) as f64),
      Marker::F64 => Ok(BigEndian::read_f64(self.take(8)?)),
      marker => {
        let value = self.read_integer_body(marker)?;
        let converted = match value {
          Integer::Unsigned(v) => v as f64,
          Integer::Signed(v) => v as f64,
        };
        if value.is_exactly(converted) {
          Ok(converted)
        } else {
          Err(Error::mismatch("f64", value.to_string()))
        }
      }
    }
  }

  pub fn read_str(&mut self) -> Result<&'a str> {
    let length = match self.read_marker()? {
      Marker::FixStr(length) => length as usize,
      Marker::Str8 => self.take_u8()? as usize,
      Marker::Str16 => BigEndian::read_u16(self.take(2)?) as usize,
      Marker::Str32 => BigEndian::read_u32(self.take(4)?) as usize,
      unexpected => return Err(Error::mismatch("string", describe(unexpected))),
    };
    let bytes = self.take(length)?;
    std::str::from_utf8(bytes).map_err(|err| Error::mismatch("utf-8 string", err.to_string()))
  }

  pub fn read_bin(&mut self) -> Result<&'a [u8]> {
    let length = match self.read_marker()? {
      Marker::Bin8 => self.take_u8()? as usize,
      Marker::Bin16 => BigEndian::read_u16(self.take(2)?) as usize,
      Marker::Bin32 => BigEndian::read_u32(self.take(4)?) as usize,
      unexpected => return Err(Error::mismatch("binary", describe(unexpected))),
    };
    self.take(length)
  }

  pub fn read_array_len(&mut self) -> Result<usize> {
    match self.read_marker()? {
      Marker::FixArray(length) => Ok(length as usize),
      Marker::Array16 => Ok(BigEndian::read_u16(self.take(2)?) as usize),
      Marker::Array32 => Ok(BigEndian::read_u32(self.take(4)?) as usize),
      unexpected => Err(Error::mismatch("array", describe(unexpected))),
    }
  }

  pub fn read_map_len(&mut self) -> Result<usize> {
    match self.read_marker()? {
      Marker::FixMap(length) => Ok(length as usize),
      Marker::Map16 => Ok(BigEndian::read_u16(self.take(2)?) as usize),
      Marker::Map32 => Ok(BigEndian::read_u32(self.take(4)?) as usize),
      unexpected => Err(Error::mismatch("map", describe(unexpected))),
    }
  }

  /// 次の値をそのコンテナ要素も含めて読み飛ばします。拡張型のトークンも読み飛ばすことができます。
  pub fn skip(&mut self) -> Result<()> {
    let mut pending = 1usize;
    while pending > 0 {
      pending -= 1;
      let payload = match self.read_marker()? {
        Marker::Null | Marker::True | Marker::False | Marker::FixPos(_) | Marker::FixNeg(_) => 0,
        Marker::U8 | Marker::I8 => 1,
        Marker::U16 | Marker::I16 => 2,
        Marker::U32 | Marker::I32 | Marker::F32 => 4,
        Marker::U64 | Marker::I64 | Marker::F64 => 8,
        Marker::FixStr(length) => length as usize,
        Marker::Str8 | Marker::Bin8 => self.take_u8()? as usize,
        Marker::Str16 | Marker::Bin16 => BigEndian::read_u16(self.take(2)?) as usize,
        Marker::Str32 | Marker::Bin32 => BigEndian::read_u32(self.take(4)?) as usize,
        Marker::FixExt1 => 2,
        Marker::FixExt2 => 3,
        Marker::FixExt4 => 5,
        Marker::FixExt8 => 9,
        Marker::FixExt16 => 17,
        Marker::Ext8 => self.take_u8()? as usize + 1,
        Marker::Ext16 => BigEndian::read_u16(self.take(2)?) as usize + 1,
        Marker::Ext32 => BigEndian::read_u32(self.take(4)?) as usize + 1,
        Marker::FixArray(length) => {
          pending = pending.saturating_add(length as usize);
          0
        }
        Marker::Array16 => {
          pending = pending.saturating_add(BigEndian::read_u16(self.take(2)?) as usize);
          0
        }
        Marker::Array32 => {
          pending = pending.saturating_add(BigEndian::read_u32(self.take(4)?) as usize);
          0
        }
        Marker::FixMap(length) => {
          pending = pending.saturating_add(length as usize * 2);
          0
        }
        Marker::Map16 => {
          pending = pending.saturating_add(BigEndian::read_u16(self.take(2)?) as usize * 2);
          0
        }
        Marker::Map32 => {
          pending = pending.saturating_add((BigEndian::read_u32(self.take(4)?) as usize).saturating_mul(2));
          0
        }
        Marker::Reserved => return Err(Error::Format { marker: 0xC1, offset: self.position - 1 }),
      };
      self.take(payload)?;
    }
    Ok(())
  }
}

/// エラーメッセージ用にマーカーが表すトークンの種類を参照します。
pub fn describe(marker: Marker) -> &'static str {
  match marker {
    Marker::Null => "nil",
    Marker::True | Marker::False => "boolean",
    Marker::FixPos(_)
    | Marker::FixNeg(_)
    | Marker::U8
    | Marker::U16
    | Marker::U32
    | Marker::U64
    | Marker::I8
    | Marker::I16
    | Marker::I32
    | Marker::I64 => "integer",
    Marker::F32 | Marker::F64 => "float",
    Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => "string",
    Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => "binary",
    Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => "array",
    Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => "map",
    Marker::Reserved => "reserved",
    _ => "extension",
  }
}
