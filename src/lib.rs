use std::io::Write;

use crate::builder::Builder;
use crate::walker::Walker;

pub mod builder;
pub mod codec;
pub mod context;
pub mod descriptor;
pub mod error;
mod macros;
pub mod value;
pub mod walker;


pub use context::{Context, Convention};
pub use descriptor::{resolve, Packable, PackableEnum};
pub use error::Error;
pub use value::Value;

pub type Result<T> = std::result::Result<T, error::Error>;

/// プロセス既定のコンテキストを使用して値を MessagePack にシリアライズします。
pub fn serialize<T: Packable>(value: &T) -> Result<Vec<u8>> {
  serialize_with(value, Context::default_context())
}

/// 指定されたコンテキストの規約で値を MessagePack にシリアライズします。
pub fn serialize_with<T: Packable>(value: &T, context: &Context) -> Result<Vec<u8>> {
  let mut buf = Vec::new();
  serialize_into(value, context, &mut buf)?;
  Ok(buf)
}

/// 値をシリアライズして `buf` に直接書き込みます。失敗した場合 `buf` に書き込まれた内容は不完全です。
pub fn serialize_into<T: Packable, W: Write>(value: &T, context: &Context, buf: W) -> Result<()> {
  let descriptor = resolve::<T>()?;
  log::trace!("serializing {} as {:?}", descriptor.name(), context.convention());
  let mut walker = Walker::new(buf, context);
  walker.encode(value, &descriptor)
}

/// プロセス既定のコンテキストを使用して MessagePack から値を復元します。
pub fn deserialize<T: Packable>(bytes: &[u8]) -> Result<T> {
  deserialize_with(bytes, Context::default_context())
}

/// 指定されたコンテキストの規約で MessagePack から値を復元します。値の後ろに余分なバイトが続く場合は失敗します。
pub fn deserialize_with<T: Packable>(bytes: &[u8], context: &Context) -> Result<T> {
  let descriptor = resolve::<T>()?;
  log::trace!("deserializing {} from {} bytes", descriptor.name(), bytes.len());
  let mut builder = Builder::new(bytes, context);
  let value = builder.decode(&descriptor)?;
  builder.finish()?;
  descriptor::unbox::<T>(value)
}
