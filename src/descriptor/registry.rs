use std::any::TypeId;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::descriptor::{Packable, TypeDescriptor};
use crate::Result;

/// プロセス全体で共有される型記述子のキャッシュ。
///
/// 同じ型が複数のスレッドから同時に初めて解決された場合、記述子は複数回構築されることがありますが、公開される
/// のは最初に登録された 1 つだけです。構築途中の記述子が公開されることはありません。
struct Registry {
  descriptors: RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>,
  /// 到達可能なすべての型の解決に成功したことを確認済みの型。
  verified: RwLock<HashSet<TypeId>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
  REGISTRY.get_or_init(|| Registry { descriptors: RwLock::new(HashMap::new()), verified: RwLock::new(HashSet::new()) })
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
  lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
  lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// 型 `T` の記述子を参照します。内包する型の解決は行いません。
pub(crate) fn lookup<T: Packable>() -> Result<Arc<TypeDescriptor>> {
  let type_id = TypeId::of::<T>();
  if let Some(descriptor) = read(&registry().descriptors).get(&type_id) {
    return Ok(descriptor.clone());
  }

  // T::category() は他の型を解決しないため、ロックの外で構築する
  let descriptor = Arc::new(TypeDescriptor::new::<T>(T::category()?));
  let (published, registered) = publish(&mut write(&registry().descriptors), descriptor);
  if registered {
    log::debug!("type descriptor registered: {} as {:?}", published.name(), published.category());
  }
  Ok(published)
}

/// 記述子を公開します。他のスレッドが先に同じ型を公開していた場合はそちらを返し、2 番目の値は `false` になります。
pub(super) fn publish(
  descriptors: &mut HashMap<TypeId, Arc<TypeDescriptor>>,
  descriptor: Arc<TypeDescriptor>,
) -> (Arc<TypeDescriptor>, bool) {
  match descriptors.entry(descriptor.type_id()) {
    Entry::Occupied(entry) => (entry.get().clone(), false),
    Entry::Vacant(entry) => (entry.insert(descriptor).clone(), true),
  }
}

/// 型 `T` の記述子を解決します。
///
/// 初回の解決時には `T` から到達可能なすべての型を解決し、シリアライズできない型が含まれていれば
/// `UnsupportedType` で失敗します。したがってエンコードを開始する前にエラーを検出することができます。
pub fn resolve<T: Packable>() -> Result<Arc<TypeDescriptor>> {
  let type_id = TypeId::of::<T>();
  let descriptor = lookup::<T>()?;
  if read(&registry().verified).contains(&type_id) {
    return Ok(descriptor);
  }

  let mut visited = HashSet::new();
  visited.insert(type_id);
  let mut pending = descriptor.category().children();
  while let Some(child) = pending.pop() {
    if visited.insert(child.type_id()) {
      pending.extend(child.descriptor()?.category().children());
    }
  }
  write(&registry().verified).extend(visited);
  Ok(descriptor)
}
