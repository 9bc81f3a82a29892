use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::descriptor::Packable;


/// ネストの深さの既定の上限です。
///
/// エンコードとデコードはネスト 1 段ごとに複数のスタックフレームを消費します。この値は標準のスレッド (2 MiB の
/// スタック) で上限までネストした入力を処理できるように選ばれています。`Context::with_max_depth` で上限を引き
/// 上げる場合は、呼び出し側のスレッドに十分なスタックを確保してください。
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// ユーザ定義オブジェクトのメンバーをワイヤ上にどのように配置するかの規約。
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Convention {
  /// メンバー名をキーとするマップ。受信側でのメンバーの追加や削除に耐えられますが、メンバー名の分だけ冗長になります。
  Map,
  /// 宣言順に並べた配列。コンパクトですが、送信側と受信側でメンバーの順序が一致している必要があります。
  Array,
}

impl Default for Convention {
  fn default() -> Self {
    Convention::Array
  }
}

/// シリアライズの設定を保持するコンテキスト。既定の規約と型ごとの規約の上書き、ネストの深さの上限を持ちます。
///
/// 設定の変更は `&self` で行うことができ、内部でロックされているため複数のスレッドから共有することができます。
/// ただし処理中の呼び出しはオブジェクトを読み込むたびに規約を参照するため、他のスレッドで規約を変更すると同じ
/// グラフ内で異なる規約が混在する可能性があります。それを避けたい場合は呼び出しごとに個別のコンテキストを使用
/// してください。
#[derive(Debug)]
pub struct Context {
  convention: RwLock<Convention>,
  overrides: RwLock<HashMap<TypeId, Convention>>,
  max_depth: usize,
}

static DEFAULT_CONTEXT: OnceLock<Context> = OnceLock::new();

impl Context {
  pub fn new(convention: Convention) -> Context {
    Context { convention: RwLock::new(convention), overrides: RwLock::new(HashMap::new()), max_depth: DEFAULT_MAX_DEPTH }
  }

  /// ネストの深さの上限を変更したコンテキストを返します。
  pub fn with_max_depth(mut self, max_depth: usize) -> Context {
    self.max_depth = max_depth;
    self
  }

  /// プロセス全体で共有される既定のコンテキストを参照します。
  pub fn default_context() -> &'static Context {
    DEFAULT_CONTEXT.get_or_init(Context::default)
  }

  pub fn convention(&self) -> Convention {
    *self.convention.read().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn set_default_convention(&self, convention: Convention) {
    let mut current = self.convention.write().unwrap_or_else(PoisonError::into_inner);
    if *current != convention {
      log::debug!("default convention changed: {:?} -> {:?}", *current, convention);
      *current = convention;
    }
  }

  /// 型 `T` のオブジェクトに対してのみ既定と異なる規約を使用します。
  pub fn override_convention<T: Packable>(&self, convention: Convention) {
    self.overrides.write().unwrap_or_else(PoisonError::into_inner).insert(TypeId::of::<T>(), convention);
  }

  pub fn remove_override<T: Packable>(&self) -> Option<Convention> {
    self.overrides.write().unwrap_or_else(PoisonError::into_inner).remove(&TypeId::of::<T>())
  }

  /// 指定された型のオブジェクトに適用する規約を参照します。
  pub fn convention_for(&self, type_id: TypeId) -> Convention {
    let overrides = self.overrides.read().unwrap_or_else(PoisonError::into_inner);
    match overrides.get(&type_id) {
      Some(convention) => *convention,
      None => self.convention(),
    }
  }

  pub fn max_depth(&self) -> usize {
    self.max_depth
  }
}

impl Default for Context {
  fn default() -> Self {
    Context::new(Convention::default())
  }
}
