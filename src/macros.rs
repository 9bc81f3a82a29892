/// ユーザ定義の構造体を、列挙したメンバーを宣言順にシリアライズするオブジェクトとして登録します。
/// 列挙されなかったフィールドはシリアライズの対象になりません。構造体は `Default` を実装している必要があります。
///
/// ```
/// #[derive(Debug, Default, PartialEq)]
/// struct Color {
///   red: f32,
///   green: f32,
///   blue: f32,
/// }
///
/// msgpacker::packable_object!(Color { red, green, blue });
///
/// let color = Color { red: 1.0, green: 0.5, blue: 0.0 };
/// let bytes = msgpacker::serialize(&color).unwrap();
/// assert_eq!(color, msgpacker::deserialize::<Color>(&bytes).unwrap());
/// ```
#[macro_export]
macro_rules! packable_object {
  ($ty:ty { $($field:ident),+ $(,)? }) => {
    impl $crate::Packable for $ty {
      fn category() -> $crate::Result<$crate::descriptor::Category> {
        $crate::descriptor::ObjectBuilder::<$ty>::new()
          $(.member(stringify!($field), |object| &object.$field, |object| &mut object.$field))+
          .build()
      }
    }
  };
}

/// フィールドを持たない列挙型を、その判別値 (`i64`) としてシリアライズする型として登録します。
/// 列挙型は `Copy` と `Default` を実装している必要があります。
#[macro_export]
macro_rules! packable_enum {
  ($ty:ident { $($variant:ident),+ $(,)? }) => {
    impl $crate::Packable for $ty {
      fn category() -> $crate::Result<$crate::descriptor::Category> {
        Ok($crate::descriptor::Category::enumeration::<$ty>())
      }
    }

    impl $crate::PackableEnum for $ty {
      fn to_discriminant(self) -> i64 {
        self as i64
      }

      fn from_discriminant(value: i64) -> Option<Self> {
        $(
          if value == $ty::$variant as i64 {
            return Some($ty::$variant);
          }
        )+
        None
      }
    }
  };
}
