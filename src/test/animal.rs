//! 複数のテストで共有するメッセージ型です。
use std::collections::HashMap;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum AnimalKind {
  #[default]
  Unknown,
  Dog,
  Cat,
  Bird = 10,
}

crate::packable_enum!(AnimalKind { Unknown, Dog, Cat, Bird });

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum Habitat {
  #[default]
  Unknown,
  Urban,
  Rural,
  Desert = -1,
}

crate::packable_enum!(Habitat { Unknown, Urban, Rural, Desert });

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum TestEnum {
  #[default]
  Entry0 = 0,
  Entry1,
}

crate::packable_enum!(TestEnum { Entry0, Entry1 });

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimalColor {
  pub red: f32,
  pub green: f32,
  pub blue: f32,
}

crate::packable_object!(AnimalColor { red, green, blue });

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimalMessage {
  pub is_alive: bool,
  pub height_inches: f32,
  pub animal_kind: AnimalKind,
  pub animal_name: String,
  pub animal_color: Option<AnimalColor>,
  /// 誕生日 (UNIX 時刻のミリ秒)
  pub birth_day: i64,
  pub spot_colors: Vec<AnimalColor>,
  pub more_colors: Option<Vec<AnimalColor>>,
  pub metadata: HashMap<String, String>,
  pub list_of_ints: Vec<i32>,
  pub current_habitat: Habitat,
  pub the_long_string: String,
  pub nullable_int_one: Option<i32>,
  pub nullable_int_two: Option<i32>,
  pub nullable_int_three: Option<i32>,
}

crate::packable_object!(AnimalMessage {
  is_alive,
  height_inches,
  animal_kind,
  animal_name,
  animal_color,
  birth_day,
  spot_colors,
  more_colors,
  metadata,
  list_of_ints,
  current_habitat,
  the_long_string,
  nullable_int_one,
  nullable_int_two,
  nullable_int_three,
});

impl AnimalMessage {
  /// すべてのメンバーに値を設定したメッセージを作成します。`more_colors`, `nullable_int_one`,
  /// `nullable_int_two` は値を持ちません。
  pub fn create_test_message() -> AnimalMessage {
    let mut metadata = HashMap::new();
    metadata.insert("Info".to_string(), "Fluffy".to_string());
    metadata.insert("Owner".to_string(), "Mary".to_string());
    AnimalMessage {
      is_alive: true,
      height_inches: 7.6,
      animal_kind: AnimalKind::Cat,
      animal_name: "Scruffy".to_string(),
      animal_color: Some(AnimalColor { red: 1.0, green: 0.1, blue: 0.1 }),
      birth_day: 1_286_668_800_000,
      spot_colors: vec![AnimalColor { red: 0.1, green: 1.0, blue: 0.1 }, AnimalColor { red: 1.0, green: 1.0, blue: 0.1 }],
      more_colors: None,
      metadata,
      list_of_ints: (0..7).map(|i| i * 5 - 10).collect(),
      current_habitat: Habitat::Urban,
      the_long_string: "The quick brown fox jumps over the lazy dog. ".repeat(40),
      nullable_int_one: None,
      nullable_int_two: None,
      nullable_int_three: Some(1),
    }
  }
}

/// 自身と同じ型の子要素を持つことのできるオブジェクト。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerializationTestObject {
  pub id: i32,
  pub name: String,
  pub ratio: f64,
  pub children: Vec<SerializationTestObject>,
}

crate::packable_object!(SerializationTestObject { id, name, ratio, children });

impl SerializationTestObject {
  pub fn new() -> SerializationTestObject {
    SerializationTestObject { id: 1, name: "root".to_string(), ratio: 0.5, children: Vec::new() }
  }

  /// 子要素を 1 つ追加します。追加した子要素はさらに子要素を持つことができます。
  pub fn add_child(&mut self) -> &mut SerializationTestObject {
    let id = self.id * 10 + self.children.len() as i32 + 1;
    self.children.push(SerializationTestObject {
      id,
      name: format!("child-{}", id),
      ratio: self.ratio / 2.0,
      children: Vec::new(),
    });
    self
  }

  pub fn with_child(mut self) -> SerializationTestObject {
    self.add_child();
    self
  }
}
