use std::cell::RefCell;
use std::io::{ErrorKind, Write};
use std::rc::Rc;

use crate::context::{Context, Convention, DEFAULT_MAX_DEPTH};
use crate::descriptor::resolve;
use crate::error::Error;
use crate::test::animal::{AnimalColor, AnimalMessage, Habitat, SerializationTestObject};
use crate::value::Value;
use crate::walker::Walker;
use crate::{deserialize_with, serialize_into, serialize_with};

#[derive(Debug, Default, PartialEq)]
struct Sparse {
  a: Option<i32>,
  b: i32,
  c: Option<String>,
}

crate::packable_object!(Sparse { a, b, c });

#[derive(Debug, Default, PartialEq)]
struct Node {
  name: String,
  next: Option<Rc<RefCell<Node>>>,
}

crate::packable_object!(Node { name, next });

impl Node {
  fn shared(name: &str) -> Rc<RefCell<Node>> {
    Rc::new(RefCell::new(Node { name: name.to_string(), next: None }))
  }

  /// `length` 個のノードを一列につないだ循環のないリストを作成します。
  fn chain(length: usize) -> Rc<RefCell<Node>> {
    let head = Node::shared("0");
    let mut tail = head.clone();
    for i in 1..length {
      let node = Node::shared(&i.to_string());
      tail.borrow_mut().next = Some(node.clone());
      tail = node;
    }
    head
  }

  /// 長いリストの再帰的な解放でスタックを使い果たさないように先頭から順に切り離します。
  fn unlink(head: &Rc<RefCell<Node>>) {
    let mut next = head.borrow_mut().next.take();
    while let Some(node) = next {
      next = node.borrow_mut().next.take();
    }
  }
}

struct BrokenPipe;

impl Write for BrokenPipe {
  fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
    Err(std::io::Error::new(ErrorKind::BrokenPipe, "closed"))
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

#[test]
fn test_map_convention_omits_absent_members() {
  let context = Context::new(Convention::Map);

  // 値を持たない null 許容メンバーは書き込まれない
  let sparse = Sparse { a: None, b: 5, c: None };
  assert_eq!(vec![0x81, 0xA1, b'b', 0x05], serialize_with(&sparse, &context).unwrap());

  let sparse = Sparse { a: Some(-1), b: 0, c: Some("x".to_string()) };
  assert_eq!(
    vec![0x83, 0xA1, b'a', 0xFF, 0xA1, b'b', 0x00, 0xA1, b'c', 0xA1, b'x'],
    serialize_with(&sparse, &context).unwrap()
  );
}

#[test]
fn test_array_convention_writes_every_slot() {
  let context = Context::new(Convention::Array);

  // 値を持たないメンバーも nil としてスロットを占有する
  let sparse = Sparse { a: None, b: 5, c: None };
  assert_eq!(vec![0x93, 0xC0, 0x05, 0xC0], serialize_with(&sparse, &context).unwrap());

  // メッセージのすべてのメンバーが宣言順に並ぶ
  let bytes = serialize_with(&AnimalMessage::create_test_message(), &context).unwrap();
  assert_eq!(&[0xDC, 0x00, 0x0F, 0xC3], &bytes[..4]);
}

#[test]
fn test_convention_override() {
  // AnimalColor のみ配列規約で書き込む
  let context = Context::new(Convention::Map);
  context.override_convention::<AnimalColor>(Convention::Array);
  let color = AnimalColor { red: 1.0, green: 0.0, blue: 0.0 };
  let message = AnimalMessage { animal_color: Some(color), ..Default::default() };
  let bytes = serialize_with(&message, &context).unwrap();
  assert_eq!(0x8B, bytes[0]);
  let mut expected = vec![0xAC];
  expected.extend_from_slice(b"animal_color");
  expected.extend_from_slice(&[0x93, 0xCA, 0x3F, 0x80, 0x00, 0x00]);
  assert!(bytes.windows(expected.len()).any(|w| w == &expected[..]));

  // 上書きがなければマップで書き込まれる
  context.remove_override::<AnimalColor>();
  let color = serialize_with(&AnimalColor::default(), &context).unwrap();
  assert_eq!(0x83, color[0]);
}

#[test]
fn test_walker() {
  // 1 つのライターに複数の値を続けて書き込む
  let context = Context::new(Convention::Array);
  let mut walker = Walker::new(Vec::new(), &context);
  walker.encode(&AnimalColor::default(), &resolve::<AnimalColor>().unwrap()).unwrap();
  walker.encode(&"end".to_string(), &resolve::<String>().unwrap()).unwrap();
  let bytes = walker.into_inner();
  assert_eq!(0x93, bytes[0]);
  assert_eq!(vec![0xA3, b'e', b'n', b'd'], bytes[bytes.len() - 4..].to_vec());

  // 記述子と異なる型の値
  let mut walker = Walker::new(Vec::new(), &context);
  let result = walker.encode(&1i64, &resolve::<String>().unwrap());
  assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
}

#[test]
fn test_primitive_encoding() {
  let context = Context::default();
  assert_eq!(vec![0x7F], serialize_with(&127i32, &context).unwrap());
  assert_eq!(vec![0xCD, 0xFF, 0xFF], serialize_with(&u16::MAX, &context).unwrap());
  assert_eq!(vec![0x41], serialize_with(&'A', &context).unwrap());
  assert_eq!(vec![0xA2, b'h', b'i'], serialize_with(&"hi".to_string(), &context).unwrap());
  assert_eq!(vec![0xC4, 0x01, 0x09], serialize_with(&Box::<[u8]>::from(&[9u8][..]), &context).unwrap());
  assert_eq!(vec![0xC0], serialize_with(&Option::<i64>::None, &context).unwrap());
  assert_eq!(vec![0x02], serialize_with(&Some(2u8), &context).unwrap());

  // 列挙型は判別値で書き込まれる
  assert_eq!(vec![0x01], serialize_with(&Habitat::Urban, &context).unwrap());
  assert_eq!(vec![0xFF], serialize_with(&Habitat::Desert, &context).unwrap());
}

#[test]
fn test_dynamic_value_tags() {
  let context = Context::default();

  // Nil 以外は [tag, payload] として書き込まれる
  assert_eq!(vec![0xC0], serialize_with(&Value::Nil, &context).unwrap());
  assert_eq!(vec![0x92, 0x01, 0xC2], serialize_with(&Value::Bool(false), &context).unwrap());
  assert_eq!(vec![0x92, 0x02, 0x05], serialize_with(&Value::Int(5), &context).unwrap());
  assert_eq!(vec![0x92, 0x03, 0x05], serialize_with(&Value::UInt(5), &context).unwrap());
  assert_eq!(vec![0x92, 0x04, 0xCA, 0x3F, 0x80, 0x00, 0x00], serialize_with(&Value::F32(1.0), &context).unwrap());
  assert_eq!(vec![0x92, 0x06, 0xA1, b's'], serialize_with(&Value::from("s"), &context).unwrap());
  assert_eq!(vec![0x92, 0x07, 0xC4, 0x01, 0x00], serialize_with(&Value::Binary(vec![0]), &context).unwrap());

  // コンテナの要素もそれぞれタグ付きで書き込まれる
  let array = Value::Array(vec![Value::Int(-1), Value::Nil]);
  assert_eq!(vec![0x92, 0x08, 0x92, 0x92, 0x02, 0xFF, 0xC0], serialize_with(&array, &context).unwrap());
  let map = Value::Map(vec![(Value::from("k"), Value::Bool(true))]);
  assert_eq!(
    vec![0x92, 0x09, 0x81, 0x92, 0x06, 0xA1, b'k', 0x92, 0x01, 0xC3],
    serialize_with(&map, &context).unwrap()
  );
}

#[test]
fn test_cyclic_reference() {
  let context = Context::default();

  // 自己参照
  let node = Node::shared("self");
  node.borrow_mut().next = Some(node.clone());
  match serialize_with(&node, &context) {
    Err(Error::CyclicReference { name }) => assert!(name.contains("Node")),
    other => panic!("unexpected result: {:?}", other),
  }
  node.borrow_mut().next = None;

  // 2 つのノードによる循環
  let a = Node::shared("a");
  let b = Node::shared("b");
  a.borrow_mut().next = Some(b.clone());
  b.borrow_mut().next = Some(a.clone());
  assert!(matches!(serialize_with(&a, &context), Err(Error::CyclicReference { .. })));
  let root = Node { name: "root".to_string(), next: Some(b.clone()) };
  assert!(matches!(serialize_with(&root, &context), Err(Error::CyclicReference { .. })));
  b.borrow_mut().next = None;

  // 循環を解消すれば書き込める
  assert!(serialize_with(&a, &context).is_ok());
}

#[test]
fn test_shared_reference_without_cycle() {
  let context = Context::new(Convention::Array);

  // 同じインスタンスを複数の位置から参照していても循環でなければ書き込める
  let shared = Node::shared("shared");
  let list = vec![shared.clone(), shared.clone()];
  let bytes = serialize_with(&list, &context).unwrap();
  assert_eq!(vec![0x92, 0x92, 0xA6, b's', b'h', b'a', b'r', b'e', b'd', 0xC0], bytes[..10].to_vec());

  // 復元した値はそれぞれ別のインスタンスになる
  let restored = deserialize_with::<Vec<Rc<RefCell<Node>>>>(&bytes, &context).unwrap();
  assert_eq!(list, restored);
  assert!(!Rc::ptr_eq(&restored[0], &restored[1]));
}

#[test]
fn test_mutably_borrowed() {
  let context = Context::default();
  let node = Node::shared("busy");
  let _guard = node.borrow_mut();
  assert!(matches!(serialize_with(&node, &context), Err(Error::Borrowed { .. })));
}

#[test]
fn test_nesting_too_deep() {
  let nested = vec![vec![vec![1i32]]];

  // 上限を超えるネスト
  let context = Context::new(Convention::Array).with_max_depth(3);
  assert_eq!(Err(Error::NestingTooDeep { maximum: 3 }), serialize_with(&nested, &context));

  // 上限内のネスト
  let context = Context::new(Convention::Array).with_max_depth(4);
  assert_eq!(vec![0x91, 0x91, 0x91, 0x01], serialize_with(&nested, &context).unwrap());

  // 動的な値のネストも数える
  let context = Context::new(Convention::Array).with_max_depth(2);
  let value = Value::Array(vec![Value::Array(vec![Value::Int(1)])]);
  assert_eq!(Err(Error::NestingTooDeep { maximum: 2 }), serialize_with(&value, &context));
}

#[test]
fn test_default_max_depth() {
  let context = Context::new(Convention::Array);

  // 動的な値は配列 1 段ごとに 1 段を消費する
  let nested = |levels: usize| (1..levels).fold(Value::Nil, |value, _| Value::Array(vec![value]));
  assert!(serialize_with(&nested(DEFAULT_MAX_DEPTH - 1), &context).is_ok());
  assert!(serialize_with(&nested(DEFAULT_MAX_DEPTH), &context).is_ok());
  let result = serialize_with(&nested(DEFAULT_MAX_DEPTH + 1), &context);
  assert_eq!(Err(Error::NestingTooDeep { maximum: DEFAULT_MAX_DEPTH }), result);

  // オブジェクトは自身とメンバーで 2 段を消費する
  let objects = |levels: usize| {
    (1..levels).fold(SerializationTestObject::new(), |child, _| SerializationTestObject {
      children: vec![child],
      ..SerializationTestObject::new()
    })
  };
  assert!(serialize_with(&objects(DEFAULT_MAX_DEPTH / 2), &context).is_ok());
  for levels in [DEFAULT_MAX_DEPTH / 2 + 1, 254] {
    let result = serialize_with(&objects(levels), &context);
    assert_eq!(Err(Error::NestingTooDeep { maximum: DEFAULT_MAX_DEPTH }), result);
  }
}

#[test]
fn test_long_shared_chain() {
  let context = Context::new(Convention::Array);

  // 共有参照のノードは参照、オブジェクト、null 許容メンバーで 3 段を消費する
  let head = Node::chain(DEFAULT_MAX_DEPTH / 3);
  let bytes = serialize_with(&head, &context).unwrap();
  let restored = deserialize_with::<Rc<RefCell<Node>>>(&bytes, &context).unwrap();
  assert_eq!(head, restored);
  Node::unlink(&restored);
  Node::unlink(&head);

  // 循環のない長いリストは上限で失敗する
  for length in [DEFAULT_MAX_DEPTH / 3 + 1, 200, 10_000] {
    let head = Node::chain(length);
    let result = serialize_with(&head, &context);
    assert_eq!(Err(Error::NestingTooDeep { maximum: DEFAULT_MAX_DEPTH }), result);
    Node::unlink(&head);
  }
}

#[test]
fn test_serialize_into_sink() {
  let context = Context::default();

  // 既存のバッファに追記される
  let mut buf = vec![0xC0];
  serialize_into(&vec![1u8, 2], &context, &mut buf).unwrap();
  assert_eq!(vec![0xC0, 0x92, 0x01, 0x02], buf);

  // 書き込み先のエラー
  match serialize_into(&1i32, &context, BrokenPipe) {
    Err(Error::Io { kind, .. }) => assert_eq!(ErrorKind::BrokenPipe, kind),
    other => panic!("unexpected result: {:?}", other),
  }
}
