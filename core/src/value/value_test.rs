use pretty_assertions::assert_eq;

use super::Value;
use crate::vm::Constant;

#[test]
fn test_truthiness() {
    assert!(!Value::Nil.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(Value::Bool(true).is_truthy());
    assert!(Value::Int(0).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::new_table(0).is_truthy());
}

#[test]
fn test_clone_copies_strings() {
    let original = Value::from("hello");
    let mut copy = original.clone();
    if let Value::Str(s) = &mut copy {
        s.push('!');
    }
    assert_eq!(original, Value::from("hello"));
    assert_eq!(copy, Value::from("hello!"));
}

#[test]
fn test_tables_compare_by_identity() {
    let a = Value::new_table(1);
    let b = Value::new_table(1);
    assert_eq!(a, a.clone());
    assert!(a != b);
}

#[test]
fn test_int_and_float_are_distinct_values() {
    assert!(Value::Int(3) != Value::Float(3.0));
    assert_eq!(Value::Int(3).as_number(), Value::Float(3.0).as_number());
}

#[test]
fn test_from_constant() {
    assert_eq!(Value::from(&Constant::Int(7)), Value::Int(7));
    assert_eq!(Value::from(&Constant::Float(0.5)), Value::Float(0.5));
    assert_eq!(Value::from(&Constant::Str("k".into())), Value::from("k"));
}

#[test]
fn test_display_and_debug() {
    assert_eq!(Value::Nil.to_string(), "nil");
    assert_eq!(Value::Float(3.0).to_string(), "3");
    assert_eq!(Value::Float(2.5).to_string(), "2.5");
    assert_eq!(format!("{:?}", Value::Float(3.0)), "Float(3.0)");

    let table = Value::new_table(2);
    if let Value::Table(t) = &table {
        // A table holding itself must still be printable.
        t.borrow_mut().set("self", table.clone());
    }
    assert_eq!(format!("{table:?}"), "Table(array: 2, dict: 1)");
    assert!(table.to_string().starts_with("table: 0x"));
}
