use pretty_assertions::assert_eq;

use super::*;

#[test]
fn numeric_equality_is_per_variant() {
    assert_eq!(Value::Int(1), Value::Int(1));
    assert_ne!(Value::Int(1), Value::Long(1));
    assert_ne!(Value::Double(f64::NAN), Value::Double(f64::NAN));
}

#[test]
fn assumptions_compare_by_identity() {
    let a = Assumption::new("stable");
    let b = Assumption::new("stable");
    assert_eq!(Value::Assumption(a.clone()), Value::Assumption(a));
    assert_ne!(
        Value::Assumption(Assumption::new("x")),
        Value::Assumption(b)
    );
}

#[test]
fn long_to_double_rejects_lossy_values() {
    assert_eq!(long_to_double_exact(42), Some(42.0));
    assert_eq!(long_to_double_exact(1 << 53), Some(9_007_199_254_740_992.0));
    assert_eq!(long_to_double_exact((1 << 53) + 1), None);
    assert_eq!(long_to_double_exact(i64::MAX), None);
    assert_eq!(long_to_double_exact(i64::MIN), Some(-9_223_372_036_854_775_808.0));
}

#[test]
fn narrow_long_to_int_checks_range() {
    assert_eq!(
        narrow(&Value::Long(7), NarrowTarget::Int),
        Ok(Value::Int(7))
    );
    let err = narrow(&Value::Long(i64::from(i32::MAX) + 1), NarrowTarget::Int);
    assert!(err.is_err());
}

#[test]
fn narrow_double_requires_integral_value() {
    assert_eq!(
        narrow(&Value::Double(3.0), NarrowTarget::Long),
        Ok(Value::Long(3))
    );
    assert!(narrow(&Value::Double(3.5), NarrowTarget::Long).is_err());
    assert!(narrow(&Value::Double(f64::INFINITY), NarrowTarget::Int).is_err());
    assert!(narrow(&Value::Double(1e300), NarrowTarget::Long).is_err());
}

#[test]
fn narrow_rejects_non_numeric() {
    let err = narrow(&Value::from("1"), NarrowTarget::Int);
    assert_eq!(
        err.map_err(|e| e.to_string()),
        Err("cannot narrow \"1\" to Int without losing information".to_string())
    );
}

#[test]
fn display_and_debug() {
    assert_eq!(Value::from("x").to_string(), "x");
    assert_eq!(format!("{:?}", Value::from("x")), "\"x\"");
    assert_eq!(format!("{:?}", Value::Long(5)), "5L");
    assert_eq!(format!("{:?}", Value::Double(2.0)), "2.0");
    assert_eq!(Value::Unit.kind_name(), "unit");
}

#[test]
fn accessors() {
    assert_eq!(Value::Int(4).as_i64(), Some(4));
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Long((1 << 53) + 1).as_f64_exact(), None);
    assert!(Value::Int(1).as_assumption().is_none());
}
