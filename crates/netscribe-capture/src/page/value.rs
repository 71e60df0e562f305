//! Page values and cycle-safe serialization of console arguments.
//!
//! Objects and arrays are shared references, so a page value graph can
//! contain cycles. Serialization is a recursive walk with a visited set of
//! object identities: any object reached a second time within the same
//! serialization renders as [`CIRCULAR_PLACEHOLDER`].

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Rendered in place of an object already visited in the current walk.
pub const CIRCULAR_PLACEHOLDER: &str = "[Circular]";

pub type ObjectRef = Rc<RefCell<IndexMap<String, PageValue>>>;
pub type ArrayRef = Rc<RefCell<Vec<PageValue>>>;

/// A value as seen inside the page.
#[derive(Debug, Clone)]
pub enum PageValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
}

impl PageValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, PageValue)>) -> Self {
        let map = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::Object(Rc::new(RefCell::new(map)))
    }

    pub fn array(items: impl IntoIterator<Item = PageValue>) -> Self {
        Self::Array(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Set a property on an object. No-op for other values.
    pub fn set(&self, key: impl Into<String>, value: PageValue) {
        if let Self::Object(obj) = self {
            obj.borrow_mut().insert(key.into(), value);
        }
    }

    /// Append to an array. No-op for other values.
    pub fn push(&self, value: PageValue) {
        if let Self::Array(arr) = self {
            arr.borrow_mut().push(value);
        }
    }
}

impl From<&str> for PageValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for PageValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for PageValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Text of one console argument: primitives converted directly, objects
/// and arrays through [`safe_stringify`].
pub fn format_arg(value: &PageValue) -> String {
    match value {
        PageValue::Undefined => "undefined".into(),
        PageValue::Null => "null".into(),
        PageValue::Bool(b) => b.to_string(),
        PageValue::Number(n) => number_to_string(*n),
        PageValue::String(s) => s.clone(),
        PageValue::Array(_) | PageValue::Object(_) => safe_stringify(value),
    }
}

/// Compact JSON of a value, never failing on cycles.
pub fn safe_stringify(value: &PageValue) -> String {
    let mut seen = HashSet::new();
    match to_json(value, &mut seen) {
        Some(json) => json.to_string(),
        None => "undefined".into(),
    }
}

/// `None` means "undefined": omitted from objects, `null` in arrays.
fn to_json(value: &PageValue, seen: &mut HashSet<*const ()>) -> Option<Value> {
    match value {
        PageValue::Undefined => None,
        PageValue::Null => Some(Value::Null),
        PageValue::Bool(b) => Some(Value::Bool(*b)),
        PageValue::Number(n) => Some(number_to_json(*n)),
        PageValue::String(s) => Some(Value::String(s.clone())),
        PageValue::Array(arr) => {
            if !seen.insert(Rc::as_ptr(arr) as *const ()) {
                return Some(Value::String(CIRCULAR_PLACEHOLDER.into()));
            }
            let items = arr
                .borrow()
                .iter()
                .map(|item| to_json(item, seen).unwrap_or(Value::Null))
                .collect();
            Some(Value::Array(items))
        }
        PageValue::Object(obj) => {
            if !seen.insert(Rc::as_ptr(obj) as *const ()) {
                return Some(Value::String(CIRCULAR_PLACEHOLDER.into()));
            }
            let mut map = Map::new();
            for (key, field) in obj.borrow().iter() {
                if let Some(json) = to_json(field, seen) {
                    map.insert(key.clone(), json);
                }
            }
            Some(Value::Object(map))
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Shortest round-trip digits; exponent form outside `[1e-6, 1e21)` as the
/// page's own number-to-string conversion does (`1e+21`, `1.5e-7`).
fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return String::from(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    let magnitude = n.abs();
    if magnitude == 0.0 || (1e-6..1e21).contains(&magnitude) {
        // `+ 0.0` folds negative zero into zero.
        return (n + 0.0).to_string();
    }
    let text = format!("{:e}", n);
    match text.split_once('e') {
        Some((digits, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", digits, exponent)
        }
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_format_as_text() {
        assert_eq!(format_arg(&PageValue::Undefined), "undefined");
        assert_eq!(format_arg(&PageValue::Null), "null");
        assert_eq!(format_arg(&true.into()), "true");
        assert_eq!(format_arg(&1.0.into()), "1");
        assert_eq!(format_arg(&1.5.into()), "1.5");
        assert_eq!(format_arg(&(-0.0).into()), "0");
        assert_eq!(format_arg(&f64::NAN.into()), "NaN");
        assert_eq!(format_arg(&"plain".into()), "plain");
    }

    #[test]
    fn test_large_and_tiny_numbers_use_exponent_form() {
        assert_eq!(format_arg(&1e21.into()), "1e+21");
        assert_eq!(format_arg(&(-1.5e300).into()), "-1.5e+300");
        assert_eq!(format_arg(&1e-7.into()), "1e-7");
        assert_eq!(format_arg(&2.5e-7.into()), "2.5e-7");
        assert_eq!(format_arg(&1e20.into()), "100000000000000000000");
        assert_eq!(format_arg(&0.000001.into()), "0.000001");
        assert_eq!(format_arg(&2f64.powi(60).into()), "1152921504606847000");
    }

    #[test]
    fn test_object_serializes_in_insertion_order() {
        let value = PageValue::object([
            ("b", PageValue::from(2.0)),
            ("a", PageValue::string("x")),
            ("skip", PageValue::Undefined),
            ("list", PageValue::array([PageValue::Undefined, PageValue::Null])),
        ]);
        assert_eq!(safe_stringify(&value), r#"{"b":2,"a":"x","list":[null,null]}"#);
    }

    #[test]
    fn test_self_cycle_uses_placeholder() {
        let obj = PageValue::object([("name", PageValue::string("root"))]);
        obj.set("self", obj.clone());
        assert_eq!(safe_stringify(&obj), r#"{"name":"root","self":"[Circular]"}"#);
    }

    #[test]
    fn test_indirect_cycle_through_array() {
        let parent = PageValue::object(Vec::<(String, PageValue)>::new());
        let children = PageValue::array(Vec::<PageValue>::new());
        let child = PageValue::object([("parent", parent.clone())]);
        children.push(child);
        parent.set("children", children);

        assert_eq!(
            safe_stringify(&parent),
            r#"{"children":[{"parent":"[Circular]"}]}"#
        );
    }

    #[test]
    fn test_repeated_reference_within_one_walk() {
        let shared = PageValue::object([("v", PageValue::from(1.0))]);
        let holder = PageValue::array([shared.clone(), shared.clone()]);
        assert_eq!(safe_stringify(&holder), r#"[{"v":1},"[Circular]"]"#);

        // A new serialization starts with an empty visited set.
        assert_eq!(safe_stringify(&shared), r#"{"v":1}"#);
    }

    #[test]
    fn test_non_finite_numbers_become_null() {
        let value = PageValue::array([f64::INFINITY.into(), 0.25.into()]);
        assert_eq!(safe_stringify(&value), "[null,0.25]");
    }
}
