use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Key reserved for the store-assigned identifier.
pub const ID_KEY: &str = "id";

/// One persisted record. `id` is always assigned by the store; everything else
/// is whatever the caller sent, kept in the order it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: i64,
    #[serde(flatten)]
    pub fields: ProductFields,
}

impl Product {
    pub fn new(id: i64, fields: ProductFields) -> Self {
        Self { id, fields }
    }

    /// Shallow merge: keys in `changes` replace existing keys, others are kept.
    pub fn merge(&mut self, changes: ProductFields) {
        for (key, value) in changes.0 {
            self.fields.0.insert(key, value);
        }
    }
}

/// Accepts integers and integral floats (`1.0`), since hand-edited files may
/// carry either.
fn deserialize_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    if let Some(id) = number.as_i64() {
        return Ok(id);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(de::Error::custom(format!(
            "product id must be an integer, got {number}"
        ))),
    }
}

/// Open, unvalidated key/value payload of a product.
///
/// Never contains [`ID_KEY`]: a caller-supplied `id` is dropped on construction
/// so it can't shadow or rewrite the store's identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductFields(Map<String, Value>);

#[derive(Debug, thiserror::Error)]
pub enum FieldsError {
    #[error("request body is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,
}

impl ProductFields {
    pub fn new(mut map: Map<String, Value>) -> Self {
        map.remove(ID_KEY);
        Self(map)
    }

    /// Parse a raw request body. An empty (or all-whitespace) body is an
    /// empty object.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, FieldsError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Self::try_from(serde_json::from_slice::<Value>(bytes)?)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Value> for ProductFields {
    type Error = FieldsError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::new(map)),
            _ => Err(FieldsError::NotAnObject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> ProductFields {
        ProductFields::try_from(value).unwrap()
    }

    // ── Serialization ──────────────────────────────────────────────────────────

    #[test]
    fn serializes_id_first_then_fields_in_order() {
        let p = Product::new(3, fields(json!({ "name": "pen", "price": 2 })));
        let text = serde_json::to_string(&p).unwrap();
        assert_eq!(text, r#"{"id":3,"name":"pen","price":2}"#);
    }

    #[test]
    fn deserialize_splits_id_from_fields() {
        let p: Product = serde_json::from_value(json!({ "id": 7, "name": "book" })).unwrap();
        assert_eq!(p.id, 7);
        assert_eq!(p.fields.len(), 1);
        assert_eq!(p.fields.get("name"), Some(&json!("book")));
        assert!(p.fields.get("id").is_none());
    }

    #[test]
    fn deserialize_rejects_record_without_integer_id() {
        assert!(serde_json::from_value::<Product>(json!({ "name": "x" })).is_err());
        assert!(serde_json::from_value::<Product>(json!({ "id": "1" })).is_err());
        assert!(serde_json::from_value::<Product>(json!({ "id": 1.5 })).is_err());
    }

    #[test]
    fn deserialize_accepts_integral_float_id() {
        let p: Product = serde_json::from_str(r#"{"id": 1.0, "name": "pen"}"#).unwrap();
        assert_eq!(p.id, 1);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"id":1,"name":"pen"}"#);
    }

    // ── Payload parsing ────────────────────────────────────────────────────────

    #[test]
    fn caller_supplied_id_is_dropped() {
        let f = fields(json!({ "id": 99, "name": "pen" }));
        assert!(f.get("id").is_none());
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert!(ProductFields::from_json_bytes(b"").unwrap().is_empty());
        assert!(ProductFields::from_json_bytes(b" \n").unwrap().is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(matches!(
            ProductFields::from_json_bytes(b"[1,2]"),
            Err(FieldsError::NotAnObject)
        ));
        assert!(matches!(
            ProductFields::from_json_bytes(b"{oops"),
            Err(FieldsError::Malformed(_))
        ));
    }

    // ── Merge ──────────────────────────────────────────────────────────────────

    #[test]
    fn merge_overrides_and_keeps_untouched_fields() {
        let mut p = Product::new(1, fields(json!({ "name": "pen", "stock": 4 })));
        p.merge(fields(json!({ "stock": 10, "color": "blue" })));
        assert_eq!(p.fields.get("name"), Some(&json!("pen")));
        assert_eq!(p.fields.get("stock"), Some(&json!(10)));
        assert_eq!(p.fields.get("color"), Some(&json!("blue")));
        assert_eq!(p.id, 1);
    }
}
