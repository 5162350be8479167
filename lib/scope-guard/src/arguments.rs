use std::fmt;

use serde_json::Value;

/// Locates a value inside request arguments or a resolved object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentPath {
    /// A single top-level key.
    Key(String),
    /// Keys looked up one after another through nested maps. Lists met on the
    /// way fan out: the rest of the path is applied to every element.
    Nested(Vec<String>),
    /// Several scoped values, each under its own path, keyed by output name.
    Fields(Vec<(String, ArgumentPath)>),
}

impl ArgumentPath {
    pub fn key(key: impl Into<String>) -> Self {
        ArgumentPath::Key(key.into())
    }

    pub fn nested<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ArgumentPath::Nested(keys.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ArgumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentPath::Key(key) => write!(f, "{}", key),
            ArgumentPath::Nested(keys) => write!(f, "[{}]", keys.join(", ")),
            ArgumentPath::Fields(fields) => {
                write!(f, "{{")?;
                for (i, (name, path)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, path)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Values extracted by an [`ArgumentPath`], shaped for the scope check.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeValue {
    /// One scalar (or `null`), checked with a single hook call.
    Single(Value),
    /// Produced by list fan-out, every element must pass.
    Each(Vec<ScopeValue>),
    /// Produced by a [`ArgumentPath::Fields`] path, every entry must pass.
    Fields(Vec<(String, ScopeValue)>),
}

impl ScopeValue {
    /// Every scalar in extraction order, the hook is called once per item.
    pub fn leaves(&self) -> Vec<&Value> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }

    /// Every scalar with the name of the multi-field entry it was extracted
    /// under. Scalars outside a [`ScopeValue::Fields`] carry `None`.
    pub fn entries(&self) -> Vec<(Option<&str>, &Value)> {
        let mut entries = Vec::new();
        self.collect_entries(None, &mut entries);
        entries
    }

    fn collect_entries<'a>(
        &'a self,
        field: Option<&'a str>,
        entries: &mut Vec<(Option<&'a str>, &'a Value)>,
    ) {
        match self {
            ScopeValue::Single(value) => entries.push((field, value)),
            ScopeValue::Each(items) => items
                .iter()
                .for_each(|item| item.collect_entries(field, entries)),
            ScopeValue::Fields(fields) => fields
                .iter()
                .for_each(|(name, value)| value.collect_entries(Some(name.as_str()), entries)),
        }
    }
}

/// The path ended on a map, which can not be handed to a scope check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonScalarLeaf {
    pub path: String,
}

/// Extracts the values `path` points to in `source`.
///
/// `Ok(None)` means a key is absent. A key present with `null` is a value and
/// is forwarded to the access policy, which decides what `null` means.
pub fn extract(source: &Value, path: &ArgumentPath) -> Result<Option<ScopeValue>, NonScalarLeaf> {
    match path {
        ArgumentPath::Key(key) => extract_keys(source, std::slice::from_ref(key), path),
        ArgumentPath::Nested(keys) => extract_keys(source, keys, path),
        ArgumentPath::Fields(fields) => {
            let mut extracted = Vec::with_capacity(fields.len());
            for (name, field_path) in fields {
                match extract(source, field_path)? {
                    Some(value) => extracted.push((name.clone(), value)),
                    None => return Ok(None),
                }
            }
            Ok(Some(ScopeValue::Fields(extracted)))
        }
    }
}

fn extract_keys(
    current: &Value,
    keys: &[String],
    path: &ArgumentPath,
) -> Result<Option<ScopeValue>, NonScalarLeaf> {
    match (keys.split_first(), current) {
        (_, Value::Array(items)) => fan_out(items, keys, path),
        (None, Value::Object(_)) => Err(NonScalarLeaf {
            path: path.to_string(),
        }),
        (None, scalar) => Ok(Some(ScopeValue::Single(scalar.clone()))),
        (Some((key, rest)), Value::Object(map)) => match map.get(key) {
            Some(value) => extract_keys(value, rest, path),
            None => Ok(None),
        },
        // A scalar or null where a map was expected: the key is not there.
        (Some(_), _) => Ok(None),
    }
}

fn fan_out(
    items: &[Value],
    keys: &[String],
    path: &ArgumentPath,
) -> Result<Option<ScopeValue>, NonScalarLeaf> {
    let mut extracted = Vec::with_capacity(items.len());
    for item in items {
        match extract_keys(item, keys, path)? {
            Some(value) => extracted.push(value),
            None => return Ok(None),
        }
    }
    Ok(Some(ScopeValue::Each(extracted)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract, ArgumentPath, NonScalarLeaf, ScopeValue};

    #[test]
    fn extracts_top_level_key() {
        let args = json!({ "id": 7 });
        assert_eq!(
            extract(&args, &ArgumentPath::key("id")),
            Ok(Some(ScopeValue::Single(json!(7))))
        );
    }

    #[test]
    fn extracts_nested_path() {
        let path = ArgumentPath::nested(["params", "id"]);

        assert_eq!(
            extract(&json!({ "params": { "id": 7 } }), &path),
            Ok(Some(ScopeValue::Single(json!(7))))
        );
        assert_eq!(extract(&json!({ "params": {} }), &path), Ok(None));
        assert_eq!(extract(&json!({ "params": null }), &path), Ok(None));
    }

    #[test]
    fn null_is_a_value_not_missing() {
        assert_eq!(
            extract(&json!({ "owner_id": null }), &ArgumentPath::key("owner_id")),
            Ok(Some(ScopeValue::Single(json!(null))))
        );
    }

    #[test]
    fn fans_out_over_lists() {
        let source = json!([{ "id": 1 }, { "id": 2 }]);
        let extracted = extract(&source, &ArgumentPath::nested(["id"]))
            .unwrap()
            .unwrap();

        assert_eq!(
            extracted,
            ScopeValue::Each(vec![
                ScopeValue::Single(json!(1)),
                ScopeValue::Single(json!(2))
            ])
        );
        assert_eq!(extracted.leaves(), vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn fans_out_over_intermediate_lists() {
        let source = json!({ "input": { "members": [{ "user_id": 3 }, { "user_id": 4 }] } });
        let extracted = extract(&source, &ArgumentPath::nested(["input", "members", "user_id"]))
            .unwrap()
            .unwrap();

        assert_eq!(extracted.leaves(), vec![&json!(3), &json!(4)]);
    }

    #[test]
    fn any_missing_element_makes_the_list_missing() {
        let source = json!([{ "id": 1 }, { "name": "no id" }]);
        assert_eq!(extract(&source, &ArgumentPath::nested(["id"])), Ok(None));
    }

    #[test]
    fn terminal_list_of_scalars_fans_out() {
        let source = json!({ "ids": [5, 6] });
        let extracted = extract(&source, &ArgumentPath::key("ids")).unwrap().unwrap();
        assert_eq!(extracted.leaves(), vec![&json!(5), &json!(6)]);
    }

    #[test]
    fn multi_field_paths() {
        let source = json!({ "user_id": 1, "input": { "company_id": 9 } });
        let path = ArgumentPath::Fields(vec![
            ("user".to_string(), ArgumentPath::key("user_id")),
            (
                "company".to_string(),
                ArgumentPath::nested(["input", "company_id"]),
            ),
        ]);

        assert_eq!(
            extract(&source, &path),
            Ok(Some(ScopeValue::Fields(vec![
                ("user".to_string(), ScopeValue::Single(json!(1))),
                ("company".to_string(), ScopeValue::Single(json!(9))),
            ])))
        );
        assert_eq!(extract(&json!({ "user_id": 1 }), &path), Ok(None));
        assert_eq!(path.to_string(), "{user: user_id, company: [input, company_id]}");
    }

    #[test]
    fn entries_keep_the_field_name_through_fan_out() {
        let source = json!({ "owners": [1, 2], "company_id": 9 });
        let path = ArgumentPath::Fields(vec![
            ("owner".to_string(), ArgumentPath::key("owners")),
            ("company".to_string(), ArgumentPath::key("company_id")),
        ]);
        let extracted = extract(&source, &path).unwrap().unwrap();

        assert_eq!(
            extracted.entries(),
            vec![
                (Some("owner"), &json!(1)),
                (Some("owner"), &json!(2)),
                (Some("company"), &json!(9)),
            ]
        );
        assert_eq!(
            ScopeValue::Single(json!(4)).entries(),
            vec![(None, &json!(4))]
        );
    }

    #[test]
    fn maps_are_not_scalars() {
        let source = json!({ "params": { "id": 7 } });
        assert_eq!(
            extract(&source, &ArgumentPath::key("params")),
            Err(NonScalarLeaf {
                path: "params".to_string()
            })
        );
    }
}
