//! Result Classifier: decide how a produced value is displayed.
use abyss_core::ActionResult;
use abyss_script::Value;
use serde::Serialize;

/// Display shape of a script's return value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedResult {
    Scalar {
        text: String,
    },
    Mapping {
        type_name: String,
        entries: Vec<(String, String)>,
    },
    Sequence {
        type_name: String,
        items: Vec<String>,
    },
    Opaque {
        type_name: String,
        text: String,
    },
    PreformattedResponse {
        response: ActionResult,
    },
    None,
}

impl ClassifiedResult {
    pub fn scalar(text: impl Into<String>) -> Self {
        ClassifiedResult::Scalar { text: text.into() }
    }

    /// Only a plain scalar fits in a rich-format field
    pub fn is_embed_safe(&self) -> bool {
        matches!(self, ClassifiedResult::Scalar { .. })
    }

    /// Text shown in the output block. Structured shapes get a header line
    /// naming the runtime type and one bullet per entry.
    pub fn display_text(&self) -> Option<String> {
        match self {
            ClassifiedResult::Scalar { text } => Some(text.clone()),
            ClassifiedResult::Mapping { type_name, entries } => {
                let mut out = format!("Dictionary of type ``{}``\n", type_name);
                for (key, value) in entries {
                    out.push_str(&format!("- ``{}``: ``{}``\n", key, value));
                }
                Some(out)
            }
            ClassifiedResult::Sequence { type_name, items } => {
                let mut out = format!("Enumerable of type ``{}``\n", type_name);
                for item in items {
                    out.push_str(&format!("- ``{}``\n", item));
                }
                Some(out)
            }
            ClassifiedResult::Opaque { type_name, text } => {
                Some(format!("Object of type ``{}``\n- ``{}``\n", type_name, text))
            }
            ClassifiedResult::PreformattedResponse { .. } | ClassifiedResult::None => None,
        }
    }
}

/// Classify a value. Priority: prebuilt response, string, mapping,
/// sequence, then string conversion for everything else.
///
/// Entry texts stop once together they pass `max_chars`; the report
/// could not show more than that anyway.
pub fn classify(value: Option<&Value>, max_chars: usize) -> ClassifiedResult {
    let Some(value) = value else {
        return ClassifiedResult::None;
    };
    match value {
        Value::Null => ClassifiedResult::None,
        Value::Response(response) => ClassifiedResult::PreformattedResponse {
            response: response.clone(),
        },
        Value::Str(s) => ClassifiedResult::scalar(s.as_str()),
        Value::Map(entries) => ClassifiedResult::Mapping {
            type_name: value.type_name().to_string(),
            entries: bounded(entries.iter(), max_chars, |(k, v)| {
                (k.clone(), v.to_text(max_chars))
            }),
        },
        Value::List(items) => ClassifiedResult::Sequence {
            type_name: value.type_name().to_string(),
            items: bounded(items.iter(), max_chars, |v| v.to_text(max_chars)),
        },
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => ClassifiedResult::scalar(value.to_text(max_chars)),
        Value::Object(object) => ClassifiedResult::Opaque {
            type_name: object.type_name.to_string(),
            text: object.display.clone(),
        },
    }
}

/// Map items until the produced text passes `max_chars`
fn bounded<I, T>(items: I, max_chars: usize, mut text: impl FnMut(I::Item) -> T) -> Vec<T>
where
    I: Iterator,
    T: TextLen,
{
    let mut out = Vec::new();
    let mut chars = 0;
    for item in items {
        if chars > max_chars {
            break;
        }
        let entry = text(item);
        chars += entry.text_len();
        out.push(entry);
    }
    out
}

trait TextLen {
    fn text_len(&self) -> usize;
}

impl TextLen for String {
    fn text_len(&self) -> usize {
        self.chars().count()
    }
}

impl TextLen for (String, String) {
    fn text_len(&self) -> usize {
        self.0.chars().count() + self.1.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abyss_core::{Color, Identity};
    use abyss_script::HostObject;
    use indexmap::IndexMap;

    fn classify_all(value: Option<&Value>) -> ClassifiedResult {
        classify(value, 2000)
    }

    #[test]
    fn test_missing_and_null_are_none() {
        assert_eq!(classify_all(None), ClassifiedResult::None);
        assert_eq!(classify_all(Some(&Value::Null)), ClassifiedResult::None);
    }

    #[test]
    fn test_numbers_are_scalars() {
        assert_eq!(classify_all(Some(&Value::Int(2))), ClassifiedResult::scalar("2"));
        assert_eq!(classify_all(Some(&Value::Float(1.5))), ClassifiedResult::scalar("1.5"));
        assert_eq!(classify_all(Some(&Value::Bool(true))), ClassifiedResult::scalar("true"));
    }

    #[test]
    fn test_mapping_keeps_insertion_order() {
        let mut entries = IndexMap::new();
        entries.insert("y".to_string(), Value::Int(2));
        entries.insert("x".to_string(), Value::Str("one".into()));
        let classified = classify_all(Some(&Value::map(entries)));
        assert_eq!(
            classified,
            ClassifiedResult::Mapping {
                type_name: "map".into(),
                entries: vec![("y".into(), "2".into()), ("x".into(), "one".into())],
            }
        );
        assert!(!classified.is_embed_safe());
    }

    #[test]
    fn test_empty_sequence_is_not_none() {
        let classified = classify_all(Some(&Value::list(vec![])));
        assert_eq!(
            classified,
            ClassifiedResult::Sequence {
                type_name: "list".into(),
                items: vec![],
            }
        );
        assert_eq!(
            classified.display_text().as_deref(),
            Some("Enumerable of type ``list``\n")
        );
    }

    #[test]
    fn test_host_objects_are_opaque() {
        let user = Value::object(HostObject::user(&Identity::new(3, "ada")));
        assert!(matches!(classify_all(Some(&user)), ClassifiedResult::Opaque { .. }));

        let color = Value::object(HostObject::color(Color::rgb(1, 2, 3)));
        match classify_all(Some(&color)) {
            ClassifiedResult::Opaque { text, .. } => assert_eq!(text, "#010203"),
            other => panic!("expected opaque, got {:?}", other),
        }
    }

    #[test]
    fn test_response_short_circuits() {
        let response = Value::Response(ActionResult::ok_text("hi"));
        assert_eq!(
            classify_all(Some(&response)),
            ClassifiedResult::PreformattedResponse {
                response: ActionResult::ok_text("hi"),
            }
        );
    }

    #[test]
    fn test_shared_sequence_is_bounded() {
        let mut shared = Value::list(vec![Value::Int(1)]);
        for _ in 0..40 {
            shared = Value::list(vec![shared.clone(), shared]);
        }
        match classify(Some(&shared), 100) {
            ClassifiedResult::Sequence { items, .. } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].chars().count(), 101);
                assert!(items[0].ends_with('…'));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_mapping_display() {
        let classified = ClassifiedResult::Mapping {
            type_name: "map".into(),
            entries: vec![("x".into(), "1".into())],
        };
        assert_eq!(
            classified.display_text().unwrap(),
            "Dictionary of type ``map``\n- ``x``: ``1``\n"
        );
    }
}
