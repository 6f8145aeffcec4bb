use serde_json::Value;
use crate::core::error::IngestError;
use crate::core::note::Note;

/// One line of ingestion input, classified by its JSON shape.
///
/// ```text
/// {"id":..,"pubkey":..,..}            RawNote
/// {"event":{..}} / {"note":{..}}      WrappedEvent
/// ["EVENT",{..}]                      WrappedEvent (client message)
/// ["EVENT","<sub id>",{..}]           WrappedEvent (relay message)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    RawNote(Note),
    WrappedEvent {
        subscription: Option<String>,
        note: Note,
    },
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Envelope, IngestError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| IngestError::MalformedInput(format!("invalid json: {}", e)))?;

        match value {
            Value::Object(mut object) => {
                if object.contains_key("id") {
                    return Ok(Envelope::RawNote(note_from(Value::Object(object))?));
                }
                let inner = object
                    .remove("event")
                    .or_else(|| object.remove("note"))
                    .ok_or_else(|| malformed("object is neither a note nor a wrapper"))?;
                Ok(Envelope::WrappedEvent {
                    subscription: None,
                    note: note_from(inner)?,
                })
            }
            Value::Array(items) => parse_message(items),
            _ => Err(malformed("expected a JSON object or array")),
        }
    }

    pub fn note(&self) -> &Note {
        match self {
            Envelope::RawNote(note) => note,
            Envelope::WrappedEvent { note, .. } => note,
        }
    }

    pub fn into_note(self) -> Note {
        match self {
            Envelope::RawNote(note) => note,
            Envelope::WrappedEvent { note, .. } => note,
        }
    }
}

fn parse_message(items: Vec<Value>) -> Result<Envelope, IngestError> {
    let mut items = items.into_iter();
    match items.next() {
        Some(Value::String(tag)) if tag == "EVENT" => {}
        _ => return Err(malformed("array is not an EVENT message")),
    }

    let (subscription, note) = match (items.next(), items.next()) {
        (Some(Value::String(sub)), Some(note)) => (Some(sub), note),
        (Some(note @ Value::Object(_)), None) => (None, note),
        _ => return Err(malformed("EVENT message has no note")),
    };
    if items.next().is_some() {
        return Err(malformed("EVENT message has trailing elements"));
    }

    Ok(Envelope::WrappedEvent {
        subscription,
        note: note_from(note)?,
    })
}

fn note_from(value: Value) -> Result<Note, IngestError> {
    serde_json::from_value(value)
        .map_err(|e| IngestError::MalformedInput(format!("invalid note: {}", e)))
}

fn malformed(reason: &str) -> IngestError {
    IngestError::MalformedInput(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note_json() -> String {
        format!(
            r#"{{"id":"{}","pubkey":"{}","created_at":5,"kind":1,"tags":[["t","x"]],"content":"hi","sig":"{}"}}"#,
            "aa".repeat(32),
            "bb".repeat(32),
            "cc".repeat(64)
        )
    }

    #[test]
    fn detects_every_shape() {
        let note = note_json();

        let raw = Envelope::parse(&note).unwrap();
        assert!(matches!(raw, Envelope::RawNote(_)));
        assert_eq!(raw.note().created_at, 5);

        let relay = Envelope::parse(&format!(r#"["EVENT","sub1",{}]"#, note)).unwrap();
        assert_eq!(
            relay,
            Envelope::WrappedEvent {
                subscription: Some("sub1".into()),
                note: raw.note().clone(),
            }
        );

        let client = Envelope::parse(&format!(r#"["EVENT",{}]"#, note)).unwrap();
        assert!(matches!(client, Envelope::WrappedEvent { subscription: None, .. }));

        for key in ["event", "note"] {
            let wrapped = Envelope::parse(&format!(r#"{{"{}":{}}}"#, key, note)).unwrap();
            assert_eq!(wrapped.into_note(), raw.note().clone());
        }
    }

    #[test]
    fn rejects_other_shapes() {
        let note = note_json();
        let bad = [
            "not json".to_string(),
            "42".to_string(),
            r#"["REQ","sub",{}]"#.to_string(),
            r#"["EVENT"]"#.to_string(),
            r#"{"other":{}}"#.to_string(),
            format!(r#"["EVENT","sub",{},1]"#, note),
            note[..note.len() - 10].to_string(),
        ];
        for line in bad {
            assert!(
                matches!(Envelope::parse(&line), Err(IngestError::MalformedInput(_))),
                "{}",
                line
            );
        }
    }
}
