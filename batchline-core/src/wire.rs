// Wire message codec.
//
// Each message is a JSON array whose first element is a string tag. Four
// inbound tags are recognized (push, pull, release, abort) and two outbound
// tags are produced (resolve, reject). Inbound parsing is liberal: unknown
// tags and wrongly-typed payloads inside known tags are dropped rather than
// failing the session.

use serde_json::{json, Value as JsonValue};
use tracing::{trace, warn};

use crate::ids::ExportId;
use crate::value::Value;

/// A protocol message. `Push`, `Pull`, `Release` and `Abort` arrive from the
/// client; `Resolve` and `Reject` are responses built by the session engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `["push", body]` - the body is parsed further by [`PipelineCall`].
    Push(JsonValue),

    /// `["pull", exportId]`
    Pull(ExportId),

    /// `["release", exportId, refcount]` - acknowledged, never acted upon.
    Release { id: ExportId, refcount: i64 },

    /// `["abort", errorInfo]`
    Abort(JsonValue),

    /// `["resolve", exportId, wrappedValue]`
    Resolve(ExportId, Value),

    /// `["reject", exportId, errorValue]`
    Reject(ExportId, Value),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid message JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message must be a JSON array")]
    NotAnArray,

    #[error("empty message")]
    Empty,

    #[error("message tag must be a string")]
    BadTag,
}

impl Message {
    /// Parse one inbound message. `Ok(None)` means the message was
    /// well-formed enough to identify but is ignored (unknown tag, or a
    /// known tag with a payload of the wrong shape).
    pub fn parse(text: &str) -> Result<Option<Message>, CodecError> {
        let json: JsonValue = serde_json::from_str(text)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &JsonValue) -> Result<Option<Message>, CodecError> {
        let items = json.as_array().ok_or(CodecError::NotAnArray)?;
        let tag = items.first().ok_or(CodecError::Empty)?;
        let tag = tag.as_str().ok_or(CodecError::BadTag)?;

        match tag {
            "push" => Ok(items.get(1).map(|body| Message::Push(body.clone()))),

            "pull" => {
                let id = items.get(1).and_then(JsonValue::as_i64);
                if id.is_none() {
                    warn!("pull without an integer export ID, dropping");
                }
                Ok(id.map(|id| Message::Pull(ExportId::new(id))))
            }

            "release" => {
                let id = items.get(1).and_then(JsonValue::as_i64);
                let refcount = items.get(2).and_then(JsonValue::as_i64);
                match (id, refcount) {
                    (Some(id), Some(refcount)) => Ok(Some(Message::Release {
                        id: ExportId::new(id),
                        refcount,
                    })),
                    _ => {
                        warn!("release without integer ID and refcount, dropping");
                        Ok(None)
                    }
                }
            }

            "abort" => Ok(items.get(1).map(|info| Message::Abort(info.clone()))),

            // Outbound-only tags arriving inbound are ignored like unknown
            // tags so future extensions cannot break the session.
            other => {
                trace!(tag = other, "ignoring message with unrecognized tag");
                Ok(None)
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Message::Push(body) => json!(["push", body]),
            Message::Pull(id) => json!(["pull", id]),
            Message::Release { id, refcount } => json!(["release", id, refcount]),
            Message::Abort(info) => json!(["abort", info]),
            Message::Resolve(id, value) => json!(["resolve", id, value.to_json()]),
            Message::Reject(id, value) => json!(["reject", id, value.to_json()]),
        }
    }

    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.to_json()).unwrap_or_default()
    }
}

/// The one recognized push-body form:
/// `["pipeline", importId, methodPath, args?]`.
///
/// Only the first element of `methodPath` (the method name) is consulted.
/// `import_id` is carried for future capability passing but unused.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineCall {
    pub import_id: i64,
    pub method: String,
    pub args: JsonValue,
}

impl PipelineCall {
    pub fn from_body(items: &[JsonValue]) -> Option<PipelineCall> {
        if items.first()?.as_str()? != "pipeline" {
            return None;
        }
        let import_id = items.get(1)?.as_i64()?;
        let method = items.get(2)?.as_array()?.first()?.as_str()?.to_string();
        let args = items
            .get(3)
            .cloned()
            .unwrap_or_else(|| JsonValue::Array(Vec::new()));
        Some(PipelineCall {
            import_id,
            method,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_message() {
        let msg = Message::parse(r#"["push",["pipeline",0,["hello"],["World"]]]"#)
            .unwrap()
            .unwrap();
        match msg {
            Message::Push(body) => {
                let call = PipelineCall::from_body(body.as_array().unwrap()).unwrap();
                assert_eq!(call.import_id, 0);
                assert_eq!(call.method, "hello");
                assert_eq!(call.args, json!(["World"]));
            }
            other => panic!("expected push, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pull_message() {
        let msg = Message::parse(r#"["pull",1]"#).unwrap().unwrap();
        assert_eq!(msg, Message::Pull(ExportId::new(1)));
    }

    #[test]
    fn test_parse_release_and_abort() {
        let msg = Message::parse(r#"["release",2,1]"#).unwrap().unwrap();
        assert_eq!(
            msg,
            Message::Release {
                id: ExportId::new(2),
                refcount: 1,
            }
        );

        let msg = Message::parse(r#"["abort",["error","Fatal","gone"]]"#)
            .unwrap()
            .unwrap();
        assert!(matches!(msg, Message::Abort(_)));
    }

    #[test]
    fn test_malformed_outer_message_is_an_error() {
        assert!(matches!(
            Message::parse("not json"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            Message::parse(r#"{"a":1}"#),
            Err(CodecError::NotAnArray)
        ));
        assert!(matches!(Message::parse("[]"), Err(CodecError::Empty)));
        assert!(matches!(Message::parse("[42]"), Err(CodecError::BadTag)));
    }

    #[test]
    fn test_lenient_drops() {
        // Unknown tag.
        assert_eq!(Message::parse(r#"["ping",1]"#).unwrap(), None);
        // Outbound tags arriving inbound.
        assert_eq!(Message::parse(r#"["resolve",1,"x"]"#).unwrap(), None);
        assert_eq!(Message::parse(r#"["reject",1,"x"]"#).unwrap(), None);
        // Known tag with a wrongly-typed payload.
        assert_eq!(Message::parse(r#"["pull","one"]"#).unwrap(), None);
        assert_eq!(Message::parse(r#"["pull"]"#).unwrap(), None);
        assert_eq!(Message::parse(r#"["release",1,"x"]"#).unwrap(), None);
        assert_eq!(Message::parse(r#"["push"]"#).unwrap(), None);
    }

    #[test]
    fn test_serialize_resolve() {
        let msg = Message::Resolve(ExportId::new(1), Value::String("Hello".to_string()));
        assert_eq!(msg.serialize(), r#"["resolve",1,"Hello"]"#);
    }

    #[test]
    fn test_serialize_reject() {
        let msg = Message::Reject(
            ExportId::new(42),
            Value::Error {
                kind: "ExportNotFound".to_string(),
                message: "Export ID not found".to_string(),
            },
        );
        assert_eq!(
            msg.serialize(),
            r#"["reject",42,["error","ExportNotFound","Export ID not found"]]"#
        );
    }

    #[test]
    fn test_pipeline_call_defaults_args_to_empty_list() {
        let body = json!(["pipeline", 0, ["getNotes"]]);
        let call = PipelineCall::from_body(body.as_array().unwrap()).unwrap();
        assert_eq!(call.method, "getNotes");
        assert_eq!(call.args, json!([]));
    }

    #[test]
    fn test_pipeline_call_rejects_other_shapes() {
        for body in [
            json!(["other", 0, ["m"]]),
            json!(["pipeline", "x", ["m"]]),
            json!(["pipeline", 0]),
            json!(["pipeline", 0, []]),
            json!(["pipeline", 0, [42]]),
        ] {
            assert_eq!(PipelineCall::from_body(body.as_array().unwrap()), None);
        }
    }
}
