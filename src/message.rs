//! Bolt request/response messages: typed wrappers over the `Structure`
//! carrier, with validated constructors and accessors (§4.3). A message
//! is legal wire data the moment it round-trips through [`Structure`];
//! whether it's legal to *send* in the current connection state is the
//! state machine's job (`crate::connection`), not this module's.

use crate::error::{Error, Result};
use crate::value::{Dictionary, Structure, Value};

pub mod tag {
    pub const HELLO: u8 = 0x01;
    pub const LOGON: u8 = 0x6A;
    pub const GOODBYE: u8 = 0x02;
    pub const RESET: u8 = 0x0F;
    pub const RUN: u8 = 0x10;
    pub const BEGIN: u8 = 0x11;
    pub const COMMIT: u8 = 0x12;
    pub const ROLLBACK: u8 = 0x13;
    pub const DISCARD: u8 = 0x2F;
    pub const PULL: u8 = 0x3F;

    pub const SUCCESS: u8 = 0x70;
    pub const IGNORED: u8 = 0x7E;
    pub const FAILURE: u8 = 0x7F;
    pub const RECORD: u8 = 0x71;
}

/// A client-to-server message.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Hello { extra: Dictionary },
    Logon { auth: Dictionary },
    Goodbye,
    Reset,
    Run { query: String, parameters: Dictionary, extra: Dictionary },
    Begin { extra: Dictionary },
    Commit,
    Rollback,
    Discard { extra: Dictionary },
    Pull { extra: Dictionary },
}

impl Request {
    /// The wire name, used in `InvalidTransition` errors and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Hello { .. } => "HELLO",
            Request::Logon { .. } => "LOGON",
            Request::Goodbye => "GOODBYE",
            Request::Reset => "RESET",
            Request::Run { .. } => "RUN",
            Request::Begin { .. } => "BEGIN",
            Request::Commit => "COMMIT",
            Request::Rollback => "ROLLBACK",
            Request::Discard { .. } => "DISCARD",
            Request::Pull { .. } => "PULL",
        }
    }

    pub fn into_structure(self) -> Structure {
        let (tag, fields) = match self {
            Request::Hello { extra } => (tag::HELLO, vec![Value::Dictionary(extra)]),
            Request::Logon { auth } => (tag::LOGON, vec![Value::Dictionary(auth)]),
            Request::Goodbye => (tag::GOODBYE, vec![]),
            Request::Reset => (tag::RESET, vec![]),
            Request::Run { query, parameters, extra } => {
                (tag::RUN, vec![Value::String(query), Value::Dictionary(parameters), Value::Dictionary(extra)])
            }
            Request::Begin { extra } => (tag::BEGIN, vec![Value::Dictionary(extra)]),
            Request::Commit => (tag::COMMIT, vec![]),
            Request::Rollback => (tag::ROLLBACK, vec![]),
            Request::Discard { extra } => (tag::DISCARD, vec![Value::Dictionary(extra)]),
            Request::Pull { extra } => (tag::PULL, vec![Value::Dictionary(extra)]),
        };
        // Construction from well-formed variants never exceeds the
        // 15-field structure limit.
        Structure::new(tag, fields).expect("request message never exceeds 15 fields")
    }
}

/// A server-to-client message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(Dictionary),
    Ignored,
    Failure { code: String, message: String, metadata: Dictionary },
    Record(Vec<Value>),
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::Success(_) => "SUCCESS",
            Response::Ignored => "IGNORED",
            Response::Failure { .. } => "FAILURE",
            Response::Record(_) => "RECORD",
        }
    }

    /// `SUCCESS`/`FAILURE`/`IGNORED` all terminate a request's response
    /// stream; `RECORD` carries one row of it (§ glossary: Summary vs Detail).
    pub fn is_summary(&self) -> bool {
        !matches!(self, Response::Record(_))
    }

    pub fn from_structure(s: Structure) -> Result<Response> {
        match s.tag {
            tag::SUCCESS => {
                let metadata = match s.fields.into_iter().next() {
                    Some(Value::Dictionary(d)) => d,
                    Some(Value::Null) | None => Dictionary::new(),
                    Some(other) => {
                        return Err(Error::InvalidMessage(format!("SUCCESS metadata must be a dictionary, found {}", other.kind())))
                    }
                };
                Ok(Response::Success(metadata))
            }
            tag::IGNORED => {
                if !s.fields.is_empty() {
                    return Err(Error::InvalidMessage("IGNORED takes no fields".into()));
                }
                Ok(Response::Ignored)
            }
            tag::FAILURE => {
                let metadata = match s.fields.into_iter().next() {
                    Some(Value::Dictionary(d)) => d,
                    Some(other) => {
                        return Err(Error::InvalidMessage(format!("FAILURE metadata must be a dictionary, found {}", other.kind())))
                    }
                    None => return Err(Error::InvalidMessage("FAILURE requires a metadata field".into())),
                };
                let code = metadata.get("code").and_then(|v| v.as_str().ok()).unwrap_or("Neo.DatabaseError.General.UnknownError").to_owned();
                let message = metadata.get("message").and_then(|v| v.as_str().ok()).unwrap_or("").to_owned();
                Ok(Response::Failure { code, message, metadata })
            }
            tag::RECORD => {
                let fields = match s.fields.into_iter().next() {
                    Some(Value::List(items)) => items,
                    Some(other) => return Err(Error::InvalidMessage(format!("RECORD fields must be a list, found {}", other.kind()))),
                    None => return Err(Error::InvalidMessage("RECORD requires a fields field".into())),
                };
                Ok(Response::Record(fields))
            }
            other => Err(Error::InvalidMessage(format!("unrecognized response tag {other:#04x}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_commit_message_shape() {
        let s = Request::Commit.into_structure();
        assert_eq!(s.tag, tag::COMMIT);
        assert!(s.fields.is_empty());
    }

    #[test]
    fn pull_field_extras_round_trip() {
        let mut extra = Dictionary::new();
        extra.insert("n", 100).insert("qid", 1);
        let s = Request::Pull { extra }.into_structure();
        assert_eq!(s.tag, tag::PULL);
        match &s.fields[0] {
            Value::Dictionary(d) => {
                assert_eq!(d.get("n"), Some(&Value::Integer(100)));
                assert_eq!(d.get("qid"), Some(&Value::Integer(1)));
            }
            _ => panic!("expected dictionary"),
        }
    }

    #[test]
    fn failure_response_extracts_code_and_message() {
        let mut metadata = Dictionary::new();
        metadata.insert("code", "Neo.ClientError.Statement.SyntaxError");
        metadata.insert("message", "bad query");
        let s = Structure::new(tag::FAILURE, vec![Value::Dictionary(metadata)]).unwrap();
        match Response::from_structure(s).unwrap() {
            Response::Failure { code, message, .. } => {
                assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
                assert_eq!(message, "bad query");
            }
            _ => panic!("expected failure"),
        }
    }

    #[test]
    fn record_requires_list_field() {
        let s = Structure::new(tag::RECORD, vec![Value::Integer(1)]).unwrap();
        assert!(Response::from_structure(s).is_err());
    }

    #[test]
    fn success_with_no_metadata_field_defaults_to_empty() {
        let s = Structure::new(tag::SUCCESS, vec![]).unwrap();
        match Response::from_structure(s).unwrap() {
            Response::Success(d) => assert!(d.is_empty()),
            _ => panic!("expected success"),
        }
    }
}
