//! Wire protocol: newline-delimited JSON, one message per line.
//!
//! Client → server:
//! ```json
//! {"type":"authenticate","identity":"operator_c1","secret":"c1-secret"}
//! {"type":"start_operations","target":{"counter":"c1"}}
//! {"type":"operation","op":{"kind":"add","counter":"c1","amount":"100"}}
//! {"type":"end_operations","target":"global"}
//! {"type":"request_balances"}
//! {"type":"recent_operations","limit":10}
//! ```
//!
//! Server → client: `auth_success`, `ack`, `error`, `event`, `recent_operations`.

use serde::{Deserialize, Serialize};
use tally_types::{
    ActorId, CounterId, ErrorKind, LedgerEvent, LockTarget, Operation, OperationRecord, Role,
    Session, TallyError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Authenticate {
        identity: String,
        secret: String,
    },
    StartOperations {
        target: LockTarget,
    },
    EndOperations {
        target: LockTarget,
    },
    Operation {
        op: Operation,
    },
    RequestBalances,
    RecentOperations {
        #[serde(default)]
        limit: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthSuccess {
        actor: ActorId,
        display_name: String,
        role: Role,
        counter: Option<CounterId>,
    },
    Ack {
        message: String,
    },
    Error {
        kind: ErrorKind,
        code: String,
        message: String,
    },
    Event {
        event: LedgerEvent,
    },
    RecentOperations {
        records: Vec<OperationRecord>,
    },
}

impl ServerMessage {
    #[must_use]
    pub fn from_error(err: &TallyError) -> Self {
        Self::Error {
            kind: err.kind(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn auth_success(session: &Session) -> Self {
        Self::AuthSuccess {
            actor: session.actor().clone(),
            display_name: session.participant.display_name.clone(),
            role: session.role(),
            counter: session.participant.counter.clone(),
        }
    }

    pub fn ack(message: impl Into<String>) -> Self {
        Self::Ack {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn parses_operation_request() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"operation","op":{"kind":"transfer","from":"c1","to":"c2","amount":{"mode":"percentage","value":"25"}}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Operation {
                op: Operation::Transfer {
                    from: CounterId::from("c1"),
                    to: CounterId::from("c2"),
                    amount: tally_types::TransferAmount::Percentage(Decimal::new(25, 0)),
                }
            }
        );
    }

    #[test]
    fn parses_lock_targets() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"start_operations","target":{"counter":"c3"}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartOperations {
                target: LockTarget::Counter(CounterId::from("c3"))
            }
        );
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"end_operations","target":"global"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::EndOperations {
                target: LockTarget::Global
            }
        );
    }

    #[test]
    fn recent_operations_limit_is_optional() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"recent_operations"}"#).unwrap();
        assert_eq!(msg, ClientMessage::RecentOperations { limit: None });
    }

    #[test]
    fn error_carries_kind_and_code() {
        let msg = ServerMessage::from_error(&TallyError::GloballyLocked {
            holder: ActorId::from("admin"),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "lock");
        assert_eq!(json["code"], "TL_ERR_201");
        assert!(json["message"].as_str().unwrap().contains("admin"));
    }

    #[test]
    fn unknown_message_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"shutdown"}"#).is_err());
    }
}
