use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One webhook notification received from Mailjet.
///
/// Field names match what the web UI reads (`EventType`, `Payload`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "EventType", default)]
    pub event_type: String,
    #[serde(rename = "Payload", default)]
    pub payload: Value,
}

impl EventRecord {
    /// Build a record from a raw notification body.
    ///
    /// Never fails: an undecodable body is kept as `null` and a missing or
    /// non-string `event` field leaves `event_type` empty. An exact `event`
    /// key wins over differently-cased ones such as `Event`.
    pub fn from_raw(raw: &[u8]) -> Self {
        let payload: Value = serde_json::from_slice(raw).unwrap_or(Value::Null);
        let event_type = payload
            .as_object()
            .and_then(|fields| {
                fields.get("event").or_else(|| {
                    fields
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case("event"))
                        .map(|(_, value)| value)
                })
            })
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self {
            event_type,
            payload,
        }
    }
}

/// Per-key event log, most recent event first.
pub type EventLog = Vec<EventRecord>;

/// A required request field was missing or empty.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

/// Basic-auth credentials forwarded to Mailjet on behalf of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Body accepted by `POST /messages`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MessageRequest {
    pub api_key: String,
    pub api_secret: String,
    pub from_email: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl MessageRequest {
    /// Check mandatory fields and split into credentials and the Send API body.
    /// An empty recipient falls back to the sender.
    pub fn into_send_payload(self) -> Result<(Credentials, SendMessagePayload), ValidationError> {
        require(&self.api_key, "API key is mandatory")?;
        require(&self.api_secret, "API secret is mandatory")?;
        require(&self.from_email, "FromEmail is mandatory")?;
        let recipient = if self.recipient.is_empty() {
            self.from_email.clone()
        } else {
            self.recipient
        };
        require(&self.subject, "Subject is mandatory")?;
        require(&self.body, "Body is mandatory")?;

        Ok((
            Credentials {
                api_key: self.api_key,
                api_secret: self.api_secret,
            },
            SendMessagePayload {
                from_email: self.from_email,
                subject: self.subject,
                recipient,
                body: self.body,
            },
        ))
    }
}

/// Body of `POST /v3/send/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SendMessagePayload {
    pub from_email: String,
    pub subject: String,
    pub recipient: String,
    #[serde(rename = "Text-part")]
    pub body: String,
}

/// Body accepted by `POST /events/setup`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EventSetupRequest {
    pub api_key: String,
    pub api_secret: String,
    pub event_type: String,
    pub callback_url: String,
}

impl EventSetupRequest {
    pub fn into_callback_payload(
        self,
    ) -> Result<(Credentials, EventCallbackUrlPayload), ValidationError> {
        require(&self.api_key, "API key is mandatory")?;
        require(&self.api_secret, "API secret is mandatory")?;
        require(&self.event_type, "EventType is mandatory")?;
        require(&self.callback_url, "CallbackUrl is mandatory")?;

        Ok((
            Credentials {
                api_key: self.api_key,
                api_secret: self.api_secret,
            },
            EventCallbackUrlPayload {
                event_type: self.event_type,
                url: self.callback_url,
            },
        ))
    }
}

/// Body of the `eventcallbackurl` REST resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventCallbackUrlPayload {
    pub event_type: String,
    pub url: String,
}

fn require(value: &str, message: &'static str) -> Result<(), ValidationError> {
    if value.is_empty() {
        Err(ValidationError(message))
    } else {
        Ok(())
    }
}
