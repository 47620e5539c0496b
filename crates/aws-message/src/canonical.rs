//! Canonical signing string for SNS envelopes.
//!
//! The string is a sequence of `name\nvalue\n` blocks in a fixed order that
//! depends on the message type. Signer and verifier must agree byte-for-byte,
//! so the order below is part of the protocol:
//!
//! | Type | Fields |
//! |------|--------|
//! | `Notification` | `Message, MessageId, [Subject], Timestamp, TopicArn, Type` |
//! | `SubscriptionConfirmation`, `UnsubscribeConfirmation` | `Message, MessageId, SubscribeURL, Timestamp, Token, TopicArn, Type` |

use crate::types::{MessageType, NotificationHeader};

/// A required signing field is absent from the envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing signing field: {field}")]
pub struct MissingField {
    pub field: &'static str,
}

/// Build the canonical signing string for `header`.
pub fn signing_string(header: &NotificationHeader) -> Result<String, MissingField> {
    let mut out = String::new();

    push_field(&mut out, "Message", &header.message_text());
    push_field(&mut out, "MessageId", &header.message_id);

    match header.message_type {
        MessageType::Notification => {
            if let Some(subject) = &header.subject {
                push_field(&mut out, "Subject", subject);
            }
            push_field(&mut out, "Timestamp", &header.timestamp);
        }
        MessageType::SubscriptionConfirmation | MessageType::UnsubscribeConfirmation => {
            push_field(
                &mut out,
                "SubscribeURL",
                required(&header.subscribe_url, "SubscribeURL")?,
            );
            push_field(&mut out, "Timestamp", &header.timestamp);
            push_field(&mut out, "Token", required(&header.token, "Token")?);
        }
    }

    push_field(&mut out, "TopicArn", &header.topic_arn);
    push_field(&mut out, "Type", header.message_type.as_str());

    Ok(out)
}

/// Append one `name\nvalue\n` block.
pub(crate) fn push_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push('\n');
    out.push_str(value);
    out.push('\n');
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, MissingField> {
    value.as_deref().ok_or(MissingField { field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn header(subject: Option<&str>) -> NotificationHeader {
        let mut value = json!({
            "Type": "Notification",
            "MessageId": "m1",
            "TopicArn": "t1",
            "Message": "hello",
            "Timestamp": "2020-01-01T00:00:00Z",
            "SignatureVersion": "1",
        });
        if let Some(subject) = subject {
            value["Subject"] = json!(subject);
        }
        NotificationHeader::from_value(value).unwrap()
    }

    #[test]
    fn test_notification_without_subject() {
        let s = signing_string(&header(None)).unwrap();
        assert_eq!(
            s,
            "Message\nhello\nMessageId\nm1\nTimestamp\n2020-01-01T00:00:00Z\nTopicArn\nt1\nType\nNotification\n"
        );
    }

    #[test]
    fn test_notification_with_subject() {
        let s = signing_string(&header(Some("UW Event"))).unwrap();
        assert_eq!(
            s,
            "Message\nhello\nMessageId\nm1\nSubject\nUW Event\nTimestamp\n2020-01-01T00:00:00Z\nTopicArn\nt1\nType\nNotification\n"
        );
    }

    #[test]
    fn test_subscription_confirmation_order() {
        let header = NotificationHeader::from_value(json!({
            "Type": "SubscriptionConfirmation",
            "MessageId": "m2",
            "TopicArn": "t1",
            "Subject": "ignored for this type",
            "Message": "You have chosen to subscribe",
            "Timestamp": "2020-01-01T00:00:00Z",
            "SubscribeURL": "https://sns.example.com/?Action=ConfirmSubscription",
            "Token": "tok",
        }))
        .unwrap();

        let s = signing_string(&header).unwrap();
        assert_eq!(
            s,
            "Message\nYou have chosen to subscribe\nMessageId\nm2\n\
             SubscribeURL\nhttps://sns.example.com/?Action=ConfirmSubscription\n\
             Timestamp\n2020-01-01T00:00:00Z\nToken\ntok\nTopicArn\nt1\n\
             Type\nSubscriptionConfirmation\n"
        );
    }

    #[test]
    fn test_subscription_confirmation_missing_token() {
        let header = NotificationHeader::from_value(json!({
            "Type": "SubscriptionConfirmation",
            "MessageId": "m2",
            "TopicArn": "t1",
            "Message": "m",
            "Timestamp": "2020-01-01T00:00:00Z",
            "SubscribeURL": "https://sns.example.com/",
        }))
        .unwrap();

        assert_eq!(
            signing_string(&header),
            Err(MissingField { field: "Token" })
        );
    }

    proptest! {
        #[test]
        fn prop_subject_included_iff_present(
            subject in proptest::option::of("[ -~]{0,40}"),
            message in "[ -~]{0,80}",
        ) {
            let mut h = header(subject.as_deref());
            h.message = json!(message);
            let s = signing_string(&h).unwrap();
            let lines: Vec<&str> = s.split('\n').collect();

            prop_assert_eq!(lines[4] == "Subject", subject.is_some());
            prop_assert!(s.ends_with("Type\nNotification\n"));
            prop_assert!(!s.ends_with("\n\n"));
        }

        #[test]
        fn prop_each_block_is_newline_terminated(
            message_id in "[a-z0-9-]{1,36}",
            topic in "[a-z0-9:-]{1,60}",
        ) {
            let mut h = header(None);
            h.message_id = message_id.clone();
            h.topic_arn = topic.clone();
            let s = signing_string(&h).unwrap();
            let lines: Vec<&str> = s.split('\n').collect();

            // name/value pairs plus the empty tail after the final newline
            prop_assert_eq!(lines.len(), 5 * 2 + 1);
            prop_assert_eq!(*lines.last().unwrap(), "");
            prop_assert_eq!(lines[3], message_id.as_str());
            prop_assert_eq!(lines[7], topic.as_str());
        }
    }
}
