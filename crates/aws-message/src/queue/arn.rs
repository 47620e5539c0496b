use std::sync::OnceLock;

use regex::Regex;

use crate::error::ConfigError;

/// `arn:aws:sqs:<region>:<account-id>:<queue-name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueArn {
    region: String,
    account_id: String,
    queue_name: String,
}

fn arn_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^arn:aws:sqs:(?P<region>[a-z]{2}-[a-z]+-\d+):(?P<account_id>\d+):(?P<queue_name>[a-z\d\-_.]*)$",
        )
        .expect("static regex")
    })
}

impl QueueArn {
    pub fn parse(arn: &str) -> Result<Self, ConfigError> {
        let caps = arn_pattern()
            .captures(arn.trim())
            .ok_or_else(|| ConfigError::invalid("queue", format!("Invalid ARN: {}", arn)))?;

        Ok(Self {
            region: caps["region"].to_string(),
            account_id: caps["account_id"].to_string(),
            queue_name: caps["queue_name"].to_string(),
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl std::fmt::Display for QueueArn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "arn:aws:sqs:{}:{}:{}",
            self.region, self.account_id, self.queue_name
        )
    }
}

impl std::str::FromStr for QueueArn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let arn = QueueArn::parse("arn:aws:sqs:us-west-2:123456789012:uw-person-event_v1.fifo")
            .unwrap();
        assert_eq!(arn.region(), "us-west-2");
        assert_eq!(arn.account_id(), "123456789012");
        assert_eq!(arn.queue_name(), "uw-person-event_v1.fifo");
        assert_eq!(
            arn.to_string(),
            "arn:aws:sqs:us-west-2:123456789012:uw-person-event_v1.fifo"
        );
    }

    #[test]
    fn test_case_insensitive() {
        let arn: QueueArn = "ARN:AWS:SQS:US-EAST-1:000000000000:Events".parse().unwrap();
        assert_eq!(arn.region(), "US-EAST-1");
        assert_eq!(arn.queue_name(), "Events");
    }

    #[test]
    fn test_empty_queue_name_allowed() {
        let arn = QueueArn::parse("arn:aws:sqs:eu-central-1:000000000000:").unwrap();
        assert_eq!(arn.queue_name(), "");
    }

    #[test]
    fn test_invalid() {
        for bad in [
            "",
            "arn:aws:sns:us-west-2:123456789012:topic",
            "arn:aws:sqs:uswest2:123456789012:q",
            "arn:aws:sqs:us-west-2:acct:q",
            "arn:aws:sqs:us-west-2:123456789012:q/with/slash",
        ] {
            let err = QueueArn::parse(bad).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{bad}");
        }
    }
}
