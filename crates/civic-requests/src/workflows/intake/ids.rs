use std::fmt;
use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of random characters following the three letter prefix.
pub const SUFFIX_LEN: usize = 8;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{3}[A-Z0-9]{8}$").expect("id pattern compiles"))
}

fn generate(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{prefix}{suffix}")
}

/// True when `value` is `prefix` followed by eight uppercase alphanumerics.
pub fn is_well_formed(value: &str, prefix: &str) -> bool {
    value.starts_with(prefix) && id_pattern().is_match(value)
}

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn generate() -> Self {
                Self(generate(Self::PREFIX))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_well_formed(&self) -> bool {
                is_well_formed(&self.0, Self::PREFIX)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

prefixed_id!(
    /// Identifier of a citizen service request, e.g. `REQ7K2M9QXA`.
    RequestId,
    "REQ"
);
prefixed_id!(
    /// Identifier of an audit log entry.
    LogId,
    "LOG"
);
prefixed_id!(NotificationId, "NOT");

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_carry_their_prefix_and_shape() {
        for _ in 0..200 {
            let request = RequestId::generate();
            let log = LogId::generate();
            let notification = NotificationId::generate();

            assert!(request.is_well_formed(), "bad request id {request}");
            assert!(log.is_well_formed(), "bad log id {log}");
            assert!(notification.is_well_formed(), "bad notification id {notification}");
            assert_eq!(request.as_str().len(), 3 + SUFFIX_LEN);
        }
    }

    #[test]
    fn ten_thousand_request_ids_do_not_collide() {
        let ids: HashSet<RequestId> = (0..10_000).map(|_| RequestId::generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn ten_thousand_log_and_notification_ids_do_not_collide() {
        let logs: HashSet<LogId> = (0..10_000).map(|_| LogId::generate()).collect();
        let notes: HashSet<NotificationId> =
            (0..10_000).map(|_| NotificationId::generate()).collect();
        assert_eq!(logs.len(), 10_000);
        assert_eq!(notes.len(), 10_000);
    }

    #[test]
    fn well_formed_rejects_wrong_prefix_case_and_length() {
        assert!(is_well_formed("REQABCD1234", "REQ"));
        assert!(!is_well_formed("LOGABCD1234", "REQ"));
        assert!(!is_well_formed("REQabcd1234", "REQ"));
        assert!(!is_well_formed("REQABCD123", "REQ"));
        assert!(!is_well_formed("REQABCD12345", "REQ"));
        assert!(!is_well_formed("", "REQ"));
    }
}
