use std::collections::{BTreeSet, HashSet};

/// Immutable snapshot of who may talk to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationGate {
    /// Chats that receive alerts and broadcasts. Ordered so broadcasts go out
    /// in a stable order.
    pub administrators: BTreeSet<i64>,
    pub whitelist: HashSet<i64>,
    pub allow_all: bool,
}

impl AuthorizationGate {
    pub fn new(administrators: &[i64], whitelist: &[i64], allow_all: bool) -> Self {
        Self {
            administrators: administrators.iter().copied().collect(),
            whitelist: whitelist.iter().copied().collect(),
            allow_all,
        }
    }

    /// Whether messages from `chat_id` are passed on to the subscriber.
    ///
    /// Administrators are not admitted implicitly; they need to be on the
    /// whitelist like everyone else.
    pub fn is_admitted(&self, chat_id: i64) -> bool {
        self.allow_all || self.whitelist.contains(&chat_id)
    }
}
