//! Batch admission control.
//!
//! One authorization check per batch, before any work starts. The default
//! deployment allows everyone; a static allow-list covers single-operator
//! setups.

/// Decides whether an owner may run batches.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, owner: &str) -> bool;
}

/// Open admission.
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _owner: &str) -> bool {
        true
    }
}

/// Fixed set of permitted owner identifiers.
pub struct StaticAllowList {
    owners: Vec<String>,
}

impl StaticAllowList {
    pub fn new<I, S>(owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owners: owners.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for StaticAllowList {
    fn is_authorized(&self, owner: &str) -> bool {
        self.owners.iter().any(|o| o == owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_admits_anyone() {
        assert!(AllowAll.is_authorized("anyone"));
        assert!(AllowAll.is_authorized(""));
    }

    #[test]
    fn allow_list_is_exact_match() {
        let a = StaticAllowList::new(["alice", "bob"]);
        assert!(a.is_authorized("alice"));
        assert!(!a.is_authorized("alice2"));
        assert!(!a.is_authorized("mallory"));
    }
}
