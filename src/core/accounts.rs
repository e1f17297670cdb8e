use serde::{Deserialize, Serialize};

use crate::core::delay::DelayGenerator;

fn default_true() -> bool {
    true
}

/// An acting account on the social network. The cookie is the credential the
/// automation API expects; it never leaves the daemon through the JSON API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    #[serde(skip_serializing)]
    pub cookie: String,
    #[serde(default = "default_true")]
    pub available_for_random: bool,
}

/// Config-loaded account lookup. Read-only after boot.
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn all(&self) -> &[Account] {
        &self.accounts
    }

    pub fn get(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Random account among those flagged available for automated runs.
    pub fn pick_random(&self, delays: &DelayGenerator) -> Option<&Account> {
        let eligible: Vec<&Account> = self
            .accounts
            .iter()
            .filter(|a| a.available_for_random)
            .collect();
        if eligible.is_empty() {
            return None;
        }
        Some(eligible[delays.pick_index(eligible.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AccountStore {
        AccountStore::new(vec![
            Account {
                name: "acct1".into(),
                cookie: "c1".into(),
                available_for_random: true,
            },
            Account {
                name: "manual".into(),
                cookie: "c2".into(),
                available_for_random: false,
            },
        ])
    }

    #[test]
    fn pick_random_skips_unavailable_accounts() {
        let store = store();
        let delays = DelayGenerator::from_seed(1);
        for _ in 0..20 {
            assert_eq!(store.pick_random(&delays).unwrap().name, "acct1");
        }
    }

    #[test]
    fn pick_random_returns_none_when_no_account_is_eligible() {
        let store = AccountStore::new(vec![Account {
            name: "manual".into(),
            cookie: "c".into(),
            available_for_random: false,
        }]);
        assert!(store.pick_random(&DelayGenerator::from_seed(1)).is_none());
    }

    #[test]
    fn cookie_is_not_serialized() {
        let json = serde_json::to_value(&store().all()[0]).unwrap();
        assert!(json.get("cookie").is_none());
        assert_eq!(json["name"], "acct1");
    }
}
