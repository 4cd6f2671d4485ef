//! Authorization predicate for configuration changes

use crate::error::{CoreError, Result};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Privileged actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Change the reward strategy
    SetStrategy,
    /// Drain the unstake fee pool
    CollectFees,
    /// Pause or unpause staking
    Pause,
    /// Configure lottery awards and timing
    ConfigureLottery,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetStrategy => "set strategy",
            Self::CollectFees => "collect fees",
            Self::Pause => "pause",
            Self::ConfigureLottery => "configure lottery",
        };
        f.write_str(name)
    }
}

/// Decides whether a caller may perform an action
pub trait Authority {
    fn is_authorized(&self, caller: &Address, action: Action) -> bool;

    /// Fail with [`CoreError::Unauthorized`] unless authorized
    fn ensure(&self, caller: &Address, action: Action) -> Result<()> {
        if self.is_authorized(caller, action) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized {
                caller: *caller,
                action: action.to_string(),
            })
        }
    }
}

/// Single owner allowed to do everything
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAuthority {
    pub owner: Address,
}

impl OwnerAuthority {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }
}

impl Authority for OwnerAuthority {
    fn is_authorized(&self, caller: &Address, _action: Action) -> bool {
        *caller == self.owner
    }
}

/// Per-action role membership
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAuthority {
    roles: BTreeMap<Action, BTreeSet<Address>>,
}

impl RoleAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, action: Action, account: Address) {
        self.roles.entry(action).or_default().insert(account);
    }

    pub fn revoke(&mut self, action: Action, account: &Address) {
        if let Some(members) = self.roles.get_mut(&action) {
            members.remove(account);
        }
    }

    /// Grant every action to one account
    pub fn with_admin(admin: Address) -> Self {
        let mut roles = Self::new();
        for action in [
            Action::SetStrategy,
            Action::CollectFees,
            Action::Pause,
            Action::ConfigureLottery,
        ] {
            roles.grant(action, admin);
        }
        roles
    }
}

impl Authority for RoleAuthority {
    fn is_authorized(&self, caller: &Address, action: Action) -> bool {
        self.roles
            .get(&action)
            .map(|members| members.contains(caller))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_authority() {
        let owner = Address::from_low_u64(1);
        let auth = OwnerAuthority::new(owner);
        assert!(auth.ensure(&owner, Action::Pause).is_ok());
        assert!(matches!(
            auth.ensure(&Address::from_low_u64(2), Action::Pause),
            Err(CoreError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_role_grant_and_revoke() {
        let collector = Address::from_low_u64(9);
        let mut auth = RoleAuthority::new();
        auth.grant(Action::CollectFees, collector);

        assert!(auth.is_authorized(&collector, Action::CollectFees));
        assert!(!auth.is_authorized(&collector, Action::SetStrategy));

        auth.revoke(Action::CollectFees, &collector);
        assert!(!auth.is_authorized(&collector, Action::CollectFees));
    }
}
