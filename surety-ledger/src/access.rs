//! Owner identity and the authorized-caller allow-list

use crate::types::Address;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// True unless `addr` is the null address
pub fn is_valid_address(addr: &Address) -> bool {
    !addr.is_zero()
}

/// Fail with `InvalidAddress` for the null address
pub fn require_valid_address(addr: &Address) -> Result<()> {
    if is_valid_address(addr) {
        Ok(())
    } else {
        Err(Error::InvalidAddress(*addr))
    }
}

/// Access-control state
///
/// The owner is fixed at construction; there is no transfer of ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    owner: Address,
    authorized: BTreeSet<Address>,
}

impl AccessControl {
    /// Create with a fixed owner and an empty allow-list
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            authorized: BTreeSet::new(),
        }
    }

    /// Contract owner
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Is `caller` the owner
    pub fn is_owner(&self, caller: &Address) -> bool {
        *caller == self.owner
    }

    /// Is `caller` in the allow-list
    pub fn is_authorized(&self, caller: &Address) -> bool {
        self.authorized.contains(caller)
    }

    /// Owner check
    pub fn require_owner(&self, caller: &Address) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "Owner-only call rejected");
            Err(Error::NotOwner(*caller))
        }
    }

    /// Allow-list check
    pub fn require_authorized(&self, caller: &Address) -> Result<()> {
        if self.is_authorized(caller) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "Unauthorized call rejected");
            Err(Error::NotAuthorized(*caller))
        }
    }

    /// Add to the allow-list; returns false when already present
    pub(crate) fn authorize(&mut self, addr: Address) -> bool {
        self.authorized.insert(addr)
    }

    /// Remove from the allow-list; returns false when absent
    pub(crate) fn deauthorize(&mut self, addr: &Address) -> bool {
        self.authorized.remove(addr)
    }

    /// Current allow-list, ordered
    pub fn authorized_callers(&self) -> Vec<Address> {
        self.authorized.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_is_fixed() {
        let owner = Address::from_low_u64(1);
        let access = AccessControl::new(owner);
        assert!(access.is_owner(&owner));
        assert!(access.require_owner(&Address::from_low_u64(2)).is_err());
    }

    #[test]
    fn test_authorize_is_idempotent() {
        let mut access = AccessControl::new(Address::from_low_u64(1));
        let app = Address::from_low_u64(2);

        assert!(access.authorize(app));
        assert!(!access.authorize(app));
        assert!(access.is_authorized(&app));
        assert_eq!(access.authorized_callers(), vec![app]);

        assert!(access.deauthorize(&app));
        assert!(!access.deauthorize(&app));
        assert!(matches!(
            access.require_authorized(&app),
            Err(Error::NotAuthorized(a)) if a == app
        ));
    }

    #[test]
    fn test_valid_address() {
        assert!(!is_valid_address(&Address::ZERO));
        assert!(require_valid_address(&Address::from_low_u64(5)).is_ok());
    }
}
