//! Token ledger collaborators
//!
//! The engine never owns token balances itself. It debits and credits
//! through these traits, after its own bookkeeping is done.
//!
//! - [`FungibleLedger`]: ERC20-style balances with allowances
//! - [`BatchLedger`]: ERC1155-style item balances with all-or-nothing batches

use crate::error::{CoreError, Result};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Fungible token balances
pub trait FungibleLedger {
    fn balance_of(&self, account: &Address) -> Amount;

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()>;

    /// Move `amount` from `from` (the caller) to `to`
    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()>;

    /// Pull `amount` from `from` to `to` using `spender`'s allowance
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()>;
}

/// In-memory fungible token
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Token symbol
    pub symbol: String,

    balances: BTreeMap<Address, Amount>,

    /// owner -> spender -> remaining allowance
    allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,

    total_supply: Amount,
}

impl TokenLedger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    /// Create new tokens
    pub fn mint(&mut self, to: Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(CoreError::Overflow)?;
        *self.balances.entry(to).or_insert(0) += amount;
        debug!(token = %self.symbol, %to, amount, "mint");
        Ok(())
    }

    fn debit(&mut self, account: Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(CoreError::InsufficientBalance {
                account,
                required: amount,
                available,
            });
        }
        self.balances.insert(account, available - amount);
        Ok(())
    }

    fn credit(&mut self, account: Address, amount: Amount) {
        *self.balances.entry(account).or_insert(0) += amount;
    }
}

impl FungibleLedger for TokenLedger {
    fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(owner)
            .and_then(|by_spender| by_spender.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: Amount) -> Result<()> {
        if owner.is_zero() || spender.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        self.allowances.entry(owner).or_default().insert(spender, amount);
        Ok(())
    }

    fn transfer(&mut self, from: Address, to: Address, amount: Amount) -> Result<()> {
        if to.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        debug!(token = %self.symbol, %from, %to, amount, "transfer");
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<()> {
        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return Err(CoreError::InsufficientAllowance {
                owner: from,
                spender,
                required: amount,
                available: allowed,
            });
        }
        self.transfer(from, to, amount)?;
        self.allowances
            .entry(from)
            .or_default()
            .insert(spender, allowed - amount);
        Ok(())
    }
}

/// Multi-id item balances; every batch call applies fully or not at all
pub trait BatchLedger {
    fn balance_of(&self, account: &Address, id: u64) -> Amount;

    fn mint(&mut self, to: Address, id: u64, amount: Amount) -> Result<()> {
        self.mint_batch(to, &[id], &[amount])
    }

    fn mint_batch(&mut self, to: Address, ids: &[u64], amounts: &[Amount]) -> Result<()>;

    fn burn(&mut self, from: Address, id: u64, amount: Amount) -> Result<()> {
        self.burn_batch(from, &[id], &[amount])
    }

    fn burn_batch(&mut self, from: Address, ids: &[u64], amounts: &[Amount]) -> Result<()>;

    fn safe_transfer_from(&mut self, from: Address, to: Address, id: u64, amount: Amount) -> Result<()> {
        self.safe_batch_transfer_from(from, to, &[id], &[amount])
    }

    fn safe_batch_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        ids: &[u64],
        amounts: &[Amount],
    ) -> Result<()>;
}

/// In-memory item ledger
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLedger {
    /// account -> item id -> balance
    balances: BTreeMap<Address, BTreeMap<u64, Amount>>,
}

impl ItemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_lengths(ids: &[u64], amounts: &[Amount]) -> Result<()> {
        if ids.len() != amounts.len() {
            return Err(CoreError::BatchLengthMismatch {
                ids: ids.len(),
                amounts: amounts.len(),
            });
        }
        Ok(())
    }

    /// Verify `account` holds every amount, counting repeated ids together
    fn check_holdings(&self, account: Address, ids: &[u64], amounts: &[Amount]) -> Result<()> {
        let mut needed: BTreeMap<u64, Amount> = BTreeMap::new();
        for (id, amount) in ids.iter().zip(amounts) {
            let entry = needed.entry(*id).or_insert(0);
            *entry = entry.checked_add(*amount).ok_or(CoreError::Overflow)?;
        }
        for (id, required) in needed {
            let available = BatchLedger::balance_of(self, &account, id);
            if available < required {
                return Err(CoreError::InsufficientItems {
                    account,
                    id,
                    required,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Balances `account` would hold after receiving the batch
    fn credited(&self, account: Address, ids: &[u64], amounts: &[Amount]) -> Result<BTreeMap<u64, Amount>> {
        let mut credited: BTreeMap<u64, Amount> = BTreeMap::new();
        for (id, amount) in ids.iter().zip(amounts) {
            let balance = match credited.get(id) {
                Some(balance) => *balance,
                None => BatchLedger::balance_of(self, &account, *id),
            };
            credited.insert(*id, balance.checked_add(*amount).ok_or(CoreError::Overflow)?);
        }
        Ok(credited)
    }

    /// Holdings must already be checked
    fn debit_items(&mut self, account: Address, ids: &[u64], amounts: &[Amount]) {
        if let Some(items) = self.balances.get_mut(&account) {
            for (id, amount) in ids.iter().zip(amounts) {
                if let Some(balance) = items.get_mut(id) {
                    *balance -= amount;
                }
            }
        }
    }
}

impl BatchLedger for ItemLedger {
    fn balance_of(&self, account: &Address, id: u64) -> Amount {
        self.balances
            .get(account)
            .and_then(|items| items.get(&id))
            .copied()
            .unwrap_or(0)
    }

    fn mint_batch(&mut self, to: Address, ids: &[u64], amounts: &[Amount]) -> Result<()> {
        Self::check_lengths(ids, amounts)?;
        if to.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        let credited = self.credited(to, ids, amounts)?;
        self.balances.entry(to).or_default().extend(credited);
        debug!(%to, items = ids.len(), "mint batch");
        Ok(())
    }

    fn burn_batch(&mut self, from: Address, ids: &[u64], amounts: &[Amount]) -> Result<()> {
        Self::check_lengths(ids, amounts)?;
        self.check_holdings(from, ids, amounts)?;
        self.debit_items(from, ids, amounts);
        Ok(())
    }

    fn safe_batch_transfer_from(
        &mut self,
        from: Address,
        to: Address,
        ids: &[u64],
        amounts: &[Amount],
    ) -> Result<()> {
        Self::check_lengths(ids, amounts)?;
        if to.is_zero() {
            return Err(CoreError::ZeroAddress);
        }
        self.check_holdings(from, ids, amounts)?;
        if from == to {
            return Ok(());
        }
        let credited = self.credited(to, ids, amounts)?;
        self.debit_items(from, ids, amounts);
        self.balances.entry(to).or_default().extend(credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut token = TokenLedger::new("STK");
        token.mint(addr(1), 100).unwrap();
        token.transfer(addr(1), addr(2), 40).unwrap();

        assert_eq!(token.balance_of(&addr(1)), 60);
        assert_eq!(token.balance_of(&addr(2)), 40);
        assert_eq!(token.total_supply(), 100);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut token = TokenLedger::new("STK");
        token.mint(addr(1), 10).unwrap();
        let err = token.transfer(addr(1), addr(2), 11).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientBalance { required: 11, available: 10, .. }));
        assert_eq!(token.balance_of(&addr(1)), 10);
    }

    #[test]
    fn test_transfer_from_requires_allowance() {
        let mut token = TokenLedger::new("STK");
        token.mint(addr(1), 100).unwrap();

        let err = token.transfer_from(addr(3), addr(1), addr(3), 50).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientAllowance { .. }));

        token.approve(addr(1), addr(3), 60).unwrap();
        token.transfer_from(addr(3), addr(1), addr(3), 50).unwrap();
        assert_eq!(token.allowance(&addr(1), &addr(3)), 10);
        assert_eq!(token.balance_of(&addr(3)), 50);
    }

    #[test]
    fn test_failed_pull_keeps_allowance() {
        let mut token = TokenLedger::new("STK");
        token.mint(addr(1), 5).unwrap();
        token.approve(addr(1), addr(3), 60).unwrap();
        assert!(token.transfer_from(addr(3), addr(1), addr(3), 50).is_err());
        assert_eq!(token.allowance(&addr(1), &addr(3)), 60);
    }

    #[test]
    fn test_batch_burn_is_all_or_nothing() {
        let mut items = ItemLedger::new();
        items.mint_batch(addr(1), &[1, 2], &[5, 1]).unwrap();

        let err = items.burn_batch(addr(1), &[1, 2], &[3, 2]).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientItems { id: 2, .. }));
        assert_eq!(BatchLedger::balance_of(&items, &addr(1), 1), 5);
    }

    #[test]
    fn test_batch_repeated_ids_counted_together() {
        let mut items = ItemLedger::new();
        items.mint(addr(1), 7, 3).unwrap();
        assert!(items
            .safe_batch_transfer_from(addr(1), addr(2), &[7, 7], &[2, 2])
            .is_err());
        items
            .safe_batch_transfer_from(addr(1), addr(2), &[7, 7], &[1, 2])
            .unwrap();
        assert_eq!(BatchLedger::balance_of(&items, &addr(2), 7), 3);
    }

    #[test]
    fn test_batch_length_mismatch() {
        let mut items = ItemLedger::new();
        assert!(matches!(
            items.mint_batch(addr(1), &[1, 2], &[1]),
            Err(CoreError::BatchLengthMismatch { ids: 2, amounts: 1 })
        ));
    }

    #[test]
    fn test_overflowing_mint_changes_nothing() {
        let mut items = ItemLedger::new();
        items.mint_batch(addr(1), &[1, 2], &[10, u128::MAX - 1]).unwrap();
        let before = items.clone();

        assert_eq!(
            items.mint_batch(addr(1), &[1, 2, 2], &[5, 1, 1]),
            Err(CoreError::Overflow)
        );
        assert_eq!(items, before);

        items.mint(addr(2), 2, 2).unwrap();
        assert_eq!(
            items.safe_transfer_from(addr(2), addr(1), 2, 2),
            Err(CoreError::Overflow)
        );
        assert_eq!(BatchLedger::balance_of(&items, &addr(2), 2), 2);
        assert_eq!(BatchLedger::balance_of(&items, &addr(1), 1), 10);
    }
}
