//! Deterministic account addresses.
//!
//! Every ledger account lives at `blake3(domain, fields...)`, with the domain
//! and each variable-length field length-prefixed so distinct inputs never
//! collide by concatenation.

use blake3::Hasher;

use crate::types::{OptionSeries, Pubkey};

/// Domain separators for each account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressDomain {
    VaultFactory,
    Vault,
    Maker,
    Taker,
    FairPriceTicket,
    SettleTicket,
}

impl AddressDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressDomain::VaultFactory => "openhedge/vault-factory",
            AddressDomain::Vault => "openhedge/vault",
            AddressDomain::Maker => "openhedge/maker",
            AddressDomain::Taker => "openhedge/taker",
            AddressDomain::FairPriceTicket => "openhedge/ticket/fair-price",
            AddressDomain::SettleTicket => "openhedge/ticket/settle",
        }
    }
}

pub struct AddressBuilder {
    hasher: Hasher,
}

impl AddressBuilder {
    pub fn new(domain: AddressDomain) -> Self {
        let domain = domain.as_str().as_bytes();
        let mut hasher = Hasher::new();
        hasher.update(&(domain.len() as u32).to_le_bytes());
        hasher.update(domain);
        Self { hasher }
    }

    fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u32).to_le_bytes());
        self.hasher.update(bytes);
    }

    pub fn write_key(&mut self, key: &Pubkey) -> &mut Self {
        self.write_len_prefixed(key.as_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.hasher.update(&[value]);
        self
    }

    pub fn finish(&self) -> Pubkey {
        Pubkey::new(*self.hasher.finalize().as_bytes())
    }
}

/// Derive an address from a domain and a list of keys.
pub fn derive_address(domain: AddressDomain, keys: &[&Pubkey]) -> Pubkey {
    let mut builder = AddressBuilder::new(domain);
    for key in keys {
        builder.write_key(key);
    }
    builder.finish()
}

pub fn factory_address(series: &OptionSeries) -> Pubkey {
    AddressBuilder::new(AddressDomain::VaultFactory)
        .write_key(&series.base.mint)
        .write_key(&series.quote.mint)
        .write_u64(series.maturity)
        .write_u64(series.strike)
        .write_u8(series.kind.as_u8())
        .finish()
}

pub fn vault_address(factory: &Pubkey, vault_id: u64) -> Pubkey {
    AddressBuilder::new(AddressDomain::Vault)
        .write_key(factory)
        .write_u64(vault_id)
        .finish()
}

pub fn maker_address(vault: &Pubkey, owner: &Pubkey) -> Pubkey {
    derive_address(AddressDomain::Maker, &[vault, owner])
}

pub fn taker_address(vault: &Pubkey, owner: &Pubkey) -> Pubkey {
    derive_address(AddressDomain::Taker, &[vault, owner])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, OptionKind};

    fn series(strike: u64) -> OptionSeries {
        OptionSeries {
            base: Asset::new(Pubkey::named("sol"), 9),
            quote: Asset::new(Pubkey::named("usdc"), 6),
            maturity: 1_700_000_000,
            strike,
            kind: OptionKind::Put,
        }
    }

    #[test]
    fn test_factory_address_is_pure_function_of_series() {
        assert_eq!(factory_address(&series(10)), factory_address(&series(10)));
        assert_ne!(factory_address(&series(10)), factory_address(&series(11)));

        let mut call = series(10);
        call.kind = OptionKind::Call;
        assert_ne!(factory_address(&series(10)), factory_address(&call));
    }

    #[test]
    fn test_domains_separate_same_fields() {
        let vault = Pubkey::named("vault");
        let owner = Pubkey::named("owner");
        assert_ne!(maker_address(&vault, &owner), taker_address(&vault, &owner));
        assert_ne!(maker_address(&vault, &owner), maker_address(&owner, &vault));
    }

    #[test]
    fn test_vault_ids_map_to_distinct_addresses() {
        let factory = factory_address(&series(10));
        assert_ne!(vault_address(&factory, 1), vault_address(&factory, 2));
    }
}
