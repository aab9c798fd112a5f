//! Holder Intersection - wallets that sit in the top holders of several tokens

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::discovery::types::{CommonWallet, HolderSet, TokenId, WalletAddress};

/// Base58 Solana account keys are never shorter than this
const MIN_ADDRESS_LEN: usize = 32;

/// Program and system accounts that show up as holders but never trade
pub const DEFAULT_EXCLUDED_ADDRESSES: &[&str] = &[
    "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",  // SPL Token program
    "11111111111111111111111111111111",             // System program
    "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb",  // Token-2022 program
    "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJe1bfE", // Associated Token program
    "So11111111111111111111111111111111111111112",  // Wrapped SOL mint
];

/// Immutable set of infrastructure addresses excluded from intersection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    addresses: HashSet<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    /// Defaults plus any extra configured addresses
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        set.addresses.extend(extra.into_iter().map(Into::into));
        set
    }

    /// True if the address must never be treated as a trader
    pub fn excludes(&self, address: &str) -> bool {
        address.len() < MIN_ADDRESS_LEN || self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_ADDRESSES.iter().copied())
    }
}

/// Find wallets present in at least `min_appearances` distinct holder sets.
///
/// Output is ordered by number of tokens held (descending), ties in
/// first-seen order. Each wallet's tokens follow the order of `holder_sets`.
pub fn find_intersection(
    holder_sets: &[HolderSet],
    exclusions: &ExclusionSet,
    min_appearances: usize,
) -> Vec<CommonWallet> {
    let mut first_seen: Vec<&WalletAddress> = Vec::new();
    let mut tokens_by_wallet: HashMap<&WalletAddress, Vec<&TokenId>> = HashMap::new();

    for set in holder_sets {
        for wallet in &set.holders {
            if exclusions.excludes(wallet.as_str()) {
                continue;
            }

            let tokens = tokens_by_wallet.entry(wallet).or_insert_with(|| {
                first_seen.push(wallet);
                Vec::new()
            });
            // The same token listed twice in a request counts once
            if !tokens.contains(&&set.token) {
                tokens.push(&set.token);
            }
        }
    }

    let mut common: Vec<CommonWallet> = first_seen
        .into_iter()
        .filter_map(|wallet| {
            let tokens = tokens_by_wallet.remove(wallet)?;
            if tokens.len() < min_appearances.max(1) {
                return None;
            }
            Some(CommonWallet {
                wallet: wallet.clone(),
                tokens: tokens.into_iter().cloned().collect(),
            })
        })
        .collect();

    // Stable: equal counts keep first-seen order
    common.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));
    common
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = "WalletWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWWW";
    const X: &str = "WalletXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";
    const Y: &str = "WalletYYYYYYYYYYYYYYYYYYYYYYYYYYYYYYYYYY";
    const Z: &str = "WalletZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ";

    fn set(token: &str, wallets: &[&str]) -> HolderSet {
        HolderSet::new(
            TokenId::from(token),
            wallets.iter().map(|w| WalletAddress::from(*w)),
        )
    }

    fn tokens(common: &CommonWallet) -> Vec<&str> {
        common.tokens.iter().map(|t| t.as_str()).collect()
    }

    #[test]
    fn test_two_token_intersection() {
        let sets = vec![set("T1", &[W, X]), set("T2", &[W, Y])];
        let common = find_intersection(&sets, &ExclusionSet::default(), 2);

        assert_eq!(common.len(), 1);
        assert_eq!(common[0].wallet.as_str(), W);
        assert_eq!(tokens(&common[0]), vec!["T1", "T2"]);
    }

    #[test]
    fn test_ordering_by_overlap_then_first_seen() {
        let sets = vec![
            set("T1", &[X, Y, W]),
            set("T2", &[Y, X, Z]),
            set("T3", &[W, Z, Y]),
        ];
        let common = find_intersection(&sets, &ExclusionSet::default(), 2);
        let order: Vec<&str> = common.iter().map(|c| c.wallet.as_str()).collect();

        // Y holds 3; X, W, Z hold 2 each in first-seen order
        assert_eq!(order, vec![Y, X, W, Z]);
        assert_eq!(tokens(&common[0]), vec!["T1", "T2", "T3"]);
        assert_eq!(tokens(&common[2]), vec!["T1", "T3"]);
    }

    #[test]
    fn test_excluded_addresses_never_returned() {
        let program = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
        let sets = vec![
            set("T1", &[program, W, "short"]),
            set("T2", &[program, W, "short"]),
        ];
        let common = find_intersection(&sets, &ExclusionSet::default(), 2);

        assert_eq!(common.len(), 1);
        assert_eq!(common[0].wallet.as_str(), W);
    }

    #[test]
    fn test_injected_exclusions() {
        let sets = vec![set("T1", &[W, X]), set("T2", &[W, X])];
        let exclusions = ExclusionSet::with_extra([X]);
        let common = find_intersection(&sets, &exclusions, 2);

        assert_eq!(common.len(), 1);
        assert_eq!(common[0].wallet.as_str(), W);
        assert!(exclusions.len() > DEFAULT_EXCLUDED_ADDRESSES.len());
    }

    #[test]
    fn test_empty_holder_sets() {
        let sets = vec![HolderSet::empty(TokenId::from("T1")), HolderSet::empty(TokenId::from("T2"))];
        assert!(find_intersection(&sets, &ExclusionSet::default(), 2).is_empty());
        assert!(find_intersection(&[], &ExclusionSet::default(), 2).is_empty());
    }

    #[test]
    fn test_duplicate_token_counts_once() {
        let sets = vec![set("T1", &[W]), set("T1", &[W])];
        assert!(find_intersection(&sets, &ExclusionSet::default(), 2).is_empty());
    }
}
