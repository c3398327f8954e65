//! Pure winner-decision logic, separated from effect application so it can be
//! exercised statistically.

use {
    ledger::documents::Bid,
    rand::{Rng, seq::SliceRandom},
};

/// What the finalizer decided for a closed session.
#[derive(Clone, Debug)]
pub struct Decision {
    pub winner: Option<Bid>,
    /// At least two distinct clans took part. An uncontested winner is not
    /// charged.
    pub contested: bool,
    /// Two or more bids shared the winning maximum.
    pub was_tie: bool,
}

/// Picks the winning bid of a closed session.
///
/// The highest amount wins. Ties on the maximum are broken by uniform random
/// choice among the tied bids, deliberately not by earliest timestamp: a
/// matching bid placed late must have the same chance as the one it matched.
pub fn decide(bids: &[Bid], rng: &mut impl Rng) -> Decision {
    match bids {
        [] => Decision {
            winner: None,
            contested: false,
            was_tie: false,
        },
        [only] => Decision {
            winner: Some(only.clone()),
            contested: false,
            was_tie: false,
        },
        _ => {
            let max = bids
                .iter()
                .map(|bid| &bid.amount)
                .max()
                .expect("bids is non-empty in this branch");
            let tied: Vec<&Bid> = bids.iter().filter(|bid| bid.amount == *max).collect();
            Decision {
                winner: tied.choose(rng).map(|bid| (*bid).clone()),
                contested: true,
                was_tie: tied.len() > 1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        bigdecimal::BigDecimal,
        chrono::Utc,
        ledger::documents::ClanTag,
        rand::{SeedableRng, rngs::StdRng},
    };

    fn bid(clan: &str, amount: &str) -> Bid {
        Bid {
            clan_tag: ClanTag::new(clan),
            amount: amount.parse::<BigDecimal>().unwrap(),
            placed_by: 1,
            placed_at: Utc::now(),
        }
    }

    #[test]
    fn no_bids_no_winner() {
        let decision = decide(&[], &mut StdRng::seed_from_u64(0));
        assert!(decision.winner.is_none());
        assert!(!decision.contested);
        assert!(!decision.was_tie);
    }

    #[test]
    fn single_bid_wins_uncontested() {
        let decision = decide(&[bid("#A", "10")], &mut StdRng::seed_from_u64(0));
        assert_eq!(decision.winner.unwrap().clan_tag, ClanTag::new("#A"));
        assert!(!decision.contested);
        assert!(!decision.was_tie);
    }

    #[test]
    fn highest_amount_wins() {
        let bids = [bid("#A", "7.5"), bid("#B", "10"), bid("#C", "9.5")];
        let decision = decide(&bids, &mut StdRng::seed_from_u64(0));
        assert_eq!(decision.winner.unwrap().clan_tag, ClanTag::new("#B"));
        assert!(decision.contested);
        assert!(!decision.was_tie);
    }

    #[test]
    fn equal_scales_compare_equal() {
        // 10 vs 10.0 is a tie, not a win for either notation.
        let bids = [bid("#A", "10"), bid("#B", "10.0")];
        let decision = decide(&bids, &mut StdRng::seed_from_u64(0));
        assert!(decision.was_tie);
    }

    #[test]
    fn tie_break_is_effectively_uniform() {
        let bids = [bid("#A", "10"), bid("#B", "10"), bid("#C", "7.5")];
        let mut rng = StdRng::seed_from_u64(42);

        let mut wins_a = 0;
        for _ in 0..1000 {
            let decision = decide(&bids, &mut rng);
            assert!(decision.was_tie);
            let winner = decision.winner.unwrap().clan_tag;
            assert_ne!(winner, ClanTag::new("#C"));
            if winner == ClanTag::new("#A") {
                wins_a += 1;
            }
        }

        // Binomial(1000, 0.5): ~6 sigma tolerance.
        assert!((400..=600).contains(&wins_a), "wins_a = {wins_a}");
    }
}
