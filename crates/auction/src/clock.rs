//! Single-shot auction clocks and the recovery sweep.

use {
    crate::{Result, engine::Engine},
    chrono::{DateTime, Utc},
    ledger::documents::SessionId,
    std::time::Duration,
    tracing::Instrument,
};

/// Arms the single-shot clock for a session.
///
/// The in-memory timer is an optimization, not a correctness dependency:
/// firing is a plain [`Engine::finalize`] call whose first step is the
/// `Open -> Finalizing` compare-and-set, so duplicate fires are no-ops and
/// there is no physical cancellation; a session finalized by another worker
/// simply makes this task exit without effect. Timers lost to a crash are
/// replaced by the recovery sweep.
pub(crate) fn schedule(engine: Engine, session: SessionId, closes_at: DateTime<Utc>) {
    tokio::task::spawn(
        async move {
            let wait = (closes_at - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            if let Err(err) = engine.finalize(session).await {
                tracing::error!(session, ?err, "auction clock failed to finalize session");
            }
        }
        .instrument(tracing::info_span!("auction_clock", session)),
    );
}

/// Finalizes sessions whose window elapsed while `status` stayed `Open` and
/// clears recruits left locked without a live session to finalize. Runs at
/// worker startup and periodically afterwards.
///
/// Returns how many sessions this sweep finalized.
pub async fn recover_expired(engine: &Engine) -> Result<usize> {
    let now = Utc::now();
    let mut recovered = 0;

    for session in engine.store.expired_open_sessions(now).await? {
        tracing::warn!(
            session = session.id,
            closes_at = %session.closes_at,
            "finalizing session that expired without a clock"
        );
        if engine.finalize(session.id).await?.is_some() {
            recovered += 1;
        }
    }

    for recruit in engine.store.orphaned_open_recruits().await? {
        tracing::error!(recruit = recruit.id, "recruit locked without a live session");
        engine.store.release_recruit(recruit.id).await?;
        if let Err(err) = engine.notifier.unable_to_finalize(&recruit).await {
            tracing::warn!(
                recruit = recruit.id,
                ?err,
                "failed to report unfinalizable recruit"
            );
        }
    }

    Ok(recovered)
}

/// Periodic wrapper around [`recover_expired`] for long-running workers.
pub async fn recovery_loop(engine: Engine, interval: Duration) -> ! {
    loop {
        if let Err(err) = recover_expired(&engine).await {
            tracing::warn!(?err, "recovery sweep failed");
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{Config, notify::MockNotifier},
        bigdecimal::BigDecimal,
        ledger::{
            LedgerStore,
            MemoryLedger,
            documents::{ClanAccount, ClanTag, PlayerTag, RecruitRecord, SessionStatus},
        },
        std::sync::Arc,
    };

    fn pts(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    async fn store_with_fixtures() -> Arc<MemoryLedger> {
        let store = Arc::new(MemoryLedger::new());
        store
            .upsert_clan(ClanAccount::new(ClanTag::new("#A"), pts("100")))
            .await
            .unwrap();
        store
            .upsert_clan(ClanAccount::new(ClanTag::new("#B"), pts("100")))
            .await
            .unwrap();
        store
            .upsert_recruit(RecruitRecord {
                id: 1,
                player_tag: PlayerTag::new("#PLAYER"),
                th_level: 15,
                requester_discord_id: 9,
                notification_channel: 5,
                auction_open: false,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn clock_fires_once_at_session_end() {
        let store = store_with_fixtures().await;
        let mut notifier = MockNotifier::new();
        notifier.expect_session_opened().returning(|_, _| Ok(()));
        notifier.expect_outcome().times(1).returning(|_| Ok(()));
        let engine = Engine::new(
            store.clone(),
            Arc::new(notifier),
            Config {
                auction_duration: Duration::from_millis(300),
                ..Default::default()
            },
        );

        let session = engine.open_auction(1, 9).await.unwrap();
        engine
            .place_bid(session.id, ClanTag::new("#A"), pts("10"), 7)
            .await
            .unwrap();
        engine
            .place_bid(session.id, ClanTag::new("#B"), pts("7.5"), 7)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let session = store.session(session.id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finalized);
        assert!(!store.recruit(1).await.unwrap().unwrap().auction_open);
        let outcome = store.outcome(session.id).await.unwrap().unwrap();
        assert_eq!(outcome.winner_clan_tag, Some(ClanTag::new("#A")));
        assert_eq!(outcome.amount, pts("10"));
    }

    #[tokio::test]
    async fn sweep_finalizes_sessions_that_expired_without_a_clock() {
        let store = store_with_fixtures().await;
        let mut notifier = MockNotifier::new();
        notifier.expect_outcome().times(1).returning(|_| Ok(()));
        let engine = Engine::new(store.clone(), Arc::new(notifier), Config::default());

        // A worker opened this session and crashed before its clock fired.
        store.claim_recruit(1).await.unwrap();
        let now = Utc::now();
        let session = store
            .create_session(
                1,
                9,
                now - chrono::Duration::minutes(30),
                now - chrono::Duration::minutes(5),
            )
            .await
            .unwrap();
        store
            .push_bid(
                session.id,
                ledger::documents::Bid {
                    clan_tag: ClanTag::new("#A"),
                    amount: pts("10"),
                    placed_by: 7,
                    placed_at: now - chrono::Duration::minutes(20),
                },
            )
            .await
            .unwrap();
        store
            .reserve_points(&ClanTag::new("#A"), &pts("10"))
            .await
            .unwrap();

        assert_eq!(recover_expired(&engine).await.unwrap(), 1);

        let session = store.session(session.id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Finalized);
        assert!(!store.recruit(1).await.unwrap().unwrap().auction_open);
        let clan = store.clan(&ClanTag::new("#A")).await.unwrap().unwrap();
        assert_eq!(clan.reserved_points, pts("0"));

        // A second sweep finds nothing left to do.
        assert_eq!(recover_expired(&engine).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_clears_recruits_locked_without_a_session() {
        let store = store_with_fixtures().await;
        let mut notifier = MockNotifier::new();
        notifier
            .expect_unable_to_finalize()
            .times(1)
            .returning(|_| Ok(()));
        let engine = Engine::new(store.clone(), Arc::new(notifier), Config::default());

        // Flag set but the session document never made it.
        store.claim_recruit(1).await.unwrap();

        assert_eq!(recover_expired(&engine).await.unwrap(), 0);
        assert!(!store.recruit(1).await.unwrap().unwrap().auction_open);
    }
}
