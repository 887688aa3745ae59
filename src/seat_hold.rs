//! Seat holds taken while a booker moves from seat selection to payment.
//!
//! `NoSeatHold` keeps the plain read-then-write model where two bookers can
//! confirm the same seat. `MemorySeatHold` and `RedisSeatHold` grant a
//! short-lived, all-or-nothing hold per seat so the second booker is turned
//! away before paying.

use futures::future::BoxFuture;
use futures::FutureExt;
use redis::AsyncCommands;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Screening, SeatId};
use crate::redis_client::RedisClient;
use crate::store::StoreResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldOutcome {
    Held,
    /// Места, уже удерживаемые другим сеансом. Ничего не удержано.
    Conflict(BTreeSet<SeatId>),
}

pub trait SeatHoldService: Send + Sync {
    fn hold<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<HoldOutcome>>;

    fn release<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<()>>;
}

fn hold_key(screening: &Screening, seat: &SeatId) -> String {
    format!("hold:{}:{}", screening.key(), seat)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSeatHold;

impl SeatHoldService for NoSeatHold {
    fn hold<'a>(
        &'a self,
        _screening: &'a Screening,
        _seats: &'a BTreeSet<SeatId>,
        _holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<HoldOutcome>> {
        async { Ok(HoldOutcome::Held) }.boxed()
    }

    fn release<'a>(
        &'a self,
        _screening: &'a Screening,
        _seats: &'a BTreeSet<SeatId>,
        _holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<()>> {
        async { Ok(()) }.boxed()
    }
}

/// Single-process holds with a TTL.
pub struct MemorySeatHold {
    ttl: Duration,
    holds: Mutex<HashMap<String, (Uuid, Instant)>>,
}

impl MemorySeatHold {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            holds: Mutex::new(HashMap::new()),
        }
    }
}

impl SeatHoldService for MemorySeatHold {
    fn hold<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<HoldOutcome>> {
        async move {
            let now = Instant::now();
            let mut holds = self.holds.lock().await;
            holds.retain(|_, (_, expires)| *expires > now);

            let conflicts: BTreeSet<SeatId> = seats
                .iter()
                .filter(|seat| {
                    holds
                        .get(&hold_key(screening, seat))
                        .is_some_and(|(owner, _)| *owner != holder)
                })
                .copied()
                .collect();
            if !conflicts.is_empty() {
                return Ok(HoldOutcome::Conflict(conflicts));
            }

            for seat in seats {
                holds.insert(hold_key(screening, seat), (holder, now + self.ttl));
            }
            Ok(HoldOutcome::Held)
        }
        .boxed()
    }

    fn release<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let mut holds = self.holds.lock().await;
            for seat in seats {
                let key = hold_key(screening, seat);
                if holds.get(&key).is_some_and(|(owner, _)| *owner == holder) {
                    holds.remove(&key);
                }
            }
            Ok(())
        }
        .boxed()
    }
}

// Удаляем ключ, только если он принадлежит этому держателю
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end";

/// Сколько раз пробуем `SET NX`, если ключ истекает прямо между SET и GET.
const CLAIM_ATTEMPTS: usize = 3;

/// What the `GET` after a failed `SET NX` says about a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeatClaim {
    /// Already ours: refresh the TTL.
    Ours,
    HeldByOther,
    /// The key expired after `SET NX` failed. The seat is free again.
    Vanished,
}

fn classify_owner(owner: Option<&str>, holder: &str) -> SeatClaim {
    match owner {
        Some(owner) if owner == holder => SeatClaim::Ours,
        Some(_) => SeatClaim::HeldByOther,
        None => SeatClaim::Vanished,
    }
}

/// Per-seat results of one all-or-nothing hold.
#[derive(Debug, Default)]
struct HoldAttempt {
    acquired: Vec<String>,
    conflicts: BTreeSet<SeatId>,
}

impl HoldAttempt {
    fn acquired(&mut self, key: String) {
        self.acquired.push(key);
    }

    fn conflict(&mut self, seat: SeatId) {
        self.conflicts.insert(seat);
    }

    /// Итог и ключи, которые надо откатить. При успехе откатывать нечего.
    fn finish(self) -> (HoldOutcome, Vec<String>) {
        if self.conflicts.is_empty() {
            (HoldOutcome::Held, Vec::new())
        } else {
            (HoldOutcome::Conflict(self.conflicts), self.acquired)
        }
    }
}

/// Holds shared by every API instance, one `SET NX EX` key per seat.
pub struct RedisSeatHold {
    redis: RedisClient,
    ttl_secs: u64,
}

impl RedisSeatHold {
    pub fn new(redis: RedisClient, ttl: Duration) -> Self {
        Self {
            redis,
            ttl_secs: ttl.as_secs().max(1),
        }
    }

    /// `true` when the seat is now held by `holder`.
    async fn claim(&self, key: &str, holder: &str) -> StoreResult<bool> {
        let mut conn = self.redis.conn.clone();
        for _ in 0..CLAIM_ATTEMPTS {
            // SET NX EX - атомарно, без гонок между инстансами
            let set: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(holder)
                .arg("NX")
                .arg("EX")
                .arg(self.ttl_secs)
                .query_async(&mut conn)
                .await?;
            if set.is_some() {
                return Ok(true);
            }

            let owner: Option<String> = conn.get(key).await?;
            match classify_owner(owner.as_deref(), holder) {
                SeatClaim::Ours => {
                    let _: bool = conn.expire(key, self.ttl_secs as i64).await?;
                    return Ok(true);
                }
                SeatClaim::HeldByOther => return Ok(false),
                SeatClaim::Vanished => continue,
            }
        }
        debug!(key = %key, "Seat hold key kept flapping, treating as taken");
        Ok(false)
    }

    async fn release_keys(&self, keys: &[String], holder: &str) -> StoreResult<()> {
        let mut conn = self.redis.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        for key in keys {
            let _: i64 = script.key(key).arg(holder).invoke_async(&mut conn).await?;
        }
        Ok(())
    }
}

impl SeatHoldService for RedisSeatHold {
    fn hold<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<HoldOutcome>> {
        async move {
            let holder = holder.to_string();
            let mut attempt = HoldAttempt::default();

            for seat in seats {
                let key = hold_key(screening, seat);
                match self.claim(&key, &holder).await {
                    Ok(true) => attempt.acquired(key),
                    Ok(false) => attempt.conflict(*seat),
                    Err(e) => {
                        // не оставляем полуудержание при сбое Redis
                        if let Err(release) = self.release_keys(&attempt.acquired, &holder).await {
                            warn!("Failed to roll back partial seat hold: {}", release);
                        }
                        return Err(e);
                    }
                }
            }

            let (outcome, rollback) = attempt.finish();
            match &outcome {
                HoldOutcome::Held => {
                    debug!(screening = %screening.key(), seats = seats.len(), "Seats held");
                }
                HoldOutcome::Conflict(_) => {
                    if let Err(e) = self.release_keys(&rollback, &holder).await {
                        warn!("Failed to roll back partial seat hold: {}", e);
                    }
                }
            }
            Ok(outcome)
        }
        .boxed()
    }

    fn release<'a>(
        &'a self,
        screening: &'a Screening,
        seats: &'a BTreeSet<SeatId>,
        holder: Uuid,
    ) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let keys: Vec<String> = seats.iter().map(|seat| hold_key(screening, seat)).collect();
            self.release_keys(&keys, &holder.to_string()).await
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn screening() -> Screening {
        Screening::new("Cosmic Journey", NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), "6:30 PM")
    }

    fn seats(ids: &[&str]) -> BTreeSet<SeatId> {
        ids.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn no_hold_always_grants() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let holds = NoSeatHold;
        assert_eq!(holds.hold(&screening(), &seats(&["A1"]), a).await.unwrap(), HoldOutcome::Held);
        assert_eq!(holds.hold(&screening(), &seats(&["A1"]), b).await.unwrap(), HoldOutcome::Held);
    }

    #[tokio::test]
    async fn memory_hold_is_all_or_nothing() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let holds = MemorySeatHold::new(Duration::from_secs(300));

        assert_eq!(holds.hold(&screening(), &seats(&["A1", "A2"]), a).await.unwrap(), HoldOutcome::Held);
        // тот же держатель может продлить удержание
        assert_eq!(holds.hold(&screening(), &seats(&["A1"]), a).await.unwrap(), HoldOutcome::Held);

        let outcome = holds.hold(&screening(), &seats(&["A2", "A3"]), b).await.unwrap();
        assert_eq!(outcome, HoldOutcome::Conflict(seats(&["A2"])));

        // A3 не должно было удержаться
        let c = Uuid::new_v4();
        assert_eq!(holds.hold(&screening(), &seats(&["A3"]), c).await.unwrap(), HoldOutcome::Held);

        holds.release(&screening(), &seats(&["A1", "A2"]), a).await.unwrap();
        assert_eq!(holds.hold(&screening(), &seats(&["A2"]), b).await.unwrap(), HoldOutcome::Held);
    }

    #[tokio::test]
    async fn memory_holds_expire() {
        let holds = MemorySeatHold::new(Duration::from_millis(10));
        holds.hold(&screening(), &seats(&["B5"]), Uuid::new_v4()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let outcome = holds.hold(&screening(), &seats(&["B5"]), Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, HoldOutcome::Held);
    }

    #[tokio::test]
    async fn release_by_other_holder_is_ignored() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let holds = MemorySeatHold::new(Duration::from_secs(300));
        holds.hold(&screening(), &seats(&["C1"]), a).await.unwrap();
        holds.release(&screening(), &seats(&["C1"]), b).await.unwrap();
        let outcome = holds.hold(&screening(), &seats(&["C1"]), b).await.unwrap();
        assert_eq!(outcome, HoldOutcome::Conflict(seats(&["C1"])));
    }

    #[test]
    fn vanished_key_is_claimed_again() {
        assert_eq!(classify_owner(Some("me"), "me"), SeatClaim::Ours);
        assert_eq!(classify_owner(Some("other"), "me"), SeatClaim::HeldByOther);
        assert_eq!(classify_owner(None, "me"), SeatClaim::Vanished);
    }

    #[test]
    fn partial_hold_rolls_back_every_acquired_key() {
        let s = screening();
        let mut attempt = HoldAttempt::default();
        for id in ["A1", "A3"] {
            attempt.acquired(hold_key(&s, &id.parse().unwrap()));
        }
        attempt.conflict("A2".parse().unwrap());

        let (outcome, rollback) = attempt.finish();
        assert_eq!(outcome, HoldOutcome::Conflict(seats(&["A2"])));
        assert_eq!(
            rollback,
            vec![hold_key(&s, &"A1".parse().unwrap()), hold_key(&s, &"A3".parse().unwrap())]
        );
    }

    #[test]
    fn full_hold_keeps_its_keys() {
        let mut attempt = HoldAttempt::default();
        attempt.acquired(hold_key(&screening(), &"A1".parse().unwrap()));
        let (outcome, rollback) = attempt.finish();
        assert_eq!(outcome, HoldOutcome::Held);
        assert!(rollback.is_empty());
    }

    #[tokio::test]
    async fn titles_differing_in_case_do_not_share_holds() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let holds = MemorySeatHold::new(Duration::from_secs(300));
        let up = Screening::new("Up", day, "6:30 PM");
        let shouting = Screening::new("UP", day, "6:30 PM");

        holds.hold(&up, &seats(&["A1"]), Uuid::new_v4()).await.unwrap();
        let outcome = holds.hold(&shouting, &seats(&["A1"]), Uuid::new_v4()).await.unwrap();
        assert_eq!(outcome, HoldOutcome::Held);
    }

    // Нужен живой Redis: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn redis_hold_is_all_or_nothing() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let holds = RedisSeatHold::new(RedisClient::new(&url).await.unwrap(), Duration::from_secs(30));
        let s = Screening::new(format!("Redis Hold {}", Uuid::new_v4()), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), "6:30 PM");
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(holds.hold(&s, &seats(&["A2"]), a).await.unwrap(), HoldOutcome::Held);
        let outcome = holds.hold(&s, &seats(&["A1", "A2", "A3"]), b).await.unwrap();
        assert_eq!(outcome, HoldOutcome::Conflict(seats(&["A2"])));

        // A1 и A3 откатились
        assert_eq!(holds.hold(&s, &seats(&["A1", "A3"]), c).await.unwrap(), HoldOutcome::Held);
        holds.release(&s, &seats(&["A1", "A3"]), c).await.unwrap();
        holds.release(&s, &seats(&["A2"]), a).await.unwrap();
    }
}
