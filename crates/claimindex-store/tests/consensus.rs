//! End-to-end consensus behavior: activation delays, takeovers, tie-breaks,
//! malformed-event tolerance, and rollback.

use claimindex_core::processor::BlockProcessor;
use claimindex_core::query::ClaimSummary;
use claimindex_core::types::{BlockInput, ClaimEvent, OutPoint};
use claimindex_core::{RecordStore, TrieConfig, TrieError};
use claimindex_store::MemoryStore;
use serde_json::json;

const COIN: u64 = 100_000_000;

fn new_processor() -> BlockProcessor<MemoryStore> {
    BlockProcessor::new(MemoryStore::new(), TrieConfig::default())
}

fn claim(id: &str, name: &str, amount: u64, title: &str) -> ClaimEvent {
    ClaimEvent::Claim {
        claim_id: id.into(),
        name: name.into(),
        outpoint: OutPoint::new(format!("tx-{id}"), 0),
        amount,
        value: json!({ "title": title }),
    }
}

// An update transaction carries the claim's full metadata again, so the
// helper re-asserts the title like a real wallet would.
fn update(id: &str, amount: u64, title: &str, tag: &str) -> ClaimEvent {
    ClaimEvent::Update {
        claim_id: id.into(),
        outpoint: OutPoint::new(format!("tx-{id}-{tag}"), 0),
        amount,
        value: json!({ "title": title }),
    }
}

fn abandon(id: &str) -> ClaimEvent {
    ClaimEvent::Abandon { claim_id: id.into() }
}

fn support(id: &str, tag: &str, amount: u64) -> ClaimEvent {
    ClaimEvent::Support {
        outpoint: OutPoint::new(format!("sup-{tag}"), 0),
        claim_id: id.into(),
        amount,
    }
}

async fn advance(
    processor: &mut BlockProcessor<MemoryStore>,
    height: u64,
    events: Vec<ClaimEvent>,
) -> claimindex_core::BlockOutcome {
    processor
        .advance(BlockInput {
            height,
            timestamp: height as i64,
            tip_height: height,
            events,
        })
        .await
        .unwrap()
}

type Entry = (String, u64, u64, u64);

fn entry(summary: &ClaimSummary) -> Entry {
    (
        summary.value["title"].as_str().unwrap_or_default().to_string(),
        summary.amount,
        summary.effective_amount,
        summary.activation_height,
    )
}

fn entries(of: &[&(&str, u64, u64, u64)]) -> Vec<Entry> {
    of.iter()
        .map(|(t, a, e, h)| (t.to_string(), *a, *e, *h))
        .collect()
}

/// Assert the full resolution of a name: controlling claim, active
/// runners-up (best-ranked first), and pending claims.
async fn assert_state(
    processor: &BlockProcessor<MemoryStore>,
    name: &str,
    controlling: Option<(&str, u64, u64, u64)>,
    active: &[(&str, u64, u64, u64)],
    accepted: &[(&str, u64, u64, u64)],
) {
    let resolution = processor.store().resolve(name).await.unwrap();
    assert_eq!(
        resolution.controlling.as_ref().map(entry),
        controlling.map(|(t, a, e, h)| (t.to_string(), a, e, h)),
        "controlling mismatch"
    );
    let got_active: Vec<Entry> = resolution.active.iter().map(entry).collect();
    assert_eq!(got_active, entries(&active.iter().collect::<Vec<_>>()), "active mismatch");
    let got_accepted: Vec<Entry> = resolution.accepted.iter().map(entry).collect();
    assert_eq!(got_accepted, entries(&accepted.iter().collect::<Vec<_>>()), "accepted mismatch");
}

#[tokio::test]
async fn historical_activation_example() {
    let mut p = new_processor();

    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    assert_state(&p, "foo", Some(("Claim A", 10 * COIN, 10 * COIN, 13)), &[], &[]).await;

    advance(&mut p, 1001, vec![claim("b1b1", "foo", 20 * COIN, "Claim B")]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 10 * COIN, 13)),
        &[],
        &[("Claim B", 20 * COIN, 0, 1031)],
    )
    .await;

    // A support for the controlling claim activates immediately.
    advance(&mut p, 1010, vec![support("a0a0", "a-boost", 14 * COIN)]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 24 * COIN, 13)),
        &[],
        &[("Claim B", 20 * COIN, 0, 1031)],
    )
    .await;

    advance(&mut p, 1020, vec![claim("c2c2", "foo", 50 * COIN, "Claim C")]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 24 * COIN, 13)),
        &[],
        &[
            ("Claim B", 20 * COIN, 0, 1031),
            ("Claim C", 50 * COIN, 0, 1051),
        ],
    )
    .await;

    // Claim B activates on schedule but can't beat A's 24.
    advance(&mut p, 1031, vec![]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 24 * COIN, 13)),
        &[("Claim B", 20 * COIN, 20 * COIN, 1031)],
        &[("Claim C", 50 * COIN, 0, 1051)],
    )
    .await;

    advance(&mut p, 1040, vec![claim("d3d3", "foo", 300 * COIN, "Claim D")]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 24 * COIN, 13)),
        &[("Claim B", 20 * COIN, 20 * COIN, 1031)],
        &[
            ("Claim C", 50 * COIN, 0, 1051),
            ("Claim D", 300 * COIN, 0, 1072),
        ],
    )
    .await;

    // C activates and takes over, which re-anchors D's pending activation
    // to the takeover height; D activates in the same block and wins.
    let outcome = advance(&mut p, 1051, vec![]).await;
    assert_eq!(outcome.takeovers.len(), 1);
    assert_eq!(outcome.takeovers[0].claim_id.as_deref(), Some("d3d3"));
    assert_state(
        &p,
        "foo",
        Some(("Claim D", 300 * COIN, 300 * COIN, 1051)),
        &[
            ("Claim C", 50 * COIN, 50 * COIN, 1051),
            ("Claim A", 10 * COIN, 24 * COIN, 13),
            ("Claim B", 20 * COIN, 20 * COIN, 1031),
        ],
        &[],
    )
    .await;

    // An update keeps identity and activation height; with the support,
    // A's 290 bid beats D's 300.
    advance(&mut p, 1052, vec![update("a0a0", 290 * COIN, "Claim A", "v2")]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 290 * COIN, 304 * COIN, 13)),
        &[
            ("Claim D", 300 * COIN, 300 * COIN, 1051),
            ("Claim C", 50 * COIN, 50 * COIN, 1051),
            ("Claim B", 20 * COIN, 20 * COIN, 1031),
        ],
        &[],
    )
    .await;
}

#[tokio::test]
async fn competing_claims_subsequent_blocks_earlier_height_wins() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    advance(&mut p, 14, vec![claim("b1b1", "foo", 10 * COIN, "Claim B")]).await;
    advance(&mut p, 15, vec![claim("c2c2", "foo", 10 * COIN, "Claim C")]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 10 * COIN, 13)),
        &[
            ("Claim B", 10 * COIN, 10 * COIN, 14),
            ("Claim C", 10 * COIN, 10 * COIN, 15),
        ],
        &[],
    )
    .await;
}

#[tokio::test]
async fn competing_claims_in_single_block_position_wins() {
    let mut p = new_processor();
    advance(
        &mut p,
        13,
        vec![
            claim("a0a0", "foo", 10 * COIN, "Claim A"),
            claim("b1b1", "foo", 10 * COIN, "Claim B"),
        ],
    )
    .await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 10 * COIN, 13)),
        &[("Claim B", 10 * COIN, 10 * COIN, 13)],
        &[],
    )
    .await;
}

#[tokio::test]
async fn competing_claims_in_single_block_effective_amount_wins() {
    let mut p = new_processor();
    advance(
        &mut p,
        13,
        vec![
            claim("a0a0", "foo", 10 * COIN, "Claim A"),
            claim("b1b1", "foo", 11 * COIN, "Claim B"),
        ],
    )
    .await;
    assert_state(
        &p,
        "foo",
        Some(("Claim B", 11 * COIN, 11 * COIN, 13)),
        &[("Claim A", 10 * COIN, 10 * COIN, 13)],
        &[],
    )
    .await;
}

#[tokio::test]
async fn abandoning_controlling_claim_promotes_runner_up() {
    let mut p = new_processor();
    advance(
        &mut p,
        13,
        vec![
            claim("a0a0", "foo", 10 * COIN, "Claim A"),
            claim("b1b1", "foo", 11 * COIN, "Claim B"),
        ],
    )
    .await;
    let outcome = advance(&mut p, 14, vec![abandon("b1b1")]).await;
    assert_eq!(outcome.takeovers[0].claim_id.as_deref(), Some("a0a0"));
    assert_state(&p, "foo", Some(("Claim A", 10 * COIN, 10 * COIN, 13)), &[], &[]).await;
}

#[tokio::test]
async fn abandoning_controlling_claim_with_new_claim_in_same_block() {
    let mut p = new_processor();
    advance(
        &mut p,
        13,
        vec![
            claim("a0a0", "foo", 10 * COIN, "Claim A"),
            claim("b1b1", "foo", 11 * COIN, "Claim B"),
        ],
    )
    .await;
    advance(
        &mut p,
        15,
        vec![abandon("b1b1"), claim("c2c2", "foo", 12 * COIN, "Claim C")],
    )
    .await;
    assert_state(
        &p,
        "foo",
        Some(("Claim C", 12 * COIN, 12 * COIN, 15)),
        &[("Claim A", 10 * COIN, 10 * COIN, 13)],
        &[],
    )
    .await;
}

#[tokio::test]
async fn abandoning_last_claim_releases_the_name() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    let outcome = advance(&mut p, 14, vec![abandon("a0a0")]).await;
    assert_eq!(outcome.takeovers[0].claim_id, None);
    assert_state(&p, "foo", None, &[], &[]).await;

    // The name reverts to immediate activation for the next claimant.
    advance(&mut p, 2000, vec![claim("b1b1", "foo", 1 * COIN, "Claim B")]).await;
    assert_state(&p, "foo", Some(("Claim B", 1 * COIN, 1 * COIN, 2000)), &[], &[]).await;
}

#[tokio::test]
async fn support_withdrawal_can_cost_control() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    advance(
        &mut p,
        14,
        vec![
            claim("b1b1", "foo", 12 * COIN, "Claim B"),
            support("a0a0", "a-boost", 5 * COIN),
        ],
    )
    .await;
    // B is active (its delay is (14-13)/32 = 0) but A holds with 15.
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 15 * COIN, 13)),
        &[("Claim B", 12 * COIN, 12 * COIN, 14)],
        &[],
    )
    .await;

    advance(
        &mut p,
        15,
        vec![ClaimEvent::WithdrawSupport { outpoint: OutPoint::new("sup-a-boost", 0) }],
    )
    .await;
    assert_state(
        &p,
        "foo",
        Some(("Claim B", 12 * COIN, 12 * COIN, 14)),
        &[("Claim A", 10 * COIN, 10 * COIN, 13)],
        &[],
    )
    .await;
}

#[tokio::test]
async fn non_monotonic_advance_is_refused() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    let err = p
        .advance(BlockInput { height: 13, timestamp: 13, tip_height: 13, events: vec![] })
        .await
        .unwrap_err();
    assert!(matches!(err, TrieError::NonMonotonicHeight { height: 13, last: 13 }));
    assert!(err.is_fatal());
    assert_eq!(p.height().await.unwrap(), Some(13));
}

#[tokio::test]
async fn malformed_events_are_skipped_not_fatal() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    let outcome = advance(
        &mut p,
        14,
        vec![
            support("feed", "orphan", 5 * COIN),
            update("beef", 9 * COIN, "Ghost", "v2"),
            abandon("dead"),
            ClaimEvent::WithdrawSupport { outpoint: OutPoint::new("nope", 0) },
            support("a0a0", "ok", 2 * COIN),
        ],
    )
    .await;
    assert_eq!(outcome.skipped.len(), 4);
    let mut kinds: Vec<&str> = outcome.skipped.iter().map(|s| s.kind).collect();
    kinds.sort_unstable();
    assert_eq!(kinds, ["abandon", "support", "update", "withdraw-support"]);
    // The well-formed support still landed and the block committed.
    assert_state(&p, "foo", Some(("Claim A", 10 * COIN, 12 * COIN, 13)), &[], &[]).await;
}

#[tokio::test]
async fn duplicate_claim_id_is_skipped() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    let outcome = advance(&mut p, 14, vec![claim("a0a0", "foo", 99 * COIN, "Imposter")]).await;
    assert_eq!(outcome.skipped.len(), 1);
    assert_state(&p, "foo", Some(("Claim A", 10 * COIN, 10 * COIN, 13)), &[], &[]).await;
}

#[tokio::test]
async fn rewind_restores_previous_height() {
    let mut p = new_processor();
    advance(&mut p, 13, vec![claim("a0a0", "foo", 10 * COIN, "Claim A")]).await;
    advance(&mut p, 1001, vec![claim("b1b1", "foo", 50 * COIN, "Claim B")]).await;
    advance(&mut p, 1002, vec![support("a0a0", "boost", 5 * COIN)]).await;

    p.rewind_to(1001).await.unwrap();
    assert_eq!(p.height().await.unwrap(), Some(1001));
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 10 * COIN, 13)),
        &[],
        &[("Claim B", 50 * COIN, 0, 1031)],
    )
    .await;

    // Replaying the alternate branch works from the restored state.
    advance(&mut p, 1002, vec![support("a0a0", "alt", 100 * COIN)]).await;
    assert_state(
        &p,
        "foo",
        Some(("Claim A", 10 * COIN, 110 * COIN, 13)),
        &[],
        &[("Claim B", 50 * COIN, 0, 1031)],
    )
    .await;
}

#[tokio::test]
async fn rewind_past_retained_history_is_fatal() {
    let mut p = BlockProcessor::new(MemoryStore::with_snapshot_depth(2), TrieConfig::default());
    for height in 1..=5 {
        advance(&mut p, height, vec![]).await;
    }
    let err = p.rewind_to(1).await.unwrap_err();
    assert!(matches!(err, TrieError::RollbackUnavailable { height: 1, oldest: 4 }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn canonical_names_in_search_results() {
    let mut p = new_processor();
    advance(
        &mut p,
        13,
        vec![
            claim("abcd", "foo", 10 * COIN, "First"),
            claim("axyz", "foo", 5 * COIN, "Second"),
            claim("ffff", "bar", 1 * COIN, "Alone"),
        ],
    )
    .await;
    let hits = p
        .store()
        .search(&claimindex_core::SearchQuery::new().sort(claimindex_core::SortField::Height))
        .await
        .unwrap();
    let canonicals: Vec<&str> = hits.iter().map(|h| h.canonical.as_str()).collect();
    assert!(canonicals.contains(&"foo#ab"));
    assert!(canonicals.contains(&"foo#ax"));
    assert!(canonicals.contains(&"bar"));
}
