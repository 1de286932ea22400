use chrono::{DateTime, Duration, TimeZone, Utc};
use guild_dkp_service::auction::{AuctionStatus, BidOutcome, NewAuction, SettlementOutcome};
use guild_dkp_service::clock::{Clock, ManualClock};
use guild_dkp_service::economy::Economy;
use guild_dkp_service::error::EconomyError;
use guild_dkp_service::events::{EventStatus, NewEvent, ParticipationStatus};
use guild_dkp_service::guild::{GuildRecord, MemoryGuildDirectory};
use guild_dkp_service::ledger::{DkpLedger, MemoryLedger};
use std::sync::Arc;

const GUILD: i64 = 1;
const OWNER: i64 = 10;
const ALICE: i64 = 11;
const BOB: i64 = 12;
const CAROL: i64 = 13;
const OUTSIDER: i64 = 99;

struct Harness {
    clock: Arc<ManualClock>,
    ledger: Arc<MemoryLedger>,
    economy: Economy,
}

/// Fixed start time for every scenario
fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 20, 0, 0).unwrap()
}

fn setup() -> Harness {
    let clock = Arc::new(ManualClock::new(t0() - Duration::days(1)));
    let ledger = Arc::new(MemoryLedger::new(clock.clone()));
    let directory = Arc::new(MemoryGuildDirectory::from_records([GuildRecord {
        guild_id: GUILD,
        owner_id: OWNER,
        members: vec![ALICE, BOB, CAROL],
    }]));
    let economy = Economy::new(clock.clone(), ledger.clone(), directory);
    Harness {
        clock,
        ledger,
        economy,
    }
}

fn raid(code: Option<&str>) -> NewEvent {
    NewEvent {
        name: "Molten Core".to_string(),
        description: Some("Weekly clear".to_string()),
        start_time: t0(),
        end_time: t0() + Duration::hours(3),
        dkp_reward: 10,
        access_code: code.map(str::to_string),
    }
}

fn lot(starting_price: i64, buyout_price: Option<i64>) -> NewAuction {
    NewAuction {
        item_name: "Thunderfury".to_string(),
        description: None,
        starting_price,
        buyout_price,
        start_time: t0(),
        end_time: t0() + Duration::hours(2),
    }
}

async fn confirmed(h: &Harness, event_id: i64, member: i64) {
    h.economy.participation.signup(event_id, member).await.unwrap();
    h.economy.participation.confirm(event_id, member).await.unwrap();
}

// region:    --- Events

/// Window and code checks in the order a member would hit them
#[tokio::test]
async fn test_attendance_validation_scenario() {
    let h = setup();
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    confirmed(&h, event.id, ALICE).await;
    let validator = &h.economy.attendance;

    h.clock.set(t0() - Duration::minutes(1));
    assert_eq!(
        validator.validate(event.id, ALICE, "ABC123").await,
        Err(EconomyError::OutOfWindow)
    );

    h.clock.set(t0() + Duration::hours(1));
    assert_eq!(
        validator.validate(event.id, ALICE, "WRONG1").await,
        Err(EconomyError::InvalidCode)
    );

    // finished by status, still inside the grace period
    h.clock.set(t0() + Duration::hours(3) + Duration::minutes(20));
    assert_eq!(h.economy.events.status(&event), EventStatus::Finished);
    let receipt = validator.validate(event.id, ALICE, " abc123 ").await.unwrap();
    assert_eq!(receipt.dkp_earned, 10);
    assert_eq!(receipt.total_dkp, 10);

    assert_eq!(
        validator.validate(event.id, ALICE, "ABC123").await,
        Err(EconomyError::AlreadyValidated)
    );
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 10);

    let participation = h
        .economy
        .participation
        .get(event.id, ALICE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(participation.status, ParticipationStatus::Attended);
    assert_eq!(participation.dkp_earned, 10);
    assert_eq!(participation.attended_at, Some(h.clock.now()));
}

#[tokio::test]
async fn test_validation_closes_after_grace_period() {
    let h = setup();
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    confirmed(&h, event.id, ALICE).await;

    h.clock
        .set(t0() + Duration::hours(3) + Duration::minutes(30) + Duration::seconds(1));
    assert_eq!(
        h.economy.attendance.validate(event.id, ALICE, "ABC123").await,
        Err(EconomyError::OutOfWindow)
    );
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 0);
}

/// Two simultaneous validations credit exactly once
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_validation_credits_once() {
    let h = Arc::new(setup());
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    confirmed(&h, event.id, ALICE).await;
    h.clock.set(t0() + Duration::hours(1));

    let event_id = event.id;
    let mut handles = vec![];
    for _ in 0..8 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.economy.attendance.validate(event_id, ALICE, "ABC123").await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, EconomyError::AlreadyValidated),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 10);
    assert_eq!(h.ledger.history(ALICE).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_participation_only_moves_forward() {
    let h = setup();
    let event = h.economy.events.create(OWNER, GUILD, raid(None)).await.unwrap();
    let participation = &h.economy.participation;
    h.clock.set(t0() + Duration::minutes(10));

    // validate without any record
    assert_eq!(
        h.economy.attendance.validate(event.id, ALICE, &event.access_code).await,
        Err(EconomyError::WrongState)
    );
    assert_eq!(
        participation.confirm(event.id, ALICE).await,
        Err(EconomyError::NotSignedUp)
    );

    let signed_up = participation.signup(event.id, ALICE).await.unwrap();
    assert_eq!(signed_up.status, ParticipationStatus::Interested);
    assert_eq!(
        participation.signup(event.id, ALICE).await,
        Err(EconomyError::AlreadyParticipating)
    );

    // validate skipping confirm
    assert_eq!(
        h.economy.attendance.validate(event.id, ALICE, &event.access_code).await,
        Err(EconomyError::WrongState)
    );

    participation.confirm(event.id, ALICE).await.unwrap();
    assert_eq!(
        participation.confirm(event.id, ALICE).await,
        Err(EconomyError::AlreadyConfirmedOrAttended)
    );

    h.economy
        .attendance
        .validate(event.id, ALICE, &event.access_code)
        .await
        .unwrap();
    assert_eq!(
        participation.confirm(event.id, ALICE).await,
        Err(EconomyError::AlreadyConfirmedOrAttended)
    );
    assert_eq!(
        participation.signup(event.id, ALICE).await,
        Err(EconomyError::AlreadyParticipating)
    );
    let record = participation.get(event.id, ALICE).await.unwrap().unwrap();
    assert_eq!(record.status, ParticipationStatus::Attended);
}

#[tokio::test]
async fn test_outsiders_cannot_take_part() {
    let h = setup();
    let event = h.economy.events.create(OWNER, GUILD, raid(None)).await.unwrap();

    assert_eq!(
        h.economy.participation.signup(event.id, OUTSIDER).await,
        Err(EconomyError::NotMember)
    );
    h.clock.set(t0() + Duration::minutes(10));
    assert_eq!(
        h.economy
            .attendance
            .validate(event.id, OUTSIDER, &event.access_code)
            .await,
        Err(EconomyError::NotMember)
    );
}

#[tokio::test]
async fn test_event_creation_rules() {
    let h = setup();
    let registry = &h.economy.events;

    assert_eq!(
        registry.create(ALICE, GUILD, raid(None)).await.unwrap_err(),
        EconomyError::NotOwner
    );
    assert_eq!(
        registry.create(OWNER, 2, raid(None)).await.unwrap_err(),
        EconomyError::GuildNotFound(2)
    );

    let mut backwards = raid(None);
    backwards.end_time = backwards.start_time;
    assert_eq!(
        registry.create(OWNER, GUILD, backwards).await.unwrap_err(),
        EconomyError::InvalidRange
    );

    let mut unnamed = raid(None);
    unnamed.name = "   ".to_string();
    assert!(matches!(
        registry.create(OWNER, GUILD, unnamed).await,
        Err(EconomyError::InvalidField { field: "name", .. })
    ));

    let mut free = raid(None);
    free.dkp_reward = 0;
    assert!(matches!(
        registry.create(OWNER, GUILD, free).await,
        Err(EconomyError::InvalidField { field: "dkp_reward", .. })
    ));

    assert!(matches!(
        registry.create(OWNER, GUILD, raid(Some("A!"))).await,
        Err(EconomyError::InvalidField { field: "access_code", .. })
    ));

    let generated = registry.create(OWNER, GUILD, raid(None)).await.unwrap();
    assert_eq!(generated.access_code.len(), 6);
    assert!(generated
        .access_code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    let supplied = registry.create(OWNER, GUILD, raid(Some(" raid42 "))).await.unwrap();
    assert_eq!(supplied.access_code, "RAID42");
}

#[tokio::test]
async fn test_event_summary_counts_and_code_visibility() {
    let h = setup();
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    h.economy.participation.signup(event.id, ALICE).await.unwrap();
    confirmed(&h, event.id, BOB).await;
    confirmed(&h, event.id, CAROL).await;
    h.clock.set(t0() + Duration::minutes(5));
    h.economy
        .attendance
        .validate(event.id, CAROL, "ABC123")
        .await
        .unwrap();

    let as_member = h.economy.events.summary(event.id, BOB).await.unwrap();
    assert_eq!(as_member.status, EventStatus::Ongoing);
    assert_eq!(as_member.participant_count, 3);
    assert_eq!(as_member.confirmed_count, 1);
    assert_eq!(as_member.attended_count, 1);
    assert_eq!(
        as_member.user_participation.map(|p| p.status),
        Some(ParticipationStatus::Confirmed)
    );
    assert_eq!(as_member.access_code, None);

    let as_owner = h.economy.events.summary(event.id, OWNER).await.unwrap();
    assert_eq!(as_owner.access_code.as_deref(), Some("ABC123"));
    assert!(as_owner.user_participation.is_none());

    let listed = h.economy.events.list(GUILD, CAROL).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_participation.as_ref().unwrap().dkp_earned, 10);
}

#[tokio::test]
async fn test_delete_event_cascades() {
    let h = setup();
    let event = h.economy.events.create(OWNER, GUILD, raid(None)).await.unwrap();
    confirmed(&h, event.id, ALICE).await;

    assert_eq!(
        h.economy.events.delete(event.id, ALICE).await,
        Err(EconomyError::NotOwner)
    );
    h.economy.events.delete(event.id, OWNER).await.unwrap();

    assert!(matches!(
        h.economy.events.get(event.id),
        Err(EconomyError::EventNotFound(_))
    ));
    assert!(matches!(
        h.economy.participation.get(event.id, ALICE).await,
        Err(EconomyError::EventNotFound(_))
    ));
    assert!(matches!(
        h.economy.participation.signup(event.id, BOB).await,
        Err(EconomyError::EventNotFound(_))
    ));
}

/// A ledger outage is not a shortfall, and leaves the record retryable
#[tokio::test]
async fn test_ledger_outage_during_validation() {
    let h = setup();
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    confirmed(&h, event.id, ALICE).await;
    h.clock.set(t0() + Duration::hours(1));

    h.ledger.set_available(false);
    assert!(matches!(
        h.economy.attendance.validate(event.id, ALICE, "ABC123").await,
        Err(EconomyError::LedgerUnavailable(_))
    ));
    let record = h
        .economy
        .participation
        .get(event.id, ALICE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ParticipationStatus::Confirmed);

    h.ledger.set_available(true);
    let receipt = h
        .economy
        .attendance
        .validate(event.id, ALICE, "ABC123")
        .await
        .unwrap();
    assert_eq!(receipt.total_dkp, 10);
}

/// A credit that would overflow the balance is a validation error
#[tokio::test]
async fn test_reward_that_overflows_balance_is_rejected() {
    let h = setup();
    h.ledger.credit(ALICE, i64::MAX - 5, "seed").await.unwrap();
    let event = h
        .economy
        .events
        .create(OWNER, GUILD, raid(Some("ABC123")))
        .await
        .unwrap();
    confirmed(&h, event.id, ALICE).await;
    h.clock.set(t0() + Duration::hours(1));

    let err = h
        .economy
        .attendance
        .validate(event.id, ALICE, "ABC123")
        .await
        .unwrap_err();
    assert!(matches!(err, EconomyError::InvalidField { field: "amount", .. }));
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), i64::MAX - 5);
    let record = h
        .economy
        .participation
        .get(event.id, ALICE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ParticipationStatus::Confirmed);

    let mut huge = raid(None);
    huge.dkp_reward = i64::MAX;
    assert!(matches!(
        h.economy.events.create(OWNER, GUILD, huge).await,
        Err(EconomyError::InvalidField { field: "dkp_reward", .. })
    ));
}

// endregion: --- Events

// region:    --- Auctions

/// Bid, buyout and the bids after it
#[tokio::test]
async fn test_bid_and_buyout_scenario() {
    let h = setup();
    h.ledger.credit(ALICE, 300, "seed").await.unwrap();
    h.ledger.credit(BOB, 600, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, Some(500)))
        .await
        .unwrap();
    assert_eq!(auction.current_bid, 100);
    h.clock.set(t0() + Duration::minutes(1));
    let bids = &h.economy.bids;

    assert_eq!(
        bids.place_bid(auction.id, ALICE, 100).await,
        Err(EconomyError::BidTooLow {
            current_bid: 100,
            minimum_bid: 101
        })
    );
    assert_eq!(
        bids.place_bid(auction.id, ALICE, 150).await,
        Ok(BidOutcome::Accepted {
            current_bid: 150,
            minimum_next_bid: 151
        })
    );
    assert!(matches!(
        bids.place_bid(auction.id, BOB, 140).await,
        Err(EconomyError::BidTooLow { current_bid: 150, .. })
    ));

    let receipt = h.economy.buyouts.buyout(auction.id, BOB).await.unwrap();
    assert_eq!(receipt.final_price, 500);
    assert_eq!(receipt.total_dkp, 100);

    let ended = h.economy.auctions.get(auction.id).await.unwrap();
    assert_eq!(h.economy.auctions.status(&ended), AuctionStatus::Ended);
    assert_eq!(ended.current_winner_id, Some(BOB));
    assert_eq!(ended.current_bid, 500);

    assert_eq!(
        bids.place_bid(auction.id, ALICE, 200).await,
        Err(EconomyError::NotActive)
    );
    assert_eq!(
        h.economy.buyouts.buyout(auction.id, ALICE).await,
        Err(EconomyError::NotActive)
    );

    // the bid that lost was never debited
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 300);

    // closing later must not charge the buyer twice
    h.clock.set(t0() + Duration::hours(3));
    assert_eq!(h.economy.auctions.settle_due().await, 0);
    assert_eq!(h.ledger.balance(BOB).await.unwrap(), 100);

    let history = h.economy.auctions.bids(auction.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].buyout);
}

#[tokio::test]
async fn test_bid_rules_before_and_after_window() {
    let h = setup();
    h.ledger.credit(ALICE, 1_000, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();

    // upcoming
    assert_eq!(
        h.economy.bids.place_bid(auction.id, ALICE, 150).await,
        Err(EconomyError::NotActive)
    );
    assert_eq!(
        h.economy.buyouts.buyout(auction.id, ALICE).await,
        Err(EconomyError::NoBuyoutOption)
    );

    h.clock.set(t0() + Duration::hours(2));
    assert_eq!(
        h.economy.bids.place_bid(auction.id, ALICE, 150).await,
        Err(EconomyError::NotActive)
    );
    assert_eq!(
        h.economy.bids.place_bid(auction.id, OUTSIDER, 150).await,
        Err(EconomyError::NotMember)
    );
    assert!(matches!(
        h.economy.bids.place_bid(404, ALICE, 150).await,
        Err(EconomyError::AuctionNotFound(404))
    ));
}

#[tokio::test]
async fn test_bid_checks_balance_without_debiting() {
    let h = setup();
    h.ledger.credit(ALICE, 120, "seed").await.unwrap();
    let first = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    let second = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));

    assert_eq!(
        h.economy.bids.place_bid(first.id, ALICE, 121).await,
        Err(EconomyError::InsufficientFunds { required: 121 })
    );
    // the same balance backs open bids on two auctions
    h.economy.bids.place_bid(first.id, ALICE, 110).await.unwrap();
    h.economy.bids.place_bid(second.id, ALICE, 115).await.unwrap();
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 120);

    h.ledger.set_available(false);
    assert!(matches!(
        h.economy.bids.place_bid(first.id, ALICE, 111).await,
        Err(EconomyError::LedgerUnavailable(_))
    ));
}

#[tokio::test]
async fn test_bid_reaching_buyout_price_buys_out() {
    let h = setup();
    h.ledger.credit(CAROL, 1_000, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, Some(500)))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));

    let outcome = h.economy.bids.place_bid(auction.id, CAROL, 650).await.unwrap();
    match outcome {
        BidOutcome::BoughtOut(receipt) => {
            assert_eq!(receipt.final_price, 500);
            assert_eq!(receipt.total_dkp, 500);
        }
        other => panic!("expected buyout, got {:?}", other),
    }
    let auction = h.economy.auctions.get(auction.id).await.unwrap();
    assert_eq!(auction.current_bid, 500);
    assert_eq!(auction.current_winner_id, Some(CAROL));
}

/// Two bids racing on the same auction are applied one at a time
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bids_are_totally_ordered() {
    let h = Arc::new(setup());
    h.ledger.credit(ALICE, 1_000, "seed").await.unwrap();
    h.ledger.credit(BOB, 1_000, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    h.ledger.credit(CAROL, 150, "seed").await.unwrap();
    h.clock.set(t0() + Duration::minutes(1));
    h.economy.bids.place_bid(auction.id, CAROL, 150).await.unwrap();

    let (a, b) = {
        let (ha, hb) = (Arc::clone(&h), Arc::clone(&h));
        let id = auction.id;
        tokio::join!(
            tokio::spawn(async move { ha.economy.bids.place_bid(id, ALICE, 200).await }),
            tokio::spawn(async move { hb.economy.bids.place_bid(id, BOB, 210).await }),
        )
    };
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(b.is_ok(), "the higher bid always lands");
    if let Err(e) = a {
        assert!(matches!(e, EconomyError::BidTooLow { current_bid: 210, .. }));
    }

    let state = h.economy.auctions.get(auction.id).await.unwrap();
    assert_eq!(state.current_bid, 210);
    assert_eq!(state.current_winner_id, Some(BOB));

    let amounts: Vec<i64> = h
        .economy
        .auctions
        .bids(auction.id)
        .await
        .unwrap()
        .iter()
        .map(|bid| bid.amount)
        .collect();
    assert!(amounts.windows(2).all(|w| w[0] < w[1]), "{:?}", amounts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bid_storm_keeps_history_strictly_increasing() {
    let h = Arc::new(setup());
    for member in [ALICE, BOB, CAROL] {
        h.ledger.credit(member, 100_000, "seed").await.unwrap();
    }
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(1_000, Some(60_000)))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));

    let auction_id = auction.id;
    let mut handles = vec![];
    for i in 1..=50 {
        let h = Arc::clone(&h);
        let member = [ALICE, BOB, CAROL][i % 3];
        handles.push(tokio::spawn(async move {
            h.economy.bids.place_bid(auction_id, member, 1_000 + i as i64 * 1_000).await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(EconomyError::BidTooLow { .. }) => {}
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }

    let state = h.economy.auctions.get(auction.id).await.unwrap();
    assert_eq!(state.current_bid, 51_000);
    assert!(state.current_bid >= state.starting_price);
    assert!(state.current_bid < state.buyout_price.unwrap());

    let history = h.economy.auctions.bids(auction.id).await.unwrap();
    assert!(history.windows(2).all(|w| w[0].amount < w[1].amount));
    assert_eq!(history.last().map(|bid| bid.amount), Some(51_000));
}

#[tokio::test]
async fn test_settlement_debits_winner_once() {
    let h = setup();
    h.ledger.credit(ALICE, 400, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    let unsold = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));
    h.economy.bids.place_bid(auction.id, ALICE, 250).await.unwrap();

    h.clock.set(t0() + Duration::hours(2));
    let summary = h.economy.auctions.summary(auction.id, ALICE).await.unwrap();
    assert_eq!(summary.status, AuctionStatus::Ended);
    assert_eq!(summary.winner, Some(ALICE));
    assert_eq!(summary.final_price, Some(250));
    assert_eq!(summary.settlement, Some(SettlementOutcome::Paid));

    // sweep closes the unsold one, the sold one is already closed
    assert_eq!(h.economy.auctions.settle_due().await, 1);
    assert_eq!(h.economy.auctions.settle_due().await, 0);
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 150);

    let unsold = h.economy.auctions.summary(unsold.id, ALICE).await.unwrap();
    assert_eq!(unsold.settlement, Some(SettlementOutcome::NoWinner));
    assert_eq!(unsold.winner, None);
}

/// The winner spent the points elsewhere before close: no negative balance
#[tokio::test]
async fn test_settlement_defaults_when_winner_cannot_pay() {
    let h = setup();
    h.ledger.credit(ALICE, 300, "seed").await.unwrap();
    let slow = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    let fast = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, Some(250)))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));
    h.economy.bids.place_bid(slow.id, ALICE, 200).await.unwrap();
    h.economy.buyouts.buyout(fast.id, ALICE).await.unwrap();

    h.ledger.set_available(false);
    h.clock.set(t0() + Duration::hours(2));
    assert_eq!(h.economy.auctions.settle_due().await, 0);
    h.ledger.set_available(true);

    assert_eq!(h.economy.auctions.settle_due().await, 1);
    let summary = h.economy.auctions.summary(slow.id, ALICE).await.unwrap();
    assert_eq!(summary.settlement, Some(SettlementOutcome::Defaulted));
    assert_eq!(summary.status, AuctionStatus::Ended);
    assert_eq!(summary.winner, None);
    assert_eq!(summary.final_price, None);
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 50);
}

#[tokio::test]
async fn test_cancel_rules() {
    let h = setup();
    h.ledger.credit(ALICE, 500, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));
    h.economy.bids.place_bid(auction.id, ALICE, 300).await.unwrap();

    assert_eq!(
        h.economy.auctions.cancel(auction.id, ALICE).await.unwrap_err(),
        EconomyError::NotOwner
    );
    let cancelled = h.economy.auctions.cancel(auction.id, OWNER).await.unwrap();
    assert_eq!(h.economy.auctions.status(&cancelled), AuctionStatus::Cancelled);
    assert_eq!(
        h.economy.auctions.cancel(auction.id, OWNER).await.unwrap_err(),
        EconomyError::AlreadyCancelled
    );
    assert_eq!(
        h.economy.bids.place_bid(auction.id, ALICE, 400).await,
        Err(EconomyError::NotActive)
    );

    // still cancelled after its end time, and nobody is charged
    h.clock.set(t0() + Duration::hours(3));
    assert_eq!(h.economy.auctions.settle_due().await, 0);
    assert_eq!(h.ledger.balance(ALICE).await.unwrap(), 500);

    let ended = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    assert_eq!(
        h.economy.auctions.cancel(ended.id, OWNER).await.unwrap_err(),
        EconomyError::AlreadyEnded
    );
}

#[tokio::test]
async fn test_auction_creation_rules() {
    let h = setup();
    let auctions = &h.economy.auctions;

    assert_eq!(
        auctions.create(BOB, GUILD, lot(100, None)).await.unwrap_err(),
        EconomyError::NotOwner
    );
    assert!(matches!(
        auctions.create(OWNER, GUILD, lot(0, None)).await,
        Err(EconomyError::InvalidPrices(_))
    ));
    assert!(matches!(
        auctions.create(OWNER, GUILD, lot(100, Some(100))).await,
        Err(EconomyError::InvalidPrices(_))
    ));
    let mut backwards = lot(100, None);
    backwards.end_time = backwards.start_time - Duration::minutes(1);
    assert_eq!(
        auctions.create(OWNER, GUILD, backwards).await.unwrap_err(),
        EconomyError::InvalidRange
    );
}

#[tokio::test]
async fn test_out_of_range_amounts_are_rejected() {
    let h = setup();
    assert!(matches!(
        h.economy.auctions.create(OWNER, GUILD, lot(i64::MAX, None)).await,
        Err(EconomyError::InvalidPrices(_))
    ));
    assert!(matches!(
        h.economy.auctions.create(OWNER, GUILD, lot(100, Some(i64::MAX))).await,
        Err(EconomyError::InvalidPrices(_))
    ));

    h.ledger.credit(ALICE, i64::MAX, "seed").await.unwrap();
    let auction = h
        .economy
        .auctions
        .create(OWNER, GUILD, lot(100, None))
        .await
        .unwrap();
    h.clock.set(t0() + Duration::minutes(1));
    assert!(matches!(
        h.economy.bids.place_bid(auction.id, ALICE, i64::MAX).await,
        Err(EconomyError::InvalidField { field: "bid_amount", .. })
    ));
    let summary = h.economy.auctions.summary(auction.id, ALICE).await.unwrap();
    assert_eq!(summary.current_bid, 100);
    assert_eq!(summary.minimum_bid, 101);
}

// endregion: --- Auctions
