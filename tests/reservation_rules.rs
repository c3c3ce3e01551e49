use chrono::{Duration, Utc};
use event_ticketing::domain::event::Event;
use event_ticketing::domain::registration::{LineItem, Registration, RegistrationItem};
use event_ticketing::domain::ticket_type::{TicketType, TicketTypeStatus};
use event_ticketing::reservation::rules::{
    check, normalize, price_items, shortfall, AccountHistory, Shortfall, MAX_QUANTITY_PER_LINE,
};
use uuid::Uuid;

fn event(max_per_account: Option<i32>) -> Event {
    let now = Utc::now();
    Event {
        event_id: Uuid::new_v4(),
        name: "RustConf Hanoi".to_string(),
        location: Some("Hanoi".to_string()),
        starts_at: now + Duration::days(7),
        ends_at: now + Duration::days(7) + Duration::hours(8),
        max_tickets_per_account: max_per_account,
        participant_count: 0,
    }
}

fn ticket_type(event: &Event, name: &str, price: i64) -> TicketType {
    TicketType {
        ticket_type_id: Uuid::new_v4(),
        event_id: event.event_id,
        name: name.to_string(),
        price,
        capacity: Some(100),
        registered_count: 0,
        status: TicketTypeStatus::Active,
    }
}

fn line(tt: &TicketType, quantity: i32) -> LineItem {
    LineItem {
        ticket_type_id: tt.ticket_type_id,
        quantity,
    }
}

fn held(event: &Event, tt: &TicketType, quantity: i32) -> Registration {
    Registration::new_pending(
        event.event_id,
        Uuid::new_v4(),
        vec![RegistrationItem {
            ticket_type_id: tt.ticket_type_id,
            ticket_type_name: tt.name.clone(),
            unit_price: tt.price,
            quantity,
        }],
        Utc::now(),
    )
    .unwrap()
}

#[test]
fn empty_request_is_rejected() {
    assert!(normalize(&[]).is_err());
}

#[test]
fn non_positive_quantity_is_rejected() {
    let ev = event(None);
    let tt = ticket_type(&ev, "Standard", 100_000);
    let reasons = normalize(&[line(&tt, 0)]).unwrap_err();
    assert_eq!(reasons.len(), 1);
    assert!(normalize(&[line(&tt, -2)]).is_err());
}

#[test]
fn duplicate_lines_are_merged() {
    let ev = event(None);
    let a = ticket_type(&ev, "Standard", 100_000);
    let b = ticket_type(&ev, "VIP", 500_000);
    let merged = normalize(&[line(&a, 1), line(&b, 1), line(&a, 2)]).unwrap();
    assert_eq!(merged, vec![line(&a, 3), line(&b, 1)]);
}

#[test]
fn quantity_above_line_ceiling_is_rejected() {
    let ev = event(None);
    let a = ticket_type(&ev, "Standard", 100_000);
    let reasons = normalize(&[line(&a, MAX_QUANTITY_PER_LINE + 1)]).unwrap_err();
    assert_eq!(reasons.len(), 1);
    assert!(normalize(&[line(&a, MAX_QUANTITY_PER_LINE)]).is_ok());
    // merged duplicates count against the ceiling too
    assert!(normalize(&[line(&a, MAX_QUANTITY_PER_LINE), line(&a, 1)]).is_err());
}

#[test]
fn huge_quantities_across_ticket_types_are_a_validation_error() {
    let ev = event(Some(5));
    let a = ticket_type(&ev, "Standard", 100_000);
    let b = ticket_type(&ev, "VIP", 500_000);
    let items = [line(&a, 1_500_000_000), line(&b, 1_500_000_000)];

    let reasons = normalize(&items).unwrap_err();
    assert_eq!(reasons.len(), 2, "{reasons:?}");

    // check() stays total even when handed unnormalized input
    let reasons = check(&ev, &[a, b], &items, &AccountHistory::default(), Utc::now());
    assert!(reasons.iter().any(|r| r.contains("at most 5 tickets")), "{reasons:?}");
}

#[test]
fn valid_request_passes() {
    let ev = event(Some(5));
    let tt = ticket_type(&ev, "Standard", 100_000);
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 2)], &AccountHistory::default(), Utc::now());
    assert!(reasons.is_empty(), "{reasons:?}");
}

#[test]
fn closed_registration_window_is_rejected() {
    let mut ev = event(None);
    let now = Utc::now();
    ev.ends_at = now + Duration::minutes(30);
    let tt = ticket_type(&ev, "Standard", 100_000);
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 1)], &AccountHistory::default(), now);
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("closed"));
}

#[test]
fn ticket_type_of_another_event_is_rejected() {
    let ev = event(None);
    let other = event(None);
    let foreign = ticket_type(&other, "Standard", 100_000);
    let reasons = check(&ev, &[foreign.clone()], &[line(&foreign, 1)], &AccountHistory::default(), Utc::now());
    assert_eq!(reasons.len(), 1);
}

#[test]
fn unknown_ticket_type_is_rejected() {
    let ev = event(None);
    let item = LineItem {
        ticket_type_id: Uuid::new_v4(),
        quantity: 1,
    };
    let reasons = check(&ev, &[], &[item], &AccountHistory::default(), Utc::now());
    assert_eq!(reasons.len(), 1);
}

#[test]
fn inactive_ticket_type_is_rejected() {
    let ev = event(None);
    let mut tt = ticket_type(&ev, "Early bird", 80_000);
    tt.status = TicketTypeStatus::Inactive;
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 1)], &AccountHistory::default(), Utc::now());
    assert_eq!(reasons.len(), 1);
}

#[test]
fn free_ticket_limited_to_one() {
    let ev = event(None);
    let free = ticket_type(&ev, "Community", 0);
    let reasons = check(&ev, &[free.clone()], &[line(&free, 2)], &AccountHistory::default(), Utc::now());
    assert_eq!(reasons.len(), 1);
}

#[test]
fn free_ticket_cannot_be_claimed_twice() {
    let ev = event(None);
    let free = ticket_type(&ev, "Community", 0);
    let history = AccountHistory::from_registrations(&[held(&ev, &free, 1)]);
    let reasons = check(&ev, &[free.clone()], &[line(&free, 1)], &history, Utc::now());
    assert_eq!(reasons.len(), 1);
    assert!(reasons[0].contains("already been claimed"));
}

#[test]
fn per_account_maximum_counts_held_tickets() {
    let ev = event(Some(4));
    let tt = ticket_type(&ev, "Standard", 100_000);
    let history = AccountHistory::from_registrations(&[held(&ev, &tt, 3)]);
    assert_eq!(history.tickets_held, 3);

    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 2)], &history, Utc::now());
    assert_eq!(reasons.len(), 1);
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 1)], &history, Utc::now());
    assert!(reasons.is_empty());
}

#[test]
fn no_maximum_means_no_per_account_limit() {
    let ev = event(None);
    let tt = ticket_type(&ev, "Standard", 100_000);
    let history = AccountHistory::from_registrations(&[held(&ev, &tt, 50)]);
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 40)], &history, Utc::now());
    assert!(reasons.is_empty());
}

#[test]
fn all_violations_are_reported_together() {
    let mut ev = event(Some(1));
    let now = Utc::now();
    ev.ends_at = now + Duration::minutes(10);
    let mut tt = ticket_type(&ev, "Standard", 100_000);
    tt.status = TicketTypeStatus::Canceled;
    let reasons = check(&ev, &[tt.clone()], &[line(&tt, 2)], &AccountHistory::default(), now);
    assert_eq!(reasons.len(), 3, "{reasons:?}");
}

#[test]
fn prices_come_from_the_ticket_type() {
    let ev = event(None);
    let a = ticket_type(&ev, "Standard", 100_000);
    let b = ticket_type(&ev, "VIP", 450_000);
    let priced = price_items(&[a.clone(), b.clone()], &[line(&a, 2), line(&b, 1)]);
    let reg = Registration::new_pending(ev.event_id, Uuid::new_v4(), priced, Utc::now()).unwrap();
    assert_eq!(reg.total_quantity, 3);
    assert_eq!(reg.total_price, 650_000);
    assert_eq!(reg.items[1].ticket_type_name, "VIP");
}

#[test]
fn failed_reservation_is_explained_from_the_current_row() {
    let ev = event(None);
    let mut tt = ticket_type(&ev, "Standard", 100_000);
    tt.capacity = Some(10);
    tt.registered_count = 9;
    match shortfall(tt.ticket_type_id, Some(&tt), 2) {
        Shortfall::SoldOut(reason) => assert!(reason.contains("1 left"), "{reason}"),
        other => panic!("expected sold out, got {other:?}"),
    }

    tt.status = TicketTypeStatus::Canceled;
    assert!(matches!(shortfall(tt.ticket_type_id, Some(&tt), 2), Shortfall::NotOnSale(_)));
    assert!(matches!(shortfall(tt.ticket_type_id, None, 2), Shortfall::NotOnSale(_)));
}
