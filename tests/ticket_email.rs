use chrono::{TimeZone, Utc};
use event_ticketing::domain::account::Account;
use event_ticketing::domain::event::Event;
use event_ticketing::domain::registration::{Registration, RegistrationItem};
use event_ticketing::domain::ticket::{issue_for, redemption_code};
use event_ticketing::domain::ticket_type::{TicketType, TicketTypeStatus};
use event_ticketing::notify::smtp::build_message;
use event_ticketing::notify::ticket_email::{content_id, render};
use uuid::Uuid;

fn fixture() -> (Event, Account, Registration, Vec<TicketType>) {
    let event = Event {
        event_id: Uuid::new_v4(),
        name: "Saigon <Rust> Day".to_string(),
        location: Some("District 1".to_string()),
        starts_at: Utc.with_ymd_and_hms(2026, 12, 5, 2, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2026, 12, 5, 10, 0, 0).unwrap(),
        max_tickets_per_account: Some(4),
        participant_count: 2,
    };
    let account = Account {
        account_id: Uuid::new_v4(),
        email: "lan@example.com".to_string(),
        full_name: "Lan Nguyen".to_string(),
        phone: None,
    };
    let tt = TicketType {
        ticket_type_id: Uuid::new_v4(),
        event_id: event.event_id,
        name: "Standard".to_string(),
        price: 200_000,
        capacity: Some(50),
        registered_count: 2,
        status: TicketTypeStatus::Active,
    };
    let registration = Registration::new_pending(
        event.event_id,
        account.account_id,
        vec![RegistrationItem {
            ticket_type_id: tt.ticket_type_id,
            ticket_type_name: tt.name.clone(),
            unit_price: tt.price,
            quantity: 2,
        }],
        Utc::now(),
    )
    .unwrap();
    (event, account, registration, vec![tt])
}

#[test]
fn one_ticket_per_unit_with_distinct_codes() {
    let (_, _, registration, _) = fixture();
    let tickets = issue_for(&registration, Utc::now());
    assert_eq!(tickets.len(), 2);
    assert_ne!(tickets[0].code, tickets[1].code);
    assert!(tickets.iter().all(|t| t.registration_id == registration.registration_id));
}

#[test]
fn redemption_codes_avoid_ambiguous_characters() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let code = redemption_code(&mut rng);
        assert_eq!(code.len(), 12);
        assert!(!code.chars().any(|c| "0O1I".contains(c)));
    }
}

#[test]
fn email_embeds_one_qr_per_ticket() {
    let (event, account, registration, types) = fixture();
    let tickets = issue_for(&registration, Utc::now());
    let email = render(&event, &account, &registration, &tickets, &types).unwrap();

    assert_eq!(email.to, "lan@example.com");
    assert_eq!(email.inline.len(), 2);
    for ticket in &tickets {
        let cid = content_id(ticket);
        assert!(email.html_body.contains(&format!("cid:{cid}")));
        assert!(email.html_body.contains(&ticket.code));
        assert_eq!(email.inline[&cid].content_type, "image/svg+xml");
    }
    assert!(email.html_body.contains("Saigon &lt;Rust&gt; Day"));
    assert!(email.html_body.contains("400.000 VND"));
}

#[test]
fn smtp_message_builds_with_inline_parts() {
    let (event, account, registration, types) = fixture();
    let tickets = issue_for(&registration, Utc::now());
    let email = render(&event, &account, &registration, &tickets, &types).unwrap();
    let message = build_message("Tickets <no-reply@example.com>", email).unwrap();
    let raw = String::from_utf8(message.formatted()).unwrap();
    assert!(raw.contains("multipart/related"));
    assert!(raw.contains(&format!("<{}>", content_id(&tickets[0]))));
}
