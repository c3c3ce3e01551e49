use crate::domain::event::Event;
use crate::domain::registration::{LineItem, Registration, RegistrationItem};
use crate::domain::ticket_type::{TicketType, TicketTypeStatus};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// What an account already holds for an event, from its pending and paid
/// registrations.
#[derive(Debug, Clone, Default)]
pub struct AccountHistory {
    pub tickets_held: i32,
    pub ticket_types_held: HashSet<Uuid>,
}

impl AccountHistory {
    pub fn from_registrations(registrations: &[Registration]) -> Self {
        let mut history = Self::default();
        for reg in registrations {
            history.tickets_held += reg.total_quantity;
            history
                .ticket_types_held
                .extend(reg.items.iter().map(|i| i.ticket_type_id));
        }
        history
    }
}

/// Largest quantity a single line may ask for, after merging duplicates.
pub const MAX_QUANTITY_PER_LINE: i32 = 1_000;

/// Sum of the requested quantities, or None on i32 overflow.
pub fn total_quantity(items: &[LineItem]) -> Option<i32> {
    items.iter().try_fold(0i32, |acc, i| acc.checked_add(i.quantity))
}

/// Shape validation. Duplicate ticket types are merged by summing their
/// quantities; first-seen order is kept.
pub fn normalize(items: &[LineItem]) -> Result<Vec<LineItem>, Vec<String>> {
    if items.is_empty() {
        return Err(vec!["at least one ticket must be requested".to_string()]);
    }

    let mut reasons = Vec::new();
    let mut merged: Vec<LineItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            reasons.push(format!(
                "quantity for ticket type {} must be greater than 0",
                item.ticket_type_id
            ));
            continue;
        }
        match merged.iter_mut().find(|m| m.ticket_type_id == item.ticket_type_id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item.clone()),
        }
    }

    for item in &merged {
        if item.quantity > MAX_QUANTITY_PER_LINE {
            reasons.push(format!(
                "quantity for ticket type {} must be at most {MAX_QUANTITY_PER_LINE}",
                item.ticket_type_id
            ));
        }
    }
    if reasons.is_empty() && total_quantity(&merged).is_none() {
        reasons.push("total requested quantity is too large".to_string());
    }

    if reasons.is_empty() {
        Ok(merged)
    } else {
        Err(reasons)
    }
}

/// Business rules evaluated before any stock is touched. An empty result
/// means the request may proceed to the atomic reservation.
pub fn check(
    event: &Event,
    ticket_types: &[TicketType],
    items: &[LineItem],
    history: &AccountHistory,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut reasons = Vec::new();

    if !event.registration_open(now) {
        reasons.push(format!(
            "registration for this event closed at {}",
            event.registration_deadline().to_rfc3339()
        ));
    }

    let by_id: HashMap<Uuid, &TicketType> = ticket_types
        .iter()
        .filter(|t| t.event_id == event.event_id)
        .map(|t| (t.ticket_type_id, t))
        .collect();

    for item in items {
        let Some(tt) = by_id.get(&item.ticket_type_id) else {
            reasons.push(format!(
                "ticket type {} does not belong to this event",
                item.ticket_type_id
            ));
            continue;
        };

        if tt.status != TicketTypeStatus::Active {
            reasons.push(format!("ticket type {} is not on sale", tt.name));
        }

        if tt.is_free() {
            if item.quantity > 1 {
                reasons.push(format!("free ticket type {} is limited to one per account", tt.name));
            }
            if history.ticket_types_held.contains(&tt.ticket_type_id) {
                reasons.push(format!(
                    "free ticket type {} has already been claimed by this account",
                    tt.name
                ));
            }
        }
    }

    if let Some(max) = event.max_tickets_per_account {
        match total_quantity(items).and_then(|requested| {
            history.tickets_held.checked_add(requested).map(|total| (requested, total))
        }) {
            Some((_, total)) if total <= max => {}
            Some((requested, _)) => reasons.push(format!(
                "at most {max} tickets per account for this event ({} already held, {requested} requested)",
                history.tickets_held
            )),
            None => reasons.push(format!("at most {max} tickets per account for this event")),
        }
    }

    reasons
}

/// Why a line's conditional reservation matched no row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortfall {
    SoldOut(String),
    NotOnSale(String),
}

/// Explains a failed reservation from the ticket type row re-read in the
/// same transaction. A missing row means it was deleted meanwhile.
pub fn shortfall(ticket_type_id: Uuid, current: Option<&TicketType>, requested: i32) -> Shortfall {
    let Some(tt) = current else {
        return Shortfall::NotOnSale(format!("ticket type {ticket_type_id} is no longer on sale"));
    };
    if tt.status != TicketTypeStatus::Active {
        return Shortfall::NotOnSale(format!("ticket type {} is not on sale", tt.name));
    }
    match tt.remaining() {
        Some(left) => Shortfall::SoldOut(format!(
            "not enough tickets left for {} (requested {requested}, {left} left)",
            tt.name
        )),
        None => Shortfall::SoldOut(format!("not enough tickets left for {} (requested {requested})", tt.name)),
    }
}

/// Prices each line from the current ticket type. Callers run `check`
/// first, so every item has a matching ticket type.
pub fn price_items(ticket_types: &[TicketType], items: &[LineItem]) -> Vec<RegistrationItem> {
    items
        .iter()
        .filter_map(|item| {
            ticket_types
                .iter()
                .find(|t| t.ticket_type_id == item.ticket_type_id)
                .map(|t| RegistrationItem {
                    ticket_type_id: t.ticket_type_id,
                    ticket_type_name: t.name.clone(),
                    unit_price: t.price,
                    quantity: item.quantity,
                })
        })
        .collect()
}
