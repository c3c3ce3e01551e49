use crate::domain::account::Account;
use crate::domain::event::Event;
use crate::domain::registration::Registration;
use crate::domain::ticket::Ticket;
use crate::domain::ticket_type::TicketType;
use crate::notify::{InlineAttachment, OutboundEmail};
use anyhow::Result;
use qrcode::render::svg;
use qrcode::QrCode;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use uuid::Uuid;

const QR_CONTENT_TYPE: &str = "image/svg+xml";

pub fn content_id(ticket: &Ticket) -> String {
    format!("ticket-{}", ticket.code)
}

pub fn qr_svg(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(220, 220)
        .quiet_zone(true)
        .build();
    Ok(image.into_bytes())
}

/// Ticket delivery email: one inline QR per ticket, encoding its
/// redemption code.
pub fn render(
    event: &Event,
    account: &Account,
    registration: &Registration,
    tickets: &[Ticket],
    ticket_types: &[TicketType],
) -> Result<OutboundEmail> {
    let names: HashMap<Uuid, &str> = ticket_types
        .iter()
        .map(|t| (t.ticket_type_id, t.name.as_str()))
        .collect();

    let mut inline = BTreeMap::new();
    let mut cards = String::new();
    for ticket in tickets {
        let cid = content_id(ticket);
        inline.insert(
            cid.clone(),
            InlineAttachment {
                content_type: QR_CONTENT_TYPE.to_string(),
                bytes: qr_svg(&ticket.code)?,
            },
        );
        let type_name = names.get(&ticket.ticket_type_id).copied().unwrap_or("Ticket");
        write!(
            cards,
            r#"<div style="border:1px solid #ddd;border-radius:6px;padding:16px;margin:12px 0;">
<p style="margin:0 0 8px 0;"><strong>{}</strong></p>
<img src="cid:{}" alt="{}" width="220" height="220">
<p style="font-family:monospace;font-size:16px;letter-spacing:2px;">{}</p>
</div>
"#,
            escape(type_name),
            cid,
            ticket.code,
            ticket.code
        )?;
    }

    let when = event.starts_at.format("%Y-%m-%d %H:%M UTC");
    let location = event.location.as_deref().map(escape).unwrap_or_default();
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Your tickets</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
<div style="max-width: 600px; margin: 0 auto; padding: 20px;">
<h2>Your tickets for {event_name}</h2>
<p>Hi {customer},</p>
<p>Payment received for registration <code>{registration_id}</code> ({quantity} ticket(s), total {total}).</p>
<p>{when} {location}</p>
{cards}
<p style="color:#666;font-size:13px;">Show the QR code or read out the code at the entrance.</p>
</div>
</body>
</html>"#,
        event_name = escape(&event.name),
        customer = escape(&account.full_name),
        registration_id = registration.registration_id,
        quantity = tickets.len(),
        total = format_vnd(registration.total_price),
        when = when,
        location = location,
        cards = cards,
    );

    Ok(OutboundEmail {
        subject: format!("Your tickets for {}", event.name),
        to: account.email.clone(),
        html_body,
        inline,
    })
}

pub fn format_vnd(amount: i64) -> String {
    if amount == 0 {
        return "free".to_string();
    }
    let digits = amount.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if amount < 0 {
        out.insert(0, '-');
    }
    format!("{out} VND")
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vnd_uses_dot_grouping() {
        assert_eq!(format_vnd(0), "free");
        assert_eq!(format_vnd(500), "500 VND");
        assert_eq!(format_vnd(1_250_000), "1.250.000 VND");
    }

    #[test]
    fn markup_in_names_is_escaped() {
        assert_eq!(escape("<b>\"A&B\"</b>"), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
    }

    #[test]
    fn qr_is_an_svg_document() {
        let svg = String::from_utf8(qr_svg("ABCDEFGH2345").unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
