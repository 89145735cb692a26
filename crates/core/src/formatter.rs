#![allow(clippy::format_push_string)]

use crate::events::{ChangeEvent, ChangeKind};
use rust_decimal::Decimal;
use serde::Serialize;

const SUBJECT_PREFIX: &str = "Hyperliquid Alert";

/// A rendered alert, ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Renders change events into email alerts for one monitored account.
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    account: String,
}

impl NotificationFormatter {
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    #[must_use]
    pub fn subject(event: &ChangeEvent) -> String {
        format!(
            "{SUBJECT_PREFIX}: {} - {}",
            event.kind().label(),
            event.asset
        )
    }

    /// Renders one event as a standalone alert.
    #[must_use]
    pub fn format(&self, event: &ChangeEvent) -> Notification {
        let subject = Self::subject(event);

        let mut html = String::new();
        html.push_str("<div style=\"font-family: sans-serif; line-height: 1.6;\">\n");
        html.push_str(&format!(
            "<h2 style=\"color: #333;\">{}</h2>\n",
            escape_html(&subject)
        ));
        html.push_str(&self.html_intro());
        html.push_str(&html_details(event));
        html.push_str(HTML_FOOTER);
        html.push_str("</div>\n");

        let mut text = String::new();
        text.push_str(&subject);
        text.push_str("\n\n");
        text.push_str(&self.text_intro());
        text.push_str(&text_details(event));
        text.push_str(TEXT_FOOTER);

        Notification {
            subject,
            html_body: html,
            text_body: text,
        }
    }

    /// Renders all events into a single alert.
    ///
    /// Returns `None` for an empty slice. A single event renders exactly as
    /// [`NotificationFormatter::format`].
    #[must_use]
    pub fn format_batch(&self, events: &[ChangeEvent]) -> Option<Notification> {
        match events {
            [] => return None,
            [event] => return Some(self.format(event)),
            _ => {}
        }

        let assets: Vec<&str> = events.iter().map(|e| e.asset.as_str()).collect();
        let subject = format!(
            "{SUBJECT_PREFIX}: {} position changes ({})",
            events.len(),
            assets.join(", ")
        );

        let mut html = String::new();
        html.push_str("<div style=\"font-family: sans-serif; line-height: 1.6;\">\n");
        html.push_str(&format!(
            "<h2 style=\"color: #333;\">{}</h2>\n",
            escape_html(&subject)
        ));
        html.push_str(&self.html_intro());
        for event in events {
            html.push_str(&format!(
                "<h3>{}</h3>\n",
                escape_html(&format!("{} - {}", event.kind().label(), event.asset))
            ));
            html.push_str(&html_details(event));
        }
        html.push_str(HTML_FOOTER);
        html.push_str("</div>\n");

        let mut text = String::new();
        text.push_str(&subject);
        text.push_str("\n\n");
        text.push_str(&self.text_intro());
        for event in events {
            text.push_str(&format!("{} - {}\n", event.kind().label(), event.asset));
            text.push_str("───────────────────────────────────────────\n");
            text.push_str(&text_details(event));
            text.push('\n');
        }
        text.push_str(TEXT_FOOTER);

        Some(Notification {
            subject,
            html_body: html,
            text_body: text,
        })
    }

    fn html_intro(&self) -> String {
        format!(
            "<p>A position change was detected for address: <strong>{}</strong></p>\n<hr>\n",
            escape_html(&self.account)
        )
    }

    fn text_intro(&self) -> String {
        format!(
            "A position change was detected for address: {}\n\n",
            self.account
        )
    }
}

const HTML_FOOTER: &str = "<hr>\n<p style=\"font-size: 12px; color: #888;\">This is an automated notification from your position monitor.</p>\n";
const TEXT_FOOTER: &str = "This is an automated notification from your position monitor.\n";

/// Label/value rows shared by the HTML and text renderings.
fn detail_rows(event: &ChangeEvent) -> Vec<(&'static str, String)> {
    let position = event.position();
    let asset = &event.asset;
    let mut rows = vec![
        ("Action", event.kind().label().to_string()),
        ("Asset", asset.clone()),
        ("Direction", event.direction().to_string()),
    ];

    let size_label = if event.kind() == ChangeKind::Closed {
        "Closed Size"
    } else {
        "Current Size"
    };
    rows.push((size_label, format!("{:.4} {asset}", position.abs_size())));

    if let (Some(previous), Some(delta)) = (event.previous(), event.size_delta()) {
        rows.push(("Previous Size", format!("{:.4} {asset}", previous.abs_size())));
        rows.push(("Change", format!("{} {asset}", signed(delta))));
    }

    rows.push(("Entry Price", format!("${}", position.entry_price.normalize())));
    rows.push((
        "Liquidation Price",
        position
            .liquidation_price
            .map_or_else(|| "N/A".to_string(), |p| format!("${}", p.normalize())),
    ));
    rows.push(("Margin Used", format!("${:.2}", position.margin_used)));

    if let Some(pnl) = position.unrealized_pnl {
        rows.push(("Unrealized PnL", usd(pnl)));
    }
    if let Some(leverage) = position.leverage {
        rows.push(("Leverage", format!("{}x", leverage.normalize())));
    }
    rows.push((
        "Detected At",
        event.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ));

    rows
}

fn html_details(event: &ChangeEvent) -> String {
    let mut output = String::from("<ul style=\"list-style-type: none; padding: 0;\">\n");
    for (label, value) in detail_rows(event) {
        output.push_str(&format!(
            "  <li><strong>{label}:</strong> {}</li>\n",
            escape_html(&value)
        ));
    }
    output.push_str("</ul>\n");
    output
}

fn text_details(event: &ChangeEvent) -> String {
    let mut output = String::new();
    for (label, value) in detail_rows(event) {
        output.push_str(&format!("{:<19}{value}\n", format!("{label}:")));
    }
    output.push('\n');
    output
}

fn signed(value: Decimal) -> String {
    if value.is_sign_negative() {
        format!("{value:.4}")
    } else {
        format!("+{value:.4}")
    }
}

/// Dollar amount with the sign ahead of the currency symbol.
fn usd(value: Decimal) -> String {
    if value.is_sign_negative() && !value.is_zero() {
        format!("-${:.2}", value.abs())
    } else {
        format!("${:.2}", value.abs())
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
