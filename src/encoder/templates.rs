//! # Print Templates
//!
//! Multi-part layouts built from the [`Composer`]: receipts, shopping lists
//! and the start-up banner.

use serde::{Deserialize, Serialize};

use super::EncodingError;
use super::layout::{self, Composer};
use crate::protocol::text::{Alignment, TextSize, TextStyle};

/// One priced line on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub price: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptParams {
    pub business_name: String,
    pub items: Vec<ReceiptItem>,
    pub total: Option<String>,
    /// Printed under the header; filled in with the current time when empty
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShoppingListParams {
    /// Items separated by commas or newlines
    pub items: String,
    pub date: Option<String>,
}

impl ShoppingListParams {
    /// Individual items, trimmed, blanks dropped.
    pub fn entries(&self) -> Vec<&str> {
        self.items
            .split([',', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn heading() -> TextStyle {
    TextStyle::new()
        .alignment(Alignment::Center)
        .size(TextSize::Large)
        .bold(true)
}

/// Business name, date, item lines, total, thank-you.
pub fn receipt(p: &ReceiptParams, width: usize) -> Result<(Vec<u8>, u32), EncodingError> {
    let name = match p.business_name.trim() {
        "" => "Receipt",
        name => name,
    };

    // Lay out every fixed-width line first so an overflow produces nothing
    let items = p
        .items
        .iter()
        .map(|item| layout::padded_line(&item.name, &item.price, width, '.'))
        .collect::<Result<Vec<_>, _>>()?;
    let total = p
        .total
        .as_deref()
        .map(|total| layout::padded_line("TOTAL:", total, width, '.'))
        .transpose()?;

    let mut c = Composer::new();
    c.style(heading());
    c.wrapped(name, TextSize::Large.columns(width));
    c.reset().feed(2);

    if let Some(date) = &p.date {
        c.line(&format!("Date: {date}"));
    }
    c.line(&layout::divider('-', width));
    for line in &items {
        c.line(line);
    }
    if let Some(total) = total {
        if !items.is_empty() {
            c.line(&layout::divider('-', width));
        }
        c.style(TextStyle::new().bold(true));
        c.line(&total);
        c.reset();
    }
    c.feed(3);
    c.style(TextStyle::new().alignment(Alignment::Center));
    c.line("Thank you!");
    c.feed(4);
    Ok(c.finish())
}

/// Numbered check-box list between `=` rules.
pub fn shopping_list(p: &ShoppingListParams, width: usize) -> Result<(Vec<u8>, u32), EncodingError> {
    let entries = p.entries();
    if entries.is_empty() {
        return Err(EncodingError::InvalidParameter("shopping list is empty".into()));
    }

    let mut c = Composer::new();
    c.style(heading());
    c.line("SHOPPING LIST");
    c.reset().feed(2);
    if let Some(date) = &p.date {
        c.style(TextStyle::new().alignment(Alignment::Center));
        c.line(&format!("Date: {date}"));
        c.reset();
    }
    c.line(&layout::divider('=', width));
    c.feed(1);
    for (i, item) in entries.iter().enumerate() {
        c.wrapped(&format!("{}. [ ] {item}", i + 1), width);
    }
    c.feed(2);
    c.line(&layout::divider('=', width));
    c.feed(4);
    Ok(c.finish())
}

/// Printed once when the printer comes up with `startup_message` enabled.
pub fn startup_banner() -> (Vec<u8>, u32) {
    let mut c = Composer::new();
    c.style(heading());
    c.line("Printer Ready");
    c.reset().feed(1);
    c.style(TextStyle::new().alignment(Alignment::Center));
    c.line("Queue System Ready!");
    c.line("System Started");
    c.feed(3);
    c.finish()
}
