//! Text and JSON output for carts.

use std::fmt::Write;

use go_market_core::CartSnapshot;

/// Render a cart as a plain-text table with totals.
#[must_use]
pub fn table(cart: &CartSnapshot) -> String {
    if cart.is_empty() {
        return "Cart is empty\n".to_string();
    }

    let id_width = cart
        .items()
        .iter()
        .map(|item| item.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("ID".len());
    let title_width = cart
        .items()
        .iter()
        .map(|item| item.title.chars().count())
        .max()
        .unwrap_or(0)
        .max("TITLE".len());

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<title_width$}  {:>5}  {:>10}  {:>10}",
        "ID", "TITLE", "QTY", "PRICE", "TOTAL"
    );
    for item in cart.items() {
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<title_width$}  {:>5}  {:>10}  {:>10}",
            item.id.as_str(),
            item.title,
            item.quantity,
            format!("${}", item.price),
            format!("${}", item.line_total()),
        );
    }
    let _ = writeln!(
        out,
        "{} item(s), subtotal ${}",
        cart.item_count(),
        cart.subtotal()
    );
    out
}

/// Render a cart in the same JSON shape it is stored in.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn json(cart: &CartSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(cart)
}
