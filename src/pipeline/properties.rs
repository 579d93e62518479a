//! Property serialisation: one typed metadata value → one Markdown list line.

use crate::model::{plain_text, Property};
use tracing::warn;

/// Render one property as `- {name}: {value}`.
///
/// Never fails: an unrecognized or malformed property renders with an inline
/// `(parse error: …)` annotation instead.
pub fn property_line(name: &str, property: &Property) -> String {
    match render_value(property) {
        Ok(value) => format!("- {name}: {value}"),
        Err(detail) => {
            warn!("Property '{}' could not be rendered: {}", name, detail);
            format!("- {name}: (parse error: {detail})")
        }
    }
}

/// Render every property, one line each, in the given order.
pub fn property_lines(properties: &[(String, Property)]) -> Vec<String> {
    properties
        .iter()
        .map(|(name, property)| property_line(name, property))
        .collect()
}

fn render_value(property: &Property) -> Result<String, String> {
    let value = match property {
        Property::RichText(runs) => plain_text(runs),
        Property::Select(option) => option.clone().unwrap_or_default(),
        Property::MultiSelect(options) => options.join(", "),
        Property::Date(start) => start.clone().unwrap_or_default(),
        Property::Number(n) => n.map(format_number).unwrap_or_default(),
        Property::Checkbox(checked) => checked.to_string(),
        Property::Url(v) | Property::Email(v) | Property::PhoneNumber(v) => {
            v.clone().unwrap_or_default()
        }
        Property::Unrecognized { detail, .. } => return Err(detail.clone()),
    };
    Ok(value)
}

/// Integers render without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
