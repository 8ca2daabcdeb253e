//! Serial number sanitation.

/// Placeholder serials written by vendors that never identify a machine.
pub const SERIAL_BLACKLIST: &[&str] = &[
    "",
    "Not Available",
    "XxXxXxX",
    "-----",
    "[Unknown]",
    "0000000000",
    "Not Specified",
    "YK10CD",
    "1234567890",
    "None",
    "To Be Filled By O.E.M.",
];

/// Trims a probe-reported serial number and drops known placeholders.
#[must_use]
pub fn clean_serial(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if SERIAL_BLACKLIST.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
