use chrono::NaiveDate;

const LEDGER_DATE_FORMAT: &str = "%d.%m.%Y";

/// This is the standard way of converting a date to a ledger row key in windowtally.
pub fn date_to_ledger_key(date: NaiveDate) -> String {
    date.format(LEDGER_DATE_FORMAT).to_string()
}

/// Inverse of [date_to_ledger_key]. Returns `None` for keys written by hand in another shape.
pub fn ledger_key_to_date(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), LEDGER_DATE_FORMAT).ok()
}
