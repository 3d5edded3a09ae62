use time::{
	Date, OffsetDateTime, PrimitiveDateTime, UtcOffset,
	format_description::well_known::{Iso8601, Rfc3339},
};

use crate::{Error, Result};

/// Parses an ISO-8601 timestamp or date into epoch seconds. Text without an offset is read as
/// UTC.
pub fn to_timestamp(text: &str) -> Result<i64> {
	let trimmed = text.trim();

	if let Ok(ts) = OffsetDateTime::parse(trimmed, &Rfc3339) {
		return Ok(ts.unix_timestamp());
	}
	if let Ok(ts) = OffsetDateTime::parse(trimmed, &Iso8601::DEFAULT) {
		return Ok(ts.unix_timestamp());
	}

	match PrimitiveDateTime::parse(trimmed, &Iso8601::DEFAULT) {
		Ok(ts) => Ok(ts.assume_utc().unix_timestamp()),
		// A bare date is midnight UTC.
		Err(err) => Date::parse(trimmed, &Iso8601::DEFAULT)
			.map(|date| date.midnight().assume_utc().unix_timestamp())
			.map_err(|_| Error::Parse { value: text.to_string(), message: err.to_string() }),
	}
}

/// Formats epoch seconds as RFC 3339 in the local offset, falling back to UTC. Display only.
pub fn from_timestamp(timestamp: i64) -> Result<String> {
	let utc = OffsetDateTime::from_unix_timestamp(timestamp).map_err(|err| Error::Parse {
		value: timestamp.to_string(),
		message: err.to_string(),
	})?;
	let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

	utc.to_offset(offset)
		.format(&Rfc3339)
		.map_err(|err| Error::Parse { value: timestamp.to_string(), message: err.to_string() })
}
