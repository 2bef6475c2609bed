use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::Timestamp;

use crate::error::{DeltaError, DeltaResult};

/// Cursor variant tag (the first field of the wire encoding).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorKind {
    /// Bootstrap cursor: the client has no prior state.
    Initial,
    /// Resume cursor: positioned inside the feed.
    Delta,
}

impl CursorKind {
    fn as_wire(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Delta => "delta",
        }
    }

    fn from_wire(s: &str) -> DeltaResult<Self> {
        match s {
            "initial" => Ok(Self::Initial),
            "delta" => Ok(Self::Delta),
            other => Err(DeltaError::InvalidCursor(format!(
                "unknown cursor kind {other:?}"
            ))),
        }
    }
}

/// Opaque, resumable position in the change feed.
///
/// Wire format (legacy, preserved for cross-client compatibility):
/// `kind|flag|flag|sequence|timestamp`. The two flag fields are reserved;
/// they are carried through parse/encode untouched so old and new clients
/// can exchange cursors without loss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub kind: CursorKind,
    /// Reserved flag, round-tripped verbatim.
    pub flag_a: bool,
    /// Reserved flag, round-tripped verbatim.
    pub flag_b: bool,
    /// Ordering key: the position of the last record the client has seen.
    pub position: u64,
    /// Wall-clock time the cursor was issued.
    pub issued_at: Timestamp,
}

impl Cursor {
    /// Bootstrap cursor preceding every record.
    pub fn initial(now: Timestamp) -> Self {
        Self {
            kind: CursorKind::Initial,
            flag_a: false,
            flag_b: false,
            position: 0,
            issued_at: now,
        }
    }

    /// Resume cursor at a feed position.
    pub fn at(position: u64, now: Timestamp) -> Self {
        Self {
            kind: CursorKind::Delta,
            flag_a: false,
            flag_b: false,
            position,
            issued_at: now,
        }
    }

    /// Encode to the delimited wire string.
    pub fn encode(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.kind.as_wire(),
            self.flag_a as u8,
            self.flag_b as u8,
            self.position,
            self.issued_at.as_millis(),
        )
    }

    /// Parse the delimited wire string. All five fields are required.
    pub fn parse(s: &str) -> DeltaResult<Self> {
        let fields: Vec<&str> = s.split('|').collect();
        if fields.len() != 5 {
            return Err(DeltaError::InvalidCursor(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }
        let kind = CursorKind::from_wire(fields[0])?;
        let flag_a = parse_flag(fields[1])?;
        let flag_b = parse_flag(fields[2])?;
        let position: u64 = fields[3]
            .parse()
            .map_err(|_| DeltaError::InvalidCursor(format!("bad sequence {:?}", fields[3])))?;
        let millis: i64 = fields[4]
            .parse()
            .map_err(|_| DeltaError::InvalidCursor(format!("bad timestamp {:?}", fields[4])))?;
        Ok(Self {
            kind,
            flag_a,
            flag_b,
            position,
            issued_at: Timestamp::from_millis(millis),
        })
    }
}

fn parse_flag(s: &str) -> DeltaResult<bool> {
    match s {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(DeltaError::InvalidCursor(format!("bad flag {other:?}"))),
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_shape() {
        let c = Cursor::at(42, Timestamp::from_millis(1_700_000_000_000));
        assert_eq!(c.encode(), "delta|0|0|42|1700000000000");
    }

    #[test]
    fn parse_roundtrip() {
        let c = Cursor::at(42, Timestamp::from_millis(1_700_000_000_000));
        assert_eq!(Cursor::parse(&c.encode()).unwrap(), c);
    }

    #[test]
    fn initial_cursor_roundtrip() {
        let c = Cursor::initial(Timestamp::from_millis(5));
        let parsed = Cursor::parse(&c.encode()).unwrap();
        assert_eq!(parsed.kind, CursorKind::Initial);
        assert_eq!(parsed.position, 0);
    }

    #[test]
    fn reserved_flags_roundtrip() {
        let parsed = Cursor::parse("delta|1|0|7|99").unwrap();
        assert!(parsed.flag_a);
        assert!(!parsed.flag_b);
        assert_eq!(parsed.encode(), "delta|1|0|7|99");
    }

    #[test]
    fn wrong_field_count_rejected() {
        assert!(Cursor::parse("delta|0|0|7").is_err());
        assert!(Cursor::parse("delta|0|0|7|99|extra").is_err());
        assert!(Cursor::parse("").is_err());
    }

    #[test]
    fn bad_fields_rejected() {
        assert!(Cursor::parse("bogus|0|0|7|99").is_err());
        assert!(Cursor::parse("delta|2|0|7|99").is_err());
        assert!(Cursor::parse("delta|0|0|seven|99").is_err());
        assert!(Cursor::parse("delta|0|0|7|later").is_err());
    }

    proptest::proptest! {
        #[test]
        fn any_cursor_roundtrips(
            pos in 0u64..,
            ms in 0i64..4_000_000_000_000i64,
            a in proptest::bool::ANY,
            b in proptest::bool::ANY,
            initial in proptest::bool::ANY,
        ) {
            let c = Cursor {
                kind: if initial { CursorKind::Initial } else { CursorKind::Delta },
                flag_a: a,
                flag_b: b,
                position: pos,
                issued_at: Timestamp::from_millis(ms),
            };
            proptest::prop_assert_eq!(Cursor::parse(&c.encode()).unwrap(), c);
        }
    }
}
