//! Contains the definition of [`SqlState`].

use std::{fmt::Display, str::FromStr};

/// A five character SQL-state code, such as `25P02`.
///
/// Each character is a digit or an upper-case ASCII letter. The first two
/// characters name the class.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SqlState([u8; 5]);

/// The text is not a valid [`SqlState`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sqlerrcode: {0:?}")]
pub struct InvalidSqlStateError(pub String);

macro_rules! sql_states {
    ($($(#[$meta:meta])* $name:ident = $code:literal;)*) => {
        impl SqlState {
            $(
                $(#[$meta])*
                pub const $name: Self = Self::from_bytes(*$code);
            )*
        }
    };
}

sql_states! {
    /// `XX000`.
    INTERNAL_ERROR = b"XX000";
    /// `0A000`.
    FEATURE_NOT_SUPPORTED = b"0A000";
    /// `09000`.
    TRIGGERED_ACTION_EXCEPTION = b"09000";
    /// `22023`.
    INVALID_PARAMETER_VALUE = b"22023";
    /// `25P02`.
    IN_FAILED_SQL_TRANSACTION = b"25P02";
    /// `39P01`.
    TRIGGER_PROTOCOL_VIOLATED = b"39P01";
    /// `3B000`.
    SAVEPOINT_EXCEPTION = b"3B000";
    /// `42804`.
    DATATYPE_MISMATCH = b"42804";
    /// `42883`.
    UNDEFINED_FUNCTION = b"42883";
    /// `53200`.
    OUT_OF_MEMORY = b"53200";
    /// `54000`.
    PROGRAM_LIMIT_EXCEEDED = b"54000";
    /// `57014`, operator requested cancellation.
    QUERY_CANCELED = b"57014";
    /// `57P01`, administrator requested termination.
    ADMIN_SHUTDOWN = b"57P01";
    /// `PY000`, generic failure of interpreted code.
    INTERPRETER_ERROR = b"PY000";
    /// `PY001`, interpreted code raised an exception.
    INTERPRETER_EXCEPTION = b"PY001";
    /// `PY002`, interpreted code broke an invariant of the runtime.
    PROTOCOL_VIOLATION = b"PY002";
    /// `PY999`, marker of an already converted error.
    RELAY = b"PY999";
}

impl SqlState {
    const fn from_bytes(bytes: [u8; 5]) -> Self { Self(bytes) }

    /// Returns the code as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // only ASCII is admitted by construction
        std::str::from_utf8(&self.0).unwrap_or("XX000")
    }

    /// Returns the two character class of the code.
    #[must_use]
    pub fn class(&self) -> &str { &self.as_str()[..2] }

    /// Packs the code into the host's six-bits-per-character integer form.
    #[must_use]
    pub fn to_packed(self) -> i32 {
        self.0.iter().enumerate().fold(0, |packed, (i, ch)| {
            packed | ((i32::from(*ch) - i32::from(b'0')) & 0x3F) << (6 * i)
        })
    }

    /// Unpacks a code produced by [`Self::to_packed`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSqlStateError`] if a character falls outside the
    /// digit and upper-case letter range.
    pub fn from_packed(packed: i32) -> Result<Self, InvalidSqlStateError> {
        let mut bytes = [0_u8; 5];

        for (i, byte) in bytes.iter_mut().enumerate() {
            let bits = (packed >> (6 * i)) & 0x3F;
            // `bits` is at most 63, the sum stays within `u8`
            *byte = u8::try_from(bits).map_or(0, |bits| bits + b'0');
        }

        if bytes.iter().all(|b| Self::admits(*b)) {
            Ok(Self(bytes))
        } else {
            Err(InvalidSqlStateError(format!("{packed:#x}")))
        }
    }

    const fn admits(byte: u8) -> bool {
        byte.is_ascii_digit() || byte.is_ascii_uppercase()
    }
}

impl FromStr for SqlState {
    type Err = InvalidSqlStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 5] = s
            .as_bytes()
            .try_into()
            .map_err(|_| InvalidSqlStateError(s.to_owned()))?;

        if bytes.iter().all(|b| Self::admits(*b)) {
            Ok(Self(bytes))
        } else {
            Err(InvalidSqlStateError(s.to_owned()))
        }
    }
}

impl Display for SqlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for SqlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqlState({})", self.as_str())
    }
}
