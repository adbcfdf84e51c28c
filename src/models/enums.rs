//! Shared domain enums, stored as TEXT columns

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Implements string conversions and the SQLx TEXT mapping for a unit enum
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// ReadingStatus
// ---------------------------------------------------------------------------

/// Where the owner is in reading a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingStatus {
    Read,
    Reading,
    #[default]
    ToRead,
}

text_enum!(ReadingStatus {
    Read => "read",
    Reading => "reading",
    ToRead => "to-read",
});

// ---------------------------------------------------------------------------
// BorrowStatus
// ---------------------------------------------------------------------------

/// Borrow request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

text_enum!(BorrowStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
});

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

text_enum!(Role {
    User => "user",
    Admin => "admin",
});

// ---------------------------------------------------------------------------
// AuthProvider
// ---------------------------------------------------------------------------

/// Where the account's identity comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Local,
    Google,
}

text_enum!(AuthProvider {
    Local => "local",
    Google => "google",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_status_text() {
        assert_eq!(ReadingStatus::ToRead.as_str(), "to-read");
        assert_eq!("reading".parse::<ReadingStatus>(), Ok(ReadingStatus::Reading));
        assert!("done".parse::<ReadingStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&ReadingStatus::ToRead).unwrap(),
            "\"to-read\""
        );
    }

    #[test]
    fn test_borrow_status_text() {
        assert_eq!(BorrowStatus::Completed.to_string(), "completed");
        assert_eq!("approved".parse::<BorrowStatus>(), Ok(BorrowStatus::Approved));
        assert!("returned".parse::<BorrowStatus>().is_err());
    }
}
