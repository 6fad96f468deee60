//! Typed entity IDs.
//!
//! Each table gets its own `Uuid` newtype so a `CourseId` can never be bound
//! where a `StudentId` is expected. The newtypes encode and decode as plain
//! Postgres `UUID` and serialize as UUID strings.

use serde::{Deserialize, Serialize};
use sqlx::{
    Database, Decode, Encode, Type,
    postgres::{PgHasArrayType, PgTypeInfo},
};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[inline]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[inline]
            pub const fn from_u128(v: u128) -> Self {
                Self(Uuid::from_u128(v))
            }

            #[inline]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }

            #[inline]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            #[inline]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            #[inline]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            #[inline]
            fn from(id: $name) -> Uuid {
                id.0
            }
        }

        impl AsRef<Uuid> for $name {
            #[inline]
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Type<sqlx::Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <Uuid as Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <Uuid as Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'q> Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <Uuid as Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <Uuid as Decode<'r, sqlx::Postgres>>::decode(value).map(Self)
            }
        }

        impl PgHasArrayType for $name {
            fn array_type_info() -> PgTypeInfo {
                <Uuid as PgHasArrayType>::array_type_info()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self)
            }
        }
    };
}

define_id!(UserId);
define_id!(SchoolId);
define_id!(StudentId);
define_id!(TeacherId);
define_id!(DepartmentId);
define_id!(SemesterId);
define_id!(CourseId);
define_id!(EnrollmentId);
define_id!(GradeId);
define_id!(AssignmentId);
define_id!(SubmissionId);
define_id!(AttendanceId);
define_id!(ScheduleId);
define_id!(DocumentId);
define_id!(NotificationId);
define_id!(AuditLogId);
define_id!(SettingId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_plain_uuid_string() {
        let id = CourseId::from_u128(0x12345678_1234_1234_1234_123456789abc);
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            r#""12345678-1234-1234-1234-123456789abc""#
        );
        let back: CourseId = serde_json::from_str(r#""12345678-1234-1234-1234-123456789abc""#).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_debug_names_the_entity() {
        let id = StudentId::from_u128(1);
        assert!(format!("{id:?}").starts_with("StudentId("));
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000001");
    }

    #[test]
    fn test_parse_and_convert() {
        let uuid = Uuid::new_v4();
        let id: SchoolId = uuid.to_string().parse().unwrap();
        assert_eq!(Uuid::from(id), uuid);
        assert!("nope".parse::<SchoolId>().is_err());
        assert!(SchoolId::nil().is_nil());
    }
}
