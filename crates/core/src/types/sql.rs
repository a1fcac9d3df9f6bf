//! `SQLite` column support for text-backed domain types.

/// Implement `sqlx` `Type`, `Encode` and `Decode` for a type stored as TEXT.
///
/// The type must provide `as_str()`; the closure parses a stored string back
/// into the type and its error must convert into `BoxDynError`.
#[macro_export]
macro_rules! sqlite_text_type {
    ($name:ty, $parse:expr) => {
        impl ::sqlx::Type<::sqlx::Sqlite> for $name {
            fn type_info() -> ::sqlx::sqlite::SqliteTypeInfo {
                <String as ::sqlx::Type<::sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &::sqlx::sqlite::SqliteTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'r> ::sqlx::Decode<'r, ::sqlx::Sqlite> for $name {
            fn decode(
                value: ::sqlx::sqlite::SqliteValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let s = <String as ::sqlx::Decode<::sqlx::Sqlite>>::decode(value)?;
                let parsed = ($parse)(s.as_str())?;
                Ok(parsed)
            }
        }

        impl<'q> ::sqlx::Encode<'q, ::sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <::sqlx::Sqlite as ::sqlx::Database>::ArgumentBuffer<'q>,
            ) -> ::core::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<'q, ::sqlx::Sqlite>>::encode(self.as_str().to_owned(), buf)
            }
        }
    };
}
