//! Enums mirroring the integer constants of the standard database-access API.
//!
//! Every enum is generated by [`define_constant_enum!`] and converts in both
//! directions through a fixed `match` table. Unknown integers are reported as
//! [`MetabindError::UnknownConstant`](crate::error::MetabindError::UnknownConstant).

/// Common surface of the generated constant enums.
pub trait ApiConstant: Sized + Copy + 'static {
    /// Short type name used in error messages.
    const KIND: &'static str;

    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    /// Looks up the variant for an API integer.
    fn from_constant(value: i32) -> crate::Result<Self>;

    /// The API integer of this variant.
    fn constant(self) -> i32;

    /// The API name of this variant (e.g. `TRANSACTION_READ_COMMITTED`).
    fn api_name(self) -> &'static str;
}

/// Generates a constant enum together with its [`ApiConstant`] impl.
///
/// # Example
/// ```rust,ignore
/// define_constant_enum!(
///     /// Doc for the enum
///     Holdability {
///         HoldCursorsOverCommit = 1 => "HOLD_CURSORS_OVER_COMMIT",
///     }
/// );
/// ```
#[macro_export]
macro_rules! define_constant_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $value:literal => $api:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize,
        )]
        pub enum $name {
            $(
                #[doc = concat!("`", $api, "` (", stringify!($value), ")")]
                #[serde(rename = $api)]
                $variant,
            )+
        }

        impl $crate::constants::ApiConstant for $name {
            const KIND: &'static str = stringify!($name);
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn from_constant(value: i32) -> $crate::Result<Self> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err($crate::error::MetabindError::unknown_constant(
                        stringify!($name),
                        other,
                    )),
                }
            }

            fn constant(self) -> i32 {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            fn api_name(self) -> &'static str {
                match self {
                    $($name::$variant => $api,)+
                }
            }
        }

        impl $name {
            /// Looks up the variant for an API integer.
            pub fn from_constant(value: i32) -> $crate::Result<Self> {
                <Self as $crate::constants::ApiConstant>::from_constant(value)
            }

            /// The API integer of this variant.
            pub fn constant(self) -> i32 {
                <Self as $crate::constants::ApiConstant>::constant(self)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::constants::ApiConstant::api_name(*self))
            }
        }
    };
}

pub use define_constant_enum;

define_constant_enum!(
    /// Transaction isolation levels.
    TransactionIsolation {
        None = 0 => "TRANSACTION_NONE",
        ReadUncommitted = 1 => "TRANSACTION_READ_UNCOMMITTED",
        ReadCommitted = 2 => "TRANSACTION_READ_COMMITTED",
        RepeatableRead = 4 => "TRANSACTION_REPEATABLE_READ",
        Serializable = 8 => "TRANSACTION_SERIALIZABLE",
    }
);

define_constant_enum!(
    /// Result set scrollability.
    ResultSetType {
        ForwardOnly = 1003 => "TYPE_FORWARD_ONLY",
        ScrollInsensitive = 1004 => "TYPE_SCROLL_INSENSITIVE",
        ScrollSensitive = 1005 => "TYPE_SCROLL_SENSITIVE",
    }
);

define_constant_enum!(
    /// Result set concurrency mode.
    ResultSetConcurrency {
        ReadOnly = 1007 => "CONCUR_READ_ONLY",
        Updatable = 1008 => "CONCUR_UPDATABLE",
    }
);

define_constant_enum!(
    /// Cursor holdability across commits.
    ResultSetHoldability {
        HoldCursorsOverCommit = 1 => "HOLD_CURSORS_OVER_COMMIT",
        CloseCursorsAtCommit = 2 => "CLOSE_CURSORS_AT_COMMIT",
    }
);

define_constant_enum!(
    /// Update/delete rule of a foreign key.
    KeyRule {
        Cascade = 0 => "IMPORTED_KEY_CASCADE",
        Restrict = 1 => "IMPORTED_KEY_RESTRICT",
        SetNull = 2 => "IMPORTED_KEY_SET_NULL",
        NoAction = 3 => "IMPORTED_KEY_NO_ACTION",
        SetDefault = 4 => "IMPORTED_KEY_SET_DEFAULT",
    }
);

define_constant_enum!(
    /// Deferrability of a foreign key constraint.
    KeyDeferrability {
        InitiallyDeferred = 5 => "IMPORTED_KEY_INITIALLY_DEFERRED",
        InitiallyImmediate = 6 => "IMPORTED_KEY_INITIALLY_IMMEDIATE",
        NotDeferrable = 7 => "IMPORTED_KEY_NOT_DEFERRABLE",
    }
);

define_constant_enum!(
    /// Nullability of a column as reported by the integer `NULLABLE` field.
    ColumnNullability {
        NoNulls = 0 => "COLUMN_NO_NULLS",
        Nullable = 1 => "COLUMN_NULLABLE",
        NullableUnknown = 2 => "COLUMN_NULLABLE_UNKNOWN",
    }
);

define_constant_enum!(
    /// How long a best-row identifier stays valid.
    BestRowScope {
        Temporary = 0 => "BEST_ROW_TEMPORARY",
        Transaction = 1 => "BEST_ROW_TRANSACTION",
        Session = 2 => "BEST_ROW_SESSION",
    }
);

define_constant_enum!(
    /// Whether a best-row identifier or version column is a pseudo column.
    ///
    /// Version columns report the same values under their own names.
    PseudoColumnKind {
        Unknown = 0 => "BEST_ROW_UNKNOWN",
        NotPseudo = 1 => "BEST_ROW_NOT_PSEUDO",
        Pseudo = 2 => "BEST_ROW_PSEUDO",
    }
);
