//! Wire-format mapping for threshold comparison operators.
//!
//! The domain enum carries a stable integer `id` that round-trips through a
//! wire enum with an explicit `Unknown` sentinel. Decoding an unknown wire
//! value yields `None`, never an error; encoding is an exhaustive match so
//! adding a variant without a wire mapping fails to compile.

/// Wire representation of a comparison operator.
///
/// `Unknown` is the sentinel emitted by peers that predate a given variant;
/// it decodes to an absent domain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ComparisonTypeProto {
    /// Unrecognized or unset value.
    Unknown = 0,
    /// Strictly greater than the threshold.
    GreaterThan = 1,
    /// Greater than or equal to the threshold.
    GreaterThanOrEqual = 2,
    /// Strictly less than the threshold.
    LessThan = 3,
    /// Less than or equal to the threshold.
    LessThanOrEqual = 4,
}

impl ComparisonTypeProto {
    /// Decode a raw wire integer. Unmapped values collapse to `Unknown`.
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => Self::GreaterThan,
            2 => Self::GreaterThanOrEqual,
            3 => Self::LessThan,
            4 => Self::LessThanOrEqual,
            _ => Self::Unknown,
        }
    }
}

/// Comparison used to decide when a metric threshold has been met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    /// Strictly greater than the threshold.
    GreaterThan,
    /// Greater than or equal to the threshold.
    GreaterThanOrEqual,
    /// Strictly less than the threshold.
    LessThan,
    /// Less than or equal to the threshold.
    LessThanOrEqual,
}

impl ComparisonType {
    const VALUES: [Self; 4] = [
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
    ];

    /// Stable integer id of this variant.
    pub const fn id(self) -> i32 {
        match self {
            Self::GreaterThan => 1,
            Self::GreaterThanOrEqual => 2,
            Self::LessThan => 3,
            Self::LessThanOrEqual => 4,
        }
    }

    /// Look up a variant by its stable id. Unmapped ids yield `None`.
    pub fn from_id(id: i32) -> Option<Self> {
        Self::VALUES.into_iter().find(|v| v.id() == id)
    }

    /// Encode to the wire enum. Exhaustive by construction: a new domain
    /// variant without a wire counterpart is a compile error here.
    pub const fn to_proto(self) -> ComparisonTypeProto {
        match self {
            Self::GreaterThan => ComparisonTypeProto::GreaterThan,
            Self::GreaterThanOrEqual => ComparisonTypeProto::GreaterThanOrEqual,
            Self::LessThan => ComparisonTypeProto::LessThan,
            Self::LessThanOrEqual => ComparisonTypeProto::LessThanOrEqual,
        }
    }

    /// Decode from the wire enum. `Unknown` maps to `None`.
    pub const fn from_proto(proto: ComparisonTypeProto) -> Option<Self> {
        match proto {
            ComparisonTypeProto::GreaterThan => Some(Self::GreaterThan),
            ComparisonTypeProto::GreaterThanOrEqual => Some(Self::GreaterThanOrEqual),
            ComparisonTypeProto::LessThan => Some(Self::LessThan),
            ComparisonTypeProto::LessThanOrEqual => Some(Self::LessThanOrEqual),
            ComparisonTypeProto::Unknown => None,
        }
    }
}
