//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**. They are immutable and compared by their
/// attribute values; to "modify" one, build a new one.
///
/// ```ignore
/// let a = Money::new(1000);
/// let b = Money::new(1000);
/// assert_eq!(a, b); // equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
