//! Cart quantity rules shared by the db engine and its tests.

/// Minimum units per cart line.
pub const MIN_QUANTITY: i32 = 1;
/// Maximum units per cart line, regardless of stock.
pub const MAX_QUANTITY: i32 = 100;

/// True if `quantity` is a legal line-item quantity on its own, before any
/// stock check.
#[must_use]
pub fn in_bounds(quantity: i32) -> bool {
    (MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity)
}

/// Outcome of merging an add into an existing (possibly empty) cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The new total quantity for the line.
    Merged(i32),
    /// current + added would exceed [`MAX_QUANTITY`].
    ExceedsCap { total: i32 },
    /// current + added would exceed the product's live stock.
    ExceedsStock { total: i32, available: i32 },
}

/// Merge semantics for add-to-cart: quantities are summed, never replaced,
/// and the two caps are reported separately so the caller can tell
/// "line too large" apart from "not enough stock".
#[must_use]
pub fn merge(current: i32, added: i32, available_stock: i32) -> MergeOutcome {
    let total = current + added;
    if total > MAX_QUANTITY {
        MergeOutcome::ExceedsCap { total }
    } else if total > available_stock {
        MergeOutcome::ExceedsStock {
            total,
            available: available_stock,
        }
    } else {
        MergeOutcome::Merged(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(in_bounds(1));
        assert!(in_bounds(100));
        assert!(!in_bounds(0));
        assert!(!in_bounds(101));
        assert!(!in_bounds(-4));
    }

    #[test]
    fn merge_sums_quantities() {
        assert_eq!(merge(3, 2, 10), MergeOutcome::Merged(5));
        assert_eq!(merge(0, 7, 7), MergeOutcome::Merged(7));
    }

    #[test]
    fn cap_violation_reported_before_stock() {
        // 60 + 50 breaks both caps; the hard cap wins the error message.
        assert_eq!(merge(60, 50, 20), MergeOutcome::ExceedsCap { total: 110 });
    }

    #[test]
    fn stock_violation_carries_available_count() {
        assert_eq!(
            merge(3, 4, 5),
            MergeOutcome::ExceedsStock {
                total: 7,
                available: 5
            }
        );
    }
}
