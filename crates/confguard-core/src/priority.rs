//! Reordering of priority-ordered rule chains.

use thiserror::Error;

/// Gap between consecutive priorities after renumbering.
pub const PRIORITY_STEP: u32 = 10;

/// An item ranked by a numeric priority, lowest first.
pub trait Prioritized {
    /// Identifier type.
    type Id: PartialEq + Copy + std::fmt::Debug;

    /// Returns the identifier.
    fn id(&self) -> Self::Id;

    /// Returns the current priority.
    fn priority(&self) -> u32;

    /// Sets the priority.
    fn set_priority(&mut self, priority: u32);
}

/// Errors that can occur when reordering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    /// The item to move is not in the chain.
    #[error("No item with id {0} in the chain")]
    UnknownItem(String),

    /// The anchor item is not in the chain.
    #[error("No anchor item with id {0} in the chain")]
    UnknownAnchor(String),
}

/// Moves item `id` immediately before `before`, or to the end when `before`
/// is `None`, then renumbers priorities 10, 20, 30, ...
///
/// Items are first ordered by current priority; equal priorities keep their
/// relative order. On return `items` is sorted by the new priorities.
///
/// # Errors
///
/// Returns an error, leaving `items` untouched, if `id` or `before` is not
/// in the chain.
pub fn move_before<T: Prioritized>(
    items: &mut Vec<T>,
    id: T::Id,
    before: Option<T::Id>,
) -> Result<(), ReorderError> {
    if !items.iter().any(|i| i.id() == id) {
        return Err(ReorderError::UnknownItem(format!("{id:?}")));
    }
    if let Some(anchor) = before {
        if !items.iter().any(|i| i.id() == anchor) {
            return Err(ReorderError::UnknownAnchor(format!("{anchor:?}")));
        }
    }

    items.sort_by_key(|i| i.priority());

    if before != Some(id) {
        if let Some(from) = items.iter().position(|i| i.id() == id) {
            let moved = items.remove(from);
            let to = before
                .and_then(|anchor| items.iter().position(|i| i.id() == anchor))
                .unwrap_or(items.len());
            items.insert(to, moved);
        }
    }

    renumber(items);
    Ok(())
}

/// Assigns priorities 10, 20, 30, ... in the current order.
pub fn renumber<T: Prioritized>(items: &mut [T]) {
    let mut priority = 0;
    for item in items {
        priority += PRIORITY_STEP;
        item.set_priority(priority);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Ranked {
        id: u32,
        priority: u32,
    }

    impl Prioritized for Ranked {
        type Id = u32;
        fn id(&self) -> u32 {
            self.id
        }
        fn priority(&self) -> u32 {
            self.priority
        }
        fn set_priority(&mut self, priority: u32) {
            self.priority = priority;
        }
    }

    fn chain(pairs: &[(u32, u32)]) -> Vec<Ranked> {
        pairs
            .iter()
            .map(|&(id, priority)| Ranked { id, priority })
            .collect()
    }

    fn ids(items: &[Ranked]) -> Vec<u32> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn move_before_another() {
        let mut items = chain(&[(1, 10), (2, 20), (3, 30)]);
        move_before(&mut items, 3, Some(1)).unwrap();
        assert_eq!(ids(&items), vec![3, 1, 2]);
        assert_eq!(
            items.iter().map(|i| i.priority).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
    }

    #[test]
    fn move_to_end() {
        let mut items = chain(&[(1, 5), (2, 7), (3, 100)]);
        move_before(&mut items, 1, None).unwrap();
        assert_eq!(ids(&items), vec![2, 3, 1]);
        assert_eq!(items[2].priority, 30);
    }

    #[test]
    fn unsorted_input_is_ordered_first() {
        let mut items = chain(&[(1, 30), (2, 10), (3, 20)]);
        move_before(&mut items, 2, Some(1)).unwrap();
        assert_eq!(ids(&items), vec![3, 2, 1]);
    }

    #[test]
    fn ties_keep_relative_order() {
        let mut items = chain(&[(1, 10), (2, 10), (3, 10)]);
        move_before(&mut items, 3, Some(2)).unwrap();
        assert_eq!(ids(&items), vec![1, 3, 2]);
    }

    #[test]
    fn moving_before_itself_only_renumbers() {
        let mut items = chain(&[(1, 1), (2, 2)]);
        move_before(&mut items, 2, Some(2)).unwrap();
        assert_eq!(ids(&items), vec![1, 2]);
        assert_eq!(items[1].priority, 20);
    }

    #[test]
    fn unknown_ids_leave_chain_untouched() {
        let mut items = chain(&[(1, 30), (2, 10)]);
        assert_eq!(
            move_before(&mut items, 9, None),
            Err(ReorderError::UnknownItem("9".to_string()))
        );
        assert_eq!(
            move_before(&mut items, 1, Some(9)),
            Err(ReorderError::UnknownAnchor("9".to_string()))
        );
        assert_eq!(ids(&items), vec![1, 2]);
        assert_eq!(items[0].priority, 30);
    }
}
