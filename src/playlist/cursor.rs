//! Playlist cursor with wraparound navigation.

/// Index after `current` in a playlist of `len` tracks, wrapping to the start.
///
/// Returns `None` for an empty playlist.
#[must_use]
pub fn next_index(current: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((current % len + 1) % len)
}

/// Index before `current` in a playlist of `len` tracks, wrapping to the end.
///
/// Returns `None` for an empty playlist.
#[must_use]
pub fn previous_index(current: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some((current % len + len - 1) % len)
}

/// Current position in a non-empty catalog.
///
/// A cursor can only be built for a valid index, so `current() < len()`
/// always holds. An empty catalog has no cursor at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    current: usize,
    len: usize,
}

impl Cursor {
    /// Creates a cursor at `current`, or `None` if it is out of range.
    #[must_use]
    pub fn new(len: usize, current: usize) -> Option<Self> {
        (current < len).then_some(Self { current, len })
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Index that `next` would move to.
    #[must_use]
    pub fn peek_next(&self) -> usize {
        next_index(self.current, self.len).unwrap_or(self.current)
    }

    /// Index that `previous` would move to.
    #[must_use]
    pub fn peek_previous(&self) -> usize {
        previous_index(self.current, self.len).unwrap_or(self.current)
    }

    /// Moves to `index`. Returns false and leaves the cursor unchanged if out of range.
    pub fn move_to(&mut self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.current = index;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod index_tests {
        use super::*;

        #[test]
        fn test_next_wraps() {
            assert_eq!(next_index(0, 3), Some(1));
            assert_eq!(next_index(1, 3), Some(2));
            assert_eq!(next_index(2, 3), Some(0));
        }

        #[test]
        fn test_previous_wraps() {
            assert_eq!(previous_index(2, 3), Some(1));
            assert_eq!(previous_index(1, 3), Some(0));
            assert_eq!(previous_index(0, 3), Some(2));
        }

        #[test]
        fn test_single_track_stays_put() {
            assert_eq!(next_index(0, 1), Some(0));
            assert_eq!(previous_index(0, 1), Some(0));
        }

        #[test]
        fn test_empty_playlist() {
            assert_eq!(next_index(0, 0), None);
            assert_eq!(previous_index(0, 0), None);
        }

        #[test]
        fn test_next_and_previous_are_inverse() {
            for len in 1..=12 {
                for current in 0..len {
                    let next = next_index(current, len).unwrap();
                    let prev = previous_index(current, len).unwrap();
                    assert_eq!(previous_index(next, len), Some(current));
                    assert_eq!(next_index(prev, len), Some(current));
                }
            }
        }

        #[test]
        fn test_results_stay_in_range() {
            for len in 1..=12 {
                for current in 0..len {
                    assert!(next_index(current, len).unwrap() < len);
                    assert!(previous_index(current, len).unwrap() < len);
                }
            }
        }

        #[test]
        fn test_out_of_range_current_is_normalized() {
            assert_eq!(next_index(7, 3), Some(2));
            assert_eq!(previous_index(7, 3), Some(0));
        }
    }

    mod cursor_tests {
        use super::*;

        #[test]
        fn test_new_validates_index() {
            assert!(Cursor::new(3, 2).is_some());
            assert!(Cursor::new(3, 3).is_none());
            assert!(Cursor::new(0, 0).is_none());
        }

        #[test]
        fn test_peek_matches_free_functions() {
            for len in 1..=6 {
                for current in 0..len {
                    let cursor = Cursor::new(len, current).unwrap();
                    assert_eq!(Some(cursor.peek_next()), next_index(current, len));
                    assert_eq!(Some(cursor.peek_previous()), previous_index(current, len));
                }
            }
        }

        #[test]
        fn test_move_to() {
            let mut cursor = Cursor::new(3, 0).unwrap();
            assert!(cursor.move_to(2));
            assert_eq!(cursor.current(), 2);

            assert!(!cursor.move_to(3));
            assert_eq!(cursor.current(), 2);
        }
    }
}
