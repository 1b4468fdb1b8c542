/// Merges two ordered iterators into one.
///
/// Each side keeps at most one buffered head. The comparator is only
/// consulted while both sides still have values; once either runs dry the
/// other is drained as is.
pub struct Multiplex<L, R, F>
where
    L: Iterator,
{
    left: L,
    right: R,
    left_head: Option<L::Item>,
    right_head: Option<L::Item>,
    take_left: F,
}

impl<L, R, F> Multiplex<L, R, F>
where
    L: Iterator,
    R: Iterator<Item = L::Item>,
    F: FnMut(&L::Item, &L::Item) -> bool,
{
    pub fn new(left: L, right: R, take_left: F) -> Self {
        Self {
            left,
            right,
            left_head: None,
            right_head: None,
            take_left,
        }
    }
}

impl<L, R, F> Iterator for Multiplex<L, R, F>
where
    L: Iterator,
    R: Iterator<Item = L::Item>,
    F: FnMut(&L::Item, &L::Item) -> bool,
{
    type Item = L::Item;

    fn next(&mut self) -> Option<L::Item> {
        if self.left_head.is_none() {
            self.left_head = self.left.next();
        }
        if self.right_head.is_none() {
            self.right_head = self.right.next();
        }

        match (&self.left_head, &self.right_head) {
            (Some(l), Some(r)) => {
                if (self.take_left)(l, r) {
                    self.left_head.take()
                } else {
                    self.right_head.take()
                }
            }
            (Some(_), None) => self.left_head.take(),
            (None, Some(_)) => self.right_head.take(),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_by_comparator() {
        let merged: Vec<_> =
            Multiplex::new(vec![1, 4, 6].into_iter(), vec![2, 3, 7, 9].into_iter(), |l, r| l <= r).collect();

        assert_eq!(merged, vec![1, 2, 3, 4, 6, 7, 9]);
    }

    #[test]
    fn ties_follow_comparator() {
        let left = vec![(1, 'l')].into_iter();
        let right = vec![(1, 'r')].into_iter();

        let stable: Vec<_> = Multiplex::new(left.clone(), right.clone(), |l, r| l.0 <= r.0).collect();
        assert_eq!(stable, vec![(1, 'l'), (1, 'r')]);

        let flipped: Vec<_> = Multiplex::new(left, right, |l, r| l.0 < r.0).collect();
        assert_eq!(flipped, vec![(1, 'r'), (1, 'l')]);
    }

    #[test]
    fn drains_either_side() {
        let merged: Vec<i32> = Multiplex::new(std::iter::empty(), vec![5, 1].into_iter(), |l, r| l <= r).collect();
        assert_eq!(merged, vec![5, 1]);
    }
}
