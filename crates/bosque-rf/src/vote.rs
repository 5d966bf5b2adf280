//! Plurality voting shared by leaf construction and forest aggregation.

/// Return the class with the highest count.
///
/// Classes are scanned in ascending order and a later class only wins with a
/// strictly greater count, so ties go to the lowest class code. An empty
/// slice yields class 0.
#[must_use]
pub fn plurality(class_counts: &[usize]) -> usize {
    let mut best_class = 0usize;
    let mut best_count = 0usize;
    for (class, &count) in class_counts.iter().enumerate() {
        if count > best_count {
            best_count = count;
            best_class = class;
        }
    }
    best_class
}

/// Count occurrences of each class code in `labels` over `[0, n_classes)`.
///
/// Codes outside the range are ignored.
#[must_use]
pub fn class_counts(labels: impl IntoIterator<Item = usize>, n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for label in labels {
        if let Some(slot) = counts.get_mut(label) {
            *slot += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::{class_counts, plurality};

    #[test]
    fn clear_majority() {
        assert_eq!(plurality(&class_counts([0, 0, 1], 2)), 0);
        assert_eq!(plurality(&class_counts([2, 1, 2, 2, 0], 3)), 2);
    }

    #[test]
    fn ties_go_to_lowest_class() {
        assert_eq!(plurality(&[3, 3]), 0);
        assert_eq!(plurality(&[0, 2, 2, 1]), 1);
        assert_eq!(plurality(&[1, 4, 0, 4]), 1);
    }

    #[test]
    fn empty_counts_default_to_zero() {
        assert_eq!(plurality(&[]), 0);
        assert_eq!(plurality(&[0, 0, 0]), 0);
    }

    #[test]
    fn counts_ignore_out_of_range_codes() {
        assert_eq!(class_counts([0, 1, 5, 1], 2), vec![1, 2]);
    }
}
