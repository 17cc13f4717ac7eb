/// Generates the assertion methods (assert_exists, assert_count, etc.) shared
/// by event and metric assertions.
///
/// Requires the struct to have:
/// - A field named `$items_field` containing the captured records slice
/// - `matches(&self, item)`, `build_error_message(&self)`,
///   `format_criteria(&self)`, and `$format_matching(&self)` methods
macro_rules! impl_assertion_methods {
    ($items_field:ident, $item_type:ty, $plural:expr, $format_matching:ident) => {
        /// Asserts that at least one captured record matches all specified criteria.
        ///
        /// # Panics
        ///
        /// Panics with a descriptive message if no match is found.
        #[allow(clippy::panic)]
        #[track_caller]
        pub fn assert_exists(&self) {
            if !self.matches_any() {
                panic!("{}", self.build_error_message());
            }
        }

        /// Asserts that no captured records match the specified criteria.
        ///
        /// # Panics
        ///
        /// Panics if any records match the criteria.
        #[allow(clippy::panic)]
        #[track_caller]
        pub fn assert_not_exists(&self) {
            if self.matches_any() {
                panic!(
                    "Expected no {} to match, but found {} matching.\nCriteria: {}\n\n{}",
                    $plural,
                    self.count(),
                    self.format_criteria(),
                    self.$format_matching()
                );
            }
        }

        /// Asserts that exactly `expected` records match.
        ///
        /// # Panics
        ///
        /// Panics if the count doesn't match.
        #[allow(clippy::panic)]
        #[track_caller]
        pub fn assert_count(&self, expected: usize) {
            let actual = self.count();
            if actual != expected {
                panic!(
                    "Expected {} matching {}, but found {}.\nCriteria: {}\n\n{}",
                    expected,
                    $plural,
                    actual,
                    self.format_criteria(),
                    self.$format_matching()
                );
            }
        }

        /// Asserts that at least `min` records match.
        ///
        /// # Panics
        ///
        /// Panics if fewer records match.
        #[allow(clippy::panic)]
        #[track_caller]
        pub fn assert_at_least(&self, min: usize) {
            let actual = self.count();
            if actual < min {
                panic!(
                    "Expected at least {} matching {}, but found {}.\nCriteria: {}",
                    min,
                    $plural,
                    actual,
                    self.format_criteria()
                );
            }
        }

        /// Asserts that no more than `max` records match.
        ///
        /// # Panics
        ///
        /// Panics if more records match.
        #[allow(clippy::panic)]
        #[track_caller]
        pub fn assert_at_most(&self, max: usize) {
            let actual = self.count();
            if actual > max {
                panic!(
                    "Expected at most {} matching {}, but found {}.\nCriteria: {}",
                    max,
                    $plural,
                    actual,
                    self.format_criteria()
                );
            }
        }

        /// Returns the number of records that match the criteria.
        #[must_use = "the count should be used"]
        pub fn count(&self) -> usize {
            self.$items_field
                .iter()
                .filter(|item| self.matches(item))
                .count()
        }

        /// Returns all records that match the criteria, in arrival order.
        #[must_use = "the matching records should be used"]
        pub fn get_all(&self) -> Vec<&$item_type> {
            self.$items_field
                .iter()
                .filter(|item| self.matches(item))
                .collect()
        }

        fn matches_any(&self) -> bool {
            self.$items_field.iter().any(|item| self.matches(item))
        }
    };
}

pub(crate) use impl_assertion_methods;
