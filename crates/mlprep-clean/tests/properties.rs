//! Property tests for cleaning invariants.

use mlprep_clean::{CategoricalOptions, NumericalOptions, TableCleaner};
use polars::prelude::*;
use proptest::prelude::*;

proptest! {
    // Re-cleaning already-cleaned data with the same frozen statistics is a
    // no-op: values are within bounds, imputed, and stable under rounding.
    #[test]
    fn clean_is_idempotent_on_cleaned_data(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..40),
    ) {
        let df = DataFrame::new(vec![Series::new("x".into(), &values).into()]).unwrap();
        let mut cleaner = TableCleaner::new();
        cleaner.register_numerical("x", NumericalOptions::default());

        let (once, _) = cleaner.fit_transform(&df, None).unwrap();
        let (twice, _) = cleaner.transform(&once, None).unwrap();
        prop_assert!(once.equals(&twice));
    }

    // Label codes stay inside 1..=vocabulary size when every value was seen
    // during fitting.
    #[test]
    fn label_codes_stay_inside_vocabulary(
        values in prop::collection::vec("[a-d]", 1..40),
    ) {
        let df = DataFrame::new(vec![Series::new("x".into(), &values).into()]).unwrap();
        let mut cleaner = TableCleaner::new();
        cleaner.register_label("x", CategoricalOptions::default());

        let (x, _) = cleaner.fit_transform(&df, None).unwrap();
        let codes = x.column("x").unwrap().u32().unwrap();
        for opt in codes.into_iter() {
            let code = opt.unwrap();
            prop_assert!((1..=4).contains(&code));
        }
    }

    // A frozen vocabulary maps everything it has never seen to the reserved
    // unknown bucket.
    #[test]
    fn unknown_categories_always_map_to_zero(
        values in prop::collection::vec("[e-h]{3}", 1..20),
    ) {
        let df = DataFrame::new(vec![Series::new("x".into(), &values).into()]).unwrap();
        let mut cleaner = TableCleaner::new();
        cleaner.register_label(
            "x",
            CategoricalOptions {
                categories: vec!["aaa".to_string(), "bbb".to_string()],
                ..Default::default()
            },
        );

        let (x, _) = cleaner.transform(&df, None).unwrap();
        let codes = x.column("x").unwrap().u32().unwrap();
        for opt in codes.into_iter() {
            prop_assert_eq!(opt.unwrap(), 0);
        }
    }
}
