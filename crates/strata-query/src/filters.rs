//! Filter value normalization.

use strata_remote::FilterValue;

/// Splits packed text values on commas and trims each piece.
///
/// Numbers pass through unsplit. `["1234, 5678", "  987"]` becomes
/// `["1234", "5678", "987"]`.
#[must_use]
pub fn split_filter_values(values: &[FilterValue]) -> Vec<FilterValue> {
    values
        .iter()
        .flat_map(|value| match value {
            FilterValue::Number(_) => vec![value.clone()],
            FilterValue::Text(text) => text
                .split(',')
                .map(|piece| FilterValue::Text(piece.trim().to_string()))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(values: &[&str]) -> Vec<FilterValue> {
        values.iter().map(|v| FilterValue::from(*v)).collect()
    }

    #[test]
    fn packed_text_values_are_split_and_trimmed() {
        assert_eq!(
            split_filter_values(&texts(&["1234, 5678", "  987"])),
            texts(&["1234", "5678", "987"])
        );
    }

    #[test]
    fn numbers_pass_through() {
        let numbers = vec![FilterValue::from(123_i64), FilterValue::from(456_i64)];
        assert_eq!(split_filter_values(&numbers), numbers);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(split_filter_values(&[]).is_empty());
    }

    #[test]
    fn mixed_values_keep_order() {
        let input = vec![FilterValue::from("a,b"), FilterValue::from(7_i64)];
        assert_eq!(
            split_filter_values(&input),
            vec![FilterValue::from("a"), FilterValue::from("b"), FilterValue::from(7_i64)]
        );
    }
}
