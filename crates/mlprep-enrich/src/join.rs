//! Key-based join plumbing.

use polars::prelude::*;

use mlprep_model::Result;

/// Synthetic constant key appended to both sides of a deliberate cross
/// join, used to broadcast a table that shares no natural key with the
/// base.
pub const CROSS_JOIN_KEY: &str = "$join_key";

/// Join two frames on equally-named key columns.
pub fn join_on(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[String],
    how: JoinType,
) -> Result<DataFrame> {
    let left_on: Vec<Expr> = keys.iter().map(|key| col(key.as_str())).collect();
    let right_on = left_on.clone();
    let joined = left
        .clone()
        .lazy()
        .join(right.clone().lazy(), left_on, right_on, JoinArgs::new(how))
        .collect()?;
    Ok(joined)
}

/// Append the synthetic cross-join key unless it is already present.
///
/// Append-only: the key is never removed from a registered table once a
/// cross join has required it.
pub fn ensure_cross_join_key(df: &mut DataFrame) -> Result<()> {
    if df.column(CROSS_JOIN_KEY).is_err() {
        let height = df.height();
        df.with_column(Column::new(CROSS_JOIN_KEY.into(), vec![0i32; height]))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_join_key_is_appended_once() {
        let mut df = DataFrame::new(vec![Series::new("a".into(), &[1i64, 2]).into()]).unwrap();
        ensure_cross_join_key(&mut df).unwrap();
        ensure_cross_join_key(&mut df).unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(df.column(CROSS_JOIN_KEY).unwrap().i32().unwrap().get(1), Some(0));
    }

    #[test]
    fn join_on_inner_matches_keys() {
        let left = DataFrame::new(vec![
            Series::new("k".into(), &[1i64, 2, 3]).into(),
            Series::new("v".into(), &[10i64, 20, 30]).into(),
        ])
        .unwrap();
        let right = DataFrame::new(vec![
            Series::new("k".into(), &[2i64, 3, 4]).into(),
            Series::new("w".into(), &[200i64, 300, 400]).into(),
        ])
        .unwrap();

        let joined = join_on(&left, &right, &["k".to_string()], JoinType::Inner).unwrap();
        assert_eq!(joined.height(), 2);
        assert!(joined.column("v").is_ok());
        assert!(joined.column("w").is_ok());
    }
}
