//! Virtual stream combining
//!
//! Several physical streams are merged into one virtual stream by ranking
//! them per virtual object/source pair and aggregating each property across
//! the ranked rows. The aggregate expression depends on the combining type;
//! the CTE templates carrying the ranking and per-kind aggregation are
//! embedded at build time.

use solarnet_core::{CombiningConfig, CombiningType, DatumError, Result, DEFAULT_RANK_PROPERTY};

use crate::statement::{SqlArray, SqlBuilder};

const RANK_MARKER: &str = "{{RANK}}";
const AGG_I_MARKER: &str = "{{AGG_I}}";
const AGG_A_MARKER: &str = "{{AGG_A}}";

/// Embedded CTE templates keyed by combining type name
const TEMPLATES: [(&str, &str); 3] = [
    ("Average", include_str!("../sql/combine-avg.sql")),
    ("Sum", include_str!("../sql/combine-sum.sql")),
    ("Difference", include_str!("../sql/combine-diff.sql")),
];

/// Renders SQL fragments that combine ranked stream values
pub struct CombiningSqlGenerator;

impl CombiningSqlGenerator {
    /// Aggregate `expr` under `combining`, ranking by the default rank column.
    pub fn fragment(combining: CombiningType, expr: &str) -> String {
        Self::fragment_ranked(combining, expr, DEFAULT_RANK_PROPERTY)
    }

    /// Aggregate `expr` under `combining`, ranking by `rank`.
    ///
    /// For [`CombiningType::Difference`] the rank 1 value is added and every
    /// other rank subtracted.
    pub fn fragment_ranked(combining: CombiningType, expr: &str, rank: &str) -> String {
        match combining {
            CombiningType::Average => format!("AVG({expr})"),
            CombiningType::Sum => format!("SUM({expr})"),
            CombiningType::Difference => {
                format!("SUM(CASE {rank} WHEN 1 THEN {expr} ELSE -{expr} END ORDER BY {rank})")
            }
        }
    }

    /// CTE template for `combining`.
    pub fn cte_template(combining: CombiningType) -> Result<&'static str> {
        Self::cte_template_named(combining.name())
    }

    /// CTE template registered under `name`.
    pub fn cte_template_named(name: &str) -> Result<&'static str> {
        TEMPLATES
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, template)| *template)
            .ok_or_else(|| DatumError::UnsupportedCombiningType(name.to_string()))
    }

    /// The template for `config` with rank column and aggregates filled in.
    pub fn render(config: &CombiningConfig) -> Result<String> {
        let rank = config.rank_property()?;
        let template = Self::cte_template(config.combining_type)?;
        let ranked = format!("rs.{rank}");
        let aggregate = Self::fragment_ranked(config.combining_type, "p.val", &ranked);
        Ok(template
            .replace(AGG_I_MARKER, &aggregate)
            .replace(AGG_A_MARKER, &aggregate)
            .replace(RANK_MARKER, rank))
    }
}

/// Write the `vo` and `vs` CTEs mapping real object and source ids to their
/// virtual ids, each as a pair of parallel arrays.
///
/// Ordinality follows the configured order of real ids, which defines rank.
pub(crate) fn write_mapping_ctes(b: &mut SqlBuilder, config: &CombiningConfig) {
    let (virtual_objects, real_objects): (Vec<i64>, Vec<i64>) = config
        .object_id_maps
        .iter()
        .flat_map(|(vid, ids)| ids.iter().map(move |id| (*vid, *id)))
        .unzip();
    let (virtual_sources, real_sources): (Vec<String>, Vec<String>) = config
        .source_id_maps
        .iter()
        .flat_map(|(vid, ids)| ids.iter().map(move |id| (vid.clone(), id.clone())))
        .unzip();

    b.push(", vo AS (\n\tSELECT vo.vobj_id, vo.obj_id, vo.ord\n\tFROM unnest(");
    b.array(SqlArray::BigInt(virtual_objects))
        .push(", ")
        .array(SqlArray::BigInt(real_objects))
        .push(") WITH ORDINALITY AS vo(vobj_id, obj_id, ord)\n)\n");
    b.push(", vs AS (\n\tSELECT vs.vsource_id, vs.source_id, vs.ord\n\tFROM unnest(");
    b.array(SqlArray::Text(virtual_sources))
        .push(", ")
        .array(SqlArray::Text(real_sources))
        .push(") WITH ORDINALITY AS vs(vsource_id, source_id, ord)\n)\n");
}

/// Write the mapping CTEs followed by the rendered combining template.
///
/// Requires an `r` CTE of per-stream `rollup` values and the `s` stream CTE;
/// leaves `rs`, `pi`, `pa`, `ps` and `pt` for the final select.
pub(crate) fn write_combining_ctes(b: &mut SqlBuilder, config: &CombiningConfig) -> Result<()> {
    let rendered = CombiningSqlGenerator::render(config)?;
    write_mapping_ctes(b, config);
    b.push(", ").push(&strip_comments(&rendered)).push("\n");
    Ok(())
}

fn strip_comments(template: &str) -> String {
    template
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{CursorShape, QueryName, SqlParameter};

    #[test]
    fn fragments_are_exact() {
        assert_eq!(CombiningSqlGenerator::fragment(CombiningType::Average, "foo"), "AVG(foo)");
        assert_eq!(CombiningSqlGenerator::fragment(CombiningType::Sum, "foo"), "SUM(foo)");
        assert_eq!(
            CombiningSqlGenerator::fragment(CombiningType::Difference, "foo"),
            "SUM(CASE prank WHEN 1 THEN foo ELSE -foo END ORDER BY prank)"
        );
        assert_eq!(
            CombiningSqlGenerator::fragment_ranked(CombiningType::Difference, "foo", "bar"),
            "SUM(CASE bar WHEN 1 THEN foo ELSE -foo END ORDER BY bar)"
        );
        assert_eq!(
            CombiningSqlGenerator::fragment_ranked(CombiningType::Sum, "foo", "bar"),
            "SUM(foo)"
        );
    }

    #[test]
    fn templates_resolve_by_name() {
        for ty in [CombiningType::Average, CombiningType::Sum, CombiningType::Difference] {
            let template = CombiningSqlGenerator::cte_template(ty).unwrap();
            assert!(template.contains(RANK_MARKER));
            assert!(template.contains(AGG_I_MARKER));
            assert!(template.contains(AGG_A_MARKER));
        }
        let err = CombiningSqlGenerator::cte_template_named("Median").unwrap_err();
        assert!(matches!(err, DatumError::UnsupportedCombiningType(ref name) if name == "Median"));
    }

    #[test]
    fn render_fills_markers() {
        let mut config = CombiningConfig::new(CombiningType::Difference);
        config.rank_property = Some("bar".into());
        let sql = CombiningSqlGenerator::render(&config).unwrap();

        assert!(!sql.contains("{{"));
        assert!(sql.contains("AS bar"));
        assert!(sql.contains("SUM(CASE rs.bar WHEN 1 THEN p.val ELSE -p.val END ORDER BY rs.bar) AS val"));
        assert!(sql.contains("WHERE rs.bar = 1"));
    }

    #[test]
    fn render_rejects_bad_rank_property() {
        let mut config = CombiningConfig::new(CombiningType::Sum);
        config.rank_property = Some("x) OR (1=1".into());
        assert!(matches!(
            CombiningSqlGenerator::render(&config),
            Err(DatumError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn mapping_arrays_follow_rank_order() {
        let config = CombiningConfig::new(CombiningType::Sum)
            .with_object_map(100, vec![3, 1])
            .with_source_map("V", ["b", "a"]);
        let mut b = SqlBuilder::new();
        write_mapping_ctes(&mut b, &config);
        let statement = b
            .finish(QueryName::FindDatumPartialAggregate, CursorShape::default())
            .unwrap();

        assert!(statement
            .sql
            .contains("FROM unnest($1::bigint[], $2::bigint[]) WITH ORDINALITY AS vo(vobj_id, obj_id, ord)"));
        assert!(statement
            .sql
            .contains("FROM unnest($3::text[], $4::text[]) WITH ORDINALITY AS vs(vsource_id, source_id, ord)"));
        assert_eq!(
            statement.parameters,
            vec![
                SqlParameter::Array(SqlArray::BigInt(vec![100, 100])),
                SqlParameter::Array(SqlArray::BigInt(vec![3, 1])),
                SqlParameter::Array(SqlArray::Text(vec!["V".into(), "V".into()])),
                SqlParameter::Array(SqlArray::Text(vec!["b".into(), "a".into()])),
            ]
        );
    }

    #[test]
    fn empty_mappings_still_bind() {
        let config = CombiningConfig::new(CombiningType::Average);
        let mut b = SqlBuilder::new();
        write_combining_ctes(&mut b, &config).unwrap();
        let statement = b
            .finish(QueryName::FindDatumPartialAggregate, CursorShape::default())
            .unwrap();
        assert_eq!(statement.parameters.len(), 4);
        assert!(statement.parameters.iter().all(|p| matches!(p, SqlParameter::Array(a) if a.is_empty())));
        assert!(statement.sql.contains(", rs AS ("));
        assert!(!statement.sql.contains("--"));
    }
}
