//! SQL text for the recorder schema
//!
//! Values are always bound as parameters. The only interpolated pieces are the
//! interval literal, the table name and the aggregate expression, all of which
//! come from closed enums.

use crate::series::{Aggregation, Interval, StatisticsPeriod};

/// Numeric value of `states.state`, NULL for non-numeric text
pub const NUMERIC_STATE: &str =
    r"CASE WHEN state ~ '^-?[0-9]+\.?[0-9]*$' THEN state::float8 ELSE NULL END";

const USABLE_STATE: &str = "state NOT IN ('unknown', 'unavailable', '')";

pub const ENTITY_METADATA_ID: &str =
    "SELECT metadata_id::int8 AS metadata_id FROM states_meta WHERE entity_id = $1";

pub const STATISTIC_META: &str = "SELECT id::int8 AS id, statistic_id, source, unit_of_measurement \
     FROM statistics_meta WHERE statistic_id = $1";

pub const SERVER_VERSION: &str = "SELECT version()";

pub const TIMESCALEDB_INSTALLED: &str =
    "SELECT COUNT(*)::int8 FROM pg_extension WHERE extname = 'timescaledb'";

pub const RECORDER_TABLES: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_schema = 'public' \
       AND table_name IN ('states', 'states_meta', 'statistics', 'statistics_short_term', 'statistics_meta')";

/// Recent entities. Binds: `$1` since (epoch), `$2` LIKE pattern or NULL, `$3` limit.
pub const ENTITY_CATALOG: &str = "SELECT sm.entity_id, to_timestamp(MAX(s.last_updated_ts)) AS last_seen \
     FROM states_meta sm \
     JOIN states s ON s.metadata_id = sm.metadata_id AND s.last_updated_ts > $1 \
     WHERE ($2::text IS NULL OR sm.entity_id LIKE $2) \
     GROUP BY sm.entity_id \
     ORDER BY last_seen DESC \
     LIMIT $3";

/// Statistic ids. Binds: `$1` LIKE pattern or NULL, `$2` limit.
pub const STATISTIC_CATALOG: &str = "SELECT statistic_id, source, unit_of_measurement \
     FROM statistics_meta \
     WHERE ($1::text IS NULL OR statistic_id LIKE $1) \
     ORDER BY statistic_id \
     LIMIT $2";

/// Bucket expression for `to_timestamp(last_updated_ts)`
pub fn bucket_expression(interval: Interval, timescaledb: bool) -> String {
    if timescaledb {
        format!(
            "time_bucket(INTERVAL '{}', to_timestamp(last_updated_ts))",
            interval.sql_interval()
        )
    } else {
        format!(
            "date_bin(INTERVAL '{}', to_timestamp(last_updated_ts), TIMESTAMPTZ '1970-01-01 00:00:00+00')",
            interval.sql_interval()
        )
    }
}

/// History query for one entity.
///
/// Binds: `$1` metadata_id, `$2` start epoch, `$3` end epoch, `$4` limit. Raw
/// queries return `(ts, state)`; bucketed ones return `(ts, value)`.
pub fn history_query(aggregation: Aggregation, interval: Interval, timescaledb: bool) -> String {
    match aggregation
        .plan()
        .sql_expression(NUMERIC_STATE, "last_updated_ts")
    {
        None => format!(
            "SELECT to_timestamp(last_updated_ts) AS ts, state \
             FROM states \
             WHERE metadata_id = $1 AND last_updated_ts >= $2 AND last_updated_ts < $3 \
               AND {USABLE_STATE} \
             ORDER BY last_updated_ts \
             LIMIT $4"
        ),
        Some(expression) => format!(
            "SELECT {bucket} AS ts, ({expression})::float8 AS value \
             FROM states \
             WHERE metadata_id = $1 AND last_updated_ts >= $2 AND last_updated_ts < $3 \
               AND {USABLE_STATE} \
             GROUP BY 1 \
             ORDER BY 1 \
             LIMIT $4",
            bucket = bucket_expression(interval, timescaledb),
        ),
    }
}

/// Statistics rows. Hourly and 5-minute periods read rows as stored; day and
/// month roll hourly rows up into UTC calendar buckets.
///
/// Binds: `$1` metadata id, `$2` start epoch, `$3` end epoch, `$4` limit.
pub fn statistics_query(period: StatisticsPeriod) -> String {
    let table = period.table();
    match period.rollup_unit() {
        None => format!(
            "SELECT to_timestamp(start_ts) AS ts, \
                    mean::float8 AS mean, min::float8 AS min, max::float8 AS max, sum::float8 AS sum \
             FROM {table} \
             WHERE metadata_id = $1 AND start_ts >= $2 AND start_ts < $3 \
             ORDER BY start_ts \
             LIMIT $4"
        ),
        Some(unit) => {
            let column = |aggregation: Aggregation, name: &str| {
                aggregation
                    .plan()
                    .sql_expression(name, "start_ts")
                    .unwrap_or_else(|| name.to_string())
            };
            format!(
                "SELECT date_trunc('{unit}', to_timestamp(start_ts), 'UTC') AS ts, \
                        ({mean})::float8 AS mean, ({min})::float8 AS min, \
                        ({max})::float8 AS max, ({sum})::float8 AS sum \
                 FROM {table} \
                 WHERE metadata_id = $1 AND start_ts >= $2 AND start_ts < $3 \
                 GROUP BY 1 \
                 ORDER BY 1 \
                 LIMIT $4",
                mean = column(Aggregation::Mean, "mean"),
                min = column(Aggregation::Min, "min"),
                max = column(Aggregation::Max, "max"),
                // `sum` is cumulative in the recorder, so a rollup keeps the last one
                sum = column(Aggregation::Last, "sum"),
            )
        }
    }
}

/// `sensor` becomes `sensor.%`, with LIKE metacharacters escaped
pub fn like_prefix(entity_type: &str) -> String {
    let mut pattern = String::with_capacity(entity_type.len() + 2);
    for c in entity_type.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str(".%");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_query_has_no_grouping() {
        let sql = history_query(Aggregation::Raw, Interval::Hour, false);
        assert!(sql.contains("AS ts, state"));
        assert!(!sql.contains("GROUP BY"));
        assert!(sql.contains("state NOT IN ('unknown', 'unavailable', '')"));
    }

    #[test]
    fn test_aggregate_query_uses_plan() {
        let sql = history_query(Aggregation::Max, Interval::FifteenMinutes, false);
        assert!(sql.contains("MAX(CASE WHEN state ~"));
        assert!(sql.contains("date_bin(INTERVAL '15 minutes'"));

        let sql = history_query(Aggregation::Last, Interval::Hour, true);
        assert!(sql.contains("time_bucket(INTERVAL '1 hour'"));
        assert!(sql.contains("ORDER BY last_updated_ts DESC"));
    }

    #[test]
    fn test_statistics_query_tables() {
        let sql = statistics_query(StatisticsPeriod::FiveMinute);
        assert!(sql.contains("FROM statistics_short_term"));
        assert!(!sql.contains("date_trunc"));

        let sql = statistics_query(StatisticsPeriod::Month);
        assert!(sql.contains("FROM statistics "));
        assert!(sql.contains("date_trunc('month'"));
        assert!(sql.contains("AVG(mean)"));
        assert!(sql.contains("ORDER BY start_ts DESC"));
    }

    #[test]
    fn test_like_prefix_escapes() {
        assert_eq!(like_prefix("sensor"), "sensor.%");
        assert_eq!(like_prefix("binary_sensor"), "binary\\_sensor.%");
        assert_eq!(like_prefix("50%"), "50\\%.%");
    }
}
