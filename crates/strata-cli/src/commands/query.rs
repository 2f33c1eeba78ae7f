//! Compile and query commands - build and run analytical queries.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::Value;

use strata_core::human_time::parse_human_datetime;
use strata_query::{FilterClause, OrderBy, QueryRequest};
use strata_remote::FilterValue;

use crate::{OutputFormat, Session};

const DEFAULT_FROM: &str = "7 days ago";

/// Arguments shared by the compile and query commands.
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Registry name.
    #[arg(long, short = 'r')]
    pub registry: String,

    /// Cube name.
    #[arg(long, short = 'c')]
    pub cube: String,

    /// Read the whole request from a JSON file; the query flags below are ignored.
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Time bucketing, e.g. "1 day", "1 hour" or "all".
    #[arg(long, short = 'g', default_value = "all")]
    pub granularity: String,

    /// Range start: a date, a datetime, "today" or "N days ago".
    /// Defaults to --since when that is given, else "7 days ago".
    #[arg(long)]
    pub from: Option<String>,

    /// Range end, in the same forms as --from.
    #[arg(long, default_value = "now")]
    pub to: String,

    /// Group-by fields (repeatable or comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub groupby: Vec<String>,

    /// Metrics (repeatable or comma-separated).
    #[arg(long = "metric", short = 'm', value_delimiter = ',')]
    pub metrics: Vec<String>,

    /// Filter as COLUMN:OPERATOR:VALUES, e.g. "Advertiser ID:in:1234,5678".
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<FilterClause>,

    /// Sort key as FIELD or FIELD:asc / FIELD:desc (repeatable).
    #[arg(long = "order", value_parser = parse_order)]
    pub orderby: Vec<OrderBy>,

    /// Maximum rows to return.
    #[arg(long, default_value = "1000")]
    pub row_limit: u32,

    /// Relative start such as "10 hours ago"; also narrows daily queries to
    /// those hours when the cube keeps hourly data.
    #[arg(long)]
    pub since: Option<String>,

    /// Return a flat result instead of a time series.
    #[arg(long)]
    pub no_timeseries: bool,
}

impl QueryArgs {
    /// Builds the request, resolving relative times against `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request file cannot be read or a time bound
    /// cannot be parsed.
    pub fn to_request(&self, now: NaiveDateTime) -> Result<QueryRequest> {
        if let Some(path) = &self.request {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read request file: {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse request JSON: {}", path.display()));
        }

        let from = match (&self.from, &self.since) {
            (Some(from), _) => parse_human_datetime(from, now).context("Invalid --from")?,
            (None, Some(since)) => parse_human_datetime(since, now).context("Invalid --since")?,
            (None, None) => parse_human_datetime(DEFAULT_FROM, now)?,
        };
        let to = parse_human_datetime(&self.to, now).context("Invalid --to")?;
        let mut request = QueryRequest::new(self.granularity.clone(), from, to);
        request.groupby.clone_from(&self.groupby);
        request.metrics.clone_from(&self.metrics);
        request.filters.clone_from(&self.filters);
        request.orderby.clone_from(&self.orderby);
        request.row_limit = self.row_limit;
        request.is_timeseries = !self.no_timeseries;
        if let Some(since) = &self.since {
            request.extras.insert("since".to_string(), since.clone());
        }
        Ok(request)
    }
}

fn parse_filter(raw: &str) -> Result<FilterClause, String> {
    let mut parts = raw.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(col), Some(op), Some(values)) if !col.trim().is_empty() && !op.trim().is_empty() => {
            Ok(FilterClause::new(
                col.trim(),
                op.trim(),
                vec![FilterValue::Text(values.to_string())],
            ))
        }
        _ => Err(format!("expected COLUMN:OPERATOR:VALUES, got '{raw}'")),
    }
}

fn parse_order(raw: &str) -> Result<OrderBy, String> {
    let (field, direction) = match raw.rsplit_once(':') {
        Some((field, direction)) => (field, direction.to_ascii_lowercase()),
        None => (raw, "desc".to_string()),
    };
    let ascending = match direction.as_str() {
        "asc" => true,
        "desc" => false,
        other => return Err(format!("unknown sort direction '{other}'")),
    };
    Ok(OrderBy {
        field: field.to_string(),
        ascending,
    })
}

/// Execute the compile command.
///
/// # Errors
///
/// Returns an error if the cube is unknown or the request breaks the
/// cube's policy.
pub fn compile(args: &QueryArgs, session: &Session) -> Result<()> {
    let now = Utc::now().naive_utc();
    let cube_id = session.cube_id(&args.registry, &args.cube)?;
    let request = args.to_request(now)?;
    let compiled = session.query_service().compile(cube_id, &request, now)?;

    match session.format() {
        OutputFormat::Json => println!("{}", compiled.to_json()),
        OutputFormat::Text => {
            println!(
                "{} {} grain, {} to {}",
                "Compiled".green(),
                compiled.grain,
                compiled.from,
                compiled.to
            );
            println!("{}", serde_json::to_string_pretty(&compiled.document)?);
        }
    }
    Ok(())
}

/// Execute the query command.
///
/// An empty result prints "No data" and succeeds.
///
/// # Errors
///
/// Returns an error if the cube is unknown, the request breaks the cube's
/// policy, or the remote call fails.
pub async fn execute(args: &QueryArgs, session: &Session) -> Result<()> {
    let now = Utc::now().naive_utc();
    let cube_id = session.cube_id(&args.registry, &args.cube)?;
    let request = args.to_request(now)?;
    let ctx = session.context();

    let result = match session
        .query_service()
        .run_at(&ctx, cube_id, &request, now)
        .await
    {
        Ok(result) => result,
        Err(e) if e.is_no_data() => {
            match session.format() {
                OutputFormat::Json => println!("{}", serde_json::json!({"noData": true, "requestId": ctx.request_id()})),
                OutputFormat::Text => println!("No data"),
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match session.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let set = &result.result_set;
            println!("{}", set.columns.join("\t").bold());
            for row in &set.rows {
                let cells: Vec<String> = row.iter().map(cell_text).collect();
                println!("{}", cells.join("\t"));
            }
            println!(
                "{}",
                format!(
                    "{} row(s) in {} ms (request {})",
                    set.len(),
                    result.duration.as_millis(),
                    result.request_id
                )
                .dimmed()
            );
        }
    }
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};
    use clap::Parser;
    use strata_catalog::Grain;
    use strata_query::{CompilerSettings, PolicyView, compile};
    use strata_remote::FilterExpression;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: QueryArgs,
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 8, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn flags_build_a_request() {
        let cli = TestCli::parse_from([
            "test",
            "-r",
            "prod",
            "-c",
            "keyword_stats",
            "-g",
            "1 day",
            "--from",
            "3 days ago",
            "--to",
            "today",
            "--groupby",
            "Advertiser ID",
            "-m",
            "Clicks,Spend",
            "--filter",
            "Advertiser ID:in:1234, 5678",
            "--order",
            "Spend:asc",
            "--since",
            "10 hours ago",
        ]);
        let request = cli.args.to_request(now()).unwrap();

        assert_eq!(request.granularity, "1 day");
        assert_eq!(request.from, now() - chrono::TimeDelta::days(3));
        assert_eq!(request.to.date(), now().date());
        assert_eq!(request.metrics, vec!["Clicks", "Spend"]);
        assert_eq!(request.groupby, vec!["Advertiser ID"]);
        assert_eq!(request.filters[0].col, "Advertiser ID");
        assert_eq!(request.filters[0].op, "in");
        assert_eq!(request.orderby[0].field, "Spend");
        assert!(request.orderby[0].ascending);
        assert_eq!(request.since(), Some("10 hours ago"));
        assert!(request.is_timeseries);
    }

    #[test]
    fn malformed_filter_is_rejected() {
        assert!(parse_filter("Advertiser ID").is_err());
        assert!(parse_filter(":in:1").is_err());
        assert!(parse_filter("Day:between:2017-08-01").is_ok());
    }

    #[test]
    fn order_defaults_to_descending() {
        let order = parse_order("Clicks").unwrap();
        assert!(!order.ascending);
        assert!(parse_order("Clicks:sideways").is_err());
    }

    #[test]
    fn unparseable_time_is_an_error() {
        let cli = TestCli::parse_from(["test", "-r", "prod", "-c", "x", "--from", "whenever"]);
        assert!(cli.args.to_request(now()).is_err());
    }

    #[test]
    fn since_sets_the_start_when_from_is_absent() {
        let at = now() + TimeDelta::hours(3);
        let cli = TestCli::parse_from([
            "test", "-r", "prod", "-c", "keyword_stats", "-g", "1 day", "-m", "Clicks", "--since",
            "10 hours ago",
        ]);
        let request = cli.args.to_request(at).unwrap();
        assert_eq!(request.from, at - TimeDelta::hours(10));
        assert_eq!(request.to, at);

        let hourly = PolicyView::from_rows([(Grain::HourlyGrain, Some(14), Some(7))]);
        let compiled =
            compile("keyword_stats", &hourly, &request, at, &CompilerSettings::default()).unwrap();
        assert_eq!(
            compiled.document.filter_expressions,
            vec![
                FilterExpression::between("Day", "2017-08-10", "2017-08-10"),
                FilterExpression::between("Hour", "5", "15"),
            ]
        );
    }

    #[test]
    fn explicit_from_wins_over_since() {
        let cli = TestCli::parse_from([
            "test", "-r", "prod", "-c", "x", "--from", "2017-08-01", "--since", "10 hours ago",
        ]);
        let request = cli.args.to_request(now()).unwrap();
        assert_eq!(request.from.date(), NaiveDate::from_ymd_opt(2017, 8, 1).unwrap());
        assert_eq!(request.since(), Some("10 hours ago"));
    }

    #[test]
    fn start_defaults_to_a_week_back() {
        let cli = TestCli::parse_from(["test", "-r", "prod", "-c", "x"]);
        let request = cli.args.to_request(now()).unwrap();
        assert_eq!(request.from, now() - TimeDelta::days(7));
    }
}
