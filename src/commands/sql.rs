//! SQL command implementation

use crate::config::Config;
use crate::error::Result;
use crate::store::{ExecOutcome, Store};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

/// Output of `docsight sql`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "result", rename_all = "lowercase")]
pub enum SqlOutput {
    Rows(Vec<Map<String, Value>>),
    Executed(ExecOutcome),
    Script { rows_affected: u64 },
}

/// Parse a `--param` value as JSON, falling back to a plain string
pub fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Whether the statement produces rows
fn returns_rows(statement: &str) -> bool {
    let keyword = statement
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "PRAGMA" | "EXPLAIN" | "VALUES"
    ) || statement.to_ascii_uppercase().contains(" RETURNING ")
}

/// Run a statement against the store
pub async fn cmd_sql(
    config: &Config,
    statement: &str,
    params: &[String],
    raw: bool,
) -> Result<SqlOutput> {
    info!("Running SQL against {:?}", config.paths.db_file);

    let store = Store::open(&config.paths.db_file, &config.store).await?;
    let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();

    let output = if raw {
        SqlOutput::Script {
            rows_affected: store.execute_raw(statement).await?,
        }
    } else if returns_rows(statement) {
        SqlOutput::Rows(store.query(statement, &params).await?)
    } else {
        SqlOutput::Executed(store.execute(statement, &params).await?)
    };

    store.close().await;
    Ok(output)
}

/// Print SQL output to console
pub fn print_sql_output(output: &SqlOutput) -> Result<()> {
    match output {
        SqlOutput::Rows(rows) => {
            for row in rows {
                println!("{}", serde_json::to_string(row)?);
            }
            println!("({} rows)", rows.len());
        }
        SqlOutput::Executed(outcome) => {
            println!(
                "✓ {} row(s) affected, last rowid {}",
                outcome.rows_affected, outcome.last_insert_rowid
            );
        }
        SqlOutput::Script { rows_affected } => {
            println!("✓ Script executed, {} row(s) affected", rows_affected);
        }
    }
    Ok(())
}
