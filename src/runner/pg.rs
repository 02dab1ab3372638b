//! `StatementExecutor` over a single PostgreSQL connection.
use crate::*;
use futures::TryStreamExt as _;
use sqlx::{
    AssertSqlSafe, Column as _, ConnectOptions as _, Connection as _, Either, Executor as _, Row as _,
    SqlSafeStr as _, Statement as _, TypeInfo as _, ValueRef as _,
    postgres::{
        PgConnectOptions, PgConnection, PgDatabaseError, PgErrorPosition, PgQueryResult, PgRow,
        PgValueFormat,
    },
};
use std::str::FromStr as _;

pub struct PgExecutor {
    conn: PgConnection,
    options: PgConnectOptions,
    backend_pid: i32,
    autocommit: bool,
    in_transaction: bool,
}

impl PgExecutor {
    pub async fn connect(url: &str, autocommit: bool) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        let conn = options.connect().await?;
        Self::with_connection(conn, options, autocommit).await
    }

    /// Wrap an open connection. `options` must reach the same server, they
    /// are used to open the side connection that cancels statements.
    pub async fn with_connection(
        mut conn: PgConnection,
        options: PgConnectOptions,
        autocommit: bool,
    ) -> Result<Self> {
        let backend_pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut conn)
            .await?;
        debug!(backend_pid, autocommit, "Connected");
        Ok(Self {
            conn,
            options,
            backend_pid,
            autocommit,
            in_transaction: false,
        })
    }

    pub async fn close(self) -> Result {
        self.conn.close().await.map_err(Into::into)
    }

    async fn begin_if_needed(&mut self) -> Result {
        if !self.autocommit && !self.in_transaction {
            sqlx::raw_sql("BEGIN").execute(&mut self.conn).await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// A query matching no rows only reports completion. Its columns are
    /// recovered by preparing the statement, so the output still carries an
    /// empty result set instead of an update count.
    async fn with_empty_result(&mut self, sql: &str, mut output: StatementOutput) -> StatementOutput {
        if !output.result_sets.is_empty() || !is_query(ClauseLocator::default().sql_verb(sql)) {
            return output;
        }
        let prepared = (&mut self.conn)
            .prepare(AssertSqlSafe(sql.to_owned()).into_sql_str())
            .await;
        match prepared {
            Ok(statement) if !statement.columns().is_empty() => {
                let columns = statement.columns().iter().map(|c| c.name().to_string());
                output.result_sets.push(ResultSet::new(columns.collect()));
                output.update_count = None;
            }
            Ok(_) => {}
            Err(err) => debug!("Could not describe empty result: {err}"),
        }
        output
    }

    async fn run_control(&mut self, sql: String) -> Result {
        sqlx::raw_sql(AssertSqlSafe(sql))
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }
}

impl StatementExecutor for PgExecutor {
    type Canceller = PgCanceller;

    async fn execute(&mut self, sql: &str, limits: FetchLimits) -> Result<StatementOutput> {
        self.begin_if_needed().await?;
        let stream = (&mut self.conn).fetch_many(sqlx::raw_sql(AssertSqlSafe(sql.to_owned())));
        let output = collect(stream, limits).await.map_err(|err| locate(err, sql))?;
        Ok(self.with_empty_result(sql, output).await)
    }

    async fn execute_prepared(
        &mut self,
        sql: &str,
        params: &[Value],
        limits: FetchLimits,
    ) -> Result<StatementOutput> {
        self.begin_if_needed().await?;
        let mut query = sqlx::query(AssertSqlSafe(sql.to_owned()));
        for value in params {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Int(i) => query.bind(*i),
                Value::Float(f) => query.bind(*f),
                Value::Text(s) => query.bind(s.clone()),
            };
        }
        let stream = (&mut self.conn).fetch_many(query);
        let output = collect(stream, limits).await.map_err(|err| locate(err, sql))?;
        Ok(self.with_empty_result(sql, output).await)
    }

    async fn commit(&mut self) -> Result {
        self.in_transaction = false;
        self.run_control("COMMIT".to_string()).await
    }

    async fn rollback(&mut self) -> Result {
        self.in_transaction = false;
        self.run_control("ROLLBACK".to_string()).await
    }

    async fn savepoint(&mut self, name: &str) -> Result {
        self.begin_if_needed().await?;
        self.run_control(format!("SAVEPOINT {name}")).await
    }

    async fn release_savepoint(&mut self, name: &str) -> Result {
        self.run_control(format!("RELEASE SAVEPOINT {name}")).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result {
        self.run_control(format!("ROLLBACK TO SAVEPOINT {name}")).await
    }

    fn canceller(&self) -> PgCanceller {
        PgCanceller {
            options: self.options.clone(),
            backend_pid: self.backend_pid,
        }
    }
}

/// Cancels the running statement of a backend from a separate connection.
#[derive(Debug, Clone)]
pub struct PgCanceller {
    options: PgConnectOptions,
    backend_pid: i32,
}

impl StatementCanceller for PgCanceller {
    async fn cancel(&self) -> Result {
        let mut conn = self.options.connect().await?;
        let cancelled: bool = sqlx::query_scalar("SELECT pg_cancel_backend($1)")
            .bind(self.backend_pid)
            .fetch_one(&mut conn)
            .await?;
        debug!(backend_pid = self.backend_pid, cancelled, "Sent cancel request");
        conn.close().await?;
        Ok(())
    }
}

async fn collect<S>(stream: S, limits: FetchLimits) -> Result<StatementOutput>
where
    S: futures::Stream<Item = std::result::Result<Either<PgQueryResult, PgRow>, sqlx::Error>>,
{
    futures::pin_mut!(stream);
    let mut output = StatementOutput::default();
    let mut current: Option<ResultSet> = None;
    let mut bytes = 0usize;

    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => match current.take() {
                Some(result_set) => output.result_sets.push(result_set),
                None => {
                    let count = output.update_count.unwrap_or(0) + done.rows_affected();
                    output.update_count = Some(count);
                }
            },
            Either::Right(row) => {
                let result_set = current.get_or_insert_with(|| {
                    ResultSet::new(row.columns().iter().map(|c| c.name().to_string()).collect())
                });
                if limits
                    .max_rows
                    .is_some_and(|max| result_set.rows.len() >= max)
                {
                    result_set.truncated = true;
                    continue;
                }
                let values = decode_row(&row);
                bytes += values.iter().map(Value::approx_size).sum::<usize>();
                if let Some(max) = limits.max_bytes.filter(|max| bytes > *max) {
                    return Err(Error::ResourceExhausted(format!(
                        "Result exceeds {max} bytes, rows discarded"
                    )));
                }
                result_set.rows.push(values);
            }
        }
    }
    output.result_sets.extend(current);
    Ok(output)
}

fn decode_row(row: &PgRow) -> Vec<Value> {
    (0..row.len()).map(|i| decode(row, i)).collect()
}

fn decode(row: &PgRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();

    // The simple query protocol returns every value as text.
    if raw.format() == PgValueFormat::Text {
        let text = raw.as_str().unwrap_or_default();
        return match type_name.as_str() {
            "BOOL" => Value::Bool(text == "t"),
            "INT2" | "INT4" | "INT8" | "OID" => text
                .parse()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(text.to_string())),
            "FLOAT4" | "FLOAT8" => text
                .parse()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(text.to_string())),
            _ => Value::Text(text.to_string()),
        };
    }

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row.try_get::<i16, _>(index).map(|v| Value::Int(v.into())),
        "INT4" => row.try_get::<i32, _>(index).map(|v| Value::Int(v.into())),
        "INT8" => row.try_get::<i64, _>(index).map(Value::Int),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| Value::Float(v.into())),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::Float),
        _ => row.try_get::<String, _>(index).map(Value::Text),
    };
    decoded.unwrap_or_else(|_| Value::Text(format!("<{type_name}>")))
}

/// Turn server errors into located `Error::Statement`s.
fn locate(err: Error, sql: &str) -> Error {
    match err {
        Error::Database(sqlx::Error::Database(db_error))
            if db_error.try_downcast_ref::<PgDatabaseError>().is_some() =>
        {
            let error = db_error.downcast::<PgDatabaseError>();
            let mut descriptor = ErrorDescriptor::new(error.message()).with_code(error.code());
            if let Some(PgErrorPosition::Original(position)) = error.position() {
                // 1-based character position
                if let Some(offset) = char_to_byte(sql, position.saturating_sub(1)) {
                    descriptor = descriptor.at(sql, offset);
                }
            }
            Error::Statement(descriptor)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn executor(ctx: &IsolatedIntegrationTest, autocommit: bool) -> PgExecutor {
        PgExecutor::connect(&ctx.url, autocommit)
            .await
            .expect("connect to test database")
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn query_returns_typed_rows(ctx: &mut IsolatedIntegrationTest) -> Result {
        let mut pg = executor(ctx, true).await;
        let output = pg
            .execute(
                "SELECT 1 AS one, 'x''y' AS text, NULL AS nothing, true AS flag, 2.5::float8 AS f",
                FetchLimits::default(),
            )
            .await?;
        assert_eq!(output.result_sets.len(), 1);
        let result_set = &output.result_sets[0];
        assert_eq!(result_set.columns, ["one", "text", "nothing", "flag", "f"]);
        assert_eq!(
            result_set.rows,
            [vec![
                Value::Int(1),
                Value::Text("x'y".into()),
                Value::Null,
                Value::Bool(true),
                Value::Float(2.5)
            ]]
        );
        pg.close().await?;
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[rstest]
    #[case::simple(vec![])]
    #[case::prepared(vec![Value::Bool(false)])]
    #[tokio::test]
    async fn query_without_rows_keeps_columns(
        ctx: &mut IsolatedIntegrationTest,
        #[case] params: Vec<Value>,
    ) -> Result {
        let mut pg = executor(ctx, true).await;
        let output = if params.is_empty() {
            pg.execute("SELECT 1 AS a, 'x' AS b WHERE false", FetchLimits::default())
                .await?
        } else {
            pg.execute_prepared("SELECT 1 AS a, 'x' AS b WHERE $1", &params, FetchLimits::default())
                .await?
        };
        assert_eq!(output.update_count, None);
        assert_eq!(output.result_sets.len(), 1);
        assert_eq!(output.result_sets[0].columns, ["a", "b"]);
        assert!(output.result_sets[0].rows.is_empty());
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn dml_reports_update_counts(ctx: &mut IsolatedIntegrationTest) -> Result {
        let mut pg = executor(ctx, true).await;
        let limits = FetchLimits::default();
        pg.execute("CREATE TABLE t (id INT, name TEXT)", limits).await?;
        let inserted = pg
            .execute("INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, 'c')", limits)
            .await?;
        assert_eq!(inserted.update_count, Some(3));

        let updated = pg
            .execute_prepared(
                "UPDATE t SET name = $1 WHERE id >= $2",
                &[Value::from("z"), Value::Int(2)],
                limits,
            )
            .await?;
        assert_eq!(updated.update_count, Some(2));
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn max_rows_truncates(ctx: &mut IsolatedIntegrationTest) -> Result {
        let mut pg = executor(ctx, true).await;
        let limits = FetchLimits {
            max_rows: Some(3),
            max_bytes: None,
        };
        let output = pg.execute("SELECT generate_series(1, 10) AS n", limits).await?;
        assert_eq!(output.result_sets[0].rows.len(), 3);
        assert!(output.result_sets[0].truncated);
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn oversized_result_is_rejected(ctx: &mut IsolatedIntegrationTest) -> Result {
        let mut pg = executor(ctx, true).await;
        let limits = FetchLimits {
            max_rows: None,
            max_bytes: Some(1024),
        };
        let result = pg
            .execute("SELECT repeat('x', 100) FROM generate_series(1, 100)", limits)
            .await;
        assert!(matches!(result, Err(Error::ResourceExhausted(_))));
        // the connection stays usable
        pg.execute("SELECT 1", FetchLimits::default()).await?;
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[rstest]
    #[case("SELECT 1!", "42601", LineColumn { line: 1, column: 10 })]
    #[case("SELECT *\nFROM missing_table", "42P01", LineColumn { line: 2, column: 6 })]
    #[case("SELECT 'ä', col1 FROM (SELECT 1) x", "42703", LineColumn { line: 1, column: 13 })]
    #[tokio::test]
    async fn errors_are_located(
        ctx: &mut IsolatedIntegrationTest,
        #[case] sql: &'static str,
        #[case] code: &'static str,
        #[case] position: LineColumn,
    ) {
        let mut pg = executor(ctx, true).await;
        match pg.execute(sql, FetchLimits::default()).await {
            Err(Error::Statement(descriptor)) => {
                assert_eq!(descriptor.code.as_deref(), Some(code));
                assert_eq!(descriptor.position, Some(position));
                assert_eq!(descriptor.kind, ErrorKind::Statement);
            }
            other => panic!("Expected a statement error, got {other:?}"),
        }
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn manual_commit_and_savepoints(ctx: &mut IsolatedIntegrationTest) -> Result {
        let limits = FetchLimits::default();
        let mut pg = executor(ctx, false).await;
        pg.execute("CREATE TABLE t (id INT PRIMARY KEY)", limits).await?;
        pg.execute("INSERT INTO t VALUES (1)", limits).await?;
        pg.savepoint("s").await?;
        assert!(pg.execute("INSERT INTO t VALUES (1)", limits).await.is_err());
        pg.rollback_to_savepoint("s").await?;
        pg.execute("INSERT INTO t VALUES (2)", limits).await?;
        pg.rollback().await?;

        let mut other = executor(ctx, true).await;
        assert!(other.execute("SELECT * FROM t", limits).await.is_err());

        pg.execute("CREATE TABLE t (id INT PRIMARY KEY)", limits).await?;
        pg.execute("INSERT INTO t VALUES (1), (2)", limits).await?;
        pg.commit().await?;
        let output = other.execute("SELECT count(*) FROM t", limits).await?;
        assert_eq!(output.result_sets[0].rows, [vec![Value::Int(2)]]);
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn canceller_interrupts_running_statement(ctx: &mut IsolatedIntegrationTest) -> Result {
        let mut pg = executor(ctx, true).await;
        let canceller = pg.canceller();
        let cancel = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            canceller.cancel().await
        });
        let result = pg.execute("SELECT pg_sleep(30)", FetchLimits::default()).await;
        cancel.await.expect("cancel task")?;
        match result {
            Err(Error::Statement(descriptor)) => assert_eq!(descriptor.code.as_deref(), Some("57014")),
            other => panic!("Expected a cancelled statement, got {other:?}"),
        }
        pg.execute("SELECT 1", FetchLimits::default()).await?;
        Ok(())
    }
}
