#![cfg(test)]
crate::reexport!(container);
crate::reexport!(context);
crate::reexport!(mock);
pub use rstest::*;

pub(in crate::testing) fn common_init() {
    use std::sync::Once;
    use tracing_subscriber::EnvFilter;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Only initialize once for all tests
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env()) // <- reads RUST_LOG
            .with_test_writer() // ensures it integrates with `cargo test` output
            .init();
    });
}

mod isolated_integration_tests {
    use super::{super::*, *};

    async fn session(ctx: &IsolatedIntegrationTest, autocommit: bool) -> Session<PgExecutor> {
        Session::new(
            PgExecutor::connect(&ctx.url, autocommit)
                .await
                .expect("connect to test database"),
        )
    }

    fn settings(policy: ErrorPolicy) -> RunSettings {
        RunSettings {
            options: ExecOptions {
                error_policy: policy,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn runs_script_end_to_end(ctx: &mut IsolatedIntegrationTest) -> Result {
        let script = r#"
            CREATE TABLE people (id INT PRIMARY KEY, name TEXT);
            -- a comment between statements ; with a semicolon
            INSERT INTO people VALUES (1, 'a;b'), (2, 'c');;
            CREATE FUNCTION shout(t TEXT) RETURNS TEXT AS $$
            BEGIN
                RETURN upper(t);
            END;
            $$ LANGUAGE plpgsql;
            UPDATE people SET name = shout(name) WHERE id = 2;
        "#;
        let stats = session(ctx, true)
            .await
            .start(script, NoPrompts, TracingListener, settings(ErrorPolicy::Abort))?
            .join()
            .await?;
        assert_eq!(stats.state, RunState::Completed);
        assert_eq!((stats.executed, stats.failed), (4, 0));
        assert_eq!(stats.total_update_count, 3);

        let name: String = sqlx::query_scalar("SELECT name FROM people WHERE id = 2")
            .fetch_one(&ctx.pool)
            .await?;
        assert_eq!(name, "C");
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn ignore_all_counts_every_failure(ctx: &mut IsolatedIntegrationTest) -> Result {
        let script = "CREATE TABLE t (id INT PRIMARY KEY);
            INSERT INTO t VALUES (1);
            INSERT INTO t VALUES (1);
            SELECT * FROM missing;
            INSERT INTO t VALUES (2);";
        let stats = session(ctx, true)
            .await
            .start(script, NoPrompts, TracingListener, settings(ErrorPolicy::IgnoreAll))?
            .join()
            .await?;
        assert_eq!((stats.executed, stats.failed), (5, 2));

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM t")
            .fetch_one(&ctx.pool)
            .await?;
        assert_eq!(count, 2);
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn cancel_interrupts_server_statement(ctx: &mut IsolatedIntegrationTest) -> Result {
        let session = session(ctx, true).await;
        let handle = session.start(
            "SELECT pg_sleep(30); SELECT 1",
            NoPrompts,
            TracingListener,
            settings(ErrorPolicy::IgnoreAll),
        )?;
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        handle.cancel();
        let stats = handle.join().await?;
        assert_eq!(stats.state, RunState::Cancelled);
        assert!(!session.is_busy());

        let stats = session
            .start("SELECT 1", NoPrompts, TracingListener, settings(ErrorPolicy::Abort))?
            .join()
            .await?;
        assert_eq!(stats.state, RunState::Completed);
        Ok(())
    }

    #[test_context(IsolatedIntegrationTest)]
    #[tokio::test]
    async fn manual_commit_is_left_to_the_caller(ctx: &mut IsolatedIntegrationTest) -> Result {
        let session = session(ctx, false).await;
        let mut settings = settings(ErrorPolicy::IgnoreAll);
        settings.options.autocommit = false;
        settings.options.use_savepoint = true;
        let script = "CREATE TABLE t (id INT PRIMARY KEY);
            INSERT INTO t VALUES (1);
            INSERT INTO t VALUES (1);
            INSERT INTO t VALUES (2);";
        let stats = session
            .start(script, NoPrompts, TracingListener, settings)?
            .join()
            .await?;
        assert_eq!(stats.failed, 1);

        let visible: Option<i64> = sqlx::query_scalar("SELECT count(*) FROM pg_tables WHERE tablename = 't'")
            .fetch_optional(&ctx.pool)
            .await?;
        assert_eq!(visible, Some(0));

        session.end_transaction(true).await?;
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM t")
            .fetch_one(&ctx.pool)
            .await?;
        assert_eq!(count, 2);
        Ok(())
    }
}
