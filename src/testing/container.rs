use crate::*;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::{Duration, Instant};
use testcontainers::{
    ContainerRequest, GenericImage, ImageExt,
    core::{IntoContainerPort as _, WaitFor, logs::LogFrame},
    runners::AsyncRunner as _,
};
use tokio::sync::OnceCell;

pub type Container = testcontainers::ContainerAsync<GenericImage>;

const PG_IMAGE: (&str, &str) = ("postgres", "16-alpine");
const PG_PORT: u16 = 5432;
const PG_USER: &str = "sqlbench";
const PG_PASS: &str = "sqlbench";
const START_ATTEMPTS: u8 = 5;

/// Server flags for a throwaway cluster. Durability is off. Lock waits give
/// up after ten seconds and failing statements are written to the log.
const PG_FLAGS: [&str; 6] = [
    "fsync=off",
    "synchronous_commit=off",
    "full_page_writes=off",
    "max_connections=200",
    "log_min_error_statement=error",
    "lock_timeout=10s",
];

/// The one PostgreSQL server shared by every integration test in the process.
pub async fn postgres() -> &'static Container {
    static POSTGRES: OnceCell<Container> = OnceCell::const_new();
    POSTGRES
        .get_or_init(|| async {
            match start_with_retries().await {
                Ok(container) => container,
                Err(e) => panic!("PostgreSQL test server did not start: {e}"),
            }
        })
        .await
}

async fn start_with_retries() -> Result<Container> {
    let mut last_error = None;
    for attempt in 1..=START_ATTEMPTS {
        let started = Instant::now();
        match request().start().await {
            Ok(container) => {
                debug!(attempt, "PostgreSQL test server up in {:.2?}", started.elapsed());
                return Ok(container);
            }
            Err(e) => {
                warn!("Starting PostgreSQL, attempt {attempt}/{START_ATTEMPTS}: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(Error::Internal(format!(
        "gave up after {START_ATTEMPTS} attempts: {last_error:?}"
    )))
}

/// Connection URL for `database` on the shared server; this is what the
/// executor under test connects with.
pub(super) async fn url(database: &str) -> String {
    let server = postgres().await;
    let host = server.get_host().await.expect("container host");
    let port = server
        .get_host_port_ipv4(PG_PORT)
        .await
        .expect("container port");
    format!("postgres://{PG_USER}:{PG_PASS}@{host}:{port}/{database}")
}

/// Admin pool used by fixtures to create, inspect and drop test databases.
pub(super) async fn pool(database: &str) -> PgPool {
    PgPoolOptions::new()
        .max_connections(3)
        .connect(&url(database).await)
        .await
        .expect("admin pool for test database")
}

fn request() -> ContainerRequest<GenericImage> {
    let (name, tag) = PG_IMAGE;
    let mut cmd = vec!["postgres".to_string()];
    for flag in PG_FLAGS {
        cmd.extend(["-c".to_string(), flag.to_string()]);
    }

    let mut request = GenericImage::new(name, tag)
        .with_exposed_port(PG_PORT.tcp())
        // initdb runs a temporary server first; only the final one listens on IPv6
        .with_wait_for(WaitFor::message_on_stderr("listening on IPv6 address"))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_USER", PG_USER)
        .with_env_var("POSTGRES_PASSWORD", PG_PASS)
        .with_env_var("POSTGRES_DB", "postgres")
        .with_cmd(cmd);

    if config().container_logs {
        request = request.with_log_consumer(|line: &LogFrame| trace!("[postgres] {line:?}"));
    }

    if config().container_ramdisked {
        const SHM_BYTES: u64 = 1024 * 1024 * 1024;
        request = request
            .with_env_var("PGDATA", "/dev/shm/pgdata")
            .with_shm_size(SHM_BYTES);
    }

    request.with_startup_timeout(Duration::from_secs(60))
}
