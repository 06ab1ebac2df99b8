use std::future::Future;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue, RedisResult};

use crate::config::{ConnectionParams, Credentials};
use crate::error::{CheckError, Result};

/// One transient connection, owned by a single check invocation.
///
/// Every network step is bounded by the instance's socket timeout. Dropping
/// the session closes the socket, so every exit path of a check releases it.
pub struct Session {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl Session {
    /// Open a connection to db 0 without authenticating.
    pub async fn connect(params: &ConnectionParams) -> Result<Self> {
        let timeout = params.timeout();
        let client = redis::Client::open(params.connection_info())
            .map_err(|e| CheckError::Config(format!("invalid connection parameters: {e}")))?;

        let conn = bounded(
            "connection",
            timeout,
            client.get_multiplexed_async_connection(),
        )
        .await?;

        Ok(Self { conn, timeout })
    }

    pub async fn authenticate(&mut self, credentials: Credentials<'_>) -> Result<()> {
        let mut cmd = redis::cmd("AUTH");
        match credentials {
            Credentials::Password(password) => {
                cmd.arg(password);
            }
            Credentials::Acl { username, password } => {
                cmd.arg(username).arg(password);
            }
        }
        let _: () = self.query("AUTH", &cmd).await?;
        Ok(())
    }

    /// Switch to logical database `db`.
    pub async fn select(&mut self, db: i64) -> Result<()> {
        let _: () = self.query("SELECT", redis::cmd("SELECT").arg(db)).await?;
        Ok(())
    }

    /// Run `cmd`, classifying any failure. `what` names the command in
    /// timeout messages.
    pub async fn query<T: FromRedisValue>(&mut self, what: &str, cmd: &Cmd) -> Result<T> {
        bounded(what, self.timeout, cmd.query_async(&mut self.conn)).await
    }
}

async fn bounded<T>(
    what: &str,
    timeout: Duration,
    fut: impl Future<Output = RedisResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(CheckError::from),
        Err(_) => Err(CheckError::timed_out(what, timeout)),
    }
}
