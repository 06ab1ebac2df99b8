//! In-process fake Redis server speaking just enough RESP2 for the check.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const PASSWORD: &str = "devops-best-friend";
pub const USERNAME: &str = "testuser";

pub const INFO: &str = "\
# Server\r
redis_version:7.2.4\r
redis_mode:standalone\r
\r
# Clients\r
connected_clients:2\r
blocked_clients:0\r
\r
# Memory\r
used_memory:1048576\r
used_memory_rss:2097152\r
mem_fragmentation_ratio:2.00\r
\r
# Stats\r
total_commands_processed:4242\r
instantaneous_ops_per_sec:7\r
keyspace_hits:30\r
keyspace_misses:3\r
\r
# Replication\r
role:master\r
connected_slaves:0\r
master_repl_offset:0\r
\r
# Keyspace\r
db0:keys=3,expires=1,avg_ttl=1500\r
";

pub const COMMANDSTATS: &str = "\
# Commandstats\r
cmdstat_get:calls=21,usec=175,usec_per_call=8.33\r
cmdstat_info:calls=4,usec=300,usec_per_call=75.00\r
";

const CLIENT_LIST: &str = "\
id=3 addr=127.0.0.1:50001 fd=8 name=app age=10 idle=0 cmd=get\n\
id=4 addr=127.0.0.1:50002 fd=9 name=app age=9 idle=1 cmd=set\n\
id=5 addr=127.0.0.1:50003 fd=10 name= age=3 idle=3 cmd=client|list\n";

// ─── Server configuration ────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AclUser {
    pub name: String,
    pub password: String,
    /// Lowercased command names answered with NOPERM.
    pub denied: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Password of the default user.
    pub requirepass: Option<String>,
    pub users: Vec<AclUser>,
    /// Keys visible to SCAN/TYPE: name → (type, length).
    pub keys: HashMap<String, (String, i64)>,
    /// Logical db holding `keys`; other dbs are empty.
    pub keys_db: i64,
    /// Accept and read, but never reply.
    pub unresponsive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            requirepass: None,
            users: Vec::new(),
            keys: HashMap::new(),
            keys_db: 0,
            unresponsive: false,
        }
    }
}

impl ServerConfig {
    pub fn with_password(password: &str) -> Self {
        Self {
            requirepass: Some(password.to_owned()),
            ..Self::default()
        }
    }

    /// Default user disabled; one ACL user that cannot run `denied`.
    pub fn with_acl_user(name: &str, password: &str, denied: &[&str]) -> Self {
        Self {
            users: vec![AclUser {
                name: name.to_owned(),
                password: password.to_owned(),
                denied: denied.iter().map(|c| c.to_lowercase()).collect(),
            }],
            ..Self::default()
        }
    }

    fn auth_required(&self) -> bool {
        self.requirepass.is_some() || !self.users.is_empty()
    }
}

// ─── Server handle ───────────────────────────────────────────────

pub struct FakeRedis {
    /// `None` when listening on a unix socket.
    addr: Option<SocketAddr>,
    open: Arc<AtomicUsize>,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeRedis {
    pub async fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake redis");
        let addr = listener.local_addr().expect("local addr");
        let open = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(config);

        let task = {
            let open = open.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    spawn_connection(stream, config.clone(), &open, &accepted);
                }
            })
        };

        Self {
            addr: Some(addr),
            open,
            accepted,
            task,
        }
    }

    #[cfg(unix)]
    pub async fn start_unix(config: ServerConfig, path: &Path) -> Self {
        let listener = tokio::net::UnixListener::bind(path).expect("bind fake redis socket");
        let open = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));
        let config = Arc::new(config);

        let task = {
            let open = open.clone();
            let accepted = accepted.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    spawn_connection(stream, config.clone(), &open, &accepted);
                }
            })
        };

        Self {
            addr: None,
            open,
            accepted,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.expect("tcp fake redis").port()
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Wait until every accepted connection has been closed by the client.
    pub async fn wait_until_idle(&self, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.open.load(Ordering::SeqCst) == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.open.load(Ordering::SeqCst) == 0
    }
}

impl Drop for FakeRedis {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ─── Connection handling ─────────────────────────────────────────

enum Reply {
    Simple(&'static str),
    Error(String),
    Int(i64),
    Bulk(String),
    Array(Vec<Reply>),
}

impl Reply {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Simple(s) => out.extend_from_slice(format!("+{s}\r\n").as_bytes()),
            Self::Error(e) => out.extend_from_slice(format!("-{e}\r\n").as_bytes()),
            Self::Int(i) => out.extend_from_slice(format!(":{i}\r\n").as_bytes()),
            Self::Bulk(b) => {
                out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
                out.extend_from_slice(b.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Self::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }
}

struct ConnState {
    user: Option<String>,
    db: i64,
}

fn spawn_connection<S>(
    stream: S,
    config: Arc<ServerConfig>,
    open: &Arc<AtomicUsize>,
    accepted: &AtomicUsize,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    accepted.fetch_add(1, Ordering::SeqCst);
    open.fetch_add(1, Ordering::SeqCst);
    let open = open.clone();
    tokio::spawn(async move {
        let _ = serve(stream, &config).await;
        open.fetch_sub(1, Ordering::SeqCst);
    });
}

async fn serve<S: AsyncRead + AsyncWrite>(stream: S, config: &ServerConfig) -> io::Result<()> {
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = RespReader::new(read_half);
    let mut state = ConnState {
        user: (!config.auth_required()).then(|| "default".to_owned()),
        db: 0,
    };

    while let Some(args) = reader.read_command().await? {
        if config.unresponsive {
            continue;
        }
        let reply = dispatch(&args, &mut state, config);
        let mut out = Vec::new();
        reply.encode(&mut out);
        write_half.write_all(&out).await?;
    }
    Ok(())
}

fn dispatch(args: &[String], state: &mut ConnState, config: &ServerConfig) -> Reply {
    let Some(command) = args.first().map(|c| c.to_lowercase()) else {
        return Reply::Error("ERR empty command".into());
    };
    let sub = args.get(1).map(|s| s.to_lowercase()).unwrap_or_default();

    if command == "auth" {
        return auth(&args[1..], state, config);
    }
    // Connection metadata is sent before AUTH; accept it regardless.
    if command == "client" && sub == "setinfo" {
        return Reply::Simple("OK");
    }

    let Some(user) = state.user.clone() else {
        return Reply::Error("NOAUTH Authentication required.".into());
    };
    let full_name = if command == "client" || command == "slowlog" {
        format!("{command}|{sub}")
    } else {
        command.clone()
    };
    if let Some(acl) = config.users.iter().find(|u| u.name == user) {
        if acl.denied.contains(&command) || acl.denied.contains(&full_name) {
            return Reply::Error(format!(
                "NOPERM User {user} has no permissions to run the '{full_name}' command"
            ));
        }
    }

    match command.as_str() {
        "ping" => Reply::Simple("PONG"),
        "select" => match sub.parse::<i64>() {
            Ok(db) if (0..16).contains(&db) => {
                state.db = db;
                Reply::Simple("OK")
            }
            Ok(_) => Reply::Error("ERR DB index is out of range".into()),
            Err(_) => Reply::Error("ERR value is not an integer or out of range".into()),
        },
        "info" if sub == "commandstats" => Reply::Bulk(COMMANDSTATS.into()),
        "info" => Reply::Bulk(INFO.into()),
        "client" if sub == "list" => Reply::Bulk(CLIENT_LIST.into()),
        "slowlog" if sub == "get" => Reply::Array(vec![
            slowlog_entry(2, 15_000, &["KEYS", "*"]),
            slowlog_entry(1, 12_500, &["HGETALL", "user:1"]),
        ]),
        "scan" => scan(args, state, config),
        "type" => {
            let kind = args
                .get(1)
                .and_then(|k| lookup(k, state, config))
                .map(|(t, _)| t.clone())
                .unwrap_or_else(|| "none".into());
            Reply::Bulk(kind)
        }
        "llen" | "scard" | "zcard" | "hlen" | "xlen" | "strlen" => {
            let len = args
                .get(1)
                .and_then(|k| lookup(k, state, config))
                .map(|(_, l)| *l)
                .unwrap_or(0);
            Reply::Int(len)
        }
        _ => Reply::Error(format!("ERR unknown command '{command}'")),
    }
}

fn auth(args: &[String], state: &mut ConnState, config: &ServerConfig) -> Reply {
    let (user, password) = match args {
        [password] => ("default", password.as_str()),
        [user, password] => (user.as_str(), password.as_str()),
        _ => return Reply::Error("ERR wrong number of arguments for 'auth' command".into()),
    };

    let ok = if user == "default" {
        match &config.requirepass {
            Some(expected) => expected == password,
            None if config.users.is_empty() => {
                return Reply::Error(
                    "ERR AUTH <password> called without any password configured for the default user. Are you sure your configuration is correct?".into(),
                );
            }
            None => false,
        }
    } else {
        config
            .users
            .iter()
            .any(|u| u.name == user && u.password == password)
    };

    if ok {
        state.user = Some(user.to_owned());
        Reply::Simple("OK")
    } else {
        Reply::Error("WRONGPASS invalid username-password pair or user is disabled.".into())
    }
}

fn slowlog_entry(id: i64, micros: i64, argv: &[&str]) -> Reply {
    Reply::Array(vec![
        Reply::Int(id),
        Reply::Int(1_700_000_000 + id),
        Reply::Int(micros),
        Reply::Array(argv.iter().map(|a| Reply::Bulk((*a).to_owned())).collect()),
        Reply::Bulk("127.0.0.1:50001".into()),
        Reply::Bulk(String::new()),
    ])
}

fn lookup<'a>(key: &str, state: &ConnState, config: &'a ServerConfig) -> Option<&'a (String, i64)> {
    if state.db != config.keys_db {
        return None;
    }
    config.keys.get(key)
}

fn scan(args: &[String], state: &ConnState, config: &ServerConfig) -> Reply {
    let pattern = args
        .iter()
        .position(|a| a.eq_ignore_ascii_case("match"))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .unwrap_or("*");

    let names: Vec<_> = config
        .keys
        .keys()
        .filter(|_| state.db == config.keys_db)
        .filter(|k| glob_match(pattern, k))
        .map(|k| Reply::Bulk(k.clone()))
        .collect();

    Reply::Array(vec![Reply::Bulk("0".into()), Reply::Array(names)])
}

/// `*` and `?` only.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn go(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => go(&p[1..], t) || (!t.is_empty() && go(p, &t[1..])),
            (Some(b'?'), Some(_)) => go(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => go(&p[1..], &t[1..]),
            _ => false,
        }
    }
    go(pattern.as_bytes(), text.as_bytes())
}

// ─── RESP request reader ─────────────────────────────────────────

struct RespReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read one command (array of bulk strings); `None` on EOF.
    async fn read_command(&mut self) -> io::Result<Option<Vec<String>>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        let count: usize = line
            .strip_prefix('*')
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected array"))?;

        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.read_bulk_string().await?);
        }
        Ok(Some(args))
    }

    async fn read_bulk_string(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.reader.read_line(&mut line).await?;

        let len: usize = line
            .strip_prefix('$')
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected bulk string"))?;

        let mut data = vec![0u8; len + 2];
        self.reader.read_exact(&mut data).await?;
        data.truncate(len);
        String::from_utf8(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
