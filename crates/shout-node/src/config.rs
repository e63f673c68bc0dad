use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RPC_ADDR: &str = "0.0.0.0:7373";
pub const DEFAULT_MEMBERLIST_PORT: u16 = 7946;
pub const DEFAULT_DB_PATH: &str = "./db.sqlite";
pub const DEFAULT_HANDLERS_PATH: &str = "./handlers";
pub const DEFAULT_MIGRATIONS_SOURCE: &str = "file://migrations";

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub node_name: String,
    pub db_path: PathBuf,
    /// Control-plane listen address.
    pub rpc_addr: String,
    /// Advertised cluster port; reported by `members`.
    pub memberlist_port: u16,
    /// Root of the `queries/` and `events/` handler trees.
    pub handlers_path: PathBuf,
    /// `file://<dir>` or a plain directory of `*.up.sql` files.
    pub migrations_source: String,
    pub pool_size: usize,
    pub busy_timeout: Duration,
    /// How long a control-plane `query` waits for its reply.
    pub query_timeout: Duration,
    /// Largest reply a query responder accepts.
    pub max_response_bytes: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            rpc_addr: DEFAULT_RPC_ADDR.into(),
            memberlist_port: DEFAULT_MEMBERLIST_PORT,
            handlers_path: PathBuf::from(DEFAULT_HANDLERS_PATH),
            migrations_source: DEFAULT_MIGRATIONS_SOURCE.into(),
            pool_size: 4,
            busy_timeout: shout_db::DEFAULT_BUSY_TIMEOUT,
            query_timeout: Duration::from_secs(15),
            max_response_bytes: 1024,
        }
    }
}

/// Host name of this machine, or `"shout"` when it cannot be determined.
pub fn default_node_name() -> String {
    hostname()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "shout".into())
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = vec![0u8; 256];
    // SAFETY: `buf` is writable for `buf.len()` bytes.
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        tracing::warn!("gethostname failed: {}", std::io::Error::last_os_error());
        return None;
    }
    if let Some(pos) = buf.iter().position(|b| *b == 0) {
        buf.truncate(pos);
    }
    String::from_utf8(buf).ok().map(|name| name.trim().to_string())
}

#[cfg(not(unix))]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}
