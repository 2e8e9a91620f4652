//! Transports and request channels
//!
//! A transport describes how to reach the endpoint behind a pool. Connecting a
//! transport yields a [`RequestChannel`] that carries JSON requests and responses.
//!
//! # Example
//!
//! ```yaml
//! transport:
//!   ssh:
//!     host: backup.example.com
//!     user: root
//!     port: 22
//!     identity: /etc/dsrepl/identities/backup
//!     open_command: [sudo, dsrepl, stdinserver, backup]
//! ```

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::config::LoadOptions;
use crate::error::{Error, Result, TransportError};

/// Request sent over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Remote procedure name
    pub endpoint: String,

    /// Request body
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Response received over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response body
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A request/response channel to an endpoint
#[async_trait]
pub trait RequestChannel: Send {
    /// Send a request and wait for its response
    async fn call(&mut self, request: Request) -> Result<Response>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;
}

/// Serves requests for pools reached through the local transport
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle a single request
    async fn handle(&self, request: Request) -> Result<Response>;
}

/// Establishes a channel to an endpoint
#[async_trait]
pub trait Connect: Send + Sync {
    /// Open a new channel
    async fn connect(&self) -> Result<Box<dyn RequestChannel>>;
}

/// How a pool is reached
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    /// In-process endpoint
    Local(LocalTransport),

    /// Remote endpoint over an ssh byte stream
    Ssh(SshTransport),
}

impl Transport {
    /// Resolve a transport block with exactly one `ssh` or `local` key
    pub fn from_block(
        block: &Mapping,
        options: &LoadOptions,
    ) -> std::result::Result<Self, TransportError> {
        let mut entries = block.iter();
        let (key, value) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(TransportError::AmbiguousTransport {
                    keys: block.keys().map(key_name).collect(),
                });
            }
        };

        // `local:` with no body decodes like `local: {}`
        let value = if value.is_null() {
            Value::Mapping(Mapping::new())
        } else {
            value.clone()
        };

        match key_name(key).as_str() {
            "ssh" => {
                let ssh: SshTransport =
                    serde_yaml::from_value(value).map_err(|e| decode_error("ssh", e))?;
                Ok(Transport::Ssh(ssh))
            }
            "local" => {
                let mut local: LocalTransport =
                    serde_yaml::from_value(value).map_err(|e| decode_error("local", e))?;
                local.handler = LocalHandler(options.local_handler.clone());
                Ok(Transport::Local(local))
            }
            other => Err(TransportError::UnknownTransportType {
                key: other.to_string(),
            }),
        }
    }

    /// Transport kind as written in the document
    pub fn kind(&self) -> &'static str {
        match self {
            Transport::Local(_) => "local",
            Transport::Ssh(_) => "ssh",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Local(_) => f.write_str("local"),
            Transport::Ssh(ssh) => write!(f, "ssh {}@{}:{}", ssh.user, ssh.host, ssh.port),
        }
    }
}

#[async_trait]
impl Connect for Transport {
    async fn connect(&self) -> Result<Box<dyn RequestChannel>> {
        match self {
            Transport::Local(local) => local.connect().await,
            Transport::Ssh(ssh) => ssh.connect().await,
        }
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn decode_error(transport: &str, err: serde_yaml::Error) -> TransportError {
    TransportError::TransportDecode {
        transport: transport.to_string(),
        message: err.to_string(),
    }
}

// ============================================================================
// Local transport
// ============================================================================

/// Handler injected into local transports at load time
#[derive(Clone, Default)]
pub struct LocalHandler(Option<Arc<dyn RequestHandler>>);

impl LocalHandler {
    /// Whether a handler was supplied
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Debug for LocalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_set() {
            "LocalHandler(set)"
        } else {
            "LocalHandler(unset)"
        })
    }
}

impl PartialEq for LocalHandler {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (None, None) => true,
            _ => false,
        }
    }
}

/// In-process transport
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalTransport {
    /// Name the local endpoint serves under
    #[serde(default, alias = "pool")]
    pub pool_name: String,

    #[serde(skip)]
    handler: LocalHandler,
}

impl LocalTransport {
    /// Create a local transport bound to `handler`
    pub fn new(pool_name: impl Into<String>, handler: Option<Arc<dyn RequestHandler>>) -> Self {
        Self {
            pool_name: pool_name.into(),
            handler: LocalHandler(handler),
        }
    }

    /// The injected handler
    pub fn handler(&self) -> &LocalHandler {
        &self.handler
    }
}

#[async_trait]
impl Connect for LocalTransport {
    async fn connect(&self) -> Result<Box<dyn RequestChannel>> {
        let handler = self.handler.0.clone().ok_or_else(|| Error::Connect {
            transport: "local".to_string(),
            message: format!("no local handler configured for '{}'", self.pool_name),
        })?;
        tracing::debug!("Connecting local channel '{}'", self.pool_name);
        Ok(Box::new(LocalChannel {
            handler,
            closed: false,
        }))
    }
}

/// Channel that dispatches straight to a [`RequestHandler`]
pub struct LocalChannel {
    handler: Arc<dyn RequestHandler>,
    closed: bool,
}

#[async_trait]
impl RequestChannel for LocalChannel {
    async fn call(&mut self, request: Request) -> Result<Response> {
        if self.closed {
            return Err(Error::Channel {
                message: "channel is closed".to_string(),
            });
        }
        self.handler.handle(request).await
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ============================================================================
// SSH transport
// ============================================================================

/// Remote transport over ssh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshTransport {
    /// Remote host
    pub host: String,

    /// Remote user
    pub user: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Identity file passed to `ssh -i`
    #[serde(default, alias = "identity_file")]
    pub identity: Option<String>,

    /// Command run on the remote side to serve the stream
    #[serde(default, alias = "transport_open_command")]
    pub open_command: Vec<String>,

    /// Extra `-o` options
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_ssh_port() -> u16 {
    22
}

impl SshTransport {
    /// Arguments passed to the `ssh` binary
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.port.to_string(), "-q".to_string()];
        if let Some(identity) = self.identity.as_deref().filter(|i| !i.is_empty()) {
            args.push("-i".to_string());
            args.push(identity.to_string());
        }
        args.push("-o".to_string());
        args.push("BatchMode=yes".to_string());
        for option in &self.options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        if self.user.is_empty() {
            args.push(self.host.clone());
        } else {
            args.push(format!("{}@{}", self.user, self.host));
        }
        args.extend(self.open_command.iter().cloned());
        args
    }

    /// The `ssh` command for this transport
    pub fn command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.ssh_args());
        cmd
    }
}

#[async_trait]
impl Connect for SshTransport {
    async fn connect(&self) -> Result<Box<dyn RequestChannel>> {
        tracing::info!(
            "Connecting to {}@{}:{} over ssh",
            self.user,
            self.host,
            self.port
        );
        let channel = StreamChannel::spawn(self.command()).map_err(|e| Error::Connect {
            transport: "ssh".to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(channel))
    }
}

/// Newline-delimited JSON over a child process's stdin/stdout
pub struct StreamChannel {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl StreamChannel {
    /// Spawn `command` and talk to it over its standard streams
    pub fn spawn(mut command: Command) -> Result<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| Error::Channel {
            message: "child stdin not captured".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| Error::Channel {
            message: "child stdout not captured".to_string(),
        })?;

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl RequestChannel for StreamChannel {
    async fn call(&mut self, request: Request) -> Result<Response> {
        let stdin = self.stdin.as_mut().ok_or_else(|| Error::Channel {
            message: "channel is closed".to_string(),
        })?;

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply).await? == 0 {
            return Err(Error::Channel {
                message: "stream closed by peer".to_string(),
            });
        }
        Ok(serde_json::from_str(reply.trim_end())?)
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping stdin signals EOF to the peer
        self.stdin.take();
        let status = self.child.wait().await?;
        if !status.success() {
            tracing::warn!("Stream peer exited with {}", status);
        }
        Ok(())
    }
}
