//! [`BrokerPort`] over a Redis-compatible server.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::codec::RespValue;
use super::connection::RespConnection;
use crate::domain::{
    BrokerError, BrokerErrorKind, ConsumerIdentity, EntryId, Fields, PendingSummary, ReadCursor,
    ReadLimit, StartPosition, StreamEntry,
};
use crate::ports::BrokerPort;

/// Default number of connections a [`RespBroker`] keeps open.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// Connection parameters for [`RespBroker`].
#[derive(Debug, Clone)]
pub struct RespSettings {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Password for `AUTH`, if the server requires one.
    pub password: Option<String>,
    /// Database index to `SELECT` after connecting.
    pub database: u8,
    /// Deadline for opening a connection and answering the initial `PING`.
    pub connect_timeout: Duration,
    /// Maximum connections in flight at once. A blocking read holds one for
    /// its whole wait, so this bounds concurrent blocked readers too.
    pub pool_size: usize,
}

impl Default for RespSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            password: None,
            database: 0,
            connect_timeout: Duration::from_secs(10),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RespSettings {
    /// `host:port` form.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Stream broker reached over RESP2.
///
/// Commands run on pooled connections, one command per connection at a
/// time, so a blocking `XREADGROUP` never delays an `XADD` or `XACK` issued
/// through the same broker. Connections are opened lazily up to
/// `pool_size`. A connection whose command failed in transport, or whose
/// command future was dropped mid-flight (deadline, cancellation), is
/// discarded rather than returned.
pub struct RespBroker {
    settings: RespSettings,
    idle: Mutex<Vec<RespConnection>>,
    permits: Semaphore,
}

impl RespBroker {
    /// Connect and verify the server answers `PING` within the connect
    /// deadline.
    pub async fn connect(settings: RespSettings) -> Result<Self, BrokerError> {
        let permits = Semaphore::new(settings.pool_size.max(1));
        let broker = Self {
            settings,
            idle: Mutex::new(Vec::new()),
            permits,
        };
        broker.ping().await?;
        info!(
            addr = %broker.settings.addr(),
            pool_size = broker.settings.pool_size,
            "Connected to broker"
        );
        Ok(broker)
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<(), BrokerError> {
        let deadline = self.settings.connect_timeout;
        let reply = tokio::time::timeout(deadline, self.command(vec![arg("PING")]))
            .await
            .map_err(|_| timed_out(deadline))??;
        match reply.as_text() {
            Some("PONG") => Ok(()),
            _ => Err(unexpected("PONG", &reply)),
        }
    }

    /// Connections currently parked in the pool.
    #[must_use]
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    async fn open(&self) -> Result<RespConnection, BrokerError> {
        let addr = self.settings.addr();
        let deadline = self.settings.connect_timeout;
        let setup = async {
            let mut conn = RespConnection::open(&addr).await?;
            if let Some(password) = &self.settings.password {
                let reply = conn.execute(&[arg("AUTH"), arg(password)]).await?;
                expect_ok(reply)?;
            }
            if self.settings.database != 0 {
                let db = self.settings.database.to_string();
                let reply = conn.execute(&[arg("SELECT"), arg(&db)]).await?;
                expect_ok(reply)?;
            }
            Ok::<_, BrokerError>(conn)
        };
        let conn = tokio::time::timeout(deadline, setup)
            .await
            .map_err(|_| timed_out(deadline))??;
        debug!(%addr, "Opened broker connection");
        Ok(conn)
    }

    async fn command(&self, args: Vec<Bytes>) -> Result<RespValue, BrokerError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BrokerError::connection("connection pool closed"))?;
        let parked = self.idle.lock().pop();
        let mut conn = match parked {
            Some(conn) => conn,
            None => self.open().await?,
        };

        match conn.execute(&args).await {
            Ok(RespValue::Error(msg)) => {
                self.idle.lock().push(conn);
                Err(classify(&msg))
            }
            Ok(reply) => {
                self.idle.lock().push(conn);
                Ok(reply)
            }
            Err(e) => {
                warn!(error = %e, "Discarding broker connection");
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl BrokerPort for RespBroker {
    async fn append(&self, topic: &str, fields: Fields) -> Result<EntryId, BrokerError> {
        let mut args = vec![arg("XADD"), arg(topic), arg("*")];
        for (key, value) in fields {
            args.push(Bytes::from(key));
            args.push(value);
        }
        let reply = self.command(args).await?;
        parse_id(&reply)
    }

    async fn create_group(
        &self,
        topic: &str,
        group: &str,
        start: StartPosition,
    ) -> Result<(), BrokerError> {
        let reply = self
            .command(vec![
                arg("XGROUP"),
                arg("CREATE"),
                arg(topic),
                arg(group),
                arg(&start.as_wire()),
                arg("MKSTREAM"),
            ])
            .await?;
        expect_ok(reply)
    }

    async fn read_group(
        &self,
        topic: &str,
        group: &str,
        consumer: &ConsumerIdentity,
        cursor: ReadCursor,
        limit: ReadLimit,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, BrokerError> {
        let mut args = vec![
            arg("XREADGROUP"),
            arg("GROUP"),
            arg(group),
            arg(consumer.as_str()),
        ];
        if let Some(count) = limit.count() {
            args.push(arg("COUNT"));
            args.push(arg(&count.to_string()));
        }
        // History reads answer immediately on the server.
        if let (ReadCursor::New, Some(block)) = (cursor, block) {
            // BLOCK 0 means "forever" on the server.
            let ms = block.as_millis().max(1);
            args.push(arg("BLOCK"));
            args.push(arg(&ms.to_string()));
        }
        args.extend([arg("STREAMS"), arg(topic), arg(&cursor.as_wire())]);

        let reply = self.command(args).await?;
        parse_read_reply(reply)
    }

    async fn ack(&self, topic: &str, group: &str, id: &EntryId) -> Result<bool, BrokerError> {
        let reply = self
            .command(vec![
                arg("XACK"),
                arg(topic),
                arg(group),
                arg(&id.to_string()),
            ])
            .await?;
        match reply {
            RespValue::Integer(n) => Ok(n > 0),
            other => Err(unexpected("integer", &other)),
        }
    }

    async fn pending(&self, topic: &str, group: &str) -> Result<PendingSummary, BrokerError> {
        let reply = self
            .command(vec![arg("XPENDING"), arg(topic), arg(group)])
            .await?;
        parse_pending_reply(reply)
    }
}

fn arg(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

fn timed_out(deadline: Duration) -> BrokerError {
    BrokerError::new(
        BrokerErrorKind::Timeout,
        format!("no answer within {deadline:?}"),
    )
}

fn unexpected(expected: &str, got: &RespValue) -> BrokerError {
    BrokerError::protocol(format!("expected {expected}, got {}", got.type_name()))
}

fn expect_ok(reply: RespValue) -> Result<(), BrokerError> {
    match reply {
        RespValue::Simple(ref s) if s == "OK" => Ok(()),
        RespValue::Error(msg) => Err(classify(&msg)),
        other => Err(unexpected("OK", &other)),
    }
}

/// Map a server error reply to a structured kind using its error code.
pub(crate) fn classify(reply: &str) -> BrokerError {
    let code = reply.split_whitespace().next().unwrap_or_default();
    let kind = match code {
        "BUSYGROUP" => BrokerErrorKind::GroupExists,
        "NOGROUP" => BrokerErrorKind::NoGroup,
        _ => BrokerErrorKind::Server,
    };
    BrokerError::new(kind, reply)
}

fn parse_id(value: &RespValue) -> Result<EntryId, BrokerError> {
    let text = value
        .as_text()
        .ok_or_else(|| unexpected("entry id", value))?;
    text.parse()
        .map_err(|e: crate::domain::ParseEntryIdError| BrokerError::protocol(e.to_string()))
}

fn into_array(value: RespValue, what: &str) -> Result<Vec<RespValue>, BrokerError> {
    match value {
        RespValue::Array(items) => Ok(items),
        RespValue::Nil => Ok(Vec::new()),
        other => Err(unexpected(what, &other)),
    }
}

/// `[[topic, [[id, [k, v, ...]], ...]], ...]` or nil.
pub(crate) fn parse_read_reply(reply: RespValue) -> Result<Vec<StreamEntry>, BrokerError> {
    let mut out = Vec::new();
    for stream in into_array(reply, "stream list")? {
        let mut parts = into_array(stream, "stream")?.into_iter();
        let entries = match (parts.next(), parts.next()) {
            (Some(_name), Some(entries)) => entries,
            _ => return Err(BrokerError::protocol("stream reply missing entries")),
        };
        for entry in into_array(entries, "entry list")? {
            let mut parts = into_array(entry, "entry")?.into_iter();
            let id = match parts.next() {
                Some(id) => parse_id(&id)?,
                None => return Err(BrokerError::protocol("entry without id")),
            };
            // Deleted entries come back with nil fields.
            let raw = match parts.next() {
                Some(fields) => into_array(fields, "field list")?,
                None => Vec::new(),
            };
            let mut fields = Fields::new();
            let mut raw = raw.into_iter();
            while let (Some(key), Some(value)) = (raw.next(), raw.next()) {
                let key = key
                    .as_text()
                    .ok_or_else(|| unexpected("field name", &key))?
                    .to_string();
                let value = match value {
                    RespValue::Bulk(b) => b,
                    other => return Err(unexpected("field value", &other)),
                };
                fields.insert(key, value);
            }
            out.push(StreamEntry { id, fields });
        }
    }
    Ok(out)
}

/// `[count, lowest, highest, [[consumer, count], ...]]`.
pub(crate) fn parse_pending_reply(reply: RespValue) -> Result<PendingSummary, BrokerError> {
    let parts = into_array(reply, "pending summary")?;
    let [count, lowest, highest, consumers]: [RespValue; 4] = parts
        .try_into()
        .map_err(|_| BrokerError::protocol("pending summary must have 4 elements"))?;

    let count = match count {
        RespValue::Integer(n) => u64::try_from(n).unwrap_or(0),
        other => return Err(unexpected("integer", &other)),
    };
    let bound = |v: RespValue| -> Result<Option<EntryId>, BrokerError> {
        match v {
            RespValue::Nil => Ok(None),
            other => parse_id(&other).map(Some),
        }
    };

    let mut per_consumer = Vec::new();
    for consumer in into_array(consumers, "consumer list")? {
        let pair = into_array(consumer, "consumer")?;
        let (Some(name), Some(n)) = (pair.first(), pair.get(1)) else {
            return Err(BrokerError::protocol("consumer entry must be a pair"));
        };
        let name = name
            .as_text()
            .ok_or_else(|| unexpected("consumer name", name))?;
        let n: u64 = n
            .as_text()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| unexpected("consumer count", n))?;
        per_consumer.push((name.to_string(), n));
    }

    Ok(PendingSummary {
        count,
        lowest: bound(lowest)?,
        highest: bound(highest)?,
        consumers: per_consumer,
    })
}
