//! Fake tracker speaking the MogileFS line protocol.
//!
//! Metadata lives in memory. A key becomes visible only when its
//! `create_close` arrives, mirroring a real tracker's commit point.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mogile_protocol::codec::{decode_fields, encode_fields};
use mogile_protocol::{FieldMap, commands};

/// One request line as the tracker received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub command: String,
    pub params: FieldMap,
}

#[derive(Debug, Clone)]
struct StoredKey {
    fid: u64,
    paths: Vec<String>,
}

#[derive(Debug, Clone)]
struct OpenFile {
    domain: String,
    key: String,
}

#[derive(Default)]
struct TrackerState {
    domains: HashMap<String, BTreeMap<String, StoredKey>>,
    open_files: HashMap<u64, OpenFile>,
    devices: Vec<(u64, String)>,
    next_fid: u64,
    legacy_create_open: bool,
    silent: bool,
    reject_close: Option<String>,
    requests: Vec<RecordedRequest>,
}

/// In-memory tracker on a real TCP port.
pub struct FakeTracker {
    addr: SocketAddr,
    state: Arc<Mutex<TrackerState>>,
    accepts: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl FakeTracker {
    /// Starts a tracker whose write plans use `devices` (`(devid, base_url)`)
    /// in the given order.
    pub async fn spawn(devices: Vec<(u64, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind tracker");
        let addr = listener.local_addr().expect("local addr");

        let state = Arc::new(Mutex::new(TrackerState {
            devices,
            next_fid: 1,
            ..Default::default()
        }));
        let accepts = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        tokio::spawn(accept_loop(
            listener,
            state.clone(),
            accepts.clone(),
            cancel.clone(),
        ));

        Self {
            addr,
            state,
            accepts,
            cancel,
        }
    }

    /// `127.0.0.1:<port>`
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn add_domain(&self, domain: &str) {
        self.state
            .lock()
            .unwrap()
            .domains
            .entry(domain.to_string())
            .or_default();
    }

    /// Replaces the device list used for new write plans.
    pub fn set_devices(&self, devices: Vec<(u64, String)>) {
        self.state.lock().unwrap().devices = devices;
    }

    /// Answer `create_open` with the single `devid`/`path` shape.
    pub fn set_legacy_create_open(&self, legacy: bool) {
        self.state.lock().unwrap().legacy_create_open = legacy;
    }

    /// Read requests but never answer them.
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().unwrap().silent = silent;
    }

    /// Answer every `create_close` with `ERR <code>`.
    pub fn reject_close(&self, code: Option<&str>) {
        self.state.lock().unwrap().reject_close = code.map(str::to_string);
    }

    /// Commits a key directly with the given replica paths.
    pub fn put_key(&self, domain: &str, key: &str, paths: Vec<String>) {
        let mut state = self.state.lock().unwrap();
        let fid = state.next_fid;
        state.next_fid += 1;
        state
            .domains
            .entry(domain.to_string())
            .or_default()
            .insert(key.to_string(), StoredKey { fid, paths });
    }

    /// Replica paths currently committed for a key.
    pub fn paths_of(&self, domain: &str, key: &str) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .domains
            .get(domain)?
            .get(key)
            .map(|k| k.paths.clone())
    }

    pub fn keys(&self, domain: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .domains
            .get(domain)
            .map(|keys| keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests received for one command.
    pub fn requests_for(&self, command: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.command == command)
            .collect()
    }

    /// Number of TCP connections accepted.
    pub fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

impl Drop for FakeTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<Mutex<TrackerState>>,
    accepts: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    loop {
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = listener.accept() => match result {
                Ok((stream, _)) => stream,
                Err(_) => return,
            },
        };
        accepts.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(serve_connection(stream, state.clone(), cancel.clone()));
    }
}

async fn serve_connection(
    stream: TcpStream,
    state: Arc<Mutex<TrackerState>>,
    cancel: CancellationToken,
) {
    let mut stream = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = stream.read_line(&mut line) => result.unwrap_or(0),
        };
        if n == 0 {
            return;
        }

        let answer = handle_line(&state, &line);
        let Some(answer) = answer else {
            continue;
        };
        if stream.get_mut().write_all(answer.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Returns the response line, or `None` when the tracker is silent.
fn handle_line(state: &Mutex<TrackerState>, line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (command, args) = line.split_once(' ').unwrap_or((line, ""));
    let params = decode_fields(args);

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        command: command.to_string(),
        params: params.clone(),
    });
    if state.silent {
        return None;
    }

    debug!(command, "fake tracker: request");
    let reply = match command {
        commands::CREATE_OPEN => create_open(&mut state, &params),
        commands::CREATE_CLOSE => create_close(&mut state, &params),
        commands::GET_PATHS => get_paths(&state, &params),
        commands::RENAME => rename(&mut state, &params),
        commands::DELETE => delete(&mut state, &params),
        commands::LIST_KEYS => list_keys(&state, &params),
        commands::SLEEP => Ok(FieldMap::new()),
        _ => Err(failure("unknown_command", format!("Unknown server command: {command}"))),
    };

    Some(match reply {
        Ok(fields) => format!("OK {}\r\n", encode_fields(&fields)),
        Err((code, message)) => {
            format!("ERR {code} {}\r\n", mogile_protocol::codec::escape(&message))
        }
    })
}

type Failure = (String, String);
type Handled = Result<FieldMap, Failure>;

fn failure(code: &str, message: impl Into<String>) -> Failure {
    (code.to_string(), message.into())
}

fn param<'a>(params: &'a FieldMap, name: &str) -> Result<&'a str, Failure> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or(failure("missing_param", format!("missing {name}")))
}

fn domain_keys<'a>(
    state: &'a mut TrackerState,
    params: &FieldMap,
) -> Result<&'a mut BTreeMap<String, StoredKey>, Failure> {
    let domain = param(params, "domain")?;
    state
        .domains
        .get_mut(domain)
        .ok_or(failure("domain_not_found", "Domain not found".to_string()))
}

fn create_open(state: &mut TrackerState, params: &FieldMap) -> Handled {
    let domain = param(params, "domain")?.to_string();
    let key = param(params, "key")?.to_string();
    domain_keys(state, params)?;
    if state.devices.is_empty() {
        return Err(failure("no_devices", "No devices found to store file"));
    }

    let fid = state.next_fid;
    state.next_fid += 1;
    state.open_files.insert(fid, OpenFile { domain, key });

    let mut fields = FieldMap::new();
    fields.insert("fid".into(), fid.to_string());
    let dests: Vec<(u64, String)> = state
        .devices
        .iter()
        .map(|(devid, base)| (*devid, format!("{base}/dev{devid}/0/000/{fid:010}.fid")))
        .collect();

    if state.legacy_create_open {
        let (devid, path) = &dests[0];
        fields.insert("devid".into(), devid.to_string());
        fields.insert("path".into(), path.clone());
    } else {
        fields.insert("dev_count".into(), dests.len().to_string());
        for (i, (devid, path)) in dests.iter().enumerate() {
            fields.insert(format!("devid_{}", i + 1), devid.to_string());
            fields.insert(format!("path_{}", i + 1), path.clone());
        }
    }
    Ok(fields)
}

fn create_close(state: &mut TrackerState, params: &FieldMap) -> Handled {
    if let Some(code) = state.reject_close.clone() {
        return Err(failure(&code, "close rejected"));
    }
    let fid: u64 = param(params, "fid")?
        .parse()
        .map_err(|_| failure("bad_params", "invalid fid"))?;
    let path = param(params, "path")?.to_string();
    param(params, "devid")?;
    param(params, "size")?;

    let open = state
        .open_files
        .remove(&fid)
        .ok_or(failure("no_temp_file", "No tempfile or file already closed".to_string()))?;
    if param(params, "key")? != open.key || param(params, "domain")? != open.domain {
        return Err(failure("bad_params", "key/domain mismatch"));
    }

    let keys = domain_keys(state, params)?;
    keys.insert(open.key, StoredKey {
        fid,
        paths: vec![path],
    });
    Ok(FieldMap::new())
}

fn get_paths(state: &TrackerState, params: &FieldMap) -> Handled {
    let domain = param(params, "domain")?;
    let key = param(params, "key")?;
    let keys = state
        .domains
        .get(domain)
        .ok_or(failure("domain_not_found", "Domain not found".to_string()))?;
    let stored = keys
        .get(key)
        .ok_or(failure("unknown_key", "unknown_key".to_string()))?;

    let limit: usize = params
        .get("pathcount")
        .and_then(|v| v.parse().ok())
        .unwrap_or(2);

    let mut fields = FieldMap::new();
    let paths: Vec<&String> = stored.paths.iter().take(limit).collect();
    fields.insert("paths".into(), paths.len().to_string());
    for (i, p) in paths.iter().enumerate() {
        fields.insert(format!("path{}", i + 1), (*p).clone());
    }
    fields.insert("fid".into(), stored.fid.to_string());
    Ok(fields)
}

fn rename(state: &mut TrackerState, params: &FieldMap) -> Handled {
    let from = param(params, "from_key")?.to_string();
    let to = param(params, "to_key")?.to_string();
    let keys = domain_keys(state, params)?;
    if keys.contains_key(&to) {
        return Err(failure(
            "key_exists",
            "Target key name already exists; can't overwrite.",
        ));
    }
    let stored = keys
        .remove(&from)
        .ok_or(failure("unknown_key", "unknown_key".to_string()))?;
    keys.insert(to, stored);
    Ok(FieldMap::new())
}

fn delete(state: &mut TrackerState, params: &FieldMap) -> Handled {
    let key = param(params, "key")?.to_string();
    let keys = domain_keys(state, params)?;
    keys.remove(&key)
        .ok_or(failure("unknown_key", "unknown_key".to_string()))?;
    Ok(FieldMap::new())
}

fn list_keys(state: &TrackerState, params: &FieldMap) -> Handled {
    let domain = param(params, "domain")?;
    let keys = state
        .domains
        .get(domain)
        .ok_or(failure("domain_not_found", "Domain not found".to_string()))?;
    let prefix = params.get("prefix").map(String::as_str).unwrap_or("");
    let after = params.get("after").map(String::as_str);
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1000);

    let page: Vec<&String> = keys
        .keys()
        .filter(|k| k.starts_with(prefix))
        .filter(|k| after.is_none_or(|a| k.as_str() > a))
        .take(limit)
        .collect();

    let mut fields = FieldMap::new();
    fields.insert("key_count".into(), page.len().to_string());
    for (i, k) in page.iter().enumerate() {
        fields.insert(format!("key_{}", i + 1), (*k).clone());
    }
    if let Some(last) = page.last() {
        fields.insert("next_after".into(), (*last).clone());
    }
    Ok(fields)
}
