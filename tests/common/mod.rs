//! Shared test fakes for the collaborator traits

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use chime_device::config::{
    CaptureConfig, Config, ConnectivityConfig, PlaybackConfig, PortalConfig, WorkflowConfig,
};
use chime_device::connectivity::Credentials;
use chime_device::device::{
    AudioBus, BlobWriter, ByteStore, ByteStream, StreamResponse, TextResponse, Transport,
};
use chime_device::{Error, Result};

/// Device config with instant timings, suitable for scripted runs
#[must_use]
pub fn test_config(data_dir: PathBuf) -> Config {
    Config {
        base_url: "http://service.test:3000".to_string(),
        data_dir,
        credentials: Credentials {
            ssid: "Static".to_string(),
            passphrase: "12345678".to_string(),
        },
        fallback_credentials: None,
        capture: CaptureConfig {
            record_secs: 5,
            pre_roll: Duration::ZERO,
            // Divides the 160,000-byte target exactly
            block_bytes: 16_000,
            flush_reads: 2,
        },
        workflow: WorkflowConfig {
            debounce: Duration::from_millis(500),
            tick: Duration::from_millis(1),
            cooldown: Duration::ZERO,
            poll_interval: Duration::from_millis(1),
            poll_max_attempts: 30,
            upload_timeout: Duration::from_secs(5),
        },
        playback: PlaybackConfig {
            chunk_bytes: 1024,
            write_timeout: Duration::from_millis(100),
        },
        connectivity: ConnectivityConfig {
            direct_attempts: 3,
            configured_attempts: 5,
            retry_delay: Duration::from_millis(1),
        },
        portal: PortalConfig {
            ssid: "chime-setup".to_string(),
            address: Ipv4Addr::new(192, 168, 4, 1),
            http_port: 0,
            dns_port: 0,
            timeout: Duration::from_secs(1),
        },
    }
}

/// Audio bus producing a fixed sample pattern and recording playback
pub struct FakeAudioBus {
    /// Byte pair every captured sample is filled with
    pub capture_pattern: [u8; 2],
    pub reads: u32,
    pub played: Vec<u8>,
    pub cleared: u32,
    pub flushed: u32,
    /// Cap on bytes accepted per write call; `None` accepts everything
    pub accept_per_write: Option<usize>,
    /// Fail writes once this many bytes have been played
    pub fail_writes_after: Option<usize>,
}

impl Default for FakeAudioBus {
    fn default() -> Self {
        Self {
            capture_pattern: [0x34, 0x12],
            reads: 0,
            played: Vec::new(),
            cleared: 0,
            flushed: 0,
            accept_per_write: None,
            fail_writes_after: None,
        }
    }
}

#[async_trait(?Send)]
impl AudioBus for FakeAudioBus {
    async fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<()> {
        self.reads += 1;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.capture_pattern[i % 2];
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<usize> {
        if let Some(limit) = self.fail_writes_after {
            if self.played.len() >= limit {
                return Err(Error::Audio("output underrun".to_string()));
            }
        }
        let accept = self
            .accept_per_write
            .map_or(data.len(), |cap| cap.min(data.len()));
        self.played.extend_from_slice(&data[..accept]);
        Ok(accept)
    }

    fn clear_playback(&mut self) {
        self.cleared += 1;
    }

    async fn flush_playback(&mut self) -> Result<()> {
        self.flushed += 1;
        Ok(())
    }
}

/// In-memory byte store
#[derive(Default, Clone)]
pub struct MemStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub fail_create: bool,
}

impl MemStore {
    /// Store whose `create` always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn blob(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(name).cloned()
    }

    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

impl ByteStore for MemStore {
    fn exists(&self, name: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(name)
    }

    fn len(&self, name: &str) -> Result<u64> {
        self.blob(name)
            .map(|b| b.len() as u64)
            .ok_or_else(|| Error::Storage(format!("no blob {name}")))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.blob(name)
            .ok_or_else(|| Error::Storage(format!("no blob {name}")))
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }

    fn create(&self, name: &str) -> Result<Box<dyn BlobWriter>> {
        if self.fail_create {
            return Err(Error::Storage("store full".to_string()));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), Vec::new());
        Ok(Box::new(MemBlobWriter {
            blobs: Arc::clone(&self.blobs),
            name: name.to_string(),
        }))
    }
}

struct MemBlobWriter {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    name: String,
}

impl BlobWriter for MemBlobWriter {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .get_mut(&self.name)
            .ok_or_else(|| Error::Storage(format!("no blob {}", self.name)))?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// One recorded POST
pub struct PostRecord {
    pub url: String,
    pub content_type: String,
    pub content_length: u64,
    pub body: Vec<u8>,
}

/// Transport whose responses follow a per-endpoint script
pub struct ScriptedTransport {
    pub upload_status: u16,
    pub upload_body: String,
    /// Popped one per readiness poll; an empty queue keeps answering "{}"
    pub poll_bodies: Mutex<VecDeque<String>>,
    pub audio_status: u16,
    pub audio_chunks: Vec<Vec<u8>>,
    pub audio_declared_len: Option<u64>,
    pub posts: Mutex<Vec<PostRecord>>,
    pub poll_count: AtomicU32,
    pub audio_gets: AtomicU32,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            upload_status: 200,
            upload_body: "you said: hello".to_string(),
            poll_bodies: Mutex::new(VecDeque::new()),
            audio_status: 200,
            audio_chunks: Vec::new(),
            audio_declared_len: None,
            posts: Mutex::new(Vec::new()),
            poll_count: AtomicU32::new(0),
            audio_gets: AtomicU32::new(0),
        }
    }
}

impl ScriptedTransport {
    /// Script readiness: `not_ready` unready polls, then the marker
    pub fn ready_after(&self, not_ready: u32) {
        let mut bodies = self.poll_bodies.lock().unwrap();
        for _ in 0..not_ready {
            bodies.push_back(r#"{"ready":false}"#.to_string());
        }
        bodies.push_back(r#"{"ready":true}"#.to_string());
    }

    /// Script the audio response: a WAV header plus `data`, split into
    /// chunks of `chunk` bytes, with a truthful declared length.
    pub fn audio_response(&mut self, data: &[u8], chunk: usize) {
        let mut body = Vec::with_capacity(44 + data.len());
        body.extend_from_slice(&chime_device::wav::header(data.len() as u32));
        body.extend_from_slice(data);
        self.audio_declared_len = Some(body.len() as u64);
        self.audio_chunks = body.chunks(chunk).map(<[u8]>::to_vec).collect();
    }
}

#[async_trait(?Send)]
impl Transport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        content_length: u64,
        _timeout: Duration,
    ) -> Result<TextResponse> {
        self.posts.lock().unwrap().push(PostRecord {
            url: url.to_string(),
            content_type: content_type.to_string(),
            content_length,
            body,
        });
        Ok(TextResponse {
            status: self.upload_status,
            body: self.upload_body.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<StreamResponse> {
        if url.ends_with("/checkVariable") {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            let body = self
                .poll_bodies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "{}".to_string());
            return Ok(StreamResponse {
                status: 200,
                declared_len: Some(body.len() as u64),
                stream: Box::new(FakeStream::from_chunks(vec![body.into_bytes()])),
            });
        }

        if url.ends_with("/broadcastAudio") {
            self.audio_gets.fetch_add(1, Ordering::SeqCst);
            return Ok(StreamResponse {
                status: self.audio_status,
                declared_len: self.audio_declared_len,
                stream: Box::new(FakeStream::from_chunks(self.audio_chunks.clone())),
            });
        }

        Err(Error::Transfer(format!("unscripted GET {url}")))
    }
}

/// Stream yielding a fixed chunk sequence
pub struct FakeStream {
    chunks: VecDeque<Bytes>,
}

impl FakeStream {
    #[must_use]
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Bytes::from).collect(),
        }
    }
}

#[async_trait(?Send)]
impl ByteStream for FakeStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.chunks.pop_front())
    }
}
