#![allow(dead_code)]

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use v_connect_wa::config::{CacheConfig, SessionConfig};
use v_connect_wa::domain::{ContactProfile, GroupMetadata, InstanceEvent, ManagerEvent, PictureTier};
use v_connect_wa::protocol::{
    OpenRequest, ProtocolConnector, ProtocolError, ProtocolEvent, ProtocolLink, ProtocolSession,
};
use v_connect_wa::session::InstanceManager;
use v_connect_wa::store::{CredentialRecord, MemoryCredentialStore};

/// 脚本化协议连接器：测试直接推送协议事件
/// Scripted protocol connector: tests push protocol events directly
#[derive(Default)]
pub struct Script {
    links: DashMap<String, mpsc::UnboundedSender<ProtocolEvent>>,
    opens: DashMap<String, usize>,
    open_credentials: DashMap<String, Option<CredentialRecord>>,
    fail_open: AtomicBool,
    hold_open: AtomicBool,
    pub abandoned_opens: AtomicUsize,
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub logouts: Mutex<Vec<String>>,
    pub picture_calls: AtomicUsize,
    pub group_calls: AtomicUsize,
    pub profiles: DashMap<String, ContactProfile>,
    missing_pictures: Mutex<HashSet<String>>,
}

impl Script {
    /// 推送到实例当前连接；无连接返回 false / Push to the instance's current link; false if none
    pub fn push(&self, instance_id: &str, event: ProtocolEvent) -> bool {
        match self.links.get(instance_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn open_count(&self, instance_id: &str) -> usize {
        self.opens.get(instance_id).map(|n| *n).unwrap_or(0)
    }

    pub fn last_open_credentials(&self, instance_id: &str) -> Option<CredentialRecord> {
        self.open_credentials
            .get(instance_id)
            .and_then(|c| c.value().clone())
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// 之后的 open 永不完成，直到被取消 / Later opens never complete until cancelled
    pub fn hold_opens(&self, hold: bool) {
        self.hold_open.store(hold, Ordering::SeqCst);
    }

    pub fn without_picture(&self, jid: &str) {
        self.missing_pictures.lock().insert(jid.to_string());
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    pub script: Arc<Script>,
}

#[async_trait]
impl ProtocolConnector for ScriptedConnector {
    async fn open(&self, req: OpenRequest) -> Result<ProtocolLink, ProtocolError> {
        *self.script.opens.entry(req.instance_id.clone()).or_insert(0) += 1;
        if self.script.fail_open.load(Ordering::SeqCst) {
            return Err(ProtocolError::Unavailable("scripted failure".to_string()));
        }
        if self.script.hold_open.load(Ordering::SeqCst) {
            let _held = HeldOpen(self.script.clone());
            return std::future::pending().await;
        }
        self.script
            .open_credentials
            .insert(req.instance_id.clone(), req.credentials.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.links.insert(req.instance_id.clone(), tx);
        Ok(ProtocolLink {
            session: Arc::new(ScriptedSession {
                instance_id: req.instance_id,
                script: self.script.clone(),
            }),
            events: rx,
        })
    }
}

/// open 被取消时析构，相当于链路被关闭 / Dropped when an open is cancelled, i.e. the link is closed
struct HeldOpen(Arc<Script>);

impl Drop for HeldOpen {
    fn drop(&mut self) {
        self.0.abandoned_opens.fetch_add(1, Ordering::SeqCst);
    }
}

struct ScriptedSession {
    instance_id: String,
    script: Arc<Script>,
}

#[async_trait]
impl ProtocolSession for ScriptedSession {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, ProtocolError> {
        let mut sent = self.script.sent.lock();
        sent.push((self.instance_id.clone(), to.to_string(), text.to_string()));
        Ok(format!("SENT-{}", sent.len()))
    }

    async fn group_metadata(&self, group_jid: &str) -> Result<GroupMetadata, ProtocolError> {
        self.script.group_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GroupMetadata {
            jid: group_jid.to_string(),
            subject: "Team".to_string(),
            participants: vec![],
        })
    }

    async fn profile_picture_url(
        &self,
        jid: &str,
        _tier: PictureTier,
    ) -> Result<Option<String>, ProtocolError> {
        self.script.picture_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.missing_pictures.lock().contains(jid) {
            return Ok(None);
        }
        Ok(Some(format!("https://pps.example/{}.jpg", jid)))
    }

    async fn contact_profile(&self, jid: &str) -> Result<Option<ContactProfile>, ProtocolError> {
        Ok(self.script.profiles.get(jid).map(|p| p.value().clone()))
    }

    async fn logout(&self) -> Result<(), ProtocolError> {
        self.script.logouts.lock().push(self.instance_id.clone());
        Ok(())
    }

    async fn close(&self) {}
}

pub struct Harness {
    pub manager: Arc<InstanceManager>,
    pub script: Arc<Script>,
    pub store: Arc<MemoryCredentialStore>,
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        credentials_dir: "unused".to_string(),
        reconnect_delay_ms: 3_000,
        qr_ttl_ms: 60_000,
        restore_on_start: false,
    }
}

pub fn harness() -> Harness {
    harness_with(session_config())
}

pub fn harness_with(session: SessionConfig) -> Harness {
    let connector = ScriptedConnector::default();
    let script = connector.script.clone();
    let store = Arc::new(MemoryCredentialStore::new());
    let manager = Arc::new(InstanceManager::new(
        Arc::new(connector),
        store.clone(),
        session,
        CacheConfig::default(),
        256,
    ));
    Harness {
        manager,
        script,
        store,
    }
}

pub fn registered(label: &str) -> CredentialRecord {
    CredentialRecord {
        registered: true,
        label: Some(label.to_string()),
        keys: serde_json::json!({ "noise": "opaque" }),
    }
}

/// 等待下一个属于该实例的事件 / Wait for the next event of one instance
pub async fn next_event(
    rx: &mut broadcast::Receiver<ManagerEvent>,
    instance_id: &str,
) -> InstanceEvent {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.instance_id == instance_id => return ev.event,
                Ok(_) => continue,
                Err(e) => panic!("event channel failed: {}", e),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .expect("timed out waiting for instance event")
}

/// 让出执行权，直到后台任务处理完已推送的事件
/// Yield until background tasks have processed pushed events
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
