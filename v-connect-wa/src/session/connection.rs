//! 单实例连接actor / Single-instance connection actor
//!
//! 状态机：disconnected → connecting → {qr_ready | connected} → disconnected（循环）
//! State machine: disconnected → connecting → {qr_ready | connected} → disconnected (loop)

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::normalize::normalize_message;
use super::qr::{render_data_url, QrGate};
use super::SessionContext;
use crate::cache::{InstanceCaches, StoredMessage};
use crate::domain::{
    jid, ContactInfo, GroupMetadata, Instance, InstanceEvent, InstanceStatus, ManagerEvent,
    MessageContent, PictureTier,
};
use crate::protocol::{
    CloseCause, ContactRecord, MessageLookup, MessageOrigin, OpenRequest, OwnIdentity,
    ProtocolError, ProtocolEvent, ProtocolSession, RawMessage,
};
use crate::store::CredentialRecord;

/// 协议层通过消息存储回查消息 / Protocol-side lookups served by the message store
struct CachedMessages(Arc<InstanceCaches>);

impl MessageLookup for CachedMessages {
    fn lookup(&self, id: &str, remote_jid: &str) -> Option<StoredMessage> {
        self.0.messages.get(id, remote_jid)
    }
}

pub struct InstanceConnection {
    id: String,
    state: RwLock<Instance>,
    caches: Arc<InstanceCaches>,
    session: RwLock<Option<Arc<dyn ProtocolSession>>>,
    qr_gate: Mutex<QrGate>,
    /// 置位后不再发出事件、不再重连 / Once set, no more events and no more reconnects
    shutdown_tx: watch::Sender<bool>,
    /// 已注销：凭据不得再落盘 / Logged out: credentials must not be persisted again
    logged_out: AtomicBool,
    ctx: SessionContext,
}

impl InstanceConnection {
    /// 打开首个协议连接；失败即握手失败 / Open the first protocol link; failure is a handshake failure
    pub async fn open(
        ctx: SessionContext,
        id: String,
        name: String,
        credentials: Option<CredentialRecord>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<ProtocolEvent>), ProtocolError> {
        let (shutdown_tx, _) = watch::channel(false);
        let mut instance = Instance::new(id.clone(), name);
        instance.status = InstanceStatus::Connecting;
        let conn = Arc::new(Self {
            caches: Arc::new(InstanceCaches::new(&ctx.cache)),
            qr_gate: Mutex::new(QrGate::new(Duration::from_millis(ctx.session.qr_ttl_ms))),
            state: RwLock::new(instance),
            session: RwLock::new(None),
            shutdown_tx,
            logged_out: AtomicBool::new(false),
            id,
            ctx,
        });

        let link = conn.ctx.connector.open(conn.open_request(credentials)).await?;
        *conn.session.write() = Some(link.session);
        debug!(instance_id = %conn.id, "protocol link opened");
        Ok((conn, link.events))
    }

    /// 启动事件循环；须在注册之后调用 / Start the event loop; call after registration
    pub fn spawn(self: &Arc<Self>, events: mpsc::UnboundedReceiver<ProtocolEvent>) {
        tokio::spawn(self.clone().run(events));
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn snapshot(&self) -> Instance {
        self.state.read().clone()
    }

    pub fn status(&self) -> InstanceStatus {
        self.state.read().status
    }

    pub fn caches(&self) -> &Arc<InstanceCaches> {
        &self.caches
    }

    fn open_request(&self, credentials: Option<CredentialRecord>) -> OpenRequest {
        OpenRequest {
            instance_id: self.id.clone(),
            credentials,
            message_lookup: Arc::new(CachedMessages(self.caches.clone())),
        }
    }

    fn session(&self) -> Option<Arc<dyn ProtocolSession>> {
        self.session.read().clone()
    }

    fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    fn emit(&self, event: InstanceEvent) {
        if self.is_stopped() {
            debug!(instance_id = %self.id, event = event.name(), "connection stopped, dropping event");
            return;
        }
        debug!(instance_id = %self.id, event = event.name(), "emitting event");
        let _ = self.ctx.events.send(ManagerEvent::new(self.id.clone(), event));
    }

    fn set_status(&self, status: InstanceStatus) {
        let mut state = self.state.write();
        state.status = status;
        if status != InstanceStatus::QrReady {
            state.qr_code = None;
        }
        if status != InstanceStatus::Connected {
            state.connected_at = None;
        }
    }

    async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<ProtocolEvent>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        loop {
            let cause = loop {
                if *shutdown.borrow() {
                    return;
                }
                let next = tokio::select! {
                    biased;
                    _ = shutdown.changed() => return,
                    ev = events.recv() => ev,
                };
                match next {
                    Some(ProtocolEvent::Closed { cause }) => break cause,
                    Some(ev) => self.handle(ev).await,
                    None => break CloseCause::ConnectionLost("event stream ended".to_string()),
                }
            };
            if !self.on_close(cause, &mut shutdown).await {
                return;
            }
            match self.reopen(&mut shutdown).await {
                Some(rx) => events = rx,
                None => return,
            }
        }
    }

    async fn handle(&self, ev: ProtocolEvent) {
        match ev {
            ProtocolEvent::Qr { payload } => self.on_qr(payload).await,
            ProtocolEvent::Open { me } => self.on_open(me),
            ProtocolEvent::Messages { messages, origin } => self.on_messages(&messages, origin),
            ProtocolEvent::CredentialsUpdated { credentials } => self.on_credentials(credentials).await,
            ProtocolEvent::Contacts { contacts } => self.on_contacts(&contacts),
            ProtocolEvent::AliasMapping { lid, pn } => {
                self.caches.aliases.record(&lid, &pn);
            }
            ProtocolEvent::ParticipantsChanged {
                group_jid,
                participants,
            } => {
                self.caches.groups.invalidate(&group_jid);
                for p in &participants {
                    self.caches.aliases.invalidate(p);
                }
            }
            ProtocolEvent::GroupUpdated { group_jid } => self.caches.groups.invalidate(&group_jid),
            // 由事件循环处理 / Handled by the event loop
            ProtocolEvent::Closed { .. } => {}
        }
    }

    async fn on_qr(&self, payload: String) {
        let accepted = self.qr_gate.lock().offer();
        if !accepted {
            debug!(instance_id = %self.id, "QR still valid, ignoring new one");
            return;
        }
        let rendered = tokio::task::spawn_blocking(move || render_data_url(&payload)).await;
        match rendered {
            Ok(Ok(qr_code)) => {
                {
                    let mut state = self.state.write();
                    state.status = InstanceStatus::QrReady;
                    state.qr_code = Some(qr_code.clone());
                }
                info!(instance_id = %self.id, "QR ready");
                self.emit(InstanceEvent::Qr { qr_code });
            }
            Ok(Err(e)) => self.qr_failed(e.to_string()),
            Err(e) => self.qr_failed(e.to_string()),
        }
    }

    fn qr_failed(&self, error: String) {
        warn!(instance_id = %self.id, %error, "failed to render QR");
        self.qr_gate.lock().clear();
        self.emit(InstanceEvent::Error {
            error: format!("failed to render QR: {}", error),
        });
    }

    fn on_open(&self, me: Option<OwnIdentity>) {
        self.qr_gate.lock().clear();
        let phone_number = me.as_ref().and_then(|m| jid::phone_number(&m.jid));
        if let Some(OwnIdentity {
            jid: own,
            lid: Some(lid),
            ..
        }) = &me
        {
            self.caches.aliases.record(lid, own);
        }
        {
            let mut state = self.state.write();
            state.status = InstanceStatus::Connected;
            state.qr_code = None;
            state.connected_at = Some(Utc::now().timestamp_millis());
            if phone_number.is_some() {
                state.phone_number = phone_number.clone();
            }
        }
        info!(instance_id = %self.id, phone = ?phone_number, "instance connected");
        self.emit(InstanceEvent::Connected { phone_number });
    }

    fn on_messages(&self, messages: &[RawMessage], origin: MessageOrigin) {
        let historical = origin == MessageOrigin::History;
        let mut batch = Vec::new();
        for raw in messages {
            let normalized = match normalize_message(
                &self.id,
                raw,
                historical,
                &self.caches.aliases,
                &self.caches.contacts,
            ) {
                Some(n) => n,
                None => continue,
            };
            let evicted = self.caches.messages.insert(normalized.stored);
            if evicted > 0 {
                debug!(instance_id = %self.id, evicted, "message store evicted oldest entries");
            }
            if historical {
                batch.push(normalized.envelope);
            } else {
                self.emit(InstanceEvent::Message {
                    message: normalized.envelope,
                });
            }
        }
        if !batch.is_empty() {
            info!(instance_id = %self.id, count = batch.len(), "history sync batch");
            self.emit(InstanceEvent::HistorySync { messages: batch });
        }
    }

    async fn on_credentials(&self, mut record: CredentialRecord) {
        if self.logged_out.load(Ordering::SeqCst) {
            return;
        }
        record.label = Some(self.state.read().name.clone());
        match self.ctx.store.save(&self.id, &record).await {
            Ok(()) => debug!(instance_id = %self.id, registered = record.registered, "credentials saved"),
            Err(e) => warn!(instance_id = %self.id, error = %e, "failed to persist credentials"),
        }
        // 保存期间被注销：删除可能晚于删除操作落盘的文件
        // Logged out while saving: drop what may have landed after the removal
        if self.logged_out.load(Ordering::SeqCst) {
            debug!(instance_id = %self.id, "logged out during save, removing credentials again");
            if let Err(e) = self.ctx.store.remove(&self.id).await {
                warn!(instance_id = %self.id, error = %e, "failed to remove credentials");
            }
        }
    }

    fn on_contacts(&self, contacts: &[ContactRecord]) {
        for c in contacts {
            if let Some(lid) = c.lid.as_deref() {
                self.caches.aliases.record(&c.id, lid);
            }
            if let Some(name) = c.name.as_deref() {
                self.caches.contacts.upsert(&c.id, name);
                if let Some(lid) = c.lid.as_deref() {
                    self.caches.contacts.upsert(lid, name);
                }
            }
        }
    }

    /// 处理关闭；返回 false 表示不再重连 / Handle a closure; false means do not reopen
    async fn on_close(&self, cause: CloseCause, shutdown: &mut watch::Receiver<bool>) -> bool {
        let dead = self.session.write().take();
        if let Some(session) = dead {
            session.close().await;
        }
        self.qr_gate.lock().clear();
        match cause {
            CloseCause::LoggedOut => {
                self.terminate().await;
                false
            }
            CloseCause::RestartRequired => {
                info!(instance_id = %self.id, "restart required, reopening");
                self.set_status(InstanceStatus::Connecting);
                true
            }
            other => {
                let reason = other.describe();
                warn!(instance_id = %self.id, %reason, "connection closed unexpectedly");
                self.set_status(InstanceStatus::Disconnected);
                self.emit(InstanceEvent::Disconnected {
                    reason,
                    logged_out: false,
                });
                self.backoff(shutdown).await
            }
        }
    }

    /// 登出为终止态：移出注册表并删除凭据 / Logout is terminal: leave the registry and drop credentials
    async fn terminate(&self) {
        info!(instance_id = %self.id, "logged out, removing instance");
        self.logged_out.store(true, Ordering::SeqCst);
        self.ctx
            .registry
            .remove_if(&self.id, |_, c| std::ptr::eq(Arc::as_ptr(c), self));
        if let Err(e) = self.ctx.store.remove(&self.id).await {
            warn!(instance_id = %self.id, error = %e, "failed to remove credentials");
        }
        self.set_status(InstanceStatus::Disconnected);
        self.emit(InstanceEvent::Disconnected {
            reason: CloseCause::LoggedOut.describe(),
            logged_out: true,
        });
        self.shutdown_tx.send_replace(true);
    }

    /// 固定延迟；期间被停止则返回 false / Fixed delay; false if stopped meanwhile
    async fn backoff(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let delay = Duration::from_millis(self.ctx.session.reconnect_delay_ms);
        debug!(instance_id = %self.id, delay_ms = delay.as_millis() as u64, "reconnect backoff");
        tokio::select! {
            biased;
            _ = shutdown.changed() => false,
            _ = tokio::time::sleep(delay) => !*shutdown.borrow(),
        }
    }

    async fn reopen(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<mpsc::UnboundedReceiver<ProtocolEvent>> {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            self.set_status(InstanceStatus::Connecting);
            let credentials = match self.ctx.store.load(&self.id).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(instance_id = %self.id, error = %e, "failed to load credentials, reopening without");
                    None
                }
            };
            let opened = tokio::select! {
                biased;
                _ = shutdown.changed() => return None,
                res = self.ctx.connector.open(self.open_request(credentials)) => res,
            };
            match opened {
                Ok(link) => {
                    if self.is_stopped() {
                        link.session.close().await;
                        return None;
                    }
                    *self.session.write() = Some(link.session);
                    info!(instance_id = %self.id, "protocol link reopened");
                    return Some(link.events);
                }
                Err(e) => {
                    warn!(instance_id = %self.id, error = %e, "reopen failed");
                    self.set_status(InstanceStatus::Disconnected);
                    self.emit(InstanceEvent::Disconnected {
                        reason: e.to_string(),
                        logged_out: false,
                    });
                    if !self.backoff(shutdown).await {
                        return None;
                    }
                }
            }
        }
    }

    /// 停止事件循环与重连，不注销 / Stop the event loop and reconnects without logging out
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let session = self.session.write().take();
        if let Some(session) = session {
            session.close().await;
        }
        self.set_status(InstanceStatus::Disconnected);
    }

    /// 注销并停止 / Log out and stop
    pub async fn logout(&self) {
        self.logged_out.store(true, Ordering::SeqCst);
        self.shutdown_tx.send_replace(true);
        let session = self.session.write().take();
        if let Some(session) = session {
            if let Err(e) = session.logout().await {
                warn!(instance_id = %self.id, error = %e, "logout failed");
            }
            session.close().await;
        }
        self.set_status(InstanceStatus::Disconnected);
    }

    /// 仅在已连接时发送；发送的负载写入消息存储
    /// Sends only while connected; the sent payload goes into the message store
    pub async fn send_text(&self, to: &str, text: &str) -> bool {
        if self.status() != InstanceStatus::Connected {
            debug!(instance_id = %self.id, "send rejected, instance not connected");
            return false;
        }
        let session = match self.session() {
            Some(s) => s,
            None => return false,
        };
        match session.send_text(to, text).await {
            Ok(id) => {
                if !id.is_empty() {
                    self.caches.messages.insert(StoredMessage {
                        id,
                        remote_jid: to.to_string(),
                        from_me: true,
                        timestamp: Utc::now().timestamp(),
                        content: MessageContent::Text {
                            text: text.to_string(),
                        },
                    });
                }
                true
            }
            Err(e) => {
                warn!(instance_id = %self.id, to, error = %e, "send failed");
                false
            }
        }
    }

    pub async fn profile_picture(&self, jid: &str, tier: PictureTier) -> Option<String> {
        let session = self.session();
        self.caches
            .pictures
            .resolve(jid, tier, || async move {
                match session {
                    Some(s) => s.profile_picture_url(jid, tier).await,
                    None => Err(ProtocolError::Closed),
                }
            })
            .await
    }

    pub async fn profile_pictures(
        &self,
        jids: &[String],
        tier: PictureTier,
    ) -> BTreeMap<String, Option<String>> {
        let session = self.session();
        self.caches
            .pictures
            .resolve_batch(jids, tier, self.ctx.cache.profile_batch_size, |jid| {
                let session = session.clone();
                async move {
                    match session {
                        Some(s) => s.profile_picture_url(&jid, tier).await,
                        None => Err(ProtocolError::Closed),
                    }
                }
            })
            .await
    }

    pub async fn group_metadata(&self, group_jid: &str) -> Result<GroupMetadata, ProtocolError> {
        let session = self.session().ok_or(ProtocolError::Closed)?;
        self.caches
            .groups
            .get_or_fetch(group_jid, || async move { session.group_metadata(group_jid).await })
            .await
    }

    /// 合并协议资料、通讯录名称、别名与头像；对端不存在时为 None
    /// Merge the protocol profile, directory name, alias and picture; None when the party does not exist
    pub async fn contact_info(&self, target: &str) -> Result<Option<ContactInfo>, ProtocolError> {
        let session = self.session().ok_or(ProtocolError::Closed)?;
        let (resolved, _) = self.caches.aliases.resolve(target);
        let profile = match session.contact_profile(&resolved).await? {
            Some(p) if p.exists => p,
            _ => return Ok(None),
        };
        if let Some(lid) = profile.lid.as_deref() {
            self.caches.aliases.record(&resolved, lid);
        }
        let lid = if jid::is_lid(&resolved) {
            Some(resolved.clone())
        } else {
            profile.lid.clone().or_else(|| self.caches.aliases.lid_for(&resolved))
        };
        let name = self
            .caches
            .contacts
            .name_of(&resolved)
            .or_else(|| lid.as_deref().and_then(|l| self.caches.contacts.name_of(l)));
        let profile_picture_url = self.profile_picture(&resolved, PictureTier::Preview).await;
        Ok(Some(ContactInfo {
            phone_number: jid::phone_number(&resolved),
            jid: resolved,
            name,
            lid,
            status: profile.status,
            business_name: profile.business_name,
            profile_picture_url,
        }))
    }
}
