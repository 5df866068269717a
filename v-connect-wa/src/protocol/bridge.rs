//! 协议侧车桥接 / Protocol sidecar bridge
//!
//! 每个实例一条到侧车的 WebSocket，帧为 JSON：
//! One WebSocket per instance to the sidecar, JSON frames:
//! - 出站 `{"kind":"request","req_id":n,"op":"send_text","args":{..}}`
//! - 入站 `{"kind":"reply","req_id":n,"ok":true,"result":..}`
//! - 入站 `{"kind":"event","event":{"event":"qr",..}}`
//! - 入站 `{"kind":"lookup","lookup_id":n,"id":..,"remote_jid":..}`，
//!   由本地消息存储应答 / answered from the local message store

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::{
    CloseCause, MessageLookup, OpenRequest, ProtocolConnector, ProtocolError, ProtocolEvent,
    ProtocolLink, ProtocolSession,
};
use crate::cache::StoredMessage;
use crate::domain::{ContactProfile, GroupMetadata, PictureTier};

type Pending = Arc<DashMap<u64, oneshot::Sender<Result<Value, ProtocolError>>>>;

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Inbound {
    Reply {
        req_id: u64,
        ok: bool,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: ProtocolEvent,
    },
    Lookup {
        lookup_id: u64,
        id: String,
        remote_jid: String,
    },
}

#[derive(Serialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Outbound<'a> {
    Request {
        req_id: u64,
        op: &'a str,
        args: Value,
    },
    LookupReply {
        lookup_id: u64,
        message: Option<StoredMessage>,
    },
}

fn encode(frame: &Outbound<'_>) -> Result<Message, ProtocolError> {
    serde_json::to_string(frame)
        .map(Message::Text)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// 生产连接器 / Production connector
pub struct BridgeConnector {
    url: String,
    request_timeout: Duration,
}

impl BridgeConnector {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            request_timeout,
        }
    }
}

#[async_trait]
impl ProtocolConnector for BridgeConnector {
    async fn open(&self, req: OpenRequest) -> Result<ProtocolLink, ProtocolError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ProtocolError::Unavailable(e.to_string()))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ProtocolEvent>();
        let pending: Pending = Arc::new(DashMap::new());
        let instance_id = req.instance_id.clone();

        let writer_id = instance_id.clone();
        let send_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let is_close = matches!(&msg, Message::Close(_));
                if let Err(e) = ws_sender.send(msg).await {
                    error!(instance_id = %writer_id, "bridge write failed: {}", e);
                    break;
                }
                if is_close {
                    let _ = ws_sender.close().await;
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_out = out_tx.clone();
        let lookup = req.message_lookup.clone();
        let reader_id = instance_id.clone();
        let recv_task = tokio::spawn(async move {
            let mut reason = "bridge stream ended".to_string();
            while let Some(msg) = ws_receiver.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        reason = e.to_string();
                        break;
                    }
                };
                match serde_json::from_str::<Inbound>(&text) {
                    Ok(frame) => dispatch(frame, &reader_pending, &reader_out, &event_tx, lookup.as_ref()),
                    Err(e) => warn!(instance_id = %reader_id, "dropping malformed bridge frame: {}", e),
                }
            }
            // 未完成的请求随发送端一起丢弃 / Pending requests fail once their senders drop
            reader_pending.clear();
            debug!(instance_id = %reader_id, %reason, "bridge reader finished");
            let _ = event_tx.send(ProtocolEvent::Closed {
                cause: CloseCause::ConnectionLost(reason),
            });
        });

        let session = Arc::new(BridgeSession {
            instance_id: instance_id.clone(),
            out: out_tx,
            pending,
            next_id: AtomicU64::new(1),
            timeout: self.request_timeout,
            writer: parking_lot::Mutex::new(Some(send_task)),
            reader: parking_lot::Mutex::new(Some(recv_task)),
        });

        // 若此 future 被取消，session 随之析构并关闭链路
        // If this future is cancelled, the session drops and closes the link
        let args = json!({ "instance_id": instance_id, "credentials": req.credentials });
        if let Err(e) = session.request("open", args).await {
            session.close().await;
            return Err(e);
        }
        info!(instance_id = %instance_id, "bridge link opened");
        Ok(ProtocolLink {
            session,
            events: event_rx,
        })
    }
}

fn dispatch(
    frame: Inbound,
    pending: &Pending,
    out: &mpsc::UnboundedSender<Message>,
    events: &mpsc::UnboundedSender<ProtocolEvent>,
    lookup: &dyn MessageLookup,
) {
    match frame {
        Inbound::Reply {
            req_id,
            ok,
            result,
            error,
        } => {
            if let Some((_, waiter)) = pending.remove(&req_id) {
                let reply = if ok {
                    Ok(result)
                } else {
                    Err(ProtocolError::Rejected(error.unwrap_or_default()))
                };
                let _ = waiter.send(reply);
            } else {
                debug!(req_id, "reply for unknown or expired request");
            }
        }
        Inbound::Event { event } => {
            let _ = events.send(event);
        }
        Inbound::Lookup {
            lookup_id,
            id,
            remote_jid,
        } => {
            let message = lookup.lookup(&id, &remote_jid);
            match encode(&Outbound::LookupReply { lookup_id, message }) {
                Ok(msg) => {
                    let _ = out.send(msg);
                }
                Err(e) => warn!(lookup_id, "failed to encode lookup reply: {}", e),
            }
        }
    }
}

struct BridgeSession {
    instance_id: String,
    out: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    timeout: Duration,
    writer: parking_lot::Mutex<Option<JoinHandle<()>>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Drop for BridgeSession {
    fn drop(&mut self) {
        // close() 已收尾时 reader 为空 / reader is empty once close() has run
        if let Some(reader) = self.reader.get_mut().take() {
            // 写任务发出关闭帧后自行退出 / The writer exits by itself after flushing the close frame
            let _ = self.out.send(Message::Close(None));
            reader.abort();
            debug!(instance_id = %self.instance_id, "bridge session dropped, link closing");
        }
    }
}

impl BridgeSession {
    async fn request(&self, op: &str, args: Value) -> Result<Value, ProtocolError> {
        let req_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let msg = encode(&Outbound::Request { req_id, op, args })?;
        let (tx, rx) = oneshot::channel();
        self.pending.insert(req_id, tx);
        if self.out.send(msg).is_err() {
            self.pending.remove(&req_id);
            return Err(ProtocolError::Closed);
        }
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ProtocolError::Closed),
            Err(_) => {
                self.pending.remove(&req_id);
                Err(ProtocolError::Timeout(op.to_string()))
            }
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ProtocolError> {
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ProtocolSession for BridgeSession {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, ProtocolError> {
        let result = self.request("send_text", json!({ "to": to, "text": text })).await?;
        Ok(result
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn group_metadata(&self, group_jid: &str) -> Result<GroupMetadata, ProtocolError> {
        let result = self.request("group_metadata", json!({ "jid": group_jid })).await?;
        Self::decode(result)
    }

    async fn profile_picture_url(
        &self,
        jid: &str,
        tier: PictureTier,
    ) -> Result<Option<String>, ProtocolError> {
        let result = self
            .request("profile_picture_url", json!({ "jid": jid, "tier": tier }))
            .await?;
        Self::decode(result)
    }

    async fn contact_profile(&self, jid: &str) -> Result<Option<ContactProfile>, ProtocolError> {
        let result = self.request("contact_profile", json!({ "jid": jid })).await?;
        Self::decode(result)
    }

    async fn logout(&self) -> Result<(), ProtocolError> {
        self.request("logout", Value::Null).await.map(|_| ())
    }

    async fn close(&self) {
        let _ = self.out.send(Message::Close(None));
        // 给写任务一点时间刷出关闭帧 / Give the writer a moment to flush the close frame
        tokio::time::sleep(Duration::from_millis(50)).await;
        let tasks = [self.writer.lock().take(), self.reader.lock().take()];
        for task in tasks.into_iter().flatten() {
            task.abort();
        }
        debug!(instance_id = %self.instance_id, "bridge link closed");
    }
}
