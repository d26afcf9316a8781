//! 测试替身：内存存储与可消费的引擎桩

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use common::{ProxyEngine, TrafficSnapshot};

use crate::entity::inbound::Protocol;
use crate::entity::{client_traffic, inbound};
use crate::store::{InboundReset, InboundStore, InboundWithClients};

pub fn inbound(id: i64, tag: &str) -> inbound::Model {
    inbound::Model {
        id,
        user_id: 1,
        up: 0,
        down: 0,
        total: 0,
        all_time: 0,
        remark: tag.to_string(),
        enable: true,
        expiry_time: 0,
        traffic_reset: String::new(),
        last_traffic_reset_time: 0,
        listen: String::new(),
        port: 10_000 + id as i32,
        protocol: Protocol::Vless,
        settings: "{\"clients\":[]}".to_string(),
        stream_settings: String::new(),
        tag: tag.to_string(),
        sniffing: String::new(),
    }
}

pub fn client(id: i64, inbound_id: i64, email: &str) -> client_traffic::Model {
    client_traffic::Model {
        id,
        inbound_id,
        enable: true,
        email: email.to_string(),
        up: 0,
        down: 0,
        all_time: 0,
        total: 0,
        expiry_time: 0,
        reset: 0,
        sub_id: format!("sub-{}", email),
    }
}

/// 与 SeaOrmStore 语义一致的内存实现
///
/// `fail_on` 中的 tag / email 会让对应实体的写入失败。email 与数据库一样全局唯一。
#[derive(Default)]
pub struct MemoryStore {
    inbounds: Mutex<Vec<inbound::Model>>,
    clients: Mutex<Vec<client_traffic::Model>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new(inbounds: Vec<inbound::Model>, clients: Vec<client_traffic::Model>) -> Self {
        let mut emails = HashSet::new();
        for client in &clients {
            assert!(emails.insert(client.email.clone()), "duplicate client email {}", client.email);
        }
        Self {
            inbounds: Mutex::new(inbounds),
            clients: Mutex::new(clients),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn inbound_by_tag(&self, tag: &str) -> inbound::Model {
        self.inbounds
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.tag == tag)
            .cloned()
            .unwrap()
    }

    pub fn client_by_email(&self, email: &str) -> client_traffic::Model {
        self.clients
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.email == email)
            .cloned()
            .unwrap()
    }

    fn check(&self, key: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(key) {
            return Err(anyhow!("database is locked"));
        }
        Ok(())
    }

    fn with_client<F>(&self, client_id: i64, f: F) -> Result<()>
    where
        F: FnOnce(&mut client_traffic::Model),
    {
        let mut clients = self.clients.lock().unwrap();
        let client = clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .ok_or_else(|| anyhow!("客户端 #{} 不存在", client_id))?;
        self.check(&client.email)?;
        f(client);
        Ok(())
    }
}

fn fold(all_time: &mut i64, up: &mut i64, down: &mut i64) {
    *all_time += *up + *down;
    *up = 0;
    *down = 0;
}

#[async_trait]
impl InboundStore for MemoryStore {
    async fn add_inbound_traffic(&self, tag: &str, up: i64, down: i64) -> Result<bool> {
        self.check(tag)?;
        let mut hit = false;
        for inbound in self.inbounds.lock().unwrap().iter_mut().filter(|i| i.tag == tag) {
            inbound.up += up;
            inbound.down += down;
            hit = true;
        }
        Ok(hit)
    }

    async fn add_client_traffic(&self, email: &str, up: i64, down: i64) -> Result<bool> {
        self.check(email)?;
        let mut clients = self.clients.lock().unwrap();
        let Some(client) = clients.iter_mut().find(|c| c.email == email) else {
            return Ok(false);
        };
        client.up += up;
        client.down += down;
        Ok(true)
    }

    async fn list_inbounds(&self) -> Result<Vec<InboundWithClients>> {
        let mut inbounds = self.inbounds.lock().unwrap().clone();
        inbounds.sort_by_key(|i| i.id);
        let mut clients = self.clients.lock().unwrap().clone();
        clients.sort_by_key(|c| c.id);

        Ok(inbounds
            .into_iter()
            .map(|inbound| {
                let client_stats = clients
                    .iter()
                    .filter(|c| c.inbound_id == inbound.id)
                    .cloned()
                    .collect();
                InboundWithClients { inbound, client_stats }
            })
            .collect())
    }

    async fn set_inbound_enable(&self, inbound_id: i64, enable: bool) -> Result<()> {
        let mut inbounds = self.inbounds.lock().unwrap();
        let inbound = inbounds
            .iter_mut()
            .find(|i| i.id == inbound_id)
            .ok_or_else(|| anyhow!("入站 #{} 不存在", inbound_id))?;
        self.check(&inbound.tag)?;
        inbound.enable = enable;
        Ok(())
    }

    async fn set_client_enable(&self, client_id: i64, enable: bool) -> Result<()> {
        self.with_client(client_id, |c| c.enable = enable)
    }

    async fn reset_inbound_traffic(&self, reset: &InboundReset) -> Result<bool> {
        let mut inbounds = self.inbounds.lock().unwrap();
        let Some(inbound) = inbounds.iter_mut().find(|i| i.id == reset.inbound_id) else {
            return Ok(false);
        };
        self.check(&inbound.tag)?;
        if inbound.last_traffic_reset_time >= reset.boundary {
            return Ok(false);
        }

        inbound.last_traffic_reset_time = reset.boundary;
        if reset.fold_traffic {
            fold(&mut inbound.all_time, &mut inbound.up, &mut inbound.down);
        }
        if reset.reenable_inbound {
            inbound.enable = true;
        }

        for client in self
            .clients
            .lock()
            .unwrap()
            .iter_mut()
            .filter(|c| c.inbound_id == reset.inbound_id)
        {
            if reset.fold_traffic {
                fold(&mut client.all_time, &mut client.up, &mut client.down);
            }
            if reset.reenable_clients.contains(&client.id) {
                client.enable = true;
            }
        }
        Ok(true)
    }

    async fn reset_inbound_counters(&self, inbound_id: i64, enable: bool) -> Result<()> {
        let mut inbounds = self.inbounds.lock().unwrap();
        let inbound = inbounds
            .iter_mut()
            .find(|i| i.id == inbound_id)
            .ok_or_else(|| anyhow!("入站 #{} 不存在", inbound_id))?;
        self.check(&inbound.tag)?;
        fold(&mut inbound.all_time, &mut inbound.up, &mut inbound.down);
        if enable {
            inbound.enable = true;
        }
        Ok(())
    }

    async fn renew_client(&self, client_id: i64, expiry_time: i64) -> Result<()> {
        self.with_client(client_id, |c| {
            fold(&mut c.all_time, &mut c.up, &mut c.down);
            c.expiry_time = expiry_time;
            c.enable = true;
        })
    }

    async fn reset_client_traffic(&self, client_id: i64, enable: bool) -> Result<()> {
        self.with_client(client_id, |c| {
            fold(&mut c.all_time, &mut c.up, &mut c.down);
            if enable {
                c.enable = true;
            }
        })
    }

    async fn delete_clients(&self, client_ids: &[i64]) -> Result<u64> {
        let mut clients = self.clients.lock().unwrap();
        let before = clients.len();
        clients.retain(|c| !client_ids.contains(&c.id));
        Ok((before - clients.len()) as u64)
    }
}

/// 读取即清零的引擎桩
///
/// 每次读取弹出队列中的下一份快照，队列为空时返回空快照。
pub struct StubEngine {
    running: AtomicBool,
    snapshots: Mutex<VecDeque<TrafficSnapshot>>,
    active: Mutex<Option<Vec<String>>>,
    reloads: AtomicUsize,
    reads: AtomicUsize,
}

impl StubEngine {
    pub fn new(snapshots: Vec<TrafficSnapshot>) -> Self {
        Self {
            running: AtomicBool::new(true),
            snapshots: Mutex::new(snapshots.into()),
            active: Mutex::new(Some(Vec::new())),
            reloads: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// `None` 让连接查询失败
    pub fn set_active(&self, active: Option<Vec<&str>>) {
        *self.active.lock().unwrap() =
            active.map(|list| list.into_iter().map(str::to_string).collect());
    }

    pub fn push(&self, snapshot: TrafficSnapshot) {
        self.snapshots.lock().unwrap().push_back(snapshot);
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyEngine for StubEngine {
    async fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn read_traffic_snapshot(&self) -> Result<TrafficSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshots.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn active_connections(&self) -> Result<Vec<String>> {
        self.active
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("connection stats unavailable"))
    }

    async fn request_reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
