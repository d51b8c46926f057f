//! Per-session port allocation
//!
//! Ports count upwards from the base and are never handed out twice within
//! one session, even after release.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use crate::error::{SandboxError, SandboxResult};

#[derive(Debug)]
pub struct PortAllocator {
    next: Mutex<Option<u16>>,
    assigned: DashMap<String, u16>,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self {
            next: Mutex::new(Some(base_port)),
            assigned: DashMap::new(),
        }
    }

    /// Hand out the next port to an execution
    pub fn allocate(&self, owner: &str) -> SandboxResult<u16> {
        let port = {
            let mut next = self.next.lock();
            let port = next.ok_or(SandboxError::PortsExhausted)?;
            *next = port.checked_add(1);
            port
        };
        self.assigned.insert(owner.to_string(), port);
        Ok(port)
    }

    /// Drop an execution's assignment; the port is not reused
    pub fn release(&self, owner: &str) -> Option<u16> {
        self.assigned.remove(owner).map(|(_, port)| port)
    }

    pub fn get(&self, owner: &str) -> Option<u16> {
        self.assigned.get(owner).map(|entry| *entry)
    }

    /// Current assignments by execution id
    pub fn assignments(&self) -> BTreeMap<String, u16> {
        self.assigned
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn clear(&self) {
        self.assigned.clear();
    }
}
