//! Destination-port to service-label classification.

use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap};

/// Built-in TCP port names. Extend at runtime with [`ServicePortTable::insert`].
const BUILTIN: &[(u16, &str)] = &[
    (80, "HTTP"),
    (443, "HTTPS (WS?)"),
    (21, "FTP"),
    (22, "SSH"),
    (25, "SMTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (53, "DNS"),
    (139, "SMB"),
    (445, "SMB"),
    (3389, "RDP"),
];

/// Static mapping from TCP port number to a canonical service name.
#[derive(Debug, Clone, Default)]
pub struct ServicePortTable {
    names: HashMap<u16, String>,
}

impl ServicePortTable {
    /// An empty table: every port classifies to its raw `Port <n>` label only.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut t = Self::empty();
        t.extend(BUILTIN.iter().map(|&(p, n)| (p, n.to_string())));
        t
    }

    /// Add or replace a mapping. Later inserts win.
    pub fn insert(&mut self, port: u16, name: impl Into<String>) {
        self.names.insert(port, name.into());
    }

    pub fn extend<I: IntoIterator<Item = (u16, String)>>(&mut self, entries: I) {
        for (p, n) in entries {
            self.insert(p, n);
        }
    }

    pub fn name(&self, port: u16) -> Option<&str> {
        self.names.get(&port).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Labels for a connection to `port`: always `Port <port>`, plus the canonical name when known.
    pub fn classify(&self, port: u16) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();
        labels.insert(label_for_port(port));
        if let Some(name) = self.name(port) {
            labels.insert(name.to_string());
        }
        labels
    }
}

/// The raw label recorded for every destination port.
pub fn label_for_port(port: u16) -> String {
    format!("Port {}", port)
}

/// Parse a comma-separated list of `port=name` pairs (e.g., "8080=HTTP-alt, 5353=mDNS").
pub fn parse_port_map(spec: &str) -> Result<Vec<(u16, String)>> {
    let mut out = Vec::new();
    for part in spec.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let (port, name) = part
            .split_once('=')
            .ok_or_else(|| anyhow!("expected port=name, got: {}", part))?;
        let p: u16 = port.trim().parse()?;
        if p == 0 {
            return Err(anyhow!("invalid port: {}", part));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("empty service name for port {}", p));
        }
        out.push((p, name.to_string()));
    }
    Ok(out)
}
