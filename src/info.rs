//! Parsing of the `INFO` reply and its translation into samples.

use std::collections::HashMap;

use crate::metrics::{MetricKind, MetricSample};

// ─── Translation tables ──────────────────────────────────────────

/// INFO field → gauge name.
const GAUGE_KEYS: &[(&str, &str)] = &[
    // Append-only file
    ("aof_last_rewrite_time_sec", "redis.aof.last_rewrite_time"),
    ("aof_rewrite_in_progress", "redis.aof.rewrite"),
    ("aof_current_size", "redis.aof.size"),
    ("aof_buffer_length", "redis.aof.buffer_length"),
    // Network
    ("connected_clients", "redis.net.clients"),
    ("connected_slaves", "redis.net.slaves"),
    ("rejected_connections", "redis.net.rejected"),
    ("instantaneous_ops_per_sec", "redis.net.instantaneous_ops_per_sec"),
    // Clients; the recent_max_* fields replaced the older two in redis 5
    ("blocked_clients", "redis.clients.blocked"),
    ("client_biggest_input_buf", "redis.clients.biggest_input_buf"),
    ("client_longest_output_list", "redis.clients.longest_output_list"),
    ("client_recent_max_input_buffer", "redis.clients.biggest_input_buf"),
    ("client_recent_max_output_buffer", "redis.clients.longest_output_list"),
    // Keys
    ("evicted_keys", "redis.keys.evicted"),
    ("expired_keys", "redis.keys.expired"),
    // Stats
    ("latest_fork_usec", "redis.perf.latest_fork_usec"),
    // Pubsub
    ("pubsub_channels", "redis.pubsub.channels"),
    ("pubsub_patterns", "redis.pubsub.patterns"),
    // RDB
    ("rdb_bgsave_in_progress", "redis.rdb.bgsave"),
    ("rdb_changes_since_last_save", "redis.rdb.changes_since_last"),
    ("rdb_last_bgsave_time_sec", "redis.rdb.last_bgsave_time"),
    // Memory
    ("mem_fragmentation_ratio", "redis.mem.fragmentation_ratio"),
    ("used_memory", "redis.mem.used"),
    ("used_memory_lua", "redis.mem.lua"),
    ("used_memory_peak", "redis.mem.peak"),
    ("used_memory_rss", "redis.mem.rss"),
    ("used_memory_startup", "redis.mem.startup"),
    ("used_memory_overhead", "redis.mem.overhead"),
    ("maxmemory", "redis.mem.maxmemory"),
    // Replication
    ("master_last_io_seconds_ago", "redis.replication.last_io_seconds_ago"),
    ("master_sync_in_progress", "redis.replication.sync"),
    ("master_sync_left_bytes", "redis.replication.sync_left_bytes"),
    ("repl_backlog_histlen", "redis.replication.backlog_histlen"),
    ("master_repl_offset", "redis.replication.master_repl_offset"),
    ("slave_repl_offset", "redis.replication.slave_repl_offset"),
    (
        "master_link_down_since_seconds",
        "redis.replication.master_link_down_since_seconds",
    ),
];

/// INFO counter → rate name.
const RATE_KEYS: &[(&str, &str)] = &[
    ("total_commands_processed", "redis.net.commands"),
    ("used_cpu_sys", "redis.cpu.sys"),
    ("used_cpu_sys_children", "redis.cpu.sys_children"),
    ("used_cpu_user", "redis.cpu.user"),
    ("used_cpu_user_children", "redis.cpu.user_children"),
    ("keyspace_hits", "redis.stats.keyspace_hits"),
    ("keyspace_misses", "redis.stats.keyspace_misses"),
];

// ─── Parsed reply ────────────────────────────────────────────────

/// One `dbN:keys=..,expires=..` line; `avg_ttl` is not reported.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyspaceStats {
    pub db: String,
    pub keys: f64,
    pub expires: f64,
}

/// One `slaveN:ip=..,port=..,state=..,offset=..,lag=..` line on a master.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaStats {
    pub ip: String,
    pub port: String,
    pub state: String,
    pub offset: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Info {
    fields: HashMap<String, String>,
    pub keyspace: Vec<KeyspaceStats>,
    pub replicas: Vec<ReplicaStats>,
}

impl Info {
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();
        let mut section = "";

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix("# ") {
                section = name;
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };

            if section == "Keyspace" {
                if let Some(stats) = parse_keyspace(key, value) {
                    info.keyspace.push(stats);
                }
                continue;
            }
            if section == "Replication" && key.starts_with("slave") {
                if let Some(replica) = parse_replica(key, value) {
                    info.replicas.push(replica);
                    continue;
                }
            }

            info.fields.insert(key.to_owned(), value.to_owned());
        }

        info
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.parse::<f64>().ok())
    }

    pub fn role(&self) -> Option<&str> {
        self.get("role")
    }

    /// Instance tags plus `redis_role` when INFO reports one.
    pub fn tags(&self, base_tags: &[String]) -> Vec<String> {
        let mut tags = base_tags.to_vec();
        if let Some(role) = self.role() {
            tags.push(format!("redis_role:{role}"));
        }
        tags
    }

    /// Translate into samples. `base_tags` are the instance tags.
    pub fn samples(&self, base_tags: &[String]) -> Vec<MetricSample> {
        let tags = self.tags(base_tags);
        let mut samples = Vec::new();

        for (field, name) in GAUGE_KEYS {
            if let Some(value) = self.number(field) {
                samples.push(MetricSample::new(*name, MetricKind::Gauge, value, &tags));
            }
        }
        for (field, name) in RATE_KEYS {
            if let Some(value) = self.number(field) {
                samples.push(MetricSample::new(*name, MetricKind::Rate, value, &tags));
            }
        }

        for db in &self.keyspace {
            let mut db_tags = tags.clone();
            db_tags.push(format!("redis_db:{}", db.db));
            let persist = db.keys - db.expires;

            samples.push(MetricSample::gauge("redis.keys", db.keys, &db_tags));
            samples.push(MetricSample::gauge("redis.expires", db.expires, &db_tags));
            samples.push(MetricSample::gauge("redis.persist", persist, &db_tags));
            if db.keys > 0.0 {
                samples.push(MetricSample::gauge(
                    "redis.persist.percent",
                    100.0 * persist / db.keys,
                    &db_tags,
                ));
                samples.push(MetricSample::gauge(
                    "redis.expires.percent",
                    100.0 * db.expires / db.keys,
                    &db_tags,
                ));
            }
        }

        if let Some(master_offset) = self.number("master_repl_offset") {
            for replica in &self.replicas {
                let mut replica_tags = tags.clone();
                replica_tags.push(format!("slave_ip:{}", replica.ip));
                replica_tags.push(format!("slave_port:{}", replica.port));
                replica_tags.push(format!("slave_state:{}", replica.state));
                samples.push(MetricSample::gauge(
                    "redis.replication.delay",
                    master_offset - replica.offset,
                    &replica_tags,
                ));
            }
        }

        samples
    }
}

fn comma_pairs(value: &str) -> impl Iterator<Item = (&str, &str)> {
    value.split(',').filter_map(|kv| kv.split_once('='))
}

pub fn parse_keyspace(key: &str, value: &str) -> Option<KeyspaceStats> {
    if !key.starts_with("db") {
        return None;
    }

    let mut stats = KeyspaceStats {
        db: key.to_owned(),
        keys: 0.0,
        expires: 0.0,
    };
    for (k, v) in comma_pairs(value) {
        match k {
            "keys" => stats.keys = v.parse().ok()?,
            "expires" => stats.expires = v.parse().ok()?,
            _ => {}
        }
    }
    Some(stats)
}

fn parse_replica(key: &str, value: &str) -> Option<ReplicaStats> {
    let id = key.strip_prefix("slave")?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut replica = ReplicaStats {
        ip: String::new(),
        port: String::new(),
        state: String::new(),
        offset: 0.0,
    };
    for (k, v) in comma_pairs(value) {
        match k {
            "ip" => replica.ip = v.to_owned(),
            "port" => replica.port = v.to_owned(),
            "state" => replica.state = v.to_owned(),
            "offset" => replica.offset = v.parse().ok()?,
            _ => {}
        }
    }
    Some(replica)
}

// ─── INFO commandstats ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CommandStats {
    pub command: String,
    pub calls: f64,
    pub usec_per_call: f64,
}

/// Parse the `cmdstat_<name>:calls=..,usec=..,usec_per_call=..` lines.
pub fn parse_command_stats(text: &str) -> Vec<CommandStats> {
    let mut stats = Vec::new();

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let Some(command) = key.strip_prefix("cmdstat_") else {
            continue;
        };

        let mut entry = CommandStats {
            command: command.to_owned(),
            calls: 0.0,
            usec_per_call: 0.0,
        };
        for (k, v) in comma_pairs(value) {
            let Ok(v) = v.parse::<f64>() else {
                continue;
            };
            match k {
                "calls" => entry.calls = v,
                "usec_per_call" => entry.usec_per_call = v,
                _ => {}
            }
        }
        stats.push(entry);
    }

    stats
}
