//! Related-event clustering
//!
//! Incidents that are part of one coordinated attack list each other's event
//! ids in their `related` field. Each incident with a known related list is
//! reduced to a key, the sorted set of its own id and every id it
//! references, and incidents sharing a key share a cluster index. Indices are
//! handed out in the order keys are first seen.

use std::collections::{BTreeSet, HashMap};

use petgraph::unionfind::UnionFind;
use tracing::debug;

use crate::data::{Incident, UNKNOWN};

/// How records with overlapping related lists are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterMode {
    /// Same cluster only when the computed keys are identical
    #[default]
    Exact,
    /// Keys sharing any event id, directly or through a chain, are merged
    Transitive,
}

/// Sorted, de-duplicated member ids of one event cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(Vec<String>);

impl EventKey {
    /// Build the key for one record; `None` when the related field is unknown.
    pub fn for_record(event_id: &str, related: &str) -> Option<Self> {
        let related = related.trim();
        if related == UNKNOWN {
            return None;
        }
        let members: BTreeSet<String> = related
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .chain(std::iter::once(event_id.trim()))
            .map(str::to_string)
            .collect();
        Some(EventKey(members.into_iter().collect()))
    }

    /// Member ids in ascending order
    pub fn members(&self) -> &[String] {
        &self.0
    }

    /// Number of member ids
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the key holds no ids
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cluster labels for an ordered set of records
#[derive(Debug, Clone)]
pub struct ClusterAssignment {
    pub mode: ClusterMode,
    /// Cluster index per record; `None` for records without related events
    pub labels: Vec<Option<usize>>,
    /// Key of every cluster, indexed by cluster index
    pub keys: Vec<EventKey>,
}

impl ClusterAssignment {
    /// Cluster index of a record position; `None` when unrelated or out of range
    pub fn label(&self, record: usize) -> Option<usize> {
        self.labels.get(record).copied().flatten()
    }

    /// Number of distinct clusters
    pub fn cluster_count(&self) -> usize {
        self.keys.len()
    }

    /// Number of records carrying each cluster index
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.keys.len()];
        for label in self.labels.iter().flatten() {
            sizes[*label] += 1;
        }
        sizes
    }

    /// Member ids of a cluster's key
    pub fn members(&self, cluster: usize) -> Option<&[String]> {
        self.keys.get(cluster).map(EventKey::members)
    }

    /// Number of records that received a cluster index
    pub fn clustered_records(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }

    /// Unrelated records count once each, every cluster counts once.
    pub fn distinct_events(&self) -> usize {
        self.labels.len() - self.clustered_records() + self.cluster_count()
    }

    /// Record positions to keep so every cluster is represented by its first record.
    pub fn representatives(&self) -> Vec<usize> {
        let mut seen = vec![false; self.keys.len()];
        let mut keep = Vec::with_capacity(self.distinct_events());
        for (record, label) in self.labels.iter().enumerate() {
            match label {
                Some(cluster) if seen[*cluster] => {}
                Some(cluster) => {
                    seen[*cluster] = true;
                    keep.push(record);
                }
                None => keep.push(record),
            }
        }
        keep
    }
}

/// Assign cluster indices to `(event_id, related)` pairs in order
pub fn assign_clusters<'a, I>(records: I, mode: ClusterMode) -> ClusterAssignment
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let record_keys: Vec<Option<EventKey>> = records
        .into_iter()
        .map(|(event_id, related)| EventKey::for_record(event_id, related))
        .collect();

    let assignment = match mode {
        ClusterMode::Exact => assign_exact(record_keys),
        ClusterMode::Transitive => assign_transitive(record_keys),
    };
    debug!(
        mode = ?assignment.mode,
        clusters = assignment.cluster_count(),
        clustered = assignment.clustered_records(),
        "related events clustered"
    );
    assignment
}

/// Convenience wrapper over loaded incidents
pub fn cluster_incidents(incidents: &[Incident], mode: ClusterMode) -> ClusterAssignment {
    assign_clusters(
        incidents
            .iter()
            .map(|i| (i.event_id.as_str(), i.related.as_str())),
        mode,
    )
}

fn assign_exact(record_keys: Vec<Option<EventKey>>) -> ClusterAssignment {
    let mut index: HashMap<EventKey, usize> = HashMap::new();
    let mut keys = Vec::new();
    let labels = record_keys
        .into_iter()
        .map(|key| {
            let key = key?;
            let next = keys.len();
            let label = *index.entry(key.clone()).or_insert_with(|| {
                keys.push(key);
                next
            });
            Some(label)
        })
        .collect();

    ClusterAssignment {
        mode: ClusterMode::Exact,
        labels,
        keys,
    }
}

fn assign_transitive(record_keys: Vec<Option<EventKey>>) -> ClusterAssignment {
    // intern every id so the union-find can work on dense indices
    let mut ids: HashMap<&str, usize> = HashMap::new();
    for key in record_keys.iter().flatten() {
        for member in key.members() {
            let next = ids.len();
            ids.entry(member.as_str()).or_insert(next);
        }
    }

    let mut components = UnionFind::<usize>::new(ids.len());
    for key in record_keys.iter().flatten() {
        let mut members = key.members().iter().map(|m| ids[m.as_str()]);
        if let Some(first) = members.next() {
            for other in members {
                components.union(first, other);
            }
        }
    }

    let mut root_to_cluster: HashMap<usize, usize> = HashMap::new();
    let mut merged: Vec<BTreeSet<String>> = Vec::new();
    let mut labels = Vec::with_capacity(record_keys.len());
    for key in record_keys.iter() {
        let Some(key) = key else {
            labels.push(None);
            continue;
        };
        let Some(first) = key.members().first() else {
            labels.push(None);
            continue;
        };
        let root = components.find(ids[first.as_str()]);
        let next = merged.len();
        let cluster = *root_to_cluster.entry(root).or_insert_with(|| {
            merged.push(BTreeSet::new());
            next
        });
        merged[cluster].extend(key.members().iter().cloned());
        labels.push(Some(cluster));
    }

    ClusterAssignment {
        mode: ClusterMode::Transitive,
        labels,
        keys: merged
            .into_iter()
            .map(|members| EventKey(members.into_iter().collect()))
            .collect(),
    }
}
